//! SEO metadata, keyword research, product copy and SKU suggestions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use momtazchem_core::{Language, ProductId};

use super::client::{AiClient, Sampling};
use super::error::AiError;
use crate::db::{ProductRepository, RepositoryError};
use crate::models::Product;
use crate::services::placeholders::COMPANY_NAME;

pub const MAX_TITLE_CHARS: usize = 60;
pub const MAX_DESCRIPTION_CHARS: usize = 160;
pub const MAX_SKU_CHARS: usize = 20;
const PROMPT_PRODUCT_LIMIT: i64 = 10;

const SEO_SYSTEM: &str = "You are an SEO specialist for Momtazchem, a chemical products \
manufacturer serving Iraq and the Middle East. Answer with a single JSON object.";

const KEYWORD_SYSTEM: &str = "You are a keyword research expert for Middle East markets \
and the chemical industry. Answer with a single JSON object.";

const COPY_SYSTEM: &str = "You write accurate, professional product copy for industrial \
chemical products. Never invent certifications. Answer with a single JSON object.";

#[derive(Debug, Clone, Deserialize)]
pub struct SeoRequest {
    pub page_type: String,
    pub page_identifier: Option<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub target_keywords: Vec<String>,
    pub business_context: Option<String>,
    pub product_category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeoResult {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub h1_title: String,
    pub focus_keyword: String,
    pub meta_keywords: String,
    pub og_title: String,
    pub og_description: String,
    pub reasoning: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRequest {
    pub seed_keywords: Vec<String>,
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeywordSuggestions {
    pub primary_keywords: Vec<String>,
    pub long_tail_keywords: Vec<String>,
    pub local_keywords: Vec<String>,
    pub competitor_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductCopy {
    pub product_id: ProductId,
    pub language: Language,
    pub description: String,
    pub meta_description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkuSuggestion {
    pub product_id: ProductId,
    pub sku: String,
    pub reasoning: String,
}

/// Errors from the SEO helpers.
#[derive(Debug, thiserror::Error)]
pub enum SeoError {
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Trim and cut to at most `max` characters on a char boundary.
#[must_use]
pub fn clip(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_owned();
    }
    trimmed.chars().take(max).collect::<String>().trim_end().to_owned()
}

/// Uppercase, map separators to `-`, drop everything outside `[A-Z0-9-]`,
/// collapse dashes and cap the length.
#[must_use]
pub fn normalize_sku(raw: &str) -> String {
    let mut out = String::new();
    for c in raw.trim().chars() {
        let c = c.to_ascii_uppercase();
        let mapped = match c {
            'A'..='Z' | '0'..='9' => Some(c),
            '-' | '_' | ' ' | '/' | '.' => Some('-'),
            _ => None,
        };
        if let Some(m) = mapped
            && !(m == '-' && (out.is_empty() || out.ends_with('-')))
        {
            out.push(m);
        }
    }
    let capped: String = out.chars().take(MAX_SKU_CHARS).collect();
    capped.trim_end_matches('-').to_owned()
}

fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn list_field(value: &Value, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn language_context(language: Language) -> &'static str {
    match language {
        Language::En => "English for international markets",
        Language::Ar => "Arabic for Middle Eastern and Arab markets",
        Language::Ku => "Kurdish for Kurdish-speaking regions",
        Language::Tr => "Turkish for Turkish-speaking markets",
    }
}

/// Build the generation prompt. `products` is context for product and
/// category pages.
#[must_use]
pub fn seo_prompt(request: &SeoRequest, products: &[Product]) -> String {
    let mut prompt = format!(
        "Generate SEO content for the {COMPANY_NAME} website.\n\nPage type: {}\n",
        request.page_type
    );
    if let Some(id) = &request.page_identifier {
        prompt.push_str(&format!("Page identifier: {id}\n"));
    }
    prompt.push_str(&format!("Language: {}\n", language_context(request.language)));
    if !request.target_keywords.is_empty() {
        prompt.push_str(&format!(
            "Target keywords: {}\n",
            request.target_keywords.join(", ")
        ));
    }
    if let Some(category) = &request.product_category {
        prompt.push_str(&format!("Product category: {category}\n"));
    }
    if let Some(context) = &request.business_context {
        prompt.push_str(&format!("Business context: {context}\n"));
    }
    if !products.is_empty() {
        let list: Vec<String> = products
            .iter()
            .map(|p| {
                format!(
                    "{} - {}",
                    p.name,
                    p.description.as_deref().unwrap_or("Chemical product")
                )
            })
            .collect();
        prompt.push_str(&format!("Available products: {}\n", list.join("; ")));
    }
    prompt.push_str(
        "\nReturn JSON with: title (50-60 chars), description (150-160 chars), \
keywords (5-10 strings), h1_title, focus_keyword, meta_keywords (comma-separated), \
og_title, og_description, reasoning, suggestions (strings).",
    );
    prompt
}

/// Turn model output into a result, filling gaps from the request and
/// enforcing length limits.
#[must_use]
pub fn seo_result(value: &Value, request: &SeoRequest) -> SeoResult {
    let title = str_field(value, &["title"])
        .unwrap_or_else(|| format!("{} - {COMPANY_NAME}", request.page_type));
    let description = str_field(value, &["description"])
        .unwrap_or_else(|| format!("Professional chemical solutions from {COMPANY_NAME}"));

    let title = clip(&title, MAX_TITLE_CHARS);
    let description = clip(&description, MAX_DESCRIPTION_CHARS);

    SeoResult {
        keywords: list_field(value, &["keywords"]),
        h1_title: str_field(value, &["h1_title", "h1Title"]).unwrap_or_else(|| title.clone()),
        focus_keyword: str_field(value, &["focus_keyword", "focusKeyword"])
            .or_else(|| request.target_keywords.first().cloned())
            .unwrap_or_default(),
        meta_keywords: str_field(value, &["meta_keywords", "metaKeywords"]).unwrap_or_default(),
        og_title: clip(
            &str_field(value, &["og_title", "ogTitle"]).unwrap_or_else(|| title.clone()),
            MAX_TITLE_CHARS,
        ),
        og_description: clip(
            &str_field(value, &["og_description", "ogDescription"])
                .unwrap_or_else(|| description.clone()),
            MAX_DESCRIPTION_CHARS,
        ),
        reasoning: str_field(value, &["reasoning"])
            .unwrap_or_else(|| "Generated from SEO best practices".to_owned()),
        suggestions: list_field(value, &["suggestions"]),
        title,
        description,
    }
}

#[must_use]
pub fn keyword_suggestions(value: &Value) -> KeywordSuggestions {
    KeywordSuggestions {
        primary_keywords: list_field(value, &["primary_keywords", "primaryKeywords"]),
        long_tail_keywords: list_field(value, &["long_tail_keywords", "longTailKeywords"]),
        local_keywords: list_field(value, &["local_keywords", "localKeywords"]),
        competitor_keywords: list_field(value, &["competitor_keywords", "competitorKeywords"]),
    }
}

/// AI-assisted SEO operations.
pub struct SeoService<'a> {
    pool: &'a PgPool,
    client: &'a AiClient,
}

impl<'a> SeoService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, client: &'a AiClient) -> Self {
        Self { pool, client }
    }

    /// Generate page metadata.
    ///
    /// # Errors
    ///
    /// Returns `SeoError::Ai` if the provider fails after retries.
    pub async fn generate(&self, request: &SeoRequest) -> Result<SeoResult, SeoError> {
        let products = if matches!(request.page_type.as_str(), "product" | "category") {
            ProductRepository::new(self.pool)
                .sample_for_category(request.product_category.as_deref(), PROMPT_PRODUCT_LIMIT)
                .await?
        } else {
            Vec::new()
        };

        let value = self
            .client
            .complete_json(SEO_SYSTEM, &seo_prompt(request, &products), Sampling::default())
            .await?;
        Ok(seo_result(&value, request))
    }

    /// Suggest keyword groups from seeds.
    ///
    /// # Errors
    ///
    /// Returns `SeoError::Ai` if the provider fails after retries.
    pub async fn keywords(&self, request: &KeywordRequest) -> Result<KeywordSuggestions, SeoError> {
        let prompt = format!(
            "Seed keywords: {}\nLanguage: {}\nIndustry: chemical products\n\n\
Return JSON with arrays primary_keywords, long_tail_keywords, local_keywords \
(Iraq and Middle East specific) and competitor_keywords.",
            request.seed_keywords.join(", "),
            language_context(request.language),
        );
        let value = self
            .client
            .complete_json(
                KEYWORD_SYSTEM,
                &prompt,
                Sampling {
                    temperature: 0.6,
                    ..Sampling::default()
                },
            )
            .await?;
        Ok(keyword_suggestions(&value))
    }

    /// Write a storefront description for a product.
    ///
    /// # Errors
    ///
    /// Returns `SeoError::Repository(NotFound)` for unknown products.
    pub async fn product_description(
        &self,
        product_id: ProductId,
        language: Language,
    ) -> Result<ProductCopy, SeoError> {
        let product = self.product(product_id).await?;
        let prompt = format!(
            "Product: {}\nCategory: {}\nCurrent description: {}\nFlammable: {}\n\
Language: {}\n\nReturn JSON with description (2-3 paragraphs) and \
meta_description (max 160 chars).",
            product.name,
            product.category,
            product.description.as_deref().unwrap_or("none"),
            product.is_flammable,
            language_context(language),
        );
        let value = self
            .client
            .complete_json(COPY_SYSTEM, &prompt, Sampling::default())
            .await?;

        let description = str_field(&value, &["description"])
            .ok_or_else(|| AiError::Parse("missing description".to_owned()))?;
        let meta = str_field(&value, &["meta_description", "metaDescription"])
            .unwrap_or_else(|| description.clone());
        Ok(ProductCopy {
            product_id,
            language,
            meta_description: clip(&meta, MAX_DESCRIPTION_CHARS),
            description,
        })
    }

    /// Suggest a SKU for a product.
    ///
    /// # Errors
    ///
    /// Returns `SeoError::Ai` with a parse error when the suggestion is empty
    /// after normalisation.
    pub async fn suggest_sku(&self, product_id: ProductId) -> Result<SkuSuggestion, SeoError> {
        let product = self.product(product_id).await?;
        let prompt = format!(
            "Product: {}\nCategory: {}\nCurrent SKU: {}\n\nSuggest a SKU of at most \
{MAX_SKU_CHARS} characters using only A-Z, 0-9 and '-'. Return JSON with sku and reasoning.",
            product.name, product.category, product.sku,
        );
        let value = self
            .client
            .complete_json(
                COPY_SYSTEM,
                &prompt,
                Sampling {
                    temperature: 0.3,
                    max_tokens: 300,
                },
            )
            .await?;

        let sku = normalize_sku(&str_field(&value, &["sku"]).unwrap_or_default());
        if sku.is_empty() {
            return Err(AiError::Parse("model returned no usable SKU".to_owned()).into());
        }
        Ok(SkuSuggestion {
            product_id,
            sku,
            reasoning: str_field(&value, &["reasoning"]).unwrap_or_default(),
        })
    }

    async fn product(&self, id: ProductId) -> Result<Product, SeoError> {
        ProductRepository::new(self.pool)
            .get_by_id(id)
            .await?
            .ok_or(SeoError::Repository(RepositoryError::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> SeoRequest {
        SeoRequest {
            page_type: "category".to_owned(),
            page_identifier: Some("fuel-additives".to_owned()),
            language: Language::Ar,
            target_keywords: vec!["fuel additive".to_owned(), "octane booster".to_owned()],
            business_context: None,
            product_category: Some("fuel-additives".to_owned()),
        }
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        let arabic = "م".repeat(70);
        assert_eq!(clip(&arabic, MAX_TITLE_CHARS).chars().count(), 60);
        assert_eq!(clip("  short  ", 60), "short");
    }

    #[test]
    fn test_seo_result_clips_and_fills_defaults() {
        let value = json!({
            "title": "x".repeat(80),
            "description": "y".repeat(200),
            "keywords": ["fuel", 3, " additive "],
        });
        let result = seo_result(&value, &request());
        assert_eq!(result.title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(result.description.chars().count(), MAX_DESCRIPTION_CHARS);
        assert_eq!(result.keywords, vec!["fuel", "additive"]);
        assert_eq!(result.focus_keyword, "fuel additive");
        assert_eq!(result.h1_title, result.title);
        assert_eq!(result.og_description, result.description);
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn test_seo_result_defaults_when_empty() {
        let result = seo_result(&json!({}), &request());
        assert_eq!(result.title, "category - Momtazchem");
        assert!(result.description.contains("Momtazchem"));
    }

    #[test]
    fn test_seo_result_accepts_camel_case() {
        let value = json!({"h1Title": "Fuel Additives in Iraq", "focusKeyword": "octane"});
        let result = seo_result(&value, &request());
        assert_eq!(result.h1_title, "Fuel Additives in Iraq");
        assert_eq!(result.focus_keyword, "octane");
    }

    #[test]
    fn test_keyword_suggestions_missing_arrays_are_empty() {
        let value = json!({"primaryKeywords": ["paint thinner"], "local_keywords": ["Erbil thinner"]});
        let kw = keyword_suggestions(&value);
        assert_eq!(kw.primary_keywords, vec!["paint thinner"]);
        assert_eq!(kw.local_keywords, vec!["Erbil thinner"]);
        assert!(kw.long_tail_keywords.is_empty());
        assert!(kw.competitor_keywords.is_empty());
    }

    #[test]
    fn test_normalize_sku() {
        assert_eq!(normalize_sku("mc fuel_additive 500ml"), "MC-FUEL-ADDITIVE-500");
        assert_eq!(normalize_sku("--ab//cd--"), "AB-CD");
        assert_eq!(normalize_sku("ثینر"), "");
        assert!(normalize_sku(&"A".repeat(40)).len() <= MAX_SKU_CHARS);
    }

    #[test]
    fn test_prompt_mentions_context() {
        let prompt = seo_prompt(&request(), &[]);
        assert!(prompt.contains("Page type: category"));
        assert!(prompt.contains("octane booster"));
        assert!(prompt.contains("Arabic"));
        assert!(!prompt.contains("Available products"));
    }
}
