//! Footer, SEO, storage and preference types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use momtazchem_core::{Department, Language, SeoSettingId};

use super::{clean_optional, require_text};

const fn default_true() -> bool {
    true
}

// =============================================================================
// Footer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FooterLink {
    pub name: String,
    pub href: String,
}

impl FooterLink {
    /// Relative paths and absolute http(s) URLs are allowed.
    #[must_use]
    pub fn has_safe_href(&self) -> bool {
        let href = self.href.trim();
        if href.starts_with('/') && !href.starts_with("//") {
            return true;
        }
        url::Url::parse(href).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FooterSettings {
    pub id: i32,
    pub language: String,
    pub company_name: String,
    pub company_description: Option<String>,
    pub company_address: Option<String>,
    pub company_phone: Option<String>,
    pub company_email: Option<String>,
    pub company_website: Option<String>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
    pub twitter_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub youtube_url: Option<String>,
    pub whatsapp_url: Option<String>,
    pub telegram_url: Option<String>,
    pub product_links: Json<Vec<FooterLink>>,
    pub company_links: Json<Vec<FooterLink>>,
    pub support_links: Json<Vec<FooterLink>>,
    pub legal_links: Json<Vec<FooterLink>>,
    pub copyright_text: Option<String>,
    pub show_social_media: bool,
    pub show_company_info: bool,
    pub show_links: bool,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FooterSettingsInput {
    pub company_name: String,
    pub company_description: Option<String>,
    pub company_address: Option<String>,
    pub company_phone: Option<String>,
    pub company_email: Option<String>,
    pub company_website: Option<String>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
    pub twitter_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub youtube_url: Option<String>,
    pub whatsapp_url: Option<String>,
    pub telegram_url: Option<String>,
    #[serde(default)]
    pub product_links: Vec<FooterLink>,
    #[serde(default)]
    pub company_links: Vec<FooterLink>,
    #[serde(default)]
    pub support_links: Vec<FooterLink>,
    #[serde(default)]
    pub legal_links: Vec<FooterLink>,
    pub copyright_text: Option<String>,
    #[serde(default = "default_true")]
    pub show_social_media: bool,
    #[serde(default = "default_true")]
    pub show_company_info: bool,
    #[serde(default = "default_true")]
    pub show_links: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl FooterSettingsInput {
    /// # Errors
    ///
    /// Returns a message for a blank company name, an unnamed link or an
    /// unsafe href.
    pub fn validate(mut self) -> Result<Self, String> {
        require_text(&self.company_name, "company_name")?;
        for link in self
            .product_links
            .iter()
            .chain(&self.company_links)
            .chain(&self.support_links)
            .chain(&self.legal_links)
        {
            require_text(&link.name, "link name")?;
            if !link.has_safe_href() {
                return Err(format!("link {} has an unsupported href", link.name));
            }
        }
        for url in [
            &mut self.company_website,
            &mut self.facebook_url,
            &mut self.instagram_url,
            &mut self.twitter_url,
            &mut self.linkedin_url,
            &mut self.youtube_url,
            &mut self.whatsapp_url,
            &mut self.telegram_url,
        ] {
            *url = clean_optional(url.take());
        }
        self.company_description = clean_optional(self.company_description);
        self.company_address = clean_optional(self.company_address);
        self.company_phone = clean_optional(self.company_phone);
        self.company_email = clean_optional(self.company_email);
        self.copyright_text = clean_optional(self.copyright_text);
        Ok(self)
    }
}

// =============================================================================
// SEO
// =============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SeoSetting {
    pub id: SeoSettingId,
    pub page_type: String,
    pub page_identifier: Option<String>,
    pub language: String,
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub canonical_url: Option<String>,
    pub robots: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeoSettingInput {
    pub page_type: String,
    pub page_identifier: Option<String>,
    #[serde(default)]
    pub language: Language,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub canonical_url: Option<String>,
    pub robots: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl SeoSettingInput {
    /// # Errors
    ///
    /// Returns a message for blank page type, title or description.
    pub fn validate(mut self) -> Result<Self, String> {
        require_text(&self.page_type, "page_type")?;
        require_text(&self.title, "title")?;
        require_text(&self.description, "description")?;
        self.page_type = self.page_type.trim().to_owned();
        self.page_identifier = clean_optional(self.page_identifier);
        self.keywords = self
            .keywords
            .into_iter()
            .map(|k| k.trim().to_owned())
            .filter(|k| !k.is_empty())
            .collect();
        self.og_title = clean_optional(self.og_title);
        self.og_description = clean_optional(self.og_description);
        self.og_image = clean_optional(self.og_image);
        self.canonical_url = clean_optional(self.canonical_url);
        self.robots = clean_optional(self.robots);
        Ok(self)
    }
}

// =============================================================================
// File storage
// =============================================================================

/// Non-secret S3 settings. Credentials come from the environment.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct S3Settings {
    pub region: String,
    pub bucket_name: String,
    pub endpoint: Option<String>,
    pub public_url: Option<String>,
    pub path_prefix: String,
    pub is_active: bool,
    pub test_status: String,
    pub last_tested: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3SettingsInput {
    pub region: String,
    pub bucket_name: String,
    pub endpoint: Option<String>,
    pub public_url: Option<String>,
    pub path_prefix: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl S3SettingsInput {
    /// # Errors
    ///
    /// Returns a message for a blank region/bucket or malformed URLs.
    pub fn validate(mut self) -> Result<Self, String> {
        require_text(&self.region, "region")?;
        require_text(&self.bucket_name, "bucket_name")?;
        self.region = self.region.trim().to_owned();
        self.bucket_name = self.bucket_name.trim().to_owned();
        self.endpoint = clean_optional(self.endpoint);
        self.public_url = clean_optional(self.public_url);
        for url in [&self.endpoint, &self.public_url].into_iter().flatten() {
            url::Url::parse(url).map_err(|e| format!("invalid URL {url}: {e}"))?;
        }
        self.path_prefix = clean_optional(self.path_prefix)
            .map(|p| p.trim_matches('/').to_owned())
            .filter(|p| !p.is_empty());
        Ok(self)
    }
}

// =============================================================================
// Admin preferences
// =============================================================================

/// Settings key for the auto-refresh preferences.
pub const REFRESH_SETTINGS_KEY: &str = "refresh.intervals";
pub const MIN_REFRESH_SECONDS: u32 = 10;
pub const MAX_REFRESH_SECONDS: u32 = 3600;

/// How often the back-office queues poll for changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPreferences {
    pub enabled: bool,
    pub interval_seconds: u32,
    #[serde(default)]
    pub per_department: BTreeMap<Department, u32>,
}

impl Default for RefreshPreferences {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 30,
            per_department: BTreeMap::new(),
        }
    }
}

impl RefreshPreferences {
    /// # Errors
    ///
    /// Returns a message when any interval falls outside 10..=3600 seconds.
    pub fn validate(&self) -> Result<(), String> {
        let range = MIN_REFRESH_SECONDS..=MAX_REFRESH_SECONDS;
        if !range.contains(&self.interval_seconds)
            || self.per_department.values().any(|s| !range.contains(s))
        {
            return Err(format!(
                "intervals must be between {MIN_REFRESH_SECONDS} and {MAX_REFRESH_SECONDS} seconds"
            ));
        }
        Ok(())
    }

    /// Effective interval for a department queue.
    #[must_use]
    pub fn interval_for(&self, department: Department) -> u32 {
        self.per_department
            .get(&department)
            .copied()
            .unwrap_or(self.interval_seconds)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn link(href: &str) -> FooterLink {
        FooterLink {
            name: "Products".into(),
            href: href.into(),
        }
    }

    #[test]
    fn test_footer_href_safety() {
        assert!(link("/shop").has_safe_href());
        assert!(link("https://momtazchem.com/about").has_safe_href());
        assert!(!link("javascript:alert(1)").has_safe_href());
        assert!(!link("//evil.example").has_safe_href());
        assert!(!link("ftp://files.example.com").has_safe_href());
    }

    #[test]
    fn test_footer_input_rejects_unsafe_link() {
        let input: FooterSettingsInput = serde_json::from_value(serde_json::json!({
            "company_name": "Momtazchem",
            "legal_links": [{"name": "Terms", "href": "javascript:void(0)"}]
        }))
        .unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_refresh_preferences() {
        let mut prefs = RefreshPreferences::default();
        assert!(prefs.validate().is_ok());
        assert_eq!(prefs.interval_for(Department::Warehouse), 30);

        prefs.per_department.insert(Department::Warehouse, 5);
        assert!(prefs.validate().is_err());

        prefs.per_department.insert(Department::Warehouse, 120);
        assert!(prefs.validate().is_ok());
        assert_eq!(prefs.interval_for(Department::Warehouse), 120);

        let json = serde_json::json!({
            "enabled": true,
            "interval_seconds": 60,
            "per_department": {"financial": 15}
        });
        let parsed: RefreshPreferences = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.interval_for(Department::Financial), 15);
    }

    #[test]
    fn test_s3_settings_prefix_trimmed() {
        let input: S3SettingsInput = serde_json::from_value(serde_json::json!({
            "region": "eu-central-1",
            "bucket_name": "momtazchem-files",
            "path_prefix": "/uploads/"
        }))
        .unwrap();
        assert_eq!(input.validate().unwrap().path_prefix.as_deref(), Some("uploads"));
    }
}
