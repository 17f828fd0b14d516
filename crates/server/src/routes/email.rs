//! Email configuration: categories, per-category SMTP, recipients and
//! templates.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use momtazchem_core::{EmailCategoryId, EmailTemplateId, Language};

use crate::db::EmailSettingsRepository;
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::middleware::RequireAdminAuth;
use crate::models::messaging::{
    EmailCategory, EmailCategoryDetail, EmailCategoryInput, EmailRecipient, EmailRecipientInput,
    EmailTemplate, EmailTemplateInput, SmtpSettingsInput, SmtpSettingsView,
};
use crate::services::email::{DEFAULT_CATEGORIES, ProviderSettings, detect_provider};
use crate::services::placeholders;
use crate::state::AppState;

/// Build the email settings router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/email/categories",
            get(list_categories).post(create_category),
        )
        .route("/api/admin/email/init-categories", post(init_categories))
        .route("/api/admin/email/smtp/{category_id}", post(save_smtp))
        .route("/api/admin/email/test-smtp/{category_id}", post(test_smtp))
        .route(
            "/api/admin/email/recipients/{category_id}",
            post(replace_recipients),
        )
        .route("/api/admin/detect-provider", post(detect))
        .route(
            "/api/email-templates",
            get(list_templates).post(create_template),
        )
        .route(
            "/api/email-templates/{id}",
            get(show_template)
                .put(update_template)
                .delete(delete_template),
        )
        .route("/api/email-templates/{id}/set-default", post(set_default))
        .route("/api/templates/preview", post(preview))
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplateQuery {
    pub category: Option<String>,
    pub language: Option<Language>,
}

#[derive(Debug, Deserialize)]
pub struct RecipientsRequest {
    pub recipients: Vec<EmailRecipientInput>,
}

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub template_id: EmailTemplateId,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct Preview {
    pub subject: String,
    pub body_html: String,
    pub body_text: Option<String>,
    /// Variables the template uses that the request did not supply.
    pub missing_variables: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InitResult {
    pub created: u64,
}

/// GET /api/admin/email/categories
async fn list_categories(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<EmailCategoryDetail>> {
    let categories = EmailSettingsRepository::new(state.pool())
        .list_categories()
        .await?;
    Ok(ApiResponse::ok(categories))
}

/// POST /api/admin/email/categories
async fn create_category(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Json(input): Json<EmailCategoryInput>,
) -> ApiResult<EmailCategory> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let category = EmailSettingsRepository::new(state.pool())
        .create_category(&input)
        .await?;
    Ok(ApiResponse::with_message(category, "Category created"))
}

/// POST /api/admin/email/init-categories
#[instrument(skip(state))]
async fn init_categories(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
) -> ApiResult<InitResult> {
    let created = EmailSettingsRepository::new(state.pool())
        .ensure_categories(DEFAULT_CATEGORIES)
        .await?;
    tracing::info!(created, "Default email categories ensured");
    Ok(ApiResponse::ok(InitResult { created }))
}

/// POST /api/admin/email/smtp/{category_id}
#[instrument(skip(state, input))]
async fn save_smtp(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(category_id): Path<EmailCategoryId>,
    Json(input): Json<SmtpSettingsInput>,
) -> ApiResult<SmtpSettingsView> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let view = EmailSettingsRepository::new(state.pool())
        .upsert_smtp(category_id, &input)
        .await?;
    Ok(ApiResponse::with_message(view, "SMTP settings saved"))
}

/// POST /api/admin/email/test-smtp/{category_id}
#[instrument(skip(state))]
async fn test_smtp(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(category_id): Path<EmailCategoryId>,
) -> ApiResult<()> {
    state.email().test_smtp(state.pool(), category_id).await?;
    Ok(ApiResponse::message("SMTP connection succeeded"))
}

/// POST /api/admin/email/recipients/{category_id}
async fn replace_recipients(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(category_id): Path<EmailCategoryId>,
    Json(req): Json<RecipientsRequest>,
) -> ApiResult<Vec<EmailRecipient>> {
    let recipients = req
        .recipients
        .into_iter()
        .map(EmailRecipientInput::validate)
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::BadRequest)?;
    let saved = EmailSettingsRepository::new(state.pool())
        .replace_recipients(category_id, &recipients)
        .await?;
    Ok(ApiResponse::ok(saved))
}

/// POST /api/admin/detect-provider
async fn detect(
    RequireAdminAuth(_): RequireAdminAuth,
    Json(req): Json<DetectRequest>,
) -> ApiResult<ProviderSettings> {
    let settings = detect_provider(&req.email)
        .ok_or_else(|| AppError::BadRequest(format!("cannot detect a provider for {}", req.email)))?;
    Ok(ApiResponse::ok(settings))
}

/// GET /api/email-templates
async fn list_templates(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<TemplateQuery>,
) -> ApiResult<Vec<EmailTemplate>> {
    let templates = EmailSettingsRepository::new(state.pool())
        .list_templates(query.category.as_deref(), query.language)
        .await?;
    Ok(ApiResponse::ok(templates))
}

async fn load_template(state: &AppState, id: EmailTemplateId) -> Result<EmailTemplate, AppError> {
    EmailSettingsRepository::new(state.pool())
        .get_template(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("email template {id}")))
}

/// GET /api/email-templates/{id}
async fn show_template(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<EmailTemplateId>,
) -> ApiResult<EmailTemplate> {
    Ok(ApiResponse::ok(load_template(&state, id).await?))
}

/// Fill `variables` from the content when the caller left it empty.
fn with_detected_variables(mut input: EmailTemplateInput) -> EmailTemplateInput {
    if input.variables.is_empty() {
        let mut names = placeholders::extract(&input.subject);
        for name in placeholders::extract(&input.body_html) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        input.variables = names;
    }
    input
}

/// POST /api/email-templates
#[instrument(skip(admin, state, input), fields(key = %input.template_key))]
async fn create_template(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Json(input): Json<EmailTemplateInput>,
) -> ApiResult<EmailTemplate> {
    let input = with_detected_variables(input.validate().map_err(AppError::BadRequest)?);
    let template = EmailSettingsRepository::new(state.pool())
        .create_template(&input, admin.id)
        .await?;
    Ok(ApiResponse::with_message(template, "Template created"))
}

/// PUT /api/email-templates/{id}
#[instrument(skip(state, input))]
async fn update_template(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<EmailTemplateId>,
    Json(input): Json<EmailTemplateInput>,
) -> ApiResult<EmailTemplate> {
    let input = with_detected_variables(input.validate().map_err(AppError::BadRequest)?);
    let template = EmailSettingsRepository::new(state.pool())
        .update_template(id, &input)
        .await?;
    Ok(ApiResponse::ok(template))
}

/// DELETE /api/email-templates/{id}
#[instrument(skip(state))]
async fn delete_template(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<EmailTemplateId>,
) -> ApiResult<()> {
    EmailSettingsRepository::new(state.pool())
        .delete_template(id)
        .await?;
    Ok(ApiResponse::message("Template deleted"))
}

/// POST /api/email-templates/{id}/set-default
async fn set_default(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<EmailTemplateId>,
) -> ApiResult<EmailTemplate> {
    let template = EmailSettingsRepository::new(state.pool())
        .set_default_template(id)
        .await?;
    Ok(ApiResponse::with_message(template, "Default template updated"))
}

fn render_preview(template: &EmailTemplate, variables: &HashMap<String, String>) -> Preview {
    let now = Utc::now();
    let defaults = placeholders::default_variables(now);
    let missing_variables = template
        .variables
        .iter()
        .filter(|name| !variables.contains_key(*name) && !defaults.contains_key(*name))
        .cloned()
        .collect();
    Preview {
        subject: placeholders::render(&template.subject, variables, now),
        body_html: placeholders::render_html(&template.body_html, variables, now),
        body_text: template
            .body_text
            .as_deref()
            .map(|text| placeholders::render(text, variables, now)),
        missing_variables,
    }
}

/// POST /api/templates/preview
async fn preview(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> ApiResult<Preview> {
    let template = load_template(&state, req.template_id).await?;
    Ok(ApiResponse::ok(render_preview(&template, &req.variables)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> EmailTemplate {
        let now = Utc::now();
        EmailTemplate {
            id: EmailTemplateId::new(1),
            template_key: "order_status".into(),
            name: "Order status".into(),
            category: "orders".into(),
            subject: "Order {{order_number}}".into(),
            body_html: "<p>Hello {{customer_name}}, from {{company_name}}</p>".into(),
            body_text: None,
            variables: vec![
                "order_number".into(),
                "customer_name".into(),
                "company_name".into(),
            ],
            language: "en".into(),
            is_default: true,
            is_active: true,
            usage_count: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_preview_reports_missing_variables() {
        let vars = HashMap::from([("order_number".to_owned(), "M2501001".to_owned())]);
        let preview = render_preview(&template(), &vars);
        assert_eq!(preview.subject, "Order M2501001");
        assert!(preview.body_html.contains("{{customer_name}}"));
        assert!(preview.body_html.contains("Momtazchem"));
        assert_eq!(preview.missing_variables, vec!["customer_name".to_owned()]);
    }

    #[test]
    fn test_preview_escapes_html_body_only() {
        let vars = HashMap::from([
            ("order_number".to_owned(), "M2501001 <b>".to_owned()),
            ("customer_name".to_owned(), "<img src=x onerror=alert(1)>".to_owned()),
        ]);
        let preview = render_preview(&template(), &vars);
        assert_eq!(preview.subject, "Order M2501001 <b>");
        assert!(preview.body_html.starts_with("<p>Hello &#60;img"));
        assert!(!preview.body_html.contains("<img"));
    }

    #[test]
    fn test_variables_detected_when_omitted() {
        let input = EmailTemplateInput {
            template_key: "welcome".into(),
            name: "Welcome".into(),
            category: None,
            subject: "Hi {{name}}".into(),
            body_html: "{{name}} joined {{company_name}}".into(),
            body_text: None,
            variables: Vec::new(),
            language: Language::En,
            is_active: true,
        };
        let input = with_detected_variables(input);
        assert_eq!(input.variables, vec!["name".to_owned(), "company_name".to_owned()]);
    }
}
