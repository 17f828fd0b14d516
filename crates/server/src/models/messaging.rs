//! Email and SMS configuration types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use momtazchem_core::{EmailCategoryId, EmailTemplateId, Language, SmsCategoryId, SmsTemplateId};

use super::{clean_optional, require_text};

const fn default_true() -> bool {
    true
}

// =============================================================================
// Email
// =============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EmailCategory {
    pub id: EmailCategoryId,
    pub category_key: String,
    pub category_name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailCategoryInput {
    pub category_key: String,
    pub category_name: String,
    pub description: Option<String>,
}

impl EmailCategoryInput {
    /// # Errors
    ///
    /// Returns a message for a non-slug key or a blank name.
    pub fn validate(mut self) -> Result<Self, String> {
        self.category_key = self.category_key.trim().to_owned();
        if !super::logistics::is_slug(&self.category_key) {
            return Err("category_key must be a lowercase slug".to_owned());
        }
        require_text(&self.category_name, "category_name")?;
        self.category_name = self.category_name.trim().to_owned();
        self.description = clean_optional(self.description);
        Ok(self)
    }
}

/// SMTP settings as returned to clients. The password never leaves the server.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SmtpSettingsView {
    pub id: i32,
    pub category_id: EmailCategoryId,
    pub host: String,
    pub port: i32,
    pub secure: bool,
    pub username: String,
    pub from_name: String,
    pub from_email: String,
    pub is_active: bool,
    pub test_status: String,
    pub last_tested: Option<DateTime<Utc>>,
}

/// SMTP settings including the stored password, for the mailer only.
#[derive(Clone, sqlx::FromRow)]
pub struct SmtpCredentials {
    pub host: String,
    pub port: i32,
    pub secure: bool,
    pub username: String,
    pub password: String,
    pub from_name: String,
    pub from_email: String,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_email", &self.from_email)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettingsInput {
    pub host: String,
    pub port: i32,
    #[serde(default)]
    pub secure: bool,
    pub username: String,
    /// Omit to keep the stored password.
    pub password: Option<String>,
    pub from_name: String,
    pub from_email: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl SmtpSettingsInput {
    /// # Errors
    ///
    /// Returns a message for blank host/username, an out-of-range port or
    /// a malformed sender address.
    pub fn validate(mut self) -> Result<Self, String> {
        require_text(&self.host, "host")?;
        require_text(&self.username, "username")?;
        require_text(&self.from_name, "from_name")?;
        if !(1..=65535).contains(&self.port) {
            return Err("port must be between 1 and 65535".to_owned());
        }
        let from = momtazchem_core::Email::parse(&self.from_email).map_err(|e| e.to_string())?;
        self.from_email = from.into_inner();
        self.host = self.host.trim().to_owned();
        self.username = self.username.trim().to_owned();
        self.password = self.password.filter(|p| !p.is_empty());
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientType {
    To,
    Cc,
    Bcc,
}

impl RecipientType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::To => "to",
            Self::Cc => "cc",
            Self::Bcc => "bcc",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EmailRecipient {
    pub id: i32,
    pub category_id: EmailCategoryId,
    pub email: String,
    pub name: Option<String>,
    pub recipient_type: String,
    pub is_primary: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailRecipientInput {
    pub email: String,
    pub name: Option<String>,
    pub recipient_type: RecipientType,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl EmailRecipientInput {
    /// # Errors
    ///
    /// Returns a message for a malformed address.
    pub fn validate(mut self) -> Result<Self, String> {
        self.email = momtazchem_core::Email::parse(&self.email)
            .map_err(|e| format!("{}: {e}", self.email.trim()))?
            .into_inner();
        self.name = clean_optional(self.name);
        Ok(self)
    }
}

/// Category with its SMTP settings and recipients.
#[derive(Debug, Clone, Serialize)]
pub struct EmailCategoryDetail {
    #[serde(flatten)]
    pub category: EmailCategory,
    pub smtp: Option<SmtpSettingsView>,
    pub recipients: Vec<EmailRecipient>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EmailTemplate {
    pub id: EmailTemplateId,
    pub template_key: String,
    pub name: String,
    pub category: String,
    pub subject: String,
    pub body_html: String,
    pub body_text: Option<String>,
    pub variables: Vec<String>,
    pub language: String,
    pub is_default: bool,
    pub is_active: bool,
    pub usage_count: i32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailTemplateInput {
    pub template_key: String,
    pub name: String,
    pub category: Option<String>,
    pub subject: String,
    pub body_html: String,
    pub body_text: Option<String>,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl EmailTemplateInput {
    /// # Errors
    ///
    /// Returns a message when key, name, subject or body is blank.
    pub fn validate(mut self) -> Result<Self, String> {
        require_text(&self.template_key, "template_key")?;
        require_text(&self.name, "name")?;
        require_text(&self.subject, "subject")?;
        require_text(&self.body_html, "body_html")?;
        self.template_key = self.template_key.trim().to_owned();
        self.category = clean_optional(self.category);
        self.body_text = clean_optional(self.body_text);
        Ok(self)
    }
}

// =============================================================================
// SMS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmsProvider {
    Infobip,
    Twilio,
    Custom,
}

impl SmsProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Infobip => "infobip",
            Self::Twilio => "twilio",
            Self::Custom => "custom",
        }
    }
}

impl std::str::FromStr for SmsProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "infobip" => Ok(Self::Infobip),
            "twilio" => Ok(Self::Twilio),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown SMS provider: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SmsSettings {
    pub is_enabled: bool,
    pub provider: String,
    pub sender_number: Option<String>,
    pub api_endpoint: Option<String>,
    pub code_length: i32,
    pub code_expiry_minutes: i32,
    pub max_attempts: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsSettingsInput {
    pub is_enabled: bool,
    pub provider: SmsProvider,
    pub sender_number: Option<String>,
    pub api_endpoint: Option<String>,
    pub code_length: i32,
    pub code_expiry_minutes: i32,
    pub max_attempts: Option<i32>,
}

impl SmsSettingsInput {
    /// # Errors
    ///
    /// Returns a message for out-of-range code settings or a custom provider
    /// without an endpoint.
    pub fn validate(mut self) -> Result<Self, String> {
        if !(4..=8).contains(&self.code_length) {
            return Err("code_length must be between 4 and 8".to_owned());
        }
        if !(1..=60).contains(&self.code_expiry_minutes) {
            return Err("code_expiry_minutes must be between 1 and 60".to_owned());
        }
        self.sender_number = clean_optional(self.sender_number);
        self.api_endpoint = clean_optional(self.api_endpoint);
        if let Some(endpoint) = &self.api_endpoint {
            let url = url::Url::parse(endpoint).map_err(|e| format!("invalid api_endpoint: {e}"))?;
            if url.scheme() != "https" && url.scheme() != "http" {
                return Err("api_endpoint must be http(s)".to_owned());
            }
        } else if self.provider == SmsProvider::Custom {
            return Err("custom provider requires api_endpoint".to_owned());
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SmsTemplateCategory {
    pub id: SmsCategoryId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsCategoryInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl SmsCategoryInput {
    /// # Errors
    ///
    /// Returns a message for a blank name.
    pub fn validate(mut self) -> Result<Self, String> {
        require_text(&self.name, "name")?;
        self.name = self.name.trim().to_owned();
        self.description = clean_optional(self.description);
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SmsTemplate {
    pub id: SmsTemplateId,
    pub category_id: SmsCategoryId,
    pub template_number: i32,
    pub name: String,
    pub content: String,
    pub variables: Vec<String>,
    pub system_usage: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub usage_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsTemplateInput {
    pub category_id: SmsCategoryId,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub variables: Vec<String>,
    pub system_usage: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl SmsTemplateInput {
    /// # Errors
    ///
    /// Returns a message for a blank name or content.
    pub fn validate(mut self) -> Result<Self, String> {
        require_text(&self.name, "name")?;
        require_text(&self.content, "content")?;
        self.name = self.name.trim().to_owned();
        self.system_usage = clean_optional(self.system_usage);
        Ok(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_smtp_input_validation() {
        let input: SmtpSettingsInput = serde_json::from_value(serde_json::json!({
            "host": "smtppro.zoho.eu",
            "port": 465,
            "secure": true,
            "username": "info@momtazchem.com",
            "password": "",
            "from_name": "Momtazchem",
            "from_email": "Info@MomtazChem.com"
        }))
        .unwrap();
        let input = input.validate().unwrap();
        assert_eq!(input.from_email, "info@momtazchem.com");
        assert!(input.password.is_none());

        let input: SmtpSettingsInput = serde_json::from_value(serde_json::json!({
            "host": "mail.example.com", "port": 0, "username": "u",
            "from_name": "n", "from_email": "a@example.com"
        }))
        .unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_smtp_credentials_debug_redacts_password() {
        let creds = SmtpCredentials {
            host: "smtp.gmail.com".into(),
            port: 587,
            secure: false,
            username: "orders@momtazchem.com".into(),
            password: "app-specific-pass".into(),
            from_name: "Orders".into(),
            from_email: "orders@momtazchem.com".into(),
        };
        let out = format!("{creds:?}");
        assert!(out.contains("smtp.gmail.com"));
        assert!(!out.contains("app-specific-pass"));
    }

    #[test]
    fn test_sms_settings_bounds() {
        let input: SmsSettingsInput = serde_json::from_value(serde_json::json!({
            "is_enabled": true, "provider": "custom",
            "code_length": 6, "code_expiry_minutes": 5
        }))
        .unwrap();
        assert_eq!(
            input.validate().unwrap_err(),
            "custom provider requires api_endpoint"
        );

        let input: SmsSettingsInput = serde_json::from_value(serde_json::json!({
            "is_enabled": true, "provider": "infobip",
            "code_length": 9, "code_expiry_minutes": 5
        }))
        .unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_recipient_type_parsing() {
        let input: EmailRecipientInput = serde_json::from_value(serde_json::json!({
            "email": "sales@momtazchem.com", "recipient_type": "bcc"
        }))
        .unwrap();
        assert_eq!(input.recipient_type, RecipientType::Bcc);
        assert!(input.is_active);
    }
}
