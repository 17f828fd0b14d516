//! SMS gateway client (Infobip, Twilio or a custom JSON endpoint).
//!
//! Provider choice, sender number and endpoint come from `sms_settings`;
//! credentials come from the environment. Every attempt is logged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;

use momtazchem_core::SmsTemplateId;

use super::placeholders;
use crate::config::SmsCredentials;
use crate::db::{RepositoryError, SmsRepository};
use crate::models::messaging::{SmsProvider, SmsSettings};

const INFOBIP_DEFAULT_BASE: &str = "https://api.infobip.com";
const TWILIO_BASE: &str = "https://api.twilio.com/2010-04-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// `system_usage` keys the platform sends on its own.
pub mod usage {
    pub const DELIVERY_CODE: &str = "delivery_code";
    pub const ORDER_CONFIRMATION: &str = "order_confirmation";
    pub const ORDER_STATUS: &str = "order_status";
}

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("SMS sending is disabled")]
    Disabled,

    #[error("SMS gateway credentials are not configured")]
    NotConfigured,

    #[error("invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Normalise a phone number to E.164. Local Iraqi mobile numbers
/// (`07xx xxx xxxx`) get the `+964` prefix.
///
/// # Errors
///
/// Returns `SmsError::InvalidPhone` for anything that is not 8-15 digits.
pub fn normalize_phone(raw: &str) -> Result<String, SmsError> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    let has_junk = trimmed
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')')));
    if has_junk {
        return Err(SmsError::InvalidPhone(raw.to_owned()));
    }

    let international = if trimmed.starts_with('+') {
        digits
    } else if let Some(rest) = digits.strip_prefix("00") {
        rest.to_owned()
    } else if digits.len() == 11
        && let Some(rest) = digits.strip_prefix('0')
    {
        format!("964{rest}")
    } else {
        digits
    };

    if (8..=15).contains(&international.len()) {
        Ok(format!("+{international}"))
    } else {
        Err(SmsError::InvalidPhone(raw.to_owned()))
    }
}

/// SMS sender.
#[derive(Clone)]
pub struct SmsService {
    inner: Arc<SmsServiceInner>,
}

struct SmsServiceInner {
    client: reqwest::Client,
    credentials: Option<SmsCredentials>,
}

impl SmsService {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(credentials: Option<SmsCredentials>) -> Result<Self, SmsError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            inner: Arc::new(SmsServiceInner {
                client,
                credentials,
            }),
        })
    }

    /// Whether gateway credentials were supplied by the environment.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.inner.credentials.is_some()
    }

    /// Send a raw message.
    ///
    /// # Errors
    ///
    /// Returns `SmsError::Disabled` when SMS is switched off,
    /// `NotConfigured` without credentials, and gateway errors otherwise.
    #[tracing::instrument(skip(self, pool, message))]
    pub async fn send(
        &self,
        pool: &PgPool,
        phone: &str,
        message: &str,
        template_id: Option<SmsTemplateId>,
    ) -> Result<(), SmsError> {
        let repo = SmsRepository::new(pool);
        let settings = repo.settings().await?;
        if !settings.is_enabled {
            return Err(SmsError::Disabled);
        }
        let credentials = self
            .inner
            .credentials
            .as_ref()
            .ok_or(SmsError::NotConfigured)?;
        let phone = normalize_phone(phone)?;

        let result = self.dispatch(&settings, credentials, &phone, message).await;

        let error = result.as_ref().err().map(ToString::to_string);
        if let Err(e) = repo
            .log_send(&phone, message, &settings.provider, template_id, error.as_deref())
            .await
        {
            tracing::warn!(error = %e, "Failed to write SMS log");
        }

        match &result {
            Ok(()) => tracing::info!(provider = %settings.provider, "SMS sent"),
            Err(e) => tracing::warn!(provider = %settings.provider, error = %e, "SMS send failed"),
        }
        result
    }

    /// Send using the template registered for a `system_usage` key, or
    /// `fallback` when no active template exists.
    ///
    /// # Errors
    ///
    /// See [`Self::send`].
    pub async fn send_for_usage(
        &self,
        pool: &PgPool,
        usage_key: &str,
        phone: &str,
        variables: &HashMap<String, String>,
        fallback: &str,
    ) -> Result<(), SmsError> {
        let template = SmsRepository::new(pool).template_for_usage(usage_key).await?;
        let (content, template_id) = template
            .as_ref()
            .map_or((fallback, None), |t| (t.content.as_str(), Some(t.id)));
        let message = placeholders::render(content, variables, Utc::now());
        self.send(pool, phone, &message, template_id).await
    }

    /// Text the recipient their hand-over code.
    ///
    /// # Errors
    ///
    /// See [`Self::send`].
    pub async fn send_delivery_code(
        &self,
        pool: &PgPool,
        phone: &str,
        order_number: &str,
        code: &str,
    ) -> Result<(), SmsError> {
        let variables = HashMap::from([
            ("order_number".to_owned(), order_number.to_owned()),
            ("delivery_code".to_owned(), code.to_owned()),
        ]);
        self.send_for_usage(
            pool,
            usage::DELIVERY_CODE,
            phone,
            &variables,
            "{{company_name}}: delivery code for order {{order_number}} is {{delivery_code}}",
        )
        .await
    }

    async fn dispatch(
        &self,
        settings: &SmsSettings,
        credentials: &SmsCredentials,
        phone: &str,
        message: &str,
    ) -> Result<(), SmsError> {
        let provider: SmsProvider = settings
            .provider
            .parse()
            .map_err(|_| SmsError::NotConfigured)?;
        let sender = settings.sender_number.as_deref().unwrap_or("Momtazchem");
        let client = &self.inner.client;

        let request = match provider {
            SmsProvider::Infobip => {
                let base = settings
                    .api_endpoint
                    .as_deref()
                    .unwrap_or(INFOBIP_DEFAULT_BASE)
                    .trim_end_matches('/');
                client
                    .post(format!("{base}/sms/2/text/advanced"))
                    .header(
                        "Authorization",
                        format!("App {}", credentials.api_key.expose_secret()),
                    )
                    .json(&json!({
                        "messages": [{
                            "destinations": [{ "to": phone.trim_start_matches('+') }],
                            "from": sender,
                            "text": message,
                        }]
                    }))
            }
            SmsProvider::Twilio => {
                let sid = credentials.api_key.expose_secret();
                let token = credentials
                    .api_secret
                    .as_ref()
                    .ok_or(SmsError::NotConfigured)?;
                client
                    .post(format!("{TWILIO_BASE}/Accounts/{sid}/Messages.json"))
                    .basic_auth(sid, Some(token.expose_secret()))
                    .form(&[("To", phone), ("From", sender), ("Body", message)])
            }
            SmsProvider::Custom => {
                let endpoint = settings
                    .api_endpoint
                    .as_deref()
                    .ok_or(SmsError::NotConfigured)?;
                client
                    .post(endpoint)
                    .bearer_auth(credentials.api_key.expose_secret())
                    .json(&json!({ "to": phone, "from": sender, "message": message }))
            }
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SmsError::Gateway {
            status: status.as_u16(),
            message: body.chars().take(300).collect(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_local_iraqi_mobile() {
        assert_eq!(normalize_phone("0750 123 4567").unwrap(), "+9647501234567");
        assert_eq!(normalize_phone("07501234567").unwrap(), "+9647501234567");
    }

    #[test]
    fn test_normalize_international_forms() {
        assert_eq!(normalize_phone("+964 750-123-4567").unwrap(), "+9647501234567");
        assert_eq!(normalize_phone("009647501234567").unwrap(), "+9647501234567");
        assert_eq!(normalize_phone("(964) 7501234567").unwrap(), "+9647501234567");
    }

    #[test]
    fn test_normalize_rejects_invalid() {
        assert!(matches!(normalize_phone("12345"), Err(SmsError::InvalidPhone(_))));
        assert!(matches!(
            normalize_phone("0750-CALL-ME"),
            Err(SmsError::InvalidPhone(_))
        ));
        assert!(normalize_phone("+1234567890123456").is_err());
    }

    #[test]
    fn test_service_builds_without_credentials() {
        assert!(SmsService::new(None).is_ok());
    }
}
