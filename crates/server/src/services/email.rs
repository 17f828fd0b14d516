//! Transactional email over SMTP.
//!
//! Each email category (orders, support, ...) can carry its own SMTP account
//! and recipient list in the database. Categories without one fall back to
//! the `SMTP_*` environment mailer. Every attempt is written to `email_logs`.

use std::collections::HashMap;
use std::time::Duration;

use askama::Template;
use chrono::Utc;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use momtazchem_core::{EmailCategoryId, EmailTemplateId, Language, OrderStatus};

use super::placeholders::{self, COMPANY_NAME};
use crate::config::EmailConfig;
use crate::db::email_settings::EmailLogEntry;
use crate::db::{EmailSettingsRepository, RepositoryError};
use crate::models::messaging::SmtpCredentials;

const SMTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Category used for customer order notifications.
pub const ORDERS_CATEGORY: &str = "orders";

/// Categories created by `init-categories` and `mc-cli seed defaults`.
pub const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("admin", "Administration", "System and account notices"),
    ("fuel-additives", "Fuel Additives", "Fuel additive product inquiries"),
    ("water-treatment", "Water Treatment", "Water treatment product inquiries"),
    ("paint-thinner", "Paint & Thinner", "Paint and thinner product inquiries"),
    (
        "agricultural-fertilizers",
        "Agricultural Fertilizers",
        "Fertilizer product inquiries",
    ),
    ("orders", "Orders", "Order confirmations and status updates"),
    ("notifications", "Notifications", "General customer notifications"),
    ("support", "Support", "Customer support correspondence"),
];

/// HTML order status notification.
#[derive(Template)]
#[template(path = "email/order_status.html")]
struct OrderStatusHtml<'a> {
    company_name: &'a str,
    customer_name: &'a str,
    order_number: &'a str,
    status_label: &'a str,
    note: Option<&'a str>,
    tracking_url: &'a str,
    lang: &'a str,
    dir: &'a str,
}

/// Plain text order status notification.
#[derive(Template)]
#[template(path = "email/order_status.txt")]
struct OrderStatusText<'a> {
    company_name: &'a str,
    customer_name: &'a str,
    order_number: &'a str,
    status_label: &'a str,
    note: Option<&'a str>,
    tracking_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// No SMTP account, recipient or template is available.
    #[error("email not configured: {0}")]
    NotConfigured(String),

    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("SMTP server did not accept the connection")]
    ConnectionRefused,

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Well-known SMTP settings for a mailbox domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSettings {
    pub provider: &'static str,
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

const KNOWN_PROVIDERS: &[(&str, &[&str], &str)] = &[
    ("Gmail", &["gmail.com", "googlemail.com"], "smtp.gmail.com"),
    (
        "Outlook/Hotmail",
        &["outlook.com", "hotmail.com", "live.com"],
        "smtp-mail.outlook.com",
    ),
    ("Yahoo Mail", &["yahoo.com", "yahoo.co.uk", "ymail.com"], "smtp.mail.yahoo.com"),
    ("Zoho Mail", &["zoho.com", "zohomail.com"], "smtp.zoho.com"),
    ("Yandex", &["yandex.com", "yandex.ru"], "smtp.yandex.com"),
];

/// Suggest SMTP settings from an address's domain. Unknown domains get
/// `mail.{domain}` on the submission port.
#[must_use]
pub fn detect_provider(email: &str) -> Option<ProviderSettings> {
    let domain = email.trim().rsplit_once('@')?.1.to_ascii_lowercase();
    if domain.is_empty() || !domain.contains('.') {
        return None;
    }

    let settings = KNOWN_PROVIDERS
        .iter()
        .find(|(_, domains, _)| domains.contains(&domain.as_str()))
        .map_or_else(
            || ProviderSettings {
                provider: "Custom",
                host: format!("mail.{domain}"),
                port: 587,
                secure: false,
            },
            |(name, _, host)| ProviderSettings {
                provider: name,
                host: (*host).to_owned(),
                port: 587,
                secure: false,
            },
        );
    Some(settings)
}

/// One message to deliver. Empty `to` means "the category's recipients".
#[derive(Debug, Clone, Default)]
pub struct OutgoingEmail<'a> {
    pub to: Vec<String>,
    pub subject: &'a str,
    pub html: &'a str,
    pub text: Option<&'a str>,
    pub template_id: Option<EmailTemplateId>,
}

/// Order status notification details.
#[derive(Debug, Clone)]
pub struct StatusNotice<'a> {
    pub to: &'a str,
    pub customer_name: &'a str,
    pub order_number: &'a str,
    pub status: OrderStatus,
    pub note: Option<&'a str>,
    pub language: Language,
}

struct Sender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    category_id: Option<EmailCategoryId>,
}

#[derive(Clone)]
struct FallbackMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    fallback: Option<FallbackMailer>,
    base_url: String,
}

impl EmailService {
    /// Create the service. `config` is the environment fallback mailer.
    ///
    /// # Errors
    ///
    /// Returns error if the fallback relay or sender address is invalid.
    pub fn new(config: Option<&EmailConfig>, base_url: &str) -> Result<Self, EmailError> {
        let fallback = config
            .map(|config| -> Result<FallbackMailer, EmailError> {
                let credentials = Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.expose_secret().to_owned(),
                );
                let transport =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                        .port(config.smtp_port)
                        .credentials(credentials)
                        .timeout(Some(SMTP_TIMEOUT))
                        .build();
                let from = config
                    .from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(config.from_address.clone()))?;
                Ok(FallbackMailer { transport, from })
            })
            .transpose()?;

        Ok(Self {
            fallback,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Check a category's SMTP account and record the result.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::NotConfigured` when the category has no active
    /// SMTP settings. Connection failures are recorded and returned.
    #[tracing::instrument(skip(self, pool))]
    pub async fn test_smtp(
        &self,
        pool: &PgPool,
        category_id: EmailCategoryId,
    ) -> Result<(), EmailError> {
        let repo = EmailSettingsRepository::new(pool);
        let creds = repo
            .smtp_credentials(category_id)
            .await?
            .ok_or_else(|| EmailError::NotConfigured(format!("category {category_id}")))?;

        let result = match transport_for(&creds) {
            Ok(transport) => match transport.test_connection().await {
                Ok(true) => Ok(()),
                Ok(false) => Err(EmailError::ConnectionRefused),
                Err(e) => Err(EmailError::Smtp(e)),
            },
            Err(e) => Err(e),
        };

        repo.record_smtp_test(category_id, result.is_ok()).await?;
        match &result {
            Ok(()) => tracing::info!(host = %creds.host, "SMTP test succeeded"),
            Err(e) => tracing::warn!(host = %creds.host, error = %e, "SMTP test failed"),
        }
        result
    }

    /// Send through a category's mailer.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::NotConfigured` if neither the category nor the
    /// environment provides SMTP, or no recipient is known.
    #[tracing::instrument(skip(self, pool, email), fields(subject = %email.subject))]
    pub async fn send(
        &self,
        pool: &PgPool,
        category_key: &str,
        email: OutgoingEmail<'_>,
    ) -> Result<(), EmailError> {
        let repo = EmailSettingsRepository::new(pool);
        let sender = self.sender(&repo, category_key).await?;

        let mut to = email.to.clone();
        let mut cc = Vec::new();
        let mut bcc = Vec::new();
        if to.is_empty() {
            let Some(category_id) = sender.category_id else {
                return Err(EmailError::NotConfigured(format!(
                    "no recipients for {category_key}"
                )));
            };
            for r in repo.recipients(category_id).await? {
                match r.recipient_type.as_str() {
                    "cc" => cc.push(r.email),
                    "bcc" => bcc.push(r.email),
                    _ => to.push(r.email),
                }
            }
        }
        if to.is_empty() {
            return Err(EmailError::NotConfigured(format!(
                "no recipients for {category_key}"
            )));
        }

        let result = deliver(&sender, &to, &cc, &bcc, &email).await;

        let to_joined = to.join(", ");
        let error = result.as_ref().err().map(ToString::to_string);
        let entry = EmailLogEntry {
            category_id: sender.category_id,
            template_id: email.template_id,
            to_email: &to_joined,
            subject: email.subject,
            error: error.as_deref(),
        };
        if let Err(e) = repo.log_send(&entry).await {
            tracing::warn!(error = %e, "Failed to write email log");
        }

        match &result {
            Ok(()) => tracing::info!(to = %to_joined, "Email sent successfully"),
            Err(e) => tracing::warn!(to = %to_joined, error = %e, "Email send failed"),
        }
        result
    }

    /// Render a stored template (by key and language, falling back to
    /// English) and send it.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::NotConfigured` if the template does not exist.
    pub async fn send_template(
        &self,
        pool: &PgPool,
        category_key: &str,
        template_key: &str,
        language: Language,
        to: Vec<String>,
        variables: &HashMap<String, String>,
    ) -> Result<(), EmailError> {
        let repo = EmailSettingsRepository::new(pool);
        let template = repo
            .find_template(template_key, language)
            .await?
            .ok_or_else(|| EmailError::NotConfigured(format!("template {template_key}")))?;

        let now = Utc::now();
        let subject = placeholders::render(&template.subject, variables, now);
        let html = placeholders::render_html(&template.body_html, variables, now);
        let text = template
            .body_text
            .as_deref()
            .map(|t| placeholders::render(t, variables, now));

        self.send(
            pool,
            category_key,
            OutgoingEmail {
                to,
                subject: &subject,
                html: &html,
                text: text.as_deref(),
                template_id: Some(template.id),
            },
        )
        .await?;

        repo.record_template_use(template.id).await?;
        Ok(())
    }

    /// Tell a customer their order moved.
    ///
    /// # Errors
    ///
    /// Returns error if rendering or sending fails.
    pub async fn send_order_status(
        &self,
        pool: &PgPool,
        notice: &StatusNotice<'_>,
    ) -> Result<(), EmailError> {
        let tracking_url = format!(
            "{}/api/shop/orders/track/{}",
            self.base_url,
            urlencoding::encode(notice.order_number)
        );
        let status_label = notice.status.label();

        let html = OrderStatusHtml {
            company_name: COMPANY_NAME,
            customer_name: notice.customer_name,
            order_number: notice.order_number,
            status_label,
            note: notice.note,
            tracking_url: &tracking_url,
            lang: notice.language.code(),
            dir: notice.language.dir(),
        }
        .render()?;
        let text = OrderStatusText {
            company_name: COMPANY_NAME,
            customer_name: notice.customer_name,
            order_number: notice.order_number,
            status_label,
            note: notice.note,
            tracking_url: &tracking_url,
        }
        .render()?;
        let subject = format!("Order {}: {status_label}", notice.order_number);

        self.send(
            pool,
            ORDERS_CATEGORY,
            OutgoingEmail {
                to: vec![notice.to.to_owned()],
                subject: &subject,
                html: &html,
                text: Some(&text),
                template_id: None,
            },
        )
        .await
    }

    async fn sender(
        &self,
        repo: &EmailSettingsRepository<'_>,
        category_key: &str,
    ) -> Result<Sender, EmailError> {
        let category = repo
            .category_by_key(category_key)
            .await?
            .filter(|c| c.is_active);

        if let Some(category) = &category
            && let Some(creds) = repo.smtp_credentials(category.id).await?
        {
            let from = Mailbox::new(
                Some(creds.from_name.clone()),
                creds
                    .from_email
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(creds.from_email.clone()))?,
            );
            return Ok(Sender {
                transport: transport_for(&creds)?,
                from,
                category_id: Some(category.id),
            });
        }

        let fallback = self
            .fallback
            .clone()
            .ok_or_else(|| EmailError::NotConfigured(format!("no SMTP for {category_key}")))?;
        Ok(Sender {
            transport: fallback.transport,
            from: fallback.from,
            category_id: category.map(|c| c.id),
        })
    }
}

/// Build a transport for stored settings. `secure` means implicit TLS
/// (usually port 465); otherwise STARTTLS.
fn transport_for(creds: &SmtpCredentials) -> Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
    let port = u16::try_from(creds.port)
        .map_err(|_| EmailError::NotConfigured(format!("invalid SMTP port {}", creds.port)))?;
    let builder = if creds.secure {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&creds.host)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&creds.host)?
    };
    Ok(builder
        .port(port)
        .credentials(Credentials::new(creds.username.clone(), creds.password.clone()))
        .timeout(Some(SMTP_TIMEOUT))
        .build())
}

fn mailbox(address: &str) -> Result<Mailbox, EmailError> {
    address
        .trim()
        .parse()
        .map_err(|_| EmailError::InvalidAddress(address.to_owned()))
}

async fn deliver(
    sender: &Sender,
    to: &[String],
    cc: &[String],
    bcc: &[String],
    email: &OutgoingEmail<'_>,
) -> Result<(), EmailError> {
    let mut builder = Message::builder()
        .from(sender.from.clone())
        .subject(email.subject);
    for address in to {
        builder = builder.to(mailbox(address)?);
    }
    for address in cc {
        builder = builder.cc(mailbox(address)?);
    }
    for address in bcc {
        builder = builder.bcc(mailbox(address)?);
    }

    let html = SinglePart::builder()
        .header(ContentType::TEXT_HTML)
        .body(email.html.to_owned());
    let message = match email.text {
        Some(text) => builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text.to_owned()),
                )
                .singlepart(html),
        )?,
        None => builder.singlepart(html)?,
    };

    sender.transport.send(message).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_known_providers() {
        let gmail = detect_provider("sales@Gmail.com").unwrap();
        assert_eq!(gmail.host, "smtp.gmail.com");
        assert_eq!(gmail.port, 587);
        assert!(!gmail.secure);

        assert_eq!(
            detect_provider("x@hotmail.com").unwrap().host,
            "smtp-mail.outlook.com"
        );
        assert_eq!(detect_provider("x@zoho.com").unwrap().provider, "Zoho Mail");
        assert_eq!(detect_provider("x@yandex.ru").unwrap().host, "smtp.yandex.com");
    }

    #[test]
    fn test_detect_custom_domain() {
        let custom = detect_provider("info@momtazchem.com").unwrap();
        assert_eq!(custom.provider, "Custom");
        assert_eq!(custom.host, "mail.momtazchem.com");
        assert_eq!(custom.port, 587);
    }

    #[test]
    fn test_detect_rejects_garbage() {
        assert!(detect_provider("no-at-sign").is_none());
        assert!(detect_provider("user@localhost").is_none());
    }

    #[test]
    fn test_default_categories_are_slugs() {
        assert_eq!(DEFAULT_CATEGORIES.len(), 8);
        for (key, _, _) in DEFAULT_CATEGORIES {
            assert!(crate::models::logistics::is_slug(key), "{key}");
        }
    }

    #[test]
    fn test_order_status_templates_render() {
        let html = OrderStatusHtml {
            company_name: COMPANY_NAME,
            customer_name: "Dilan",
            order_number: "MOM2500011",
            status_label: OrderStatus::WarehousePending.label(),
            note: Some("Payment confirmed"),
            tracking_url: "https://api.momtazchem.com/api/shop/orders/track/MOM2500011",
            lang: "ar",
            dir: "rtl",
        }
        .render()
        .unwrap();
        assert!(html.contains("dir=\"rtl\""));
        assert!(html.contains("MOM2500011"));
        assert!(html.contains("Payment confirmed"));

        let text = OrderStatusText {
            company_name: COMPANY_NAME,
            customer_name: "Dilan <script>",
            order_number: "MOM2500011",
            status_label: "Cancelled",
            note: None,
            tracking_url: "https://example.test/t",
        }
        .render()
        .unwrap();
        assert!(text.contains("Cancelled"));
    }

    #[test]
    fn test_transport_rejects_bad_port() {
        let creds = SmtpCredentials {
            host: "smtp.zoho.com".into(),
            port: 70_000,
            secure: false,
            username: "u".into(),
            password: "p".into(),
            from_name: "Momtazchem".into(),
            from_email: "orders@momtazchem.com".into(),
        };
        assert!(matches!(transport_for(&creds), Err(EmailError::NotConfigured(_))));
    }
}
