//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `BASE_URL` - Public URL of the API (used for cookie security and links)
//! - `SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 3000)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM` -
//!   fallback mailer for categories without their own SMTP settings
//! - `AI_PROVIDER` - `openai` (default) or `deepseek`
//! - `OPENAI_API_KEY` / `DEEPSEEK_API_KEY` - key for the selected provider
//! - `AI_MODEL` - model override (default: gpt-4o / deepseek-chat)
//! - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` - S3 credentials
//! - `SMS_API_KEY`, `SMS_API_SECRET` - SMS gateway credentials
//! - `PDF_RENDERER_URL` - HTML to PDF conversion endpoint
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`,
//!   `SENTRY_TRACES_SAMPLE_RATE` - error tracking
//!
//! ## Optional (TLS)
//! - `TLS_CERT` - PEM-encoded certificate chain
//! - `TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL, e.g. `https://api.momtazchem.com`
    pub base_url: String,
    pub session_secret: SecretString,
    /// Fallback mailer (per-category SMTP rows take precedence)
    pub email: Option<EmailConfig>,
    pub ai: Option<AiConfig>,
    pub s3: Option<S3Credentials>,
    pub sms: Option<SmsCredentials>,
    pub pdf_renderer_url: Option<String>,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
    pub tls: Option<TlsConfig>,
}

/// Environment SMTP configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    /// Sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Chat-completion providers the SEO tooling can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    OpenAi,
    DeepSeek,
}

impl AiProvider {
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1/chat/completions",
            Self::DeepSeek => "https://api.deepseek.com/chat/completions",
        }
    }

    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::DeepSeek => "deepseek-chat",
        }
    }

    const fn key_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }
}

impl std::str::FromStr for AiProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "deepseek" => Ok(Self::DeepSeek),
            other => Err(ConfigError::InvalidEnvVar(
                "AI_PROVIDER".to_owned(),
                format!("expected openai or deepseek, got {other}"),
            )),
        }
    }
}

/// AI provider configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct AiConfig {
    pub provider: AiProvider,
    pub api_key: SecretString,
    pub model: String,
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

/// AWS credentials. Bucket, region and prefix live in the database.
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// SMS gateway credentials.
///
/// Infobip and custom gateways use `api_key` only; Twilio uses the key as the
/// account SID and `api_secret` as the auth token.
#[derive(Clone)]
pub struct SmsCredentials {
    pub api_key: SecretString,
    pub api_secret: Option<SecretString>,
}

impl std::fmt::Debug for SmsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsCredentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    pub cert_pem: String,
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(get_required_env("DATABASE_URL")?);
        let host = get_env_or_default("HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_owned(), e.to_string()))?;
        let port = get_env_or_default("PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_owned(), e.to_string()))?;
        let base_url = get_required_env("BASE_URL")?;
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("BASE_URL".to_owned(), e.to_string()))?;
        let session_secret = get_validated_secret("SESSION_SECRET")?;
        validate_session_secret(&session_secret, "SESSION_SECRET")?;

        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.2);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            email: EmailConfig::from_env()?,
            ai: AiConfig::from_env()?,
            s3: S3Credentials::from_env()?,
            sms: SmsCredentials::from_env(),
            pdf_renderer_url: get_optional_env("PDF_RENDERER_URL"),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls: TlsConfig::from_env()?,
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };
        let smtp_port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_owned(), e.to_string()))?;

        Ok(Some(Self {
            smtp_host,
            smtp_port,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: SecretString::from(get_required_env("SMTP_PASSWORD")?),
            from_address: get_required_env("SMTP_FROM")?,
        }))
    }
}

impl AiConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let provider: AiProvider = get_env_or_default("AI_PROVIDER", "openai").parse()?;
        let Some(key) = get_optional_env(provider.key_var()) else {
            return Ok(None);
        };
        if let Err(e) = validate_secret_strength(&key, provider.key_var()) {
            tracing::warn!("{} validation warning: {e}", provider.key_var());
        }
        Ok(Some(Self {
            provider,
            api_key: SecretString::from(key),
            model: get_env_or_default("AI_MODEL", provider.default_model()),
        }))
    }
}

impl S3Credentials {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        match (
            get_optional_env("AWS_ACCESS_KEY_ID"),
            get_optional_env("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Some(access_key_id), Some(secret)) => Ok(Some(Self {
                access_key_id,
                secret_access_key: SecretString::from(secret),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "AWS_*".to_owned(),
                "Both AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together".to_owned(),
            )),
        }
    }
}

impl SmsCredentials {
    fn from_env() -> Option<Self> {
        let api_key = get_optional_env("SMS_API_KEY")?;
        Some(Self {
            api_key: SecretString::from(api_key),
            api_secret: get_optional_env("SMS_API_SECRET").map(SecretString::from),
        })
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        match (get_optional_env("TLS_CERT"), get_optional_env("TLS_KEY")) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "TLS_*".to_owned(),
                "Both TLS_CERT and TLS_KEY must be set together".to_owned(),
            )),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_owned())
}

fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!(
                "must be at least {MIN_SESSION_SECRET_LENGTH} characters (got {})",
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject placeholders and low-entropy values.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_config() -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/momtazchem"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "https://api.momtazchem.com".to_owned(),
            session_secret: SecretString::from("x".repeat(32)),
            email: None,
            ai: None,
            s3: None,
            sms: None,
            pdf_renderer_url: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.2,
            tls: None,
        }
    }

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("Qm7$kP2!vX9@tR4#") > 3.3);
    }

    #[test]
    fn test_placeholder_secrets_rejected() {
        for value in ["your-openai-key", "changeme123", "put-your-token-here"] {
            assert!(matches!(
                validate_secret_strength(value, "TEST_VAR"),
                Err(ConfigError::InsecureSecret(_, _))
            ));
        }
    }

    #[test]
    fn test_low_entropy_secret_rejected() {
        assert!(validate_secret_strength(&"ab".repeat(20), "TEST_VAR").is_err());
        assert!(validate_secret_strength("Qm7$kP2!vX9@tR4#nL5&zC6^", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "S").is_err());
        assert!(validate_session_secret(&SecretString::from("a".repeat(32)), "S").is_ok());
    }

    #[test]
    fn test_socket_addr_and_security() {
        let config = sample_config();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert!(config.is_secure());
    }

    #[test]
    fn test_ai_provider_parsing() {
        assert_eq!("OpenAI".parse::<AiProvider>().unwrap(), AiProvider::OpenAi);
        assert_eq!("deepseek".parse::<AiProvider>().unwrap(), AiProvider::DeepSeek);
        assert!("claude".parse::<AiProvider>().is_err());
        assert_eq!(AiProvider::DeepSeek.default_model(), "deepseek-chat");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let email = EmailConfig {
            smtp_host: "smtp.zoho.com".to_owned(),
            smtp_port: 587,
            smtp_username: "orders@momtazchem.com".to_owned(),
            smtp_password: SecretString::from("very_private_smtp_pw"),
            from_address: "orders@momtazchem.com".to_owned(),
        };
        let ai = AiConfig {
            provider: AiProvider::OpenAi,
            api_key: SecretString::from("sk-live-hidden-value"),
            model: "gpt-4o".to_owned(),
        };
        let s3 = S3Credentials {
            access_key_id: "AKIAEXAMPLE".to_owned(),
            secret_access_key: SecretString::from("aws-hidden-value"),
        };

        let out = format!("{email:?} {ai:?} {s3:?}");
        assert!(out.contains("smtp.zoho.com"));
        assert!(out.contains("gpt-4o"));
        assert!(out.contains("AKIAEXAMPLE"));
        assert!(!out.contains("very_private_smtp_pw"));
        assert!(!out.contains("sk-live-hidden-value"));
        assert!(!out.contains("aws-hidden-value"));
    }
}
