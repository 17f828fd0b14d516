//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::cache::ContentCache;
use crate::config::ServerConfig;
use crate::services::ai::{AiClient, AiError};
use crate::services::documents::{DocumentError, PdfRenderer};
use crate::services::email::{EmailError, EmailService};
use crate::services::notifications::Notifier;
use crate::services::sms::{SmsError, SmsService};
use crate::services::storage::{StorageError, StorageService};

/// Failure building one of the outbound clients.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("email: {0}")]
    Email(#[from] EmailError),
    #[error("sms: {0}")]
    Sms(#[from] SmsError),
    #[error("ai: {0}")]
    Ai(#[from] AiError),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("documents: {0}")]
    Documents(#[from] DocumentError),
}

/// Application state shared across all handlers.
///
/// Cheap to clone; every resource lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    email: EmailService,
    sms: SmsService,
    ai: Option<AiClient>,
    storage: StorageService,
    pdf: PdfRenderer,
    cache: ContentCache,
    notifier: Notifier,
}

impl AppState {
    /// Build the state and its outbound clients.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP or SMTP client cannot be constructed.
    pub fn new(config: ServerConfig, pool: PgPool) -> Result<Self, StateError> {
        let email = EmailService::new(config.email.as_ref(), &config.base_url)?;
        let sms = SmsService::new(config.sms.clone())?;
        let ai = config.ai.as_ref().map(AiClient::new).transpose()?;
        let storage = StorageService::new(config.s3.clone())?;
        let pdf = PdfRenderer::new(config.pdf_renderer_url.clone())?;

        let notifier = Notifier::new(pool.clone(), email.clone(), sms.clone());

        if ai.is_none() {
            tracing::info!("No AI provider key configured; SEO generation disabled");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                email,
                sms,
                ai,
                storage,
                pdf,
                cache: ContentCache::new(),
                notifier,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    #[must_use]
    pub fn sms(&self) -> &SmsService {
        &self.inner.sms
    }

    /// The AI client, if a provider key is configured.
    #[must_use]
    pub fn ai(&self) -> Option<&AiClient> {
        self.inner.ai.as_ref()
    }

    #[must_use]
    pub fn storage(&self) -> &StorageService {
        &self.inner.storage
    }

    #[must_use]
    pub fn pdf(&self) -> &PdfRenderer {
        &self.inner.pdf
    }

    #[must_use]
    pub fn cache(&self) -> &ContentCache {
        &self.inner.cache
    }

    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }
}
