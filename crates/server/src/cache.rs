//! Read cache for public, read-heavy content.
//!
//! Footer settings (per language), active delivery methods and the public
//! VAT summary are cached for five minutes. Admin writes invalidate the
//! affected entry immediately.

use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use momtazchem_core::Language;

use crate::db::{DeliveryMethodRepository, FooterRepository, RepositoryError, VatRepository};
use crate::models::content::FooterSettings;
use crate::models::logistics::{DeliveryMethod, PublicVat};

const CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Footer(Language),
    DeliveryMethods,
    Vat,
}

#[derive(Debug, Clone)]
enum CacheValue {
    Footer(Option<Box<FooterSettings>>),
    DeliveryMethods(Vec<DeliveryMethod>),
    Vat(Option<PublicVat>),
}

/// Shared content cache.
#[derive(Clone)]
pub struct ContentCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(64)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Active footer for a language, falling back to English.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn footer(
        &self,
        pool: &PgPool,
        language: Language,
    ) -> Result<Option<FooterSettings>, RepositoryError> {
        if let Some(found) = self.footer_exact(pool, language).await? {
            return Ok(Some(found));
        }
        if language == Language::En {
            return Ok(None);
        }
        self.footer_exact(pool, Language::En).await
    }

    async fn footer_exact(
        &self,
        pool: &PgPool,
        language: Language,
    ) -> Result<Option<FooterSettings>, RepositoryError> {
        let key = CacheKey::Footer(language);
        if let Some(CacheValue::Footer(footer)) = self.cache.get(&key).await {
            return Ok(footer.map(|f| *f));
        }
        let footer = FooterRepository::new(pool).active_for(language).await?;
        self.cache
            .insert(key, CacheValue::Footer(footer.clone().map(Box::new)))
            .await;
        Ok(footer)
    }

    /// Active delivery methods in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delivery_methods(&self, pool: &PgPool) -> Result<Vec<DeliveryMethod>, RepositoryError> {
        if let Some(CacheValue::DeliveryMethods(methods)) =
            self.cache.get(&CacheKey::DeliveryMethods).await
        {
            return Ok(methods);
        }
        let methods = DeliveryMethodRepository::new(pool).list(true).await?;
        self.cache
            .insert(CacheKey::DeliveryMethods, CacheValue::DeliveryMethods(methods.clone()))
            .await;
        Ok(methods)
    }

    /// Public VAT summary, `None` when no settings row is active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn public_vat(&self, pool: &PgPool) -> Result<Option<PublicVat>, RepositoryError> {
        if let Some(CacheValue::Vat(vat)) = self.cache.get(&CacheKey::Vat).await {
            return Ok(vat);
        }
        let vat = VatRepository::new(pool)
            .active()
            .await?
            .as_ref()
            .map(PublicVat::from);
        self.cache
            .insert(CacheKey::Vat, CacheValue::Vat(vat.clone()))
            .await;
        Ok(vat)
    }

    pub async fn invalidate_footer(&self, language: Language) {
        self.cache.invalidate(&CacheKey::Footer(language)).await;
    }

    pub async fn invalidate_delivery_methods(&self) {
        self.cache.invalidate(&CacheKey::DeliveryMethods).await;
    }

    pub async fn invalidate_vat(&self) {
        self.cache.invalidate(&CacheKey::Vat).await;
    }
}
