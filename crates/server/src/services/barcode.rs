//! Allocation of company EAN-13 barcodes.
//!
//! A product code is drawn at random from 1000..=9999; after
//! [`RANDOM_ATTEMPTS`] collisions the lowest free code is taken instead.

use std::collections::HashSet;

use rand::Rng;
use sqlx::PgPool;
use thiserror::Error;

use momtazchem_core::barcode::{MAX_PRODUCT_CODE, MIN_PRODUCT_CODE};
use momtazchem_core::{Ean13, ProductId};

use crate::db::{ProductRepository, RepositoryError};
use crate::models::Product;

pub const RANDOM_ATTEMPTS: usize = 100;

#[derive(Debug, Error)]
pub enum BarcodeError {
    #[error("all product codes under the company prefix are in use")]
    Exhausted,

    #[error("product not found")]
    ProductNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Choose an unused 4-digit product code.
pub fn pick_product_code<R: Rng + ?Sized>(taken: &HashSet<u16>, rng: &mut R) -> Option<u16> {
    for _ in 0..RANDOM_ATTEMPTS {
        let code = rng.random_range(MIN_PRODUCT_CODE..=MAX_PRODUCT_CODE);
        if !taken.contains(&code) {
            return Some(code);
        }
    }
    (MIN_PRODUCT_CODE..=MAX_PRODUCT_CODE).find(|code| !taken.contains(code))
}

/// Product codes already issued, ignoring foreign or malformed barcodes.
#[must_use]
pub fn taken_codes(barcodes: &[String]) -> HashSet<u16> {
    barcodes
        .iter()
        .filter_map(|b| Ean13::parse(b).ok())
        .filter_map(|b| b.product_code())
        .collect()
}

/// Generate and store a fresh company barcode for a product.
///
/// # Errors
///
/// Returns `BarcodeError::ProductNotFound`, `Exhausted`, or a repository
/// error (including `Conflict` if a concurrent allocation won the code).
#[tracing::instrument(skip(pool))]
pub async fn allocate(pool: &PgPool, product_id: ProductId) -> Result<(Product, Ean13), BarcodeError> {
    let products = ProductRepository::new(pool);
    if products.get_by_id(product_id).await?.is_none() {
        return Err(BarcodeError::ProductNotFound);
    }

    let taken = taken_codes(&products.company_barcodes().await?);
    let code = pick_product_code(&taken, &mut rand::rng()).ok_or(BarcodeError::Exhausted)?;
    let barcode = Ean13::for_product(code).map_err(|_| BarcodeError::Exhausted)?;

    let product = products
        .set_barcode(product_id, &barcode.as_str())
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => BarcodeError::ProductNotFound,
            other => BarcodeError::Repository(other),
        })?;

    tracing::info!(product_id = %product_id, barcode = %barcode.as_str(), "Barcode allocated");
    Ok((product, barcode))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_pick_avoids_taken_codes() {
        let taken: HashSet<u16> = (1000..=5000).collect();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let code = pick_product_code(&taken, &mut rng).unwrap();
            assert!((5001..=9999).contains(&code));
        }
    }

    #[test]
    fn test_pick_falls_back_to_lowest_free() {
        let mut taken: HashSet<u16> = (MIN_PRODUCT_CODE..=MAX_PRODUCT_CODE).collect();
        taken.remove(&4321);
        taken.remove(&9000);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_product_code(&taken, &mut rng), Some(4321));
    }

    #[test]
    fn test_pick_exhausted() {
        let taken: HashSet<u16> = (MIN_PRODUCT_CODE..=MAX_PRODUCT_CODE).collect();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_product_code(&taken, &mut rng), None);
    }

    #[test]
    fn test_taken_codes_ignores_invalid() {
        let issued = Ean13::for_product(1234).unwrap().as_str();
        let codes = taken_codes(&[issued, "8469677112340".into(), "abc".into()]);
        assert_eq!(codes.len(), 1);
        assert!(codes.contains(&1234));
    }
}
