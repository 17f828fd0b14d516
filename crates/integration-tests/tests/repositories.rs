//! Repository behaviour against a migrated database.
//!
//! These tests require `DATABASE_URL` pointing at a database that has had
//! `mc-cli migrate` run against it.

use momtazchem_core::AdminRole;
use momtazchem_integration_tests::{pool, unique_email};
use momtazchem_server::db::{EmailSettingsRepository, GeographyRepository};
use momtazchem_server::services::auth::{AuthError, AuthService};
use momtazchem_server::services::email::DEFAULT_CATEGORIES;

fn unique_name(prefix: &str) -> String {
    format!("{prefix} {}", uuid::Uuid::new_v4().simple())
}

// =============================================================================
// Geography
// =============================================================================

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_province_and_city_upserts_are_idempotent() {
    let pool = pool().await;
    let repo = GeographyRepository::new(&pool);
    let province = unique_name("Province");
    let city = unique_name("City");

    let first = repo
        .upsert_province(&province, "محافظة")
        .await
        .expect("Failed to upsert province");
    let second = repo
        .upsert_province(&province, "محافظة")
        .await
        .expect("Failed to upsert province");
    assert_eq!(first, second);

    let city_id = repo
        .upsert_city(first, &city, "مدينة", 120)
        .await
        .expect("Failed to upsert city");
    let updated_id = repo
        .upsert_city(first, &city, "مدينة", 135)
        .await
        .expect("Failed to upsert city");
    assert_eq!(city_id, updated_id);

    let cities = repo
        .cities(Some(first), true)
        .await
        .expect("Failed to list cities");
    assert_eq!(cities.len(), 1);
    assert_eq!(cities.first().map(|c| c.distance_from_erbil_km), Some(135));
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_find_city_matches_english_name_case_insensitively() {
    let pool = pool().await;
    let repo = GeographyRepository::new(&pool);
    let province = repo
        .upsert_province(&unique_name("Province"), "محافظة")
        .await
        .expect("Failed to upsert province");
    let city = unique_name("Lookup");
    repo.upsert_city(province, &city, "بحث", 42)
        .await
        .expect("Failed to upsert city");

    let found = repo
        .find_city(&city.to_uppercase())
        .await
        .expect("Failed to look up city");
    assert_eq!(found.map(|c| c.distance_from_erbil_km), Some(42));
}

// =============================================================================
// Email categories
// =============================================================================

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_default_categories_are_created_once() {
    let pool = pool().await;
    let repo = EmailSettingsRepository::new(&pool);

    repo.ensure_categories(DEFAULT_CATEGORIES)
        .await
        .expect("Failed to ensure categories");
    let again = repo
        .ensure_categories(DEFAULT_CATEGORIES)
        .await
        .expect("Failed to ensure categories");
    assert_eq!(again, 0);

    for (key, _, _) in DEFAULT_CATEGORIES {
        let category = repo
            .category_by_key(key)
            .await
            .expect("Failed to load category");
        assert!(category.is_some(), "missing category {key}");
    }
}

// =============================================================================
// Admin accounts
// =============================================================================

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_admin_accounts_are_unique_and_password_checked() {
    let pool = pool().await;
    let auth = AuthService::new(&pool);
    let email = unique_email("admin");

    let admin = auth
        .create_admin(&email, "Test Admin", AdminRole::Viewer, "correct horse")
        .await
        .expect("Failed to create admin");
    assert_eq!(admin.role, AdminRole::Viewer);

    let duplicate = auth
        .create_admin(&email, "Again", AdminRole::Admin, "correct horse")
        .await;
    assert!(matches!(duplicate, Err(AuthError::UserAlreadyExists)));

    let wrong = auth.login_admin(&email, "battery staple").await;
    assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

    let ok = auth
        .login_admin(&email, "correct horse")
        .await
        .expect("Failed to log in");
    assert_eq!(ok.id, admin.id);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_short_admin_password_is_rejected() {
    let pool = pool().await;
    let result = AuthService::new(&pool)
        .create_admin(&unique_email("short"), "Short", AdminRole::Admin, "abc")
        .await;
    assert!(matches!(result, Err(AuthError::WeakPassword(_))));
}
