//! In-process tests of the full router and middleware stack.
//!
//! The pool is lazy and never connected: every request here is answered
//! before a query would run.

use axum::http::StatusCode;
use serde_json::json;

use momtazchem_core::Ean13;
use momtazchem_integration_tests::{TEST_CLIENT_IP, get, json_request, offline_app, send};

// =============================================================================
// Middleware
// =============================================================================

#[tokio::test]
async fn test_health_sets_security_headers() {
    let app = offline_app();
    let resp = send(&app, get("/health")).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.text, "ok");
    assert_eq!(resp.header("x-frame-options"), Some("DENY"));
    assert_eq!(resp.header("x-content-type-options"), Some("nosniff"));
    assert_eq!(resp.header("cache-control"), Some("no-store, max-age=0"));
}

#[tokio::test]
async fn test_request_id_is_generated_or_echoed() {
    let app = offline_app();

    let generated = send(&app, get("/health")).await;
    let id = generated.header("x-request-id").expect("missing x-request-id");
    assert!(uuid::Uuid::parse_str(id).is_ok(), "expected a UUID, got {id:?}");

    let request = axum::http::Request::get("/health")
        .header("x-request-id", "scanner-7-0042")
        .body(axum::body::Body::empty())
        .expect("Invalid request");
    let echoed = send(&app, request).await;
    assert_eq!(echoed.header("x-request-id"), Some("scanner-7-0042"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = offline_app();
    let resp = send(&app, get("/api/does-not-exist")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Barcodes
// =============================================================================

#[tokio::test]
async fn test_barcode_validate_reports_components() {
    let app = offline_app();
    let code = Ean13::for_product(1234).expect("valid product code").as_str();

    let resp = send(&app, get(&format!("/api/barcode/validate/{code}"))).await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["valid"], json!(true));
    assert_eq!(body["data"]["is_company_code"], json!(true));
    assert_eq!(body["data"]["components"]["country_prefix"], json!("846"));
    assert_eq!(body["data"]["components"]["company_code"], json!("96771"));
    assert_eq!(body["data"]["components"]["product_code"], json!("1234"));
}

#[tokio::test]
async fn test_barcode_validate_explains_bad_checksum() {
    let app = offline_app();
    let resp = send(&app, get("/api/barcode/validate/8469677112340")).await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["data"]["valid"], json!(false));
    assert!(
        body["data"]["error"]
            .as_str()
            .is_some_and(|e| e.contains("check digit"))
    );
}

#[tokio::test]
async fn test_barcode_svg_is_publicly_cacheable() {
    let app = offline_app();
    let resp = send(&app, get("/api/barcode/8469677112348/svg")).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header("content-type"), Some("image/svg+xml"));
    assert_eq!(resp.header("cache-control"), Some("public, max-age=86400"));
    assert!(resp.text.starts_with("<svg"));
}

#[tokio::test]
async fn test_barcode_svg_rejects_invalid_code() {
    let app = offline_app();
    let resp = send(&app, get("/api/barcode/12345/svg")).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["success"], json!(false));
}

// =============================================================================
// Authentication guards
// =============================================================================

#[tokio::test]
async fn test_back_office_requires_admin_session() {
    let app = offline_app();
    let guarded = [
        "/api/admin/me",
        "/api/admin/users",
        "/api/financial/orders",
        "/api/warehouse/orders",
        "/api/logistics/orders",
        "/api/crm/customers",
        "/api/crm/dashboard",
        "/api/admin/aws-s3-settings",
        "/api/admin/sms/settings",
        "/api/admin/email/categories",
        "/api/documents/reports/orders",
        "/api/admin/preferences/refresh",
    ];

    for uri in guarded {
        let resp = send(&app, get(uri)).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(resp.json()["success"], json!(false), "{uri}");
    }
}

#[tokio::test]
async fn test_customer_routes_require_login() {
    let app = offline_app();

    let orders = send(&app, get("/api/customers/orders")).await;
    assert_eq!(orders.status, StatusCode::UNAUTHORIZED);

    let invoice = send(&app, get("/api/documents/invoices/1")).await;
    assert_eq!(invoice.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_workflow_actions_require_admin_session() {
    let app = offline_app();
    let actions = [
        "/api/financial/orders/1/approve",
        "/api/warehouse/orders/1/process",
        "/api/logistics/orders/1/dispatch",
        "/api/admin/orders/1/cancel",
        "/api/logistics/calculate-vehicle",
    ];

    for uri in actions {
        let resp = send(&app, json_request("POST", uri, &json!({}))).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn test_admin_login_rejects_malformed_email() {
    let app = offline_app();
    let resp = send(
        &app,
        json_request(
            "POST",
            "/api/admin/login",
            &json!({ "email": "not-an-email", "password": "whatever1" }),
        ),
    )
    .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["success"], json!(false));
}

#[tokio::test]
async fn test_login_rate_limit_applies_per_client() {
    let app = offline_app();
    let body = json!({ "email": "not-an-email", "password": "whatever1" });

    let mut statuses = Vec::new();
    for _ in 0..7 {
        let resp = send(&app, json_request("POST", "/api/customers/login", &body)).await;
        statuses.push(resp.status);
    }
    assert!(statuses.iter().take(5).all(|s| *s == StatusCode::BAD_REQUEST));
    assert_eq!(statuses.last(), Some(&StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_login_without_json_body_is_rejected() {
    let app = offline_app();
    let request = axum::http::Request::post("/api/admin/login")
        .header("x-forwarded-for", TEST_CLIENT_IP)
        .body(axum::body::Body::from("email=a"))
        .expect("Invalid request");
    let resp = send(&app, request).await;
    assert!(resp.status.is_client_error());
}
