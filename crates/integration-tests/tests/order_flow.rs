//! Checkout through delivery against a running server.
//!
//! These tests require:
//! - A migrated database with defaults seeded (`mc-cli seed defaults`)
//! - The server running (`cargo run -p momtazchem-server`)
//! - A super admin in `MOMTAZCHEM_ADMIN_EMAIL` / `MOMTAZCHEM_ADMIN_PASSWORD`

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use momtazchem_integration_tests::{admin_client, base_url, session_client, unique_email};

/// POST `body` and return the envelope, asserting `expected`.
async fn post(client: &Client, path: &str, body: &Value, expected: StatusCode) -> Value {
    let resp = client
        .post(format!("{}{path}", base_url()))
        .json(body)
        .send()
        .await
        .expect("Request failed");
    let status = resp.status();
    let envelope: Value = resp.json().await.unwrap_or(Value::Null);
    assert_eq!(status, expected, "POST {path}: {envelope}");
    envelope
}

async fn get_json(client: &Client, path: &str, expected: StatusCode) -> Value {
    let resp = client
        .get(format!("{}{path}", base_url()))
        .send()
        .await
        .expect("Request failed");
    let status = resp.status();
    let envelope: Value = resp.json().await.unwrap_or(Value::Null);
    assert_eq!(status, expected, "GET {path}: {envelope}");
    envelope
}

/// Create an in-stock product and return its id.
async fn create_product(admin: &Client) -> i64 {
    let sku = format!("IT-{}", uuid::Uuid::new_v4().simple());
    let created = post(
        admin,
        "/api/admin/products",
        &json!({
            "name": "Fuel additive FA-200",
            "category": "fuel-additives",
            "price": "25000",
            "sku": sku,
            "stock_quantity": 100,
            "gross_weight_kg": "12.5",
            "quantity_discounts": [{ "min_qty": 10, "discount": "0.05" }]
        }),
        StatusCode::OK,
    )
    .await;
    created["data"]["id"].as_i64().expect("product id")
}

/// Register and log in a customer.
async fn register_customer() -> Client {
    let client = session_client();
    post(
        &client,
        "/api/customers/register",
        &json!({
            "email": unique_email("customer"),
            "first_name": "Ali",
            "last_name": "Hassan",
            "phone": "07701234567",
            "city": "Erbil",
            "password": "long enough password"
        }),
        StatusCode::OK,
    )
    .await;
    client
}

fn order_request(product_id: i64) -> Value {
    json!({
        "items": [{ "product_id": product_id, "quantity": 2 }],
        "delivery_method": "personal_pickup",
        "payment_method": "cash_on_delivery",
        "shipping_address": {
            "recipient_name": "Ali Hassan",
            "phone": "07701234567",
            "province": "Erbil",
            "city": "Erbil",
            "address": "100m Street, Building 4"
        }
    })
}

#[tokio::test]
#[ignore = "Requires a running server and database"]
async fn test_order_moves_through_every_department() {
    let admin = admin_client().await;
    let product_id = create_product(&admin).await;
    let customer = register_customer().await;

    // Quote matches the placed order
    let quote = post(
        &customer,
        "/api/shop/checkout/quote",
        &json!({
            "items": [{ "product_id": product_id, "quantity": 2 }],
            "delivery_method": "personal_pickup"
        }),
        StatusCode::OK,
    )
    .await;
    let placed = post(
        &customer,
        "/api/shop/orders",
        &order_request(product_id),
        StatusCode::OK,
    )
    .await;
    assert_eq!(placed["data"]["status"], json!("pending_payment"));
    assert_eq!(
        placed["data"]["quote"]["total_amount"],
        quote["data"]["total_amount"]
    );

    let order_id = placed["data"]["order"]["id"].as_i64().expect("order id");
    let order_number = placed["data"]["order"]["order_number"]
        .as_str()
        .expect("order number")
        .to_owned();

    let mine = get_json(&customer, "/api/customers/orders", StatusCode::OK).await;
    assert!(
        mine["data"]
            .as_array()
            .is_some_and(|orders| orders.iter().any(|o| o["id"] == json!(order_id)))
    );

    // Financial
    let queue = get_json(&admin, "/api/financial/orders", StatusCode::OK).await;
    assert!(queue["success"].as_bool().unwrap_or(false));
    post(&admin, &format!("/api/financial/orders/{order_id}/review"), &json!({}), StatusCode::OK).await;
    let approved = post(
        &admin,
        &format!("/api/financial/orders/{order_id}/approve"),
        &json!({ "notes": "Cash on delivery confirmed by phone" }),
        StatusCode::OK,
    )
    .await;
    assert_eq!(approved["data"]["current_status"], json!("warehouse_pending"));

    // Warehouse
    post(&admin, &format!("/api/warehouse/orders/{order_id}/process"), &json!({}), StatusCode::OK).await;
    post(&admin, &format!("/api/warehouse/orders/{order_id}/approve"), &json!({}), StatusCode::OK).await;

    // Logistics
    post(
        &admin,
        &format!("/api/logistics/orders/{order_id}/assign"),
        &json!({ "driver_name": "Karwan", "driver_phone": "07501112233" }),
        StatusCode::OK,
    )
    .await;
    let dispatched = post(
        &admin,
        &format!("/api/logistics/orders/{order_id}/dispatch"),
        &json!({ "carrier_name": "Momtazchem fleet" }),
        StatusCode::OK,
    )
    .await;
    let code = dispatched["data"]["delivery_code"]
        .as_str()
        .expect("delivery code")
        .to_owned();

    // A wrong code is refused and leaves the order dispatched
    post(
        &admin,
        &format!("/api/logistics/orders/{order_id}/verify-delivery"),
        &json!({ "code": if code == "000000" { "111111" } else { "000000" }, "verified_by": "Karwan" }),
        StatusCode::BAD_REQUEST,
    )
    .await;

    post(
        &admin,
        &format!("/api/logistics/orders/{order_id}/verify-delivery"),
        &json!({ "code": code, "verified_by": "Karwan" }),
        StatusCode::OK,
    )
    .await;
    post(&admin, &format!("/api/logistics/orders/{order_id}/complete"), &json!({}), StatusCode::OK).await;

    let tracking = get_json(
        &customer,
        &format!("/api/shop/orders/track/{order_number}"),
        StatusCode::OK,
    )
    .await;
    assert_eq!(tracking["data"]["status"], json!("completed"));

    let history = get_json(&admin, &format!("/api/orders/{order_id}/history"), StatusCode::OK).await;
    assert!(history["data"].as_array().is_some_and(|h| h.len() >= 8));

    // Completed orders cannot be cancelled
    post(
        &admin,
        &format!("/api/admin/orders/{order_id}/cancel"),
        &json!({ "reason": "too late" }),
        StatusCode::CONFLICT,
    )
    .await;
}

#[tokio::test]
#[ignore = "Requires a running server and database"]
async fn test_invoice_is_private_to_its_customer() {
    let admin = admin_client().await;
    let product_id = create_product(&admin).await;
    let owner = register_customer().await;
    let stranger = register_customer().await;

    let placed = post(&owner, "/api/shop/orders", &order_request(product_id), StatusCode::OK).await;
    let order_id = placed["data"]["order"]["id"].as_i64().expect("order id");
    let path = format!("{}/api/documents/invoices/{order_id}", base_url());

    let resp = owner.get(&path).send().await.expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let html = resp.text().await.expect("Failed to read invoice");
    assert!(html.contains(placed["data"]["order"]["order_number"].as_str().unwrap_or("?")));

    let resp = stranger.get(&path).send().await.expect("Request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = admin.get(&path).send().await.expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires a running server and database"]
async fn test_cancelling_pending_order() {
    let admin = admin_client().await;
    let product_id = create_product(&admin).await;
    let customer = register_customer().await;

    let placed = post(&customer, "/api/shop/orders", &order_request(product_id), StatusCode::OK).await;
    let order_id = placed["data"]["order"]["id"].as_i64().expect("order id");

    let cancelled = post(
        &admin,
        &format!("/api/admin/orders/{order_id}/cancel"),
        &json!({ "reason": "Customer changed their mind" }),
        StatusCode::OK,
    )
    .await;
    assert_eq!(cancelled["data"]["current_status"], json!("cancelled"));

    // Cancelled orders leave the financial queue
    post(
        &admin,
        &format!("/api/financial/orders/{order_id}/review"),
        &json!({}),
        StatusCode::CONFLICT,
    )
    .await;
}
