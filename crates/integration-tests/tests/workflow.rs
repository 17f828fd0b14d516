//! Order workflow against a migrated database, driven through the service
//! layer.
//!
//! These tests require `DATABASE_URL` pointing at a database that has had
//! `mc-cli migrate` run against it.

use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;

use momtazchem_core::{AdminRole, AdminUserId, OrderId, OrderStatus, PaymentMethod, ProductId};
use momtazchem_integration_tests::{pool, unique_email};
use momtazchem_server::db::orders::NewReceipt;
use momtazchem_server::db::{DeliveryMethodRepository, OrderManagementRepository, ProductRepository};
use momtazchem_server::models::ProductInput;
use momtazchem_server::models::logistics::DeliveryMethodInput;
use momtazchem_server::services::auth::AuthService;
use momtazchem_server::services::order_flow::{
    AssignRequest, Buyer, DispatchRequest, OrderFlowError, OrderFlowService, PlaceOrderRequest,
    VerifyDeliveryRequest,
};

/// A free delivery method no other test uses.
async fn delivery_method(pool: &PgPool) -> String {
    let value = format!("it-pickup-{}", uuid::Uuid::new_v4().simple());
    let input: DeliveryMethodInput = serde_json::from_value(json!({
        "value": value,
        "label": "Integration pickup"
    }))
    .expect("valid delivery method");
    DeliveryMethodRepository::new(pool)
        .create(&input)
        .await
        .expect("Failed to create delivery method");
    value
}

async fn product(pool: &PgPool, stock: i32) -> ProductId {
    let input: ProductInput = serde_json::from_value(json!({
        "name": "Water treatment WT-40",
        "category": "water-treatment",
        "price": "18000",
        "sku": format!("IT-{}", uuid::Uuid::new_v4().simple()),
        "stock_quantity": stock,
        "gross_weight_kg": "25"
    }))
    .expect("valid product");
    ProductRepository::new(pool)
        .create(&input)
        .await
        .expect("Failed to create product")
        .id
}

async fn stock_of(pool: &PgPool, id: ProductId) -> i32 {
    ProductRepository::new(pool)
        .get_by_id(id)
        .await
        .expect("Failed to load product")
        .expect("product exists")
        .stock_quantity
}

async fn staff(pool: &PgPool) -> AdminUserId {
    AuthService::new(pool)
        .create_admin(
            &unique_email("staff"),
            "Workflow Staff",
            AdminRole::SuperAdmin,
            "correct horse",
        )
        .await
        .expect("Failed to create admin")
        .id
}

fn guest_order(
    product_id: ProductId,
    quantity: i32,
    delivery_method: &str,
    payment_method: PaymentMethod,
) -> PlaceOrderRequest {
    serde_json::from_value(json!({
        "items": [{ "product_id": product_id, "quantity": quantity }],
        "delivery_method": delivery_method,
        "payment_method": payment_method,
        "shipping_address": {
            "recipient_name": "Shilan Aziz",
            "phone": "07501234567",
            "province": "Erbil",
            "city": "Erbil",
            "address": "Gulan Street 12"
        },
        "guest": {
            "email": unique_email("guest"),
            "name": "Shilan Aziz",
            "phone": "07501234567"
        }
    }))
    .expect("valid order request")
}

async fn status_of(pool: &PgPool, order_id: OrderId) -> OrderStatus {
    OrderManagementRepository::new(pool)
        .get_by_order(order_id)
        .await
        .expect("Failed to load workflow row")
        .expect("workflow row exists")
        .current_status
}

/// Make inserts into `table` fail for rows whose `column` equals `value`.
/// Returns the trigger name for [`allow_inserts`].
async fn refuse_inserts(pool: &PgPool, table: &str, column: &str, value: i32) -> String {
    let name = format!("refuse_{table}_{}", uuid::Uuid::new_v4().simple());
    sqlx::query(&format!(
        r"
        CREATE FUNCTION {name}() RETURNS trigger LANGUAGE plpgsql AS $$
        BEGIN
            IF NEW.{column} = {value} THEN
                RAISE EXCEPTION 'insert refused';
            END IF;
            RETURN NEW;
        END
        $$
        "
    ))
    .execute(pool)
    .await
    .expect("Failed to create trigger function");
    sqlx::query(&format!(
        "CREATE TRIGGER {name} BEFORE INSERT ON {table} FOR EACH ROW EXECUTE FUNCTION {name}()"
    ))
    .execute(pool)
    .await
    .expect("Failed to create trigger");
    name
}

async fn allow_inserts(pool: &PgPool, table: &str, name: &str) {
    sqlx::query(&format!("DROP TRIGGER IF EXISTS {name} ON {table}"))
        .execute(pool)
        .await
        .expect("Failed to drop trigger");
    sqlx::query(&format!("DROP FUNCTION IF EXISTS {name}()"))
        .execute(pool)
        .await
        .expect("Failed to drop trigger function");
}

/// Place a cash-on-delivery order and walk it to `logistics_assigned`.
async fn assigned_order(pool: &PgPool, actor: AdminUserId) -> OrderId {
    let method = delivery_method(pool).await;
    let product_id = product(pool, 20).await;
    let flow = OrderFlowService::new(pool);

    let placed = flow
        .place(
            Buyer::Guest,
            guest_order(product_id, 2, &method, PaymentMethod::CashOnDelivery),
            Utc::now(),
        )
        .await
        .expect("Failed to place order");
    let id = placed.order.id;

    flow.financial_review(id, actor).await.expect("review");
    flow.financial_approve(id, actor, None).await.expect("approve");
    flow.warehouse_process(id, actor).await.expect("process");
    flow.warehouse_approve(id, actor, None).await.expect("warehouse approve");
    flow.logistics_assign(id, actor, AssignRequest::default())
        .await
        .expect("assign");
    id
}

// =============================================================================
// Placement
// =============================================================================

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_order_beyond_stock_is_rejected() {
    let pool = pool().await;
    let method = delivery_method(&pool).await;
    let product_id = product(&pool, 3).await;

    let result = OrderFlowService::new(&pool)
        .place(
            Buyer::Guest,
            guest_order(product_id, 5, &method, PaymentMethod::CashOnDelivery),
            Utc::now(),
        )
        .await;

    assert!(matches!(
        result,
        Err(OrderFlowError::InsufficientStock {
            available: 3,
            requested: 5,
            ..
        })
    ));
    assert_eq!(stock_of(&pool, product_id).await, 3);
}

// =============================================================================
// Grace period
// =============================================================================

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_expired_grace_period_cancels_and_restocks() {
    let pool = pool().await;
    let method = delivery_method(&pool).await;
    let product_id = product(&pool, 10).await;
    let flow = OrderFlowService::new(&pool);

    let placed_at = Utc::now() - Duration::days(4);
    let placed = flow
        .place(
            Buyer::Guest,
            guest_order(product_id, 4, &method, PaymentMethod::BankTransfer),
            placed_at,
        )
        .await
        .expect("Failed to place order");
    assert_eq!(placed.status, OrderStatus::PaymentGracePeriod);
    assert_eq!(stock_of(&pool, product_id).await, 6);

    let cancelled = flow
        .expire_grace_periods(Utc::now())
        .await
        .expect("Failed to expire grace periods");
    assert!(cancelled >= 1);

    assert_eq!(status_of(&pool, placed.order.id).await, OrderStatus::Cancelled);
    assert_eq!(stock_of(&pool, product_id).await, 10);

    let history = OrderManagementRepository::new(&pool)
        .history(placed.order.id)
        .await
        .expect("Failed to load history");
    assert!(history.iter().any(|h| {
        h.to_status == OrderStatus::Cancelled && h.notes.as_deref() == Some("grace period expired")
    }));
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_open_grace_period_is_kept() {
    let pool = pool().await;
    let method = delivery_method(&pool).await;
    let product_id = product(&pool, 10).await;
    let flow = OrderFlowService::new(&pool);

    let placed = flow
        .place(
            Buyer::Guest,
            guest_order(product_id, 1, &method, PaymentMethod::BankTransfer),
            Utc::now(),
        )
        .await
        .expect("Failed to place order");

    flow.expire_grace_periods(Utc::now())
        .await
        .expect("Failed to expire grace periods");
    assert_eq!(
        status_of(&pool, placed.order.id).await,
        OrderStatus::PaymentGracePeriod
    );
}

// =============================================================================
// Delivery codes
// =============================================================================

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_expired_delivery_code_is_rejected() {
    let pool = pool().await;
    let actor = staff(&pool).await;
    let order_id = assigned_order(&pool, actor).await;
    let flow = OrderFlowService::new(&pool);

    // Dispatched eight days ago, so the seven-day code has lapsed
    let dispatched = flow
        .logistics_dispatch(
            order_id,
            actor,
            DispatchRequest::default(),
            Utc::now() - Duration::days(8),
        )
        .await
        .expect("Failed to dispatch");

    let result = flow
        .verify_delivery(
            order_id,
            actor,
            VerifyDeliveryRequest {
                code: dispatched.code.code.clone(),
                verified_by: "Driver".to_owned(),
                latitude: None,
                longitude: None,
            },
            Utc::now(),
        )
        .await;

    assert!(matches!(result, Err(OrderFlowError::DeliveryCodeExpired)));
    assert_eq!(status_of(&pool, order_id).await, OrderStatus::LogisticsDispatched);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_dispatch_rolls_back_when_code_cannot_be_stored() {
    let pool = pool().await;
    let actor = staff(&pool).await;
    let order_id = assigned_order(&pool, actor).await;
    let flow = OrderFlowService::new(&pool);

    let management_id = OrderManagementRepository::new(&pool)
        .get_by_order(order_id)
        .await
        .expect("Failed to load workflow row")
        .expect("workflow row exists")
        .id;
    let trigger = refuse_inserts(
        &pool,
        "delivery_codes",
        "order_management_id",
        management_id.as_i32(),
    )
    .await;

    let failed = flow
        .logistics_dispatch(order_id, actor, DispatchRequest::default(), Utc::now())
        .await;
    allow_inserts(&pool, "delivery_codes", &trigger).await;

    assert!(failed.is_err());
    assert_eq!(status_of(&pool, order_id).await, OrderStatus::LogisticsAssigned);

    // Nothing was half-applied, so the dispatch can simply be retried
    let dispatched = flow
        .logistics_dispatch(order_id, actor, DispatchRequest::default(), Utc::now())
        .await
        .expect("Retry dispatch failed");
    assert_eq!(
        dispatched.management.current_status,
        OrderStatus::LogisticsDispatched
    );
    assert_eq!(dispatched.code.order_management_id, management_id);
}

// =============================================================================
// Receipts
// =============================================================================

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_receipt_rolls_back_when_row_cannot_be_stored() {
    let pool = pool().await;
    let method = delivery_method(&pool).await;
    let product_id = product(&pool, 10).await;
    let flow = OrderFlowService::new(&pool);

    let placed = flow
        .place(
            Buyer::Guest,
            guest_order(product_id, 1, &method, PaymentMethod::BankTransfer),
            Utc::now(),
        )
        .await
        .expect("Failed to place order");
    let order_id = placed.order.id;

    let receipt = || NewReceipt {
        order_id,
        customer_id: None,
        storage_key: format!("receipts/{}.pdf", uuid::Uuid::new_v4()),
        original_file_name: "transfer.pdf".to_owned(),
        mime_type: "application/pdf".to_owned(),
        file_size: 2048,
        notes: Some("Rasheed Bank transfer".to_owned()),
    };

    let trigger = refuse_inserts(&pool, "payment_receipts", "customer_order_id", order_id.as_i32()).await;
    let failed = flow.record_receipt(receipt()).await;
    allow_inserts(&pool, "payment_receipts", &trigger).await;

    assert!(failed.is_err());
    let management = OrderManagementRepository::new(&pool)
        .get_by_order(order_id)
        .await
        .expect("Failed to load workflow row")
        .expect("workflow row exists");
    assert_eq!(management.current_status, OrderStatus::PaymentGracePeriod);
    assert!(management.payment_receipt_key.is_none());

    let (stored, management) = flow
        .record_receipt(receipt())
        .await
        .expect("Retry upload failed");
    assert_eq!(management.current_status, OrderStatus::PaymentUploaded);
    assert_eq!(management.payment_receipt_key, Some(stored.storage_key));
}
