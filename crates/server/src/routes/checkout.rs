//! Storefront checkout: quotes, order placement, order history, public
//! tracking and bank-transfer receipt uploads.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
};
use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use momtazchem_core::{OrderId, OrderNumber, OrderStatus};

use crate::db::OrderRepository;
use crate::db::orders::NewReceipt;
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::middleware::{OptionalCustomer, RequireCustomer};
use crate::models::order::PaymentReceipt;
use crate::models::{OrderTracking, OrderWithItems, clean_optional};
use crate::services::order_flow::{Buyer, OrderFlowService, PlaceOrderRequest, PlacedOrder};
use crate::services::pricing::{PricingService, Quote, QuoteRequest};
use crate::services::storage::{FileKind, MAX_UPLOAD_BYTES};
use crate::state::AppState;

/// Multipart overhead allowed on top of the file itself.
const MULTIPART_SLACK: usize = 64 * 1024;
const MAX_FILE_NAME_CHARS: usize = 200;

/// Build the checkout router.
pub fn router() -> Router<AppState> {
    let uploads = Router::new()
        .route("/api/customers/orders/{id}/receipt", post(upload_receipt))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_SLACK));

    Router::new()
        .route("/api/shop/checkout/quote", post(quote))
        .route("/api/shop/orders", post(place_order))
        .route("/api/shop/orders/track/{order_number}", get(track))
        .route("/api/customers/orders", get(my_orders))
        .merge(uploads)
}

#[derive(Debug, Serialize)]
pub struct ReceiptUploaded {
    pub receipt: PaymentReceipt,
    pub status: OrderStatus,
}

/// POST /api/shop/checkout/quote
async fn quote(State(state): State<AppState>, Json(req): Json<QuoteRequest>) -> ApiResult<Quote> {
    let (quote, _) = PricingService::new(state.pool()).quote(&req).await?;
    Ok(ApiResponse::ok(quote))
}

/// POST /api/shop/orders
#[instrument(skip(state, customer, req), fields(customer_id))]
async fn place_order(
    State(state): State<AppState>,
    OptionalCustomer(customer): OptionalCustomer,
    Json(req): Json<PlaceOrderRequest>,
) -> ApiResult<PlacedOrder> {
    let buyer = match &customer {
        Some(c) => {
            tracing::Span::current().record("customer_id", c.id.as_i32());
            Buyer::Customer(c.id)
        }
        None => Buyer::Guest,
    };

    let placed = OrderFlowService::new(state.pool())
        .place(buyer, req, Utc::now())
        .await?;
    tracing::info!(
        order_number = %placed.order.order_number,
        status = %placed.status,
        total = %placed.order.total_amount,
        "Order placed"
    );

    state
        .notifier()
        .order_placed(placed.order.clone(), placed.status);
    Ok(ApiResponse::with_message(placed, "Order placed"))
}

/// GET /api/customers/orders
async fn my_orders(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
) -> ApiResult<Vec<OrderWithItems>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_customer(customer.id)
        .await?;
    Ok(ApiResponse::ok(orders))
}

/// GET /api/shop/orders/track/{order_number}
async fn track(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> ApiResult<OrderTracking> {
    let not_found = || AppError::NotFound(format!("order {order_number}"));
    let number = OrderNumber::parse(&order_number).ok_or_else(not_found)?;
    let tracking = OrderRepository::new(state.pool())
        .tracking(&number)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok(tracking))
}

/// Keep only the final path component of a client-supplied file name.
fn clean_file_name(raw: Option<&str>) -> String {
    raw.and_then(|name| name.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(
            || "receipt".to_owned(),
            |name| name.chars().take(MAX_FILE_NAME_CHARS).collect(),
        )
}

/// POST /api/customers/orders/{id}/receipt
#[instrument(skip(customer, state, multipart), fields(customer_id = %customer.id))]
async fn upload_receipt(
    RequireCustomer(customer): RequireCustomer,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    mut multipart: Multipart,
) -> ApiResult<ReceiptUploaded> {
    let flow = OrderFlowService::new(state.pool());
    flow.ensure_receipt_allowed(id, customer.id).await?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut notes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid upload: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let name = clean_file_name(field.file_name());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid upload: {e}")))?;
                file = Some((name, bytes.to_vec()));
            }
            Some("notes") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid notes: {e}")))?;
                notes = clean_optional(Some(text));
            }
            _ => {}
        }
    }
    let (file_name, bytes) =
        file.ok_or_else(|| AppError::BadRequest("file is required".to_owned()))?;

    let stored = state
        .storage()
        .upload(state.pool(), "receipts", bytes, FileKind::RECEIPTS)
        .await?;

    let receipt = NewReceipt {
        order_id: id,
        customer_id: Some(customer.id),
        storage_key: stored.key.clone(),
        original_file_name: file_name,
        mime_type: stored.mime_type.to_owned(),
        file_size: i32::try_from(stored.size).unwrap_or(i32::MAX),
        notes,
    };
    let (receipt, management) = match flow.record_receipt(receipt).await {
        Ok(recorded) => recorded,
        Err(e) => {
            if let Err(cleanup) = state.storage().delete(state.pool(), &stored.key).await {
                tracing::warn!(key = %stored.key, error = %cleanup, "Orphaned receipt upload");
            }
            return Err(e.into());
        }
    };

    tracing::info!(order_id = %id, key = %stored.key, "Payment receipt uploaded");
    state
        .notifier()
        .order_status(id, management.current_status, None);

    Ok(ApiResponse::with_message(
        ReceiptUploaded {
            receipt,
            status: management.current_status,
        },
        "Receipt uploaded",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_file_name_strips_paths() {
        assert_eq!(clean_file_name(Some("C:\\Users\\me\\slip.pdf")), "slip.pdf");
        assert_eq!(clean_file_name(Some("../../etc/passwd")), "passwd");
        assert_eq!(clean_file_name(Some("  ")), "receipt");
        assert_eq!(clean_file_name(None), "receipt");
    }

    #[test]
    fn test_clean_file_name_truncates() {
        let long = "a".repeat(500);
        assert_eq!(clean_file_name(Some(&long)).len(), MAX_FILE_NAME_CHARS);
    }
}
