//! Department workflow endpoints.
//!
//! ```text
//! financial:  payment_uploaded -> financial_reviewing -> financial_approved -> warehouse_pending
//! warehouse:  warehouse_pending -> warehouse_processing -> warehouse_approved
//! logistics:  logistics_assigned -> logistics_dispatched -> logistics_delivered -> completed
//! ```
//!
//! Each action is guarded by the department extractor and returns the
//! updated `order_management` row.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use momtazchem_core::{OrderId, OrderStatus};

use crate::db::{OrderManagementRepository, OrderRepository};
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::middleware::auth::DepartmentScope;
use crate::middleware::{Financial, Logistics, RequireAdminAuth, RequireDepartment, Warehouse};
use crate::models::{DepartmentOrder, OrderManagement, StatusHistoryEntry};
use crate::services::order_flow::{
    AssignRequest, DispatchRequest, OrderFlowService, VerifyDeliveryRequest,
};
use crate::services::storage::DEFAULT_LINK_TTL;
use crate::state::AppState;

/// Build the workflow router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/financial/orders", get(queue::<Financial>))
        .route("/api/warehouse/orders", get(queue::<Warehouse>))
        .route("/api/logistics/orders", get(queue::<Logistics>))
        .route("/api/orders/{id}/history", get(history))
        // Financial
        .route("/api/financial/orders/{id}/review", post(financial_review))
        .route("/api/financial/orders/{id}/approve", post(financial_approve))
        .route("/api/financial/orders/{id}/reject", post(financial_reject))
        .route("/api/financial/orders/{id}/receipt", get(receipt_link))
        // Warehouse
        .route("/api/warehouse/orders/{id}/process", post(warehouse_process))
        .route("/api/warehouse/orders/{id}/approve", post(warehouse_approve))
        .route("/api/warehouse/orders/{id}/reject", post(warehouse_reject))
        // Logistics
        .route("/api/logistics/orders/{id}/assign", post(logistics_assign))
        .route("/api/logistics/orders/{id}/dispatch", post(logistics_dispatch))
        .route(
            "/api/logistics/orders/{id}/verify-delivery",
            post(verify_delivery),
        )
        .route("/api/logistics/orders/{id}/complete", post(complete))
        // Any admin
        .route("/api/admin/orders/{id}/cancel", post(cancel))
}

#[derive(Debug, Default, Deserialize)]
pub struct QueueQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotesRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DispatchedView {
    pub management: OrderManagement,
    pub delivery_code: String,
    pub code_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReceiptLink {
    pub key: String,
    pub url: String,
    pub expires_in_seconds: u64,
}

/// GET /api/{financial|warehouse|logistics}/orders
async fn queue<D: DepartmentScope>(
    dept: RequireDepartment<D>,
    State(state): State<AppState>,
    Query(query): Query<QueueQuery>,
) -> ApiResult<Vec<DepartmentOrder>> {
    let orders = OrderFlowService::new(state.pool())
        .department_queue(dept.department(), query.status)
        .await?;
    Ok(ApiResponse::ok(orders))
}

/// GET /api/orders/{id}/history
async fn history(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> ApiResult<Vec<StatusHistoryEntry>> {
    let entries = OrderManagementRepository::new(state.pool())
        .history(id)
        .await?;
    Ok(ApiResponse::ok(entries))
}

// =============================================================================
// Financial
// =============================================================================

/// POST /api/financial/orders/{id}/review
#[instrument(skip(dept, state))]
async fn financial_review(
    dept: RequireDepartment<Financial>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> ApiResult<OrderManagement> {
    let row = OrderFlowService::new(state.pool())
        .financial_review(id, dept.0.id)
        .await?;
    Ok(ApiResponse::ok(row))
}

/// POST /api/financial/orders/{id}/approve
#[instrument(skip(dept, state, req))]
async fn financial_approve(
    dept: RequireDepartment<Financial>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(req): Json<NotesRequest>,
) -> ApiResult<OrderManagement> {
    let row = OrderFlowService::new(state.pool())
        .financial_approve(id, dept.0.id, req.notes)
        .await?;
    state
        .notifier()
        .order_status(id, OrderStatus::FinancialApproved, None);
    Ok(ApiResponse::with_message(row, "Payment approved"))
}

/// POST /api/financial/orders/{id}/reject
#[instrument(skip(dept, state, req))]
async fn financial_reject(
    dept: RequireDepartment<Financial>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(req): Json<NotesRequest>,
) -> ApiResult<OrderManagement> {
    let row = OrderFlowService::new(state.pool())
        .financial_reject(id, dept.0.id, req.notes)
        .await?;
    state
        .notifier()
        .order_status(id, row.current_status, row.financial_notes.clone());
    Ok(ApiResponse::with_message(row, "Payment rejected"))
}

/// GET /api/financial/orders/{id}/receipt
///
/// Short-lived link to the uploaded payment receipt.
async fn receipt_link(
    _dept: RequireDepartment<Financial>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> ApiResult<ReceiptLink> {
    let key = OrderManagementRepository::new(state.pool())
        .get_by_order(id)
        .await?
        .and_then(|m| m.payment_receipt_key)
        .ok_or_else(|| AppError::NotFound(format!("receipt for order {id}")))?;
    let url = state
        .storage()
        .presigned_get(state.pool(), &key, DEFAULT_LINK_TTL)
        .await?;
    Ok(ApiResponse::ok(ReceiptLink {
        key,
        url,
        expires_in_seconds: DEFAULT_LINK_TTL.as_secs(),
    }))
}

// =============================================================================
// Warehouse
// =============================================================================

/// POST /api/warehouse/orders/{id}/process
#[instrument(skip(dept, state))]
async fn warehouse_process(
    dept: RequireDepartment<Warehouse>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> ApiResult<OrderManagement> {
    let row = OrderFlowService::new(state.pool())
        .warehouse_process(id, dept.0.id)
        .await?;
    Ok(ApiResponse::ok(row))
}

/// POST /api/warehouse/orders/{id}/approve
#[instrument(skip(dept, state, req))]
async fn warehouse_approve(
    dept: RequireDepartment<Warehouse>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(req): Json<NotesRequest>,
) -> ApiResult<OrderManagement> {
    let row = OrderFlowService::new(state.pool())
        .warehouse_approve(id, dept.0.id, req.notes)
        .await?;
    Ok(ApiResponse::with_message(row, "Order ready for logistics"))
}

/// POST /api/warehouse/orders/{id}/reject
#[instrument(skip(dept, state, req))]
async fn warehouse_reject(
    dept: RequireDepartment<Warehouse>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(req): Json<NotesRequest>,
) -> ApiResult<OrderManagement> {
    let row = OrderFlowService::new(state.pool())
        .warehouse_reject(id, dept.0.id, req.notes)
        .await?;
    state
        .notifier()
        .order_status(id, row.current_status, row.warehouse_notes.clone());
    Ok(ApiResponse::with_message(row, "Order rejected by warehouse"))
}

// =============================================================================
// Logistics
// =============================================================================

/// POST /api/logistics/orders/{id}/assign
#[instrument(skip(dept, state, req))]
async fn logistics_assign(
    dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(req): Json<AssignRequest>,
) -> ApiResult<OrderManagement> {
    let row = OrderFlowService::new(state.pool())
        .logistics_assign(id, dept.0.id, req)
        .await?;
    Ok(ApiResponse::ok(row))
}

/// POST /api/logistics/orders/{id}/dispatch
#[instrument(skip(dept, state, req))]
async fn logistics_dispatch(
    dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(req): Json<DispatchRequest>,
) -> ApiResult<DispatchedView> {
    let dispatched = OrderFlowService::new(state.pool())
        .logistics_dispatch(id, dept.0.id, req, Utc::now())
        .await?;

    match OrderRepository::new(state.pool()).get_by_id(id).await {
        Ok(Some(order)) => state
            .notifier()
            .delivery_code(order, dispatched.code.clone()),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Could not load order for delivery code SMS"),
    }
    state
        .notifier()
        .order_status(id, dispatched.management.current_status, None);

    Ok(ApiResponse::with_message(
        DispatchedView {
            code_expires_at: dispatched.code.expires_at,
            delivery_code: dispatched.code.code,
            management: dispatched.management,
        },
        "Order dispatched",
    ))
}

/// POST /api/logistics/orders/{id}/verify-delivery
#[instrument(skip(dept, state, req))]
async fn verify_delivery(
    dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(req): Json<VerifyDeliveryRequest>,
) -> ApiResult<OrderManagement> {
    let row = OrderFlowService::new(state.pool())
        .verify_delivery(id, dept.0.id, req, Utc::now())
        .await?;
    state
        .notifier()
        .order_status(id, row.current_status, None);
    Ok(ApiResponse::with_message(row, "Delivery verified"))
}

/// POST /api/logistics/orders/{id}/complete
#[instrument(skip(dept, state))]
async fn complete(
    dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> ApiResult<OrderManagement> {
    let row = OrderFlowService::new(state.pool())
        .complete(id, dept.0.id)
        .await?;
    Ok(ApiResponse::ok(row))
}

/// POST /api/admin/orders/{id}/cancel
#[instrument(skip(admin, state, req), fields(admin_id = %admin.id))]
async fn cancel(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(req): Json<CancelRequest>,
) -> ApiResult<OrderManagement> {
    let reason = req.reason.clone();
    let row = OrderFlowService::new(state.pool())
        .cancel(id, Some(admin.id), req.reason)
        .await?;
    tracing::info!(order_id = %id, "Order cancelled");
    state.notifier().order_status(id, row.current_status, reason);
    Ok(ApiResponse::with_message(row, "Order cancelled"))
}
