//! CRM: customer records, activity log and the dashboard.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use momtazchem_core::CustomerId;

use crate::db::reports::CrmDashboard;
use crate::db::{CustomerRepository, ReportRepository};
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::middleware::RequireAdminAuth;
use crate::models::{
    Customer, CustomerActivity, CustomerInput, CustomerSummary, Page, PageParams,
};
use crate::state::AppState;

const RECENT_ACTIVITY_LIMIT: i64 = 20;
const MAX_ACTIVITY_LIMIT: i64 = 200;
const MAX_ACTIVITY_TYPE_LEN: usize = 50;

/// Build the CRM router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/crm/customers", get(index).post(create))
        .route("/api/crm/customers/{id}", get(show).put(update))
        .route(
            "/api/crm/customers/{id}/activities",
            get(activities).post(add_activity),
        )
        .route("/api/crm/dashboard", get(dashboard))
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub activity_type: String,
    pub description: String,
}

impl ActivityRequest {
    fn validate(self) -> Result<Self, String> {
        let activity_type = self.activity_type.trim().to_ascii_lowercase();
        let description = self.description.trim().to_owned();
        if activity_type.is_empty() || description.is_empty() {
            return Err("activity_type and description are required".to_owned());
        }
        if activity_type.len() > MAX_ACTIVITY_TYPE_LEN {
            return Err("activity_type is too long".to_owned());
        }
        Ok(Self {
            activity_type,
            description,
        })
    }
}

/// Customer record with purchase summary and recent activity.
#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub summary: CustomerSummary,
    pub recent_activities: Vec<CustomerActivity>,
}

/// GET /api/crm/customers?search=&page=&per_page=
async fn index(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> ApiResult<Page<Customer>> {
    let params = PageParams {
        page: query.page,
        per_page: query.per_page,
    };
    let (items, total) = CustomerRepository::new(state.pool())
        .search(query.search.as_deref(), params)
        .await?;
    Ok(ApiResponse::ok(Page::new(items, total, params)))
}

/// GET /api/crm/customers/{id}
async fn show(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> ApiResult<CustomerDetail> {
    let repo = CustomerRepository::new(state.pool());
    let customer = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("customer {id}")))?;
    let summary = repo.order_summary(id).await?;
    let recent_activities = repo.activities(id, RECENT_ACTIVITY_LIMIT).await?;
    Ok(ApiResponse::ok(CustomerDetail {
        customer,
        summary,
        recent_activities,
    }))
}

/// POST /api/crm/customers
#[instrument(skip(admin, state, input), fields(admin_id = %admin.id))]
async fn create(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Json(input): Json<CustomerInput>,
) -> ApiResult<Customer> {
    let fields = input.validate().map_err(AppError::BadRequest)?;
    let repo = CustomerRepository::new(state.pool());
    let customer = repo.create(&fields, None).await?;
    repo.add_activity(
        customer.id,
        "created",
        "Customer record created in CRM",
        Some(&admin.name),
    )
    .await?;
    tracing::info!(customer_id = %customer.id, "CRM customer created");
    Ok(ApiResponse::with_message(customer, "Customer created"))
}

/// PUT /api/crm/customers/{id}
#[instrument(skip(admin, state, input), fields(admin_id = %admin.id))]
async fn update(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Json(input): Json<CustomerInput>,
) -> ApiResult<Customer> {
    let fields = input.validate().map_err(AppError::BadRequest)?;
    let repo = CustomerRepository::new(state.pool());
    let customer = repo.update(id, &fields).await?;
    repo.add_activity(id, "updated", "Customer details updated", Some(&admin.name))
        .await?;
    Ok(ApiResponse::ok(customer))
}

/// GET /api/crm/customers/{id}/activities?limit=
async fn activities(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Vec<CustomerActivity>> {
    let limit = query
        .limit
        .unwrap_or(RECENT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    let rows = CustomerRepository::new(state.pool())
        .activities(id, limit)
        .await?;
    Ok(ApiResponse::ok(rows))
}

/// POST /api/crm/customers/{id}/activities
async fn add_activity(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Json(req): Json<ActivityRequest>,
) -> ApiResult<CustomerActivity> {
    let req = req.validate().map_err(AppError::BadRequest)?;
    let activity = CustomerRepository::new(state.pool())
        .add_activity(id, &req.activity_type, &req.description, Some(&admin.name))
        .await?;
    Ok(ApiResponse::with_message(activity, "Activity recorded"))
}

/// GET /api/crm/dashboard
async fn dashboard(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
) -> ApiResult<CrmDashboard> {
    let dashboard = ReportRepository::new(state.pool())
        .crm_dashboard(Utc::now())
        .await?;
    Ok(ApiResponse::ok(dashboard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_request_normalises() {
        let req = ActivityRequest {
            activity_type: " Call ".into(),
            description: " Discussed bulk pricing ".into(),
        }
        .validate();
        assert!(matches!(req, Ok(ref r) if r.activity_type == "call" && r.description == "Discussed bulk pricing"));
    }

    #[test]
    fn test_activity_request_requires_text() {
        let req = ActivityRequest {
            activity_type: "note".into(),
            description: "  ".into(),
        };
        assert!(req.validate().is_err());
    }
}
