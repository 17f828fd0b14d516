//! EAN-13 barcode endpoints: validation, allocation, scanner lookups and
//! label rendering.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use momtazchem_core::barcode::Ean13Components;
use momtazchem_core::barcode::svg::{self, SvgOptions};
use momtazchem_core::{Ean13, ProductId};

use crate::db::ProductRepository;
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::middleware::RequireAdminAuth;
use crate::models::product::BarcodeOwner;
use crate::models::{Product, clean_optional};
use crate::services::barcode;
use crate::state::AppState;

const MAX_SCAN_TYPE_LEN: usize = 32;

/// Build the barcode router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/barcode/validate/{code}", get(validate))
        .route("/api/barcode/check-duplicate/{code}", get(check_duplicate))
        .route("/api/barcode/log", post(log_scan))
        .route("/api/barcode/{code}/svg", get(render_svg))
        .route("/api/products/barcode/{code}", get(lookup))
        .route("/api/admin/barcode/generate", post(generate))
        .route("/api/admin/products/{id}/barcode", put(assign))
}

#[derive(Debug, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub barcode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Ean13Components>,
    pub is_company_code: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Validation {
    fn of(raw: &str) -> Self {
        match Ean13::parse(raw) {
            Ok(code) => Self {
                valid: true,
                barcode: code.as_str(),
                components: Some(code.components()),
                is_company_code: code.is_company_code(),
                error: None,
            },
            Err(e) => Self {
                valid: false,
                barcode: raw.trim().to_owned(),
                components: None,
                is_company_code: false,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DuplicateQuery {
    pub exclude_product_id: Option<ProductId>,
}

#[derive(Debug, Serialize)]
pub struct DuplicateCheck {
    pub is_unique: bool,
    pub duplicate_product: Option<BarcodeOwner>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub product_id: ProductId,
}

#[derive(Debug, Serialize)]
pub struct Generated {
    pub product: Product,
    pub barcode: String,
    pub components: Ean13Components,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub barcode: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanLogRequest {
    pub barcode: String,
    pub scan_type: Option<String>,
    pub scanner_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SvgQuery {
    pub show_text: Option<bool>,
}

fn parse(raw: &str) -> Result<Ean13, AppError> {
    Ean13::parse(raw).map_err(|e| AppError::BadRequest(format!("invalid barcode: {e}")))
}

/// GET /api/barcode/validate/{code}
async fn validate(Path(code): Path<String>) -> ApiResult<Validation> {
    Ok(ApiResponse::ok(Validation::of(&code)))
}

/// GET /api/barcode/check-duplicate/{code}
async fn check_duplicate(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<DuplicateQuery>,
) -> ApiResult<DuplicateCheck> {
    let code = parse(&code)?;
    let owner = ProductRepository::new(state.pool())
        .barcode_owner(&code.as_str(), query.exclude_product_id)
        .await?;
    Ok(ApiResponse::ok(DuplicateCheck {
        is_unique: owner.is_none(),
        duplicate_product: owner,
    }))
}

/// POST /api/admin/barcode/generate
#[instrument(skip(admin, state))]
async fn generate(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Generated> {
    let (product, code) = barcode::allocate(state.pool(), req.product_id).await?;
    tracing::info!(
        admin_id = %admin.id,
        product_id = %product.id,
        barcode = %code.as_str(),
        "Barcode generated"
    );
    Ok(ApiResponse::with_message(
        Generated {
            product,
            barcode: code.as_str(),
            components: code.components(),
        },
        "Barcode generated",
    ))
}

/// PUT /api/admin/products/{id}/barcode
#[instrument(skip(state, req))]
async fn assign(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(req): Json<AssignRequest>,
) -> ApiResult<Product> {
    let code = parse(&req.barcode)?.as_str();
    let repo = ProductRepository::new(state.pool());
    if let Some(owner) = repo.barcode_owner(&code, Some(id)).await? {
        return Err(AppError::Conflict(format!(
            "barcode {code} is already used by {} ({})",
            owner.name, owner.sku
        )));
    }
    let product = repo.set_barcode(id, &code).await?;
    Ok(ApiResponse::ok(product))
}

/// GET /api/products/barcode/{code}
///
/// Public so scanner hardware can resolve labels without a session.
#[instrument(skip(state))]
async fn lookup(State(state): State<AppState>, Path(code): Path<String>) -> ApiResult<Product> {
    let code = parse(&code)?.as_str();
    let repo = ProductRepository::new(state.pool());
    let product = repo.find_by_barcode(&code).await?;

    if let Err(e) = repo
        .log_scan(&code, product.as_ref().map(|p| p.id), "lookup", None)
        .await
    {
        tracing::warn!(error = %e, "Failed to log barcode scan");
    }

    product
        .map(ApiResponse::ok)
        .ok_or_else(|| AppError::NotFound(format!("no product with barcode {code}")))
}

/// POST /api/barcode/log
async fn log_scan(
    State(state): State<AppState>,
    Json(req): Json<ScanLogRequest>,
) -> ApiResult<()> {
    let code = req.barcode.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest("barcode is required".to_owned()));
    }
    let scan_type = clean_optional(req.scan_type).unwrap_or_else(|| "scan".to_owned());
    if scan_type.len() > MAX_SCAN_TYPE_LEN {
        return Err(AppError::BadRequest("scan_type is too long".to_owned()));
    }

    let repo = ProductRepository::new(state.pool());
    let product_id = match Ean13::parse(code) {
        Ok(parsed) => repo.find_by_barcode(&parsed.as_str()).await?.map(|p| p.id),
        Err(_) => None,
    };
    repo.log_scan(
        code,
        product_id,
        &scan_type,
        clean_optional(req.scanner_id).as_deref(),
    )
    .await?;
    Ok(ApiResponse::message("Scan logged"))
}

/// GET /api/barcode/{code}/svg
async fn render_svg(
    Path(code): Path<String>,
    Query(query): Query<SvgQuery>,
) -> Result<impl IntoResponse, AppError> {
    let code = parse(code.trim_end_matches(".svg"))?;
    let options = SvgOptions {
        show_text: query.show_text.unwrap_or(true),
        ..SvgOptions::default()
    };
    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        svg::render(&code, options),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_reports_components() {
        let code = Ean13::for_product(1234).unwrap().as_str();
        let result = Validation::of(&code);
        assert!(result.valid);
        assert!(result.is_company_code);
        assert_eq!(result.components.unwrap().product_code, "1234");
    }

    #[test]
    fn test_validation_reports_errors() {
        let result = Validation::of("12345");
        assert!(!result.valid);
        assert!(result.components.is_none());
        assert!(result.error.is_some());
    }
}
