//! Catalogue endpoints: the public shop listing and admin product CRUD.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use momtazchem_core::ProductId;

use crate::db::ProductRepository;
use crate::db::products::ProductFilter;
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::middleware::RequireAdminAuth;
use crate::models::{Page, PageParams, Product, ProductInput};
use crate::state::AppState;

/// Build the catalogue router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/shop/products", get(shop_index))
        .route("/api/shop/products/{id}", get(shop_show))
        .route("/api/shop/categories", get(categories))
        .route("/api/admin/products", get(admin_index).post(create))
        .route(
            "/api/admin/products/{id}",
            get(admin_show).put(update).delete(remove),
        )
}

/// `?category=&search=&page=&per_page=`
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ProductQuery {
    const fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            per_page: self.per_page,
        }
    }

    fn filter(&self, listed_only: bool) -> ProductFilter<'_> {
        ProductFilter {
            category: self.category.as_deref(),
            search: self.search.as_deref(),
            listed_only,
        }
    }
}

/// GET /api/shop/products
#[instrument(skip(state))]
async fn shop_index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Page<Product>> {
    let params = query.page_params();
    let (items, total) = ProductRepository::new(state.pool())
        .list(&query.filter(true), params)
        .await?;
    Ok(ApiResponse::ok(Page::new(items, total, params)))
}

/// GET /api/shop/products/{id}
async fn shop_show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> ApiResult<Product> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(Product::is_listed)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    Ok(ApiResponse::ok(product))
}

/// GET /api/shop/categories
async fn categories(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let categories = ProductRepository::new(state.pool()).categories().await?;
    Ok(ApiResponse::ok(categories))
}

/// GET /api/admin/products
async fn admin_index(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Page<Product>> {
    let params = query.page_params();
    let (items, total) = ProductRepository::new(state.pool())
        .list(&query.filter(false), params)
        .await?;
    Ok(ApiResponse::ok(Page::new(items, total, params)))
}

/// GET /api/admin/products/{id}
async fn admin_show(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> ApiResult<Product> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    Ok(ApiResponse::ok(product))
}

/// Reject a barcode already carried by another product.
async fn ensure_barcode_free(
    repo: &ProductRepository<'_>,
    input: &ProductInput,
    exclude: Option<ProductId>,
) -> Result<(), AppError> {
    if let Some(code) = &input.barcode
        && let Some(owner) = repo.barcode_owner(code, exclude).await?
    {
        return Err(AppError::Conflict(format!(
            "barcode {code} is already used by {} ({})",
            owner.name, owner.sku
        )));
    }
    Ok(())
}

/// POST /api/admin/products
#[instrument(skip(admin, state, input), fields(sku = %input.sku))]
async fn create(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> ApiResult<Product> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let repo = ProductRepository::new(state.pool());
    ensure_barcode_free(&repo, &input, None).await?;

    let product = repo.create(&input).await?;
    tracing::info!(admin_id = %admin.id, product_id = %product.id, "Product created");
    Ok(ApiResponse::with_message(product, "Product created"))
}

/// PUT /api/admin/products/{id}
#[instrument(skip(state, input))]
async fn update(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> ApiResult<Product> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let repo = ProductRepository::new(state.pool());
    ensure_barcode_free(&repo, &input, Some(id)).await?;

    let product = repo.update(id, &input).await?;
    Ok(ApiResponse::ok(product))
}

/// DELETE /api/admin/products/{id}
#[instrument(skip(admin, state))]
async fn remove(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> ApiResult<()> {
    ProductRepository::new(state.pool()).delete(id).await?;
    tracing::info!(admin_id = %admin.id, product_id = %id, "Product deleted");
    Ok(ApiResponse::message("Product deleted"))
}
