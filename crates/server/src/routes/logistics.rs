//! VAT, delivery methods, shipping rates, geography and vehicle selection.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use momtazchem_core::{
    CityId, CountryId, DeliveryMethodId, InternationalCityId, ProvinceId, ShippingRateId,
    VehicleTemplateId,
};

use crate::db::{
    DeliveryMethodRepository, GeographyRepository, ShippingRateRepository, VatRepository,
    VehicleTemplateRepository,
};
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::middleware::{Financial, Logistics, RequireAdminAuth, RequireDepartment};
use crate::models::logistics::{
    City, CityInput, DeliveryMethod, DeliveryMethodInput, InternationalCity,
    InternationalCityInput, InternationalCountry, InternationalCountryInput, Province,
    ProvinceInput, PublicVat, ShippingRate, ShippingRateInput, VatSettings, VatSettingsInput,
    VehicleTemplate, VehicleTemplateInput,
};
use crate::services::vehicle::{VehicleQuote, VehicleService};
use crate::state::AppState;

/// Build the logistics router.
pub fn router() -> Router<AppState> {
    Router::new()
        // VAT
        .route("/api/shop/vat", get(public_vat))
        .route("/api/financial/vat-settings", get(vat_settings).put(save_vat))
        // Delivery methods
        .route("/api/shop/delivery-methods", get(public_delivery_methods))
        .route(
            "/api/admin/delivery-methods",
            get(list_delivery_methods).post(create_delivery_method),
        )
        .route(
            "/api/admin/delivery-methods/{id}",
            put(update_delivery_method).delete(delete_delivery_method),
        )
        // Shipping rates
        .route(
            "/api/logistics/shipping-rates",
            get(list_shipping_rates).post(create_shipping_rate),
        )
        .route(
            "/api/logistics/shipping-rates/{id}",
            put(update_shipping_rate).delete(delete_shipping_rate),
        )
        // Iraqi geography
        .route("/api/iraqi-provinces", get(public_provinces))
        .route("/api/iraqi-cities", get(public_cities))
        .route(
            "/api/admin/geography/provinces",
            get(admin_provinces).post(create_province),
        )
        .route(
            "/api/admin/geography/provinces/{id}",
            put(update_province).delete(delete_province),
        )
        .route(
            "/api/admin/geography/cities",
            get(admin_cities).post(create_city),
        )
        .route(
            "/api/admin/geography/cities/{id}",
            put(update_city).delete(delete_city),
        )
        // International
        .route(
            "/api/logistics/international-countries",
            get(list_countries).post(create_country),
        )
        .route(
            "/api/logistics/international-countries/{id}",
            put(update_country).delete(delete_country),
        )
        .route(
            "/api/logistics/international-cities",
            get(list_international_cities).post(create_international_city),
        )
        .route(
            "/api/logistics/international-cities/{id}",
            put(update_international_city).delete(delete_international_city),
        )
        // Vehicles
        .route(
            "/api/logistics/vehicle-templates",
            get(list_vehicle_templates).post(create_vehicle_template),
        )
        .route(
            "/api/logistics/vehicle-templates/{id}",
            put(update_vehicle_template).delete(delete_vehicle_template),
        )
        .route("/api/logistics/calculate-vehicle", post(calculate_vehicle))
}

#[derive(Debug, Default, Deserialize)]
pub struct ShippingRateQuery {
    pub delivery_method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CityQuery {
    pub province_id: Option<ProvinceId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InternationalCityQuery {
    pub country_id: Option<CountryId>,
}

#[derive(Debug, Deserialize)]
pub struct VehicleRequest {
    pub weight_kg: Decimal,
    pub destination_city: String,
    #[serde(default)]
    pub contains_flammable: bool,
}

// =============================================================================
// VAT
// =============================================================================

/// GET /api/shop/vat
async fn public_vat(State(state): State<AppState>) -> ApiResult<Option<PublicVat>> {
    let vat = state.cache().public_vat(state.pool()).await?;
    Ok(ApiResponse::ok(vat))
}

/// GET /api/financial/vat-settings
async fn vat_settings(
    _dept: RequireDepartment<Financial>,
    State(state): State<AppState>,
) -> ApiResult<Option<VatSettings>> {
    let settings = VatRepository::new(state.pool()).active().await?;
    Ok(ApiResponse::ok(settings))
}

/// PUT /api/financial/vat-settings
#[instrument(skip(dept, state, input), fields(admin_id = %dept.0.id))]
async fn save_vat(
    dept: RequireDepartment<Financial>,
    State(state): State<AppState>,
    Json(input): Json<VatSettingsInput>,
) -> ApiResult<VatSettings> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let settings = VatRepository::new(state.pool())
        .upsert(&input, dept.0.id)
        .await?;
    state.cache().invalidate_vat().await;
    tracing::info!(rate = %settings.vat_rate, enabled = settings.vat_enabled, "VAT settings saved");
    Ok(ApiResponse::with_message(settings, "VAT settings saved"))
}

// =============================================================================
// Delivery methods
// =============================================================================

/// GET /api/shop/delivery-methods
async fn public_delivery_methods(State(state): State<AppState>) -> ApiResult<Vec<DeliveryMethod>> {
    let methods = state.cache().delivery_methods(state.pool()).await?;
    Ok(ApiResponse::ok(methods))
}

/// GET /api/admin/delivery-methods
async fn list_delivery_methods(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<DeliveryMethod>> {
    let methods = DeliveryMethodRepository::new(state.pool()).list(false).await?;
    Ok(ApiResponse::ok(methods))
}

/// POST /api/admin/delivery-methods
#[instrument(skip(state, input), fields(value = %input.value))]
async fn create_delivery_method(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Json(input): Json<DeliveryMethodInput>,
) -> ApiResult<DeliveryMethod> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let method = DeliveryMethodRepository::new(state.pool())
        .create(&input)
        .await?;
    state.cache().invalidate_delivery_methods().await;
    Ok(ApiResponse::with_message(method, "Delivery method created"))
}

/// PUT /api/admin/delivery-methods/{id}
#[instrument(skip(state, input))]
async fn update_delivery_method(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<DeliveryMethodId>,
    Json(input): Json<DeliveryMethodInput>,
) -> ApiResult<DeliveryMethod> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let method = DeliveryMethodRepository::new(state.pool())
        .update(id, &input)
        .await?;
    state.cache().invalidate_delivery_methods().await;
    Ok(ApiResponse::ok(method))
}

/// DELETE /api/admin/delivery-methods/{id}
#[instrument(skip(state))]
async fn delete_delivery_method(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<DeliveryMethodId>,
) -> ApiResult<()> {
    DeliveryMethodRepository::new(state.pool()).delete(id).await?;
    state.cache().invalidate_delivery_methods().await;
    Ok(ApiResponse::message("Delivery method deleted"))
}

// =============================================================================
// Shipping rates
// =============================================================================

/// GET /api/logistics/shipping-rates
async fn list_shipping_rates(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Query(query): Query<ShippingRateQuery>,
) -> ApiResult<Vec<ShippingRate>> {
    let rates = ShippingRateRepository::new(state.pool())
        .list(query.delivery_method.as_deref())
        .await?;
    Ok(ApiResponse::ok(rates))
}

/// POST /api/logistics/shipping-rates
async fn create_shipping_rate(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Json(input): Json<ShippingRateInput>,
) -> ApiResult<ShippingRate> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let rate = ShippingRateRepository::new(state.pool())
        .create(&input)
        .await?;
    Ok(ApiResponse::with_message(rate, "Shipping rate created"))
}

/// PUT /api/logistics/shipping-rates/{id}
async fn update_shipping_rate(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Path(id): Path<ShippingRateId>,
    Json(input): Json<ShippingRateInput>,
) -> ApiResult<ShippingRate> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let rate = ShippingRateRepository::new(state.pool())
        .update(id, &input)
        .await?;
    Ok(ApiResponse::ok(rate))
}

/// DELETE /api/logistics/shipping-rates/{id}
async fn delete_shipping_rate(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Path(id): Path<ShippingRateId>,
) -> ApiResult<()> {
    ShippingRateRepository::new(state.pool()).delete(id).await?;
    Ok(ApiResponse::message("Shipping rate deleted"))
}

// =============================================================================
// Iraqi geography
// =============================================================================

/// GET /api/iraqi-provinces
async fn public_provinces(State(state): State<AppState>) -> ApiResult<Vec<Province>> {
    let provinces = GeographyRepository::new(state.pool()).provinces(true).await?;
    Ok(ApiResponse::ok(provinces))
}

/// GET /api/iraqi-cities
async fn public_cities(
    State(state): State<AppState>,
    Query(query): Query<CityQuery>,
) -> ApiResult<Vec<City>> {
    let cities = GeographyRepository::new(state.pool())
        .cities(query.province_id, true)
        .await?;
    Ok(ApiResponse::ok(cities))
}

/// GET /api/admin/geography/provinces
///
/// Includes inactive provinces.
async fn admin_provinces(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<Province>> {
    let provinces = GeographyRepository::new(state.pool()).provinces(false).await?;
    Ok(ApiResponse::ok(provinces))
}

/// POST /api/admin/geography/provinces
async fn create_province(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Json(input): Json<ProvinceInput>,
) -> ApiResult<Province> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let province = GeographyRepository::new(state.pool())
        .create_province(&input)
        .await?;
    Ok(ApiResponse::with_message(province, "Province created"))
}

/// PUT /api/admin/geography/provinces/{id}
async fn update_province(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<ProvinceId>,
    Json(input): Json<ProvinceInput>,
) -> ApiResult<Province> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let province = GeographyRepository::new(state.pool())
        .update_province(id, &input)
        .await?;
    Ok(ApiResponse::ok(province))
}

/// DELETE /api/admin/geography/provinces/{id}
async fn delete_province(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<ProvinceId>,
) -> ApiResult<()> {
    GeographyRepository::new(state.pool())
        .delete_province(id)
        .await?;
    Ok(ApiResponse::message("Province deleted"))
}

/// GET /api/admin/geography/cities
async fn admin_cities(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<CityQuery>,
) -> ApiResult<Vec<City>> {
    let cities = GeographyRepository::new(state.pool())
        .cities(query.province_id, false)
        .await?;
    Ok(ApiResponse::ok(cities))
}

/// POST /api/admin/geography/cities
async fn create_city(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Json(input): Json<CityInput>,
) -> ApiResult<City> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let city = GeographyRepository::new(state.pool())
        .create_city(&input)
        .await?;
    Ok(ApiResponse::with_message(city, "City created"))
}

/// PUT /api/admin/geography/cities/{id}
async fn update_city(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<CityId>,
    Json(input): Json<CityInput>,
) -> ApiResult<City> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let city = GeographyRepository::new(state.pool())
        .update_city(id, &input)
        .await?;
    Ok(ApiResponse::ok(city))
}

/// DELETE /api/admin/geography/cities/{id}
async fn delete_city(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<CityId>,
) -> ApiResult<()> {
    GeographyRepository::new(state.pool()).delete_city(id).await?;
    Ok(ApiResponse::message("City deleted"))
}

// =============================================================================
// International
// =============================================================================

/// GET /api/logistics/international-countries
async fn list_countries(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
) -> ApiResult<Vec<InternationalCountry>> {
    let countries = GeographyRepository::new(state.pool()).countries().await?;
    Ok(ApiResponse::ok(countries))
}

/// POST /api/logistics/international-countries
async fn create_country(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Json(input): Json<InternationalCountryInput>,
) -> ApiResult<InternationalCountry> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let country = GeographyRepository::new(state.pool())
        .create_country(&input)
        .await?;
    Ok(ApiResponse::with_message(country, "Country created"))
}

/// PUT /api/logistics/international-countries/{id}
async fn update_country(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Path(id): Path<CountryId>,
    Json(input): Json<InternationalCountryInput>,
) -> ApiResult<InternationalCountry> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let country = GeographyRepository::new(state.pool())
        .update_country(id, &input)
        .await?;
    Ok(ApiResponse::ok(country))
}

/// DELETE /api/logistics/international-countries/{id}
async fn delete_country(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Path(id): Path<CountryId>,
) -> ApiResult<()> {
    GeographyRepository::new(state.pool())
        .delete_country(id)
        .await?;
    Ok(ApiResponse::message("Country deleted"))
}

/// GET /api/logistics/international-cities
async fn list_international_cities(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Query(query): Query<InternationalCityQuery>,
) -> ApiResult<Vec<InternationalCity>> {
    let cities = GeographyRepository::new(state.pool())
        .international_cities(query.country_id)
        .await?;
    Ok(ApiResponse::ok(cities))
}

/// POST /api/logistics/international-cities
async fn create_international_city(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Json(input): Json<InternationalCityInput>,
) -> ApiResult<InternationalCity> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let city = GeographyRepository::new(state.pool())
        .create_international_city(&input)
        .await?;
    Ok(ApiResponse::with_message(city, "City created"))
}

/// PUT /api/logistics/international-cities/{id}
async fn update_international_city(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Path(id): Path<InternationalCityId>,
    Json(input): Json<InternationalCityInput>,
) -> ApiResult<InternationalCity> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let city = GeographyRepository::new(state.pool())
        .update_international_city(id, &input)
        .await?;
    Ok(ApiResponse::ok(city))
}

/// DELETE /api/logistics/international-cities/{id}
async fn delete_international_city(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Path(id): Path<InternationalCityId>,
) -> ApiResult<()> {
    GeographyRepository::new(state.pool())
        .delete_international_city(id)
        .await?;
    Ok(ApiResponse::message("City deleted"))
}

// =============================================================================
// Vehicles
// =============================================================================

/// GET /api/logistics/vehicle-templates
async fn list_vehicle_templates(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
) -> ApiResult<Vec<VehicleTemplate>> {
    let templates = VehicleTemplateRepository::new(state.pool())
        .list(false)
        .await?;
    Ok(ApiResponse::ok(templates))
}

/// POST /api/logistics/vehicle-templates
async fn create_vehicle_template(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Json(input): Json<VehicleTemplateInput>,
) -> ApiResult<VehicleTemplate> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let template = VehicleTemplateRepository::new(state.pool())
        .create(&input)
        .await?;
    Ok(ApiResponse::with_message(template, "Vehicle template created"))
}

/// PUT /api/logistics/vehicle-templates/{id}
async fn update_vehicle_template(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Path(id): Path<VehicleTemplateId>,
    Json(input): Json<VehicleTemplateInput>,
) -> ApiResult<VehicleTemplate> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let template = VehicleTemplateRepository::new(state.pool())
        .update(id, &input)
        .await?;
    Ok(ApiResponse::ok(template))
}

/// DELETE /api/logistics/vehicle-templates/{id}
async fn delete_vehicle_template(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Path(id): Path<VehicleTemplateId>,
) -> ApiResult<()> {
    VehicleTemplateRepository::new(state.pool())
        .delete(id)
        .await?;
    Ok(ApiResponse::message("Vehicle template deleted"))
}

/// POST /api/logistics/calculate-vehicle
#[instrument(skip(_dept, state, req), fields(weight_kg = %req.weight_kg, city = %req.destination_city))]
async fn calculate_vehicle(
    _dept: RequireDepartment<Logistics>,
    State(state): State<AppState>,
    Json(req): Json<VehicleRequest>,
) -> ApiResult<VehicleQuote> {
    let quote = VehicleService::new(state.pool())
        .calculate(req.weight_kg, &req.destination_city, req.contains_flammable)
        .await?;
    Ok(ApiResponse::ok(quote))
}
