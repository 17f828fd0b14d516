//! Tax, delivery, vehicle and geography configuration.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use momtazchem_core::{
    AdminUserId, CityId, CountryId, DeliveryMethodId, InternationalCityId, ProductId, ProvinceId,
    ShippingRateId, VatSettingsId, VehicleTemplateId,
};

use super::{clean_optional, require_text};

const fn default_true() -> bool {
    true
}

// =============================================================================
// VAT
// =============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VatSettings {
    pub id: VatSettingsId,
    pub vat_rate: Decimal,
    pub vat_enabled: bool,
    pub exempt_categories: Vec<String>,
    pub exempt_product_ids: Vec<i32>,
    pub default_region: String,
    pub vat_included_in_price: bool,
    pub vat_display_name: String,
    pub vat_number: Option<String>,
    pub shipping_taxable: bool,
    pub minimum_taxable_amount: Decimal,
    pub is_active: bool,
    pub effective_date: NaiveDate,
    pub notes: Option<String>,
    pub updated_by: Option<AdminUserId>,
    pub updated_at: DateTime<Utc>,
}

impl VatSettings {
    #[must_use]
    pub fn is_exempt(&self, product_id: ProductId, category: &str) -> bool {
        self.exempt_product_ids.contains(&product_id.as_i32())
            || self
                .exempt_categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(category))
    }
}

/// What the storefront needs to show VAT.
#[derive(Debug, Clone, Serialize)]
pub struct PublicVat {
    pub vat_rate: Decimal,
    pub vat_enabled: bool,
    pub vat_included_in_price: bool,
    pub vat_display_name: String,
}

impl From<&VatSettings> for PublicVat {
    fn from(v: &VatSettings) -> Self {
        Self {
            vat_rate: v.vat_rate,
            vat_enabled: v.vat_enabled,
            vat_included_in_price: v.vat_included_in_price,
            vat_display_name: v.vat_display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VatSettingsInput {
    pub vat_rate: Decimal,
    pub vat_enabled: bool,
    #[serde(default)]
    pub exempt_categories: Vec<String>,
    #[serde(default)]
    pub exempt_product_ids: Vec<i32>,
    pub default_region: Option<String>,
    #[serde(default)]
    pub vat_included_in_price: bool,
    pub vat_display_name: Option<String>,
    pub vat_number: Option<String>,
    #[serde(default)]
    pub shipping_taxable: bool,
    #[serde(default)]
    pub minimum_taxable_amount: Decimal,
    pub effective_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl VatSettingsInput {
    /// # Errors
    ///
    /// Returns a message when the rate is outside 0..=100 or the minimum is
    /// negative.
    pub fn validate(mut self) -> Result<Self, String> {
        if self.vat_rate < Decimal::ZERO || self.vat_rate > Decimal::ONE_HUNDRED {
            return Err("vat_rate must be between 0 and 100".to_owned());
        }
        if self.minimum_taxable_amount < Decimal::ZERO {
            return Err("minimum_taxable_amount must not be negative".to_owned());
        }
        self.exempt_categories = self
            .exempt_categories
            .into_iter()
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty())
            .collect();
        self.default_region = clean_optional(self.default_region);
        self.vat_display_name = clean_optional(self.vat_display_name);
        self.vat_number = clean_optional(self.vat_number);
        self.notes = clean_optional(self.notes);
        Ok(self)
    }
}

// =============================================================================
// Delivery methods and shipping rates
// =============================================================================

/// Value of the delivery method priced by vehicle selection.
pub const SMART_VEHICLE_METHOD: &str = "smart_vehicle";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DeliveryMethod {
    pub id: DeliveryMethodId,
    pub value: String,
    pub label: String,
    pub icon: String,
    pub color: String,
    pub base_cost: Decimal,
    pub cost_per_kg: Decimal,
    pub minimum_order: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub estimated_days: i32,
    pub max_distance_km: Option<i32>,
    pub available_areas: Vec<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryMethodInput {
    pub value: String,
    pub label: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub base_cost: Decimal,
    #[serde(default)]
    pub cost_per_kg: Decimal,
    #[serde(default)]
    pub minimum_order: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub estimated_days: Option<i32>,
    pub max_distance_km: Option<i32>,
    #[serde(default)]
    pub available_areas: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
    pub description: Option<String>,
}

/// Whether `value` is a lowercase slug (`a-z`, `0-9`, `_`, `-`).
#[must_use]
pub fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

impl DeliveryMethodInput {
    /// # Errors
    ///
    /// Returns a message for a non-slug value, blank label or negative money.
    pub fn validate(mut self) -> Result<Self, String> {
        self.value = self.value.trim().to_owned();
        if !is_slug(&self.value) {
            return Err("value must be a lowercase slug".to_owned());
        }
        require_text(&self.label, "label")?;
        if self.base_cost < Decimal::ZERO
            || self.cost_per_kg < Decimal::ZERO
            || self.minimum_order < Decimal::ZERO
            || self.free_shipping_threshold.is_some_and(|t| t < Decimal::ZERO)
        {
            return Err("costs must not be negative".to_owned());
        }
        if self.estimated_days.is_some_and(|d| d < 0) {
            return Err("estimated_days must not be negative".to_owned());
        }
        self.label = self.label.trim().to_owned();
        self.icon = clean_optional(self.icon);
        self.color = clean_optional(self.color);
        self.description = clean_optional(self.description);
        Ok(self)
    }
}

/// Destination- and weight-specific override for a delivery method.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ShippingRate {
    pub id: ShippingRateId,
    pub delivery_method: String,
    pub province_name: Option<String>,
    pub city_name: Option<String>,
    pub min_weight_kg: Decimal,
    pub max_weight_kg: Option<Decimal>,
    pub base_price: Decimal,
    pub price_per_kg: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub estimated_days: Option<i32>,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingRateInput {
    pub delivery_method: String,
    pub province_name: Option<String>,
    pub city_name: Option<String>,
    #[serde(default)]
    pub min_weight_kg: Decimal,
    pub max_weight_kg: Option<Decimal>,
    #[serde(default)]
    pub base_price: Decimal,
    #[serde(default)]
    pub price_per_kg: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub estimated_days: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub description: Option<String>,
}

impl ShippingRateInput {
    /// # Errors
    ///
    /// Returns a message for an unknown-looking method, negative prices or an
    /// inverted weight band.
    pub fn validate(mut self) -> Result<Self, String> {
        self.delivery_method = self.delivery_method.trim().to_owned();
        if !is_slug(&self.delivery_method) {
            return Err("delivery_method must be a delivery method value".to_owned());
        }
        if self.base_price < Decimal::ZERO
            || self.price_per_kg < Decimal::ZERO
            || self.min_weight_kg < Decimal::ZERO
        {
            return Err("prices and weights must not be negative".to_owned());
        }
        if self.max_weight_kg.is_some_and(|max| max < self.min_weight_kg) {
            return Err("max_weight_kg must be at least min_weight_kg".to_owned());
        }
        self.province_name = clean_optional(self.province_name);
        self.city_name = clean_optional(self.city_name);
        self.description = clean_optional(self.description);
        Ok(self)
    }
}

// =============================================================================
// Vehicles
// =============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VehicleTemplate {
    pub id: VehicleTemplateId,
    pub name: String,
    pub vehicle_type: String,
    pub max_weight_kg: Decimal,
    pub base_price: Decimal,
    pub price_per_km: Decimal,
    pub supports_hazardous: bool,
    pub estimated_hours: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleTemplateInput {
    pub name: String,
    pub vehicle_type: String,
    pub max_weight_kg: Decimal,
    #[serde(default)]
    pub base_price: Decimal,
    pub price_per_km: Decimal,
    #[serde(default)]
    pub supports_hazardous: bool,
    pub estimated_hours: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl VehicleTemplateInput {
    /// # Errors
    ///
    /// Returns a message for blank names, non-positive capacity or negative
    /// prices.
    pub fn validate(mut self) -> Result<Self, String> {
        require_text(&self.name, "name")?;
        require_text(&self.vehicle_type, "vehicle_type")?;
        if self.max_weight_kg <= Decimal::ZERO {
            return Err("max_weight_kg must be positive".to_owned());
        }
        if self.base_price < Decimal::ZERO || self.price_per_km < Decimal::ZERO {
            return Err("prices must not be negative".to_owned());
        }
        self.name = self.name.trim().to_owned();
        self.vehicle_type = self.vehicle_type.trim().to_owned();
        self.estimated_hours = clean_optional(self.estimated_hours);
        Ok(self)
    }
}

// =============================================================================
// Geography
// =============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Province {
    pub id: ProvinceId,
    pub name_arabic: String,
    pub name_english: String,
    pub name_kurdish: Option<String>,
    pub capital: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvinceInput {
    pub name_arabic: String,
    pub name_english: String,
    pub name_kurdish: Option<String>,
    pub capital: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ProvinceInput {
    /// # Errors
    ///
    /// Returns a message when either required name is blank.
    pub fn validate(mut self) -> Result<Self, String> {
        require_text(&self.name_arabic, "name_arabic")?;
        require_text(&self.name_english, "name_english")?;
        self.name_arabic = self.name_arabic.trim().to_owned();
        self.name_english = self.name_english.trim().to_owned();
        self.name_kurdish = clean_optional(self.name_kurdish);
        self.capital = clean_optional(self.capital);
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct City {
    pub id: CityId,
    pub province_id: ProvinceId,
    pub province_name: String,
    pub name_arabic: String,
    pub name_english: String,
    pub name_kurdish: Option<String>,
    pub distance_from_erbil_km: i32,
    pub is_province_capital: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CityInput {
    pub province_id: ProvinceId,
    pub name_arabic: String,
    pub name_english: String,
    pub name_kurdish: Option<String>,
    #[serde(default)]
    pub distance_from_erbil_km: i32,
    #[serde(default)]
    pub is_province_capital: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl CityInput {
    /// # Errors
    ///
    /// Returns a message for blank names or a negative distance.
    pub fn validate(mut self) -> Result<Self, String> {
        require_text(&self.name_arabic, "name_arabic")?;
        require_text(&self.name_english, "name_english")?;
        if self.distance_from_erbil_km < 0 {
            return Err("distance_from_erbil_km must not be negative".to_owned());
        }
        self.name_arabic = self.name_arabic.trim().to_owned();
        self.name_english = self.name_english.trim().to_owned();
        self.name_kurdish = clean_optional(self.name_kurdish);
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InternationalCountry {
    pub id: CountryId,
    pub name_english: String,
    pub name_local: Option<String>,
    pub country_code: String,
    pub currency: Option<String>,
    pub shipping_zone: Option<String>,
    pub customs_info: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InternationalCountryInput {
    pub name_english: String,
    pub name_local: Option<String>,
    pub country_code: String,
    pub currency: Option<String>,
    pub shipping_zone: Option<String>,
    pub customs_info: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl InternationalCountryInput {
    /// # Errors
    ///
    /// Returns a message for a blank name or a code that is not two letters.
    pub fn validate(mut self) -> Result<Self, String> {
        require_text(&self.name_english, "name_english")?;
        let code = self.country_code.trim().to_ascii_uppercase();
        if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err("country_code must be two letters".to_owned());
        }
        self.country_code = code;
        self.name_english = self.name_english.trim().to_owned();
        self.name_local = clean_optional(self.name_local);
        self.currency = clean_optional(self.currency).map(|c| c.to_ascii_uppercase());
        self.shipping_zone = clean_optional(self.shipping_zone);
        self.customs_info = clean_optional(self.customs_info);
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InternationalCity {
    pub id: InternationalCityId,
    pub country_id: CountryId,
    pub name_english: String,
    pub name_local: Option<String>,
    pub distance_km: i32,
    pub customs_info: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InternationalCityInput {
    pub country_id: CountryId,
    pub name_english: String,
    pub name_local: Option<String>,
    #[serde(default)]
    pub distance_km: i32,
    pub customs_info: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl InternationalCityInput {
    /// # Errors
    ///
    /// Returns a message for a blank name or negative distance.
    pub fn validate(mut self) -> Result<Self, String> {
        require_text(&self.name_english, "name_english")?;
        if self.distance_km < 0 {
            return Err("distance_km must not be negative".to_owned());
        }
        self.name_english = self.name_english.trim().to_owned();
        self.name_local = clean_optional(self.name_local);
        self.customs_info = clean_optional(self.customs_info);
        Ok(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_slug() {
        assert!(is_slug("smart_vehicle"));
        assert!(is_slug("personal-pickup"));
        assert!(!is_slug("Courier"));
        assert!(!is_slug(""));
        assert!(!is_slug("with space"));
    }

    #[test]
    fn test_vat_rate_bounds() {
        let input: VatSettingsInput =
            serde_json::from_value(serde_json::json!({"vat_rate": "101", "vat_enabled": true}))
                .unwrap();
        assert!(input.validate().is_err());

        let input: VatSettingsInput = serde_json::from_value(serde_json::json!({
            "vat_rate": "9",
            "vat_enabled": true,
            "exempt_categories": [" agricultural-fertilizers ", ""]
        }))
        .unwrap();
        let input = input.validate().unwrap();
        assert_eq!(input.exempt_categories, vec!["agricultural-fertilizers"]);
    }

    #[test]
    fn test_vat_exemption_matches_category_case_insensitively() {
        let vat = VatSettings {
            id: VatSettingsId::new(1),
            vat_rate: d("9"),
            vat_enabled: true,
            exempt_categories: vec!["Water-Treatment".into()],
            exempt_product_ids: vec![7],
            default_region: "Iraq".into(),
            vat_included_in_price: false,
            vat_display_name: "VAT".into(),
            vat_number: None,
            shipping_taxable: false,
            minimum_taxable_amount: Decimal::ZERO,
            is_active: true,
            effective_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            notes: None,
            updated_by: None,
            updated_at: Utc::now(),
        };
        assert!(vat.is_exempt(ProductId::new(7), "fuel-additives"));
        assert!(vat.is_exempt(ProductId::new(1), "water-treatment"));
        assert!(!vat.is_exempt(ProductId::new(1), "paint-thinner"));
    }

    #[test]
    fn test_shipping_rate_weight_band() {
        let input: ShippingRateInput = serde_json::from_value(serde_json::json!({
            "delivery_method": "courier",
            "min_weight_kg": "10",
            "max_weight_kg": "5"
        }))
        .unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_country_code_normalized() {
        let input: InternationalCountryInput = serde_json::from_value(serde_json::json!({
            "name_english": "Turkey",
            "country_code": "tr",
            "currency": "try"
        }))
        .unwrap();
        let input = input.validate().unwrap();
        assert_eq!(input.country_code, "TR");
        assert_eq!(input.currency.as_deref(), Some("TRY"));
    }

    #[test]
    fn test_vehicle_capacity_must_be_positive() {
        let input: VehicleTemplateInput = serde_json::from_value(serde_json::json!({
            "name": "Pickup",
            "vehicle_type": "pickup",
            "max_weight_kg": "0",
            "price_per_km": "500"
        }))
        .unwrap();
        assert!(input.validate().is_err());
    }
}
