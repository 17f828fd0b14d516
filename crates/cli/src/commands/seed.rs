//! Reference data: Iraqi geography and storefront defaults.
//!
//! Both commands are idempotent. Geography rows are upserted; defaults are
//! only inserted when missing, so edits made in the back office survive a
//! re-run.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use momtazchem_server::db::{
    DeliveryMethodRepository, EmailSettingsRepository, GeographyRepository, RepositoryError,
    VehicleTemplateRepository,
};
use momtazchem_server::models::logistics::{
    DeliveryMethodInput, SMART_VEHICLE_METHOD, VehicleTemplateInput,
};
use momtazchem_server::services::email::DEFAULT_CATEGORIES;

use super::{CommandError, connect};

/// English names for the Arabic province names found in the source sheets.
const PROVINCE_NAMES: &[(&str, &str)] = &[
    ("واسط", "Wasit"),
    ("نينوى", "Ninawa"),
    ("نينوا", "Ninawa"),
    ("بغداد", "Baghdad"),
    ("بابل", "Babylon"),
    ("الأنبار", "Anbar"),
    ("البصرة", "Basra"),
    ("البصره", "Basra"),
    ("ذي قار", "Dhi Qar"),
    ("كربلاء", "Karbala"),
    ("النجف", "Najaf"),
    ("القادسية", "Al-Qadisiyyah"),
    ("القادسيه", "Al-Qadisiyyah"),
    ("المثنى", "Al Muthanna"),
    ("المثني", "Al Muthanna"),
    ("ميسان", "Maysan"),
    ("ديالى", "Diyala"),
    ("ديالي", "Diyala"),
    ("صلاح الدين", "Salah ad Din"),
    ("كركوك", "Kirkuk"),
    ("اربيل", "Erbil"),
    ("أربيل", "Erbil"),
    ("السليمانية", "Sulaymaniyah"),
    ("السليمانيه", "Sulaymaniyah"),
    ("دهوك", "Dohuk"),
];

/// One row of a geography seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct GeographyRow {
    /// City name in Arabic.
    pub city: String,
    /// Province name in Arabic, or English if no Arabic name is known.
    pub province: String,
    pub distance_from_erbil_km: i32,
    pub name_english: Option<String>,
}

/// A province and the cities to upsert into it.
#[derive(Debug, PartialEq, Eq)]
struct ProvincePlan {
    name_arabic: String,
    name_english: String,
    cities: Vec<CityPlan>,
}

#[derive(Debug, PartialEq, Eq)]
struct CityPlan {
    name_arabic: String,
    name_english: String,
    distance_from_erbil_km: i32,
}

/// Persian keyboards produce ی and ک where Arabic uses ي and ك.
fn normalise_arabic(name: &str) -> String {
    name.trim().replace('ی', "ي").replace('ک', "ك")
}

fn english_province_name(arabic: &str) -> Option<&'static str> {
    PROVINCE_NAMES
        .iter()
        .find(|(ar, _)| *ar == arabic)
        .map(|(_, en)| *en)
}

/// Group valid rows by province. Rows with blank names or a negative
/// distance are skipped and reported.
fn plan_geography(rows: Vec<GeographyRow>) -> (Vec<ProvincePlan>, usize) {
    let mut provinces: BTreeMap<String, ProvincePlan> = BTreeMap::new();
    let mut skipped = 0;

    for row in rows {
        let city = normalise_arabic(&row.city);
        let province = normalise_arabic(&row.province);
        if city.is_empty() || province.is_empty() || row.distance_from_erbil_km < 0 {
            warn!(city = %row.city, province = %row.province, "Skipping invalid row");
            skipped += 1;
            continue;
        }

        let name_english = english_province_name(&province)
            .map_or_else(|| province.clone(), str::to_owned);
        let entry = provinces
            .entry(name_english.clone())
            .or_insert_with(|| ProvincePlan {
                name_arabic: province,
                name_english,
                cities: Vec::new(),
            });

        let city_english = row
            .name_english
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| city.clone());
        entry.cities.push(CityPlan {
            name_arabic: city,
            name_english: city_english,
            distance_from_erbil_km: row.distance_from_erbil_km,
        });
    }

    (provinces.into_values().collect(), skipped)
}

/// Upsert provinces and cities from a YAML list of rows.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, contains no
/// usable rows, or a database statement fails.
pub async fn geography(file_path: &Path) -> Result<(), CommandError> {
    info!(path = %file_path.display(), "Loading geography");

    let content = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|e| CommandError::Io(file_path.display().to_string(), e))?;
    let rows: Vec<GeographyRow> = serde_yaml::from_str(&content)?;
    let total = rows.len();

    let (plan, skipped) = plan_geography(rows);
    if plan.is_empty() {
        return Err(CommandError::InvalidSeed(format!(
            "no usable rows in {} ({total} read)",
            file_path.display()
        )));
    }

    let pool = connect().await?;
    let repo = GeographyRepository::new(&pool);

    let mut cities = 0;
    for province in &plan {
        let province_id = repo
            .upsert_province(&province.name_english, &province.name_arabic)
            .await?;
        for city in &province.cities {
            repo.upsert_city(
                province_id,
                &city.name_english,
                &city.name_arabic,
                city.distance_from_erbil_km,
            )
            .await?;
            cities += 1;
        }
    }

    info!("Geography seeded!");
    info!("  Provinces: {}", plan.len());
    info!("  Cities: {cities}");
    if skipped > 0 {
        warn!("  Skipped rows: {skipped}");
    }
    Ok(())
}

fn delivery_method(
    value: &str,
    label: &str,
    icon: &str,
    base_cost: i64,
    cost_per_kg: i64,
    estimated_days: i32,
    sort_order: i32,
) -> DeliveryMethodInput {
    DeliveryMethodInput {
        value: value.to_owned(),
        label: label.to_owned(),
        icon: Some(icon.to_owned()),
        color: None,
        base_cost: Decimal::from(base_cost),
        cost_per_kg: Decimal::from(cost_per_kg),
        minimum_order: Decimal::ZERO,
        free_shipping_threshold: None,
        estimated_days: Some(estimated_days),
        max_distance_km: None,
        available_areas: Vec::new(),
        is_active: true,
        sort_order,
        description: None,
    }
}

/// Delivery methods offered out of the box. Amounts are IQD.
fn default_delivery_methods() -> Vec<DeliveryMethodInput> {
    vec![
        delivery_method("courier", "Courier", "bike", 5_000, 500, 2, 1),
        delivery_method("post", "Iraq Post", "mail", 3_000, 250, 5, 2),
        delivery_method("truck", "Truck freight", "truck", 25_000, 100, 4, 3),
        delivery_method("personal_pickup", "Pickup from warehouse", "store", 0, 0, 0, 4),
        delivery_method(SMART_VEHICLE_METHOD, "Smart vehicle selection", "route", 0, 0, 3, 5),
    ]
}

fn vehicle(
    name: &str,
    vehicle_type: &str,
    max_weight_kg: i64,
    base_price: i64,
    price_per_km: i64,
    supports_hazardous: bool,
    estimated_hours: &str,
) -> VehicleTemplateInput {
    VehicleTemplateInput {
        name: name.to_owned(),
        vehicle_type: vehicle_type.to_owned(),
        max_weight_kg: Decimal::from(max_weight_kg),
        base_price: Decimal::from(base_price),
        price_per_km: Decimal::from(price_per_km),
        supports_hazardous,
        estimated_hours: Some(estimated_hours.to_owned()),
        is_active: true,
    }
}

/// Vehicle fleet used by `smart_vehicle` pricing.
fn default_vehicle_templates() -> Vec<VehicleTemplateInput> {
    vec![
        vehicle("Motorcycle", "motorcycle", 20, 5_000, 250, false, "2-6"),
        vehicle("Pickup", "pickup", 1_000, 15_000, 500, false, "4-12"),
        vehicle("Light truck", "light_truck", 3_500, 40_000, 900, true, "6-24"),
        vehicle("Heavy truck", "heavy_truck", 15_000, 90_000, 1_600, true, "12-48"),
    ]
}

/// Insert missing delivery methods, vehicle templates and email categories.
///
/// # Errors
///
/// Returns an error if the connection or a statement fails.
pub async fn defaults() -> Result<(), CommandError> {
    let pool = connect().await?;

    let methods = DeliveryMethodRepository::new(&pool);
    let mut methods_created = 0;
    for input in default_delivery_methods() {
        match methods.create(&input).await {
            Ok(_) => methods_created += 1,
            Err(RepositoryError::Conflict(_)) => {
                info!(value = %input.value, "Delivery method exists, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    // Vehicle names carry no unique constraint; match on name instead.
    let vehicles = VehicleTemplateRepository::new(&pool);
    let existing: Vec<String> = vehicles
        .list(false)
        .await?
        .into_iter()
        .map(|v| v.name)
        .collect();
    let mut vehicles_created = 0;
    for input in default_vehicle_templates() {
        if existing.iter().any(|name| name.eq_ignore_ascii_case(&input.name)) {
            info!(name = %input.name, "Vehicle template exists, skipping");
            continue;
        }
        vehicles.create(&input).await?;
        vehicles_created += 1;
    }

    let categories_created = EmailSettingsRepository::new(&pool)
        .ensure_categories(DEFAULT_CATEGORIES)
        .await?;

    info!("Defaults seeded!");
    info!("  Delivery methods created: {methods_created}");
    info!("  Vehicle templates created: {vehicles_created}");
    info!("  Email categories created: {categories_created}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
- city: اربیل
  province: اربیل
  distance_from_erbil_km: 0
  name_english: Erbil
- city: سوران
  province: اربیل
  distance_from_erbil_km: 110
- city: البصره
  province: البصره
  distance_from_erbil_km: 780
  name_english: Basra
- city: ''
  province: بغداد
  distance_from_erbil_km: 350
";

    #[test]
    fn test_plan_groups_cities_under_english_province_names() {
        let rows: Vec<GeographyRow> = serde_yaml::from_str(SAMPLE).unwrap();
        let (plan, skipped) = plan_geography(rows);

        assert_eq!(skipped, 1);
        let names: Vec<_> = plan.iter().map(|p| p.name_english.as_str()).collect();
        assert_eq!(names, ["Basra", "Erbil"]);

        let erbil = &plan[1];
        assert_eq!(erbil.name_arabic, "اربيل");
        assert_eq!(erbil.cities.len(), 2);
        assert_eq!(erbil.cities[0].name_english, "Erbil");
        // No English name given: the Arabic one is used
        assert_eq!(erbil.cities[1].name_english, "سوران");
        assert_eq!(erbil.cities[1].distance_from_erbil_km, 110);
    }

    #[test]
    fn test_unknown_province_keeps_its_own_name() {
        let rows = vec![GeographyRow {
            city: "Zakho".into(),
            province: "Zakho District".into(),
            distance_from_erbil_km: 170,
            name_english: None,
        }];
        let (plan, _) = plan_geography(rows);
        assert_eq!(plan[0].name_english, "Zakho District");
    }

    #[test]
    fn test_negative_distance_is_skipped() {
        let rows = vec![GeographyRow {
            city: "كركوك".into(),
            province: "كركوك".into(),
            distance_from_erbil_km: -1,
            name_english: None,
        }];
        let (plan, skipped) = plan_geography(rows);
        assert!(plan.is_empty());
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_defaults_pass_validation() {
        let values: Vec<_> = default_delivery_methods()
            .into_iter()
            .map(|m| m.validate().unwrap().value)
            .collect();
        assert_eq!(
            values,
            ["courier", "post", "truck", "personal_pickup", "smart_vehicle"]
        );
        for v in default_vehicle_templates() {
            v.validate().unwrap();
        }
        assert!(default_vehicle_templates().iter().any(|v| v.supports_hazardous));
    }
}
