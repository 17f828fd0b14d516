//! Vehicle selection for the `smart_vehicle` delivery method.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use momtazchem_core::{VehicleTemplateId, round_money};

use crate::db::{GeographyRepository, RepositoryError, VehicleTemplateRepository};
use crate::models::logistics::VehicleTemplate;

/// Weight carried for the base price; every kilogram beyond costs extra.
const INCLUDED_WEIGHT_KG: Decimal = Decimal::from_parts(50, 0, 0, false, 0);
const SURCHARGE_PER_KG: Decimal = Decimal::TEN;

#[derive(Debug, Error)]
pub enum VehicleError {
    #[error("unknown destination city: {0}")]
    UnknownCity(String),

    #[error("no active vehicle can carry {weight_kg} kg (hazardous: {hazardous})")]
    NoVehicleFits { weight_kg: Decimal, hazardous: bool },

    #[error("weight must be positive")]
    InvalidWeight,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Cost breakdown for the chosen vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VehicleQuote {
    pub template_id: VehicleTemplateId,
    pub vehicle_name: String,
    pub vehicle_type: String,
    pub max_weight_kg: Decimal,
    pub weight_kg: Decimal,
    pub distance_km: i32,
    pub base_price: Decimal,
    pub distance_cost: Decimal,
    pub weight_surcharge: Decimal,
    pub total_cost: Decimal,
}

/// Price one template for a trip.
#[must_use]
pub fn price_trip(template: &VehicleTemplate, weight_kg: Decimal, distance_km: i32) -> VehicleQuote {
    let distance_cost = round_money(Decimal::from(distance_km) * template.price_per_km);
    let weight_surcharge =
        round_money((weight_kg - INCLUDED_WEIGHT_KG).max(Decimal::ZERO) * SURCHARGE_PER_KG);
    let total_cost = round_money(template.base_price + distance_cost + weight_surcharge);

    VehicleQuote {
        template_id: template.id,
        vehicle_name: template.name.clone(),
        vehicle_type: template.vehicle_type.clone(),
        max_weight_kg: template.max_weight_kg,
        weight_kg,
        distance_km,
        base_price: template.base_price,
        distance_cost,
        weight_surcharge,
        total_cost,
    }
}

/// Cheapest active template that can carry `weight_kg` (and hazardous
/// goods when needed). Ties go to the smaller vehicle.
///
/// # Errors
///
/// Returns `VehicleError::NoVehicleFits` when nothing qualifies.
pub fn select_vehicle(
    templates: &[VehicleTemplate],
    weight_kg: Decimal,
    distance_km: i32,
    hazardous: bool,
) -> Result<VehicleQuote, VehicleError> {
    if weight_kg <= Decimal::ZERO {
        return Err(VehicleError::InvalidWeight);
    }

    templates
        .iter()
        .filter(|t| t.is_active && t.max_weight_kg >= weight_kg)
        .filter(|t| !hazardous || t.supports_hazardous)
        .map(|t| price_trip(t, weight_kg, distance_km))
        .min_by(|a, b| {
            a.total_cost
                .cmp(&b.total_cost)
                .then(a.max_weight_kg.cmp(&b.max_weight_kg))
        })
        .ok_or(VehicleError::NoVehicleFits {
            weight_kg,
            hazardous,
        })
}

/// Looks up distances and templates, then selects.
pub struct VehicleService<'a> {
    geography: GeographyRepository<'a>,
    templates: VehicleTemplateRepository<'a>,
}

impl<'a> VehicleService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            geography: GeographyRepository::new(pool),
            templates: VehicleTemplateRepository::new(pool),
        }
    }

    /// Pick a vehicle for a shipment to `destination_city`.
    ///
    /// # Errors
    ///
    /// Returns `VehicleError::UnknownCity` if the city is not an active Iraqi
    /// city, `VehicleError::NoVehicleFits` if no template qualifies.
    #[tracing::instrument(skip(self))]
    pub async fn calculate(
        &self,
        weight_kg: Decimal,
        destination_city: &str,
        contains_flammable: bool,
    ) -> Result<VehicleQuote, VehicleError> {
        let city = self
            .geography
            .find_city(destination_city.trim())
            .await?
            .ok_or_else(|| VehicleError::UnknownCity(destination_city.trim().to_owned()))?;

        let templates = self.templates.list(true).await?;
        select_vehicle(
            &templates,
            weight_kg,
            city.distance_from_erbil_km,
            contains_flammable,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn template(id: i32, name: &str, max: i64, base: i64, per_km: i64, hazardous: bool) -> VehicleTemplate {
        VehicleTemplate {
            id: VehicleTemplateId::new(id),
            name: name.into(),
            vehicle_type: name.to_lowercase(),
            max_weight_kg: Decimal::from(max),
            base_price: Decimal::from(base),
            price_per_km: Decimal::from(per_km),
            supports_hazardous: hazardous,
            estimated_hours: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn fleet() -> Vec<VehicleTemplate> {
        vec![
            template(1, "Motorcycle", 20, 5_000, 100, false),
            template(2, "Pickup", 1_000, 25_000, 500, false),
            template(3, "Tanker", 10_000, 60_000, 900, true),
        ]
    }

    #[test]
    fn test_cost_formula() {
        let quote = price_trip(&fleet()[1], Decimal::from(80), 90);
        assert_eq!(quote.distance_cost, Decimal::from(45_000));
        assert_eq!(quote.weight_surcharge, Decimal::from(300));
        assert_eq!(quote.total_cost, Decimal::from(70_300));
    }

    #[test]
    fn test_no_surcharge_up_to_included_weight() {
        let quote = price_trip(&fleet()[0], Decimal::from(15), 10);
        assert_eq!(quote.weight_surcharge, Decimal::ZERO);
        assert_eq!(quote.total_cost, Decimal::from(6_000));
    }

    #[test]
    fn test_selects_cheapest_that_fits() {
        let quote = select_vehicle(&fleet(), Decimal::from(15), 10, false).unwrap();
        assert_eq!(quote.vehicle_name, "Motorcycle");

        let quote = select_vehicle(&fleet(), Decimal::from(300), 10, false).unwrap();
        assert_eq!(quote.vehicle_name, "Pickup");
    }

    #[test]
    fn test_hazardous_requires_support() {
        let quote = select_vehicle(&fleet(), Decimal::from(15), 10, true).unwrap();
        assert_eq!(quote.vehicle_name, "Tanker");
    }

    #[test]
    fn test_inactive_and_overweight() {
        let mut fleet = fleet();
        fleet[2].is_active = false;
        assert!(matches!(
            select_vehicle(&fleet, Decimal::from(2_000), 10, false),
            Err(VehicleError::NoVehicleFits { .. })
        ));
        assert!(matches!(
            select_vehicle(&fleet, Decimal::ZERO, 10, false),
            Err(VehicleError::InvalidWeight)
        ));
    }
}
