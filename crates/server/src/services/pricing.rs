//! Checkout pricing: line discounts, shipping and VAT.
//!
//! The arithmetic lives in pure functions so the storefront quote and order
//! placement price a cart identically. Every component is rounded with
//! [`round_money`] before it is summed.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

use momtazchem_core::{ProductId, round_money};

use super::vehicle::{VehicleError, VehicleQuote, VehicleService};
use crate::db::{DeliveryMethodRepository, ProductRepository, RepositoryError, VatRepository};
use crate::models::Product;
use crate::models::QuantityDiscount;
use crate::models::logistics::{DeliveryMethod, VatSettings};

/// Delivery method priced by vehicle selection instead of weight.
pub const SMART_VEHICLE: &str = "smart_vehicle";

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Error)]
pub enum PricingError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("cart is empty")]
    EmptyCart,

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    #[error("{0} is not available")]
    ProductUnavailable(String),

    #[error("unknown delivery method: {0}")]
    UnknownDeliveryMethod(String),

    #[error("minimum order for this delivery method is {minimum}")]
    BelowMinimumOrder { minimum: Decimal },

    #[error("destination_city is required for smart vehicle delivery")]
    DestinationRequired,

    #[error(transparent)]
    Vehicle(#[from] VehicleError),
}

/// One cart entry as sent by the storefront.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub items: Vec<CartLine>,
    pub delivery_method: String,
    pub destination_city: Option<String>,
}

/// A priced cart line with the product snapshot stored on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_sku: String,
    pub category: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_rate: Decimal,
    pub total_price: Decimal,
    pub weight_kg: Decimal,
    pub is_flammable: bool,
}

/// Full checkout breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub lines: Vec<PricedLine>,
    /// Sum of discounted line totals.
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub shipping_cost: Decimal,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    /// VAT is already inside the prices and not added to the total.
    pub vat_included: bool,
    pub total_amount: Decimal,
    pub total_weight_kg: Decimal,
    pub delivery_method: String,
    pub vehicle: Option<VehicleQuote>,
}

/// Best tier whose threshold the quantity reaches, or zero.
#[must_use]
pub fn best_discount(tiers: &[QuantityDiscount], quantity: i32) -> Decimal {
    tiers
        .iter()
        .filter(|t| t.min_qty <= quantity)
        .map(|t| t.discount)
        .max()
        .unwrap_or(Decimal::ZERO)
}

/// Price `quantity` units of a product.
#[must_use]
pub fn price_line(product: &Product, quantity: i32) -> PricedLine {
    let qty = Decimal::from(quantity);
    let discount_rate = best_discount(&product.quantity_discounts, quantity);
    let total_price = round_money(product.price * qty * (Decimal::ONE - discount_rate));

    PricedLine {
        product_id: product.id,
        product_name: product.name.clone(),
        product_sku: product.sku.clone(),
        category: product.category.clone(),
        quantity,
        unit_price: product.price,
        discount_rate,
        total_price,
        weight_kg: product.gross_weight_kg * qty,
        is_flammable: product.is_flammable,
    }
}

/// Shipping for a method given the discounted subtotal and weight.
/// `vehicle_cost` replaces the weight formula for smart vehicle delivery.
///
/// # Errors
///
/// Returns `PricingError::BelowMinimumOrder` when the subtotal is under the
/// method's minimum.
pub fn shipping_cost(
    method: &DeliveryMethod,
    subtotal: Decimal,
    weight_kg: Decimal,
    vehicle_cost: Option<Decimal>,
) -> Result<Decimal, PricingError> {
    if subtotal < method.minimum_order {
        return Err(PricingError::BelowMinimumOrder {
            minimum: method.minimum_order,
        });
    }
    if method
        .free_shipping_threshold
        .is_some_and(|threshold| threshold <= subtotal)
    {
        return Ok(Decimal::ZERO);
    }
    Ok(round_money(vehicle_cost.unwrap_or_else(|| {
        method.base_cost + method.cost_per_kg * weight_kg
    })))
}

/// VAT due on the lines (and shipping when taxable).
///
/// Returns zero when VAT is off or the subtotal is below the taxable
/// minimum. With prices that include VAT the amount is extracted from the
/// base instead of added on top.
#[must_use]
pub fn vat_amount(
    settings: Option<&VatSettings>,
    lines: &[PricedLine],
    subtotal: Decimal,
    shipping: Decimal,
) -> Decimal {
    let Some(vat) = settings.filter(|v| v.is_active && v.vat_enabled) else {
        return Decimal::ZERO;
    };
    if vat.vat_rate <= Decimal::ZERO || vat.minimum_taxable_amount > subtotal {
        return Decimal::ZERO;
    }

    let mut base: Decimal = lines
        .iter()
        .filter(|l| !vat.is_exempt(l.product_id, &l.category))
        .map(|l| l.total_price)
        .sum();
    if vat.shipping_taxable {
        base += shipping;
    }

    let rate = vat.vat_rate / HUNDRED;
    if vat.vat_included_in_price {
        round_money(base - base / (Decimal::ONE + rate))
    } else {
        round_money(base * rate)
    }
}

/// Price a cart whose products have already been loaded and checked.
///
/// # Errors
///
/// Returns `PricingError::BelowMinimumOrder` from the shipping rules.
pub fn build_quote(
    products: &[(Product, i32)],
    method: &DeliveryMethod,
    vat: Option<&VatSettings>,
    vehicle: Option<VehicleQuote>,
) -> Result<Quote, PricingError> {
    let lines: Vec<PricedLine> = products.iter().map(|(p, q)| price_line(p, *q)).collect();

    let gross: Decimal = lines
        .iter()
        .map(|l| round_money(l.unit_price * Decimal::from(l.quantity)))
        .sum();
    let subtotal: Decimal = lines.iter().map(|l| l.total_price).sum();
    let total_weight_kg: Decimal = lines.iter().map(|l| l.weight_kg).sum();

    let shipping = shipping_cost(
        method,
        subtotal,
        total_weight_kg,
        vehicle.as_ref().map(|v| v.total_cost),
    )?;
    let vat_amount = vat_amount(vat, &lines, subtotal, shipping);
    let vat_included = vat.is_some_and(|v| v.vat_included_in_price);

    let mut total_amount = subtotal + shipping;
    if !vat_included {
        total_amount += vat_amount;
    }

    Ok(Quote {
        lines,
        subtotal,
        discount_total: gross - subtotal,
        shipping_cost: shipping,
        vat_rate: vat
            .filter(|v| v.is_active && v.vat_enabled)
            .map_or(Decimal::ZERO, |v| v.vat_rate),
        vat_amount,
        vat_included,
        total_amount: round_money(total_amount),
        total_weight_kg,
        delivery_method: method.value.clone(),
        vehicle,
    })
}

/// Merge repeated products and reject empty carts or non-positive quantities.
///
/// # Errors
///
/// Returns `PricingError::EmptyCart` or `PricingError::InvalidQuantity`.
pub fn normalize_cart(items: &[CartLine]) -> Result<Vec<CartLine>, PricingError> {
    if items.is_empty() {
        return Err(PricingError::EmptyCart);
    }
    let mut merged: BTreeMap<i32, i32> = BTreeMap::new();
    for line in items {
        if line.quantity < 1 {
            return Err(PricingError::InvalidQuantity);
        }
        let qty = merged.entry(line.product_id.as_i32()).or_default();
        *qty = qty.checked_add(line.quantity).ok_or(PricingError::InvalidQuantity)?;
    }
    Ok(merged
        .into_iter()
        .map(|(id, quantity)| CartLine {
            product_id: ProductId::new(id),
            quantity,
        })
        .collect())
}

/// Loads products, delivery method and VAT, then prices the cart.
pub struct PricingService<'a> {
    pool: &'a PgPool,
}

impl<'a> PricingService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Quote a cart.
    ///
    /// Returns the quote with the loaded products so order placement can
    /// check stock against the same snapshot.
    ///
    /// # Errors
    ///
    /// Returns `PricingError` for empty carts, unknown or unlisted products,
    /// unknown delivery methods, orders under the minimum, and vehicle
    /// selection failures.
    #[tracing::instrument(skip_all, fields(delivery_method = %request.delivery_method, lines = request.items.len()))]
    pub async fn quote(
        &self,
        request: &QuoteRequest,
    ) -> Result<(Quote, Vec<(Product, i32)>), PricingError> {
        let cart = normalize_cart(&request.items)?;

        let ids: Vec<ProductId> = cart.iter().map(|l| l.product_id).collect();
        let loaded = ProductRepository::new(self.pool).get_many(&ids).await?;

        let mut products = Vec::with_capacity(cart.len());
        for line in &cart {
            let product = loaded
                .iter()
                .find(|p| p.id == line.product_id)
                .ok_or(PricingError::UnknownProduct(line.product_id))?;
            if !product.is_active || !product.visible_in_shop {
                return Err(PricingError::ProductUnavailable(product.name.clone()));
            }
            products.push((product.clone(), line.quantity));
        }

        let method = DeliveryMethodRepository::new(self.pool)
            .list(true)
            .await?
            .into_iter()
            .find(|m| m.value == request.delivery_method)
            .ok_or_else(|| PricingError::UnknownDeliveryMethod(request.delivery_method.clone()))?;

        let vehicle = if method.value == SMART_VEHICLE {
            let city = request
                .destination_city
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .ok_or(PricingError::DestinationRequired)?;
            let weight: Decimal = products
                .iter()
                .map(|(p, q)| p.gross_weight_kg * Decimal::from(*q))
                .sum();
            let flammable = products.iter().any(|(p, _)| p.is_flammable);
            Some(
                VehicleService::new(self.pool)
                    .calculate(weight, city, flammable)
                    .await?,
            )
        } else {
            None
        };

        let vat = VatRepository::new(self.pool).active().await?;
        let quote = build_quote(&products, &method, vat.as_ref(), vehicle)?;
        Ok((quote, products))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use momtazchem_core::{DeliveryMethodId, VatSettingsId};

    use super::*;

    fn d(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn product(id: i32, price: &str, weight: &str, category: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            category: category.into(),
            description: None,
            price: d(price),
            price_unit: "unit".into(),
            sku: format!("SKU-{id}"),
            barcode: None,
            stock_quantity: 100,
            gross_weight_kg: d(weight),
            is_flammable: false,
            quantity_discounts: vec![
                QuantityDiscount { min_qty: 10, discount: d("0.05") },
                QuantityDiscount { min_qty: 50, discount: d("0.10") },
            ],
            tax_class: "standard".into(),
            is_active: true,
            visible_in_shop: true,
            show_when_out_of_stock: false,
            meta_title: None,
            meta_description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn method(base: &str, per_kg: &str, minimum: &str, free: Option<&str>) -> DeliveryMethod {
        DeliveryMethod {
            id: DeliveryMethodId::new(1),
            value: "courier".into(),
            label: "Courier".into(),
            icon: "truck".into(),
            color: "blue".into(),
            base_cost: d(base),
            cost_per_kg: d(per_kg),
            minimum_order: d(minimum),
            free_shipping_threshold: free.map(d),
            estimated_days: 2,
            max_distance_km: None,
            available_areas: vec![],
            is_active: true,
            sort_order: 0,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn vat(rate: &str, included: bool) -> VatSettings {
        VatSettings {
            id: VatSettingsId::new(1),
            vat_rate: d(rate),
            vat_enabled: true,
            exempt_categories: vec!["agricultural-fertilizers".into()],
            exempt_product_ids: vec![],
            default_region: "Iraq".into(),
            vat_included_in_price: included,
            vat_display_name: "VAT".into(),
            vat_number: None,
            shipping_taxable: false,
            minimum_taxable_amount: Decimal::ZERO,
            is_active: true,
            effective_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            notes: None,
            updated_by: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_best_discount_picks_highest_reached_tier() {
        let p = product(1, "10", "1", "paint-thinner");
        assert_eq!(best_discount(&p.quantity_discounts, 9), Decimal::ZERO);
        assert_eq!(best_discount(&p.quantity_discounts, 10), d("0.05"));
        assert_eq!(best_discount(&p.quantity_discounts, 75), d("0.10"));
    }

    #[test]
    fn test_price_line_applies_discount_and_weight() {
        let line = price_line(&product(1, "12.50", "1.5", "paint-thinner"), 10);
        assert_eq!(line.total_price, d("118.75"));
        assert_eq!(line.weight_kg, d("15.0"));
    }

    #[test]
    fn test_shipping_rules() {
        let m = method("5000", "250", "10000", Some("500000"));
        assert!(matches!(
            shipping_cost(&m, d("9999"), d("1"), None),
            Err(PricingError::BelowMinimumOrder { .. })
        ));
        assert_eq!(shipping_cost(&m, d("500000"), d("80"), None).unwrap(), Decimal::ZERO);
        assert_eq!(shipping_cost(&m, d("20000"), d("4"), None).unwrap(), d("6000"));
        assert_eq!(
            shipping_cost(&m, d("20000"), d("4"), Some(d("70300"))).unwrap(),
            d("70300")
        );
    }

    #[test]
    fn test_vat_added_on_top_skips_exempt_lines() {
        let lines = vec![
            price_line(&product(1, "100", "1", "paint-thinner"), 1),
            price_line(&product(2, "100", "1", "agricultural-fertilizers"), 1),
        ];
        let settings = vat("10", false);
        assert_eq!(vat_amount(Some(&settings), &lines, d("200"), d("50")), d("10.00"));

        let mut taxed_shipping = settings.clone();
        taxed_shipping.shipping_taxable = true;
        assert_eq!(
            vat_amount(Some(&taxed_shipping), &lines, d("200"), d("50")),
            d("15.00")
        );
    }

    #[test]
    fn test_vat_included_is_extracted() {
        let lines = vec![price_line(&product(1, "110", "1", "paint-thinner"), 1)];
        assert_eq!(vat_amount(Some(&vat("10", true)), &lines, d("110"), Decimal::ZERO), d("10.00"));
    }

    #[test]
    fn test_vat_disabled_or_below_minimum() {
        let lines = vec![price_line(&product(1, "100", "1", "paint-thinner"), 1)];
        let mut settings = vat("10", false);
        settings.minimum_taxable_amount = d("1000");
        assert_eq!(vat_amount(Some(&settings), &lines, d("100"), Decimal::ZERO), Decimal::ZERO);
        settings.vat_enabled = false;
        settings.minimum_taxable_amount = Decimal::ZERO;
        assert_eq!(vat_amount(Some(&settings), &lines, d("100"), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(vat_amount(None, &lines, d("100"), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_build_quote_totals() {
        let products = vec![(product(1, "12.50", "2", "paint-thinner"), 10)];
        let quote = build_quote(
            &products,
            &method("5000", "100", "0", None),
            Some(&vat("10", false)),
            None,
        )
        .unwrap();
        assert_eq!(quote.subtotal, d("118.75"));
        assert_eq!(quote.discount_total, d("6.25"));
        assert_eq!(quote.shipping_cost, d("7000"));
        assert_eq!(quote.vat_amount, d("11.88"));
        assert_eq!(quote.total_amount, d("7130.63"));
        assert!(!quote.vat_included);
    }

    #[test]
    fn test_normalize_cart() {
        assert!(matches!(normalize_cart(&[]), Err(PricingError::EmptyCart)));
        let zero = [CartLine { product_id: ProductId::new(1), quantity: 0 }];
        assert!(matches!(normalize_cart(&zero), Err(PricingError::InvalidQuantity)));

        let merged = normalize_cart(&[
            CartLine { product_id: ProductId::new(2), quantity: 3 },
            CartLine { product_id: ProductId::new(1), quantity: 1 },
            CartLine { product_id: ProductId::new(2), quantity: 4 },
        ])
        .unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].quantity, 7);
    }
}
