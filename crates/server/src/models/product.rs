//! Catalogue types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use momtazchem_core::{Ean13, ProductId};

use super::{clean_optional, require_text};

/// Volume discount tier: buying at least `min_qty` units takes `discount`
/// (a fraction, `0.05` = 5%) off the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityDiscount {
    #[serde(alias = "minQty")]
    pub min_qty: i32,
    pub discount: Decimal,
}

/// A shop product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub price_unit: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub stock_quantity: i32,
    pub gross_weight_kg: Decimal,
    pub is_flammable: bool,
    pub quantity_discounts: Vec<QuantityDiscount>,
    pub tax_class: String,
    pub is_active: bool,
    pub visible_in_shop: bool,
    pub show_when_out_of_stock: bool,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether the storefront should list this product.
    #[must_use]
    pub const fn is_listed(&self) -> bool {
        self.is_active
            && self.visible_in_shop
            && (self.stock_quantity > 0 || self.show_when_out_of_stock)
    }
}

const fn default_true() -> bool {
    true
}

/// Admin create/update payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub price_unit: Option<String>,
    pub sku: String,
    pub barcode: Option<String>,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub gross_weight_kg: Decimal,
    #[serde(default)]
    pub is_flammable: bool,
    #[serde(default)]
    pub quantity_discounts: Vec<QuantityDiscount>,
    pub tax_class: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub visible_in_shop: bool,
    #[serde(default)]
    pub show_when_out_of_stock: bool,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
}

impl ProductInput {
    /// Validate and normalize in place.
    ///
    /// # Errors
    ///
    /// Returns a message for blank name/sku/category, negative price,
    /// stock or weight, malformed discount tiers, or an invalid barcode.
    pub fn validate(mut self) -> Result<Self, String> {
        require_text(&self.name, "name")?;
        require_text(&self.sku, "sku")?;
        require_text(&self.category, "category")?;
        if self.price < Decimal::ZERO {
            return Err("price must not be negative".to_owned());
        }
        if self.stock_quantity < 0 {
            return Err("stock_quantity must not be negative".to_owned());
        }
        if self.gross_weight_kg < Decimal::ZERO {
            return Err("gross_weight_kg must not be negative".to_owned());
        }
        for tier in &self.quantity_discounts {
            if tier.min_qty < 1 || tier.discount < Decimal::ZERO || tier.discount >= Decimal::ONE {
                return Err(
                    "quantity discounts need min_qty >= 1 and 0 <= discount < 1".to_owned(),
                );
            }
        }

        self.barcode = clean_optional(self.barcode);
        if let Some(code) = &self.barcode {
            let parsed = Ean13::parse(code).map_err(|e| format!("invalid barcode: {e}"))?;
            self.barcode = Some(parsed.as_str());
        }

        self.name = self.name.trim().to_owned();
        self.sku = self.sku.trim().to_owned();
        self.category = self.category.trim().to_owned();
        self.description = clean_optional(self.description);
        self.price_unit = clean_optional(self.price_unit);
        self.tax_class = clean_optional(self.tax_class);
        self.meta_title = clean_optional(self.meta_title);
        self.meta_description = clean_optional(self.meta_description);
        self.quantity_discounts.sort_by_key(|tier| tier.min_qty);
        Ok(self)
    }
}

/// A product already holding a barcode.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BarcodeOwner {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn input() -> ProductInput {
        serde_json::from_value(serde_json::json!({
            "name": " Paint Thinner PT-300 ",
            "category": "paint-thinner",
            "price": "125000",
            "sku": "PT-300",
            "barcode": " 8469677112348 ",
            "stock_quantity": 40,
            "gross_weight_kg": "18.5",
            "quantity_discounts": [
                {"minQty": 50, "discount": "0.10"},
                {"min_qty": 10, "discount": "0.05"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_validate_normalizes_fields() {
        let product = input().validate().unwrap();
        assert_eq!(product.name, "Paint Thinner PT-300");
        assert_eq!(product.barcode.as_deref(), Some("8469677112348"));
        assert!(product.is_active);
        assert!(product.visible_in_shop);
        assert_eq!(product.quantity_discounts[0].min_qty, 10);
        assert_eq!(product.quantity_discounts[1].discount, d("0.10"));
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let mut bad = input();
        bad.price = d("-1");
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.barcode = Some("8469677112349".into());
        assert!(bad.validate().unwrap_err().starts_with("invalid barcode"));

        let mut bad = input();
        bad.quantity_discounts = vec![QuantityDiscount {
            min_qty: 5,
            discount: d("1.5"),
        }];
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.sku = " ".into();
        assert_eq!(bad.validate().unwrap_err(), "sku is required");
    }
}
