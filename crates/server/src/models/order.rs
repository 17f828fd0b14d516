//! Customer order types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use momtazchem_core::{
    CustomerId, Department, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentReceiptId,
    PaymentStatus, ProductId,
};

use super::require_text;

/// Delivery address captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub phone: String,
    pub province: String,
    pub city: String,
    pub address: String,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl ShippingAddress {
    /// # Errors
    ///
    /// Returns a message naming the first blank field.
    pub fn validate(&self) -> Result<(), String> {
        require_text(&self.recipient_name, "shipping_address.recipient_name")?;
        require_text(&self.phone, "shipping_address.phone")?;
        require_text(&self.province, "shipping_address.province")?;
        require_text(&self.city, "shipping_address.city")?;
        require_text(&self.address, "shipping_address.address")
    }
}

/// A placed order with its money breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub customer_id: Option<CustomerId>,
    pub guest_email: Option<String>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub currency: String,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub shipping_cost: Decimal,
    pub vat_amount: Decimal,
    pub vat_included: bool,
    pub total_amount: Decimal,
    pub total_weight_kg: Decimal,
    pub delivery_method: String,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an order, with the product snapshot taken at checkout.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_rate: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
}

/// Public tracking view. Carries no personal data.
#[derive(Debug, Clone, Serialize)]
pub struct OrderTracking {
    pub order_number: String,
    pub status: OrderStatus,
    pub status_label: &'static str,
    pub department: Option<Department>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tracking_number: Option<String>,
    pub carrier_name: Option<String>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
}

/// Uploaded proof of bank transfer.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentReceipt {
    pub id: PaymentReceiptId,
    pub customer_order_id: OrderId,
    pub customer_id: Option<CustomerId>,
    pub storage_key: String,
    pub original_file_name: String,
    pub mime_type: String,
    pub file_size: i32,
    pub notes: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_address_validation() {
        let mut address = ShippingAddress {
            recipient_name: "Shilan Ahmed".into(),
            phone: "07701112233".into(),
            province: "Erbil".into(),
            city: "Erbil".into(),
            address: "100m Street, Building 4".into(),
            postal_code: None,
        };
        assert!(address.validate().is_ok());

        address.city = String::new();
        assert_eq!(
            address.validate().unwrap_err(),
            "shipping_address.city is required"
        );
    }
}
