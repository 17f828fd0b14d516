//! Customer orders: placement, lookup, tracking and payment receipts.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use sqlx::types::Json;

use momtazchem_core::{
    CustomerId, OrderId, OrderNumber, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
};

use super::RepositoryError;
use crate::models::order::PaymentReceipt;
use crate::models::{Order, OrderItem, OrderTracking, OrderWithItems, ShippingAddress};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    customer_id: Option<CustomerId>,
    guest_email: Option<String>,
    guest_name: Option<String>,
    guest_phone: Option<String>,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    currency: String,
    subtotal: Decimal,
    discount_total: Decimal,
    shipping_cost: Decimal,
    vat_amount: Decimal,
    vat_included: bool,
    total_amount: Decimal,
    total_weight_kg: Decimal,
    delivery_method: String,
    shipping_address: Json<ShippingAddress>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            order_number: row.order_number,
            customer_id: row.customer_id,
            guest_email: row.guest_email,
            guest_name: row.guest_name,
            guest_phone: row.guest_phone,
            payment_method: row.payment_method,
            payment_status: row.payment_status,
            currency: row.currency,
            subtotal: row.subtotal,
            discount_total: row.discount_total,
            shipping_cost: row.shipping_cost,
            vat_amount: row.vat_amount,
            vat_included: row.vat_included,
            total_amount: row.total_amount,
            total_weight_kg: row.total_weight_kg,
            delivery_method: row.delivery_method,
            shipping_address: row.shipping_address.0,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderStatusRow {
    #[sqlx(flatten)]
    order: OrderRow,
    current_status: OrderStatus,
}

#[derive(Debug, sqlx::FromRow)]
struct TrackingRow {
    order_number: String,
    current_status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    tracking_number: Option<String>,
    carrier_name: Option<String>,
    estimated_delivery_date: Option<NaiveDate>,
    actual_delivery_date: Option<DateTime<Utc>>,
}

pub(crate) const ORDER_COLUMNS: &str = r"
    co.id, co.order_number, co.customer_id, co.guest_email, co.guest_name, co.guest_phone,
    co.payment_method, co.payment_status, co.currency, co.subtotal, co.discount_total,
    co.shipping_cost, co.vat_amount, co.vat_included, co.total_amount, co.total_weight_kg,
    co.delivery_method, co.shipping_address, co.notes, co.created_at, co.updated_at
";

const ITEM_COLUMNS: &str = r"
    id, order_id, product_id, product_name, product_sku, quantity, unit_price,
    discount_rate, total_price
";

/// One priced line ready to be written.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_rate: Decimal,
    pub total_price: Decimal,
}

/// A fully priced order ready to be written.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Option<CustomerId>,
    pub guest_email: Option<String>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub payment_method: PaymentMethod,
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
    pub lines: Vec<NewOrderLine>,
    pub initial_status: OrderStatus,
    pub grace_period_expires_at: Option<DateTime<Utc>>,
}

/// Receipt metadata after the file is stored.
#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub order_id: OrderId,
    pub customer_id: Option<CustomerId>,
    pub storage_key: String,
    pub original_file_name: String,
    pub mime_type: String,
    pub file_size: i32,
    pub notes: Option<String>,
}

/// Repository for customer orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Write an order, its lines and its workflow row, and take the stock.
    ///
    /// Everything happens in one transaction: a line whose stock ran out
    /// between pricing and placement rolls the whole order back.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if stock is insufficient.
    pub async fn place(&self, new: &NewOrder, now: DateTime<Utc>) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let counter = sqlx::query_scalar::<_, i32>(
            r"
            INSERT INTO order_number_counters (year, last_value)
            VALUES ($1, $2)
            ON CONFLICT (year) DO UPDATE SET last_value = order_number_counters.last_value + 1
            RETURNING last_value
            ",
        )
        .bind(now.year())
        .bind(OrderNumber::FIRST_COUNTER)
        .fetch_one(&mut *tx)
        .await?;
        let order_number = OrderNumber::for_date(&now, counter);

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO customer_orders AS co (
                order_number, customer_id, guest_email, guest_name, guest_phone,
                payment_method, currency, subtotal, discount_total, shipping_cost,
                vat_amount, vat_included, total_amount, total_weight_kg, delivery_method,
                shipping_address, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order_number.as_str())
        .bind(new.customer_id)
        .bind(new.guest_email.as_deref())
        .bind(new.guest_name.as_deref())
        .bind(new.guest_phone.as_deref())
        .bind(new.payment_method)
        .bind(&new.currency)
        .bind(new.subtotal)
        .bind(new.discount_total)
        .bind(new.shipping_cost)
        .bind(new.vat_amount)
        .bind(new.vat_included)
        .bind(new.total_amount)
        .bind(new.total_weight_kg)
        .bind(&new.delivery_method)
        .bind(Json(&new.shipping_address))
        .bind(new.notes.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "order number already allocated"))?;

        for line in &new.lines {
            let taken = sqlx::query(
                r"
                UPDATE shop_products SET stock_quantity = stock_quantity - $2, updated_at = NOW()
                WHERE id = $1 AND stock_quantity >= $2
                ",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
            if taken.rows_affected() == 0 {
                return Err(RepositoryError::Conflict(format!(
                    "insufficient stock for {}",
                    line.product_name
                )));
            }

            sqlx::query(
                r"
                INSERT INTO order_items (
                    order_id, product_id, product_name, product_sku, quantity,
                    unit_price, discount_rate, total_price
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(row.id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(&line.product_sku)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.discount_rate)
            .bind(line.total_price)
            .execute(&mut *tx)
            .await?;
        }

        let management_id = sqlx::query_scalar::<_, i32>(
            r"
            INSERT INTO order_management (
                customer_order_id, current_status, grace_period_expires_at, is_order_locked
            )
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(row.id)
        .bind(new.initial_status)
        .bind(new.grace_period_expires_at)
        .bind(new.grace_period_expires_at.is_some())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO order_status_history (order_management_id, from_status, to_status, notes)
            VALUES ($1, NULL, $2, 'order placed')
            ",
        )
        .bind(management_id)
        .bind(new.initial_status)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into())
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_orders co WHERE co.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Orders by ID, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[OrderId]) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(OrderId::as_i32).collect();
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_orders co WHERE co.id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// An order with its lines and current status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_items(&self, id: OrderId) -> Result<Option<OrderWithItems>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderStatusRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}, om.current_status
            FROM customer_orders co
            JOIN order_management om ON om.customer_order_id = co.id
            WHERE co.id = $1
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let items = self.items(&[id]).await?;
        Ok(Some(OrderWithItems {
            order: row.order.into(),
            status: row.current_status,
            items,
        }))
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<OrderWithItems>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderStatusRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}, om.current_status
            FROM customer_orders co
            JOIN order_management om ON om.customer_order_id = co.id
            WHERE co.customer_id = $1
            ORDER BY co.created_at DESC
            "
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<OrderId> = rows.iter().map(|r| r.order.id).collect();
        let mut items = self.items(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let order_id = row.order.id;
                let (mine, rest): (Vec<_>, Vec<_>) =
                    items.drain(..).partition(|item| item.order_id == order_id);
                items = rest;
                OrderWithItems {
                    order: row.order.into(),
                    status: row.current_status,
                    items: mine,
                }
            })
            .collect())
    }

    /// Lines of the given orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_ids: &[OrderId]) -> Result<Vec<OrderItem>, RepositoryError> {
        let ids: Vec<i32> = order_ids.iter().map(OrderId::as_i32).collect();
        let rows = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Public tracking view by order number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tracking(
        &self,
        order_number: &OrderNumber,
    ) -> Result<Option<OrderTracking>, RepositoryError> {
        let row = sqlx::query_as::<_, TrackingRow>(
            r"
            SELECT co.order_number, om.current_status, co.created_at, om.updated_at,
                   om.tracking_number, om.carrier_name, om.estimated_delivery_date,
                   om.actual_delivery_date
            FROM customer_orders co
            JOIN order_management om ON om.customer_order_id = co.id
            WHERE co.order_number = $1
            ",
        )
        .bind(order_number.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| OrderTracking {
            order_number: r.order_number,
            status: r.current_status,
            status_label: r.current_status.label(),
            department: r.current_status.department(),
            created_at: r.created_at,
            updated_at: r.updated_at,
            tracking_number: r.tracking_number,
            carrier_name: r.carrier_name,
            estimated_delivery_date: r.estimated_delivery_date,
            actual_delivery_date: r.actual_delivery_date,
        }))
    }
}

/// Insert a receipt row on an open connection; the caller owns the
/// transaction.
pub(super) async fn insert_receipt(
    conn: &mut PgConnection,
    receipt: &NewReceipt,
) -> Result<PaymentReceipt, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentReceipt>(
        r"
        INSERT INTO payment_receipts (
            customer_order_id, customer_id, storage_key, original_file_name,
            mime_type, file_size, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, customer_order_id, customer_id, storage_key, original_file_name,
                  mime_type, file_size, notes, uploaded_at
        ",
    )
    .bind(receipt.order_id)
    .bind(receipt.customer_id)
    .bind(&receipt.storage_key)
    .bind(&receipt.original_file_name)
    .bind(&receipt.mime_type)
    .bind(receipt.file_size)
    .bind(receipt.notes.as_deref())
    .fetch_one(conn)
    .await?;

    Ok(row)
}
