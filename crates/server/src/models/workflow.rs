//! Department workflow state attached to each order.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use momtazchem_core::{
    AdminUserId, DeliveryCodeId, Department, OrderId, OrderManagementId, OrderStatus,
};

use super::{Order, OrderItem};

/// Workflow row: current status plus the fields each department fills in.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderManagement {
    pub id: OrderManagementId,
    pub customer_order_id: OrderId,
    pub current_status: OrderStatus,
    pub grace_period_expires_at: Option<DateTime<Utc>>,
    pub is_order_locked: bool,

    pub financial_reviewer_id: Option<AdminUserId>,
    pub financial_reviewed_at: Option<DateTime<Utc>>,
    pub financial_notes: Option<String>,
    pub payment_receipt_key: Option<String>,

    pub warehouse_assignee_id: Option<AdminUserId>,
    pub warehouse_processed_at: Option<DateTime<Utc>>,
    pub warehouse_notes: Option<String>,

    pub logistics_assignee_id: Option<AdminUserId>,
    pub logistics_processed_at: Option<DateTime<Utc>>,
    pub logistics_notes: Option<String>,
    pub transportation_type: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier_name: Option<String>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub vehicle_plate: Option<String>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub actual_delivery_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One status change.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusHistoryEntry {
    pub id: i32,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub changed_by: Option<AdminUserId>,
    pub changed_by_name: Option<String>,
    pub changed_by_department: Option<Department>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An order as shown on a department queue.
#[derive(Debug, Clone, Serialize)]
pub struct DepartmentOrder {
    pub management: OrderManagement,
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
}

/// One-time code the recipient reads to the driver at hand-over.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DeliveryCode {
    pub id: DeliveryCodeId,
    pub order_management_id: OrderManagementId,
    #[serde(skip_serializing)]
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub sms_sent: bool,
    pub created_at: DateTime<Utc>,
}

impl DeliveryCode {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
