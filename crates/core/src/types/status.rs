//! Status enums for orders, payments and admin accounts.
//!
//! An order moves through three departments. [`OrderStatus::department`]
//! says which team currently owns it, and [`OrderStatus::can_transition_to`]
//! is the single source of truth for which moves are legal:
//!
//! ```text
//! pending_payment ─┬─> payment_grace_period ─┐
//!                  └────────────────────────┴─> payment_uploaded ─> financial_reviewing
//!                                                        │                 │
//!                         financial_rejected <───────────┴─────────────────┤
//!                                                                          v
//!                 warehouse_pending <─ financial_approved <────────────────┘
//!                  │
//!                  ├─> warehouse_notified ─> warehouse_processing ─> warehouse_approved
//!                  │                                 ^  │                  │
//!                  │                 warehouse_rejected <┘                  v
//!                  │                                            logistics_assigned
//!                  │                                                       │
//!                  │   logistics_processing ─> logistics_dispatched <─────┘
//!                  │                                  │
//!                  v                                  v
//!              cancelled              logistics_delivered ─> completed
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("unknown order status: {0}")]
    UnknownStatus(String),
    #[error("unknown department: {0}")]
    UnknownDepartment(String),
    #[error("unknown payment method: {0}")]
    UnknownPaymentMethod(String),
}

/// The three back-office teams an order passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "department", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Financial,
    Warehouse,
    Logistics,
}

impl Department {
    pub const ALL: [Self; 3] = [Self::Financial, Self::Warehouse, Self::Logistics];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Financial => "financial",
            Self::Warehouse => "warehouse",
            Self::Logistics => "logistics",
        }
    }

    /// Statuses an order can be in while this department owns it.
    #[must_use]
    pub fn statuses(self) -> Vec<OrderStatus> {
        OrderStatus::ALL
            .into_iter()
            .filter(|s| s.department() == Some(self))
            .collect()
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Department {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| StatusError::UnknownDepartment(s.to_owned()))
    }
}

/// Lifecycle status of an order in the department workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    PendingPayment,
    /// Bank transfer orders wait up to three days for a receipt.
    PaymentGracePeriod,
    PaymentUploaded,
    FinancialReviewing,
    FinancialApproved,
    FinancialRejected,
    WarehousePending,
    WarehouseNotified,
    WarehouseProcessing,
    WarehouseApproved,
    WarehouseRejected,
    LogisticsAssigned,
    LogisticsProcessing,
    LogisticsDispatched,
    LogisticsDelivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [Self; 17] = [
        Self::PendingPayment,
        Self::PaymentGracePeriod,
        Self::PaymentUploaded,
        Self::FinancialReviewing,
        Self::FinancialApproved,
        Self::FinancialRejected,
        Self::WarehousePending,
        Self::WarehouseNotified,
        Self::WarehouseProcessing,
        Self::WarehouseApproved,
        Self::WarehouseRejected,
        Self::LogisticsAssigned,
        Self::LogisticsProcessing,
        Self::LogisticsDispatched,
        Self::LogisticsDelivered,
        Self::Completed,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::PaymentGracePeriod => "payment_grace_period",
            Self::PaymentUploaded => "payment_uploaded",
            Self::FinancialReviewing => "financial_reviewing",
            Self::FinancialApproved => "financial_approved",
            Self::FinancialRejected => "financial_rejected",
            Self::WarehousePending => "warehouse_pending",
            Self::WarehouseNotified => "warehouse_notified",
            Self::WarehouseProcessing => "warehouse_processing",
            Self::WarehouseApproved => "warehouse_approved",
            Self::WarehouseRejected => "warehouse_rejected",
            Self::LogisticsAssigned => "logistics_assigned",
            Self::LogisticsProcessing => "logistics_processing",
            Self::LogisticsDispatched => "logistics_dispatched",
            Self::LogisticsDelivered => "logistics_delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// English label for invoices, reports and notifications.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingPayment => "Awaiting payment",
            Self::PaymentGracePeriod => "Awaiting bank transfer",
            Self::PaymentUploaded => "Payment receipt uploaded",
            Self::FinancialReviewing => "Payment under review",
            Self::FinancialApproved => "Payment approved",
            Self::FinancialRejected => "Payment rejected",
            Self::WarehousePending => "Queued for warehouse",
            Self::WarehouseNotified => "Warehouse notified",
            Self::WarehouseProcessing => "Being prepared",
            Self::WarehouseApproved => "Ready for shipment",
            Self::WarehouseRejected => "Held by warehouse",
            Self::LogisticsAssigned => "Carrier assigned",
            Self::LogisticsProcessing => "Preparing dispatch",
            Self::LogisticsDispatched => "Out for delivery",
            Self::LogisticsDelivered => "Delivered",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// The department responsible for moving the order out of this status.
    ///
    /// Terminal statuses belong to nobody.
    #[must_use]
    pub const fn department(self) -> Option<Department> {
        match self {
            Self::PendingPayment
            | Self::PaymentGracePeriod
            | Self::PaymentUploaded
            | Self::FinancialReviewing
            | Self::FinancialRejected => Some(Department::Financial),
            Self::FinancialApproved
            | Self::WarehousePending
            | Self::WarehouseNotified
            | Self::WarehouseProcessing
            | Self::WarehouseRejected => Some(Department::Warehouse),
            Self::WarehouseApproved
            | Self::LogisticsAssigned
            | Self::LogisticsProcessing
            | Self::LogisticsDispatched
            | Self::LogisticsDelivered => Some(Department::Logistics),
            Self::Completed | Self::Cancelled => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Orders can be cancelled until the goods leave the warehouse gate.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        !self.is_terminal()
            && !matches!(
                self,
                Self::LogisticsDispatched | Self::LogisticsDelivered
            )
    }

    /// Whether moving from `self` to `next` is a legal workflow step.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if matches!(next, Self::Cancelled) {
            return self.is_cancellable();
        }
        matches!(
            (self, next),
            (
                Self::PendingPayment,
                Self::PaymentGracePeriod | Self::PaymentUploaded | Self::FinancialReviewing
            ) | (Self::PaymentGracePeriod, Self::PaymentUploaded)
                | (
                    Self::PaymentUploaded,
                    Self::FinancialReviewing | Self::FinancialApproved | Self::FinancialRejected
                )
                | (
                    Self::FinancialReviewing,
                    Self::FinancialApproved | Self::FinancialRejected
                )
                | (Self::FinancialRejected, Self::PaymentUploaded)
                | (Self::FinancialApproved, Self::WarehousePending)
                | (
                    Self::WarehousePending,
                    Self::WarehouseNotified | Self::WarehouseProcessing
                )
                | (Self::WarehouseNotified, Self::WarehouseProcessing)
                | (
                    Self::WarehouseProcessing,
                    Self::WarehouseApproved | Self::WarehouseRejected
                )
                | (Self::WarehouseRejected, Self::WarehouseProcessing)
                | (Self::WarehouseApproved, Self::LogisticsAssigned)
                | (
                    Self::LogisticsAssigned,
                    Self::LogisticsProcessing | Self::LogisticsDispatched
                )
                | (Self::LogisticsProcessing, Self::LogisticsDispatched)
                | (Self::LogisticsDispatched, Self::LogisticsDelivered)
                | (Self::LogisticsDelivered, Self::Completed)
        )
    }

    /// Every status reachable in one step.
    #[must_use]
    pub fn next_statuses(self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|next| self.can_transition_to(*next))
            .collect()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StatusError::UnknownStatus(s.to_owned()))
    }
}

/// How the customer chose to pay at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    OnlinePayment,
    CashOnDelivery,
    Wallet,
}

impl PaymentMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BankTransfer => "bank_transfer",
            Self::OnlinePayment => "online_payment",
            Self::CashOnDelivery => "cash_on_delivery",
            Self::Wallet => "wallet",
        }
    }

    /// Status a freshly placed order starts in.
    #[must_use]
    pub const fn initial_status(self) -> OrderStatus {
        match self {
            Self::BankTransfer => OrderStatus::PaymentGracePeriod,
            Self::OnlinePayment | Self::CashOnDelivery | Self::Wallet => {
                OrderStatus::PendingPayment
            }
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank_transfer" => Ok(Self::BankTransfer),
            "online_payment" => Ok(Self::OnlinePayment),
            "cash_on_delivery" => Ok(Self::CashOnDelivery),
            "wallet" => Ok(Self::Wallet),
            other => Err(StatusError::UnknownPaymentMethod(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Admin role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "admin_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Full access, including admin accounts and department assignments.
    SuperAdmin,
    /// Back-office access, limited to assigned departments for workflow steps.
    Admin,
    /// Read-only access.
    Viewer,
}

impl AdminRole {
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "viewer" => Ok(Self::Viewer),
            other => Err(format!("unknown admin role: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_a_chain_of_legal_steps() {
        let path = [
            OrderStatus::PendingPayment,
            OrderStatus::PaymentUploaded,
            OrderStatus::FinancialReviewing,
            OrderStatus::FinancialApproved,
            OrderStatus::WarehousePending,
            OrderStatus::WarehouseProcessing,
            OrderStatus::WarehouseApproved,
            OrderStatus::LogisticsAssigned,
            OrderStatus::LogisticsDispatched,
            OrderStatus::LogisticsDelivered,
            OrderStatus::Completed,
        ];
        for pair in path.windows(2) {
            if let [from, to] = pair {
                assert!(from.can_transition_to(*to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn departments_cannot_skip_ahead() {
        assert!(!OrderStatus::PaymentUploaded.can_transition_to(OrderStatus::WarehouseProcessing));
        assert!(!OrderStatus::WarehousePending.can_transition_to(OrderStatus::LogisticsAssigned));
        assert!(!OrderStatus::FinancialApproved.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::LogisticsAssigned.can_transition_to(OrderStatus::LogisticsDelivered));
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        for status in [OrderStatus::Completed, OrderStatus::Cancelled] {
            assert!(status.is_terminal());
            assert!(status.next_statuses().is_empty());
            assert_eq!(status.department(), None);
        }
    }

    #[test]
    fn cancellation_stops_at_dispatch() {
        assert!(OrderStatus::WarehouseProcessing.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::LogisticsAssigned.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::LogisticsDispatched.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::LogisticsDelivered.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn rejections_can_be_retried() {
        assert!(OrderStatus::FinancialRejected.can_transition_to(OrderStatus::PaymentUploaded));
        assert!(OrderStatus::WarehouseRejected.can_transition_to(OrderStatus::WarehouseProcessing));
    }

    #[test]
    fn department_ownership() {
        assert_eq!(
            OrderStatus::PaymentGracePeriod.department(),
            Some(Department::Financial)
        );
        assert_eq!(
            OrderStatus::FinancialApproved.department(),
            Some(Department::Warehouse)
        );
        assert_eq!(
            OrderStatus::WarehouseApproved.department(),
            Some(Department::Logistics)
        );
        assert!(Department::Logistics
            .statuses()
            .contains(&OrderStatus::LogisticsDelivered));
    }

    #[test]
    fn every_status_roundtrips_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
            let json = serde_json::to_string(&status).unwrap_or_default();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn bank_transfer_starts_in_grace_period() {
        assert_eq!(
            PaymentMethod::BankTransfer.initial_status(),
            OrderStatus::PaymentGracePeriod
        );
        assert_eq!(
            PaymentMethod::CashOnDelivery.initial_status(),
            OrderStatus::PendingPayment
        );
    }
}
