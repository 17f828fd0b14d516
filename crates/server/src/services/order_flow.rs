//! Order placement and the department workflow.
//!
//! Every status change goes through [`OrderFlowService::transition`]: the
//! edge is checked against the status machine, then applied by the
//! repository with a `WHERE current_status = $from` guard so two staff
//! members acting on the same order cannot both succeed.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

use momtazchem_core::{
    AdminUserId, Currency, CustomerId, Department, Email, OrderId, OrderStatus, PaymentMethod,
    PaymentStatus,
};

use super::pricing::{CartLine, PricingError, PricingService, Quote, QuoteRequest};
use crate::db::order_management::{
    AppliedTransition, CodeIssue, CodeRedemption, Transition, TransitionEffects,
    TransitionOutcome, WorkflowFields,
};
use crate::db::orders::{NewOrder, NewOrderLine, NewReceipt};
use crate::db::{CustomerRepository, OrderManagementRepository, OrderRepository, RepositoryError};
use crate::models::order::PaymentReceipt;
use crate::models::{
    DeliveryCode, DepartmentOrder, Order, OrderManagement, ShippingAddress, clean_optional,
};

/// How long a bank-transfer order waits for its receipt.
pub const GRACE_PERIOD: Duration = Duration::days(3);

/// How long a delivery code stays valid after dispatch.
pub const DELIVERY_CODE_TTL: Duration = Duration::days(7);

const DELIVERY_CODE_DIGITS: u32 = 6;

#[derive(Debug, Error)]
pub enum OrderFlowError {
    #[error("order not found")]
    OrderNotFound,

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order status changed, reload and try again")]
    StatusChanged,

    #[error("insufficient stock for {product}: {available} available, {requested} requested")]
    InsufficientStock {
        product: String,
        available: i32,
        requested: i32,
    },

    #[error("notes are required")]
    NotesRequired,

    #[error("guest orders need email, name and phone")]
    GuestDetailsRequired,

    #[error("{0}")]
    InvalidInput(String),

    #[error("delivery code does not match")]
    InvalidDeliveryCode,

    #[error("delivery code has expired")]
    DeliveryCodeExpired,

    #[error("no active delivery code for this order")]
    NoActiveDeliveryCode,

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Contact details for checkout without an account.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestDetails {
    pub email: String,
    pub name: String,
    pub phone: String,
}

/// Storefront checkout payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<CartLine>,
    pub delivery_method: String,
    pub destination_city: Option<String>,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
    pub guest: Option<GuestDetails>,
}

/// Who is placing the order.
#[derive(Debug, Clone, Copy)]
pub enum Buyer {
    Customer(CustomerId),
    Guest,
}

/// Logistics assignment payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignRequest {
    pub delivery_method: Option<String>,
    pub transportation_type: Option<String>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub vehicle_plate: Option<String>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchRequest {
    pub tracking_number: Option<String>,
    pub carrier_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyDeliveryRequest {
    pub code: String,
    pub verified_by: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
}

/// A placed order with the quote it was priced from.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub status: OrderStatus,
    pub quote: Quote,
}

/// Result of dispatching: the updated row plus the code for the recipient.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub management: OrderManagement,
    pub code: DeliveryCode,
}

/// A random zero-padded numeric code.
#[must_use]
pub fn generate_delivery_code() -> String {
    let upper = 10_u32.pow(DELIVERY_CODE_DIGITS);
    let n = rand::rng().random_range(0..upper);
    format!("{n:0width$}", width = DELIVERY_CODE_DIGITS as usize)
}

/// Whether `provided` matches the issued code, ignoring surrounding space.
fn code_matches(issued: &str, provided: &str) -> bool {
    let provided = provided.trim();
    // Compare every byte so timing does not leak the matching prefix.
    issued.len() == provided.len()
        && issued
            .bytes()
            .zip(provided.bytes())
            .fold(0_u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

fn require_notes(notes: Option<String>) -> Result<String, OrderFlowError> {
    clean_optional(notes).ok_or(OrderFlowError::NotesRequired)
}

/// Checkout and workflow operations.
pub struct OrderFlowService<'a> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
    management: OrderManagementRepository<'a>,
}

impl<'a> OrderFlowService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
            management: OrderManagementRepository::new(pool),
        }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Price, validate and place an order.
    ///
    /// # Errors
    ///
    /// Returns `OrderFlowError::InsufficientStock` when a line exceeds stock,
    /// `GuestDetailsRequired`/`InvalidInput` for bad payloads, and pricing
    /// errors from the quote.
    #[tracing::instrument(skip(self, request), fields(payment_method = ?request.payment_method))]
    pub async fn place(
        &self,
        buyer: Buyer,
        request: PlaceOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<PlacedOrder, OrderFlowError> {
        request
            .shipping_address
            .validate()
            .map_err(OrderFlowError::InvalidInput)?;

        let (customer_id, guest) = match buyer {
            Buyer::Customer(id) => (Some(id), None),
            Buyer::Guest => {
                let guest = request
                    .guest
                    .as_ref()
                    .filter(|g| !g.name.trim().is_empty() && !g.phone.trim().is_empty())
                    .ok_or(OrderFlowError::GuestDetailsRequired)?;
                let email = Email::parse(&guest.email)
                    .map_err(|e| OrderFlowError::InvalidInput(e.to_string()))?;
                (None, Some((email, guest.name.trim(), guest.phone.trim())))
            }
        };

        let (quote, products) = PricingService::new(self.pool)
            .quote(&QuoteRequest {
                items: request.items.clone(),
                delivery_method: request.delivery_method.clone(),
                destination_city: request.destination_city.clone(),
            })
            .await?;

        for (product, quantity) in &products {
            if product.stock_quantity < *quantity {
                return Err(OrderFlowError::InsufficientStock {
                    product: product.name.clone(),
                    available: product.stock_quantity,
                    requested: *quantity,
                });
            }
        }

        let initial_status = request.payment_method.initial_status();
        let grace_period_expires_at =
            (initial_status == OrderStatus::PaymentGracePeriod).then(|| now + GRACE_PERIOD);

        let new = NewOrder {
            customer_id,
            guest_email: guest.as_ref().map(|(e, _, _)| e.as_str().to_owned()),
            guest_name: guest.as_ref().map(|(_, n, _)| (*n).to_owned()),
            guest_phone: guest.as_ref().map(|(_, _, p)| (*p).to_owned()),
            payment_method: request.payment_method,
            currency: Currency::default().code().to_owned(),
            subtotal: quote.subtotal,
            discount_total: quote.discount_total,
            shipping_cost: quote.shipping_cost,
            vat_amount: quote.vat_amount,
            vat_included: quote.vat_included,
            total_amount: quote.total_amount,
            total_weight_kg: quote.total_weight_kg,
            delivery_method: quote.delivery_method.clone(),
            shipping_address: request.shipping_address,
            notes: clean_optional(request.notes),
            lines: quote
                .lines
                .iter()
                .map(|l| NewOrderLine {
                    product_id: l.product_id,
                    product_name: l.product_name.clone(),
                    product_sku: l.product_sku.clone(),
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    discount_rate: l.discount_rate,
                    total_price: l.total_price,
                })
                .collect(),
            initial_status,
            grace_period_expires_at,
        };

        let order = self.orders.place(&new, now).await?;
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total_amount,
            status = %initial_status,
            "Order placed"
        );

        Ok(PlacedOrder {
            order,
            status: initial_status,
            quote,
        })
    }

    // =========================================================================
    // Generic transition
    // =========================================================================

    /// Move an order along one or more workflow edges.
    ///
    /// # Errors
    ///
    /// Returns `OrderFlowError::OrderNotFound`, `InvalidTransition` when an
    /// edge is not allowed, or `StatusChanged` when the guard lost a race.
    #[allow(clippy::too_many_arguments)]
    pub async fn transition(
        &self,
        order_id: OrderId,
        steps: &[OrderStatus],
        actor: Option<AdminUserId>,
        department: Option<Department>,
        notes: Option<String>,
        fields: WorkflowFields,
        redeem_code: Option<CodeRedemption>,
    ) -> Result<OrderManagement, OrderFlowError> {
        let effects = TransitionEffects {
            redeem_code,
            ..TransitionEffects::default()
        };
        self.transition_with(order_id, steps, actor, department, notes, fields, effects)
            .await
            .map(|applied| applied.management)
    }

    /// [`Self::transition`] plus rows that must commit with the status
    /// change (delivery codes, receipts).
    ///
    /// # Errors
    ///
    /// See [`Self::transition`]. A failed side-effect insert rolls the
    /// status change back.
    #[tracing::instrument(skip(self, notes, fields, effects), fields(order_id = %order_id))]
    #[allow(clippy::too_many_arguments)]
    pub async fn transition_with(
        &self,
        order_id: OrderId,
        steps: &[OrderStatus],
        actor: Option<AdminUserId>,
        department: Option<Department>,
        notes: Option<String>,
        fields: WorkflowFields,
        effects: TransitionEffects,
    ) -> Result<AppliedTransition, OrderFlowError> {
        let current = self.current(order_id).await?;
        let from = current.current_status;

        let mut previous = from;
        for step in steps {
            if !previous.can_transition_to(*step) {
                return Err(OrderFlowError::InvalidTransition {
                    from: previous,
                    to: *step,
                });
            }
            previous = *step;
        }

        let transition = Transition {
            order_id,
            from,
            steps: steps.to_vec(),
            actor,
            department,
            notes,
            fields,
            effects,
        };

        match self.management.apply(&transition).await? {
            TransitionOutcome::Applied(applied) => {
                tracing::info!(
                    from = %from,
                    to = %applied.management.current_status,
                    "Order status changed"
                );
                Ok(applied)
            }
            TransitionOutcome::StatusChanged => Err(OrderFlowError::StatusChanged),
        }
    }

    async fn current(&self, order_id: OrderId) -> Result<OrderManagement, OrderFlowError> {
        self.management
            .get_by_order(order_id)
            .await?
            .ok_or(OrderFlowError::OrderNotFound)
    }

    async fn step(
        &self,
        order_id: OrderId,
        to: OrderStatus,
        actor: AdminUserId,
        department: Department,
        notes: Option<String>,
    ) -> Result<OrderManagement, OrderFlowError> {
        self.transition(
            order_id,
            &[to],
            Some(actor),
            Some(department),
            clean_optional(notes),
            WorkflowFields::default(),
            None,
        )
        .await
    }

    // =========================================================================
    // Financial
    // =========================================================================

    /// Start reviewing a payment.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn financial_review(
        &self,
        order_id: OrderId,
        actor: AdminUserId,
    ) -> Result<OrderManagement, OrderFlowError> {
        self.step(order_id, OrderStatus::FinancialReviewing, actor, Department::Financial, None)
            .await
    }

    /// Approve payment and hand the order to the warehouse in one step.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn financial_approve(
        &self,
        order_id: OrderId,
        actor: AdminUserId,
        notes: Option<String>,
    ) -> Result<OrderManagement, OrderFlowError> {
        self.transition(
            order_id,
            &[OrderStatus::FinancialApproved, OrderStatus::WarehousePending],
            Some(actor),
            Some(Department::Financial),
            clean_optional(notes),
            WorkflowFields {
                payment_status: Some(PaymentStatus::Paid),
                ..WorkflowFields::default()
            },
            None,
        )
        .await
    }

    /// Reject a payment. Notes are mandatory.
    ///
    /// # Errors
    ///
    /// Returns `OrderFlowError::NotesRequired` without notes.
    pub async fn financial_reject(
        &self,
        order_id: OrderId,
        actor: AdminUserId,
        notes: Option<String>,
    ) -> Result<OrderManagement, OrderFlowError> {
        let notes = require_notes(notes)?;
        self.transition(
            order_id,
            &[OrderStatus::FinancialRejected],
            Some(actor),
            Some(Department::Financial),
            Some(notes),
            WorkflowFields {
                payment_status: Some(PaymentStatus::Failed),
                ..WorkflowFields::default()
            },
            None,
        )
        .await
    }

    // =========================================================================
    // Warehouse
    // =========================================================================

    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn warehouse_process(
        &self,
        order_id: OrderId,
        actor: AdminUserId,
    ) -> Result<OrderManagement, OrderFlowError> {
        self.step(order_id, OrderStatus::WarehouseProcessing, actor, Department::Warehouse, None)
            .await
    }

    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn warehouse_approve(
        &self,
        order_id: OrderId,
        actor: AdminUserId,
        notes: Option<String>,
    ) -> Result<OrderManagement, OrderFlowError> {
        self.step(order_id, OrderStatus::WarehouseApproved, actor, Department::Warehouse, notes)
            .await
    }

    /// # Errors
    ///
    /// Returns `OrderFlowError::NotesRequired` without notes.
    pub async fn warehouse_reject(
        &self,
        order_id: OrderId,
        actor: AdminUserId,
        notes: Option<String>,
    ) -> Result<OrderManagement, OrderFlowError> {
        let notes = require_notes(notes)?;
        self.step(
            order_id,
            OrderStatus::WarehouseRejected,
            actor,
            Department::Warehouse,
            Some(notes),
        )
        .await
    }

    // =========================================================================
    // Logistics
    // =========================================================================

    /// Assign a driver/vehicle.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn logistics_assign(
        &self,
        order_id: OrderId,
        actor: AdminUserId,
        request: AssignRequest,
    ) -> Result<OrderManagement, OrderFlowError> {
        let fields = WorkflowFields {
            transportation_type: clean_optional(request.transportation_type)
                .or(clean_optional(request.delivery_method)),
            driver_name: clean_optional(request.driver_name),
            driver_phone: clean_optional(request.driver_phone),
            vehicle_plate: clean_optional(request.vehicle_plate),
            estimated_delivery_date: request.estimated_delivery_date,
            ..WorkflowFields::default()
        };
        self.transition(
            order_id,
            &[OrderStatus::LogisticsAssigned],
            Some(actor),
            Some(Department::Logistics),
            clean_optional(request.notes),
            fields,
            None,
        )
        .await
    }

    /// Dispatch and issue the hand-over code.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn logistics_dispatch(
        &self,
        order_id: OrderId,
        actor: AdminUserId,
        request: DispatchRequest,
        now: DateTime<Utc>,
    ) -> Result<Dispatched, OrderFlowError> {
        let fields = WorkflowFields {
            tracking_number: clean_optional(request.tracking_number),
            carrier_name: clean_optional(request.carrier_name),
            ..WorkflowFields::default()
        };
        let effects = TransitionEffects {
            issue_code: Some(CodeIssue {
                code: generate_delivery_code(),
                expires_at: now + DELIVERY_CODE_TTL,
            }),
            ..TransitionEffects::default()
        };
        let applied = self
            .transition_with(
                order_id,
                &[OrderStatus::LogisticsDispatched],
                Some(actor),
                Some(Department::Logistics),
                clean_optional(request.notes),
                fields,
                effects,
            )
            .await?;

        let code = applied
            .delivery_code
            .ok_or_else(|| {
                RepositoryError::DataCorruption("dispatch wrote no delivery code".to_owned())
            })?;
        Ok(Dispatched {
            management: applied.management,
            code,
        })
    }

    /// Confirm hand-over with the recipient's code.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveDeliveryCode`, `InvalidDeliveryCode` or
    /// `DeliveryCodeExpired` for code problems.
    pub async fn verify_delivery(
        &self,
        order_id: OrderId,
        actor: AdminUserId,
        request: VerifyDeliveryRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderManagement, OrderFlowError> {
        let verified_by = request.verified_by.trim().to_owned();
        if verified_by.is_empty() {
            return Err(OrderFlowError::InvalidInput("verified_by is required".to_owned()));
        }

        let current = self.current(order_id).await?;
        let code = self
            .management
            .active_delivery_code(current.id)
            .await?
            .ok_or(OrderFlowError::NoActiveDeliveryCode)?;

        if !code_matches(&code.code, &request.code) {
            tracing::warn!(order_id = %order_id, "Delivery code mismatch");
            return Err(OrderFlowError::InvalidDeliveryCode);
        }
        if code.is_expired(now) {
            return Err(OrderFlowError::DeliveryCodeExpired);
        }

        self.transition(
            order_id,
            &[OrderStatus::LogisticsDelivered],
            Some(actor),
            Some(Department::Logistics),
            Some(format!("delivery verified by {verified_by}")),
            WorkflowFields::default(),
            Some(CodeRedemption {
                code_id: code.id,
                verified_by,
                latitude: request.latitude,
                longitude: request.longitude,
            }),
        )
        .await
    }

    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn complete(
        &self,
        order_id: OrderId,
        actor: AdminUserId,
    ) -> Result<OrderManagement, OrderFlowError> {
        self.step(order_id, OrderStatus::Completed, actor, Department::Logistics, None)
            .await
    }

    // =========================================================================
    // Cancellation and receipts
    // =========================================================================

    /// Cancel before dispatch; stock is restored by the repository.
    ///
    /// # Errors
    ///
    /// Returns `OrderFlowError::NotesRequired` without a reason and
    /// `InvalidTransition` once the order has shipped.
    pub async fn cancel(
        &self,
        order_id: OrderId,
        actor: Option<AdminUserId>,
        reason: Option<String>,
    ) -> Result<OrderManagement, OrderFlowError> {
        let reason = require_notes(reason)?;
        self.transition(
            order_id,
            &[OrderStatus::Cancelled],
            actor,
            None,
            Some(reason),
            WorkflowFields::default(),
            None,
        )
        .await
    }

    /// Check that a customer may upload a receipt for this order.
    ///
    /// # Errors
    ///
    /// Returns `OrderFlowError::OrderNotFound` for orders the customer does
    /// not own, `InvalidTransition` if the order is past payment.
    pub async fn ensure_receipt_allowed(
        &self,
        order_id: OrderId,
        customer_id: CustomerId,
    ) -> Result<OrderManagement, OrderFlowError> {
        let order = self
            .orders
            .get_by_id(order_id)
            .await?
            .filter(|o| o.customer_id == Some(customer_id))
            .ok_or(OrderFlowError::OrderNotFound)?;

        let current = self.current(order.id).await?;
        if !current
            .current_status
            .can_transition_to(OrderStatus::PaymentUploaded)
        {
            return Err(OrderFlowError::InvalidTransition {
                from: current.current_status,
                to: OrderStatus::PaymentUploaded,
            });
        }
        Ok(current)
    }

    /// Record a stored receipt and move the order to `payment_uploaded`.
    /// The receipt row and the status change commit together.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn record_receipt(
        &self,
        receipt: NewReceipt,
    ) -> Result<(PaymentReceipt, OrderManagement), OrderFlowError> {
        let fields = WorkflowFields {
            payment_receipt_key: Some(receipt.storage_key.clone()),
            ..WorkflowFields::default()
        };
        let notes = receipt.notes.clone();
        let order_id = receipt.order_id;
        let effects = TransitionEffects {
            receipt: Some(receipt),
            ..TransitionEffects::default()
        };

        let applied = self
            .transition_with(
                order_id,
                &[OrderStatus::PaymentUploaded],
                None,
                None,
                notes,
                fields,
                effects,
            )
            .await?;

        let stored = applied
            .receipt
            .ok_or_else(|| {
                RepositoryError::DataCorruption("receipt row was not written".to_owned())
            })?;
        Ok((stored, applied.management))
    }

    /// Cancel bank-transfer orders whose grace window has closed.
    /// Returns how many were cancelled.
    ///
    /// # Errors
    ///
    /// Returns `OrderFlowError::Repository` if the expired orders cannot be
    /// listed. Individual races are logged and skipped.
    pub async fn expire_grace_periods(&self, now: DateTime<Utc>) -> Result<usize, OrderFlowError> {
        let expired = self.management.expired_grace_periods(now).await?;
        let mut cancelled = 0;

        for order_id in expired {
            let mut t = Transition::step(
                order_id,
                OrderStatus::PaymentGracePeriod,
                OrderStatus::Cancelled,
            );
            t.notes = Some("grace period expired".to_owned());

            match self.management.apply(&t).await {
                Ok(TransitionOutcome::Applied(_)) => cancelled += 1,
                Ok(TransitionOutcome::StatusChanged) => {
                    tracing::debug!(order_id = %order_id, "Order left grace period before expiry");
                }
                Err(e) => {
                    tracing::warn!(order_id = %order_id, error = %e, "Failed to expire order");
                }
            }
        }
        Ok(cancelled)
    }

    // =========================================================================
    // Queues
    // =========================================================================

    /// Orders a department currently owns, optionally narrowed to one status.
    ///
    /// # Errors
    ///
    /// Returns `OrderFlowError::InvalidInput` if `status` belongs to another
    /// department.
    pub async fn department_queue(
        &self,
        department: Department,
        status: Option<OrderStatus>,
    ) -> Result<Vec<DepartmentOrder>, OrderFlowError> {
        let statuses = match status {
            Some(s) if s.department() == Some(department) => vec![s],
            Some(s) => {
                return Err(OrderFlowError::InvalidInput(format!(
                    "{s} is not a {department} status"
                )));
            }
            None => department.statuses(),
        };

        let rows = self.management.list_in_statuses(&statuses).await?;
        let ids: Vec<OrderId> = rows.iter().map(|r| r.customer_order_id).collect();
        let orders: HashMap<OrderId, Order> = self
            .orders
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|o| (o.id, o))
            .collect();
        let mut items = self.orders.items(&ids).await?;

        let customer_ids: HashSet<CustomerId> =
            orders.values().filter_map(|o| o.customer_id).collect();
        let customers = CustomerRepository::new(self.pool);
        let mut contacts = HashMap::new();
        for id in customer_ids {
            if let Some(c) = customers.get_by_id(id).await? {
                contacts.insert(id, (c.full_name(), c.email.into_inner(), c.phone));
            }
        }

        let mut queue = Vec::with_capacity(rows.len());
        for management in rows {
            let Some(order) = orders.get(&management.customer_order_id).cloned() else {
                continue;
            };
            let (mine, rest): (Vec<_>, Vec<_>) =
                items.drain(..).partition(|i| i.order_id == order.id);
            items = rest;

            let (customer_name, customer_email, customer_phone) = order
                .customer_id
                .and_then(|id| contacts.get(&id).cloned())
                .map_or_else(
                    || {
                        (
                            order.guest_name.clone().unwrap_or_default(),
                            order.guest_email.clone(),
                            order.guest_phone.clone(),
                        )
                    },
                    |(name, email, phone)| (name, Some(email), Some(phone)),
                );

            queue.push(DepartmentOrder {
                management,
                order,
                items: mine,
                customer_name,
                customer_email,
                customer_phone,
            });
        }
        Ok(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_code_shape() {
        for _ in 0..100 {
            let code = generate_delivery_code();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_code_matches() {
        assert!(code_matches("042917", "042917"));
        assert!(code_matches("042917", " 042917 "));
        assert!(!code_matches("042917", "42917"));
        assert!(!code_matches("042917", "042918"));
    }

    #[test]
    fn test_require_notes() {
        assert!(matches!(require_notes(None), Err(OrderFlowError::NotesRequired)));
        assert!(matches!(
            require_notes(Some("   ".into())),
            Err(OrderFlowError::NotesRequired)
        ));
        assert_eq!(require_notes(Some(" wrong amount ".into())).ok(), Some("wrong amount".into()));
    }

    #[test]
    fn test_error_messages() {
        let err = OrderFlowError::InvalidTransition {
            from: OrderStatus::Completed,
            to: OrderStatus::Cancelled,
        };
        assert_eq!(err.to_string(), "cannot move order from completed to cancelled");

        let err = OrderFlowError::InsufficientStock {
            product: "Thinner 5L".into(),
            available: 2,
            requested: 5,
        };
        assert!(err.to_string().contains("2 available, 5 requested"));
    }
}
