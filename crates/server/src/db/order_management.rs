//! Department workflow: status transitions, history and delivery codes.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use momtazchem_core::{
    AdminUserId, DeliveryCodeId, Department, OrderId, OrderManagementId, OrderStatus,
    PaymentStatus,
};

use super::RepositoryError;
use super::orders::{NewReceipt, insert_receipt};
use crate::models::order::PaymentReceipt;
use crate::models::{DeliveryCode, OrderManagement, StatusHistoryEntry};

const MANAGEMENT_COLUMNS: &str = r"
    id, customer_order_id, current_status, grace_period_expires_at, is_order_locked,
    financial_reviewer_id, financial_reviewed_at, financial_notes, payment_receipt_key,
    warehouse_assignee_id, warehouse_processed_at, warehouse_notes,
    logistics_assignee_id, logistics_processed_at, logistics_notes, transportation_type,
    tracking_number, carrier_name, driver_name, driver_phone, vehicle_plate,
    estimated_delivery_date, actual_delivery_date, created_at, updated_at
";

const CODE_COLUMNS: &str = r"
    id, order_management_id, code, expires_at, is_used, used_at, verified_by, sms_sent, created_at
";

/// Department fields written alongside a status change. `None` keeps the
/// stored value.
#[derive(Debug, Clone, Default)]
pub struct WorkflowFields {
    pub payment_receipt_key: Option<String>,
    pub transportation_type: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier_name: Option<String>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub vehicle_plate: Option<String>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub payment_status: Option<PaymentStatus>,
}

/// Consumes a delivery code as part of the transition.
#[derive(Debug, Clone)]
pub struct CodeRedemption {
    pub code_id: DeliveryCodeId,
    pub verified_by: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
}

/// A fresh hand-over code written with the dispatch. Unused earlier codes
/// are voided.
#[derive(Debug, Clone)]
pub struct CodeIssue {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Rows written in the same transaction as the status change.
#[derive(Debug, Clone, Default)]
pub struct TransitionEffects {
    pub redeem_code: Option<CodeRedemption>,
    pub issue_code: Option<CodeIssue>,
    pub receipt: Option<NewReceipt>,
}

/// One guarded status change, possibly spanning several workflow steps
/// (`from -> steps[0] -> steps[1] ...`).
#[derive(Debug, Clone)]
pub struct Transition {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub steps: Vec<OrderStatus>,
    pub actor: Option<AdminUserId>,
    /// Department whose reviewer/assignee stamp is written.
    pub department: Option<Department>,
    pub notes: Option<String>,
    pub fields: WorkflowFields,
    pub effects: TransitionEffects,
}

impl Transition {
    /// A single step with no department fields.
    #[must_use]
    pub fn step(order_id: OrderId, from: OrderStatus, to: OrderStatus) -> Self {
        Self {
            order_id,
            from,
            steps: vec![to],
            actor: None,
            department: None,
            notes: None,
            fields: WorkflowFields::default(),
            effects: TransitionEffects::default(),
        }
    }

    /// Status the order ends in.
    #[must_use]
    pub fn target(&self) -> OrderStatus {
        self.steps.last().copied().unwrap_or(self.from)
    }
}

/// Rows produced by an applied transition.
#[derive(Debug)]
pub struct AppliedTransition {
    pub management: OrderManagement,
    pub delivery_code: Option<DeliveryCode>,
    pub receipt: Option<PaymentReceipt>,
}

/// Outcome of a guarded update.
#[derive(Debug)]
pub enum TransitionOutcome {
    Applied(AppliedTransition),
    /// Another request moved the order first.
    StatusChanged,
}

/// Repository for the order workflow.
pub struct OrderManagementRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderManagementRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Workflow row for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<OrderManagement>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderManagement>(&format!(
            "SELECT {MANAGEMENT_COLUMNS} FROM order_management WHERE customer_order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Workflow rows currently in any of `statuses`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_in_statuses(
        &self,
        statuses: &[OrderStatus],
    ) -> Result<Vec<OrderManagement>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderManagement>(&format!(
            r"
            SELECT {MANAGEMENT_COLUMNS} FROM order_management
            WHERE current_status = ANY($1::order_status[])
            ORDER BY created_at
            "
        ))
        .bind(statuses.iter().map(|s| s.as_str()).collect::<Vec<_>>())
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Status history with the acting admin's name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(&self, order_id: OrderId) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, StatusHistoryEntry>(
            r"
            SELECT h.id, h.from_status, h.to_status, h.changed_by,
                   au.name AS changed_by_name, h.changed_by_department, h.notes, h.created_at
            FROM order_status_history h
            JOIN order_management om ON om.id = h.order_management_id
            LEFT JOIN admin_users au ON au.id = h.changed_by
            WHERE om.customer_order_id = $1
            ORDER BY h.created_at, h.id
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Apply a transition guarded by `current_status = from`.
    ///
    /// Writes the department stamp, one history row per step, restores stock
    /// when the target is `cancelled`, and redeems a delivery code when asked,
    /// all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn apply(&self, t: &Transition) -> Result<TransitionOutcome, RepositoryError> {
        let target = t.target();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderManagement>(&format!(
            r"
            UPDATE order_management SET
                current_status = $2,
                is_order_locked = ($2 = 'payment_grace_period'),
                financial_reviewer_id = CASE WHEN $4 = 'financial' THEN $3 ELSE financial_reviewer_id END,
                financial_reviewed_at = CASE WHEN $4 = 'financial' THEN NOW() ELSE financial_reviewed_at END,
                financial_notes = CASE WHEN $4 = 'financial' THEN COALESCE($5, financial_notes) ELSE financial_notes END,
                warehouse_assignee_id = CASE WHEN $4 = 'warehouse' THEN $3 ELSE warehouse_assignee_id END,
                warehouse_processed_at = CASE WHEN $4 = 'warehouse' THEN NOW() ELSE warehouse_processed_at END,
                warehouse_notes = CASE WHEN $4 = 'warehouse' THEN COALESCE($5, warehouse_notes) ELSE warehouse_notes END,
                logistics_assignee_id = CASE WHEN $4 = 'logistics' THEN $3 ELSE logistics_assignee_id END,
                logistics_processed_at = CASE WHEN $4 = 'logistics' THEN NOW() ELSE logistics_processed_at END,
                logistics_notes = CASE WHEN $4 = 'logistics' THEN COALESCE($5, logistics_notes) ELSE logistics_notes END,
                payment_receipt_key = COALESCE($6, payment_receipt_key),
                transportation_type = COALESCE($7, transportation_type),
                tracking_number = COALESCE($8, tracking_number),
                carrier_name = COALESCE($9, carrier_name),
                driver_name = COALESCE($10, driver_name),
                driver_phone = COALESCE($11, driver_phone),
                vehicle_plate = COALESCE($12, vehicle_plate),
                estimated_delivery_date = COALESCE($13, estimated_delivery_date),
                actual_delivery_date = CASE WHEN $2 = 'logistics_delivered' THEN NOW() ELSE actual_delivery_date END,
                updated_at = NOW()
            WHERE customer_order_id = $1 AND current_status = $14
            RETURNING {MANAGEMENT_COLUMNS}
            "
        ))
        .bind(t.order_id)
        .bind(target)
        .bind(t.actor)
        .bind(t.department)
        .bind(t.notes.as_deref())
        .bind(t.fields.payment_receipt_key.as_deref())
        .bind(t.fields.transportation_type.as_deref())
        .bind(t.fields.tracking_number.as_deref())
        .bind(t.fields.carrier_name.as_deref())
        .bind(t.fields.driver_name.as_deref())
        .bind(t.fields.driver_phone.as_deref())
        .bind(t.fields.vehicle_plate.as_deref())
        .bind(t.fields.estimated_delivery_date)
        .bind(t.from)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(TransitionOutcome::StatusChanged);
        };

        let mut previous = t.from;
        for step in &t.steps {
            sqlx::query(
                r"
                INSERT INTO order_status_history (
                    order_management_id, from_status, to_status, changed_by,
                    changed_by_department, notes
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(row.id)
            .bind(previous)
            .bind(*step)
            .bind(t.actor)
            .bind(t.department)
            .bind(t.notes.as_deref())
            .execute(&mut *tx)
            .await?;
            previous = *step;
        }

        if let Some(status) = t.fields.payment_status {
            sqlx::query(
                "UPDATE customer_orders SET payment_status = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(t.order_id)
            .bind(status)
            .execute(&mut *tx)
            .await?;
        }

        if target == OrderStatus::Cancelled {
            sqlx::query(
                r"
                UPDATE shop_products p
                SET stock_quantity = p.stock_quantity + oi.quantity, updated_at = NOW()
                FROM order_items oi
                WHERE oi.order_id = $1 AND oi.product_id = p.id
                ",
            )
            .bind(t.order_id)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(redeem) = &t.effects.redeem_code {
            let used = sqlx::query(
                r"
                UPDATE delivery_codes
                SET is_used = TRUE, used_at = NOW(), verified_by = $2,
                    verification_latitude = $3, verification_longitude = $4
                WHERE id = $1 AND NOT is_used
                ",
            )
            .bind(redeem.code_id)
            .bind(&redeem.verified_by)
            .bind(redeem.latitude)
            .bind(redeem.longitude)
            .execute(&mut *tx)
            .await?;
            if used.rows_affected() == 0 {
                return Ok(TransitionOutcome::StatusChanged);
            }
        }

        let delivery_code = match &t.effects.issue_code {
            Some(issue) => Some(insert_delivery_code(&mut *tx, row.id, issue).await?),
            None => None,
        };
        let receipt = match &t.effects.receipt {
            Some(receipt) => Some(insert_receipt(&mut *tx, receipt).await?),
            None => None,
        };

        tx.commit().await?;
        Ok(TransitionOutcome::Applied(AppliedTransition {
            management: row,
            delivery_code,
            receipt,
        }))
    }

    /// Orders whose bank-transfer window closed before `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn expired_grace_periods(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderId>, RepositoryError> {
        let rows = sqlx::query_scalar::<_, OrderId>(
            r"
            SELECT customer_order_id FROM order_management
            WHERE current_status = 'payment_grace_period' AND grace_period_expires_at <= $1
            ORDER BY grace_period_expires_at
            ",
        )
        .bind(now)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // Delivery codes
    // =========================================================================

    /// The newest unused code for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_delivery_code(
        &self,
        management_id: OrderManagementId,
    ) -> Result<Option<DeliveryCode>, RepositoryError> {
        let row = sqlx::query_as::<_, DeliveryCode>(&format!(
            r"
            SELECT {CODE_COLUMNS} FROM delivery_codes
            WHERE order_management_id = $1 AND NOT is_used
            ORDER BY created_at DESC
            LIMIT 1
            "
        ))
        .bind(management_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Note that the code reached the recipient by SMS.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_code_sent(&self, id: DeliveryCodeId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE delivery_codes SET sms_sent = TRUE WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

/// Void unused codes for the order and insert the new one.
async fn insert_delivery_code(
    conn: &mut PgConnection,
    management_id: OrderManagementId,
    issue: &CodeIssue,
) -> Result<DeliveryCode, RepositoryError> {
    sqlx::query("DELETE FROM delivery_codes WHERE order_management_id = $1 AND NOT is_used")
        .bind(management_id)
        .execute(&mut *conn)
        .await?;

    let row = sqlx::query_as::<_, DeliveryCode>(&format!(
        r"
        INSERT INTO delivery_codes (order_management_id, code, expires_at)
        VALUES ($1, $2, $3)
        RETURNING {CODE_COLUMNS}
        "
    ))
    .bind(management_id)
    .bind(&issue.code)
    .bind(issue.expires_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_target() {
        let mut t = Transition::step(
            OrderId::new(7),
            OrderStatus::PaymentUploaded,
            OrderStatus::FinancialApproved,
        );
        assert_eq!(t.target(), OrderStatus::FinancialApproved);

        t.steps.push(OrderStatus::WarehousePending);
        assert_eq!(t.target(), OrderStatus::WarehousePending);

        t.steps.clear();
        assert_eq!(t.target(), OrderStatus::PaymentUploaded);
    }

    #[test]
    fn test_single_step_has_no_side_effects() {
        let t = Transition::step(
            OrderId::new(3),
            OrderStatus::LogisticsAssigned,
            OrderStatus::LogisticsDispatched,
        );
        assert!(t.effects.redeem_code.is_none());
        assert!(t.effects.issue_code.is_none());
        assert!(t.effects.receipt.is_none());
    }
}
