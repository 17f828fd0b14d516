//! Aggregate queries for department reports and the CRM dashboard.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use momtazchem_core::{Department, OrderStatus};

use super::RepositoryError;

/// Orders in one status.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
    pub total_amount: Decimal,
}

/// Orders created within a period, grouped by status.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReport {
    pub department: Option<Department>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub statuses: Vec<StatusCount>,
    pub order_count: i64,
    pub total_amount: Decimal,
}

impl OrderReport {
    fn new(
        department: Option<Department>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: Vec<StatusCount>,
    ) -> Self {
        let order_count = statuses.iter().map(|s| s.count).sum();
        let total_amount = statuses.iter().map(|s| s.total_amount).sum();
        Self {
            department,
            from,
            to,
            statuses,
            order_count,
            total_amount,
        }
    }
}

/// Headline CRM numbers.
#[derive(Debug, Clone, Serialize)]
pub struct CrmDashboard {
    pub total_customers: i64,
    pub new_customers_this_month: i64,
    pub orders_by_department: BTreeMap<Department, i64>,
    pub completed_revenue: Decimal,
}

#[derive(sqlx::FromRow)]
struct CustomerTotals {
    total_customers: i64,
    new_customers_this_month: i64,
}

/// Repository for read-only reporting queries.
pub struct ReportRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReportRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Orders created in `[from, to)` grouped by current status, limited to
    /// the statuses a department owns when one is given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn orders_by_status(
        &self,
        department: Option<Department>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<OrderReport, RepositoryError> {
        let owned: Option<Vec<&str>> = department.map(|d| {
            d.statuses().into_iter().map(OrderStatus::as_str).collect()
        });

        let statuses = sqlx::query_as::<_, StatusCount>(
            r"
            SELECT om.current_status AS status,
                   COUNT(*) AS count,
                   COALESCE(SUM(co.total_amount), 0) AS total_amount
            FROM customer_orders co
            JOIN order_management om ON om.customer_order_id = co.id
            WHERE co.created_at >= $1 AND co.created_at < $2
              AND ($3::TEXT[] IS NULL OR om.current_status = ANY($3::order_status[]))
            GROUP BY om.current_status
            ORDER BY om.current_status
            ",
        )
        .bind(from)
        .bind(to)
        .bind(owned)
        .fetch_all(self.pool)
        .await?;

        Ok(OrderReport::new(department, from, to, statuses))
    }

    /// Dashboard totals as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn crm_dashboard(&self, now: DateTime<Utc>) -> Result<CrmDashboard, RepositoryError> {
        let customers = sqlx::query_as::<_, CustomerTotals>(
            r"
            SELECT COUNT(*) AS total_customers,
                   COUNT(*) FILTER (WHERE created_at >= date_trunc('month', $1::TIMESTAMPTZ))
                       AS new_customers_this_month
            FROM customers
            ",
        )
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        let per_status = sqlx::query_as::<_, (OrderStatus, i64)>(
            "SELECT current_status, COUNT(*) FROM order_management GROUP BY current_status",
        )
        .fetch_all(self.pool)
        .await?;

        let completed_revenue = sqlx::query_scalar::<_, Decimal>(
            r"
            SELECT COALESCE(SUM(co.total_amount), 0)
            FROM customer_orders co
            JOIN order_management om ON om.customer_order_id = co.id
            WHERE om.current_status = 'completed'
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(CrmDashboard {
            total_customers: customers.total_customers,
            new_customers_this_month: customers.new_customers_this_month,
            orders_by_department: group_by_department(&per_status),
            completed_revenue,
        })
    }
}

/// Fold per-status counts into the owning departments. Every department
/// appears, even with zero orders.
fn group_by_department(per_status: &[(OrderStatus, i64)]) -> BTreeMap<Department, i64> {
    let mut totals: BTreeMap<Department, i64> = Department::ALL.iter().map(|d| (*d, 0)).collect();
    for (status, count) in per_status {
        if let Some(department) = status.department() {
            *totals.entry(department).or_default() += count;
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_department() {
        let grouped = group_by_department(&[
            (OrderStatus::PaymentUploaded, 3),
            (OrderStatus::FinancialReviewing, 2),
            (OrderStatus::WarehousePending, 4),
            (OrderStatus::Completed, 9),
        ]);
        assert_eq!(grouped[&Department::Financial], 5);
        assert_eq!(grouped[&Department::Warehouse], 4);
        assert_eq!(grouped[&Department::Logistics], 0);
    }

    #[test]
    fn test_report_totals() {
        let now = Utc::now();
        let report = OrderReport::new(
            Some(Department::Financial),
            now,
            now,
            vec![
                StatusCount {
                    status: OrderStatus::PaymentUploaded,
                    count: 2,
                    total_amount: Decimal::new(15000, 2),
                },
                StatusCount {
                    status: OrderStatus::FinancialRejected,
                    count: 1,
                    total_amount: Decimal::new(2550, 2),
                },
            ],
        );
        assert_eq!(report.order_count, 3);
        assert_eq!(report.total_amount, Decimal::new(17550, 2));
    }
}
