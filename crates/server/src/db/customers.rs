//! Customer repository: storefront accounts and CRM contacts.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use momtazchem_core::{CustomerId, Email};

use super::{RepositoryError, like_pattern};
use crate::models::{Customer, CustomerActivity, CustomerFields, CustomerSummary, PageParams};

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    email: String,
    first_name: String,
    last_name: String,
    phone: String,
    company: Option<String>,
    country: String,
    province: Option<String>,
    city: Option<String>,
    address: Option<String>,
    postal_code: Option<String>,
    customer_type: String,
    customer_status: String,
    customer_source: String,
    notes: Option<String>,
    is_active: bool,
    has_account: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid customer email in database: {e}"))
        })?;

        Ok(Self {
            id: CustomerId::new(row.id),
            email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            company: row.company,
            country: row.country,
            province: row.province,
            city: row.city,
            address: row.address,
            postal_code: row.postal_code,
            customer_type: row.customer_type,
            customer_status: row.customer_status,
            customer_source: row.customer_source,
            notes: row.notes,
            is_active: row.is_active,
            has_account: row.has_account,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerCredentialRow {
    #[sqlx(flatten)]
    customer: CustomerRow,
    password_hash: Option<String>,
}

const CUSTOMER_COLUMNS: &str = r"
    id, email, first_name, last_name, phone, company, country, province, city,
    address, postal_code, customer_type, customer_status, customer_source, notes,
    is_active, password_hash IS NOT NULL AS has_account, created_at, updated_at
";

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a customer and their password hash (if they registered) for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password(
        &self,
        email: &Email,
    ) -> Result<Option<(Customer, Option<String>)>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerCredentialRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS}, password_hash FROM customers WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((r.customer.try_into()?, r.password_hash)))
            .transpose()
    }

    /// Create a customer. `password_hash` is `None` for CRM-only contacts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub async fn create(
        &self,
        fields: &CustomerFields,
        password_hash: Option<&str>,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            INSERT INTO customers (
                email, password_hash, first_name, last_name, phone, company, country,
                province, city, address, postal_code, customer_type, customer_status,
                customer_source, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(fields.email.as_str())
        .bind(password_hash)
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.phone)
        .bind(fields.company.as_deref())
        .bind(&fields.country)
        .bind(fields.province.as_deref())
        .bind(fields.city.as_deref())
        .bind(fields.address.as_deref())
        .bind(fields.postal_code.as_deref())
        .bind(&fields.customer_type)
        .bind(&fields.customer_status)
        .bind(&fields.customer_source)
        .bind(fields.notes.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "a customer with this email already exists"))?;

        row.try_into()
    }

    /// Attach a password to an existing CRM contact (first storefront registration).
    ///
    /// Only succeeds if the contact has no password yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the account already has a password.
    pub async fn claim_account(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            UPDATE customers SET password_hash = $2, updated_at = NOW()
            WHERE email = $1 AND password_hash IS NULL
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(email.as_str())
        .bind(password_hash)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("a customer with this email already exists".to_owned()))?;

        row.try_into()
    }

    /// Replace a customer's profile fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist, or
    /// `Conflict` if the new email is taken.
    pub async fn update(
        &self,
        id: CustomerId,
        fields: &CustomerFields,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            UPDATE customers SET
                email = $2, first_name = $3, last_name = $4, phone = $5, company = $6,
                country = $7, province = $8, city = $9, address = $10, postal_code = $11,
                customer_type = $12, customer_status = $13, customer_source = $14,
                notes = $15, updated_at = NOW()
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(fields.email.as_str())
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.phone)
        .bind(fields.company.as_deref())
        .bind(&fields.country)
        .bind(fields.province.as_deref())
        .bind(fields.city.as_deref())
        .bind(fields.address.as_deref())
        .bind(fields.postal_code.as_deref())
        .bind(&fields.customer_type)
        .bind(&fields.customer_status)
        .bind(&fields.customer_source)
        .bind(fields.notes.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "a customer with this email already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Search by name, email, phone or company.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        search: Option<&str>,
        page: PageParams,
    ) -> Result<(Vec<Customer>, i64), RepositoryError> {
        let pattern = search.filter(|s| !s.trim().is_empty()).map(like_pattern);
        let filter = r"
            ($1::TEXT IS NULL
             OR first_name ILIKE $1 OR last_name ILIKE $1 OR email ILIKE $1
             OR phone ILIKE $1 OR company ILIKE $1)
        ";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM customers WHERE {filter}"
        ))
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            SELECT {CUSTOMER_COLUMNS} FROM customers
            WHERE {filter}
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(pattern.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let customers = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((customers, total))
    }

    /// Order count, spend on non-cancelled orders and last order date.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn order_summary(&self, id: CustomerId) -> Result<CustomerSummary, RepositoryError> {
        let summary = sqlx::query_as::<_, CustomerSummary>(
            r"
            SELECT COUNT(co.id) AS order_count,
                   COALESCE(SUM(co.total_amount) FILTER (WHERE om.current_status <> 'cancelled'), 0)
                       AS total_spent,
                   MAX(co.created_at) AS last_order_at
            FROM customer_orders co
            LEFT JOIN order_management om ON om.customer_order_id = co.id
            WHERE co.customer_id = $1
            ",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(summary)
    }

    /// Append a CRM activity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn add_activity(
        &self,
        id: CustomerId,
        activity_type: &str,
        description: &str,
        performed_by: Option<&str>,
    ) -> Result<CustomerActivity, RepositoryError> {
        sqlx::query_as::<_, CustomerActivity>(
            r"
            INSERT INTO customer_activities (customer_id, activity_type, description, performed_by)
            SELECT id, $2, $3, $4 FROM customers WHERE id = $1
            RETURNING id, customer_id, activity_type, description, performed_by, created_at
            ",
        )
        .bind(id)
        .bind(activity_type)
        .bind(description)
        .bind(performed_by)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Most recent activities first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn activities(
        &self,
        id: CustomerId,
        limit: i64,
    ) -> Result<Vec<CustomerActivity>, RepositoryError> {
        let rows = sqlx::query_as::<_, CustomerActivity>(
            r"
            SELECT id, customer_id, activity_type, description, performed_by, created_at
            FROM customer_activities
            WHERE customer_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
