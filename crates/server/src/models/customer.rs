//! Customer and CRM types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use momtazchem_core::{CustomerActivityId, CustomerId, Email};

use super::{clean_optional, require_text};

/// A storefront customer / CRM contact.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub company: Option<String>,
    pub country: String,
    pub province: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub customer_type: String,
    pub customer_status: String,
    pub customer_source: String,
    pub notes: Option<String>,
    pub is_active: bool,
    /// Whether the contact can log in to the storefront.
    pub has_account: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }
}

/// Fields editable by the customer at registration and by CRM staff.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    pub company: Option<String>,
    pub country: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub customer_type: Option<String>,
    pub customer_status: Option<String>,
    pub customer_source: Option<String>,
    pub notes: Option<String>,
}

/// Validated customer fields ready for persistence.
#[derive(Debug, Clone)]
pub struct CustomerFields {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub company: Option<String>,
    pub country: String,
    pub province: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub customer_type: String,
    pub customer_status: String,
    pub customer_source: String,
    pub notes: Option<String>,
}

impl CustomerInput {
    /// Validate and normalize.
    ///
    /// # Errors
    ///
    /// Returns a message for a malformed email or missing names.
    pub fn validate(self) -> Result<CustomerFields, String> {
        let email = Email::parse(&self.email).map_err(|e| e.to_string())?;
        require_text(&self.first_name, "first_name")?;
        require_text(&self.last_name, "last_name")?;

        Ok(CustomerFields {
            email,
            first_name: self.first_name.trim().to_owned(),
            last_name: self.last_name.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
            company: clean_optional(self.company),
            country: clean_optional(self.country).unwrap_or_else(|| "Iraq".to_owned()),
            province: clean_optional(self.province),
            city: clean_optional(self.city),
            address: clean_optional(self.address),
            postal_code: clean_optional(self.postal_code),
            customer_type: clean_optional(self.customer_type).unwrap_or_else(|| "retail".to_owned()),
            customer_status: clean_optional(self.customer_status)
                .unwrap_or_else(|| "active".to_owned()),
            customer_source: clean_optional(self.customer_source)
                .unwrap_or_else(|| "website".to_owned()),
            notes: clean_optional(self.notes),
        })
    }
}

/// A CRM log entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CustomerActivity {
    pub id: CustomerActivityId,
    pub customer_id: CustomerId,
    pub activity_type: String,
    pub description: String,
    pub performed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Purchase summary shown on the CRM detail page.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CustomerSummary {
    pub order_count: i64,
    pub total_spent: Decimal,
    pub last_order_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> CustomerInput {
        CustomerInput {
            email: " Buyer@Example.IQ ".into(),
            first_name: " Aras ".into(),
            last_name: "Kareem".into(),
            phone: "07501234567".into(),
            company: Some(String::new()),
            country: None,
            province: Some("Erbil".into()),
            city: None,
            address: None,
            postal_code: None,
            customer_type: None,
            customer_status: None,
            customer_source: None,
            notes: None,
        }
    }

    #[test]
    fn test_validate_normalizes_and_defaults() {
        let fields = input().validate().unwrap();
        assert_eq!(fields.email.as_str(), "buyer@example.iq");
        assert_eq!(fields.first_name, "Aras");
        assert_eq!(fields.company, None);
        assert_eq!(fields.country, "Iraq");
        assert_eq!(fields.customer_type, "retail");
    }

    #[test]
    fn test_validate_rejects_missing_name_and_bad_email() {
        let mut bad = input();
        bad.last_name = "  ".into();
        assert_eq!(bad.validate().unwrap_err(), "last_name is required");

        let mut bad = input();
        bad.email = "nobody".into();
        assert!(bad.validate().is_err());
    }
}
