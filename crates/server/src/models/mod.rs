//! Domain models shared by the repositories, services and handlers.

pub mod admin_user;
pub mod content;
pub mod customer;
pub mod logistics;
pub mod messaging;
pub mod order;
pub mod product;
pub mod session;
pub mod workflow;

use serde::{Deserialize, Serialize};

pub use admin_user::{AdminUser, DepartmentAssignment};
pub use customer::{Customer, CustomerActivity, CustomerFields, CustomerInput, CustomerSummary};
pub use order::{Order, OrderItem, OrderTracking, OrderWithItems, ShippingAddress};
pub use product::{Product, ProductInput, QuantityDiscount};
pub use session::{CurrentAdmin, CurrentCustomer, keys as session_keys};
pub use workflow::{DeliveryCode, DepartmentOrder, OrderManagement, StatusHistoryEntry};

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

/// `?page=&per_page=` query parameters (1-based pages).
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageParams {
    #[must_use]
    pub fn page(self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    #[must_use]
    pub fn limit(self) -> i64 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    #[must_use]
    pub fn offset(self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// One page of results plus the total count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: i64, params: PageParams) -> Self {
        Self {
            items,
            total,
            page: params.page(),
            per_page: params.limit(),
        }
    }
}

/// Trim and drop empty optional text.
#[must_use]
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Reject blank required text.
///
/// # Errors
///
/// Returns a message naming the field.
pub fn require_text(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_defaults_and_clamping() {
        let params = PageParams::default();
        assert_eq!((params.page(), params.limit(), params.offset()), (1, 20, 0));

        let params = PageParams {
            page: Some(3),
            per_page: Some(500),
        };
        assert_eq!((params.limit(), params.offset()), (100, 200));

        let params = PageParams {
            page: Some(-4),
            per_page: Some(0),
        };
        assert_eq!((params.page(), params.limit(), params.offset()), (1, 1, 0));
    }

    #[test]
    fn test_clean_optional() {
        assert_eq!(clean_optional(Some("  ".into())), None);
        assert_eq!(clean_optional(Some(" Erbil ".into())), Some("Erbil".into()));
        assert_eq!(clean_optional(None), None);
    }
}
