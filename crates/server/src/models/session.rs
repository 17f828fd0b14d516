//! Identities stored in the session.

use serde::{Deserialize, Serialize};

use momtazchem_core::{AdminRole, AdminUserId, CustomerId, Email};

use super::{AdminUser, Customer};

/// Session-stored admin identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAdmin {
    pub id: AdminUserId,
    pub email: Email,
    pub name: String,
    pub role: AdminRole,
}

/// Session-stored customer identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    pub id: CustomerId,
    pub email: Email,
    pub name: String,
}

impl From<&AdminUser> for CurrentAdmin {
    fn from(admin: &AdminUser) -> Self {
        Self {
            id: admin.id,
            email: admin.email.clone(),
            name: admin.name.clone(),
            role: admin.role,
        }
    }
}

impl From<&Customer> for CurrentCustomer {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id,
            email: customer.email.clone(),
            name: customer.full_name(),
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";

    /// Key for storing the current logged-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";
}
