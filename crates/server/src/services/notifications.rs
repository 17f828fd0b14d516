//! Customer notifications for order events.
//!
//! Sends run on a background task. Failures are logged and never fail the
//! request that triggered them.

use std::collections::HashMap;

use sqlx::PgPool;

use momtazchem_core::{Language, OrderId, OrderStatus};

use super::email::{EmailError, EmailService, StatusNotice};
use super::sms::{SmsError, SmsService, usage};
use crate::db::{CustomerRepository, OrderManagementRepository, OrderRepository};
use crate::models::{Customer, DeliveryCode, Order};

const CONFIRMATION_FALLBACK: &str =
    "{{company_name}}: order {{order_number}} received. Total {{total_amount}} {{currency}}.";
const STATUS_FALLBACK: &str = "{{company_name}}: order {{order_number}} is now {{status}}.";

/// Who to tell about an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Resolve the contact for an order: the account holder when there is one,
/// the guest details otherwise. Texts go to the delivery recipient.
#[must_use]
pub fn contact_for(order: &Order, customer: Option<&Customer>) -> Contact {
    let name = customer
        .map(Customer::full_name)
        .or_else(|| order.guest_name.clone())
        .unwrap_or_else(|| order.shipping_address.recipient_name.clone());
    let email = customer
        .map(|c| c.email.as_str().to_owned())
        .or_else(|| order.guest_email.clone());
    let phone = Some(order.shipping_address.phone.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .or_else(|| customer.map(|c| c.phone.clone()).filter(|p| !p.is_empty()))
        .or_else(|| order.guest_phone.clone());
    Contact { name, email, phone }
}

fn log_email_failure(err: &EmailError, order_number: &str) {
    match err {
        EmailError::NotConfigured(what) => {
            tracing::debug!(order_number, what = %what, "Order email skipped");
        }
        e => tracing::warn!(order_number, error = %e, "Order email failed"),
    }
}

fn log_sms_failure(err: &SmsError, order_number: &str) {
    match err {
        SmsError::Disabled | SmsError::NotConfigured => {
            tracing::debug!(order_number, "Order SMS skipped");
        }
        e => tracing::warn!(order_number, error = %e, "Order SMS failed"),
    }
}

/// Sends order emails and texts.
#[derive(Clone)]
pub struct Notifier {
    pool: PgPool,
    email: EmailService,
    sms: SmsService,
}

impl Notifier {
    #[must_use]
    pub const fn new(pool: PgPool, email: EmailService, sms: SmsService) -> Self {
        Self { pool, email, sms }
    }

    /// Confirm a freshly placed order.
    pub fn order_placed(&self, order: Order, status: OrderStatus) {
        let this = self.clone();
        tokio::spawn(async move {
            let contact = this.contact(&order).await;
            this.email_status(&order, &contact, status, None).await;

            if let Some(phone) = &contact.phone {
                let variables = HashMap::from([
                    ("order_number".to_owned(), order.order_number.clone()),
                    ("total_amount".to_owned(), order.total_amount.to_string()),
                    ("currency".to_owned(), order.currency.clone()),
                    ("customer_name".to_owned(), contact.name.clone()),
                ]);
                if let Err(e) = this
                    .sms
                    .send_for_usage(
                        &this.pool,
                        usage::ORDER_CONFIRMATION,
                        phone,
                        &variables,
                        CONFIRMATION_FALLBACK,
                    )
                    .await
                {
                    log_sms_failure(&e, &order.order_number);
                }
            }
        });
    }

    /// Tell the customer their order moved to `status`.
    pub fn order_status(&self, order_id: OrderId, status: OrderStatus, note: Option<String>) {
        let this = self.clone();
        tokio::spawn(async move {
            let order = match OrderRepository::new(&this.pool).get_by_id(order_id).await {
                Ok(Some(order)) => order,
                Ok(None) => return,
                Err(e) => {
                    tracing::warn!(order_id = %order_id, error = %e, "Notification lookup failed");
                    return;
                }
            };
            let contact = this.contact(&order).await;
            this.email_status(&order, &contact, status, note.as_deref())
                .await;

            if let Some(phone) = &contact.phone {
                let variables = HashMap::from([
                    ("order_number".to_owned(), order.order_number.clone()),
                    ("status".to_owned(), status.label().to_owned()),
                    ("customer_name".to_owned(), contact.name.clone()),
                ]);
                if let Err(e) = this
                    .sms
                    .send_for_usage(
                        &this.pool,
                        usage::ORDER_STATUS,
                        phone,
                        &variables,
                        STATUS_FALLBACK,
                    )
                    .await
                {
                    log_sms_failure(&e, &order.order_number);
                }
            }
        });
    }

    /// Text the delivery recipient their hand-over code and mark it sent.
    pub fn delivery_code(&self, order: Order, code: DeliveryCode) {
        let this = self.clone();
        tokio::spawn(async move {
            let Some(phone) = this.contact(&order).await.phone else {
                tracing::warn!(order_number = %order.order_number, "No phone for delivery code");
                return;
            };
            match this
                .sms
                .send_delivery_code(&this.pool, &phone, &order.order_number, &code.code)
                .await
            {
                Ok(()) => {
                    if let Err(e) = OrderManagementRepository::new(&this.pool)
                        .mark_code_sent(code.id)
                        .await
                    {
                        tracing::warn!(error = %e, "Failed to mark delivery code sent");
                    }
                }
                Err(e) => log_sms_failure(&e, &order.order_number),
            }
        });
    }

    async fn contact(&self, order: &Order) -> Contact {
        let customer = match order.customer_id {
            Some(id) => CustomerRepository::new(&self.pool)
                .get_by_id(id)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(customer_id = %id, error = %e, "Customer lookup failed");
                    None
                }),
            None => None,
        };
        contact_for(order, customer.as_ref())
    }

    async fn email_status(
        &self,
        order: &Order,
        contact: &Contact,
        status: OrderStatus,
        note: Option<&str>,
    ) {
        let Some(to) = &contact.email else {
            return;
        };
        let notice = StatusNotice {
            to,
            customer_name: &contact.name,
            order_number: &order.order_number,
            status,
            note,
            language: Language::default(),
        };
        if let Err(e) = self.email.send_order_status(&self.pool, &notice).await {
            log_email_failure(&e, &order.order_number);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use momtazchem_core::{CustomerId, Email, PaymentMethod, PaymentStatus};
    use rust_decimal::Decimal;

    use crate::models::ShippingAddress;

    fn order(recipient_phone: &str) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(1),
            order_number: "M2501111".into(),
            customer_id: None,
            guest_email: Some("guest@example.com".into()),
            guest_name: Some("Guest Buyer".into()),
            guest_phone: Some("07700000000".into()),
            payment_method: PaymentMethod::CashOnDelivery,
            payment_status: PaymentStatus::Pending,
            currency: "IQD".into(),
            subtotal: Decimal::ZERO,
            discount_total: Decimal::ZERO,
            shipping_cost: Decimal::ZERO,
            vat_amount: Decimal::ZERO,
            vat_included: false,
            total_amount: Decimal::ZERO,
            total_weight_kg: Decimal::ZERO,
            delivery_method: "courier".into(),
            shipping_address: ShippingAddress {
                recipient_name: "Site Manager".into(),
                phone: recipient_phone.into(),
                province: "Erbil".into(),
                city: "Erbil".into(),
                address: "Industrial area".into(),
                postal_code: None,
            },
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn customer() -> Customer {
        let now = Utc::now();
        Customer {
            id: CustomerId::new(4),
            email: Email::parse("buyer@example.com").unwrap(),
            first_name: "Dilan".into(),
            last_name: "Omar".into(),
            phone: "07501112233".into(),
            company: None,
            country: "Iraq".into(),
            province: None,
            city: None,
            address: None,
            postal_code: None,
            customer_type: "retail".into(),
            customer_status: "active".into(),
            customer_source: "website".into(),
            notes: None,
            is_active: true,
            has_account: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_guest_contact_uses_guest_details() {
        let contact = contact_for(&order("07509998877"), None);
        assert_eq!(contact.name, "Guest Buyer");
        assert_eq!(contact.email.as_deref(), Some("guest@example.com"));
        assert_eq!(contact.phone.as_deref(), Some("07509998877"));
    }

    #[test]
    fn test_account_contact_prefers_customer_record() {
        let customer = customer();
        let contact = contact_for(&order(" "), Some(&customer));
        assert_eq!(contact.name, "Dilan Omar");
        assert_eq!(contact.email.as_deref(), Some("buyer@example.com"));
        assert_eq!(contact.phone.as_deref(), Some("07501112233"));
    }
}
