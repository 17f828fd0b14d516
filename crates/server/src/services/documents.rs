//! Printable documents: customer invoices and department order reports.
//!
//! Documents are rendered to HTML with Askama. PDF output is produced by an
//! external HTML-to-PDF converter (`PDF_RENDERER_URL`); without one the
//! print-ready HTML is returned instead.

use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use momtazchem_core::Language;

use super::placeholders::COMPANY_NAME;
use crate::db::RepositoryError;
use crate::db::reports::OrderReport;
use crate::models::{Order, OrderItem, OrderWithItems};

const RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Header set on HTML responses served in place of a PDF.
pub const PDF_FALLBACK_HEADER: &str = "x-pdf-fallback";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    #[error("PDF renderer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PDF renderer returned {status}: {message}")]
    Renderer { status: u16, message: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Requested output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Html,
    Pdf,
}

/// Invoice headings in one language.
struct InvoiceLabels {
    invoice: &'static str,
    date: &'static str,
    status: &'static str,
    payment: &'static str,
    bill_to: &'static str,
    product: &'static str,
    quantity: &'static str,
    unit_price: &'static str,
    discount: &'static str,
    line_total: &'static str,
    subtotal: &'static str,
    shipping: &'static str,
    vat: &'static str,
    included: &'static str,
    total: &'static str,
}

const fn labels(language: Language) -> InvoiceLabels {
    match language {
        Language::En => InvoiceLabels {
            invoice: "Invoice",
            date: "Date",
            status: "Status",
            payment: "Payment",
            bill_to: "Bill to",
            product: "Product",
            quantity: "Qty",
            unit_price: "Unit price",
            discount: "Discount",
            line_total: "Total",
            subtotal: "Subtotal",
            shipping: "Shipping",
            vat: "VAT",
            included: "included",
            total: "Grand total",
        },
        Language::Ar => InvoiceLabels {
            invoice: "فاتورة",
            date: "التاريخ",
            status: "الحالة",
            payment: "الدفع",
            bill_to: "إلى",
            product: "المنتج",
            quantity: "الكمية",
            unit_price: "سعر الوحدة",
            discount: "الخصم",
            line_total: "المجموع",
            subtotal: "المجموع الفرعي",
            shipping: "الشحن",
            vat: "ضريبة القيمة المضافة",
            included: "مشمولة",
            total: "المجموع الكلي",
        },
        Language::Ku => InvoiceLabels {
            invoice: "پسوڵە",
            date: "بەروار",
            status: "دۆخ",
            payment: "پارەدان",
            bill_to: "بۆ",
            product: "بەرهەم",
            quantity: "ژمارە",
            unit_price: "نرخی یەکە",
            discount: "داشکاندن",
            line_total: "کۆ",
            subtotal: "کۆی لاوەکی",
            shipping: "گواستنەوە",
            vat: "باج",
            included: "تێدایە",
            total: "کۆی گشتی",
        },
        Language::Tr => InvoiceLabels {
            invoice: "Fatura",
            date: "Tarih",
            status: "Durum",
            payment: "Ödeme",
            bill_to: "Alıcı",
            product: "Ürün",
            quantity: "Adet",
            unit_price: "Birim fiyat",
            discount: "İndirim",
            line_total: "Tutar",
            subtotal: "Ara toplam",
            shipping: "Kargo",
            vat: "KDV",
            included: "dahil",
            total: "Genel toplam",
        },
    }
}

#[derive(Template)]
#[template(path = "documents/invoice.html")]
struct InvoiceTemplate<'a> {
    company_name: &'a str,
    lang: &'a str,
    dir: &'a str,
    labels: InvoiceLabels,
    order: &'a Order,
    items: &'a [OrderItem],
    postal_code: Option<&'a str>,
    status_label: &'a str,
    issued_on: String,
    show_discount: bool,
}

struct ReportRow {
    label: &'static str,
    count: i64,
    total_amount: Decimal,
}

#[derive(Template)]
#[template(path = "documents/order_report.html")]
struct OrderReportTemplate<'a> {
    company_name: &'a str,
    title: String,
    from: String,
    to: String,
    rows: Vec<ReportRow>,
    order_count: i64,
    total_amount: Decimal,
}

/// Render an invoice in the customer's language.
///
/// # Errors
///
/// Returns `DocumentError::Template` if rendering fails.
pub fn render_invoice(order: &OrderWithItems, language: Language) -> Result<String, DocumentError> {
    let template = InvoiceTemplate {
        company_name: COMPANY_NAME,
        lang: language.code(),
        dir: language.dir(),
        labels: labels(language),
        order: &order.order,
        items: &order.items,
        postal_code: order.order.shipping_address.postal_code.as_deref(),
        status_label: order.status.label(),
        issued_on: order.order.created_at.format("%Y-%m-%d").to_string(),
        show_discount: !order.order.discount_total.is_zero(),
    };
    Ok(template.render()?)
}

/// Render a department (or company-wide) order report.
///
/// # Errors
///
/// Returns `DocumentError::Template` if rendering fails.
pub fn render_order_report(report: &OrderReport) -> Result<String, DocumentError> {
    let title = report.department.map_or_else(
        || "order report".to_owned(),
        |d| format!("{d} department report"),
    );
    let rows = report
        .statuses
        .iter()
        .map(|s| ReportRow {
            label: s.status.label(),
            count: s.count,
            total_amount: s.total_amount,
        })
        .collect();
    let template = OrderReportTemplate {
        company_name: COMPANY_NAME,
        title,
        from: day(report.from),
        to: day(report.to),
        rows,
        order_count: report.order_count,
        total_amount: report.total_amount,
    };
    Ok(template.render()?)
}

fn day(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// Client for an HTTP HTML-to-PDF converter (e.g. Gotenberg's Chromium
/// route), which accepts the page as a multipart `index.html` file.
#[derive(Clone)]
pub struct PdfRenderer {
    inner: Arc<PdfRendererInner>,
}

struct PdfRendererInner {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl PdfRenderer {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(endpoint: Option<String>) -> Result<Self, DocumentError> {
        let client = reqwest::Client::builder().timeout(RENDER_TIMEOUT).build()?;
        Ok(Self {
            inner: Arc::new(PdfRendererInner { client, endpoint }),
        })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.endpoint.is_some()
    }

    /// Convert HTML to PDF. `Ok(None)` when no renderer is configured.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Http` or `Renderer` if the conversion fails.
    #[tracing::instrument(skip(self, html), fields(html_len = html.len()))]
    pub async fn render(&self, html: String) -> Result<Option<Vec<u8>>, DocumentError> {
        let Some(endpoint) = &self.inner.endpoint else {
            return Ok(None);
        };

        let part = reqwest::multipart::Part::text(html)
            .file_name("index.html")
            .mime_str("text/html")?;
        let form = reqwest::multipart::Form::new().part("files", part);

        let response = self
            .inner
            .client
            .post(endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(300)
                .collect();
            tracing::warn!(status = status.as_u16(), "PDF renderer rejected document");
            return Err(DocumentError::Renderer {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Some(response.bytes().await?.to_vec()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::reports::StatusCount;
    use crate::models::ShippingAddress;
    use momtazchem_core::{
        Department, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
    };

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn sample_order() -> OrderWithItems {
        let now = Utc::now();
        OrderWithItems {
            order: Order {
                id: OrderId::new(7),
                order_number: "M2501111".into(),
                customer_id: None,
                guest_email: Some("buyer@example.com".into()),
                guest_name: Some("Karwan Aziz".into()),
                guest_phone: Some("07501234567".into()),
                payment_method: PaymentMethod::BankTransfer,
                payment_status: PaymentStatus::Pending,
                currency: "IQD".into(),
                subtotal: dec("150000.00"),
                discount_total: dec("0"),
                shipping_cost: dec("25000.00"),
                vat_amount: dec("0"),
                vat_included: false,
                total_amount: dec("175000.00"),
                total_weight_kg: dec("40"),
                delivery_method: "courier".into(),
                shipping_address: ShippingAddress {
                    recipient_name: "Karwan Aziz".into(),
                    phone: "07501234567".into(),
                    province: "Erbil".into(),
                    city: "Erbil".into(),
                    address: "Gulan Street <b>7</b>".into(),
                    postal_code: Some("44001".into()),
                },
                notes: None,
                created_at: now,
                updated_at: now,
            },
            status: OrderStatus::PaymentGracePeriod,
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                order_id: OrderId::new(7),
                product_id: Some(ProductId::new(3)),
                product_name: "Fuel Additive X".into(),
                product_sku: "FA-X".into(),
                quantity: 2,
                unit_price: dec("75000.00"),
                discount_rate: dec("0"),
                total_price: dec("150000.00"),
            }],
        }
    }

    #[test]
    fn test_invoice_renders_lines_and_escapes() {
        let html = render_invoice(&sample_order(), Language::En).unwrap();
        assert!(html.contains("Invoice M2501111"));
        assert!(html.contains("Fuel Additive X"));
        assert!(html.contains("175000.00 IQD"));
        assert!(html.contains("44001"));
        assert!(!html.contains("<b>7</b>"));
        assert!(html.contains(r#"dir="ltr""#));
    }

    #[test]
    fn test_invoice_rtl_languages() {
        let html = render_invoice(&sample_order(), Language::Ar).unwrap();
        assert!(html.contains(r#"dir="rtl""#));
        assert!(html.contains("فاتورة"));
    }

    #[test]
    fn test_order_report_totals() {
        let now = Utc::now();
        let report = OrderReport {
            department: Some(Department::Financial),
            from: now,
            to: now,
            statuses: vec![StatusCount {
                status: OrderStatus::PaymentUploaded,
                count: 3,
                total_amount: dec("90000"),
            }],
            order_count: 3,
            total_amount: dec("90000"),
        };
        let html = render_order_report(&report).unwrap();
        assert!(html.contains("financial department report"));
        assert!(html.contains(OrderStatus::PaymentUploaded.label()));
        assert!(html.contains("90000"));
    }

    #[tokio::test]
    async fn test_pdf_renderer_unconfigured_returns_none() {
        let renderer = PdfRenderer::new(None).unwrap();
        assert!(!renderer.is_configured());
        assert!(renderer.render("<p>x</p>".into()).await.unwrap().is_none());
    }
}
