//! Printable documents: invoices and order reports, as HTML or PDF.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use momtazchem_core::{Department, Language, OrderId};

use crate::db::{OrderRepository, ReportRepository};
use crate::error::AppError;
use crate::middleware::{AdminOrCustomer, RequireAdminAuth};
use crate::services::documents::{
    DocumentFormat, PDF_FALLBACK_HEADER, render_invoice, render_order_report,
};
use crate::state::AppState;

const DEFAULT_REPORT_DAYS: u64 = 30;

/// Build the documents router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/documents/invoices/{order_id}", get(invoice))
        .route("/api/documents/reports/orders", get(order_report))
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceQuery {
    #[serde(default)]
    pub format: DocumentFormat,
    pub language: Option<Language>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub format: DocumentFormat,
    pub department: Option<Department>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Inclusive calendar days to a half-open UTC range. Defaults to the last
/// 30 days ending today.
fn report_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    let to = to.unwrap_or(today);
    let from = from
        .or_else(|| to.checked_sub_days(Days::new(DEFAULT_REPORT_DAYS)))
        .unwrap_or(to);
    if from > to {
        return Err(AppError::BadRequest("from must not be after to".to_owned()));
    }
    let end = to
        .checked_add_days(Days::new(1))
        .ok_or_else(|| AppError::BadRequest("to is out of range".to_owned()))?;
    Ok((
        from.and_time(chrono::NaiveTime::MIN).and_utc(),
        end.and_time(chrono::NaiveTime::MIN).and_utc(),
    ))
}

/// Serve `html` directly or converted to PDF. Without a converter the HTML
/// is returned with a marker header so the client can print it instead.
async fn deliver(
    state: &AppState,
    html: String,
    format: DocumentFormat,
    file_stem: &str,
) -> Result<Response, AppError> {
    if format == DocumentFormat::Html {
        return Ok(Html(html).into_response());
    }
    match state.pdf().render(html.clone()).await? {
        Some(pdf) => Ok((
            [
                (header::CONTENT_TYPE, "application/pdf".to_owned()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{file_stem}.pdf\""),
                ),
            ],
            pdf,
        )
            .into_response()),
        None => Ok(([(PDF_FALLBACK_HEADER, "html")], Html(html)).into_response()),
    }
}

/// GET /api/documents/invoices/{order_id}?format=&language=
#[instrument(skip(viewer, state))]
async fn invoice(
    viewer: AdminOrCustomer,
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Response, AppError> {
    let not_found = || AppError::NotFound(format!("order {order_id}"));
    let order = OrderRepository::new(state.pool())
        .get_with_items(order_id)
        .await?
        .ok_or_else(not_found)?;

    // Customers only see their own orders; others get the same 404.
    if let AdminOrCustomer::Customer(customer) = &viewer
        && order.order.customer_id != Some(customer.id)
    {
        return Err(not_found());
    }

    let html = render_invoice(&order, query.language.unwrap_or_default())?;
    deliver(
        &state,
        html,
        query.format,
        &format!("invoice-{}", order.order.order_number),
    )
    .await
}

/// GET /api/documents/reports/orders?department=&from=&to=&format=
#[instrument(skip(state))]
async fn order_report(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError> {
    let (from, to) = report_range(query.from, query.to, Utc::now().date_naive())?;
    let report = ReportRepository::new(state.pool())
        .orders_by_status(query.department, from, to)
        .await?;
    let html = render_order_report(&report)?;
    let stem = query
        .department
        .map_or_else(|| "orders".to_owned(), |d| format!("{d}-orders"));
    deliver(&state, html, query.format, &stem).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_report_range_is_inclusive_of_end_day() {
        let (from, to) = report_range(
            Some(date("2025-03-01")),
            Some(date("2025-03-31")),
            date("2025-06-01"),
        )
        .unwrap();
        assert_eq!(from.to_rfc3339(), "2025-03-01T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2025-04-01T00:00:00+00:00");
    }

    #[test]
    fn test_report_range_defaults_to_last_30_days() {
        let (from, to) = report_range(None, None, date("2025-06-30")).unwrap();
        assert_eq!(from.date_naive(), date("2025-05-31"));
        assert_eq!(to.date_naive(), date("2025-07-01"));
    }

    #[test]
    fn test_report_range_rejects_reversed_dates() {
        assert!(report_range(Some(date("2025-02-01")), Some(date("2025-01-01")), date("2025-06-01")).is_err());
    }
}
