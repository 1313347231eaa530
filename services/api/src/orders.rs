//! Order search and read endpoints over the unified `orders` table.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{ErrorResponse, AppState};

/// One full `orders` row, as stored.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub source_type: String,
    pub status: Option<String>,

    pub so_number: Option<String>,
    pub so_date: Option<NaiveDate>,
    pub order_no: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub po_serial: Option<String>,

    pub customer_name: Option<String>,
    pub customer_code: Option<String>,

    pub style_no: Option<String>,
    pub item_code: Option<String>,
    pub met_code: Option<String>,
    pub product_code: Option<String>,
    pub drawing_no: Option<String>,
    pub size: Option<String>,
    pub part_number: Option<String>,

    pub order_qty: Option<i64>,
    pub pack_qty: Option<i64>,
    pub sale_qty: Option<i64>,
    pub cancel_qty: Option<i64>,
    pub os_order_qty: Option<i64>,
    pub quantity: Option<i64>,

    pub unit: Option<String>,
    pub net_kg: Option<f64>,
    pub part_full: Option<String>,

    pub rate: Option<f64>,
    pub amount: Option<f64>,
    pub gross_value: Option<f64>,
    pub currency: Option<String>,
    pub currency_value: Option<f64>,
    pub freight_amount: Option<f64>,

    pub delivery_date: Option<NaiveDate>,
    pub commitment_date: Option<NaiveDate>,

    pub packslip_no: Option<String>,
    pub packslip_date: Option<NaiveDate>,
    pub invoice_no: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub docket_no: Option<String>,
    pub docket_date: Option<NaiveDate>,

    pub transporter: Option<String>,
    pub freight_mode: Option<String>,
    pub from_station: Option<String>,
    pub to_station: Option<String>,
    pub package_details: Option<String>,
    pub gross_weight: Option<f64>,
    pub charge_weight: Option<f64>,
    pub insurance_mode: Option<String>,

    pub department: Option<String>,
    pub department_remark: Option<String>,
    pub state_code: Option<String>,
    pub payment_term: Option<String>,
    pub so_comment: Option<String>,
    pub so_special_remark: Option<String>,
    pub die_indent: Option<String>,
    pub sub_head: Option<String>,

    pub item_description: Option<String>,
    pub financial_year: Option<String>,

    pub last_updated_at: DateTime<Utc>,
}

/// The slimmer shape the search views return.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderSummary {
    pub id: i64,
    pub source_type: String,
    pub status: Option<String>,

    pub so_number: Option<String>,
    pub order_no: Option<String>,

    pub customer_name: Option<String>,
    pub customer_code: Option<String>,

    pub part_number: Option<String>,

    pub order_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub financial_year: Option<String>,

    pub department: Option<String>,
    pub item_description: Option<String>,

    pub quantity: Option<i64>,
    pub order_qty: Option<i64>,
    pub os_order_qty: Option<i64>,

    pub last_updated_at: DateTime<Utc>,
}

pub(crate) const SUMMARY_COLUMNS: &str = "id, source_type, status, so_number, order_no, customer_name, \
customer_code, part_number, order_date, delivery_date, financial_year, department, \
item_description, quantity, order_qty, os_order_qty, last_updated_at";

#[derive(Deserialize)]
pub struct SearchQuery {
    pub po_number: Option<String>,
    pub serial_number: Option<String>,
    pub part_number: Option<String>,
    pub customer_name: Option<String>,
    pub status: Option<String>,
    pub source_type: Option<String>,
    pub financial_year: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

#[derive(Deserialize)]
pub struct OpenOrdersQuery {
    #[serde(default)]
    pub today_only: bool,
    pub part_number: Option<String>,
    pub customer_name: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

fn like_pattern(value: &str) -> String {
    format!("%{}%", value)
}

/// Main search endpoint: PO number over `order_no` or `so_number`, plus
/// serial/part/customer contains-filters and exact status, source and
/// fiscal-year matches.
pub async fn search_orders(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Response {
    let limit = params.limit.unwrap_or(50).clamp(1, 1000);
    let skip = params.skip.unwrap_or(0).max(0);

    // Build the WHERE clause dynamically, binding only present filters.
    let mut query = format!("SELECT {} FROM orders WHERE 1=1", SUMMARY_COLUMNS);
    let mut idx = 1;

    if params.po_number.is_some() {
        query.push_str(&format!(
            " AND (order_no ILIKE ${} OR so_number ILIKE ${})",
            idx, idx
        ));
        idx += 1;
    }
    if params.serial_number.is_some() {
        query.push_str(&format!(" AND po_serial ILIKE ${}", idx));
        idx += 1;
    }
    if params.part_number.is_some() {
        query.push_str(&format!(" AND part_number ILIKE ${}", idx));
        idx += 1;
    }
    if params.customer_name.is_some() {
        query.push_str(&format!(" AND customer_name ILIKE ${}", idx));
        idx += 1;
    }
    if params.status.is_some() {
        query.push_str(&format!(" AND status = ${}", idx));
        idx += 1;
    }
    if params.source_type.is_some() {
        query.push_str(&format!(" AND source_type = ${}", idx));
        idx += 1;
    }
    if params.financial_year.is_some() {
        query.push_str(&format!(" AND financial_year = ${}", idx));
        idx += 1;
    }

    query.push_str(&format!(
        " ORDER BY id DESC LIMIT ${} OFFSET ${}",
        idx,
        idx + 1
    ));

    let mut q = sqlx::query_as::<_, OrderSummary>(&query);

    if let Some(po) = &params.po_number {
        q = q.bind(like_pattern(po));
    }
    if let Some(serial) = &params.serial_number {
        q = q.bind(like_pattern(serial));
    }
    if let Some(part) = &params.part_number {
        q = q.bind(like_pattern(part));
    }
    if let Some(customer) = &params.customer_name {
        q = q.bind(like_pattern(customer));
    }
    if let Some(status) = &params.status {
        q = q.bind(status.to_uppercase());
    }
    if let Some(source) = &params.source_type {
        q = q.bind(source.to_uppercase());
    }
    if let Some(fy) = &params.financial_year {
        q = q.bind(fy.clone());
    }
    q = q.bind(limit).bind(skip);

    match q.fetch_all(&state.pool).await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// Open-orders view: every PENDING row, optionally only today's
/// deliveries, soonest delivery first with undated rows last.
pub async fn open_orders(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OpenOrdersQuery>,
) -> Response {
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    let skip = params.skip.unwrap_or(0).max(0);

    let mut query = format!(
        "SELECT {} FROM orders WHERE status = 'PENDING'",
        SUMMARY_COLUMNS
    );
    let mut idx = 1;

    if params.today_only {
        query.push_str(&format!(" AND delivery_date = ${}", idx));
        idx += 1;
    }
    if params.part_number.is_some() {
        query.push_str(&format!(" AND part_number ILIKE ${}", idx));
        idx += 1;
    }
    if params.customer_name.is_some() {
        query.push_str(&format!(" AND customer_name ILIKE ${}", idx));
        idx += 1;
    }

    query.push_str(&format!(
        " ORDER BY delivery_date ASC NULLS LAST, id DESC LIMIT ${} OFFSET ${}",
        idx,
        idx + 1
    ));

    let mut q = sqlx::query_as::<_, OrderSummary>(&query);

    if params.today_only {
        q = q.bind(Utc::now().date_naive());
    }
    if let Some(part) = &params.part_number {
        q = q.bind(like_pattern(part));
    }
    if let Some(customer) = &params.customer_name {
        q = q.bind(like_pattern(customer));
    }
    q = q.bind(limit).bind(skip);

    match q.fetch_all(&state.pool).await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}
