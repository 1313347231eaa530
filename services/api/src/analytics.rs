//! Fiscal-year sales aggregations over dispatched orders.
//!
//! All three endpoints take a `financial_year` label like `2024-2025`,
//! resolve it to the 1 April – 31 March date range, and aggregate DELIVERY
//! rows whose delivery date falls inside it. A malformed label is a 400
//! before any query runs.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::parse_financial_year_label;
use crate::{ErrorResponse, AppState};

#[derive(Deserialize)]
pub struct FinancialYearQuery {
    pub financial_year: String,
}

#[derive(Serialize)]
struct FinancialYearSummary {
    financial_year: String,
    total_sales_amount: f64,
    total_quantity: i64,
}

#[derive(Serialize, sqlx::FromRow)]
struct PartTotal {
    part_number: Option<String>,
    total_amount: f64,
}

#[derive(Serialize, sqlx::FromRow)]
struct CustomerTotal {
    customer_name: Option<String>,
    total_amount: f64,
}

fn fiscal_range(label: &str) -> Result<(NaiveDate, NaiveDate), Response> {
    parse_financial_year_label(label).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response()
    })
}

pub async fn financial_year_summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FinancialYearQuery>,
) -> Response {
    let (start, end) = match fiscal_range(&params.financial_year) {
        Ok(range) => range,
        Err(response) => return response,
    };

    let totals: Result<(f64, i64), _> = sqlx::query_as(
        "SELECT COALESCE(SUM(amount), 0)::double precision, \
                COALESCE(SUM(quantity), 0)::bigint \
         FROM orders \
         WHERE source_type = 'DELIVERY' AND delivery_date >= $1 AND delivery_date <= $2",
    )
    .bind(start)
    .bind(end)
    .fetch_one(&state.pool)
    .await;

    match totals {
        Ok((total_sales_amount, total_quantity)) => Json(FinancialYearSummary {
            financial_year: params.financial_year,
            total_sales_amount,
            total_quantity,
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

pub async fn product_wise_sales(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FinancialYearQuery>,
) -> Response {
    let (start, end) = match fiscal_range(&params.financial_year) {
        Ok(range) => range,
        Err(response) => return response,
    };

    let rows: Result<Vec<PartTotal>, _> = sqlx::query_as(
        "SELECT part_number, COALESCE(SUM(amount), 0)::double precision AS total_amount \
         FROM orders \
         WHERE source_type = 'DELIVERY' AND delivery_date >= $1 AND delivery_date <= $2 \
         GROUP BY part_number \
         ORDER BY total_amount DESC",
    )
    .bind(start)
    .bind(end)
    .fetch_all(&state.pool)
    .await;

    match rows {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

pub async fn customer_wise_sales(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FinancialYearQuery>,
) -> Response {
    let (start, end) = match fiscal_range(&params.financial_year) {
        Ok(range) => range,
        Err(response) => return response,
    };

    let rows: Result<Vec<CustomerTotal>, _> = sqlx::query_as(
        "SELECT customer_name, COALESCE(SUM(amount), 0)::double precision AS total_amount \
         FROM orders \
         WHERE source_type = 'DELIVERY' AND delivery_date >= $1 AND delivery_date <= $2 \
         GROUP BY customer_name \
         ORDER BY total_amount DESC",
    )
    .bind(start)
    .bind(end)
    .fetch_all(&state.pool)
    .await;

    match rows {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}
