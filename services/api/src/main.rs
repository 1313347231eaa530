//! Factory Order Management API
//!
//! Backend for the factory order-tracking dashboard:
//! - POST /auth/register, /auth/login - user accounts and bearer tokens
//! - POST /ingest/outstanding-csv, /ingest/delivery-csv - CSV uploads
//! - POST /ingest/from-folder - scan the configured data folder
//! - GET  /orders/search, /orders/open - search over the unified table
//! - GET  /analytics/* - fiscal-year sales aggregations
//! - GET  /health, /debug/* - liveness and inspection

use std::sync::Arc;

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

mod analytics;
mod auth;
mod config;
mod dates;
mod db;
mod ingest;
mod mappers;
mod orders;
mod table;

use config::Settings;
use orders::{Order, OrderSummary};

pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

pub fn internal_error<E: std::fmt::Display>(err: &E) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Liveness + debug handlers
// ============================================================================

async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Factory Order Management API is running"
    }))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "environment": state.settings.app_env,
    }))
}

async fn orders_summary_handler(State(state): State<Arc<AppState>>) -> Response {
    let result: Result<(i64, i64, i64), sqlx::Error> = async {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(&state.pool)
            .await?;
        let (pending,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM orders WHERE status = 'PENDING'")
                .fetch_one(&state.pool)
                .await?;
        let (dispatched,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM orders WHERE status = 'DISPATCHED'")
                .fetch_one(&state.pool)
                .await?;
        Ok((total, pending, dispatched))
    }
    .await;

    match result {
        Ok((total, pending, dispatched)) => Json(serde_json::json!({
            "total_orders": total,
            "pending_orders": pending,
            "dispatched_orders": dispatched,
        }))
        .into_response(),
        Err(e) => internal_error(&e),
    }
}

#[derive(Deserialize)]
struct ListOrdersQuery {
    limit: Option<i64>,
}

async fn list_orders_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListOrdersQuery>,
) -> Response {
    let limit = params.limit.unwrap_or(50).clamp(1, 1000);

    let query = format!(
        "SELECT {} FROM orders ORDER BY id DESC LIMIT $1",
        orders::SUMMARY_COLUMNS
    );

    match sqlx::query_as::<_, OrderSummary>(&query)
        .bind(limit)
        .fetch_all(&state.pool)
        .await
    {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => internal_error(&e),
    }
}

async fn get_order_handler(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<i64>,
) -> Response {
    match sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(&state.pool)
        .await
    {
        Ok(Some(order)) => Json(order).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Order not found".to_string(),
            }),
        )
            .into_response(),
        Err(e) => internal_error(&e),
    }
}

#[derive(Serialize, sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    role: String,
}

async fn list_users_handler(State(state): State<Arc<AppState>>) -> Response {
    match sqlx::query_as::<_, UserRow>("SELECT id, email, role FROM users ORDER BY id")
        .fetch_all(&state.pool)
        .await
    {
        Ok(users) => Json(users).into_response(),
        Err(e) => internal_error(&e),
    }
}

// ============================================================================
// Wiring
// ============================================================================

fn build_cors(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;

    println!("=== Factory Order Management API ===");
    println!("Environment: {}", settings.app_env);
    println!("Connecting to database...");

    let pool = db::connect(&settings.database_url).await?;
    db::init_schema(&pool)
        .await
        .context("Failed to initialize database schema")?;
    println!("Database ready");

    let cors = build_cors(&settings.cors_allowed_origins);
    let bind = settings.bind.clone();
    let state = Arc::new(AppState { pool, settings });

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route(
            "/ingest/outstanding-csv",
            post(ingest::ingest_outstanding_csv),
        )
        .route("/ingest/delivery-csv", post(ingest::ingest_delivery_csv))
        .route("/ingest/from-folder", post(ingest::ingest_from_folder))
        .route("/orders/search", get(orders::search_orders))
        .route("/orders/open", get(orders::open_orders))
        .route(
            "/analytics/financial-year",
            get(analytics::financial_year_summary),
        )
        .route("/analytics/product-wise", get(analytics::product_wise_sales))
        .route(
            "/analytics/customer-wise",
            get(analytics::customer_wise_sales),
        )
        .route("/debug/orders/summary", get(orders_summary_handler))
        .route("/debug/orders", get(list_orders_handler))
        .route("/debug/orders/:order_id", get(get_order_handler))
        .route("/debug/users", get(list_users_handler))
        // Daily exports run to a few megabytes; leave generous headroom.
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(cors)
        .with_state(state);

    println!("API listening on http://{}", bind);
    println!("\nEndpoints:");
    println!("  POST /auth/register");
    println!("  POST /auth/login");
    println!("  POST /ingest/outstanding-csv");
    println!("  POST /ingest/delivery-csv");
    println!("  POST /ingest/from-folder");
    println!("  GET  /orders/search?po_number=&part_number=&customer_name=&status=&financial_year=");
    println!("  GET  /orders/open?today_only=&part_number=&customer_name=");
    println!("  GET  /analytics/financial-year?financial_year=YYYY-YYYY");
    println!("  GET  /analytics/product-wise?financial_year=YYYY-YYYY");
    println!("  GET  /analytics/customer-wise?financial_year=YYYY-YYYY");
    println!("  GET  /health");

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
