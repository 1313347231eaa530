//! Connection pool and startup schema.
//!
//! The service owns its schema the way the original deployment did:
//! applied at startup, additive only (`IF NOT EXISTS` everywhere).

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn connect(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to database")
}

pub async fn init_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(CREATE_ORDERS).execute(pool).await?;
    sqlx::query(CREATE_USERS).execute(pool).await?;
    for statement in CREATE_INDEXES {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

const CREATE_ORDERS: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id BIGSERIAL PRIMARY KEY,
    source_type TEXT NOT NULL,
    status TEXT,
    so_number TEXT,
    so_date DATE,
    order_no TEXT,
    order_date DATE,
    po_serial TEXT,
    customer_name TEXT,
    customer_code TEXT,
    style_no TEXT,
    item_code TEXT,
    met_code TEXT,
    product_code TEXT,
    drawing_no TEXT,
    size TEXT,
    part_number TEXT,
    order_qty BIGINT,
    pack_qty BIGINT,
    sale_qty BIGINT,
    cancel_qty BIGINT,
    os_order_qty BIGINT,
    quantity BIGINT,
    unit TEXT,
    net_kg DOUBLE PRECISION,
    part_full TEXT,
    rate DOUBLE PRECISION,
    amount DOUBLE PRECISION,
    gross_value DOUBLE PRECISION,
    currency TEXT,
    currency_value DOUBLE PRECISION,
    freight_amount DOUBLE PRECISION,
    delivery_date DATE,
    commitment_date DATE,
    packslip_no TEXT,
    packslip_date DATE,
    invoice_no TEXT,
    invoice_date DATE,
    docket_no TEXT,
    docket_date DATE,
    transporter TEXT,
    freight_mode TEXT,
    from_station TEXT,
    to_station TEXT,
    package_details TEXT,
    gross_weight DOUBLE PRECISION,
    charge_weight DOUBLE PRECISION,
    insurance_mode TEXT,
    department TEXT,
    department_remark TEXT,
    state_code TEXT,
    payment_term TEXT,
    so_comment TEXT,
    so_special_remark TEXT,
    die_indent TEXT,
    sub_head TEXT,
    item_description TEXT,
    financial_year TEXT,
    last_updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    full_name TEXT,
    hashed_password TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'user'
)
"#;

// Lookup columns: source/status filters, the natural-key fields, and the
// search/analytics filter columns.
const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_orders_source_type ON orders (source_type)",
    "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders (status)",
    "CREATE INDEX IF NOT EXISTS idx_orders_so_number ON orders (so_number)",
    "CREATE INDEX IF NOT EXISTS idx_orders_order_no ON orders (order_no)",
    "CREATE INDEX IF NOT EXISTS idx_orders_po_serial ON orders (po_serial)",
    "CREATE INDEX IF NOT EXISTS idx_orders_part_number ON orders (part_number)",
    "CREATE INDEX IF NOT EXISTS idx_orders_delivery_date ON orders (delivery_date)",
    "CREATE INDEX IF NOT EXISTS idx_orders_customer_name ON orders (customer_name)",
    "CREATE INDEX IF NOT EXISTS idx_orders_customer_code ON orders (customer_code)",
    "CREATE INDEX IF NOT EXISTS idx_orders_financial_year ON orders (financial_year)",
];
