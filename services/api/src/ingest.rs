//! Ingestion: upload and folder-scan endpoints plus the natural-key
//! upsert engine.
//!
//! Responsibilities:
//! - Gate uploads on file extension before any row is read
//! - Drive every row of a batch through the matching mapper and the upsert
//! - Commit one transaction per ingestion request (whole-batch durability)
//! - Report row counts back to the caller
//!
//! Re-uploading the same export, or a daily re-export with overlapping
//! rows, converges to the same stored state: rows land on their natural
//! key and update in place.

use std::path::Path;
use std::sync::Arc;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::fs;

use crate::auth::AdminUser;
use crate::mappers::{
    map_delivery_row, map_outstanding_row, OrderRecord, DELIVERY_COLUMNS, OUTSTANDING_COLUMNS,
};
use crate::table::{self, RawTable};
use crate::{bad_request, internal_error, AppState};

/// Which of the two fixed source formats a batch is ingested as. Chosen by
/// the caller's endpoint, never sniffed from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Outstanding,
    Delivery,
}

impl Operation {
    pub fn expected_columns(self) -> &'static [&'static str] {
        match self {
            Operation::Outstanding => OUTSTANDING_COLUMNS,
            Operation::Delivery => DELIVERY_COLUMNS,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Operation::Outstanding => "outstanding",
            Operation::Delivery => "delivery",
        }
    }

    /// Subdirectory of the configured data folder scanned for this format.
    pub fn subdirectory(self) -> &'static str {
        self.label()
    }
}

// =============================================================================
// UPSERT ENGINE
// =============================================================================

/// `orders` columns written by the upsert, in `OrderRecord` field order.
/// `bind_record` must bind in exactly this order.
const ORDER_COLUMNS: &[&str] = &[
    "source_type",
    "status",
    "so_number",
    "so_date",
    "order_no",
    "order_date",
    "po_serial",
    "customer_name",
    "customer_code",
    "style_no",
    "item_code",
    "met_code",
    "product_code",
    "drawing_no",
    "size",
    "part_number",
    "order_qty",
    "pack_qty",
    "sale_qty",
    "cancel_qty",
    "os_order_qty",
    "quantity",
    "unit",
    "net_kg",
    "part_full",
    "rate",
    "amount",
    "gross_value",
    "currency",
    "currency_value",
    "freight_amount",
    "delivery_date",
    "commitment_date",
    "packslip_no",
    "packslip_date",
    "invoice_no",
    "invoice_date",
    "docket_no",
    "docket_date",
    "transporter",
    "freight_mode",
    "from_station",
    "to_station",
    "package_details",
    "gross_weight",
    "charge_weight",
    "insurance_mode",
    "department",
    "department_remark",
    "state_code",
    "payment_term",
    "so_comment",
    "so_special_remark",
    "die_indent",
    "sub_head",
    "item_description",
    "financial_year",
];

/// Natural-key lookup. `IS NOT DISTINCT FROM` makes absent match absent:
/// a record with no S/O number finds stored rows that also have none.
/// `LIMIT 1` keeps first-match-wins behavior for legacy duplicates.
const SELECT_BY_NATURAL_KEY: &str = "\
SELECT id FROM orders \
WHERE source_type = $1 \
  AND so_number IS NOT DISTINCT FROM $2 \
  AND order_no IS NOT DISTINCT FROM $3 \
  AND po_serial IS NOT DISTINCT FROM $4 \
  AND part_number IS NOT DISTINCT FROM $5 \
  AND delivery_date IS NOT DISTINCT FROM $6 \
LIMIT 1";

fn insert_sql() -> &'static str {
    static SQL: OnceLock<String> = OnceLock::new();
    SQL.get_or_init(|| {
        let placeholders: Vec<String> = (1..=ORDER_COLUMNS.len())
            .map(|i| format!("${}", i))
            .collect();
        format!(
            "INSERT INTO orders ({}) VALUES ({})",
            ORDER_COLUMNS.join(", "),
            placeholders.join(", ")
        )
    })
}

fn update_sql() -> &'static str {
    static SQL: OnceLock<String> = OnceLock::new();
    SQL.get_or_init(|| {
        let assignments: Vec<String> = ORDER_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ${}", col, i + 1))
            .collect();
        format!(
            "UPDATE orders SET {}, last_updated_at = now() WHERE id = ${}",
            assignments.join(", "),
            ORDER_COLUMNS.len() + 1
        )
    })
}

/// Bind every `ORDER_COLUMNS` value from the record, in column order.
fn bind_record<'q>(
    query: Query<'q, Postgres, PgArguments>,
    r: &OrderRecord,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(r.source_type)
        .bind(r.status)
        .bind(r.so_number.clone())
        .bind(r.so_date)
        .bind(r.order_no.clone())
        .bind(r.order_date)
        .bind(r.po_serial.clone())
        .bind(r.customer_name.clone())
        .bind(r.customer_code.clone())
        .bind(r.style_no.clone())
        .bind(r.item_code.clone())
        .bind(r.met_code.clone())
        .bind(r.product_code.clone())
        .bind(r.drawing_no.clone())
        .bind(r.size.clone())
        .bind(r.part_number.clone())
        .bind(r.order_qty)
        .bind(r.pack_qty)
        .bind(r.sale_qty)
        .bind(r.cancel_qty)
        .bind(r.os_order_qty)
        .bind(r.quantity)
        .bind(r.unit.clone())
        .bind(r.net_kg)
        .bind(r.part_full.clone())
        .bind(r.rate)
        .bind(r.amount)
        .bind(r.gross_value)
        .bind(r.currency.clone())
        .bind(r.currency_value)
        .bind(r.freight_amount)
        .bind(r.delivery_date)
        .bind(r.commitment_date)
        .bind(r.packslip_no.clone())
        .bind(r.packslip_date)
        .bind(r.invoice_no.clone())
        .bind(r.invoice_date)
        .bind(r.docket_no.clone())
        .bind(r.docket_date)
        .bind(r.transporter.clone())
        .bind(r.freight_mode.clone())
        .bind(r.from_station.clone())
        .bind(r.to_station.clone())
        .bind(r.package_details.clone())
        .bind(r.gross_weight)
        .bind(r.charge_weight)
        .bind(r.insurance_mode.clone())
        .bind(r.department.clone())
        .bind(r.department_remark.clone())
        .bind(r.state_code.clone())
        .bind(r.payment_term.clone())
        .bind(r.so_comment.clone())
        .bind(r.so_special_remark.clone())
        .bind(r.die_indent.clone())
        .bind(r.sub_head.clone())
        .bind(r.item_description.clone())
        .bind(r.financial_year.clone())
}

/// Insert-or-update one normalized record on its natural key. On update,
/// every mapped field is overwritten and `last_updated_at` refreshed.
pub async fn upsert_order(
    tx: &mut Transaction<'_, Postgres>,
    record: &OrderRecord,
) -> Result<()> {
    let key = record.natural_key();

    let existing: Option<(i64,)> = sqlx::query_as(SELECT_BY_NATURAL_KEY)
        .bind(key.source_type)
        .bind(key.so_number)
        .bind(key.order_no)
        .bind(key.po_serial)
        .bind(key.part_number)
        .bind(key.delivery_date)
        .fetch_optional(&mut **tx)
        .await?;

    match existing {
        Some((id,)) => {
            bind_record(sqlx::query(update_sql()), record)
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
        None => {
            bind_record(sqlx::query(insert_sql()), record)
                .execute(&mut **tx)
                .await?;
        }
    }

    Ok(())
}

// =============================================================================
// ORCHESTRATION
// =============================================================================

/// Map and upsert every row of one table within the caller's transaction.
async fn ingest_rows(
    tx: &mut Transaction<'_, Postgres>,
    parsed: &RawTable,
    op: Operation,
) -> Result<u64> {
    let missing = parsed.missing_columns(op.expected_columns());
    if !missing.is_empty() {
        println!(
            "Warning: {} file is missing expected columns: {}",
            op.label(),
            missing.join(", ")
        );
    }

    let mut rows_processed = 0u64;
    for row in parsed.rows() {
        let record = match op {
            Operation::Outstanding => map_outstanding_row(&row),
            Operation::Delivery => map_delivery_row(&row),
        };
        upsert_order(tx, &record).await?;
        rows_processed += 1;
    }

    Ok(rows_processed)
}

/// One uploaded table = one transaction, committed after the last row.
async fn ingest_batch(pool: &PgPool, parsed: &RawTable, op: Operation) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let rows_processed = ingest_rows(&mut tx, parsed, op).await?;
    tx.commit().await?;
    Ok(rows_processed)
}

// =============================================================================
// HANDLERS
// =============================================================================

pub async fn ingest_outstanding_csv(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    multipart: Multipart,
) -> Response {
    ingest_csv_upload(&state, multipart, Operation::Outstanding).await
}

pub async fn ingest_delivery_csv(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    multipart: Multipart,
) -> Response {
    ingest_csv_upload(&state, multipart, Operation::Delivery).await
}

async fn ingest_csv_upload(state: &AppState, mut multipart: Multipart, op: Operation) -> Response {
    // Take the first uploaded file part.
    let field = loop {
        match multipart.next_field().await {
            Ok(Some(f)) if f.file_name().is_some() || f.name() == Some("file") => break f,
            Ok(Some(_)) => continue,
            Ok(None) => return bad_request("Missing file field"),
            Err(e) => return bad_request(&format!("Invalid multipart body: {}", e)),
        }
    };

    // Reject the wrong extension before reading a single row.
    let filename = field.file_name().unwrap_or_default().to_string();
    if !table::is_csv_filename(&filename) {
        return bad_request("Please upload a CSV file");
    }

    let bytes = match field.bytes().await {
        Ok(b) => b,
        Err(e) => return bad_request(&format!("Error reading upload: {}", e)),
    };

    let parsed = match table::read_csv_table(&table::decode_csv_bytes(&bytes)) {
        Ok(t) => t,
        Err(e) => return bad_request(&format!("Error reading CSV: {}", e)),
    };

    println!(
        "Ingesting {} rows from uploaded {} file '{}'",
        parsed.len(),
        op.label(),
        filename
    );

    match ingest_batch(&state.pool, &parsed, op).await {
        Ok(rows_processed) => Json(serde_json::json!({
            "status": "success",
            "rows_processed": rows_processed,
        }))
        .into_response(),
        Err(e) => internal_error(&e),
    }
}

pub async fn ingest_from_folder(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Response {
    let base_path = state.settings.data_folder.clone();

    match scan_folders(&state.pool, &base_path).await {
        Ok((outstanding, delivery)) => Json(serde_json::json!({
            "status": "success",
            "processed": {"outstanding": outstanding, "delivery": delivery},
            "base_path": base_path,
        }))
        .into_response(),
        Err(e) => internal_error(&e),
    }
}

/// Scan `<base>/outstanding` and `<base>/delivery` (created if absent) and
/// ingest every tabular file found, all inside one transaction.
async fn scan_folders(pool: &PgPool, base_path: &str) -> Result<(u64, u64)> {
    let outstanding_dir = Path::new(base_path).join(Operation::Outstanding.subdirectory());
    let delivery_dir = Path::new(base_path).join(Operation::Delivery.subdirectory());

    fs::create_dir_all(&outstanding_dir)
        .await
        .context("Failed to create outstanding directory")?;
    fs::create_dir_all(&delivery_dir)
        .await
        .context("Failed to create delivery directory")?;

    let mut tx = pool.begin().await?;
    let outstanding = ingest_directory(&mut tx, &outstanding_dir, Operation::Outstanding).await?;
    let delivery = ingest_directory(&mut tx, &delivery_dir, Operation::Delivery).await?;
    tx.commit().await?;

    Ok((outstanding, delivery))
}

async fn ingest_directory(
    tx: &mut Transaction<'_, Postgres>,
    dir: &Path,
    op: Operation,
) -> Result<u64> {
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }
    // Deterministic file order across re-runs.
    paths.sort();

    let mut count = 0u64;
    for path in paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        // Non-tabular files are skipped without affecting the count.
        if !table::is_tabular_filename(&name) {
            continue;
        }

        println!("Ingesting {} file: {}", op.label(), path.display());
        let parsed = read_table(&path).await?;
        count += ingest_rows(tx, &parsed, op).await?;
    }

    Ok(count)
}

async fn read_table(path: &Path) -> Result<RawTable> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        let bytes = fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        table::read_csv_table(&table::decode_csv_bytes(&bytes))
    } else {
        table::read_excel_table(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // GENERATED SQL
    // -------------------------------------------------------------------------

    #[test]
    fn test_order_columns_match_record_width() {
        assert_eq!(ORDER_COLUMNS.len(), 57);
        assert_eq!(ORDER_COLUMNS[0], "source_type");
        assert_eq!(ORDER_COLUMNS[ORDER_COLUMNS.len() - 1], "financial_year");
    }

    #[test]
    fn test_order_columns_have_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for col in ORDER_COLUMNS {
            assert!(seen.insert(col), "duplicate column {}", col);
        }
    }

    #[test]
    fn test_insert_sql_has_one_placeholder_per_column() {
        let sql = insert_sql();
        assert!(sql.starts_with("INSERT INTO orders (source_type, status,"));
        assert!(sql.contains(&format!("${}", ORDER_COLUMNS.len())));
        assert!(!sql.contains(&format!("${}", ORDER_COLUMNS.len() + 1)));
    }

    #[test]
    fn test_update_sql_refreshes_timestamp_and_targets_id() {
        let sql = update_sql();
        assert!(sql.starts_with("UPDATE orders SET source_type = $1,"));
        assert!(sql.contains("last_updated_at = now()"));
        assert!(sql.ends_with(&format!("WHERE id = ${}", ORDER_COLUMNS.len() + 1)));
    }

    #[test]
    fn test_natural_key_lookup_matches_absent_values() {
        // Five optional key fields match NULL-to-NULL; source_type is
        // required and compared with plain equality.
        let distinct_count = SELECT_BY_NATURAL_KEY.matches("IS NOT DISTINCT FROM").count();
        assert_eq!(distinct_count, 5);
        assert!(SELECT_BY_NATURAL_KEY.contains("source_type = $1"));
        assert!(SELECT_BY_NATURAL_KEY.ends_with("LIMIT 1"));
    }

    // -------------------------------------------------------------------------
    // OPERATIONS
    // -------------------------------------------------------------------------

    #[test]
    fn test_operation_column_sets() {
        assert_eq!(Operation::Outstanding.expected_columns().len(), 32);
        assert_eq!(Operation::Delivery.expected_columns().len(), 36);
        assert!(Operation::Outstanding
            .expected_columns()
            .contains(&"Item Code"));
        assert!(Operation::Delivery
            .expected_columns()
            .contains(&"Produce Code"));
    }

    #[test]
    fn test_operation_subdirectories() {
        assert_eq!(Operation::Outstanding.subdirectory(), "outstanding");
        assert_eq!(Operation::Delivery.subdirectory(), "delivery");
    }
}
