//! Loose tabular input.
//!
//! Both report formats arrive as whatever the factory's ERP exported that
//! day: comma CSV (sometimes Windows-1252 encoded, sometimes with a BOM)
//! or an `.xlsx`/`.xls` workbook. This module reads any of them into one
//! in-memory shape with trimmed headers and loosely typed cells; the row
//! mappers decide what each cell means through the typed accessors here.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};

use crate::dates;

/// One spreadsheet cell, as close to the source type as the reader gets it.
/// CSV cells stay textual; Excel cells keep the workbook's typing.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
    Bool(bool),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    /// Text value with absent-on-null semantics.
    pub fn text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let t = s.trim();
                if dates::is_null_like(t) {
                    None
                } else {
                    Some(t.to_string())
                }
            }
            // Codes routinely survive a spreadsheet round-trip as floats
            // (707 -> 707.0); render those back without the decimal tail.
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                Some(format!("{}", *n as i64))
            }
            Cell::Number(n) => Some(format!("{}", n)),
            Cell::DateTime(dt) => Some(dt.date().format("%Y-%m-%d").to_string()),
            Cell::Bool(b) => Some(b.to_string()),
        }
    }

    /// Integer value, absent on failure. Fractional numerics truncate.
    pub fn integer(&self) -> Option<i64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n as i64),
            Cell::Text(s) => {
                let t = s.trim();
                if dates::is_null_like(t) {
                    return None;
                }
                let t = t.replace(',', "");
                if let Ok(i) = t.parse::<i64>() {
                    return Some(i);
                }
                match t.parse::<f64>() {
                    Ok(f) if f.is_finite() => Some(f as i64),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Floating-point value, absent on failure. Thousands separators are
    /// tolerated in textual cells.
    pub fn float(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Text(s) => {
                let t = s.trim();
                if dates::is_null_like(t) {
                    return None;
                }
                match t.replace(',', "").parse::<f64>() {
                    Ok(f) if f.is_finite() => Some(f),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Calendar date, absent on failure. Date-typed workbook cells yield
    /// their date component directly; text goes through the lenient parser.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Cell::DateTime(dt) => Some(dt.date()),
            Cell::Text(s) => dates::parse_date_text(s),
            _ => None,
        }
    }
}

/// A whole sheet loaded into memory: trimmed headers plus every data row.
#[derive(Debug)]
pub struct RawTable {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let headers: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
        let mut index = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            // First occurrence wins for duplicated header names.
            index.entry(h.clone()).or_insert(i);
        }
        RawTable {
            headers,
            index,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(move |cells| RowView {
            table: self,
            cells,
        })
    }

    /// Columns a mapper declares but this file does not carry. Missing
    /// columns read as absent for every cell; the caller reports them once
    /// per file so a renamed export stays detectable.
    pub fn missing_columns(&self, expected: &[&str]) -> Vec<String> {
        expected
            .iter()
            .filter(|c| !self.index.contains_key(**c))
            .map(|c| c.to_string())
            .collect()
    }
}

/// Read-only view of one data row with by-name typed access. Cells past
/// the end of a short row, and cells of columns the file lacks, read as
/// empty.
#[derive(Clone, Copy)]
pub struct RowView<'a> {
    table: &'a RawTable,
    cells: &'a [Cell],
}

impl<'a> RowView<'a> {
    fn cell(&self, column: &str) -> &Cell {
        self.table
            .index
            .get(column)
            .and_then(|&i| self.cells.get(i))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.cell(column).text()
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        self.cell(column).integer()
    }

    pub fn float(&self, column: &str) -> Option<f64> {
        self.cell(column).float()
    }

    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        self.cell(column).date()
    }
}

// =============================================================================
// READERS
// =============================================================================

/// Decode raw CSV bytes: UTF-8 first, Windows-1252 for older ERP exports.
pub fn decode_csv_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.strip_prefix('\u{feff}').unwrap_or(text).to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Parse CSV text into a table. Header whitespace is trimmed once here;
/// structurally broken lines are skipped with a warning rather than
/// aborting the file.
pub fn read_csv_table(content: &str) -> Result<RawTable> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (line_idx, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Warning: skipping line {} due to error: {}", line_idx + 2, e);
                continue;
            }
        };
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawTable::new(headers, rows))
}

/// Read the first worksheet of an `.xlsx`/`.xls` file (calamine
/// auto-detects the container).
pub fn read_excel_table(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path).context("Failed to open Excel file")?;

    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = sheet_names
        .first()
        .context("Excel file has no sheets")?
        .clone();

    let range = workbook
        .worksheet_range(&sheet_name)
        .context("Failed to read sheet")?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(row) => row
            .iter()
            .map(|cell| match cell {
                Data::String(s) => s.trim().to_string(),
                Data::Empty => String::new(),
                other => format!("{}", other),
            })
            .collect(),
        None => return Ok(RawTable::new(Vec::new(), Vec::new())),
    };

    let rows: Vec<Vec<Cell>> = rows_iter
        .map(|row| row.iter().map(cell_from_excel).collect())
        .collect();

    Ok(RawTable::new(headers, rows))
}

fn cell_from_excel(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => Cell::DateTime(naive),
            None => Cell::Number(dt.as_f64()),
        },
        // ISO datetime strings go through the lenient text parser on access.
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        // Error cells (#N/A and friends) read as absent.
        Data::Error(_) => Cell::Empty,
    }
}

// =============================================================================
// FILE-TYPE GATES
// =============================================================================

/// Upload endpoints accept CSV only.
pub fn is_csv_filename(name: &str) -> bool {
    name.to_lowercase().ends_with(".csv")
}

/// Folder scans also pick up Excel workbooks.
pub fn is_tabular_filename(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".csv") || lower.ends_with(".xlsx") || lower.ends_with(".xls")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> RawTable {
        read_csv_table(csv).unwrap()
    }

    // -------------------------------------------------------------------------
    // CSV READING
    // -------------------------------------------------------------------------

    #[test]
    fn test_headers_are_trimmed() {
        let t = table("  S/O No , Order Qty \nA1,5\n");
        assert_eq!(t.headers(), &["S/O No".to_string(), "Order Qty".to_string()]);
        let row = t.rows().next().unwrap();
        assert_eq!(row.text("S/O No").as_deref(), Some("A1"));
        assert_eq!(row.integer("Order Qty"), Some(5));
    }

    #[test]
    fn test_bom_is_stripped() {
        let t = table("\u{feff}S/O No\nA1\n");
        assert_eq!(t.headers(), &["S/O No".to_string()]);
    }

    #[test]
    fn test_short_rows_read_as_empty() {
        let t = table("a,b,c\n1\n");
        let row = t.rows().next().unwrap();
        assert_eq!(row.text("a").as_deref(), Some("1"));
        assert_eq!(row.text("b"), None);
        assert_eq!(row.text("c"), None);
    }

    #[test]
    fn test_unknown_column_reads_as_empty() {
        let t = table("a\n1\n");
        let row = t.rows().next().unwrap();
        assert_eq!(row.text("no-such-column"), None);
    }

    #[test]
    fn test_empty_csv_has_no_rows() {
        let t = table("a,b\n");
        assert!(t.is_empty());
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn test_decode_utf8_with_bom() {
        let decoded = decode_csv_bytes("\u{feff}a,b\n".as_bytes());
        assert_eq!(decoded, "a,b\n");
    }

    #[test]
    fn test_decode_windows_1252_fallback() {
        // "Café" in Windows-1252: 0xE9 is not valid UTF-8.
        let decoded = decode_csv_bytes(b"name\nCaf\xe9\n");
        assert_eq!(decoded, "name\nCaf\u{e9}\n");
    }

    // -------------------------------------------------------------------------
    // TYPED ACCESSORS
    // -------------------------------------------------------------------------

    #[test]
    fn test_text_null_like_is_absent() {
        assert_eq!(Cell::Text("nan".to_string()).text(), None);
        assert_eq!(Cell::Text("  ".to_string()).text(), None);
        assert_eq!(Cell::Empty.text(), None);
    }

    #[test]
    fn test_text_from_integral_float_drops_decimal_tail() {
        assert_eq!(Cell::Number(707.0).text().as_deref(), Some("707"));
        assert_eq!(Cell::Number(12.5).text().as_deref(), Some("12.5"));
    }

    #[test]
    fn test_integer_parsing() {
        assert_eq!(Cell::Text("42".to_string()).integer(), Some(42));
        assert_eq!(Cell::Text("1,200".to_string()).integer(), Some(1200));
        assert_eq!(Cell::Text("42.9".to_string()).integer(), Some(42));
        assert_eq!(Cell::Number(42.0).integer(), Some(42));
        assert_eq!(Cell::Text("abc".to_string()).integer(), None);
        assert_eq!(Cell::Empty.integer(), None);
    }

    #[test]
    fn test_float_parsing() {
        assert_eq!(Cell::Text("12.5".to_string()).float(), Some(12.5));
        assert_eq!(Cell::Text("1,234.5".to_string()).float(), Some(1234.5));
        assert_eq!(Cell::Number(3.25).float(), Some(3.25));
        assert_eq!(Cell::Text("twelve".to_string()).float(), None);
    }

    #[test]
    fn test_date_from_text_cell() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(Cell::Text("01-02-2024".to_string()).date(), Some(expected));
        assert_eq!(Cell::Text("garbage".to_string()).date(), None);
    }

    #[test]
    fn test_date_from_datetime_cell() {
        let dt = NaiveDate::from_ymd_opt(2024, 8, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(
            Cell::DateTime(dt).date(),
            NaiveDate::from_ymd_opt(2024, 8, 15)
        );
    }

    // -------------------------------------------------------------------------
    // EXPECTED-COLUMN CHECK
    // -------------------------------------------------------------------------

    #[test]
    fn test_missing_columns_reported() {
        let t = table("S/O No,Order Qty\nA1,5\n");
        let missing = t.missing_columns(&["S/O No", "Order Qty", "Currency"]);
        assert_eq!(missing, vec!["Currency".to_string()]);
    }

    #[test]
    fn test_missing_columns_empty_when_all_present() {
        let t = table("a,b\n1,2\n");
        assert!(t.missing_columns(&["a", "b"]).is_empty());
    }

    // -------------------------------------------------------------------------
    // FILE-TYPE GATES
    // -------------------------------------------------------------------------

    #[test]
    fn test_csv_gate() {
        assert!(is_csv_filename("report.csv"));
        assert!(is_csv_filename("REPORT.CSV"));
        assert!(!is_csv_filename("report.txt"));
        assert!(!is_csv_filename("report.xlsx"));
    }

    #[test]
    fn test_tabular_gate() {
        assert!(is_tabular_filename("report.csv"));
        assert!(is_tabular_filename("report.xlsx"));
        assert!(is_tabular_filename("report.XLS"));
        assert!(!is_tabular_filename("report.txt"));
        assert!(!is_tabular_filename("report.pdf"));
    }
}
