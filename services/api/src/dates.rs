//! Best-effort date handling for spreadsheet exports.
//!
//! The factory's ERP emits dates as `DD-MM-YYYY`, `DD/MM/YYYY`, ISO dates,
//! two-digit years and occasionally full timestamps, sometimes mixed within
//! one column. Parsing is lenient by contract: a cell that cannot be read
//! as a date is an absent value, never an error. Ambiguous strings like
//! `01-02-2024` resolve day-first.

use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate};

/// Day-first formats, tried in order. The two-digit-year shapes come
/// first: `%y` consumes exactly two digits so a four-digit year falls
/// through, while `%Y` would happily read `24` as the year 24 and shadow
/// them.
const DATE_FORMATS: &[&str] = &["%d-%m-%y", "%d/%m/%y", "%d-%m-%Y", "%d/%m/%Y", "%Y-%m-%d"];

/// Fallback shapes for cells carrying a timestamp or an uncommon textual
/// date. Trailing time-of-day fields parse and are discarded.
const FALLBACK_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%B %d, %Y",
];

/// Sentinels spreadsheets use for "no value".
pub fn is_null_like(text: &str) -> bool {
    let t = text.trim();
    t.is_empty() || matches!(t.to_ascii_lowercase().as_str(), "nan" | "null" | "none" | "n/a")
}

/// Parse a textual cell into a calendar date, or `None`.
pub fn parse_date_text(value: &str) -> Option<NaiveDate> {
    let text = value.trim();
    if is_null_like(text) {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(date);
        }
    }

    for fmt in FALLBACK_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(date);
        }
    }

    chrono::DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Fiscal-year label for a reference date. The fiscal year runs 1 April
/// through 31 March: April onwards belongs to `"Y-(Y+1)"`, January–March
/// to `"(Y-1)-Y"`.
pub fn financial_year_for(date: Option<NaiveDate>) -> Option<String> {
    let date = date?;
    let year = date.year();
    if date.month() >= 4 {
        Some(format!("{}-{}", year, year + 1))
    } else {
        Some(format!("{}-{}", year - 1, year))
    }
}

/// Parse a label like `2024-2025` into its boundary dates
/// `(2024-04-01, 2025-03-31)`. Anything that is not exactly two integers
/// joined by a hyphen is a format error.
pub fn parse_financial_year_label(label: &str) -> Result<(NaiveDate, NaiveDate)> {
    let invalid = || anyhow!("Invalid financial_year format. Use 'YYYY-YYYY'");

    let (start_raw, end_raw) = label.trim().split_once('-').ok_or_else(invalid)?;
    let start_year: i32 = start_raw.trim().parse().map_err(|_| invalid())?;
    let end_year: i32 = end_raw.trim().parse().map_err(|_| invalid())?;

    let start = NaiveDate::from_ymd_opt(start_year, 4, 1).ok_or_else(invalid)?;
    let end = NaiveDate::from_ymd_opt(end_year, 3, 31).ok_or_else(invalid)?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // -------------------------------------------------------------------------
    // DATE PARSING
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_date_day_first_dashes() {
        assert_eq!(parse_date_text("15-08-2024"), Some(d(2024, 8, 15)));
    }

    #[test]
    fn test_parse_date_day_first_slashes() {
        assert_eq!(parse_date_text("15/08/2024"), Some(d(2024, 8, 15)));
    }

    #[test]
    fn test_parse_date_iso() {
        assert_eq!(parse_date_text("2024-08-15"), Some(d(2024, 8, 15)));
    }

    #[test]
    fn test_parse_date_two_digit_year() {
        assert_eq!(parse_date_text("15-08-24"), Some(d(2024, 8, 15)));
        assert_eq!(parse_date_text("15/08/24"), Some(d(2024, 8, 15)));
    }

    #[test]
    fn test_parse_date_ambiguous_resolves_day_first() {
        // 01-02-2024 is 1 February, not 2 January.
        assert_eq!(parse_date_text("01-02-2024"), Some(d(2024, 2, 1)));
        assert_eq!(parse_date_text("01/02/2024"), Some(d(2024, 2, 1)));
    }

    #[test]
    fn test_parse_date_trims_whitespace() {
        assert_eq!(parse_date_text("  15-08-2024  "), Some(d(2024, 8, 15)));
    }

    #[test]
    fn test_parse_date_timestamp_fallback() {
        assert_eq!(parse_date_text("2024-08-15 10:30:00"), Some(d(2024, 8, 15)));
        assert_eq!(parse_date_text("2024-08-15T10:30:00"), Some(d(2024, 8, 15)));
        assert_eq!(parse_date_text("15-08-2024 10:30:00"), Some(d(2024, 8, 15)));
    }

    #[test]
    fn test_parse_date_month_name_fallback() {
        assert_eq!(parse_date_text("15 Aug 2024"), Some(d(2024, 8, 15)));
        assert_eq!(parse_date_text("15-Aug-2024"), Some(d(2024, 8, 15)));
        assert_eq!(parse_date_text("August 15, 2024"), Some(d(2024, 8, 15)));
    }

    #[test]
    fn test_parse_date_rfc3339_fallback() {
        assert_eq!(
            parse_date_text("2024-08-15T10:30:00+05:30"),
            Some(d(2024, 8, 15))
        );
    }

    #[test]
    fn test_parse_date_null_like_is_absent() {
        assert_eq!(parse_date_text(""), None);
        assert_eq!(parse_date_text("   "), None);
        assert_eq!(parse_date_text("nan"), None);
        assert_eq!(parse_date_text("NaN"), None);
        assert_eq!(parse_date_text("NULL"), None);
        assert_eq!(parse_date_text("n/a"), None);
    }

    #[test]
    fn test_parse_date_garbage_is_absent() {
        assert_eq!(parse_date_text("not a date"), None);
        assert_eq!(parse_date_text("99-99-9999"), None);
        assert_eq!(parse_date_text("12345"), None);
    }

    // -------------------------------------------------------------------------
    // FINANCIAL YEAR RESOLUTION
    // -------------------------------------------------------------------------

    #[test]
    fn test_financial_year_boundary_end_of_march() {
        assert_eq!(
            financial_year_for(Some(d(2024, 3, 31))),
            Some("2023-2024".to_string())
        );
    }

    #[test]
    fn test_financial_year_boundary_start_of_april() {
        assert_eq!(
            financial_year_for(Some(d(2024, 4, 1))),
            Some("2024-2025".to_string())
        );
    }

    #[test]
    fn test_financial_year_mid_year() {
        assert_eq!(
            financial_year_for(Some(d(2024, 12, 25))),
            Some("2024-2025".to_string())
        );
        assert_eq!(
            financial_year_for(Some(d(2025, 1, 5))),
            Some("2024-2025".to_string())
        );
    }

    #[test]
    fn test_financial_year_absent_in_absent_out() {
        assert_eq!(financial_year_for(None), None);
    }

    // -------------------------------------------------------------------------
    // FINANCIAL YEAR LABEL PARSING
    // -------------------------------------------------------------------------

    #[test]
    fn test_label_parses_to_boundaries() {
        let (start, end) = parse_financial_year_label("2024-2025").unwrap();
        assert_eq!(start, d(2024, 4, 1));
        assert_eq!(end, d(2025, 3, 31));
    }

    #[test]
    fn test_label_round_trips_through_resolver() {
        let (start, end) = parse_financial_year_label("2024-2025").unwrap();
        assert_eq!(financial_year_for(Some(start)).as_deref(), Some("2024-2025"));
        assert_eq!(financial_year_for(Some(end)).as_deref(), Some("2024-2025"));
    }

    #[test]
    fn test_label_without_hyphen_fails() {
        assert!(parse_financial_year_label("2024").is_err());
        assert!(parse_financial_year_label("abc").is_err());
    }

    #[test]
    fn test_label_with_non_numeric_parts_fails() {
        assert!(parse_financial_year_label("2024-abc").is_err());
        assert!(parse_financial_year_label("abc-2025").is_err());
        assert!(parse_financial_year_label("2024-2025-2026").is_err());
    }
}
