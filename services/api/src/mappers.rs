//! Row mappers for the two report formats.
//!
//! Each mapper is a fixed table from one format's column vocabulary to the
//! unified `OrderRecord`. A cell that is missing or unparseable maps to an
//! absent field, never to a zero or an empty string; a whole column missing
//! from a file behaves the same for every row. `source_type` and `status`
//! are constants of the mapper, not read from the data.

use chrono::NaiveDate;

use crate::dates;
use crate::table::RowView;

pub const SOURCE_OUTSTANDING: &str = "OUTSTANDING";
pub const SOURCE_DELIVERY: &str = "DELIVERY";
pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_DISPATCHED: &str = "DISPATCHED";

/// Columns a "Sales Order Outstanding" export is expected to carry.
pub const OUTSTANDING_COLUMNS: &[&str] = &[
    "S/O No",
    "S/O Date",
    "Order No",
    "Order Date",
    "PO Srl",
    "Buyer Name",
    "Cust Code",
    "Style No",
    "Item Code",
    "Drg.No",
    "Size",
    "Order Qty",
    "Pack Qty",
    "Sale Qty",
    "Cncl.Qty",
    "O/S Ord.Qty",
    "Unit",
    "Rate",
    "Gross Value",
    "Currency",
    "Currency Value",
    "Delivery Date",
    "Commitment Dt",
    "Pack Slip No",
    "Pack Slip Dt",
    "Department",
    "Dept.Remark",
    "Payment Term",
    "S.O Comment",
    "SO SPL.Remark",
    "DIE Indend",
    "Item Description",
];

/// Columns a "Delivery Report" export is expected to carry.
pub const DELIVERY_COLUMNS: &[&str] = &[
    "S.O No",
    "S.O Date",
    "Order No",
    "Order Dt.",
    "P Srl",
    "Party Name",
    "Cust Code",
    "Met Code",
    "Produce Code",
    "Drg.No",
    "Size",
    "Quantity",
    "Unit",
    "Net (Kg)",
    "Part/Full",
    "Rate",
    "Amount",
    "Frt.Amount",
    "Packslip No & Date",
    "Invoice No",
    "Date",
    "Transporter",
    "Docket No",
    "Docket Dt",
    "Frt.Mode",
    "From Station",
    "To Station",
    "Package Details",
    "Gross Wt",
    "Charge Wt.",
    "Insurance Mode",
    "Delivery Date",
    "Department",
    "State Code",
    "Sub Head",
    "Description",
];

/// The unified order line both formats normalize into. One field per
/// `orders` column except the surrogate id and the update timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderRecord {
    pub source_type: &'static str,
    pub status: &'static str,

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

    /// Unified, searchable part number: the item code for Outstanding
    /// rows, the produce code for Delivery rows.
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
}

/// The six fields whose joint equality identifies "the same order line"
/// across repeated ingestions. Absent values are part of the identity:
/// a record with no S/O number matches stored rows that also have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKey<'a> {
    pub source_type: &'a str,
    pub so_number: Option<&'a str>,
    pub order_no: Option<&'a str>,
    pub po_serial: Option<&'a str>,
    pub part_number: Option<&'a str>,
    pub delivery_date: Option<NaiveDate>,
}

impl OrderRecord {
    pub fn natural_key(&self) -> NaturalKey<'_> {
        NaturalKey {
            source_type: self.source_type,
            so_number: self.so_number.as_deref(),
            order_no: self.order_no.as_deref(),
            po_serial: self.po_serial.as_deref(),
            part_number: self.part_number.as_deref(),
            delivery_date: self.delivery_date,
        }
    }
}

/// Map one "Sales Order Outstanding" row.
pub fn map_outstanding_row(row: &RowView<'_>) -> OrderRecord {
    let so_date = row.date("S/O Date");
    let order_date = row.date("Order Date");
    let delivery_date = row.date("Delivery Date");

    OrderRecord {
        source_type: SOURCE_OUTSTANDING,
        status: STATUS_PENDING,

        so_number: row.text("S/O No"),
        so_date,
        order_no: row.text("Order No"),
        order_date,
        po_serial: row.text("PO Srl"),

        customer_name: row.text("Buyer Name"),
        customer_code: row.text("Cust Code"),

        style_no: row.text("Style No"),
        item_code: row.text("Item Code"),
        drawing_no: row.text("Drg.No"),
        size: row.text("Size"),

        part_number: row.text("Item Code"),

        order_qty: row.integer("Order Qty"),
        pack_qty: row.integer("Pack Qty"),
        sale_qty: row.integer("Sale Qty"),
        cancel_qty: row.integer("Cncl.Qty"),
        os_order_qty: row.integer("O/S Ord.Qty"),

        unit: row.text("Unit"),

        rate: row.float("Rate"),
        gross_value: row.float("Gross Value"),
        currency: row.text("Currency"),
        currency_value: row.float("Currency Value"),

        delivery_date,
        commitment_date: row.date("Commitment Dt"),

        packslip_no: row.text("Pack Slip No"),
        packslip_date: row.date("Pack Slip Dt"),

        department: row.text("Department"),
        department_remark: row.text("Dept.Remark"),
        payment_term: row.text("Payment Term"),
        so_comment: row.text("S.O Comment"),
        so_special_remark: row.text("SO SPL.Remark"),
        die_indent: row.text("DIE Indend"),

        item_description: row.text("Item Description"),

        financial_year: dates::financial_year_for(order_date.or(so_date).or(delivery_date)),

        ..OrderRecord::default()
    }
}

/// Map one "Delivery Report" row.
pub fn map_delivery_row(row: &RowView<'_>) -> OrderRecord {
    let so_date = row.date("S.O Date");
    let order_date = row.date("Order Dt.");
    let delivery_date = row.date("Delivery Date");
    let invoice_date = row.date("Date");

    OrderRecord {
        source_type: SOURCE_DELIVERY,
        status: STATUS_DISPATCHED,

        so_number: row.text("S.O No"),
        so_date,
        order_no: row.text("Order No"),
        order_date,
        po_serial: row.text("P Srl"),

        customer_name: row.text("Party Name"),
        customer_code: row.text("Cust Code"),

        met_code: row.text("Met Code"),
        product_code: row.text("Produce Code"),
        drawing_no: row.text("Drg.No"),
        size: row.text("Size"),

        part_number: row.text("Produce Code"),

        quantity: row.integer("Quantity"),
        unit: row.text("Unit"),
        net_kg: row.float("Net (Kg)"),
        part_full: row.text("Part/Full"),

        rate: row.float("Rate"),
        amount: row.float("Amount"),
        freight_amount: row.float("Frt.Amount"),

        // The export packs slip number and date into one column; keep the
        // combined text verbatim.
        packslip_no: row.text("Packslip No & Date"),

        invoice_no: row.text("Invoice No"),
        invoice_date,

        transporter: row.text("Transporter"),
        docket_no: row.text("Docket No"),
        docket_date: row.date("Docket Dt"),

        freight_mode: row.text("Frt.Mode"),
        from_station: row.text("From Station"),
        to_station: row.text("To Station"),
        package_details: row.text("Package Details"),
        gross_weight: row.float("Gross Wt"),
        charge_weight: row.float("Charge Wt."),
        insurance_mode: row.text("Insurance Mode"),

        delivery_date,
        department: row.text("Department"),
        state_code: row.text("State Code"),

        sub_head: row.text("Sub Head"),
        item_description: row.text("Description"),

        financial_year: dates::financial_year_for(
            order_date.or(so_date).or(delivery_date).or(invoice_date),
        ),

        ..OrderRecord::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::read_csv_table;

    fn outstanding_record(header: &str, row: &str) -> OrderRecord {
        let table = read_csv_table(&format!("{}\n{}\n", header, row)).unwrap();
        let row = table.rows().next().unwrap();
        map_outstanding_row(&row)
    }

    fn delivery_record(header: &str, row: &str) -> OrderRecord {
        let table = read_csv_table(&format!("{}\n{}\n", header, row)).unwrap();
        let row = table.rows().next().unwrap();
        map_delivery_row(&row)
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // -------------------------------------------------------------------------
    // CONSTANTS PER MAPPER
    // -------------------------------------------------------------------------

    #[test]
    fn test_outstanding_source_and_status_are_fixed() {
        let rec = outstanding_record("S/O No", "A1");
        assert_eq!(rec.source_type, "OUTSTANDING");
        assert_eq!(rec.status, "PENDING");
    }

    #[test]
    fn test_delivery_source_and_status_are_fixed() {
        let rec = delivery_record("S.O No", "A1");
        assert_eq!(rec.source_type, "DELIVERY");
        assert_eq!(rec.status, "DISPATCHED");
    }

    // -------------------------------------------------------------------------
    // PART NUMBER SOURCING
    // -------------------------------------------------------------------------

    #[test]
    fn test_outstanding_part_number_from_item_code() {
        let rec = outstanding_record("Item Code,Order Qty", "X1,10");
        assert_eq!(rec.part_number.as_deref(), Some("X1"));
        assert_eq!(rec.item_code.as_deref(), Some("X1"));
        assert_eq!(rec.product_code, None);
    }

    #[test]
    fn test_delivery_part_number_from_produce_code() {
        let rec = delivery_record("Produce Code,Quantity", "Y2,4");
        assert_eq!(rec.part_number.as_deref(), Some("Y2"));
        assert_eq!(rec.product_code.as_deref(), Some("Y2"));
        assert_eq!(rec.item_code, None);
    }

    // -------------------------------------------------------------------------
    // ABSENT-SAFE PARSING
    // -------------------------------------------------------------------------

    #[test]
    fn test_empty_date_and_bad_quantity_map_to_absent() {
        let rec = outstanding_record("S/O No,Order Date,Order Qty", "A1,,not-a-number");
        assert_eq!(rec.so_number.as_deref(), Some("A1"));
        assert_eq!(rec.order_date, None);
        assert_eq!(rec.order_qty, None);
    }

    #[test]
    fn test_missing_column_maps_to_absent_for_every_row() {
        // No Currency column at all in this file.
        let rec = outstanding_record("S/O No,Order Qty", "A1,5");
        assert_eq!(rec.currency, None);
        assert_eq!(rec.currency_value, None);
        assert_eq!(rec.order_qty, Some(5));
    }

    #[test]
    fn test_fields_of_the_other_format_stay_absent() {
        let rec = outstanding_record("S/O No,Order Qty", "A1,5");
        assert_eq!(rec.quantity, None);
        assert_eq!(rec.amount, None);
        assert_eq!(rec.invoice_no, None);

        let rec = delivery_record("S.O No,Quantity", "A1,5");
        assert_eq!(rec.order_qty, None);
        assert_eq!(rec.gross_value, None);
        assert_eq!(rec.commitment_date, None);
    }

    #[test]
    fn test_numeric_fields_parse() {
        let rec = outstanding_record(
            "Order Qty,Rate,Gross Value,Currency Value",
            "10,12.5,125.0,1.1",
        );
        assert_eq!(rec.order_qty, Some(10));
        assert_eq!(rec.rate, Some(12.5));
        assert_eq!(rec.gross_value, Some(125.0));
        assert_eq!(rec.currency_value, Some(1.1));
    }

    #[test]
    fn test_delivery_dates_parse_day_first() {
        let rec = delivery_record(
            "S.O Date,Delivery Date,Docket Dt",
            "01-02-2024,15/03/2024,2024-03-20",
        );
        assert_eq!(rec.so_date, Some(d(2024, 2, 1)));
        assert_eq!(rec.delivery_date, Some(d(2024, 3, 15)));
        assert_eq!(rec.docket_date, Some(d(2024, 3, 20)));
    }

    // -------------------------------------------------------------------------
    // FINANCIAL YEAR PRIORITY
    // -------------------------------------------------------------------------

    #[test]
    fn test_outstanding_financial_year_prefers_order_date() {
        let rec = outstanding_record(
            "Order Date,S/O Date,Delivery Date",
            "15-05-2024,15-01-2023,15-01-2022",
        );
        assert_eq!(rec.financial_year.as_deref(), Some("2024-2025"));
    }

    #[test]
    fn test_outstanding_financial_year_falls_back_to_so_date() {
        let rec = outstanding_record("Order Date,S/O Date", ",15-01-2023");
        assert_eq!(rec.financial_year.as_deref(), Some("2022-2023"));
    }

    #[test]
    fn test_outstanding_financial_year_falls_back_to_delivery_date() {
        let rec = outstanding_record("Delivery Date", "15-05-2024");
        assert_eq!(rec.financial_year.as_deref(), Some("2024-2025"));
    }

    #[test]
    fn test_delivery_financial_year_falls_back_to_invoice_date() {
        let rec = delivery_record("S.O No,Date", "A1,15-05-2024");
        assert_eq!(rec.financial_year.as_deref(), Some("2024-2025"));
    }

    #[test]
    fn test_financial_year_absent_without_any_reference_date() {
        let rec = outstanding_record("S/O No", "A1");
        assert_eq!(rec.financial_year, None);
    }

    // -------------------------------------------------------------------------
    // NATURAL KEY
    // -------------------------------------------------------------------------

    #[test]
    fn test_same_row_maps_to_equal_natural_keys() {
        let header = "S/O No,Order No,PO Srl,Item Code,Delivery Date";
        let a = outstanding_record(header, "S1,O1,P1,X1,15-05-2024");
        let b = outstanding_record(header, "S1,O1,P1,X1,15-05-2024");
        assert_eq!(a.natural_key(), b.natural_key());
    }

    #[test]
    fn test_delivery_date_discriminates_natural_keys() {
        let header = "S/O No,Order No,PO Srl,Item Code,Delivery Date";
        let a = outstanding_record(header, "S1,O1,P1,X1,15-05-2024");
        let b = outstanding_record(header, "S1,O1,P1,X1,16-05-2024");
        assert_ne!(a.natural_key(), b.natural_key());
    }

    #[test]
    fn test_absent_fields_are_part_of_the_key() {
        let a = outstanding_record("S/O No", "A1");
        let b = outstanding_record("S/O No", "A1");
        assert_eq!(a.natural_key(), b.natural_key());
        assert_eq!(a.natural_key().delivery_date, None);
    }

    #[test]
    fn test_source_type_discriminates_natural_keys() {
        let a = outstanding_record("S/O No", "A1");
        let b = delivery_record("S.O No", "A1");
        assert_ne!(a.natural_key(), b.natural_key());
    }
}
