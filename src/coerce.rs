use chrono::{NaiveDate, NaiveDateTime};

use crate::models::CellValue;

/// Placeholders eBay prints in amount columns that carry no value.
const NO_VALUE_SENTINELS: [&str; 2] = ["--", "\u{2014}"];

/// Coerce a cell to a finite number. Empty cells, sentinels and anything unparseable are 0.
pub fn numeric(cell: &CellValue) -> f64 {
    let value = match cell {
        CellValue::Empty | CellValue::DateTime(_) => 0.0,
        CellValue::Number(n) => *n,
        CellValue::Bool(b) => f64::from(u8::from(*b)),
        CellValue::Text(s) => {
            if NO_VALUE_SENTINELS.contains(&s.as_str()) {
                0.0
            } else {
                s.trim().parse::<f64>().unwrap_or(0.0)
            }
        }
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// `YYYYMM` accounting period for a date cell or a `YYYY-MM-DD...` string; empty otherwise.
pub fn period_label(cell: &CellValue) -> String {
    match cell {
        CellValue::DateTime(dt) => dt.format("%Y%m").to_string(),
        CellValue::Text(s) => s
            .get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
            .map(|d| d.format("%Y%m").to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn excel_epoch() -> NaiveDateTime {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let millis = (serial * 86_400_000.0).round() as i64;
    excel_epoch().checked_add_signed(chrono::Duration::milliseconds(millis))
}

pub fn datetime_to_excel_serial(dt: &NaiveDateTime) -> f64 {
    let delta = *dt - excel_epoch();
    delta.num_milliseconds() as f64 / 86_400_000.0
}
