use std::path::Path;

use calamine::{Data, Reader};

use crate::coerce::excel_serial_to_datetime;
use crate::error::{ReconError, Result};
use crate::models::{CellValue, RawSheet};

pub fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}

/// Convert a calamine range into a grid anchored at A1, so row numbers match what a user
/// sees in the spreadsheet application.
pub fn raw_sheet_from_range(name: &str, range: &calamine::Range<Data>) -> RawSheet {
    let Some((start_row, start_col)) = range.start() else {
        return RawSheet::new(name, Vec::new());
    };
    let (height, width) = range.get_size();
    let total_rows = start_row as usize + height;
    let total_cols = start_col as usize + width;
    let mut rows = vec![vec![CellValue::Empty; total_cols]; total_rows];
    for (r, c, data) in range.used_cells() {
        rows[start_row as usize + r][start_col as usize + c] = cell_from_data(data);
    }
    RawSheet::new(name, rows)
}

/// Load the first worksheet of an xlsx/xls/ods file.
pub fn load_first_sheet(path: &Path) -> Result<RawSheet> {
    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| ReconError::Workbook(format!("Failed to open {}: {e}", path.display())))?;
    let Some(name) = workbook.sheet_names().first().cloned() else {
        return Err(ReconError::Workbook(format!(
            "{} contains no worksheets",
            path.display()
        )));
    };
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| ReconError::Workbook(format!("Failed to read sheet '{name}': {e}")))?;
    log::debug!("loaded sheet '{name}' from {}", path.display());
    Ok(raw_sheet_from_range(&name, &range))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_first_sheet_keeps_absolute_positions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let mut wb = rust_xlsxwriter::Workbook::new();
        let ws = wb.add_worksheet();
        ws.set_name("Transaktionen").unwrap();
        ws.write_string(2, 1, "Verkäufer").unwrap();
        ws.write_number(3, 2, 12.5).unwrap();
        wb.save(&path).unwrap();

        let sheet = load_first_sheet(&path).unwrap();
        assert_eq!(sheet.name(), "Transaktionen");
        assert_eq!(sheet.cell(3, 2), &CellValue::text("Verkäufer"));
        assert_eq!(sheet.cell(4, 3), &CellValue::Number(12.5));
        assert_eq!(sheet.cell(1, 1), &CellValue::Empty);
        assert_eq!(sheet.row_count(), 4);
        assert_eq!(sheet.col_count(), 3);
    }

    #[test]
    fn test_load_missing_file_is_workbook_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_first_sheet(&dir.path().join("missing.xlsx")).unwrap_err();
        assert!(matches!(err, ReconError::Workbook(_)));
    }

    #[test]
    fn test_cell_from_data_scalars() {
        assert_eq!(cell_from_data(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(cell_from_data(&Data::Empty), CellValue::Empty);
        assert_eq!(
            cell_from_data(&Data::String("--".to_string())),
            CellValue::text("--")
        );
    }
}
