use crate::error::{ReconError, Result};
use crate::models::{ColumnMap, RawSheet};
use crate::settings::ReconcileConfig;

/// Find the 1-based header row by scanning the top-left window for the header marker.
pub fn find_header_row(sheet: &RawSheet, config: &ReconcileConfig) -> Result<usize> {
    let max_row = config.header_scan_rows.min(sheet.row_count());
    let max_col = config.header_scan_cols.min(sheet.col_count());
    for row in 1..=max_row {
        for col in 1..=max_col {
            let cell = sheet.cell(row, col);
            if !cell.is_empty() && cell.to_string().contains(&config.header_marker) {
                return Ok(row);
            }
        }
    }
    Err(ReconError::HeaderNotFound(config.header_marker.clone()))
}

/// Map trimmed header labels to column indices. A repeated label keeps its last column.
pub fn column_map(sheet: &RawSheet, header_row: usize) -> ColumnMap {
    let mut map = ColumnMap::new();
    for col in 1..=sheet.col_count() {
        let cell = sheet.cell(header_row, col);
        if cell.is_empty() {
            continue;
        }
        map.insert(cell.to_string().trim().to_string(), col);
    }
    map
}
