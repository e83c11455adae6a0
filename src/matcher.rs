use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{ReconError, Result};
use crate::locator::{column_map, find_header_row};
use crate::models::{Column, ExternalDataset, RawSheet};
use crate::reconciler::{process_file, AuditLog};
use crate::settings::ReconcileConfig;
use crate::sheet::load_first_sheet;
use crate::synthesizer::OutputSheet;
use crate::writer::write_sheets;

/// Which report rows have an order number known to the ERP.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchReport {
    pub header_row: usize,
    pub total_rows: usize,
    /// 1-based source rows, in sheet order.
    pub matched_rows: Vec<usize>,
    pub unique_order_ids: usize,
}

impl MatchReport {
    pub fn percentage(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            100.0 * self.matched_rows.len() as f64 / self.total_rows as f64
        }
    }
}

pub fn match_orders(
    sheet: &RawSheet,
    dataset: &ExternalDataset,
    config: &ReconcileConfig,
) -> Result<MatchReport> {
    if dataset.is_empty() {
        return Err(ReconError::Dataset("Fetch API data first".to_string()));
    }
    if !dataset.has_column(&config.order_column) {
        return Err(ReconError::Dataset(format!(
            "{} column not found in API data",
            config.order_column
        )));
    }
    let header_row = find_header_row(sheet, config)?;
    let columns = column_map(sheet, header_row);
    let Some(&order_col) = columns.get(Column::OrderNumber.label()) else {
        return Err(ReconError::Dataset(format!(
            "{} column not found in shop data",
            Column::OrderNumber.label()
        )));
    };

    let order_ids: HashSet<String> = (0..dataset.len())
        .filter_map(|row| dataset.value(row, &config.order_column))
        .map(|v| v.to_string())
        .collect();

    let mut total_rows = 0;
    let mut matched_rows = Vec::new();
    for row in header_row + 1..=sheet.row_count() {
        if sheet.row_is_blank(row) {
            continue;
        }
        total_rows += 1;
        let order = sheet.cell(row, order_col);
        if !order.is_empty() && order_ids.contains(&order.to_string()) {
            matched_rows.push(row);
        }
    }
    if matched_rows.is_empty() {
        return Err(ReconError::NoMatchingOrders);
    }
    Ok(MatchReport {
        header_row,
        total_rows,
        matched_rows,
        unique_order_ids: order_ids.len(),
    })
}

/// Header plus the matched rows, copied cell for cell.
pub fn matched_sheet(sheet: &RawSheet, report: &MatchReport) -> OutputSheet {
    let mut out = OutputSheet::new("Matched");
    let source_rows = std::iter::once(report.header_row).chain(report.matched_rows.iter().copied());
    for (i, source_row) in source_rows.enumerate() {
        for col in 1..=sheet.col_count() {
            out.set_value(i as u32 + 1, col as u16, sheet.cell(source_row, col).clone());
        }
    }
    out
}

pub struct MatchResult {
    pub success: bool,
    pub log: AuditLog,
    pub matched_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
}

fn write_matched(
    file_path: &Path,
    dataset: &ExternalDataset,
    config: &ReconcileConfig,
    output_dir: &Path,
    audit: &mut AuditLog,
) -> Result<PathBuf> {
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    audit.push(format!("Loading shop file: {file_name}"));
    let sheet = load_first_sheet(file_path)?;

    let report = match_orders(&sheet, dataset, config)?;
    audit.push(format!(
        "Found {} unique {}s from API data",
        report.unique_order_ids, config.order_column
    ));
    audit.push(format!(
        "Matched {} of {} rows ({:.1}%)",
        report.matched_rows.len(),
        report.total_rows,
        report.percentage()
    ));

    let matched_name = format!(
        "matched_data_{}.xlsx",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let matched_path = output_dir.join(&matched_name);
    write_sheets(&[&matched_sheet(&sheet, &report)], &matched_path)?;
    audit.push(format!("Saved matched data to: {matched_name}"));
    Ok(matched_path)
}

/// Filter the report down to known orders, save that selection, then run the full
/// reconciliation on the original report.
pub fn match_and_process(
    file_path: &Path,
    dataset: &ExternalDataset,
    config: &ReconcileConfig,
    output_dir: &Path,
) -> MatchResult {
    let mut audit = AuditLog::new();
    let matched_path = match write_matched(file_path, dataset, config, output_dir, &mut audit) {
        Ok(path) => path,
        Err(e) => {
            log::error!("matching {} failed: {e}", file_path.display());
            audit.push(format!("Error: {e}"));
            return MatchResult {
                success: false,
                log: audit,
                matched_path: None,
                output_path: None,
            };
        }
    };

    audit.push("Processing matched Excel file...");
    audit.push("-".repeat(50));
    let processed = process_file(file_path, Some(dataset), config, output_dir);
    audit.extend(processed.log);
    MatchResult {
        success: processed.success,
        log: audit,
        matched_path: Some(matched_path),
        output_path: processed.output_path,
    }
}
