use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::extractor::{extract_metadata, extract_records, Extraction, ReportMetadata};
use crate::fmt::euro;
use crate::joiner::{build_key_map, join_all};
use crate::locator::{column_map, find_header_row};
use crate::models::{ExternalDataset, RawSheet};
use crate::settings::ReconcileConfig;
use crate::sheet::load_first_sheet;
use crate::synthesizer::{synthesize, OutputWorkbook};
use crate::writer::write_workbook;

/// Append-only narrative of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditLog {
    lines: Vec<String>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        log::debug!("{line}");
        self.lines.push(line);
    }

    pub fn extend(&mut self, other: AuditLog) {
        self.lines.extend(other.lines);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }

    pub fn message(&self) -> String {
        self.lines.join("\n")
    }
}

pub struct ReconcileResult {
    pub success: bool,
    pub log: AuditLog,
    pub output_path: Option<PathBuf>,
}

impl ReconcileResult {
    pub fn failed(log: AuditLog) -> Self {
        Self {
            success: false,
            log,
            output_path: None,
        }
    }
}

/// Everything produced from one report before it is written to disk.
pub struct Reconciliation {
    pub header_row: usize,
    pub metadata: ReportMetadata,
    pub extraction: Extraction,
    pub workbook: OutputWorkbook,
}

/// Run locator → resolver → extractor → joiner → synthesizer over an in-memory sheet.
pub fn reconcile_sheet(
    sheet: &RawSheet,
    dataset: Option<&ExternalDataset>,
    config: &ReconcileConfig,
    audit: &mut AuditLog,
) -> Result<Reconciliation> {
    let keys = build_key_map(dataset, config);
    for warning in &keys.warnings {
        log::warn!("{warning}");
        audit.push(format!("Warning: {warning}"));
    }
    let has_column = |column: &str| dataset.is_some_and(|d| d.has_column(column));
    if !keys.customers.is_empty() || has_column(&config.customer_column) {
        audit.push(format!(
            "Loaded {} {} mappings from API data",
            keys.customers.len(),
            config.customer_column
        ));
    }
    if !keys.invoices.is_empty() || has_column(&config.invoice_column) {
        audit.push(format!(
            "Loaded {} {} mappings from API data",
            keys.invoices.len(),
            config.invoice_column
        ));
    }

    let header_row = match find_header_row(sheet, config) {
        Ok(row) => row,
        Err(e) => {
            audit.push(e.to_string());
            return Err(e);
        }
    };
    audit.push(format!("Found header row at row {header_row}"));

    let columns = column_map(sheet, header_row);
    audit.push(format!("Found {} columns in header", columns.len()));

    let metadata = extract_metadata(sheet, header_row, config);
    audit.push(format!(
        "Extracted metadata: Verkäufer={}, Betrag={}",
        metadata.seller, metadata.total_amount
    ));

    let mut extraction = extract_records(sheet, header_row, &columns, config);
    join_all(&mut extraction, &keys);
    audit.push(format!("Found {} regular transactions", extraction.regular.len()));
    audit.push(format!(
        "Found {} '{}' transactions",
        extraction.fee_only.len(),
        config.fee_only_row_label
    ));

    if !keys.is_empty() {
        let total = extraction.regular.len();
        let kd = extraction.regular.iter().filter(|r| r.customer_id.is_some()).count();
        let rg = extraction.regular.iter().filter(|r| r.invoice_id.is_some()).count();
        audit.push(format!("Matched KD-NR for {kd}/{total} transactions"));
        audit.push(format!("Matched RG-NR for {rg}/{total} transactions"));
    }

    let workbook = synthesize(sheet.name(), &metadata, &extraction, config);
    let layout = workbook.layout;
    if extraction.regular.is_empty() {
        audit.push("Wrote 0 data rows");
    } else {
        audit.push(format!(
            "Wrote {} data rows (rows {}-{})",
            extraction.regular.len(),
            layout.first_data_row,
            layout.last_data_row
        ));
    }
    audit.push(format!("Added '{}' row at row {}", config.fee_row_label, layout.fee_row));
    audit.push(format!(
        "Added '{}' row at row {} (sum: {})",
        config.fee_only_row_label,
        layout.fee_only_row,
        euro(workbook.fee_only_total)
    ));
    audit.push(format!("Added totals row at row {}", layout.totals_row));
    if let Some(detail) = &workbook.detail {
        audit.push(format!(
            "Created '{}' sheet with {} '{}' entries + SUM formula",
            detail.name,
            extraction.fee_only.len(),
            config.fee_only_row_label
        ));
    }

    Ok(Reconciliation {
        header_row,
        metadata,
        extraction,
        workbook,
    })
}

pub fn output_file_name(source: &Path, config: &ReconcileConfig) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "report.xlsx".to_string());
    let stem = Path::new(&name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    // The writer always produces xlsx, whatever the source format was.
    format!("{}{stem}.xlsx", config.output_prefix)
}

fn try_process(
    file_path: &Path,
    dataset: Option<&ExternalDataset>,
    config: &ReconcileConfig,
    output_dir: &Path,
    audit: &mut AuditLog,
) -> Result<PathBuf> {
    let sheet = load_first_sheet(file_path)?;
    let display_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    audit.push(format!("Loaded file: {display_name}"));
    audit.push(format!(
        "Original dimensions: {} rows x {} columns",
        sheet.row_count(),
        sheet.col_count()
    ));

    let result = reconcile_sheet(&sheet, dataset, config, audit)?;

    let file_name = output_file_name(file_path, config);
    let output_path = output_dir.join(&file_name);
    write_workbook(&result.workbook, &output_path)?;

    audit.push(format!("File saved successfully as '{file_name}'"));
    audit.push("Summary:");
    audit.push(format!("  - Regular transactions: {}", result.extraction.regular.len()));
    audit.push(format!(
        "  - {} entries: {}",
        config.fee_only_row_label,
        result.extraction.fee_only.len()
    ));
    audit.push(format!(
        "  - Total amount ({}): {}",
        config.fee_only_row_label,
        euro(result.workbook.fee_only_total)
    ));
    Ok(output_path)
}

/// Process one report file end to end. Never fails: every error ends up in the log of a
/// failed result.
pub fn process_file(
    file_path: &Path,
    dataset: Option<&ExternalDataset>,
    config: &ReconcileConfig,
    output_dir: &Path,
) -> ReconcileResult {
    let mut audit = AuditLog::new();
    match try_process(file_path, dataset, config, output_dir, &mut audit) {
        Ok(path) => ReconcileResult {
            success: true,
            log: audit,
            output_path: Some(path),
        },
        Err(e) => {
            if !audit.contains(&e.to_string()) {
                audit.push(format!("Critical error: {e}"));
            }
            log::error!("processing {} failed: {e}", file_path.display());
            ReconcileResult::failed(audit)
        }
    }
}
