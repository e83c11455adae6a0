use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{load_dataset_arg, print_log};
use crate::fmt::euro;
use crate::locator::column_map;
use crate::models::{column_letter, Column, TransactionRecord};
use crate::reconciler::{reconcile_sheet, AuditLog};
use crate::settings::{load_settings, shellexpand_path};
use crate::sheet::load_first_sheet;

fn coverage(records: &[TransactionRecord], has: impl Fn(&TransactionRecord) -> bool) -> String {
    let hits = records.iter().filter(|r| has(r)).count();
    format!("{hits}/{}", records.len())
}

pub fn run(file: &str, dataset: Option<&str>) -> anyhow::Result<()> {
    let settings = load_settings();
    let config = &settings.reconcile;
    let dataset = load_dataset_arg(dataset)?;

    let path = PathBuf::from(shellexpand_path(file));
    let sheet = load_first_sheet(&path)?;
    let mut audit = AuditLog::new();
    let result = match reconcile_sheet(&sheet, dataset.as_ref(), config, &mut audit) {
        Ok(result) => result,
        Err(e) => {
            print_log(&audit);
            return Err(e.into());
        }
    };

    let columns = column_map(&sheet, result.header_row);
    let mut table = Table::new();
    table.set_header(vec!["Field", "Header", "Source column"]);
    for column in Column::ALL {
        let source = match columns.get(column.label()) {
            Some(&idx) => Cell::new(column_letter(idx as u16)),
            None => Cell::new("missing".red()),
        };
        table.add_row(vec![
            Cell::new(column.letter()),
            Cell::new(config.header_for(column)),
            source,
        ]);
    }
    println!("Columns in {} (header row {})\n{table}", sheet.name(), result.header_row);

    let regular = &result.extraction.regular;
    let mut summary = Table::new();
    summary.set_header(vec!["", "Count"]);
    summary.add_row(vec![Cell::new("Regular transactions"), Cell::new(regular.len())]);
    summary.add_row(vec![
        Cell::new(format!("'{}' transactions", config.fee_only_row_label)),
        Cell::new(result.extraction.fee_only.len()),
    ]);
    summary.add_row(vec![
        Cell::new(format!("'{}' total", config.fee_only_row_label)),
        Cell::new(euro(result.workbook.fee_only_total)),
    ]);
    if dataset.is_some() {
        summary.add_row(vec![
            Cell::new("KD-NR matched"),
            Cell::new(coverage(regular, |r| r.customer_id.is_some())),
        ]);
        summary.add_row(vec![
            Cell::new("RG-NR matched"),
            Cell::new(coverage(regular, |r| r.invoice_id.is_some())),
        ]);
    }
    println!("{summary}");
    Ok(())
}
