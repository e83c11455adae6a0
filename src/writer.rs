use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::coerce::datetime_to_excel_serial;
use crate::error::Result;
use crate::models::CellValue;
use crate::synthesizer::{OutputCell, OutputSheet, OutputWorkbook};

const DATE_FORMAT: &str = "dd.mm.yyyy hh:mm:ss";

fn write_sheet(worksheet: &mut Worksheet, sheet: &OutputSheet, date_format: &Format) -> Result<()> {
    worksheet.set_name(&sheet.name)?;
    for (&(row, col), cell) in sheet.cells() {
        // Output sheets are 1-based, rust_xlsxwriter is 0-based.
        let (r, c) = (row - 1, col - 1);
        match cell {
            OutputCell::Formula(formula) => {
                worksheet.write_formula(r, c, formula.as_str())?;
            }
            OutputCell::Value(CellValue::Text(s)) => {
                worksheet.write_string(r, c, s)?;
            }
            OutputCell::Value(CellValue::Number(n)) => {
                worksheet.write_number(r, c, *n)?;
            }
            OutputCell::Value(CellValue::Bool(b)) => {
                worksheet.write_boolean(r, c, *b)?;
            }
            OutputCell::Value(CellValue::DateTime(dt)) => {
                let serial = datetime_to_excel_serial(dt);
                worksheet.write_number_with_format(r, c, serial, date_format)?;
            }
            OutputCell::Value(CellValue::Empty) => {}
        }
    }
    Ok(())
}

/// Write sheets in order into a new xlsx file, creating the parent directory if needed.
pub fn write_sheets(sheets: &[&OutputSheet], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format(DATE_FORMAT);
    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        write_sheet(worksheet, sheet, &date_format)?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    workbook.save(path)?;
    log::info!("wrote {} sheet(s) to {}", sheets.len(), path.display());
    Ok(())
}

pub fn write_workbook(workbook: &OutputWorkbook, path: &Path) -> Result<()> {
    let mut sheets = vec![&workbook.primary];
    if let Some(detail) = &workbook.detail {
        sheets.push(detail);
    }
    write_sheets(&sheets, path)
}
