use std::collections::BTreeMap;

use crate::coerce::period_label;
use crate::extractor::{Extraction, ReportMetadata};
use crate::models::{column_letter, CellValue, Column, TransactionRecord};
use crate::settings::ReconcileConfig;

/// Primary-sheet column holding a copy of the item subtotal.
pub const CHECK_COPY_COL: u16 = 20;
/// Primary-sheet column holding `=J{r}-T{r}`, zero when the row is consistent.
pub const CHECK_DIFF_COL: u16 = 21;

pub const HEADER_ROW: u32 = 4;
pub const FIRST_DATA_ROW: u32 = HEADER_ROW + 1;

#[derive(Debug, Clone, PartialEq)]
pub enum OutputCell {
    Value(CellValue),
    Formula(String),
}

/// Sparse sheet addressed by 1-based (row, column).
#[derive(Debug, Clone, Default)]
pub struct OutputSheet {
    pub name: String,
    cells: BTreeMap<(u32, u16), OutputCell>,
}

impl OutputSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Empty values are not stored, so the cell stays blank in the written file.
    pub fn set_value(&mut self, row: u32, col: u16, value: CellValue) {
        if value.is_empty() {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), OutputCell::Value(value));
        }
    }

    pub fn set_text(&mut self, row: u32, col: u16, text: &str) {
        self.set_value(row, col, CellValue::text(text));
    }

    pub fn set_number(&mut self, row: u32, col: u16, number: f64) {
        self.set_value(row, col, CellValue::Number(number));
    }

    pub fn set_formula(&mut self, row: u32, col: u16, formula: String) {
        self.cells.insert((row, col), OutputCell::Formula(formula));
    }

    pub fn get(&self, row: u32, col: u16) -> Option<&OutputCell> {
        self.cells.get(&(row, col))
    }

    pub fn value(&self, row: u32, col: u16) -> Option<&CellValue> {
        match self.get(row, col) {
            Some(OutputCell::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn formula(&self, row: u32, col: u16) -> Option<&str> {
        match self.get(row, col) {
            Some(OutputCell::Formula(f)) => Some(f),
            _ => None,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = (&(u32, u16), &OutputCell)> {
        self.cells.iter()
    }

    pub fn last_row(&self) -> u32 {
        self.cells.keys().map(|(r, _)| *r).max().unwrap_or(0)
    }
}

/// Row positions of the primary sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryLayout {
    pub first_data_row: u32,
    /// Equals `first_data_row - 1` when there are no regular records.
    pub last_data_row: u32,
    pub fee_row: u32,
    pub fee_only_row: u32,
    pub totals_row: u32,
}

#[derive(Debug, Clone)]
pub struct OutputWorkbook {
    pub primary: OutputSheet,
    pub detail: Option<OutputSheet>,
    pub layout: PrimaryLayout,
    pub fee_only_total: f64,
}

fn sum_formula(column: Column, from: u32, to: u32) -> String {
    let letter = column.letter();
    format!("=SUM({letter}{from}:{letter}{to})")
}

fn write_record_fields(sheet: &mut OutputSheet, row: u32, record: &TransactionRecord) {
    sheet.set_value(row, Column::Date.index(), record.date.clone());
    sheet.set_text(row, Column::Type.index(), &record.kind);
    sheet.set_value(row, Column::OrderNumber.index(), record.order_number.clone());
    sheet.set_value(row, Column::PriorOrderNumber.index(), record.prior_order_number.clone());
    sheet.set_value(row, Column::BuyerUsername.index(), record.buyer_username.clone());
    sheet.set_value(row, Column::BuyerName.index(), record.buyer_name.clone());
    sheet.set_value(row, Column::PayoutId.index(), record.payout_id.clone());
    sheet.set_value(row, Column::PayoutDate.index(), record.payout_date.clone());
}

fn write_regular_row(sheet: &mut OutputSheet, row: u32, record: &TransactionRecord) {
    write_record_fields(sheet, row, record);
    if let Some(id) = &record.customer_id {
        sheet.set_value(row, Column::CustomerId.index(), id.clone());
    }
    if let Some(id) = &record.invoice_id {
        sheet.set_value(row, Column::InvoiceId.index(), id.clone());
    }
    sheet.set_number(row, Column::GrossAmount.index(), record.gross_amount);
    sheet.set_number(row, Column::ItemSubtotal.index(), record.item_subtotal);
    for (column, amount) in Column::FEES.iter().zip(record.fees.as_array()) {
        sheet.set_number(row, column.index(), amount);
    }
    sheet.set_number(row, Column::NetPayout.index(), record.net_payout);

    sheet.set_number(row, CHECK_COPY_COL, record.item_subtotal);
    let subtotal = Column::ItemSubtotal.letter();
    let copy = column_letter(CHECK_COPY_COL);
    sheet.set_formula(row, CHECK_DIFF_COL, format!("={subtotal}{row}-{copy}{row}"));
}

/// Last non-empty value of a field across `records`.
fn last_set<'a>(
    records: &'a [TransactionRecord],
    field: impl Fn(&'a TransactionRecord) -> &'a CellValue,
) -> CellValue {
    records
        .iter()
        .rev()
        .map(field)
        .find(|v| !v.is_empty())
        .cloned()
        .unwrap_or_default()
}

fn write_fee_account(
    sheet: &mut OutputSheet,
    row: u32,
    date: &CellValue,
    config: &ReconcileConfig,
) {
    sheet.set_text(row, Column::CustomerId.index(), &config.fee_account);
    sheet.set_text(row, Column::InvoiceId.index(), &period_label(date));
}

/// Detail sheet name that does not clash with the primary sheet. Worksheet names are
/// case-insensitive, so `Tabelle1` next to `tabelle1` becomes `Tabelle11`.
pub fn detail_sheet_name(primary: &str, config: &ReconcileConfig) -> String {
    let taken = primary.to_lowercase();
    let base = &config.detail_sheet_name;
    let mut name = base.clone();
    let mut suffix = 1;
    while name.to_lowercase() == taken {
        name = format!("{base}{suffix}");
        suffix += 1;
    }
    name
}

fn write_detail_sheet(
    records: &[TransactionRecord],
    primary: &str,
    config: &ReconcileConfig,
) -> OutputSheet {
    let mut sheet = OutputSheet::new(detail_sheet_name(primary, config));
    let mut row = 1u32;
    for record in records {
        write_record_fields(&mut sheet, row, record);
        write_fee_account(&mut sheet, row, &record.date, config);
        sheet.set_number(row, Column::GrossAmount.index(), record.net_payout);
        sheet.set_number(row, Column::ItemSubtotal.index(), record.net_payout);
        for column in Column::FEES {
            sheet.set_number(row, column.index(), 0.0);
        }
        sheet.set_number(row, Column::NetPayout.index(), record.net_payout);
        row += 1;
    }
    // One blank separator row, included in the subtotal range.
    let subtotal_row = row + 1;
    sheet.set_formula(
        subtotal_row,
        Column::ItemSubtotal.index(),
        sum_formula(Column::ItemSubtotal, 1, subtotal_row - 1),
    );
    sheet.set_formula(
        subtotal_row,
        Column::NetPayout.index(),
        sum_formula(Column::NetPayout, 1, subtotal_row - 1),
    );
    sheet
}

/// Lay out the rewritten workbook.
pub fn synthesize(
    sheet_name: &str,
    meta: &ReportMetadata,
    extraction: &Extraction,
    config: &ReconcileConfig,
) -> OutputWorkbook {
    let mut sheet = OutputSheet::new(sheet_name);

    sheet.set_text(1, 1, "Verkäufer");
    sheet.set_value(1, 2, meta.seller.clone());
    sheet.set_text(2, 1, "Transaktionen");
    sheet.set_number(2, 2, extraction.total() as f64);
    sheet.set_text(3, 1, "Betrag");
    sheet.set_value(3, 2, meta.total_amount.clone());

    for column in Column::ALL {
        sheet.set_text(HEADER_ROW, column.index(), config.header_for(column));
    }

    let mut row = FIRST_DATA_ROW;
    for record in &extraction.regular {
        write_regular_row(&mut sheet, row, record);
        row += 1;
    }
    let last_data_row = row - 1;

    let regular = &extraction.regular;
    let fee_date = last_set(regular, |r| &r.date);

    // Fee row: commissions summed over the regular rows.
    let fee_row = row;
    sheet.set_value(fee_row, Column::Date.index(), fee_date.clone());
    sheet.set_text(fee_row, Column::BuyerName.index(), &config.fee_row_label);
    write_fee_account(&mut sheet, fee_row, &fee_date, config);
    sheet.set_formula(
        fee_row,
        Column::GrossAmount.index(),
        format!("={}{fee_row}", Column::ItemSubtotal.letter()),
    );
    sheet.set_formula(
        fee_row,
        Column::ItemSubtotal.index(),
        format!(
            "=SUM({first}{fee_row}:{last}{fee_row})",
            first = Column::FixedCommission.letter(),
            last = Column::InternationalFee.letter()
        ),
    );
    for column in Column::FEES {
        if regular.is_empty() {
            sheet.set_number(fee_row, column.index(), 0.0);
        } else {
            sheet.set_formula(
                fee_row,
                column.index(),
                sum_formula(column, FIRST_DATA_ROW, last_data_row),
            );
        }
    }
    sheet.set_number(fee_row, Column::NetPayout.index(), 0.0);
    sheet.set_value(fee_row, Column::PayoutId.index(), last_set(regular, |r| &r.payout_id));
    sheet.set_value(fee_row, Column::PayoutDate.index(), last_set(regular, |r| &r.payout_date));

    // Fee-only summary row: computed in-process, fee columns stay blank.
    let fee_only = &extraction.fee_only;
    let fee_only_row = fee_row + 1;
    let fee_only_total: f64 = fee_only.iter().map(|r| r.net_payout).sum();
    let fee_only_date = fee_only
        .first()
        .map(|r| r.date.clone())
        .unwrap_or_else(|| fee_date.clone());
    sheet.set_value(fee_only_row, Column::Date.index(), fee_only_date.clone());
    sheet.set_text(fee_only_row, Column::BuyerName.index(), &config.fee_only_row_label);
    write_fee_account(&mut sheet, fee_only_row, &fee_only_date, config);
    sheet.set_formula(
        fee_only_row,
        Column::GrossAmount.index(),
        format!("={}{fee_only_row}", Column::ItemSubtotal.letter()),
    );
    sheet.set_number(fee_only_row, Column::ItemSubtotal.index(), fee_only_total);
    sheet.set_number(fee_only_row, Column::NetPayout.index(), fee_only_total);
    sheet.set_value(fee_only_row, Column::PayoutId.index(), last_set(fee_only, |r| &r.payout_id));
    sheet.set_value(
        fee_only_row,
        Column::PayoutDate.index(),
        last_set(fee_only, |r| &r.payout_date),
    );

    let totals_row = fee_only_row + 1;
    for column in [Column::ItemSubtotal, Column::NetPayout] {
        sheet.set_formula(
            totals_row,
            column.index(),
            sum_formula(column, FIRST_DATA_ROW, fee_only_row),
        );
    }

    let detail =
        (!fee_only.is_empty()).then(|| write_detail_sheet(fee_only, sheet_name, config));

    OutputWorkbook {
        primary: sheet,
        detail,
        layout: PrimaryLayout {
            first_data_row: FIRST_DATA_ROW,
            last_data_row,
            fee_row,
            fee_only_row,
            totals_row,
        },
        fee_only_total,
    }
}

/// Sum a numeric column over an inclusive row range, the way the spreadsheet evaluates
/// `=SUM(...)`: text and blank cells count as 0.
pub fn sum_range(sheet: &OutputSheet, column: Column, from: u32, to: u32) -> f64 {
    (from..=to)
        .filter_map(|row| match sheet.value(row, column.index()) {
            Some(CellValue::Number(n)) => Some(*n),
            _ => None,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, FeeComponents};

    fn record(kind: &str, date: &str, order: &str, net: f64) -> TransactionRecord {
        let classification = if kind.contains("Andere Geb") {
            Classification::FeeOnly
        } else {
            Classification::Regular
        };
        TransactionRecord {
            source_row: 0,
            date: CellValue::text(date),
            kind: kind.to_string(),
            order_number: CellValue::text(order),
            prior_order_number: CellValue::Empty,
            buyer_username: CellValue::text("buyer"),
            buyer_name: CellValue::text("Erika Muster"),
            customer_id: None,
            invoice_id: None,
            gross_amount: net + 1.0,
            item_subtotal: net + 1.0,
            fees: FeeComponents {
                fixed_commission: -0.35,
                variable_commission: -0.65,
                ..FeeComponents::default()
            },
            net_payout: net,
            payout_id: CellValue::Empty,
            payout_date: CellValue::Empty,
            classification,
        }
    }

    fn extraction(regular: usize, fee_only: usize) -> Extraction {
        Extraction {
            regular: (0..regular)
                .map(|i| {
                    let date = format!("2025-02-{:02}", i + 1);
                    record("Bestellung", &date, &format!("O-{i}"), 10.0)
                })
                .collect(),
            fee_only: (0..fee_only)
                .map(|i| record("Andere Gebühr", &format!("2025-03-{:02}", i + 1), "--", -2.5))
                .collect(),
        }
    }

    fn build(ex: &Extraction) -> OutputWorkbook {
        let meta = ReportMetadata {
            seller: CellValue::text("shop-gmbh"),
            total_amount: CellValue::Number(99.0),
        };
        synthesize("Bericht", &meta, ex, &ReconcileConfig::default())
    }

    #[test]
    fn test_metadata_and_header_rows() {
        let wb = build(&extraction(2, 1));
        let s = &wb.primary;
        assert_eq!(s.name, "Bericht");
        assert_eq!(s.value(1, 1), Some(&CellValue::text("Verkäufer")));
        assert_eq!(s.value(1, 2), Some(&CellValue::text("shop-gmbh")));
        assert_eq!(s.value(2, 2), Some(&CellValue::Number(3.0)));
        assert_eq!(s.value(3, 2), Some(&CellValue::Number(99.0)));
        for column in Column::ALL {
            assert_eq!(
                s.value(HEADER_ROW, column.index()),
                Some(&CellValue::text(column.label()))
            );
        }
        assert!(s.get(HEADER_ROW, 19).is_none());
    }

    #[test]
    fn test_regular_rows_keep_order_and_verification_columns() {
        let wb = build(&extraction(3, 0));
        let s = &wb.primary;
        for (i, row) in (5..=7).enumerate() {
            let order = CellValue::text(format!("O-{i}"));
            assert_eq!(s.value(row, Column::OrderNumber.index()), Some(&order));
            assert_eq!(s.value(row, CHECK_COPY_COL), Some(&CellValue::Number(11.0)));
            assert_eq!(s.formula(row, CHECK_DIFF_COL), Some(format!("=J{row}-T{row}").as_str()));
            assert!(s.get(row, 19).is_none());
        }
        assert!(s.get(5, Column::CustomerId.index()).is_none());
    }

    #[test]
    fn test_fee_row_formulas() {
        let wb = build(&extraction(3, 1));
        let s = &wb.primary;
        let r = wb.layout.fee_row;
        assert_eq!(r, 8);
        assert_eq!(s.value(r, Column::Date.index()), Some(&CellValue::text("2025-02-03")));
        assert_eq!(s.value(r, Column::BuyerName.index()), Some(&CellValue::text("Gebuehr")));
        assert_eq!(s.value(r, Column::CustomerId.index()), Some(&CellValue::text("7400700")));
        assert_eq!(s.value(r, Column::InvoiceId.index()), Some(&CellValue::text("202502")));
        assert_eq!(s.formula(r, Column::GrossAmount.index()), Some("=J8"));
        assert_eq!(s.formula(r, Column::ItemSubtotal.index()), Some("=SUM(K8:O8)"));
        assert_eq!(s.formula(r, Column::FixedCommission.index()), Some("=SUM(K5:K7)"));
        assert_eq!(s.formula(r, Column::InternationalFee.index()), Some("=SUM(O5:O7)"));
        assert_eq!(s.value(r, Column::NetPayout.index()), Some(&CellValue::Number(0.0)));
        let fixed = sum_range(s, Column::FixedCommission, 5, 7);
        assert!((fixed - -1.05).abs() < 1e-9);
    }

    #[test]
    fn test_fee_row_payout_inherits_last_set_regular_values() {
        let mut ex = extraction(3, 0);
        ex.regular[0].payout_id = CellValue::text("P-1");
        ex.regular[1].payout_id = CellValue::text("P-2");
        ex.regular[0].payout_date = CellValue::text("2025-02-10");
        let wb = build(&ex);
        let r = wb.layout.fee_row;
        assert_eq!(wb.primary.value(r, Column::PayoutId.index()), Some(&CellValue::text("P-2")));
        assert_eq!(
            wb.primary.value(r, Column::PayoutDate.index()),
            Some(&CellValue::text("2025-02-10"))
        );
        // The summary row does not inherit from regular records.
        let s = wb.layout.fee_only_row;
        assert!(wb.primary.get(s, Column::PayoutId.index()).is_none());
    }

    #[test]
    fn test_fee_only_summary_row() {
        let mut ex = extraction(2, 2);
        ex.fee_only[1].payout_id = CellValue::text("P-9");
        let wb = build(&ex);
        let s = &wb.primary;
        let r = wb.layout.fee_only_row;
        assert_eq!(r, 8);
        assert_eq!(s.value(r, Column::Date.index()), Some(&CellValue::text("2025-03-01")));
        assert_eq!(s.value(r, Column::InvoiceId.index()), Some(&CellValue::text("202503")));
        assert_eq!(s.value(r, Column::ItemSubtotal.index()), Some(&CellValue::Number(-5.0)));
        assert_eq!(s.value(r, Column::NetPayout.index()), Some(&CellValue::Number(-5.0)));
        assert_eq!(s.value(r, Column::PayoutId.index()), Some(&CellValue::text("P-9")));
        for column in Column::FEES {
            assert!(s.get(r, column.index()).is_none(), "{column:?} should be blank");
        }
        assert_eq!(wb.fee_only_total, -5.0);
    }

    #[test]
    fn test_totals_range_covers_data_through_summary() {
        for (regular, fee_only) in [(0, 0), (1, 0), (0, 1), (5, 3)] {
            let wb = build(&extraction(regular, fee_only));
            let l = wb.layout;
            assert_eq!(l.fee_only_row, l.fee_row + 1);
            assert_eq!(l.totals_row, l.fee_only_row + 1);
            assert_eq!(
                wb.primary.formula(l.totals_row, Column::ItemSubtotal.index()),
                Some(format!("=SUM(J5:J{})", l.fee_only_row).as_str())
            );
            assert_eq!(
                wb.primary.formula(l.totals_row, Column::NetPayout.index()),
                Some(format!("=SUM(P5:P{})", l.fee_only_row).as_str())
            );
            assert_eq!(wb.primary.last_row(), l.totals_row);
        }
    }

    #[test]
    fn test_no_fee_only_records() {
        let wb = build(&extraction(2, 0));
        assert!(wb.detail.is_none());
        let r = wb.layout.fee_only_row;
        let zero = CellValue::Number(0.0);
        assert_eq!(wb.primary.value(r, Column::ItemSubtotal.index()), Some(&zero));
        assert_eq!(wb.primary.value(r, Column::NetPayout.index()), Some(&CellValue::Number(0.0)));
        // Falls back to the fee row date.
        assert_eq!(wb.primary.value(r, Column::Date.index()), Some(&CellValue::text("2025-02-02")));
    }

    #[test]
    fn test_no_regular_records_writes_zero_fees() {
        let wb = build(&extraction(0, 1));
        let l = wb.layout;
        assert_eq!(l.fee_row, 5);
        assert_eq!(l.last_data_row, 4);
        assert_eq!(
            wb.primary.value(l.fee_row, Column::FixedCommission.index()),
            Some(&CellValue::Number(0.0))
        );
        assert!(wb.primary.get(l.fee_row, Column::Date.index()).is_none());
    }

    #[test]
    fn test_detail_sheet_layout() {
        let mut ex = extraction(1, 2);
        ex.fee_only[0].payout_id = CellValue::text("P-3");
        let wb = build(&ex);
        let d = wb.detail.expect("detail sheet");
        assert_eq!(d.name, "Tabelle1");
        for row in 1..=2 {
            assert_eq!(d.value(row, Column::CustomerId.index()), Some(&CellValue::text("7400700")));
            assert_eq!(d.value(row, Column::InvoiceId.index()), Some(&CellValue::text("202503")));
            assert_eq!(d.value(row, Column::GrossAmount.index()), Some(&CellValue::Number(-2.5)));
            assert_eq!(d.value(row, Column::ItemSubtotal.index()), Some(&CellValue::Number(-2.5)));
            for column in Column::FEES {
                assert_eq!(d.value(row, column.index()), Some(&CellValue::Number(0.0)));
            }
        }
        assert_eq!(d.value(1, Column::PayoutId.index()), Some(&CellValue::text("P-3")));
        assert!(d.get(3, Column::ItemSubtotal.index()).is_none());
        assert_eq!(d.formula(4, Column::ItemSubtotal.index()), Some("=SUM(J1:J3)"));
        assert_eq!(d.formula(4, Column::NetPayout.index()), Some("=SUM(P1:P3)"));
        assert_eq!(d.last_row(), 4);
    }

    #[test]
    fn test_detail_sheet_renamed_when_primary_has_its_name() {
        let meta = ReportMetadata::default();
        let config = ReconcileConfig::default();
        let wb = synthesize("Tabelle1", &meta, &extraction(1, 1), &config);
        assert_eq!(wb.primary.name, "Tabelle1");
        assert_eq!(wb.detail.unwrap().name, "Tabelle11");

        assert_eq!(detail_sheet_name("TABELLE1", &config), "Tabelle11");
        assert_eq!(detail_sheet_name("Bericht", &config), "Tabelle1");
    }
}
