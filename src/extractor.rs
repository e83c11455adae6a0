use crate::coerce::numeric;
use crate::models::{
    CellValue, Classification, Column, ColumnMap, FeeComponents, RawSheet, TransactionRecord,
};
use crate::settings::ReconcileConfig;

/// Source-only column whose amount is folded into the item subtotal.
pub const SHIPPING_LABEL: &str = "Verpackung und Versand";

/// Values printed above the header row of an eBay transaction report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportMetadata {
    pub seller: CellValue,
    pub total_amount: CellValue,
}

/// Regular and fee-only records, each in source order.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub regular: Vec<TransactionRecord>,
    pub fee_only: Vec<TransactionRecord>,
}

impl Extraction {
    pub fn total(&self) -> usize {
        self.regular.len() + self.fee_only.len()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut TransactionRecord> {
        self.regular.iter_mut().chain(self.fee_only.iter_mut())
    }
}

pub fn classify(kind: &str, config: &ReconcileConfig) -> Classification {
    if kind.contains(&config.fee_only_marker) {
        Classification::FeeOnly
    } else {
        Classification::Regular
    }
}

/// Column 1 holds a label, column 2 its value. Later matches overwrite earlier ones.
pub fn extract_metadata(
    sheet: &RawSheet,
    header_row: usize,
    config: &ReconcileConfig,
) -> ReportMetadata {
    let mut meta = ReportMetadata::default();
    for row in 1..header_row {
        let label = sheet.cell(row, 1);
        if label.is_empty() {
            continue;
        }
        let label = label.to_string();
        if label.contains(&config.seller_marker) {
            meta.seller = sheet.cell(row, 2).clone();
        }
        if label.contains(&config.amount_marker) {
            meta.total_amount = sheet.cell(row, 2).clone();
        }
    }
    meta
}

struct RowReader<'a> {
    sheet: &'a RawSheet,
    columns: &'a ColumnMap,
    row: usize,
}

impl RowReader<'_> {
    fn raw(&self, label: &str) -> CellValue {
        self.columns
            .get(label)
            .map(|&col| self.sheet.cell(self.row, col).clone())
            .unwrap_or_default()
    }

    fn value(&self, column: Column) -> CellValue {
        self.raw(column.label())
    }

    fn amount(&self, label: &str) -> f64 {
        self.columns
            .get(label)
            .map(|&col| numeric(self.sheet.cell(self.row, col)))
            .unwrap_or(0.0)
    }
}

/// Walk every row below the header and split typed rows into regular and fee-only records.
/// Rows with an empty type cell are skipped.
pub fn extract_records(
    sheet: &RawSheet,
    header_row: usize,
    columns: &ColumnMap,
    config: &ReconcileConfig,
) -> Extraction {
    let mut extraction = Extraction::default();
    for row in header_row + 1..=sheet.row_count() {
        let reader = RowReader {
            sheet,
            columns,
            row,
        };
        let kind = reader.value(Column::Type);
        if kind.is_empty() {
            continue;
        }
        let kind = kind.to_string();

        let mut item_subtotal = reader.amount(Column::ItemSubtotal.label());
        let shipping = reader.amount(SHIPPING_LABEL);
        if shipping != 0.0 {
            item_subtotal += shipping;
        }

        let classification = classify(&kind, config);
        let record = TransactionRecord {
            source_row: row,
            date: reader.value(Column::Date),
            kind,
            order_number: reader.value(Column::OrderNumber),
            prior_order_number: reader.value(Column::PriorOrderNumber),
            buyer_username: reader.value(Column::BuyerUsername),
            buyer_name: reader.value(Column::BuyerName),
            customer_id: None,
            invoice_id: None,
            gross_amount: reader.amount(Column::GrossAmount.label()),
            item_subtotal,
            fees: FeeComponents {
                fixed_commission: reader.amount(Column::FixedCommission.label()),
                variable_commission: reader.amount(Column::VariableCommission.label()),
                high_return_rate: reader.amount(Column::HighReturnRateFee.label()),
                below_standard_service: reader.amount(Column::BelowStandardFee.label()),
                international: reader.amount(Column::InternationalFee.label()),
            },
            net_payout: reader.amount(Column::NetPayout.label()),
            payout_id: reader.value(Column::PayoutId),
            payout_date: reader.value(Column::PayoutDate),
            classification,
        };
        match classification {
            Classification::Regular => extraction.regular.push(record),
            Classification::FeeOnly => extraction.fee_only.push(record),
        }
    }
    log::debug!(
        "extracted {} regular and {} fee-only records",
        extraction.regular.len(),
        extraction.fee_only.len()
    );
    extraction
}
