use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;

/// A single scalar read from a spreadsheet or dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Empty cells and zero-length text both count as "no value".
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// `None` for empty cells, otherwise the cell itself.
    pub fn non_empty(&self) -> Option<&CellValue> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            // Whole numbers print without a fractional part so numeric order ids key the same
            // way as their text form.
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Immutable grid of cells with 1-based addressing.
#[derive(Debug, Clone)]
pub struct RawSheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
    width: usize,
}

static EMPTY: CellValue = CellValue::Empty;

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self {
            name: name.into(),
            rows,
            width,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.width
    }

    /// Cell at a 1-based position; anything outside the grid reads as empty.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        if row == 0 || col == 0 {
            return &EMPTY;
        }
        self.rows
            .get(row - 1)
            .and_then(|r| r.get(col - 1))
            .unwrap_or(&EMPTY)
    }

    pub fn row_is_blank(&self, row: usize) -> bool {
        (1..=self.width).all(|col| self.cell(row, col).is_empty())
    }
}

/// Header label → 1-based column index.
pub type ColumnMap = std::collections::HashMap<String, usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Regular,
    FeeOnly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeeComponents {
    pub fixed_commission: f64,
    pub variable_commission: f64,
    pub high_return_rate: f64,
    pub below_standard_service: f64,
    pub international: f64,
}

impl FeeComponents {
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.fixed_commission,
            self.variable_commission,
            self.high_return_rate,
            self.below_standard_service,
            self.international,
        ]
    }
}

/// One data row of the source report.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    /// 1-based row in the source sheet.
    pub source_row: usize,
    pub date: CellValue,
    pub kind: String,
    pub order_number: CellValue,
    pub prior_order_number: CellValue,
    pub buyer_username: CellValue,
    pub buyer_name: CellValue,
    pub customer_id: Option<CellValue>,
    pub invoice_id: Option<CellValue>,
    pub gross_amount: f64,
    pub item_subtotal: f64,
    pub fees: FeeComponents,
    pub net_payout: f64,
    pub payout_id: CellValue,
    pub payout_date: CellValue,
    pub classification: Classification,
}

/// Canonical output schema. Discriminants are the 1-based output column positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Date = 1,
    Type,
    OrderNumber,
    PriorOrderNumber,
    BuyerUsername,
    BuyerName,
    CustomerId,
    InvoiceId,
    GrossAmount,
    ItemSubtotal,
    FixedCommission,
    VariableCommission,
    HighReturnRateFee,
    BelowStandardFee,
    InternationalFee,
    NetPayout,
    PayoutId,
    PayoutDate,
}

impl Column {
    pub const ALL: [Column; 18] = [
        Column::Date,
        Column::Type,
        Column::OrderNumber,
        Column::PriorOrderNumber,
        Column::BuyerUsername,
        Column::BuyerName,
        Column::CustomerId,
        Column::InvoiceId,
        Column::GrossAmount,
        Column::ItemSubtotal,
        Column::FixedCommission,
        Column::VariableCommission,
        Column::HighReturnRateFee,
        Column::BelowStandardFee,
        Column::InternationalFee,
        Column::NetPayout,
        Column::PayoutId,
        Column::PayoutDate,
    ];

    pub const FEES: [Column; 5] = [
        Column::FixedCommission,
        Column::VariableCommission,
        Column::HighReturnRateFee,
        Column::BelowStandardFee,
        Column::InternationalFee,
    ];

    pub fn index(self) -> u16 {
        self as u16
    }

    pub fn letter(self) -> String {
        column_letter(self.index())
    }

    /// Header text, identical in the eBay export and the rewritten workbook.
    pub fn label(self) -> &'static str {
        match self {
            Self::Date => "Datum der Transaktionserstellung",
            Self::Type => "Typ",
            Self::OrderNumber => "Bestellnummer",
            Self::PriorOrderNumber => "Alte Bestellnummer",
            Self::BuyerUsername => "Nutzername des Käufers",
            Self::BuyerName => "Name des Käufers",
            Self::CustomerId => "KD-NR",
            Self::InvoiceId => "RG-NR",
            Self::GrossAmount => "Transaktionsbetrag (inkl. Kosten)",
            Self::ItemSubtotal => "Zwischensumme Artikel",
            Self::FixedCommission => "Fixer Anteil der Verkaufsprovision",
            Self::VariableCommission => "Variabler Anteil der Verkaufsprovision",
            Self::HighReturnRateFee => {
                "Gebühr für sehr hohe Quote an \u{201e}nicht wie beschriebenen Artikeln\""
            }
            Self::BelowStandardFee => "Gebühr für unterdurchschnittlichen Servicestatus",
            Self::InternationalFee => "Internationale Gebühr",
            Self::NetPayout => "Betrag abzügl. Kosten",
            Self::PayoutId => "Auszahlung Nr.",
            Self::PayoutDate => "Auszahlungsdatum",
        }
    }
}

/// Spreadsheet column letters for a 1-based index: 1 → A, 27 → AA.
pub fn column_letter(mut index: u16) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Tabular order data supplied by the ERP procedure endpoint.
#[derive(Debug, Clone, Default)]
pub struct ExternalDataset {
    pub columns: Vec<String>,
    pub rows: Vec<BTreeMap<String, CellValue>>,
}

impl ExternalDataset {
    pub fn push_row(&mut self, row: BTreeMap<String, CellValue>) {
        for key in row.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Value of `column` in `row`, `None` when missing or empty.
    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(CellValue::non_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(10), "J");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(Column::NetPayout.letter(), "P");
        assert_eq!(Column::PayoutDate.index(), 18);
    }

    #[test]
    fn test_cell_display_whole_numbers() {
        assert_eq!(CellValue::Number(1234.0).to_string(), "1234");
        assert_eq!(CellValue::Number(12.5).to_string(), "12.5");
        assert_eq!(CellValue::text("12-345").to_string(), "12-345");
        assert_eq!(CellValue::Empty.to_string(), "");
    }

    #[test]
    fn test_raw_sheet_out_of_bounds_is_empty() {
        let sheet = RawSheet::new(
            "Bericht",
            vec![vec![CellValue::text("a")], vec![CellValue::Empty, CellValue::Number(1.0)]],
        );
        assert_eq!(sheet.row_count(), 2);
        assert_eq!(sheet.col_count(), 2);
        assert_eq!(sheet.cell(1, 1), &CellValue::text("a"));
        assert_eq!(sheet.cell(1, 2), &CellValue::Empty);
        assert_eq!(sheet.cell(0, 1), &CellValue::Empty);
        assert_eq!(sheet.cell(9, 9), &CellValue::Empty);
    }

    #[test]
    fn test_dataset_tracks_columns_in_order() {
        let mut ds = ExternalDataset::default();
        let mut row = BTreeMap::new();
        row.insert("ORDER_ID".to_string(), CellValue::text("1"));
        row.insert("KUNDENNR".to_string(), CellValue::Empty);
        ds.push_row(row);
        assert!(ds.has_column("ORDER_ID"));
        assert!(ds.has_column("KUNDENNR"));
        assert_eq!(ds.value(0, "ORDER_ID"), Some(&CellValue::text("1")));
        assert_eq!(ds.value(0, "KUNDENNR"), None);
    }
}
