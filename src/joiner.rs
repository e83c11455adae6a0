use std::collections::HashMap;

use crate::extractor::Extraction;
use crate::models::{CellValue, ExternalDataset, TransactionRecord};
use crate::settings::ReconcileConfig;

/// Order id → customer id (KD-NR) and order id → invoice id (RG-NR).
#[derive(Debug, Clone, Default)]
pub struct ExternalKeyMap {
    pub customers: HashMap<String, CellValue>,
    pub invoices: HashMap<String, CellValue>,
    /// Human-readable reasons the dataset could not fully populate the maps.
    pub warnings: Vec<String>,
}

impl ExternalKeyMap {
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty() && self.invoices.is_empty()
    }

    pub fn customer_for(&self, order_key: &str) -> Option<&CellValue> {
        self.customers.get(order_key)
    }

    pub fn invoice_for(&self, order_key: &str) -> Option<&CellValue> {
        self.invoices.get(order_key)
    }
}

fn build_mapping(
    dataset: &ExternalDataset,
    order_column: &str,
    column: &str,
) -> HashMap<String, CellValue> {
    let mut mapping = HashMap::new();
    for row in 0..dataset.len() {
        let order = dataset.value(row, order_column);
        let (Some(order), Some(value)) = (order, dataset.value(row, column)) else {
            continue;
        };
        mapping.insert(order.to_string(), value.clone());
    }
    mapping
}

/// Build both lookup tables. A missing dataset or missing columns leave the affected map empty
/// and record a warning instead of failing.
pub fn build_key_map(
    dataset: Option<&ExternalDataset>,
    config: &ReconcileConfig,
) -> ExternalKeyMap {
    let mut keys = ExternalKeyMap::default();
    let Some(dataset) = dataset.filter(|d| !d.is_empty()) else {
        keys.warnings
            .push("No API data supplied; KD-NR and RG-NR stay empty".to_string());
        return keys;
    };
    if !dataset.has_column(&config.order_column) {
        keys.warnings.push(format!(
            "API data has no {} column; KD-NR and RG-NR stay empty",
            config.order_column
        ));
        return keys;
    }
    if dataset.has_column(&config.customer_column) {
        keys.customers = build_mapping(dataset, &config.order_column, &config.customer_column);
    } else {
        keys.warnings.push(format!(
            "API data has no {} column; KD-NR stays empty",
            config.customer_column
        ));
    }
    if dataset.has_column(&config.invoice_column) {
        keys.invoices = build_mapping(dataset, &config.order_column, &config.invoice_column);
    } else {
        keys.warnings.push(format!(
            "API data has no {} column; RG-NR stays empty",
            config.invoice_column
        ));
    }
    keys
}

pub fn join_record(record: &mut TransactionRecord, keys: &ExternalKeyMap) {
    let Some(order) = record.order_number.non_empty() else {
        record.customer_id = None;
        record.invoice_id = None;
        return;
    };
    let order_key = order.to_string();
    record.customer_id = keys.customer_for(&order_key).cloned();
    record.invoice_id = keys.invoice_for(&order_key).cloned();
}

/// Join customer and invoice ids onto every record of both classes.
pub fn join_all(extraction: &mut Extraction, keys: &ExternalKeyMap) {
    for record in extraction.records_mut() {
        join_record(record, keys);
    }
}
