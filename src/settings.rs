use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReconError, Result};
use crate::models::Column;

/// Everything the reconciliation pipeline needs to know about the report layout.
/// Built once and passed by reference into every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub header_marker: String,
    pub header_scan_rows: usize,
    pub header_scan_cols: usize,
    pub fee_only_marker: String,
    pub seller_marker: String,
    pub amount_marker: String,
    pub fee_account: String,
    pub fee_row_label: String,
    pub fee_only_row_label: String,
    pub detail_sheet_name: String,
    pub output_prefix: String,
    pub order_column: String,
    pub customer_column: String,
    pub invoice_column: String,
    pub output_headers: Vec<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            header_marker: "Datum der Transaktionserstellung".to_string(),
            header_scan_rows: 20,
            header_scan_cols: 10,
            fee_only_marker: "Andere Geb".to_string(),
            seller_marker: "Verkäufer".to_string(),
            amount_marker: "Betrag".to_string(),
            fee_account: "7400700".to_string(),
            fee_row_label: "Gebuehr".to_string(),
            fee_only_row_label: "Andere Gebuehr".to_string(),
            detail_sheet_name: "Tabelle1".to_string(),
            output_prefix: "bearbeitet_".to_string(),
            order_column: "ORDER_ID".to_string(),
            customer_column: "KUNDENNR".to_string(),
            invoice_column: "BELEGNR".to_string(),
            output_headers: Column::ALL.iter().map(|c| c.label().to_string()).collect(),
        }
    }
}

impl ReconcileConfig {
    /// Output header for a canonical column, falling back to the built-in label when the
    /// configured list is short.
    pub fn header_for(&self, column: Column) -> &str {
        self.output_headers
            .get(column.index() as usize - 1)
            .map(String::as_str)
            .unwrap_or_else(|| column.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_output_dir_string")]
    pub output_dir: String,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

fn default_output_dir_string() -> String {
    default_output_dir().to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir_string(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `~/.config/buchhaltung/settings.json`
pub fn settings_path() -> PathBuf {
    home().join(".config").join("buchhaltung").join("settings.json")
}

fn default_output_dir() -> PathBuf {
    home().join("Documents").join("buchhaltung").join("output")
}

/// Settings stored at `path`, or the defaults when the file is missing or unreadable.
pub fn read_settings(path: &Path) -> Settings {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Settings::default(),
        Err(e) => {
            log::warn!("cannot read {}: {e}", path.display());
            return Settings::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        log::warn!("ignoring unreadable {}: {e}", path.display());
        Settings::default()
    })
}

pub fn write_settings(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ReconError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    log::debug!("saved settings to {}", path.display());
    Ok(())
}

pub fn load_settings() -> Settings {
    read_settings(&settings_path())
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    write_settings(settings, &settings_path())
}

pub fn settings_file_exists() -> bool {
    settings_path().is_file()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
