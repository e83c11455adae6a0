pub mod init;
pub mod inspect;
pub mod matching;
pub mod process;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::dataset::load_dataset;
use crate::models::ExternalDataset;
use crate::reconciler::AuditLog;
use crate::settings::{shellexpand_path, Settings};

#[derive(Parser)]
#[command(
    name = "buchhaltung",
    about = "Reconcile eBay transaction reports against ERP order data."
)]
pub struct Cli {
    /// Print diagnostic logging to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write settings (output directory, report layout) to ~/.config/buchhaltung.
    Init {
        /// Directory for processed workbooks (default: ~/Documents/buchhaltung/output)
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
    },
    /// Rewrite a transaction report with KD-NR/RG-NR and fee summary rows.
    Process {
        /// eBay transaction report (xlsx)
        file: String,
        /// Exported API data with ORDER_ID, KUNDENNR and BELEGNR (json, csv or xlsx)
        #[arg(long)]
        dataset: Option<String>,
        /// Override the configured output directory
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
    },
    /// Match report orders against API data, save the matches, then process the report.
    Match {
        /// eBay transaction report (xlsx)
        file: String,
        /// Exported API data with ORDER_ID, KUNDENNR and BELEGNR (json, csv or xlsx)
        #[arg(long)]
        dataset: String,
        /// Override the configured output directory
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
    },
    /// Show how a report would be read, without writing anything.
    Inspect {
        /// eBay transaction report (xlsx)
        file: String,
        /// Exported API data to check join coverage against
        #[arg(long)]
        dataset: Option<String>,
    },
}

pub(crate) fn resolve_output_dir(output_dir: Option<String>, settings: &Settings) -> PathBuf {
    let dir = output_dir.unwrap_or_else(|| settings.output_dir.clone());
    PathBuf::from(shellexpand_path(&dir))
}

pub(crate) fn load_dataset_arg(path: Option<&str>) -> anyhow::Result<Option<ExternalDataset>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let path = PathBuf::from(shellexpand_path(path));
    let dataset = load_dataset(&path)
        .with_context(|| format!("Cannot load API data from {}", path.display()))?;
    println!("Loaded {} API rows from {}", dataset.len(), path.display());
    Ok(Some(dataset))
}

const FAILURE_PREFIXES: [&str; 3] = ["Error:", "Critical error:", "Could not"];

pub(crate) fn print_log(log: &AuditLog) {
    for line in log.lines() {
        if line.starts_with("Warning:") {
            println!("{}", line.yellow());
        } else if FAILURE_PREFIXES.iter().any(|p| line.starts_with(p)) {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }
}

pub(crate) fn print_written(label: &str, path: &Path) {
    println!("{} {}", label.green().bold(), path.display());
}
