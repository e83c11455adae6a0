use std::path::PathBuf;

use anyhow::{bail, Context};

use crate::cli::{load_dataset_arg, print_log, print_written, resolve_output_dir};
use crate::matcher::match_and_process;
use crate::settings::{load_settings, shellexpand_path};

pub fn run(file: &str, dataset: &str, output_dir: Option<String>) -> anyhow::Result<()> {
    let settings = load_settings();
    let output_dir = resolve_output_dir(output_dir, &settings);
    let dataset = load_dataset_arg(Some(dataset))?.context("No API data loaded")?;

    let path = PathBuf::from(shellexpand_path(file));
    let result = match_and_process(&path, &dataset, &settings.reconcile, &output_dir);
    print_log(&result.log);

    if let Some(matched) = &result.matched_path {
        print_written("Matched", matched);
    }
    match result.output_path {
        Some(out) if result.success => {
            print_written("Saved", &out);
            Ok(())
        }
        _ => bail!("Matching {} failed", path.display()),
    }
}
