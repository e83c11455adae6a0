use std::path::PathBuf;

use anyhow::bail;

use crate::cli::{load_dataset_arg, print_log, print_written, resolve_output_dir};
use crate::reconciler::process_file;
use crate::settings::{load_settings, shellexpand_path};

pub fn run(file: &str, dataset: Option<&str>, output_dir: Option<String>) -> anyhow::Result<()> {
    let settings = load_settings();
    let output_dir = resolve_output_dir(output_dir, &settings);
    let dataset = load_dataset_arg(dataset)?;
    if dataset.is_none() {
        println!("No API data given, KD-NR and RG-NR stay empty");
    }

    let path = PathBuf::from(shellexpand_path(file));
    let result = process_file(&path, dataset.as_ref(), &settings.reconcile, &output_dir);
    print_log(&result.log);

    match result.output_path {
        Some(out) if result.success => {
            print_written("Saved", &out);
            Ok(())
        }
        _ => bail!("Processing {} failed", path.display()),
    }
}
