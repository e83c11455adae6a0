use std::path::PathBuf;

use crate::settings::{
    load_settings, save_settings, settings_file_exists, settings_path, shellexpand_path,
};

pub fn run(output_dir: Option<String>) -> anyhow::Result<()> {
    let existed = settings_file_exists();
    let mut settings = load_settings();
    if let Some(dir) = output_dir {
        settings.output_dir = shellexpand_path(&dir);
    }

    save_settings(&settings)?;

    let resolved = PathBuf::from(shellexpand_path(&settings.output_dir));
    std::fs::create_dir_all(&resolved)?;

    if existed {
        println!("Updated buchhaltung settings, output at {}", resolved.display());
    } else {
        println!("Initialized buchhaltung at {}", resolved.display());
    }
    println!("Settings: {}", settings_path().display());
    Ok(())
}
