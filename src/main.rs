mod cli;
mod coerce;
mod dataset;
mod error;
mod extractor;
mod fmt;
mod joiner;
mod locator;
mod logging;
mod matcher;
mod models;
mod reconciler;
mod settings;
mod sheet;
mod synthesizer;
mod writer;

use clap::Parser;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Init { output_dir } => cli::init::run(output_dir),
        Commands::Process {
            file,
            dataset,
            output_dir,
        } => cli::process::run(&file, dataset.as_deref(), output_dir),
        Commands::Match {
            file,
            dataset,
            output_dir,
        } => cli::matching::run(&file, &dataset, output_dir),
        Commands::Inspect { file, dataset } => cli::inspect::run(&file, dataset.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
