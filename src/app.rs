//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and initializes logging
//! - layers the settings file and flags into a `PipelineConfig`
//! - runs the pipeline and prints the summary
//! - writes the optional column inventory for `inspect`

use clap::Parser;
use tracing::info;

use crate::cli::{Command, InspectArgs, RunArgs};
use crate::domain::{PipelineConfig, SettingsFile};
use crate::error::AppError;
use crate::io::{inventory, read_feature_collection, render_inventory, write_columns_file};
use crate::report::{format_outputs, format_run_summary, RunHeader};

pub mod pipeline;

/// Entry point for the `dvi` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    crate::logging::init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = config_from_args(&args)?;
    let run = pipeline::run_pipeline(&config)?;

    let header = RunHeader {
        input: config.input.display().to_string(),
        preset: run.preset.display_name().to_string(),
        period_label: config.period_label.clone(),
        data_year: config.data_year,
    };
    println!("{}", format_run_summary(&header, &run.summary));
    println!("{}", format_outputs(&run.outputs));
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<(), AppError> {
    let mut config = PipelineConfig::new(&args.input);
    if let Some(path) = &args.config {
        config.apply_settings(SettingsFile::load(path)?)?;
    }

    let collection = read_feature_collection(&args.input)?;
    let inv = inventory(&collection, &config.catalog);
    println!("{}", render_inventory(&inv));

    if args.write_columns {
        let path = write_columns_file(&args.input, &inv)?;
        info!(path = %path.display(), "wrote column inventory");
    }
    Ok(())
}

/// Build the run configuration: defaults, then the settings file, then flags.
pub fn config_from_args(args: &RunArgs) -> Result<PipelineConfig, AppError> {
    let mut config = PipelineConfig::new(&args.input);
    if let Some(path) = &args.config {
        config.apply_settings(SettingsFile::load(path)?)?;
    }

    config.out_dir = args.out_dir.clone();
    config.preset = args.preset;
    config.top_n = args.top;
    config.report_path = args.report.clone();
    if let Some(period) = &args.period {
        config.period_label = period.clone();
    }
    if let Some(year) = args.year {
        config.data_year = year;
    }
    if args.census {
        config.census.enabled = true;
    }
    if let Some(year) = args.acs_year {
        config.census.acs_year = year;
    }
    Ok(config)
}
