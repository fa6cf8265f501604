//! Command-line parsing for the DVI pipeline.
//!
//! Argument parsing and command dispatch are kept separate from the scoring
//! code; `app` turns these structs into a `PipelineConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::Preset;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "dvi",
    version,
    about = "Displacement Vulnerability Index for census-tract typology extracts"
)]
pub struct Cli {
    /// More log output (repeat for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Score every tract and write the index series, socioeconomic series and
    /// enriched GeoJSON.
    Run(RunArgs),
    /// List the input's property columns and how they resolve to concepts.
    Inspect(InspectArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Typology FeatureCollection (GeoJSON).
    #[arg(short, long, value_name = "GEOJSON")]
    pub input: PathBuf,

    /// Directory for the three output artifacts.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Pillar/weight preset.
    #[arg(long, value_enum, default_value_t = Preset::Auto)]
    pub preset: Preset,

    /// Enrich raw metrics from the Census ACS 5-year API.
    #[arg(long)]
    pub census: bool,

    /// ACS 5-year vintage to query.
    #[arg(long, value_name = "YEAR")]
    pub acs_year: Option<u16>,

    /// TOML settings file (labels, weights, encodings, aliases, census).
    #[arg(short, long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Write a JSON run manifest to this path.
    #[arg(long, value_name = "JSON")]
    pub report: Option<PathBuf>,

    /// Number of most vulnerable tracts to list.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Period label written into the index series.
    #[arg(long, value_name = "LABEL")]
    pub period: Option<String>,

    /// Data year written into the socioeconomic series.
    #[arg(long)]
    pub year: Option<i32>,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    /// Typology FeatureCollection (GeoJSON).
    #[arg(short, long, value_name = "GEOJSON")]
    pub input: PathBuf,

    /// Optional settings file (only `[aliases]` affects resolution).
    #[arg(short, long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Also write `<stem>.columns.txt` next to the input.
    #[arg(long)]
    pub write_columns: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "dvi", "-v", "run", "--input", "udp.geojson", "--preset", "core", "--census", "--top", "5",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.preset, Preset::Core);
        assert!(args.census);
        assert_eq!(args.top, 5);
        assert_eq!(args.out_dir, PathBuf::from("."));
    }
}
