//! CLI definition using clap

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output format for results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Parser)]
#[command(name = "pickup-planner")]
#[command(version)]
#[command(about = "Donation pickup network route optimizer")]
#[command(long_about = None)]
pub struct Cli {
    /// Path to the site catalog (Site_Table sheet exported as CSV)
    #[arg(long, short = 'i', default_value = "Route_Mapping.csv")]
    pub input: PathBuf,

    /// Optimize a single day only (0=Mon..6=Sun)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=6))]
    pub day: Option<u8>,

    /// Optimize a single depot only (e.g. "wh", "barrie")
    #[arg(long)]
    pub depot: Option<String>,

    /// Solver time limit per sub-problem in seconds
    #[arg(long)]
    pub solver_time: Option<u64>,

    /// Skip live geocoding, use the cache only
    #[arg(long)]
    pub skip_geocode: bool,

    /// Holiday day indices (0=Mon..6=Sun); only profitable sites are
    /// served on these days
    #[arg(long, value_delimiter = ',', value_parser = clap::value_parser!(u8).range(0..=6))]
    pub holidays: Vec<u8>,

    /// Config file path (JSON); defaults are used when omitted
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Write a results workbook to this path
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Output format (json, table)
    #[arg(long, short = 'f', default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
