//! Command-line interface argument parsing.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use tracing::Level;

use crate::aggregate::Metric;
use crate::error::CaseError;
use crate::filter::{CaseFilter, ALL};
use crate::output::WriteFormat;

/// casestats - chart summaries of the vitaldb surgical case export
///
/// Examples:
///   casestats overview --department "General surgery"
///   casestats breakdown --metric ane_type --age 60
///   casestats histogram --age 30 --format json
///   casestats scatter --asa 3 --format parquet --output scatter.parquet
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Case export to read (overrides the config file)
    #[arg(short, long, value_name = "FILE", env = "CASESTATS_DATA", global = true)]
    pub data: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for casestats.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose level, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Patient count, mean surgery time, mean ICU stay and mortality rate
    Overview {
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Category counts within one age group (pie chart data)
    Breakdown {
        #[arg(short, long, value_enum, default_value_t = PieMetric::Mortality)]
        metric: PieMetric,
        /// Age whose ten-year group is summarized
        #[arg(short, long, default_value_t = 0.0)]
        age: f64,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Cases per ten-year age group (bar chart data)
    Histogram {
        /// Age whose group is highlighted
        #[arg(short, long)]
        age: Option<f64>,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Surgery duration against ICU stay for every case
    Scatter {
        /// Only highlight cases of this age group
        #[arg(short, long)]
        age: Option<f64>,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Values available for each filter
    Options {
        #[command(flatten)]
        output: OutputArgs,
    },
}

/// The metrics shown as pie charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum PieMetric {
    Mortality,
    Optype,
    AneType,
}

impl From<PieMetric> for Metric {
    fn from(metric: PieMetric) -> Self {
        match metric {
            PieMetric::Mortality => Metric::Mortality,
            PieMetric::Optype => Metric::Optype,
            PieMetric::AneType => Metric::AneType,
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct FilterArgs {
    /// Department, or "all"
    #[arg(long, default_value = ALL)]
    pub department: String,

    /// ASA score, or "all"
    #[arg(long, default_value = ALL)]
    pub asa: String,

    /// Operation type, or "all"
    #[arg(long, default_value = ALL)]
    pub optype: String,
}

impl FilterArgs {
    pub fn to_filter(&self, age: Option<f64>) -> Result<CaseFilter, CaseError> {
        CaseFilter::from_choices(age, &self.department, &self.asa, &self.optype)
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct OutputArgs {
    /// Output format (defaults to the config file, then table)
    #[arg(short, long, value_enum)]
    pub format: Option<WriteFormat>,

    /// Write to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl Args {
    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    pub fn output(&self) -> &OutputArgs {
        match &self.command {
            Command::Overview { output, .. }
            | Command::Breakdown { output, .. }
            | Command::Histogram { output, .. }
            | Command::Scatter { output, .. }
            | Command::Options { output } => output,
        }
    }
}
