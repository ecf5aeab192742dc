//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::Parser;

use crate::model::{DEFAULT_SEED, DEFAULT_TEST_SIZE};
use crate::observability::{LogFormat, LoggingConfig};
use crate::pipeline::PipelineConfig;
use crate::viz::DEFAULT_GRAPH_FILE;

/// Predict total customer spend with a linear regression over cleaned sales data
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding detalle_ventas.csv, ventas.csv, clientes.csv and productos.csv
    #[arg(short, long, default_value = "data")]
    pub input_dir: PathBuf,

    /// Directory the prediction plot is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// File name of the prediction plot
    #[arg(short, long, default_value = DEFAULT_GRAPH_FILE)]
    pub graph_file: String,

    /// Date customer tenure is measured against (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub reference_date: Option<NaiveDate>,

    /// Fraction of customers held out for evaluation
    #[arg(long, default_value_t = DEFAULT_TEST_SIZE)]
    pub test_size: f64,

    /// Seed for the train/test shuffle
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Validate the arguments and build the pipeline configuration
    pub fn pipeline_config(&self) -> crate::Result<PipelineConfig> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            anyhow::bail!("Test size must be between 0 and 1 (exclusive), got {}", self.test_size);
        }
        if self.graph_file.trim().is_empty() {
            anyhow::bail!("Graph file name must not be empty");
        }

        Ok(PipelineConfig {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            graph_file: self.graph_file.clone(),
            reference_date: self
                .reference_date
                .unwrap_or_else(|| Local::now().date_naive()),
            test_size: self.test_size,
            seed: self.seed,
        })
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_flags(self.verbose, self.log_format)
    }
}
