//! End-to-end pipeline: clean → join → filter → aggregate → features → model → plot

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use tracing::info;

use crate::data::{load_source_tables, SourceTables};
use crate::features::{aggregate_customers, build_customer_features, CustomerFeatures};
use crate::join::{drop_incomplete_rows, join_sources, ResolvedCollision};
use crate::model::{design_matrix, fit_and_evaluate, ModelEvaluation, DEFAULT_SEED, DEFAULT_TEST_SIZE};
use crate::viz::{plot_evaluation, DEFAULT_GRAPH_FILE};

/// Everything a run needs to know
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub graph_file: String,
    /// Date `antiguedad_dias` is measured against
    pub reference_date: NaiveDate,
    pub test_size: f64,
    pub seed: u64,
}

impl PipelineConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            graph_file: DEFAULT_GRAPH_FILE.to_string(),
            reference_date: Local::now().date_naive(),
            test_size: DEFAULT_TEST_SIZE,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_reference_date(mut self, reference_date: NaiveDate) -> Self {
        self.reference_date = reference_date;
        self
    }

    pub fn graph_path(&self) -> PathBuf {
        self.output_dir.join(&self.graph_file)
    }
}

/// Row counts at each stage of feature preparation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub line_items: usize,
    pub joined_rows: usize,
    pub filtered_rows: usize,
    pub customers: usize,
    pub collisions: Vec<ResolvedCollision>,
}

/// Output of the cleaning and feature stages
#[derive(Debug, Clone)]
pub struct PreparedFeatures {
    pub features: CustomerFeatures,
    pub summary: PipelineSummary,
}

/// Result of a full run
#[derive(Debug)]
pub struct PipelineReport {
    pub summary: PipelineSummary,
    pub evaluation: ModelEvaluation,
    pub graph_path: PathBuf,
}

/// Clean the raw tables and build one feature row per customer
pub fn prepare_features(
    raw: SourceTables,
    reference_date: NaiveDate,
) -> crate::Result<PreparedFeatures> {
    let tables = raw.clean().context("cleaning source tables")?;

    let joined = join_sources(&tables).context("joining source tables")?;
    let joined_rows = joined.frame.height();

    let filtered = drop_incomplete_rows(joined.frame).context("filtering incomplete rows")?;
    let filtered_rows = filtered.height();

    let aggregates = aggregate_customers(filtered).context("aggregating per customer")?;
    let features = build_customer_features(aggregates, &tables.customers, reference_date)
        .context("building customer features")?;

    let summary = PipelineSummary {
        line_items: tables.line_items.height(),
        joined_rows,
        filtered_rows,
        customers: features.frame.height(),
        collisions: joined.collisions,
    };
    Ok(PreparedFeatures { features, summary })
}

/// Load, prepare, fit, evaluate and plot
pub fn run_pipeline(config: &PipelineConfig) -> crate::Result<PipelineReport> {
    let raw = load_source_tables(&config.input_dir)?;
    run_with_tables(raw, config)
}

/// Everything after loading; split out so callers can handle load errors
/// themselves
pub fn run_with_tables(raw: SourceTables, config: &PipelineConfig) -> crate::Result<PipelineReport> {
    let prepared = prepare_features(raw, config.reference_date)?;

    let matrix = design_matrix(&prepared.features.frame)?;
    let evaluation = fit_and_evaluate(&matrix, config.test_size, config.seed)
        .context("fitting linear regression")?;

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("creating output directory {}", config.output_dir.display())
    })?;
    let graph_path = config.graph_path();
    plot_evaluation(&evaluation, &graph_path).context("rendering prediction plot")?;

    info!(
        component = "pipeline",
        event = "app.complete",
        customers = prepared.summary.customers,
        mse = evaluation.mse,
        r2 = evaluation.r2
    );

    Ok(PipelineReport {
        summary: prepared.summary,
        evaluation,
        graph_path,
    })
}
