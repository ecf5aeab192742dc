//! SpendForge: a Rust CLI that predicts total customer spend
//!
//! This library cleans and joins sales line items, sales headers, customers
//! and products, derives one feature row per customer and fits an ordinary
//! least squares model of `gasto_total`.

pub mod clean;
pub mod cli;
pub mod data;
pub mod features;
pub mod frame;
pub mod join;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod schema;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_source_tables, LoadError, SourceTables, TableKind};
pub use features::{aggregate_customers, build_customer_features, one_hot_encode, CustomerFeatures};
pub use join::{drop_incomplete_rows, join_sources, JoinedTable, ResolvedCollision};
pub use model::{
    design_matrix, fit_and_evaluate, fit_linear, DesignMatrix, LinearFit, ModelEvaluation, Solver,
};
pub use observability::{init_logging, LogFormat, LoggingConfig, LoggingInitError};
pub use pipeline::{
    prepare_features, run_pipeline, run_with_tables, PipelineConfig, PipelineReport,
    PipelineSummary, PreparedFeatures,
};
pub use viz::create_prediction_plot;

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
