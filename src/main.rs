//! SpendForge: customer spend regression CLI
//!
//! This is the main entrypoint that orchestrates data loading, cleaning,
//! feature construction, model fitting, evaluation and the prediction plot.

use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use spendforge::observability::log_pipeline_start;
use spendforge::{
    init_logging, load_source_tables, run_with_tables, Args, LoadError, PipelineConfig,
    PipelineReport, Solver,
};
use tracing::error;

/// Number of held-out predictions echoed to the console
const PREVIEW_ROWS: usize = 5;

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args.logging_config())?;

    let config = args.pipeline_config()?;
    log_pipeline_start(&config);

    let start_time = Instant::now();

    println!("=== 1. Loading data ===");
    let raw = match load_source_tables(&config.input_dir) {
        Ok(raw) => raw,
        Err(LoadError::MissingInput { table, path }) => {
            error!(
                component = "loader",
                event = "input.missing",
                table = %table,
                path = %path.display(),
                "input file not found, aborting"
            );
            eprintln!("Error loading files: missing {}", path.display());
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };

    println!("=== 2-3. Cleaning, joining and feature engineering ===");
    let report = run_with_tables(raw, &config)?;

    print_report(&report, &config);
    println!(
        "\nTotal processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &PipelineReport, config: &PipelineConfig) {
    let summary = &report.summary;
    let evaluation = &report.evaluation;

    println!("✓ Line items: {}", summary.line_items);
    println!(
        "✓ Joined rows: {} ({} complete)",
        summary.joined_rows, summary.filtered_rows
    );
    println!("✓ Customers: {}", summary.customers);
    for collision in &summary.collisions {
        println!("  Collision resolved: {}", collision);
    }
    println!("  Reference date: {}", config.reference_date);

    println!("\n=== 4. Linear regression ===");
    println!(
        "Train rows: {}, test rows: {}",
        evaluation.train_rows,
        evaluation.actual.len()
    );
    println!("  Intercept: {:.4}", evaluation.intercept());
    for (name, coefficient) in evaluation.coefficients() {
        println!("  {:<24} {:>12.4}", name, coefficient);
    }
    for name in &evaluation.dropped_features {
        println!("  {:<24} {:>12}", name, "constant, dropped");
    }
    if evaluation.fit.solver == Solver::PseudoInverse {
        println!("  Training design is rank-deficient; minimum-norm solution used");
    }

    println!("\n=== 5. Evaluation ===");
    println!("Linear regression metrics (total spend per customer):");
    println!("  Mean squared error (MSE): {:.2}", evaluation.mse);
    println!("  Coefficient of determination (R²): {:.4}", evaluation.r2);

    println!("\n=== 6. Visualization ===");
    println!("Plot saved to: {}", report.graph_path.display());

    println!("\n=== 7. Predictions ===");
    println!("First {} predictions vs. actual:", PREVIEW_ROWS);
    println!("  {:>12} | {:>12}", "Actual", "Predicted");
    println!("  {:->12}-+-{:->12}", "", "");
    for (actual, predicted) in evaluation.preview(PREVIEW_ROWS) {
        println!("  {:>12.2} | {:>12.2}", actual, predicted);
    }
}
