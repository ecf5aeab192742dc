//! Predicted vs actual scatter plot using Plotters

use std::path::Path;

use plotters::prelude::*;
use tracing::info;

use crate::model::ModelEvaluation;

pub const DEFAULT_GRAPH_FILE: &str = "gasto_predicho_vs_real.png";

const PLOT_SIZE: (u32, u32) = (1000, 600);

/// Axis range over both series with 5% padding on each side
fn padded_range(actual: &[f64], predicted: &[f64]) -> (f64, f64) {
    let (min, max) = actual
        .iter()
        .chain(predicted)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let padding = if max > min { (max - min) * 0.05 } else { 1.0 };
    (min - padding, max + padding)
}

/// Draw predicted (y) against actual (x) with the perfect-prediction diagonal.
///
/// The diagonal spans the range of the actual values; the title carries R².
///
/// # Arguments
/// * `actual` - Held-out `gasto_total` values
/// * `predicted` - Model predictions, aligned with `actual`
/// * `r2` - Coefficient of determination shown in the title
/// * `output_path` - PNG file to write
///
/// # Returns
/// Result indicating success or failure
pub fn create_prediction_plot(
    actual: &[f64],
    predicted: &[f64],
    r2: f64,
    output_path: &Path,
) -> crate::Result<()> {
    if actual.len() != predicted.len() {
        anyhow::bail!(
            "Actual ({}) and predicted ({}) lengths differ",
            actual.len(),
            predicted.len()
        );
    }
    if actual.is_empty() {
        anyhow::bail!("No held-out predictions to plot");
    }

    let (lo, hi) = padded_range(actual, predicted);
    let diagonal_lo = actual.iter().copied().fold(f64::INFINITY, f64::min);
    let diagonal_hi = actual.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let title = format!("Modelo de Regresión Lineal: Real vs. Predicho (R²: {r2:.4})");

    let root = BitMapBackend::new(output_path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(lo..hi, lo..hi)?;

    chart
        .configure_mesh()
        .x_desc("Gasto Total Real (Y_test)")
        .y_desc("Gasto Total Predicho (Y_pred)")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(
        actual
            .iter()
            .zip(predicted)
            .map(|(&x, &y)| Circle::new((x, y), 4, BLUE.mix(0.7).filled())),
    )?;

    chart
        .draw_series(LineSeries::new(
            [(diagonal_lo, diagonal_lo), (diagonal_hi, diagonal_hi)],
            RED.stroke_width(2),
        ))?
        .label("Predicción perfecta")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!(
        component = "viz",
        event = "plot.written",
        path = %output_path.display(),
        points = actual.len()
    );
    Ok(())
}

/// Plot the held-out predictions of a fitted model
pub fn plot_evaluation(evaluation: &ModelEvaluation, output_path: &Path) -> crate::Result<()> {
    create_prediction_plot(
        &evaluation.actual.to_vec(),
        &evaluation.predicted.to_vec(),
        evaluation.r2,
        output_path,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_padded_range() {
        let (lo, hi) = padded_range(&[10.0, 20.0], &[0.0, 30.0]);
        assert!((lo - -1.5).abs() < 1e-9);
        assert!((hi - 31.5).abs() < 1e-9);

        assert_eq!(padded_range(&[5.0], &[5.0]), (4.0, 6.0));
    }

    #[test]
    fn test_create_prediction_plot() {
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("test_plot.png");

        let result = create_prediction_plot(
            &[100.0, 250.0, 80.0, 40.0],
            &[110.0, 240.0, 70.0, 55.0],
            0.93,
            &output_path,
        );
        assert!(result.is_ok());
        assert!(output_path.exists());
    }

    #[test]
    fn test_plot_rejects_mismatched_lengths() {
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("bad.png");
        assert!(create_prediction_plot(&[1.0, 2.0], &[1.0], 0.5, &output_path).is_err());
        assert!(create_prediction_plot(&[], &[], 0.5, &output_path).is_err());
    }
}
