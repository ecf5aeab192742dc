//! Ordinary least squares model of total customer spend

use anyhow::anyhow;
use linfa::prelude::*;
use linfa_linalg::eigh::Eigh;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::frame::column_names;
use crate::schema::{CUSTOMER_ID, TOTAL_SPEND};

pub const DEFAULT_TEST_SIZE: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

/// Eigenvalues of the centered Gram matrix at or below this fraction of the
/// largest one are treated as zero
const RANK_TOLERANCE: f64 = 1e-10;

/// Predictor matrix and target extracted from the feature table
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// Predictors (n_customers, n_features)
    pub features: Array2<f64>,
    /// `gasto_total` per customer
    pub target: Array1<f64>,
    /// Column name of each predictor, in matrix order
    pub feature_names: Vec<String>,
}

impl DesignMatrix {
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }
}

/// Seeded partition of a design matrix
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

/// How the coefficients of a [`LinearFit`] were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Solver {
    /// Least squares through linfa-linear
    Ols,
    /// Minimum-norm least squares through the pseudo-inverse, used when the
    /// training design is rank-deficient
    PseudoInverse,
}

/// Intercept and coefficients of a fitted linear model
#[derive(Debug, Clone)]
pub struct LinearFit {
    pub intercept: f64,
    pub params: Array1<f64>,
    pub solver: Solver,
}

impl LinearFit {
    pub fn predict(&self, features: &Array2<f64>) -> Array1<f64> {
        features.dot(&self.params) + self.intercept
    }
}

/// Fitted model plus its held-out evaluation
#[derive(Debug)]
pub struct ModelEvaluation {
    pub fit: LinearFit,
    /// Predictors the model was fitted on, aligned with `fit.params`
    pub feature_names: Vec<String>,
    /// Predictors left out because they were constant in the training rows
    pub dropped_features: Vec<String>,
    pub mse: f64,
    pub r2: f64,
    /// Held-out targets
    pub actual: Array1<f64>,
    /// Predictions for the held-out rows, aligned with `actual`
    pub predicted: Array1<f64>,
    pub train_rows: usize,
}

impl ModelEvaluation {
    pub fn intercept(&self) -> f64 {
        self.fit.intercept
    }

    /// Coefficient per predictor
    pub fn coefficients(&self) -> Vec<(String, f64)> {
        self.feature_names
            .iter()
            .cloned()
            .zip(self.fit.params.iter().copied())
            .collect()
    }

    /// First `n` (actual, predicted) pairs of the held-out rows
    pub fn preview(&self, n: usize) -> Vec<(f64, f64)> {
        self.actual
            .iter()
            .copied()
            .zip(self.predicted.iter().copied())
            .take(n)
            .collect()
    }
}

fn is_model_input(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Boolean
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Int32
            | DataType::Int64
            | DataType::Float32
            | DataType::Float64
    )
}

fn f64_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    let values = df.column(name)?.cast(&DataType::Float64)?;
    Ok(values
        .as_materialized_series()
        .f64()?
        .into_no_null_iter()
        .collect())
}

/// Select predictors and target from the feature table.
///
/// Predictors are every numeric or boolean column except `id_cliente` and
/// `gasto_total`. Rows with a null predictor or target are dropped.
pub fn design_matrix(frame: &DataFrame) -> crate::Result<DesignMatrix> {
    let feature_names: Vec<String> = frame
        .get_columns()
        .iter()
        .filter(|column| {
            let name = column.name().as_str();
            name != CUSTOMER_ID && name != TOTAL_SPEND && is_model_input(column.dtype())
        })
        .map(|column| column.name().to_string())
        .collect();

    if !column_names(frame).iter().any(|name| name == TOTAL_SPEND) {
        anyhow::bail!("feature table has no {TOTAL_SPEND} column");
    }
    if feature_names.is_empty() {
        anyhow::bail!("feature table has no numeric predictor columns");
    }

    let complete = feature_names
        .iter()
        .map(String::as_str)
        .chain([TOTAL_SPEND])
        .fold(lit(true), |acc, name| acc.and(col(name).is_not_null()));
    let rows = frame.clone().lazy().filter(complete).collect()?;
    let dropped = frame.height() - rows.height();
    if dropped > 0 {
        warn!(
            component = "model",
            event = "rows.dropped",
            rows = dropped,
            reason = "null predictor or target"
        );
    }

    let n_samples = rows.height();
    let mut features = Array2::zeros((n_samples, feature_names.len()));
    for (j, name) in feature_names.iter().enumerate() {
        for (i, value) in f64_column(&rows, name)?.into_iter().enumerate() {
            features[[i, j]] = value;
        }
    }
    let target = Array1::from_vec(f64_column(&rows, TOTAL_SPEND)?);

    Ok(DesignMatrix {
        features,
        target,
        feature_names,
    })
}

/// Shuffle rows with a seeded RNG and hold out `test_size` of them.
///
/// The test part has `ceil(n * test_size)` rows, kept between 1 and n - 1.
pub fn train_test_split(
    matrix: &DesignMatrix,
    test_size: f64,
    seed: u64,
) -> crate::Result<TrainTestSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        anyhow::bail!("Test size must be between 0 and 1 (exclusive), got {test_size}");
    }

    let n_samples = matrix.n_samples();
    if n_samples < 2 {
        anyhow::bail!(
            "Need at least 2 customers to split into train and test sets, got {}",
            n_samples
        );
    }

    let n_test = ((n_samples as f64) * test_size).ceil() as usize;
    let n_test = n_test.clamp(1, n_samples - 1);

    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test_idx, train_idx) = indices.split_at(n_test);

    Ok(TrainTestSplit {
        x_train: matrix.features.select(Axis(0), train_idx),
        y_train: matrix.target.select(Axis(0), train_idx),
        x_test: matrix.features.select(Axis(0), test_idx),
        y_test: matrix.target.select(Axis(0), test_idx),
    })
}

/// Indices of the columns holding a single value
fn constant_columns(features: &Array2<f64>) -> Vec<usize> {
    features
        .axis_iter(Axis(1))
        .enumerate()
        .filter(|(_, column)| {
            let lo = column.fold(f64::INFINITY, |acc, &v| acc.min(v));
            let hi = column.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
            hi - lo <= f64::EPSILON * hi.abs().max(1.0)
        })
        .map(|(j, _)| j)
        .collect()
}

/// Fit `target ~ features` with an intercept.
///
/// Full-rank designs go through linfa-linear. A rank-deficient design (or one
/// linfa rejects) is solved as `pinv(XcᵀXc) Xcᵀ yc` on the centered data, the
/// minimum-norm least-squares solution.
pub fn fit_linear(features: &Array2<f64>, target: &Array1<f64>) -> crate::Result<LinearFit> {
    let x_mean = features
        .mean_axis(Axis(0))
        .ok_or_else(|| anyhow!("cannot fit a model without training rows"))?;
    let y_mean = target
        .mean()
        .ok_or_else(|| anyhow!("cannot fit a model without training rows"))?;

    if features.ncols() == 0 {
        return Ok(LinearFit {
            intercept: y_mean,
            params: Array1::zeros(0),
            solver: Solver::PseudoInverse,
        });
    }

    let centered_x = features - &x_mean;
    let centered_y = target - y_mean;
    let (eigenvalues, eigenvectors) = centered_x.t().dot(&centered_x).eigh()?;
    let largest = eigenvalues.fold(0.0_f64, |acc, &v| acc.max(v));
    let cutoff = largest * RANK_TOLERANCE;

    let full_rank = largest > 0.0 && eigenvalues.iter().all(|&v| v > cutoff);
    if full_rank {
        let train = Dataset::new(features.clone(), target.clone());
        match LinearRegression::new().fit(&train) {
            Ok(model) => {
                return Ok(LinearFit {
                    intercept: model.intercept(),
                    params: model.params().clone(),
                    solver: Solver::Ols,
                })
            }
            Err(err) => warn!(
                component = "model",
                event = "solver.fallback",
                error = %err,
                "least squares failed, using the pseudo-inverse"
            ),
        }
    } else {
        debug!(
            component = "model",
            event = "solver.fallback",
            smallest_eigenvalue = eigenvalues.fold(f64::INFINITY, |acc, &v| acc.min(v)),
            "rank-deficient design, using the pseudo-inverse"
        );
    }

    let projected = eigenvectors.t().dot(&centered_x.t().dot(&centered_y));
    let scaled: Array1<f64> = projected
        .iter()
        .zip(eigenvalues.iter())
        .map(|(&p, &lambda)| if lambda > cutoff { p / lambda } else { 0.0 })
        .collect();
    let params = eigenvectors.dot(&scaled);
    let intercept = y_mean - x_mean.dot(&params);

    Ok(LinearFit {
        intercept,
        params,
        solver: Solver::PseudoInverse,
    })
}

/// Fit OLS on the training part and evaluate on the held-out part.
///
/// Predictors that are constant across the training rows carry no
/// information for the fit; they are dropped and listed in
/// [`ModelEvaluation::dropped_features`].
///
/// # Arguments
/// * `matrix` - Predictors and `gasto_total` per customer
/// * `test_size` - Fraction of customers held out, in (0, 1)
/// * `seed` - Seed of the train/test shuffle
///
/// # Returns
/// The fitted model with MSE and R² on the held-out customers
pub fn fit_and_evaluate(
    matrix: &DesignMatrix,
    test_size: f64,
    seed: u64,
) -> crate::Result<ModelEvaluation> {
    let split = train_test_split(matrix, test_size, seed)?;
    let train_rows = split.x_train.nrows();

    let constant = constant_columns(&split.x_train);
    let kept: Vec<usize> = (0..matrix.feature_names.len())
        .filter(|j| !constant.contains(j))
        .collect();
    let feature_names: Vec<String> = kept
        .iter()
        .map(|&j| matrix.feature_names[j].clone())
        .collect();
    let dropped_features: Vec<String> = constant
        .iter()
        .map(|&j| matrix.feature_names[j].clone())
        .collect();
    if !dropped_features.is_empty() {
        warn!(
            component = "model",
            event = "features.dropped",
            features = ?dropped_features,
            reason = "constant in training rows"
        );
    }

    let x_train = split.x_train.select(Axis(1), &kept);
    let x_test = split.x_test.select(Axis(1), &kept);
    let fit = fit_linear(&x_train, &split.y_train)?;

    let predicted = fit.predict(&x_test);
    let mse = predicted.mean_squared_error(&split.y_test)?;
    let r2 = predicted.r2(&split.y_test)?;

    info!(
        component = "model",
        event = "model.evaluated",
        train_rows,
        test_rows = split.y_test.len(),
        features = feature_names.len(),
        solver = ?fit.solver,
        mse,
        r2
    );

    Ok(ModelEvaluation {
        fit,
        feature_names,
        dropped_features,
        mse,
        r2,
        actual: split.y_test,
        predicted,
        train_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_matrix(n_samples: usize) -> DesignMatrix {
        // gasto_total = 5 + 10 * compras + 2 * productos - 0.1 * antiguedad
        let mut features = Array2::zeros((n_samples, 3));
        let mut target = Array1::zeros(n_samples);
        for i in 0..n_samples {
            let compras = (1 + i % 4) as f64;
            let productos = (1 + (i * 7) % 5) as f64 + compras;
            let antiguedad = ((i * 11) % 60) as f64;
            features[[i, 0]] = compras;
            features[[i, 1]] = productos;
            features[[i, 2]] = antiguedad;
            target[i] = 5.0 + 10.0 * compras + 2.0 * productos - 0.1 * antiguedad;
        }
        DesignMatrix {
            features,
            target,
            feature_names: vec![
                "total_compras".to_string(),
                "total_productos".to_string(),
                "antiguedad_dias".to_string(),
            ],
        }
    }

    #[test]
    fn test_design_matrix_selects_numeric_predictors() {
        let frame = df!(
            "id_cliente" => [1i64, 2, 3],
            "gasto_total" => [10.0, 20.0, 30.0],
            "total_compras" => [1i64, 2, 3],
            "nombre" => ["a", "b", "c"],
            "ciudad_Salta" => [true, false, true]
        )
        .unwrap();

        let matrix = design_matrix(&frame).unwrap();
        assert_eq!(matrix.feature_names, vec!["total_compras", "ciudad_Salta"]);
        assert_eq!(matrix.features.shape(), &[3, 2]);
        assert_eq!(matrix.features[[0, 1]], 1.0);
        assert_eq!(matrix.target.to_vec(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_design_matrix_drops_rows_with_nulls() {
        let frame = df!(
            "id_cliente" => [1i64, 2, 3],
            "gasto_total" => [Some(10.0), None, Some(30.0)],
            "antiguedad_dias" => [Some(5i64), Some(6), None]
        )
        .unwrap();

        let matrix = design_matrix(&frame).unwrap();
        assert_eq!(matrix.n_samples(), 1);
    }

    #[test]
    fn test_design_matrix_requires_target() {
        let frame = df!("id_cliente" => [1i64], "total_compras" => [1i64]).unwrap();
        assert!(design_matrix(&frame).is_err());
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let matrix = create_test_matrix(10);
        let first = train_test_split(&matrix, 0.2, 42).unwrap();
        let second = train_test_split(&matrix, 0.2, 42).unwrap();

        assert_eq!(first.x_train.nrows(), 8);
        assert_eq!(first.x_test.nrows(), 2);
        assert_eq!(first.y_test, second.y_test);
        assert_eq!(first.x_train, second.x_train);
    }

    #[test]
    fn test_split_keeps_one_row_on_each_side() {
        let matrix = create_test_matrix(2);
        let split = train_test_split(&matrix, 0.2, 7).unwrap();
        assert_eq!(split.x_train.nrows(), 1);
        assert_eq!(split.x_test.nrows(), 1);
    }

    #[test]
    fn test_split_rejects_invalid_test_size() {
        let matrix = create_test_matrix(10);
        assert!(train_test_split(&matrix, 0.0, 42).is_err());
        assert!(train_test_split(&matrix, 1.0, 42).is_err());
        assert!(train_test_split(&create_test_matrix(1), 0.2, 42).is_err());
    }

    #[test]
    fn test_fit_recovers_linear_relationship() {
        let matrix = create_test_matrix(40);
        let evaluation = fit_and_evaluate(&matrix, DEFAULT_TEST_SIZE, DEFAULT_SEED).unwrap();

        assert_eq!(evaluation.actual.len(), 8);
        assert_eq!(evaluation.train_rows, 32);
        assert!(evaluation.mse < 1e-6, "mse {}", evaluation.mse);
        assert!(evaluation.r2 > 0.999, "r2 {}", evaluation.r2);
        assert!((evaluation.intercept() - 5.0).abs() < 1e-4);

        let coefficients = evaluation.coefficients();
        assert_eq!(coefficients[0].0, "total_compras");
        assert!((coefficients[0].1 - 10.0).abs() < 1e-4);
        assert_eq!(evaluation.preview(5).len(), 5);
    }

    #[test]
    fn test_fit_with_fewer_rows_than_predictors() {
        let matrix = create_test_matrix(4);
        let evaluation = fit_and_evaluate(&matrix, 0.2, 42).unwrap();

        assert_eq!(evaluation.train_rows, 3);
        assert_eq!(evaluation.fit.solver, Solver::PseudoInverse);
        assert!(evaluation.predicted.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_fit_drops_constant_indicator() {
        let mut matrix = create_test_matrix(10);
        let indicator = Array2::<f64>::zeros((10, 1));
        matrix.features =
            ndarray::concatenate(Axis(1), &[matrix.features.view(), indicator.view()]).unwrap();
        matrix.feature_names.push("ciudad_X".to_string());

        let evaluation = fit_and_evaluate(&matrix, 0.2, 42).unwrap();
        assert_eq!(evaluation.dropped_features, vec!["ciudad_X"]);
        assert_eq!(evaluation.feature_names.len(), 3);
        assert_eq!(evaluation.fit.params.len(), 3);
        assert_eq!(evaluation.fit.solver, Solver::Ols);
        assert!(evaluation.mse < 1e-6, "mse {}", evaluation.mse);
    }

    #[test]
    fn test_fit_collinear_predictors_uses_minimum_norm_solution() {
        // every purchase is a single unit: productos == compras
        let n_samples = 20;
        let mut features = Array2::zeros((n_samples, 3));
        let mut target = Array1::zeros(n_samples);
        for i in 0..n_samples {
            let compras = (1 + i % 4) as f64;
            let antiguedad = ((i * 11) % 60) as f64;
            features[[i, 0]] = compras;
            features[[i, 1]] = compras;
            features[[i, 2]] = antiguedad;
            target[i] = 3.0 + 2.0 * compras + 0.5 * antiguedad;
        }
        let matrix = DesignMatrix {
            features,
            target,
            feature_names: vec![
                "total_compras".to_string(),
                "total_productos".to_string(),
                "antiguedad_dias".to_string(),
            ],
        };

        let evaluation = fit_and_evaluate(&matrix, 0.2, 42).unwrap();
        assert_eq!(evaluation.fit.solver, Solver::PseudoInverse);
        assert!(evaluation.dropped_features.is_empty());
        assert!(evaluation.mse < 1e-6, "mse {}", evaluation.mse);

        let coefficients = evaluation.coefficients();
        assert!((coefficients[0].1 - 1.0).abs() < 1e-6);
        assert!((coefficients[1].1 - 1.0).abs() < 1e-6);
        assert!((coefficients[2].1 - 0.5).abs() < 1e-6);
        assert!((evaluation.intercept() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_fit_linear_full_rank_uses_ols() {
        let matrix = create_test_matrix(12);
        let fit = fit_linear(&matrix.features, &matrix.target).unwrap();

        assert_eq!(fit.solver, Solver::Ols);
        assert!((fit.intercept - 5.0).abs() < 1e-6);
        let predicted = fit.predict(&matrix.features);
        for (p, y) in predicted.iter().zip(matrix.target.iter()) {
            assert!((p - y).abs() < 1e-6);
        }
    }
}
