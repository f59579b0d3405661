//! Collinearity diagnostics: variance inflation factors and the correlation
//! matrix of the transformed variables.
//!
//! Both operate on an already-built [`Design`], so they work even when the main
//! fit is refused as singular (which is exactly when they are most useful).

use nalgebra::{DMatrix, DVector};

use crate::domain::{CorrelationMatrix, ModelConfig, ModelForm, Observation, VifEntry};
use crate::error::EstimateError;
use crate::estimate::design::{Design, build_design};
use crate::math::{centered_sum_of_squares, pearson, solve_least_squares};

/// VIF above which a variable is flagged as collinear.
pub const VIF_THRESHOLD: f64 = 10.0;

/// Auxiliary R² at or above which a variable counts as perfectly explained.
const PERFECT_FIT_R2: f64 = 1.0 - 1e-12;

/// Absolute pairwise correlation above which two regressors are flagged.
pub const CORRELATION_THRESHOLD: f64 = 0.9;

/// VIF for every explanatory column of `design` (intercept excluded).
///
/// Each auxiliary regression uses the intercept plus all other explanatory
/// columns.
pub fn variance_inflation_factors(design: &Design) -> Vec<VifEntry> {
    let labels = design.labels();
    let (n, k) = design.x.shape();

    (1..k)
        .map(|j| {
            let target = design.column(j);
            let others: Vec<usize> = (0..k).filter(|&c| c != j).collect();
            let aux_x = DMatrix::from_fn(n, others.len(), |r, c| design.x[(r, others[c])]);
            let aux_y = DVector::from_column_slice(&target);

            let vif = auxiliary_vif(&aux_x, &aux_y);
            VifEntry {
                variable: labels[j].clone(),
                vif,
                collinear: vif > VIF_THRESHOLD,
            }
        })
        .collect()
}

fn auxiliary_vif(x: &DMatrix<f64>, y: &DVector<f64>) -> f64 {
    let sst = centered_sum_of_squares(y.as_slice());
    if sst <= 0.0 {
        // A constant column is fully explained by the intercept.
        return f64::INFINITY;
    }
    let Some(beta) = solve_least_squares(x, y) else {
        return f64::INFINITY;
    };
    let residuals = y - x * beta;
    let r2 = 1.0 - residuals.dot(&residuals) / sst;
    if r2 >= PERFECT_FIT_R2 {
        f64::INFINITY
    } else {
        1.0 / (1.0 - r2)
    }
}

/// Build the design for `config` and compute VIFs without fitting the model.
pub fn diagnose_collinearity(
    observations: &[Observation],
    config: &ModelConfig,
) -> Result<Vec<VifEntry>, EstimateError> {
    let design = build_design(observations, config)?;
    Ok(variance_inflation_factors(&design))
}

/// Pearson correlations of the regressand and every explanatory column.
pub fn correlation_matrix(design: &Design) -> CorrelationMatrix {
    let quantity_label = match design.form {
        ModelForm::Level => "ln_quantity",
        ModelForm::FirstDifference => "d_ln_quantity",
    };

    let labels = design.labels();
    let mut variables = vec![quantity_label.to_string()];
    let mut series = vec![design.y.as_slice().to_vec()];
    for j in 1..design.x.ncols() {
        variables.push(labels[j].clone());
        series.push(design.column(j));
    }

    let values = series
        .iter()
        .map(|a| series.iter().map(|b| pearson(a, b)).collect())
        .collect();

    CorrelationMatrix { variables, values }
}

/// Regressor pairs whose absolute correlation exceeds [`CORRELATION_THRESHOLD`].
///
/// The regressand (first variable) is not part of any pair.
pub fn strongly_correlated_pairs(matrix: &CorrelationMatrix) -> Vec<(String, String, f64)> {
    let mut out = Vec::new();
    for i in 1..matrix.variables.len() {
        for j in (i + 1)..matrix.variables.len() {
            if let Some(r) = matrix.values[i][j] {
                if r.abs() > CORRELATION_THRESHOLD {
                    out.push((matrix.variables[i].clone(), matrix.variables[j].clone(), r));
                }
            }
        }
    }
    out
}
