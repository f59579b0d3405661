//! Least squares solvers.
//!
//! Two entry points:
//!
//! - [`solve_least_squares`]: a tolerant SVD solve returning only the
//!   coefficients. Rank-deficient systems get the minimum-norm solution, which
//!   is what the auxiliary regressions of the VIF diagnostic want.
//! - [`fit_ols`]: the full ordinary least squares fit used by the estimator. It
//!   refuses rank-deficient designs and returns everything inference needs
//!   (residuals, SSE and `(XᵀX)⁻¹`).
//!
//! Implementation choices:
//! - SVD rather than the normal equations: no squaring of the condition number.
//! - `(XᵀX)⁻¹ = V Σ⁻² Vᵀ` comes straight from the same decomposition.
//! - Nalgebra's `QR::solve` is intended for square systems, so we stay on SVD
//!   for the tall designs we always have.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// A full-rank OLS fit.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub beta: DVector<f64>,
    pub residuals: DVector<f64>,
    /// Sum of squared residuals.
    pub sse: f64,
    /// `(XᵀX)⁻¹`, scaled by σ² to obtain the coefficient covariance.
    pub xtx_inv: DMatrix<f64>,
}

/// Why [`fit_ols`] refused a design.
#[derive(Debug, Clone, PartialEq)]
pub enum OlsFailure {
    /// Numerical rank below the column count.
    RankDeficient { rank: usize, columns: usize },
    /// The SVD did not produce usable factors.
    Decomposition(String),
}

/// Relative singular-value floor below which a direction counts as null.
const RANK_RTOL: f64 = 1e-12;

/// Numerical rank from singular values.
///
/// Threshold: `σ_max · max(max(n, p) · ε, RANK_RTOL)`. Exact collinearity
/// computed through `ln` carries rounding noise well above `ε`, hence the floor.
pub fn numerical_rank(singular_values: &DVector<f64>, rows: usize, cols: usize) -> usize {
    let s_max = singular_values.iter().copied().fold(0.0_f64, f64::max);
    if s_max <= 0.0 || !s_max.is_finite() {
        return 0;
    }
    let tol = s_max * (rows.max(cols) as f64 * f64::EPSILON).max(RANK_RTOL);
    singular_values.iter().filter(|&&s| s > tol).count()
}

/// Ordinary least squares on a full-column-rank design.
pub fn fit_ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsFit, OlsFailure> {
    let (n, p) = x.shape();
    let svd = x.clone().svd(true, true);

    let rank = numerical_rank(&svd.singular_values, n, p);
    if rank < p {
        return Err(OlsFailure::RankDeficient { rank, columns: p });
    }

    let v_t = svd
        .v_t
        .as_ref()
        .ok_or_else(|| OlsFailure::Decomposition("SVD did not compute Vᵀ".to_string()))?;

    let s_min = svd.singular_values.iter().copied().fold(f64::INFINITY, f64::min);
    let beta = svd
        .solve(y, s_min * 0.5)
        .map_err(|e| OlsFailure::Decomposition(e.to_string()))?;
    if beta.iter().any(|v| !v.is_finite()) {
        return Err(OlsFailure::Decomposition(
            "non-finite coefficient in least squares solution".to_string(),
        ));
    }

    let inv_sq = DVector::from_iterator(p, svd.singular_values.iter().map(|s| 1.0 / (s * s)));
    let v = v_t.transpose();
    let xtx_inv = &v * DMatrix::from_diagonal(&inv_sq) * v_t;

    let residuals = y - x * &beta;
    let sse = residuals.dot(&residuals);

    Ok(OlsFit {
        beta,
        residuals,
        sse,
        xtx_inv,
    })
}
