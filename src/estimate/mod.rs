//! Log-linear demand estimation.
//!
//! Key idea: every model variant (level or first difference, with or without
//! the tax rate, any set of event indicators) is the same OLS problem over a
//! different design matrix. [`design`] builds that matrix, [`estimator`] fits it
//! and computes inference, [`diagnostics`] checks it for collinearity.

pub mod design;
pub mod diagnostics;
pub mod estimator;

pub use design::{Design, build_design, check_period_order};
pub use diagnostics::{
    CORRELATION_THRESHOLD, VIF_THRESHOLD, correlation_matrix, diagnose_collinearity,
    strongly_correlated_pairs, variance_inflation_factors,
};
pub use estimator::{TOOL_NAME, estimate, estimate_design};
