//! Mathematical utilities: least squares, t/F tail probabilities, and
//! descriptive statistics.

pub mod distributions;
pub mod ols;
pub mod stats;

pub use distributions::*;
pub use ols::*;
pub use stats::*;
