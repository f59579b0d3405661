//! Reporting utilities: formatted terminal output for fits, diagnostics,
//! surplus series, variant comparisons and the tax simulation.

pub mod format;

pub use format::*;
