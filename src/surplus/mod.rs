//! Consumer-surplus accumulation given a price elasticity.

pub mod accumulator;
pub mod summary;

pub use accumulator::{LN_DQ_EPS, accumulate, price_contribution, surplus_points};
pub use summary::{SurplusSummary, summarize};
