//! Aggregate view of a surplus record series.

use serde::Serialize;

use crate::domain::{Period, SurplusRecord};
use crate::math::{mean, pearson};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurplusSummary {
    pub records: usize,
    pub first_period: Period,
    pub last_period: Period,
    pub mean_increment: f64,
    pub final_cumulative: f64,
    pub max_increment: (Period, f64),
    pub min_increment: (Period, f64),
    pub price_increases: usize,
    pub price_decreases: usize,
    /// Pearson correlation of `delta_p` and `increment`.
    pub price_increment_correlation: Option<f64>,
}

/// Summarize `records`; `None` when there are none.
pub fn summarize(records: &[SurplusRecord]) -> Option<SurplusSummary> {
    let first = records.first()?;
    let last = records.last()?;

    let increments: Vec<f64> = records.iter().map(|r| r.increment).collect();
    let deltas: Vec<f64> = records.iter().map(|r| r.delta_p).collect();

    let mut max = (first.period, first.increment);
    let mut min = (first.period, first.increment);
    for r in &records[1..] {
        if r.increment > max.1 {
            max = (r.period, r.increment);
        }
        if r.increment < min.1 {
            min = (r.period, r.increment);
        }
    }

    Some(SurplusSummary {
        records: records.len(),
        first_period: first.period,
        last_period: last.period,
        mean_increment: mean(&increments)?,
        final_cumulative: last.cumulative,
        max_increment: max,
        min_increment: min,
        price_increases: records.iter().filter(|r| r.delta_p > 0.0).count(),
        price_decreases: records.iter().filter(|r| r.delta_p < 0.0).count(),
        price_increment_correlation: pearson(&deltas, &increments),
    })
}
