//! Fixed-amount vs ad-valorem tax simulation.
//!
//! Compares the pump price under the actual per-litre tax with the price a
//! proportional tax at rate `r` would produce on the same pre-tax base:
//!
//! - fixed:      `base_price + fixed_tax`
//! - ad valorem: `base_price × (1 + r / 100)`
//!
//! Volatility is compared through the coefficient of variation of each series.

use serde::Serialize;

use crate::domain::{Observation, Period};
use crate::error::EstimateError;
use crate::math::{coefficient_of_variation, mean, sample_std};

mod contribution;
pub use contribution::*;

/// Simulated prices for one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TaxSimRow {
    pub period: Period,
    pub base_price: f64,
    pub fixed_tax: f64,
    pub fixed_price: f64,
    pub ad_valorem_price: f64,
    /// `ad_valorem_price - fixed_price`.
    pub difference: f64,
}

/// Level and dispersion of one simulated price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesStats {
    pub mean: f64,
    pub std_dev: f64,
    /// Percent.
    pub cv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxSimulation {
    /// Ad-valorem rate in percent.
    pub rate: f64,
    /// Whether `rate` was derived from the mean observed tax rate.
    pub rate_from_data: bool,
    pub rows: Vec<TaxSimRow>,
    pub fixed: SeriesStats,
    pub ad_valorem: SeriesStats,
    /// `ad_valorem.cv - fixed.cv`, in percentage points.
    pub cv_difference: f64,
}

/// Run the simulation over `observations`.
///
/// `rate` overrides the default, which is the mean of the available
/// `tax_rate` values. Rows lacking `base_price` or `fixed_tax` are skipped.
pub fn simulate_tax_regimes(observations: &[Observation], rate: Option<f64>) -> Result<TaxSimulation, EstimateError> {
    let (rate, rate_from_data) = match rate {
        Some(r) => (r, false),
        None => {
            let rates: Vec<f64> = observations.iter().filter_map(|o| o.tax_rate).collect();
            let r = mean(&rates).ok_or_else(|| {
                EstimateError::invalid("no tax_rate values to derive the ad-valorem rate from; pass --rate")
            })?;
            (r, true)
        }
    };
    if !rate.is_finite() || rate <= -100.0 {
        return Err(EstimateError::invalid(format!("ad-valorem rate {rate}% is not usable")));
    }

    let rows: Vec<TaxSimRow> = observations
        .iter()
        .filter_map(|o| {
            let base_price = o.base_price?;
            let fixed_tax = o.fixed_tax?;
            let fixed_price = base_price + fixed_tax;
            let ad_valorem_price = base_price * (1.0 + rate / 100.0);
            Some(TaxSimRow {
                period: o.period,
                base_price,
                fixed_tax,
                fixed_price,
                ad_valorem_price,
                difference: ad_valorem_price - fixed_price,
            })
        })
        .collect();

    if rows.len() < 2 {
        let range = match (rows.first(), rows.last()) {
            (Some(r), _) => format!("with base_price and fixed_tax (only {})", r.period),
            _ => "with base_price and fixed_tax".to_string(),
        };
        return Err(EstimateError::InsufficientData {
            needed: 2,
            found: rows.len(),
            range,
        });
    }

    let fixed_prices: Vec<f64> = rows.iter().map(|r| r.fixed_price).collect();
    let ad_valorem_prices: Vec<f64> = rows.iter().map(|r| r.ad_valorem_price).collect();
    let fixed = series_stats(&fixed_prices)?;
    let ad_valorem = series_stats(&ad_valorem_prices)?;

    tracing::info!(rate, rows = rows.len(), fixed_cv = fixed.cv, ad_valorem_cv = ad_valorem.cv, "tax simulation");

    Ok(TaxSimulation {
        rate,
        rate_from_data,
        rows,
        fixed,
        ad_valorem,
        cv_difference: ad_valorem.cv - fixed.cv,
    })
}

fn series_stats(values: &[f64]) -> Result<SeriesStats, EstimateError> {
    let undefined = || EstimateError::invalid("simulated price series has an undefined mean or spread");
    Ok(SeriesStats {
        mean: mean(values).ok_or_else(undefined)?,
        std_dev: sample_std(values).ok_or_else(undefined)?,
        cv: coefficient_of_variation(values).ok_or_else(undefined)?,
    })
}
