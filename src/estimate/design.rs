//! Design matrix construction.
//!
//! Turns validated observations into `(y, X)` for a given [`ModelConfig`]:
//!
//! 1. log-transform quantity, the chosen price, income and (optionally) the tax rate
//! 2. for first-difference models, difference the logged series (dropping the
//!    first period, which has no predecessor)
//! 3. prepend the constant column and append event indicators as-is
//!
//! Any non-positive or missing required value aborts with `InvalidInput`
//! before a single coefficient is computed.

use nalgebra::{DMatrix, DVector};

use crate::domain::{ModelConfig, ModelForm, Observation, Period, PeriodRange, PriceSeries, Regressor};
use crate::error::{EstimateError, MIN_REGRESSION_ROWS};

/// Regression inputs for one model configuration.
#[derive(Debug, Clone)]
pub struct Design {
    pub form: ModelForm,
    pub regressors: Vec<Regressor>,
    /// Periods of the rows that entered the design (after differencing).
    pub periods: Vec<Period>,
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
}

impl Design {
    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn labels(&self) -> Vec<String> {
        self.regressors.iter().map(|r| r.label(self.form)).collect()
    }

    pub fn sample_range(&self) -> Option<PeriodRange> {
        PeriodRange::spanning(&self.periods)
    }

    /// Column `j` as an owned vector.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.x.column(j).iter().copied().collect()
    }
}

/// Logged values of one observation, in regressor order (excluding intercept).
struct LoggedRow {
    period: Period,
    ln_q: f64,
    logged: Vec<f64>,
    events: Vec<f64>,
}

/// Ensure periods are strictly increasing and of one granularity.
pub fn check_period_order(observations: &[Observation]) -> Result<(), EstimateError> {
    for pair in observations.windows(2) {
        let (prev, curr) = (pair[0].period, pair[1].period);
        if prev.granularity() != curr.granularity() {
            return Err(EstimateError::invalid(format!(
                "mixed period granularity: {prev} followed by {curr}"
            )));
        }
        if curr <= prev {
            return Err(EstimateError::invalid(format!(
                "periods must be strictly increasing: {prev} followed by {curr}"
            )));
        }
    }
    Ok(())
}

/// Build the design for `config` from `observations`.
pub fn build_design(observations: &[Observation], config: &ModelConfig) -> Result<Design, EstimateError> {
    check_period_order(observations)?;

    let logged = observations
        .iter()
        .map(|o| log_row(o, config))
        .collect::<Result<Vec<_>, _>>()?;

    let rows: Vec<(Period, f64, Vec<f64>)> = match config.form {
        ModelForm::Level => logged
            .into_iter()
            .map(|r| {
                let mut values = r.logged;
                values.extend(r.events);
                (r.period, r.ln_q, values)
            })
            .collect(),
        ModelForm::FirstDifference => logged
            .windows(2)
            .map(|pair| {
                let (prev, curr) = (&pair[0], &pair[1]);
                let mut values: Vec<f64> = curr
                    .logged
                    .iter()
                    .zip(&prev.logged)
                    .map(|(c, p)| c - p)
                    .collect();
                values.extend(curr.events.iter().copied());
                (curr.period, curr.ln_q - prev.ln_q, values)
            })
            .collect(),
    };

    if rows.len() < MIN_REGRESSION_ROWS {
        let range = match (observations.first(), observations.last()) {
            (Some(first), Some(last)) => format!(
                "after filtering for periods {}..{} ({} form)",
                first.period,
                last.period,
                config.form.display_name()
            ),
            _ => "(no observations after filtering)".to_string(),
        };
        return Err(EstimateError::InsufficientData {
            needed: MIN_REGRESSION_ROWS,
            found: rows.len(),
            range,
        });
    }

    let regressors = config.regressors();
    let k = regressors.len();
    let n = rows.len();

    let mut x = DMatrix::<f64>::zeros(n, k);
    let mut y = DVector::<f64>::zeros(n);
    let mut periods = Vec::with_capacity(n);

    for (i, (period, yi, values)) in rows.into_iter().enumerate() {
        x[(i, 0)] = 1.0;
        for (j, v) in values.into_iter().enumerate() {
            x[(i, j + 1)] = v;
        }
        y[i] = yi;
        periods.push(period);
    }

    Ok(Design {
        form: config.form,
        regressors,
        periods,
        x,
        y,
    })
}

fn log_row(o: &Observation, config: &ModelConfig) -> Result<LoggedRow, EstimateError> {
    let ln_q = ln_positive(Some(o.quantity), "quantity", o.period)?;

    let price_name = match config.price_series {
        PriceSeries::Nominal => "price",
        PriceSeries::Relative => "relative_price",
    };

    let mut logged = vec![
        ln_positive(Some(o.income), "income", o.period)?,
        ln_positive(o.price_for(config.price_series), price_name, o.period)?,
    ];
    if config.include_tax {
        logged.push(ln_positive(o.tax_rate, "tax_rate", o.period)?);
    }

    let events = config
        .events
        .iter()
        .map(|name| {
            o.event_value(name).ok_or_else(|| {
                EstimateError::invalid(format!(
                    "missing event indicator `{name}` for period {}",
                    o.period
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LoggedRow {
        period: o.period,
        ln_q,
        logged,
        events,
    })
}

fn ln_positive(value: Option<f64>, name: &str, period: Period) -> Result<f64, EstimateError> {
    match value {
        None => Err(EstimateError::invalid(format!(
            "missing `{name}` for period {period}"
        ))),
        Some(v) if !v.is_finite() || v <= 0.0 => Err(EstimateError::invalid(format!(
            "`{name}` must be finite and > 0 for log transform (period {period}, value {v})"
        ))),
        Some(v) => Ok(v.ln()),
    }
}
