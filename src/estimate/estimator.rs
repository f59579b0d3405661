//! The elasticity estimator.
//!
//! `ln Q = C + α ln I + β ln P (+ γ ln T) (+ Σ δ_k D_k) + ε`, fitted by OLS in
//! level or first-difference form, with classical (homoskedastic) inference.

use chrono::Utc;

use crate::domain::{Coefficient, FitStatistics, FittedModel, ModelConfig, Observation};
use crate::error::EstimateError;
use crate::estimate::design::{Design, build_design};
use crate::estimate::diagnostics::{
    correlation_matrix, strongly_correlated_pairs, variance_inflation_factors,
};
use crate::math::{OlsFailure, centered_sum_of_squares, f_upper_tail_p, fit_ols, student_t_two_sided_p};

/// Name recorded in every [`FittedModel`].
pub const TOOL_NAME: &str = concat!("gasdemand ", env!("CARGO_PKG_VERSION"));

/// Relative size below which the total sum of squares counts as zero.
const SST_TOLERANCE: f64 = 1e-12;

/// Fit one model configuration to `observations`.
///
/// Observations must be in strictly increasing period order.
pub fn estimate(observations: &[Observation], config: &ModelConfig) -> Result<FittedModel, EstimateError> {
    let design = build_design(observations, config)?;
    estimate_design(&design, config)
}

/// Fit an already-built design.
pub fn estimate_design(design: &Design, config: &ModelConfig) -> Result<FittedModel, EstimateError> {
    let (n, k) = design.x.shape();
    let labels = design.labels();

    if n <= k {
        return Err(EstimateError::InsufficientData {
            needed: k + 1,
            found: n,
            range: format!("for {k} regressors"),
        });
    }

    let fit = fit_ols(&design.x, &design.y).map_err(|failure| singular_design(design, failure))?;

    let df_resid = n - k;
    let df_model = k - 1;
    let sigma2 = fit.sse / df_resid as f64;

    let coefficients: Vec<Coefficient> = design
        .regressors
        .iter()
        .enumerate()
        .map(|(j, regressor)| {
            let estimate = fit.beta[j];
            let std_error = (sigma2 * fit.xtx_inv[(j, j)]).max(0.0).sqrt();
            let t_stat = t_statistic(estimate, std_error);
            Coefficient {
                regressor: regressor.clone(),
                name: labels[j].clone(),
                estimate,
                std_error,
                t_stat,
                p_value: student_t_two_sided_p(t_stat, df_resid as f64),
            }
        })
        .collect();

    // A constant regressand leaves only rounding noise in SST.
    let sst = centered_sum_of_squares(design.y.as_slice());
    let sst = if sst <= SST_TOLERANCE * design.y.norm_squared() { 0.0 } else { sst };
    let r_squared = if sst > 0.0 { 1.0 - fit.sse / sst } else { 0.0 };
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (n as f64 - 1.0) / df_resid as f64;

    let f_statistic = if df_model == 0 || sst <= 0.0 {
        f64::NAN
    } else if fit.sse <= 0.0 {
        f64::INFINITY
    } else {
        ((sst - fit.sse) / df_model as f64) / (fit.sse / df_resid as f64)
    };
    let f_p_value = if f_statistic.is_nan() {
        f64::NAN
    } else {
        f_upper_tail_p(f_statistic, df_model as f64, df_resid as f64)
    };

    let stats = FitStatistics {
        n_obs: n,
        df_model,
        df_resid,
        sse: fit.sse,
        r_squared,
        adj_r_squared,
        f_statistic,
        f_p_value,
    };

    let (vif, correlations) = if config.compute_vif {
        let vif = variance_inflation_factors(design);
        for entry in vif.iter().filter(|v| v.collinear) {
            tracing::warn!(variable = %entry.variable, vif = entry.vif, "high variance inflation factor");
        }
        let correlations = correlation_matrix(design);
        for (a, b, r) in strongly_correlated_pairs(&correlations) {
            tracing::warn!(%a, %b, r, "strongly correlated regressors");
        }
        (Some(vif), Some(correlations))
    } else {
        (None, None)
    };

    let sample_range = design.sample_range().ok_or_else(|| {
        EstimateError::InsufficientData {
            needed: k + 1,
            found: 0,
            range: "(empty design)".to_string(),
        }
    })?;

    tracing::info!(
        model = %config.label(),
        n_obs = n,
        range = %sample_range,
        r_squared,
        "fitted elasticity model"
    );

    Ok(FittedModel {
        tool: TOOL_NAME.to_string(),
        generated_at: Utc::now(),
        config: config.clone(),
        sample_range,
        coefficients,
        stats,
        vif,
        correlations,
    })
}

fn t_statistic(estimate: f64, std_error: f64) -> f64 {
    if std_error > 0.0 {
        estimate / std_error
    } else if estimate == 0.0 {
        0.0
    } else {
        f64::INFINITY.copysign(estimate)
    }
}

fn singular_design(design: &Design, failure: OlsFailure) -> EstimateError {
    match failure {
        OlsFailure::RankDeficient { rank, columns } => {
            let labels = design.labels();
            let constant: Vec<&str> = (1..design.x.ncols())
                .filter(|&j| centered_sum_of_squares(&design.column(j)) <= 0.0)
                .map(|j| labels[j].as_str())
                .collect();

            let detail = if constant.is_empty() {
                format!("regressors [{}] are linearly dependent", labels[1..].join(", "))
            } else {
                format!(
                    "regressors without variation (collinear with const): {}",
                    constant.join(", ")
                )
            };
            EstimateError::SingularDesign(format!("rank {rank} < {columns} columns; {detail}"))
        }
        OlsFailure::Decomposition(message) => EstimateError::SingularDesign(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModelForm, Period, PriceSeries, Regressor};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    const C: f64 = 2.5;
    const ALPHA: f64 = 0.8;
    const BETA: f64 = -0.35;

    /// `ln Q = C + α ln I + β ln P + noise`.
    fn synthetic(n: usize, noise: impl Fn(usize) -> f64) -> Vec<Observation> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                let income = 1_000.0 * (1.0 + 0.02 * t) * (1.0 + 0.05 * (t * 0.9).sin());
                let price = 1.2 + 0.3 * (t * 0.45).cos() + 0.01 * t;
                let ln_q = C + ALPHA * income.ln() + BETA * price.ln() + noise(i);
                Observation::new(Period::Year(1990 + i as i32), ln_q.exp(), price, income)
                    .with_tax_rate(25.0 + 3.0 * (t * 1.7).sin())
            })
            .collect()
    }

    fn no_tax() -> ModelConfig {
        ModelConfig {
            include_tax: false,
            ..ModelConfig::default()
        }
    }

    #[test]
    fn noise_free_data_recovers_coefficients() {
        let obs = synthetic(20, |_| 0.0);
        let model = estimate(&obs, &no_tax()).unwrap();

        assert!((model.intercept() - C).abs() < 1e-9, "{}", model.intercept());
        assert!((model.income_elasticity() - ALPHA).abs() < 1e-9);
        assert!((model.price_elasticity() - BETA).abs() < 1e-9);
        assert!((model.stats.r_squared - 1.0).abs() < 1e-9);
        assert_eq!(model.stats.n_obs, 20);
        assert_eq!(model.stats.df_resid, 17);
        assert_eq!(model.tax_elasticity(), None);
        assert_eq!(model.sample_range.first, Period::Year(1990));
        assert_eq!(model.sample_range.last, Period::Year(2009));
    }

    #[test]
    fn noisy_data_gives_sensible_inference() {
        let mut rng = StdRng::seed_from_u64(7);
        let normal = Normal::new(0.0, 0.01).unwrap();
        let draws: Vec<f64> = (0..40).map(|_| normal.sample(&mut rng)).collect();
        let obs = synthetic(40, |i| draws[i]);

        let model = estimate(&obs, &no_tax()).unwrap();
        let price = model.coefficient(&Regressor::Price).unwrap();

        assert!((price.estimate - BETA).abs() < 0.1, "beta={}", price.estimate);
        assert!(price.std_error > 0.0);
        assert!((price.t_stat - price.estimate / price.std_error).abs() < 1e-12);
        assert!(price.p_value < 0.05);
        assert!(model.stats.r_squared > 0.9 && model.stats.r_squared < 1.0);
        assert!(model.stats.adj_r_squared < model.stats.r_squared);
        assert!(model.stats.f_statistic > 0.0);
        assert!(model.stats.f_p_value < 1e-6);
        for c in &model.coefficients {
            assert!((0.0..=1.0).contains(&c.p_value));
        }
    }

    #[test]
    fn first_difference_uses_one_fewer_row() {
        let obs = synthetic(20, |_| 0.0);
        let config = ModelConfig {
            form: ModelForm::FirstDifference,
            ..no_tax()
        };
        let model = estimate(&obs, &config).unwrap();

        assert_eq!(model.stats.n_obs, 19);
        assert_eq!(model.sample_range.first, Period::Year(1991));
        assert_eq!(model.coefficients[2].name, "d_ln_price");
        // Differencing removes the intercept; slopes are unchanged.
        assert!((model.price_elasticity() - BETA).abs() < 1e-8);
        assert!(model.intercept().abs() < 1e-8);
    }

    #[test]
    fn negative_income_is_rejected_before_fitting() {
        let mut obs = synthetic(20, |_| 0.0);
        obs[4].income = -1.0;
        let err = estimate(&obs, &no_tax()).unwrap_err();
        assert!(matches!(err, EstimateError::InvalidInput(ref m) if m.contains("income") && m.contains("1994")));
    }

    #[test]
    fn nine_rows_is_insufficient() {
        let obs = synthetic(9, |_| 0.0);
        let err = estimate(&obs, &no_tax()).unwrap_err();
        match err {
            EstimateError::InsufficientData { needed, found, range } => {
                assert_eq!((needed, found), (10, 9));
                assert!(range.contains("1990..1998"), "{range}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn constant_event_column_is_singular() {
        let obs: Vec<Observation> = synthetic(15, |_| 0.0)
            .into_iter()
            .map(|o| o.with_event("ALWAYS", true))
            .collect();
        let config = ModelConfig {
            events: vec!["ALWAYS".to_string()],
            ..no_tax()
        };
        let err = estimate(&obs, &config).unwrap_err();
        assert!(matches!(err, EstimateError::SingularDesign(ref m) if m.contains("ALWAYS")), "{err}");
    }

    #[test]
    fn duplicate_regressor_is_singular() {
        // Tax rate identical to price makes two design columns equal.
        let obs: Vec<Observation> = synthetic(15, |_| 0.0)
            .into_iter()
            .map(|o| {
                let price = o.price;
                o.with_tax_rate(price)
            })
            .collect();
        let err = estimate(&obs, &ModelConfig::default()).unwrap_err();
        assert!(matches!(err, EstimateError::SingularDesign(_)), "{err}");
    }

    #[test]
    fn vif_and_correlations_attached_on_request() {
        let obs = synthetic(20, |i| 0.001 * (i as f64 * 2.3).sin());
        let config = ModelConfig {
            compute_vif: true,
            ..ModelConfig::default()
        };
        let model = estimate(&obs, &config).unwrap();

        let vif = model.vif.as_ref().unwrap();
        assert_eq!(vif.len(), 3);
        assert!(vif.iter().all(|v| v.vif >= 1.0));
        let corr = model.correlations.as_ref().unwrap();
        assert_eq!(corr.variables.len(), 4);
    }

    #[test]
    fn constant_quantity_has_zero_r_squared_and_no_f() {
        let obs: Vec<Observation> = synthetic(15, |_| 0.0)
            .into_iter()
            .map(|mut o| {
                o.quantity = 42.0;
                o
            })
            .collect();
        let model = estimate(&obs, &no_tax()).unwrap();

        assert_eq!(model.stats.r_squared, 0.0);
        assert!(model.stats.f_statistic.is_nan());
        assert!(model.stats.f_p_value.is_nan());
    }

    #[test]
    fn relative_price_series_drives_the_price_column() {
        let obs: Vec<Observation> = (0..16)
            .map(|i| {
                let t = i as f64;
                let income = 800.0 * (1.0 + 0.03 * t) * (1.0 + 0.04 * (t * 1.3).sin());
                let cpi = 0.9 + 0.02 * t;
                let price = 1.5 + 0.4 * (t * 0.7).cos() + 0.02 * t;
                let relative = price / cpi;
                let ln_q = C + ALPHA * income.ln() + BETA * relative.ln();
                Observation::new(Period::Year(2000 + i), ln_q.exp(), price, income).with_relative_price(relative)
            })
            .collect();
        let config = ModelConfig {
            price_series: PriceSeries::Relative,
            ..no_tax()
        };
        let model = estimate(&obs, &config).unwrap();

        assert!((model.price_elasticity() - BETA).abs() < 1e-9);
        assert!((model.income_elasticity() - ALPHA).abs() < 1e-9);
    }

    #[test]
    fn exact_zero_estimate_with_zero_error_has_zero_t() {
        assert_eq!(t_statistic(0.0, 0.0), 0.0);
        assert_eq!(t_statistic(-2.0, 0.0), f64::NEG_INFINITY);
        assert_eq!(t_statistic(3.0, 1.5), 2.0);
    }
}
