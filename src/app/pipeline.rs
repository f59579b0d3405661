//! Shared analysis pipeline used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> period filter -> estimate -> accumulate surplus -> summarize
//!
//! The handlers in `app` then focus on presentation (printing and exports).

use rayon::prelude::*;

use crate::domain::{
    FittedModel, ModelConfig, ModelForm, Observation, PeriodFilter, PeriodRange, PriceSeries, RunConfig,
    SurplusRecord,
};
use crate::error::{AppError, EstimateError};
use crate::estimate::{diagnose_collinearity, estimate};
use crate::io::ingest::{IngestedData, load_observations};
use crate::surplus::{SurplusSummary, accumulate, summarize, surplus_points};

/// Estimation plus surplus accumulation on one observation set.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub model: FittedModel,
    pub surplus: Vec<SurplusRecord>,
    pub summary: Option<SurplusSummary>,
    /// Observations left after the period filter.
    pub observations_used: usize,
}

/// All computed outputs of a `gasdemand run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub analysis: AnalysisOutput,
}

/// Surplus accumulated against a previously saved model.
#[derive(Debug, Clone)]
pub struct SurplusOutput {
    pub beta: f64,
    pub records: Vec<SurplusRecord>,
    pub summary: Option<SurplusSummary>,
    /// `Some` when the surplus periods are not those the model was fitted on.
    pub range_mismatch: Option<String>,
}

/// Result of one variant in a comparison.
#[derive(Debug, Clone)]
pub struct VariantOutcome {
    pub config: ModelConfig,
    pub result: Result<FittedModel, EstimateError>,
}

fn positive(value: Option<f64>) -> bool {
    value.is_some_and(|v| v.is_finite() && v > 0.0)
}

/// First column `config` (plus an optional surplus price) needs that `o`
/// lacks or holds a non-positive value in.
fn unusable_column(o: &Observation, config: &ModelConfig, surplus_price: Option<PriceSeries>) -> Option<String> {
    if !positive(Some(o.quantity)) {
        return Some("quantity".to_string());
    }
    if !positive(Some(o.income)) {
        return Some("income".to_string());
    }
    if !positive(o.price_for(config.price_series)) {
        return Some(config.price_series.column().to_string());
    }
    if let Some(series) = surplus_price {
        if !positive(o.price_for(series)) {
            return Some(series.column().to_string());
        }
    }
    if config.include_tax && !positive(o.tax_rate) {
        return Some("tax_rate".to_string());
    }
    config
        .events
        .iter()
        .find(|name| o.event_value(name).is_none())
        .cloned()
}

/// Rows the regression for `config` can use.
///
/// A period with a missing or non-positive value in any column the model
/// (or the surplus accumulator, when `surplus_price` is given) reads is left
/// out rather than imputed; each dropped period is logged.
pub fn usable_observations(
    observations: &[Observation],
    config: &ModelConfig,
    surplus_price: Option<PriceSeries>,
) -> Vec<Observation> {
    observations
        .iter()
        .filter(|o| match unusable_column(o, config, surplus_price) {
            Some(column) => {
                tracing::warn!(period = %o.period, %column, model = %config.label(), "period left out of regression");
                false
            }
            None => true,
        })
        .cloned()
        .collect()
}

/// Filter, estimate and accumulate on the same observation set.
pub fn run_analysis(
    observations: &[Observation],
    model_config: &ModelConfig,
    filter: &PeriodFilter,
    surplus_price: PriceSeries,
) -> Result<AnalysisOutput, EstimateError> {
    let observations = usable_observations(&filter.apply(observations), model_config, Some(surplus_price));
    let model = estimate_filtered(&observations, model_config)?;

    let points = surplus_points(&observations, surplus_price)?;
    let surplus = accumulate(model.price_elasticity(), &points);
    let summary = summarize(&surplus);

    Ok(AnalysisOutput {
        model,
        surplus,
        summary,
        observations_used: observations.len(),
    })
}

/// Apply `filter` and fit `model_config`.
pub fn estimate_with_filter(
    observations: &[Observation],
    model_config: &ModelConfig,
    filter: &PeriodFilter,
) -> Result<FittedModel, EstimateError> {
    let observations = usable_observations(&filter.apply(observations), model_config, None);
    estimate_filtered(&observations, model_config)
}

fn estimate_filtered(observations: &[Observation], model_config: &ModelConfig) -> Result<FittedModel, EstimateError> {
    tracing::debug!(kept = observations.len(), model = %model_config.label(), "estimating");
    match estimate(observations, model_config) {
        Err(err @ EstimateError::SingularDesign(_)) => {
            if model_config.compute_vif {
                log_collinearity(observations, model_config);
            }
            Err(err)
        }
        other => other,
    }
}

fn log_collinearity(observations: &[Observation], config: &ModelConfig) {
    match diagnose_collinearity(observations, config) {
        Ok(vifs) => {
            for v in vifs {
                tracing::warn!(variable = %v.variable, vif = v.vif, collinear = v.collinear, "VIF of singular design");
            }
        }
        Err(err) => tracing::debug!(%err, "collinearity diagnostics unavailable"),
    }
}

/// Load the CSV named in `config` and run the full analysis.
pub fn run(config: &RunConfig) -> Result<RunOutput, AppError> {
    let ingest = load_observations(&config.csv_path, &config.model.events)?;
    let analysis = run_analysis(&ingest.observations, &config.model, &config.filter, config.surplus_price)?;
    Ok(RunOutput { ingest, analysis })
}

/// The standard comparison set: level and first difference, each with and
/// without the tax rate, sharing `base`'s price series and events.
pub fn default_variants(base: &ModelConfig) -> Vec<ModelConfig> {
    let mut out = Vec::with_capacity(4);
    for form in [ModelForm::Level, ModelForm::FirstDifference] {
        for include_tax in [true, false] {
            out.push(ModelConfig {
                form,
                include_tax,
                ..base.clone()
            });
        }
    }
    out
}

/// Fit every variant independently against the same (filtered) observations.
///
/// Outcomes come back in `variants` order; one variant failing does not
/// affect the others.
pub fn compare_variants(
    observations: &[Observation],
    filter: &PeriodFilter,
    variants: &[ModelConfig],
) -> Vec<VariantOutcome> {
    let observations = filter.apply(observations);

    variants
        .par_iter()
        .map(|config| {
            let result = estimate(&usable_observations(&observations, config, None), config);
            if let Err(err) = &result {
                tracing::warn!(model = %config.label(), %err, "variant failed");
            }
            VariantOutcome {
                config: config.clone(),
                result,
            }
        })
        .collect()
}

/// Compare the periods a surplus series covers with the model's sample.
///
/// Returns a description of the mismatch, if any. With `strict`, surplus
/// periods outside the sample are an error.
pub fn check_range_consistency(
    sample: &PeriodRange,
    surplus: &PeriodRange,
    strict: bool,
) -> Result<Option<String>, EstimateError> {
    if sample == surplus {
        return Ok(None);
    }

    let message = format!("surplus periods {surplus} differ from the model's sample {sample}");
    if strict && !sample.covers(surplus) {
        return Err(EstimateError::invalid(format!(
            "{message}; surplus extends outside the estimation sample"
        )));
    }
    tracing::warn!(%sample, %surplus, "surplus period range does not match estimation sample");
    Ok(Some(message))
}

/// Accumulate surplus on `observations` using a saved model's price elasticity.
pub fn surplus_from_model(
    model: &FittedModel,
    observations: &[Observation],
    filter: &PeriodFilter,
    price: PriceSeries,
    strict_range: bool,
) -> Result<SurplusOutput, EstimateError> {
    let observations: Vec<Observation> = filter
        .apply(observations)
        .into_iter()
        .filter(|o| {
            let usable = positive(o.price_for(price)) && positive(Some(o.quantity));
            if !usable {
                tracing::warn!(period = %o.period, "period left out of surplus accumulation");
            }
            usable
        })
        .collect();
    let points = surplus_points(&observations, price)?;
    let beta = model.price_elasticity();
    if !beta.is_finite() {
        return Err(EstimateError::invalid("model has no finite price elasticity"));
    }

    let records = accumulate(beta, &points);
    // Periods comparable with the estimation sample: a first-difference fit
    // starts at the second observation, as do the surplus records.
    let periods: Vec<_> = match model.config.form {
        ModelForm::Level => points.iter().map(|p| p.period).collect(),
        ModelForm::FirstDifference => records.iter().map(|r| r.period).collect(),
    };
    let range_mismatch = match PeriodRange::spanning(&periods) {
        Some(range) => check_range_consistency(&model.sample_range, &range, strict_range)?,
        None => None,
    };
    let summary = summarize(&records);

    Ok(SurplusOutput {
        beta,
        records,
        summary,
        range_mismatch,
    })
}
