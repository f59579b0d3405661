//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during estimation and surplus accumulation
//! - exported to JSON/CSV
//! - reloaded later (a saved model feeds the `surplus` command)

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A discrete, ordered time index.
///
/// Ordering within one granularity is chronological. A series never mixes
/// granularities (ingest rejects that); the derived cross-variant order is
/// meaningless, so code comparing a year against a quarter goes through
/// [`Period::cmp_by_year`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Period {
    Year(i32),
    Quarter { year: i32, quarter: u8 },
}

/// Granularity of a period series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Annual,
    Quarterly,
}

impl Period {
    pub fn granularity(self) -> Granularity {
        match self {
            Period::Year(_) => Granularity::Annual,
            Period::Quarter { .. } => Granularity::Quarterly,
        }
    }

    pub fn year(self) -> i32 {
        match self {
            Period::Year(y) | Period::Quarter { year: y, .. } => y,
        }
    }

    /// Chronological comparison that falls back to the calendar year when
    /// the two periods differ in granularity (`2010` vs `2010Q3` is `Equal`).
    pub fn cmp_by_year(self, other: Period) -> Ordering {
        if self.granularity() == other.granularity() {
            self.cmp(&other)
        } else {
            self.year().cmp(&other.year())
        }
    }

    /// True when `self` falls inside `other`: equal periods, or a quarter of
    /// the year `other`.
    pub fn within(self, other: Period) -> bool {
        match (self, other) {
            (Period::Quarter { year, .. }, Period::Year(y)) => year == y,
            _ => self == other,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Year(y) => write!(f, "{y}"),
            Period::Quarter { year, quarter } => write!(f, "{year}Q{quarter}"),
        }
    }
}

impl FromStr for Period {
    type Err = String;

    /// Accepts `2007`, `2007Q1`, `2007-Q1`, `2007 Q1` (case-insensitive `q`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let upper = s.to_ascii_uppercase();

        if let Some((year_part, quarter_part)) = upper.split_once('Q') {
            let year_part = year_part.trim().trim_end_matches(['-', ' ']).trim();
            let year = year_part
                .parse::<i32>()
                .map_err(|_| format!("Invalid period '{s}': bad year '{year_part}'."))?;
            let quarter = quarter_part
                .trim()
                .parse::<u8>()
                .map_err(|_| format!("Invalid period '{s}': bad quarter '{quarter_part}'."))?;
            if !(1..=4).contains(&quarter) {
                return Err(format!("Invalid period '{s}': quarter must be 1..=4."));
            }
            return Ok(Period::Quarter { year, quarter });
        }

        // Annual CSV exports sometimes carry a float year ("2007.0").
        let year_text = upper.strip_suffix(".0").unwrap_or(&upper);
        year_text
            .parse::<i32>()
            .map(Period::Year)
            .map_err(|_| format!("Invalid period '{s}'. Expected YYYY or YYYYQn."))
    }
}

impl TryFrom<String> for Period {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(value: Period) -> Self {
        value.to_string()
    }
}

/// Inclusive first/last period of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub first: Period,
    pub last: Period,
}

impl PeriodRange {
    /// Range spanned by an ordered slice of periods (`None` when empty).
    pub fn spanning(periods: &[Period]) -> Option<Self> {
        Some(Self {
            first: *periods.first()?,
            last: *periods.last()?,
        })
    }

    pub fn contains(&self, period: Period) -> bool {
        self.first <= period && period <= self.last
    }

    /// True when `other` lies entirely inside this range.
    pub fn covers(&self, other: &PeriodRange) -> bool {
        self.contains(other.first) && self.contains(other.last)
    }
}

impl fmt::Display for PeriodRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.first, self.last)
    }
}

/// One period of the demand series, validated at ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub period: Period,
    /// Volume consumed in the period.
    pub quantity: f64,
    /// Nominal price per unit.
    pub price: f64,
    /// CPI-deflated price (`price / cpi`), when available.
    pub relative_price: Option<f64>,
    /// Macro income proxy (GDP).
    pub income: f64,
    /// Tax burden in percent.
    pub tax_rate: Option<f64>,
    /// Pre-tax price (used by the tax-regime simulation only).
    pub base_price: Option<f64>,
    /// Fixed per-unit tax amount (used by the tax-regime simulation only).
    pub fixed_tax: Option<f64>,
    /// Named 0/1 structural-break indicators.
    pub events: BTreeMap<String, bool>,
}

impl Observation {
    /// Minimal observation without optional series; handy for building tables in code.
    pub fn new(period: Period, quantity: f64, price: f64, income: f64) -> Self {
        Self {
            period,
            quantity,
            price,
            relative_price: None,
            income,
            tax_rate: None,
            base_price: None,
            fixed_tax: None,
            events: BTreeMap::new(),
        }
    }

    pub fn with_tax_rate(mut self, tax_rate: f64) -> Self {
        self.tax_rate = Some(tax_rate);
        self
    }

    pub fn with_relative_price(mut self, relative_price: f64) -> Self {
        self.relative_price = Some(relative_price);
        self
    }

    pub fn with_event(mut self, name: impl Into<String>, on: bool) -> Self {
        self.events.insert(name.into(), on);
        self
    }

    /// Price under the chosen series.
    pub fn price_for(&self, series: PriceSeries) -> Option<f64> {
        match series {
            PriceSeries::Nominal => Some(self.price),
            PriceSeries::Relative => self.relative_price,
        }
    }

    /// Event flag as a regressor value (`None` when the event is not recorded).
    pub fn event_value(&self, name: &str) -> Option<f64> {
        self.events.get(name).map(|&on| if on { 1.0 } else { 0.0 })
    }
}

/// Which price column enters the regression (or the surplus calculation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PriceSeries {
    /// Observed nominal price.
    Nominal,
    /// CPI-deflated price.
    Relative,
}

impl PriceSeries {
    /// CSV column holding the series.
    pub fn column(self) -> &'static str {
        match self {
            PriceSeries::Nominal => "price",
            PriceSeries::Relative => "relative_price",
        }
    }
}

/// Functional form of the demand regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelForm {
    /// `ln Q = c + α ln I + β ln P + γ ln T + δ·D + ε`
    Level,
    /// `Δln Q = c + α Δln I + β Δln P + γ Δln T + δ·D + ε`
    #[value(name = "diff")]
    FirstDifference,
}

impl ModelForm {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelForm::Level => "level",
            ModelForm::FirstDifference => "first-difference",
        }
    }
}

/// One column of the design matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regressor {
    Intercept,
    Income,
    Price,
    TaxRate,
    Event(String),
}

impl Regressor {
    /// Column label as it appears in reports and exports.
    pub fn label(&self, form: ModelForm) -> String {
        let prefix = match form {
            ModelForm::Level => "ln_",
            ModelForm::FirstDifference => "d_ln_",
        };
        match self {
            Regressor::Intercept => "const".to_string(),
            Regressor::Income => format!("{prefix}income"),
            Regressor::Price => format!("{prefix}price"),
            Regressor::TaxRate => format!("{prefix}tax_rate"),
            Regressor::Event(name) => name.clone(),
        }
    }

    /// Economic reading of the coefficient, for reports.
    pub fn describe(&self) -> String {
        match self {
            Regressor::Intercept => "intercept (C)".to_string(),
            Regressor::Income => "income elasticity (alpha)".to_string(),
            Regressor::Price => "price elasticity (beta)".to_string(),
            Regressor::TaxRate => "tax elasticity (gamma)".to_string(),
            Regressor::Event(name) => format!("event {name}"),
        }
    }
}

/// Configuration for one regression run.
///
/// The script variants of a typical study (annual vs quarterly, with/without the
/// tax rate, with/without dummies) are all instances of this one struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub form: ModelForm,
    pub price_series: PriceSeries,
    /// Include `ln(tax_rate)` as a regressor. Often dropped when it is
    /// collinear with price (VIF > 10).
    pub include_tax: bool,
    /// Event indicator names, in design-matrix order.
    pub events: Vec<String>,
    /// Compute VIF and correlation diagnostics after the fit.
    pub compute_vif: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            form: ModelForm::Level,
            price_series: PriceSeries::Nominal,
            include_tax: true,
            events: Vec::new(),
            compute_vif: false,
        }
    }
}

impl ModelConfig {
    /// Regressors in design-matrix order (intercept first).
    pub fn regressors(&self) -> Vec<Regressor> {
        let mut out = vec![Regressor::Intercept, Regressor::Income, Regressor::Price];
        if self.include_tax {
            out.push(Regressor::TaxRate);
        }
        out.extend(self.events.iter().cloned().map(Regressor::Event));
        out
    }

    /// Short label used in comparison tables and log lines.
    pub fn label(&self) -> String {
        let price = match self.price_series {
            PriceSeries::Nominal => "nominal",
            PriceSeries::Relative => "relative",
        };
        let tax = if self.include_tax { "with tax" } else { "excl. tax" };
        let mut label = format!("{} / {price} price / {tax}", self.form.display_name());
        if !self.events.is_empty() {
            label.push_str(&format!(" / events: {}", self.events.join(",")));
        }
        label
    }
}

/// Serde helpers for floats that may legitimately be non-finite
/// (e.g. an infinite VIF or t-statistic of an exact fit).
///
/// JSON has no representation for `inf`/`NaN`, so these are written as strings.
pub mod lenient_f64 {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(s) => match s.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(D::Error::custom(format!("invalid float literal '{other}'"))),
            },
        }
    }
}

/// Estimate and inference for one regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub regressor: Regressor,
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    #[serde(with = "lenient_f64")]
    pub t_stat: f64,
    /// Two-sided p-value from Student's t with the residual degrees of freedom.
    pub p_value: f64,
}

/// Goodness-of-fit and overall significance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitStatistics {
    /// Rows used in the regression.
    pub n_obs: usize,
    /// Number of regressors excluding the intercept (`k - 1`).
    pub df_model: usize,
    /// Residual degrees of freedom (`n - k`).
    pub df_resid: usize,
    pub sse: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    #[serde(with = "lenient_f64")]
    pub f_statistic: f64,
    pub f_p_value: f64,
}

/// Variance inflation factor for one explanatory variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VifEntry {
    pub variable: String,
    #[serde(with = "lenient_f64")]
    pub vif: f64,
    /// `vif > 10`: informational collinearity warning.
    pub collinear: bool,
}

/// Pearson correlations between the regressand and the explanatory variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub variables: Vec<String>,
    /// Row-major; `None` where a variable has zero variance.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.variables.iter().position(|v| v == a)?;
        let j = self.variables.iter().position(|v| v == b)?;
        self.values[i][j]
    }
}

/// Output of the estimator. Created once per regression run and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub config: ModelConfig,
    /// First and last period of the rows that entered the regression.
    pub sample_range: PeriodRange,
    pub coefficients: Vec<Coefficient>,
    pub stats: FitStatistics,
    pub vif: Option<Vec<VifEntry>>,
    pub correlations: Option<CorrelationMatrix>,
}

impl FittedModel {
    pub fn coefficient(&self, regressor: &Regressor) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| &c.regressor == regressor)
    }

    fn estimate_of(&self, regressor: &Regressor) -> f64 {
        // Intercept, income and price are always part of the design.
        self.coefficient(regressor).map(|c| c.estimate).unwrap_or(f64::NAN)
    }

    pub fn intercept(&self) -> f64 {
        self.estimate_of(&Regressor::Intercept)
    }

    /// α
    pub fn income_elasticity(&self) -> f64 {
        self.estimate_of(&Regressor::Income)
    }

    /// β, the only coefficient the surplus accumulator needs.
    pub fn price_elasticity(&self) -> f64 {
        self.estimate_of(&Regressor::Price)
    }

    /// γ (absent when the tax rate was excluded).
    pub fn tax_elasticity(&self) -> Option<f64> {
        self.coefficient(&Regressor::TaxRate).map(|c| c.estimate)
    }

    pub fn event_coefficient(&self, name: &str) -> Option<f64> {
        self.coefficient(&Regressor::Event(name.to_string()))
            .map(|c| c.estimate)
    }

    /// Variables flagged with VIF > 10.
    pub fn collinear_variables(&self) -> Vec<&str> {
        self.vif
            .iter()
            .flatten()
            .filter(|v| v.collinear)
            .map(|v| v.variable.as_str())
            .collect()
    }
}

/// One (quantity, price) point fed to the surplus accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurplusPoint {
    pub period: Period,
    pub quantity: f64,
    pub price: f64,
}

/// Consumer-surplus change between period `t-1` and period `t`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurplusRecord {
    /// Period `t` (the later of the pair).
    pub period: Period,
    pub q_prev: f64,
    pub q_curr: f64,
    pub p_prev: f64,
    pub p_curr: f64,
    pub delta_q: f64,
    pub delta_p: f64,
    /// Share of the quantity change attributed to the price change (`X_t`).
    pub price_contribution: f64,
    /// `X_t × ΔQ`.
    pub price_effect: f64,
    /// Trapezoid area; positive for a price decrease.
    pub increment: f64,
    pub cumulative: f64,
}

/// Which periods of the table enter a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodFilter {
    pub from: Option<Period>,
    pub to: Option<Period>,
    pub exclude: Vec<Period>,
}

impl PeriodFilter {
    /// A year bound or exclusion on quarterly data covers all four quarters;
    /// a quarter bound on annual data is compared by its year.
    pub fn keeps(&self, period: Period) -> bool {
        if self.from.is_some_and(|from| period.cmp_by_year(from) == Ordering::Less) {
            return false;
        }
        if self.to.is_some_and(|to| period.cmp_by_year(to) == Ordering::Greater) {
            return false;
        }
        !self.exclude.iter().any(|&excluded| period.within(excluded))
    }

    pub fn apply(&self, observations: &[Observation]) -> Vec<Observation> {
        observations
            .iter()
            .filter(|o| self.keeps(o.period))
            .cloned()
            .collect()
    }
}

/// A full run's configuration as understood by the binary.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub csv_path: PathBuf,
    pub model: ModelConfig,
    pub filter: PeriodFilter,
    /// Price column used by the surplus accumulator.
    pub surplus_price: PriceSeries,
    /// Number of leading/trailing surplus rows shown in the terminal report.
    pub show_rows: usize,

    pub export_model: Option<PathBuf>,
    pub export_coefficients: Option<PathBuf>,
    pub export_surplus: Option<PathBuf>,
}
