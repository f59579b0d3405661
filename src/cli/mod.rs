//! Command-line parsing for the gasoline demand estimator.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the estimation code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{ModelConfig, ModelForm, Period, PeriodFilter, PriceSeries};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "gasdemand", version, about = "Gasoline demand elasticity and consumer-surplus estimator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the log-linear demand model and print coefficients and diagnostics.
    Estimate(EstimateArgs),
    /// Accumulate consumer surplus on a CSV using a saved model's price elasticity.
    Surplus(SurplusArgs),
    /// Estimate and accumulate surplus on the same data.
    Run(RunArgs),
    /// Fit several model variants side by side.
    Compare(CompareArgs),
    /// Compare fixed-amount and ad-valorem taxation of the same pre-tax prices.
    Taxsim(TaxsimArgs),
    /// Yearly contribution of pre-tax and tax-inclusive prices to CPI change.
    Contribution(ContributionArgs),
}

/// Input table and period selection.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// Observation CSV (period, quantity, price, income, ...).
    #[arg(long, env = "GASDEMAND_CSV", value_name = "CSV")]
    pub csv: PathBuf,

    /// First period to include (e.g. 2001 or 2007Q1).
    #[arg(long, value_name = "PERIOD")]
    pub from: Option<Period>,

    /// Last period to include.
    #[arg(long, value_name = "PERIOD")]
    pub to: Option<Period>,

    /// Exclude a period (repeatable).
    #[arg(long, value_name = "PERIOD")]
    pub exclude: Vec<Period>,
}

impl DataArgs {
    pub fn filter(&self) -> PeriodFilter {
        PeriodFilter {
            from: self.from,
            to: self.to,
            exclude: self.exclude.clone(),
        }
    }
}

/// Model specification.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Level (`ln Q`) or first-difference (`Δln Q`) regression.
    #[arg(long, value_enum, default_value_t = ModelForm::Level)]
    pub form: ModelForm,

    /// Price series entering the regression.
    #[arg(long, value_enum, default_value_t = PriceSeries::Nominal)]
    pub price: PriceSeries,

    /// Leave the tax rate out of the regression.
    #[arg(long)]
    pub no_tax: bool,

    /// Event indicator column to include as a regressor (repeatable).
    #[arg(long = "event", value_name = "NAME")]
    pub events: Vec<String>,

    /// Compute variance inflation factors and the correlation matrix.
    #[arg(long)]
    pub vif: bool,
}

impl ModelArgs {
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            form: self.form,
            price_series: self.price,
            include_tax: !self.no_tax,
            events: self.events.clone(),
            compute_vif: self.vif,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct EstimateArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Write the fitted model to JSON (input for `gasdemand surplus`).
    #[arg(long = "export-model", value_name = "JSON")]
    pub export_model: Option<PathBuf>,

    /// Write the coefficient table to CSV.
    #[arg(long = "export-coefficients", value_name = "CSV")]
    pub export_coefficients: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SurplusArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Model JSON produced by `gasdemand estimate --export-model`.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    /// Price series used for the surplus trapezoids.
    #[arg(long = "surplus-price", value_enum, default_value_t = PriceSeries::Nominal)]
    pub surplus_price: PriceSeries,

    /// Fail when the surplus periods extend outside the model's sample.
    #[arg(long)]
    pub strict_range: bool,

    /// Leading/trailing surplus rows to print (0 prints all).
    #[arg(long, default_value_t = 5)]
    pub show: usize,

    /// Write the surplus records to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Price series used for the surplus trapezoids.
    #[arg(long = "surplus-price", value_enum, default_value_t = PriceSeries::Nominal)]
    pub surplus_price: PriceSeries,

    /// Leading/trailing surplus rows to print (0 prints all).
    #[arg(long, default_value_t = 5)]
    pub show: usize,

    #[arg(long = "export-model", value_name = "JSON")]
    pub export_model: Option<PathBuf>,

    #[arg(long = "export-coefficients", value_name = "CSV")]
    pub export_coefficients: Option<PathBuf>,

    #[arg(long = "export-surplus", value_name = "CSV")]
    pub export_surplus: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Price series shared by all variants.
    #[arg(long, value_enum, default_value_t = PriceSeries::Nominal)]
    pub price: PriceSeries,

    /// Event indicator column shared by all variants (repeatable).
    #[arg(long = "event", value_name = "NAME")]
    pub events: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct TaxsimArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Ad-valorem rate in percent (default: mean observed tax rate).
    #[arg(long, value_name = "PERCENT")]
    pub rate: Option<f64>,

    /// Write the simulated prices to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ContributionArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Fuel share of the CPI basket in percent.
    #[arg(long, value_name = "PERCENT")]
    pub weight: f64,

    /// Write the yearly table to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}
