//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - periods and the validated observation record (`Period`, `Observation`)
//! - model configuration enums (`ModelForm`, `PriceSeries`, `ModelConfig`)
//! - estimator outputs (`FittedModel`, `Coefficient`, `FitStatistics`, `VifEntry`)
//! - surplus inputs/outputs (`SurplusPoint`, `SurplusRecord`)

pub mod types;

pub use types::*;
