//! Read/write fitted-model JSON files.
//!
//! Model JSON is the portable representation of an estimation run: the
//! configuration, the sample range, every coefficient with its inference and
//! the fit statistics. The `surplus` command reads the price elasticity (and
//! the sample range, for the consistency check) back from it.
//!
//! The schema is defined by `domain::FittedModel`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::domain::{FittedModel, Regressor};
use crate::error::AppError;

/// Write a model JSON file (pretty-printed).
pub fn write_model_json(path: &Path, model: &FittedModel) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create model JSON '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut out, model)
        .map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))?;
    writeln!(out).map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))?;
    Ok(())
}

/// Read a model JSON file.
pub fn read_model_json(path: &Path) -> Result<FittedModel, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model JSON '{}': {e}", path.display())))?;
    let model: FittedModel = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid model JSON: {e}")))?;

    if model.coefficient(&Regressor::Price).is_none() {
        return Err(AppError::new(
            2,
            format!("Model JSON '{}' has no price coefficient.", path.display()),
        ));
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModelConfig, Observation, Period};
    use crate::estimate::estimate;

    #[test]
    fn model_json_round_trips() {
        let obs: Vec<Observation> = (0..12)
            .map(|i| {
                let t = i as f64;
                Observation::new(
                    Period::Year(2000 + i),
                    80.0 + 2.0 * (t * 0.8).sin() + t,
                    10.0 + (t * 1.9).cos(),
                    300.0 + 4.0 * t,
                )
            })
            .collect();
        let config = ModelConfig {
            include_tax: false,
            compute_vif: true,
            ..ModelConfig::default()
        };
        let model = estimate(&obs, &config).unwrap();

        let path = std::env::temp_dir().join(format!("gasdemand-model-{}.json", std::process::id()));
        write_model_json(&path, &model).unwrap();
        let back = read_model_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(back.config, model.config);
        assert_eq!(back.sample_range, model.sample_range);
        assert_eq!(back.coefficients.len(), 3);
        assert!((back.price_elasticity() - model.price_elasticity()).abs() < 1e-12);
        assert_eq!(back.generated_at, model.generated_at);
    }
}
