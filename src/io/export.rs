//! Export estimation and surplus results to CSV.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::{FittedModel, SurplusRecord};
use crate::error::AppError;
use crate::taxsim::{CpiContribution, TaxSimulation};

fn create(path: &Path, what: &str) -> Result<BufWriter<File>, AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create {what} CSV '{}': {e}", path.display())))?;
    Ok(BufWriter::new(file))
}

fn write_err(what: &'static str) -> impl Fn(std::io::Error) -> AppError {
    move |e| AppError::new(2, format!("Failed to write {what} CSV: {e}"))
}

/// Write the coefficient table of a fitted model.
pub fn write_coefficients_csv(path: &Path, model: &FittedModel) -> Result<(), AppError> {
    let mut out = create(path, "coefficients")?;
    let err = write_err("coefficients");

    writeln!(out, "variable,estimate,std_error,t_stat,p_value").map_err(&err)?;
    for c in &model.coefficients {
        writeln!(
            out,
            "{},{},{},{},{}",
            c.name, c.estimate, c.std_error, c.t_stat, c.p_value
        )
        .map_err(&err)?;
    }
    out.flush().map_err(&err)?;
    Ok(())
}

/// Write the per-period surplus records.
pub fn write_surplus_csv(path: &Path, records: &[SurplusRecord]) -> Result<(), AppError> {
    let mut out = create(path, "surplus")?;
    let err = write_err("surplus");

    writeln!(
        out,
        "period,q_prev,q_curr,p_prev,p_curr,delta_q,delta_p,price_contribution,price_effect,increment,cumulative"
    )
    .map_err(&err)?;
    for r in records {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{}",
            r.period,
            r.q_prev,
            r.q_curr,
            r.p_prev,
            r.p_curr,
            r.delta_q,
            r.delta_p,
            r.price_contribution,
            r.price_effect,
            r.increment,
            r.cumulative,
        )
        .map_err(&err)?;
    }
    out.flush().map_err(&err)?;
    Ok(())
}

/// Write the per-period tax simulation.
pub fn write_taxsim_csv(path: &Path, sim: &TaxSimulation) -> Result<(), AppError> {
    let mut out = create(path, "tax simulation")?;
    let err = write_err("tax simulation");

    writeln!(out, "period,base_price,fixed_tax,fixed_price,ad_valorem_price,difference").map_err(&err)?;
    for r in &sim.rows {
        writeln!(
            out,
            "{},{},{},{},{},{}",
            r.period, r.base_price, r.fixed_tax, r.fixed_price, r.ad_valorem_price, r.difference
        )
        .map_err(&err)?;
    }
    out.flush().map_err(&err)?;
    Ok(())
}

pub fn write_contribution_csv(path: &Path, contribution: &CpiContribution) -> Result<(), AppError> {
    let mut out = create(path, "CPI contribution")?;
    let err = write_err("CPI contribution");
    let opt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();

    writeln!(
        out,
        "year,base_price,tax_inclusive_price,base_change_pct,tax_inclusive_change_pct,base_contribution,tax_inclusive_contribution"
    )
    .map_err(&err)?;
    for r in &contribution.rows {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            r.year,
            r.base_price,
            r.tax_inclusive_price,
            opt(r.base_change_pct),
            opt(r.tax_inclusive_change_pct),
            opt(r.base_contribution),
            opt(r.tax_inclusive_contribution)
        )
        .map_err(&err)?;
    }
    out.flush().map_err(&err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Period, SurplusPoint};
    use crate::surplus::accumulate;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("gasdemand-export-{}-{name}", std::process::id()))
    }

    #[test]
    fn surplus_csv_has_header_and_one_line_per_record() {
        let points: Vec<SurplusPoint> = [(100.0, 10.0), (90.0, 12.0), (95.0, 11.0)]
            .iter()
            .enumerate()
            .map(|(i, &(quantity, price))| SurplusPoint {
                period: Period::Year(2000 + i as i32),
                quantity,
                price,
            })
            .collect();
        let records = accumulate(-0.5, &points);

        let path = temp_path("surplus.csv");
        write_surplus_csv(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("period,q_prev,q_curr"));
        assert!(lines[1].starts_with("2001,100,90,10,12,-10,2,"));
        assert_eq!(lines[1].split(',').count(), 11);
    }

    #[test]
    fn contribution_csv_leaves_first_year_changes_blank() {
        let mut obs = Vec::new();
        for (year, base) in [(2019, 100.0), (2020, 110.0)] {
            let mut o = crate::domain::Observation::new(Period::Year(year), 1.0, base + 50.0, 1.0);
            o.base_price = Some(base);
            obs.push(o);
        }
        let contribution = crate::taxsim::cpi_contribution(&obs, 2.0).unwrap();

        let path = temp_path("contribution.csv");
        write_contribution_csv(&path, &contribution).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2019,100,150,,,,");
        assert!(lines[2].starts_with("2020,110,160,10,"));
    }
}
