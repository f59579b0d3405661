//! CSV ingest and validation.
//!
//! Turns a period-indexed demand table into typed [`Observation`]s that are
//! safe to log-transform.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Validate once**: downstream code never re-parses text

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Granularity, Observation, Period, PeriodRange};
use crate::error::{AppError, EstimateError};
use crate::estimate::check_period_order;

const REQUIRED_COLUMNS: [&str; 4] = ["period", "quantity", "price", "income"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub period: Option<String>,
    pub message: String,
}

/// Ingest output: validated observations + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub observations: Vec<Observation>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

impl IngestedData {
    pub fn range(&self) -> Option<PeriodRange> {
        let periods: Vec<Period> = self.observations.iter().map(|o| o.period).collect();
        PeriodRange::spanning(&periods)
    }

    pub fn granularity(&self) -> Option<Granularity> {
        self.observations.first().map(|o| o.period.granularity())
    }
}

/// Load observations from a CSV file, reading the named event columns.
pub fn load_observations(path: &Path, events: &[String]) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let data = parse_observations(file, events)?;

    tracing::info!(
        path = %path.display(),
        rows_read = data.rows_read,
        rows_used = data.rows_used,
        row_errors = data.row_errors.len(),
        "loaded observations"
    );
    Ok(data)
}

/// Parse observations from any CSV reader.
pub fn parse_observations<R: Read>(reader: R, events: &[String]) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    ensure_required_columns_exist(&header_map, events)?;

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    period: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let period_text = get_optional(&record, &header_map, "period").map(str::to_string);
        match parse_row(&record, &header_map, events) {
            Ok(obs) => observations.push(obs),
            Err(message) => {
                tracing::debug!(line, period = ?period_text, %message, "skipping row");
                row_errors.push(RowError {
                    line,
                    period: period_text,
                    message,
                });
            }
        }
    }

    let rows_used = observations.len();
    if rows_used == 0 {
        return Err(AppError::new(3, "No valid rows remain after validation."));
    }

    check_period_order(&observations)?;

    Ok(IngestedData {
        observations,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_required_columns_exist(header_map: &HashMap<String, usize>, events: &[String]) -> Result<(), AppError> {
    for name in REQUIRED_COLUMNS {
        if !header_map.contains_key(name) {
            return Err(AppError::new(2, format!("Missing required column: `{name}`")));
        }
    }
    for event in events {
        if !header_map.contains_key(&normalize_header_name(event)) {
            return Err(EstimateError::invalid(format!(
                "event indicator column `{event}` not found in CSV header"
            ))
            .into());
        }
    }
    Ok(())
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>, events: &[String]) -> Result<Observation, String> {
    let period: Period = get_required(record, header_map, "period")?.parse()?;

    let quantity = parse_positive(record, header_map, "quantity")?;
    let price = parse_positive(record, header_map, "price")?;
    let income = parse_positive(record, header_map, "income")?;

    let cpi = parse_opt_f64(get_optional(record, header_map, "cpi")).filter(|c| *c > 0.0);
    let relative_price =
        parse_opt_f64(get_optional(record, header_map, "relative_price")).or_else(|| cpi.map(|c| price / c));

    let mut obs = Observation::new(period, quantity, price, income);
    obs.relative_price = relative_price;
    obs.tax_rate = parse_opt_f64(get_optional(record, header_map, "tax_rate"));
    obs.base_price = parse_opt_f64(get_optional(record, header_map, "base_price"));
    obs.fixed_tax = parse_opt_f64(get_optional(record, header_map, "fixed_tax"));

    for event in events {
        let key = normalize_header_name(event);
        let raw = get_required(record, header_map, &key)?;
        let on = parse_flag(raw).ok_or_else(|| format!("Invalid event flag `{event}` = '{raw}' (expected 0 or 1)."))?;
        obs.events.insert(event.clone(), on);
    }

    Ok(obs)
}

fn parse_positive(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<f64, String> {
    let raw = get_required(record, header_map, name)?;
    let v = raw
        .parse::<f64>()
        .map_err(|_| format!("Invalid number for `{name}`: '{raw}'."))?;
    if !v.is_finite() || v <= 0.0 {
        return Err(format!("`{name}` must be finite and > 0 (got {v})."));
    }
    Ok(v)
}

fn parse_flag(raw: &str) -> Option<bool> {
    let v = raw.parse::<f64>().ok()?;
    if v == 0.0 {
        Some(false)
    } else if v == 1.0 {
        Some(true)
    } else {
        None
    }
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?;
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(csv: &str, events: &[&str]) -> Result<IngestedData, AppError> {
        let events: Vec<String> = events.iter().map(|e| e.to_string()).collect();
        parse_observations(csv.as_bytes(), &events)
    }

    #[test]
    fn reads_required_and_optional_columns() {
        let csv = "\u{feff}Period,Quantity,Price,Income,CPI,Tax_Rate,D2008\n\
                   2007Q1,100,150,500,100,40,0\n\
                   2007Q2,98,160,505,,41,1\n";
        let data = parse(csv, &["D2008"]).unwrap();

        assert_eq!(data.rows_used, 2);
        let first = &data.observations[0];
        assert_eq!(first.period, Period::Quarter { year: 2007, quarter: 1 });
        assert_eq!(first.relative_price, Some(1.5));
        assert_eq!(first.tax_rate, Some(40.0));
        assert_eq!(first.event_value("D2008"), Some(0.0));

        let second = &data.observations[1];
        assert_eq!(second.relative_price, None);
        assert_eq!(second.event_value("D2008"), Some(1.0));
        assert_eq!(data.granularity(), Some(Granularity::Quarterly));
    }

    #[test]
    fn bad_rows_are_reported_and_skipped() {
        let csv = "period,quantity,price,income\n\
                   2001,100,10,500\n\
                   2002,0,10,500\n\
                   2003,abc,10,500\n\
                   2004,100,,500\n\
                   2005,100,11,510\n";
        let data = parse(csv, &[]).unwrap();

        assert_eq!(data.rows_read, 5);
        assert_eq!(data.rows_used, 2);
        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, [3, 4, 5]);
        assert_eq!(data.row_errors[0].period.as_deref(), Some("2002"));
        assert_eq!(data.range().unwrap().to_string(), "2001..2005");
    }

    #[test]
    fn missing_event_column_is_invalid_input() {
        let csv = "period,quantity,price,income\n2001,100,10,500\n";
        let err = parse(csv, &["D2008"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("D2008"));
    }

    #[test]
    fn event_flags_must_be_binary() {
        let csv = "period,quantity,price,income,covid\n2020,100,10,500,2\n2021,100,10,500,1\n";
        let data = parse(csv, &["covid"]).unwrap();
        assert_eq!(data.rows_used, 1);
        assert!(data.row_errors[0].message.contains("covid"));
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let err = parse("period,quantity,price\n2001,1,1\n", &[]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("income"));
    }

    #[test]
    fn unordered_periods_are_rejected() {
        let csv = "period,quantity,price,income\n2002,100,10,500\n2001,100,10,500\n";
        let err = parse(csv, &[]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn empty_result_is_an_error() {
        let err = parse("period,quantity,price,income\n2001,-1,10,500\n", &[]).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
