//! End-to-end checks through the public API: CSV on disk -> ingest -> estimate
//! -> surplus -> exports -> model JSON -> surplus from the saved model.

use std::fs;
use std::path::PathBuf;

use gas_demand::app::pipeline::{compare_variants, default_variants, run, surplus_from_model};
use gas_demand::domain::{ModelConfig, ModelForm, Period, PeriodFilter, PriceSeries, RunConfig};
use gas_demand::error::EstimateError;
use gas_demand::io::{load_observations, read_model_json, write_coefficients_csv, write_model_json};
use gas_demand::taxsim::simulate_tax_regimes;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

const TRUE_ALPHA: f64 = 0.6;
const TRUE_BETA: f64 = -0.3;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("gasdemand-it-{}-{name}", std::process::id()))
}

/// Quarterly table 2005Q1..2014Q4 with a 2008 event and one bad row.
fn write_table(name: &str) -> PathBuf {
    let mut rng = StdRng::seed_from_u64(2024);
    let noise = Normal::new(0.0, 0.005).unwrap();

    let mut csv = String::from("period,quantity,price,income,cpi,tax_rate,base_price,fixed_tax,D2008\n");
    for i in 0..40 {
        let t = i as f64;
        let period = Period::Quarter {
            year: 2005 + i / 4,
            quarter: (i % 4 + 1) as u8,
        };
        let income = 500.0 * (1.0 + 0.005 * t) * (1.0 + 0.02 * (t * 0.9).sin());
        let base = 80.0 + 25.0 * (t * 0.35).sin() + 0.5 * t;
        let fixed_tax = 53.8;
        let price = base + fixed_tax;
        let event = i32::from(period.year() == 2008);
        let ln_q = 3.0 + TRUE_ALPHA * income.ln() + TRUE_BETA * price.ln() + 0.02 * event as f64
            + noise.sample(&mut rng);
        let cpi = 95.0 + 0.2 * t;
        let tax_rate = 35.0 + 3.0 * (t * 1.3).cos();
        csv.push_str(&format!(
            "{period},{},{price},{income},{cpi},{tax_rate},{base},{fixed_tax},{event}\n",
            ln_q.exp()
        ));
        if i == 20 {
            // Non-positive quantity: reported and skipped at ingest.
            csv.push_str("2010Q1x,-5,1,1,,,,,0\n");
        }
    }

    let path = temp_path(name);
    fs::write(&path, csv).unwrap();
    path
}

fn run_config(csv_path: PathBuf, model: ModelConfig) -> RunConfig {
    RunConfig {
        csv_path,
        model,
        filter: PeriodFilter::default(),
        surplus_price: PriceSeries::Nominal,
        show_rows: 5,
        export_model: None,
        export_coefficients: None,
        export_surplus: None,
    }
}

#[test]
fn full_run_recovers_elasticities_and_accumulates_surplus() {
    let csv = write_table("full.csv");
    let model = ModelConfig {
        include_tax: false,
        events: vec!["D2008".to_string()],
        compute_vif: true,
        ..ModelConfig::default()
    };
    let out = run(&run_config(csv.clone(), model)).unwrap();
    let _ = fs::remove_file(&csv);

    assert_eq!(out.ingest.rows_used, 40);
    assert_eq!(out.ingest.row_errors.len(), 1);

    let fitted = &out.analysis.model;
    assert_eq!(fitted.stats.n_obs, 40);
    assert!((fitted.price_elasticity() - TRUE_BETA).abs() < 0.05, "beta={}", fitted.price_elasticity());
    assert!((fitted.income_elasticity() - TRUE_ALPHA).abs() < 0.15, "alpha={}", fitted.income_elasticity());
    assert!(fitted.event_coefficient("D2008").is_some());
    assert_eq!(fitted.vif.as_ref().map(Vec::len), Some(3));

    let surplus = &out.analysis.surplus;
    assert_eq!(surplus.len(), 39);
    let mut running = 0.0;
    for r in surplus {
        running += r.increment;
        assert_eq!(r.cumulative, running);
    }
    let summary = out.analysis.summary.as_ref().unwrap();
    assert_eq!(summary.final_cumulative, running);
}

#[test]
fn saved_model_drives_surplus_on_the_same_sample() {
    let csv = write_table("saved.csv");
    let config = ModelConfig {
        form: ModelForm::FirstDifference,
        include_tax: false,
        ..ModelConfig::default()
    };
    let out = run(&run_config(csv.clone(), config)).unwrap();

    let model_path = temp_path("saved-model.json");
    let coef_path = temp_path("saved-coefficients.csv");
    write_model_json(&model_path, &out.analysis.model).unwrap();
    write_coefficients_csv(&coef_path, &out.analysis.model).unwrap();

    let model = read_model_json(&model_path).unwrap();
    let coefficients = fs::read_to_string(&coef_path).unwrap();
    let ingest = load_observations(&csv, &[]).unwrap();
    let _ = fs::remove_file(&model_path);
    let _ = fs::remove_file(&coef_path);
    let _ = fs::remove_file(&csv);

    assert_eq!(coefficients.lines().next(), Some("variable,estimate,std_error,t_stat,p_value"));
    assert!(coefficients.contains("\nd_ln_price,"));

    let surplus = surplus_from_model(&model, &ingest.observations, &PeriodFilter::default(), PriceSeries::Nominal, true)
        .unwrap();
    assert_eq!(surplus.range_mismatch, None);
    assert_eq!(surplus.records.len(), out.analysis.surplus.len());
    let last = surplus.records.last().unwrap().cumulative;
    let expected = out.analysis.surplus.last().unwrap().cumulative;
    assert!((last - expected).abs() <= 1e-9 * expected.abs().max(1.0));
}

#[test]
fn comparison_runs_all_default_variants() {
    let csv = write_table("compare.csv");
    let ingest = load_observations(&csv, &[]).unwrap();
    let _ = fs::remove_file(&csv);

    let variants = default_variants(&ModelConfig::default());
    let outcomes = compare_variants(&ingest.observations, &PeriodFilter::default(), &variants);

    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
    let n: Vec<usize> = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .map(|m| m.stats.n_obs)
        .collect();
    assert_eq!(n, [40, 40, 39, 39]);
}

#[test]
fn too_narrow_period_window_is_insufficient_data() {
    let csv = write_table("narrow.csv");
    let mut config = run_config(csv.clone(), ModelConfig::default());
    config.filter = PeriodFilter {
        from: Some(Period::Quarter { year: 2013, quarter: 1 }),
        to: None,
        exclude: Vec::new(),
    };
    let err = run(&config).unwrap_err();
    let _ = fs::remove_file(&csv);

    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().contains("8 usable rows"), "{err}");
}

#[test]
fn tax_simulation_runs_on_ingested_table() {
    let csv = write_table("taxsim.csv");
    let ingest = load_observations(&csv, &[]).unwrap();
    let _ = fs::remove_file(&csv);

    let sim = simulate_tax_regimes(&ingest.observations, None).unwrap();
    assert_eq!(sim.rows.len(), 40);
    assert!(sim.rate_from_data);
    // A fixed per-litre tax dampens relative price swings.
    assert!(sim.cv_difference > 0.0);

    assert!(matches!(
        simulate_tax_regimes(&ingest.observations[..1], Some(40.0)),
        Err(EstimateError::InsufficientData { .. })
    ));
}

#[test]
fn early_years_without_tax_rate_are_left_out_of_the_fit() {
    let mut csv = String::from("period,quantity,price,income,tax_rate\n");
    for i in 0..20 {
        let t = i as f64;
        let income = 300.0 * (1.0 + 0.02 * t) * (1.0 + 0.03 * (t * 1.2).sin());
        let price = 90.0 + 15.0 * (t * 0.5).cos() + t;
        let tax_rate = 30.0 + 4.0 * (t * 0.8).sin();
        let quantity = (2.0 + TRUE_ALPHA * income.ln() + TRUE_BETA * price.ln() + 0.05 * tax_rate.ln()).exp();
        let tax = if i < 5 { String::new() } else { tax_rate.to_string() };
        csv.push_str(&format!("{},{quantity},{price},{income},{tax}\n", 1990 + i));
    }
    let path = temp_path("tax-gap.csv");
    fs::write(&path, csv).unwrap();

    let out = run(&run_config(path.clone(), ModelConfig::default()));
    let _ = fs::remove_file(&path);
    let out = out.unwrap();

    assert_eq!(out.ingest.rows_used, 20);
    assert!(out.ingest.row_errors.is_empty());
    assert_eq!(out.analysis.model.stats.n_obs, 15);
    assert_eq!(out.analysis.model.sample_range.first, Period::Year(1995));
    assert_eq!(out.analysis.surplus.len(), 14);
    assert!((out.analysis.model.price_elasticity() - TRUE_BETA).abs() < 1e-6);
}

#[test]
fn year_bounds_select_whole_years_of_quarterly_data() {
    let csv = write_table("year-bounds.csv");
    let mut config = run_config(csv.clone(), ModelConfig::default());
    config.filter = PeriodFilter {
        from: Some(Period::Year(2009)),
        to: None,
        exclude: vec![Period::Year(2014)],
    };
    let out = run(&config);
    let _ = fs::remove_file(&csv);
    let out = out.unwrap();

    assert_eq!(out.analysis.observations_used, 20);
    assert_eq!(out.analysis.model.sample_range.first, Period::Quarter { year: 2009, quarter: 1 });
    assert_eq!(out.analysis.model.sample_range.last, Period::Quarter { year: 2013, quarter: 4 });
}
