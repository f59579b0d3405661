//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads and validates the observation CSV
//! - runs estimation / surplus accumulation / tax and CPI analyses
//! - prints reports and writes optional exports

use clap::Parser;

use crate::cli::{Command, CompareArgs, ContributionArgs, EstimateArgs, RunArgs, SurplusArgs, TaxsimArgs};
use crate::domain::{FittedModel, ModelConfig, RunConfig};
use crate::error::AppError;
use crate::io::ingest::load_observations;
use crate::report;

pub mod pipeline;

/// Entry point for the `gasdemand` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Estimate(args) => handle_estimate(args),
        Command::Surplus(args) => handle_surplus(args),
        Command::Run(args) => handle_run(args),
        Command::Compare(args) => handle_compare(args),
        Command::Taxsim(args) => handle_taxsim(args),
        Command::Contribution(args) => handle_contribution(args),
    }
}

fn handle_estimate(args: EstimateArgs) -> Result<(), AppError> {
    let config = args.model.model_config();
    let ingest = load_observations(&args.data.csv, &config.events)?;
    print!("{}", report::format_ingest_summary(&ingest));

    let model = pipeline::estimate_with_filter(&ingest.observations, &config, &args.data.filter())?;
    print_model(&model);

    if let Some(path) = &args.export_model {
        crate::io::write_model_json(path, &model)?;
    }
    if let Some(path) = &args.export_coefficients {
        crate::io::write_coefficients_csv(path, &model)?;
    }
    Ok(())
}

fn handle_surplus(args: SurplusArgs) -> Result<(), AppError> {
    let model = crate::io::read_model_json(&args.model)?;
    // Event columns are irrelevant to the accumulator.
    let ingest = load_observations(&args.data.csv, &[])?;
    print!("{}", report::format_ingest_summary(&ingest));

    let out = pipeline::surplus_from_model(
        &model,
        &ingest.observations,
        &args.data.filter(),
        args.surplus_price,
        args.strict_range,
    )?;

    println!("\nModel: {} (sample {})", model.config.label(), model.sample_range);
    if let Some(note) = &out.range_mismatch {
        println!("note: {note}");
    }
    println!();
    print!("{}", report::format_surplus_table(&out.records, args.show));
    if let Some(summary) = &out.summary {
        println!();
        print!("{}", report::format_surplus_summary(out.beta, summary));
    }

    if let Some(path) = &args.export {
        crate::io::write_surplus_csv(path, &out.records)?;
    }
    Ok(())
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let out = pipeline::run(&config)?;
    let analysis = &out.analysis;

    print!("{}", report::format_ingest_summary(&out.ingest));
    print_model(&analysis.model);

    println!();
    print!("{}", report::format_surplus_table(&analysis.surplus, config.show_rows));
    if let Some(summary) = &analysis.summary {
        println!();
        print!(
            "{}",
            report::format_surplus_summary(analysis.model.price_elasticity(), summary)
        );
    }

    if let Some(path) = &config.export_model {
        crate::io::write_model_json(path, &analysis.model)?;
    }
    if let Some(path) = &config.export_coefficients {
        crate::io::write_coefficients_csv(path, &analysis.model)?;
    }
    if let Some(path) = &config.export_surplus {
        crate::io::write_surplus_csv(path, &analysis.surplus)?;
    }
    Ok(())
}

fn handle_compare(args: CompareArgs) -> Result<(), AppError> {
    let base = ModelConfig {
        price_series: args.price,
        events: args.events.clone(),
        ..ModelConfig::default()
    };
    let ingest = load_observations(&args.data.csv, &base.events)?;
    print!("{}", report::format_ingest_summary(&ingest));

    let variants = pipeline::default_variants(&base);
    let outcomes = pipeline::compare_variants(&ingest.observations, &args.data.filter(), &variants);

    println!();
    print!("{}", report::format_comparison(&outcomes));

    // Every variant failing is a failure of the command; report the first error.
    if outcomes.iter().all(|o| o.result.is_err()) {
        if let Some(Err(err)) = outcomes.into_iter().next().map(|o| o.result) {
            return Err(err.into());
        }
    }
    Ok(())
}

fn handle_taxsim(args: TaxsimArgs) -> Result<(), AppError> {
    let ingest = load_observations(&args.data.csv, &[])?;
    let observations = args.data.filter().apply(&ingest.observations);

    let sim = crate::taxsim::simulate_tax_regimes(&observations, args.rate)?;
    print!("{}", report::format_taxsim(&sim));

    if let Some(path) = &args.export {
        crate::io::write_taxsim_csv(path, &sim)?;
    }
    Ok(())
}

fn handle_contribution(args: ContributionArgs) -> Result<(), AppError> {
    let ingest = load_observations(&args.data.csv, &[])?;
    let observations = args.data.filter().apply(&ingest.observations);

    let contribution = crate::taxsim::cpi_contribution(&observations, args.weight)?;
    print!("{}", report::format_cpi_contribution(&contribution));

    if let Some(path) = &args.export {
        crate::io::write_contribution_csv(path, &contribution)?;
    }
    Ok(())
}

fn print_model(model: &FittedModel) {
    println!();
    print!("{}", report::format_fit_summary(model));
    if let Some(vif) = &model.vif {
        println!();
        print!("{}", report::format_vif_table(vif));
    }
    if let Some(corr) = &model.correlations {
        println!();
        print!("{}", report::format_correlations(corr));
    }
}

pub fn run_config_from_args(args: &RunArgs) -> RunConfig {
    RunConfig {
        csv_path: args.data.csv.clone(),
        model: args.model.model_config(),
        filter: args.data.filter(),
        surplus_price: args.surplus_price,
        show_rows: args.show,
        export_model: args.export_model.clone(),
        export_coefficients: args.export_coefficients.clone(),
        export_surplus: args.export_surplus.clone(),
    }
}
