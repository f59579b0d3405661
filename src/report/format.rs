//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the estimation code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::VariantOutcome;
use crate::domain::{CorrelationMatrix, FittedModel, Regressor, SurplusRecord, VifEntry};
use crate::estimate::{CORRELATION_THRESHOLD, VIF_THRESHOLD};
use crate::io::ingest::IngestedData;
use crate::surplus::SurplusSummary;
use crate::taxsim::{CpiContribution, TaxSimulation};

/// Conventional significance markers.
pub fn significance_stars(p: f64) -> &'static str {
    if p < 0.001 {
        "***"
    } else if p < 0.01 {
        "**"
    } else if p < 0.05 {
        "*"
    } else {
        ""
    }
}

/// Rows read/used and skipped-row reasons.
pub fn format_ingest_summary(ingest: &IngestedData) -> String {
    let mut out = String::new();
    let range = ingest.range().map(|r| r.to_string()).unwrap_or_default();
    out.push_str(&format!(
        "Data: rows read={} used={} | periods {range}\n",
        ingest.rows_read, ingest.rows_used
    ));
    for e in &ingest.row_errors {
        let period = e.period.as_deref().unwrap_or("?");
        out.push_str(&format!("  (skipped line {} period {period}) {}\n", e.line, e.message));
    }
    out
}

/// Coefficient table plus fit statistics.
pub fn format_fit_summary(model: &FittedModel) -> String {
    let mut out = String::new();
    let s = &model.stats;

    out.push_str("=== gasdemand - demand elasticity estimate ===\n");
    out.push_str(&format!("Model: {}\n", model.config.label()));
    out.push_str(&format!(
        "Sample: {} | n={} | df_model={} df_resid={}\n",
        model.sample_range, s.n_obs, s.df_model, s.df_resid
    ));
    out.push('\n');

    out.push_str(
        format!(
            "{:<16} {:>12} {:>12} {:>10} {:>10} {:<3}\n",
            "variable", "estimate", "std_error", "t", "p", ""
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<16} {:-<12} {:-<12} {:-<10} {:-<10}\n", "", "", "", "", "").trim_end());
    out.push('\n');

    for c in &model.coefficients {
        out.push_str(
            format!(
                "{:<16} {:>12.6} {:>12.6} {:>10.3} {:>10.4} {:<3}\n",
                truncate(&c.name, 16),
                c.estimate,
                c.std_error,
                c.t_stat,
                c.p_value,
                significance_stars(c.p_value),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out.push_str("Signif.: *** p<0.001, ** p<0.01, * p<0.05\n\n");

    out.push_str(&format!(
        "R-squared: {:.4} | adj. R-squared: {:.4}\n",
        s.r_squared, s.adj_r_squared
    ));
    out.push_str(&format!(
        "F({}, {}) = {:.3}, p = {:.4e} | SSE = {:.6}\n",
        s.df_model, s.df_resid, s.f_statistic, s.f_p_value, s.sse
    ));

    out.push_str("\nElasticities:\n");
    for c in model.coefficients.iter().skip(1) {
        out.push_str(&format!("- {:<28} {:>10.4}\n", c.regressor.describe(), c.estimate));
    }

    let collinear = model.collinear_variables();
    if !collinear.is_empty() {
        out.push_str(&format!(
            "\nCollinear (VIF > {VIF_THRESHOLD}): {}\n",
            collinear.join(", ")
        ));
    }

    out
}

/// VIF table with collinearity warnings.
pub fn format_vif_table(vif: &[VifEntry]) -> String {
    let mut out = String::new();
    out.push_str("Variance inflation factors:\n");
    for v in vif {
        let flag = if v.collinear { "  <- collinear" } else { "" };
        out.push_str(&format!("  {:<16} {:>12}{flag}\n", v.variable, fmt_num(v.vif, 3)));
    }
    if vif.iter().any(|v| v.collinear) {
        out.push_str(&format!(
            "  warning: VIF > {VIF_THRESHOLD} indicates strong multicollinearity\n"
        ));
    }
    out
}

/// Lower-triangular correlation matrix; strongly correlated regressors are marked.
pub fn format_correlations(matrix: &CorrelationMatrix) -> String {
    let mut out = String::new();
    out.push_str("Correlation matrix:\n");

    out.push_str(&format!("  {:<14}", ""));
    for name in &matrix.variables {
        out.push_str(&format!(" {:>10}", truncate(name, 10)));
    }
    out.push('\n');

    for (i, name) in matrix.variables.iter().enumerate() {
        out.push_str(&format!("  {:<14}", truncate(name, 14)));
        for j in 0..=i {
            let cell = match matrix.values[i][j] {
                Some(r) if i > 0 && j > 0 && i != j && r.abs() > CORRELATION_THRESHOLD => format!("{r:.3}!"),
                Some(r) => format!("{r:.3}"),
                None => "-".to_string(),
            };
            out.push_str(&format!(" {cell:>10}"));
        }
        out.push('\n');
    }
    out.push_str(&format!("  (! marks |r| > {CORRELATION_THRESHOLD} between regressors)\n"));
    out
}

/// First and last `show_rows` surplus records.
pub fn format_surplus_table(records: &[SurplusRecord], show_rows: usize) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<8} {:>12} {:>12} {:>10} {:>10} {:>10} {:>12} {:>14} {:>16}\n",
            "period", "q_prev", "q_curr", "p_prev", "p_curr", "X", "price_effect", "increment", "cumulative"
        )
        .trim_end(),
    );
    out.push('\n');

    let row = |r: &SurplusRecord| {
        format!(
            "{:<8} {:>12.2} {:>12.2} {:>10.2} {:>10.2} {:>10.4} {:>12.3} {:>14.3} {:>16.3}",
            r.period.to_string(),
            r.q_prev,
            r.q_curr,
            r.p_prev,
            r.p_curr,
            r.price_contribution,
            r.price_effect,
            r.increment,
            r.cumulative,
        )
    };

    if show_rows == 0 || records.len() <= show_rows * 2 {
        for r in records {
            out.push_str(&row(r));
            out.push('\n');
        }
    } else {
        for r in &records[..show_rows] {
            out.push_str(&row(r));
            out.push('\n');
        }
        out.push_str(&format!("  ... {} rows ...\n", records.len() - show_rows * 2));
        for r in &records[records.len() - show_rows..] {
            out.push_str(&row(r));
            out.push('\n');
        }
    }
    out
}

pub fn format_surplus_summary(beta: f64, summary: &SurplusSummary) -> String {
    let mut out = String::new();
    out.push_str("Consumer surplus:\n");
    out.push_str(&format!("- price elasticity used: {beta:.6}\n"));
    out.push_str(&format!(
        "- periods: {}..{} ({} changes)\n",
        summary.first_period, summary.last_period, summary.records
    ));
    out.push_str(&format!("- mean increment: {:.3}\n", summary.mean_increment));
    out.push_str(&format!(
        "- largest gain: {:.3} ({})\n",
        summary.max_increment.1, summary.max_increment.0
    ));
    out.push_str(&format!(
        "- largest loss: {:.3} ({})\n",
        summary.min_increment.1, summary.min_increment.0
    ));
    out.push_str(&format!(
        "- price increases: {} | decreases: {}\n",
        summary.price_increases, summary.price_decreases
    ));
    let corr = summary
        .price_increment_correlation
        .map(|r| format!("{r:.4}"))
        .unwrap_or_else(|| "n/a".to_string());
    out.push_str(&format!("- corr(delta_p, increment): {corr}\n"));
    out.push_str(&format!("- cumulative change: {:.3}\n", summary.final_cumulative));
    out
}

/// Side-by-side variant comparison.
pub fn format_comparison(outcomes: &[VariantOutcome]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<44} {:>5} {:>10} {:>10} {:>10} {:>8} {:>8}\n",
            "model", "n", "alpha", "beta", "gamma", "R2", "adj_R2"
        )
        .trim_end(),
    );
    out.push('\n');

    for o in outcomes {
        let label = truncate(&o.config.label(), 44);
        match &o.result {
            Ok(m) => {
                let gamma = m.tax_elasticity().map(|g| format!("{g:.4}")).unwrap_or_else(|| "-".to_string());
                let price_p = m
                    .coefficient(&Regressor::Price)
                    .map(|c| c.p_value)
                    .unwrap_or(f64::NAN);
                out.push_str(
                    format!(
                        "{label:<44} {:>5} {:>10.4} {:>10} {:>10} {:>8.4} {:>8.4}\n",
                        m.stats.n_obs,
                        m.income_elasticity(),
                        format!("{:.4}{}", m.price_elasticity(), significance_stars(price_p)),
                        gamma,
                        m.stats.r_squared,
                        m.stats.adj_r_squared,
                    )
                    .trim_end(),
                );
            }
            Err(err) => out.push_str(&format!("{label:<44} failed: {err}")),
        }
        out.push('\n');
    }
    out
}

pub fn format_taxsim(sim: &TaxSimulation) -> String {
    let mut out = String::new();
    let source = if sim.rate_from_data { "mean observed tax rate" } else { "--rate" };
    out.push_str("=== gasdemand - fixed-amount vs ad-valorem tax ===\n");
    out.push_str(&format!("Ad-valorem rate: {:.2}% ({source})\n", sim.rate));
    out.push_str(&format!(
        "Periods: {}..{} ({} rows)\n\n",
        sim.rows[0].period,
        sim.rows[sim.rows.len() - 1].period,
        sim.rows.len()
    ));

    out.push_str(&format!("{:<12} {:>10} {:>10} {:>8}\n", "case", "mean", "std", "CV %"));
    for (name, s) in [("fixed", &sim.fixed), ("ad valorem", &sim.ad_valorem)] {
        out.push_str(&format!("{name:<12} {:>10.2} {:>10.2} {:>8.2}\n", s.mean, s.std_dev, s.cv));
    }
    out.push_str(&format!("CV difference: {:+.2} percentage points\n", sim.cv_difference));
    out
}

/// Yearly CPI contribution of the pre-tax and tax-inclusive price.
pub fn format_cpi_contribution(c: &CpiContribution) -> String {
    let mut out = String::new();
    out.push_str("=== gasdemand - fuel price contribution to CPI ===\n");
    out.push_str(&format!("CPI weight: {:.2}%\n\n", c.weight_pct));
    out.push_str(&format!(
        "{:<6} {:>10} {:>12} {:>9} {:>9} {:>10} {:>10}\n",
        "year", "base", "tax-incl.", "base %", "incl. %", "base pt", "incl. pt"
    ));
    let opt = |v: Option<f64>, decimals: usize| v.map(|v| fmt_num(v, decimals)).unwrap_or_else(|| "-".to_string());
    for r in &c.rows {
        out.push_str(&format!(
            "{:<6} {:>10.2} {:>12.2} {:>9} {:>9} {:>10} {:>10}\n",
            r.year,
            r.base_price,
            r.tax_inclusive_price,
            opt(r.base_change_pct, 2),
            opt(r.tax_inclusive_change_pct, 2),
            opt(r.base_contribution, 3),
            opt(r.tax_inclusive_contribution, 3),
        ));
    }
    out
}

fn fmt_num(v: f64, decimals: usize) -> String {
    if v.is_infinite() {
        if v > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{v:.decimals$}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
