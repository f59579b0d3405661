//! Contribution of the fuel price to CPI inflation.
//!
//! Prices are averaged per calendar year, then each year's percentage change
//! against the previous available year is scaled by the fuel weight in the
//! CPI basket. Doing this for the pre-tax and the tax-inclusive price shows
//! how much the fixed tax damps the pass-through to headline inflation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::Observation;
use crate::error::EstimateError;

/// One calendar year of the contribution table. Change and contribution
/// fields are `None` for the first year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContributionRow {
    pub year: i32,
    /// Mean pre-tax price over the year's periods.
    pub base_price: f64,
    /// Mean tax-inclusive price over the same periods.
    pub tax_inclusive_price: f64,
    pub base_change_pct: Option<f64>,
    pub tax_inclusive_change_pct: Option<f64>,
    /// Percentage points of CPI change.
    pub base_contribution: Option<f64>,
    pub tax_inclusive_contribution: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpiContribution {
    /// Fuel share of the CPI basket, percent.
    pub weight_pct: f64,
    pub rows: Vec<ContributionRow>,
}

fn pct_change(prev: f64, curr: f64) -> f64 {
    (curr - prev) / prev * 100.0
}

/// Build the yearly contribution table.
///
/// Only periods carrying a `base_price` take part; `price` is the
/// tax-inclusive price. Quarterly data is averaged per year.
pub fn cpi_contribution(observations: &[Observation], weight_pct: f64) -> Result<CpiContribution, EstimateError> {
    if !(weight_pct.is_finite() && weight_pct > 0.0 && weight_pct <= 100.0) {
        return Err(EstimateError::invalid(format!(
            "CPI weight {weight_pct}% must lie in (0, 100]"
        )));
    }

    // year -> (sum base, sum tax-inclusive, count)
    let mut by_year: BTreeMap<i32, (f64, f64, usize)> = BTreeMap::new();
    for o in observations {
        let Some(base) = o.base_price else { continue };
        let entry = by_year.entry(o.period.year()).or_insert((0.0, 0.0, 0));
        entry.0 += base;
        entry.1 += o.price;
        entry.2 += 1;
    }

    if by_year.len() < 2 {
        return Err(EstimateError::InsufficientData {
            needed: 2,
            found: by_year.len(),
            range: "(years with a base_price)".to_string(),
        });
    }

    let mut rows: Vec<ContributionRow> = Vec::with_capacity(by_year.len());
    for (year, (base_sum, price_sum, count)) in by_year {
        let base_price = base_sum / count as f64;
        let tax_inclusive_price = price_sum / count as f64;

        let (base_change_pct, tax_inclusive_change_pct) = match rows.last() {
            Some(prev) => (
                Some(pct_change(prev.base_price, base_price)),
                Some(pct_change(prev.tax_inclusive_price, tax_inclusive_price)),
            ),
            None => (None, None),
        };

        rows.push(ContributionRow {
            year,
            base_price,
            tax_inclusive_price,
            base_change_pct,
            tax_inclusive_change_pct,
            base_contribution: base_change_pct.map(|c| c * weight_pct / 100.0),
            tax_inclusive_contribution: tax_inclusive_change_pct.map(|c| c * weight_pct / 100.0),
        });
    }

    tracing::info!(years = rows.len(), weight_pct, "CPI contribution computed");
    Ok(CpiContribution { weight_pct, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Period;

    fn quarter(year: i32, quarter: u8, base: f64, fixed_tax: f64) -> Observation {
        let mut o = Observation::new(Period::Quarter { year, quarter }, 1.0, base + fixed_tax, 1.0);
        o.base_price = Some(base);
        o
    }

    #[test]
    fn yearly_means_and_contributions_match_hand_values() {
        // 2020 base mean 100, pump mean 150; 2021 base mean 120, pump mean 170.
        let mut obs: Vec<Observation> = (1..=4).map(|q| quarter(2020, q, 100.0, 50.0)).collect();
        obs.extend([
            quarter(2021, 1, 110.0, 50.0),
            quarter(2021, 2, 130.0, 50.0),
        ]);
        // No base price: ignored.
        obs.push(Observation::new(Period::Quarter { year: 2021, quarter: 3 }, 1.0, 999.0, 1.0));

        let c = cpi_contribution(&obs, 2.0).unwrap();
        assert_eq!(c.rows.len(), 2);

        let first = c.rows[0];
        assert_eq!(first.year, 2020);
        assert_eq!(first.base_contribution, None);

        let second = c.rows[1];
        assert_eq!(second.base_price, 120.0);
        assert_eq!(second.tax_inclusive_price, 170.0);
        assert!((second.base_change_pct.unwrap() - 20.0).abs() < 1e-12);
        assert!((second.base_contribution.unwrap() - 0.4).abs() < 1e-12);
        let pump_change = 20.0 / 150.0 * 100.0;
        assert!((second.tax_inclusive_change_pct.unwrap() - pump_change).abs() < 1e-12);
        assert!((second.tax_inclusive_contribution.unwrap() - pump_change * 0.02).abs() < 1e-12);
        // The fixed tax damps the pass-through.
        assert!(second.tax_inclusive_contribution < second.base_contribution);
    }

    #[test]
    fn weight_out_of_range_is_invalid() {
        let obs = vec![quarter(2020, 1, 100.0, 50.0), quarter(2021, 1, 110.0, 50.0)];
        for weight in [0.0, -1.0, 120.0, f64::NAN] {
            assert!(matches!(cpi_contribution(&obs, weight), Err(EstimateError::InvalidInput(_))));
        }
    }

    #[test]
    fn single_year_is_insufficient() {
        let obs: Vec<Observation> = (1..=4).map(|q| quarter(2020, q, 100.0, 50.0)).collect();
        assert!(matches!(
            cpi_contribution(&obs, 2.0),
            Err(EstimateError::InsufficientData { needed: 2, found: 1, .. })
        ));
    }
}
