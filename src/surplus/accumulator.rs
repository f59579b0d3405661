//! Consumer-surplus accumulator.
//!
//! For each consecutive pair `(t-1, t)` the change in surplus is the trapezoid
//! under the demand curve between the two prices, with the quantity side
//! corrected for the part of the quantity change the price change explains:
//!
//! ```text
//! X_t          = β (e^{Δln P} - 1) / (e^{Δln Q} - 1)
//! price_effect = X_t · ΔQ
//! increment    = (Q_{t-1} + Q_t + price_effect) · (P_{t-1} - P_t) / 2
//! ```
//!
//! A price decrease yields a positive increment (a gain for consumers).

use crate::domain::{Observation, PriceSeries, SurplusPoint, SurplusRecord};
use crate::error::EstimateError;

/// `|Δln Q|` below which the quantity is treated as unchanged.
pub const LN_DQ_EPS: f64 = 1e-10;

/// Share of the quantity change attributed to the price change (`X_t`).
pub fn price_contribution(beta: f64, q_prev: f64, q_curr: f64, p_prev: f64, p_curr: f64) -> f64 {
    if q_curr == q_prev {
        return 0.0;
    }
    let ln_dq = q_curr.ln() - q_prev.ln();
    if ln_dq.abs() < LN_DQ_EPS {
        return 0.0;
    }
    let ln_dp = p_curr.ln() - p_prev.ln();
    beta * ln_dp.exp_m1() / ln_dq.exp_m1()
}

/// Surplus records for every consecutive pair of `points`, with a running total.
///
/// Returns `points.len() - 1` records (none for fewer than two points). The
/// points must be validated: finite, strictly positive quantity and price.
pub fn accumulate(beta: f64, points: &[SurplusPoint]) -> Vec<SurplusRecord> {
    let mut cumulative = 0.0;
    points
        .windows(2)
        .map(|pair| {
            let (prev, curr) = (pair[0], pair[1]);
            let delta_q = curr.quantity - prev.quantity;
            let delta_p = curr.price - prev.price;

            let contribution = price_contribution(beta, prev.quantity, curr.quantity, prev.price, curr.price);
            let price_effect = contribution * delta_q;

            let increment = if curr.price == prev.price {
                0.0
            } else {
                (prev.quantity + curr.quantity + price_effect) * (prev.price - curr.price) * 0.5
            };
            cumulative += increment;

            SurplusRecord {
                period: curr.period,
                q_prev: prev.quantity,
                q_curr: curr.quantity,
                p_prev: prev.price,
                p_curr: curr.price,
                delta_q,
                delta_p,
                price_contribution: contribution,
                price_effect,
                increment,
                cumulative,
            }
        })
        .collect()
}

/// Extract validated `(quantity, price)` points from observations.
///
/// `series` selects the nominal or the relative price column.
pub fn surplus_points(observations: &[Observation], series: PriceSeries) -> Result<Vec<SurplusPoint>, EstimateError> {
    observations
        .iter()
        .map(|o| {
            let price = o.price_for(series).ok_or_else(|| {
                EstimateError::invalid(format!("missing price for surplus at period {}", o.period))
            })?;
            if !(o.quantity.is_finite() && o.quantity > 0.0) {
                return Err(EstimateError::invalid(format!(
                    "quantity must be finite and > 0 for surplus (period {}, value {})",
                    o.period, o.quantity
                )));
            }
            if !(price.is_finite() && price > 0.0) {
                return Err(EstimateError::invalid(format!(
                    "price must be finite and > 0 for surplus (period {}, value {price})",
                    o.period
                )));
            }
            Ok(SurplusPoint {
                period: o.period,
                quantity: o.quantity,
                price,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Period;

    fn point(year: i32, quantity: f64, price: f64) -> SurplusPoint {
        SurplusPoint {
            period: Period::Year(year),
            quantity,
            price,
        }
    }

    #[test]
    fn price_rise_scenario() {
        let records = accumulate(-0.5, &[point(2000, 100.0, 10.0), point(2001, 90.0, 12.0)]);
        assert_eq!(records.len(), 1);

        let r = records[0];
        assert!((r.price_contribution - 1.0).abs() < 1e-9);
        assert!((r.price_effect + 10.0).abs() < 1e-9);
        assert!((r.increment + 180.0).abs() < 1e-9);
        assert_eq!(r.cumulative, r.increment);
        assert_eq!(r.period, Period::Year(2001));
        assert_eq!(r.delta_q, -10.0);
        assert_eq!(r.delta_p, 2.0);
    }

    #[test]
    fn output_has_one_fewer_record_and_running_total() {
        let points = [
            point(2000, 100.0, 10.0),
            point(2001, 98.0, 10.5),
            point(2002, 98.0, 10.0),
            point(2003, 101.0, 10.0),
            point(2004, 99.0, 11.2),
        ];
        let records = accumulate(-0.3, &points);
        assert_eq!(records.len(), points.len() - 1);

        assert_eq!(records[0].cumulative, records[0].increment);
        for i in 1..records.len() {
            assert_eq!(records[i].cumulative, records[i - 1].cumulative + records[i].increment);
        }
        let periods: Vec<Period> = records.iter().map(|r| r.period).collect();
        assert_eq!(periods, [2001, 2002, 2003, 2004].map(Period::Year));
    }

    #[test]
    fn unchanged_price_gives_zero_increment() {
        let records = accumulate(-0.4, &[point(2000, 100.0, 10.0), point(2001, 120.0, 10.0)]);
        assert_eq!(records[0].increment, 0.0);
    }

    #[test]
    fn unchanged_quantity_gives_zero_contribution() {
        let records = accumulate(-0.4, &[point(2000, 100.0, 10.0), point(2001, 100.0, 9.0)]);
        assert_eq!(records[0].price_contribution, 0.0);
        assert_eq!(records[0].price_effect, 0.0);
        // Plain trapezoid: (100 + 100) × 1 / 2.
        assert!((records[0].increment - 100.0).abs() < 1e-12);
    }

    #[test]
    fn increment_sign_opposes_price_change_for_small_effects() {
        let cases = [(10.0, 9.5), (10.0, 10.4), (3.0, 2.0), (5.0, 5.1)];
        for (p_prev, p_curr) in cases {
            let records = accumulate(-0.2, &[point(2000, 100.0, p_prev), point(2001, 97.0, p_curr)]);
            let r = records[0];
            assert!(r.price_effect.abs() < r.q_prev + r.q_curr);
            assert_eq!(r.increment.signum(), -(p_curr - p_prev).signum(), "{p_prev} -> {p_curr}");
        }
    }

    #[test]
    fn short_inputs_produce_nothing() {
        assert!(accumulate(-0.5, &[]).is_empty());
        assert!(accumulate(-0.5, &[point(2000, 1.0, 1.0)]).is_empty());
    }

    #[test]
    fn surplus_points_reject_non_positive_values() {
        let obs = vec![
            Observation::new(Period::Year(2000), 10.0, 1.0, 5.0),
            Observation::new(Period::Year(2001), 0.0, 1.0, 5.0),
        ];
        assert!(matches!(
            surplus_points(&obs, PriceSeries::Nominal),
            Err(EstimateError::InvalidInput(_))
        ));
        assert!(matches!(
            surplus_points(&obs[..1], PriceSeries::Relative),
            Err(EstimateError::InvalidInput(_))
        ));
    }
}
