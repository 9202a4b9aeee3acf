//! Return-rate sensitivity of the base outcome.
//!
//! [`sweep`] is a linear approximation around the base case and does not
//! re-run anything. [`exact_sweep`] revalues the plan at every candidate rate
//! and is the one to use when the figures must be exact.

use super::commitments::{evaluate_at_rate, share_of};
use super::engine::validate_projection;
use super::error::{EngineError, EngineResult, ensure_finite};
use super::types::{BaseOutcome, ProjectionParameters, SensitivityPoint};

/// Fractional change in the outcome per percentage point of return-rate
/// change. Empirical, not derived from the projection.
pub const SENSITIVITY_PER_POINT: f64 = 0.15;

/// Candidate rates offered when the caller does not supply a grid.
pub const DEFAULT_RATE_GRID: [f64; 11] = [2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0, 5.5, 6.0, 7.0, 8.0];

/// Scales the base outcome by `1 + SENSITIVITY_PER_POINT * (rate - base_rate)`
/// for each candidate rate, keeping the caller's order.
pub fn sweep(
    base_outcome: &BaseOutcome,
    base_rate_pct: f64,
    candidate_rates: &[f64],
) -> EngineResult<Vec<SensitivityPoint>> {
    ensure_finite("baseRatePct", base_rate_pct)?;
    validate_candidates(candidate_rates)?;

    Ok(candidate_rates
        .iter()
        .map(|&rate_pct| {
            let factor = 1.0 + SENSITIVITY_PER_POINT * (rate_pct - base_rate_pct);
            let projected_value = base_outcome.available_for_goal * factor;
            SensitivityPoint {
                rate_pct,
                projected_value,
                percent_of_commitments: share_of(projected_value, base_outcome.initial_wealth),
            }
        })
        .collect())
}

pub fn exact_sweep(
    params: &ProjectionParameters,
    candidate_rates: &[f64],
) -> EngineResult<Vec<SensitivityPoint>> {
    validate_projection(params)?;
    validate_candidates(candidate_rates)?;

    Ok(candidate_rates
        .iter()
        .map(|&rate_pct| {
            let outcome = evaluate_at_rate(params, rate_pct);
            SensitivityPoint {
                rate_pct,
                projected_value: outcome.available_for_goal,
                percent_of_commitments: outcome.percent_of_wealth,
            }
        })
        .collect())
}

fn validate_candidates(candidate_rates: &[f64]) -> EngineResult<()> {
    for rate in candidate_rates {
        ensure_finite("candidateRates", *rate)?;
        if *rate <= -100.0 {
            return Err(EngineError::invalid("candidateRates", "rates must be > -100"));
        }
    }
    Ok(())
}
