use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::{EngineError, EngineResult, ensure_finite, ensure_non_negative_amount};
use super::stats::summarize;
use super::types::{SimulationParameters, SimulationResult};

pub fn validate_simulation(params: &SimulationParameters) -> EngineResult<()> {
    if params.iteration_count == 0 {
        return Err(EngineError::invalid("iterationCount", "must be > 0"));
    }
    ensure_finite("rateMinPct", params.rate_min_pct)?;
    ensure_finite("rateMaxPct", params.rate_max_pct)?;
    if params.rate_min_pct > params.rate_max_pct {
        return Err(EngineError::invalid(
            "rateMinPct",
            "must be <= rateMaxPct",
        ));
    }
    ensure_non_negative_amount("volatilityPct", params.volatility_pct)?;
    ensure_non_negative_amount("initialWealth", params.initial_wealth)?;
    ensure_non_negative_amount("annualOutflow", params.annual_outflow)?;
    Ok(())
}

/// Runs `iteration_count` independent trials drawing from `rng`.
pub fn simulate<R: Rng + ?Sized>(
    params: &SimulationParameters,
    rng: &mut R,
) -> EngineResult<SimulationResult> {
    run_trials(params, rng, || false)
}

/// Like [`simulate`], but checks `token` between trials and gives up with
/// [`EngineError::Cancelled`] once it fires.
pub fn simulate_cancellable<R: Rng + ?Sized>(
    params: &SimulationParameters,
    rng: &mut R,
    token: &CancellationToken,
) -> EngineResult<SimulationResult> {
    run_trials(params, rng, || token.is_cancelled())
}

pub fn simulate_seeded(params: &SimulationParameters, seed: u64) -> EngineResult<SimulationResult> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    simulate(params, &mut rng)
}

pub fn simulate_from_entropy(params: &SimulationParameters) -> EngineResult<SimulationResult> {
    let mut rng = ChaCha8Rng::from_entropy();
    simulate(params, &mut rng)
}

fn run_trials<R, F>(
    params: &SimulationParameters,
    rng: &mut R,
    is_cancelled: F,
) -> EngineResult<SimulationResult>
where
    R: Rng + ?Sized,
    F: Fn() -> bool,
{
    validate_simulation(params)?;

    let mut final_values = Vec::with_capacity(params.iteration_count as usize);
    for _ in 0..params.iteration_count {
        if is_cancelled() {
            debug!(completed = final_values.len(), "simulation cancelled");
            return Err(EngineError::Cancelled);
        }
        final_values.push(run_trial(params, rng));
    }

    let result = summarize(final_values)?;
    debug!(
        iterations = params.iteration_count,
        success_rate_pct = result.success_rate_pct,
        median = result.percentiles.p50,
        "simulation complete"
    );
    Ok(result)
}

fn run_trial<R: Rng + ?Sized>(params: &SimulationParameters, rng: &mut R) -> f64 {
    let rate_span = params.rate_max_pct - params.rate_min_pct;
    let shock_scale = 2.0 * params.volatility_pct / 100.0;

    let mut wealth = params.initial_wealth;
    for _ in 0..params.horizon_years {
        let base_return = (params.rate_min_pct + rng.r#gen::<f64>() * rate_span) / 100.0;
        let noise = (rng.r#gen::<f64>() - 0.5) * shock_scale;
        let year_return = base_return + noise;
        wealth = (wealth * (1.0 + year_return) - params.annual_outflow).max(0.0);
    }
    wealth
}
