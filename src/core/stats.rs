use super::error::{EngineError, EngineResult};
use super::types::{Percentiles, SimulationResult};

/// Nearest-rank percentile over an ascending sample:
/// `values[clamp(floor(n * p / 100), 0, n - 1)]`.
pub fn percentile(sorted: &[f64], p: f64) -> EngineResult<f64> {
    if sorted.is_empty() {
        return Err(EngineError::NumericDegeneracy(
            "percentile of an empty sample",
        ));
    }
    let n = sorted.len();
    let rank = (n as f64 * p / 100.0).floor();
    let index = if rank <= 0.0 {
        0
    } else {
        (rank as usize).min(n - 1)
    };
    Ok(sorted[index])
}

pub fn success_rate_pct(values: &[f64]) -> EngineResult<f64> {
    if values.is_empty() {
        return Err(EngineError::NumericDegeneracy(
            "success rate of an empty sample",
        ));
    }
    let successes = values.iter().filter(|v| **v > 0.0).count();
    Ok(100.0 * successes as f64 / values.len() as f64)
}

/// Sorts the trial outcomes and reduces them to the reported percentiles and
/// success rate.
pub fn summarize(mut final_values: Vec<f64>) -> EngineResult<SimulationResult> {
    final_values.sort_by(|a, b| a.total_cmp(b));
    let percentiles = Percentiles {
        p5: percentile(&final_values, 5.0)?,
        p10: percentile(&final_values, 10.0)?,
        p25: percentile(&final_values, 25.0)?,
        p50: percentile(&final_values, 50.0)?,
        p75: percentile(&final_values, 75.0)?,
        p90: percentile(&final_values, 90.0)?,
        p95: percentile(&final_values, 95.0)?,
    };
    let success_rate_pct = success_rate_pct(&final_values)?;
    Ok(SimulationResult {
        percentiles,
        success_rate_pct,
        final_values,
    })
}
