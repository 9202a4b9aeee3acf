mod commitments;
mod engine;
mod error;
mod glide_path;
mod monte_carlo;
mod scenarios;
mod sensitivity;
mod stats;
mod types;

pub use commitments::{ATTENTION_THRESHOLD_PCT, evaluate_commitments, plan_status, present_value};
pub use engine::{Projection, project, validate_projection};
pub use error::{EngineError, EngineResult};
pub use glide_path::{
    AllocationWeights, AssetClass, BASE_LIQUIDITY_PCT, GlidePathYear, base_weights, glide_path,
    weights_for_year,
};
pub use monte_carlo::{
    simulate, simulate_cancellable, simulate_from_entropy, simulate_seeded, validate_simulation,
};
pub use scenarios::{SCENARIO_PRESETS, ScenarioOutcome, ScenarioPreset, evaluate_scenarios};
pub use sensitivity::{DEFAULT_RATE_GRID, SENSITIVITY_PER_POINT, exact_sweep, sweep};
pub use stats::{percentile, success_rate_pct, summarize};
pub use types::{
    BaseOutcome, ChildrenIncomeStart, DEFAULT_CURRENT_AGE, DEFAULT_INFLATION_RATE_PCT,
    DEFAULT_INITIAL_WEALTH, DEFAULT_START_YEAR, InvestmentProfile, PERCENTILE_RANKS, Percentiles,
    PlanStatus, ProjectionParameters, SensitivityPoint, SimulationParameters, SimulationResult,
    YearlyProjectionRecord,
};
