mod policy;

use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::{
    BaseOutcome, ChildrenIncomeStart, DEFAULT_CURRENT_AGE, DEFAULT_INFLATION_RATE_PCT,
    DEFAULT_INITIAL_WEALTH, DEFAULT_RATE_GRID, DEFAULT_START_YEAR, EngineError, GlidePathYear,
    InvestmentProfile, ProjectionParameters, SENSITIVITY_PER_POINT, ScenarioOutcome,
    SensitivityPoint, SimulationParameters, SimulationResult, YearlyProjectionRecord,
    evaluate_scenarios, exact_sweep, glide_path, project, simulate_cancellable, sweep,
    validate_projection, validate_simulation,
};

pub use policy::check_plan_policy;

const MAX_API_ITERATIONS: u32 = 200_000;
const MAX_API_HORIZON_YEARS: u32 = 120;
const ENDPOINTS: [&str; 5] = [
    "/api/health",
    "/api/projection",
    "/api/sensitivity",
    "/api/simulate",
    "/api/scenarios",
];

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliInvestmentProfile {
    Conservative,
    Moderate,
    Balanced,
}

impl From<CliInvestmentProfile> for InvestmentProfile {
    fn from(value: CliInvestmentProfile) -> Self {
        match value {
            CliInvestmentProfile::Conservative => InvestmentProfile::Conservative,
            CliInvestmentProfile::Moderate => InvestmentProfile::Moderate,
            CliInvestmentProfile::Balanced => InvestmentProfile::Balanced,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliChildrenIncomeStart {
    AtDeath,
    Immediate,
    FixedAge,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiInvestmentProfile {
    #[serde(alias = "conservador")]
    Conservative,
    #[serde(alias = "moderado")]
    Moderate,
    #[serde(alias = "balanceado")]
    Balanced,
}

impl From<ApiInvestmentProfile> for CliInvestmentProfile {
    fn from(value: ApiInvestmentProfile) -> Self {
        match value {
            ApiInvestmentProfile::Conservative => CliInvestmentProfile::Conservative,
            ApiInvestmentProfile::Moderate => CliInvestmentProfile::Moderate,
            ApiInvestmentProfile::Balanced => CliInvestmentProfile::Balanced,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiChildrenIncomeStart {
    #[serde(alias = "atDeath", alias = "at_death", alias = "falecimento")]
    AtDeath,
    #[serde(alias = "imediato")]
    Immediate,
    #[serde(alias = "fixedAge", alias = "fixed_age")]
    FixedAge,
}

impl From<ApiChildrenIncomeStart> for CliChildrenIncomeStart {
    fn from(value: ApiChildrenIncomeStart) -> Self {
        match value {
            ApiChildrenIncomeStart::AtDeath => CliChildrenIncomeStart::AtDeath,
            ApiChildrenIncomeStart::Immediate => CliChildrenIncomeStart::Immediate,
            ApiChildrenIncomeStart::FixedAge => CliChildrenIncomeStart::FixedAge,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "estate-plan",
    about = "Wealth sustainability planner (deterministic projection, rate sensitivity, Monte Carlo)"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Year-by-year projection with the base outcome and glide path
    Project(PlanArgs),
    /// Return-rate sensitivity of the base outcome
    Sweep {
        #[command(flatten)]
        plan: PlanArgs,
        #[arg(
            long,
            value_delimiter = ',',
            help = "Candidate return rates in percent, e.g. 2,3,4.5"
        )]
        rates: Vec<f64>,
        #[arg(long, help = "Revalue the plan at every rate instead of the linear estimate")]
        exact: bool,
    },
    /// Monte Carlo simulation of terminal wealth
    Simulate(SimArgs),
    /// Evaluate the predefined scenarios against the plan
    Scenarios(PlanArgs),
}

#[derive(Args, Debug, Clone)]
struct PlanArgs {
    #[arg(long, default_value_t = 4.0, help = "Expected annual return in percent")]
    return_rate: f64,
    #[arg(long, default_value_t = 90)]
    life_expectancy: u32,
    #[arg(long, default_value_t = 150_000.0)]
    monthly_expenses: f64,
    #[arg(long, value_enum, default_value_t = CliInvestmentProfile::Moderate)]
    profile: CliInvestmentProfile,
    #[arg(long, value_enum, default_value_t = CliChildrenIncomeStart::FixedAge)]
    children_income_start: CliChildrenIncomeStart,
    #[arg(
        long,
        default_value_t = ChildrenIncomeStart::DEFAULT_FIXED_AGE,
        help = "Subject age at which dependent income starts when --children-income-start=fixed-age"
    )]
    children_income_age: u32,
    #[arg(long, default_value_t = 0.0, help = "Purchase cost in today's money")]
    purchase_cost: f64,
    #[arg(long, help = "Years from now until the purchase; 0 buys immediately")]
    purchase_year: Option<u32>,
    #[arg(long, default_value_t = DEFAULT_CURRENT_AGE)]
    current_age: u32,
    #[arg(long, default_value_t = DEFAULT_INFLATION_RATE_PCT, help = "Annual inflation in percent")]
    inflation_rate: f64,
    #[arg(long, default_value_t = 30)]
    horizon_years: u32,
    #[arg(long, default_value_t = DEFAULT_INITIAL_WEALTH)]
    initial_wealth: f64,
    #[arg(long, default_value_t = 150_000.0)]
    monthly_dependent_income: f64,
    #[arg(long, default_value_t = 25)]
    dependent_income_years: u32,
    #[arg(long, default_value_t = 50_000.0)]
    monthly_donations: f64,
    #[arg(long, default_value_t = 15)]
    donation_years: u32,
    #[arg(long, help = "Keep donating for the whole horizon, ignoring --donation-years")]
    donate_whole_horizon: bool,
    #[arg(long, default_value_t = DEFAULT_START_YEAR)]
    start_year: i32,
}

#[derive(Args, Debug, Clone)]
struct SimArgs {
    #[arg(long, default_value_t = 2.5, help = "Lowest base annual return in percent")]
    rate_min: f64,
    #[arg(long, default_value_t = 7.0, help = "Highest base annual return in percent")]
    rate_max: f64,
    #[arg(long, default_value_t = 15.0, help = "Symmetric annual shock width in percent")]
    volatility: f64,
    #[arg(long, default_value_t = 500)]
    iterations: u32,
    #[arg(long, default_value_t = 20)]
    horizon_years: u32,
    #[arg(long, default_value_t = DEFAULT_INITIAL_WEALTH)]
    initial_wealth: f64,
    #[arg(long, default_value_t = 1_800_000.0)]
    annual_outflow: f64,
    #[arg(long, help = "Seed for a reproducible run; omitted means system entropy")]
    seed: Option<u64>,
    #[arg(long, help = "Include every trial's terminal wealth in the output")]
    include_trials: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RateList {
    Values(Vec<f64>),
    Csv(String),
}

impl RateList {
    fn into_rates(self) -> Result<Vec<f64>, String> {
        match self {
            RateList::Values(values) => Ok(values),
            RateList::Csv(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<f64>()
                        .map_err(|_| format!("rates: `{s}` is not a number"))
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlanPayload {
    return_rate_pct: Option<f64>,
    life_expectancy_age: Option<u32>,
    monthly_expenses: Option<f64>,
    investment_profile: Option<ApiInvestmentProfile>,
    children_income_start: Option<ApiChildrenIncomeStart>,
    children_income_age: Option<u32>,
    purchase_cost_today: Option<f64>,
    purchase_year: Option<u32>,
    current_age: Option<u32>,
    inflation_rate_pct: Option<f64>,
    horizon_years: Option<u32>,
    initial_wealth: Option<f64>,
    monthly_dependent_income: Option<f64>,
    dependent_income_years: Option<u32>,
    monthly_donations: Option<f64>,
    donation_years: Option<u32>,
    donate_whole_horizon: Option<bool>,
    start_year: Option<i32>,
    rates: Option<RateList>,
    exact: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    rate_min_pct: Option<f64>,
    rate_max_pct: Option<f64>,
    volatility_pct: Option<f64>,
    iteration_count: Option<u32>,
    horizon_years: Option<u32>,
    initial_wealth: Option<f64>,
    annual_outflow: Option<f64>,
    seed: Option<u64>,
    include_trials: Option<bool>,
}

#[derive(Debug)]
struct PlanRequest {
    params: ProjectionParameters,
    warnings: Vec<String>,
    rates: Vec<f64>,
    exact: bool,
}

#[derive(Debug)]
struct SimulationRequest {
    params: SimulationParameters,
    seed: Option<u64>,
    include_trials: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionResponse {
    parameters: ProjectionParameters,
    base_outcome: BaseOutcome,
    terminal_wealth: Option<f64>,
    depletion_year: Option<i32>,
    records: Vec<YearlyProjectionRecord>,
    glide_path: Vec<GlidePathYear>,
    warnings: Vec<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
enum SweepMethod {
    Heuristic,
    Exact,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SensitivityResponse {
    method: SweepMethod,
    base_rate_pct: f64,
    sensitivity_per_point: Option<f64>,
    base_outcome: BaseOutcome,
    points: Vec<SensitivityPoint>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    parameters: SimulationParameters,
    seed: Option<u64>,
    result: SimulationResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenariosResponse {
    scenarios: Vec<ScenarioOutcome>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    endpoints: [&'static str; 5],
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_projection_params(args: PlanArgs) -> Result<PlanRequest, String> {
    let children_income_start = match args.children_income_start {
        CliChildrenIncomeStart::AtDeath => ChildrenIncomeStart::AtDeath,
        CliChildrenIncomeStart::Immediate => ChildrenIncomeStart::Immediate,
        CliChildrenIncomeStart::FixedAge => ChildrenIncomeStart::FixedAge(args.children_income_age),
    };

    if args.purchase_year.is_none() && args.purchase_cost > 0.0 {
        warn!("purchase cost given without a purchase year; no purchase will be charged");
    }

    let params = ProjectionParameters {
        return_rate_pct: args.return_rate,
        life_expectancy_age: args.life_expectancy,
        monthly_expenses: args.monthly_expenses,
        investment_profile: args.profile.into(),
        children_income_start,
        purchase_cost_today: args.purchase_cost,
        purchase_year: args.purchase_year,
        current_age: args.current_age,
        inflation_rate_pct: args.inflation_rate,
        horizon_years: args.horizon_years,
        initial_wealth: args.initial_wealth,
        monthly_dependent_income: args.monthly_dependent_income,
        dependent_income_years: args.dependent_income_years,
        monthly_donations: args.monthly_donations,
        donation_years: if args.donate_whole_horizon {
            None
        } else {
            Some(args.donation_years)
        },
        start_year: args.start_year,
    };

    let warnings = check_plan_policy(&params)?;
    validate_projection(&params).map_err(|e| e.to_string())?;
    for warning in &warnings {
        warn!(%warning, "plan accepted with warning");
    }

    Ok(PlanRequest {
        params,
        warnings,
        rates: DEFAULT_RATE_GRID.to_vec(),
        exact: false,
    })
}

fn build_simulation_params(args: SimArgs) -> Result<SimulationRequest, String> {
    let params = SimulationParameters {
        rate_min_pct: args.rate_min,
        rate_max_pct: args.rate_max,
        volatility_pct: args.volatility,
        iteration_count: args.iterations,
        horizon_years: args.horizon_years,
        initial_wealth: args.initial_wealth,
        annual_outflow: args.annual_outflow,
    };
    validate_simulation(&params).map_err(|e| e.to_string())?;
    Ok(SimulationRequest {
        params,
        seed: args.seed,
        include_trials: args.include_trials,
    })
}

fn default_plan_args() -> PlanArgs {
    PlanArgs {
        return_rate: 4.0,
        life_expectancy: 90,
        monthly_expenses: 150_000.0,
        profile: CliInvestmentProfile::Moderate,
        children_income_start: CliChildrenIncomeStart::FixedAge,
        children_income_age: ChildrenIncomeStart::DEFAULT_FIXED_AGE,
        purchase_cost: 0.0,
        purchase_year: None,
        current_age: DEFAULT_CURRENT_AGE,
        inflation_rate: DEFAULT_INFLATION_RATE_PCT,
        horizon_years: 30,
        initial_wealth: DEFAULT_INITIAL_WEALTH,
        monthly_dependent_income: 150_000.0,
        dependent_income_years: 25,
        monthly_donations: 50_000.0,
        donation_years: 15,
        donate_whole_horizon: false,
        start_year: DEFAULT_START_YEAR,
    }
}

fn default_sim_args() -> SimArgs {
    SimArgs {
        rate_min: 2.5,
        rate_max: 7.0,
        volatility: 15.0,
        iterations: 500,
        horizon_years: 20,
        initial_wealth: DEFAULT_INITIAL_WEALTH,
        annual_outflow: 1_800_000.0,
        seed: None,
        include_trials: false,
    }
}

fn plan_request_from_payload(payload: PlanPayload) -> Result<PlanRequest, String> {
    let mut args = default_plan_args();

    if let Some(v) = payload.return_rate_pct {
        args.return_rate = v;
    }
    if let Some(v) = payload.life_expectancy_age {
        args.life_expectancy = v;
    }
    if let Some(v) = payload.monthly_expenses {
        args.monthly_expenses = v;
    }
    if let Some(v) = payload.investment_profile {
        args.profile = v.into();
    }
    if let Some(v) = payload.children_income_start {
        args.children_income_start = v.into();
    }
    if let Some(v) = payload.children_income_age {
        args.children_income_age = v;
    }
    if let Some(v) = payload.purchase_cost_today {
        args.purchase_cost = v;
    }
    if let Some(v) = payload.purchase_year {
        args.purchase_year = Some(v);
    }
    if let Some(v) = payload.current_age {
        args.current_age = v;
    }
    if let Some(v) = payload.inflation_rate_pct {
        args.inflation_rate = v;
    }
    if let Some(v) = payload.horizon_years {
        args.horizon_years = v;
    }
    if let Some(v) = payload.initial_wealth {
        args.initial_wealth = v;
    }
    if let Some(v) = payload.monthly_dependent_income {
        args.monthly_dependent_income = v;
    }
    if let Some(v) = payload.dependent_income_years {
        args.dependent_income_years = v;
    }
    if let Some(v) = payload.monthly_donations {
        args.monthly_donations = v;
    }
    if let Some(v) = payload.donation_years {
        args.donation_years = v;
    }
    if let Some(v) = payload.donate_whole_horizon {
        args.donate_whole_horizon = v;
    }
    if let Some(v) = payload.start_year {
        args.start_year = v;
    }

    if args.horizon_years > MAX_API_HORIZON_YEARS {
        return Err(format!("horizonYears must be <= {MAX_API_HORIZON_YEARS}"));
    }

    let mut request = build_projection_params(args)?;
    if let Some(rates) = payload.rates {
        let rates = rates.into_rates()?;
        if !rates.is_empty() {
            request.rates = rates;
        }
    }
    request.exact = payload.exact.unwrap_or(false);
    Ok(request)
}

fn simulation_request_from_payload(payload: SimulatePayload) -> Result<SimulationRequest, String> {
    let mut args = default_sim_args();

    if let Some(v) = payload.rate_min_pct {
        args.rate_min = v;
    }
    if let Some(v) = payload.rate_max_pct {
        args.rate_max = v;
    }
    if let Some(v) = payload.volatility_pct {
        args.volatility = v;
    }
    if let Some(v) = payload.iteration_count {
        args.iterations = v;
    }
    if let Some(v) = payload.horizon_years {
        args.horizon_years = v;
    }
    if let Some(v) = payload.initial_wealth {
        args.initial_wealth = v;
    }
    if let Some(v) = payload.annual_outflow {
        args.annual_outflow = v;
    }
    args.seed = payload.seed;
    args.include_trials = payload.include_trials.unwrap_or(false);

    if args.iterations > MAX_API_ITERATIONS {
        return Err(format!("iterationCount must be <= {MAX_API_ITERATIONS}"));
    }
    if args.horizon_years > MAX_API_HORIZON_YEARS {
        return Err(format!("horizonYears must be <= {MAX_API_HORIZON_YEARS}"));
    }

    build_simulation_params(args)
}

fn build_projection_response(request: &PlanRequest) -> Result<ProjectionResponse, EngineError> {
    let params = &request.params;
    let projection = project(params)?;
    Ok(ProjectionResponse {
        parameters: params.clone(),
        terminal_wealth: projection.terminal_wealth(),
        depletion_year: projection.depletion_year(),
        base_outcome: projection.base_outcome,
        records: projection.records,
        glide_path: glide_path(
            params.investment_profile,
            params.current_age,
            params.horizon_years,
            params.purchase_year,
        ),
        warnings: request.warnings.clone(),
    })
}

fn build_sensitivity_response(request: &PlanRequest) -> Result<SensitivityResponse, EngineError> {
    let params = &request.params;
    let projection = project(params)?;
    let (method, points) = if request.exact {
        (SweepMethod::Exact, exact_sweep(params, &request.rates)?)
    } else {
        (
            SweepMethod::Heuristic,
            sweep(&projection.base_outcome, params.return_rate_pct, &request.rates)?,
        )
    };
    Ok(SensitivityResponse {
        method,
        base_rate_pct: params.return_rate_pct,
        sensitivity_per_point: (method == SweepMethod::Heuristic).then_some(SENSITIVITY_PER_POINT),
        base_outcome: projection.base_outcome,
        points,
        warnings: request.warnings.clone(),
    })
}

fn build_scenarios_response(request: &PlanRequest) -> Result<ScenariosResponse, EngineError> {
    Ok(ScenariosResponse {
        scenarios: evaluate_scenarios(&request.params)?,
        warnings: request.warnings.clone(),
    })
}

fn run_simulation(
    request: &SimulationRequest,
    token: &CancellationToken,
) -> Result<SimulateResponse, EngineError> {
    let mut rng = match request.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let result = simulate_cancellable(&request.params, &mut rng, token)?;
    Ok(SimulateResponse {
        parameters: request.params.clone(),
        seed: request.seed,
        result: if request.include_trials {
            result
        } else {
            result.without_trials()
        },
    })
}

pub async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Serve { port } => run_http_server(port)
            .await
            .map_err(|e| format!("Server error: {e}")),
        Command::Project(args) => {
            let request = build_projection_params(args)?;
            print_json(&build_projection_response(&request).map_err(|e| e.to_string())?)
        }
        Command::Sweep { plan, rates, exact } => {
            let mut request = build_projection_params(plan)?;
            if !rates.is_empty() {
                request.rates = rates;
            }
            request.exact = exact;
            print_json(&build_sensitivity_response(&request).map_err(|e| e.to_string())?)
        }
        Command::Simulate(args) => {
            let request = build_simulation_params(args)?;
            let response =
                run_simulation(&request, &CancellationToken::new()).map_err(|e| e.to_string())?;
            print_json(&response)
        }
        Command::Scenarios(args) => {
            let request = build_projection_params(args)?;
            print_json(&build_scenarios_response(&request).map_err(|e| e.to_string())?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/projection",
            get(projection_get_handler).post(projection_post_handler),
        )
        .route(
            "/api/sensitivity",
            get(sensitivity_get_handler).post(sensitivity_post_handler),
        )
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/scenarios",
            get(scenarios_get_handler).post(scenarios_post_handler),
        )
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "estate planner API listening");
    axum::serve(listener, router()).await
}

async fn health_handler() -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "ok",
            service: "estate-plan",
            version: env!("CARGO_PKG_VERSION"),
            endpoints: ENDPOINTS,
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn projection_get_handler(Query(payload): Query<PlanPayload>) -> Response {
    plan_handler_impl(payload, build_projection_response)
}

async fn projection_post_handler(Json(payload): Json<PlanPayload>) -> Response {
    plan_handler_impl(payload, build_projection_response)
}

async fn sensitivity_get_handler(Query(payload): Query<PlanPayload>) -> Response {
    plan_handler_impl(payload, build_sensitivity_response)
}

async fn sensitivity_post_handler(Json(payload): Json<PlanPayload>) -> Response {
    plan_handler_impl(payload, build_sensitivity_response)
}

async fn scenarios_get_handler(Query(payload): Query<PlanPayload>) -> Response {
    plan_handler_impl(payload, build_scenarios_response)
}

async fn scenarios_post_handler(Json(payload): Json<PlanPayload>) -> Response {
    plan_handler_impl(payload, build_scenarios_response)
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

fn plan_handler_impl<T, F>(payload: PlanPayload, build: F) -> Response
where
    T: Serialize,
    F: FnOnce(&PlanRequest) -> Result<T, EngineError>,
{
    let request = match plan_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match build(&request) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => engine_error_response(&err),
    }
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match simulation_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    // Dropping the guard cancels the run if the client goes away mid-request.
    let token = CancellationToken::new();
    let _guard = token.clone().drop_guard();
    let joined = tokio::task::spawn_blocking(move || run_simulation(&request, &token)).await;

    match joined {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(err)) => engine_error_response(&err),
        Err(err) => {
            warn!(error = %err, "simulation worker failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Simulation worker failed")
        }
    }
}

fn engine_error_response(err: &EngineError) -> Response {
    let status = match err {
        EngineError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
        EngineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::NumericDegeneracy(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %err, "engine request failed");
    }
    error_response(status, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn plan_request_from_json(json: &str) -> Result<PlanRequest, String> {
    let payload = serde_json::from_str::<PlanPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    plan_request_from_payload(payload)
}
