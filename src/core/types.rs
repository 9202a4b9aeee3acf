use serde::{Deserialize, Serialize, Serializer};

pub const DEFAULT_CURRENT_AGE: u32 = 53;
pub const DEFAULT_INFLATION_RATE_PCT: f64 = 3.5;
pub const DEFAULT_INITIAL_WEALTH: f64 = 65_000_000.0;
pub const DEFAULT_START_YEAR: i32 = 2025;

/// Percentile ranks reported by every simulation, in ascending order.
pub const PERCENTILE_RANKS: [u32; 7] = [5, 10, 25, 50, 75, 90, 95];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InvestmentProfile {
    Conservative,
    Moderate,
    Balanced,
}

impl InvestmentProfile {
    pub const ALL: [InvestmentProfile; 3] = [
        InvestmentProfile::Conservative,
        InvestmentProfile::Moderate,
        InvestmentProfile::Balanced,
    ];
}

/// When the dependent-income stream switches on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChildrenIncomeStart {
    AtDeath,
    Immediate,
    FixedAge(u32),
}

impl ChildrenIncomeStart {
    pub const DEFAULT_FIXED_AGE: u32 = 65;

    /// Whether the stream pays out in a year where the subject turns `age`.
    pub fn is_active(self, age: u32, subject_alive: bool) -> bool {
        match self {
            ChildrenIncomeStart::Immediate => true,
            ChildrenIncomeStart::AtDeath => !subject_alive,
            ChildrenIncomeStart::FixedAge(start_age) => age >= start_age,
        }
    }

    /// Years between today and the first payment, used to discount the stream.
    pub fn deferral_years(self, current_age: u32, life_expectancy_age: u32) -> u32 {
        match self {
            ChildrenIncomeStart::Immediate => 0,
            ChildrenIncomeStart::AtDeath => life_expectancy_age.saturating_sub(current_age),
            ChildrenIncomeStart::FixedAge(start_age) => start_age.saturating_sub(current_age),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionParameters {
    pub return_rate_pct: f64,
    pub life_expectancy_age: u32,
    pub monthly_expenses: f64,
    pub investment_profile: InvestmentProfile,
    pub children_income_start: ChildrenIncomeStart,
    pub purchase_cost_today: f64,
    pub purchase_year: Option<u32>,
    pub current_age: u32,
    pub inflation_rate_pct: f64,
    pub horizon_years: u32,
    pub initial_wealth: f64,
    pub monthly_dependent_income: f64,
    pub dependent_income_years: u32,
    pub monthly_donations: f64,
    pub donation_years: Option<u32>,
    pub start_year: i32,
}

impl Default for ProjectionParameters {
    fn default() -> Self {
        Self {
            return_rate_pct: 4.0,
            life_expectancy_age: 90,
            monthly_expenses: 150_000.0,
            investment_profile: InvestmentProfile::Moderate,
            children_income_start: ChildrenIncomeStart::FixedAge(
                ChildrenIncomeStart::DEFAULT_FIXED_AGE,
            ),
            purchase_cost_today: 0.0,
            purchase_year: None,
            current_age: DEFAULT_CURRENT_AGE,
            inflation_rate_pct: DEFAULT_INFLATION_RATE_PCT,
            horizon_years: 30,
            initial_wealth: DEFAULT_INITIAL_WEALTH,
            monthly_dependent_income: 150_000.0,
            dependent_income_years: 25,
            monthly_donations: 50_000.0,
            donation_years: Some(15),
            start_year: DEFAULT_START_YEAR,
        }
    }
}

impl ProjectionParameters {
    /// Purchase cost carried forward to the purchase year at the inflation rate.
    pub fn future_purchase_cost(&self) -> Option<f64> {
        let growth = 1.0 + self.inflation_rate_pct / 100.0;
        self.purchase_year
            .map(|year| self.purchase_cost_today * growth.powf(f64::from(year)))
    }

    pub fn life_years(&self) -> u32 {
        self.life_expectancy_age.saturating_sub(self.current_age)
    }

    pub fn effective_donation_years(&self) -> u32 {
        self.donation_years.unwrap_or(self.horizon_years)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyProjectionRecord {
    pub year: i32,
    /// Age reached by the end of this year, one more than the matching glide path entry.
    pub age: u32,
    pub wealth: f64,
    pub earnings: f64,
    pub outflows: f64,
    pub net_flow: f64,
    pub subject_alive: bool,
    pub is_purchase_year: bool,
    pub depleted: bool,
    pub expense_outflow: f64,
    pub dependent_outflow: f64,
    pub donation_outflow: f64,
    pub purchase_outflow: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Critical,
    Attention,
    Viable,
}

/// Headline valuation of the plan: what is left for the discretionary goal once
/// the fixed commitments are set aside.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseOutcome {
    pub return_rate_pct: f64,
    pub initial_wealth: f64,
    pub expenses: f64,
    pub dependents: f64,
    pub donations: f64,
    pub total_commitments: f64,
    pub available_for_goal: f64,
    pub percent_of_wealth: f64,
    pub art_reserve: f64,
    pub percent_art_reserve: f64,
    pub status: PlanStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityPoint {
    pub rate_pct: f64,
    pub projected_value: f64,
    pub percent_of_commitments: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub rate_min_pct: f64,
    pub rate_max_pct: f64,
    pub volatility_pct: f64,
    pub iteration_count: u32,
    pub horizon_years: u32,
    pub initial_wealth: f64,
    pub annual_outflow: f64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            rate_min_pct: 2.5,
            rate_max_pct: 7.0,
            volatility_pct: 15.0,
            iteration_count: 500,
            horizon_years: 20,
            initial_wealth: DEFAULT_INITIAL_WEALTH,
            annual_outflow: 1_800_000.0,
        }
    }
}

/// Serializes as a map keyed by percentile rank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentiles {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

impl Percentiles {
    pub fn get(&self, rank: u32) -> Option<f64> {
        match rank {
            5 => Some(self.p5),
            10 => Some(self.p10),
            25 => Some(self.p25),
            50 => Some(self.p50),
            75 => Some(self.p75),
            90 => Some(self.p90),
            95 => Some(self.p95),
            _ => None,
        }
    }

    /// Values in `PERCENTILE_RANKS` order.
    pub fn values(&self) -> [f64; 7] {
        [
            self.p5, self.p10, self.p25, self.p50, self.p75, self.p90, self.p95,
        ]
    }
}

impl Serialize for Percentiles {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(PERCENTILE_RANKS.iter().zip(self.values()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub percentiles: Percentiles,
    pub success_rate_pct: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub final_values: Vec<f64>,
}

impl SimulationResult {
    /// Drops the raw trial outcomes, keeping the summary for reporting.
    pub fn without_trials(mut self) -> Self {
        self.final_values = Vec::new();
        self
    }
}
