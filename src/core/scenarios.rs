use serde::Serialize;

use super::commitments::evaluate_commitments;
use super::engine::validate_projection;
use super::error::EngineResult;
use super::types::{BaseOutcome, ProjectionParameters};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioPreset {
    pub name: &'static str,
    pub return_rate_pct: f64,
    pub life_expectancy_age: u32,
    pub monthly_expenses: f64,
}

pub const SCENARIO_PRESETS: [ScenarioPreset; 4] = [
    ScenarioPreset {
        name: "Conservative",
        return_rate_pct: 3.0,
        life_expectancy_age: 90,
        monthly_expenses: 120_000.0,
    },
    ScenarioPreset {
        name: "Moderate",
        return_rate_pct: 4.0,
        life_expectancy_age: 90,
        monthly_expenses: 150_000.0,
    },
    ScenarioPreset {
        name: "Aggressive",
        return_rate_pct: 5.5,
        life_expectancy_age: 90,
        monthly_expenses: 180_000.0,
    },
    ScenarioPreset {
        name: "Stress Test",
        return_rate_pct: 2.5,
        life_expectancy_age: 95,
        monthly_expenses: 200_000.0,
    },
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioOutcome {
    pub preset: ScenarioPreset,
    pub outcome: BaseOutcome,
}

impl ScenarioPreset {
    /// `base` with this preset's rate, life expectancy and expenses applied.
    pub fn apply(&self, base: &ProjectionParameters) -> ProjectionParameters {
        ProjectionParameters {
            return_rate_pct: self.return_rate_pct,
            life_expectancy_age: self.life_expectancy_age,
            monthly_expenses: self.monthly_expenses,
            ..base.clone()
        }
    }
}

pub fn evaluate_scenarios(base: &ProjectionParameters) -> EngineResult<Vec<ScenarioOutcome>> {
    SCENARIO_PRESETS
        .iter()
        .map(|preset| {
            let params = preset.apply(base);
            validate_projection(&params)?;
            Ok(ScenarioOutcome {
                preset: *preset,
                outcome: evaluate_commitments(&params)?,
            })
        })
        .collect()
}
