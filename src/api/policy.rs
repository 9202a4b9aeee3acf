use crate::core::ProjectionParameters;

pub const MIN_RETURN_RATE_PCT: f64 = 0.1;
pub const MAX_RETURN_RATE_PCT: f64 = 15.0;
pub const OPTIMISTIC_RETURN_RATE_PCT: f64 = 8.0;
pub const MIN_MONTHLY_EXPENSES: f64 = 50_000.0;
pub const MAX_MONTHLY_EXPENSES: f64 = 1_000_000.0;
pub const MIN_PURCHASE_COST: f64 = 500_000.0;
pub const MAX_PURCHASE_COST: f64 = 10_000_000.0;

/// Sanity bands applied to user input before it reaches the engine. These are
/// house rules for the planner surfaces, not engine invariants.
///
/// Returns advisory warnings on success.
pub fn check_plan_policy(params: &ProjectionParameters) -> Result<Vec<String>, String> {
    if !(MIN_RETURN_RATE_PCT..=MAX_RETURN_RATE_PCT).contains(&params.return_rate_pct) {
        return Err(format!(
            "returnRatePct must be between {MIN_RETURN_RATE_PCT}% and {MAX_RETURN_RATE_PCT}%"
        ));
    }
    if params.life_expectancy_age < params.current_age {
        return Err(format!(
            "lifeExpectancyAge must be >= currentAge ({})",
            params.current_age
        ));
    }
    if !(MIN_MONTHLY_EXPENSES..=MAX_MONTHLY_EXPENSES).contains(&params.monthly_expenses) {
        return Err(format!(
            "monthlyExpenses must be between {MIN_MONTHLY_EXPENSES} and {MAX_MONTHLY_EXPENSES}"
        ));
    }
    if params.purchase_year.is_some()
        && !(MIN_PURCHASE_COST..=MAX_PURCHASE_COST).contains(&params.purchase_cost_today)
    {
        return Err(format!(
            "purchaseCostToday must be between {MIN_PURCHASE_COST} and {MAX_PURCHASE_COST}"
        ));
    }

    let mut warnings = Vec::new();
    if params.return_rate_pct > OPTIMISTIC_RETURN_RATE_PCT {
        warnings.push(format!(
            "returnRatePct above {OPTIMISTIC_RETURN_RATE_PCT}% is optimistic for a conservative-to-moderate profile"
        ));
    }
    if let Some(year) = params.purchase_year.filter(|year| *year > params.horizon_years) {
        warnings.push(format!(
            "purchaseYear {year} is beyond the {}-year horizon and will not be charged",
            params.horizon_years
        ));
    }
    Ok(warnings)
}
