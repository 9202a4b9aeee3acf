use super::error::{EngineResult, ensure_finite};
use super::types::{BaseOutcome, PlanStatus, ProjectionParameters};

/// Below this share of total wealth the plan is flagged for attention.
pub const ATTENTION_THRESHOLD_PCT: f64 = 5.0;

/// Present value of a level monthly payment over `years`, discounted at an
/// annual rate converted to its monthly equivalent.
pub fn present_value(monthly_amount: f64, years: u32, annual_rate_pct: f64) -> f64 {
    let periods = f64::from(years) * 12.0;
    if annual_rate_pct <= 0.0 {
        return monthly_amount * periods;
    }
    let monthly_rate = (1.0 + annual_rate_pct / 100.0).powf(1.0 / 12.0) - 1.0;
    if monthly_rate <= 0.0 {
        return monthly_amount * periods;
    }
    monthly_amount * (1.0 - (1.0 + monthly_rate).powf(-periods)) / monthly_rate
}

pub fn plan_status(available_for_goal: f64, percent_of_wealth: f64) -> PlanStatus {
    if available_for_goal < 0.0 {
        PlanStatus::Critical
    } else if percent_of_wealth < ATTENTION_THRESHOLD_PCT {
        PlanStatus::Attention
    } else {
        PlanStatus::Viable
    }
}

/// Values the fixed commitments at the parameters' return rate and reports
/// what remains for the discretionary goal.
pub fn evaluate_commitments(params: &ProjectionParameters) -> EngineResult<BaseOutcome> {
    ensure_finite("returnRatePct", params.return_rate_pct)?;
    Ok(evaluate_at_rate(params, params.return_rate_pct))
}

pub(crate) fn evaluate_at_rate(params: &ProjectionParameters, rate_pct: f64) -> BaseOutcome {
    let expenses = present_value(params.monthly_expenses, params.life_years(), rate_pct);

    let deferral = params
        .children_income_start
        .deferral_years(params.current_age, params.life_expectancy_age);
    let discount = (1.0 + rate_pct / 100.0).powf(-f64::from(deferral));
    let dependents = present_value(
        params.monthly_dependent_income,
        params.dependent_income_years,
        rate_pct,
    ) * discount;

    let donations = present_value(
        params.monthly_donations,
        params.effective_donation_years(),
        rate_pct,
    );

    let total_commitments = expenses + dependents + donations;
    let available_for_goal = params.initial_wealth - total_commitments;
    let percent_of_wealth = share_of(available_for_goal, params.initial_wealth);
    let art_reserve = (available_for_goal - params.purchase_cost_today).max(0.0);

    BaseOutcome {
        return_rate_pct: rate_pct,
        initial_wealth: params.initial_wealth,
        expenses,
        dependents,
        donations,
        total_commitments,
        available_for_goal,
        percent_of_wealth,
        art_reserve,
        percent_art_reserve: share_of(art_reserve, params.initial_wealth),
        status: plan_status(available_for_goal, percent_of_wealth),
    }
}

pub(crate) fn share_of(amount: f64, whole: f64) -> f64 {
    if whole > 0.0 { amount / whole * 100.0 } else { 0.0 }
}
