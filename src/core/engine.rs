use tracing::debug;

use super::commitments::evaluate_at_rate;
use super::error::{EngineError, EngineResult, ensure_finite, ensure_non_negative_amount};
use super::types::{BaseOutcome, ProjectionParameters, YearlyProjectionRecord};

#[derive(Debug, Clone)]
pub struct Projection {
    pub records: Vec<YearlyProjectionRecord>,
    pub base_outcome: BaseOutcome,
}

impl Projection {
    pub fn terminal_wealth(&self) -> Option<f64> {
        self.records.last().map(|r| r.wealth)
    }

    /// First calendar year in which wealth was exhausted, if it ever was.
    pub fn depletion_year(&self) -> Option<i32> {
        self.records.iter().find(|r| r.depleted).map(|r| r.year)
    }

    pub fn total_outflows(&self) -> f64 {
        self.records.iter().map(|r| r.outflows).sum()
    }
}

pub fn validate_projection(params: &ProjectionParameters) -> EngineResult<()> {
    ensure_finite("returnRatePct", params.return_rate_pct)?;
    if params.return_rate_pct <= -100.0 {
        return Err(EngineError::invalid("returnRatePct", "must be > -100"));
    }
    ensure_finite("inflationRatePct", params.inflation_rate_pct)?;
    if params.inflation_rate_pct <= -100.0 {
        return Err(EngineError::invalid("inflationRatePct", "must be > -100"));
    }
    ensure_non_negative_amount("initialWealth", params.initial_wealth)?;
    ensure_non_negative_amount("monthlyExpenses", params.monthly_expenses)?;
    ensure_non_negative_amount("monthlyDependentIncome", params.monthly_dependent_income)?;
    ensure_non_negative_amount("monthlyDonations", params.monthly_donations)?;
    ensure_non_negative_amount("purchaseCostToday", params.purchase_cost_today)?;
    let horizon = i32::try_from(params.horizon_years)
        .map_err(|_| EngineError::invalid("horizonYears", "must fit in a calendar year"))?;
    if params.start_year.checked_add(horizon).is_none() {
        return Err(EngineError::invalid(
            "startYear",
            "startYear + horizonYears overflows the calendar",
        ));
    }
    Ok(())
}

pub fn project(params: &ProjectionParameters) -> EngineResult<Projection> {
    validate_projection(params)?;

    let rate = params.return_rate_pct / 100.0;
    let purchase_cost = params.future_purchase_cost();
    let donation_years = params.effective_donation_years();

    let mut wealth = params.initial_wealth;
    let mut depleted = false;
    let mut records = Vec::with_capacity(params.horizon_years as usize);

    for offset in 0..params.horizon_years {
        let age = params.current_age.saturating_add(offset + 1);
        let subject_alive = age <= params.life_expectancy_age;

        let earnings = wealth * rate;

        let expense_outflow = if subject_alive {
            params.monthly_expenses * 12.0
        } else {
            0.0
        };
        let dependent_outflow = if params.children_income_start.is_active(age, subject_alive) {
            params.monthly_dependent_income * 12.0
        } else {
            0.0
        };
        let donation_outflow = if offset < donation_years {
            params.monthly_donations * 12.0
        } else {
            0.0
        };
        let is_purchase_year = params
            .purchase_year
            .is_some_and(|year| is_purchase_offset(year, offset));
        let purchase_outflow = match purchase_cost {
            Some(cost) if is_purchase_year => cost,
            _ => 0.0,
        };

        let outflows = expense_outflow + dependent_outflow + donation_outflow + purchase_outflow;
        let net_flow = earnings - outflows;
        wealth = (wealth + net_flow).max(0.0);
        if wealth == 0.0 {
            depleted = true;
        }

        records.push(YearlyProjectionRecord {
            // Bounded by validate_projection.
            year: params.start_year + offset as i32,
            age,
            wealth,
            earnings,
            outflows,
            net_flow,
            subject_alive,
            is_purchase_year,
            depleted,
            expense_outflow,
            dependent_outflow,
            donation_outflow,
            purchase_outflow,
        });
    }

    let base_outcome = evaluate_at_rate(params, params.return_rate_pct);
    debug!(
        years = records.len(),
        terminal_wealth = records.last().map(|r| r.wealth).unwrap_or(params.initial_wealth),
        available_for_goal = base_outcome.available_for_goal,
        "projection complete"
    );

    Ok(Projection {
        records,
        base_outcome,
    })
}

fn is_purchase_offset(purchase_year: u32, offset: u32) -> bool {
    if purchase_year == 0 {
        offset == 0
    } else {
        offset + 1 == purchase_year
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ChildrenIncomeStart;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn quiet_params() -> ProjectionParameters {
        ProjectionParameters {
            return_rate_pct: 5.0,
            life_expectancy_age: 90,
            monthly_expenses: 0.0,
            monthly_dependent_income: 0.0,
            monthly_donations: 0.0,
            initial_wealth: 1_000.0,
            horizon_years: 3,
            ..ProjectionParameters::default()
        }
    }

    #[test]
    fn compounding_without_outflows_matches_closed_form() {
        let projection = project(&quiet_params()).expect("valid parameters");
        assert_eq!(projection.records.len(), 3);
        assert_close(projection.records[0].earnings, 50.0, 1e-9);
        assert_close(projection.records[2].wealth, 1_000.0 * 1.05_f64.powi(3), 1e-9);
        assert!(projection.records.iter().all(|r| !r.depleted));
    }

    #[test]
    fn records_carry_calendar_year_and_age() {
        let projection = project(&quiet_params()).expect("valid parameters");
        assert_eq!(projection.records[0].year, 2025);
        assert_eq!(projection.records[0].age, 54);
        assert_eq!(projection.records[2].year, 2027);
        assert_eq!(projection.records[2].age, 56);
    }

    #[test]
    fn purchase_cost_is_inflated_and_charged_once() {
        let params = ProjectionParameters {
            purchase_cost_today: 2_000_000.0,
            purchase_year: Some(15),
            horizon_years: 30,
            ..ProjectionParameters::default()
        };
        let projection = project(&params).expect("valid parameters");
        let purchases: Vec<_> = projection
            .records
            .iter()
            .filter(|r| r.is_purchase_year)
            .collect();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].year, 2025 + 14);
        assert_close(
            purchases[0].purchase_outflow,
            2_000_000.0 * 1.035_f64.powi(15),
            1.0,
        );
        let charged: f64 = projection.records.iter().map(|r| r.purchase_outflow).sum();
        assert_close(charged, purchases[0].purchase_outflow, 1e-9);
    }

    #[test]
    fn immediate_purchase_lands_in_first_record_at_todays_cost() {
        let params = ProjectionParameters {
            purchase_cost_today: 3_000_000.0,
            purchase_year: Some(0),
            ..ProjectionParameters::default()
        };
        let projection = project(&params).expect("valid parameters");
        assert!(projection.records[0].is_purchase_year);
        assert_close(projection.records[0].purchase_outflow, 3_000_000.0, 1e-9);
        assert!(projection.records[1..].iter().all(|r| !r.is_purchase_year));
    }

    #[test]
    fn purchase_beyond_horizon_is_never_charged() {
        let params = ProjectionParameters {
            purchase_cost_today: 3_000_000.0,
            purchase_year: Some(40),
            horizon_years: 20,
            ..ProjectionParameters::default()
        };
        let projection = project(&params).expect("valid parameters");
        assert!(projection.records.iter().all(|r| !r.is_purchase_year));
    }

    #[test]
    fn no_purchase_year_means_no_purchase_term() {
        let params = ProjectionParameters {
            purchase_cost_today: 5_000_000.0,
            purchase_year: None,
            ..ProjectionParameters::default()
        };
        let projection = project(&params).expect("valid parameters");
        assert!(projection.records.iter().all(|r| !r.is_purchase_year));
        assert!(projection.records.iter().all(|r| r.purchase_outflow == 0.0));
        let streams: f64 = projection
            .records
            .iter()
            .map(|r| r.expense_outflow + r.dependent_outflow + r.donation_outflow)
            .sum();
        assert_close(projection.total_outflows(), streams, 1e-6);
    }

    #[test]
    fn life_expectancy_equal_to_current_age_disables_expenses() {
        let params = ProjectionParameters {
            life_expectancy_age: 53,
            current_age: 53,
            ..ProjectionParameters::default()
        };
        let projection = project(&params).expect("valid parameters");
        assert!(projection.records.iter().all(|r| !r.subject_alive));
        assert!(projection.records.iter().all(|r| r.expense_outflow == 0.0));
    }

    #[test]
    fn life_expectancy_below_current_age_is_accepted() {
        let params = ProjectionParameters {
            life_expectancy_age: 40,
            ..ProjectionParameters::default()
        };
        let projection = project(&params).expect("valid parameters");
        assert!(!projection.records[0].subject_alive);
    }

    #[test]
    fn subject_alive_flips_once() {
        let params = ProjectionParameters {
            life_expectancy_age: 60,
            ..ProjectionParameters::default()
        };
        let projection = project(&params).expect("valid parameters");
        let flips = projection
            .records
            .windows(2)
            .filter(|w| w[0].subject_alive != w[1].subject_alive)
            .count();
        assert_eq!(flips, 1);
        let last_alive = projection
            .records
            .iter()
            .rfind(|r| r.subject_alive)
            .expect("alive for some years");
        assert_eq!(last_alive.age, 60);
    }

    #[test]
    fn dependent_income_follows_start_rule() {
        let fixed = ProjectionParameters {
            children_income_start: ChildrenIncomeStart::FixedAge(65),
            ..ProjectionParameters::default()
        };
        let projection = project(&fixed).expect("valid parameters");
        for r in &projection.records {
            let expected = if r.age >= 65 { 150_000.0 * 12.0 } else { 0.0 };
            assert_close(r.dependent_outflow, expected, 1e-9);
        }

        let at_death = ProjectionParameters {
            children_income_start: ChildrenIncomeStart::AtDeath,
            life_expectancy_age: 70,
            ..ProjectionParameters::default()
        };
        let projection = project(&at_death).expect("valid parameters");
        for r in &projection.records {
            assert_eq!(r.dependent_outflow > 0.0, !r.subject_alive);
        }
    }

    #[test]
    fn donations_stop_after_configured_years() {
        let projection = project(&ProjectionParameters::default()).expect("valid parameters");
        assert!(projection.records[14].donation_outflow > 0.0);
        assert_close(projection.records[15].donation_outflow, 0.0, 1e-9);

        let forever = ProjectionParameters {
            donation_years: None,
            ..ProjectionParameters::default()
        };
        let projection = project(&forever).expect("valid parameters");
        assert!(projection.records.iter().all(|r| r.donation_outflow > 0.0));
    }

    #[test]
    fn wealth_clamps_to_zero_and_stays_depleted() {
        let params = ProjectionParameters {
            initial_wealth: 1_000_000.0,
            horizon_years: 10,
            ..ProjectionParameters::default()
        };
        let projection = project(&params).expect("valid parameters");
        assert!(projection.records.iter().all(|r| r.wealth >= 0.0));
        assert_eq!(projection.depletion_year(), Some(2025));
        let first = projection
            .records
            .iter()
            .position(|r| r.depleted)
            .expect("depleted");
        assert!(projection.records[first..].iter().all(|r| r.depleted));
        assert!(projection.records[first..].iter().all(|r| r.wealth == 0.0));
        assert!(projection.records[first + 1..].iter().all(|r| r.earnings == 0.0));
    }

    #[test]
    fn net_flow_is_earnings_minus_outflows() {
        let projection = project(&ProjectionParameters::default()).expect("valid parameters");
        for r in &projection.records {
            assert_close(r.net_flow, r.earnings - r.outflows, 1e-6);
        }
    }

    #[test]
    fn base_outcome_is_valued_at_projection_rate() {
        let projection = project(&ProjectionParameters::default()).expect("valid parameters");
        assert_close(projection.base_outcome.return_rate_pct, 4.0, 1e-12);
        assert!(projection.base_outcome.total_commitments > 0.0);
    }

    #[test]
    fn rejects_invalid_parameters_before_running() {
        let bad_rate = ProjectionParameters {
            return_rate_pct: -100.0,
            ..ProjectionParameters::default()
        };
        assert!(matches!(
            project(&bad_rate),
            Err(EngineError::InvalidParameter {
                field: "returnRatePct",
                ..
            })
        ));

        let negative_expenses = ProjectionParameters {
            monthly_expenses: -1.0,
            ..ProjectionParameters::default()
        };
        assert!(matches!(
            project(&negative_expenses),
            Err(EngineError::InvalidParameter {
                field: "monthlyExpenses",
                ..
            })
        ));

        let negative_purchase = ProjectionParameters {
            purchase_cost_today: -5.0,
            ..ProjectionParameters::default()
        };
        assert!(project(&negative_purchase).is_err());
    }

    #[test]
    fn calendar_overflow_is_rejected() {
        let params = ProjectionParameters {
            start_year: i32::MAX,
            horizon_years: 3,
            ..quiet_params()
        };
        let err = project(&params).expect_err("year overflows");
        assert!(matches!(
            err,
            EngineError::InvalidParameter {
                field: "startYear",
                ..
            }
        ));

        let params = ProjectionParameters {
            horizon_years: u32::MAX,
            ..quiet_params()
        };
        assert!(matches!(
            validate_projection(&params),
            Err(EngineError::InvalidParameter {
                field: "horizonYears",
                ..
            })
        ));

        let params = ProjectionParameters {
            start_year: i32::MAX - 3,
            horizon_years: 3,
            ..quiet_params()
        };
        let projection = project(&params).expect("last year still fits");
        assert_eq!(projection.records[2].year, i32::MAX - 1);
    }

    #[test]
    fn zero_horizon_yields_no_records() {
        let params = ProjectionParameters {
            horizon_years: 0,
            ..ProjectionParameters::default()
        };
        let projection = project(&params).expect("valid parameters");
        assert!(projection.records.is_empty());
        assert!(projection.terminal_wealth().is_none());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_wealth_is_never_negative(
            rate_bp in -5_000i32..2_000,
            life_expectancy in 40u32..110,
            monthly_expenses in 0u32..1_000_000,
            initial_wealth in 0u32..100_000_000,
            purchase in proptest::option::of(0u32..40),
            purchase_cost in 0u32..10_000_000,
            horizon in 1u32..50,
        ) {
            let params = ProjectionParameters {
                return_rate_pct: rate_bp as f64 / 100.0,
                life_expectancy_age: life_expectancy,
                monthly_expenses: monthly_expenses as f64,
                initial_wealth: initial_wealth as f64,
                purchase_year: purchase,
                purchase_cost_today: purchase_cost as f64,
                horizon_years: horizon,
                ..ProjectionParameters::default()
            };
            let projection = project(&params).expect("valid parameters");
            prop_assert!(projection.records.len() == horizon as usize);
            let mut seen_depleted = false;
            for r in &projection.records {
                prop_assert!(r.wealth >= 0.0);
                prop_assert!(!seen_depleted || r.depleted);
                seen_depleted = r.depleted;
            }
            for w in projection.records.windows(2) {
                prop_assert!(w[0].year < w[1].year);
            }
        }
    }
}
