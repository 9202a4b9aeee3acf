//! Target allocation weights per projection year.
//!
//! Weights start from a fixed preset per investment profile, de-risk by age
//! after 60, and build a liquidity reserve as a scheduled purchase approaches.
//! None of this feeds back into the wealth arithmetic of the projector.

use serde::Serialize;
use serde::ser::Serializer;

use super::types::InvestmentProfile;

pub const BASE_LIQUIDITY_PCT: f64 = 2.0;
const AGE_SHIFT_START: u32 = 60;
const AGE_SHIFT_PER_YEAR: f64 = 0.5;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetClass {
    DomesticFixedIncome,
    InternationalFixedIncome,
    Multimarket,
    DomesticEquity,
    InternationalEquity,
    RealEstate,
    Liquidity,
}

impl AssetClass {
    pub const ALL: [AssetClass; 7] = [
        AssetClass::DomesticFixedIncome,
        AssetClass::InternationalFixedIncome,
        AssetClass::Multimarket,
        AssetClass::DomesticEquity,
        AssetClass::InternationalEquity,
        AssetClass::RealEstate,
        AssetClass::Liquidity,
    ];

    const EQUITIES: [AssetClass; 2] = [AssetClass::DomesticEquity, AssetClass::InternationalEquity];

    const NON_EQUITY_FUNDING: [AssetClass; 4] = [
        AssetClass::DomesticFixedIncome,
        AssetClass::InternationalFixedIncome,
        AssetClass::Multimarket,
        AssetClass::RealEstate,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Percentage per asset class. Serializes as a map keyed by asset class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationWeights {
    weights: [f64; 7],
}

impl AllocationWeights {
    fn from_preset(weights: [f64; 7]) -> Self {
        Self { weights }
    }

    pub fn get(&self, class: AssetClass) -> f64 {
        self.weights[class.index()]
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetClass, f64)> + '_ {
        AssetClass::ALL.iter().map(|class| (*class, self.get(*class)))
    }

    fn sum_of(&self, classes: &[AssetClass]) -> f64 {
        classes.iter().map(|class| self.get(*class)).sum()
    }

    fn add(&mut self, class: AssetClass, amount: f64) {
        self.weights[class.index()] += amount;
    }

    /// Removes up to `amount` points from `classes`, pro rata to their current
    /// weights. Returns the points actually removed.
    fn take_proportionally(&mut self, classes: &[AssetClass], amount: f64) -> f64 {
        let pool = self.sum_of(classes);
        if pool <= 0.0 || amount <= 0.0 {
            return 0.0;
        }
        let taken = amount.min(pool);
        for class in classes {
            let share = self.get(*class) / pool;
            self.weights[class.index()] -= share * taken;
        }
        taken
    }

    fn renormalize(&mut self) {
        let total = self.total();
        if total <= 0.0 {
            return;
        }
        let scale = 100.0 / total;
        for weight in &mut self.weights {
            *weight = (*weight * scale).max(0.0);
        }
    }
}

impl Serialize for AllocationWeights {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlidePathYear {
    pub offset_years: u32,
    /// Age at the start of the year; drives the age shift.
    pub age: u32,
    pub weights: AllocationWeights,
}

pub fn base_weights(profile: InvestmentProfile) -> AllocationWeights {
    // Order follows AssetClass::ALL.
    match profile {
        InvestmentProfile::Conservative => {
            AllocationWeights::from_preset([50.0, 18.0, 12.0, 7.0, 6.0, 5.0, BASE_LIQUIDITY_PCT])
        }
        InvestmentProfile::Moderate => {
            AllocationWeights::from_preset([40.0, 15.0, 15.0, 11.0, 11.0, 6.0, BASE_LIQUIDITY_PCT])
        }
        InvestmentProfile::Balanced => {
            AllocationWeights::from_preset([30.0, 13.0, 15.0, 17.0, 17.0, 6.0, BASE_LIQUIDITY_PCT])
        }
    }
}

pub fn weights_for_year(
    profile: InvestmentProfile,
    current_age: u32,
    offset_years: u32,
    purchase_year: Option<u32>,
) -> AllocationWeights {
    let mut weights = base_weights(profile);
    apply_age_shift(&mut weights, current_age.saturating_add(offset_years));
    if let Some(target) = liquidity_target(offset_years, purchase_year) {
        raise_liquidity(&mut weights, target);
    }
    weights.renormalize();
    weights
}

pub fn glide_path(
    profile: InvestmentProfile,
    current_age: u32,
    horizon_years: u32,
    purchase_year: Option<u32>,
) -> Vec<GlidePathYear> {
    (0..horizon_years)
        .map(|offset_years| GlidePathYear {
            offset_years,
            age: current_age.saturating_add(offset_years),
            weights: weights_for_year(profile, current_age, offset_years, purchase_year),
        })
        .collect()
}

fn apply_age_shift(weights: &mut AllocationWeights, age: u32) {
    if age <= AGE_SHIFT_START {
        return;
    }
    let wanted = AGE_SHIFT_PER_YEAR * f64::from(age - AGE_SHIFT_START);
    let domestic = weights.get(AssetClass::DomesticFixedIncome);
    let international = weights.get(AssetClass::InternationalFixedIncome);
    let fixed_income = domestic + international;

    let moved = weights.take_proportionally(&AssetClass::EQUITIES, wanted);
    if fixed_income > 0.0 {
        weights.add(AssetClass::DomesticFixedIncome, moved * domestic / fixed_income);
        weights.add(
            AssetClass::InternationalFixedIncome,
            moved * international / fixed_income,
        );
    } else {
        weights.add(AssetClass::DomesticFixedIncome, moved);
    }
}

/// Liquidity band for the year, or `None` when the base reserve applies.
fn liquidity_target(offset_years: u32, purchase_year: Option<u32>) -> Option<f64> {
    let purchase_year = f64::from(purchase_year?);
    let years_remaining = purchase_year - f64::from(offset_years);
    if years_remaining <= 0.0 || years_remaining > 0.6 * purchase_year {
        None
    } else if years_remaining > 0.4 * purchase_year {
        Some(4.0)
    } else if years_remaining > 0.2 * purchase_year {
        Some(8.0)
    } else {
        Some(15.0)
    }
}

fn raise_liquidity(weights: &mut AllocationWeights, target: f64) {
    let deficit = target - weights.get(AssetClass::Liquidity);
    if deficit <= 0.0 {
        return;
    }
    let from_equities = weights.take_proportionally(&AssetClass::EQUITIES, deficit);
    // Equities alone may not cover the band once the age shift has drained them.
    let from_others =
        weights.take_proportionally(&AssetClass::NON_EQUITY_FUNDING, deficit - from_equities);
    weights.add(AssetClass::Liquidity, from_equities + from_others);
}
