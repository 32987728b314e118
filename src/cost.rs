use crate::aggregate::MeterProfile;
use crate::error::{Result, SimulationError};
use crate::models::{CostResult, Formula, Quadrant, ScenarioCandidate, ValidityPeriod};
use crate::tariff::{RateProvider, RateSchedule};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Annual cost computation over pre-resolved rate schedules.
///
/// Construction resolves every formula the candidate set references, so a
/// failing rate lookup aborts before the first candidate is costed.
/// Evaluation itself is pure: same candidate, same profile, same schedules,
/// same result.
pub struct CostEngine {
    schedules: BTreeMap<Formula, RateSchedule>,
}

impl CostEngine {
    pub fn for_candidates(
        provider: &dyn RateProvider,
        period: ValidityPeriod,
        candidates: &[ScenarioCandidate],
    ) -> Result<Self> {
        let formulas: BTreeSet<Formula> = candidates.iter().map(|c| c.formula).collect();
        let mut schedules = BTreeMap::new();
        for formula in formulas {
            schedules.insert(formula, provider.rules_for(formula, period)?);
        }
        Ok(Self { schedules })
    }

    pub fn evaluate(
        &self,
        candidate: &ScenarioCandidate,
        profile: &MeterProfile,
    ) -> Result<CostResult> {
        let schedule = self.schedules.get(&candidate.formula).ok_or_else(|| {
            SimulationError::TariffRuleLookup(format!(
                "no schedule resolved for {}",
                candidate.formula
            ))
        })?;

        Ok(CostResult::new(
            candidate.clone(),
            fixed_cost(schedule, candidate),
            variable_cost(schedule, profile),
            overrun_cost(schedule, candidate, profile),
        ))
    }

    /// Costs every candidate against one meter profile, in input order.
    pub fn evaluate_all(
        &self,
        candidates: &[ScenarioCandidate],
        profile: &MeterProfile,
    ) -> Result<Vec<CostResult>> {
        candidates
            .par_iter()
            .map(|candidate| self.evaluate(candidate, profile))
            .collect()
    }
}

/// `(CG + CC + CS * total subscribed kVA) * (1 + CTA)`.
fn fixed_cost(schedule: &RateSchedule, candidate: &ScenarioCandidate) -> f64 {
    let subscription =
        schedule.subscription_coefficient * candidate.power.total_kva() as f64;
    (schedule.management_fee_eur + schedule.metering_fee_eur + subscription)
        * (1.0 + schedule.tax_rate)
}

/// Per-quadrant energy priced at the formula's rates, rates in c€/kWh.
fn variable_cost(schedule: &RateSchedule, profile: &MeterProfile) -> f64 {
    Quadrant::ALL
        .iter()
        .map(|&quadrant| {
            profile.quadrant(quadrant).energy_kwh * schedule.rates.rate(quadrant) / 100.0
        })
        .sum()
}

/// Overrun hours summed per quadrant, priced at CMDPS. Single-power
/// formulas are not overrun-liable and cost zero here.
fn overrun_cost(
    schedule: &RateSchedule,
    candidate: &ScenarioCandidate,
    profile: &MeterProfile,
) -> f64 {
    match candidate.power.quadrant_powers() {
        Some(powers) => {
            let hours: f64 = Quadrant::ALL
                .iter()
                .map(|&quadrant| {
                    profile
                        .quadrant(quadrant)
                        .overrun_curve
                        .hours_above(f64::from(powers[quadrant.index()]))
                })
                .sum();
            hours * schedule.overrun_rate_eur_per_hour
        }
        None => 0.0,
    }
}
