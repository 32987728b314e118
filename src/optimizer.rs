use crate::models::{CostResult, Formula, SubscribedPower};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Current subscription versus the cheapest generated candidate.
#[derive(Debug, Clone, Serialize)]
pub struct SavingsComparison {
    pub current_cost_eur: f64,
    pub optimal_cost_eur: f64,
    pub savings_eur: f64,
    pub savings_pct: f64,
}

fn hph_power(result: &CostResult) -> u16 {
    match result.candidate.power {
        SubscribedPower::Single(p) => p,
        SubscribedPower::PerQuadrant(ps) => ps[0],
    }
}

/// Ordering used everywhere a winner is picked: lower total cost first;
/// ties go to the smaller total subscribed power, then the lower HPH power,
/// then formula code order, so equal inputs always elect the same winner.
fn candidate_order(a: &CostResult, b: &CostResult) -> Ordering {
    a.total_cost
        .total_cmp(&b.total_cost)
        .then_with(|| a.candidate.power.total_kva().cmp(&b.candidate.power.total_kva()))
        .then_with(|| hph_power(a).cmp(&hph_power(b)))
        .then_with(|| a.candidate.formula.code().cmp(b.candidate.formula.code()))
}

/// Cheapest non-current candidate over the whole result set.
pub fn global_optimum(results: &[CostResult]) -> Option<&CostResult> {
    results
        .iter()
        .filter(|r| !r.candidate.is_current)
        .min_by(|a, b| candidate_order(a, b))
}

/// Cheapest non-current candidate per (meter, formula), sorted by rising
/// cost. This is the comparison table of the final report.
pub fn optima_by_formula(results: &[CostResult]) -> Vec<&CostResult> {
    let mut best: BTreeMap<(&str, Formula), &CostResult> = BTreeMap::new();
    for result in results.iter().filter(|r| !r.candidate.is_current) {
        let key = (result.candidate.meter_id.as_str(), result.candidate.formula);
        best.entry(key)
            .and_modify(|held| {
                if candidate_order(result, held) == Ordering::Less {
                    *held = result;
                }
            })
            .or_insert(result);
    }

    let mut table: Vec<&CostResult> = best.into_values().collect();
    table.sort_by(|a, b| candidate_order(a, b));
    table
}

/// Savings of the global optimum against the tagged current configuration,
/// if one was supplied.
pub fn compare_with_current(results: &[CostResult]) -> Option<SavingsComparison> {
    let current = results.iter().find(|r| r.candidate.is_current)?;
    let optimum = global_optimum(results)?;

    let savings_eur = current.total_cost - optimum.total_cost;
    let savings_pct = if current.total_cost != 0.0 {
        savings_eur / current.total_cost * 100.0
    } else {
        0.0
    };
    Some(SavingsComparison {
        current_cost_eur: current.total_cost,
        optimal_cost_eur: optimum.total_cost,
        savings_eur,
        savings_pct,
    })
}
