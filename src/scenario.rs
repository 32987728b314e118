use crate::aggregate::MeterProfile;
use crate::error::{Result, SimulationError};
use crate::models::{Formula, ScenarioCandidate, SubscribedPower};

/// Regime boundary: below 36 kVA a subscription holds one power, at or
/// above it one power per quadrant.
pub const POWER_REGIME_FLOOR_KVA: u16 = 36;

pub const DEFAULT_POWER_MIN_KVA: u16 = 3;
pub const DEFAULT_POWER_MAX_KVA: u16 = 250;

/// The subscription a meter already holds, costed alongside the generated
/// candidates for comparison.
#[derive(Debug, Clone)]
pub struct CurrentConfiguration {
    pub formula: Formula,
    pub power: SubscribedPower,
}

impl CurrentConfiguration {
    pub fn new(formula: Formula, power: SubscribedPower) -> Self {
        Self { formula, power }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(SimulationError::CurrentConfig(msg));
        match (self.formula.per_quadrant_power(), self.power) {
            (false, SubscribedPower::Single(p)) => {
                if p < 1 || p >= POWER_REGIME_FLOOR_KVA {
                    return fail(format!(
                        "{} requires a single power between 1 and {} kVA, got {}",
                        self.formula,
                        POWER_REGIME_FLOOR_KVA - 1,
                        p
                    ));
                }
            }
            (true, SubscribedPower::PerQuadrant(ps)) => {
                if !self.power.is_ordered() {
                    return fail(format!(
                        "{} powers must be non-decreasing HPH..HCB, got {}",
                        self.formula, self.power
                    ));
                }
                if ps[0] < POWER_REGIME_FLOOR_KVA {
                    return fail(format!(
                        "{} powers start at {} kVA, got {}",
                        self.formula, POWER_REGIME_FLOOR_KVA, self.power
                    ));
                }
            }
            (true, SubscribedPower::Single(_)) => {
                return fail(format!(
                    "{} takes four per-quadrant powers, got a single one",
                    self.formula
                ));
            }
            (false, SubscribedPower::PerQuadrant(_)) => {
                return fail(format!(
                    "{} takes a single power, got four",
                    self.formula
                ));
            }
        }
        Ok(())
    }
}

/// Per-quadrant power candidates by proportional simultaneous reduction.
///
/// The quadrant peaks are first ceiled and cascaded so each power is at
/// least the floor and at least the previous quadrant's power, then all
/// four are walked down together one kVA at a time until the lowest hits
/// the floor. The common decrement keeps every candidate ordered. The walk
/// assumes the load shape is similar across quadrants; it does not explore
/// independent per-quadrant reductions.
pub fn per_quadrant_candidates(pmax_by_quadrant: [f64; 4]) -> Vec<[u16; 4]> {
    let floor = POWER_REGIME_FLOOR_KVA;

    let mut base = [0u16; 4];
    for (i, pmax) in pmax_by_quadrant.iter().enumerate() {
        base[i] = pmax.ceil() as u16;
    }
    base[0] = base[0].max(floor);
    for i in 1..4 {
        base[i] = base[i].max(base[i - 1]);
    }

    let iterations = base[0] - floor + 1;
    (0..iterations)
        .map(|step| {
            let mut powers = [0u16; 4];
            for (i, b) in base.iter().enumerate() {
                powers[i] = (b - step).max(floor);
            }
            powers
        })
        .collect()
}

/// Builds the candidate set for one meter: an integer power sweep crossed
/// with the single-power formulas below the floor, the reduction walk
/// crossed with the per-quadrant formulas above it, plus the tagged current
/// configuration.
pub struct ScenarioGenerator {
    power_min: u16,
    power_max: u16,
}

impl ScenarioGenerator {
    pub fn new(power_min: u16, power_max: u16) -> Self {
        Self {
            power_min,
            power_max,
        }
    }

    pub fn generate(
        &self,
        profile: &MeterProfile,
        current: Option<&CurrentConfiguration>,
    ) -> Result<Vec<ScenarioCandidate>> {
        let mut candidates = Vec::new();
        let meter_id = profile.meter_id.as_str();

        // Single-power sweep, skipping powers the meter already peaks above.
        let single_max = self.power_max.min(POWER_REGIME_FLOOR_KVA - 1);
        let peak_kva = profile.pmax_kva();
        for power in self.power_min..=single_max {
            if f64::from(power) < peak_kva {
                continue;
            }
            for formula in Formula::SINGLE_POWER {
                candidates.push(ScenarioCandidate::new(
                    meter_id,
                    formula,
                    SubscribedPower::Single(power),
                ));
            }
        }

        if self.power_max >= POWER_REGIME_FLOOR_KVA {
            for powers in per_quadrant_candidates(profile.pmax_by_quadrant()) {
                for formula in Formula::PER_QUADRANT {
                    candidates.push(ScenarioCandidate::new(
                        meter_id,
                        formula,
                        SubscribedPower::PerQuadrant(powers),
                    ));
                }
            }
        }

        if let Some(current) = current {
            current.validate()?;
            candidates.push(ScenarioCandidate::current(
                meter_id,
                current.formula,
                current.power,
            ));
        }

        Ok(candidates)
    }
}
