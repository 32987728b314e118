use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tariff season: H covers November through March, B the rest of the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    #[serde(rename = "H")]
    High,
    #[serde(rename = "B")]
    Low,
}

impl Season {
    pub fn code(&self) -> &'static str {
        match self {
            Season::High => "H",
            Season::Low => "B",
        }
    }
}

/// Daily tariff period: HP (peak) or HC (off-peak).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "HP")]
    Peak,
    #[serde(rename = "HC")]
    OffPeak,
}

impl Period {
    pub fn code(&self) -> &'static str {
        match self {
            Period::Peak => "HP",
            Period::OffPeak => "HC",
        }
    }
}

/// The four billing time-buckets, period crossed with season.
///
/// `ALL` lists them in the order the per-quadrant power cascade uses
/// (HPH first, HCB last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Quadrant {
    Hph,
    Hch,
    Hpb,
    Hcb,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [Quadrant::Hph, Quadrant::Hch, Quadrant::Hpb, Quadrant::Hcb];

    pub fn from_parts(period: Period, season: Season) -> Self {
        match (period, season) {
            (Period::Peak, Season::High) => Quadrant::Hph,
            (Period::OffPeak, Season::High) => Quadrant::Hch,
            (Period::Peak, Season::Low) => Quadrant::Hpb,
            (Period::OffPeak, Season::Low) => Quadrant::Hcb,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Quadrant::Hph => "HPH",
            Quadrant::Hch => "HCH",
            Quadrant::Hpb => "HPB",
            Quadrant::Hcb => "HCB",
        }
    }

    /// Position in the cascade order, usable as an index into `[_; 4]` tables.
    pub fn index(&self) -> usize {
        match self {
            Quadrant::Hph => 0,
            Quadrant::Hch => 1,
            Quadrant::Hpb => 2,
            Quadrant::Hcb => 3,
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Grid-access tariff formulas (FTA). BTINF variants subscribe one power
/// below 36 kVA; BTSUP variants subscribe four ordered per-quadrant powers
/// and are liable for overrun penalties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Formula {
    BtInfCu4,
    BtInfMu4,
    BtInfLu,
    BtSupCu,
    BtSupLu,
}

impl Formula {
    pub const SINGLE_POWER: [Formula; 3] =
        [Formula::BtInfCu4, Formula::BtInfMu4, Formula::BtInfLu];
    pub const PER_QUADRANT: [Formula; 2] = [Formula::BtSupCu, Formula::BtSupLu];

    pub fn code(&self) -> &'static str {
        match self {
            Formula::BtInfCu4 => "BTINFCU4",
            Formula::BtInfMu4 => "BTINFMU4",
            Formula::BtInfLu => "BTINFLU",
            Formula::BtSupCu => "BTSUPCU",
            Formula::BtSupLu => "BTSUPLU",
        }
    }

    /// True for formulas with four per-quadrant subscribed powers, the only
    /// ones billed for overruns.
    pub fn per_quadrant_power(&self) -> bool {
        matches!(self, Formula::BtSupCu | Formula::BtSupLu)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Formula {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BTINFCU4" => Ok(Formula::BtInfCu4),
            "BTINFMU4" => Ok(Formula::BtInfMu4),
            "BTINFLU" => Ok(Formula::BtInfLu),
            "BTSUPCU" => Ok(Formula::BtSupCu),
            "BTSUPLU" => Ok(Formula::BtSupLu),
            other => Err(format!("unknown tariff formula '{}'", other)),
        }
    }
}

/// Subscribed power of a candidate: one value (BTINF) or four ordered
/// per-quadrant values in cascade order HPH, HCH, HPB, HCB (BTSUP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubscribedPower {
    Single(u16),
    PerQuadrant([u16; 4]),
}

impl SubscribedPower {
    /// Sum of the subscribed values, the base of the fixed-cost term.
    pub fn total_kva(&self) -> u32 {
        match self {
            SubscribedPower::Single(p) => *p as u32,
            SubscribedPower::PerQuadrant(ps) => ps.iter().map(|p| *p as u32).sum(),
        }
    }

    pub fn quadrant_powers(&self) -> Option<[u16; 4]> {
        match self {
            SubscribedPower::Single(_) => None,
            SubscribedPower::PerQuadrant(ps) => Some(*ps),
        }
    }

    /// Non-decreasing across the cascade order. Trivially true for a single
    /// power.
    pub fn is_ordered(&self) -> bool {
        match self {
            SubscribedPower::Single(_) => true,
            SubscribedPower::PerQuadrant(ps) => ps.windows(2).all(|w| w[0] <= w[1]),
        }
    }
}

impl fmt::Display for SubscribedPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscribedPower::Single(p) => write!(f, "{}", p),
            SubscribedPower::PerQuadrant(ps) => {
                write!(f, "{}/{}/{}/{}", ps[0], ps[1], ps[2], ps[3])
            }
        }
    }
}

impl std::str::FromStr for SubscribedPower {
    type Err = String;

    /// Accepts `"12"` or `"36/36/38/40"` (HPH/HCH/HPB/HCB).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_one = |part: &str| {
            part.trim()
                .parse::<u16>()
                .map_err(|_| format!("invalid power value '{}'", part))
        };
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [single] => Ok(SubscribedPower::Single(parse_one(single)?)),
            [hph, hch, hpb, hcb] => Ok(SubscribedPower::PerQuadrant([
                parse_one(hph)?,
                parse_one(hch)?,
                parse_one(hpb)?,
                parse_one(hcb)?,
            ])),
            _ => Err(format!(
                "expected one power or four as HPH/HCH/HPB/HCB, got '{}'",
                s
            )),
        }
    }
}

/// One raw load-curve sample as exported by the meter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReading {
    pub timestamp: NaiveDateTime,
    pub power_kw: f64,
    pub step_code: String,
    pub meter_id: String,
}

impl LoadReading {
    pub fn new(timestamp: NaiveDateTime, power_kw: f64, step_code: &str, meter_id: &str) -> Self {
        Self {
            timestamp,
            power_kw,
            step_code: step_code.to_string(),
            meter_id: meter_id.to_string(),
        }
    }
}

/// A reading with its tariff bucket and derived quantities resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedReading {
    pub timestamp: NaiveDateTime,
    pub power_kw: f64,
    pub meter_id: String,
    pub season: Season,
    pub period: Period,
    pub quadrant: Quadrant,
    pub step_hours: f64,
    pub energy_kwh: f64,
}

/// A (formula, subscribed power) configuration to be costed for one meter.
/// `is_current` marks the subscription the meter already holds; it is costed
/// for comparison but never competes for the optimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioCandidate {
    pub meter_id: String,
    pub formula: Formula,
    pub power: SubscribedPower,
    pub is_current: bool,
}

impl ScenarioCandidate {
    pub fn new(meter_id: &str, formula: Formula, power: SubscribedPower) -> Self {
        Self {
            meter_id: meter_id.to_string(),
            formula,
            power,
            is_current: false,
        }
    }

    pub fn current(meter_id: &str, formula: Formula, power: SubscribedPower) -> Self {
        Self {
            is_current: true,
            ..Self::new(meter_id, formula, power)
        }
    }

    pub fn label(&self) -> String {
        format!("{} {} kVA", self.formula, self.power)
    }
}

/// Annual cost breakdown of one candidate. `total_cost` is the exact sum of
/// the three parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostResult {
    pub candidate: ScenarioCandidate,
    pub fixed_cost: f64,
    pub variable_cost: f64,
    pub overrun_cost: f64,
    pub total_cost: f64,
}

impl CostResult {
    pub fn new(
        candidate: ScenarioCandidate,
        fixed_cost: f64,
        variable_cost: f64,
        overrun_cost: f64,
    ) -> Self {
        Self {
            candidate,
            fixed_cost,
            variable_cost,
            overrun_cost,
            total_cost: fixed_cost + variable_cost + overrun_cost,
        }
    }
}

/// Contract year the simulation projects costs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ValidityPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl Default for ValidityPeriod {
    fn default() -> Self {
        // Next full tariff year at the time the default rates were captured.
        Self {
            start: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 7, 31).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrant_from_parts() {
        assert_eq!(
            Quadrant::from_parts(Period::Peak, Season::High),
            Quadrant::Hph
        );
        assert_eq!(
            Quadrant::from_parts(Period::OffPeak, Season::Low),
            Quadrant::Hcb
        );
        for (idx, q) in Quadrant::ALL.iter().enumerate() {
            assert_eq!(q.index(), idx);
        }
    }

    #[test]
    fn test_formula_codes_round_trip() {
        for formula in Formula::SINGLE_POWER.iter().chain(&Formula::PER_QUADRANT) {
            let parsed: Formula = formula.code().parse().unwrap();
            assert_eq!(parsed, *formula);
            assert_eq!(
                formula.per_quadrant_power(),
                Formula::PER_QUADRANT.contains(formula)
            );
        }
        assert!("BTMYSTERY".parse::<Formula>().is_err());
    }

    #[test]
    fn test_subscribed_power_total_and_ordering() {
        let single = SubscribedPower::Single(9);
        assert_eq!(single.total_kva(), 9);
        assert!(single.is_ordered());
        assert_eq!(single.to_string(), "9");

        let quad = SubscribedPower::PerQuadrant([36, 36, 38, 40]);
        assert_eq!(quad.total_kva(), 150);
        assert!(quad.is_ordered());
        assert_eq!(quad.to_string(), "36/36/38/40");

        let unordered = SubscribedPower::PerQuadrant([40, 36, 38, 40]);
        assert!(!unordered.is_ordered());
    }

    #[test]
    fn test_subscribed_power_from_str() {
        assert_eq!(
            "12".parse::<SubscribedPower>().unwrap(),
            SubscribedPower::Single(12)
        );
        assert_eq!(
            "36/36/38/40".parse::<SubscribedPower>().unwrap(),
            SubscribedPower::PerQuadrant([36, 36, 38, 40])
        );
        assert_eq!(
            " 36 / 36 / 38 / 40 ".parse::<SubscribedPower>().unwrap(),
            SubscribedPower::PerQuadrant([36, 36, 38, 40])
        );
        assert!("36/36".parse::<SubscribedPower>().is_err());
        assert!("abc".parse::<SubscribedPower>().is_err());
    }

    #[test]
    fn test_cost_result_total_is_exact_sum() {
        let candidate = ScenarioCandidate::new(
            "PRM123",
            Formula::BtSupCu,
            SubscribedPower::PerQuadrant([36, 36, 38, 40]),
        );
        let result = CostResult::new(candidate, 1000.5, 420.25, 12.25);
        assert_eq!(
            result.total_cost,
            result.fixed_cost + result.variable_cost + result.overrun_cost
        );
    }

    #[test]
    fn test_default_validity_period_spans_one_year() {
        let period = ValidityPeriod::default();
        assert_eq!(period.days(), 365);
    }

    #[test]
    fn test_subscribed_power_json_shapes() {
        let single = serde_json::to_string(&SubscribedPower::Single(12)).unwrap();
        assert_eq!(single, "12");
        let quad =
            serde_json::to_string(&SubscribedPower::PerQuadrant([36, 36, 38, 40])).unwrap();
        assert_eq!(quad, "[36,36,38,40]");

        let formula = serde_json::to_string(&Formula::BtSupCu).unwrap();
        assert_eq!(formula, "\"BTSUPCU\"");
    }
}
