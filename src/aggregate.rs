use crate::error::Result;
use crate::load_curve::step_hours;
use crate::models::{ClassifiedReading, LoadReading, Quadrant};
use crate::timeframe::IntervalClassifier;
use std::collections::BTreeMap;

/// Default uplift from averaged active power (kW) to an apparent-power
/// estimate (kVA).
pub const DEFAULT_MARGIN: f64 = 1.12;

/// Apparent-power estimate for one sample, rounded to the watt.
pub fn pmax_estimate(power_kw: f64, margin: f64) -> f64 {
    (power_kw * margin * 1000.0).round() / 1000.0
}

/// Cumulative exceedance durations, per power level.
///
/// `hours_above(t)` answers "how many hours per year did the estimated
/// power strictly exceed t kVA". Levels are stored highest first with a
/// running duration sum, so the answer is one binary search instead of a
/// rescan of the raw readings.
#[derive(Debug, Clone, Default)]
pub struct OverrunCurve {
    // (pmax level, cumulative hours at levels >= this one), descending
    levels: Vec<(f64, f64)>,
}

impl OverrunCurve {
    fn from_level_durations(durations: &BTreeMap<i64, f64>) -> Self {
        let mut levels = Vec::with_capacity(durations.len());
        let mut cumulative = 0.0;
        for (&milli_kva, &hours) in durations.iter().rev() {
            cumulative += hours;
            levels.push((milli_kva as f64 / 1000.0, cumulative));
        }
        Self { levels }
    }

    /// Hours during which estimated power was strictly above the threshold.
    pub fn hours_above(&self, threshold_kva: f64) -> f64 {
        let strictly_above = self.levels.partition_point(|(level, _)| *level > threshold_kva);
        if strictly_above == 0 {
            0.0
        } else {
            self.levels[strictly_above - 1].1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Total recorded duration, the value of `hours_above` below the lowest
    /// level.
    pub fn total_hours(&self) -> f64 {
        self.levels.last().map(|(_, cum)| *cum).unwrap_or(0.0)
    }
}

/// Energy and peak statistics of one meter in one quadrant.
#[derive(Debug, Clone, Default)]
pub struct QuadrantAggregate {
    pub energy_kwh: f64,
    pub pmax_kva: f64,
    pub overrun_curve: OverrunCurve,
}

/// All four quadrant aggregates of one meter.
#[derive(Debug, Clone)]
pub struct MeterProfile {
    pub meter_id: String,
    quadrants: [QuadrantAggregate; 4],
}

impl MeterProfile {
    pub fn quadrant(&self, quadrant: Quadrant) -> &QuadrantAggregate {
        &self.quadrants[quadrant.index()]
    }

    /// Peak estimates in cascade order HPH, HCH, HPB, HCB.
    pub fn pmax_by_quadrant(&self) -> [f64; 4] {
        let mut out = [0.0; 4];
        for quadrant in Quadrant::ALL {
            out[quadrant.index()] = self.quadrant(quadrant).pmax_kva;
        }
        out
    }

    pub fn pmax_kva(&self) -> f64 {
        self.pmax_by_quadrant().iter().fold(0.0, |a, b| a.max(*b))
    }

    pub fn total_energy_kwh(&self) -> f64 {
        self.quadrants.iter().map(|q| q.energy_kwh).sum()
    }
}

#[derive(Default)]
struct QuadrantAccumulator {
    energy_kwh: f64,
    pmax_kva: f64,
    // milli-kVA level -> recorded hours at that level
    level_hours: BTreeMap<i64, f64>,
}

impl QuadrantAccumulator {
    fn push(&mut self, estimate_kva: f64, step_hours: f64, energy_kwh: f64) {
        self.energy_kwh += energy_kwh;
        self.pmax_kva = self.pmax_kva.max(estimate_kva);
        let milli_kva = (estimate_kva * 1000.0).round() as i64;
        *self.level_hours.entry(milli_kva).or_insert(0.0) += step_hours;
    }

    fn finish(self) -> QuadrantAggregate {
        QuadrantAggregate {
            energy_kwh: self.energy_kwh,
            pmax_kva: self.pmax_kva,
            overrun_curve: OverrunCurve::from_level_durations(&self.level_hours),
        }
    }
}

/// Streams raw readings into per-meter, per-quadrant statistics in one pass.
pub struct LoadCurveAggregator {
    classifier: IntervalClassifier,
    margin: f64,
}

impl LoadCurveAggregator {
    pub fn new(classifier: IntervalClassifier, margin: f64) -> Self {
        Self { classifier, margin }
    }

    /// Resolves one reading's tariff bucket and derived quantities.
    pub fn classify_reading(&self, reading: &LoadReading) -> Result<ClassifiedReading> {
        let (season, period, quadrant) = self.classifier.classify(reading.timestamp);
        let step_hours = step_hours(&reading.step_code)?;
        Ok(ClassifiedReading {
            timestamp: reading.timestamp,
            power_kw: reading.power_kw,
            meter_id: reading.meter_id.clone(),
            season,
            period,
            quadrant,
            step_hours,
            energy_kwh: reading.power_kw * step_hours,
        })
    }

    /// One pass over the readings; profiles come out sorted by meter id.
    pub fn aggregate(&self, readings: &[LoadReading]) -> Result<Vec<MeterProfile>> {
        let mut meters: BTreeMap<String, [QuadrantAccumulator; 4]> = BTreeMap::new();

        for reading in readings {
            let classified = self.classify_reading(reading)?;
            let estimate = pmax_estimate(classified.power_kw, self.margin);
            let ClassifiedReading {
                meter_id,
                quadrant,
                step_hours,
                energy_kwh,
                ..
            } = classified;
            meters.entry(meter_id).or_default()[quadrant.index()].push(
                estimate,
                step_hours,
                energy_kwh,
            );
        }

        Ok(meters
            .into_iter()
            .map(|(meter_id, accumulators)| MeterProfile {
                meter_id,
                quadrants: accumulators.map(QuadrantAccumulator::finish),
            })
            .collect())
    }
}
