pub mod models;
pub mod error;
pub mod timeframe;
pub mod load_curve;
pub mod aggregate;
pub mod tariff;
pub mod scenario;
pub mod cost;
pub mod optimizer;

pub use aggregate::{LoadCurveAggregator, MeterProfile, OverrunCurve, QuadrantAggregate, DEFAULT_MARGIN};
pub use cost::CostEngine;
pub use error::{Result, SimulationError};
pub use load_curve::{
    read_load_curve, read_load_curve_file, DataQualityWarning, DatasetSummary, LoadCurveDataset,
};
pub use models::{
    ClassifiedReading, CostResult, Formula, LoadReading, Period, Quadrant, ScenarioCandidate,
    Season, SubscribedPower, ValidityPeriod,
};
pub use optimizer::{compare_with_current, global_optimum, optima_by_formula, SavingsComparison};
pub use scenario::{
    CurrentConfiguration, ScenarioGenerator, DEFAULT_POWER_MAX_KVA, DEFAULT_POWER_MIN_KVA,
    POWER_REGIME_FLOOR_KVA,
};
pub use tariff::{QuadrantRates, RateProvider, RateSchedule, StaticRateProvider, TariffParameters};
pub use timeframe::IntervalClassifier;
