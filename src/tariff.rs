use crate::error::{Result, SimulationError};
use crate::models::{Formula, Quadrant, ValidityPeriod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Energy rates of one formula, per quadrant, in c€/kWh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadrantRates {
    pub hph: f64,
    pub hch: f64,
    pub hpb: f64,
    pub hcb: f64,
}

impl QuadrantRates {
    pub fn new(hph: f64, hch: f64, hpb: f64, hcb: f64) -> Self {
        Self { hph, hch, hpb, hcb }
    }

    pub fn rate(&self, quadrant: Quadrant) -> f64 {
        match quadrant {
            Quadrant::Hph => self.hph,
            Quadrant::Hch => self.hch,
            Quadrant::Hpb => self.hpb,
            Quadrant::Hcb => self.hcb,
        }
    }
}

/// The full coefficient table one simulation run prices against.
///
/// Defaults carry the grid operator's published values for the BTSUP
/// formulas; the BTINF entries are calibration values meant to be replaced
/// by the official table through a parameter file. Every coefficient has a
/// declared valid range and loading rejects values outside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffParameters {
    /// CG, €/year.
    pub management_fee_eur: f64,
    /// CC, €/year.
    pub metering_fee_eur: f64,
    /// CMDPS, €/hour of overrun.
    pub overrun_rate_eur_per_hour: f64,
    /// CTA, applied on the fixed part.
    pub tax_rate: f64,
    /// CS per formula, €/kVA/year.
    pub subscription_coefficients: BTreeMap<Formula, f64>,
    /// Energy rates per formula and quadrant, c€/kWh.
    pub energy_rates: BTreeMap<Formula, QuadrantRates>,
}

impl Default for TariffParameters {
    fn default() -> Self {
        let mut subscription_coefficients = BTreeMap::new();
        subscription_coefficients.insert(Formula::BtInfCu4, 9.00);
        subscription_coefficients.insert(Formula::BtInfMu4, 12.44);
        subscription_coefficients.insert(Formula::BtInfLu, 16.24);
        subscription_coefficients.insert(Formula::BtSupCu, 17.61);
        subscription_coefficients.insert(Formula::BtSupLu, 30.16);

        let cu_rates = QuadrantRates::new(6.91, 4.21, 2.13, 1.52);
        let lu_rates = QuadrantRates::new(5.69, 3.47, 2.01, 1.49);
        let mut energy_rates = BTreeMap::new();
        energy_rates.insert(Formula::BtInfCu4, cu_rates);
        energy_rates.insert(Formula::BtInfMu4, QuadrantRates::new(6.30, 3.84, 2.07, 1.50));
        energy_rates.insert(Formula::BtInfLu, lu_rates);
        energy_rates.insert(Formula::BtSupCu, cu_rates);
        energy_rates.insert(Formula::BtSupLu, lu_rates);

        Self {
            management_fee_eur: 217.80,
            metering_fee_eur: 283.27,
            overrun_rate_eur_per_hour: 12.41,
            tax_rate: 0.2193,
            subscription_coefficients,
            energy_rates,
        }
    }
}

impl TariffParameters {
    /// Loads and validates a full parameter table from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let params: Self = serde_json::from_reader(File::open(path)?)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Rejects any coefficient outside its declared range.
    pub fn validate(&self) -> Result<()> {
        check_range("management_fee_eur", self.management_fee_eur, 0.0, 1000.0)?;
        check_range("metering_fee_eur", self.metering_fee_eur, 0.0, 1000.0)?;
        check_range(
            "overrun_rate_eur_per_hour",
            self.overrun_rate_eur_per_hour,
            0.0,
            50.0,
        )?;
        check_range("tax_rate", self.tax_rate, 0.0, 0.5)?;

        for (formula, coefficient) in &self.subscription_coefficients {
            check_range(
                &format!("subscription_coefficients.{}", formula),
                *coefficient,
                0.0,
                100.0,
            )?;
        }
        for (formula, rates) in &self.energy_rates {
            for quadrant in Quadrant::ALL {
                check_range(
                    &format!("energy_rates.{}.{}", formula, quadrant),
                    rates.rate(quadrant),
                    0.0,
                    50.0,
                )?;
            }
        }
        Ok(())
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SimulationError::ParameterRange {
            name: name.to_string(),
            value,
            min,
            max,
        })
    }
}

/// Every coefficient one formula needs over one validity period, resolved
/// and ready for the cost engine.
#[derive(Debug, Clone)]
pub struct RateSchedule {
    pub formula: Formula,
    pub period: ValidityPeriod,
    /// CG, €/year.
    pub management_fee_eur: f64,
    /// CC, €/year.
    pub metering_fee_eur: f64,
    /// CS, €/kVA/year.
    pub subscription_coefficient: f64,
    /// c€/kWh per quadrant.
    pub rates: QuadrantRates,
    /// CMDPS, €/hour of overrun.
    pub overrun_rate_eur_per_hour: f64,
    /// CTA, applied on the fixed part.
    pub tax_rate: f64,
}

/// Rate-table collaborator. Looked up once per formula per run; a failure
/// aborts the run unmodified, there is no retry and no implicit default.
pub trait RateProvider {
    fn rules_for(&self, formula: Formula, period: ValidityPeriod) -> Result<RateSchedule>;
}

/// `RateProvider` backed by a locally configured [`TariffParameters`] table.
pub struct StaticRateProvider {
    params: TariffParameters,
}

impl StaticRateProvider {
    pub fn new(params: TariffParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }
}

impl RateProvider for StaticRateProvider {
    fn rules_for(&self, formula: Formula, period: ValidityPeriod) -> Result<RateSchedule> {
        let subscription_coefficient = *self
            .params
            .subscription_coefficients
            .get(&formula)
            .ok_or_else(|| {
                SimulationError::TariffRuleLookup(format!(
                    "no subscription coefficient for {}",
                    formula
                ))
            })?;
        let rates = *self.params.energy_rates.get(&formula).ok_or_else(|| {
            SimulationError::TariffRuleLookup(format!("no energy rates for {}", formula))
        })?;

        Ok(RateSchedule {
            formula,
            period,
            management_fee_eur: self.params.management_fee_eur,
            metering_fee_eur: self.params.metering_fee_eur,
            subscription_coefficient,
            rates,
            overrun_rate_eur_per_hour: self.params.overrun_rate_eur_per_hour,
            tax_rate: self.params.tax_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid_and_complete() {
        let params = TariffParameters::default();
        params.validate().unwrap();

        let provider = StaticRateProvider::new(params).unwrap();
        for formula in Formula::SINGLE_POWER.iter().chain(&Formula::PER_QUADRANT) {
            let schedule = provider
                .rules_for(*formula, ValidityPeriod::default())
                .unwrap();
            assert_eq!(schedule.formula, *formula);
        }

        let schedule = provider
            .rules_for(Formula::BtSupCu, ValidityPeriod::default())
            .unwrap();
        assert_eq!(schedule.subscription_coefficient, 17.61);
        assert_eq!(schedule.rates.rate(Quadrant::Hph), 6.91);
        assert_eq!(schedule.rates.rate(Quadrant::Hcb), 1.52);
    }

    #[test]
    fn test_out_of_range_parameters_rejected() {
        let mut params = TariffParameters::default();
        params.tax_rate = 0.9;
        match params.validate().unwrap_err() {
            SimulationError::ParameterRange { name, .. } => assert_eq!(name, "tax_rate"),
            other => panic!("expected ParameterRange, got {:?}", other),
        }

        let mut params = TariffParameters::default();
        params
            .energy_rates
            .insert(Formula::BtSupLu, QuadrantRates::new(5.69, -3.47, 2.01, 1.49));
        match params.validate().unwrap_err() {
            SimulationError::ParameterRange { name, .. } => {
                assert_eq!(name, "energy_rates.BTSUPLU.HCH")
            }
            other => panic!("expected ParameterRange, got {:?}", other),
        }

        let mut params = TariffParameters::default();
        params.management_fee_eur = f64::NAN;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_missing_formula_entry_fails_lookup() {
        let mut params = TariffParameters::default();
        params.energy_rates.remove(&Formula::BtSupLu);
        let provider = StaticRateProvider::new(params).unwrap();

        let err = provider
            .rules_for(Formula::BtSupLu, ValidityPeriod::default())
            .unwrap_err();
        assert!(matches!(err, SimulationError::TariffRuleLookup(_)));
        assert!(err.to_string().contains("BTSUPLU"));
    }

    #[test]
    fn test_json_round_trip() {
        let params = TariffParameters::default();
        let json = serde_json::to_string_pretty(&params).unwrap();
        let parsed = TariffParameters::from_json(&json).unwrap();
        assert_eq!(parsed, params);
    }

    #[test]
    fn test_json_keys_are_formula_codes() {
        let json = r#"{
            "management_fee_eur": 200.0,
            "metering_fee_eur": 280.0,
            "overrun_rate_eur_per_hour": 12.41,
            "tax_rate": 0.2193,
            "subscription_coefficients": {"BTSUPCU": 17.61, "BTSUPLU": 30.16},
            "energy_rates": {
                "BTSUPCU": {"hph": 6.91, "hch": 4.21, "hpb": 2.13, "hcb": 1.52},
                "BTSUPLU": {"hph": 5.69, "hch": 3.47, "hpb": 2.01, "hcb": 1.49}
            }
        }"#;
        let params = TariffParameters::from_json(json).unwrap();
        assert_eq!(params.management_fee_eur, 200.0);
        assert_eq!(
            params.subscription_coefficients.get(&Formula::BtSupLu),
            Some(&30.16)
        );
        // BTINF tables absent: lookups for them must fail loudly
        let provider = StaticRateProvider::new(params).unwrap();
        assert!(provider
            .rules_for(Formula::BtInfCu4, ValidityPeriod::default())
            .is_err());
    }
}
