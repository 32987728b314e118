use crate::error::{Result, SimulationError};
use crate::models::LoadReading;
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, Trim};
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

/// Physical-quantity marker of active-power rows in the distributor export.
const ACTIVE_POWER_MARKER: &str = "PA";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const REQUIRED_COLUMNS: [&str; 5] = [
    "Horodate",
    "Grandeur physique",
    "Valeur",
    "Pas",
    "Identifiant PRM",
];

fn step_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^PT(\d+)M$").unwrap())
}

/// Parses a sampling-step code such as `"PT30M"` into hours.
pub fn step_hours(step_code: &str) -> Result<f64> {
    let caps = step_code_re()
        .captures(step_code)
        .ok_or_else(|| SimulationError::DurationParse(step_code.to_string()))?;
    let minutes: f64 = caps[1]
        .parse()
        .map_err(|_| SimulationError::DurationParse(step_code.to_string()))?;
    Ok(minutes / 60.0)
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Horodate")]
    timestamp: String,
    #[serde(rename = "Grandeur physique")]
    quantity: String,
    #[serde(rename = "Valeur")]
    value_watts: f64,
    #[serde(rename = "Pas")]
    step_code: String,
    #[serde(rename = "Identifiant PRM")]
    meter_id: String,
}

/// Non-fatal findings about the loaded history. They are reported, never
/// acted on: costs are computed from the data as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DataQualityWarning {
    ShortHistory { days: i64 },
    MixedStepCodes { codes: Vec<String> },
    MultipleMeters { count: usize },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::ShortHistory { days } => write!(
                f,
                "history spans only {} days, annual costs extrapolate a full year",
                days
            ),
            DataQualityWarning::MixedStepCodes { codes } => {
                write!(f, "multiple sampling steps in one export: {}", codes.join(", "))
            }
            DataQualityWarning::MultipleMeters { count } => {
                write!(f, "{} distinct meters in one export, results are per meter", count)
            }
        }
    }
}

/// Headline statistics of a loaded history, printed after ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub measurement_count: usize,
    pub first_timestamp: NaiveDateTime,
    pub last_timestamp: NaiveDateTime,
    pub span_days: i64,
    pub max_power_kw: f64,
    pub dominant_step_code: String,
    pub meter_ids: Vec<String>,
}

/// The validated result of ingesting one distributor export.
#[derive(Debug, Clone)]
pub struct LoadCurveDataset {
    pub readings: Vec<LoadReading>,
    pub summary: DatasetSummary,
    pub warnings: Vec<DataQualityWarning>,
}

/// Reads a semicolon-delimited load-curve export from a file.
pub fn read_load_curve_file(path: &Path) -> Result<LoadCurveDataset> {
    info!("Reading load curve from {}", path.display());
    read_load_curve(File::open(path)?)
}

/// Reads a semicolon-delimited load-curve export.
///
/// Keeps only active-power rows, converts watts to kilowatts, and fails if
/// required columns are missing or no usable row remains.
pub fn read_load_curve<R: Read>(reader: R) -> Result<LoadCurveDataset> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SimulationError::InputSchema(missing));
    }

    let mut readings = Vec::new();
    for row in rdr.deserialize::<RawRow>() {
        let row = row?;
        if row.quantity != ACTIVE_POWER_MARKER {
            continue;
        }
        let timestamp = NaiveDateTime::parse_from_str(&row.timestamp, TIMESTAMP_FORMAT)
            .map_err(|_| SimulationError::TimestampParse(row.timestamp.clone()))?;
        readings.push(LoadReading::new(
            timestamp,
            row.value_watts / 1000.0,
            &row.step_code,
            &row.meter_id,
        ));
    }

    if readings.is_empty() {
        return Err(SimulationError::EmptyDataset);
    }

    let summary = summarize(&readings)?;
    let warnings = detect_warnings(&readings, &summary);
    for warning in &warnings {
        warn!("{}", warning);
    }
    info!(
        "Loaded {} active-power readings ({} to {})",
        summary.measurement_count, summary.first_timestamp, summary.last_timestamp
    );

    Ok(LoadCurveDataset {
        readings,
        summary,
        warnings,
    })
}

fn summarize(readings: &[LoadReading]) -> Result<DatasetSummary> {
    let first_timestamp = readings
        .iter()
        .map(|r| r.timestamp)
        .min()
        .ok_or(SimulationError::EmptyDataset)?;
    let last_timestamp = readings
        .iter()
        .map(|r| r.timestamp)
        .max()
        .ok_or(SimulationError::EmptyDataset)?;

    let max_power_kw = readings
        .iter()
        .map(|r| r.power_kw)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut step_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for reading in readings {
        *step_counts.entry(&reading.step_code).or_insert(0) += 1;
    }
    let mut dominant_step_code = String::new();
    let mut best = 0;
    for (code, count) in step_counts {
        if count > best {
            best = count;
            dominant_step_code = code.to_string();
        }
    }

    let meter_ids: Vec<String> = readings
        .iter()
        .map(|r| r.meter_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Ok(DatasetSummary {
        measurement_count: readings.len(),
        first_timestamp,
        last_timestamp,
        span_days: (last_timestamp - first_timestamp).num_days(),
        max_power_kw,
        dominant_step_code,
        meter_ids,
    })
}

fn detect_warnings(readings: &[LoadReading], summary: &DatasetSummary) -> Vec<DataQualityWarning> {
    let mut warnings = Vec::new();

    if summary.span_days < 365 {
        warnings.push(DataQualityWarning::ShortHistory {
            days: summary.span_days,
        });
    }

    let codes: BTreeSet<&str> = readings.iter().map(|r| r.step_code.as_str()).collect();
    if codes.len() > 1 {
        warnings.push(DataQualityWarning::MixedStepCodes {
            codes: codes.into_iter().map(str::to_string).collect(),
        });
    }

    if summary.meter_ids.len() > 1 {
        warnings.push(DataQualityWarning::MultipleMeters {
            count: summary.meter_ids.len(),
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Horodate;Grandeur physique;Valeur;Pas;Identifiant PRM";

    fn csv_input(rows: &[&str]) -> String {
        let mut s = String::from(HEADER);
        for row in rows {
            s.push('\n');
            s.push_str(row);
        }
        s
    }

    #[test]
    fn test_keeps_only_active_power_rows() {
        let input = csv_input(&[
            "2025-01-10 23:00:00;PA;5000;PT30M;PRM001",
            "2025-01-10 23:00:00;PRI;1200;PT30M;PRM001",
            "2025-01-10 23:30:00;PA;6500;PT30M;PRM001",
        ]);
        let dataset = read_load_curve(input.as_bytes()).unwrap();
        assert_eq!(dataset.readings.len(), 2);
        assert_eq!(dataset.readings[0].power_kw, 5.0);
        assert_eq!(dataset.readings[1].power_kw, 6.5);
        assert_eq!(dataset.readings[0].meter_id, "PRM001");
    }

    #[test]
    fn test_missing_columns_are_all_named() {
        let input = "Horodate;Grandeur physique;Valeur\n2025-01-10 23:00:00;PA;5000";
        let err = read_load_curve(input.as_bytes()).unwrap_err();
        match err {
            SimulationError::InputSchema(missing) => {
                assert_eq!(missing, vec!["Pas".to_string(), "Identifiant PRM".to_string()]);
            }
            other => panic!("expected InputSchema, got {:?}", other),
        }
    }

    #[test]
    fn test_no_active_power_rows_is_fatal() {
        let input = csv_input(&["2025-01-10 23:00:00;PRI;1200;PT30M;PRM001"]);
        let err = read_load_curve(input.as_bytes()).unwrap_err();
        assert!(matches!(err, SimulationError::EmptyDataset));
    }

    #[test]
    fn test_bad_timestamp_is_fatal() {
        let input = csv_input(&["10/01/2025 23:00;PA;5000;PT30M;PRM001"]);
        let err = read_load_curve(input.as_bytes()).unwrap_err();
        assert!(matches!(err, SimulationError::TimestampParse(_)));
    }

    #[test]
    fn test_step_hours_parsing() {
        assert_eq!(step_hours("PT5M").unwrap(), 5.0 / 60.0);
        assert_eq!(step_hours("PT15M").unwrap(), 0.25);
        assert_eq!(step_hours("PT30M").unwrap(), 0.5);
        assert_eq!(step_hours("PT60M").unwrap(), 1.0);

        for bad in ["P5M", "PT5S", "PTM", "PT5M0", ""] {
            assert!(
                matches!(step_hours(bad), Err(SimulationError::DurationParse(_))),
                "expected DurationParse for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_summary_statistics() {
        let input = csv_input(&[
            "2025-01-10 23:00:00;PA;5000;PT30M;PRM001",
            "2025-01-11 04:00:00;PA;8000;PT30M;PRM001",
            "2025-01-12 10:30:00;PA;3000;PT30M;PRM001",
        ]);
        let dataset = read_load_curve(input.as_bytes()).unwrap();
        let summary = &dataset.summary;
        assert_eq!(summary.measurement_count, 3);
        assert_eq!(summary.span_days, 1);
        assert_eq!(summary.max_power_kw, 8.0);
        assert_eq!(summary.dominant_step_code, "PT30M");
        assert_eq!(summary.meter_ids, vec!["PRM001".to_string()]);
    }

    #[test]
    fn test_quality_warnings() {
        let input = csv_input(&[
            "2025-01-10 23:00:00;PA;5000;PT30M;PRM001",
            "2025-01-10 23:30:00;PA;5000;PT10M;PRM002",
        ]);
        let dataset = read_load_curve(input.as_bytes()).unwrap();
        assert!(dataset
            .warnings
            .iter()
            .any(|w| matches!(w, DataQualityWarning::ShortHistory { days: 0 })));
        assert!(dataset.warnings.iter().any(
            |w| matches!(w, DataQualityWarning::MixedStepCodes { codes } if codes.len() == 2)
        ));
        assert!(dataset
            .warnings
            .iter()
            .any(|w| matches!(w, DataQualityWarning::MultipleMeters { count: 2 })));
    }

    #[test]
    fn test_full_year_has_no_short_history_warning() {
        let input = csv_input(&[
            "2025-01-01 00:00:00;PA;4000;PT30M;PRM001",
            "2026-01-01 00:00:00;PA;4000;PT30M;PRM001",
        ]);
        let dataset = read_load_curve(input.as_bytes()).unwrap();
        assert!(dataset
            .warnings
            .iter()
            .all(|w| !matches!(w, DataQualityWarning::ShortHistory { .. })));
    }
}
