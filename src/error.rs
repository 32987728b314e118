use thiserror::Error;

/// Fatal failures of the simulation pipeline.
///
/// Data-quality findings that do not invalidate the computation (short
/// history, mixed step codes, several meters in one export) are not errors;
/// they are collected as warnings on the loaded dataset.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("input schema error: missing column(s) {0:?}")]
    InputSchema(Vec<String>),

    #[error("empty dataset: no active-power readings after filtering")]
    EmptyDataset,

    #[error("unparseable step code {0:?}, expected PT<minutes>M")]
    DurationParse(String),

    #[error("unparseable timestamp {0:?}, expected YYYY-MM-DD HH:MM:SS")]
    TimestampParse(String),

    #[error("malformed off-peak window token {0:?}, expected HHhMM-HHhMM")]
    WindowFormat(String),

    #[error("tariff rule lookup failed: {0}")]
    TariffRuleLookup(String),

    #[error("parameter {name} = {value} outside valid range [{min}, {max}]")]
    ParameterRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid current configuration: {0}")]
    CurrentConfig(String),

    #[error("load curve read error: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parameter file error: {0}")]
    ParameterFile(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
