use core_types::CoreError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Not enough data for {operation}: {required} periods required, {actual} available")]
    InsufficientData {
        operation: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),

    #[error("Invalid composite weights: {0}")]
    InvalidWeights(String),

    #[error("Brand registration {0} not found in the snapshot")]
    RecordNotFound(u64),
}

impl AnalyticsError {
    pub(crate) fn insufficient(operation: &'static str, required: usize, actual: usize) -> Self {
        AnalyticsError::InsufficientData {
            operation,
            required,
            actual,
        }
    }

    /// Stable machine-readable kind, used in report warnings.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsError::InsufficientData { .. } => "insufficient_data",
            AnalyticsError::InvalidDimension(_) => "invalid_dimension",
            AnalyticsError::InvalidWeights(_) => "invalid_weights",
            AnalyticsError::RecordNotFound(_) => "record_not_found",
        }
    }
}

impl From<CoreError> for AnalyticsError {
    fn from(err: CoreError) -> Self {
        AnalyticsError::InvalidDimension(err.to_string())
    }
}

/// A component failure the assembler degraded around instead of failing the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportWarning {
    /// The report section that was omitted.
    pub section: String,
    pub kind: &'static str,
    pub message: String,
}

impl ReportWarning {
    pub fn from_error(section: &str, err: &AnalyticsError) -> Self {
        Self {
            section: section.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
