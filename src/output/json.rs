//! JSON serialization for run reports and design exports.

use serde::{Deserialize, Serialize};

use crate::design::DesignMatrix;
use crate::result::RunReport;

/// Serialize a RunReport to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for RunReport).
pub fn to_json(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string(report)
}

/// Serialize a RunReport to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for RunReport).
pub fn to_json_pretty(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Row-major design matrix with its column names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DesignExport {
    /// Column names, in column order.
    pub columns: Vec<String>,
    /// One entry per frame.
    pub rows: Vec<Vec<f64>>,
}

impl From<&DesignMatrix> for DesignExport {
    fn from(design: &DesignMatrix) -> Self {
        Self {
            columns: design.names().to_vec(),
            rows: design.rows(),
        }
    }
}

/// Serialize a design matrix for external tools.
pub fn design_to_json(design: &DesignMatrix) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&DesignExport::from(design))
}
