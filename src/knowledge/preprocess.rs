use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::document::Procedure;
use crate::types::VariableType;

/// Cleaning procedures applicable to one variable type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessDocument {
    #[serde(rename = "type")]
    pub var_type: VariableType,
    #[serde(default)]
    pub prior_tests: Vec<Procedure>,
    #[serde(default)]
    pub outlier_detection: Vec<Procedure>,
    #[serde(default)]
    pub missing_value_imputation: Vec<Procedure>,
}

impl PreprocessDocument {
    pub fn outlier_subsection(&self) -> Value {
        json!({
            "prior_tests": self.prior_tests,
            "outlier_detection": self.outlier_detection,
        })
    }

    pub fn imputation_subsection(&self) -> Value {
        json!({ "missing_value_imputation": self.missing_value_imputation })
    }
}
