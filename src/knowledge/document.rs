use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::types::{Arity, TypeSignature};

/// A procedure named by a knowledge entry: either a bare name or an object
/// with a `name` plus free-form details (formula, assumptions, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Procedure {
    Named(String),
    Detailed {
        name: String,
        #[serde(flatten)]
        details: Map<String, Value>,
    },
}

impl Procedure {
    pub fn name(&self) -> &str {
        match self {
            Procedure::Named(name) => name,
            Procedure::Detailed { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveSection {
    #[serde(default)]
    pub statistics: Vec<Procedure>,
    #[serde(default)]
    pub selection_criteria: Value,
    #[serde(default)]
    pub application_criteria: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizationSection {
    #[serde(default)]
    pub options: Vec<Procedure>,
    #[serde(default)]
    pub selection_criteria: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferentialSection {
    #[serde(default)]
    pub tests: Vec<Procedure>,
    #[serde(default)]
    pub selection_criteria: Value,
    #[serde(default)]
    pub application_criteria: Value,
}

/// Applicable procedures for one (arity, type signature) key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub no_of_variable: Arity,
    pub var_type: TypeSignature,
    #[serde(default)]
    pub priority_tests: Vec<Procedure>,
    #[serde(default)]
    pub descriptive: DescriptiveSection,
    #[serde(default)]
    pub visualization: VisualizationSection,
    #[serde(default)]
    pub inferential: InferentialSection,
}

impl KnowledgeDocument {
    pub fn key(&self) -> (Arity, TypeSignature) {
        (self.no_of_variable, self.var_type)
    }

    /// Priority tests travel with the descriptive statistics they gate.
    pub fn descriptive_subsection(&self) -> Value {
        json!({
            "priority_tests": self.priority_tests,
            "statistics": self.descriptive.statistics,
            "selection_criteria": self.descriptive.selection_criteria,
            "application_criteria": self.descriptive.application_criteria,
        })
    }

    pub fn visualization_subsection(&self) -> Value {
        json!({
            "options": self.visualization.options,
            "selection_criteria": self.visualization.selection_criteria,
        })
    }

    pub fn inferential_subsection(&self) -> Value {
        json!({
            "tests": self.inferential.tests,
            "selection_criteria": self.inferential.selection_criteria,
            "application_criteria": self.inferential.application_criteria,
        })
    }
}
