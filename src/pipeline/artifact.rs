use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::task::{AnalysisTask, StageKind};
use crate::table::Column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Ok,
    Error,
}

/// How a critique session ended for the artifact it produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    Validated,
    /// Budget spent; the last artifact is kept unchanged
    Exhausted,
    /// The oracle failed mid-session
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub state: ValidationState,
    pub attempts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Output of one stage execution
#[derive(Debug, Clone, Serialize)]
pub struct StageArtifact {
    pub stage: StageKind,
    pub subject: String,
    pub status: ArtifactStatus,
    pub findings: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub justification: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRecord>,
    /// Imputed column travelling beside the artifact
    #[serde(skip)]
    pub derived: Option<Column>,
}

impl StageArtifact {
    pub fn ok(task: &AnalysisTask, findings: Value) -> Self {
        Self {
            stage: task.stage,
            subject: task.subject.key(),
            status: ArtifactStatus::Ok,
            findings,
            justification: Value::Null,
            diagnostic: None,
            validation: None,
            derived: None,
        }
    }

    pub fn error(task: &AnalysisTask, diagnostic: impl Into<String>) -> Self {
        Self {
            stage: task.stage,
            subject: task.subject.key(),
            status: ArtifactStatus::Error,
            findings: Value::Object(Map::new()),
            justification: Value::Null,
            diagnostic: Some(diagnostic.into()),
            validation: None,
            derived: None,
        }
    }

    pub fn with_justification(mut self, justification: Value) -> Self {
        self.justification = justification;
        self
    }

    pub fn with_derived(mut self, column: Column) -> Self {
        self.derived = Some(column);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ArtifactStatus::Ok
    }

    pub fn validation_state(&self) -> Option<ValidationState> {
        self.validation.as_ref().map(|v| v.state)
    }

    /// Serialized form shown to the critique and stored in the result document
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
