use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::sandbox::Bindings;
use crate::types::{Arity, TypeSignature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Descriptive,
    Visualization,
    Inferential,
    OutlierDetection,
    Imputation,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Descriptive => "descriptive",
            StageKind::Visualization => "visualization",
            StageKind::Inferential => "inferential",
            StageKind::OutlierDetection => "outlier_detection",
            StageKind::Imputation => "imputation",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The column or column pair a task analyses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    Column(String),
    Pair(String, String),
}

impl Subject {
    /// Result-document key: `"col"` or `"colA-colB"`
    pub fn key(&self) -> String {
        match self {
            Subject::Column(name) => name.clone(),
            Subject::Pair(a, b) => format!("{}-{}", a, b),
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Subject::Column(_) => Arity::Univariate,
            Subject::Pair(..) => Arity::Bivariate,
        }
    }

    /// Key restricted to `[A-Za-z0-9_-]`, for file names
    pub fn file_stem(&self) -> String {
        self.key()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// One unit of work for the stage executor.
///
/// Never mutated once built: a retry is a new task from [`AnalysisTask::with_feedback`].
#[derive(Debug, Clone)]
pub struct AnalysisTask {
    pub stage: StageKind,
    pub subject: Subject,
    pub signature: TypeSignature,
    pub bindings: Bindings,
    /// Snapshot of the knowledge subsection this stage works from
    pub knowledge: Value,
    pub description: Value,
    /// Findings of an earlier stage this one builds on
    pub context: Option<Value>,
    pub feedback: Option<String>,
    pub attempt: usize,
}

impl AnalysisTask {
    pub fn new(
        stage: StageKind,
        subject: Subject,
        signature: TypeSignature,
        bindings: Bindings,
        knowledge: Value,
        description: Value,
    ) -> Self {
        Self {
            stage,
            subject,
            signature,
            bindings,
            knowledge,
            description,
            context: None,
            feedback: None,
            attempt: 1,
        }
    }

    pub fn with_context(mut self, context: Option<Value>) -> Self {
        self.context = context;
        self
    }

    /// The next attempt. Feedback accumulates across retries so earlier
    /// defects stay visible to the oracle.
    pub fn with_feedback(&self, feedback: impl Into<String>) -> Self {
        let feedback = feedback.into();
        Self {
            feedback: Some(match &self.feedback {
                Some(previous) => format!("{}\n{}", previous, feedback),
                None => feedback,
            }),
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use crate::types::VariableType;
    use serde_json::json;

    #[test]
    fn test_subject_keys() {
        let pair = Subject::Pair("height cm".to_string(), "weight/kg".to_string());
        assert_eq!(pair.key(), "height cm-weight/kg");
        assert_eq!(pair.file_stem(), "height_cm-weight_kg");
        assert_eq!(pair.arity(), Arity::Bivariate);
    }

    #[test]
    fn test_with_feedback_builds_new_task() {
        let column = Column::from_numbers("age", &[1.0, 2.0]);
        let task = AnalysisTask::new(
            StageKind::Descriptive,
            Subject::Column("age".to_string()),
            TypeSignature::Single(VariableType::NumericalContinuous),
            Bindings::single(&column),
            json!({"statistics": ["mean"]}),
            json!({}),
        );
        let retry = task.with_feedback("add the median");

        assert_eq!(task.attempt, 1);
        assert!(task.feedback.is_none());
        assert_eq!(retry.attempt, 2);
        assert_eq!(retry.feedback.as_deref(), Some("add the median"));
        assert_eq!(retry.knowledge, task.knowledge);

        let third = retry.with_feedback("round to 2 dp");
        assert_eq!(third.attempt, 3);
        assert_eq!(third.feedback.as_deref(), Some("add the median\nround to 2 dp"));
        assert_eq!(retry.feedback.as_deref(), Some("add the median"));
    }
}
