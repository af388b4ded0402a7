//! Error taxonomy
//!
//! Failures local to one column, pair or stage are expressed here and handled
//! by the pipeline; only document-level failures escape `DatasetPipeline::run`.

use thiserror::Error;

use crate::types::TypeSignature;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No knowledge document exists for the requested key.
    #[error("no knowledge found for {arity} signature '{signature}'")]
    KnowledgeNotFound { arity: String, signature: String },

    #[error("duplicate knowledge entry for key '{0}'")]
    DuplicateKnowledge(String),

    #[error("invalid knowledge entry: {0}")]
    InvalidKnowledge(String),

    /// The oracle answered, but no code or JSON payload could be extracted.
    #[error("malformed oracle output: {0}")]
    MalformedOracleOutput(String),

    /// Transport or provider failure while talking to the oracle.
    #[error("oracle request failed: {0}")]
    Oracle(#[source] anyhow::Error),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to persist result document: {0}")]
    Persist(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl AnalysisError {
    pub fn knowledge_not_found(signature: &TypeSignature) -> Self {
        Self::KnowledgeNotFound {
            arity: signature.arity().to_string(),
            signature: signature.to_string(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedOracleOutput(detail.into())
    }

    /// Oracle-side failures may be retried on the same task.
    pub fn is_oracle_failure(&self) -> bool {
        matches!(self, Self::MalformedOracleOutput(_) | Self::Oracle(_))
    }
}
