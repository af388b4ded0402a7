use serde::Deserialize;
use serde_json::Value;

use crate::error::{AnalysisError, AnalysisResult};

/// Critique judgement on one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(String),
}

#[derive(Deserialize)]
struct VerdictReply {
    #[serde(alias = "validation_passed")]
    valid: bool,
    #[serde(default, alias = "summary")]
    reason: String,
}

impl Verdict {
    /// Parses `{"valid": bool, "reason": str}`; anything else is malformed.
    pub fn from_value(value: Value) -> AnalysisResult<Self> {
        let reply: VerdictReply = serde_json::from_value(value)
            .map_err(|e| AnalysisError::malformed(format!("invalid verdict: {}", e)))?;
        Ok(if reply.valid {
            Verdict::Accepted
        } else if reply.reason.trim().is_empty() {
            Verdict::Rejected("rejected without a stated reason".to_string())
        } else {
            Verdict::Rejected(reply.reason)
        })
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}
