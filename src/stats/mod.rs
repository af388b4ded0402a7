//! Numeric catalog exposed to generated analysis code.
//!
//! - [`descriptive`]: location, spread and shape measures, frequency tables
//! - [`distributions`]: CDFs and survival functions used for p-values
//! - [`hypothesis`]: the statistical tests the knowledge base refers to
//! - [`cleaning`]: outlier detection and missing-value imputation helpers
//!
//! Every function is deterministic: the same input yields bit-identical output.

pub mod cleaning;
pub mod descriptive;
pub mod distributions;
pub mod hypothesis;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("{name} needs at least {required} values, got {actual}")]
    InsufficientData { name: &'static str, required: usize, actual: usize },

    #[error("{0} is undefined for constant data")]
    ZeroVariance(&'static str),

    #[error("{name}: {reason}")]
    Degenerate { name: &'static str, reason: String },
}

pub type StatsResult<T> = Result<T, StatsError>;

/// Outcome of a hypothesis test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

impl TestOutcome {
    pub fn new(statistic: f64, p_value: f64) -> Self {
        Self { statistic, p_value: p_value.clamp(0.0, 1.0) }
    }
}

pub(crate) fn require(name: &'static str, values: &[f64], required: usize) -> StatsResult<()> {
    if values.len() < required {
        return Err(StatsError::InsufficientData { name, required, actual: values.len() });
    }
    Ok(())
}
