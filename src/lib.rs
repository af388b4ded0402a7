//! Knowledge-Guided Statistical Analysis Agency
//!
//! Analyzes a tabular dataset end to end by delegating test selection, code
//! generation and interpretation to a language-model oracle, constrained by
//! a statistical knowledge base:
//! - Type classification and oracle-guided preprocessing
//! - Descriptive, visual and inferential analysis per column and per pair
//! - Generated code runs in an embedded expression sandbox, never the host
//! - Every artifact is critiqued against its knowledge before acceptance

pub mod classify;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod oracle;
pub mod pipeline;
pub mod sandbox;
pub mod stats;
pub mod table;
pub mod telemetry;
pub mod types;

// Re-exports for convenience
pub use config::{AnalysisConfig, ConfigLoader};
pub use error::{AnalysisError, AnalysisResult};
pub use knowledge::{KnowledgeStore, PreprocessStore};
pub use oracle::SynthesisClient;
pub use pipeline::{DatasetPipeline, ResultDocument};
pub use sandbox::{ExprSandbox, Interpreter};
pub use table::Table;
pub use types::{TypeSignature, VariableType};
