//! Configuration
//!
//! Explicit configuration objects handed to constructors. Files are JSON or
//! YAML; environment overrides are applied once by the binary after `dotenv`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tracing::info;

use crate::error::{AnalysisError, AnalysisResult};

/// Which wire protocol the oracle speaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Ollama,
    #[serde(alias = "openai")]
    OpenaiCompatible,
}

impl FromStr for ProviderKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" | "openai_compatible" => Ok(ProviderKind::OpenaiCompatible),
            other => Err(AnalysisError::Config(format!("unknown oracle provider '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub system_prompt: Option<String>,
    /// 0 disables throttling
    pub requests_per_minute: u32,
    /// Extra attempts after a transport failure or malformed reply
    pub oracle_retries: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            model: "llama3.1:8b".to_string(),
            temperature: 0.2,
            system_prompt: Some(
                "You are a careful statistician. Answer in exactly the format requested.".to_string(),
            ),
            requests_per_minute: 30,
            oracle_retries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Stage executor invocations allowed per critique session
    pub critique_budget: usize,
    pub max_pairs: usize,
    /// Columns missing more than this share of cells are dropped
    pub missing_threshold: f64,
    pub concurrency: usize,
    pub execution_timeout_secs: u64,
    pub alpha: f64,
    pub min_comparison_samples: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            critique_budget: 3,
            max_pairs: 3,
            missing_threshold: 0.3,
            concurrency: 1,
            execution_timeout_secs: 30,
            alpha: 0.05,
            min_comparison_samples: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub statistical_kb: PathBuf,
    pub preprocess_kb: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            statistical_kb: PathBuf::from("knowledge/statistical_kb.json"),
            preprocess_kb: PathBuf::from("knowledge/preprocess_kb.json"),
            output_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub oracle: OracleConfig,
    pub analysis: AnalysisSettings,
    pub paths: PathSettings,
}

impl AnalysisConfig {
    /// Applies `ORACLE_*` overrides through `lookup` (usually `std::env::var`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> AnalysisResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("ORACLE_PROVIDER") {
            self.oracle.provider = provider.parse()?;
        }
        if let Some(url) = lookup("ORACLE_BASE_URL") {
            self.oracle.base_url = url;
        }
        if let Some(key) = lookup("ORACLE_API_KEY") {
            self.oracle.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(model) = lookup("ORACLE_MODEL") {
            self.oracle.model = model;
        }
        Ok(())
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        let a = &self.analysis;
        if a.critique_budget == 0 {
            return Err(AnalysisError::Config("critique_budget must be at least 1".to_string()));
        }
        if a.max_pairs == 0 {
            return Err(AnalysisError::Config("max_pairs must be at least 1".to_string()));
        }
        if a.concurrency == 0 {
            return Err(AnalysisError::Config("concurrency must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&a.missing_threshold) {
            return Err(AnalysisError::Config("missing_threshold must lie in [0, 1]".to_string()));
        }
        if !(a.alpha > 0.0 && a.alpha < 1.0) {
            return Err(AnalysisError::Config("alpha must lie in (0, 1)".to_string()));
        }
        if a.execution_timeout_secs == 0 {
            return Err(AnalysisError::Config("execution_timeout_secs must be positive".to_string()));
        }
        if self.oracle.model.trim().is_empty() {
            return Err(AnalysisError::Config("oracle model must be set".to_string()));
        }
        Ok(())
    }
}

/// Reads `AnalysisConfig` from disk
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Missing files yield the defaults.
    pub async fn load(&self) -> AnalysisResult<AnalysisConfig> {
        if !self.path.exists() {
            info!("No config at {}, using defaults", self.path.display());
            return Ok(AnalysisConfig::default());
        }
        let content = fs::read_to_string(&self.path).await?;
        let config: AnalysisConfig = if is_yaml(&self.path) {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, config: &AnalysisConfig) -> AnalysisResult<()> {
        let content = if is_yaml(&self.path) {
            serde_yaml::to_string(config)?
        } else {
            serde_json::to_string_pretty(config)?
        };
        fs::write(&self.path, content).await?;
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"))
}
