use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, warn};

use super::extract::{extract_json, extract_payload};
use super::prompts::{code_prompt, CodeRequest};
use super::provider::{build_provider, LLMProvider};
use super::verdict::Verdict;
use crate::config::OracleConfig;
use crate::error::{AnalysisError, AnalysisResult};

/// Throttled access to the oracle with payload extraction.
///
/// Transport failures and malformed replies are retried up to
/// `oracle_retries` extra times before surfacing.
pub struct SynthesisClient {
    provider: Arc<dyn LLMProvider>,
    config: OracleConfig,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl SynthesisClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: OracleConfig) -> Self {
        let limiter = NonZeroU32::new(config.requests_per_minute)
            .map(|rpm| RateLimiter::direct(Quota::per_minute(rpm)));
        Self { provider, config, limiter }
    }

    pub fn from_config(config: OracleConfig) -> AnalysisResult<Self> {
        let provider = build_provider(&config).map_err(AnalysisError::Oracle)?;
        Ok(Self::new(provider, config))
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn retries(&self) -> usize {
        self.config.oracle_retries
    }

    async fn complete(&self, prompt: &str) -> AnalysisResult<String> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        debug!(model = %self.config.model, "Oracle prompt:\n{}", prompt);

        let reply = self
            .provider
            .generate(&self.config.model, prompt.to_string(), self.config.system_prompt.clone())
            .await
            .map_err(AnalysisError::Oracle)?;

        debug!("Oracle reply:\n{}", reply);
        Ok(reply)
    }

    async fn ask<T, F>(&self, prompt: &str, parse: F) -> AnalysisResult<T>
    where
        F: Fn(&str) -> AnalysisResult<T>,
    {
        let mut attempt = 0;
        loop {
            let outcome = match self.complete(prompt).await {
                Ok(reply) => parse(&reply),
                Err(e) => Err(e),
            };
            match outcome {
                Err(e) if e.is_oracle_failure() && attempt < self.config.oracle_retries => {
                    attempt += 1;
                    warn!("Oracle call failed ({}), retrying {}/{}", e, attempt, self.config.oracle_retries);
                }
                other => return other,
            }
        }
    }

    /// Asks for analysis code; returns the extracted code text.
    pub async fn synthesize_code(&self, request: &CodeRequest) -> AnalysisResult<String> {
        self.ask(&code_prompt(request), extract_payload).await
    }

    /// Asks for a JSON answer.
    pub async fn synthesize_structured(&self, prompt: &str) -> AnalysisResult<Value> {
        self.ask(prompt, extract_json).await
    }

    /// Asks for a `{"valid": bool, "reason": str}` judgement.
    pub async fn synthesize_verdict(&self, prompt: &str) -> AnalysisResult<Verdict> {
        self.ask(prompt, |reply| Verdict::from_value(extract_json(reply)?)).await
    }
}
