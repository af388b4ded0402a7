//! Oracle access
//!
//! - [`provider`]: the `LLMProvider` seam and its Ollama / OpenAI-compatible backends
//! - [`client`]: rate-limited synthesis of code, JSON and verdicts
//! - [`prompts`]: prompt text and the sandbox dialect guide
//! - [`extract`]: payload extraction from free-form replies
//! - [`verdict`]: critique judgements

pub mod client;
pub mod extract;
pub mod prompts;
pub mod provider;
pub mod verdict;

pub use client::SynthesisClient;
pub use prompts::CodeRequest;
pub use provider::{build_provider, LLMProvider, OllamaProvider, OpenAICompatibleProvider};
pub use verdict::Verdict;
