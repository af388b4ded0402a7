//! Payload extraction from free-form oracle replies.
//!
//! Order: the first fenced block, else the text after a leading language-tag
//! line, else the whole reply. Nothing is repaired beyond that.

use serde_json::Value;

use crate::error::{AnalysisError, AnalysisResult};

const FENCE: &str = "```";
const LANGUAGE_TAGS: &[&str] = &["python", "py", "json", "rust", "text", "javascript", "js", "yaml", "evalexpr", "code"];

fn is_language_tag(line: &str) -> bool {
    LANGUAGE_TAGS.contains(&line.trim().to_lowercase().as_str())
}

fn fenced_block(response: &str) -> Option<&str> {
    let start = response.find(FENCE)? + FENCE.len();
    let rest = &response[start..];
    let body = match rest.find(FENCE) {
        Some(end) => &rest[..end],
        None => rest,
    };
    // The opening fence line may carry a language tag
    Some(match body.split_once('\n') {
        Some((first, remainder)) if first.trim().is_empty() || is_language_tag(first) => remainder,
        _ => body,
    })
}

/// Extracts the code or JSON payload from an oracle reply.
pub fn extract_payload(response: &str) -> AnalysisResult<String> {
    let payload = match fenced_block(response) {
        Some(block) => block,
        None => {
            let trimmed = response.trim_start();
            match trimmed.split_once('\n') {
                Some((first, rest)) if is_language_tag(first) => rest,
                _ => trimmed,
            }
        }
    };

    let payload = payload.trim();
    if payload.is_empty() {
        return Err(AnalysisError::malformed("reply contains no payload"));
    }
    Ok(payload.to_string())
}

/// Extracts and parses a JSON payload.
pub fn extract_json(response: &str) -> AnalysisResult<Value> {
    let payload = extract_payload(response)?;
    serde_json::from_str(&payload).map_err(|e| AnalysisError::malformed(format!("invalid JSON payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block_wins() {
        let reply = "Here you go:\n```json\n{\"a\": 1}\n```\nanything else";
        assert_eq!(extract_payload(reply).unwrap(), "{\"a\": 1}");

        let untagged = "```\nresults.mean = mean(data_column)\n```";
        assert_eq!(extract_payload(untagged).unwrap(), "results.mean = mean(data_column)");
    }

    #[test]
    fn test_leading_language_tag_line() {
        let reply = "python\nresults.n = len(data_column)";
        assert_eq!(extract_payload(reply).unwrap(), "results.n = len(data_column)");
    }

    #[test]
    fn test_whole_reply_fallback() {
        assert_eq!(extract_payload("  {\"valid\": true}  ").unwrap(), "{\"valid\": true}");
    }

    #[test]
    fn test_unclosed_fence_takes_rest() {
        assert_eq!(extract_payload("```json\n[1, 2]").unwrap(), "[1, 2]");
    }

    #[test]
    fn test_empty_payload_is_malformed() {
        assert!(matches!(extract_payload("```json\n```"), Err(AnalysisError::MalformedOracleOutput(_))));
        assert!(matches!(extract_payload("   "), Err(AnalysisError::MalformedOracleOutput(_))));
    }

    #[test]
    fn test_bad_json_is_malformed() {
        assert!(matches!(extract_json("{not json"), Err(AnalysisError::MalformedOracleOutput(_))));
        assert_eq!(extract_json("```json\n{\"k\": [1]}\n```").unwrap()["k"][0], 1);
    }
}
