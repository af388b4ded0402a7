//! Static pre-check on generated code before it reaches the engine.

use regex::Regex;

const FORBIDDEN: &str = r"(?m)(^|[\s;(])(import|from\s+\S+\s+import|def|fn|function|lambda)\s";

/// Rejects imports and function definitions, naming the offending keyword.
pub fn check(code: &str) -> Result<(), String> {
    let re = Regex::new(FORBIDDEN).map_err(|e| e.to_string())?;
    match re.captures(code).and_then(|c| c.get(2)) {
        Some(found) => {
            let keyword = found.as_str().split_whitespace().next().unwrap_or_default();
            Err(format!(
                "'{}' is not allowed: generated code may not import modules or define functions",
                keyword
            ))
        }
        None => Ok(()),
    }
}
