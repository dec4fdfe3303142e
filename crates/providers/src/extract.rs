//! Best-effort structured decode of generative-AI text output.
//!
//! The model is asked for JSON but never guaranteed to produce it: output
//! may be wrapped in prose, code fences, or be malformed. This module
//! extracts the brace-delimited span and decodes it, substituting a
//! caller-supplied default when anything goes wrong. It never panics and
//! never returns an error — callers can rely on always receiving a
//! usable object.
//!
//! Known limitation: the span is greedy (first `{` to last `}`), so two
//! independent JSON objects in one reply produce an undecodable span and
//! trigger the fallback.

use serde::de::DeserializeOwned;
use tracing::warn;

/// Locate and decode the JSON object embedded in `raw`, or `None`.
pub fn extract_json_value(raw: &str) -> Option<serde_json::Value> {
    let cleaned = strip_code_fences(raw);
    let trimmed = cleaned.trim();

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }

    serde_json::from_str(&trimmed[start..=end]).ok()
}

/// Decode the embedded JSON object into `T`, or return `default`.
pub fn extract_json<T: DeserializeOwned>(raw: &str, default: T) -> T {
    match extract_json_value(raw) {
        Some(value) => match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "AI reply decoded as JSON but not as the expected shape; using fallback");
                default
            }
        },
        None => {
            warn!(
                reply_len = raw.len(),
                "No decodable JSON object in AI reply; using fallback"
            );
            default
        }
    }
}

/// Remove Markdown code-fence markers while keeping the fenced content.
fn strip_code_fences(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}
