//! The interview core.
//!
//! - [`topics`](TOPICS): the fixed catalogue of four topics
//! - [`Session`]: interview progress for one case
//! - [`DialogueEngine`]: streams the next interview question
//! - [`CompletionDetector`]: decides whether a topic is covered
//! - [`SynthesisAggregator`]: builds the final four-box table
//! - [`InterviewMachine`]: drives phase and topic transitions
//!
//! Structured engine replies pass through one parsing step each
//! ([`CompletionResult::parse`], [`SynthesisResult::parse`]) that either yields
//! a complete value or the documented fail-soft default.

mod completion;
mod dialogue;
mod machine;
mod session;
mod synthesis;
mod topics;

pub use completion::*;
pub use dialogue::*;
pub use machine::*;
pub use session::*;
pub use synthesis::*;
pub use topics::*;

use serde::de::DeserializeOwned;

/// Strip surrounding whitespace and an enclosing code fence.
///
/// When the reply starts with a fence marker, its first line (the marker and
/// any language tag) and everything from the last marker on are removed.
pub(crate) fn strip_code_fence(completion: &str) -> &str {
    let trimmed = completion.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    let body = trimmed.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    let body = match body.rfind("```") {
        Some(pos) => &body[..pos],
        None => body,
    };
    body.trim()
}

/// Parse a structured engine reply into `T`.
///
/// The error is a human-readable reason meant for logging only.
pub(crate) fn parse_structured<T: DeserializeOwned>(completion: &str) -> Result<T, String> {
    let body = strip_code_fence(completion);
    if body.is_empty() {
        return Err("Empty structured response".to_string());
    }
    serde_json::from_str(body).map_err(|e| {
        format!(
            "{} (first 100 chars: '{}')",
            e,
            body.chars().take(100).collect::<String>()
        )
    })
}
