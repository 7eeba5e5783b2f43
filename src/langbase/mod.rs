//! Langbase Pipes client and the reasoning-engine seam.
//!
//! The interview core only talks to [`ReasoningEngine`]; [`LangbaseClient`]
//! is the production implementation.

mod client;
mod stream;
mod types;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use client::LangbaseClient;
pub use stream::{Fragment, FragmentStream, SseDecoder, FRAGMENT_BUFFER};
pub use types::*;

use async_trait::async_trait;

use crate::error::LangbaseResult;

/// External text-generation service used by the interview.
///
/// Calls are single round trips with no retry. Timeouts and cancellation
/// belong to the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Run `pipe` and return the whole completion text.
    async fn complete(&self, pipe: &str, messages: Vec<Message>) -> LangbaseResult<String>;

    /// Run `pipe` and return its output as an ordered fragment sequence.
    async fn stream(&self, pipe: &str, messages: Vec<Message>) -> LangbaseResult<FragmentStream>;
}
