use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::session::{Message, Role};
use super::topics::{Topic, TopicKey};
use super::parse_structured;
use crate::langbase::{self, ReasoningEngine};
use crate::prompts;

/// Verdict on whether a topic has been covered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    /// Every subtopic is covered.
    pub is_complete: bool,
    /// Subtopics the reply reports as covered.
    pub covered_subtopics: BTreeSet<String>,
    /// Uncovered subtopics, a subset of the topic's subtopics in their order.
    pub remaining_subtopics: Vec<String>,
    /// Summary of the topic so far; empty on failure.
    pub summary: String,
}

/// Wire shape of the completion-check reply. Every field is required.
#[derive(Debug, Deserialize)]
struct CompletionDocument {
    is_complete: bool,
    covered_subtopics: Vec<String>,
    remaining_subtopics: Vec<String>,
    summary: String,
}

impl CompletionResult {
    /// The fail-soft default: nothing covered, every subtopic remaining.
    pub fn incomplete(topic: &Topic) -> Self {
        Self {
            is_complete: false,
            covered_subtopics: BTreeSet::new(),
            remaining_subtopics: topic.subtopics.iter().map(|s| s.to_string()).collect(),
            summary: String::new(),
        }
    }

    /// Parse a completion-check reply for `topic`.
    ///
    /// Never fails: an unusable reply yields [`CompletionResult::incomplete`].
    /// Remaining subtopics are normalized to the topic's declared labels in
    /// declared order; labels the topic does not declare are dropped.
    pub fn parse(topic: &Topic, completion: &str) -> Self {
        let document: CompletionDocument = match parse_structured(completion) {
            Ok(document) => document,
            Err(reason) => {
                warn!(
                    topic = %topic.key,
                    reason = %reason,
                    "Malformed completion response; treating topic as incomplete"
                );
                return Self::incomplete(topic);
            }
        };

        let reported: BTreeSet<&str> = document
            .remaining_subtopics
            .iter()
            .map(|s| s.trim())
            .collect();

        let remaining_subtopics = topic
            .subtopics
            .iter()
            .filter(|s| reported.contains(**s))
            .map(|s| s.to_string())
            .collect();

        Self {
            is_complete: document.is_complete,
            covered_subtopics: document
                .covered_subtopics
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            remaining_subtopics,
            summary: document.summary.trim().to_string(),
        }
    }
}

/// Render a conversation as `AI:` / `User:` lines for the completion check.
pub fn serialize_history(conversation: &[Message]) -> String {
    conversation
        .iter()
        .map(|m| match m.role {
            Role::Assistant => format!("AI: {}", m.content),
            Role::User => format!("User: {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decides whether a topic is sufficiently covered.
#[derive(Clone)]
pub struct CompletionDetector {
    engine: Arc<dyn ReasoningEngine>,
    pipe_name: String,
}

impl CompletionDetector {
    /// Create a detector backed by the given completion pipe.
    pub fn new(engine: Arc<dyn ReasoningEngine>, pipe_name: impl Into<String>) -> Self {
        Self {
            engine,
            pipe_name: pipe_name.into(),
        }
    }

    /// Check the full conversation of a topic.
    ///
    /// Engine failures degrade to [`CompletionResult::incomplete`].
    pub async fn check(&self, key: TopicKey, conversation: &[Message]) -> CompletionResult {
        let topic = key.topic();
        let start = Instant::now();
        let prompt = prompts::completion_check(topic, &serialize_history(conversation));

        let result = match self
            .engine
            .complete(&self.pipe_name, vec![langbase::Message::user(prompt)])
            .await
        {
            Ok(completion) => CompletionResult::parse(topic, &completion),
            Err(e) => {
                warn!(
                    topic = %key,
                    error = %e,
                    "Completion check failed; treating topic as incomplete"
                );
                CompletionResult::incomplete(topic)
            }
        };

        info!(
            topic = %key,
            is_complete = result.is_complete,
            remaining = result.remaining_subtopics.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Completion check finished"
        );

        result
    }
}
