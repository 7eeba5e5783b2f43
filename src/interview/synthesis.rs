use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::parse_structured;
use super::session::Session;
use super::topics::{TopicKey, TOPICS};
use crate::langbase::{self, ReasoningEngine};
use crate::prompts;

/// Discussion point recorded when the synthesis could not be produced.
pub const SYNTHESIS_FAILURE_NOTICE: &str = "Failed to analyze the data. Please try again.";

/// One labelled narrative inside a four-box table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableField {
    /// Field label; empty for an unlabelled field.
    pub label: String,
    /// Field text.
    pub text: String,
}

impl TableField {
    /// A labelled field.
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// The integrated four-box table with discussion points and tensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResult {
    /// Table entries by topic. A parsed result has all four keys; the failure
    /// result has none.
    pub table: BTreeMap<TopicKey, Vec<TableField>>,
    /// Points for the care team to discuss, in order of importance.
    pub discussion_points: Vec<String>,
    /// Conflicts between boxes. May be empty.
    pub tensions: Vec<String>,
}

/// Wire shape of the synthesis reply. Every field is required; `tensions`
/// may be an empty list.
#[derive(Debug, Deserialize)]
struct SynthesisDocument {
    table: serde_json::Map<String, Value>,
    discussion_points: Vec<Value>,
    tensions: Vec<Value>,
}

impl SynthesisResult {
    /// The fail-soft result: an empty table and the failure notice.
    pub fn failed() -> Self {
        Self {
            table: BTreeMap::new(),
            discussion_points: vec![SYNTHESIS_FAILURE_NOTICE.to_string()],
            tensions: Vec::new(),
        }
    }

    /// Fields of a table entry, in document order. Empty when absent.
    pub fn entry(&self, key: TopicKey) -> &[TableField] {
        self.table.get(&key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Parse a synthesis reply. Never fails: an unusable reply yields
    /// [`SynthesisResult::failed`].
    ///
    /// A reply missing `table`, `discussion_points` or `tensions` is
    /// unusable. Unknown table keys are dropped and missing ones get an empty
    /// entry. Non-string values are rendered to text.
    pub fn parse(completion: &str) -> Self {
        let document: SynthesisDocument = match parse_structured(completion) {
            Ok(document) => document,
            Err(reason) => {
                warn!(reason = %reason, "Malformed synthesis response; using failure result");
                return Self::failed();
            }
        };

        let mut table: BTreeMap<TopicKey, Vec<TableField>> =
            TopicKey::ALL.iter().map(|k| (*k, Vec::new())).collect();

        for (key, entry) in document.table {
            let Ok(topic_key) = key.parse::<TopicKey>() else {
                warn!(key = %key, "Dropping unknown table key");
                continue;
            };
            let fields = match entry {
                Value::Object(fields) => fields
                    .into_iter()
                    .map(|(label, value)| TableField::new(label, render_value(&value)))
                    .collect(),
                Value::Null => Vec::new(),
                other => vec![TableField::new(
                    topic_key.topic().short_title,
                    render_value(&other),
                )],
            };
            table.insert(topic_key, fields);
        }

        Self {
            table,
            discussion_points: render_list(&document.discussion_points),
            tensions: render_list(&document.tensions),
        }
    }
}

/// Render a JSON value as display text.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn render_list(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(render_value)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Produces the final synthesis from the four topic summaries.
#[derive(Clone)]
pub struct SynthesisAggregator {
    engine: Arc<dyn ReasoningEngine>,
    pipe_name: String,
}

impl SynthesisAggregator {
    /// Create an aggregator backed by the given synthesis pipe.
    pub fn new(engine: Arc<dyn ReasoningEngine>, pipe_name: impl Into<String>) -> Self {
        Self {
            engine,
            pipe_name: pipe_name.into(),
        }
    }

    /// Run the synthesis for a session. Missing summaries are sent as a
    /// placeholder; engine failures degrade to [`SynthesisResult::failed`].
    ///
    /// This always calls the engine. Memoization lives in
    /// [`InterviewMachine::summarize`](super::InterviewMachine::summarize).
    pub async fn synthesize(&self, session: &Session) -> SynthesisResult {
        let start = Instant::now();
        let summaries: Vec<_> = TOPICS
            .iter()
            .map(|topic| {
                (
                    topic,
                    session
                        .summary(topic.key)
                        .unwrap_or(prompts::SUMMARY_PLACEHOLDER),
                )
            })
            .collect();
        let prompt = prompts::synthesis(session.case_overview(), &summaries);

        let result = match self
            .engine
            .complete(&self.pipe_name, vec![langbase::Message::user(prompt)])
            .await
        {
            Ok(completion) => SynthesisResult::parse(&completion),
            Err(e) => {
                warn!(error = %e, "Synthesis call failed; using failure result");
                SynthesisResult::failed()
            }
        };

        info!(
            session_id = %session.id,
            entries = result.table.len(),
            discussion_points = result.discussion_points.len(),
            tensions = result.tensions.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Synthesis finished"
        );

        result
    }
}
