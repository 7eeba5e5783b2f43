//! Interview session state.
//!
//! [`Session`] is the single mutable aggregate of an interview run. Its
//! fields are private; the state machine mutates it through crate-internal
//! methods that keep the invariants:
//!
//! - every topic has a conversation and a summary slot,
//! - the phase only moves forward (a reset starts a new session),
//! - the synthesis is stored at most once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::synthesis::SynthesisResult;
use super::topics::{Topic, TopicIndex, TopicKey, TOPICS};
use crate::langbase;

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The care team member answering.
    User,
    /// The interviewer.
    Assistant,
}

/// One immutable turn in a topic conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Message {
    /// A message written by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A message produced by the dialogue engine.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Message> for langbase::Message {
    fn from(message: &Message) -> Self {
        match message.role {
            Role::User => langbase::Message::user(&message.content),
            Role::Assistant => langbase::Message::assistant(&message.content),
        }
    }
}

/// Interview phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the case overview.
    #[default]
    Input,
    /// Working through the topics.
    Interview,
    /// All topics closed; the synthesis is shown.
    Summary,
    /// The report has been requested.
    Report,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Input => write!(f, "input"),
            Phase::Interview => write!(f, "interview"),
            Phase::Summary => write!(f, "summary"),
            Phase::Report => write!(f, "report"),
        }
    }
}

/// Result of closing the active topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The interview moved on to this topic.
    Topic(TopicKey),
    /// The last topic was closed.
    Finished,
}

/// Status of one step in the progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Already finished.
    Done,
    /// In progress.
    Current,
    /// Not reached yet.
    Pending,
}

/// One step of the progress display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressStep {
    /// Display label.
    pub label: String,
    /// Status relative to the session's position.
    pub status: StepStatus,
}

/// Interview progress for one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last changed.
    pub updated_at: DateTime<Utc>,
    phase: Phase,
    active_topic: TopicIndex,
    case_overview: String,
    #[serde(default)]
    conversations: BTreeMap<TopicKey, Vec<Message>>,
    #[serde(default)]
    summaries: BTreeMap<TopicKey, Option<String>>,
    #[serde(default)]
    synthesis: Option<SynthesisResult>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session in the input phase.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            phase: Phase::Input,
            active_topic: TopicIndex::FIRST,
            case_overview: String::new(),
            conversations: TopicKey::ALL.iter().map(|k| (*k, Vec::new())).collect(),
            summaries: TopicKey::ALL.iter().map(|k| (*k, None)).collect(),
            synthesis: None,
        }
    }

    /// Discard all progress. The session gets a new id.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Index of the active topic. Meaningful while interviewing; stays on
    /// the last topic afterwards.
    pub fn active_topic_index(&self) -> TopicIndex {
        self.active_topic
    }

    /// The topic being interviewed, if the session is in that phase.
    pub fn active_topic(&self) -> Option<&'static Topic> {
        (self.phase == Phase::Interview).then(|| self.active_topic.topic())
    }

    /// The submitted case overview (empty before submission).
    pub fn case_overview(&self) -> &str {
        &self.case_overview
    }

    /// Conversation of a topic.
    pub fn conversation(&self, key: TopicKey) -> &[Message] {
        self.conversations
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Recorded summary of a topic, if it was closed with one.
    pub fn summary(&self, key: TopicKey) -> Option<&str> {
        self.summaries.get(&key).and_then(|s| s.as_deref())
    }

    /// The memoized synthesis.
    pub fn synthesis(&self) -> Option<&SynthesisResult> {
        self.synthesis.as_ref()
    }

    /// Progress steps derived from the phase and active topic only.
    pub fn progress(&self) -> Vec<ProgressStep> {
        let mut steps = Vec::with_capacity(TOPICS.len() + 3);
        steps.push(self.step("Case input", Phase::Input, None));
        for topic in TOPICS.iter() {
            let label = format!("{}. {}", topic.key.index().get() + 1, topic.title);
            steps.push(self.step(&label, Phase::Interview, Some(topic.key.index())));
        }
        steps.push(self.step("Summary", Phase::Summary, None));
        steps.push(self.step("Report output", Phase::Report, None));
        steps
    }

    fn step(&self, label: &str, phase: Phase, topic: Option<TopicIndex>) -> ProgressStep {
        let status = match (self.phase.cmp(&phase), topic) {
            (Ordering::Greater, _) => StepStatus::Done,
            (Ordering::Less, _) => StepStatus::Pending,
            (Ordering::Equal, None) => StepStatus::Current,
            (Ordering::Equal, Some(index)) => match self.active_topic.cmp(&index) {
                Ordering::Greater => StepStatus::Done,
                Ordering::Equal => StepStatus::Current,
                Ordering::Less => StepStatus::Pending,
            },
        };
        ProgressStep {
            label: label.to_string(),
            status,
        }
    }

    pub(crate) fn begin_interview(&mut self, case_overview: String) {
        self.case_overview = case_overview;
        self.active_topic = TopicIndex::FIRST;
        self.phase = Phase::Interview;
        self.touch();
    }

    pub(crate) fn push_message(&mut self, key: TopicKey, message: Message) {
        self.conversations.entry(key).or_default().push(message);
        self.touch();
    }

    pub(crate) fn record_summary(&mut self, key: TopicKey, summary: String) {
        self.summaries.insert(key, Some(summary));
        self.touch();
    }

    /// Close the active topic and move to the next one or to the summary.
    pub(crate) fn advance_topic(&mut self) -> Advance {
        let advance = match self.active_topic.next() {
            Some(next) => {
                self.active_topic = next;
                Advance::Topic(next.key())
            }
            None => {
                self.phase = Phase::Summary;
                Advance::Finished
            }
        };
        self.touch();
        advance
    }

    pub(crate) fn store_synthesis(&mut self, synthesis: SynthesisResult) -> &SynthesisResult {
        self.touch();
        self.synthesis.get_or_insert(synthesis)
    }

    pub(crate) fn enter_report(&mut self) {
        self.phase = Phase::Report;
        self.touch();
    }

    /// Restore the per-topic entries a stored document may lack.
    pub(crate) fn fill_topic_entries(&mut self) {
        for key in TopicKey::ALL {
            self.conversations.entry(key).or_default();
            self.summaries.entry(key).or_default();
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
