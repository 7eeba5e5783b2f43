//! Interview state machine.
//!
//! [`InterviewMachine`] owns the engine-backed components and applies the
//! user's actions to a [`Session`] passed in by `&mut`. Every action returns a
//! [`TurnOutcome`]; actions that do not apply to the current state are
//! reported as [`TurnOutcome::Ignored`] and leave the session untouched.

use chrono::Local;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::completion::CompletionDetector;
use super::dialogue::DialogueEngine;
use super::session::{Advance, Message, Phase, Session};
use super::synthesis::{SynthesisAggregator, SynthesisResult};
use super::topics::TopicKey;
use crate::config::{PipeConfig, ReportConfig};
use crate::error::{DialogueError, ReportError, ReportResult};
use crate::langbase::ReasoningEngine;
use crate::report;

/// Why an action was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The input was blank after trimming.
    EmptyInput,
    /// The action does not apply to the current phase.
    WrongPhase,
    /// The action named a topic other than the active one.
    InactiveTopic,
    /// The active topic already has its opening question.
    AlreadyOpened,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::EmptyInput => write!(f, "input is empty"),
            IgnoreReason::WrongPhase => write!(f, "not available in the current phase"),
            IgnoreReason::InactiveTopic => write!(f, "topic is not the active one"),
            IgnoreReason::AlreadyOpened => write!(f, "topic is already open"),
        }
    }
}

/// Result of one action on the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The case was accepted and the interview starts on this topic.
    Started(TopicKey),
    /// A question was generated and appended to the active conversation.
    Asked(Message),
    /// The active topic was closed and the interview moved on.
    Advanced { from: TopicKey, to: TopicKey },
    /// The last topic was closed; the session is in the summary phase.
    Finished,
    /// The session entered the report phase.
    ReportReady,
    /// Nothing changed.
    Ignored(IgnoreReason),
    /// The question stream was abandoned; no question was appended.
    Interrupted,
}

/// Drives a [`Session`] through the interview.
pub struct InterviewMachine {
    dialogue: DialogueEngine,
    completion: CompletionDetector,
    synthesis: SynthesisAggregator,
    report: ReportConfig,
}

impl InterviewMachine {
    /// Build a machine whose components all use `engine` with the configured pipes.
    pub fn new(engine: Arc<dyn ReasoningEngine>, pipes: &PipeConfig, report: ReportConfig) -> Self {
        Self {
            dialogue: DialogueEngine::new(engine.clone(), pipes.dialogue.clone()),
            completion: CompletionDetector::new(engine.clone(), pipes.completion.clone()),
            synthesis: SynthesisAggregator::new(engine, pipes.synthesis.clone()),
            report,
        }
    }

    /// Accept the case overview and start the interview on the first topic.
    pub fn submit_case(&self, session: &mut Session, text: &str) -> TurnOutcome {
        if session.phase() != Phase::Input {
            return TurnOutcome::Ignored(IgnoreReason::WrongPhase);
        }
        let overview = text.trim();
        if overview.is_empty() {
            return TurnOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        session.begin_interview(overview.to_string());
        let first = session.active_topic_index().key();
        info!(session_id = %session.id, topic = %first, "Interview started");
        TurnOutcome::Started(first)
    }

    /// Ask the opening question of the active topic if it has none yet.
    pub async fn open_active_topic<F>(&self, session: &mut Session, on_fragment: F) -> TurnOutcome
    where
        F: FnMut(&str),
    {
        let Some(topic) = session.active_topic() else {
            return TurnOutcome::Ignored(IgnoreReason::WrongPhase);
        };
        if !session.conversation(topic.key).is_empty() {
            return TurnOutcome::Ignored(IgnoreReason::AlreadyOpened);
        }

        let result = self
            .dialogue
            .next_question(session.case_overview(), topic, &[], None, on_fragment)
            .await;
        self.append_question(session, topic.key, result)
    }

    /// Record a user answer, check completion and either move on or ask a
    /// follow-up question.
    pub async fn submit_turn<F>(
        &self,
        session: &mut Session,
        key: TopicKey,
        text: &str,
        on_fragment: F,
    ) -> TurnOutcome
    where
        F: FnMut(&str),
    {
        if let Err(reason) = check_active(session, key) {
            return TurnOutcome::Ignored(reason);
        }
        let answer = text.trim();
        if answer.is_empty() {
            return TurnOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        session.push_message(key, Message::user(answer));

        let verdict = self.completion.check(key, session.conversation(key)).await;
        if verdict.is_complete {
            session.record_summary(key, verdict.summary);
            return self.advance(session, key);
        }

        let topic = key.topic();
        let result = self
            .dialogue
            .next_question(
                session.case_overview(),
                topic,
                session.conversation(key),
                Some(verdict.remaining_subtopics.as_slice()),
                on_fragment,
            )
            .await;
        self.append_question(session, key, result)
    }

    /// Close the active topic regardless of completion.
    ///
    /// A topic with an empty conversation is closed without a summary.
    pub async fn force_advance(&self, session: &mut Session, key: TopicKey) -> TurnOutcome {
        if let Err(reason) = check_active(session, key) {
            return TurnOutcome::Ignored(reason);
        }

        if session.conversation(key).is_empty() {
            debug!(topic = %key, "Forced advance on empty topic; no summary recorded");
        } else {
            let verdict = self.completion.check(key, session.conversation(key)).await;
            session.record_summary(key, verdict.summary);
        }

        info!(session_id = %session.id, topic = %key, "Topic closed by forced advance");
        self.advance(session, key)
    }

    /// The session's synthesis, computed on first read.
    ///
    /// Returns `None` before the summary phase. Once computed (or failed
    /// soft) the stored value is returned without calling the engine.
    pub async fn summarize<'s>(&self, session: &'s mut Session) -> Option<&'s SynthesisResult> {
        if session.phase() < Phase::Summary {
            return None;
        }
        if session.synthesis().is_none() {
            let result = self.synthesis.synthesize(session).await;
            session.store_synthesis(result);
        } else {
            debug!(session_id = %session.id, "Returning memoized synthesis");
        }
        session.synthesis()
    }

    /// Move from the summary phase to the report phase.
    pub async fn request_report(&self, session: &mut Session) -> TurnOutcome {
        match session.phase() {
            Phase::Summary => {}
            Phase::Report => return TurnOutcome::ReportReady,
            _ => return TurnOutcome::Ignored(IgnoreReason::WrongPhase),
        }

        self.summarize(session).await;
        session.enter_report();
        info!(session_id = %session.id, "Report requested");
        TurnOutcome::ReportReady
    }

    /// Discard all progress.
    pub fn reset(&self, session: &mut Session) {
        let previous = std::mem::take(&mut session.id);
        session.reset();
        info!(previous_id = %previous, session_id = %session.id, "Session reset");
    }

    /// Render the PDF report of a session that has a synthesis.
    pub fn render_report(&self, session: &Session) -> ReportResult<Vec<u8>> {
        let synthesis = session.synthesis().ok_or(ReportError::MissingSynthesis)?;
        report::generate_report(
            session.case_overview(),
            synthesis,
            Local::now().date_naive(),
            &self.report,
        )
    }

    fn advance(&self, session: &mut Session, from: TopicKey) -> TurnOutcome {
        match session.advance_topic() {
            Advance::Topic(to) => {
                info!(session_id = %session.id, from = %from, to = %to, "Advanced to next topic");
                TurnOutcome::Advanced { from, to }
            }
            Advance::Finished => {
                info!(session_id = %session.id, "All topics closed");
                TurnOutcome::Finished
            }
        }
    }

    fn append_question(
        &self,
        session: &mut Session,
        key: TopicKey,
        result: Result<Message, DialogueError>,
    ) -> TurnOutcome {
        match result {
            Ok(question) => {
                session.push_message(key, question.clone());
                TurnOutcome::Asked(question)
            }
            Err(e) => {
                warn!(topic = %key, error = %e, "No question appended");
                TurnOutcome::Interrupted
            }
        }
    }
}

fn check_active(session: &Session, key: TopicKey) -> Result<(), IgnoreReason> {
    match session.active_topic() {
        None => Err(IgnoreReason::WrongPhase),
        Some(topic) if topic.key != key => Err(IgnoreReason::InactiveTopic),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::langbase::{Fragment, FragmentStream, MockReasoningEngine};
    use pretty_assertions::assert_eq;

    const COMPLETE: &str = r#"{"is_complete": true, "covered_subtopics": [], "remaining_subtopics": [], "summary": "S"}"#;
    const INCOMPLETE: &str = r#"{"is_complete": false, "covered_subtopics": ["Goals of treatment"], "remaining_subtopics": ["Medical futility"], "summary": "partial"}"#;

    fn machine(engine: MockReasoningEngine) -> InterviewMachine {
        InterviewMachine::new(
            Arc::new(engine),
            &PipeConfig::default(),
            ReportConfig::default(),
        )
    }

    fn question(text: &str) -> FragmentStream {
        FragmentStream::from_fragments(vec![Fragment::Text(text.to_string()), Fragment::Done])
    }

    fn interviewing() -> Session {
        let mut session = Session::new();
        session.begin_interview("case".to_string());
        session
    }

    #[test]
    fn test_submit_case_trims_and_starts() {
        let machine = machine(MockReasoningEngine::new());
        let mut session = Session::new();

        assert_eq!(
            machine.submit_case(&mut session, "   \n"),
            TurnOutcome::Ignored(IgnoreReason::EmptyInput)
        );
        assert_eq!(session.phase(), Phase::Input);

        assert_eq!(
            machine.submit_case(&mut session, "  80-year-old with pneumonia  "),
            TurnOutcome::Started(TopicKey::MedicalIndications)
        );
        assert_eq!(session.case_overview(), "80-year-old with pneumonia");
        assert_eq!(session.phase(), Phase::Interview);

        assert_eq!(
            machine.submit_case(&mut session, "another case"),
            TurnOutcome::Ignored(IgnoreReason::WrongPhase)
        );
        assert_eq!(session.case_overview(), "80-year-old with pneumonia");
    }

    #[tokio::test]
    async fn test_blank_turn_makes_no_engine_call() {
        let machine = machine(MockReasoningEngine::new());
        let mut session = interviewing();

        let outcome = machine
            .submit_turn(&mut session, TopicKey::MedicalIndications, "  ", |_| {})
            .await;
        assert_eq!(outcome, TurnOutcome::Ignored(IgnoreReason::EmptyInput));
        assert!(session.conversation(TopicKey::MedicalIndications).is_empty());
    }

    #[tokio::test]
    async fn test_turn_for_inactive_topic_is_ignored() {
        let machine = machine(MockReasoningEngine::new());
        let mut session = interviewing();

        let outcome = machine
            .submit_turn(&mut session, TopicKey::Qol, "answer", |_| {})
            .await;
        assert_eq!(outcome, TurnOutcome::Ignored(IgnoreReason::InactiveTopic));

        let outcome = machine.force_advance(&mut session, TopicKey::Qol).await;
        assert_eq!(outcome, TurnOutcome::Ignored(IgnoreReason::InactiveTopic));
        assert_eq!(session.active_topic_index().key(), TopicKey::MedicalIndications);
    }

    #[tokio::test]
    async fn test_actions_in_input_phase_are_ignored() {
        let machine = machine(MockReasoningEngine::new());
        let mut session = Session::new();

        assert_eq!(
            machine.open_active_topic(&mut session, |_| {}).await,
            TurnOutcome::Ignored(IgnoreReason::WrongPhase)
        );
        assert_eq!(
            machine.request_report(&mut session).await,
            TurnOutcome::Ignored(IgnoreReason::WrongPhase)
        );
        assert!(machine.summarize(&mut session).await.is_none());
        assert_eq!(session.phase(), Phase::Input);
    }

    #[tokio::test]
    async fn test_open_active_topic_only_once() {
        let mut engine = MockReasoningEngine::new();
        engine
            .expect_stream()
            .times(1)
            .returning(|_, _| Ok(question("What is the diagnosis?")));
        let machine = machine(engine);
        let mut session = interviewing();

        let outcome = machine.open_active_topic(&mut session, |_| {}).await;
        assert_eq!(
            outcome,
            TurnOutcome::Asked(Message::assistant("What is the diagnosis?"))
        );
        assert_eq!(
            machine.open_active_topic(&mut session, |_| {}).await,
            TurnOutcome::Ignored(IgnoreReason::AlreadyOpened)
        );
        assert_eq!(session.conversation(TopicKey::MedicalIndications).len(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_turn_asks_about_remaining_subtopics() {
        let mut engine = MockReasoningEngine::new();
        engine
            .expect_complete()
            .times(1)
            .returning(|_, _| Ok(INCOMPLETE.to_string()));
        engine
            .expect_stream()
            .withf(|_, messages| {
                let instruction = &messages.last().unwrap().content;
                instruction.contains("Medical futility") && !instruction.contains("Goals of treatment")
            })
            .times(1)
            .returning(|_, _| Ok(question("Is treatment futile?")));
        let machine = machine(engine);
        let mut session = interviewing();

        let outcome = machine
            .submit_turn(&mut session, TopicKey::MedicalIndications, " Lung cancer ", |_| {})
            .await;

        assert_eq!(
            outcome,
            TurnOutcome::Asked(Message::assistant("Is treatment futile?"))
        );
        assert_eq!(
            session.conversation(TopicKey::MedicalIndications),
            &[
                Message::user("Lung cancer"),
                Message::assistant("Is treatment futile?")
            ]
        );
        assert!(session.summary(TopicKey::MedicalIndications).is_none());
    }

    #[tokio::test]
    async fn test_complete_turn_records_summary_and_advances() {
        let mut engine = MockReasoningEngine::new();
        engine
            .expect_complete()
            .times(1)
            .returning(|_, _| Ok(COMPLETE.to_string()));
        let machine = machine(engine);
        let mut session = interviewing();

        let outcome = machine
            .submit_turn(&mut session, TopicKey::MedicalIndications, "everything", |_| {})
            .await;

        assert_eq!(
            outcome,
            TurnOutcome::Advanced {
                from: TopicKey::MedicalIndications,
                to: TopicKey::PatientPreferences
            }
        );
        assert_eq!(session.summary(TopicKey::MedicalIndications), Some("S"));
    }

    #[tokio::test]
    async fn test_interrupted_question_appends_nothing() {
        let mut engine = MockReasoningEngine::new();
        engine
            .expect_complete()
            .times(1)
            .returning(|_, _| Ok(INCOMPLETE.to_string()));
        engine.expect_stream().times(1).returning(|_, _| {
            Ok(FragmentStream::from_fragments(vec![
                Fragment::Text("Is treat".to_string()),
                Fragment::Failed("reset".to_string()),
            ]))
        });
        let machine = machine(engine);
        let mut session = interviewing();

        let outcome = machine
            .submit_turn(&mut session, TopicKey::MedicalIndications, "answer", |_| {})
            .await;

        assert_eq!(outcome, TurnOutcome::Interrupted);
        assert_eq!(
            session.conversation(TopicKey::MedicalIndications),
            &[Message::user("answer")]
        );
    }

    #[tokio::test]
    async fn test_force_advance_on_empty_topic_skips_check() {
        let machine = machine(MockReasoningEngine::new());
        let mut session = interviewing();

        let outcome = machine
            .force_advance(&mut session, TopicKey::MedicalIndications)
            .await;

        assert_eq!(
            outcome,
            TurnOutcome::Advanced {
                from: TopicKey::MedicalIndications,
                to: TopicKey::PatientPreferences
            }
        );
        assert!(session.summary(TopicKey::MedicalIndications).is_none());
    }

    #[tokio::test]
    async fn test_force_advance_records_fail_soft_summary() {
        let mut engine = MockReasoningEngine::new();
        engine
            .expect_complete()
            .times(1)
            .returning(|_, _| Ok("garbage".to_string()));
        let machine = machine(engine);
        let mut session = interviewing();
        session.push_message(TopicKey::MedicalIndications, Message::user("answer"));

        machine
            .force_advance(&mut session, TopicKey::MedicalIndications)
            .await;

        assert_eq!(session.summary(TopicKey::MedicalIndications), Some(""));
    }

    #[tokio::test]
    async fn test_summarize_is_memoized_and_report_is_monotonic() {
        let mut engine = MockReasoningEngine::new();
        engine
            .expect_complete()
            .times(1)
            .returning(|_, _| Ok("not json".to_string()));
        let machine = machine(engine);
        let mut session = interviewing();
        for key in TopicKey::ALL {
            machine.force_advance(&mut session, key).await;
        }
        assert_eq!(session.phase(), Phase::Summary);

        let first = machine.summarize(&mut session).await.cloned();
        let second = machine.summarize(&mut session).await.cloned();
        assert_eq!(first, Some(SynthesisResult::failed()));
        assert_eq!(first, second);

        assert_eq!(machine.request_report(&mut session).await, TurnOutcome::ReportReady);
        assert_eq!(session.phase(), Phase::Report);
        assert_eq!(machine.request_report(&mut session).await, TurnOutcome::ReportReady);
        assert_eq!(session.phase(), Phase::Report);
    }

    #[test]
    fn test_reset_returns_to_input() {
        let machine = machine(MockReasoningEngine::new());
        let mut session = interviewing();
        let old_id = session.id.clone();

        machine.reset(&mut session);

        assert_eq!(session.phase(), Phase::Input);
        assert_ne!(session.id, old_id);
    }

    #[test]
    fn test_render_report_requires_synthesis() {
        let machine = machine(MockReasoningEngine::new());
        let session = interviewing();
        assert!(matches!(
            machine.render_report(&session),
            Err(ReportError::MissingSynthesis)
        ));
    }
}
