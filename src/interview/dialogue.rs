use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::session::Message;
use super::topics::Topic;
use crate::error::DialogueError;
use crate::langbase::{self, ReasoningEngine};
use crate::prompts;

/// Produces the next interview question for a topic.
#[derive(Clone)]
pub struct DialogueEngine {
    engine: Arc<dyn ReasoningEngine>,
    pipe_name: String,
}

impl DialogueEngine {
    /// Create a dialogue engine backed by the given streaming pipe.
    pub fn new(engine: Arc<dyn ReasoningEngine>, pipe_name: impl Into<String>) -> Self {
        Self {
            engine,
            pipe_name: pipe_name.into(),
        }
    }

    /// Build the pipe input for the next question.
    ///
    /// An empty conversation gets the opening instruction alone. Otherwise the
    /// conversation is replayed as chat history, followed by a follow-up
    /// instruction naming `remaining` (or every subtopic when `remaining` is
    /// absent or empty).
    pub fn build_messages(
        case_overview: &str,
        topic: &Topic,
        conversation: &[Message],
        remaining: Option<&[String]>,
    ) -> Vec<langbase::Message> {
        if conversation.is_empty() {
            return vec![langbase::Message::user(prompts::opening_question(
                topic,
                case_overview,
            ))];
        }

        let instruction = match remaining {
            Some(remaining) if !remaining.is_empty() => {
                prompts::follow_up_question(topic, case_overview, remaining)
            }
            _ => prompts::follow_up_question(topic, case_overview, topic.subtopics),
        };

        let mut messages: Vec<langbase::Message> =
            conversation.iter().map(langbase::Message::from).collect();
        messages.push(langbase::Message::user(instruction));
        messages
    }

    /// Stream the next question and return it as one assistant message.
    ///
    /// `on_fragment` sees every text fragment in arrival order. Nothing is
    /// returned unless the stream reaches its terminal marker.
    pub async fn next_question<F>(
        &self,
        case_overview: &str,
        topic: &Topic,
        conversation: &[Message],
        remaining: Option<&[String]>,
        on_fragment: F,
    ) -> Result<Message, DialogueError>
    where
        F: FnMut(&str),
    {
        let start = Instant::now();
        let messages = Self::build_messages(case_overview, topic, conversation, remaining);
        debug!(
            topic = %topic.key,
            history = conversation.len(),
            "Requesting next question"
        );

        let stream = self.engine.stream(&self.pipe_name, messages).await?;
        let text = stream.collect(on_fragment).await.map_err(|e| {
            warn!(topic = %topic.key, error = %e, "Question stream abandoned");
            e
        })?;

        info!(
            topic = %topic.key,
            chars = text.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Question generated"
        );

        Ok(Message::assistant(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LangbaseError;
    use crate::interview::TopicKey;
    use crate::langbase::{Fragment, FragmentStream, MessageRole, MockReasoningEngine};
    use pretty_assertions::assert_eq;

    fn scripted(fragments: Vec<Fragment>) -> DialogueEngine {
        let mut engine = MockReasoningEngine::new();
        engine
            .expect_stream()
            .times(1)
            .return_once(move |_, _| Ok(FragmentStream::from_fragments(fragments)));
        DialogueEngine::new(Arc::new(engine), "dialogue-pipe")
    }

    #[test]
    fn test_opening_messages_have_no_history() {
        let topic = TopicKey::MedicalIndications.topic();
        let messages = DialogueEngine::build_messages("case", topic, &[], None);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
        assert!(messages[0].content.contains("Medical futility"));
    }

    #[test]
    fn test_follow_up_replays_history_then_instruction() {
        let topic = TopicKey::MedicalIndications.topic();
        let conversation = vec![
            Message::assistant("What is the diagnosis?"),
            Message::user("Advanced lung cancer."),
        ];
        let remaining = vec!["Medical futility".to_string()];
        let messages =
            DialogueEngine::build_messages("case", topic, &conversation, Some(&remaining));

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], langbase::Message::assistant("What is the diagnosis?"));
        assert_eq!(messages[1], langbase::Message::user("Advanced lung cancer."));
        assert!(messages[2].content.contains("Medical futility"));
        assert!(!messages[2].content.contains("Goals of treatment"));
    }

    #[test]
    fn test_follow_up_defaults_to_all_subtopics() {
        let topic = TopicKey::Qol.topic();
        let conversation = vec![Message::user("answer")];

        for remaining in [None, Some(&[][..])] {
            let messages = DialogueEngine::build_messages("case", topic, &conversation, remaining);
            let instruction = &messages.last().unwrap().content;
            for subtopic in topic.subtopics {
                assert!(instruction.contains(subtopic), "missing {subtopic}");
            }
        }
    }

    #[tokio::test]
    async fn test_next_question_concatenates_fragments_in_order() {
        let dialogue = scripted(vec![
            Fragment::Text("What is ".to_string()),
            Fragment::Text("the prognosis".to_string()),
            Fragment::Text("?".to_string()),
            Fragment::Done,
        ]);

        let mut seen = Vec::new();
        let message = dialogue
            .next_question(
                "case",
                TopicKey::MedicalIndications.topic(),
                &[],
                None,
                |f| seen.push(f.to_string()),
            )
            .await
            .unwrap();

        assert_eq!(message, Message::assistant("What is the prognosis?"));
        assert_eq!(seen, vec!["What is ", "the prognosis", "?"]);
    }

    #[tokio::test]
    async fn test_next_question_discards_abandoned_stream() {
        let dialogue = scripted(vec![
            Fragment::Text("What is ".to_string()),
            Fragment::Failed("connection reset".to_string()),
        ]);

        let err = dialogue
            .next_question("case", TopicKey::Qol.topic(), &[], None, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, DialogueError::Interrupted { fragments: 1 }));
    }

    #[tokio::test]
    async fn test_next_question_without_terminal_marker_is_interrupted() {
        let dialogue = scripted(vec![Fragment::Text("partial".to_string())]);

        let err = dialogue
            .next_question("case", TopicKey::Qol.topic(), &[], None, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, DialogueError::Interrupted { .. }));
    }

    #[tokio::test]
    async fn test_next_question_surfaces_engine_failure() {
        let mut engine = MockReasoningEngine::new();
        engine.expect_stream().times(1).returning(|_, _| {
            Err(LangbaseError::Api {
                status: 500,
                message: "boom".to_string(),
            })
        });
        let dialogue = DialogueEngine::new(Arc::new(engine), "dialogue-pipe");

        let err = dialogue
            .next_question("case", TopicKey::Qol.topic(), &[], None, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, DialogueError::Engine(_)));
    }
}
