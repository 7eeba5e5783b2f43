//! Centralized prompt definitions for the interview pipes.
//!
//! System prompts are installed on the pipes at provisioning time; the
//! builders below produce the per-call user instructions.

use crate::interview::Topic;

/// System prompt for the dialogue pipe.
pub const INTERVIEWER_PROMPT: &str = r#"You are EthicsNavi, a facilitator that helps clinicians organize an ethically difficult clinical case using Jonsen's four-box method (Medical Indications, Patient Preferences, Quality of Life, Contextual Features).

Guidelines:
- Ask focused, open questions; at most three per turn
- Do not make the ethical decision for the team; help them articulate facts and values
- Refer to the concrete details of the case the user described
- Keep a calm, respectful, non-judgmental tone
- Reply in the language the user writes in"#;

/// System prompt for the completion-check pipe.
pub const COMPLETION_CHECK_PROMPT: &str = r#"You judge whether one box of Jonsen's four-box method has been discussed sufficiently.

Your response MUST be valid JSON in this exact format:
{
  "is_complete": false,
  "covered_subtopics": ["subtopic already discussed"],
  "remaining_subtopics": ["subtopic still missing"],
  "summary": "concise summary of what has been established for this box"
}

Guidelines:
- A subtopic is covered when the user has given concrete information about it, or explicitly said it is unknown or not applicable
- Use the subtopic labels exactly as given
- is_complete is true only when every subtopic is covered
- Always write the summary, even when the box is incomplete

Always respond with valid JSON only, no other text."#;

/// System prompt for the synthesis pipe.
pub const SYNTHESIS_PROMPT: &str = r#"You integrate the four boxes of Jonsen's clinical ethics method into a structured table.

Your response MUST be valid JSON in this format:
{
  "table": {
    "medical_indications": {"label": "narrative text"},
    "patient_preferences": {"label": "narrative text"},
    "qol": {"label": "narrative text"},
    "contextual_features": {"label": "narrative text"}
  },
  "discussion_points": ["point the care team should discuss"],
  "tensions": ["conflict between two boxes and why it matters"]
}

Guidelines:
- Use exactly the four table keys shown
- Inside each box, choose short labels (for example the box's subtopics) and write a narrative for each
- Mark boxes that were not organized as such instead of inventing facts
- discussion_points are ordered by importance
- tensions may be empty

Always respond with valid JSON only, no other text."#;

/// Text sent in place of a topic summary that was never recorded.
pub const SUMMARY_PLACEHOLDER: &str = "(not yet organized)";

fn join_subtopics<S: AsRef<str>>(subtopics: &[S]) -> String {
    subtopics
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Instruction for the first question of a topic.
pub fn opening_question(topic: &Topic, case_overview: &str) -> String {
    format!(
        "We are now organizing the box \"{title}\" for the following case.\n\n\
         Case overview:\n{overview}\n\n\
         Ask the user questions that draw out information on these subtopics: {subtopics}.\n\
         Briefly explain why this box matters for the case, then ask your questions.",
        title = topic.title,
        overview = case_overview,
        subtopics = join_subtopics(topic.subtopics),
    )
}

/// Instruction for a follow-up question after the user answered.
pub fn follow_up_question<S: AsRef<str>>(
    topic: &Topic,
    case_overview: &str,
    remaining_subtopics: &[S],
) -> String {
    format!(
        "Continue organizing the box \"{title}\".\n\n\
         Case overview:\n{overview}\n\n\
         Subtopics not yet covered: {remaining}.\n\
         Acknowledge the user's last answer in one sentence, then ask about the uncovered subtopics.",
        title = topic.title,
        overview = case_overview,
        remaining = join_subtopics(remaining_subtopics),
    )
}

/// Instruction for the completion check of a topic.
pub fn completion_check(topic: &Topic, conversation_history: &str) -> String {
    format!(
        "Box: {title}\n\
         Subtopics: {subtopics}\n\n\
         Conversation so far:\n{history}\n\n\
         Decide which subtopics are covered and summarize this box.",
        title = topic.title,
        subtopics = join_subtopics(topic.subtopics),
        history = conversation_history,
    )
}

/// Instruction for the final synthesis.
///
/// `summaries` must be in topic order, one entry per topic.
pub fn synthesis(case_overview: &str, summaries: &[(&Topic, &str)]) -> String {
    let mut prompt = format!("Case overview:\n{}\n\n", case_overview);
    for (topic, summary) in summaries {
        prompt.push_str(&format!(
            "Summary of {} ({}):\n{}\n\n",
            topic.title, topic.key, summary
        ));
    }
    prompt.push_str("Build the four-box table, the points for discussion, and the tensions between boxes.");
    prompt
}
