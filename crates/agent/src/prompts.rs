//! Prompt builders for the model-backed steps

use stack_advisor_core::{PillarResponses, TranscriptEntry, TurnRole};
use stack_advisor_llm::Message;

use crate::extractor::ExtractionContext;

pub const PILLAR_MARKER_FORMAT: &str = r#"Please return a valid JSON object with double-quoted keys. Example: { "answer_ready": false, "answer": "", "question": "..." }"#;

/// Recommendation categories, in display order
pub const RECOMMENDATION_CATEGORIES: [&str; 6] = [
    "Frontend Language",
    "Backend Language",
    "Database",
    "Framework",
    "Security",
    "Infrastructure",
];

const PILLAR_MARKER_SYSTEM: &str = "You are a requirements analyst helping a user describe a software project. \
You judge whether the user's latest reply answers a specific requirement question well enough to record it.

Rules:
- If the reply answers the question, set answer_ready to true and put a concise, normalized version of the answer in answer.
- If the reply is vague, off-topic or incomplete, set answer_ready to false and put one short clarifying question in question.
- Never invent requirements the user did not state.
- Respond with the JSON object only.";

const SUMMARIZER_SYSTEM: &str = "You summarize requirement-gathering conversations for a software architect. \
Capture the project goal, domain and every stated requirement, constraint and preference. \
Return a JSON object of the form {\"conversation\": \"<summary>\"} and nothing else.";

/// Convert stored transcript entries into chat messages
pub fn history_messages(history: &[TranscriptEntry]) -> Vec<Message> {
    history
        .iter()
        .map(|entry| match entry.role {
            TurnRole::User => Message::user(entry.content.clone()),
            TurnRole::Assistant => Message::assistant(entry.content.clone()),
        })
        .collect()
}

/// Ask the model whether `answer` settles `question`.
pub fn pillar_marker_messages(
    context: &ExtractionContext<'_>,
    question: &str,
    answer: &str,
) -> Vec<Message> {
    let mut messages = vec![Message::system(PILLAR_MARKER_SYSTEM)];
    messages.extend(history_messages(context.history));

    let mut prompt = String::new();
    if let Some(initiative) = context.initiative {
        prompt.push_str(&format!("Project: {}\n", initiative));
    }
    if let Some(domain) = context.domain {
        prompt.push_str(&format!("Domain: {}\n", domain));
    }
    prompt.push_str(&format!(
        "Pillar: {}\nQuestion: {}\nUser reply: {}\n\n{}",
        context.pillar, question, answer, PILLAR_MARKER_FORMAT
    ));
    messages.push(Message::user(prompt));
    messages
}

pub fn summarizer_messages(transcript: &[TranscriptEntry]) -> Vec<Message> {
    let mut conversation = String::new();
    for entry in transcript {
        conversation.push_str(&format!("{}: {}\n", entry.role.as_str(), entry.content));
    }
    vec![
        Message::system(SUMMARIZER_SYSTEM),
        Message::user(format!("Conversation:\n{}", conversation)),
    ]
}

pub fn recommender_messages(summary: &str, responses: &PillarResponses) -> Vec<Message> {
    let requirements = serde_json::to_string_pretty(responses).unwrap_or_default();
    let system = format!(
        "You are a Tech Stack Recommendation Agent. Suggest the most suitable technology stack \
for the user's requirements.

Provide recommendations for these categories when the requirements call for them: {}.

For each category give the best fit and one strong alternative, each with a short explanation \
of its purpose and suitability. If the requirements say nothing relevant to a category, omit it.

Return strictly a JSON object in this format:
{{
  \"Backend Language\": {{
    \"top_recommendation\": {{ \"technology\": \"...\", \"use_case\": \"...\" }},
    \"alternative\": {{ \"technology\": \"...\", \"use_case\": \"...\" }}
  }}
}}",
        RECOMMENDATION_CATEGORIES.join(", ")
    );

    vec![
        Message::system(system),
        Message::user(format!(
            "Conversation summary:\n{}\n\nPillar requirements (JSON):\n{}",
            summary, requirements
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use stack_advisor_llm::Role;

    #[test]
    fn test_pillar_marker_includes_history_and_format() {
        let history = vec![
            TranscriptEntry::user("s1", "Healthcare"),
            TranscriptEntry::assistant("s1", "How many users?"),
        ];
        let context = ExtractionContext {
            initiative: Some("Clinic app"),
            domain: Some("Healthcare"),
            pillar: "Scalability",
            history: &history,
        };
        let messages = pillar_marker_messages(&context, "How many users?", "About 5000");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[2].role, Role::Assistant);
        let last = &messages[3].content;
        assert!(last.contains("Question: How many users?"));
        assert!(last.contains("User reply: About 5000"));
        assert!(last.contains("answer_ready"));
    }

    #[test]
    fn test_recommender_lists_categories() {
        let messages = recommender_messages("A clinic app", &PillarResponses::new());
        assert!(messages[0].content.contains("Infrastructure"));
        assert!(messages[1].content.contains("A clinic app"));
    }
}
