//! Summary and tech stack recommendation hand-off

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use stack_advisor_core::{PillarResponses, TranscriptEntry};
use stack_advisor_llm::{extract_json_object, LlmBackend, LlmError};

use crate::prompts::{self, RECOMMENDATION_CATEGORIES};

/// Produces the final recommendation once the summary is confirmed.
///
/// Both calls are side-effect free and safe to retry.
#[async_trait]
pub trait StackRecommender: Send + Sync {
    async fn summarize(&self, transcript: &[TranscriptEntry]) -> Result<String, LlmError>;

    async fn recommend(
        &self,
        summary: &str,
        responses: &PillarResponses,
    ) -> Result<String, LlmError>;
}

/// Model-backed recommender
pub struct RecommendationAgent {
    llm: Arc<dyn LlmBackend>,
}

impl RecommendationAgent {
    pub fn new(llm: Arc<dyn LlmBackend>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StackRecommender for RecommendationAgent {
    async fn summarize(&self, transcript: &[TranscriptEntry]) -> Result<String, LlmError> {
        let messages = prompts::summarizer_messages(transcript);
        let output = self.llm.generate(&messages).await?;
        parse_summary(&output.text)
    }

    async fn recommend(
        &self,
        summary: &str,
        responses: &PillarResponses,
    ) -> Result<String, LlmError> {
        let messages = prompts::recommender_messages(summary, responses);
        let output = self.llm.generate(&messages).await?;
        render_recommendation(&output.text)
    }
}

/// `{"conversation": "..."}` if present, otherwise the trimmed text
pub fn parse_summary(output: &str) -> Result<String, LlmError> {
    let from_json = extract_json_object(output)
        .and_then(|json| serde_json::from_str::<Value>(json).ok())
        .and_then(|value| {
            value
                .get("conversation")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty());

    let summary = from_json.unwrap_or_else(|| output.trim().to_string());
    if summary.is_empty() {
        return Err(LlmError::InvalidResponse("empty summary".to_string()));
    }
    Ok(summary)
}

/// Render category JSON as plain text; non-JSON output is passed through.
pub fn render_recommendation(output: &str) -> Result<String, LlmError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(LlmError::InvalidResponse("empty recommendation".to_string()));
    }

    let categories = extract_json_object(trimmed)
        .and_then(|json| serde_json::from_str::<Value>(json).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        });

    let Some(categories) = categories else {
        return Ok(trimmed.to_string());
    };

    let mut sections = Vec::new();
    let known = RECOMMENDATION_CATEGORIES.iter().copied();
    let extra = categories
        .keys()
        .map(String::as_str)
        .filter(|k| !RECOMMENDATION_CATEGORIES.contains(k));

    for category in known.chain(extra) {
        if let Some(Value::Object(entry)) = categories.get(category) {
            if let Some(section) = render_category(category, entry) {
                sections.push(section);
            }
        }
    }

    if sections.is_empty() {
        return Ok(trimmed.to_string());
    }
    Ok(sections.join("\n\n"))
}

fn render_category(category: &str, entry: &Map<String, Value>) -> Option<String> {
    let top = entry.get("top_recommendation").and_then(render_choice);
    let alternative = entry.get("alternative").and_then(render_choice);
    if top.is_none() && alternative.is_none() {
        return None;
    }

    let mut text = format!("{}:", category);
    if let Some(top) = top {
        text.push_str(&format!("\n  • Recommended: {}", top));
    }
    if let Some(alternative) = alternative {
        text.push_str(&format!("\n  • Alternative: {}", alternative));
    }
    Some(text)
}

fn render_choice(choice: &Value) -> Option<String> {
    let object = choice.as_object()?;
    let technology = ["technology", "tech stack", "tech_stack"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("none"))?;

    match object
        .get("use_case")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|u| !u.is_empty())
    {
        Some(use_case) => Some(format!("{} ({})", technology, use_case)),
        None => Some(technology.to_string()),
    }
}
