//! Chat messages and text helpers shared by prompt builders

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

static CHAT_TEMPLATE_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[/?INST\]|<\|im_start\|>|<\|im_end\|>").expect("valid chat template regex")
});

/// Remove chat-template control tokens (`[INST]`, `<|im_start|>`, ...) and trim.
pub fn strip_control_tokens(text: &str) -> String {
    CHAT_TEMPLATE_TOKENS.replace_all(text, "").trim().to_string()
}

/// Locate the outermost JSON object in model output.
///
/// Models often wrap JSON in markdown fences or surround it with prose; this
/// returns the slice from the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
