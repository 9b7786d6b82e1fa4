//! Scripted backend for tests
//!
//! Replies are consumed in order; once the script is exhausted the fallback
//! reply (if any) is returned for every further call.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{GenerationResult, LlmBackend};
use crate::prompt::Message;
use crate::LlmError;

#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<String>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply returned whenever the script is empty
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) -> &Self {
        self.replies.lock().push_back(Ok(reply.into()));
        self
    }

    pub fn push_error(&self, error: LlmError) -> &Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    /// Number of `generate` calls so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Messages sent on each call
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        self.calls.lock().push(messages.to_vec());
        let next = self.replies.lock().pop_front();
        match next {
            Some(Ok(text)) => Ok(GenerationResult::from_text(text)),
            Some(Err(e)) => Err(e),
            None => self
                .fallback
                .clone()
                .map(GenerationResult::from_text)
                .ok_or_else(|| LlmError::Generation("script exhausted".to_string())),
        }
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
