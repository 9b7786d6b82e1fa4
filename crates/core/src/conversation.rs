//! Conversation types including stages and transcript entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Interview stages, in the order a conversation moves through them
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStage {
    /// Introduce the assistant
    #[default]
    Greeting,
    /// Collect the project description
    ProjectDescription,
    /// Collect the industry/domain
    Domain,
    /// Work through every pillar's questions
    PillarQuestions,
    /// Show the collected answers and wait for confirmation
    Summary,
    /// Recommendation delivered
    EndOfConversation,
}

impl ConversationStage {
    /// All stages in forward order
    pub const ALL: [ConversationStage; 6] = [
        ConversationStage::Greeting,
        ConversationStage::ProjectDescription,
        ConversationStage::Domain,
        ConversationStage::PillarQuestions,
        ConversationStage::Summary,
        ConversationStage::EndOfConversation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStage::Greeting => "greeting",
            ConversationStage::ProjectDescription => "project_description",
            ConversationStage::Domain => "domain",
            ConversationStage::PillarQuestions => "pillar_questions",
            ConversationStage::Summary => "summary",
            ConversationStage::EndOfConversation => "end_of_conversation",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|stage| stage.as_str() == s)
    }

    /// Stages this stage may move to. Self-loops are listed explicitly.
    pub fn allowed_transitions(&self) -> &'static [ConversationStage] {
        use ConversationStage::*;
        match self {
            Greeting => &[ProjectDescription],
            ProjectDescription => &[Domain],
            // An empty pillar catalog skips straight to the summary
            Domain => &[PillarQuestions, Summary],
            PillarQuestions => &[PillarQuestions, Summary],
            Summary => &[Summary, EndOfConversation],
            EndOfConversation => &[EndOfConversation],
        }
    }

    pub fn can_transition_to(&self, target: ConversationStage) -> bool {
        self.allowed_transitions().contains(&target)
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            ConversationStage::Greeting => "Greeting",
            ConversationStage::ProjectDescription => "Project Description",
            ConversationStage::Domain => "Domain",
            ConversationStage::PillarQuestions => "Pillar Questions",
            ConversationStage::Summary => "Summary",
            ConversationStage::EndOfConversation => "End of Conversation",
        }
    }
}

impl std::fmt::Display for ConversationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Speaker of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(TurnRole::User),
            "assistant" => Some(TurnRole::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the append-only transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub session_id: String,
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(session_id: impl Into<String>, role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(session_id, TurnRole::User, content)
    }

    pub fn assistant(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(session_id, TurnRole::Assistant, content)
    }
}
