use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::event::TeamId;
use crate::domain::feedback::ParsedFeedback;
use crate::domain::intent::RoutingTarget;

/// A human message archived for digests, regardless of intent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackMessage {
    pub id: String,
    pub team_id: TeamId,
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub message_ts: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Bug,
    Feedback,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Feedback => "feedback",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bug" => Some(Self::Bug),
            "feedback" => Some(Self::Feedback),
            _ => None,
        }
    }
}

/// Row in the shared internal bucket: feedback about the bot itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalFeedback {
    pub id: String,
    pub kind: FeedbackKind,
    pub feedback: ParsedFeedback,
    pub details: String,
    pub team_id: TeamId,
    pub user_id: String,
    pub channel_id: String,
    pub flagged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackFlag {
    pub id: String,
    pub record_id: String,
    pub target: RoutingTarget,
    pub team_id: TeamId,
    pub user_id: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackDigest {
    pub id: String,
    pub team_id: TeamId,
    pub channel_id: String,
    pub summary: String,
    pub raw_text: String,
    pub message_count: u32,
    pub created_at: DateTime<Utc>,
}
