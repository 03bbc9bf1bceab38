use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::feedback::ParsedFeedback;
use crate::domain::intent::RoutingTarget;

/// Slack caps button values at 2000 characters.
pub const MAX_TOKEN_LEN: usize = 2000;

/// Opaque correlation carried in button values and modal metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpToken {
    pub team_id: String,
    pub channel_id: String,
    pub target: RoutingTarget,
    pub record_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<ParsedFeedback>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FollowUpTokenError {
    #[error("follow-up token could not be encoded: {0}")]
    Encode(String),
    #[error("follow-up token is malformed: {0}")]
    Decode(String),
    #[error("follow-up token does not fit in {MAX_TOKEN_LEN} characters")]
    TooLarge,
}

impl FollowUpToken {
    /// Drops the feedback snapshot when the full token would not fit.
    pub fn encode(&self) -> Result<String, FollowUpTokenError> {
        let encoded = serde_json::to_string(self)
            .map_err(|error| FollowUpTokenError::Encode(error.to_string()))?;
        if encoded.len() <= MAX_TOKEN_LEN {
            return Ok(encoded);
        }

        let slim = Self { feedback: None, ..self.clone() };
        let encoded = serde_json::to_string(&slim)
            .map_err(|error| FollowUpTokenError::Encode(error.to_string()))?;
        if encoded.len() > MAX_TOKEN_LEN {
            return Err(FollowUpTokenError::TooLarge);
        }
        Ok(encoded)
    }

    pub fn decode(value: &str) -> Result<Self, FollowUpTokenError> {
        serde_json::from_str(value).map_err(|error| FollowUpTokenError::Decode(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{FollowUpToken, FollowUpTokenError, MAX_TOKEN_LEN};
    use crate::domain::feedback::{FeedbackTag, ParsedFeedback, Urgency};
    use crate::domain::intent::RoutingTarget;

    fn token(summary: &str) -> FollowUpToken {
        FollowUpToken {
            team_id: "T1".to_owned(),
            channel_id: "C1".to_owned(),
            target: RoutingTarget::ExternalTeamStore,
            record_id: "page-1".to_owned(),
            feedback: Some(ParsedFeedback {
                summary: summary.to_owned(),
                tag: FeedbackTag::Feature,
                urgency: Urgency::Medium,
                next_step: "Scope it".to_owned(),
            }),
        }
    }

    #[test]
    fn decodes_what_it_encodes() {
        let original = token("Dark mode");
        let decoded = FollowUpToken::decode(&original.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, original);
    }

    #[test]
    fn oversized_feedback_snapshot_is_dropped() {
        let encoded = token(&"x".repeat(MAX_TOKEN_LEN)).encode().expect("encode");
        assert!(encoded.len() <= MAX_TOKEN_LEN);
        let decoded = FollowUpToken::decode(&encoded).expect("decode");
        assert_eq!(decoded.feedback, None);
        assert_eq!(decoded.record_id, "page-1");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(FollowUpToken::decode("not json"), Err(FollowUpTokenError::Decode(_))));
    }
}
