use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat message as delivered by the events webhook. Lives for one dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub event_id: EventId,
    pub team_id: TeamId,
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub timestamp_token: String,
    pub is_bot_message: bool,
}

impl InboundEvent {
    /// Bot echoes and empty messages never enter the pipeline.
    pub fn is_actionable(&self) -> bool {
        !self.is_bot_message && !self.text.trim().is_empty() && !self.user_id.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEventRecord {
    pub event_id: EventId,
    pub team_id: TeamId,
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{EventId, InboundEvent, TeamId};

    fn event(text: &str, is_bot_message: bool) -> InboundEvent {
        InboundEvent {
            event_id: EventId("Ev1".to_owned()),
            team_id: TeamId("T1".to_owned()),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            text: text.to_owned(),
            timestamp_token: "1700000000.000100".to_owned(),
            is_bot_message,
        }
    }

    #[test]
    fn bot_and_blank_messages_are_not_actionable() {
        assert!(event("feedback: hi", false).is_actionable());
        assert!(!event("feedback: hi", true).is_actionable());
        assert!(!event("   ", false).is_actionable());
    }
}
