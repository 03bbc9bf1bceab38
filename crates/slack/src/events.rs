//! Events API webhook envelopes.

use serde::Deserialize;

use pumi_core::domain::event::{EventId, InboundEvent, TeamId};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        team_id: String,
        #[serde(default)]
        event_id: Option<String>,
        event: MessageEvent,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl MessageEvent {
    /// Mentions also arrive as `app_mention`; only the `message` copy is handled.
    fn is_message(&self) -> bool {
        self.kind == "message"
    }

    fn is_bot(&self) -> bool {
        self.bot_id.is_some() || self.subtype.as_deref() == Some("bot_message")
    }
}

/// What the webhook handler should do with a decoded envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    Challenge(String),
    Message(InboundEvent),
    Ignored,
}

impl EventEnvelope {
    pub fn into_webhook_event(self) -> WebhookEvent {
        match self {
            Self::UrlVerification { challenge } => WebhookEvent::Challenge(challenge),
            Self::EventCallback { team_id, event_id, event } => {
                into_inbound(team_id, event_id, event)
                    .map(WebhookEvent::Message)
                    .unwrap_or(WebhookEvent::Ignored)
            }
            Self::Unsupported => WebhookEvent::Ignored,
        }
    }
}

fn into_inbound(team_id: String, event_id: Option<String>, event: MessageEvent) -> Option<InboundEvent> {
    if !event.is_message() {
        return None;
    }
    let channel_id = event.channel.clone()?;
    let timestamp_token = event.ts.clone()?;
    let event_id = event_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| fallback_event_id(&team_id, &channel_id, &timestamp_token));

    Some(InboundEvent {
        event_id: EventId(event_id),
        team_id: TeamId(team_id),
        channel_id,
        user_id: event.user.clone().unwrap_or_default(),
        text: event.text.clone().unwrap_or_default(),
        timestamp_token,
        is_bot_message: event.is_bot(),
    })
}

/// Message timestamps are unique per channel, so this stands in for a missing delivery id.
pub fn fallback_event_id(team_id: &str, channel_id: &str, ts: &str) -> String {
    format!("{team_id}:{channel_id}:{ts}")
}

#[cfg(test)]
mod tests {
    use super::{EventEnvelope, WebhookEvent};

    fn decode(body: &str) -> WebhookEvent {
        serde_json::from_str::<EventEnvelope>(body).expect("envelope").into_webhook_event()
    }

    #[test]
    fn url_verification_yields_challenge() {
        assert_eq!(
            decode(r#"{"type":"url_verification","challenge":"abc","token":"x"}"#),
            WebhookEvent::Challenge("abc".to_owned())
        );
    }

    #[test]
    fn message_callback_becomes_inbound_event() {
        let event = decode(
            r#"{"type":"event_callback","team_id":"T1","event_id":"Ev1","event":{"type":"message","user":"U1","text":"bug: broken","ts":"1700000000.0001","channel":"C1"}}"#,
        );
        let WebhookEvent::Message(inbound) = event else {
            panic!("expected message");
        };
        assert_eq!(inbound.event_id.0, "Ev1");
        assert_eq!(inbound.team_id.0, "T1");
        assert_eq!(inbound.text, "bug: broken");
        assert!(inbound.is_actionable());
    }

    #[test]
    fn bot_messages_are_marked() {
        let event = decode(
            r#"{"type":"event_callback","team_id":"T1","event_id":"Ev2","event":{"type":"message","bot_id":"B1","text":"hi","ts":"1.2","channel":"C1"}}"#,
        );
        let WebhookEvent::Message(inbound) = event else {
            panic!("expected message");
        };
        assert!(inbound.is_bot_message);
        assert!(!inbound.is_actionable());
    }

    #[test]
    fn missing_event_id_falls_back_to_channel_and_ts() {
        let event = decode(
            r#"{"type":"event_callback","team_id":"T1","event":{"type":"message","user":"U1","text":"hi","ts":"1.2","channel":"C9"}}"#,
        );
        let WebhookEvent::Message(inbound) = event else {
            panic!("expected message");
        };
        assert_eq!(inbound.event_id.0, "T1:C9:1.2");
    }

    #[test]
    fn other_event_types_are_ignored() {
        assert_eq!(decode(r#"{"type":"app_rate_limited","minute_rate_limited":1}"#), WebhookEvent::Ignored);
        assert_eq!(
            decode(
                r#"{"type":"event_callback","team_id":"T1","event_id":"Ev3","event":{"type":"reaction_added","user":"U1"}}"#
            ),
            WebhookEvent::Ignored
        );
    }
}
