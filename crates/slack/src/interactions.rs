//! Interactive payloads: button clicks on the feedback card and modal submissions.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use pumi_core::domain::feedback::{FeedbackTag, ParsedFeedback, Urgency};
use pumi_core::flows::FollowUpEvent;

use crate::blocks::{CONFIRM_ACTION_ID, EDIT_ACTION_ID, FLAG_ACTION_ID};
use crate::modals::{
    EDIT_CALLBACK_ID, FLAG_CALLBACK_ID, INPUT_ACTION_ID, NEXT_STEP_BLOCK_ID, REASON_BLOCK_ID,
    SUMMARY_BLOCK_ID, TAG_BLOCK_ID, URGENCY_BLOCK_ID,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InteractionError {
    #[error("interaction payload is malformed: {0}")]
    Payload(String),
    #[error("modal submission is missing `{0}`")]
    MissingField(&'static str),
    #[error("modal submission field `{field}` has invalid value `{value}`")]
    InvalidValue { field: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Interaction {
    ButtonClicked {
        event: FollowUpEvent,
        token: String,
        trigger_id: String,
        user_id: String,
        team_id: String,
    },
    EditSubmitted {
        metadata: String,
        user_id: String,
        team_id: String,
        feedback: ParsedFeedback,
    },
    FlagSubmitted {
        metadata: String,
        user_id: String,
        team_id: String,
        reason: String,
    },
    Unsupported {
        kind: String,
    },
}

impl Interaction {
    pub fn follow_up_event(&self) -> Option<FollowUpEvent> {
        match self {
            Self::ButtonClicked { event, .. } => Some(*event),
            Self::EditSubmitted { .. } => Some(FollowUpEvent::EditSubmitted),
            Self::FlagSubmitted { .. } => Some(FollowUpEvent::FlagSubmitted),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Deserialize)]
struct InteractionForm {
    payload: String,
}

#[derive(Default, Deserialize)]
struct IdRef {
    #[serde(default)]
    id: String,
}

#[derive(Deserialize)]
struct RawAction {
    action_id: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Default, Deserialize)]
struct RawView {
    #[serde(default)]
    callback_id: String,
    #[serde(default)]
    private_metadata: String,
    #[serde(default)]
    state: RawViewState,
}

#[derive(Default, Deserialize)]
struct RawViewState {
    #[serde(default)]
    values: HashMap<String, HashMap<String, RawInputValue>>,
}

#[derive(Deserialize)]
struct RawInputValue {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    selected_option: Option<RawSelectedOption>,
}

#[derive(Deserialize)]
struct RawSelectedOption {
    value: String,
}

#[derive(Deserialize)]
struct RawInteraction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    user: IdRef,
    #[serde(default)]
    team: IdRef,
    #[serde(default)]
    trigger_id: String,
    #[serde(default)]
    actions: Vec<RawAction>,
    #[serde(default)]
    view: Option<RawView>,
}

/// Decodes the `payload` field of an already-verified form body.
pub fn parse_interaction_form(body: &[u8]) -> Result<Interaction, InteractionError> {
    let form: InteractionForm = serde_urlencoded::from_bytes(body)
        .map_err(|error| InteractionError::Payload(error.to_string()))?;
    parse_interaction(&form.payload)
}

pub fn parse_interaction(payload: &str) -> Result<Interaction, InteractionError> {
    let raw: RawInteraction = serde_json::from_str(payload)
        .map_err(|error| InteractionError::Payload(error.to_string()))?;

    match raw.kind.as_str() {
        "block_actions" => {
            let Some(action) = raw.actions.into_iter().next() else {
                return Err(InteractionError::Payload("block_actions without actions".to_owned()));
            };
            let event = match action.action_id.as_str() {
                CONFIRM_ACTION_ID => FollowUpEvent::ConfirmClicked,
                EDIT_ACTION_ID => FollowUpEvent::EditClicked,
                FLAG_ACTION_ID => FollowUpEvent::FlagClicked,
                other => return Ok(Interaction::Unsupported { kind: other.to_owned() }),
            };
            Ok(Interaction::ButtonClicked {
                event,
                token: action.value.unwrap_or_default(),
                trigger_id: raw.trigger_id,
                user_id: raw.user.id,
                team_id: raw.team.id,
            })
        }
        "view_submission" => {
            let view = raw.view.unwrap_or_default();
            match view.callback_id.as_str() {
                EDIT_CALLBACK_ID => Ok(Interaction::EditSubmitted {
                    feedback: edited_feedback(&view.state)?,
                    metadata: view.private_metadata,
                    user_id: raw.user.id,
                    team_id: raw.team.id,
                }),
                FLAG_CALLBACK_ID => Ok(Interaction::FlagSubmitted {
                    reason: required_value(&view.state, REASON_BLOCK_ID, "reason")?,
                    metadata: view.private_metadata,
                    user_id: raw.user.id,
                    team_id: raw.team.id,
                }),
                other => Ok(Interaction::Unsupported { kind: other.to_owned() }),
            }
        }
        other => Ok(Interaction::Unsupported { kind: other.to_owned() }),
    }
}

fn required_value(
    state: &RawViewState,
    block_id: &str,
    field: &'static str,
) -> Result<String, InteractionError> {
    state
        .values
        .get(block_id)
        .and_then(|inputs| inputs.get(INPUT_ACTION_ID))
        .and_then(|input| {
            input
                .selected_option
                .as_ref()
                .map(|option| option.value.clone())
                .or_else(|| input.value.clone())
        })
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or(InteractionError::MissingField(field))
}

fn edited_feedback(state: &RawViewState) -> Result<ParsedFeedback, InteractionError> {
    let tag = required_value(state, TAG_BLOCK_ID, "tag")?;
    let urgency = required_value(state, URGENCY_BLOCK_ID, "urgency")?;
    Ok(ParsedFeedback {
        summary: required_value(state, SUMMARY_BLOCK_ID, "summary")?,
        tag: tag
            .parse::<FeedbackTag>()
            .map_err(|error| InteractionError::InvalidValue { field: error.field, value: error.value })?,
        urgency: urgency
            .parse::<Urgency>()
            .map_err(|error| InteractionError::InvalidValue { field: error.field, value: error.value })?,
        next_step: required_value(state, NEXT_STEP_BLOCK_ID, "next_step")?,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use pumi_core::domain::feedback::{FeedbackTag, Urgency};
    use pumi_core::flows::FollowUpEvent;

    use super::{parse_interaction, parse_interaction_form, Interaction, InteractionError};

    fn edit_submission(tag: &str) -> String {
        json!({
            "type": "view_submission",
            "user": { "id": "U1" },
            "team": { "id": "T1" },
            "view": {
                "callback_id": "feedback.edit_modal.v1",
                "private_metadata": "meta",
                "state": { "values": {
                    "feedback.edit.summary": { "value": { "type": "plain_text_input", "value": " New summary " } },
                    "feedback.edit.tag": { "value": { "type": "static_select", "selected_option": { "value": tag } } },
                    "feedback.edit.urgency": { "value": { "type": "static_select", "selected_option": { "value": "Low" } } },
                    "feedback.edit.next_step": { "value": { "type": "plain_text_input", "value": "Ship it" } }
                } }
            }
        })
        .to_string()
    }

    #[test]
    fn button_click_maps_to_follow_up_event() {
        let payload = json!({
            "type": "block_actions",
            "user": { "id": "U1" },
            "team": { "id": "T1" },
            "trigger_id": "trig",
            "actions": [{ "action_id": "feedback.flag.v1", "value": "tok" }]
        })
        .to_string();

        let interaction = parse_interaction(&payload).expect("parse");
        assert_eq!(interaction.follow_up_event(), Some(FollowUpEvent::FlagClicked));
        assert!(matches!(
            interaction,
            Interaction::ButtonClicked { token, trigger_id, .. } if token == "tok" && trigger_id == "trig"
        ));
    }

    #[test]
    fn edit_submission_is_parsed_strictly() {
        let Interaction::EditSubmitted { feedback, metadata, .. } =
            parse_interaction(&edit_submission("UX")).expect("parse")
        else {
            panic!("expected edit submission");
        };
        assert_eq!(metadata, "meta");
        assert_eq!(feedback.summary, "New summary");
        assert_eq!(feedback.tag, FeedbackTag::Ux);
        assert_eq!(feedback.urgency, Urgency::Low);

        assert!(matches!(
            parse_interaction(&edit_submission("Chore")),
            Err(InteractionError::InvalidValue { field: "tag", .. })
        ));
    }

    #[test]
    fn flag_submission_requires_reason() {
        let payload = json!({
            "type": "view_submission",
            "user": { "id": "U1" },
            "team": { "id": "T1" },
            "view": { "callback_id": "feedback.flag_modal.v1", "private_metadata": "meta", "state": { "values": {} } }
        })
        .to_string();
        assert_eq!(parse_interaction(&payload), Err(InteractionError::MissingField("reason")));
    }

    #[test]
    fn form_body_is_url_decoded() {
        let payload = json!({
            "type": "block_actions",
            "actions": [{ "action_id": "feedback.confirm.v1", "value": "tok" }]
        })
        .to_string();
        let body = serde_urlencoded::to_string([("payload", payload)]).expect("encode");
        let interaction = parse_interaction_form(body.as_bytes()).expect("parse");
        assert_eq!(interaction.follow_up_event(), Some(FollowUpEvent::ConfirmClicked));
    }

    #[test]
    fn unknown_actions_are_unsupported() {
        let payload = json!({ "type": "shortcut", "callback_id": "x" }).to_string();
        assert_eq!(
            parse_interaction(&payload),
            Ok(Interaction::Unsupported { kind: "shortcut".to_owned() })
        );
    }
}
