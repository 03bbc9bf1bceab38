//! Modal views opened from the feedback card, and the ids used to read their submissions.

use serde::Serialize;

use pumi_core::domain::feedback::{FeedbackTag, ParsedFeedback, Urgency};

use crate::blocks::{Block, InputElement, MessageBuilder, SelectOption, TextObject};

pub const EDIT_CALLBACK_ID: &str = "feedback.edit_modal.v1";
pub const FLAG_CALLBACK_ID: &str = "feedback.flag_modal.v1";

pub const SUMMARY_BLOCK_ID: &str = "feedback.edit.summary";
pub const TAG_BLOCK_ID: &str = "feedback.edit.tag";
pub const URGENCY_BLOCK_ID: &str = "feedback.edit.urgency";
pub const NEXT_STEP_BLOCK_ID: &str = "feedback.edit.next_step";
pub const REASON_BLOCK_ID: &str = "feedback.flag.reason";
pub const INPUT_ACTION_ID: &str = "value";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub callback_id: String,
    pub title: TextObject,
    pub submit: TextObject,
    pub close: TextObject,
    pub private_metadata: String,
    pub blocks: Vec<Block>,
}

impl ModalView {
    fn new(callback_id: &str, title: &str, submit: &str, metadata: &str, blocks: Vec<Block>) -> Self {
        Self {
            kind: "modal",
            callback_id: callback_id.to_owned(),
            title: TextObject::plain(title),
            submit: TextObject::plain(submit),
            close: TextObject::plain("Cancel"),
            private_metadata: metadata.to_owned(),
            blocks,
        }
    }
}

fn text_input(initial_value: Option<&str>, multiline: bool) -> InputElement {
    InputElement::PlainTextInput {
        action_id: INPUT_ACTION_ID.to_owned(),
        multiline,
        initial_value: initial_value.map(str::to_owned),
    }
}

fn select(options: &[&'static str], initial: Option<&'static str>) -> InputElement {
    InputElement::StaticSelect {
        action_id: INPUT_ACTION_ID.to_owned(),
        options: options.iter().copied().map(SelectOption::new).collect(),
        initial_option: initial.map(SelectOption::new),
    }
}

/// Pre-filled from the feedback snapshot in the token when there is one.
pub fn edit_feedback_modal(current: Option<&ParsedFeedback>, metadata: &str) -> ModalView {
    let tags: Vec<&'static str> = FeedbackTag::ALL.iter().map(FeedbackTag::as_str).collect();
    let urgencies: Vec<&'static str> = Urgency::ALL.iter().map(Urgency::as_str).collect();

    let template = MessageBuilder::new("Edit feedback")
        .input(SUMMARY_BLOCK_ID, "Summary", text_input(current.map(|f| f.summary.as_str()), true))
        .input(TAG_BLOCK_ID, "Tag", select(&tags, current.map(|f| f.tag.as_str())))
        .input(URGENCY_BLOCK_ID, "Urgency", select(&urgencies, current.map(|f| f.urgency.as_str())))
        .input(
            NEXT_STEP_BLOCK_ID,
            "Next step",
            text_input(current.map(|f| f.next_step.as_str()), false),
        )
        .build();

    ModalView::new(EDIT_CALLBACK_ID, "Edit feedback", "Save", metadata, template.blocks)
}

pub fn flag_feedback_modal(metadata: &str) -> ModalView {
    let template = MessageBuilder::new("Flag feedback")
        .section("feedback.flag.intro.v1", |section| {
            section.plain("Tell the admins what is wrong with this entry.");
        })
        .input(REASON_BLOCK_ID, "Reason", text_input(None, true))
        .build();

    ModalView::new(FLAG_CALLBACK_ID, "Flag feedback", "Flag", metadata, template.blocks)
}

#[cfg(test)]
mod tests {
    use pumi_core::domain::feedback::{FeedbackTag, ParsedFeedback, Urgency};

    use super::{edit_feedback_modal, flag_feedback_modal, EDIT_CALLBACK_ID, FLAG_CALLBACK_ID};
    use crate::blocks::{Block, InputElement};

    #[test]
    fn edit_modal_prefills_current_values() {
        let current = ParsedFeedback {
            summary: "Dark mode".to_owned(),
            tag: FeedbackTag::Feature,
            urgency: Urgency::Low,
            next_step: "Ask design".to_owned(),
        };
        let view = edit_feedback_modal(Some(&current), "meta");

        assert_eq!(view.callback_id, EDIT_CALLBACK_ID);
        assert_eq!(view.private_metadata, "meta");
        assert_eq!(view.blocks.len(), 4);
        assert!(matches!(
            &view.blocks[1],
            Block::Input { element: InputElement::StaticSelect { options, initial_option: Some(initial), .. }, .. }
                if options.len() == 4 && initial.value == "Feature"
        ));

        let value = serde_json::to_value(&view).expect("serialize");
        assert_eq!(value["type"], "modal");
        assert_eq!(value["blocks"][0]["element"]["type"], "plain_text_input");
        assert_eq!(value["blocks"][0]["element"]["initial_value"], "Dark mode");
    }

    #[test]
    fn edit_modal_without_snapshot_starts_empty() {
        let view = edit_feedback_modal(None, "meta");
        assert!(matches!(
            &view.blocks[0],
            Block::Input { element: InputElement::PlainTextInput { initial_value: None, .. }, .. }
        ));
    }

    #[test]
    fn flag_modal_asks_for_a_reason() {
        let view = flag_feedback_modal("meta");
        assert_eq!(view.callback_id, FLAG_CALLBACK_ID);
        assert!(view.blocks.iter().any(|block| matches!(block, Block::Input { .. })));
    }
}
