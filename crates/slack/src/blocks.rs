use serde::Serialize;

use pumi_core::domain::feedback::{FeedbackRecord, ParsedFeedback};
use pumi_core::domain::records::FeedbackDigest;

pub const CONFIRM_ACTION_ID: &str = "feedback.confirm.v1";
pub const EDIT_ACTION_ID: &str = "feedback.edit.v1";
pub const FLAG_ACTION_ID: &str = "feedback.flag.v1";
pub const BOARD_LINK_ACTION_ID: &str = "feedback.board_link.v1";

/// Block Kit rejects messages with more than 50 blocks.
pub const MAX_RESULT_RECORDS: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "button")]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
            url: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub text: TextObject,
    pub value: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self { text: TextObject::plain(value.clone()), value }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputElement {
    PlainTextInput {
        action_id: String,
        multiline: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_value: Option<String>,
    },
    StaticSelect {
        action_id: String,
        options: Vec<SelectOption>,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_option: Option<SelectOption>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
    Input { block_id: String, label: TextObject, element: InputElement, optional: bool },
    Divider,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn input(
        mut self,
        block_id: impl Into<String>,
        label: impl Into<String>,
        element: InputElement,
    ) -> Self {
        self.blocks.push(Block::Input {
            block_id: block_id.into(),
            label: TextObject::plain(label),
            element,
            optional: false,
        });
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider);
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

fn details_line(tag: &str, urgency: &str, next_step: &str) -> String {
    format!("*Tag:* {tag} | *Urgency:* {urgency} | *Next Step:* {next_step}")
}

/// The card posted after a feedback or bug command. Every button carries the follow-up token;
/// without one the card has no buttons.
pub fn feedback_card(
    feedback: &ParsedFeedback,
    record_url: Option<&str>,
    token: Option<&str>,
) -> MessageTemplate {
    let mut builder = MessageBuilder::new(format!("Feedback captured: {}", feedback.summary))
        .section("feedback.card.summary.v1", |section| {
            section.mrkdwn(format!("*Summary:* {}", feedback.summary));
        })
        .context("feedback.card.details.v1", |context| {
            context.mrkdwn(details_line(
                feedback.tag.as_str(),
                feedback.urgency.as_str(),
                &feedback.next_step,
            ));
        });

    if let Some(url) = record_url {
        builder = builder.section("feedback.card.link.v1", |section| {
            section.mrkdwn(format!("<{url}|View in Notion>"));
        });
    }

    if let Some(token) = token {
        builder = builder.actions("feedback.card.actions.v1", |actions| {
            actions
                .button(
                    ButtonElement::new(CONFIRM_ACTION_ID, "Looks good")
                        .style(ButtonStyle::Primary)
                        .value(token),
                )
                .button(ButtonElement::new(EDIT_ACTION_ID, "Edit").value(token))
                .button(
                    ButtonElement::new(FLAG_ACTION_ID, "Flag")
                        .style(ButtonStyle::Danger)
                        .value(token),
                );
        });
    }

    builder.divider().build()
}

pub fn query_results_message(query: &str, records: &[FeedbackRecord]) -> MessageTemplate {
    let query = query.trim();
    let header = if query.is_empty() {
        format!(":clipboard: Showing {} result(s)", records.len())
    } else {
        format!(":clipboard: Results for: {query}")
    };

    let mut builder = MessageBuilder::new(header.clone())
        .section("feedback.results.header.v1", |section| {
            section.mrkdwn(header.clone());
        })
        .divider();

    for (index, record) in records.iter().take(MAX_RESULT_RECORDS).enumerate() {
        let summary = record.summary.as_deref().unwrap_or("No summary");
        let tag = record.tag.map(|tag| tag.as_str()).unwrap_or("Unknown");
        let urgency = record.urgency.map(|urgency| urgency.as_str()).unwrap_or("Unknown");
        let next_step = record.next_step.as_deref().unwrap_or("-");
        let mut text = format!("*{summary}*\n{}", details_line(tag, urgency, next_step));
        if let Some(url) = record.url.as_deref() {
            text.push_str(&format!("\n<{url}|Open>"));
        }
        builder = builder.section(format!("feedback.results.item.{}.v1", index + 1), |section| {
            section.mrkdwn(text);
        });
    }

    if records.len() > MAX_RESULT_RECORDS {
        builder = builder.context("feedback.results.truncated.v1", |context| {
            context.plain(format!("Showing {MAX_RESULT_RECORDS} of {} results.", records.len()));
        });
    }

    builder.build()
}

pub fn empty_results_message() -> MessageTemplate {
    let text = ":mag: No results found for the given filters.";
    MessageBuilder::new(text)
        .section("feedback.results.empty.v1", |section| {
            section.mrkdwn(text);
        })
        .build()
}

pub fn failure_message(text: &str) -> MessageTemplate {
    MessageBuilder::new(text.to_owned())
        .section("feedback.failure.v1", |section| {
            section.mrkdwn(text.to_owned());
        })
        .build()
}

pub fn processing_message() -> MessageTemplate {
    let text = ":hourglass_flowing_sand: Processing...";
    MessageBuilder::new(text)
        .context("feedback.processing.v1", |context| {
            context.mrkdwn(text);
        })
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("Pumi help")
        .section("pumi.help.summary.v1", |section| {
            section.mrkdwn(
                "*How to talk to Pumi*\n• `@pumi feedback: <text>` log feedback to your team board\n• `@pumi bug: <text>` log a high-urgency bug\n• `@pumi query: <question>` search the board\n• In the hub channel, start a message with `feedback:` or `bug:`\n• `/pumisummary` latest channel digest\n• `/board` link to your feedback board",
            );
        })
        .build()
}

pub fn help_answer_message(question: &str, answer: &str) -> MessageTemplate {
    MessageBuilder::new(answer.to_owned())
        .section("pumi.help.answer.v1", |section| {
            section.mrkdwn(format!("*Q:* {question}\n\n*Answer:*\n{answer}"));
        })
        .context("pumi.help.source.v1", |context| {
            context.mrkdwn(":bulb: Powered by Pumi knowledge base");
        })
        .build()
}

pub fn board_link_message(url: Option<&str>) -> MessageTemplate {
    let Some(url) = url else {
        return failure_message(
            ":information_source: No feedback board yet. Log some feedback with `@pumi feedback:` first.",
        );
    };
    MessageBuilder::new(format!("Your feedback board: {url}"))
        .section("pumi.board.link.v1", |section| {
            section.mrkdwn(":bookmark_tabs: Your team's feedback board");
        })
        .actions("pumi.board.actions.v1", |actions| {
            actions.button(
                ButtonElement::new(BOARD_LINK_ACTION_ID, "Open board")
                    .style(ButtonStyle::Primary)
                    .url(url),
            );
        })
        .build()
}

pub fn digest_message(digest: Option<&FeedbackDigest>) -> MessageTemplate {
    let Some(digest) = digest else {
        return failure_message("No summary available.");
    };
    MessageBuilder::new(digest.summary.clone())
        .section("pumi.digest.summary.v1", |section| {
            section.mrkdwn(format!("*Digest*\n{}", digest.summary));
        })
        .context("pumi.digest.context.v1", |context| {
            context.plain(format!(
                "{} message(s) · {}",
                digest.message_count,
                digest.created_at.format("%b %-d, %Y")
            ));
        })
        .build()
}

pub fn reinstall_notice(install_url: &str) -> MessageTemplate {
    let text = format!(
        "We noticed an issue with your Slack bot token. To restore full functionality, please reinstall the app using this link: {install_url}"
    );
    MessageBuilder::new(text.clone())
        .section("pumi.reinstall.v1", |section| {
            section.mrkdwn(format!(":warning: {text}"));
        })
        .build()
}

pub fn feedback_updated_message(feedback: &ParsedFeedback) -> MessageTemplate {
    MessageBuilder::new(format!("Feedback updated: {}", feedback.summary))
        .section("feedback.updated.v1", |section| {
            section.mrkdwn(format!(":pencil2: *Updated:* {}", feedback.summary));
        })
        .context("feedback.updated.details.v1", |context| {
            context.mrkdwn(details_line(
                feedback.tag.as_str(),
                feedback.urgency.as_str(),
                &feedback.next_step,
            ));
        })
        .build()
}

pub fn flag_notification(
    user_id: &str,
    channel_id: &str,
    summary: Option<&str>,
    reason: &str,
) -> MessageTemplate {
    let summary = summary.unwrap_or("(summary unavailable)");
    MessageBuilder::new(format!("Feedback flagged by <@{user_id}>"))
        .section("feedback.flagged.v1", |section| {
            section.mrkdwn(format!(
                ":triangular_flag_on_post: <@{user_id}> flagged feedback in <#{channel_id}>\n*Summary:* {summary}\n*Reason:* {reason}"
            ));
        })
        .build()
}
