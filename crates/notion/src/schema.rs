//! JSON shapes for the Notion API: database schema, page properties, filters, page decoding.

use serde_json::{json, Value};

use pumi_core::domain::feedback::{FeedbackRecord, FeedbackTag, ParsedFeedback, QueryFilter, Urgency};

use crate::store::NewRecord;

pub const NAME_PROPERTY: &str = "Name";
pub const TAG_PROPERTY: &str = "Tag";
pub const URGENCY_PROPERTY: &str = "Urgency";
pub const NEXT_STEP_PROPERTY: &str = "NextStep";
pub const SLACK_USER_PROPERTY: &str = "SlackUser";
pub const SLACK_CHANNEL_PROPERTY: &str = "SlackChannel";
pub const SLACK_LINK_PROPERTY: &str = "SlackMessageLink";
pub const CREATED_PROPERTY: &str = "Created Date";

/// Notion rejects rich text longer than this per text object.
const MAX_TEXT_LEN: usize = 2000;

pub fn database_title(team_name: &str) -> String {
    format!("{team_name} Feedback Board")
}

fn tag_color(tag: FeedbackTag) -> &'static str {
    match tag {
        FeedbackTag::Bug => "red",
        FeedbackTag::Feature => "blue",
        FeedbackTag::Ux => "yellow",
        FeedbackTag::Other => "gray",
    }
}

fn urgency_color(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Low => "green",
        Urgency::Medium => "orange",
        Urgency::High => "red",
    }
}

pub fn database_schema(team_name: &str, parent_page_id: &str) -> Value {
    let tag_options: Vec<Value> = FeedbackTag::ALL
        .into_iter()
        .map(|tag| json!({ "name": tag.as_str(), "color": tag_color(tag) }))
        .collect();
    let urgency_options: Vec<Value> = Urgency::ALL
        .into_iter()
        .map(|urgency| json!({ "name": urgency.as_str(), "color": urgency_color(urgency) }))
        .collect();

    json!({
        "parent": { "type": "page_id", "page_id": parent_page_id },
        "title": [{ "type": "text", "text": { "content": database_title(team_name) } }],
        "properties": {
            NAME_PROPERTY: { "title": {} },
            TAG_PROPERTY: { "select": { "options": tag_options } },
            URGENCY_PROPERTY: { "select": { "options": urgency_options } },
            NEXT_STEP_PROPERTY: { "rich_text": {} },
            SLACK_USER_PROPERTY: { "rich_text": {} },
            SLACK_CHANNEL_PROPERTY: { "rich_text": {} },
            SLACK_LINK_PROPERTY: { "url": {} },
            CREATED_PROPERTY: { "created_time": {} },
        }
    })
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_TEXT_LEN).collect()
}

fn title(text: &str) -> Value {
    json!({ "title": [{ "text": { "content": truncate(text) } }] })
}

fn rich_text(text: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": truncate(text) } }] })
}

fn select(name: &str) -> Value {
    json!({ "select": { "name": name } })
}

/// Properties for the editable part of a row.
pub fn feedback_properties(feedback: &ParsedFeedback) -> Value {
    json!({
        NAME_PROPERTY: title(&feedback.summary),
        TAG_PROPERTY: select(feedback.tag.as_str()),
        URGENCY_PROPERTY: select(feedback.urgency.as_str()),
        NEXT_STEP_PROPERTY: rich_text(&feedback.next_step),
    })
}

pub fn record_page(database_id: &str, record: &NewRecord) -> Value {
    let mut properties = feedback_properties(&record.feedback);
    if let Some(map) = properties.as_object_mut() {
        map.insert(SLACK_USER_PROPERTY.to_owned(), rich_text(&record.slack_user));
        map.insert(SLACK_CHANNEL_PROPERTY.to_owned(), rich_text(&record.slack_channel));
        if let Some(link) = &record.message_link {
            map.insert(SLACK_LINK_PROPERTY.to_owned(), json!({ "url": link }));
        }
    }
    json!({ "parent": { "database_id": database_id }, "properties": properties })
}

pub fn seed_examples() -> Vec<ParsedFeedback> {
    vec![
        ParsedFeedback {
            summary: "Enable /summary command".to_owned(),
            tag: FeedbackTag::Feature,
            urgency: Urgency::Medium,
            next_step: "Add LLM logic for summarizing feedback".to_owned(),
        },
        ParsedFeedback {
            summary: "Fix feedback formatting bug".to_owned(),
            tag: FeedbackTag::Bug,
            urgency: Urgency::High,
            next_step: "Escape markdown properly in Slack message blocks".to_owned(),
        },
        ParsedFeedback {
            summary: "Improve onboarding message".to_owned(),
            tag: FeedbackTag::Ux,
            urgency: Urgency::Low,
            next_step: "Clarify instructions with screenshots or GIF".to_owned(),
        },
    ]
}

/// `None` means "no filter": Notion rejects an empty `and` list.
pub fn build_filter(filter: &QueryFilter) -> Option<Value> {
    let mut conditions = Vec::new();

    if let Some(tag) = filter.tag {
        conditions.push(json!({ "property": TAG_PROPERTY, "select": { "equals": tag.as_str() } }));
    }
    if let Some(urgency) = filter.urgency {
        conditions.push(json!({ "property": URGENCY_PROPERTY, "select": { "equals": urgency.as_str() } }));
    }
    if let Some(range) = filter.date_range {
        conditions.push(json!({
            "property": CREATED_PROPERTY,
            "created_time": {
                "on_or_after": range.from.format("%Y-%m-%d").to_string(),
                "on_or_before": range.to.format("%Y-%m-%d").to_string(),
            }
        }));
    }

    if conditions.is_empty() {
        None
    } else {
        Some(json!({ "and": conditions }))
    }
}

fn plain_text(property: Option<&Value>, kind: &str) -> Option<String> {
    let text: String = property?
        .get(kind)?
        .as_array()?
        .iter()
        .filter_map(|part| {
            part.get("plain_text")
                .or_else(|| part.pointer("/text/content"))
                .and_then(Value::as_str)
        })
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

fn property<'a>(page: &'a Value, name: &str) -> Option<&'a Value> {
    page.get("properties")?.get(name)
}

fn select_name(property: Option<&Value>) -> Option<&str> {
    property?.pointer("/select/name")?.as_str()
}

/// Unknown or missing values come back as `None` rather than failing the whole query.
pub fn parse_page(page: &Value) -> Option<FeedbackRecord> {
    let id = page.get("id")?.as_str()?.to_owned();

    Some(FeedbackRecord {
        id,
        url: page.get("url").and_then(Value::as_str).map(str::to_owned),
        summary: plain_text(property(page, NAME_PROPERTY), "title"),
        tag: select_name(property(page, TAG_PROPERTY)).and_then(|name| name.parse().ok()),
        urgency: select_name(property(page, URGENCY_PROPERTY)).and_then(|name| name.parse().ok()),
        next_step: plain_text(property(page, NEXT_STEP_PROPERTY), "rich_text"),
    })
}
