//! Strict conversion of model completions into domain values.

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};
use tracing::warn;

use pumi_core::domain::feedback::{DateRange, FeedbackTag, ParsedFeedback, QueryFilter, Urgency};
use pumi_core::errors::ExtractionError;

/// Models sometimes wrap their answer in a fenced block despite being told not to.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, ExtractionError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(ExtractionError::EmptyCompletion);
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ExtractionError::MalformedOutput(format!("expected an object, got {other}"))),
        Err(error) => Err(ExtractionError::MalformedOutput(error.to_string())),
    }
}

fn required_string(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<String, ExtractionError> {
    match map.get(field) {
        None | Some(Value::Null) => Err(ExtractionError::MissingField(field)),
        Some(Value::String(value)) if value.trim().is_empty() => {
            Err(ExtractionError::MissingField(field))
        }
        Some(Value::String(value)) => Ok(value.trim().to_string()),
        Some(other) => Err(ExtractionError::InvalidField { field, value: other.to_string() }),
    }
}

fn optional_string<'a>(
    map: &'a Map<String, Value>,
    field: &'static str,
) -> Result<Option<&'a str>, ExtractionError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) if value.trim().is_empty() => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.trim())),
        Some(other) => Err(ExtractionError::InvalidField { field, value: other.to_string() }),
    }
}

/// Every field must be present and every enum value must be one of the canonical spellings.
pub fn parse_feedback(raw: &str) -> Result<ParsedFeedback, ExtractionError> {
    let map = parse_object(raw)?;

    let summary = required_string(&map, "summary")?;
    let tag = required_string(&map, "tag")?
        .parse::<FeedbackTag>()
        .map_err(|error| ExtractionError::InvalidField { field: error.field, value: error.value })?;
    let urgency = required_string(&map, "urgency")?
        .parse::<Urgency>()
        .map_err(|error| ExtractionError::InvalidField { field: error.field, value: error.value })?;
    let next_step = required_string(&map, "nextStep")?;

    Ok(ParsedFeedback { summary, tag, urgency, next_step })
}

/// Filters are all optional. Tag and urgency tolerate case and plurals; an unknown value is
/// dropped, as is a date range with an unparseable end.
pub fn parse_filters(raw: &str) -> Result<QueryFilter, ExtractionError> {
    let map = parse_object(raw)?;

    let tag = optional_string(&map, "tag")?
        .and_then(|value| known_or_dropped("tag", value, FeedbackTag::parse_lenient(value)));
    let urgency = optional_string(&map, "urgency")?
        .and_then(|value| known_or_dropped("urgency", value, Urgency::parse_lenient(value)));
    let date_range = map.get("date_range").or_else(|| map.get("dateRange")).and_then(parse_date_range);

    Ok(QueryFilter { tag, urgency, date_range })
}

fn known_or_dropped<T>(field: &'static str, raw: &str, parsed: Option<T>) -> Option<T> {
    if parsed.is_none() {
        warn!(
            event_name = "extraction.filters.value_dropped",
            field,
            value = raw,
            "ignoring unknown filter value"
        );
    }
    parsed
}

fn parse_date_range(value: &Value) -> Option<DateRange> {
    if value.is_null() {
        return None;
    }
    let from = value.get("from").and_then(Value::as_str).and_then(parse_calendar_date);
    let to = value.get("to").and_then(Value::as_str).and_then(parse_calendar_date);
    match (from, to) {
        (Some(from), Some(to)) => Some(DateRange { from, to }),
        _ => {
            warn!(
                event_name = "extraction.filters.date_range_dropped",
                date_range = %value,
                "ignoring date range without two valid calendar dates"
            );
            None
        }
    }
}

fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|at| at.date_naive()))
}
