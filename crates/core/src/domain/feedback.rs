use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Prepended to the summary of anything reported through a `bug:` command.
pub const BUG_MARKER: &str = "[BUG]";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedbackTag {
    Bug,
    Feature,
    #[serde(rename = "UX")]
    Ux,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Urgency {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("`{value}` is not a valid {field}")]
pub struct InvalidEnumValue {
    pub field: &'static str,
    pub value: String,
}

impl FeedbackTag {
    pub const ALL: [FeedbackTag; 4] = [Self::Bug, Self::Feature, Self::Ux, Self::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bug => "Bug",
            Self::Feature => "Feature",
            Self::Ux => "UX",
            Self::Other => "Other",
        }
    }

    /// Case-insensitive match used for query filters, where models tend to answer `bugs`.
    pub fn parse_lenient(value: &str) -> Option<Self> {
        let lowered = value.trim().to_ascii_lowercase();
        let singular = lowered.strip_suffix('s').unwrap_or(&lowered);
        Self::ALL.into_iter().find(|tag| {
            let name = tag.as_str().to_ascii_lowercase();
            name == lowered || name == singular
        })
    }
}

impl FromStr for FeedbackTag {
    type Err = InvalidEnumValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == value)
            .ok_or_else(|| InvalidEnumValue { field: "tag", value: value.to_owned() })
    }
}

impl fmt::Display for FeedbackTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Urgency {
    pub const ALL: [Urgency; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    pub fn parse_lenient(value: &str) -> Option<Self> {
        let lowered = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|urgency| urgency.as_str().eq_ignore_ascii_case(&lowered))
    }
}

impl FromStr for Urgency {
    type Err = InvalidEnumValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|urgency| urgency.as_str() == value)
            .ok_or_else(|| InvalidEnumValue { field: "urgency", value: value.to_owned() })
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFeedback {
    pub summary: String,
    pub tag: FeedbackTag,
    pub urgency: Urgency,
    pub next_step: String,
}

impl ParsedFeedback {
    /// Forces the bug classification. Applying it twice changes nothing.
    pub fn into_bug_report(self) -> Self {
        let summary = if self.summary.starts_with(BUG_MARKER) {
            self.summary
        } else {
            format!("{BUG_MARKER} {}", self.summary)
        };
        Self { summary, tag: FeedbackTag::Bug, urgency: Urgency::High, next_step: self.next_step }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub tag: Option<FeedbackTag>,
    pub urgency: Option<Urgency>,
    pub date_range: Option<DateRange>,
}

impl QueryFilter {
    pub fn is_empty(&self) -> bool {
        self.tag.is_none() && self.urgency.is_none() && self.date_range.is_none()
    }
}

/// A row read back from a team's external store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub tag: Option<FeedbackTag>,
    pub urgency: Option<Urgency>,
    pub next_step: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{FeedbackTag, ParsedFeedback, Urgency, BUG_MARKER};

    fn feedback() -> ParsedFeedback {
        ParsedFeedback {
            summary: "Login button does nothing".to_owned(),
            tag: FeedbackTag::Ux,
            urgency: Urgency::Low,
            next_step: "Check the click handler".to_owned(),
        }
    }

    #[test]
    fn strict_parsing_rejects_wrong_case() {
        assert_eq!("UX".parse::<FeedbackTag>(), Ok(FeedbackTag::Ux));
        assert!("ux".parse::<FeedbackTag>().is_err());
        assert!("Critical".parse::<Urgency>().is_err());
    }

    #[test]
    fn lenient_parsing_accepts_plurals_and_case() {
        assert_eq!(FeedbackTag::parse_lenient("bugs"), Some(FeedbackTag::Bug));
        assert_eq!(FeedbackTag::parse_lenient("ux"), Some(FeedbackTag::Ux));
        assert_eq!(FeedbackTag::parse_lenient("enhancement"), None);
        assert_eq!(Urgency::parse_lenient("HIGH"), Some(Urgency::High));
    }

    #[test]
    fn bug_override_forces_tag_urgency_and_marker() {
        let report = feedback().into_bug_report();
        assert_eq!(report.tag, FeedbackTag::Bug);
        assert_eq!(report.urgency, Urgency::High);
        assert_eq!(report.summary, format!("{BUG_MARKER} Login button does nothing"));
        assert_eq!(report.next_step, "Check the click handler");
    }

    #[test]
    fn bug_override_is_idempotent() {
        let once = feedback().into_bug_report();
        let twice = once.clone().into_bug_report();
        assert_eq!(once, twice);
    }

    #[test]
    fn serializes_with_camel_case_next_step() {
        let json = serde_json::to_value(feedback()).expect("serialize");
        assert_eq!(json["nextStep"], "Check the click handler");
        assert_eq!(json["tag"], "UX");
    }
}
