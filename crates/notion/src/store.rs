use async_trait::async_trait;
use thiserror::Error;

use pumi_core::domain::feedback::{FeedbackRecord, ParsedFeedback, QueryFilter};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotionError {
    #[error("notion client is not configured: {0}")]
    Config(String),
    #[error("notion request failed: {0}")]
    Transport(String),
    #[error("notion returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("notion response could not be decoded: {0}")]
    Decode(String),
    #[error("notion object `{0}` was not found")]
    NotFound(String),
}

/// A feedback row plus where in Slack it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRecord {
    pub feedback: ParsedFeedback,
    pub slack_user: String,
    pub slack_channel: String,
    pub message_link: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedRecord {
    pub id: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait ExternalTeamStore: Send + Sync {
    /// Returns the new database id.
    async fn create_database(&self, team_name: &str) -> Result<String, NotionError>;
    /// Used by the loser of a provisioning race to discard its database.
    async fn archive_database(&self, database_id: &str) -> Result<(), NotionError>;
    async fn seed_examples(&self, database_id: &str) -> Result<(), NotionError>;
    async fn create_record(
        &self,
        database_id: &str,
        record: &NewRecord,
    ) -> Result<CreatedRecord, NotionError>;
    async fn update_record(
        &self,
        record_id: &str,
        feedback: &ParsedFeedback,
    ) -> Result<(), NotionError>;
    async fn query_records(
        &self,
        database_id: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<FeedbackRecord>, NotionError>;
}
