use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use pumi_core::domain::event::{EventId, TeamId};
use pumi_core::domain::feedback::ParsedFeedback;
use pumi_core::domain::records::{
    FeedbackDigest, FeedbackFlag, InternalFeedback, SlackMessage,
};
use pumi_core::domain::team::{NotionDatabaseLink, TeamCredential};

pub mod credential;
pub mod digest;
pub mod flag;
pub mod internal_feedback;
pub mod memory;
pub mod message;
pub mod notion_link;
pub mod processed_event;

pub use credential::SqlCredentialRepository;
pub use digest::SqlDigestRepository;
pub use flag::SqlFlagRepository;
pub use internal_feedback::SqlInternalFeedbackRepository;
pub use memory::{
    InMemoryCredentialRepository, InMemoryDigestRepository, InMemoryFlagRepository,
    InMemoryInternalFeedbackRepository, InMemoryMessageRepository, InMemoryNotionLinkRepository,
    InMemoryProcessedEventRepository,
};
pub use message::SqlMessageRepository;
pub use notion_link::SqlNotionLinkRepository;
pub use processed_event::SqlProcessedEventRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ProcessedEventRepository: Send + Sync {
    async fn is_processed(&self, event_id: &EventId) -> Result<bool, RepositoryError>;

    /// Insert-if-absent. Returns `true` only for the caller whose insert created the record.
    async fn mark_processed(
        &self,
        event_id: &EventId,
        team_id: &TeamId,
        processed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn find(&self, team_id: &TeamId) -> Result<Option<TeamCredential>, RepositoryError>;
    async fn upsert(&self, credential: TeamCredential) -> Result<(), RepositoryError>;
    /// Clears the stored token. Returns `false` when the team is unknown.
    async fn invalidate(
        &self,
        team_id: &TeamId,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
    async fn list_active(&self) -> Result<Vec<TeamCredential>, RepositoryError>;
}

#[async_trait]
pub trait NotionLinkRepository: Send + Sync {
    async fn find(&self, team_id: &TeamId) -> Result<Option<NotionDatabaseLink>, RepositoryError>;

    /// Atomic conditional insert used as the provisioning lock. `false` means another writer
    /// already linked a database for this team.
    async fn insert_if_absent(&self, link: NotionDatabaseLink) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(&self, message: SlackMessage) -> Result<(), RepositoryError>;
    async fn list_channel_since(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SlackMessage>, RepositoryError>;
}

#[async_trait]
pub trait InternalFeedbackRepository: Send + Sync {
    async fn insert(&self, entry: InternalFeedback) -> Result<(), RepositoryError>;
    async fn find(&self, id: &str) -> Result<Option<InternalFeedback>, RepositoryError>;
    async fn update_feedback(
        &self,
        id: &str,
        feedback: &ParsedFeedback,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
    async fn mark_flagged(&self, id: &str, at: DateTime<Utc>) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait FlagRepository: Send + Sync {
    async fn record(&self, flag: FeedbackFlag) -> Result<(), RepositoryError>;
    async fn list_for_record(&self, record_id: &str) -> Result<Vec<FeedbackFlag>, RepositoryError>;
}

#[async_trait]
pub trait DigestRepository: Send + Sync {
    async fn insert(&self, digest: FeedbackDigest) -> Result<(), RepositoryError>;
    /// Most recent digest for a team, optionally restricted to one channel.
    async fn latest(
        &self,
        team_id: &TeamId,
        channel_id: Option<&str>,
    ) -> Result<Option<FeedbackDigest>, RepositoryError>;
}

pub(crate) fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{value}`: {error}")))
}
