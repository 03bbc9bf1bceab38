use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use pumi_core::domain::event::{EventId, TeamId};
use pumi_core::domain::feedback::ParsedFeedback;
use pumi_core::domain::records::{FeedbackDigest, FeedbackFlag, InternalFeedback, SlackMessage};
use pumi_core::domain::team::{NotionDatabaseLink, TeamCredential};

use super::{
    CredentialRepository, DigestRepository, FlagRepository, InternalFeedbackRepository,
    MessageRepository, NotionLinkRepository, ProcessedEventRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryProcessedEventRepository {
    events: RwLock<HashMap<String, (TeamId, DateTime<Utc>)>>,
}

impl InMemoryProcessedEventRepository {
    pub async fn recorded_count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait::async_trait]
impl ProcessedEventRepository for InMemoryProcessedEventRepository {
    async fn is_processed(&self, event_id: &EventId) -> Result<bool, RepositoryError> {
        Ok(self.events.read().await.contains_key(&event_id.0))
    }

    async fn mark_processed(
        &self,
        event_id: &EventId,
        team_id: &TeamId,
        processed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut events = self.events.write().await;
        if events.contains_key(&event_id.0) {
            return Ok(false);
        }
        events.insert(event_id.0.clone(), (team_id.clone(), processed_at));
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryCredentialRepository {
    credentials: RwLock<HashMap<String, TeamCredential>>,
}

#[async_trait::async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn find(&self, team_id: &TeamId) -> Result<Option<TeamCredential>, RepositoryError> {
        Ok(self.credentials.read().await.get(&team_id.0).cloned())
    }

    async fn upsert(&self, credential: TeamCredential) -> Result<(), RepositoryError> {
        let mut credentials = self.credentials.write().await;
        let mut credential = credential;
        if let Some(existing) = credentials.get(&credential.team_id.0) {
            credential.installed_at = existing.installed_at;
            if credential.hub_channel_id.is_none() {
                credential.hub_channel_id = existing.hub_channel_id.clone();
            }
        }
        credentials.insert(credential.team_id.0.clone(), credential);
        Ok(())
    }

    async fn invalidate(&self, team_id: &TeamId, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let mut credentials = self.credentials.write().await;
        match credentials.get_mut(&team_id.0) {
            Some(credential) => {
                credential.encrypted_access_token = None;
                credential.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_active(&self) -> Result<Vec<TeamCredential>, RepositoryError> {
        let mut active: Vec<_> = self
            .credentials
            .read()
            .await
            .values()
            .filter(|credential| credential.encrypted_access_token.is_some())
            .cloned()
            .collect();
        active.sort_by(|left, right| left.team_id.0.cmp(&right.team_id.0));
        Ok(active)
    }
}

#[derive(Default)]
pub struct InMemoryNotionLinkRepository {
    links: RwLock<HashMap<String, NotionDatabaseLink>>,
}

#[async_trait::async_trait]
impl NotionLinkRepository for InMemoryNotionLinkRepository {
    async fn find(&self, team_id: &TeamId) -> Result<Option<NotionDatabaseLink>, RepositoryError> {
        Ok(self.links.read().await.get(&team_id.0).cloned())
    }

    async fn insert_if_absent(&self, link: NotionDatabaseLink) -> Result<bool, RepositoryError> {
        let mut links = self.links.write().await;
        if links.contains_key(&link.team_id.0) {
            return Ok(false);
        }
        links.insert(link.team_id.0.clone(), link);
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<SlackMessage>>,
}

impl InMemoryMessageRepository {
    pub async fn all(&self) -> Vec<SlackMessage> {
        self.messages.read().await.clone()
    }
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, message: SlackMessage) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        let duplicate = messages.iter().any(|existing| {
            existing.team_id == message.team_id
                && existing.channel_id == message.channel_id
                && existing.message_ts == message.message_ts
        });
        if !duplicate {
            messages.push(message);
        }
        Ok(())
    }

    async fn list_channel_since(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SlackMessage>, RepositoryError> {
        let mut matching: Vec<_> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|message| message.channel_id == channel_id && message.created_at >= since)
            .cloned()
            .collect();
        matching.sort_by_key(|message| message.created_at);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryInternalFeedbackRepository {
    entries: RwLock<HashMap<String, InternalFeedback>>,
}

impl InMemoryInternalFeedbackRepository {
    pub async fn all(&self) -> Vec<InternalFeedback> {
        self.entries.read().await.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl InternalFeedbackRepository for InMemoryInternalFeedbackRepository {
    async fn insert(&self, entry: InternalFeedback) -> Result<(), RepositoryError> {
        self.entries.write().await.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<InternalFeedback>, RepositoryError> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn update_feedback(
        &self,
        id: &str,
        feedback: &ParsedFeedback,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            Some(entry) => {
                entry.feedback = feedback.clone();
                entry.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_flagged(&self, id: &str, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            Some(entry) => {
                entry.flagged = true;
                entry.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryFlagRepository {
    flags: RwLock<Vec<FeedbackFlag>>,
}

#[async_trait::async_trait]
impl FlagRepository for InMemoryFlagRepository {
    async fn record(&self, flag: FeedbackFlag) -> Result<(), RepositoryError> {
        self.flags.write().await.push(flag);
        Ok(())
    }

    async fn list_for_record(&self, record_id: &str) -> Result<Vec<FeedbackFlag>, RepositoryError> {
        Ok(self
            .flags
            .read()
            .await
            .iter()
            .filter(|flag| flag.record_id == record_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryDigestRepository {
    digests: RwLock<Vec<FeedbackDigest>>,
}

#[async_trait::async_trait]
impl DigestRepository for InMemoryDigestRepository {
    async fn insert(&self, digest: FeedbackDigest) -> Result<(), RepositoryError> {
        self.digests.write().await.push(digest);
        Ok(())
    }

    async fn latest(
        &self,
        team_id: &TeamId,
        channel_id: Option<&str>,
    ) -> Result<Option<FeedbackDigest>, RepositoryError> {
        Ok(self
            .digests
            .read()
            .await
            .iter()
            .filter(|digest| &digest.team_id == team_id)
            .filter(|digest| channel_id.map_or(true, |channel| digest.channel_id == channel))
            .max_by_key(|digest| digest.created_at)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use pumi_core::domain::event::{EventId, TeamId};
    use pumi_core::domain::team::NotionDatabaseLink;

    use crate::repositories::{
        InMemoryNotionLinkRepository, InMemoryProcessedEventRepository, NotionLinkRepository,
        ProcessedEventRepository,
    };

    #[tokio::test]
    async fn in_memory_dedup_has_single_winner_under_contention() {
        let repo = Arc::new(InMemoryProcessedEventRepository::default());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.mark_processed(&EventId("Ev1".to_string()), &TeamId("T1".to_string()), Utc::now())
                    .await
                    .expect("mark")
            }));
        }

        let mut winners = 0;
        for handle in handles {
            winners += usize::from(handle.await.expect("join"));
        }
        assert_eq!(winners, 1);
        assert_eq!(repo.recorded_count().await, 1);
    }

    #[tokio::test]
    async fn in_memory_link_insert_is_conditional() {
        let repo = InMemoryNotionLinkRepository::default();
        let link = |id: &str| NotionDatabaseLink {
            team_id: TeamId("T1".to_string()),
            external_database_id: id.to_string(),
            created_at: Utc::now(),
        };

        assert!(repo.insert_if_absent(link("db-1")).await.expect("insert"));
        assert!(!repo.insert_if_absent(link("db-2")).await.expect("insert"));
        let found = repo.find(&TeamId("T1".to_string())).await.expect("find").expect("exists");
        assert_eq!(found.external_database_id, "db-1");
    }
}
