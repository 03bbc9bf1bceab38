use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use pumi_core::domain::feedback::{FeedbackRecord, ParsedFeedback, QueryFilter};

use crate::schema::{database_title, seed_examples};
use crate::store::{CreatedRecord, ExternalTeamStore, NewRecord, NotionError};

#[derive(Clone, Debug)]
pub struct StoredRow {
    pub feedback: ParsedFeedback,
    pub slack_user: Option<String>,
    pub slack_channel: Option<String>,
    pub created_on: NaiveDate,
}

#[derive(Clone, Debug, Default)]
pub struct StoredDatabase {
    pub title: String,
    pub archived: bool,
    pub rows: Vec<(String, StoredRow)>,
}

#[derive(Default)]
pub struct InMemoryTeamStore {
    databases: RwLock<HashMap<String, StoredDatabase>>,
    unavailable: RwLock<bool>,
}

impl InMemoryTeamStore {
    /// Makes every call fail as if Notion were down.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    pub async fn databases(&self) -> HashMap<String, StoredDatabase> {
        self.databases.read().await.clone()
    }

    async fn check_available(&self) -> Result<(), NotionError> {
        if *self.unavailable.read().await {
            return Err(NotionError::Api { status: 503, message: "service unavailable".to_owned() });
        }
        Ok(())
    }

    async fn insert_row(
        &self,
        database_id: &str,
        row: StoredRow,
    ) -> Result<CreatedRecord, NotionError> {
        let mut databases = self.databases.write().await;
        let database = databases
            .get_mut(database_id)
            .filter(|database| !database.archived)
            .ok_or_else(|| NotionError::NotFound(database_id.to_owned()))?;
        let id = Uuid::new_v4().to_string();
        database.rows.push((id.clone(), row));
        Ok(CreatedRecord { url: Some(page_url(&id)), id })
    }
}

fn page_url(id: &str) -> String {
    format!("https://www.notion.so/{}", id.replace('-', ""))
}

fn matches(filter: &QueryFilter, row: &StoredRow) -> bool {
    filter.tag.map_or(true, |tag| row.feedback.tag == tag)
        && filter.urgency.map_or(true, |urgency| row.feedback.urgency == urgency)
        && filter
            .date_range
            .map_or(true, |range| range.from <= row.created_on && row.created_on <= range.to)
}

#[async_trait]
impl ExternalTeamStore for InMemoryTeamStore {
    async fn create_database(&self, team_name: &str) -> Result<String, NotionError> {
        self.check_available().await?;
        let id = Uuid::new_v4().to_string();
        self.databases.write().await.insert(
            id.clone(),
            StoredDatabase { title: database_title(team_name), ..StoredDatabase::default() },
        );
        Ok(id)
    }

    async fn archive_database(&self, database_id: &str) -> Result<(), NotionError> {
        self.check_available().await?;
        let mut databases = self.databases.write().await;
        let database = databases
            .get_mut(database_id)
            .ok_or_else(|| NotionError::NotFound(database_id.to_owned()))?;
        database.archived = true;
        Ok(())
    }

    async fn seed_examples(&self, database_id: &str) -> Result<(), NotionError> {
        self.check_available().await?;
        for feedback in seed_examples() {
            let row = StoredRow {
                feedback,
                slack_user: None,
                slack_channel: None,
                created_on: Utc::now().date_naive(),
            };
            self.insert_row(database_id, row).await?;
        }
        Ok(())
    }

    async fn create_record(
        &self,
        database_id: &str,
        record: &NewRecord,
    ) -> Result<CreatedRecord, NotionError> {
        self.check_available().await?;
        let row = StoredRow {
            feedback: record.feedback.clone(),
            slack_user: Some(record.slack_user.clone()),
            slack_channel: Some(record.slack_channel.clone()),
            created_on: Utc::now().date_naive(),
        };
        self.insert_row(database_id, row).await
    }

    async fn update_record(
        &self,
        record_id: &str,
        feedback: &ParsedFeedback,
    ) -> Result<(), NotionError> {
        self.check_available().await?;
        let mut databases = self.databases.write().await;
        let row = databases
            .values_mut()
            .flat_map(|database| database.rows.iter_mut())
            .find(|(id, _)| id == record_id)
            .ok_or_else(|| NotionError::NotFound(record_id.to_owned()))?;
        row.1.feedback = feedback.clone();
        Ok(())
    }

    async fn query_records(
        &self,
        database_id: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<FeedbackRecord>, NotionError> {
        self.check_available().await?;
        let databases = self.databases.read().await;
        let database = databases
            .get(database_id)
            .filter(|database| !database.archived)
            .ok_or_else(|| NotionError::NotFound(database_id.to_owned()))?;

        Ok(database
            .rows
            .iter()
            .rev()
            .filter(|(_, row)| matches(filter, row))
            .map(|(id, row)| FeedbackRecord {
                id: id.clone(),
                url: Some(page_url(id)),
                summary: Some(row.feedback.summary.clone()),
                tag: Some(row.feedback.tag),
                urgency: Some(row.feedback.urgency),
                next_step: Some(row.feedback.next_step.clone()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use pumi_core::domain::feedback::{DateRange, FeedbackTag, ParsedFeedback, QueryFilter, Urgency};

    use super::InMemoryTeamStore;
    use crate::store::{ExternalTeamStore, NewRecord, NotionError};

    fn record(summary: &str, tag: FeedbackTag) -> NewRecord {
        NewRecord {
            feedback: ParsedFeedback {
                summary: summary.to_owned(),
                tag,
                urgency: Urgency::Medium,
                next_step: "Triage".to_owned(),
            },
            slack_user: "U1".to_owned(),
            slack_channel: "C1".to_owned(),
            message_link: None,
        }
    }

    #[tokio::test]
    async fn seeded_board_answers_filtered_queries() {
        let store = InMemoryTeamStore::default();
        let database_id = store.create_database("Acme").await.expect("create");
        store.seed_examples(&database_id).await.expect("seed");
        store.create_record(&database_id, &record("Crash on save", FeedbackTag::Bug)).await.expect("record");

        let all = store.query_records(&database_id, &QueryFilter::default()).await.expect("query");
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].summary.as_deref(), Some("Crash on save"));

        let bugs = store
            .query_records(&database_id, &QueryFilter { tag: Some(FeedbackTag::Bug), ..QueryFilter::default() })
            .await
            .expect("query");
        assert_eq!(bugs.len(), 2);

        let today = Utc::now().date_naive();
        let past = QueryFilter {
            date_range: Some(DateRange { from: today - Duration::days(10), to: today - Duration::days(5) }),
            ..QueryFilter::default()
        };
        assert!(store.query_records(&database_id, &past).await.expect("query").is_empty());

        let databases = store.databases().await;
        assert_eq!(databases[&database_id].title, "Acme Feedback Board");
    }

    #[tokio::test]
    async fn archived_database_rejects_writes() {
        let store = InMemoryTeamStore::default();
        let database_id = store.create_database("Acme").await.expect("create");
        store.archive_database(&database_id).await.expect("archive");

        let error = store.create_record(&database_id, &record("x", FeedbackTag::Other)).await.unwrap_err();
        assert_eq!(error, NotionError::NotFound(database_id));
    }

    #[tokio::test]
    async fn update_rewrites_row_in_place() {
        let store = InMemoryTeamStore::default();
        let database_id = store.create_database("Acme").await.expect("create");
        let created = store.create_record(&database_id, &record("Old", FeedbackTag::Ux)).await.expect("create");

        let edited = ParsedFeedback {
            summary: "New".to_owned(),
            tag: FeedbackTag::Feature,
            urgency: Urgency::Low,
            next_step: "Plan".to_owned(),
        };
        store.update_record(&created.id, &edited).await.expect("update");

        let rows = store.query_records(&database_id, &QueryFilter::default()).await.expect("query");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].summary.as_deref(), Some("New"));
        assert_eq!(rows[0].tag, Some(FeedbackTag::Feature));
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryTeamStore::default();
        store.set_unavailable(true).await;
        assert!(matches!(store.create_database("Acme").await, Err(NotionError::Api { status: 503, .. })));
    }
}
