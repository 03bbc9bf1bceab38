use chrono::{DateTime, Utc};

use pumi_core::domain::event::{EventId, TeamId};

use super::{ProcessedEventRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProcessedEventRepository {
    pool: DbPool,
}

impl SqlProcessedEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProcessedEventRepository for SqlProcessedEventRepository {
    async fn is_processed(&self, event_id: &EventId) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM processed_events WHERE event_id = ?")
            .bind(&event_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn mark_processed(
        &self,
        event_id: &EventId,
        team_id: &TeamId,
        processed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO processed_events (event_id, team_id, processed_at)
             VALUES (?, ?, ?)
             ON CONFLICT(event_id) DO NOTHING",
        )
        .bind(&event_id.0)
        .bind(&team_id.0)
        .bind(processed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
