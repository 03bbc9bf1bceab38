use chrono::{DateTime, Utc};
use sqlx::Row;

use pumi_core::domain::event::TeamId;
use pumi_core::domain::feedback::ParsedFeedback;
use pumi_core::domain::records::{FeedbackKind, InternalFeedback};

use super::{decode_err, parse_timestamp, InternalFeedbackRepository, RepositoryError};
use crate::DbPool;

pub struct SqlInternalFeedbackRepository {
    pool: DbPool,
}

impl SqlInternalFeedbackRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<InternalFeedback, RepositoryError> {
    let kind: String = row.try_get("kind").map_err(decode_err)?;
    let tag: String = row.try_get("tag").map_err(decode_err)?;
    let urgency: String = row.try_get("urgency").map_err(decode_err)?;
    let flagged: i64 = row.try_get("flagged").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    Ok(InternalFeedback {
        id: row.try_get("id").map_err(decode_err)?,
        kind: FeedbackKind::parse(&kind)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown feedback kind `{kind}`")))?,
        feedback: ParsedFeedback {
            summary: row.try_get("summary").map_err(decode_err)?,
            tag: tag.parse().map_err(decode_err)?,
            urgency: urgency.parse().map_err(decode_err)?,
            next_step: row.try_get("next_step").map_err(decode_err)?,
        },
        details: row.try_get("details").map_err(decode_err)?,
        team_id: TeamId(row.try_get("team_id").map_err(decode_err)?),
        user_id: row.try_get("user_id").map_err(decode_err)?,
        channel_id: row.try_get("channel_id").map_err(decode_err)?,
        flagged: flagged != 0,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl InternalFeedbackRepository for SqlInternalFeedbackRepository {
    async fn insert(&self, entry: InternalFeedback) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO internal_feedback (id, kind, summary, tag, urgency, next_step, details,
                                            team_id, user_id, channel_id, flagged, created_at,
                                            updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(entry.kind.as_str())
        .bind(&entry.feedback.summary)
        .bind(entry.feedback.tag.as_str())
        .bind(entry.feedback.urgency.as_str())
        .bind(&entry.feedback.next_step)
        .bind(&entry.details)
        .bind(&entry.team_id.0)
        .bind(&entry.user_id)
        .bind(&entry.channel_id)
        .bind(i64::from(entry.flagged))
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<InternalFeedback>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, kind, summary, tag, urgency, next_step, details, team_id, user_id,
                    channel_id, flagged, created_at, updated_at
             FROM internal_feedback WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    async fn update_feedback(
        &self,
        id: &str,
        feedback: &ParsedFeedback,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE internal_feedback
             SET summary = ?, tag = ?, urgency = ?, next_step = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&feedback.summary)
        .bind(feedback.tag.as_str())
        .bind(feedback.urgency.as_str())
        .bind(&feedback.next_step)
        .bind(at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_flagged(&self, id: &str, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE internal_feedback SET flagged = 1, updated_at = ? WHERE id = ?")
                .bind(at.to_rfc3339())
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
