use sqlx::Row;

use pumi_core::domain::event::TeamId;
use pumi_core::domain::records::FeedbackDigest;

use super::{decode_err, parse_timestamp, DigestRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDigestRepository {
    pool: DbPool,
}

impl SqlDigestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_digest(row: &sqlx::sqlite::SqliteRow) -> Result<FeedbackDigest, RepositoryError> {
    let message_count: i64 = row.try_get("message_count").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    Ok(FeedbackDigest {
        id: row.try_get("id").map_err(decode_err)?,
        team_id: TeamId(row.try_get("team_id").map_err(decode_err)?),
        channel_id: row.try_get("channel_id").map_err(decode_err)?,
        summary: row.try_get("summary").map_err(decode_err)?,
        raw_text: row.try_get("raw_text").map_err(decode_err)?,
        message_count: u32::try_from(message_count).map_err(decode_err)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl DigestRepository for SqlDigestRepository {
    async fn insert(&self, digest: FeedbackDigest) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO feedback_digests
                 (id, team_id, channel_id, summary, raw_text, message_count, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&digest.id)
        .bind(&digest.team_id.0)
        .bind(&digest.channel_id)
        .bind(&digest.summary)
        .bind(&digest.raw_text)
        .bind(i64::from(digest.message_count))
        .bind(digest.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest(
        &self,
        team_id: &TeamId,
        channel_id: Option<&str>,
    ) -> Result<Option<FeedbackDigest>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, team_id, channel_id, summary, raw_text, message_count, created_at
             FROM feedback_digests
             WHERE team_id = ? AND (? IS NULL OR channel_id = ?)
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(&team_id.0)
        .bind(channel_id)
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_digest).transpose()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use pumi_core::domain::event::TeamId;
    use pumi_core::domain::records::FeedbackDigest;

    use super::SqlDigestRepository;
    use crate::repositories::test_support::setup;
    use crate::repositories::DigestRepository;

    fn digest(id: &str, team: &str, channel: &str, age: Duration) -> FeedbackDigest {
        FeedbackDigest {
            id: id.to_string(),
            team_id: TeamId(team.to_string()),
            channel_id: channel.to_string(),
            summary: format!("summary {id}"),
            raw_text: "[Jan 1, 9:00 AM] (U1): hi".to_string(),
            message_count: 1,
            created_at: Utc::now() - age,
        }
    }

    #[tokio::test]
    async fn latest_returns_newest_digest() {
        let repo = SqlDigestRepository::new(setup().await);
        let team = TeamId("T1".to_string());
        assert!(repo.latest(&team, None).await.expect("empty").is_none());

        repo.insert(digest("d1", "T1", "C1", Duration::days(7))).await.expect("insert");
        repo.insert(digest("d2", "T1", "C1", Duration::days(1))).await.expect("insert");
        repo.insert(digest("d3", "T1", "C2", Duration::hours(1))).await.expect("insert");

        let newest = repo.latest(&team, None).await.expect("latest").expect("exists");
        assert_eq!(newest.id, "d3");
        let newest_c1 = repo.latest(&team, Some("C1")).await.expect("latest").expect("exists");
        assert_eq!(newest_c1.id, "d2");
    }

    #[tokio::test]
    async fn latest_never_crosses_teams() {
        let repo = SqlDigestRepository::new(setup().await);
        repo.insert(digest("a1", "TA", "CA", Duration::minutes(1))).await.expect("insert");

        let other = TeamId("TB".to_string());
        assert!(repo.latest(&other, None).await.expect("latest").is_none());
        assert!(repo.latest(&other, Some("CA")).await.expect("latest").is_none());
    }
}
