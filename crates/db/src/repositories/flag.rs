use sqlx::Row;

use pumi_core::domain::event::TeamId;
use pumi_core::domain::intent::RoutingTarget;
use pumi_core::domain::records::FeedbackFlag;

use super::{decode_err, parse_timestamp, FlagRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFlagRepository {
    pool: DbPool,
}

impl SqlFlagRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_target(value: &str) -> Result<RoutingTarget, RepositoryError> {
    match value {
        "internal_bucket" => Ok(RoutingTarget::InternalBucket),
        "external_team_store" => Ok(RoutingTarget::ExternalTeamStore),
        other => Err(RepositoryError::Decode(format!("unknown routing target `{other}`"))),
    }
}

#[async_trait::async_trait]
impl FlagRepository for SqlFlagRepository {
    async fn record(&self, flag: FeedbackFlag) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO feedback_flags (id, record_id, target, team_id, user_id, reason, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&flag.id)
        .bind(&flag.record_id)
        .bind(flag.target.as_str())
        .bind(&flag.team_id.0)
        .bind(&flag.user_id)
        .bind(&flag.reason)
        .bind(flag.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_record(&self, record_id: &str) -> Result<Vec<FeedbackFlag>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, record_id, target, team_id, user_id, reason, created_at
             FROM feedback_flags WHERE record_id = ? ORDER BY created_at ASC",
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let target: String = row.try_get("target").map_err(decode_err)?;
                let created_at: String = row.try_get("created_at").map_err(decode_err)?;
                Ok(FeedbackFlag {
                    id: row.try_get("id").map_err(decode_err)?,
                    record_id: row.try_get("record_id").map_err(decode_err)?,
                    target: parse_target(&target)?,
                    team_id: TeamId(row.try_get("team_id").map_err(decode_err)?),
                    user_id: row.try_get("user_id").map_err(decode_err)?,
                    reason: row.try_get("reason").map_err(decode_err)?,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use pumi_core::domain::event::TeamId;
    use pumi_core::domain::intent::RoutingTarget;
    use pumi_core::domain::records::FeedbackFlag;

    use super::SqlFlagRepository;
    use crate::repositories::test_support::setup;
    use crate::repositories::FlagRepository;

    #[tokio::test]
    async fn records_flags_per_record() {
        let repo = SqlFlagRepository::new(setup().await);
        repo.record(FeedbackFlag {
            id: "flag-1".to_string(),
            record_id: "page-1".to_string(),
            target: RoutingTarget::ExternalTeamStore,
            team_id: TeamId("T1".to_string()),
            user_id: "U1".to_string(),
            reason: "Summary is wrong".to_string(),
            created_at: Utc::now(),
        })
        .await
        .expect("record");

        let flags = repo.list_for_record("page-1").await.expect("list");
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].target, RoutingTarget::ExternalTeamStore);
        assert_eq!(flags[0].reason, "Summary is wrong");
        assert!(repo.list_for_record("page-2").await.expect("list").is_empty());
    }
}
