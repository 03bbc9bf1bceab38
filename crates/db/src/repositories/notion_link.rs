use sqlx::Row;

use pumi_core::domain::event::TeamId;
use pumi_core::domain::team::NotionDatabaseLink;

use super::{decode_err, parse_timestamp, NotionLinkRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotionLinkRepository {
    pool: DbPool,
}

impl SqlNotionLinkRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NotionLinkRepository for SqlNotionLinkRepository {
    async fn find(&self, team_id: &TeamId) -> Result<Option<NotionDatabaseLink>, RepositoryError> {
        let row = sqlx::query(
            "SELECT team_id, external_database_id, created_at
             FROM notion_database_links WHERE team_id = ?",
        )
        .bind(&team_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let created_at: String = row.try_get("created_at").map_err(decode_err)?;
        Ok(Some(NotionDatabaseLink {
            team_id: TeamId(row.try_get("team_id").map_err(decode_err)?),
            external_database_id: row.try_get("external_database_id").map_err(decode_err)?,
            created_at: parse_timestamp(&created_at)?,
        }))
    }

    async fn insert_if_absent(&self, link: NotionDatabaseLink) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO notion_database_links (team_id, external_database_id, created_at)
             VALUES (?, ?, ?)
             ON CONFLICT(team_id) DO NOTHING",
        )
        .bind(&link.team_id.0)
        .bind(&link.external_database_id)
        .bind(link.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
