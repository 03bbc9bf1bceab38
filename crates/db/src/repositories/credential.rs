use chrono::{DateTime, Utc};
use sqlx::Row;

use pumi_core::domain::event::TeamId;
use pumi_core::domain::team::TeamCredential;

use super::{decode_err, parse_timestamp, CredentialRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCredentialRepository {
    pool: DbPool,
}

impl SqlCredentialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT team_id, team_name, encrypted_access_token, bot_user_id,
        hub_channel_id, installed_at, updated_at
 FROM team_credentials";

fn row_to_credential(row: &sqlx::sqlite::SqliteRow) -> Result<TeamCredential, RepositoryError> {
    let team_id: String = row.try_get("team_id").map_err(decode_err)?;
    let installed_at: String = row.try_get("installed_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    Ok(TeamCredential {
        team_id: TeamId(team_id),
        team_name: row.try_get("team_name").map_err(decode_err)?,
        encrypted_access_token: row.try_get("encrypted_access_token").map_err(decode_err)?,
        bot_user_id: row.try_get("bot_user_id").map_err(decode_err)?,
        hub_channel_id: row.try_get("hub_channel_id").map_err(decode_err)?,
        installed_at: parse_timestamp(&installed_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl CredentialRepository for SqlCredentialRepository {
    async fn find(&self, team_id: &TeamId) -> Result<Option<TeamCredential>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE team_id = ?"))
            .bind(&team_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_credential).transpose()
    }

    async fn upsert(&self, credential: TeamCredential) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO team_credentials (team_id, team_name, encrypted_access_token, bot_user_id,
                                           hub_channel_id, installed_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(team_id) DO UPDATE SET
                 team_name = excluded.team_name,
                 encrypted_access_token = excluded.encrypted_access_token,
                 bot_user_id = excluded.bot_user_id,
                 hub_channel_id = COALESCE(excluded.hub_channel_id, team_credentials.hub_channel_id),
                 updated_at = excluded.updated_at",
        )
        .bind(&credential.team_id.0)
        .bind(&credential.team_name)
        .bind(&credential.encrypted_access_token)
        .bind(&credential.bot_user_id)
        .bind(&credential.hub_channel_id)
        .bind(credential.installed_at.to_rfc3339())
        .bind(credential.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn invalidate(&self, team_id: &TeamId, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE team_credentials SET encrypted_access_token = NULL, updated_at = ?
             WHERE team_id = ?",
        )
        .bind(at.to_rfc3339())
        .bind(&team_id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self) -> Result<Vec<TeamCredential>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE encrypted_access_token IS NOT NULL ORDER BY team_id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_credential).collect()
    }
}
