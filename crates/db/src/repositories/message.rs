use chrono::{DateTime, Utc};
use sqlx::Row;

use pumi_core::domain::event::TeamId;
use pumi_core::domain::records::SlackMessage;

use super::{decode_err, parse_timestamp, MessageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<SlackMessage, RepositoryError> {
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    Ok(SlackMessage {
        id: row.try_get("id").map_err(decode_err)?,
        team_id: TeamId(row.try_get("team_id").map_err(decode_err)?),
        channel_id: row.try_get("channel_id").map_err(decode_err)?,
        user_id: row.try_get("user_id").map_err(decode_err)?,
        text: row.try_get("text").map_err(decode_err)?,
        message_ts: row.try_get("message_ts").map_err(decode_err)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn append(&self, message: SlackMessage) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO slack_messages (id, team_id, channel_id, user_id, text, message_ts, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(team_id, channel_id, message_ts) DO NOTHING",
        )
        .bind(&message.id)
        .bind(&message.team_id.0)
        .bind(&message.channel_id)
        .bind(&message.user_id)
        .bind(&message.text)
        .bind(&message.message_ts)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_channel_since(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SlackMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, team_id, channel_id, user_id, text, message_ts, created_at
             FROM slack_messages
             WHERE channel_id = ? AND created_at >= ?
             ORDER BY created_at ASC",
        )
        .bind(channel_id)
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use pumi_core::domain::event::TeamId;
    use pumi_core::domain::records::SlackMessage;

    use super::SqlMessageRepository;
    use crate::repositories::test_support::setup;
    use crate::repositories::MessageRepository;

    fn message(id: &str, channel: &str, ts: &str, age: Duration) -> SlackMessage {
        SlackMessage {
            id: id.to_string(),
            team_id: TeamId("T1".to_string()),
            channel_id: channel.to_string(),
            user_id: "U1".to_string(),
            text: format!("message {id}"),
            message_ts: ts.to_string(),
            created_at: Utc::now() - age,
        }
    }

    #[tokio::test]
    async fn lists_recent_messages_for_channel_in_order() {
        let repo = SqlMessageRepository::new(setup().await);
        repo.append(message("m3", "C1", "3", Duration::hours(1))).await.expect("append");
        repo.append(message("m1", "C1", "1", Duration::days(10))).await.expect("append");
        repo.append(message("m2", "C1", "2", Duration::days(2))).await.expect("append");
        repo.append(message("m4", "C2", "4", Duration::hours(1))).await.expect("append");

        let recent = repo
            .list_channel_since("C1", Utc::now() - Duration::days(7))
            .await
            .expect("list");
        let ids: Vec<_> = recent.iter().map(|message| message.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);
    }

    #[tokio::test]
    async fn redelivered_message_is_stored_once() {
        let repo = SqlMessageRepository::new(setup().await);
        repo.append(message("m1", "C1", "1.0", Duration::zero())).await.expect("append");
        repo.append(message("m1-again", "C1", "1.0", Duration::zero())).await.expect("append");

        let stored = repo.list_channel_since("C1", Utc::now() - Duration::days(1)).await.expect("list");
        assert_eq!(stored.len(), 1);
    }
}
