use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::event::TeamId;

/// Install record for one workspace. The access token is only ever held encrypted here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCredential {
    pub team_id: TeamId,
    pub team_name: Option<String>,
    /// `None` once a health check has invalidated the install.
    pub encrypted_access_token: Option<String>,
    pub bot_user_id: String,
    pub hub_channel_id: Option<String>,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamCredential {
    pub fn is_active(&self) -> bool {
        self.encrypted_access_token.as_deref().is_some_and(|token| !token.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotionDatabaseLink {
    pub team_id: TeamId,
    pub external_database_id: String,
    pub created_at: DateTime<Utc>,
}

impl NotionDatabaseLink {
    pub fn board_url(&self) -> String {
        format!("https://www.notion.so/{}", self.external_database_id.replace('-', ""))
    }
}
