//! OAuth install callback: exchange the code, make sure the hub channel exists, store the token.

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use pumi_core::domain::event::TeamId;
use pumi_core::domain::team::TeamCredential;
use pumi_db::{CredentialStoreError, InstallGrant};
use pumi_slack::SlackApiError;

use crate::state::Services;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OAuthCallback {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("install was cancelled: {0}")]
    Denied(String),
    #[error("missing `code` query parameter")]
    MissingCode,
    #[error("slack rejected the install: {0}")]
    Slack(#[from] SlackApiError),
    #[error(transparent)]
    Credential(#[from] CredentialStoreError),
}

pub async fn complete_install(
    services: &Services,
    callback: OAuthCallback,
) -> Result<TeamCredential, InstallError> {
    if let Some(error) = callback.error {
        return Err(InstallError::Denied(error));
    }
    let code = callback
        .code
        .filter(|code| !code.trim().is_empty())
        .ok_or(InstallError::MissingCode)?;

    let grant = services.slack.oauth_access(&code).await?;
    let hub_channel_name = &services.settings.hub_channel_name;
    let hub_channel_id =
        match services.slack.ensure_channel(&grant.access_token, hub_channel_name).await {
            Ok(channel_id) => Some(channel_id),
            Err(error) => {
                warn!(
                    event_name = "install.hub_channel.failed",
                    team_id = %grant.team_id,
                    channel = %hub_channel_name,
                    error = %error,
                    "hub channel unavailable; hub commands disabled for this team"
                );
                None
            }
        };

    let credential = services
        .credentials
        .upsert(InstallGrant {
            team_id: TeamId(grant.team_id),
            team_name: grant.team_name,
            access_token: grant.access_token,
            bot_user_id: grant.bot_user_id,
            hub_channel_id,
        })
        .await?;

    info!(
        event_name = "install.completed",
        team_id = %credential.team_id,
        hub_channel_id = credential.hub_channel_id.as_deref().unwrap_or("none"),
        "workspace installed"
    );
    Ok(credential)
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use pumi_core::domain::event::TeamId;

    use super::{complete_install, InstallError, OAuthCallback};
    use crate::testing::Harness;

    fn callback(code: &str) -> OAuthCallback {
        OAuthCallback { code: Some(code.to_owned()), error: None }
    }

    #[tokio::test]
    async fn install_stores_encrypted_token_and_hub_channel() {
        let harness = Harness::new();

        let credential =
            complete_install(&harness.services, callback("abc")).await.expect("install");

        assert_eq!(credential.team_id, TeamId("T_INSTALLED".to_owned()));
        assert_eq!(credential.hub_channel_id.as_deref(), Some("C_PUMI_HUB"));
        let stored = credential.encrypted_access_token.clone().expect("token");
        assert!(!stored.contains("xoxb-abc"));

        let token = harness.services.credentials.access_token(&credential).expect("decrypt");
        assert_eq!(token.expose_secret(), "xoxb-abc");
    }

    #[tokio::test]
    async fn reinstall_replaces_the_token() {
        let harness = Harness::new();
        complete_install(&harness.services, callback("first")).await.expect("install");
        let credential =
            complete_install(&harness.services, callback("second")).await.expect("reinstall");

        let token = harness.services.credentials.access_token(&credential).expect("decrypt");
        assert_eq!(token.expose_secret(), "xoxb-second");
        assert_eq!(harness.services.credentials.list_active().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn missing_or_denied_code_is_rejected() {
        let harness = Harness::new();

        let missing = complete_install(&harness.services, OAuthCallback::default()).await;
        assert!(matches!(missing, Err(InstallError::MissingCode)));

        let denied = complete_install(
            &harness.services,
            OAuthCallback { code: None, error: Some("access_denied".to_owned()) },
        )
        .await;
        assert!(matches!(denied, Err(InstallError::Denied(_))));
    }
}
