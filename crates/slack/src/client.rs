//! Outbound Slack Web API calls behind the `SlackApi` seam.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use pumi_core::config::SlackConfig;

use crate::blocks::{Block, MessageTemplate};
use crate::modals::ModalView;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const AUTH_FAILURE_CODES: [&str; 5] =
    ["invalid_auth", "not_authed", "account_inactive", "token_revoked", "token_expired"];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack client is not configured: {0}")]
    Config(String),
    #[error("slack request failed: {0}")]
    Transport(String),
    #[error("slack returned http status {0}")]
    Status(u16),
    #[error("slack api error `{0}`")]
    Api(String),
    #[error("slack response could not be decoded: {0}")]
    Decode(String),
}

impl SlackApiError {
    /// The token itself is bad, as opposed to Slack being unreachable.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Api(code) if AUTH_FAILURE_CODES.contains(&code.as_str()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub text: String,
    pub blocks: Vec<Block>,
}

impl OutboundMessage {
    pub fn new(channel: impl Into<String>, template: MessageTemplate) -> Self {
        Self { channel: channel.into(), text: template.fallback_text, blocks: template.blocks }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthIdentity {
    pub team_id: String,
    pub bot_user_id: String,
}

#[derive(Clone, Debug)]
pub struct OAuthGrant {
    pub access_token: SecretString,
    pub team_id: String,
    pub team_name: Option<String>,
    pub bot_user_id: String,
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn post_message(
        &self,
        token: &SecretString,
        message: &OutboundMessage,
    ) -> Result<(), SlackApiError>;
    async fn auth_test(&self, token: &SecretString) -> Result<AuthIdentity, SlackApiError>;
    async fn open_view(
        &self,
        token: &SecretString,
        trigger_id: &str,
        view: &ModalView,
    ) -> Result<(), SlackApiError>;
    /// Posts to a slash-command `response_url`; no token needed.
    async fn respond(
        &self,
        response_url: &str,
        template: &MessageTemplate,
        ephemeral: bool,
    ) -> Result<(), SlackApiError>;
    async fn oauth_access(&self, code: &str) -> Result<OAuthGrant, SlackApiError>;
    /// Creates the channel or, when the name is taken, returns the existing one.
    async fn ensure_channel(&self, token: &SecretString, name: &str)
        -> Result<String, SlackApiError>;
}

#[derive(Clone)]
pub struct HttpSlackClient {
    client: reqwest::Client,
    base_url: String,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    redirect_uri: Option<String>,
}

impl HttpSlackClient {
    pub fn from_config(config: &SlackConfig) -> Result<Self, SlackApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| SlackApiError::Config(error.to_string()))?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call(
        &self,
        method: &str,
        token: &SecretString,
        body: Value,
    ) -> Result<Value, SlackApiError> {
        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;
        read_api_response(method, response).await
    }
}

async fn read_api_response(method: &str, response: reqwest::Response) -> Result<Value, SlackApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(SlackApiError::Status(status.as_u16()));
    }
    let payload: Value =
        response.json().await.map_err(|error| SlackApiError::Decode(error.to_string()))?;
    check_ok(method, payload)
}

/// Slack reports failures as `{"ok": false, "error": "..."}` with HTTP 200.
pub fn check_ok(method: &str, payload: Value) -> Result<Value, SlackApiError> {
    if payload.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(payload);
    }
    let code = payload.get("error").and_then(Value::as_str).unwrap_or("unknown_error").to_owned();
    debug!(event_name = "slack.api.error", method, error = %code, "slack api call rejected");
    Err(SlackApiError::Api(code))
}

#[derive(Deserialize)]
struct OAuthTeam {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct OAuthAccessResponse {
    access_token: String,
    bot_user_id: String,
    team: OAuthTeam,
}

#[async_trait]
impl SlackApi for HttpSlackClient {
    async fn post_message(
        &self,
        token: &SecretString,
        message: &OutboundMessage,
    ) -> Result<(), SlackApiError> {
        let body = serde_json::to_value(message)
            .map_err(|error| SlackApiError::Decode(error.to_string()))?;
        self.call("chat.postMessage", token, body).await.map(|_| ())
    }

    async fn auth_test(&self, token: &SecretString) -> Result<AuthIdentity, SlackApiError> {
        let payload = self.call("auth.test", token, json!({})).await?;
        Ok(AuthIdentity {
            team_id: payload.get("team_id").and_then(Value::as_str).unwrap_or_default().to_owned(),
            bot_user_id: payload.get("user_id").and_then(Value::as_str).unwrap_or_default().to_owned(),
        })
    }

    async fn open_view(
        &self,
        token: &SecretString,
        trigger_id: &str,
        view: &ModalView,
    ) -> Result<(), SlackApiError> {
        let body = json!({ "trigger_id": trigger_id, "view": view });
        self.call("views.open", token, body).await.map(|_| ())
    }

    async fn respond(
        &self,
        response_url: &str,
        template: &MessageTemplate,
        ephemeral: bool,
    ) -> Result<(), SlackApiError> {
        let body = json!({
            "response_type": if ephemeral { "ephemeral" } else { "in_channel" },
            "text": template.fallback_text,
            "blocks": template.blocks,
        });
        let response = self
            .client
            .post(response_url)
            .json(&body)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;
        if !response.status().is_success() {
            return Err(SlackApiError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn oauth_access(&self, code: &str) -> Result<OAuthGrant, SlackApiError> {
        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) else {
            return Err(SlackApiError::Config("client_id and client_secret are required".to_owned()));
        };
        let mut form = vec![
            ("client_id", client_id.clone()),
            ("client_secret", client_secret.expose_secret().to_owned()),
            ("code", code.to_owned()),
        ];
        if let Some(redirect_uri) = &self.redirect_uri {
            form.push(("redirect_uri", redirect_uri.clone()));
        }

        let response = self
            .client
            .post(self.url("oauth.v2.access"))
            .form(&form)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;
        let payload = read_api_response("oauth.v2.access", response).await?;
        let grant: OAuthAccessResponse = serde_json::from_value(payload)
            .map_err(|error| SlackApiError::Decode(error.to_string()))?;

        Ok(OAuthGrant {
            access_token: SecretString::from(grant.access_token),
            team_id: grant.team.id,
            team_name: grant.team.name,
            bot_user_id: grant.bot_user_id,
        })
    }

    async fn ensure_channel(
        &self,
        token: &SecretString,
        name: &str,
    ) -> Result<String, SlackApiError> {
        match self.call("conversations.create", token, json!({ "name": name })).await {
            Ok(payload) => payload
                .pointer("/channel/id")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| SlackApiError::Decode("conversations.create without channel id".to_owned())),
            Err(SlackApiError::Api(code)) if code == "name_taken" => {
                let response = self
                    .client
                    .get(self.url("conversations.list"))
                    .bearer_auth(token.expose_secret())
                    .query(&[("exclude_archived", "true"), ("limit", "1000"), ("types", "public_channel")])
                    .send()
                    .await
                    .map_err(|error| SlackApiError::Transport(error.to_string()))?;
                let payload = read_api_response("conversations.list", response).await?;
                let channel_id = find_channel_id(&payload, name)
                    .ok_or_else(|| SlackApiError::Api("channel_not_found".to_owned()))?;
                if let Err(error) =
                    self.call("conversations.join", token, json!({ "channel": channel_id })).await
                {
                    warn!(event_name = "slack.channel.join_failed", error = %error, "could not join existing hub channel");
                }
                Ok(channel_id)
            }
            Err(error) => Err(error),
        }
    }
}

pub fn find_channel_id(payload: &Value, name: &str) -> Option<String> {
    payload
        .get("channels")?
        .as_array()?
        .iter()
        .find(|channel| channel.get("name").and_then(Value::as_str) == Some(name))
        .and_then(|channel| channel.get("id").and_then(Value::as_str))
        .map(str::to_owned)
}

/// In-memory `SlackApi` that records every outbound call.
#[derive(Default)]
pub struct RecordingSlackClient {
    state: Mutex<RecordedCalls>,
}

#[derive(Clone, Debug, Default)]
pub struct RecordedCalls {
    pub messages: Vec<OutboundMessage>,
    pub views: Vec<(String, ModalView)>,
    pub responses: Vec<(String, MessageTemplate, bool)>,
    pub auth_checks: usize,
    revoked_tokens: HashSet<String>,
    failing_auth_checks: HashSet<String>,
    failing_channels: HashSet<String>,
}

impl RecordingSlackClient {
    pub async fn revoke_token(&self, token: &str) {
        self.state.lock().await.revoked_tokens.insert(token.to_owned());
    }

    /// Fails `auth.test` for this token with `invalid_auth` while posts still go through.
    pub async fn fail_auth_check(&self, token: &str) {
        self.state.lock().await.failing_auth_checks.insert(token.to_owned());
    }

    /// Makes `post_message` to this channel fail with `channel_not_found`.
    pub async fn fail_channel(&self, channel: &str) {
        self.state.lock().await.failing_channels.insert(channel.to_owned());
    }

    pub async fn calls(&self) -> RecordedCalls {
        self.state.lock().await.clone()
    }

    pub async fn messages(&self) -> Vec<OutboundMessage> {
        self.state.lock().await.messages.clone()
    }
}

#[async_trait]
impl SlackApi for RecordingSlackClient {
    async fn post_message(
        &self,
        token: &SecretString,
        message: &OutboundMessage,
    ) -> Result<(), SlackApiError> {
        let mut state = self.state.lock().await;
        if state.revoked_tokens.contains(token.expose_secret()) {
            return Err(SlackApiError::Api("invalid_auth".to_owned()));
        }
        if state.failing_channels.contains(&message.channel) {
            return Err(SlackApiError::Api("channel_not_found".to_owned()));
        }
        state.messages.push(message.clone());
        Ok(())
    }

    async fn auth_test(&self, token: &SecretString) -> Result<AuthIdentity, SlackApiError> {
        let mut state = self.state.lock().await;
        state.auth_checks += 1;
        let token = token.expose_secret();
        if state.revoked_tokens.contains(token) || state.failing_auth_checks.contains(token) {
            return Err(SlackApiError::Api("invalid_auth".to_owned()));
        }
        Ok(AuthIdentity { team_id: "T_RECORDED".to_owned(), bot_user_id: "UBOT".to_owned() })
    }

    async fn open_view(
        &self,
        _token: &SecretString,
        trigger_id: &str,
        view: &ModalView,
    ) -> Result<(), SlackApiError> {
        self.state.lock().await.views.push((trigger_id.to_owned(), view.clone()));
        Ok(())
    }

    async fn respond(
        &self,
        response_url: &str,
        template: &MessageTemplate,
        ephemeral: bool,
    ) -> Result<(), SlackApiError> {
        self.state.lock().await.responses.push((response_url.to_owned(), template.clone(), ephemeral));
        Ok(())
    }

    async fn oauth_access(&self, code: &str) -> Result<OAuthGrant, SlackApiError> {
        if code.is_empty() {
            return Err(SlackApiError::Api("invalid_code".to_owned()));
        }
        Ok(OAuthGrant {
            access_token: SecretString::from(format!("xoxb-{code}")),
            team_id: "T_INSTALLED".to_owned(),
            team_name: Some("Installed Team".to_owned()),
            bot_user_id: "UBOT".to_owned(),
        })
    }

    async fn ensure_channel(
        &self,
        _token: &SecretString,
        name: &str,
    ) -> Result<String, SlackApiError> {
        Ok(format!("C_{}", name.to_ascii_uppercase().replace('-', "_")))
    }
}
