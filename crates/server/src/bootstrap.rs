use std::sync::Arc;

use pumi_agent::{HttpLlmClient, LlmError, LlmExtractor};
use pumi_core::config::{AppConfig, ConfigError};
use pumi_core::crypto::{CipherError, TokenCipher};
use pumi_core::signature::RequestVerifier;
use pumi_db::repositories::{
    SqlCredentialRepository, SqlDigestRepository, SqlFlagRepository,
    SqlInternalFeedbackRepository, SqlMessageRepository, SqlNotionLinkRepository,
    SqlProcessedEventRepository,
};
use pumi_db::{connect_with_settings, migrations, CredentialStore, DbPool};
use pumi_notion::{NotionClient, NotionError};
use pumi_slack::{HttpSlackClient, SlackApiError};
use thiserror::Error;
use tracing::info;

use crate::state::{AppState, Services, Settings};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("token cipher could not be initialised: {0}")]
    Cipher(#[from] CipherError),
    #[error("language model client could not be initialised: {0}")]
    Llm(#[from] LlmError),
    #[error("slack client could not be initialised: {0}")]
    Slack(#[from] SlackApiError),
    #[error("notion client could not be initialised: {0}")]
    Notion(#[from] NotionError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");
    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let services = build_services(&config, &db_pool)?;
    info!(
        event_name = "system.bootstrap.services_ready",
        llm_provider = ?config.llm.provider,
        llm_model = %config.llm.model,
        processing_ack = services.settings.processing_ack,
        "services initialised"
    );

    Ok(Application { config, db_pool, state: Arc::new(services) })
}

/// Wires the SQL repositories and HTTP clients behind the service traits.
pub fn build_services(config: &AppConfig, db_pool: &DbPool) -> Result<Services, BootstrapError> {
    let cipher = TokenCipher::from_hex_key(&config.security.encryption_key)?;
    let llm = HttpLlmClient::from_config(&config.llm)?;

    Ok(Services {
        verifier: RequestVerifier::new(
            config.slack.signing_secret.clone(),
            config.slack.signature_tolerance_secs,
        ),
        processed_events: Arc::new(SqlProcessedEventRepository::new(db_pool.clone())),
        credentials: CredentialStore::new(
            Arc::new(SqlCredentialRepository::new(db_pool.clone())),
            cipher,
        ),
        notion_links: Arc::new(SqlNotionLinkRepository::new(db_pool.clone())),
        messages: Arc::new(SqlMessageRepository::new(db_pool.clone())),
        internal_feedback: Arc::new(SqlInternalFeedbackRepository::new(db_pool.clone())),
        flags: Arc::new(SqlFlagRepository::new(db_pool.clone())),
        digests: Arc::new(SqlDigestRepository::new(db_pool.clone())),
        extraction: Arc::new(LlmExtractor::new(Arc::new(llm))),
        slack: Arc::new(HttpSlackClient::from_config(&config.slack)?),
        team_store: Arc::new(NotionClient::from_config(&config.notion)?),
        settings: Settings::from_config(config),
    })
}
