use std::sync::Arc;

use secrecy::SecretString;

use pumi_agent::FeedbackExtraction;
use pumi_core::config::AppConfig;
use pumi_core::signature::RequestVerifier;
use pumi_db::repositories::{
    DigestRepository, FlagRepository, InternalFeedbackRepository, MessageRepository,
    NotionLinkRepository, ProcessedEventRepository,
};
use pumi_db::CredentialStore;
use pumi_notion::ExternalTeamStore;
use pumi_slack::SlackApi;

/// Everything a request handler may touch. Built once at startup and shared read-only.
pub struct Services {
    pub verifier: RequestVerifier,
    pub processed_events: Arc<dyn ProcessedEventRepository>,
    pub credentials: CredentialStore,
    pub notion_links: Arc<dyn NotionLinkRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub internal_feedback: Arc<dyn InternalFeedbackRepository>,
    pub flags: Arc<dyn FlagRepository>,
    pub digests: Arc<dyn DigestRepository>,
    pub extraction: Arc<dyn FeedbackExtraction>,
    pub slack: Arc<dyn SlackApi>,
    pub team_store: Arc<dyn ExternalTeamStore>,
    pub settings: Settings,
}

pub type AppState = Arc<Services>;

#[derive(Clone, Debug)]
pub struct Settings {
    pub processing_ack: bool,
    pub hub_channel_name: String,
    pub admin_channel_id: Option<String>,
    pub install_url: Option<String>,
    pub install_success_url: Option<String>,
    pub trigger_secret: Option<SecretString>,
    pub digest_channel_id: Option<String>,
    pub digest_days: u32,
    pub help_context: Option<String>,
}

impl Settings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            processing_ack: config.slack.processing_ack,
            hub_channel_name: config.slack.hub_channel_name.clone(),
            admin_channel_id: config.slack.admin_channel_id.clone(),
            install_url: config.slack.install_url.clone(),
            install_success_url: config.slack.install_success_url.clone(),
            trigger_secret: config.jobs.trigger_secret.clone(),
            digest_channel_id: config.jobs.digest_channel_id.clone(),
            digest_days: config.jobs.digest_days,
            help_context: config.slack.help_context.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            processing_ack: true,
            hub_channel_name: "pumi-hub".to_owned(),
            admin_channel_id: None,
            install_url: None,
            install_success_url: None,
            trigger_secret: None,
            digest_channel_id: None,
            digest_days: 7,
            help_context: None,
        }
    }
}
