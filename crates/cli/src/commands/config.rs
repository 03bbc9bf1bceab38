use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pumi_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{load_config, CommandResult};

struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

impl Field {
    fn new(key: &'static str, env_key: &'static str, value: impl Into<String>) -> Self {
        Self { key, env_key, value: value.into() }
    }
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = config_file_path.as_deref().and_then(load_config_file_doc);

    let mut lines = vec![
        "effective config (source precedence: flag > env > file > default):".to_string(),
    ];
    for field in fields(&config) {
        let source = field_source(
            &field,
            options,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let optional = |value: Option<&str>| value.unwrap_or("<unset>").to_string();

    vec![
        Field::new("database.url", "PUMI_DATABASE_URL", &config.database.url),
        Field::new(
            "database.max_connections",
            "PUMI_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        Field::new(
            "database.timeout_secs",
            "PUMI_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        Field::new(
            "slack.signing_secret",
            "PUMI_SLACK_SIGNING_SECRET",
            redact(&config.slack.signing_secret),
        ),
        Field::new("slack.client_id", "PUMI_SLACK_CLIENT_ID", optional(config.slack.client_id.as_deref())),
        Field::new(
            "slack.client_secret",
            "PUMI_SLACK_CLIENT_SECRET",
            config.slack.client_secret.as_ref().map(redact).unwrap_or_else(|| "<unset>".to_string()),
        ),
        Field::new("slack.hub_channel_name", "PUMI_SLACK_HUB_CHANNEL_NAME", &config.slack.hub_channel_name),
        Field::new(
            "slack.admin_channel_id",
            "PUMI_SLACK_ADMIN_CHANNEL_ID",
            optional(config.slack.admin_channel_id.as_deref()),
        ),
        Field::new(
            "slack.processing_ack",
            "PUMI_SLACK_PROCESSING_ACK",
            config.slack.processing_ack.to_string(),
        ),
        Field::new(
            "slack.signature_tolerance_secs",
            "PUMI_SLACK_SIGNATURE_TOLERANCE_SECS",
            config.slack.signature_tolerance_secs.to_string(),
        ),
        Field::new("llm.provider", "PUMI_LLM_PROVIDER", format!("{:?}", config.llm.provider)),
        Field::new("llm.model", "PUMI_LLM_MODEL", &config.llm.model),
        Field::new("llm.base_url", "PUMI_LLM_BASE_URL", optional(config.llm.base_url.as_deref())),
        Field::new(
            "llm.api_key",
            "PUMI_LLM_API_KEY",
            config.llm.api_key.as_ref().map(redact).unwrap_or_else(|| "<unset>".to_string()),
        ),
        Field::new("notion.api_key", "PUMI_NOTION_API_KEY", redact(&config.notion.api_key)),
        Field::new("notion.parent_page_id", "PUMI_NOTION_PARENT_PAGE_ID", &config.notion.parent_page_id),
        Field::new(
            "security.encryption_key",
            "PUMI_SECURITY_ENCRYPTION_KEY",
            redact(&config.security.encryption_key),
        ),
        Field::new("server.bind_address", "PUMI_SERVER_BIND_ADDRESS", &config.server.bind_address),
        Field::new("server.port", "PUMI_SERVER_PORT", config.server.port.to_string()),
        Field::new(
            "jobs.trigger_secret",
            "PUMI_JOBS_TRIGGER_SECRET",
            config.jobs.trigger_secret.as_ref().map(redact).unwrap_or_else(|| "<unset>".to_string()),
        ),
        Field::new(
            "jobs.digest_channel_id",
            "PUMI_JOBS_DIGEST_CHANNEL_ID",
            optional(config.jobs.digest_channel_id.as_deref()),
        ),
        Field::new("logging.level", "PUMI_LOGGING_LEVEL", &config.logging.level),
        Field::new("logging.format", "PUMI_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    [PathBuf::from("pumi.toml"), PathBuf::from("config/pumi.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    fs::read_to_string(path).ok()?.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    options: &LoadOptions,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let overridden = match field.key {
        "database.url" => options.overrides.database_url.is_some(),
        "logging.level" => options.overrides.log_level.is_some(),
        "llm.provider" => options.overrides.llm_provider.is_some(),
        "llm.model" => options.overrides.llm_model.is_some(),
        "slack.signing_secret" => options.overrides.slack_signing_secret.is_some(),
        "server.port" => options.overrides.server_port.is_some(),
        _ => false,
    };
    if overridden {
        return "flag".to_string();
    }

    if env::var_os(field.env_key).is_some() {
        return format!("env ({})", field.env_key);
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact(secret: &SecretString) -> String {
    if secret.expose_secret().trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}
