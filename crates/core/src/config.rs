use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub llm: LlmConfig,
    pub notion: NotionConfig,
    pub security: SecurityConfig,
    pub server: ServerConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub signing_secret: SecretString,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub redirect_uri: Option<String>,
    pub api_base_url: String,
    /// Name of the channel created on install; messages there go to the internal bucket.
    pub hub_channel_name: String,
    pub admin_channel_id: Option<String>,
    pub install_url: Option<String>,
    pub install_success_url: Option<String>,
    /// Knowledge-base text the `/help` answers are grounded on.
    pub help_context: Option<String>,
    pub processing_ack: bool,
    pub signature_tolerance_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct NotionConfig {
    pub api_key: SecretString,
    pub parent_page_id: String,
    pub api_base_url: String,
    pub api_version: String,
}

#[derive(Clone, Debug)]
pub struct SecurityConfig {
    /// Hex encoded 32-byte key for access tokens at rest.
    pub encryption_key: SecretString,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct JobsConfig {
    pub trigger_secret: Option<SecretString>,
    pub digest_channel_id: Option<String>,
    pub digest_days: u32,
    /// Zero disables the in-process schedule; the HTTP triggers stay available.
    pub health_check_interval_secs: u64,
    pub digest_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://pumi.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig {
                signing_secret: String::new().into(),
                client_id: None,
                client_secret: None,
                redirect_uri: None,
                api_base_url: "https://slack.com/api".to_string(),
                hub_channel_name: "pumi-hub".to_string(),
                admin_channel_id: None,
                install_url: None,
                install_success_url: None,
                help_context: None,
                processing_ack: true,
                signature_tolerance_secs: 300,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-3.5-turbo".to_string(),
                temperature: 0.7,
                timeout_secs: 30,
            },
            notion: NotionConfig {
                api_key: String::new().into(),
                parent_page_id: String::new(),
                api_base_url: "https://api.notion.com/v1".to_string(),
                api_version: "2022-06-28".to_string(),
            },
            security: SecurityConfig { encryption_key: String::new().into() },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            jobs: JobsConfig {
                trigger_secret: None,
                digest_channel_id: None,
                digest_days: 7,
                health_check_interval_secs: 0,
                digest_interval_secs: 0,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

/// Later layers only overwrite what they actually set.
fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    pub fn effective_base_url(&self) -> String {
        if let Some(base_url) = self.base_url.as_deref().filter(|value| !value.trim().is_empty()) {
            return base_url.trim_end_matches('/').to_string();
        }
        match self.provider {
            LlmProvider::OpenAi => "https://api.openai.com/v1".to_string(),
            LlmProvider::Anthropic => "https://api.anthropic.com/v1".to_string(),
            LlmProvider::Ollama => "http://localhost:11434/v1".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pumi.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            replace(&mut self.database.url, database.url);
            replace(&mut self.database.max_connections, database.max_connections);
            replace(&mut self.database.timeout_secs, database.timeout_secs);
        }

        if let Some(slack) = patch.slack {
            replace(&mut self.slack.signing_secret, slack.signing_secret.map(secret_value));
            fill(&mut self.slack.client_id, slack.client_id);
            fill(&mut self.slack.client_secret, slack.client_secret.map(secret_value));
            fill(&mut self.slack.redirect_uri, slack.redirect_uri);
            replace(&mut self.slack.api_base_url, slack.api_base_url);
            replace(&mut self.slack.hub_channel_name, slack.hub_channel_name);
            fill(&mut self.slack.admin_channel_id, slack.admin_channel_id);
            fill(&mut self.slack.install_url, slack.install_url);
            fill(&mut self.slack.install_success_url, slack.install_success_url);
            fill(&mut self.slack.help_context, slack.help_context);
            replace(&mut self.slack.processing_ack, slack.processing_ack);
            replace(&mut self.slack.signature_tolerance_secs, slack.signature_tolerance_secs);
        }

        if let Some(llm) = patch.llm {
            replace(&mut self.llm.provider, llm.provider);
            fill(&mut self.llm.api_key, llm.api_key.map(secret_value));
            fill(&mut self.llm.base_url, llm.base_url);
            replace(&mut self.llm.model, llm.model);
            replace(&mut self.llm.temperature, llm.temperature);
            replace(&mut self.llm.timeout_secs, llm.timeout_secs);
        }

        if let Some(notion) = patch.notion {
            replace(&mut self.notion.api_key, notion.api_key.map(secret_value));
            replace(&mut self.notion.parent_page_id, notion.parent_page_id);
            replace(&mut self.notion.api_base_url, notion.api_base_url);
            replace(&mut self.notion.api_version, notion.api_version);
        }

        if let Some(security) = patch.security {
            replace(&mut self.security.encryption_key, security.encryption_key.map(secret_value));
        }

        if let Some(server) = patch.server {
            replace(&mut self.server.bind_address, server.bind_address);
            replace(&mut self.server.port, server.port);
            replace(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        }

        if let Some(jobs) = patch.jobs {
            fill(&mut self.jobs.trigger_secret, jobs.trigger_secret.map(secret_value));
            fill(&mut self.jobs.digest_channel_id, jobs.digest_channel_id);
            replace(&mut self.jobs.digest_days, jobs.digest_days);
            replace(&mut self.jobs.health_check_interval_secs, jobs.health_check_interval_secs);
            replace(&mut self.jobs.digest_interval_secs, jobs.digest_interval_secs);
        }

        if let Some(logging) = patch.logging {
            replace(&mut self.logging.level, logging.level);
            replace(&mut self.logging.format, logging.format);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        replace(&mut self.database.url, read_env("PUMI_DATABASE_URL"));
        replace(&mut self.database.max_connections, env_parsed("PUMI_DATABASE_MAX_CONNECTIONS")?);
        replace(&mut self.database.timeout_secs, env_parsed("PUMI_DATABASE_TIMEOUT_SECS")?);

        let slack = &mut self.slack;
        replace(&mut slack.signing_secret, env_secret("PUMI_SLACK_SIGNING_SECRET"));
        fill(&mut slack.client_id, read_env("PUMI_SLACK_CLIENT_ID"));
        fill(&mut slack.client_secret, env_secret("PUMI_SLACK_CLIENT_SECRET"));
        fill(&mut slack.redirect_uri, read_env("PUMI_SLACK_REDIRECT_URI"));
        replace(&mut slack.api_base_url, read_env("PUMI_SLACK_API_BASE_URL"));
        replace(&mut slack.hub_channel_name, read_env("PUMI_SLACK_HUB_CHANNEL_NAME"));
        fill(&mut slack.admin_channel_id, read_env("PUMI_SLACK_ADMIN_CHANNEL_ID"));
        fill(&mut slack.install_url, read_env("PUMI_SLACK_INSTALL_URL"));
        fill(&mut slack.install_success_url, read_env("PUMI_SLACK_INSTALL_SUCCESS_URL"));
        fill(&mut slack.help_context, read_env("PUMI_SLACK_HELP_CONTEXT"));
        replace(&mut slack.processing_ack, env_parsed("PUMI_SLACK_PROCESSING_ACK")?);
        replace(
            &mut slack.signature_tolerance_secs,
            env_parsed("PUMI_SLACK_SIGNATURE_TOLERANCE_SECS")?,
        );

        let llm = &mut self.llm;
        replace(&mut llm.provider, read_env("PUMI_LLM_PROVIDER").map(|v| v.parse()).transpose()?);
        fill(&mut llm.api_key, env_secret("PUMI_LLM_API_KEY"));
        fill(&mut llm.base_url, read_env("PUMI_LLM_BASE_URL"));
        replace(&mut llm.model, read_env("PUMI_LLM_MODEL"));
        replace(&mut llm.temperature, env_parsed("PUMI_LLM_TEMPERATURE")?);
        replace(&mut llm.timeout_secs, env_parsed("PUMI_LLM_TIMEOUT_SECS")?);

        replace(&mut self.notion.api_key, env_secret("PUMI_NOTION_API_KEY"));
        replace(&mut self.notion.parent_page_id, read_env("PUMI_NOTION_PARENT_PAGE_ID"));
        replace(&mut self.notion.api_base_url, read_env("PUMI_NOTION_API_BASE_URL"));

        replace(&mut self.security.encryption_key, env_secret("PUMI_SECURITY_ENCRYPTION_KEY"));

        replace(&mut self.server.bind_address, read_env("PUMI_SERVER_BIND_ADDRESS"));
        replace(&mut self.server.port, env_parsed("PUMI_SERVER_PORT")?);
        replace(
            &mut self.server.graceful_shutdown_secs,
            env_parsed("PUMI_SERVER_GRACEFUL_SHUTDOWN_SECS")?,
        );

        let jobs = &mut self.jobs;
        fill(&mut jobs.trigger_secret, env_secret("PUMI_JOBS_TRIGGER_SECRET"));
        fill(&mut jobs.digest_channel_id, read_env("PUMI_JOBS_DIGEST_CHANNEL_ID"));
        replace(&mut jobs.digest_days, env_parsed("PUMI_JOBS_DIGEST_DAYS")?);
        replace(
            &mut jobs.health_check_interval_secs,
            env_parsed("PUMI_JOBS_HEALTH_CHECK_INTERVAL_SECS")?,
        );
        replace(&mut jobs.digest_interval_secs, env_parsed("PUMI_JOBS_DIGEST_INTERVAL_SECS")?);

        // The short aliases are accepted for both logging keys.
        let log_level = read_env("PUMI_LOGGING_LEVEL").or_else(|| read_env("PUMI_LOG_LEVEL"));
        replace(&mut self.logging.level, log_level);
        let log_format = read_env("PUMI_LOGGING_FORMAT").or_else(|| read_env("PUMI_LOG_FORMAT"));
        replace(&mut self.logging.format, log_format.map(|v| v.parse()).transpose()?);

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        replace(&mut self.database.url, overrides.database_url);
        replace(&mut self.logging.level, overrides.log_level);
        replace(&mut self.llm.provider, overrides.llm_provider);
        replace(&mut self.llm.model, overrides.llm_model);
        replace(&mut self.slack.signing_secret, overrides.slack_signing_secret.map(secret_value));
        replace(&mut self.server.port, overrides.server_port);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_llm(&self.llm)?;
        validate_notion(&self.notion)?;
        validate_security(&self.security)?;
        validate_server(&self.server)?;
        validate_jobs(&self.jobs)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pumi.toml"), PathBuf::from("config/pumi.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || !matches!(chars.peek(), Some('{')) {
            output.push(ch);
            continue;
        }
        chars.next();

        let mut key = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(next) => key.push(next),
                None => return Err(ConfigError::UnterminatedInterpolation),
            }
        }

        let value =
            env::var(&key).map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
        output.push_str(&value);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.signing_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.signing_secret is required. Get it from https://api.slack.com/apps > Your App > Basic Information > Signing Secret".to_string(),
        ));
    }

    if !is_http_url(&slack.api_base_url) {
        return Err(ConfigError::Validation(
            "slack.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if slack.hub_channel_name.trim().is_empty() {
        return Err(ConfigError::Validation("slack.hub_channel_name must not be empty".to_string()));
    }

    if slack.signature_tolerance_secs == 0 {
        return Err(ConfigError::Validation(
            "slack.signature_tolerance_secs must be greater than zero".to_string(),
        ));
    }

    if slack.client_id.is_some() != slack.client_secret.is_some() {
        return Err(ConfigError::Validation(
            "slack.client_id and slack.client_secret must be configured together".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {}
    }

    Ok(())
}

fn validate_notion(notion: &NotionConfig) -> Result<(), ConfigError> {
    if notion.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "notion.api_key is required. Create an internal integration at https://www.notion.so/my-integrations".to_string(),
        ));
    }

    if notion.parent_page_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "notion.parent_page_id is required; team boards are created under this page"
                .to_string(),
        ));
    }

    if !is_http_url(&notion.api_base_url) {
        return Err(ConfigError::Validation(
            "notion.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_security(security: &SecurityConfig) -> Result<(), ConfigError> {
    let key = security.encryption_key.expose_secret().trim();
    let valid = key.len() == 64 && key.chars().all(|ch| ch.is_ascii_hexdigit());
    if !valid {
        return Err(ConfigError::Validation(
            "security.encryption_key must be 64 hex characters (32 bytes); generate one with `openssl rand -hex 32`".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_jobs(jobs: &JobsConfig) -> Result<(), ConfigError> {
    if jobs.digest_days == 0 || jobs.digest_days > 90 {
        return Err(ConfigError::Validation("jobs.digest_days must be in range 1..=90".to_string()));
    }

    if jobs.digest_interval_secs > 0 && jobs.digest_channel_id.is_none() {
        return Err(ConfigError::Validation(
            "jobs.digest_interval_secs is set but jobs.digest_channel_id is missing".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_secret(key: &str) -> Option<SecretString> {
    read_env(key).map(secret_value)
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    read_env(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value: value.clone(),
            })
        })
        .transpose()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    llm: Option<LlmPatch>,
    notion: Option<NotionPatch>,
    security: Option<SecurityPatch>,
    server: Option<ServerPatch>,
    jobs: Option<JobsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    signing_secret: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    api_base_url: Option<String>,
    hub_channel_name: Option<String>,
    admin_channel_id: Option<String>,
    install_url: Option<String>,
    install_success_url: Option<String>,
    help_context: Option<String>,
    processing_ack: Option<bool>,
    signature_tolerance_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NotionPatch {
    api_key: Option<String>,
    parent_page_id: Option<String>,
    api_base_url: Option<String>,
    api_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SecurityPatch {
    encryption_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct JobsPatch {
    trigger_secret: Option<String>,
    digest_channel_id: Option<String>,
    digest_days: Option<u32>,
    health_check_interval_secs: Option<u64>,
    digest_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    const REQUIRED_VARS: [&str; 5] = [
        "PUMI_SLACK_SIGNING_SECRET",
        "PUMI_LLM_API_KEY",
        "PUMI_NOTION_API_KEY",
        "PUMI_NOTION_PARENT_PAGE_ID",
        "PUMI_SECURITY_ENCRYPTION_KEY",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_required_vars() {
        env::set_var("PUMI_SLACK_SIGNING_SECRET", "signing-secret-value");
        env::set_var("PUMI_LLM_API_KEY", "sk-llm-secret-value");
        env::set_var("PUMI_NOTION_API_KEY", "secret_notion_value");
        env::set_var("PUMI_NOTION_PARENT_PAGE_ID", "parent-page");
        env::set_var("PUMI_SECURITY_ENCRYPTION_KEY", TEST_KEY);
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::remove_var("PUMI_SLACK_SIGNING_SECRET");
        env::set_var("TEST_PUMI_SIGNING_SECRET", "from-env-interpolation");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pumi.toml");
            fs::write(
                &path,
                r#"
[slack]
signing_secret = "${TEST_PUMI_SIGNING_SECRET}"
hub_channel_name = "feedback-hub"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.slack.signing_secret.expose_secret() == "from-env-interpolation",
                "signing secret should be interpolated from the environment",
            )?;
            ensure(
                config.slack.hub_channel_name == "feedback-hub",
                "hub channel name should come from the file",
            )?;
            Ok(())
        })();

        clear_vars(&REQUIRED_VARS);
        clear_vars(&["TEST_PUMI_SIGNING_SECRET"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("pumi.toml");
        fs::write(&path, "[slack]\nsigning_secret = \"${PUMI_TEST_UNSET_VARIABLE}\"\n")
            .map_err(|err| err.to_string())?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => return Err("expected interpolation failure".to_string()),
                Err(error) => error,
            };
        ensure(
            matches!(error, ConfigError::MissingEnvInterpolation { ref var } if var == "PUMI_TEST_UNSET_VARIABLE"),
            "missing variable should be named in the error",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("PUMI_LOG_LEVEL", "warn");
        env::set_var("PUMI_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&REQUIRED_VARS);
        clear_vars(&["PUMI_LOG_LEVEL", "PUMI_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("PUMI_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("PUMI_JOBS_DIGEST_DAYS", "14");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pumi.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[jobs]
digest_days = 3

[llm]
provider = "ollama"
model = "llama3.1"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.jobs.digest_days == 14, "env digest days should win over the file")?;
            ensure(config.llm.provider == LlmProvider::Ollama, "file provider should apply")?;
            ensure(
                config.llm.effective_base_url() == "http://localhost:11434/v1",
                "ollama should default to the local endpoint",
            )?;
            Ok(())
        })();

        clear_vars(&REQUIRED_VARS);
        clear_vars(&["PUMI_DATABASE_URL", "PUMI_JOBS_DIGEST_DAYS"]);
        result
    }

    #[test]
    fn validation_rejects_short_encryption_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("PUMI_SECURITY_ENCRYPTION_KEY", "abcd");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("security.encryption_key")
            );
            ensure(has_message, "validation failure should mention security.encryption_key")
        })();

        clear_vars(&REQUIRED_VARS);
        result
    }

    #[test]
    fn validation_requires_signing_secret() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::remove_var("PUMI_SLACK_SIGNING_SECRET");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected validation failure but config load succeeded".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("slack.signing_secret")),
                "validation failure should mention slack.signing_secret",
            ),
        };

        clear_vars(&REQUIRED_VARS);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("PUMI_SERVER_PORT", "not-a-port");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected env override failure".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "PUMI_SERVER_PORT"),
                "invalid port should be reported with its key",
            ),
        };

        clear_vars(&REQUIRED_VARS);
        clear_vars(&["PUMI_SERVER_PORT"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("signing-secret-value"),
                "debug output should not contain the signing secret",
            )?;
            ensure(!debug.contains("sk-llm-secret-value"), "debug output should not contain llm key")?;
            ensure(!debug.contains(TEST_KEY), "debug output should not contain the encryption key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&REQUIRED_VARS);
        result
    }
}
