use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub team_id: String,
    #[serde(default)]
    pub channel_id: String,
    pub user_id: String,
    pub response_url: String,
    #[serde(default)]
    pub trigger_id: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("slash command form is malformed: {0}")]
    Form(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlashCommand {
    Summary,
    Board,
    Help,
}

impl SlashCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Board => "board",
            Self::Help => "help",
        }
    }
}

pub fn parse_command_form(body: &[u8]) -> Result<SlashCommandPayload, CommandParseError> {
    serde_urlencoded::from_bytes(body).map_err(|error| CommandParseError::Form(error.to_string()))
}

/// `/pumisummary` and `/board` are registered directly; `/pumi <verb>` reaches the same handlers.
pub fn route_command(payload: &SlashCommandPayload) -> SlashCommand {
    let verb = match payload.command.trim().to_ascii_lowercase().as_str() {
        "/pumi" => payload.text.split_whitespace().next().unwrap_or("help").to_ascii_lowercase(),
        other => other.trim_start_matches('/').to_owned(),
    };

    match verb.as_str() {
        "pumisummary" | "summary" => SlashCommand::Summary,
        "board" => SlashCommand::Board,
        _ => SlashCommand::Help,
    }
}
