//! Slash commands. The webhook acks immediately; the answer goes to `response_url`.

use serde::Serialize;
use tracing::{info, warn};

use pumi_core::domain::event::TeamId;
use pumi_core::errors::StorageError;
use pumi_slack::blocks::{
    board_link_message, digest_message, failure_message, help_answer_message, help_message,
    MessageTemplate,
};
use pumi_slack::commands::{route_command, SlashCommand, SlashCommandPayload};

use crate::dispatch::database;
use crate::state::Services;

/// Grounds `/help` answers when no knowledge base is configured.
pub const DEFAULT_HELP_CONTEXT: &str = "Pumi collects product feedback from Slack and files it on \
a Notion board. Mention @pumi with `feedback: <text>` to log feedback, `bug: <text>` to log an \
urgent bug, or `query: <question>` to search the board. In the hub channel a message starting with \
`feedback:` or `bug:` is logged without a mention. `/pumisummary` shows the latest channel digest \
and `/board` links to the team's feedback board. Every logged item has Confirm, Edit and Flag \
buttons; Flag asks for a reason and notifies the admins.";

const HELP_UNAVAILABLE: &str =
    "I'm having trouble answering that right now. Please try again later.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandAck {
    pub response_type: &'static str,
    pub text: String,
}

pub fn acknowledgment(command: SlashCommand) -> CommandAck {
    let text = match command {
        SlashCommand::Summary => "Fetching the latest digest...",
        SlashCommand::Board => "Looking up your feedback board...",
        SlashCommand::Help => "One moment...",
    };
    CommandAck { response_type: "ephemeral", text: text.to_owned() }
}

pub async fn command_reply(
    services: &Services,
    command: SlashCommand,
    payload: &SlashCommandPayload,
) -> Result<MessageTemplate, StorageError> {
    match command {
        SlashCommand::Summary => {
            // Prefer this channel's digest, then the team's newest.
            let team_id = TeamId(payload.team_id.clone());
            let mut digest = services
                .digests
                .latest(&team_id, Some(payload.channel_id.as_str()))
                .await
                .map_err(database)?;
            if digest.is_none() {
                digest = services.digests.latest(&team_id, None).await.map_err(database)?;
            }
            Ok(digest_message(digest.as_ref()))
        }
        SlashCommand::Board => {
            let team_id = TeamId(payload.team_id.clone());
            let link = services.notion_links.find(&team_id).await.map_err(database)?;
            Ok(board_link_message(link.map(|link| link.board_url()).as_deref()))
        }
        SlashCommand::Help => Ok(help_reply(services, payload).await),
    }
}

async fn help_reply(services: &Services, payload: &SlashCommandPayload) -> MessageTemplate {
    let question = payload.text.trim();
    if question.is_empty() {
        return help_message();
    }
    let context = services.settings.help_context.as_deref().unwrap_or(DEFAULT_HELP_CONTEXT);
    let answer = match services.extraction.answer_help(question, context).await {
        Ok(answer) => answer,
        Err(error) => {
            warn!(
                event_name = "commands.help.answer_failed",
                team_id = %payload.team_id,
                error = %error,
                "help question not answered"
            );
            HELP_UNAVAILABLE.to_owned()
        }
    };
    help_answer_message(question, &answer)
}

/// Builds the reply and posts it to the command's `response_url`. Never fails.
pub async fn respond_to_command(services: &Services, payload: SlashCommandPayload) {
    let command = route_command(&payload);
    info!(
        event_name = "commands.received",
        team_id = %payload.team_id,
        channel_id = %payload.channel_id,
        command = command.as_str(),
        "slash command received"
    );

    let reply = match command_reply(services, command, &payload).await {
        Ok(reply) => reply,
        Err(error) => {
            warn!(
                event_name = "commands.failed",
                team_id = %payload.team_id,
                command = command.as_str(),
                error = %error,
                "slash command failed"
            );
            failure_message(":x: Something went wrong. Please try again later.")
        }
    };

    if let Err(error) = services.slack.respond(&payload.response_url, &reply, true).await {
        warn!(
            event_name = "commands.respond_failed",
            team_id = %payload.team_id,
            command = command.as_str(),
            error = %error,
            "slash command reply not delivered"
        );
    }
}
