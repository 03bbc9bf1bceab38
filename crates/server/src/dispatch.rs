//! Inbound message pipeline: dedup, archive, credential, classify, extract, persist, reply.

use chrono::Utc;
use secrecy::SecretString;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pumi_core::classify;
use pumi_core::domain::event::InboundEvent;
use pumi_core::domain::intent::{Command, Intent, RoutingTarget};
use pumi_core::domain::records::{FeedbackKind, InternalFeedback, SlackMessage};
use pumi_core::domain::team::{NotionDatabaseLink, TeamCredential};
use pumi_core::errors::{PipelineError, StorageError};
use pumi_core::flows::FollowUpToken;
use pumi_db::repositories::RepositoryError;
use pumi_db::CredentialStoreError;
use pumi_notion::{NewRecord, NotionError};
use pumi_slack::blocks::{
    empty_results_message, failure_message, feedback_card, processing_message,
    query_results_message, MessageTemplate,
};
use pumi_slack::{OutboundMessage, SlackApiError};

use crate::state::Services;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ignored,
    Duplicate,
    NoCredential,
    NoIntent,
    Recorded { target: RoutingTarget, record_id: String },
    Answered { results: usize },
    Failed { kind: &'static str },
}

/// Runs one inbound message to completion. Never returns an error: every failure has already
/// been logged and, where the user should know, reported in the originating channel.
pub async fn handle_event(services: &Services, event: InboundEvent) -> DispatchOutcome {
    if !event.is_actionable() {
        return DispatchOutcome::Ignored;
    }

    match run_pipeline(services, &event).await {
        Ok(outcome) => outcome,
        Err(error) if error.is_benign() => {
            debug!(
                event_name = "pipeline.event.short_circuit",
                event_id = %event.event_id,
                team_id = %event.team_id,
                reason = error.kind(),
                "event ended without a reply"
            );
            match error {
                PipelineError::DuplicateEvent { .. } => DispatchOutcome::Duplicate,
                PipelineError::MissingCredential { .. } => DispatchOutcome::NoCredential,
                _ => DispatchOutcome::NoIntent,
            }
        }
        Err(error) => {
            warn!(
                event_name = "pipeline.event.failed",
                event_id = %event.event_id,
                team_id = %event.team_id,
                channel_id = %event.channel_id,
                kind = error.kind(),
                error = %error,
                "event processing failed"
            );
            DispatchOutcome::Failed { kind: error.kind() }
        }
    }
}

async fn run_pipeline(
    services: &Services,
    event: &InboundEvent,
) -> Result<DispatchOutcome, PipelineError> {
    claim_event(services, event).await?;
    archive_message(services, event).await;

    let (credential, token) = load_credential(services, event).await?;
    let intent = classify(
        &event.text,
        &credential.bot_user_id,
        credential.hub_channel_id.as_deref(),
        &event.channel_id,
    );
    if matches!(intent, Intent::None) {
        return Err(PipelineError::ClassificationMiss);
    }

    info!(
        event_name = "pipeline.intent.classified",
        event_id = %event.event_id,
        team_id = %event.team_id,
        channel_id = %event.channel_id,
        intent = intent.name(),
        target = intent.command().map_or("none", |command| command.target.as_str()),
        "message classified"
    );

    if services.settings.processing_ack {
        if let Err(error) = post(services, &token, &event.channel_id, processing_message()).await {
            warn!(
                event_name = "pipeline.ack.failed",
                event_id = %event.event_id,
                error = %error,
                "processing acknowledgment not delivered"
            );
        }
    }

    match execute(services, event, &credential, intent).await {
        Ok((outcome, template)) => {
            post(services, &token, &event.channel_id, template).await?;
            Ok(outcome)
        }
        Err(error) => {
            if let Some(text) = error.user_message() {
                if let Err(post_error) =
                    post(services, &token, &event.channel_id, failure_message(text)).await
                {
                    warn!(
                        event_name = "pipeline.failure_notice.failed",
                        event_id = %event.event_id,
                        error = %post_error,
                        "failure notice not delivered"
                    );
                }
            }
            Err(error)
        }
    }
}

/// Check, then insert-if-absent. The insert is the real guard; the check only skips work early.
async fn claim_event(services: &Services, event: &InboundEvent) -> Result<(), PipelineError> {
    let duplicate = || PipelineError::DuplicateEvent { event_id: event.event_id.0.clone() };

    if services.processed_events.is_processed(&event.event_id).await.map_err(database)? {
        return Err(duplicate());
    }
    let claimed = services
        .processed_events
        .mark_processed(&event.event_id, &event.team_id, Utc::now())
        .await
        .map_err(database)?;
    if !claimed {
        return Err(duplicate());
    }
    Ok(())
}

async fn archive_message(services: &Services, event: &InboundEvent) {
    let message = SlackMessage {
        id: Uuid::new_v4().to_string(),
        team_id: event.team_id.clone(),
        channel_id: event.channel_id.clone(),
        user_id: event.user_id.clone(),
        text: event.text.clone(),
        message_ts: event.timestamp_token.clone(),
        created_at: Utc::now(),
    };
    if let Err(error) = services.messages.append(message).await {
        warn!(
            event_name = "pipeline.archive.failed",
            event_id = %event.event_id,
            error = %error,
            "raw message not archived"
        );
    }
}

async fn load_credential(
    services: &Services,
    event: &InboundEvent,
) -> Result<(TeamCredential, SecretString), PipelineError> {
    let missing = || PipelineError::MissingCredential { team_id: event.team_id.0.clone() };

    let credential = services.credentials.get(&event.team_id).await.map_err(database)?;
    let credential = credential.ok_or_else(missing)?;
    match services.credentials.access_token(&credential) {
        Ok(token) => Ok((credential, token)),
        Err(CredentialStoreError::Revoked { .. }) => Err(missing()),
        Err(error) => {
            warn!(
                event_name = "pipeline.credential.unreadable",
                team_id = %event.team_id,
                error = %error,
                "stored token could not be decrypted"
            );
            Err(StorageError::Credential.into())
        }
    }
}

async fn execute(
    services: &Services,
    event: &InboundEvent,
    credential: &TeamCredential,
    intent: Intent,
) -> Result<(DispatchOutcome, MessageTemplate), PipelineError> {
    match intent {
        Intent::Feedback(command) => {
            record_feedback(services, event, credential, &command, FeedbackKind::Feedback).await
        }
        Intent::Bug(command) => {
            record_feedback(services, event, credential, &command, FeedbackKind::Bug).await
        }
        Intent::Query(command) => answer_query(services, credential, &command).await,
        Intent::None => Err(PipelineError::ClassificationMiss),
    }
}

async fn record_feedback(
    services: &Services,
    event: &InboundEvent,
    credential: &TeamCredential,
    command: &Command,
    kind: FeedbackKind,
) -> Result<(DispatchOutcome, MessageTemplate), PipelineError> {
    let mut feedback = services.extraction.extract(&command.body).await?;
    if kind == FeedbackKind::Bug {
        feedback = feedback.into_bug_report();
    }

    let (record_id, record_url) = match command.target {
        RoutingTarget::InternalBucket => {
            let now = Utc::now();
            let entry = InternalFeedback {
                id: Uuid::new_v4().to_string(),
                kind,
                feedback: feedback.clone(),
                details: command.body.clone(),
                team_id: event.team_id.clone(),
                user_id: event.user_id.clone(),
                channel_id: event.channel_id.clone(),
                flagged: false,
                created_at: now,
                updated_at: now,
            };
            let id = entry.id.clone();
            services.internal_feedback.insert(entry).await.map_err(database)?;
            (id, None)
        }
        RoutingTarget::ExternalTeamStore => {
            let database_id = ensure_database(services, credential).await?;
            let record = NewRecord {
                feedback: feedback.clone(),
                slack_user: event.user_id.clone(),
                slack_channel: event.channel_id.clone(),
                message_link: Some(permalink(&event.channel_id, &event.timestamp_token)),
            };
            let created =
                services.team_store.create_record(&database_id, &record).await.map_err(external)?;
            (created.id, created.url)
        }
    };

    info!(
        event_name = "pipeline.feedback.recorded",
        event_id = %event.event_id,
        team_id = %event.team_id,
        kind = kind.as_str(),
        target = command.target.as_str(),
        record_id = %record_id,
        "feedback recorded"
    );

    let token = FollowUpToken {
        team_id: event.team_id.0.clone(),
        channel_id: event.channel_id.clone(),
        target: command.target,
        record_id: record_id.clone(),
        feedback: Some(feedback.clone()),
    };
    let token = match token.encode() {
        Ok(token) => Some(token),
        Err(error) => {
            warn!(
                event_name = "pipeline.token.encode_failed",
                event_id = %event.event_id,
                error = %error,
                "card posted without follow-up buttons"
            );
            None
        }
    };

    let template = feedback_card(&feedback, record_url.as_deref(), token.as_deref());
    Ok((DispatchOutcome::Recorded { target: command.target, record_id }, template))
}

async fn answer_query(
    services: &Services,
    credential: &TeamCredential,
    command: &Command,
) -> Result<(DispatchOutcome, MessageTemplate), PipelineError> {
    let filter = services.extraction.to_filters(&command.body).await?;
    let link = services.notion_links.find(&credential.team_id).await.map_err(database)?;

    let records = match link {
        Some(link) => services
            .team_store
            .query_records(&link.external_database_id, &filter)
            .await
            .map_err(external)?,
        None => Vec::new(),
    };

    let template = if records.is_empty() {
        empty_results_message()
    } else {
        query_results_message(&command.body, &records)
    };
    Ok((DispatchOutcome::Answered { results: records.len() }, template))
}

/// Lazily provisions the team's board. The conditional link insert decides the race: the
/// winner seeds its database, the loser archives its own and adopts the winner's.
pub async fn ensure_database(
    services: &Services,
    credential: &TeamCredential,
) -> Result<String, PipelineError> {
    let team_id = &credential.team_id;
    if let Some(link) = services.notion_links.find(team_id).await.map_err(database)? {
        return Ok(link.external_database_id);
    }

    let team_name = credential.team_name.as_deref().unwrap_or(&team_id.0);
    let database_id = services.team_store.create_database(team_name).await.map_err(external)?;
    let link = NotionDatabaseLink {
        team_id: team_id.clone(),
        external_database_id: database_id.clone(),
        created_at: Utc::now(),
    };

    if services.notion_links.insert_if_absent(link).await.map_err(database)? {
        if let Err(error) = services.team_store.seed_examples(&database_id).await {
            warn!(
                event_name = "provision.seed.failed",
                team_id = %team_id,
                database_id = %database_id,
                error = %error,
                "example rows not seeded"
            );
        }
        info!(
            event_name = "provision.database.created",
            team_id = %team_id,
            database_id = %database_id,
            "feedback board provisioned"
        );
        return Ok(database_id);
    }

    if let Err(error) = services.team_store.archive_database(&database_id).await {
        warn!(
            event_name = "provision.race.archive_failed",
            team_id = %team_id,
            database_id = %database_id,
            error = %error,
            "orphaned board left in place"
        );
    }
    let winner = services.notion_links.find(team_id).await.map_err(database)?;
    winner.map(|link| link.external_database_id).ok_or_else(|| {
        StorageError::Database(format!("database link for `{team_id}` vanished")).into()
    })
}

async fn post(
    services: &Services,
    token: &SecretString,
    channel_id: &str,
    template: MessageTemplate,
) -> Result<(), StorageError> {
    services
        .slack
        .post_message(token, &OutboundMessage::new(channel_id, template))
        .await
        .map_err(messaging)
}

pub fn permalink(channel_id: &str, ts: &str) -> String {
    format!("https://slack.com/archives/{channel_id}/p{}", ts.replace('.', ""))
}

pub fn database(error: RepositoryError) -> StorageError {
    StorageError::Database(error.to_string())
}

pub fn external(error: NotionError) -> StorageError {
    StorageError::ExternalStore(error.to_string())
}

pub fn messaging(error: SlackApiError) -> StorageError {
    StorageError::Messaging(error.to_string())
}
