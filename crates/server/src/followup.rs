//! Button clicks and modal submissions on a posted feedback card.

use chrono::Utc;
use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use pumi_core::domain::event::TeamId;
use pumi_core::domain::feedback::ParsedFeedback;
use pumi_core::domain::intent::RoutingTarget;
use pumi_core::domain::records::FeedbackFlag;
use pumi_core::domain::team::TeamCredential;
use pumi_core::errors::StorageError;
use pumi_core::flows::{
    FollowUpAction, FollowUpFlow, FollowUpToken, FollowUpTokenError, FollowUpTransitionError,
};
use pumi_slack::blocks::{feedback_updated_message, flag_notification};
use pumi_slack::interactions::Interaction;
use pumi_slack::modals::{edit_feedback_modal, flag_feedback_modal};
use pumi_slack::OutboundMessage;

use crate::dispatch::{database, external, messaging};
use crate::state::Services;

#[derive(Debug, Error)]
pub enum FollowUpError {
    #[error(transparent)]
    Transition(#[from] FollowUpTransitionError),
    #[error(transparent)]
    Token(#[from] FollowUpTokenError),
    #[error("follow-up token was issued to team `{issued}`, not `{actual}`")]
    TeamMismatch { issued: String, actual: String },
    #[error("no usable credential for team `{0}`")]
    MissingCredential(String),
    #[error("feedback record `{0}` was not found")]
    RecordNotFound(String),
    #[error("interaction is missing `{0}`")]
    MissingInput(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FollowUpOutcome {
    Ignored,
    Confirmed,
    ModalOpened,
    Updated { record_id: String },
    Flagged { record_id: String },
}

/// What one interaction carries besides the token.
struct Submission {
    raw_token: String,
    token: FollowUpToken,
    user_id: String,
    trigger_id: Option<String>,
    edited: Option<ParsedFeedback>,
    reason: Option<String>,
}

pub async fn handle_interaction(
    services: &Services,
    interaction: Interaction,
) -> Result<FollowUpOutcome, FollowUpError> {
    let Some(event) = interaction.follow_up_event() else {
        return Ok(FollowUpOutcome::Ignored);
    };
    let transition = FollowUpFlow.handle(event)?;

    let (team_id, submission) = match interaction {
        Interaction::ButtonClicked { token, trigger_id, user_id, team_id, .. } => {
            let submission = Submission {
                token: FollowUpToken::decode(&token)?,
                raw_token: token,
                user_id,
                trigger_id: Some(trigger_id).filter(|id| !id.is_empty()),
                edited: None,
                reason: None,
            };
            (team_id, submission)
        }
        Interaction::EditSubmitted { metadata, user_id, team_id, feedback } => {
            let submission = Submission {
                token: FollowUpToken::decode(&metadata)?,
                raw_token: metadata,
                user_id,
                trigger_id: None,
                edited: Some(feedback),
                reason: None,
            };
            (team_id, submission)
        }
        Interaction::FlagSubmitted { metadata, user_id, team_id, reason } => {
            let submission = Submission {
                token: FollowUpToken::decode(&metadata)?,
                raw_token: metadata,
                user_id,
                trigger_id: None,
                edited: None,
                reason: Some(reason),
            };
            (team_id, submission)
        }
        Interaction::Unsupported { .. } => return Ok(FollowUpOutcome::Ignored),
    };

    if submission.token.team_id != team_id {
        return Err(FollowUpError::TeamMismatch {
            issued: submission.token.team_id.clone(),
            actual: team_id,
        });
    }

    info!(
        event_name = "followup.transition",
        team_id = %team_id,
        record_id = %submission.token.record_id,
        from = ?transition.from,
        to = ?transition.to,
        "follow-up transition"
    );

    if transition.actions.is_empty() {
        return Ok(FollowUpOutcome::Confirmed);
    }

    let (credential, bot_token) = load_credential(services, &TeamId(team_id)).await?;
    let mut outcome = FollowUpOutcome::Ignored;
    for action in transition.actions {
        outcome = match action {
            FollowUpAction::OpenEditModal => {
                open_edit_modal(services, &bot_token, &submission).await?
            }
            FollowUpAction::OpenFlagModal => {
                let trigger_id = submission
                    .trigger_id
                    .as_deref()
                    .ok_or(FollowUpError::MissingInput("trigger_id"))?;
                let view = flag_feedback_modal(&submission.raw_token);
                services.slack.open_view(&bot_token, trigger_id, &view).await.map_err(messaging)?;
                FollowUpOutcome::ModalOpened
            }
            FollowUpAction::UpdateRecord => update_record(services, &bot_token, &submission).await?,
            FollowUpAction::RecordFlag => record_flag(services, &submission).await?,
            FollowUpAction::NotifyAdmins => {
                notify_admins(services, &credential, &bot_token, &submission).await;
                outcome
            }
        };
    }
    Ok(outcome)
}

async fn load_credential(
    services: &Services,
    team_id: &TeamId,
) -> Result<(TeamCredential, SecretString), FollowUpError> {
    let missing = || FollowUpError::MissingCredential(team_id.0.clone());
    let credential =
        services.credentials.get(team_id).await.map_err(database)?.ok_or_else(missing)?;
    let token = services.credentials.access_token(&credential).map_err(|_| missing())?;
    Ok((credential, token))
}

async fn open_edit_modal(
    services: &Services,
    bot_token: &SecretString,
    submission: &Submission,
) -> Result<FollowUpOutcome, FollowUpError> {
    let trigger_id =
        submission.trigger_id.as_deref().ok_or(FollowUpError::MissingInput("trigger_id"))?;

    // Oversized tokens drop their snapshot; internal rows can still be read back.
    let current = match (&submission.token.feedback, submission.token.target) {
        (Some(feedback), _) => Some(feedback.clone()),
        (None, RoutingTarget::InternalBucket) => services
            .internal_feedback
            .find(&submission.token.record_id)
            .await
            .map_err(database)?
            .map(|entry| entry.feedback),
        (None, RoutingTarget::ExternalTeamStore) => None,
    };

    let view = edit_feedback_modal(current.as_ref(), &submission.raw_token);
    services.slack.open_view(bot_token, trigger_id, &view).await.map_err(messaging)?;
    Ok(FollowUpOutcome::ModalOpened)
}

async fn update_record(
    services: &Services,
    bot_token: &SecretString,
    submission: &Submission,
) -> Result<FollowUpOutcome, FollowUpError> {
    let feedback = submission.edited.as_ref().ok_or(FollowUpError::MissingInput("feedback"))?;
    let record_id = &submission.token.record_id;

    match submission.token.target {
        RoutingTarget::InternalBucket => {
            let updated = services
                .internal_feedback
                .update_feedback(record_id, feedback, Utc::now())
                .await
                .map_err(database)?;
            if !updated {
                return Err(FollowUpError::RecordNotFound(record_id.clone()));
            }
        }
        RoutingTarget::ExternalTeamStore => {
            services.team_store.update_record(record_id, feedback).await.map_err(external)?;
        }
    }

    info!(
        event_name = "followup.record.updated",
        team_id = %submission.token.team_id,
        target = submission.token.target.as_str(),
        record_id = %record_id,
        user_id = %submission.user_id,
        "feedback record updated"
    );

    let message =
        OutboundMessage::new(&submission.token.channel_id, feedback_updated_message(feedback));
    if let Err(error) = services.slack.post_message(bot_token, &message).await {
        warn!(
            event_name = "followup.update_notice.failed",
            record_id = %record_id,
            error = %error,
            "update confirmation not delivered"
        );
    }
    Ok(FollowUpOutcome::Updated { record_id: record_id.clone() })
}

async fn record_flag(
    services: &Services,
    submission: &Submission,
) -> Result<FollowUpOutcome, FollowUpError> {
    let reason = submission.reason.clone().ok_or(FollowUpError::MissingInput("reason"))?;
    let token = &submission.token;

    services
        .flags
        .record(FeedbackFlag {
            id: Uuid::new_v4().to_string(),
            record_id: token.record_id.clone(),
            target: token.target,
            team_id: TeamId(token.team_id.clone()),
            user_id: submission.user_id.clone(),
            reason,
            created_at: Utc::now(),
        })
        .await
        .map_err(database)?;

    if token.target == RoutingTarget::InternalBucket {
        let marked = services
            .internal_feedback
            .mark_flagged(&token.record_id, Utc::now())
            .await
            .map_err(database)?;
        if !marked {
            warn!(
                event_name = "followup.flag.orphaned",
                record_id = %token.record_id,
                "flag recorded for a row that no longer exists"
            );
        }
    }

    info!(
        event_name = "followup.record.flagged",
        team_id = %token.team_id,
        target = token.target.as_str(),
        record_id = %token.record_id,
        user_id = %submission.user_id,
        "feedback flagged"
    );
    Ok(FollowUpOutcome::Flagged { record_id: token.record_id.clone() })
}

/// Best effort: the flag is already stored.
async fn notify_admins(
    services: &Services,
    credential: &TeamCredential,
    bot_token: &SecretString,
    submission: &Submission,
) {
    let channel = services
        .settings
        .admin_channel_id
        .as_deref()
        .or(credential.hub_channel_id.as_deref());
    let Some(channel) = channel else {
        warn!(
            event_name = "followup.notify.no_channel",
            team_id = %credential.team_id,
            "no admin or hub channel to notify"
        );
        return;
    };

    let template = flag_notification(
        &submission.user_id,
        &submission.token.channel_id,
        submission.token.feedback.as_ref().map(|feedback| feedback.summary.as_str()),
        submission.reason.as_deref().unwrap_or_default(),
    );
    if let Err(error) =
        services.slack.post_message(bot_token, &OutboundMessage::new(channel, template)).await
    {
        warn!(
            event_name = "followup.notify.failed",
            team_id = %credential.team_id,
            channel_id = %channel,
            error = %error,
            "admin notification not delivered"
        );
    }
}
