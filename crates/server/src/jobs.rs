//! Periodic jobs: token health check and channel digest. Both continue past per-item errors
//! and never fail their caller.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use pumi_core::config::JobsConfig;
use pumi_core::domain::records::{FeedbackDigest, SlackMessage};
use pumi_core::domain::team::TeamCredential;
use pumi_slack::blocks::reinstall_notice;
use pumi_slack::OutboundMessage;

use crate::state::{AppState, Services};

pub const NO_MESSAGES: &str = "No messages to digest";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HealthCheckReport {
    pub checked: usize,
    pub healthy: usize,
    pub invalidated: Vec<String>,
    pub errors: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DigestReport {
    pub channel_id: String,
    pub message_count: usize,
    pub summary: String,
    pub digest_id: Option<String>,
}

pub async fn run_health_check(services: &Services) -> HealthCheckReport {
    let mut report = HealthCheckReport::default();
    let credentials = match services.credentials.list_active().await {
        Ok(credentials) => credentials,
        Err(error) => {
            error!(
                event_name = "jobs.health_check.list_failed",
                error = %error,
                "could not list installed teams"
            );
            report.errors += 1;
            return report;
        }
    };

    for credential in credentials {
        report.checked += 1;
        let token = match services.credentials.access_token(&credential) {
            Ok(token) => token,
            Err(error) => {
                warn!(
                    event_name = "jobs.health_check.token_unreadable",
                    team_id = %credential.team_id,
                    error = %error,
                    "stored token could not be decrypted"
                );
                report.errors += 1;
                continue;
            }
        };

        match services.slack.auth_test(&token).await {
            Ok(_) => report.healthy += 1,
            Err(failure) if failure.is_auth_failure() => {
                notify_reinstall(services, &credential, &token).await;
                match services.credentials.invalidate(&credential.team_id).await {
                    Ok(_) => {
                        warn!(
                            event_name = "jobs.health_check.invalidated",
                            team_id = %credential.team_id,
                            reason = %failure,
                            "team token invalidated"
                        );
                        report.invalidated.push(credential.team_id.0.clone());
                    }
                    Err(error) => {
                        error!(
                            event_name = "jobs.health_check.invalidate_failed",
                            team_id = %credential.team_id,
                            error = %error,
                            "could not invalidate team token"
                        );
                        report.errors += 1;
                    }
                }
            }
            Err(error) => {
                // Transport trouble says nothing about the token.
                warn!(
                    event_name = "jobs.health_check.inconclusive",
                    team_id = %credential.team_id,
                    error = %error,
                    "token check inconclusive"
                );
                report.errors += 1;
            }
        }
    }

    info!(
        event_name = "jobs.health_check.completed",
        checked = report.checked,
        healthy = report.healthy,
        invalidated = report.invalidated.len(),
        errors = report.errors,
        "health check finished"
    );
    report
}

async fn notify_reinstall(
    services: &Services,
    credential: &TeamCredential,
    token: &secrecy::SecretString,
) {
    let (Some(hub_channel_id), Some(install_url)) =
        (credential.hub_channel_id.as_deref(), services.settings.install_url.as_deref())
    else {
        return;
    };
    let message = OutboundMessage::new(hub_channel_id, reinstall_notice(install_url));
    if let Err(error) = services.slack.post_message(token, &message).await {
        warn!(
            event_name = "jobs.health_check.notice_failed",
            team_id = %credential.team_id,
            error = %error,
            "reinstall notice not delivered"
        );
    }
}

pub async fn run_digest(services: &Services, channel_id: &str, days: u32) -> DigestReport {
    let mut report = DigestReport { channel_id: channel_id.to_owned(), ..DigestReport::default() };
    let Some(since) =
        Duration::try_days(i64::from(days)).and_then(|span| Utc::now().checked_sub_signed(span))
    else {
        error!(
            event_name = "jobs.digest.window_out_of_range",
            channel_id = %channel_id,
            days,
            "digest window reaches past the representable calendar"
        );
        return report;
    };

    let messages = match services.messages.list_channel_since(channel_id, since).await {
        Ok(messages) => messages,
        Err(error) => {
            error!(
                event_name = "jobs.digest.read_failed",
                channel_id = %channel_id,
                error = %error,
                "could not read archived messages"
            );
            return report;
        }
    };
    // Channel ids are workspace-scoped, so the archive rows name the owning team.
    let Some(team_id) = messages.first().map(|message| message.team_id.clone()) else {
        report.summary = NO_MESSAGES.to_owned();
        return report;
    };

    report.message_count = messages.len();
    let raw_text = messages.iter().map(digest_line).collect::<Vec<_>>().join("\n");
    let summary = match services.extraction.summarize(&raw_text).await {
        Ok(summary) => summary,
        Err(error) => {
            error!(
                event_name = "jobs.digest.summarize_failed",
                channel_id = %channel_id,
                error = %error,
                "digest summary failed"
            );
            return report;
        }
    };

    let digest = FeedbackDigest {
        id: Uuid::new_v4().to_string(),
        team_id,
        channel_id: channel_id.to_owned(),
        summary: summary.clone(),
        raw_text,
        message_count: u32::try_from(messages.len()).unwrap_or(u32::MAX),
        created_at: Utc::now(),
    };
    let digest_id = digest.id.clone();
    match services.digests.insert(digest).await {
        Ok(()) => report.digest_id = Some(digest_id),
        Err(error) => {
            error!(
                event_name = "jobs.digest.persist_failed",
                channel_id = %channel_id,
                error = %error,
                "digest not stored"
            );
        }
    }

    info!(
        event_name = "jobs.digest.completed",
        channel_id = %channel_id,
        message_count = report.message_count,
        "digest finished"
    );
    report.summary = summary;
    report
}

/// `[Jan 5, 9:03 AM] (U123): text`, timed by the Slack `ts` when it parses.
pub fn digest_line(message: &SlackMessage) -> String {
    let posted_at = slack_ts_time(&message.message_ts).unwrap_or(message.created_at);
    format!(
        "[{}] ({}): {}",
        posted_at.format("%b %-d, %-I:%M %p"),
        message.user_id,
        message.text
    )
}

fn slack_ts_time(ts: &str) -> Option<DateTime<Utc>> {
    let seconds = ts.split('.').next()?.parse::<i64>().ok()?;
    DateTime::from_timestamp(seconds, 0)
}

/// Starts the in-process schedules. A zero interval disables that job.
pub fn spawn_scheduler(state: AppState, jobs: &JobsConfig) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    if jobs.health_check_interval_secs > 0 {
        let state = Arc::clone(&state);
        let period = StdDuration::from_secs(jobs.health_check_interval_secs);
        handles.push(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                run_health_check(&state).await;
            }
        }));
    }

    match (jobs.digest_interval_secs, jobs.digest_channel_id.clone()) {
        (0, _) => {}
        (secs, Some(channel_id)) => {
            let days = jobs.digest_days;
            let period = StdDuration::from_secs(secs);
            handles.push(tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                loop {
                    ticker.tick().await;
                    run_digest(&state, &channel_id, days).await;
                }
            }));
        }
        (_, None) => {
            warn!(
                event_name = "jobs.scheduler.digest_disabled",
                "digest interval set without jobs.digest_channel_id"
            );
        }
    }

    handles
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use pumi_agent::{LlmError, PromptMode};
    use pumi_core::domain::event::TeamId;
    use pumi_core::domain::records::SlackMessage;
    use pumi_db::repositories::{DigestRepository, MessageRepository};

    use super::{digest_line, run_digest, run_health_check, NO_MESSAGES};
    use crate::testing::{Harness, BOT_TOKEN, HUB_CHANNEL_ID, TEAM_ID};

    fn message(ts: &str, text: &str) -> SlackMessage {
        SlackMessage {
            id: format!("m-{ts}"),
            team_id: TeamId(TEAM_ID.to_owned()),
            channel_id: "CDIGEST".to_owned(),
            user_id: "U7".to_owned(),
            text: text.to_owned(),
            message_ts: ts.to_owned(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn healthy_tokens_are_left_alone() {
        let harness = Harness::installed().await;

        let report = run_health_check(&harness.services).await;

        assert_eq!(report.checked, 1);
        assert_eq!(report.healthy, 1);
        assert!(report.invalidated.is_empty());
        assert_eq!(harness.slack.calls().await.auth_checks, 1);
    }

    #[tokio::test]
    async fn revoked_token_is_invalidated() {
        let harness = Harness::installed().await;
        harness.slack.revoke_token(BOT_TOKEN).await;

        let report = run_health_check(&harness.services).await;

        assert_eq!(report.invalidated, vec![TEAM_ID.to_owned()]);
        let credential =
            harness.services.credentials.get(&harness.team_id()).await.expect("get").expect("row");
        assert!(!credential.is_active());

        let again = run_health_check(&harness.services).await;
        assert_eq!(again.checked, 0);
    }

    #[tokio::test]
    async fn failed_auth_check_posts_the_reinstall_link_to_the_hub() {
        let harness = Harness::installed().await;
        harness.slack.fail_auth_check(BOT_TOKEN).await;

        let report = run_health_check(&harness.services).await;

        assert_eq!(report.invalidated, vec![TEAM_ID.to_owned()]);
        let messages = harness.slack.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel, HUB_CHANNEL_ID);
        assert!(messages[0].text.contains("https://pumi.test/install"));
        assert!(messages[0].text.contains("reinstall the app"));
    }

    #[tokio::test]
    async fn digest_summarizes_and_persists() {
        let harness = Harness::new();
        harness.messages.append(message("1.1", "dark mode please")).await.expect("append");
        harness.messages.append(message("1.2", "exports are slow")).await.expect("append");
        harness.llm.push(Ok("Users want dark mode and faster exports.".to_owned())).await;

        let report = run_digest(&harness.services, "CDIGEST", 7).await;

        assert_eq!(report.message_count, 2);
        assert_eq!(report.summary, "Users want dark mode and faster exports.");
        assert!(report.digest_id.is_some());

        let calls = harness.llm.calls().await;
        assert_eq!(calls[0].0, PromptMode::Summarize);
        assert!(calls[0].1.contains("(U7): dark mode please"));

        let stored = harness
            .digests
            .latest(&harness.team_id(), Some("CDIGEST"))
            .await
            .expect("latest")
            .expect("row");
        assert_eq!(stored.message_count, 2);
        assert_eq!(stored.team_id, harness.team_id());
    }

    #[tokio::test]
    async fn digest_without_messages_skips_the_model() {
        let harness = Harness::new();

        let report = run_digest(&harness.services, "CEMPTY", 7).await;

        assert_eq!(report.summary, NO_MESSAGES);
        assert!(harness.llm.calls().await.is_empty());
    }

    #[tokio::test]
    async fn digest_failure_returns_an_empty_report() {
        let harness = Harness::new();
        harness.messages.append(message("1.1", "hello")).await.expect("append");
        harness.llm.push(Err(LlmError::Transport("down".to_owned()))).await;

        let report = run_digest(&harness.services, "CDIGEST", 7).await;

        assert!(report.summary.is_empty());
        assert_eq!(report.digest_id, None);
        assert!(harness.digests.latest(&harness.team_id(), None).await.expect("latest").is_none());
    }

    #[tokio::test]
    async fn oversized_digest_window_returns_an_empty_report() {
        let harness = Harness::new();
        harness.messages.append(message("1.1", "hello")).await.expect("append");

        let report = run_digest(&harness.services, "CDIGEST", u32::MAX).await;

        assert_eq!(report.message_count, 0);
        assert!(report.summary.is_empty());
        assert!(harness.llm.calls().await.is_empty());
    }

    #[test]
    fn digest_line_times_messages_by_their_slack_ts() {
        // 2024-01-05T21:03:00Z, archived a day later.
        let mut entry = message("1704488580.000200", "ship it");
        entry.created_at = "2024-01-06T08:00:00Z".parse().expect("timestamp");
        assert_eq!(digest_line(&entry), "[Jan 5, 9:03 PM] (U7): ship it");

        let mut fallback = message("not-a-ts", "ship it");
        fallback.created_at = "2024-01-05T09:03:00Z".parse().expect("timestamp");
        assert_eq!(digest_line(&fallback), "[Jan 5, 9:03 AM] (U7): ship it");
    }
}
