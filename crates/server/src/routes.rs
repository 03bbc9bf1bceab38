//! HTTP surface: Slack webhooks, the install callback and job triggers.
//!
//! Every Slack webhook is signature-checked against the raw body before it is decoded.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use pumi_core::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use pumi_slack::commands::{parse_command_form, route_command};
use pumi_slack::events::{EventEnvelope, WebhookEvent};
use pumi_slack::interactions::parse_interaction_form;

use crate::commands::{acknowledgment, respond_to_command};
use crate::dispatch::handle_event;
use crate::followup::handle_interaction;
use crate::install::{complete_install, OAuthCallback};
use crate::jobs::{run_digest, run_health_check};
use crate::state::{AppState, Services};

pub const JOB_SECRET_HEADER: &str = "x-pumi-job-secret";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/slack/interactions", post(slack_interactions))
        .route("/slack/commands", post(slack_commands))
        .route("/slack/oauth/callback", get(oauth_callback))
        .route("/jobs/health-check", post(health_check_job))
        .route("/jobs/digest", post(digest_job))
        .with_state(state)
}

fn ok() -> Response {
    Json(json!({ "ok": true })).into_response()
}

fn verify(services: &Services, headers: &HeaderMap, body: &[u8]) -> Result<(), Response> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    services
        .verifier
        .verify(header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER), body, Utc::now())
        .map_err(|error| {
            warn!(
                event_name = "ingress.signature.rejected",
                reason = %error,
                "rejected unsigned or tampered request"
            );
            (StatusCode::UNAUTHORIZED, Json(json!({ "ok": false, "error": "invalid_signature" })))
                .into_response()
        })
}

async fn slack_events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(rejection) = verify(&state, &headers, &body) {
        return rejection;
    }

    let envelope = match serde_json::from_slice::<EventEnvelope>(&body) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(
                event_name = "ingress.events.malformed",
                error = %error,
                "event payload could not be decoded"
            );
            return ok();
        }
    };

    match envelope.into_webhook_event() {
        WebhookEvent::Challenge(challenge) => {
            Json(json!({ "challenge": challenge })).into_response()
        }
        WebhookEvent::Message(event) => {
            info!(
                event_name = "ingress.events.received",
                event_id = %event.event_id,
                team_id = %event.team_id,
                channel_id = %event.channel_id,
                "message event received"
            );
            // Slack redelivers after three seconds, so the pipeline runs detached.
            tokio::spawn(async move {
                handle_event(&state, event).await;
            });
            ok()
        }
        WebhookEvent::Ignored => ok(),
    }
}

async fn slack_interactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = verify(&state, &headers, &body) {
        return rejection;
    }

    let interaction = match parse_interaction_form(&body) {
        Ok(interaction) => interaction,
        Err(error) => {
            warn!(
                event_name = "ingress.interactions.malformed",
                error = %error,
                "interaction payload could not be decoded"
            );
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match handle_interaction(&state, interaction).await {
        Ok(outcome) => {
            info!(
                event_name = "ingress.interactions.handled",
                outcome = ?outcome,
                "interaction handled"
            );
        }
        Err(error) => {
            warn!(
                event_name = "ingress.interactions.failed",
                error = %error,
                "interaction failed"
            );
        }
    }
    // An empty 200 also closes a submitted modal.
    StatusCode::OK.into_response()
}

async fn slack_commands(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(rejection) = verify(&state, &headers, &body) {
        return rejection;
    }

    let payload = match parse_command_form(&body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(
                event_name = "ingress.commands.malformed",
                error = %error,
                "slash command could not be decoded"
            );
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let ack = acknowledgment(route_command(&payload));
    tokio::spawn(async move {
        respond_to_command(&state, payload).await;
    });
    Json(ack).into_response()
}

async fn oauth_callback(
    State(state): State<AppState>,
    Query(callback): Query<OAuthCallback>,
) -> Response {
    match complete_install(&state, callback).await {
        Ok(_) => match state.settings.install_success_url.as_deref() {
            Some(url) => Redirect::to(url).into_response(),
            None => "Pumi is installed. You can close this tab.".into_response(),
        },
        Err(error) => {
            warn!(event_name = "install.failed", error = %error, "install callback failed");
            (StatusCode::BAD_REQUEST, format!("Install failed: {error}")).into_response()
        }
    }
}

fn authorize_job(services: &Services, headers: &HeaderMap) -> Result<(), Response> {
    let Some(secret) = services.settings.trigger_secret.as_ref() else {
        return Ok(());
    };
    let provided =
        headers.get(JOB_SECRET_HEADER).map(|value| value.as_bytes()).unwrap_or_default();
    if secrets_match(provided, secret.expose_secret().as_bytes()) {
        return Ok(());
    }
    warn!(event_name = "jobs.trigger.rejected", "job trigger without a valid secret");
    Err((StatusCode::UNAUTHORIZED, Json(json!({ "ok": false, "error": "unauthorized" })))
        .into_response())
}

fn secrets_match(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        // Spend the same comparison on a length mismatch.
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

async fn health_check_job(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize_job(&state, &headers) {
        return rejection;
    }
    Json(run_health_check(&state).await).into_response()
}

fn bad_request(error: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "ok": false, "error": error }))).into_response()
}

#[derive(Debug, Default, Deserialize)]
struct DigestRequest {
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    days: Option<u32>,
}

async fn digest_job(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(rejection) = authorize_job(&state, &headers) {
        return rejection;
    }

    let request = if body.is_empty() {
        DigestRequest::default()
    } else {
        match serde_json::from_slice::<DigestRequest>(&body) {
            Ok(request) => request,
            Err(error) => return bad_request(&error.to_string()),
        }
    };

    let channel_id = request.channel_id.or_else(|| state.settings.digest_channel_id.clone());
    let Some(channel_id) = channel_id else {
        return bad_request("missing_channel_id");
    };
    let days = request.days.unwrap_or(state.settings.digest_days);
    Json(run_digest(&state, &channel_id, days).await).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use pumi_core::domain::intent::RoutingTarget;
    use pumi_core::flows::FollowUpToken;
    use pumi_core::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
    use pumi_db::repositories::{FlagRepository, InternalFeedbackRepository};
    use pumi_slack::modals::{FLAG_CALLBACK_ID, INPUT_ACTION_ID, REASON_BLOCK_ID};

    use super::{router, secrets_match, JOB_SECRET_HEADER};
    use crate::dispatch::handle_event;
    use crate::state::Settings;
    use crate::testing::{Harness, HUB_CHANNEL_ID, TEAM_ID};

    fn app(harness: &Harness) -> Router {
        router(Arc::clone(&harness.services))
    }

    fn signed(harness: &Harness, uri: &str, content_type: &str, body: String) -> Request<Body> {
        let (timestamp, signature) = harness.sign(body.as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", content_type)
            .header(TIMESTAMP_HEADER, timestamp)
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    fn flag_submission(token: &FollowUpToken) -> String {
        let payload = json!({
            "type": "view_submission",
            "user": { "id": "U2" },
            "team": { "id": TEAM_ID },
            "view": {
                "callback_id": FLAG_CALLBACK_ID,
                "private_metadata": token.encode().expect("encode"),
                "state": { "values": {
                    REASON_BLOCK_ID: {
                        INPUT_ACTION_ID: { "type": "plain_text_input", "value": "Wrong team" }
                    }
                } }
            }
        });
        serde_urlencoded::to_string([("payload", payload.to_string())]).expect("form")
    }

    async fn internal_record(harness: &Harness) -> FollowUpToken {
        harness
            .llm
            .push(Ok(r#"{"summary":"S","tag":"Other","urgency":"Low","nextStep":"N"}"#.to_owned()))
            .await;
        handle_event(&harness.services, harness.event("Ev1", HUB_CHANNEL_ID, "feedback: s")).await;
        let row = harness.internal_feedback.all().await.remove(0);
        FollowUpToken {
            team_id: TEAM_ID.to_owned(),
            channel_id: HUB_CHANNEL_ID.to_owned(),
            target: RoutingTarget::InternalBucket,
            record_id: row.id,
            feedback: Some(row.feedback),
        }
    }

    #[tokio::test]
    async fn url_verification_echoes_the_challenge() {
        let harness = Harness::new();
        let body = json!({ "type": "url_verification", "challenge": "c-123" }).to_string();

        let response = app(&harness)
            .oneshot(signed(&harness, "/slack/events", "application/json", body))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "challenge": "c-123" }));
    }

    #[tokio::test]
    async fn unsigned_event_is_rejected() {
        let harness = Harness::new();
        let request = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .body(Body::from(r#"{"type":"url_verification","challenge":"x"}"#))
            .expect("request");

        let response = app(&harness).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "invalid_signature");
    }

    #[tokio::test]
    async fn stale_signature_is_rejected() {
        let harness = Harness::new();
        let body = r#"{"type":"url_verification","challenge":"x"}"#;
        let stale = (chrono::Utc::now().timestamp() - 600).to_string();
        let signature = harness.services.verifier.sign(&stale, body.as_bytes()).expect("sign");
        let request = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header(TIMESTAMP_HEADER, stale)
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .expect("request");

        let response = app(&harness).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn message_event_is_acknowledged_and_processed_in_background() {
        let harness = Harness::installed().await;
        harness
            .llm
            .push(Ok(r#"{"summary":"S","tag":"Bug","urgency":"Low","nextStep":"N"}"#.to_owned()))
            .await;
        let body = json!({
            "type": "event_callback",
            "team_id": TEAM_ID,
            "event_id": "EvRoute",
            "event": {
                "type": "message",
                "user": "U1",
                "text": "bug: checkout fails",
                "ts": "1700000000.000200",
                "channel": HUB_CHANNEL_ID
            }
        })
        .to_string();

        let response = app(&harness)
            .oneshot(signed(&harness, "/slack/events", "application/json", body))
            .await
            .expect("response");
        assert_eq!(json_body(response).await, json!({ "ok": true }));

        let mut rows = Vec::new();
        for _ in 0..50 {
            rows = harness.internal_feedback.all().await;
            if !rows.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(rows.len(), 1);
        assert!(rows[0].feedback.summary.starts_with("[BUG]"));
    }

    #[tokio::test]
    async fn tampered_interaction_is_rejected_without_mutation() {
        let harness = Harness::installed().await;
        let token = internal_record(&harness).await;
        let body = flag_submission(&token);
        let (timestamp, signature) = harness.sign(body.as_bytes());
        let tampered = body.replace("Wrong+team", "Tampered");
        let request = Request::builder()
            .method("POST")
            .uri("/slack/interactions")
            .header("content-type", "application/x-www-form-urlencoded")
            .header(TIMESTAMP_HEADER, timestamp)
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(tampered))
            .expect("request");

        let response = app(&harness).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(harness.flags.list_for_record(&token.record_id).await.expect("flags").is_empty());
        let row = harness.internal_feedback.find(&token.record_id).await.expect("find");
        assert!(!row.expect("row").flagged);
    }

    #[tokio::test]
    async fn signed_flag_submission_is_recorded() {
        let harness = Harness::installed().await;
        let token = internal_record(&harness).await;

        let response = app(&harness)
            .oneshot(signed(
                &harness,
                "/slack/interactions",
                "application/x-www-form-urlencoded",
                flag_submission(&token),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let flags = harness.flags.list_for_record(&token.record_id).await.expect("flags");
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].reason, "Wrong team");
    }

    #[tokio::test]
    async fn slash_command_acks_ephemerally() {
        let harness = Harness::new();
        let body = serde_urlencoded::to_string([
            ("command", "/pumisummary"),
            ("text", ""),
            ("team_id", TEAM_ID),
            ("channel_id", "C1"),
            ("user_id", "U1"),
            ("response_url", "https://hooks.slack.test/commands/9"),
        ])
        .expect("form");

        let response = app(&harness)
            .oneshot(signed(&harness, "/slack/commands", "application/x-www-form-urlencoded", body))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["response_type"], "ephemeral");
    }

    #[tokio::test]
    async fn oauth_callback_redirects_after_install() {
        let harness = Harness::with_settings(Settings {
            install_success_url: Some("https://pumi.test/installed".to_owned()),
            ..Settings::default()
        });
        let request = Request::builder()
            .uri("/slack/oauth/callback?code=xyz")
            .body(Body::empty())
            .expect("request");

        let response = app(&harness).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "https://pumi.test/installed");
        assert_eq!(harness.services.credentials.list_active().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn oauth_callback_without_code_is_a_bad_request() {
        let harness = Harness::new();
        let request =
            Request::builder().uri("/slack/oauth/callback").body(Body::empty()).expect("request");

        let response = app(&harness).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn job_triggers_require_the_shared_secret_when_configured() {
        let harness = Harness::with_settings(Settings {
            trigger_secret: Some(SecretString::from("s3cret".to_owned())),
            ..Settings::default()
        });

        let denied = app(&harness)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs/health-check")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = app(&harness)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs/health-check")
                    .header(JOB_SECRET_HEADER, "s3cret")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(json_body(allowed).await["checked"], 0);

        let prefix = app(&harness)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs/health-check")
                    .header(JOB_SECRET_HEADER, "s3c")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(prefix.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn secret_comparison_needs_identical_bytes() {
        assert!(secrets_match(b"s3cret", b"s3cret"));
        assert!(!secrets_match(b"s3creT", b"s3cret"));
        assert!(!secrets_match(b"s3cret-longer", b"s3cret"));
        assert!(!secrets_match(b"", b"s3cret"));
    }

    #[tokio::test]
    async fn digest_job_needs_a_channel() {
        let harness = Harness::new();

        let missing = app(&harness)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs/digest")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let response = app(&harness)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs/digest")
                    .body(Body::from(r#"{"channel_id":"CEMPTY","days":3}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["summary"], "No messages to digest");
    }
}
