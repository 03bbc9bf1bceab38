use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use pumi_core::config::NotionConfig;
use pumi_core::domain::feedback::{FeedbackRecord, ParsedFeedback, QueryFilter};

use crate::schema::{build_filter, database_schema, feedback_properties, parse_page, record_page, seed_examples};
use crate::store::{CreatedRecord, ExternalTeamStore, NewRecord, NotionError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const PAGE_SIZE: u32 = 100;
/// Upper bound on query pages fetched for one chat answer.
const MAX_QUERY_PAGES: usize = 5;

#[derive(Clone, Debug)]
pub struct NotionClient {
    client: reqwest::Client,
    base_url: String,
    parent_page_id: String,
}

impl NotionClient {
    pub fn from_config(config: &NotionConfig) -> Result<Self, NotionError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
            .map_err(|error| NotionError::Config(format!("invalid api key header value: {error}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            "Notion-Version",
            HeaderValue::from_str(&config.api_version)
                .map_err(|error| NotionError::Config(format!("invalid api version: {error}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| NotionError::Config(format!("failed to build http client: {error}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            parent_page_id: config.parent_page_id.clone(),
        })
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, NotionError> {
        let mut request = self.client.request(method, format!("{}/{path}", self.base_url));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response =
            request.send().await.map_err(|error| NotionError::Transport(error.to_string()))?;

        let status = response.status();
        debug!(event_name = "notion.api.response", path, status = status.as_u16(), "notion answered");
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        if status == StatusCode::NOT_FOUND {
            return Err(NotionError::NotFound(path.to_owned()));
        }
        if !status.is_success() {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_owned();
            return Err(NotionError::Api { status: status.as_u16(), message });
        }
        Ok(payload)
    }
}

fn object_id(payload: &Value) -> Result<String, NotionError> {
    payload
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| NotionError::Decode("response has no id".to_owned()))
}

#[async_trait]
impl ExternalTeamStore for NotionClient {
    async fn create_database(&self, team_name: &str) -> Result<String, NotionError> {
        let payload = self
            .send(Method::POST, "databases", Some(database_schema(team_name, &self.parent_page_id)))
            .await?;
        let database_id = object_id(&payload)?;
        info!(event_name = "notion.database.created", database_id = %database_id, "feedback board created");
        Ok(database_id)
    }

    async fn archive_database(&self, database_id: &str) -> Result<(), NotionError> {
        self.send(Method::DELETE, &format!("blocks/{database_id}"), None).await?;
        info!(event_name = "notion.database.archived", database_id, "feedback board archived");
        Ok(())
    }

    async fn seed_examples(&self, database_id: &str) -> Result<(), NotionError> {
        for feedback in seed_examples() {
            let body = json!({
                "parent": { "database_id": database_id },
                "properties": feedback_properties(&feedback),
            });
            self.send(Method::POST, "pages", Some(body)).await?;
        }
        Ok(())
    }

    async fn create_record(
        &self,
        database_id: &str,
        record: &NewRecord,
    ) -> Result<CreatedRecord, NotionError> {
        let payload = self.send(Method::POST, "pages", Some(record_page(database_id, record))).await?;
        Ok(CreatedRecord {
            id: object_id(&payload)?,
            url: payload.get("url").and_then(Value::as_str).map(str::to_owned),
        })
    }

    async fn update_record(
        &self,
        record_id: &str,
        feedback: &ParsedFeedback,
    ) -> Result<(), NotionError> {
        let body = json!({ "properties": feedback_properties(feedback) });
        self.send(Method::PATCH, &format!("pages/{record_id}"), Some(body)).await?;
        Ok(())
    }

    async fn query_records(
        &self,
        database_id: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<FeedbackRecord>, NotionError> {
        let path = format!("databases/{database_id}/query");
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_QUERY_PAGES {
            let mut body = json!({
                "page_size": PAGE_SIZE,
                "sorts": [{ "timestamp": "created_time", "direction": "descending" }],
            });
            if let Some(filter) = build_filter(filter) {
                body["filter"] = filter;
            }
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let payload = self.send(Method::POST, &path, Some(body)).await?;
            let results = payload.get("results").and_then(Value::as_array).cloned().unwrap_or_default();
            let before = records.len();
            records.extend(results.iter().filter_map(parse_page));
            if records.len() - before < results.len() {
                warn!(event_name = "notion.query.skipped_pages", database_id, "some pages could not be decoded");
            }

            cursor = payload
                .get("has_more")
                .and_then(Value::as_bool)
                .filter(|has_more| *has_more)
                .and_then(|_| payload.get("next_cursor").and_then(Value::as_str))
                .map(str::to_owned);
            if cursor.is_none() {
                break;
            }
        }

        Ok(records)
    }
}
