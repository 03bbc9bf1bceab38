use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use pumi_core::domain::feedback::{ParsedFeedback, QueryFilter};
use pumi_core::errors::ExtractionError;

use crate::llm::{LlmClient, LlmError};
use crate::parse::{parse_feedback, parse_filters};
use crate::prompts::{help_input, PromptMode};

/// Exactly one model request per call. Callers never see a partially parsed value.
#[async_trait]
pub trait FeedbackExtraction: Send + Sync {
    async fn extract(&self, text: &str) -> Result<ParsedFeedback, ExtractionError>;
    async fn to_filters(&self, text: &str) -> Result<QueryFilter, ExtractionError>;
    async fn summarize(&self, text: &str) -> Result<String, ExtractionError>;
    /// Answers a `/help` question from the supplied knowledge-base text.
    async fn answer_help(&self, question: &str, context: &str) -> Result<String, ExtractionError>;
}

#[derive(Clone)]
pub struct LlmExtractor {
    client: Arc<dyn LlmClient>,
}

impl LlmExtractor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    async fn complete(&self, mode: PromptMode, text: &str) -> Result<String, ExtractionError> {
        self.client.complete(mode, text).await.map_err(|error| {
            warn!(
                event_name = "extraction.upstream_failed",
                mode = mode.as_str(),
                error = %error,
                "language model request failed"
            );
            upstream(error)
        })
    }
}

fn upstream(error: LlmError) -> ExtractionError {
    ExtractionError::Upstream(error.to_string())
}

#[async_trait]
impl FeedbackExtraction for LlmExtractor {
    async fn extract(&self, text: &str) -> Result<ParsedFeedback, ExtractionError> {
        let completion = self.complete(PromptMode::Feedback, text).await?;
        let parsed = parse_feedback(&completion)?;
        info!(
            event_name = "extraction.feedback.parsed",
            tag = parsed.tag.as_str(),
            urgency = parsed.urgency.as_str(),
            "feedback extracted"
        );
        Ok(parsed)
    }

    async fn to_filters(&self, text: &str) -> Result<QueryFilter, ExtractionError> {
        let completion = self.complete(PromptMode::Query, text).await?;
        parse_filters(&completion)
    }

    async fn summarize(&self, text: &str) -> Result<String, ExtractionError> {
        let completion = self.complete(PromptMode::Summarize, text).await?;
        let summary = completion.trim();
        if summary.is_empty() {
            return Err(ExtractionError::EmptyCompletion);
        }
        Ok(summary.to_string())
    }

    async fn answer_help(&self, question: &str, context: &str) -> Result<String, ExtractionError> {
        let completion = self.complete(PromptMode::Help, &help_input(context, question)).await?;
        let answer = completion.trim();
        if answer.is_empty() {
            return Err(ExtractionError::EmptyCompletion);
        }
        Ok(answer.to_string())
    }
}
