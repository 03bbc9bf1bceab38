//! Language-model side of the bot.
//!
//! The model is only ever a translator: it turns free text into a `ParsedFeedback`, a
//! `QueryFilter`, or a digest summary. Everything it returns goes through the strict
//! parsers in `parse` before the rest of the system sees it, and a bad answer is an
//! `ExtractionError`, never a partially filled record.
//!
//! - `llm` holds the provider-neutral `LlmClient` seam and its HTTP implementation
//! - `prompts` holds the fixed instruction templates
//! - `parse` turns completions into domain values
//! - `extraction` ties the three together behind `FeedbackExtraction`

pub mod extraction;
pub mod llm;
pub mod parse;
pub mod prompts;

pub use extraction::{FeedbackExtraction, LlmExtractor};
pub use llm::{CannedLlmClient, HttpLlmClient, LlmClient, LlmError};
pub use prompts::PromptMode;
