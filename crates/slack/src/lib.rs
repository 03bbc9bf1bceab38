//! Slack surface of the bot.
//!
//! - `events` decodes Events API webhooks into `InboundEvent`s
//! - `interactions` decodes button clicks and modal submissions
//! - `commands` decodes slash commands
//! - `blocks` and `modals` build Block Kit payloads
//! - `client` is the outbound Web API behind the `SlackApi` trait
//!
//! Request signature checks live in `pumi_core::signature` and run before anything here
//! sees a body.

pub mod blocks;
pub mod client;
pub mod commands;
pub mod events;
pub mod interactions;
pub mod modals;

pub use client::{HttpSlackClient, OutboundMessage, RecordingSlackClient, SlackApi, SlackApiError};
