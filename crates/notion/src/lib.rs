//! Per-team external feedback boards kept in Notion.
//!
//! Each workspace gets one database, created lazily on its first external feedback and
//! seeded with example rows. `schema` holds the pure JSON builders, `client` the HTTP
//! implementation and `memory` an in-process double.

pub mod client;
pub mod memory;
pub mod schema;
pub mod store;

pub use client::NotionClient;
pub use memory::InMemoryTeamStore;
pub use store::{CreatedRecord, ExternalTeamStore, NewRecord, NotionError};
