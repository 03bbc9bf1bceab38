pub mod classifier;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod signature;

pub use classifier::classify;
pub use crypto::{CipherError, TokenCipher};
pub use domain::event::{EventId, InboundEvent, ProcessedEventRecord, TeamId};
pub use domain::feedback::{
    DateRange, FeedbackRecord, FeedbackTag, ParsedFeedback, QueryFilter, Urgency, BUG_MARKER,
};
pub use domain::intent::{Command, Intent, RoutingTarget};
pub use domain::records::{
    FeedbackDigest, FeedbackFlag, FeedbackKind, InternalFeedback, SlackMessage,
};
pub use domain::team::{NotionDatabaseLink, TeamCredential};
pub use errors::{ExtractionError, PipelineError, SignatureError, StorageError};
pub use flows::{FollowUpEvent, FollowUpFlow, FollowUpState, FollowUpToken};
pub use signature::RequestVerifier;
