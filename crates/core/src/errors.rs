use thiserror::Error;

/// Failure to turn model output into structured data. Never leaves a partial record behind.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("language model request failed: {0}")]
    Upstream(String),
    #[error("language model returned an empty completion")]
    EmptyCompletion,
    #[error("model output is not a JSON object: {0}")]
    MalformedOutput(String),
    #[error("model output is missing field `{0}`")]
    MissingField(&'static str),
    #[error("model output field `{field}` has invalid value `{value}`")]
    InvalidField { field: &'static str, value: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("database operation failed: {0}")]
    Database(String),
    #[error("external store operation failed: {0}")]
    ExternalStore(String),
    #[error("chat platform call failed: {0}")]
    Messaging(String),
    #[error("stored credential could not be decrypted")]
    Credential,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing request header `{0}`")]
    MissingHeader(&'static str),
    #[error("request timestamp is not a unix timestamp")]
    MalformedTimestamp,
    #[error("request timestamp is outside the accepted window")]
    StaleTimestamp,
    #[error("request signature is malformed")]
    MalformedSignature,
    #[error("request signature does not match")]
    Mismatch,
}

/// Outcome taxonomy for one inbound event. Everything except `Signature` is acknowledged to the
/// chat platform as success so it does not redeliver.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("event `{event_id}` was already processed")]
    DuplicateEvent { event_id: String },
    #[error("no usable credential for team `{team_id}`")]
    MissingCredential { team_id: String },
    #[error("message is not addressed to the bot")]
    ClassificationMiss,
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateEvent { .. } => "duplicate_event",
            Self::MissingCredential { .. } => "missing_credential",
            Self::ClassificationMiss => "classification_miss",
            Self::Extraction(_) => "extraction_error",
            Self::Storage(_) => "storage_error",
            Self::Signature(_) => "signature_error",
        }
    }

    /// Benign outcomes short-circuit silently.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::DuplicateEvent { .. } | Self::MissingCredential { .. } | Self::ClassificationMiss
        )
    }

    /// Text shown in the originating channel, if the user should hear about it at all.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::Extraction(_) => {
                Some(":warning: I couldn't make sense of that right now. Please try again later.")
            }
            Self::Storage(_) => {
                Some(":x: Something went wrong while saving your feedback. Please try again later.")
            }
            _ => None,
        }
    }
}
