use thiserror::Error;

use crate::db::models::MuteKind;
use crate::gateway::GatewayError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Remote call failed for {kind} '{key}': {source}")]
    RemoteCallFailed {
        kind: MuteKind,
        key: String,
        #[source]
        source: GatewayError,
    },

    #[error("{kind} '{key}' not found")]
    RecordNotFound { kind: MuteKind, key: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{kind} '{key}' is muted remotely but the local record was not saved: {source}")]
    InconsistentState {
        kind: MuteKind,
        key: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Error::Custom(msg.into())
    }

    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn not_found(kind: MuteKind, key: &str) -> Self {
        Error::RecordNotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::RecordNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
