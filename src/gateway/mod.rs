//! Remote mute gateway.
//!
//! The lifecycle only needs three capabilities from the platform; any failure
//! is treated uniformly as "the call did not take effect".

mod http;

use std::future::Future;

use thiserror::Error;

use crate::db::models::MuteKind;

pub use http::{GatewaySettings, HttpMuteGateway};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Platform rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Muted keyword '{0}' is not present on the platform")]
    KeywordNotFound(String),

    #[error("Muted keyword '{0}' matched more than one platform entry")]
    AmbiguousKeyword(String),

    #[error("{0}")]
    Other(String),
}

/// Applies mutes on the remote platform.
///
/// Constructed once by whoever wires up the process and shared by handle.
pub trait MuteGateway: Send + Sync + 'static {
    fn apply_mute(
        &self,
        kind: MuteKind,
        key: &str,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn apply_unmute(
        &self,
        kind: MuteKind,
        key: &str,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Keys currently muted remotely. Diagnostic only.
    fn list_active_mutes(
        &self,
        kind: MuteKind,
    ) -> impl Future<Output = Result<Vec<String>, GatewayError>> + Send;
}
