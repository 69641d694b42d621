//! Client errors
//!
//! Every public operation returns [`Result`]. Service errors are relayed as
//! [`Status`] without translation; everything else is classified with a
//! canonical [`Code`] so retry policies can treat all failures uniformly.

use super::status::{Code, Status};
use crate::iot::path::PathError;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Status(#[from] Status),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("authentication failed: {0}")]
    Auth(#[from] gcp_auth::Error),
    #[error("failed to encode or decode message: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("invalid client configuration: {0}")]
    Config(String),
    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),
}

impl Error {
    /// Canonical code for this failure
    pub fn code(&self) -> Code {
        match self {
            Error::Status(status) => status.code,
            Error::Transport(e) if e.is_timeout() => Code::DeadlineExceeded,
            Error::Transport(e) if e.is_connect() => Code::Unavailable,
            Error::Transport(e) if e.is_decode() || e.is_body() => Code::Internal,
            Error::Transport(_) => Code::Unknown,
            Error::Auth(_) => Code::Unauthenticated,
            Error::Serialization(_) => Code::Internal,
            Error::Path(_) | Error::Config(_) => Code::InvalidArgument,
            Error::Timeout(_) => Code::DeadlineExceeded,
        }
    }

    /// The service status, when the failure came from the service
    pub fn status(&self) -> Option<&Status> {
        match self {
            Error::Status(status) => Some(status),
            _ => None,
        }
    }
}

/// Short actionable hint for a failure, for command-line output
pub fn error_hint(error: &Error) -> Option<&'static str> {
    match error.code() {
        Code::Unauthenticated => {
            Some("Run 'gcloud auth application-default login' or pass --access-token.")
        }
        Code::PermissionDenied => Some("Check the IAM permissions of the active account."),
        Code::FailedPrecondition => {
            Some("The device may not be connected or subscribed to the command topic.")
        }
        Code::ResourceExhausted => Some("Rate limit exceeded. Please try again later."),
        Code::Unavailable => Some("The service is temporarily unavailable. Please try again."),
        _ => None,
    }
}
