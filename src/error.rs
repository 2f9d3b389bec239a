//! Error taxonomy for backup runs and the settings store.
//!
//! Structural failures (directory creation, authentication at enumeration
//! time, manifest write) abort a run and surface as `Err`. Per-repository
//! failures are classified here but carried as values in
//! [`RepositoryOutcome`](crate::backup::manifest::RepositoryOutcome) so a
//! run can finish with partial results.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or expired token. Fatal to the run.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Named resource absent on the remote side.
    #[error("not found: {0}")]
    NotFound(String),

    /// GitHub signalled throttling. Retry/backoff is the caller's decision.
    #[error("rate limited by GitHub API: {0}")]
    RateLimit(String),

    /// Transport-level failure talking to the API.
    #[error("network error: {0}")]
    Network(String),

    /// Mirror clone subprocess failed. Always a soft, per-repository failure.
    #[error("clone failed: {0}")]
    Clone(String),

    /// Clone destination already exists and overwrite was not requested.
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// Missing or corrupt local encryption key. Encrypted settings are
    /// unrecoverable without the original key file.
    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("settings database error: {0}")]
    Settings(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classify a reqwest transport error.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Network(format!("request timed out: {}", err))
        } else {
            Error::Network(err.to_string())
        }
    }
}
