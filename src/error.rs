// Error types for the release client.
//
// Nothing in the library retries or recovers; every variant is meant to
// bubble up to `main` and end the process.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReleaseError {
    /// A required argument was empty or absent. Raised before any request.
    #[error("missing required value: {0}")]
    MissingField(&'static str),

    /// The service answered with a non-success status.
    #[error("request failed with status {status}: {body}")]
    Transport { status: u16, body: String },

    /// The asset file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to parse response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("cannot parse remote url: {0}")]
    InvalidRemoteUrl(String),
}

impl ReleaseError {
    /// HTTP status carried by a transport failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ReleaseError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReleaseError>;
