//! Library error type.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Request never produced a response (refused, reset, timed out).
    #[error("simulator request failed: {0}")]
    Transport(String),

    #[error("simulator returned HTTP {status} for {endpoint}")]
    Status { endpoint: &'static str, status: u16 },

    /// Response arrived but the body was not a snapshot.
    #[error("could not decode simulator response: {0}")]
    Decode(String),

    #[error("invalid simulator url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Decode(e.to_string())
        } else {
            Error::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}
