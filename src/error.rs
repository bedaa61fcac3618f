use std::path::PathBuf;

use reqwest::StatusCode;

use crate::endpoint::{Direction, Mode};
use crate::range::TransferRange;

/// Errors that abort a chunked transfer.
///
/// Every variant is terminal for the whole transfer; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("connection timed out on range {range}")]
    ConnectTimeout { range: TransferRange },

    #[error("bad request ({status}) on range {range}, the remote file may not exist")]
    BadRequest {
        status: StatusCode,
        range: TransferRange,
    },

    #[error("malformed Content-Range header: {0}")]
    MalformedRangeHeader(String),

    #[error("{mode} mode is not available for {direction}")]
    UnsupportedMode { direction: Direction, mode: Mode },

    #[error("no usable file name in path: {}", .0.display())]
    InvalidFilename(PathBuf),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    /// Maps a transport failure on `range`, singling out timeouts.
    pub(crate) fn from_request(err: reqwest::Error, range: TransferRange) -> Self {
        if err.is_timeout() {
            Self::ConnectTimeout { range }
        } else {
            Self::Http(err)
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
