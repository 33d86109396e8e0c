//! Error types for remote stream operations.

use std::io;

use thiserror::Error;

/// Result type alias for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Boxed transport error, kept as the source of [`StreamError::Connectivity`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while probing or reading a remote resource.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Transport-level failure (timeout, DNS, connection reset).
    #[error("Network error: {0}")]
    Connectivity(#[source] BoxError),

    /// The server does not honor byte-range requests.
    #[error("Remote server does not support Range requests: {reason}")]
    UnsupportedRange {
        /// What the probe observed
        reason: String,
    },

    /// The resource size could not be determined.
    #[error("Remote server did not return a usable Content-Length for {url}")]
    AmbiguousSize {
        /// URL that was probed
        url: String,
    },

    /// Unexpected status code for a request.
    #[error("Unexpected HTTP status {status} for {request}")]
    ServerProtocol {
        /// HTTP status code
        status: u16,
        /// The request that failed, e.g. `bytes=0-99`
        request: String,
    },

    /// The stream was closed.
    #[error("I/O operation on closed stream")]
    Closed,

    /// Malformed arguments to `seek`.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl StreamError {
    /// Wrap any transport error as a connectivity failure.
    pub fn connectivity<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Connectivity(err.into())
    }

    /// Whether the stream can no longer be used after this error.
    ///
    /// Construction failures and [`StreamError::Closed`] are fatal. Fetch
    /// failures and bad arguments only fail the call that raised them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::UnsupportedRange { .. } | Self::AmbiguousSize { .. }
        )
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        Self::Connectivity(Box::new(err))
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        let kind = match &err {
            StreamError::Connectivity(_) => io::ErrorKind::ConnectionAborted,
            StreamError::UnsupportedRange { .. } => io::ErrorKind::Unsupported,
            StreamError::AmbiguousSize { .. } | StreamError::ServerProtocol { .. } => {
                io::ErrorKind::InvalidData
            }
            StreamError::Closed => io::ErrorKind::BrokenPipe,
            StreamError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, err)
    }
}
