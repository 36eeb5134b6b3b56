use std::{fmt, sync::Arc};

use reqwest::StatusCode;

/// Boxed error produced by a [`Transport`](crate::Transport) implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The attempt did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,
    /// Non-success HTTP status code.
    ///
    /// `message` is taken from the `message` field of a JSON error body when
    /// present, otherwise it is `"Request failed"`.
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    /// The refresh callback failed, produced no usable token, or the server
    /// kept rejecting the refreshed credential.
    #[error("Token refresh failed or unauthorized access")]
    AuthRefresh {
        #[source]
        source: RefreshError,
    },
    /// Network or request execution error from the transport.
    #[error("network error: {0}")]
    Network(#[source] BoxError),
    /// Response body did not match its declared content type.
    #[error("decode error: {0}")]
    Decode(String),
    /// Request body could not be serialized to JSON.
    #[error("encode error: {0}")]
    Encode(String),
    /// A caller supplied header name or value is not valid HTTP.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    /// The transport observed cancellation of the attempt.
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns `true` when the executor may spend a retry on this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Http { .. } | Self::Network(_) | Self::Decode(_) | Self::Cancelled
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn auth(source: RefreshError) -> Self {
        Self::AuthRefresh { source }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(Box::new(err))
        }
    }
}

/// Outcome of a failed token refresh.
///
/// Cloning shares the underlying value, so every caller queued behind one
/// refresh observes the very same error (see [`RefreshError::is_same`]).
#[derive(Clone)]
pub struct RefreshError {
    inner: Arc<RefreshErrorInner>,
}

struct RefreshErrorInner {
    message: String,
    source: Option<BoxError>,
}

impl RefreshError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RefreshErrorInner {
                message: message.into(),
                source: None,
            }),
        }
    }

    /// Wraps an arbitrary error raised by a refresh callback.
    pub fn from_source(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self {
            inner: Arc::new(RefreshErrorInner {
                message: source.to_string(),
                source: Some(source),
            }),
        }
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }

    /// Returns `true` when both values originate from the same failure.
    pub fn is_same(&self, other: &RefreshError) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshError")
            .field("message", &self.inner.message)
            .finish()
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.message)
    }
}

impl std::error::Error for RefreshError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner
            .source
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}
