//! Unified error type.

use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;

/// The error type returned by tapa's fallible operations.
///
/// Hooks, handlers and middleware return it too. At dispatch time it is fed
/// to the error handler chain (see [`ErrorHandlers`](crate::ErrorHandlers)),
/// which turns it into a response or lets it escape to the transport.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A structured HTTP error: a status code and an optional message.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A route could not be declared. Raised at registration time, never
    /// while serving requests.
    #[error("invalid route `{pattern}`: {reason}")]
    Route { pattern: String, reason: String },

    /// Reverse URL generation was missing a placeholder value.
    #[error("cannot build url for `{pattern}`: missing parameter `{param}`")]
    MissingParam { pattern: String, param: String },

    /// Reverse URL generation got a value its placeholder would not match.
    #[error("cannot build url for `{pattern}`: `{value}` is not a valid `{param}`")]
    InvalidParam { pattern: String, param: String, value: String },

    #[error("unknown HTTP method `{0}`")]
    UnknownMethod(String),

    #[error("unsupported media type `{0}`")]
    UnsupportedMediaType(String),

    #[error("invalid socket address `{0}`")]
    Addr(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("template: {0}")]
    Template(#[from] tera::Error),

    /// Any application error.
    #[error(transparent)]
    Other(Box<dyn StdError + Send + Sync + 'static>),
}

impl Error {
    /// Wraps an application error.
    pub fn other(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }

    pub(crate) fn route(pattern: &str, reason: impl Into<String>) -> Self {
        Self::Route { pattern: pattern.to_owned(), reason: reason.into() }
    }

    /// Returns the structured HTTP error, if this is one.
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(e) => Some(e),
            _ => None,
        }
    }

    /// The error this variant wraps, or `self` for variants that wrap nothing.
    ///
    /// [`ErrorKind::of`](crate::ErrorKind::of) walks the `source()` chain
    /// starting here.
    pub(crate) fn inner(&self) -> &(dyn StdError + 'static) {
        match self {
            Self::Http(e) => e,
            Self::Io(e) => e,
            Self::Config(e) => e,
            Self::Serialize(e) => e,
            Self::Template(e) => e,
            Self::Other(e) => &**e,
            _ => self,
        }
    }
}

/// A controlled failure carrying an HTTP status and an optional message.
///
/// Return it from a handler (`Err(HttpError::new(StatusCode::FORBIDDEN).into())`)
/// and the default error handler writes the status and message to the
/// response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpError {
    status: StatusCode,
    detail: Option<String>,
}

impl HttpError {
    pub fn new(status: StatusCode) -> Self {
        Self { status, detail: None }
    }

    pub fn with_detail(status: StatusCode, detail: impl Into<String>) -> Self {
        Self { status, detail: Some(detail.into()) }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// The detail message, or the canonical reason phrase.
    pub fn message(&self) -> &str {
        self.detail
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self.status),
            None => write!(f, "{}", self.status),
        }
    }
}

impl StdError for HttpError {}
