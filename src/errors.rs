//! The error handler chain.
//!
//! Handlers are tried newest first and at most one runs per error. The
//! built-in HTTP error handler is registered when the application is created,
//! so anything registered afterwards outranks it, including a handler for
//! [`ErrorKind::Any`].
//!
//! ```text
//! add(Http, default)   → [Http]
//! add(Any, on_any)     → [Any, Http]
//! add(Status(404), nf) → [Status(404), Any, Http]
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use tracing::debug;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// Which errors an error handler accepts.
///
/// Rust errors have no class hierarchy; `of::<E>()` stands in for "this class
/// or a subclass" by matching any error whose `source()` chain contains an
/// `E`.
#[derive(Clone, Copy)]
pub enum ErrorKind {
    /// Every error.
    Any,
    /// Every structured HTTP error.
    Http,
    /// Structured HTTP errors with this status.
    Status(StatusCode),
    /// Errors of a given type, anywhere in the source chain.
    Type {
        name: &'static str,
        test: fn(&Error) -> bool,
    },
}

impl ErrorKind {
    pub fn of<E: StdError + 'static>() -> Self {
        Self::Type { name: std::any::type_name::<E>(), test: chain_contains::<E> }
    }

    pub fn matches(&self, err: &Error) -> bool {
        match self {
            Self::Any => true,
            Self::Http => err.as_http().is_some(),
            Self::Status(status) => err.as_http().is_some_and(|e| e.status() == *status),
            Self::Type { test, .. } => test(err),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Http => f.write_str("Http"),
            Self::Status(status) => write!(f, "Status({})", status.as_u16()),
            Self::Type { name, .. } => write!(f, "Type({name})"),
        }
    }
}

fn chain_contains<E: StdError + 'static>(err: &Error) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err.inner());
    while let Some(e) = current {
        if e.is::<E>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Writes an error into the response in place.
pub type ErrorHandler = Arc<dyn Fn(&Request, &mut Response, &Error) + Send + Sync>;

/// Ordered `(kind, handler)` pairs, newest first.
#[derive(Clone, Default)]
pub struct ErrorHandlers {
    entries: Vec<(ErrorKind, ErrorHandler)>,
}

impl ErrorHandlers {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain holding only the built-in HTTP error handler.
    pub fn with_defaults() -> Self {
        let mut chain = Self::new();
        chain.add(ErrorKind::Http, handle_http_error);
        chain
    }

    /// Registers `handler` ahead of every existing entry.
    pub fn add<F>(&mut self, kind: ErrorKind, handler: F)
    where
        F: Fn(&Request, &mut Response, &Error) + Send + Sync + 'static,
    {
        self.entries.insert(0, (kind, Arc::new(handler)));
    }

    /// The first entry whose kind matches `err`.
    pub fn resolve(&self, err: &Error) -> Option<(&ErrorKind, &ErrorHandler)> {
        self.entries.iter().find(|(kind, _)| kind.matches(err)).map(|(kind, handler)| (kind, handler))
    }

    /// Runs the resolved handler, or hands `err` back when none matches.
    pub fn handle(&self, req: &Request, res: &mut Response, err: Error) -> Result<(), Error> {
        let Some((kind, handler)) = self.resolve(&err) else {
            return Err(err);
        };
        debug!(?kind, error = %err, "error handled");
        handler(req, res, &err);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ErrorHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(kind, _)| kind)).finish()
    }
}

/// The built-in handler: status from the error, message as a text body.
pub fn handle_http_error(_req: &Request, res: &mut Response, err: &Error) {
    if let Some(http) = err.as_http() {
        res.set_status(http.status());
        res.set_text(http.message());
    }
}
