//! Outgoing HTTP response type.
//!
//! Dispatch creates one [`Response`] per request and lends it, mutably, to
//! every hook, the handler and every error handler in turn. Nobody returns a
//! response; they write into this one.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;

use crate::error::Error;
use crate::media::Media;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`Response::set_bytes`].
#[derive(Clone, Copy, Debug)]
pub enum ContentType {
    Css,          // text/css
    Csv,          // text/csv
    Html,         // text/html; charset=utf-8
    Javascript,   // text/javascript
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Css         => "text/css",
            Self::Csv         => "text/csv",
            Self::Html        => "text/html; charset=utf-8",
            Self::Javascript  => "text/javascript",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// Starts as `200 OK` with an empty body. Setters replace the body and the
/// `content-type` header together:
///
/// ```rust
/// use tapa::{Response, StatusCode};
///
/// let mut res = Response::new();
/// res.set_status(StatusCode::CREATED);
/// res.set_header("location", "/users/42");
/// res.set_text("created");
/// assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    media: Media,
}

impl Response {
    pub fn new() -> Self {
        Self::with_media(Media::default())
    }

    /// An empty `200 OK` whose [`set_media`](Self::set_media) uses `media`.
    pub fn with_media(media: Media) -> Self {
        Self { status: StatusCode::OK, headers: Vec::new(), body: Vec::new(), media }
    }

    /// An empty response with `status`.
    pub fn with_status(status: StatusCode) -> Self {
        let mut res = Self::new();
        res.status = status;
        res
    }

    /// `301 Moved Permanently` or `302 Found` pointing at `location`.
    pub fn redirect(location: &str, permanent: bool) -> Self {
        Self::redirect_with(Media::default(), location, permanent)
    }

    pub(crate) fn redirect_with(media: Media, location: &str, permanent: bool) -> Self {
        let mut res = Self::with_media(media);
        res.status = if permanent { StatusCode::MOVED_PERMANENTLY } else { StatusCode::FOUND };
        res.set_header("location", location);
        res
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing every existing value under `name`.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_ascii_lowercase(), value.into()));
    }

    /// Adds a header without touching existing values.
    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
    }

    /// Body as `text/plain; charset=utf-8`.
    pub fn set_text(&mut self, body: impl Into<String>) {
        self.set_bytes(ContentType::Text, body.into().into_bytes());
    }

    /// Body as `text/html; charset=utf-8`.
    pub fn set_html(&mut self, body: impl Into<String>) {
        self.set_bytes(ContentType::Html, body.into().into_bytes());
    }

    /// Body serialized with the application's active media type
    /// (JSON unless configured otherwise).
    pub fn set_media<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let value = serde_json::to_value(value)?;
        let body = self.media.serialize(&value)?;
        let content_type = self.media.content_type();
        self.set_raw(&content_type, body);
        Ok(())
    }

    /// Body with an explicit content type.
    pub fn set_bytes(&mut self, content_type: ContentType, body: Vec<u8>) {
        self.set_raw(content_type.as_str(), body);
    }

    /// Body with a content type given as a raw header value.
    pub fn set_raw(&mut self, content_type: &str, body: Vec<u8>) {
        self.set_header("content-type", content_type);
        self.body = body;
    }

    /// Drops the body, keeping headers. Used for `HEAD`.
    pub fn clear_body(&mut self) {
        self.body.clear();
    }

    /// Converts into the `http` crate representation the transport writes.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        match builder.body(Full::new(Bytes::from(self.body))) {
            Ok(res) => res,
            // Only reachable with a header that is not valid on the wire.
            Err(_) => {
                let mut res = http::Response::new(Full::new(Bytes::new()));
                *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                res
            }
        }
    }
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}
