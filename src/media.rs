//! Pluggable response-body serializers.
//!
//! [`Response::set_media`](crate::Response::set_media) hands the value to the
//! serializer registered for the application's active media type. JSON, plain
//! text and HTML are built in; add more with [`Media::register`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Error;

pub const JSON: &str = "application/json";
pub const PLAIN_TEXT: &str = "text/plain";
pub const HTML: &str = "text/html";

/// Turns a JSON value into body bytes for one media type.
pub type Serializer = Arc<dyn Fn(&Value) -> Result<Vec<u8>, Error> + Send + Sync>;

/// The active media type plus the serializer table.
///
/// Cloning is cheap; every response of an application carries a clone.
#[derive(Clone)]
pub struct Media {
    media_type: String,
    handlers: Arc<HashMap<String, Serializer>>,
}

impl Media {
    /// Built-in serializers, with `media_type` active.
    pub fn new(media_type: &str) -> Result<Self, Error> {
        let mut media = Self::default();
        media.set_type(media_type)?;
        Ok(media)
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Switches the active media type. It must have a serializer.
    pub fn set_type(&mut self, media_type: &str) -> Result<(), Error> {
        if !self.handlers.contains_key(media_type) {
            return Err(Error::UnsupportedMediaType(media_type.to_owned()));
        }
        self.media_type = media_type.to_owned();
        Ok(())
    }

    /// Adds or replaces the serializer for `media_type`.
    pub fn register<F>(&mut self, media_type: &str, serializer: F)
    where
        F: Fn(&Value) -> Result<Vec<u8>, Error> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.handlers).insert(media_type.to_owned(), Arc::new(serializer));
    }

    /// Serializes `value` with the active media type.
    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>, Error> {
        match self.handlers.get(&self.media_type) {
            Some(serializer) => serializer(value),
            None => Err(Error::UnsupportedMediaType(self.media_type.clone())),
        }
    }

    /// `content-type` header value for the active media type.
    pub(crate) fn content_type(&self) -> String {
        if self.media_type.starts_with("text/") {
            format!("{}; charset=utf-8", self.media_type)
        } else {
            self.media_type.clone()
        }
    }
}

impl Default for Media {
    fn default() -> Self {
        let mut handlers: HashMap<String, Serializer> = HashMap::new();
        handlers.insert(JSON.to_owned(), Arc::new(to_json));
        handlers.insert(PLAIN_TEXT.to_owned(), Arc::new(to_text));
        handlers.insert(HTML.to_owned(), Arc::new(to_text));
        Self { media_type: JSON.to_owned(), handlers: Arc::new(handlers) }
    }
}

impl fmt::Debug for Media {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().collect();
        types.sort();
        f.debug_struct("Media")
            .field("media_type", &self.media_type)
            .field("handlers", &types)
            .finish()
    }
}

fn to_json(value: &Value) -> Result<Vec<u8>, Error> {
    Ok(serde_json::to_vec(value)?)
}

// Strings go out verbatim; anything else as its JSON text.
fn to_text(value: &Value) -> Result<Vec<u8>, Error> {
    Ok(match value {
        Value::String(s) => s.clone().into_bytes(),
        other => other.to_string().into_bytes(),
    })
}
