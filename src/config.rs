//! Application configuration.
//!
//! Every key is optional. A TOML file only needs the settings it changes:
//!
//! ```toml
//! media_type    = "application/json"
//! allowed_hosts = ["example.com", "*.example.com"]
//! enable_cors   = true
//! static_dir    = "assets"
//!
//! [cors_config]
//! allow_origins = ["https://example.com"]
//! allow_methods = ["GET", "POST"]
//!
//! # Unknown keys are kept for third-party extensions.
//! [sessions]
//! secret = "…"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::media;

/// Settings read by the application and its extensions.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Media type used by [`Response::set_media`](crate::Response::set_media).
    pub media_type: String,
    /// Host names the application answers to. `*` allows any host,
    /// `*.example.com` any subdomain of `example.com`.
    pub allowed_hosts: Vec<String>,
    pub enable_cors: bool,
    pub cors_config: CorsConfig,
    /// Redirect plain HTTP to HTTPS and send `strict-transport-security`.
    pub enable_hsts: bool,
    /// Directory of static files. Empty disables static file serving.
    pub static_dir: Option<String>,
    /// URL prefix static files are served under. Falls back to `static_dir`.
    pub static_root: Option<String>,
    pub templates_dir: String,
    /// Keys no built-in extension reads.
    #[serde(flatten)]
    pub extra: HashMap<String, toml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media_type: media::JSON.to_owned(),
            allowed_hosts: vec!["*".to_owned()],
            enable_cors: false,
            cors_config: CorsConfig::default(),
            enable_hsts: false,
            static_dir: Some("static".to_owned()),
            static_root: Some("static".to_owned()),
            templates_dir: "templates".to_owned(),
            extra: HashMap::new(),
        }
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self, Error> {
        Ok(toml::from_str(source)?)
    }

    /// Reads a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reads an extension's own setting. `Ok(None)` when the key is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        self.extra
            .get(key)
            .map(|value| T::deserialize(value.clone()))
            .transpose()
            .map_err(Error::from)
    }

    /// The static directory, unless static serving is disabled.
    pub fn static_dir(&self) -> Option<&str> {
        self.static_dir.as_deref().filter(|dir| !dir.is_empty())
    }

    /// The static URL prefix: `static_root`, else the static directory.
    pub fn static_root(&self) -> Option<&str> {
        self.static_root
            .as_deref()
            .filter(|root| !root.is_empty())
            .or_else(|| self.static_dir())
    }
}

/// Cross-origin resource sharing settings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins. `*` allows any origin.
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    /// Seconds a preflight answer may be cached.
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            allow_methods: vec!["GET".to_owned()],
            allow_headers: Vec::new(),
            expose_headers: Vec::new(),
            allow_credentials: false,
            max_age: 600,
        }
    }
}
