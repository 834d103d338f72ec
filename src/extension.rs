//! Extensions: setup steps run against every new application.
//!
//! An extension receives the application under construction and the
//! configuration, and may add middleware, mount sub-applications or provide
//! capabilities other code looks up by type. Extensions belong to one
//! application; building a second application never sees them.
//!
//! The built-ins run in this order:
//!
//! | Extension | Reads | Adds |
//! |---|---|---|
//! | `allowed_hosts` | `allowed_hosts` | [`AllowedHosts`] middleware |
//! | `static` | `static_dir`, `static_root` | [`StaticFiles`] mount |
//! | `cors` | `enable_cors`, `cors_config` | [`Cors`] middleware |
//! | `hsts` | `enable_hsts` | [`HttpsRedirect`] middleware |
//! | `templates` | `templates_dir` | [`Templates`] capability |

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::app::App;
use crate::config::Config;
use crate::error::Error;
use crate::middleware::{AllowedHosts, Cors, HttpsRedirect, Layer};
use crate::static_files::StaticFiles;
use crate::templates::Templates;

/// One setup step.
pub trait Extension: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn init(&self, app: &mut App, config: &Config) -> Result<(), Error>;
}

/// An ordered list of extensions.
#[derive(Default)]
pub struct Extensions(Vec<Box<dyn Extension>>);

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in extensions, in their fixed order.
    pub fn builtin() -> Self {
        let mut extensions = Self::new();
        extensions.push(AllowedHostsExtension);
        extensions.push(StaticExtension);
        extensions.push(
            MiddlewareExtension::new("cors", |config: &Config| Layer::common(Cors::new(config.cors_config.clone())))
                .when(|config| config.enable_cors),
        );
        extensions.push(MiddlewareExtension::new("hsts", |_: &Config| Layer::common(HttpsRedirect)).when(|config| config.enable_hsts));
        extensions.push(TemplatesExtension);
        extensions
    }

    pub fn push(&mut self, extension: impl Extension) {
        self.0.push(Box::new(extension));
    }

    pub fn append(&mut self, other: Extensions) {
        self.0.extend(other.0);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|e| e.name())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Runs every extension in order. Stops at the first failure.
    pub fn init(&self, app: &mut App, config: &Config) -> Result<(), Error> {
        for extension in &self.0 {
            debug!(extension = extension.name(), "initializing extension");
            extension.init(app, config)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ── Middleware extension ──────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Gate {
    Always,
    When(fn(&Config) -> bool),
    Flag(&'static str),
}

/// Adds one middleware built from the configuration, optionally only when a
/// setting enables it.
///
/// ```rust
/// use tapa::extension::MiddlewareExtension;
/// use tapa::middleware::{Layer, Trace};
/// use tapa::{App, Config};
///
/// let tracing = MiddlewareExtension::new("trace", |_: &Config| Layer::common(Trace)).on_flag("enable_trace");
/// let config = Config::from_toml_str("enable_trace = true").unwrap();
/// let app = App::builder().config(config).extend(tracing).build().unwrap();
/// # let _ = app;
/// ```
pub struct MiddlewareExtension<F> {
    name: &'static str,
    gate: Gate,
    factory: F,
}

impl<F> MiddlewareExtension<F>
where
    F: Fn(&Config) -> Layer + Send + Sync + 'static,
{
    /// Always adds the middleware.
    pub fn new(name: &'static str, factory: F) -> Self {
        Self { name, gate: Gate::Always, factory }
    }

    /// Adds the middleware only when `enabled` returns true.
    pub fn when(mut self, enabled: fn(&Config) -> bool) -> Self {
        self.gate = Gate::When(enabled);
        self
    }

    /// Adds the middleware only when the boolean setting `key` is `true`.
    pub fn on_flag(mut self, key: &'static str) -> Self {
        self.gate = Gate::Flag(key);
        self
    }

    fn should_use(&self, config: &Config) -> Result<bool, Error> {
        Ok(match self.gate {
            Gate::Always => true,
            Gate::When(enabled) => enabled(config),
            Gate::Flag(key) => config.get::<bool>(key)?.unwrap_or(false),
        })
    }
}

impl<F> Extension for MiddlewareExtension<F>
where
    F: Fn(&Config) -> Layer + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn init(&self, app: &mut App, config: &Config) -> Result<(), Error> {
        if self.should_use(config)? {
            app.add_middleware((self.factory)(config));
        }
        Ok(())
    }
}

// ── Built-ins ─────────────────────────────────────────────────────────────────

struct AllowedHostsExtension;

impl Extension for AllowedHostsExtension {
    fn name(&self) -> &'static str {
        "allowed_hosts"
    }

    fn init(&self, app: &mut App, config: &Config) -> Result<(), Error> {
        app.add_middleware(Layer::common(AllowedHosts::new(config.allowed_hosts.iter().cloned())));
        Ok(())
    }
}

struct StaticExtension;

impl Extension for StaticExtension {
    fn name(&self) -> &'static str {
        "static"
    }

    fn init(&self, app: &mut App, config: &Config) -> Result<(), Error> {
        if let (Some(dir), Some(root)) = (config.static_dir(), config.static_root()) {
            app.mount(root, StaticFiles::new(dir));
        }
        Ok(())
    }
}

struct TemplatesExtension;

impl Extension for TemplatesExtension {
    fn name(&self) -> &'static str {
        "templates"
    }

    fn init(&self, app: &mut App, config: &Config) -> Result<(), Error> {
        let templates = Templates::new(&config.templates_dir, app.url_resolver())?;
        app.provide(templates);
        Ok(())
    }
}

// ── Capabilities ──────────────────────────────────────────────────────────────

/// Values provided by extensions, one per type.
#[derive(Clone, Default)]
pub struct Capabilities(HashMap<TypeId, Arc<dyn Any + Send + Sync>>);

impl Capabilities {
    /// Stores `value`, replacing any earlier value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.0.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.0.get(&TypeId::of::<T>()).cloned().and_then(|v| v.downcast::<T>().ok())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.0.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").field("len", &self.0.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_order() {
        let names: Vec<_> = Extensions::builtin().names().collect();
        assert_eq!(names, ["allowed_hosts", "static", "cors", "hsts", "templates"]);
    }

    #[derive(Debug, PartialEq)]
    struct Counter(u32);

    #[test]
    fn capabilities_are_keyed_by_type() {
        let mut caps = Capabilities::default();
        assert!(caps.get::<Counter>().is_none());
        caps.insert(Counter(1));
        caps.insert(Counter(2));
        caps.insert(String::from("other"));
        assert_eq!(caps.len(), 2);
        assert_eq!(caps.get::<Counter>().as_deref(), Some(&Counter(2)));
        assert!(caps.contains::<String>());
    }

    #[test]
    fn flag_gate_reads_extra_settings() {
        let ext = MiddlewareExtension::new("x", |_: &Config| Layer::common(HttpsRedirect)).on_flag("enable_x");
        assert!(!ext.should_use(&Config::default()).unwrap());
        assert!(ext.should_use(&Config::from_toml_str("enable_x = true").unwrap()).unwrap());
        assert!(ext.should_use(&Config::from_toml_str("enable_x = 3").unwrap()).is_err());
    }
}
