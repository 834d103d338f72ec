//! The application facade.
//!
//! # Request flow
//!
//! ```text
//! App::dispatch(req)
//!   ├─ path under a mount prefix? → prefix stripped, sub-app answers
//!   └─ otherwise → common middleware → routing layer
//!                                        ├─ 404 / 405 → error handlers
//!                                        └─ before_dispatch → route → after_dispatch
//! ```
//!
//! Mounted sub-applications bypass the middleware stack entirely.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::error::Error;
use crate::errors::ErrorKind;
use crate::extension::{Capabilities, Extension, Extensions};
use crate::handler::BoxFuture;
use crate::media::Media;
use crate::middleware::{Layer, Pipeline, RoutingLayer};
use crate::pattern::Params;
use crate::redirect::Redirect;
use crate::request::Request;
use crate::response::Response;
use crate::route::RouteBuilder;
use crate::router::UrlResolver;

/// Anything that turns a request into a response: applications, mounted
/// sub-applications, the transport's view of an application.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(&self, req: Request) -> BoxFuture<'_, Result<Response, Error>>;
}

struct Mount {
    prefix: String,
    app: Arc<dyn Dispatch>,
}

/// A web application.
///
/// ```rust
/// use tapa::{App, Config, Flow, Method, Request, StatusCode};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tapa::Error> {
/// let mut app = App::new(Config::default())?;
/// app.route("/items/{item_id:int}").methods(["get"]).name("item").to(|_req, res, p| {
///     Box::pin(async move {
///         res.set_media(&p.int("item_id"))?;
///         Ok(Flow::Done)
///     })
/// })?;
///
/// let res = app.dispatch(Request::new(Method::Get, "/items/42")).await?;
/// assert_eq!(res.status(), StatusCode::OK);
/// assert_eq!(res.body(), b"42");
/// # Ok(())
/// # }
/// ```
pub struct App {
    config: Config,
    pipeline: Pipeline,
    mounts: Vec<Mount>,
    capabilities: Capabilities,
}

impl App {
    /// An application with the built-in extensions.
    pub fn new(config: Config) -> Result<Self, Error> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> AppBuilder {
        AppBuilder::default()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Starts declaring a route. See [`RouteBuilder`].
    pub fn route(&mut self, pattern: &str) -> RouteBuilder<'_> {
        self.pipeline.routing_mut().route(pattern)
    }

    /// Registers an error handler ahead of every existing one.
    pub fn add_error_handler<F>(&mut self, kind: ErrorKind, handler: F)
    where
        F: Fn(&Request, &mut Response, &Error) + Send + Sync + 'static,
    {
        self.pipeline.routing_mut().errors_mut().add(kind, handler);
    }

    pub fn add_middleware(&mut self, layer: Layer) {
        self.pipeline.add(layer);
    }

    /// Serves every path under `prefix` with `app`. The sub-application sees
    /// the path with the prefix removed (`/` when nothing remains).
    pub fn mount(&mut self, prefix: &str, app: impl Dispatch) {
        let prefix = format!("/{}", prefix.trim_matches('/'));
        debug!(prefix = prefix.as_str(), "mounted");
        self.mounts.push(Mount { prefix, app: Arc::new(app) });
    }

    /// Builds the URL of the route called `name`.
    pub fn url_for(&self, name: &str, params: &Params) -> Result<String, Error> {
        self.pipeline.routing().routes().url_for(name, params)
    }

    /// A reverse-lookup handle that stays current as routes are added.
    pub fn url_resolver(&self) -> UrlResolver {
        self.pipeline.routing().routes().resolver()
    }

    /// Answers `redirect` outside a handler, e.g. from middleware.
    pub fn redirect(&self, redirect: Redirect) -> Result<Response, Error> {
        redirect.into_response(&self.url_resolver(), self.media())
    }

    pub fn media(&self) -> &Media {
        self.pipeline.routing().media()
    }

    pub fn media_mut(&mut self) -> &mut Media {
        self.pipeline.routing_mut().media_mut()
    }

    pub fn set_media_type(&mut self, media_type: &str) -> Result<(), Error> {
        self.media_mut().set_type(media_type)
    }

    /// Makes `value` available to [`capability`](Self::capability) lookups.
    pub fn provide<T: Send + Sync + 'static>(&mut self, value: T) {
        self.capabilities.insert(value);
    }

    pub fn capability<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.capabilities.get::<T>()
    }

    /// Handles one request.
    ///
    /// Errors are the ones no error handler accepted, and errors returned by
    /// common middleware.
    pub async fn dispatch(&self, mut req: Request) -> Result<Response, Error> {
        for mount in &self.mounts {
            if let Some(rest) = strip_mount(&mount.prefix, req.path()) {
                let rest = rest.to_owned();
                debug!(prefix = mount.prefix.as_str(), path = rest.as_str(), "delegating to mount");
                req.set_path(rest);
                return mount.app.dispatch(req).await;
            }
        }
        self.pipeline.handle(req).await
    }
}

impl Dispatch for App {
    fn dispatch(&self, req: Request) -> BoxFuture<'_, Result<Response, Error>> {
        Box::pin(App::dispatch(self, req))
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routing", self.pipeline.routing())
            .field("mounts", &self.mounts.iter().map(|m| m.prefix.as_str()).collect::<Vec<_>>())
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// The part of `path` a mount at `prefix` serves, if any. Matches whole
/// segments only: `/api` serves `/api` and `/api/x`, not `/apix`.
fn strip_mount<'p>(prefix: &str, path: &'p str) -> Option<&'p str> {
    if prefix == "/" {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Configures an [`App`] before its extensions run.
pub struct AppBuilder {
    config: Config,
    extensions: Extensions,
    builtins: bool,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self { config: Config::default(), extensions: Extensions::new(), builtins: true }
    }
}

impl AppBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Adds an extension for this application only. Runs after the
    /// built-ins, in the order added.
    pub fn extend(mut self, extension: impl Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Skips the built-in extensions: no host check, static files, CORS,
    /// HSTS or templates unless added explicitly.
    pub fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    /// Builds the application and runs its extensions.
    pub fn build(self) -> Result<App, Error> {
        let media = Media::new(&self.config.media_type)?;
        let mut app = App {
            config: self.config.clone(),
            pipeline: Pipeline::new(RoutingLayer::new(media)),
            mounts: Vec::new(),
            capabilities: Capabilities::default(),
        };

        let mut extensions = if self.builtins { Extensions::builtin() } else { Extensions::new() };
        extensions.append(self.extensions);
        extensions.init(&mut app, &self.config)?;
        Ok(app)
    }
}

impl fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppBuilder")
            .field("config", &self.config)
            .field("extensions", &self.extensions)
            .field("builtins", &self.builtins)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_prefix_matches_whole_segments() {
        assert_eq!(strip_mount("/api", "/api"), Some("/"));
        assert_eq!(strip_mount("/api", "/api/x"), Some("/x"));
        assert_eq!(strip_mount("/api", "/api/"), Some("/"));
        assert_eq!(strip_mount("/api", "/apix"), None);
        assert_eq!(strip_mount("/api", "/other"), None);
        assert_eq!(strip_mount("/", "/anything"), Some("/anything"));
    }

    #[test]
    fn unsupported_media_type_fails_build() {
        let config = Config { media_type: "application/x-nope".to_owned(), ..Config::default() };
        assert!(matches!(App::new(config), Err(Error::UnsupportedMediaType(_))));
    }

    #[test]
    fn redirect_uses_the_app_media() {
        let config = Config { media_type: crate::media::PLAIN_TEXT.to_owned(), ..Config::default() };
        let app = App::new(config).unwrap();
        let mut res = app.redirect(Redirect::to("/elsewhere")).unwrap();
        res.set_media("gone").unwrap();
        assert_eq!(res.header("location"), Some("/elsewhere"));
        assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn builtins_provide_templates() {
        let app = App::new(Config::default()).unwrap();
        assert!(app.capability::<crate::templates::Templates>().is_some());

        let bare = App::builder().without_builtins().build().unwrap();
        assert!(bare.capability::<crate::templates::Templates>().is_none());
    }
}
