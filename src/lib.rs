//! # tapa
//!
//! A small async web framework. Routes, hooks, error handlers, middleware
//! and extensions, on top of hyper.
//!
//! ## What a request goes through
//!
//! - **Mounts.** A path under a mounted prefix goes to the sub-application
//!   (static files, another [`App`], anything implementing [`Dispatch`]).
//! - **Common middleware.** Wraps everything else, outermost first.
//! - **Routing.** Routes are tried in registration order; the first pattern
//!   that matches wins. Placeholders are typed (`{id:int}`, `{rest:path}`) and
//!   a failed conversion is simply a non-match.
//! - **Route.** Method check, before hooks, handler, after hooks. Any of them
//!   may stop the run with an error or a [`Redirect`].
//! - **Error handlers.** Newest first, at most one per error. An error nobody
//!   handles escapes to the transport, which answers `500`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tapa::{App, Config, ErrorKind, Flow, Redirect, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tapa::Error> {
//!     let mut app = App::new(Config::default())?;
//!
//!     app.route("/").name("home").to(|_req, res, _p| {
//!         res.set_text("hello");
//!         Box::pin(async { Ok(Flow::Done) })
//!     })?;
//!
//!     app.route("/items/{item_id:int}").methods(["get"]).to(|_req, res, p| {
//!         Box::pin(async move {
//!             res.set_media(&serde_json::json!({ "id": p.int("item_id") }))?;
//!             Ok(Flow::Done)
//!         })
//!     })?;
//!
//!     app.route("/old").to(|_req, _res, _p| {
//!         Box::pin(async { Ok(Flow::Redirect(Redirect::route("home", Default::default()).permanent())) })
//!     })?;
//!
//!     app.add_error_handler(ErrorKind::Status(StatusCode::NOT_FOUND), |_req, res, _err| {
//!         res.set_status(StatusCode::NOT_FOUND);
//!         res.set_html("<h1>Nothing here</h1>");
//!     });
//!
//!     Server::from_env()?.serve(app).await
//! }
//! ```

mod app;
mod config;
mod error;
mod errors;
mod handler;
mod media;
mod method;
mod pattern;
mod redirect;
mod request;
mod response;
mod route;
mod router;
mod server;
mod static_files;
mod templates;

pub mod extension;
pub mod middleware;

pub use app::{App, AppBuilder, Dispatch};
pub use config::{Config, CorsConfig};
pub use error::{Error, HttpError};
pub use errors::{ErrorHandler, ErrorHandlers, ErrorKind, handle_http_error};
pub use extension::{Extension, Extensions};
pub use handler::{BoxFuture, Handler, Operation, Outcome, Verbs, View, from_fn};
pub use http::StatusCode;
pub use media::Media;
pub use method::Method;
pub use pattern::{Param, Params, Pattern};
pub use redirect::{Flow, Redirect};
pub use request::Request;
pub use response::{ContentType, Response};
pub use route::{Route, RouteBuilder};
pub use router::{RouteTable, UrlResolver};
pub use server::Server;
pub use static_files::StaticFiles;
pub use templates::Templates;

/// Template context, re-exported from tera.
pub use tera::Context;

/// Media type names with a built-in serializer.
pub mod media_types {
    pub use crate::media::{HTML, JSON, PLAIN_TEXT};
}
