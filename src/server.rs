//! hyper transport and graceful shutdown.
//!
//! # Shutdown
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. stops accepting connections,
//! 2. waits for every in-flight connection task to finish,
//! 3. returns from [`Server::serve`].
//!
//! Under an orchestrator, keep the termination grace period longer than the
//! slowest request.
//!
//! # Per request
//!
//! The body is collected in full, the request is converted and handed to the
//! application. Methods tapa does not know are answered `405` before the
//! application sees them. An error that escapes the application is logged and
//! answered `500`; hyper itself never sees an error.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http::request::Parts;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::app::Dispatch;
use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

const DEFAULT_ADDR: &str = "127.0.0.1:8000";

/// The HTTP server.
#[derive(Clone, Copy, Debug)]
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// A server that will listen on `addr` (`host:port`).
    ///
    /// ```rust
    /// use tapa::Server;
    /// assert!(Server::bind("0.0.0.0:3000").is_ok());
    /// assert!(Server::bind("nope").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse().map_err(|_| Error::Addr(addr.to_owned()))?;
        Ok(Self { addr })
    }

    /// `0.0.0.0:$PORT` when `PORT` is set, `127.0.0.1:8000` otherwise.
    pub fn from_env() -> Result<Self, Error> {
        Self::bind(&env_addr(std::env::var("PORT").ok().as_deref()))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves `app` until SIGTERM or Ctrl-C, then drains in-flight
    /// connections.
    pub async fn serve(self, app: impl Dispatch) -> Result<(), Error> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Serves `app` until `signal` resolves, then drains in-flight
    /// connections.
    pub async fn serve_with_shutdown(
        self,
        app: impl Dispatch,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let app: Arc<dyn Dispatch> = Arc::new(app);

        info!(addr = %self.addr, "tapa listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown is checked first so a signal stops accepting even
                // with connections queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // One service per connection, called once per request on it.
                        let svc = service_fn(move |req| handle(Arc::clone(&app), req));

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(%peer, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connections.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("tapa stopped");
        Ok(())
    }
}

fn env_addr(port: Option<&str>) -> String {
    match port {
        Some(port) => format!("0.0.0.0:{port}"),
        None => DEFAULT_ADDR.to_owned(),
    }
}

// ── Request handling ──────────────────────────────────────────────────────────

async fn handle(app: Arc<dyn Dispatch>, req: hyper::Request<Incoming>) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("cannot read request body: {e}");
            return Ok(plain(StatusCode::BAD_REQUEST).into_http());
        }
    };

    let Some(req) = into_request(&parts, body) else {
        debug!(method = %parts.method, "unknown method");
        return Ok(plain(StatusCode::METHOD_NOT_ALLOWED).into_http());
    };

    let res = match app.dispatch(req).await {
        Ok(res) => res,
        Err(err) => {
            error!(method = %parts.method, path = parts.uri.path(), error = %err, "unhandled error");
            plain(StatusCode::INTERNAL_SERVER_ERROR)
        }
    };
    Ok(res.into_http())
}

/// Converts the hyper request head. `None` for a method tapa does not know.
fn into_request(parts: &Parts, body: Bytes) -> Option<Request> {
    let method: Method = parts.method.as_str().parse().ok()?;
    let mut req = Request::new(method, parts.uri.path())
        .with_scheme(parts.uri.scheme_str().unwrap_or("http"))
        .with_body(body);
    if let Some(query) = parts.uri.query() {
        req = req.with_query(query);
    }
    for (name, value) in &parts.headers {
        // Non-UTF-8 header values are dropped.
        if let Ok(value) = value.to_str() {
            req = req.with_header(name.as_str(), value);
        }
    }
    Some(req)
}

fn plain(status: StatusCode) -> Response {
    let mut res = Response::with_status(status);
    res.set_text(status.canonical_reason().unwrap_or_default());
    res
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C. A signal that cannot be
/// listened for is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
