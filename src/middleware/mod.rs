//! Middleware layer.
//!
//! Two kinds of middleware, declared explicitly with [`Layer`]:
//!
//! - **Common** middleware ([`Middleware`]) wraps the whole pipeline. It sees
//!   every request, routed or not, and decides whether and how to call the
//!   next layer inward. The first one registered is the outermost.
//! - **Routing** middleware ([`RoutingMiddleware`]) runs inside the routing
//!   layer, only for requests that matched a route accepting their method.
//!   `before_dispatch` hooks run in registration order, `after_dispatch`
//!   hooks in reverse.
//!
//! ```text
//! request → Common₁ → Common₂ → ┌ routing layer ─────────────────────────┐
//!                               │ lookup → before_dispatch₁,₂ → route    │
//!                               │        ← after_dispatch₂,₁ ← response  │
//! response ← Common₁ ← Common₂ ←└────────────────────────────────────────┘
//! ```

mod cors;
mod hosts;
mod https;
mod routing;
mod trace;

use std::sync::Arc;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

pub use cors::Cors;
pub use hosts::AllowedHosts;
pub use https::HttpsRedirect;
pub use routing::RoutingLayer;
pub use trace::Trace;

/// Middleware wrapping the whole request/response cycle.
///
/// ```rust
/// use tapa::middleware::{Middleware, Next};
/// use tapa::{BoxFuture, Error, Request, Response};
///
/// struct PoweredBy;
///
/// impl Middleware for PoweredBy {
///     fn process<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Error>> {
///         Box::pin(async move {
///             let mut res = next.run(req).await?;
///             res.set_header("x-powered-by", "tapa");
///             Ok(res)
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn process<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Error>>;
}

/// Middleware observing routed requests from inside the routing layer.
///
/// Errors from either callback go through the application's error handlers,
/// just like errors from a handler.
pub trait RoutingMiddleware: Send + Sync + 'static {
    fn before_dispatch<'a>(&'a self, _req: &'a Request) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async { Ok(()) })
    }

    fn after_dispatch<'a>(&'a self, _req: &'a Request, _res: &'a mut Response) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async { Ok(()) })
    }
}

/// Which layer a middleware joins.
#[derive(Clone)]
pub enum Layer {
    Routing(Arc<dyn RoutingMiddleware>),
    Common(Arc<dyn Middleware>),
}

impl Layer {
    pub fn routing(middleware: impl RoutingMiddleware) -> Self {
        Self::Routing(Arc::new(middleware))
    }

    pub fn common(middleware: impl Middleware) -> Self {
        Self::Common(Arc::new(middleware))
    }
}

/// The rest of the pipeline, from one common middleware's point of view.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    routing: &'a RoutingLayer,
}

impl<'a> Next<'a> {
    /// Passes `req` to the next middleware inward, or to the routing layer.
    pub fn run(self, req: Request) -> BoxFuture<'a, Result<Response, Error>> {
        match self.chain.split_first() {
            Some((first, rest)) => first.process(req, Next { chain: rest, routing: self.routing }),
            None => Box::pin(self.routing.process(req)),
        }
    }
}

/// Common middleware stack around the routing layer.
pub struct Pipeline {
    routing: RoutingLayer,
    common: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new(routing: RoutingLayer) -> Self {
        Self { routing, common: Vec::new() }
    }

    pub fn add(&mut self, layer: Layer) {
        match layer {
            Layer::Routing(m) => self.routing.add(m),
            Layer::Common(m) => self.common.push(m),
        }
    }

    pub fn routing(&self) -> &RoutingLayer {
        &self.routing
    }

    pub fn routing_mut(&mut self) -> &mut RoutingLayer {
        &mut self.routing
    }

    /// Runs `req` through every common middleware and the routing layer.
    pub async fn handle(&self, req: Request) -> Result<Response, Error> {
        Next { chain: &self.common, routing: &self.routing }.run(req).await
    }
}
