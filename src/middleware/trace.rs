use std::time::Instant;

use tracing::{info, warn};

use super::{Middleware, Next};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Logs one `info` event per request: method, path, status and latency.
///
/// Register it first to time everything else.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn process<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(async move {
            let method = req.method();
            let path = req.path().to_owned();
            let start = Instant::now();
            let result = next.run(req).await;
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
            match &result {
                Ok(res) => info!(%method, path = path.as_str(), status = res.status().as_u16(), latency_ms, "request"),
                Err(err) => warn!(%method, path = path.as_str(), error = %err, latency_ms, "request failed"),
            }
            result
        })
    }
}
