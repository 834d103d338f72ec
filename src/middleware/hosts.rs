use http::StatusCode;

use super::{Middleware, Next};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Rejects requests whose `host` header is not in the allowed list with
/// `400 Invalid host header`.
///
/// `*` allows every host. `*.example.com` allows any subdomain of
/// `example.com`, but not `example.com` itself. Ports are ignored.
#[derive(Clone, Debug)]
pub struct AllowedHosts {
    hosts: Vec<String>,
    any: bool,
}

impl AllowedHosts {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hosts: Vec<String> = hosts.into_iter().map(|h| h.into().to_ascii_lowercase()).collect();
        let any = hosts.iter().any(|h| h == "*");
        Self { hosts, any }
    }

    pub fn is_allowed(&self, host: &str) -> bool {
        if self.any {
            return true;
        }
        let host = host.split(':').next().unwrap_or_default().to_ascii_lowercase();
        self.hosts.iter().any(|pattern| match pattern.strip_prefix('*') {
            Some(suffix) => host.ends_with(suffix),
            None => *pattern == host,
        })
    }
}

impl Middleware for AllowedHosts {
    fn process<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(async move {
            if self.is_allowed(req.header("host").unwrap_or_default()) {
                return next.run(req).await;
            }
            let mut res = Response::with_status(StatusCode::BAD_REQUEST);
            res.set_text("Invalid host header");
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_allows_everything() {
        let hosts = AllowedHosts::new(["*"]);
        assert!(hosts.is_allowed("anything.test"));
        assert!(hosts.is_allowed(""));
    }

    #[test]
    fn exact_and_wildcard_hosts() {
        let hosts = AllowedHosts::new(["example.com", "*.api.test"]);
        assert!(hosts.is_allowed("example.com"));
        assert!(hosts.is_allowed("Example.COM:8000"));
        assert!(hosts.is_allowed("v1.api.test"));
        assert!(!hosts.is_allowed("api.test"));
        assert!(!hosts.is_allowed("evil.com"));
        assert!(!hosts.is_allowed(""));
    }
}
