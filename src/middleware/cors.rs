use http::StatusCode;

use super::{Middleware, Next};
use crate::config::CorsConfig;
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// Cross-origin resource sharing.
///
/// Requests without an `origin` header pass through untouched. Preflight
/// requests (`OPTIONS` with `access-control-request-method`) are answered
/// here and never reach the application; a disallowed origin or method gets
/// `400`. Other cross-origin responses get the allow/expose headers.
#[derive(Clone, Debug)]
pub struct Cors {
    config: CorsConfig,
    any_origin: bool,
    any_header: bool,
}

impl Cors {
    pub fn new(config: CorsConfig) -> Self {
        let any_origin = config.allow_origins.iter().any(|o| o == "*");
        let any_header = config.allow_headers.iter().any(|h| h == "*");
        Self { config, any_origin, any_header }
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        self.any_origin || self.config.allow_origins.iter().any(|o| o == origin)
    }

    fn method_allowed(&self, method: &str) -> bool {
        self.config.allow_methods.iter().any(|m| m == "*" || m.eq_ignore_ascii_case(method))
    }

    /// Value of `access-control-allow-origin` for an allowed `origin`.
    fn allow_origin<'o>(&self, origin: &'o str) -> &'o str {
        if self.any_origin && !self.config.allow_credentials { "*" } else { origin }
    }

    fn preflight(&self, req: &Request, origin: &str, method: &str) -> Response {
        let mut failures = Vec::new();
        if !self.origin_allowed(origin) {
            failures.push("origin");
        }
        if !self.method_allowed(method) {
            failures.push("method");
        }
        if !failures.is_empty() {
            let mut res = Response::with_status(StatusCode::BAD_REQUEST);
            res.set_text(format!("Disallowed CORS {}", failures.join(", ")));
            return res;
        }

        let mut res = Response::new();
        res.set_header("access-control-allow-origin", self.allow_origin(origin));
        if !self.any_origin || self.config.allow_credentials {
            res.append_header("vary", "origin");
        }
        res.set_header("access-control-allow-methods", self.config.allow_methods.join(", "));
        let requested = req.header("access-control-request-headers").unwrap_or_default();
        if self.any_header && !requested.is_empty() {
            res.set_header("access-control-allow-headers", requested);
        } else if !self.config.allow_headers.is_empty() {
            res.set_header("access-control-allow-headers", self.config.allow_headers.join(", "));
        }
        res.set_header("access-control-max-age", self.config.max_age.to_string());
        if self.config.allow_credentials {
            res.set_header("access-control-allow-credentials", "true");
        }
        res
    }

    fn decorate(&self, res: &mut Response, origin: &str) {
        if !self.origin_allowed(origin) {
            return;
        }
        res.set_header("access-control-allow-origin", self.allow_origin(origin));
        if !self.any_origin || self.config.allow_credentials {
            res.append_header("vary", "origin");
        }
        if self.config.allow_credentials {
            res.set_header("access-control-allow-credentials", "true");
        }
        if !self.config.expose_headers.is_empty() {
            res.set_header("access-control-expose-headers", self.config.expose_headers.join(", "));
        }
    }
}

impl Middleware for Cors {
    fn process<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(async move {
            let Some(origin) = req.header("origin").map(str::to_owned) else {
                return next.run(req).await;
            };
            if req.method() == Method::Options {
                if let Some(method) = req.header("access-control-request-method") {
                    return Ok(self.preflight(&req, &origin, method));
                }
            }
            let mut res = next.run(req).await?;
            self.decorate(&mut res, &origin);
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cors(origins: &[&str], methods: &[&str]) -> Cors {
        Cors::new(CorsConfig {
            allow_origins: origins.iter().map(|s| s.to_string()).collect(),
            allow_methods: methods.iter().map(|s| s.to_string()).collect(),
            ..CorsConfig::default()
        })
    }

    fn preflight(origin: &str, method: &str) -> Request {
        Request::new(Method::Options, "/")
            .with_header("origin", origin)
            .with_header("access-control-request-method", method)
    }

    #[test]
    fn preflight_for_allowed_origin() {
        let cors = cors(&["https://a.test"], &["GET", "POST"]);
        let req = preflight("https://a.test", "POST");
        let res = cors.preflight(&req, "https://a.test", "POST");
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.header("access-control-allow-origin"), Some("https://a.test"));
        assert_eq!(res.header("access-control-allow-methods"), Some("GET, POST"));
        assert_eq!(res.header("access-control-max-age"), Some("600"));
    }

    #[test]
    fn preflight_rejects_origin_and_method() {
        let cors = cors(&["https://a.test"], &["GET"]);
        let req = preflight("https://b.test", "DELETE");
        let res = cors.preflight(&req, "https://b.test", "DELETE");
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(res.body(), b"Disallowed CORS origin, method");
    }

    #[test]
    fn wildcard_origin_without_credentials_answers_star() {
        let cors = cors(&["*"], &["GET"]);
        let mut res = Response::new();
        cors.decorate(&mut res, "https://whoever.test");
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        assert_eq!(res.header("vary"), None);
    }

    #[test]
    fn disallowed_origin_gets_no_headers() {
        let cors = cors(&["https://a.test"], &["GET"]);
        let mut res = Response::new();
        cors.decorate(&mut res, "https://b.test");
        assert_eq!(res.header("access-control-allow-origin"), None);
    }
}
