use http::StatusCode;

use super::{Middleware, Next};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

const HSTS: &str = "max-age=31536000; includeSubDomains";

/// Redirects plain HTTP to HTTPS with `307`, and marks HTTPS responses with
/// `strict-transport-security`.
///
/// Behind a proxy the scheme is taken from `x-forwarded-proto`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpsRedirect;

impl HttpsRedirect {
    fn https_url(req: &Request) -> String {
        let host = req.header("host").unwrap_or("localhost");
        let host = host.strip_suffix(":80").unwrap_or(host);
        match req.query() {
            Some(query) => format!("https://{host}{}?{query}", req.path()),
            None => format!("https://{host}{}", req.path()),
        }
    }
}

fn scheme(req: &Request) -> &str {
    req.header("x-forwarded-proto")
        .and_then(|proto| proto.split(',').next())
        .map(str::trim)
        .unwrap_or_else(|| req.scheme())
}

impl Middleware for HttpsRedirect {
    fn process<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(async move {
            if scheme(&req).eq_ignore_ascii_case("http") {
                let mut res = Response::with_status(StatusCode::TEMPORARY_REDIRECT);
                res.set_header("location", Self::https_url(&req));
                return Ok(res);
            }
            let mut res = next.run(req).await?;
            res.set_header("strict-transport-security", HSTS);
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    #[test]
    fn https_url_keeps_path_and_query_and_drops_port_80() {
        let req = Request::new(Method::Get, "/a/b").with_query("x=1").with_header("host", "example.com:80");
        assert_eq!(HttpsRedirect::https_url(&req), "https://example.com/a/b?x=1");
    }

    #[test]
    fn forwarded_proto_wins_over_transport_scheme() {
        let req = Request::new(Method::Get, "/").with_header("x-forwarded-proto", "https, http");
        assert_eq!(scheme(&req), "https");
        assert_eq!(scheme(&Request::new(Method::Get, "/")), "http");
    }
}
