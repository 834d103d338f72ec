//! Static file sub-application.

use std::io;
use std::path::{Path, PathBuf};

use http::StatusCode;
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::app::Dispatch;
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// Serves the files under one directory.
///
/// Mount it under a prefix; the built-in static extension does this with the
/// `static_dir` and `static_root` settings. Only `GET` and `HEAD` are
/// answered. Paths containing `..` or hidden (dot-prefixed) segments, and
/// anything that is not a regular file, are `404`.
#[derive(Clone, Debug)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a request path to a file under the root. Segments are
    /// percent-decoded before they are checked.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let mut file = self.root.clone();
        let mut segments = 0;
        for raw in path.split('/').filter(|s| !s.is_empty()) {
            let segment = percent_decode_str(raw).decode_utf8().ok()?;
            if segment.starts_with('.') || segment.contains(['/', '\\', '\0']) {
                return None;
            }
            file.push(&*segment);
            segments += 1;
        }
        (segments > 0).then_some(file)
    }

    async fn serve(&self, req: Request) -> Result<Response, Error> {
        let method = req.method();
        if !matches!(method, Method::Get | Method::Head) {
            let mut res = plain(StatusCode::METHOD_NOT_ALLOWED);
            res.set_header("allow", "GET, HEAD");
            return Ok(res);
        }

        let Some(file) = self.resolve(req.path()) else {
            return Ok(plain(StatusCode::NOT_FOUND));
        };
        let body = match tokio::fs::metadata(&file).await {
            Ok(meta) if meta.is_file() => tokio::fs::read(&file).await?,
            Ok(_) => return Ok(plain(StatusCode::NOT_FOUND)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(plain(StatusCode::NOT_FOUND)),
            Err(e) => return Err(e.into()),
        };
        debug!(file = %file.display(), bytes = body.len(), "static file");

        let mime = mime_guess::from_path(&file).first_or_octet_stream();
        let mut res = Response::new();
        let length = body.len();
        res.set_raw(mime.as_ref(), body);
        if method == Method::Head {
            res.clear_body();
            res.set_header("content-length", length.to_string());
        }
        Ok(res)
    }
}

fn plain(status: StatusCode) -> Response {
    let mut res = Response::with_status(status);
    res.set_text(status.canonical_reason().unwrap_or_default());
    res
}

impl Dispatch for StaticFiles {
    fn dispatch(&self, req: Request) -> BoxFuture<'_, Result<Response, Error>> {
        Box::pin(self.serve(req))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
        fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        dir
    }

    #[tokio::test]
    async fn serves_files_with_guessed_type() {
        let dir = site();
        let files = StaticFiles::new(dir.path());
        let res = files.dispatch(Request::new(Method::Get, "/css/site.css")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.header("content-type"), Some("text/css"));
        assert_eq!(res.body(), b"body{}");
    }

    #[tokio::test]
    async fn head_has_no_body() {
        let dir = site();
        let files = StaticFiles::new(dir.path());
        let res = files.dispatch(Request::new(Method::Head, "/css/site.css")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.body().is_empty());
        assert_eq!(res.header("content-length"), Some("6"));
    }

    #[tokio::test]
    async fn hidden_traversal_and_directories_are_not_found() {
        let dir = site();
        let files = StaticFiles::new(dir.path().join("css"));
        for path in ["/../.env", "/.env", "/", "/missing.js"] {
            let res = files.dispatch(Request::new(Method::Get, path)).await.unwrap();
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{path}");
        }
        let files = StaticFiles::new(dir.path());
        let res = files.dispatch(Request::new(Method::Get, "/css")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn encoded_names_are_decoded_and_checked() {
        let dir = site();
        fs::write(dir.path().join("read me.txt"), "hi").unwrap();
        let files = StaticFiles::new(dir.path().join("css"));

        let res = files.dispatch(Request::new(Method::Get, "/site%2Ecss")).await.unwrap();
        assert_eq!(res.body(), b"body{}");

        for path in ["/%2E%2E/.env", "/%2e%2e%2F.env", "/..%2F.env", "/%2Eenv", "/%FF"] {
            let res = files.dispatch(Request::new(Method::Get, path)).await.unwrap();
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{path}");
        }

        let res = StaticFiles::new(dir.path()).dispatch(Request::new(Method::Get, "/read%20me.txt")).await.unwrap();
        assert_eq!(res.body(), b"hi");
    }

    #[tokio::test]
    async fn other_methods_are_not_allowed() {
        let dir = site();
        let res = StaticFiles::new(dir.path())
            .dispatch(Request::new(Method::Post, "/css/site.css"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("allow"), Some("GET, HEAD"));
    }
}
