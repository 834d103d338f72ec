//! The innermost layer: route lookup, dispatch and error recovery.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::RoutingMiddleware;
use crate::error::{Error, HttpError};
use crate::errors::ErrorHandlers;
use crate::media::Media;
use crate::pattern::Params;
use crate::redirect::Flow;
use crate::request::Request;
use crate::response::Response;
use crate::route::{Route, RouteBuilder};
use crate::router::RouteTable;

/// Finds the route for a request, runs it between the routing middleware
/// callbacks, and turns redirects and errors into responses.
///
/// Lookup misses (`404`) and method mismatches (`405`) go straight to the
/// error handlers: no hook, handler or routing middleware callback runs for
/// them. An error no handler accepts is returned to the caller.
pub struct RoutingLayer {
    routes: RouteTable,
    errors: ErrorHandlers,
    middleware: Vec<Arc<dyn RoutingMiddleware>>,
    media: Media,
}

impl fmt::Debug for RoutingLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingLayer")
            .field("routes", &self.routes)
            .field("errors", &self.errors)
            .field("middleware", &self.middleware.len())
            .field("media", &self.media)
            .finish()
    }
}

impl Default for RoutingLayer {
    fn default() -> Self {
        Self::new(Media::default())
    }
}

impl RoutingLayer {
    /// An empty routing layer with the built-in HTTP error handler.
    pub fn new(media: Media) -> Self {
        Self {
            routes: RouteTable::new(),
            errors: ErrorHandlers::with_defaults(),
            middleware: Vec::new(),
            media,
        }
    }

    pub fn route(&mut self, pattern: &str) -> RouteBuilder<'_> {
        RouteBuilder::new(&mut self.routes, pattern)
    }

    pub fn add(&mut self, middleware: Arc<dyn RoutingMiddleware>) {
        self.middleware.push(middleware);
    }

    pub fn routes(&self) -> &RouteTable { &self.routes }
    pub fn routes_mut(&mut self) -> &mut RouteTable { &mut self.routes }
    pub fn errors(&self) -> &ErrorHandlers { &self.errors }
    pub fn errors_mut(&mut self) -> &mut ErrorHandlers { &mut self.errors }
    pub fn media(&self) -> &Media { &self.media }
    pub fn media_mut(&mut self) -> &mut Media { &mut self.media }

    /// Dispatches one request.
    pub async fn process(&self, req: Request) -> Result<Response, Error> {
        let res = Response::with_media(self.media.clone());
        match self.routes.find(req.path()) {
            None => {
                debug!(method = %req.method(), path = req.path(), "no route");
                self.recover(&req, res, HttpError::not_found().into())
            }
            Some((route, _)) if !route.allows(req.method()) => {
                debug!(method = %req.method(), pattern = route.pattern(), "method not allowed");
                self.recover(&req, res, HttpError::method_not_allowed().into())
            }
            Some((route, params)) => {
                debug!(method = %req.method(), pattern = route.pattern(), "route matched");
                self.dispatch(route, &req, res, &params).await
            }
        }
    }

    async fn dispatch(&self, route: &Route, req: &Request, mut res: Response, params: &Params) -> Result<Response, Error> {
        for m in &self.middleware {
            if let Err(err) = m.before_dispatch(req).await {
                return self.recover(req, res, err);
            }
        }

        let outcome = route.call(req, &mut res, params).await;
        let mut res = match outcome {
            Ok(Flow::Done) => res,
            Ok(Flow::Redirect(redirect)) => match redirect.into_response(&self.routes.resolver(), &self.media) {
                Ok(redirected) => redirected,
                Err(err) => self.recover(req, res, err)?,
            },
            Err(err) => self.recover(req, res, err)?,
        };

        for m in self.middleware.iter().rev() {
            if let Err(err) = m.after_dispatch(req, &mut res).await {
                res = self.recover(req, res, err)?;
            }
        }
        Ok(res)
    }

    fn recover(&self, req: &Request, mut res: Response, err: Error) -> Result<Response, Error> {
        match self.errors.handle(req, &mut res, err) {
            Ok(()) => Ok(res),
            Err(err) => {
                warn!(method = %req.method(), path = req.path(), error = %err, "unhandled error");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::StatusCode;

    use super::*;
    use crate::errors::ErrorKind;
    use crate::handler::BoxFuture;
    use crate::method::Method;
    use crate::redirect::Redirect;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
        tag: &'static str,
        fail_before: bool,
    }

    impl RoutingMiddleware for Recorder {
        fn before_dispatch<'a>(&'a self, _req: &'a Request) -> BoxFuture<'a, Result<(), Error>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("{} before", self.tag));
                if self.fail_before { Err(Error::other(Boom)) } else { Ok(()) }
            })
        }

        fn after_dispatch<'a>(&'a self, _req: &'a Request, res: &'a mut Response) -> BoxFuture<'a, Result<(), Error>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("{} after {}", self.tag, res.status().as_u16()));
                Ok(())
            })
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Arc<Recorder> {
        Arc::new(Recorder { log: Arc::clone(log), tag, fail_before: false })
    }

    fn layer(log: &Arc<Mutex<Vec<String>>>) -> RoutingLayer {
        let mut layer = RoutingLayer::default();
        let handler_log = Arc::clone(log);
        layer
            .route("/home")
            .methods(["get"])
            .to(move |_, res, _| {
                handler_log.lock().unwrap().push("handler".to_owned());
                res.set_text("home");
                Box::pin(async { Ok(Flow::Done) })
            })
            .unwrap();
        layer
    }

    #[tokio::test]
    async fn callbacks_wrap_the_route() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut layer = layer(&log);
        layer.add(recorder(&log, "a"));
        layer.add(recorder(&log, "b"));

        let res = layer.process(Request::new(Method::Get, "/home")).await.unwrap();
        assert_eq!(res.body(), b"home");
        assert_eq!(*log.lock().unwrap(), ["a before", "b before", "handler", "b after 200", "a after 200"]);
    }

    #[tokio::test]
    async fn no_callbacks_on_miss_or_wrong_method() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut layer = layer(&log);
        layer.add(recorder(&log, "a"));

        let res = layer.process(Request::new(Method::Get, "/nope")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = layer.process(Request::new(Method::Post, "/home")).await.unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn before_dispatch_error_goes_to_error_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut layer = layer(&log);
        layer.add(Arc::new(Recorder { log: Arc::clone(&log), tag: "a", fail_before: true }));
        layer.errors_mut().add(ErrorKind::of::<Boom>(), |_: &Request, res: &mut Response, _: &Error| {
            res.set_text("muted");
        });

        let res = layer.process(Request::new(Method::Get, "/home")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body(), b"muted");
        assert_eq!(*log.lock().unwrap(), ["a before"]);
    }

    #[tokio::test]
    async fn redirect_replaces_response() {
        let mut layer = RoutingLayer::default();
        layer.route("/target").name("target").to(|_, _, _| Box::pin(async { Ok(Flow::Done) })).unwrap();
        layer
            .route("/old")
            .to(|_, res, _| {
                res.set_text("discarded");
                Box::pin(async { Ok(Flow::Redirect(Redirect::route("target", Params::new()).permanent())) })
            })
            .unwrap();

        let res = layer.process(Request::new(Method::Get, "/old")).await.unwrap();
        assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.header("location"), Some("/target"));
        assert!(res.body().is_empty());
    }

    struct Stamp;

    impl RoutingMiddleware for Stamp {
        fn after_dispatch<'a>(&'a self, _req: &'a Request, res: &'a mut Response) -> BoxFuture<'a, Result<(), Error>> {
            Box::pin(async move { res.set_media("moved") })
        }
    }

    #[tokio::test]
    async fn redirect_uses_the_layer_media() {
        let mut layer = RoutingLayer::new(Media::new(crate::media::HTML).unwrap());
        layer.add(Arc::new(Stamp));
        layer
            .route("/old")
            .to(|_, _, _| Box::pin(async { Ok(Flow::Redirect(Redirect::to("/new"))) }))
            .unwrap();

        let res = layer.process(Request::new(Method::Get, "/old")).await.unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(res.body(), b"moved");
    }

    #[tokio::test]
    async fn redirect_to_unknown_name_is_not_found() {
        let mut layer = RoutingLayer::default();
        layer
            .route("/old")
            .to(|_, _, _| Box::pin(async { Ok(Flow::Redirect(Redirect::route("gone", Params::new()))) }))
            .unwrap();

        let res = layer.process(Request::new(Method::Get, "/old")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unhandled_error_escapes() {
        let mut layer = RoutingLayer::default();
        layer.route("/fail").to(|_, _, _| Box::pin(async { Err(Error::other(Boom)) })).unwrap();

        let err = layer.process(Request::new(Method::Get, "/fail")).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
