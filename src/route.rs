//! Routes and the registrar that declares them.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, HttpError};
use crate::handler::{BoxFuture, BoxedHandler, Handler, Outcome, View, ViewHandler};
use crate::method::Method;
use crate::pattern::{Params, Pattern};
use crate::redirect::Flow;
use crate::request::Request;
use crate::response::Response;
use crate::router::RouteTable;

/// A pattern bound to a handler, the methods it accepts, an optional name and
/// its hooks.
///
/// Calling a route runs, strictly in order: the method check, every before
/// hook, the handler, every after hook. The first error, or the first
/// [`Flow::Redirect`], ends the run and is returned unchanged.
pub struct Route {
    pattern: Pattern,
    methods: Vec<Method>,
    name: Option<String>,
    handler: BoxedHandler,
    before: Vec<BoxedHandler>,
    after: Vec<BoxedHandler>,
}

impl Route {
    /// Builds a route accepting `methods`, or every method when `None`.
    pub fn new(
        pattern: &str,
        handler: impl Handler,
        methods: Option<Vec<Method>>,
        name: Option<String>,
    ) -> Result<Self, Error> {
        let methods = match methods {
            None => Method::ALL.to_vec(),
            Some(m) if m.is_empty() => return Err(Error::route(pattern, "empty method list")),
            Some(mut m) => {
                let mut seen = Vec::with_capacity(m.len());
                m.retain(|method| {
                    let fresh = !seen.contains(method);
                    seen.push(*method);
                    fresh
                });
                m
            }
        };
        Ok(Self {
            pattern: Pattern::compile(pattern)?,
            methods,
            name,
            handler: Arc::new(handler),
            before: Vec::new(),
            after: Vec::new(),
        })
    }

    /// Builds a route from a class-based view. Without `methods` the route
    /// accepts every verb the view implements; with `methods`, each one must
    /// have an operation.
    pub fn from_view(
        pattern: &str,
        view: impl View,
        methods: Option<Vec<Method>>,
        name: Option<String>,
    ) -> Result<Self, Error> {
        let handler = ViewHandler::new(view);
        let implemented = handler.methods();
        if implemented.is_empty() {
            return Err(Error::route(pattern, "view implements no methods"));
        }
        let methods = match methods {
            None => implemented,
            Some(requested) => {
                if let Some(verb) = requested.iter().find(|m| !implemented.contains(m)) {
                    return Err(Error::route(pattern, format!("view has no operation for {verb}")));
                }
                requested
            }
        };
        Self::new(pattern, handler, Some(methods), name)
    }

    pub fn pattern(&self) -> &str { self.pattern.as_str() }
    pub fn methods(&self) -> &[Method] { &self.methods }
    pub fn name(&self) -> Option<&str> { self.name.as_deref() }

    pub fn allows(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    /// Matches the whole of `path`.
    pub fn matches(&self, path: &str) -> Option<Params> {
        self.pattern.matches(path)
    }

    /// Builds this route's URL from `params`.
    pub fn url(&self, params: &Params) -> Result<String, Error> {
        self.pattern.url(params)
    }

    pub fn add_before(&mut self, hook: impl Handler) {
        self.before.push(Arc::new(hook));
    }

    pub fn add_after(&mut self, hook: impl Handler) {
        self.after.push(Arc::new(hook));
    }

    /// Runs the route for one request.
    pub async fn call(&self, req: &Request, res: &mut Response, params: &Params) -> Outcome {
        if !self.allows(req.method()) {
            return Err(HttpError::method_not_allowed().into());
        }
        for hook in &self.before {
            if let redirect @ Flow::Redirect(_) = hook.call(req, res, params).await? {
                return Ok(redirect);
            }
        }
        if let redirect @ Flow::Redirect(_) = self.handler.call(req, res, params).await? {
            return Ok(redirect);
        }
        for hook in &self.after {
            if let redirect @ Flow::Redirect(_) = hook.call(req, res, params).await? {
                return Ok(redirect);
            }
        }
        Ok(Flow::Done)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern.as_str())
            .field("methods", &self.methods)
            .field("name", &self.name)
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

// ── Registrar ─────────────────────────────────────────────────────────────────

/// Declares one route. Obtained from [`App::route`](crate::App::route);
/// finished by [`to`](RouteBuilder::to) or [`view`](RouteBuilder::view).
///
/// ```rust
/// # use tapa::{App, Flow, Method};
/// let mut app = App::builder().without_builtins().build().unwrap();
/// app.route("/greet/{person}")
///     .methods(["post"])
///     .name("greet")
///     .before(|_req, res, _p| { res.set_header("x-hooked", "1"); Box::pin(async { Ok(Flow::Done) }) })
///     .to(|_req, res, p| Box::pin(async move {
///         res.set_text(format!("Hello, {}!", p.str("person").unwrap_or_default()));
///         Ok(Flow::Done)
///     }))
///     .unwrap();
/// ```
#[must_use = "a route is only registered by `to` or `view`"]
pub struct RouteBuilder<'t> {
    table: &'t mut RouteTable,
    pattern: String,
    methods: Option<Vec<String>>,
    name: Option<String>,
    before: Vec<BoxedHandler>,
    after: Vec<BoxedHandler>,
}

impl<'t> RouteBuilder<'t> {
    pub(crate) fn new(table: &'t mut RouteTable, pattern: &str) -> Self {
        Self {
            table,
            pattern: pattern.to_owned(),
            methods: None,
            name: None,
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    /// Accepted methods, case-insensitive. Every method when never called,
    /// or every verb the view implements for [`view`](Self::view).
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.methods = Some(methods.into_iter().map(|m| m.as_ref().to_owned()).collect());
        self
    }

    /// A unique name, for [`App::url_for`](crate::App::url_for) and
    /// [`Redirect::route`](crate::Redirect::route).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Appends a hook that runs before the handler. Hooks run in the order
    /// they are added.
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a Request, &'a mut Response, &'a Params) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
    {
        self.before.push(Arc::new(hook));
        self
    }

    /// Appends a hook that runs after the handler.
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a Request, &'a mut Response, &'a Params) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
    {
        self.after.push(Arc::new(hook));
        self
    }

    /// Registers the route with a function handler.
    pub fn to<F>(self, handler: F) -> Result<(), Error>
    where
        F: for<'a> Fn(&'a Request, &'a mut Response, &'a Params) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
    {
        let methods = self.parsed_methods()?;
        let route = Route::new(&self.pattern, handler, methods, self.name.clone())?;
        self.register(route)
    }

    /// Registers the route with a class-based view.
    pub fn view(self, view: impl View) -> Result<(), Error> {
        let methods = self.parsed_methods()?;
        let route = Route::from_view(&self.pattern, view, methods, self.name.clone())?;
        self.register(route)
    }

    /// Registers the route with any [`Handler`] implementation.
    pub fn handler(self, handler: impl Handler) -> Result<(), Error> {
        let methods = self.parsed_methods()?;
        let route = Route::new(&self.pattern, handler, methods, self.name.clone())?;
        self.register(route)
    }

    fn parsed_methods(&self) -> Result<Option<Vec<Method>>, Error> {
        self.methods
            .as_ref()
            .map(Method::parse_list)
            .transpose()
            .map_err(|e| Error::route(&self.pattern, e.to_string()))
    }

    fn register(self, mut route: Route) -> Result<(), Error> {
        route.before = self.before;
        route.after = self.after;
        self.table.register(route)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::StatusCode;

    use super::*;
    use crate::handler::{Verbs, from_fn};

    fn noop<'a>(_: &'a Request, _: &'a mut Response, _: &'a Params) -> BoxFuture<'a, Outcome> {
        Box::pin(async { Ok(Flow::Done) })
    }

    #[test]
    fn methods_default_to_all_and_dedup() {
        let route = Route::new("/", noop, None, None).unwrap();
        assert_eq!(route.methods(), Method::ALL);

        let methods = Method::parse_list(["get", "GET", "post"]).ok();
        let route = Route::new("/", noop, methods, None).unwrap();
        assert_eq!(route.methods(), [Method::Get, Method::Post]);
    }

    #[test]
    fn empty_method_list_is_rejected() {
        let err = Route::new("/", noop, Some(vec![]), None);
        assert!(matches!(err, Err(Error::Route { .. })));
    }

    #[tokio::test]
    async fn hooks_and_handler_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let push = |tag: &'static str| {
            let log = Arc::clone(&log);
            from_fn(move |_, _, _| {
                log.lock().unwrap().push(tag);
                Box::pin(async { Ok(Flow::Done) })
            })
        };

        let mut route = Route::new("/", push("handler"), None, None).unwrap();
        route.add_before(push("before-1"));
        route.add_before(push("before-2"));
        route.add_after(push("after"));

        let flow = route
            .call(&Request::new(Method::Get, "/"), &mut Response::new(), &Params::new())
            .await
            .unwrap();
        assert_eq!(flow, Flow::Done);
        assert_eq!(*log.lock().unwrap(), ["before-1", "before-2", "handler", "after"]);
    }

    #[tokio::test]
    async fn redirect_from_handler_skips_after_hooks() {
        let mut route = Route::new(
            "/",
            from_fn(|_, _, _| Box::pin(async { Ok(Flow::Redirect(crate::Redirect::to("/elsewhere"))) })),
            None,
            None,
        )
        .unwrap();
        route.add_after(from_fn(|_, res, _| {
            res.set_header("x-after", "ran");
            Box::pin(async { Ok(Flow::Done) })
        }));

        let mut res = Response::new();
        let flow = route.call(&Request::new(Method::Get, "/"), &mut res, &Params::new()).await.unwrap();
        assert!(matches!(flow, Flow::Redirect(_)));
        assert_eq!(res.header("x-after"), None);
    }

    #[tokio::test]
    async fn disallowed_method_runs_nothing() {
        let called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&called);
        let mut route = Route::new("/", noop, Some(vec![Method::Get]), None).unwrap();
        route.add_before(from_fn(move |_, _, _| {
            *flag.lock().unwrap() = true;
            Box::pin(async { Ok(Flow::Done) })
        }));

        let err = route
            .call(&Request::new(Method::Put, "/"), &mut Response::new(), &Params::new())
            .await
            .unwrap_err();
        assert_eq!(err.as_http().map(HttpError::status), Some(StatusCode::METHOD_NOT_ALLOWED));
        assert!(!*called.lock().unwrap());
    }

    struct Echo;

    impl View for Echo {
        fn operations(verbs: &mut Verbs<Self>) {
            verbs.get(Self::read).put(Self::write);
        }
    }

    impl Echo {
        fn read<'a>(&'a self, _: &'a Request, res: &'a mut Response, _: &'a Params) -> BoxFuture<'a, Outcome> {
            Box::pin(async move { res.set_text("get"); Ok(Flow::Done) })
        }

        fn write<'a>(&'a self, _: &'a Request, res: &'a mut Response, _: &'a Params) -> BoxFuture<'a, Outcome> {
            Box::pin(async move { res.set_text("put"); Ok(Flow::Done) })
        }
    }

    struct Nothing;

    impl View for Nothing {
        fn operations(_: &mut Verbs<Self>) {}
    }

    #[tokio::test]
    async fn view_dispatches_on_method() {
        let route = Route::from_view("/echo", Echo, None, None).unwrap();
        assert_eq!(route.methods(), [Method::Get, Method::Put]);

        let mut res = Response::new();
        route.call(&Request::new(Method::Put, "/echo"), &mut res, &Params::new()).await.unwrap();
        assert_eq!(res.body(), b"put");

        let err = route
            .call(&Request::new(Method::Post, "/echo"), &mut Response::new(), &Params::new())
            .await
            .unwrap_err();
        assert_eq!(err.as_http().map(HttpError::status), Some(StatusCode::METHOD_NOT_ALLOWED));
    }

    #[test]
    fn views_are_validated_at_registration() {
        assert!(matches!(Route::from_view("/", Nothing, None, None), Err(Error::Route { .. })));

        let missing = Route::from_view("/", Echo, Some(vec![Method::Get, Method::Post]), None);
        assert!(matches!(missing, Err(Error::Route { reason, .. }) if reason.contains("POST")));

        let narrowed = Route::from_view("/", Echo, Some(vec![Method::Put]), None).unwrap();
        assert_eq!(narrowed.methods(), [Method::Put]);
    }
}
