//! Handler, hook and view traits.
//!
//! # How async handlers are stored
//!
//! A route holds a handler and two hook lists of *different* concrete types,
//! so they are stored as trait objects (`Arc<dyn Handler>`). Each call returns
//! a boxed future borrowing the request, the response and the parameters for
//! as long as it runs:
//!
//! ```text
//! |req, res, params| Box::pin(async move { … })   ← user writes this
//!        ↓ app.route("/").to(f)
//! Arc::new(f)  as  Arc<dyn Handler>               ← blanket impl below
//!        ↓
//! handler.call(&req, &mut res, &params).await     ← one vtable dispatch
//! ```
//!
//! Hooks have exactly the handler's shape, so they share the trait. Arguments
//! a hook needs are captured by its closure when it is registered.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{Error, HttpError};
use crate::method::Method;
use crate::pattern::Params;
use crate::redirect::Flow;
use crate::request::Request;
use crate::response::Response;

/// A heap-allocated, type-erased future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What every hook and handler resolves to.
pub type Outcome = Result<Flow, Error>;

/// A route handler or hook.
///
/// Implemented for every closure of the shape
/// `Fn(&Request, &mut Response, &Params) -> BoxFuture<'_, Outcome>`:
///
/// ```rust
/// use tapa::{Flow, Params, Request, Response};
///
/// async fn greet(_req: &Request, res: &mut Response, params: &Params) -> tapa::Outcome {
///     res.set_text(format!("Hello, {}!", params.str("person").unwrap_or("stranger")));
///     Ok(Flow::Done)
/// }
///
/// let mut app = tapa::App::builder().without_builtins().build().unwrap();
/// app.route("/greet/{person}").to(|req, res, params| Box::pin(greet(req, res, params))).unwrap();
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, req: &'a Request, res: &'a mut Response, params: &'a Params) -> BoxFuture<'a, Outcome>;
}

pub(crate) type BoxedHandler = Arc<dyn Handler>;

impl<F> Handler for F
where
    F: for<'a> Fn(&'a Request, &'a mut Response, &'a Params) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, req: &'a Request, res: &'a mut Response, params: &'a Params) -> BoxFuture<'a, Outcome> {
        (self)(req, res, params)
    }
}

/// Pins a closure to the handler signature.
///
/// Closures passed straight to [`RouteBuilder`](crate::RouteBuilder) methods
/// infer their lifetimes from the method bound. Anywhere that takes
/// `impl Handler` instead, wrap the closure in `from_fn` so it gets the same
/// inference.
pub fn from_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a Request, &'a mut Response, &'a Params) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    f
}

// ── Class-based views ─────────────────────────────────────────────────────────

/// One verb's operation on a view.
pub type Operation<V> = for<'a> fn(&'a V, &'a Request, &'a mut Response, &'a Params) -> BoxFuture<'a, Outcome>;

/// A handler with one operation per HTTP verb.
///
/// The view registers its operations in [`operations`](View::operations);
/// the verbs it serves are exactly the ones registered. Registration of the
/// route fails when the view registers nothing, or when the route asks for a
/// verb the view has no operation for. Requests for any other verb are
/// answered `405`.
///
/// ```rust
/// use tapa::{BoxFuture, Flow, Outcome, Params, Request, Response, Verbs, View};
///
/// struct Add;
///
/// impl View for Add {
///     fn operations(verbs: &mut Verbs<Self>) {
///         verbs.get(Self::sum);
///     }
/// }
///
/// impl Add {
///     fn sum<'a>(&'a self, _req: &'a Request, res: &'a mut Response, p: &'a Params) -> BoxFuture<'a, Outcome> {
///         Box::pin(async move {
///             let sum = p.int("x").unwrap_or(0) + p.int("y").unwrap_or(0);
///             res.set_media(&sum)?;
///             Ok(Flow::Done)
///         })
///     }
/// }
///
/// let mut app = tapa::App::builder().without_builtins().build().unwrap();
/// app.route("/add/{x:int}/{y:int}").view(Add).unwrap();
/// assert!(app.route("/sub/{x:int}/{y:int}").methods(["post"]).view(Add).is_err());
/// ```
pub trait View: Sized + Send + Sync + 'static {
    fn operations(verbs: &mut Verbs<Self>);
}

/// The operations a [`View`] implements, keyed by verb.
pub struct Verbs<V> {
    operations: Vec<(Method, Operation<V>)>,
}

impl<V> Verbs<V> {
    fn new() -> Self {
        Self { operations: Vec::new() }
    }

    fn set(&mut self, method: Method, operation: Operation<V>) -> &mut Self {
        match self.operations.iter_mut().find(|(m, _)| *m == method) {
            Some((_, slot)) => *slot = operation,
            None => self.operations.push((method, operation)),
        }
        self
    }

    pub fn get(&mut self, operation: Operation<V>) -> &mut Self {
        self.set(Method::Get, operation)
    }

    pub fn head(&mut self, operation: Operation<V>) -> &mut Self {
        self.set(Method::Head, operation)
    }

    pub fn post(&mut self, operation: Operation<V>) -> &mut Self {
        self.set(Method::Post, operation)
    }

    pub fn put(&mut self, operation: Operation<V>) -> &mut Self {
        self.set(Method::Put, operation)
    }

    pub fn patch(&mut self, operation: Operation<V>) -> &mut Self {
        self.set(Method::Patch, operation)
    }

    pub fn delete(&mut self, operation: Operation<V>) -> &mut Self {
        self.set(Method::Delete, operation)
    }

    pub fn options(&mut self, operation: Operation<V>) -> &mut Self {
        self.set(Method::Options, operation)
    }

    /// Registered verbs, in registration order.
    pub fn methods(&self) -> Vec<Method> {
        self.operations.iter().map(|(m, _)| *m).collect()
    }

    fn find(&self, method: Method) -> Option<Operation<V>> {
        self.operations.iter().find(|(m, _)| *m == method).map(|(_, op)| *op)
    }
}

fn not_allowed<'a>() -> BoxFuture<'a, Outcome> {
    Box::pin(async { Err(Error::from(HttpError::method_not_allowed())) })
}

/// Adapts a [`View`] to [`Handler`] by dispatching on the request method.
pub(crate) struct ViewHandler<V> {
    view: V,
    verbs: Verbs<V>,
}

impl<V: View> ViewHandler<V> {
    pub(crate) fn new(view: V) -> Self {
        let mut verbs = Verbs::new();
        V::operations(&mut verbs);
        Self { view, verbs }
    }

    pub(crate) fn methods(&self) -> Vec<Method> {
        self.verbs.methods()
    }
}

impl<V: View> Handler for ViewHandler<V> {
    fn call<'a>(&'a self, req: &'a Request, res: &'a mut Response, params: &'a Params) -> BoxFuture<'a, Outcome> {
        match self.verbs.find(req.method()) {
            Some(operation) => operation(&self.view, req, res, params),
            None => not_allowed(),
        }
    }
}
