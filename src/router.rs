//! The route table.
//!
//! Routes are kept in registration order and tried one after another; the
//! first whose pattern matches wins. There is no specificity ranking: a
//! catch-all registered early shadows every more specific pattern registered
//! after it. Register specific patterns first.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::{Error, HttpError};
use crate::pattern::Params;
use crate::route::Route;

/// Ordered pattern → route mapping, plus the name index.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    names: UrlResolver,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `route`.
    ///
    /// A route whose pattern is already registered replaces the old one in
    /// place, keeping its position. A name already owned by a different
    /// pattern is rejected.
    pub fn register(&mut self, route: Route) -> Result<(), Error> {
        if let Some(name) = route.name() {
            if let Some(owner) = self.names.get(name) {
                if owner.pattern() != route.pattern() {
                    return Err(Error::route(
                        route.pattern(),
                        format!("name `{name}` is already used by `{}`", owner.pattern()),
                    ));
                }
            }
        }

        let route = Arc::new(route);
        match self.routes.iter().position(|r| r.pattern() == route.pattern()) {
            Some(i) => {
                let old = std::mem::replace(&mut self.routes[i], Arc::clone(&route));
                if let Some(old_name) = old.name() {
                    self.names.remove(old_name);
                }
                debug!(pattern = route.pattern(), "route replaced");
            }
            None => self.routes.push(Arc::clone(&route)),
        }
        if let Some(name) = route.name() {
            self.names.insert(name.to_owned(), Arc::clone(&route));
        }
        Ok(())
    }

    /// The first route, in registration order, whose pattern matches `path`.
    pub fn find(&self, path: &str) -> Option<(&Arc<Route>, Params)> {
        self.routes.iter().find_map(|route| route.matches(path).map(|params| (route, params)))
    }

    /// Looks a route up by name. Unknown names are a 404.
    pub fn by_name(&self, name: &str) -> Result<Arc<Route>, Error> {
        self.names.get(name).ok_or_else(|| HttpError::not_found().into())
    }

    /// Builds the URL of the route called `name`.
    pub fn url_for(&self, name: &str, params: &Params) -> Result<String, Error> {
        self.names.url_for(name, params)
    }

    /// A shared handle on the name index, for reverse lookups made outside
    /// the table (templates, redirects).
    pub fn resolver(&self) -> UrlResolver {
        self.names.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Name → route index, shared by clones.
///
/// The table writes to it during setup; templates and redirects read from it
/// while serving.
#[derive(Clone, Default)]
pub struct UrlResolver(Arc<RwLock<HashMap<String, Arc<Route>>>>);

impl UrlResolver {
    /// Builds the URL of the route called `name`. Unknown names are a 404.
    pub fn url_for(&self, name: &str, params: &Params) -> Result<String, Error> {
        let route = self.get(name).ok_or_else(|| Error::from(HttpError::not_found()))?;
        route.url(params)
    }

    fn get(&self, name: &str) -> Option<Arc<Route>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    fn insert(&self, name: String, route: Arc<Route>) {
        self.0.write().unwrap_or_else(PoisonError::into_inner).insert(name, route);
    }

    fn remove(&self, name: &str) {
        self.0.write().unwrap_or_else(PoisonError::into_inner).remove(name);
    }
}

impl fmt::Debug for UrlResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.0.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = names.keys().cloned().collect();
        names.sort();
        f.debug_tuple("UrlResolver").field(&names).finish()
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::handler::{BoxFuture, Outcome};
    use crate::pattern::Param;
    use crate::redirect::Flow;
    use crate::request::Request;
    use crate::response::Response;

    fn noop<'a>(_: &'a Request, _: &'a mut Response, _: &'a Params) -> BoxFuture<'a, Outcome> {
        Box::pin(async { Ok(Flow::Done) })
    }

    fn route(pattern: &str, name: Option<&str>) -> Route {
        Route::new(pattern, noop, None, name.map(str::to_owned)).unwrap()
    }

    #[test]
    fn find_returns_route_and_typed_params() {
        let mut table = RouteTable::new();
        table.register(route("/items/{item_id:int}", None)).unwrap();
        table.register(route("/greet/{person}", None)).unwrap();

        let (found, params) = table.find("/items/42").unwrap();
        assert_eq!(found.pattern(), "/items/{item_id:int}");
        assert_eq!(params.get("item_id"), Some(&Param::Int(42)));

        assert!(table.find("/items/abc").is_none());
        assert!(table.find("/nope").is_none());
    }

    #[test]
    fn earlier_catch_all_shadows_later_specific_route() {
        let mut table = RouteTable::new();
        table.register(route("/users/{name}", None)).unwrap();
        table.register(route("/users/me", None)).unwrap();

        let (found, params) = table.find("/users/me").unwrap();
        assert_eq!(found.pattern(), "/users/{name}");
        assert_eq!(params.str("name"), Some("me"));
    }

    #[test]
    fn specific_route_registered_first_wins() {
        let mut table = RouteTable::new();
        table.register(route("/users/me", None)).unwrap();
        table.register(route("/users/{name}", None)).unwrap();

        assert_eq!(table.find("/users/me").unwrap().0.pattern(), "/users/me");
        assert_eq!(table.find("/users/ada").unwrap().0.pattern(), "/users/{name}");
    }

    #[test]
    fn same_pattern_replaces_in_place() {
        let mut table = RouteTable::new();
        table.register(route("/a", Some("first"))).unwrap();
        table.register(route("/b", None)).unwrap();
        table.register(route("/a", Some("second"))).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.iter().next().unwrap().name(), Some("second"));
        assert!(table.by_name("first").is_err());
        assert!(table.by_name("second").is_ok());
    }

    #[test]
    fn duplicate_name_on_other_pattern_is_rejected() {
        let mut table = RouteTable::new();
        table.register(route("/a", Some("home"))).unwrap();
        let err = table.register(route("/b", Some("home"))).unwrap_err();
        assert!(matches!(err, Error::Route { .. }));
    }

    #[test]
    fn url_for_round_trips_through_find() {
        let mut table = RouteTable::new();
        table.register(route("/posts/{year:int}/{slug}", Some("post"))).unwrap();
        table.register(route("/files/{rest:path}", Some("file"))).unwrap();

        let url = table.url_for("post", &Params::new().with("year", 2024).with("slug", "hi")).unwrap();
        assert_eq!(url, "/posts/2024/hi");
        let (found, params) = table.find(&url).unwrap();
        assert_eq!(found.name(), Some("post"));
        assert_eq!(params.int("year"), Some(2024));

        let url = table.url_for("file", &Params::new().with("rest", "a/b.txt")).unwrap();
        assert_eq!(table.find(&url).unwrap().0.name(), Some("file"));
    }

    #[test]
    fn unknown_name_is_not_found() {
        let table = RouteTable::new();
        let err = table.url_for("missing", &Params::new()).unwrap_err();
        assert_eq!(err.as_http().map(HttpError::status), Some(StatusCode::NOT_FOUND));
        assert!(table.by_name("missing").is_err());
    }

    #[test]
    fn resolver_sees_later_registrations() {
        let mut table = RouteTable::new();
        let resolver = table.resolver();
        table.register(route("/about/{who}", Some("about"))).unwrap();
        assert_eq!(resolver.url_for("about", &Params::new().with("who", "us")).unwrap(), "/about/us");
    }
}
