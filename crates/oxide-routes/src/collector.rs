//! Route collection with nested group scopes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Result, RouterError};
use crate::handler::Route;
use crate::middleware::MiddlewareRef;
use crate::path::{RouteParser, StdRouteParser, TokenSequence};

/// One method/pattern/route triple handed to the matcher.
#[derive(Debug, Clone)]
pub struct DispatchEntry {
    /// Upper-cased HTTP method.
    pub method: String,
    /// Parsed effective pattern.
    pub tokens: TokenSequence,
    /// What runs when the entry matches.
    pub route: Arc<Route>,
}

/// Everything the matcher is built from, in registration order.
#[derive(Debug, Clone, Default)]
pub struct DispatchData {
    entries: Vec<DispatchEntry>,
}

impl DispatchData {
    /// Appends an entry.
    pub fn add_route(
        &mut self,
        method: impl Into<String>,
        tokens: TokenSequence,
        route: Arc<Route>,
    ) {
        self.entries.push(DispatchEntry {
            method: method.into(),
            tokens,
            route,
        });
    }

    /// Returns the entries in registration order.
    pub fn entries(&self) -> &[DispatchEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no route was registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Route names and their token sequences, for reverse routing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReverseData {
    routes: BTreeMap<String, TokenSequence>,
}

impl ReverseData {
    /// Registers a name. A name can only ever be registered once.
    pub fn add_route(&mut self, name: impl Into<String>, tokens: TokenSequence) -> Result<()> {
        let name = name.into();
        if self.routes.contains_key(&name) {
            return Err(RouterError::DuplicateRouteName(name));
        }
        self.routes.insert(name, tokens);
        Ok(())
    }

    /// Gets the tokens registered under a name.
    pub fn get(&self, name: &str) -> Option<&TokenSequence> {
        self.routes.get(name)
    }

    /// Returns whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Returns the registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Returns the number of named routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` when no named route exists.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// The prefixes and middlewares in effect at a point of declaration.
#[derive(Debug, Clone, Default)]
pub struct GroupScope {
    /// Concatenation of every enclosing group prefix.
    pub path_prefix: String,
    /// Concatenation of every enclosing group name.
    pub name_prefix: String,
    /// Middlewares of every enclosing group, outermost first.
    pub middlewares: Vec<MiddlewareRef>,
}

/// A group declaration: a path prefix plus optional name prefix and
/// middlewares.
///
/// Prefixes are concatenated as written; no separator is inserted.
#[derive(Debug, Clone, Default)]
pub struct RouteGroup {
    prefix: String,
    name: Option<String>,
    middlewares: Vec<MiddlewareRef>,
}

impl RouteGroup {
    /// Creates a new route group with the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            name: None,
            middlewares: Vec::new(),
        }
    }

    /// Sets the name prefix, e.g. `"users:"`.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds middleware to this group.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Into<MiddlewareRef>) -> Self {
        self.middlewares.push(middleware.into());
        self
    }
}

impl From<&str> for RouteGroup {
    fn from(prefix: &str) -> Self {
        Self::new(prefix)
    }
}

/// Collects routes into dispatch and reverse data.
///
/// # Example
///
/// ```
/// use oxide_routes::{Collector, RouteGroup};
///
/// let mut collector = Collector::new();
/// collector
///     .group(RouteGroup::new("/users").name("users:"), |users| {
///         users.add_route(&["GET"], "", "UserController::list", Some("list"))?;
///         users.add_route(&["GET"], "/{id}", "UserController::show", Some("show"))
///     })
///     .unwrap();
///
/// assert!(collector.reverse_data().contains("users:show"));
/// assert_eq!(collector.dispatch_data().len(), 2);
/// ```
#[derive(Clone)]
pub struct Collector {
    parser: Arc<dyn RouteParser>,
    scope: GroupScope,
    dispatch: DispatchData,
    reverse: ReverseData,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    /// Creates a collector using [`StdRouteParser`].
    pub fn new() -> Self {
        Self::with_parser(Arc::new(StdRouteParser))
    }

    /// Creates a collector using a custom pattern parser.
    pub fn with_parser(parser: Arc<dyn RouteParser>) -> Self {
        Self {
            parser,
            scope: GroupScope::default(),
            dispatch: DispatchData::default(),
            reverse: ReverseData::default(),
        }
    }

    /// Registers a route with extra middlewares.
    ///
    /// The effective pattern is the current path prefix followed by
    /// `pattern` (`/` when both are empty). The effective name, if any, is
    /// the current name prefix followed by `name`. The route runs the scope
    /// middlewares, then `middlewares`, then those already on `route`.
    pub fn map(
        &mut self,
        methods: &[&str],
        pattern: &str,
        route: impl Into<Route>,
        name: Option<&str>,
        middlewares: Vec<MiddlewareRef>,
    ) -> Result<()> {
        let mut effective = format!("{}{}", self.scope.path_prefix, pattern);
        if effective.is_empty() {
            effective.push('/');
        }
        let tokens = self.parser.parse(&effective)?;

        let mut route = route.into();
        let own = std::mem::take(&mut route.middlewares);
        route.middlewares = self
            .scope
            .middlewares
            .iter()
            .cloned()
            .chain(middlewares)
            .chain(own)
            .collect();

        if let Some(name) = name {
            let name = format!("{}{}", self.scope.name_prefix, name);
            self.reverse.add_route(name.clone(), tokens.clone())?;
            route.name = Some(name);
        }

        trace!(?methods, pattern = %effective, name = ?route.name, "route registered");
        let route = Arc::new(route);
        for method in methods {
            self.dispatch
                .add_route(method.to_uppercase(), tokens.clone(), Arc::clone(&route));
        }
        Ok(())
    }

    /// Registers a route.
    pub fn add_route(
        &mut self,
        methods: &[&str],
        pattern: &str,
        route: impl Into<Route>,
        name: Option<&str>,
    ) -> Result<()> {
        self.map(methods, pattern, route, name, Vec::new())
    }

    /// Adds a GET route.
    pub fn get(&mut self, pattern: &str, route: impl Into<Route>) -> Result<()> {
        self.add_route(&["GET"], pattern, route, None)
    }

    /// Adds a POST route.
    pub fn post(&mut self, pattern: &str, route: impl Into<Route>) -> Result<()> {
        self.add_route(&["POST"], pattern, route, None)
    }

    /// Adds a PUT route.
    pub fn put(&mut self, pattern: &str, route: impl Into<Route>) -> Result<()> {
        self.add_route(&["PUT"], pattern, route, None)
    }

    /// Adds a PATCH route.
    pub fn patch(&mut self, pattern: &str, route: impl Into<Route>) -> Result<()> {
        self.add_route(&["PATCH"], pattern, route, None)
    }

    /// Adds a DELETE route.
    pub fn delete(&mut self, pattern: &str, route: impl Into<Route>) -> Result<()> {
        self.add_route(&["DELETE"], pattern, route, None)
    }

    /// Adds a HEAD route.
    pub fn head(&mut self, pattern: &str, route: impl Into<Route>) -> Result<()> {
        self.add_route(&["HEAD"], pattern, route, None)
    }

    /// Adds an OPTIONS route.
    pub fn options(&mut self, pattern: &str, route: impl Into<Route>) -> Result<()> {
        self.add_route(&["OPTIONS"], pattern, route, None)
    }

    /// Declares routes inside a group.
    ///
    /// The scope is restored when `declare` returns, whether it succeeded or
    /// not, so siblings declared afterwards never see the group's prefixes.
    pub fn group<F>(&mut self, group: impl Into<RouteGroup>, declare: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let previous = self.enter(group.into());
        let result = declare(self);
        self.leave(previous);
        result
    }

    /// Replaces the middlewares of the current scope.
    ///
    /// At top level these are the middlewares common to every route declared
    /// afterwards.
    pub fn set_middlewares(&mut self, middlewares: Vec<MiddlewareRef>) {
        self.scope.middlewares = middlewares;
    }

    /// Returns the scope in effect.
    pub fn scope(&self) -> &GroupScope {
        &self.scope
    }

    /// Returns the collected dispatch data.
    pub fn dispatch_data(&self) -> &DispatchData {
        &self.dispatch
    }

    /// Returns the collected reverse data.
    pub fn reverse_data(&self) -> &ReverseData {
        &self.reverse
    }

    /// Pushes a group onto the scope and returns the scope it replaced.
    pub(crate) fn enter(&mut self, group: RouteGroup) -> GroupScope {
        let mut inner = self.scope.clone();
        inner.path_prefix.push_str(&group.prefix);
        if let Some(name) = &group.name {
            inner.name_prefix.push_str(name);
        }
        inner.middlewares.extend(group.middlewares);
        std::mem::replace(&mut self.scope, inner)
    }

    /// Restores the scope returned by [`enter`](Self::enter).
    pub(crate) fn leave(&mut self, previous: GroupScope) {
        self.scope = previous;
    }

    /// Replaces the collected data, e.g. with a cached snapshot.
    pub(crate) fn restore(&mut self, dispatch: DispatchData, reverse: ReverseData) {
        self.dispatch = dispatch;
        self.reverse = reverse;
    }

    /// Drops every collected route and resets the scope.
    pub(crate) fn clear(&mut self) {
        self.scope = GroupScope::default();
        self.dispatch = DispatchData::default();
        self.reverse = ReverseData::default();
    }
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("scope", &self.scope)
            .field("routes", &self.dispatch.len())
            .field("named", &self.reverse.len())
            .finish_non_exhaustive()
    }
}
