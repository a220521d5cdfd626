//! Main router implementation.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::cache::{CacheSettings, CacheTtl, CachedRoutes, RouteCache};
use crate::collector::{Collector, RouteGroup};
use crate::container::{Container, Resolver};
use crate::dispatcher::{Dispatch, Dispatcher, DispatcherFactory, RegexDispatcherFactory};
use crate::error::{Result, RouterError};
use crate::handler::{Controller, NotFoundHandler, RequestHandler, Route};
use crate::invoker::{Invoker, StdInvoker};
use crate::loader::Loader;
use crate::middleware::{Middleware, MiddlewareRef, Next};
use crate::request::Request;
use crate::response::Response;
use crate::reverser::{Reverser, ReverserFactory, StdReverserFactory, UrlParams};

/// The dispatcher and reverser built from one snapshot of the routes.
#[derive(Clone)]
struct Built {
    dispatcher: Arc<dyn Dispatcher>,
    reverser: Arc<dyn Reverser>,
}

enum BuildState {
    /// Nothing built yet, or reset by [`Router::reload`].
    Unbuilt,
    Built(Built),
    /// Built, but routes were registered since.
    Stale,
}

struct Inner {
    collector: Collector,
    loaded: bool,
    cache_owed: bool,
    state: BuildState,
}

impl Inner {
    fn mark_dirty(&mut self) {
        if matches!(self.state, BuildState::Built(_)) {
            self.state = BuildState::Stale;
        }
        self.cache_owed = true;
    }
}

/// The router facade.
///
/// Routes are registered through `&mut self`. Matching, reverse routing and
/// request processing take `&self`: the first of them loads routes (from
/// the cache, or by running the loader), then builds a dispatcher and a
/// reverser. Both are reused until a registration makes them stale.
///
/// # Example
///
/// ```
/// use oxide_routes::{Handler, NotFoundHandler, Request, Response, Router, UrlParams};
///
/// let mut router = Router::new();
/// router
///     .add_route(
///         &["GET"],
///         "/users/{id:\\d+}",
///         Handler::func(|_req, vars| {
///             Ok(Response::text(format!("user {}", vars.get("id").unwrap_or("?"))))
///         }),
///         Some("user"),
///     )
///     .unwrap();
///
/// let res = router.process(Request::get("/users/42"), &NotFoundHandler).unwrap();
/// assert_eq!(res.body_string(), Some("user 42".to_string()));
/// assert_eq!(router.reverse("user", UrlParams::new().arg(7)).unwrap(), "/users/7");
/// ```
pub struct Router {
    inner: Mutex<Inner>,
    dispatcher_factory: Arc<dyn DispatcherFactory>,
    reverser_factory: Arc<dyn ReverserFactory>,
    loader: Option<Arc<dyn Loader>>,
    cache: Option<Arc<dyn RouteCache>>,
    cache_key: String,
    cache_ttl: CacheTtl,
    resolver: Resolver,
    invoker: Option<Arc<dyn Invoker>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates a router with the default dispatcher and reverser.
    pub fn new() -> Self {
        Self::with_factories(Arc::new(RegexDispatcherFactory), Arc::new(StdReverserFactory))
    }

    /// Creates a router building its dispatcher and reverser with the given
    /// factories.
    pub fn with_factories(
        dispatcher_factory: Arc<dyn DispatcherFactory>,
        reverser_factory: Arc<dyn ReverserFactory>,
    ) -> Self {
        let settings = CacheSettings::default();
        Self {
            inner: Mutex::new(Inner {
                collector: Collector::new(),
                loaded: false,
                cache_owed: false,
                state: BuildState::Unbuilt,
            }),
            dispatcher_factory,
            reverser_factory,
            loader: None,
            cache: None,
            cache_ttl: settings.ttl(),
            cache_key: settings.key,
            resolver: Resolver::new(),
            invoker: None,
        }
    }

    /// Replaces the collector, e.g. with one using a custom pattern parser.
    #[must_use]
    pub fn with_collector(mut self, collector: Collector) -> Self {
        let inner = self.inner_mut();
        inner.collector = collector;
        inner.mark_dirty();
        self
    }

    fn inner_mut(&mut self) -> &mut Inner {
        self.inner.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Configuration

    /// Sets the loader run the first time routes are needed.
    pub fn set_loader(&mut self, loader: impl Loader + 'static) {
        self.loader = Some(Arc::new(loader));
    }

    /// Sets the cache for collected route data.
    pub fn set_cache(&mut self, cache: Arc<dyn RouteCache>) {
        self.cache = Some(cache);
    }

    /// Sets the cache key. Defaults to `"routes"`.
    pub fn set_cache_key(&mut self, key: impl Into<String>) {
        self.cache_key = key.into();
    }

    /// Sets the cache TTL. Defaults to 60 seconds.
    pub fn set_cache_ttl(&mut self, ttl: impl Into<CacheTtl>) {
        self.cache_ttl = ttl.into();
    }

    /// Applies cache key and TTL from settings.
    pub fn set_cache_settings(&mut self, settings: &CacheSettings) {
        self.cache_ttl = settings.ttl();
        self.cache_key.clone_from(&settings.key);
    }

    /// Sets the container consulted for controllers and middlewares.
    pub fn set_container(&mut self, container: Arc<dyn Container>) {
        self.resolver.set_container(container);
    }

    /// Makes `T::default()` available under `id` as a controller.
    pub fn register_controller<T>(&mut self, id: impl Into<String>)
    where
        T: Controller + Default + 'static,
    {
        self.resolver.register_controller::<T>(id);
    }

    /// Makes `T::default()` available under `id` as a middleware.
    pub fn register_middleware<T>(&mut self, id: impl Into<String>)
    where
        T: Middleware + Default + 'static,
    {
        self.resolver.register_middleware::<T>(id);
    }

    /// Replaces the default [`StdInvoker`].
    pub fn set_invoker(&mut self, invoker: Arc<dyn Invoker>) {
        self.invoker = Some(invoker);
    }

    // Registration

    /// Sets the middlewares of the current scope. See
    /// [`Collector::set_middlewares`].
    pub fn set_middlewares(&mut self, middlewares: Vec<MiddlewareRef>) {
        self.inner_mut().collector.set_middlewares(middlewares);
    }

    /// Registers a route with extra middlewares. See [`Collector::map`].
    pub fn map(
        &mut self,
        methods: &[&str],
        pattern: &str,
        route: impl Into<Route>,
        name: Option<&str>,
        middlewares: Vec<MiddlewareRef>,
    ) -> Result<()> {
        let inner = self.inner_mut();
        inner
            .collector
            .map(methods, pattern, route, name, middlewares)?;
        inner.mark_dirty();
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

    /// Declares routes inside a group. See [`Collector::group`].
    pub fn group<F>(&mut self, group: impl Into<RouteGroup>, declare: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let previous = self.inner_mut().collector.enter(group.into());
        let result = declare(self);
        self.inner_mut().collector.leave(previous);
        result
    }

    /// Forgets every collected route and re-arms the loader.
    pub fn reload(&self) {
        let mut inner = self.lock();
        inner.collector.clear();
        inner.loaded = false;
        inner.cache_owed = false;
        inner.state = BuildState::Unbuilt;
        debug!("router reset");
    }

    // Building

    fn ensure_built(&self) -> Result<Built> {
        let mut inner = self.lock();

        if !inner.loaded {
            let cached = self
                .cache
                .as_ref()
                .filter(|cache| cache.has(&self.cache_key))
                .and_then(|cache| cache.get(&self.cache_key));
            if let Some(cached) = cached {
                debug!(key = %self.cache_key, "routes loaded from cache");
                inner.collector.restore(cached.dispatch, cached.reverse);
                inner.cache_owed = false;
            } else {
                if let Some(loader) = &self.loader {
                    // A failed load must not leave partial routes behind.
                    let snapshot = inner.collector.clone();
                    if let Err(e) = loader.load(&mut inner.collector) {
                        warn!(error = %e, "route loader failed");
                        inner.collector = snapshot;
                        return Err(e);
                    }
                    info!(
                        routes = inner.collector.dispatch_data().len(),
                        named = inner.collector.reverse_data().len(),
                        "route loader finished"
                    );
                }
                inner.cache_owed = true;
            }
            inner.loaded = true;
        }

        if let BuildState::Built(built) = &inner.state {
            return Ok(built.clone());
        }

        if inner.cache_owed {
            if let Some(cache) = &self.cache {
                let routes = CachedRoutes {
                    dispatch: inner.collector.dispatch_data().clone(),
                    reverse: inner.collector.reverse_data().clone(),
                };
                cache.set(&self.cache_key, routes, self.cache_ttl);
                debug!(key = %self.cache_key, ttl = ?self.cache_ttl, "routes written to cache");
            }
            inner.cache_owed = false;
        }

        let built = Built {
            dispatcher: self
                .dispatcher_factory
                .create(inner.collector.dispatch_data())?,
            reverser: self.reverser_factory.create(inner.collector.reverse_data()),
        };
        debug!(
            routes = inner.collector.dispatch_data().len(),
            named = inner.collector.reverse_data().len(),
            "router built"
        );
        inner.state = BuildState::Built(built.clone());
        Ok(built)
    }

    // Using

    /// Matches a method and path.
    pub fn dispatch(&self, method: &str, uri: &str) -> Result<Dispatch> {
        Ok(self.ensure_built()?.dispatcher.dispatch(method, uri))
    }

    /// Builds the URL of a named route.
    pub fn reverse(&self, name: &str, params: impl Into<UrlParams>) -> Result<String> {
        self.ensure_built()?.reverser.reverse(name, &params.into())
    }

    /// Alias of [`reverse`](Self::reverse).
    pub fn url(&self, name: &str, params: impl Into<UrlParams>) -> Result<String> {
        self.reverse(name, params)
    }

    /// Routes a request.
    ///
    /// A matched route's response is returned as is. Unmatched paths go to
    /// `fallback`; a path matched for other methods only fails with
    /// [`RouterError::MethodNotAllowed`].
    pub fn process(&self, request: Request, fallback: &dyn RequestHandler) -> Result<Response> {
        self.route_request(request, fallback)
    }

    fn route_request(&self, request: Request, fallback: &dyn RequestHandler) -> Result<Response> {
        let built = self.ensure_built()?;
        match built.dispatcher.dispatch(request.method.as_str(), &request.path) {
            Dispatch::NotFound => fallback.handle(request),
            Dispatch::MethodNotAllowed(allowed) => Err(RouterError::MethodNotAllowed {
                method: request.method.to_string(),
                path: request.path,
                allowed,
            }),
            Dispatch::Found { route, variables } => match &self.invoker {
                Some(invoker) => invoker.invoke(request, &route, &variables),
                None => StdInvoker::new(self.resolver.clone()).invoke(request, &route, &variables),
            },
        }
    }
}

impl Middleware for Router {
    /// Routes the request; unmatched paths continue down the chain.
    fn process(&self, request: Request, next: &Next) -> Result<Response> {
        self.route_request(request, next)
    }
}

impl RequestHandler for Router {
    /// Routes the request with [`NotFoundHandler`] as fallback.
    fn handle(&self, request: Request) -> Result<Response> {
        self.route_request(request, &NotFoundHandler)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        let state = match inner.state {
            BuildState::Unbuilt => "unbuilt",
            BuildState::Built(_) => "built",
            BuildState::Stale => "stale",
        };
        f.debug_struct("Router")
            .field("collector", &inner.collector)
            .field("loaded", &inner.loaded)
            .field("state", &state)
            .field("cache_key", &self.cache_key)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
