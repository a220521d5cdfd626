#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use oxide_routes::{
    CacheTtl, CachedRoutes, Controller, DispatchData, Dispatcher, DispatcherFactory, MemoryCache,
    Middleware, Next, PathParams, RegexDispatcherFactory, Request, RequestHandler, Response,
    Result, ReverseData, Reverser, ReverserFactory, RouteCache, Router, StdReverserFactory,
    ROUTE_NAME_ATTRIBUTE,
};

/// Routes `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub fn body(result: Result<Response>) -> String {
    result
        .unwrap_or_else(|e| panic!("Expected a response, got {e:?}"))
        .body_string()
        .unwrap_or_default()
}

/// Dispatcher factory counting how often it builds.
#[derive(Default)]
pub struct CountingDispatcherFactory {
    pub calls: AtomicUsize,
}

impl CountingDispatcherFactory {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DispatcherFactory for CountingDispatcherFactory {
    fn create(&self, data: &DispatchData) -> Result<Arc<dyn Dispatcher>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        RegexDispatcherFactory.create(data)
    }
}

/// Reverser factory counting how often it builds.
#[derive(Default)]
pub struct CountingReverserFactory {
    pub calls: AtomicUsize,
}

impl CountingReverserFactory {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReverserFactory for CountingReverserFactory {
    fn create(&self, data: &ReverseData) -> Arc<dyn Reverser> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StdReverserFactory.create(data)
    }
}

/// A router wired to counting factories.
pub fn counting_router() -> (
    Router,
    Arc<CountingDispatcherFactory>,
    Arc<CountingReverserFactory>,
) {
    let dispatchers = Arc::new(CountingDispatcherFactory::default());
    let reversers = Arc::new(CountingReverserFactory::default());
    let router = Router::with_factories(
        Arc::clone(&dispatchers) as Arc<dyn DispatcherFactory>,
        Arc::clone(&reversers) as Arc<dyn ReverserFactory>,
    );
    (router, dispatchers, reversers)
}

/// Memory cache recording every call.
#[derive(Default)]
pub struct RecordingCache {
    inner: MemoryCache,
    pub gets: AtomicUsize,
    pub sets: Mutex<Vec<(String, CacheTtl)>>,
}

impl RecordingCache {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> Vec<(String, CacheTtl)> {
        self.sets.lock().unwrap().clone()
    }
}

impl RouteCache for RecordingCache {
    fn has(&self, key: &str) -> bool {
        self.inner.has(key)
    }

    fn get(&self, key: &str) -> Option<CachedRoutes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn set(&self, key: &str, routes: CachedRoutes, ttl: CacheTtl) {
        self.sets.lock().unwrap().push((key.to_string(), ttl));
        self.inner.set(key, routes, ttl);
    }
}

/// Controller with `show` and `list` actions.
#[derive(Default)]
pub struct UserController;

impl Controller for UserController {
    fn call_action(
        &self,
        action: &str,
        request: Request,
        variables: &PathParams,
    ) -> Option<Result<Response>> {
        match action {
            "show" => Some(Ok(Response::text(format!(
                "user {}",
                variables.get("id").unwrap_or("?")
            )))),
            "list" => Some(Ok(Response::text(format!(
                "users via {}",
                request.attribute(ROUTE_NAME_ATTRIBUTE).unwrap_or("-")
            )))),
            _ => None,
        }
    }
}

/// Invokable controller echoing the route name.
#[derive(Default)]
pub struct HomeAction;

impl Controller for HomeAction {
    fn call_action(&self, _: &str, _: Request, _: &PathParams) -> Option<Result<Response>> {
        None
    }

    fn invoke(&self, request: Request, _variables: &PathParams) -> Option<Result<Response>> {
        Some(Ok(Response::text(format!(
            "home {}",
            request.attribute(ROUTE_NAME_ATTRIBUTE).unwrap_or("-")
        ))))
    }
}

/// Middleware appending `"<label> in"` / `"<label> out"` to a shared log.
pub struct Recorder {
    pub label: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label,
            log: Arc::clone(log),
        }
    }
}

impl Middleware for Recorder {
    fn process(&self, request: Request, next: &Next) -> Result<Response> {
        self.log.lock().unwrap().push(format!("{} in", self.label));
        let response = next.handle(request);
        self.log.lock().unwrap().push(format!("{} out", self.label));
        response
    }
}

/// Default-constructible middleware tagging responses.
#[derive(Default)]
pub struct PoweredBy;

impl Middleware for PoweredBy {
    fn process(&self, request: Request, next: &Next) -> Result<Response> {
        Ok(next.handle(request)?.header("X-Powered-By", "oxide-routes"))
    }
}

/// Middleware answering 403 without calling the rest of the chain.
#[derive(Default)]
pub struct Deny;

impl Middleware for Deny {
    fn process(&self, _request: Request, _next: &Next) -> Result<Response> {
        Ok(Response::new(403))
    }
}

/// Terminal handler answering with a fixed body.
pub fn fixed(body: &'static str) -> Arc<dyn RequestHandler> {
    Arc::new(move |_req: Request| -> Result<Response> { Ok(Response::text(body)) })
}
