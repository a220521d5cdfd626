//! # oxide-routes
//!
//! Route registration, reverse URL generation and middleware dispatch.
//!
//! This crate provides:
//! - Nested route groups composing path and name prefixes
//! - Named routes for reverse URL lookup
//! - Middleware chains in the onion model
//! - Controllers resolved lazily, through a container or by construction
//! - A router that builds its matcher on demand, with optional caching
//!
//! ## Quick Start
//!
//! ```
//! use oxide_routes::{Handler, NotFoundHandler, Request, Response, Router};
//!
//! let mut router = Router::new();
//! router
//!     .get("/", Handler::func(|_req, _vars| Ok(Response::text("Hello, World!"))))
//!     .unwrap();
//! router
//!     .get(
//!         "/users/{id}",
//!         Handler::func(|_req, vars| {
//!             Ok(Response::json(&serde_json::json!({"id": vars.get("id")})))
//!         }),
//!     )
//!     .unwrap();
//!
//! let response = router.process(Request::get("/users/123"), &NotFoundHandler).unwrap();
//! assert_eq!(response.status, 200);
//! ```
//!
//! ## Path Parameters
//!
//! Patterns use `{name}` placeholders, optionally with a regex:
//!
//! ```ignore
//! router.get("/posts/{post_id:\\d+}/comments/{comment_id}", handler)?;
//! ```
//!
//! Matched values are passed to the handler and stored on `request.params`.
//!
//! ## Controllers
//!
//! String handlers name a controller: `"UserController::show"` calls the
//! `show` action, `"HomeAction"` invokes the controller as a whole.
//!
//! ```ignore
//! router.register_controller::<UserController>("UserController");
//! router.get("/users/{id}", "UserController::show")?;
//! ```
//!
//! ## Middleware
//!
//! ```ignore
//! router.set_middlewares(vec!["session".into()]);
//! router.map(&["GET"], "/admin", "AdminAction", None, vec!["auth".into()])?;
//! ```
//!
//! Middlewares run outermost first: common ones, then those of enclosing
//! groups, then those of the route.
//!
//! ## Route Groups
//!
//! ```ignore
//! router.group(RouteGroup::new("/api/v1").name("api:"), |api| {
//!     api.add_route(&["GET"], "/users", "UserController::list", Some("users"))
//! })?;
//! ```
//!
//! ## Named Routes
//!
//! ```ignore
//! let url = router.reverse("api:users", UrlParams::new().param("page", 2))?;
//! assert_eq!(url, "/api/v1/users?page=2");
//! ```

mod cache;
mod collector;
mod container;
mod dispatcher;
mod error;
mod handler;
mod invoker;
mod loader;
mod middleware;
mod path;
mod request;
mod response;
mod reverser;
mod router;

pub use cache::{
    CacheSettings, CacheTtl, CachedRoutes, MemoryCache, RouteCache, DEFAULT_CACHE_KEY,
    DEFAULT_CACHE_TTL_SECS,
};
pub use collector::{Collector, DispatchData, DispatchEntry, GroupScope, ReverseData, RouteGroup};
pub use container::{Capability, Component, Container, Resolver, ServiceContainer};
pub use dispatcher::{
    Dispatch, Dispatcher, DispatcherFactory, RegexDispatcher, RegexDispatcherFactory,
};
pub use error::{Result, RouterError};
pub use handler::{
    Controller, Handler, HandlerFn, NotFoundHandler, RequestHandler, Route, CLASS_METHOD_SEPARATOR,
};
pub use invoker::{Invoker, StdInvoker, ROUTE_NAME_ATTRIBUTE};
pub use loader::Loader;
pub use middleware::{Middleware, MiddlewareRef, Next};
pub use path::{RouteParser, StdRouteParser, Token, TokenSequence, DEFAULT_PLACEHOLDER_PATTERN};
pub use request::{Method, PathParams, Request};
pub use response::Response;
pub use reverser::{Reverser, ReverserFactory, StdReverser, StdReverserFactory, UrlParams};
pub use router::Router;
