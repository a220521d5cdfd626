//! Running a matched route: middleware resolution, chain and handler call.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::container::Resolver;
use crate::error::{Result, RouterError};
use crate::handler::{Handler, RequestHandler, Route, CLASS_METHOD_SEPARATOR};
use crate::middleware::{Middleware, MiddlewareRef, Next};
use crate::request::{PathParams, Request};
use crate::response::Response;

/// Request attribute holding the name of the matched route.
pub const ROUTE_NAME_ATTRIBUTE: &str = "router:name";

/// Runs a matched route.
pub trait Invoker: Send + Sync {
    /// Invokes `route` with the variables its pattern captured.
    fn invoke(&self, request: Request, route: &Route, variables: &PathParams) -> Result<Response>;
}

/// The default invoker.
///
/// Resolves the route's middlewares, stores the variables on
/// [`Request::params`] and the route name under [`ROUTE_NAME_ATTRIBUTE`],
/// then runs the handler at the end of a fresh [`Next`] chain.
#[derive(Debug, Clone, Default)]
pub struct StdInvoker {
    resolver: Resolver,
}

impl StdInvoker {
    /// Creates an invoker resolving identifiers through `resolver`.
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    /// Returns the resolver.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolves a middleware declaration to an instance.
    pub fn resolve_middleware(&self, middleware: &MiddlewareRef) -> Result<Arc<dyn Middleware>> {
        match middleware {
            MiddlewareRef::Instance(instance) => Ok(Arc::clone(instance)),
            MiddlewareRef::Identifier(id) => self.resolver.middleware(id),
        }
    }

    /// Calls a handler directly, without any middleware.
    pub fn process_handler(
        &self,
        request: Request,
        handler: &Handler,
        variables: &PathParams,
    ) -> Result<Response> {
        match handler {
            Handler::Callable(f) => f(request, variables),
            Handler::ClassMethod { class, method } => self
                .resolver
                .controller(class)?
                .call_action(method, request, variables)
                .ok_or_else(|| {
                    RouterError::UnresolvableHandler(format!(
                        "{class}{CLASS_METHOD_SEPARATOR}{method}"
                    ))
                })?,
            Handler::Invokable(class) => self
                .resolver
                .controller(class)?
                .invoke(request, variables)
                .ok_or_else(|| RouterError::UnresolvableHandler(class.clone()))?,
            Handler::Instance { controller, method } => controller
                .call_action(method, request, variables)
                .ok_or_else(|| RouterError::UnresolvableHandler(method.clone()))?,
            Handler::RequestHandler(terminal) => terminal.handle(request),
        }
    }
}

impl Invoker for StdInvoker {
    fn invoke(
        &self,
        mut request: Request,
        route: &Route,
        variables: &PathParams,
    ) -> Result<Response> {
        let middlewares = route
            .middlewares
            .iter()
            .map(|m| self.resolve_middleware(m))
            .collect::<Result<Vec<_>>>()?;

        request.params = variables.clone();
        if let Some(name) = &route.name {
            request = request.with_attribute(ROUTE_NAME_ATTRIBUTE, name.as_str());
        }

        trace!(
            route = ?route.name,
            handler = ?route.handler,
            middlewares = middlewares.len(),
            "invoking route"
        );

        let terminal = Arc::new(Terminal {
            invoker: self.clone(),
            handler: route.handler.clone(),
            variables: variables.clone(),
        });
        Next::new(terminal, middlewares).handle(request)
    }
}

/// The end of the chain: calls the route's own handler.
struct Terminal {
    invoker: StdInvoker,
    handler: Handler,
    variables: PathParams,
}

impl RequestHandler for Terminal {
    fn handle(&self, request: Request) -> Result<Response> {
        self.invoker
            .process_handler(request, &self.handler, &self.variables)
    }
}

impl fmt::Debug for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Terminal")
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ServiceContainer;
    use crate::handler::Controller;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Users;

    impl Controller for Users {
        fn call_action(
            &self,
            action: &str,
            _request: Request,
            variables: &PathParams,
        ) -> Option<Result<Response>> {
            match action {
                "show" => Some(Ok(Response::text(format!(
                    "user {}",
                    variables.get("id").unwrap_or("?")
                )))),
                _ => None,
            }
        }
    }

    #[derive(Default)]
    struct Home;

    impl Controller for Home {
        fn call_action(&self, _: &str, _: Request, _: &PathParams) -> Option<Result<Response>> {
            None
        }

        fn invoke(&self, request: Request, _variables: &PathParams) -> Option<Result<Response>> {
            Some(Ok(Response::text(
                request.attribute(ROUTE_NAME_ATTRIBUTE).unwrap_or("-").to_string(),
            )))
        }
    }

    fn invoker() -> StdInvoker {
        let mut resolver = Resolver::new();
        resolver.register_controller::<Users>("Users");
        resolver.register_controller::<Home>("Home");
        StdInvoker::new(resolver)
    }

    fn vars(id: &str) -> PathParams {
        [("id", id)].into_iter().collect()
    }

    fn body(result: Result<Response>) -> String {
        result.unwrap().body_string().unwrap_or_default()
    }

    #[test]
    fn test_class_method() {
        let route = Route::new("Users::show");
        assert_eq!(body(invoker().invoke(Request::get("/"), &route, &vars("5"))), "user 5");
    }

    #[test]
    fn test_unknown_action_is_unresolvable() {
        let err = invoker()
            .invoke(Request::get("/"), &Route::new("Users::edit"), &PathParams::new())
            .unwrap_err();
        assert!(matches!(err, RouterError::UnresolvableHandler(ref h) if h == "Users::edit"));
    }

    #[test]
    fn test_unknown_class_is_unresolvable() {
        let err = invoker()
            .invoke(Request::get("/"), &Route::new("Nope"), &PathParams::new())
            .unwrap_err();
        assert!(matches!(err, RouterError::UnresolvableHandler(ref h) if h == "Nope"));
    }

    #[test]
    fn test_invokable_sees_route_name() {
        let route = Route::new("Home").name("home");
        assert_eq!(body(invoker().invoke(Request::get("/"), &route, &PathParams::new())), "home");
    }

    #[test]
    fn test_non_invokable_controller() {
        let err = invoker()
            .invoke(Request::get("/"), &Route::new("Users"), &PathParams::new())
            .unwrap_err();
        assert!(matches!(err, RouterError::UnresolvableHandler(_)));
    }

    #[test]
    fn test_callable_and_instance() {
        let callable = Route::new(Handler::func(|_req, vars| {
            Ok(Response::text(vars.get("id").unwrap_or("?").to_string()))
        }));
        assert_eq!(body(invoker().invoke(Request::get("/"), &callable, &vars("9"))), "9");

        let instance = Route::new(Handler::instance(Arc::new(Users), "show"));
        assert_eq!(body(invoker().invoke(Request::get("/"), &instance, &vars("3"))), "user 3");
    }

    #[test]
    fn test_request_handler_reads_params_from_request() {
        let route = Route::new(Handler::request_handler(|req: Request| -> Result<Response> {
            Ok(Response::text(req.params.get("id").unwrap_or("?").to_string()))
        }));
        assert_eq!(body(invoker().invoke(Request::get("/"), &route, &vars("11"))), "11");
    }

    #[test]
    fn test_middlewares_run_in_order_around_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tag = |label: &'static str| {
            let log = Arc::clone(&log);
            MiddlewareRef::instance(move |req: Request, next: &Next| -> Result<Response> {
                log.lock().unwrap().push(label);
                next.handle(req)
            })
        };
        let handler_log = Arc::clone(&log);
        let route = Route::new(Handler::func(move |_req, _vars| {
            handler_log.lock().unwrap().push("handler");
            Ok(Response::ok())
        }))
        .middleware(tag("first"))
        .middleware(tag("second"));

        invoker()
            .invoke(Request::get("/"), &route, &PathParams::new())
            .unwrap();
        assert_eq!(*log.lock().unwrap(), ["first", "second", "handler"]);
    }

    #[test]
    fn test_middleware_identifier_from_container() {
        let mut resolver = Resolver::new();
        resolver.register_controller::<Users>("Users");
        resolver.set_container(Arc::new(ServiceContainer::new().middleware(
            "deny",
            |_req: Request, _next: &Next| -> Result<Response> { Ok(Response::new(403)) },
        )));
        let invoker = StdInvoker::new(resolver);

        let res = invoker
            .invoke(
                Request::get("/"),
                &Route::new("Users::show").middleware("deny"),
                &vars("1"),
            )
            .unwrap();
        assert_eq!(res.status, 403);

        let err = invoker
            .invoke(
                Request::get("/"),
                &Route::new("Users::show").middleware("missing"),
                &vars("1"),
            )
            .unwrap_err();
        assert!(matches!(err, RouterError::UnresolvableMiddleware(ref m) if m == "missing"));
    }
}
