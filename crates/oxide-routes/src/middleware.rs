//! Middleware and the continuation chain wrapping a route handler.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::error::{Result, RouterError};
use crate::handler::RequestHandler;
use crate::request::Request;
use crate::response::Response;

/// Trait for middleware wrapped around route handlers.
///
/// A middleware receives the request and the rest of the chain. It may:
/// - Modify the request before passing it on
/// - Short-circuit by returning a response without calling `next`
/// - Post-process the response `next` returned
///
/// # Example
///
/// ```
/// use oxide_routes::{Middleware, Next, Request, RequestHandler, Response, Result};
///
/// struct PoweredBy;
///
/// impl Middleware for PoweredBy {
///     fn process(&self, request: Request, next: &Next) -> Result<Response> {
///         let response = next.handle(request)?;
///         Ok(response.header("X-Powered-By", "oxide"))
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    /// Processes the request, usually by delegating to `next`.
    fn process(&self, request: Request, next: &Next) -> Result<Response>;
}

impl<F> Middleware for F
where
    F: Fn(Request, &Next) -> Result<Response> + Send + Sync,
{
    fn process(&self, request: Request, next: &Next) -> Result<Response> {
        self(request, next)
    }
}

/// A middleware as declared on a route or group.
#[derive(Clone)]
pub enum MiddlewareRef {
    /// An already constructed middleware.
    Instance(Arc<dyn Middleware>),
    /// An identifier resolved when the route is invoked.
    Identifier(String),
}

impl MiddlewareRef {
    /// Wraps a middleware instance.
    pub fn instance(middleware: impl Middleware + 'static) -> Self {
        Self::Instance(Arc::new(middleware))
    }
}

impl From<&str> for MiddlewareRef {
    fn from(id: &str) -> Self {
        Self::Identifier(id.to_string())
    }
}

impl From<String> for MiddlewareRef {
    fn from(id: String) -> Self {
        Self::Identifier(id)
    }
}

impl From<Arc<dyn Middleware>> for MiddlewareRef {
    fn from(middleware: Arc<dyn Middleware>) -> Self {
        Self::Instance(middleware)
    }
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(_) => f.write_str("Instance"),
            Self::Identifier(id) => write!(f, "Identifier({id})"),
        }
    }
}

/// The rest of a middleware chain.
///
/// Handling pops the first middleware and runs it with a fresh `Next` over
/// the remaining ones. Once that has happened this instance is spent:
/// handling it again fails with [`RouterError::ChainReuse`]. An empty chain
/// delegates straight to the terminal handler.
pub struct Next {
    handler: Arc<dyn RequestHandler>,
    stack: Mutex<Option<VecDeque<Arc<dyn Middleware>>>>,
}

impl Next {
    /// Creates a chain running `middlewares` in order, then `handler`.
    pub fn new(handler: Arc<dyn RequestHandler>, middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            handler,
            stack: Mutex::new(Some(middlewares.into())),
        }
    }

    /// Returns how many middlewares are still ahead, or `None` once spent.
    pub fn remaining(&self) -> Option<usize> {
        self.stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(VecDeque::len)
    }
}

impl RequestHandler for Next {
    fn handle(&self, request: Request) -> Result<Response> {
        let mut stack = self.stack.lock().unwrap_or_else(PoisonError::into_inner);
        let first = match stack.as_mut() {
            Some(pending) => pending.pop_front(),
            None => {
                warn!(path = %request.path, "middleware chain handled twice");
                return Err(RouterError::ChainReuse);
            }
        };

        let Some(middleware) = first else {
            drop(stack);
            return self.handler.handle(request);
        };

        let rest = stack.take().unwrap_or_default();
        drop(stack);

        let next = Self {
            handler: Arc::clone(&self.handler),
            stack: Mutex::new(Some(rest)),
        };
        middleware.process(request, &next)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.remaining())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Recorder {
        fn process(&self, request: Request, next: &Next) -> Result<Response> {
            self.log.lock().unwrap().push(format!("{} in", self.label));
            let response = next.handle(request);
            self.log.lock().unwrap().push(format!("{} out", self.label));
            response
        }
    }

    fn terminal(log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn RequestHandler> {
        let log = Arc::clone(log);
        Arc::new(move |_req: Request| -> Result<Response> {
            log.lock().unwrap().push("handler".to_string());
            Ok(Response::text("done"))
        })
    }

    fn recorder(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Middleware> {
        Arc::new(Recorder {
            label,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn test_onion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = Next::new(
            terminal(&log),
            vec![recorder("m1", &log), recorder("m2", &log)],
        );

        let res = chain.handle(Request::get("/")).unwrap();
        assert_eq!(res.body_string(), Some("done".to_string()));
        assert_eq!(
            *log.lock().unwrap(),
            ["m1 in", "m2 in", "handler", "m2 out", "m1 out"]
        );
    }

    #[test]
    fn test_counter_increases_through_chain() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let step = |counter: &Arc<AtomicUsize>, seen: &Arc<Mutex<Vec<usize>>>| {
            let counter = Arc::clone(counter);
            let seen = Arc::clone(seen);
            Arc::new(move |req: Request, next: &Next| {
                seen.lock().unwrap().push(counter.fetch_add(1, Ordering::SeqCst));
                next.handle(req)
            }) as Arc<dyn Middleware>
        };

        let handler_counter = Arc::clone(&counter);
        let handler_seen = Arc::clone(&seen);
        let handler: Arc<dyn RequestHandler> = Arc::new(move |_req: Request| -> Result<Response> {
            handler_seen
                .lock()
                .unwrap()
                .push(handler_counter.fetch_add(1, Ordering::SeqCst));
            Ok(Response::ok())
        });

        Next::new(handler, vec![step(&counter, &seen), step(&counter, &seen)])
            .handle(Request::get("/"))
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), [0, 1, 2]);
    }

    #[test]
    fn test_short_circuit_skips_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let deny: Arc<dyn Middleware> =
            Arc::new(|_req: Request, _next: &Next| -> Result<Response> { Ok(Response::new(403)) });
        let chain = Next::new(terminal(&log), vec![deny, recorder("m2", &log)]);

        let res = chain.handle(Request::get("/")).unwrap();
        assert_eq!(res.status, 403);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_middleware_can_replace_request() {
        let rewrite: Arc<dyn Middleware> = Arc::new(|req: Request, next: &Next| {
            next.handle(req.with_attribute("user", "ada"))
        });
        let handler: Arc<dyn RequestHandler> = Arc::new(|req: Request| -> Result<Response> {
            Ok(Response::text(req.attribute("user").unwrap_or("nobody")))
        });

        let res = Next::new(handler, vec![rewrite]).handle(Request::get("/")).unwrap();
        assert_eq!(res.body_string(), Some("ada".to_string()));
    }

    #[test]
    fn test_handling_twice_fails() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = Next::new(
            terminal(&log),
            vec![recorder("m1", &log), recorder("m2", &log)],
        );

        assert!(chain.handle(Request::get("/")).is_ok());
        assert_eq!(chain.remaining(), None);
        assert!(matches!(
            chain.handle(Request::get("/")),
            Err(RouterError::ChainReuse)
        ));
    }

    #[test]
    fn test_middleware_replaying_continuation_fails() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let replay: Arc<dyn Middleware> = Arc::new(|req: Request, next: &Next| {
            next.handle(req.clone())?;
            next.handle(req)
        });
        let chain = Next::new(terminal(&log), vec![replay, recorder("m2", &log)]);

        assert!(matches!(
            chain.handle(Request::get("/")),
            Err(RouterError::ChainReuse)
        ));
        assert_eq!(
            *log.lock().unwrap(),
            ["m2 in", "handler", "m2 out"]
        );
    }

    #[test]
    fn test_empty_chain_calls_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = Next::new(terminal(&log), Vec::new());
        assert_eq!(chain.remaining(), Some(0));
        chain.handle(Request::get("/")).unwrap();
        assert_eq!(*log.lock().unwrap(), ["handler"]);
    }
}
