//! Handler descriptors and the traits handlers implement.

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, RouterError};
use crate::middleware::MiddlewareRef;
use crate::request::{PathParams, Request};
use crate::response::Response;

/// Separator between controller identifier and action in string handlers.
pub const CLASS_METHOD_SEPARATOR: &str = "::";

/// A boxed handler function receiving the request and the route variables.
pub type HandlerFn = Arc<dyn Fn(Request, &PathParams) -> Result<Response> + Send + Sync>;

/// Anything that turns a request into a response.
///
/// This is the terminal end of a middleware chain and the fallback passed to
/// [`Router::process`](crate::Router::process).
pub trait RequestHandler: Send + Sync {
    /// Handles the request.
    fn handle(&self, request: Request) -> Result<Response>;
}

impl<F> RequestHandler for F
where
    F: Fn(Request) -> Result<Response> + Send + Sync,
{
    fn handle(&self, request: Request) -> Result<Response> {
        self(request)
    }
}

/// A controller exposing named actions.
///
/// Both methods return `None` when the controller does not support the call;
/// the invoker reports that as [`RouterError::UnresolvableHandler`].
pub trait Controller: Send + Sync {
    /// Runs the named action.
    fn call_action(
        &self,
        action: &str,
        request: Request,
        variables: &PathParams,
    ) -> Option<Result<Response>>;

    /// Runs the controller itself. Only invokable controllers override this.
    fn invoke(&self, request: Request, variables: &PathParams) -> Option<Result<Response>> {
        let _ = (request, variables);
        None
    }
}

/// What a route runs once matched.
#[derive(Clone)]
pub enum Handler {
    /// A plain function or closure.
    Callable(HandlerFn),
    /// A controller resolved by identifier, then one of its actions.
    ClassMethod {
        /// Controller identifier.
        class: String,
        /// Action name.
        method: String,
    },
    /// A controller resolved by identifier and invoked as a whole.
    Invokable(String),
    /// An already constructed controller and one of its actions.
    Instance {
        /// The controller.
        controller: Arc<dyn Controller>,
        /// Action name.
        method: String,
    },
    /// A terminal request handler. It does not receive the variables
    /// directly; they are on [`Request::params`].
    RequestHandler(Arc<dyn RequestHandler>),
}

impl Handler {
    /// Wraps a closure.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(Request, &PathParams) -> Result<Response> + Send + Sync + 'static,
    {
        Self::Callable(Arc::new(f))
    }

    /// Refers to `method` of the controller registered as `class`.
    pub fn class_method(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self::ClassMethod {
            class: class.into(),
            method: method.into(),
        }
    }

    /// Refers to the invokable controller registered as `class`.
    pub fn invokable(class: impl Into<String>) -> Self {
        Self::Invokable(class.into())
    }

    /// Pairs a controller instance with one of its actions.
    pub fn instance(controller: Arc<dyn Controller>, method: impl Into<String>) -> Self {
        Self::Instance {
            controller,
            method: method.into(),
        }
    }

    /// Wraps a terminal request handler.
    pub fn request_handler(handler: impl RequestHandler + 'static) -> Self {
        Self::RequestHandler(Arc::new(handler))
    }
}

impl From<&str> for Handler {
    /// `"Class::method"` becomes [`Handler::ClassMethod`], anything else
    /// [`Handler::Invokable`].
    fn from(value: &str) -> Self {
        match value.split_once(CLASS_METHOD_SEPARATOR) {
            Some((class, method)) => Self::class_method(class, method),
            None => Self::invokable(value),
        }
    }
}

impl From<String> for Handler {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callable(_) => f.write_str("Callable"),
            Self::ClassMethod { class, method } => {
                write!(f, "ClassMethod({class}{CLASS_METHOD_SEPARATOR}{method})")
            }
            Self::Invokable(class) => write!(f, "Invokable({class})"),
            Self::Instance { method, .. } => write!(f, "Instance(_, {method})"),
            Self::RequestHandler(_) => f.write_str("RequestHandler"),
        }
    }
}

/// A registered route target: the handler plus its middlewares and name.
///
/// Every route the collector stores is a `Route`; passing a bare
/// [`Handler`] promotes it to one with no middleware and no name.
#[derive(Debug, Clone)]
pub struct Route {
    /// The handler run at the end of the chain.
    pub handler: Handler,
    /// Middlewares wrapped around the handler, outermost first.
    pub middlewares: Vec<MiddlewareRef>,
    /// Effective route name, if the route was named.
    pub name: Option<String>,
}

impl Route {
    /// Creates a route without middleware or name.
    pub fn new(handler: impl Into<Handler>) -> Self {
        Self {
            handler: handler.into(),
            middlewares: Vec::new(),
            name: None,
        }
    }

    /// Appends a middleware.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Into<MiddlewareRef>) -> Self {
        self.middlewares.push(middleware.into());
        self
    }

    /// Sets the route name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl From<Handler> for Route {
    fn from(handler: Handler) -> Self {
        Self::new(handler)
    }
}

impl From<&str> for Route {
    fn from(handler: &str) -> Self {
        Self::new(handler)
    }
}

/// Fallback that turns every request into [`RouterError::NotFound`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundHandler;

impl RequestHandler for NotFoundHandler {
    fn handle(&self, request: Request) -> Result<Response> {
        Err(RouterError::NotFound {
            method: request.method.to_string(),
            path: request.path,
        })
    }
}
