//! Error types for routing.

use thiserror::Error;

use crate::response::Response;

/// Router-specific errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Two routes were registered under the same effective name.
    #[error("cannot register two routes with same name \"{0}\"")]
    DuplicateRouteName(String),

    /// Reverse lookup for a name that was never registered.
    #[error("could not find route with name \"{0}\"")]
    UnknownRoute(String),

    /// The route has more placeholders than supplied variables.
    #[error("not enough parameters given for route \"{route}\"")]
    InsufficientParameters {
        /// Route name.
        route: String,
    },

    /// A placeholder could be filled neither by name nor by position.
    #[error("incorrect parameters given for route \"{route}\": no value for \"{parameter}\"")]
    InvalidParameter {
        /// Route name.
        route: String,
        /// Placeholder that stayed unfilled.
        parameter: String,
    },

    /// The handler descriptor did not resolve to something invocable.
    #[error("could not resolve a callable for this route: {0}")]
    UnresolvableHandler(String),

    /// A middleware identifier did not resolve to a middleware.
    #[error("could not resolve middleware: {0}")]
    UnresolvableMiddleware(String),

    /// A middleware chain was handled more than once.
    #[error("next handler already called")]
    ChainReuse,

    /// The path exists but not for this method.
    #[error("method not allowed: {method} for {path}")]
    MethodNotAllowed {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
        /// Methods registered for the path.
        allowed: Vec<String>,
    },

    /// No route matched the request.
    #[error("no route matched: {method} {path}")]
    NotFound {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// Invalid path pattern.
    #[error("invalid path pattern \"{pattern}\": {reason}")]
    InvalidPattern {
        /// The pattern as written.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The matcher could not be built from the collected routes.
    #[error("failed to compile route \"{pattern}\": {source}")]
    Compile {
        /// Effective pattern of the failing route.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },
}

impl RouterError {
    /// Returns the HTTP status code this error maps to.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::MethodNotAllowed { .. } => 405,
            _ => 500,
        }
    }

    /// Renders the error as a response.
    ///
    /// A 405 carries the `Allow` header built from the allowed methods.
    #[must_use]
    pub fn to_response(&self) -> Response {
        match self {
            Self::NotFound { .. } => Response::not_found(),
            Self::MethodNotAllowed { allowed, .. } => {
                Response::method_not_allowed().header("Allow", allowed.join(", "))
            }
            _ => Response::internal_server_error(),
        }
    }
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
