//! Matching requests against collected routes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::collector::DispatchData;
use crate::error::{Result, RouterError};
use crate::handler::Route;
use crate::path::{Token, TokenSequence};
use crate::request::PathParams;

/// Outcome of matching a method and path.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// No route has this path.
    NotFound,
    /// The path exists for other methods only.
    MethodNotAllowed(Vec<String>),
    /// A route matched.
    Found {
        /// The matched route.
        route: Arc<Route>,
        /// Values captured by its placeholders.
        variables: PathParams,
    },
}

impl Dispatch {
    /// Returns `true` for [`Dispatch::Found`].
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Matches a method and path to a route.
pub trait Dispatcher: Send + Sync {
    /// Dispatches the request line.
    fn dispatch(&self, method: &str, uri: &str) -> Dispatch;
}

/// Builds a [`Dispatcher`] from collected dispatch data.
pub trait DispatcherFactory: Send + Sync {
    /// Creates the dispatcher.
    fn create(&self, data: &DispatchData) -> Result<Arc<dyn Dispatcher>>;
}

struct VariableRoute {
    method: String,
    regex: Regex,
    /// Capture group index and name of each placeholder.
    variables: Vec<(usize, String)>,
    route: Arc<Route>,
}

impl VariableRoute {
    fn compile(method: &str, tokens: &TokenSequence, route: Arc<Route>) -> Result<Self> {
        let compile_error = |source| RouterError::Compile {
            pattern: tokens.to_string(),
            source,
        };
        let mut source = String::from("^");
        let mut variables = Vec::new();
        // Group 0 is the whole match.
        let mut next_group = 1;
        for token in tokens {
            match token {
                Token::Literal(text) => source.push_str(&regex::escape(text)),
                Token::Placeholder(name, pattern) => {
                    // Unnamed outer groups cannot clash with names inside the pattern.
                    let inner = Regex::new(pattern).map_err(compile_error)?;
                    source.push_str(&format!("({pattern})"));
                    variables.push((next_group, name.clone()));
                    next_group += inner.captures_len();
                }
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(compile_error)?;
        Ok(Self {
            method: method.to_string(),
            regex,
            variables,
            route,
        })
    }

    fn captures(&self, uri: &str) -> Option<PathParams> {
        let caps = self.regex.captures(uri)?;
        Some(
            self.variables
                .iter()
                .filter_map(|(index, name)| {
                    caps.get(*index).map(|m| (name.as_str(), m.as_str()))
                })
                .collect(),
        )
    }
}

/// The default dispatcher.
///
/// Routes without placeholders are looked up by exact path first; routes
/// with placeholders are then tried in registration order. When two routes
/// share a method and pattern the first one registered wins. `HEAD` requests
/// fall back to `GET` routes.
pub struct RegexDispatcher {
    static_routes: HashMap<String, Vec<(String, Arc<Route>)>>,
    variable_routes: Vec<VariableRoute>,
}

impl RegexDispatcher {
    /// Compiles the dispatch data.
    pub fn new(data: &DispatchData) -> Result<Self> {
        let mut static_routes: HashMap<String, Vec<(String, Arc<Route>)>> = HashMap::new();
        let mut variable_routes = Vec::new();

        for entry in data.entries() {
            let method = entry.method.to_uppercase();
            match entry.tokens.static_path() {
                Some(path) => {
                    let methods = static_routes.entry(path).or_default();
                    if !methods.iter().any(|(m, _)| *m == method) {
                        methods.push((method, Arc::clone(&entry.route)));
                    }
                }
                None => variable_routes.push(VariableRoute::compile(
                    &method,
                    &entry.tokens,
                    Arc::clone(&entry.route),
                )?),
            }
        }

        debug!(
            static_paths = static_routes.len(),
            variable_routes = variable_routes.len(),
            "dispatcher compiled"
        );
        Ok(Self {
            static_routes,
            variable_routes,
        })
    }

    fn lookup(&self, method: &str, uri: &str) -> Option<Dispatch> {
        if let Some((_, route)) = self
            .static_routes
            .get(uri)
            .and_then(|methods| methods.iter().find(|(m, _)| m == method))
        {
            return Some(Dispatch::Found {
                route: Arc::clone(route),
                variables: PathParams::new(),
            });
        }

        self.variable_routes
            .iter()
            .filter(|r| r.method == method)
            .find_map(|r| {
                r.captures(uri).map(|variables| Dispatch::Found {
                    route: Arc::clone(&r.route),
                    variables,
                })
            })
    }

    fn allowed_methods(&self, uri: &str) -> Vec<String> {
        let mut allowed: Vec<String> = Vec::new();
        let static_methods = self
            .static_routes
            .get(uri)
            .into_iter()
            .flatten()
            .map(|(m, _)| m);
        let variable_methods = self
            .variable_routes
            .iter()
            .filter(|r| r.regex.is_match(uri))
            .map(|r| &r.method);

        for method in static_methods.chain(variable_methods) {
            if !allowed.contains(method) {
                allowed.push(method.clone());
            }
        }
        allowed
    }
}

impl Dispatcher for RegexDispatcher {
    fn dispatch(&self, method: &str, uri: &str) -> Dispatch {
        let method = method.to_uppercase();
        if let Some(found) = self.lookup(&method, uri) {
            return found;
        }
        if method == "HEAD" {
            if let Some(found) = self.lookup("GET", uri) {
                return found;
            }
        }

        let allowed = self.allowed_methods(uri);
        if allowed.is_empty() {
            Dispatch::NotFound
        } else {
            debug!(%method, uri, ?allowed, "method not allowed");
            Dispatch::MethodNotAllowed(allowed)
        }
    }
}

impl fmt::Debug for RegexDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexDispatcher")
            .field("static_paths", &self.static_routes.len())
            .field("variable_routes", &self.variable_routes.len())
            .finish()
    }
}

/// Creates [`RegexDispatcher`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexDispatcherFactory;

impl DispatcherFactory for RegexDispatcherFactory {
    fn create(&self, data: &DispatchData) -> Result<Arc<dyn Dispatcher>> {
        Ok(Arc::new(RegexDispatcher::new(data)?))
    }
}
