//! Lazy resolution of controllers and middlewares by identifier.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::{Result, RouterError};
use crate::handler::Controller;
use crate::middleware::Middleware;

/// Something a container or constructor can hand out.
#[derive(Clone)]
pub enum Component {
    /// A controller.
    Controller(Arc<dyn Controller>),
    /// A middleware.
    Middleware(Arc<dyn Middleware>),
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller(_) => f.write_str("Component::Controller"),
            Self::Middleware(_) => f.write_str("Component::Middleware"),
        }
    }
}

/// What the caller needs an identifier to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// A controller for a handler.
    Controller,
    /// A middleware for a chain.
    Middleware,
}

/// A dependency container the router consults before constructing anything.
pub trait Container: Send + Sync {
    /// Returns whether the container knows the identifier.
    fn has(&self, id: &str) -> bool;

    /// Returns the component registered under the identifier.
    fn get(&self, id: &str) -> Option<Component>;
}

/// A container backed by a map of pre-built components.
#[derive(Debug, Clone, Default)]
pub struct ServiceContainer {
    services: HashMap<String, Component>,
}

impl ServiceContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a controller instance.
    #[must_use]
    pub fn controller(
        mut self,
        id: impl Into<String>,
        controller: impl Controller + 'static,
    ) -> Self {
        self.services
            .insert(id.into(), Component::Controller(Arc::new(controller)));
        self
    }

    /// Registers a middleware instance.
    #[must_use]
    pub fn middleware(
        mut self,
        id: impl Into<String>,
        middleware: impl Middleware + 'static,
    ) -> Self {
        self.services
            .insert(id.into(), Component::Middleware(Arc::new(middleware)));
        self
    }
}

impl Container for ServiceContainer {
    fn has(&self, id: &str) -> bool {
        self.services.contains_key(id)
    }

    fn get(&self, id: &str) -> Option<Component> {
        self.services.get(id).cloned()
    }
}

type Constructor = Arc<dyn Fn() -> Component + Send + Sync>;

/// Turns identifiers into controllers and middlewares.
///
/// A configured container that recognizes the identifier always wins.
/// Otherwise the identifier is default-constructed from the types registered
/// with [`register_controller`](Self::register_controller) and
/// [`register_middleware`](Self::register_middleware). Middlewares are only
/// constructed this way when no container is configured at all.
#[derive(Clone, Default)]
pub struct Resolver {
    container: Option<Arc<dyn Container>>,
    constructors: Arc<HashMap<String, Constructor>>,
}

impl Resolver {
    /// Creates a resolver with no container and no constructors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the container.
    pub fn set_container(&mut self, container: Arc<dyn Container>) {
        self.container = Some(container);
    }

    /// Returns whether a container is configured.
    pub fn has_container(&self) -> bool {
        self.container.is_some()
    }

    /// Makes `T::default()` available under `id` as a controller.
    pub fn register_controller<T>(&mut self, id: impl Into<String>)
    where
        T: Controller + Default + 'static,
    {
        self.register(id, || Component::Controller(Arc::new(T::default())));
    }

    /// Makes `T::default()` available under `id` as a middleware.
    pub fn register_middleware<T>(&mut self, id: impl Into<String>)
    where
        T: Middleware + Default + 'static,
    {
        self.register(id, || Component::Middleware(Arc::new(T::default())));
    }

    fn register(&mut self, id: impl Into<String>, constructor: fn() -> Component) {
        Arc::make_mut(&mut self.constructors).insert(id.into(), Arc::new(constructor));
    }

    /// Resolves an identifier for the given capability.
    ///
    /// Returns `None` when nothing produced a component. The component is
    /// not checked against the capability; see the typed helpers.
    pub fn resolve(&self, id: &str, capability: Capability) -> Option<Component> {
        if let Some(container) = &self.container {
            if container.has(id) {
                trace!(id, ?capability, "resolved from container");
                return container.get(id);
            }
            if capability == Capability::Middleware {
                return None;
            }
        }
        let constructor = self.constructors.get(id)?;
        trace!(id, ?capability, "constructed");
        Some(constructor())
    }

    /// Resolves a controller.
    pub fn controller(&self, id: &str) -> Result<Arc<dyn Controller>> {
        match self.resolve(id, Capability::Controller) {
            Some(Component::Controller(controller)) => Ok(controller),
            _ => Err(RouterError::UnresolvableHandler(id.to_string())),
        }
    }

    /// Resolves a middleware.
    pub fn middleware(&self, id: &str) -> Result<Arc<dyn Middleware>> {
        match self.resolve(id, Capability::Middleware) {
            Some(Component::Middleware(middleware)) => Ok(middleware),
            _ => Err(RouterError::UnresolvableMiddleware(id.to_string())),
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("container", &self.container.is_some())
            .field("constructors", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
