//! Deferred route declaration.

use crate::collector::Collector;
use crate::error::Result;

/// Declares routes the first time a router needs them.
///
/// A router runs its loader at most once, unless
/// [`Router::reload`](crate::Router::reload) re-arms it. The loader is
/// skipped entirely when the route cache already holds the data.
///
/// Closures taking the collector are loaders:
///
/// ```
/// use oxide_routes::{Collector, Loader, Result};
///
/// let loader = |routes: &mut Collector| -> Result<()> {
///     routes.get("/", "HomeAction")?;
///     routes.add_route(&["GET"], "/about", "PageController::about", Some("about"))
/// };
///
/// let mut collector = Collector::new();
/// loader.load(&mut collector).unwrap();
/// assert_eq!(collector.dispatch_data().len(), 2);
/// ```
pub trait Loader: Send + Sync {
    /// Registers routes on the collector.
    fn load(&self, collector: &mut Collector) -> Result<()>;
}

impl<F> Loader for F
where
    F: Fn(&mut Collector) -> Result<()> + Send + Sync,
{
    fn load(&self, collector: &mut Collector) -> Result<()> {
        self(collector)
    }
}
