//! Reverse routing: rebuilding URLs from route names.

use std::collections::HashSet;
use std::sync::Arc;

use url::form_urlencoded;

use crate::collector::ReverseData;
use crate::error::{Result, RouterError};
use crate::path::Token;
use crate::request::PathParams;

/// Values for reverse routing, positional and named, in insertion order.
///
/// Placeholders take a named value first and fall back to the positional
/// value at the placeholder's index. Named values left over become the query
/// string; leftover positional values are dropped.
///
/// # Example
///
/// ```
/// use oxide_routes::UrlParams;
///
/// let params = UrlParams::new().arg("x").param("b", "y").param("page", 2);
/// assert_eq!(params.positional(0), Some("x"));
/// assert_eq!(params.named("page"), Some("2"));
/// assert_eq!(params.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams {
    entries: Vec<(Option<String>, String)>,
}

impl UrlParams {
    /// Creates empty params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional value.
    #[must_use]
    pub fn arg(mut self, value: impl ToString) -> Self {
        self.entries.push((None, value.to_string()));
        self
    }

    /// Sets a named value, replacing an earlier one with the same key.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.as_deref() == Some(key.as_str()))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((Some(key), value)),
        }
        self
    }

    /// Gets a named value.
    pub fn named(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_deref() == Some(key))
            .map(|(_, v)| v.as_str())
    }

    /// Gets the positional value at `index`, counting positional values only.
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k.is_none())
            .nth(index)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the named values in insertion order.
    pub fn named_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| k.as_deref().map(|k| (k, v.as_str())))
    }

    /// Returns the number of values, positional and named.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no value was supplied.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<const N: usize> From<[&str; N]> for UrlParams {
    fn from(values: [&str; N]) -> Self {
        values.into_iter().fold(Self::new(), Self::arg)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for UrlParams {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .into_iter()
            .fold(Self::new(), |params, (k, v)| params.param(k, v))
    }
}

impl From<&PathParams> for UrlParams {
    fn from(variables: &PathParams) -> Self {
        variables
            .iter()
            .fold(Self::new(), |params, (k, v)| params.param(k, v))
    }
}

/// Builds URLs for named routes.
pub trait Reverser: Send + Sync {
    /// Returns the URL of the named route filled with `params`.
    fn reverse(&self, name: &str, params: &UrlParams) -> Result<String>;
}

/// Builds a [`Reverser`] from collected reverse data.
pub trait ReverserFactory: Send + Sync {
    /// Creates the reverser.
    fn create(&self, data: &ReverseData) -> Arc<dyn Reverser>;
}

/// The default reverser.
///
/// # Example
///
/// ```
/// use oxide_routes::{Collector, Reverser, StdReverser, UrlParams};
///
/// let mut collector = Collector::new();
/// collector
///     .add_route(&["GET"], "/posts/{id}", "PostController::show", Some("post"))
///     .unwrap();
///
/// let reverser = StdReverser::new(collector.reverse_data().clone());
/// let url = reverser
///     .reverse("post", &UrlParams::new().param("id", 7).param("tab", "comments"))
///     .unwrap();
/// assert_eq!(url, "/posts/7?tab=comments");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StdReverser {
    routes: ReverseData,
}

impl StdReverser {
    /// Creates a reverser over the given routes.
    pub fn new(routes: ReverseData) -> Self {
        Self { routes }
    }

    /// Returns whether a route with this name exists.
    pub fn has_route(&self, name: &str) -> bool {
        self.routes.contains(name)
    }
}

impl Reverser for StdReverser {
    fn reverse(&self, name: &str, params: &UrlParams) -> Result<String> {
        let tokens = self
            .routes
            .get(name)
            .ok_or_else(|| RouterError::UnknownRoute(name.to_string()))?;

        let mut url = String::new();
        let mut used = HashSet::new();
        let mut index = 0;

        for token in tokens {
            match token {
                Token::Literal(text) => url.push_str(text),
                Token::Placeholder(variable, _) => {
                    if index >= params.len() {
                        return Err(RouterError::InsufficientParameters {
                            route: name.to_string(),
                        });
                    }
                    let value = params
                        .named(variable)
                        .or_else(|| params.positional(index))
                        .ok_or_else(|| RouterError::InvalidParameter {
                            route: name.to_string(),
                            parameter: variable.clone(),
                        })?;
                    url.push_str(value);
                    used.insert(variable.as_str());
                    index += 1;
                }
            }
        }

        let query = build_query(params, &used);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        Ok(url)
    }
}

/// Encodes the named values no placeholder consumed.
fn build_query(params: &UrlParams, used: &HashSet<&str>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params.named_entries() {
        if !used.contains(key) {
            query.append_pair(key, value);
        }
    }
    query.finish()
}

/// Creates [`StdReverser`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdReverserFactory;

impl ReverserFactory for StdReverserFactory {
    fn create(&self, data: &ReverseData) -> Arc<dyn Reverser> {
        Arc::new(StdReverser::new(data.clone()))
    }
}
