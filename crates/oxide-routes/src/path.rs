//! Route pattern tokens and the pattern parser.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RouterError};

/// Pattern used for placeholders written without an explicit regex.
pub const DEFAULT_PLACEHOLDER_PATTERN: &str = "[^/]+";

/// One piece of a parsed route pattern.
///
/// Serializes as a bare string for literals and as a `[name, regex]` pair for
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    /// Text matched and reproduced verbatim.
    Literal(String),
    /// A variable: its name and the regex its value must match.
    Placeholder(String, String),
}

/// A parsed route pattern: literals and placeholders in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSequence(Vec<Token>);

impl TokenSequence {
    /// Creates a sequence from tokens.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }

    /// Returns the tokens.
    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    /// Returns an iterator over the tokens.
    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.0.iter()
    }

    /// Returns the placeholder names in order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|token| match token {
            Token::Placeholder(name, _) => Some(name.as_str()),
            Token::Literal(_) => None,
        })
    }

    /// Returns the literal path when the sequence has no placeholders.
    pub fn static_path(&self) -> Option<String> {
        self.0
            .iter()
            .map(|token| match token {
                Token::Literal(text) => Some(text.as_str()),
                Token::Placeholder(..) => None,
            })
            .collect()
    }
}

impl std::fmt::Display for TokenSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for token in &self.0 {
            match token {
                Token::Literal(text) => f.write_str(text)?,
                Token::Placeholder(name, pattern) if pattern == DEFAULT_PLACEHOLDER_PATTERN => {
                    write!(f, "{{{name}}}")?;
                }
                Token::Placeholder(name, pattern) => write!(f, "{{{name}:{pattern}}}")?,
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a TokenSequence {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Turns a route pattern into a [`TokenSequence`].
pub trait RouteParser: Send + Sync {
    /// Parses a full (already prefixed) route pattern.
    fn parse(&self, pattern: &str) -> Result<TokenSequence>;
}

/// The default pattern syntax.
///
/// - `/users` - literal path
/// - `/users/{id}` - placeholder matching [`DEFAULT_PLACEHOLDER_PATTERN`]
/// - `/users/{id:[0-9]+}` - placeholder with its own regex; the regex may
///   contain balanced braces such as `{id:[0-9]{4}}`
///
/// # Example
///
/// ```
/// use oxide_routes::{RouteParser, StdRouteParser, Token};
///
/// let tokens = StdRouteParser.parse("/posts/{id:\\d+}").unwrap();
/// assert_eq!(
///     tokens.tokens(),
///     &[
///         Token::Literal("/posts/".into()),
///         Token::Placeholder("id".into(), "\\d+".into()),
///     ]
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StdRouteParser;

impl RouteParser for StdRouteParser {
    fn parse(&self, pattern: &str) -> Result<TokenSequence> {
        let invalid = |reason: String| RouterError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        let mut tokens = Vec::new();
        let mut seen = HashSet::new();
        let mut rest = pattern;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                tokens.push(Token::Literal(rest[..open].to_string()));
            }
            let body = &rest[open + 1..];
            let close = closing_brace(body).ok_or_else(|| invalid("unclosed '{'".into()))?;
            let (name, regex) = split_placeholder(&body[..close]);

            if !is_valid_name(name) {
                return Err(invalid(format!("invalid placeholder name \"{name}\"")));
            }
            if !seen.insert(name.to_string()) {
                return Err(invalid(format!("placeholder \"{name}\" used twice")));
            }
            match Regex::new(&format!("^(?:{regex})$")) {
                Err(e) => return Err(invalid(format!("bad regex for \"{name}\": {e}"))),
                Ok(compiled) if compiled.capture_names().flatten().next().is_some() => {
                    return Err(invalid(format!(
                        "named groups are not allowed in the regex for \"{name}\""
                    )));
                }
                Ok(_) => {}
            }

            tokens.push(Token::Placeholder(name.to_string(), regex.to_string()));
            rest = &body[close + 1..];
        }

        if !rest.is_empty() {
            tokens.push(Token::Literal(rest.to_string()));
        }

        Ok(TokenSequence(tokens))
    }
}

/// Finds the brace closing a placeholder whose opening brace was just consumed.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_placeholder(inner: &str) -> (&str, &str) {
    match inner.split_once(':') {
        Some((name, regex)) => (name.trim(), regex.trim()),
        None => (inner.trim(), DEFAULT_PLACEHOLDER_PATTERN),
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
