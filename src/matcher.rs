//! Pattern matching for URL, domain and route filters
//!
//! A [`Matcher`] is a glob pattern, a regular expression, or a predicate
//! function. Each variant has exactly one evaluation rule; nothing falls back
//! from one kind to another.
//!
//! In configuration files a matcher is written either as a bare glob string or
//! as an explicitly tagged table:
//!
//! ```toml
//! denyUrlPatterns = ["*/analytics/*", { regex = "\\.(png|jpe?g)$" }]
//! ```

use crate::error::{MetricsError, Result};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::sync::Arc;

/// Predicate used by [`Matcher::Predicate`]
pub type MatchFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum Matcher {
    /// Whole-string glob match
    Glob(Pattern),
    /// Unanchored regular expression search
    Regex(Regex),
    /// Caller-supplied predicate
    Predicate(MatchFn),
}

impl Matcher {
    /// Compile a glob matcher
    pub fn glob(pattern: &str) -> Result<Self> {
        Pattern::new(pattern)
            .map(Self::Glob)
            .map_err(|e| MetricsError::invalid_pattern(pattern, e))
    }

    /// Compile a regex matcher
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| MetricsError::invalid_pattern(pattern, e))
    }

    /// Wrap a predicate function
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Glob(pattern) => pattern.matches(value),
            Self::Regex(regex) => regex.is_match(value),
            Self::Predicate(f) => f(value),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Glob(pattern) => f.debug_tuple("Glob").field(&pattern.as_str()).finish(),
            Self::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

/// Evaluate `value` against a single matcher
pub fn matches(value: &str, matcher: &Matcher) -> bool {
    matcher.matches(value)
}

/// True when any matcher in `list` accepts `value`; an empty list never matches
pub fn matches_any(value: &str, list: &[Matcher]) -> bool {
    list.iter().any(|matcher| matcher.matches(value))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MatcherSpec {
    Bare(String),
    Tagged(TaggedMatcher),
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum TaggedMatcher {
    Glob(String),
    Regex(String),
}

impl<'de> Deserialize<'de> for Matcher {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let compiled = match MatcherSpec::deserialize(deserializer)? {
            MatcherSpec::Bare(pattern) | MatcherSpec::Tagged(TaggedMatcher::Glob(pattern)) => {
                Matcher::glob(&pattern)
            }
            MatcherSpec::Tagged(TaggedMatcher::Regex(pattern)) => Matcher::regex(&pattern),
        };
        compiled.map_err(serde::de::Error::custom)
    }
}
