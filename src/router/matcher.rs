//! Request matchers
//!
//! A matcher is a pure, cheap predicate over an intercepted request. Matchers run
//! for every request that reaches the router, including ones that end up passed
//! through, so they must not perform I/O.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::request::{Destination, RequestDescriptor};

/// Inputs available to a matcher
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub request: &'a RequestDescriptor,
    /// Request targets the application origin
    pub same_origin: bool,
    /// Request URL is part of the current precache
    pub precached: bool,
}

impl<'a> MatchContext<'a> {
    pub fn new(request: &'a RequestDescriptor, same_origin: bool, precached: bool) -> Self {
        Self {
            request,
            same_origin,
            precached,
        }
    }
}

/// Predicate classifying a request for routing
pub trait Matcher: Send + Sync {
    fn matches(&self, ctx: &MatchContext<'_>) -> bool;
}

impl<F> Matcher for F
where
    F: Fn(&MatchContext<'_>) -> bool + Send + Sync,
{
    fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        self(ctx)
    }
}

/// Declarative matcher as written in configuration
///
/// Every condition that is set must hold; an empty matcher matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestMatcherConfig {
    /// Required same-origin flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_origin: Option<bool>,

    /// Request destination must be one of these
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<Destination>,

    /// Headers that must be present with exactly these values
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Path must start with this prefix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,

    /// Path must not start with any of these prefixes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_path_prefixes: Vec<String>,

    /// Path must match this regular expression
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_regex: Option<String>,

    /// Required navigation flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation: Option<bool>,

    /// Required precache membership
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precached: Option<bool>,
}

impl RequestMatcherConfig {
    /// Compile into a matcher. Fails on an invalid `path_regex`.
    pub fn compile(&self) -> Result<RequestMatcher, String> {
        let path_regex = match &self.path_regex {
            Some(pattern) => Some(
                Regex::new(pattern)
                    .map_err(|e| format!("invalid path_regex '{}': {}", pattern, e))?,
            ),
            None => None,
        };

        Ok(RequestMatcher {
            config: self.clone(),
            path_regex,
        })
    }
}

/// Compiled declarative matcher
#[derive(Debug, Clone)]
pub struct RequestMatcher {
    config: RequestMatcherConfig,
    path_regex: Option<Regex>,
}

impl RequestMatcher {
    pub fn config(&self) -> &RequestMatcherConfig {
        &self.config
    }
}

impl Matcher for RequestMatcher {
    fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        let config = &self.config;
        let request = ctx.request;
        let path = request.path();

        if config.same_origin.is_some_and(|required| required != ctx.same_origin) {
            return false;
        }
        if config.precached.is_some_and(|required| required != ctx.precached) {
            return false;
        }
        if config
            .navigation
            .is_some_and(|required| required != request.is_navigation())
        {
            return false;
        }
        if !config.destinations.is_empty() && !config.destinations.contains(&request.destination())
        {
            return false;
        }
        if let Some(prefix) = &config.path_prefix {
            if !path.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if config
            .exclude_path_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return false;
        }
        if let Some(regex) = &self.path_regex {
            if !regex.is_match(path) {
                return false;
            }
        }
        config
            .headers
            .iter()
            .all(|(name, value)| request.header(name) == Some(value.as_str()))
    }
}
