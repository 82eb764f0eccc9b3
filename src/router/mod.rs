// Router module

use http::Method;
use std::sync::Arc;

use crate::cache::CacheStorage;
use crate::config::RouteConfig;
use crate::expiration::ExpirationPolicy;
use crate::fetch::Fetcher;
use crate::strategy::StrategyExecutor;

pub mod matcher;

pub use matcher::{MatchContext, Matcher, RequestMatcher, RequestMatcherConfig};

/// A matcher paired with the strategy that serves what it matches
pub struct Route {
    name: String,
    method: Method,
    matcher: Box<dyn Matcher>,
    executor: Arc<StrategyExecutor>,
}

impl Route {
    /// Create a GET route
    pub fn new(
        name: impl Into<String>,
        matcher: impl Matcher + 'static,
        executor: Arc<StrategyExecutor>,
    ) -> Self {
        Self {
            name: name.into(),
            method: Method::GET,
            matcher: Box::new(matcher),
            executor,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn executor(&self) -> &Arc<StrategyExecutor> {
        &self.executor
    }

    fn accepts(&self, ctx: &MatchContext<'_>) -> bool {
        ctx.request.method() == self.method && self.matcher.matches(ctx)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("handler", &self.executor.handler())
            .field("cache", &self.executor.cache().name())
            .finish()
    }
}

/// Outcome of routing one request
#[derive(Debug)]
pub enum RouteDecision<'a> {
    Matched(&'a Route),
    /// No route claimed the request; it goes to the network untouched
    Passthrough,
}

impl RouteDecision<'_> {
    pub fn is_passthrough(&self) -> bool {
        matches!(self, RouteDecision::Passthrough)
    }
}

/// Ordered route table. The first route whose method and matcher accept a
/// request handles it.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new(routes: Vec<Route>) -> Self {
        Router { routes }
    }

    /// Build the route table, opening each route's named cache in `storage`
    pub fn from_config(
        configs: &[RouteConfig],
        storage: &CacheStorage,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, String> {
        let mut router = Router::default();
        for config in configs {
            let matcher = config
                .matcher
                .compile()
                .map_err(|e| format!("Route '{}': {}", config.name, e))?;
            let method = Method::from_bytes(config.method.as_bytes())
                .map_err(|_| format!("Route '{}': invalid method '{}'", config.name, config.method))?;

            let executor = StrategyExecutor::new(
                config.handler,
                storage.open(config.cache_name()),
                ExpirationPolicy::new(config.expiration.clone()),
                fetcher.clone(),
            )
            .with_ignore_search(config.ignore_search)
            .with_cacheable_statuses(config.cacheable_statuses.clone());

            tracing::debug!(
                route = %config.name,
                cache = %config.cache_name(),
                handler = config.handler.as_str(),
                "Registered route"
            );
            router.register(
                Route::new(config.name.clone(), matcher, Arc::new(executor)).with_method(method),
            );
        }
        Ok(router)
    }

    /// Append a route with the lowest precedence so far
    pub fn register(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn route<'a>(&'a self, ctx: &MatchContext<'_>) -> RouteDecision<'a> {
        match self.routes.iter().find(|route| route.accepts(ctx)) {
            Some(route) => {
                tracing::trace!(route = %route.name, url = %ctx.request.url(), "Route matched");
                RouteDecision::Matched(route)
            }
            None => RouteDecision::Passthrough,
        }
    }
}
