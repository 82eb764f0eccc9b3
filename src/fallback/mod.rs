//! Fallback registry
//!
//! When a routed request fails completely (no cached response and no network),
//! the registry is consulted in registration order. The first rule whose
//! matcher accepts the request supplies a substitute read from the precache.

use crate::config::FallbackConfig;
use crate::precache::PrecacheStore;
use crate::request::{RequestDescriptor, Response};
use crate::router::{MatchContext, Matcher};

/// Substitute `url` for failed requests accepted by `matcher`
pub struct FallbackRule {
    url: String,
    matcher: Box<dyn Matcher>,
}

impl FallbackRule {
    pub fn new(url: impl Into<String>, matcher: impl Matcher + 'static) -> Self {
        Self {
            url: url.into(),
            matcher: Box::new(matcher),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for FallbackRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackRule").field("url", &self.url).finish()
    }
}

/// Ordered, immutable set of fallback rules
#[derive(Debug, Default)]
pub struct FallbackRegistry {
    rules: Vec<FallbackRule>,
}

impl FallbackRegistry {
    pub fn new(rules: Vec<FallbackRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(configs: &[FallbackConfig]) -> Result<Self, String> {
        let rules = configs
            .iter()
            .map(|config| {
                let matcher = config
                    .matcher
                    .compile()
                    .map_err(|e| format!("Fallback '{}': {}", config.url, e))?;
                Ok(FallbackRule::new(config.url.clone(), matcher))
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[FallbackRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Substitute for a failed request, if any.
    ///
    /// Only the first matching rule is considered; if its substitute is not
    /// precached there is no fallback.
    pub async fn resolve(
        &self,
        ctx: &MatchContext<'_>,
        precache: &PrecacheStore,
    ) -> Option<Response> {
        let rule = self.rules.iter().find(|rule| rule.matcher.matches(ctx))?;

        match precache.match_path(&rule.url).await {
            Some(response) => {
                tracing::info!(
                    url = %ctx.request.url(),
                    fallback = %rule.url,
                    "Serving offline fallback"
                );
                Some(response)
            }
            None => {
                tracing::warn!(
                    url = %ctx.request.url(),
                    fallback = %rule.url,
                    "Fallback matched but substitute is not precached"
                );
                None
            }
        }
    }

    /// Convenience for callers that only hold the request
    pub async fn resolve_request(
        &self,
        request: &RequestDescriptor,
        same_origin: bool,
        precache: &PrecacheStore,
    ) -> Option<Response> {
        let precached = precache.contains(request.url());
        let ctx = MatchContext::new(request, same_origin, precached);
        self.resolve(&ctx, precache).await
    }
}
