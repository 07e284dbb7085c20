//! The rate-limit orchestrator: binds extractor, strategy, and
//! configuration into a per-request decision.

use std::sync::Arc;

use tracing::{debug, instrument};

use super::extractor::KeyExtractor;
use super::request::RequestParts;
use super::strategy::{strategy_from_name, LimitRequest, LimitResult, State, Strategy};
use crate::clock::SystemClock;
use crate::config::SlidegateConfig;
use crate::error::Result;
use crate::store::WindowStore;

/// Per-request outcome handed back to the surrounding pipeline.
///
/// `Allow` and `Deny` carry the [`LimitResult`] so the caller can attach
/// the response metadata in both cases; `Passthrough` means no rule applied
/// and the request must proceed unchecked.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Admit the request.
    Allow(LimitResult),
    /// Reject the request ("too many requests").
    Deny(LimitResult),
    /// No rate limit configured for this route; proceed normally.
    Passthrough,
}

/// The rate-limiting engine's entry point.
///
/// Construction resolves the configured strategy once; evaluation is a
/// single pass per request with no retries.
pub struct RateLimiter {
    config: SlidegateConfig,
    extractor: Box<dyn KeyExtractor>,
    strategy: Box<dyn Strategy>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter over the given store, resolving the strategy named
    /// in the configuration.
    pub fn new(
        config: SlidegateConfig,
        extractor: Box<dyn KeyExtractor>,
        store: Arc<dyn WindowStore>,
    ) -> Result<Self> {
        config.validate()?;
        let strategy = strategy_from_name(
            &config.strategy,
            store,
            Arc::new(SystemClock),
            config.lock_shards,
        )?;
        Ok(Self {
            config,
            extractor,
            strategy,
        })
    }

    /// Create a limiter with an explicitly built strategy, bypassing the
    /// name registry.
    pub fn with_strategy(
        config: SlidegateConfig,
        extractor: Box<dyn KeyExtractor>,
        strategy: Box<dyn Strategy>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            extractor,
            strategy,
        })
    }

    /// Evaluate one request against its configured quota.
    ///
    /// Key-extraction failures are client errors and short-circuit before
    /// any store access; store failures surface as internal errors and the
    /// request is not admitted. Callers can classify via
    /// [`crate::error::SlidegateError::is_client_error`].
    #[instrument(
        skip(self, request),
        fields(method = %request.method(), path = %request.path())
    )]
    pub async fn evaluate(&self, request: &RequestParts) -> Result<Outcome> {
        let key = self
            .extractor
            .extract_key(request, self.config.apply_user_rate_limit_to_all_paths)?;

        let route_key = request.route_key();
        let Some(window) = self.config.resolve(&route_key) else {
            debug!(route = %route_key, "No rate limit configured, passing through");
            return Ok(Outcome::Passthrough);
        };

        let result = self
            .strategy
            .run(&LimitRequest {
                key,
                limit: window.limit,
                window: window.window,
            })
            .await?;

        debug!(
            route = %route_key,
            state = %result.state,
            total_requests = result.total_requests,
            "Rate limit decision made"
        );

        Ok(match result.state {
            State::Allow => Outcome::Allow(result),
            State::Deny => Outcome::Deny(result),
        })
    }
}
