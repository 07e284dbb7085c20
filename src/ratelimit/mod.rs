//! Rate limiting logic: key extraction, strategies, and the orchestrator.

mod extractor;
mod limiter;
mod request;
mod strategy;

pub use extractor::{HeaderKeyExtractor, KeyDeriveFn, KeyExtractor};
pub use limiter::{Outcome, RateLimiter};
pub use request::RequestParts;
pub use strategy::{
    strategy_from_name, LimitRequest, LimitResult, SlidingWindow, State, Strategy, SLIDING_WINDOW,
};

/// Response metadata field reporting window occupancy.
pub const RATE_LIMITING_TOTAL_REQUESTS: &str = "Rate-Limiting-Total-Requests";
/// Response metadata field reporting the Allow/Deny decision.
pub const RATE_LIMITING_STATE: &str = "Rate-Limiting-State";
/// Response metadata field reporting the advisory window expiry (RFC3339).
pub const RATE_LIMITING_EXPIRES_AT: &str = "Rate-Limiting-Expires-At";
