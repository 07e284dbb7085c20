//! Slidegate - Pluggable Rate-Limiting Engine
//!
//! This crate implements a rate-limiting layer for request-handling
//! pipelines. Per inbound request it derives a limiting key, resolves the
//! configured quota for the route, and evaluates a sliding time window
//! against an external ordered-set store (Redis, or an in-process map for
//! tests and single-node deployments).

pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod store;
