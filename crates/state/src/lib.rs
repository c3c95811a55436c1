//! In-memory stateful leaf components for the payrail routing engine: the
//! TTL quote cache and the idempotency guard.
//!
//! Both structures manage their own internal map and are safe for
//! concurrent access; neither is durable across process restarts, and each
//! process keeps its own state.

pub mod cache;
pub mod idempotency;

pub use cache::{CacheConfig, CacheStats, QuoteCache};
pub use idempotency::{CheckOutcome, IdempotencyConfig, IdempotencyGuard, IdempotencyStatus};
