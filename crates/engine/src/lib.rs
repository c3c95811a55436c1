//! Adaptive payment routing and resilience engine.
//!
//! The engine takes a payment intent, gathers per-region quotes from an
//! external processor gateway, filters and scores them, commits to a route,
//! and executes it with region fallback — all behind a circuit breaker and
//! an idempotency guard.
//!
//! Entry point is [`RoutingEngine`], built via [`EngineBuilder`]:
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use payrail_client::{GatewayConfig, SignedGatewayClient};
//! use payrail_core::{PaymentIntent, PaymentMethod};
//! use payrail_engine::RoutingEngine;
//! use rust_decimal::Decimal;
//!
//! let client = SignedGatewayClient::new(GatewayConfig::new(
//!     "https://gateway.example.com",
//!     "api-key",
//!     "signing-secret",
//! ))?;
//! let engine = RoutingEngine::builder().gateway(client).build()?;
//!
//! let intent = PaymentIntent::new(
//!     "pi-1",
//!     Decimal::new(2500, 2),
//!     "EUR",
//!     PaymentMethod::BankTransfer,
//! );
//! let result = engine.pay(&intent, &Default::default()).await?;
//! println!("paid through {}", result.region_used);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod circuit_breaker;
pub mod engine;
pub mod error;
mod executor;
pub mod filter;
pub mod scoring;
pub mod strategy;

pub use builder::EngineBuilder;
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, CircuitStats,
};
pub use engine::{GATEWAY_DEPENDENCY, PayOptions, QuoteOptions, RefundOptions, RoutingEngine};
pub use error::EngineError;
pub use filter::{FilterOutcome, FilterReason, FilteredQuote, filter_quotes};
pub use scoring::{DEFAULT_LATENCY_MS, DEFAULT_SUCCESS_RATE, rank, score_quotes};
pub use strategy::decide_route;
