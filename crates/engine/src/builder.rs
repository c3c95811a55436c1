//! Construction of a [`RoutingEngine`].

use std::sync::Arc;

use payrail_client::DynGateway;
use payrail_core::{ComplianceConfig, ErrorCode, PaymentError, RoutingConfig};
use payrail_state::{CacheConfig, IdempotencyConfig, IdempotencyGuard, QuoteCache};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::engine::{GATEWAY_DEPENDENCY, RoutingEngine};

/// Builder for [`RoutingEngine`]. A gateway is the only required piece;
/// everything else has production defaults.
#[derive(Default)]
pub struct EngineBuilder {
    gateway: Option<Arc<dyn DynGateway>>,
    routing: RoutingConfig,
    compliance: ComplianceConfig,
    cache_config: CacheConfig,
    idempotency_config: IdempotencyConfig,
    breaker_config: CircuitBreakerConfig,
    gateway_breaker: Option<CircuitBreaker>,
    webhook_secret: Option<Vec<u8>>,
}

impl EngineBuilder {
    /// Create a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gateway the engine routes through.
    #[must_use]
    pub fn gateway(mut self, gateway: impl DynGateway + 'static) -> Self {
        self.gateway = Some(Arc::new(gateway));
        self
    }

    /// Set a shared gateway handle.
    #[must_use]
    pub fn gateway_arc(mut self, gateway: Arc<dyn DynGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Set the routing configuration.
    #[must_use]
    pub fn routing(mut self, routing: RoutingConfig) -> Self {
        self.routing = routing;
        self
    }

    /// Set the compliance configuration.
    #[must_use]
    pub fn compliance(mut self, compliance: ComplianceConfig) -> Self {
        self.compliance = compliance;
        self
    }

    /// Set the quote cache configuration.
    #[must_use]
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Set the idempotency guard configuration.
    #[must_use]
    pub fn idempotency_config(mut self, config: IdempotencyConfig) -> Self {
        self.idempotency_config = config;
        self
    }

    /// Set the gateway circuit breaker configuration.
    #[must_use]
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    /// Install a pre-built gateway breaker, e.g. with transition hooks or
    /// a failure predicate attached. Must be named for the gateway
    /// dependency.
    #[must_use]
    pub fn gateway_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.gateway_breaker = Some(breaker);
        self
    }

    /// Set the secret used to verify incoming webhooks.
    #[must_use]
    pub fn webhook_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Validate the configuration and build the engine.
    pub fn build(self) -> Result<RoutingEngine, PaymentError> {
        let Some(gateway) = self.gateway else {
            return Err(PaymentError::new(
                ErrorCode::MissingField,
                "a gateway is required to build the engine",
            ));
        };
        self.routing.validate()?;

        let mut breakers = CircuitBreakerRegistry::new();
        match self.gateway_breaker {
            Some(breaker) => {
                breaker.config().validate()?;
                if breaker.dependency_name() != GATEWAY_DEPENDENCY {
                    return Err(PaymentError::new(
                        ErrorCode::InvalidIntent,
                        format!(
                            "gateway breaker must be named {GATEWAY_DEPENDENCY:?}, got {:?}",
                            breaker.dependency_name()
                        ),
                    ));
                }
                breakers.insert(breaker);
            }
            None => {
                self.breaker_config.validate()?;
                breakers.register(GATEWAY_DEPENDENCY, self.breaker_config);
            }
        }

        Ok(RoutingEngine {
            gateway,
            routing: self.routing,
            compliance: self.compliance,
            cache: QuoteCache::new(self.cache_config),
            idempotency: IdempotencyGuard::new(self.idempotency_config),
            breakers,
            webhook_secret: self.webhook_secret,
        })
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("has_gateway", &self.gateway.is_some())
            .field("routing", &self.routing)
            .finish_non_exhaustive()
    }
}
