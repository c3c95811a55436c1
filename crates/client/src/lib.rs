//! Signed gateway client for the payrail routing engine.
//!
//! Defines the [`Gateway`]/[`DynGateway`] trait pair the engine dispatches
//! through, the reqwest-based [`SignedGatewayClient`] that signs every
//! outbound call, and webhook signature verification.

pub mod error;
pub mod gateway;
pub mod http;
pub mod signing;
pub mod webhook;

pub use error::ClientError;
pub use gateway::{DynGateway, Gateway, GatewayPaymentResponse, GatewayRefundResponse};
pub use http::{GatewayConfig, SignedGatewayClient};
pub use signing::{RequestSignature, sign_now, sign_request};
pub use webhook::{DEFAULT_TOLERANCE, verify_webhook};
