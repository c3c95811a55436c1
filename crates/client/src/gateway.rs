use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use payrail_core::{
    PaymentIntent, PaymentStatus, RefundIntent, RegionCode, RegionInfo, RegionQuote, RouterId,
};

use crate::error::ClientError;

/// Gateway-side response to a payment execution call.
///
/// The gateway reports only its own view of the payment; the engine wraps
/// this into a full `PaymentResult` with the attempts log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPaymentResponse {
    /// Processor-side status.
    pub status: PaymentStatus,
    /// Provider reference for the charge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_reference: Option<String>,
}

/// Gateway-side response to a refund execution call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefundResponse {
    /// Processor-side status.
    pub status: PaymentStatus,
    /// Provider reference for the refund.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_reference: Option<String>,
}

/// Strongly-typed gateway trait with native `async fn`.
///
/// This trait is **not** object-safe because it uses native `async fn`
/// methods. If you need dynamic dispatch, use [`DynGateway`] instead —
/// every `Gateway` automatically implements `DynGateway` via a blanket
/// implementation.
pub trait Gateway: Send + Sync {
    /// Fetch quotes for an intent, optionally restricted to `regions`.
    fn get_quotes(
        &self,
        intent: &PaymentIntent,
        regions: Option<&[RegionCode]>,
        include_unavailable: bool,
    ) -> impl std::future::Future<Output = Result<Vec<RegionQuote>, ClientError>> + Send;

    /// Execute a payment through the given region and router.
    fn execute_payment(
        &self,
        intent: &PaymentIntent,
        region: &RegionCode,
        router_id: &RouterId,
        idempotency_key: &str,
    ) -> impl std::future::Future<Output = Result<GatewayPaymentResponse, ClientError>> + Send;

    /// Execute a refund in the given region.
    fn execute_refund(
        &self,
        refund: &RefundIntent,
        region: &RegionCode,
        idempotency_key: &str,
    ) -> impl std::future::Future<Output = Result<GatewayRefundResponse, ClientError>> + Send;

    /// List the regions the gateway can route to.
    fn get_regions(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<RegionInfo>, ClientError>> + Send;

    /// Verify the gateway is reachable and credentials are accepted.
    fn health_check(&self) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;
}

/// Object-safe gateway trait for use behind `Arc<dyn DynGateway>`.
///
/// You generally should not implement this trait directly — implement
/// [`Gateway`] and rely on the blanket implementation.
#[async_trait]
pub trait DynGateway: Send + Sync {
    /// Fetch quotes for an intent, optionally restricted to `regions`.
    async fn get_quotes(
        &self,
        intent: &PaymentIntent,
        regions: Option<&[RegionCode]>,
        include_unavailable: bool,
    ) -> Result<Vec<RegionQuote>, ClientError>;

    /// Execute a payment through the given region and router.
    async fn execute_payment(
        &self,
        intent: &PaymentIntent,
        region: &RegionCode,
        router_id: &RouterId,
        idempotency_key: &str,
    ) -> Result<GatewayPaymentResponse, ClientError>;

    /// Execute a refund in the given region.
    async fn execute_refund(
        &self,
        refund: &RefundIntent,
        region: &RegionCode,
        idempotency_key: &str,
    ) -> Result<GatewayRefundResponse, ClientError>;

    /// List the regions the gateway can route to.
    async fn get_regions(&self) -> Result<Vec<RegionInfo>, ClientError>;

    /// Verify the gateway is reachable and credentials are accepted.
    async fn health_check(&self) -> Result<(), ClientError>;
}

/// Blanket implementation bridging the static and dynamic dispatch worlds.
#[async_trait]
impl<T: Gateway + Sync> DynGateway for T {
    async fn get_quotes(
        &self,
        intent: &PaymentIntent,
        regions: Option<&[RegionCode]>,
        include_unavailable: bool,
    ) -> Result<Vec<RegionQuote>, ClientError> {
        Gateway::get_quotes(self, intent, regions, include_unavailable).await
    }

    async fn execute_payment(
        &self,
        intent: &PaymentIntent,
        region: &RegionCode,
        router_id: &RouterId,
        idempotency_key: &str,
    ) -> Result<GatewayPaymentResponse, ClientError> {
        Gateway::execute_payment(self, intent, region, router_id, idempotency_key).await
    }

    async fn execute_refund(
        &self,
        refund: &RefundIntent,
        region: &RegionCode,
        idempotency_key: &str,
    ) -> Result<GatewayRefundResponse, ClientError> {
        Gateway::execute_refund(self, refund, region, idempotency_key).await
    }

    async fn get_regions(&self) -> Result<Vec<RegionInfo>, ClientError> {
        Gateway::get_regions(self).await
    }

    async fn health_check(&self) -> Result<(), ClientError> {
        Gateway::health_check(self).await
    }
}
