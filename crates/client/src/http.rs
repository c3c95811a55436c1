//! Signed HTTP client for the external processor gateway.

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use payrail_core::{PaymentIntent, RefundIntent, RegionCode, RegionInfo, RegionQuote, RouterId};

use crate::error::{ClientError, code_from_status, code_from_wire};
use crate::gateway::{Gateway, GatewayPaymentResponse, GatewayRefundResponse};
use crate::signing::sign_now;

/// Configuration for the signed gateway client.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway, without a trailing slash.
    pub base_url: String,
    /// API key sent with every request.
    pub api_key: String,
    /// HMAC signing secret shared with the gateway.
    pub signing_secret: Vec<u8>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Build a config with the default 10-second timeout.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        signing_secret: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            signing_secret: signing_secret.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Override the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Gateway client that signs every request and enforces the configured
/// timeout. Stateless aside from configuration.
#[derive(Debug)]
pub struct SignedGatewayClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

// -- Wire types ---------------------------------------------------------------

#[derive(Debug, Serialize)]
struct QuotesRequest<'a> {
    intent: &'a PaymentIntent,
    #[serde(skip_serializing_if = "Option::is_none")]
    regions: Option<&'a [RegionCode]>,
    include_unavailable: bool,
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    quotes: Vec<RegionQuote>,
}

#[derive(Debug, Serialize)]
struct PaymentRequest<'a> {
    intent: &'a PaymentIntent,
    region: &'a RegionCode,
    router_id: &'a RouterId,
}

#[derive(Debug, Serialize)]
struct RefundRequest<'a> {
    refund: &'a RefundIntent,
    region: &'a RegionCode,
}

#[derive(Debug, Deserialize)]
struct RegionsResponse {
    regions: Vec<RegionInfo>,
}

/// Error body shape the gateway uses for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl SignedGatewayClient {
    /// Create a client from the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Send a signed request and decode the JSON response.
    async fn send<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
        idempotency_key: Option<&str>,
    ) -> Result<R, ClientError> {
        let body_bytes = match body {
            Some(body) => serde_json::to_vec(body)
                .map_err(|e| ClientError::Decode(format!("failed to encode request: {e}")))?,
            None => Vec::new(),
        };
        let sig = sign_now(&self.config.signing_secret, method.as_str(), path, &body_bytes);

        let url = format!("{}{path}", self.config.base_url);
        let mut request = self
            .http
            .request(method, &url)
            .header("x-api-key", &self.config.api_key)
            .header("x-timestamp", sig.timestamp.to_string())
            .header("x-nonce", &sig.nonce)
            .header("x-signature", &sig.signature);
        if !body_bytes.is_empty() {
            request = request
                .header("content-type", "application/json")
                .body(body_bytes);
        }
        if let Some(key) = idempotency_key {
            request = request.header("idempotency-key", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(self.config.timeout)
            } else {
                ClientError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let parsed: ErrorBody = serde_json::from_str(&text).unwrap_or(ErrorBody {
                code: None,
                message: None,
            });
            let code = parsed
                .code
                .as_deref()
                .and_then(code_from_wire)
                .unwrap_or_else(|| code_from_status(status.as_u16()));
            let message = parsed
                .message
                .unwrap_or_else(|| format!("gateway returned HTTP {status}"));
            warn!(%status, %code, "gateway call failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                code,
                message,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

impl Gateway for SignedGatewayClient {
    #[instrument(skip_all, fields(intent.id = %intent.id))]
    async fn get_quotes(
        &self,
        intent: &PaymentIntent,
        regions: Option<&[RegionCode]>,
        include_unavailable: bool,
    ) -> Result<Vec<RegionQuote>, ClientError> {
        let request = QuotesRequest {
            intent,
            regions,
            include_unavailable,
        };
        let response: QuotesResponse = self
            .send(Method::POST, "/v1/quotes", Some(&request), None)
            .await?;
        debug!(count = response.quotes.len(), "fetched quotes");
        Ok(response.quotes)
    }

    #[instrument(skip_all, fields(intent.id = %intent.id, %region))]
    async fn execute_payment(
        &self,
        intent: &PaymentIntent,
        region: &RegionCode,
        router_id: &RouterId,
        idempotency_key: &str,
    ) -> Result<GatewayPaymentResponse, ClientError> {
        let request = PaymentRequest {
            intent,
            region,
            router_id,
        };
        self.send(
            Method::POST,
            "/v1/payments",
            Some(&request),
            Some(idempotency_key),
        )
        .await
    }

    #[instrument(skip_all, fields(refund.id = %refund.id, %region))]
    async fn execute_refund(
        &self,
        refund: &RefundIntent,
        region: &RegionCode,
        idempotency_key: &str,
    ) -> Result<GatewayRefundResponse, ClientError> {
        let request = RefundRequest { refund, region };
        self.send(
            Method::POST,
            "/v1/refunds",
            Some(&request),
            Some(idempotency_key),
        )
        .await
    }

    #[instrument(skip_all)]
    async fn get_regions(&self) -> Result<Vec<RegionInfo>, ClientError> {
        let response: RegionsResponse = self
            .send(Method::GET, "/v1/regions", None::<&()>, None)
            .await?;
        Ok(response.regions)
    }

    #[instrument(skip_all)]
    async fn health_check(&self) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .send(Method::GET, "/v1/health", None::<&()>, None)
            .await?;
        Ok(())
    }
}
