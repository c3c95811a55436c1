use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, PaymentError};
use crate::types::{IntentId, PaymentMethod};

/// Immutable description of what to pay.
///
/// Created by the caller and never mutated by the engine. Validation happens
/// once, before any gateway call is made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Unique intent identifier.
    pub id: IntentId,
    /// Payment amount. Must be strictly positive.
    pub amount: Decimal,
    /// ISO 4217 currency code, uppercase.
    pub currency: String,
    /// Payment method.
    pub method: PaymentMethod,
    /// Country of the paying user, if known (ISO 3166-1 alpha-2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_country: Option<String>,
    /// Country of the merchant, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_country: Option<String>,
    /// Method-specific instrument token (card token, wallet handle, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_token: Option<String>,
    /// Free-form metadata attached by the caller.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// Create a new intent with the required fields.
    #[must_use]
    pub fn new(
        id: impl Into<IntentId>,
        amount: Decimal,
        currency: impl Into<String>,
        method: PaymentMethod,
    ) -> Self {
        Self {
            id: id.into(),
            amount,
            currency: currency.into(),
            method,
            user_country: None,
            merchant_country: None,
            method_token: None,
            metadata: HashMap::new(),
        }
    }

    /// Attach the user's country.
    #[must_use]
    pub fn with_user_country(mut self, country: impl Into<String>) -> Self {
        self.user_country = Some(country.into());
        self
    }

    /// Attach the merchant's country.
    #[must_use]
    pub fn with_merchant_country(mut self, country: impl Into<String>) -> Self {
        self.merchant_country = Some(country.into());
        self
    }

    /// Attach a method-specific instrument token.
    #[must_use]
    pub fn with_method_token(mut self, token: impl Into<String>) -> Self {
        self.method_token = Some(token.into());
        self
    }

    /// Attach caller metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validate the intent.
    ///
    /// Validation errors are surfaced immediately, before any gateway call.
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.id.as_str().is_empty() {
            return Err(PaymentError::new(
                ErrorCode::MissingField,
                "intent id must not be empty",
            ));
        }
        if self.amount <= Decimal::ZERO {
            return Err(PaymentError::new(
                ErrorCode::InvalidAmount,
                format!("amount must be positive, got {}", self.amount),
            ));
        }
        if !is_iso4217(&self.currency) {
            return Err(PaymentError::new(
                ErrorCode::InvalidCurrency,
                format!("currency must be a 3-letter ISO 4217 code, got {:?}", self.currency),
            ));
        }
        if self.method.requires_token()
            && self.method_token.as_deref().is_none_or(str::is_empty)
        {
            return Err(PaymentError::new(
                ErrorCode::InvalidToken,
                format!("payment method {} requires a method token", self.method),
            ));
        }
        Ok(())
    }
}

/// Immutable description of a refund against a prior payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundIntent {
    /// Unique refund identifier.
    pub id: IntentId,
    /// Provider reference of the payment being refunded.
    pub payment_reference: String,
    /// Refund amount. Must be strictly positive.
    pub amount: Decimal,
    /// ISO 4217 currency code, uppercase.
    pub currency: String,
    /// Optional reason recorded with the refund.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RefundIntent {
    /// Create a new refund intent.
    #[must_use]
    pub fn new(
        id: impl Into<IntentId>,
        payment_reference: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            payment_reference: payment_reference.into(),
            amount,
            currency: currency.into(),
            reason: None,
        }
    }

    /// Validate the refund intent.
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.payment_reference.is_empty() {
            return Err(PaymentError::new(
                ErrorCode::MissingField,
                "payment reference must not be empty",
            ));
        }
        if self.amount <= Decimal::ZERO {
            return Err(PaymentError::new(
                ErrorCode::InvalidAmount,
                format!("refund amount must be positive, got {}", self.amount),
            ));
        }
        if !is_iso4217(&self.currency) {
            return Err(PaymentError::new(
                ErrorCode::InvalidCurrency,
                format!("currency must be a 3-letter ISO 4217 code, got {:?}", self.currency),
            ));
        }
        Ok(())
    }
}

/// Check that a currency code is three uppercase ASCII letters.
fn is_iso4217(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}
