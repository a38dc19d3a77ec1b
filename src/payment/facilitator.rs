//! Facilitator client: the verify/settle oracle.
//!
//! The facilitator is opaque to this crate. It exposes `POST /verify` and
//! `POST /settle` and everything behind them (chains, contracts, finality) is
//! its business. A payment is treated as made only after `/settle` reports a
//! transaction; a failure at either step is terminal for the attempt.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::payment::payload::PaymentPayload;

/// Outcome of `POST /verify`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub valid: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Terminal outcome of one payment attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Wire shape of `POST /settle` responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleResponse {
    #[serde(default)]
    transaction_hash: Option<String>,
    #[serde(default)]
    block_number: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for one facilitator endpoint.
pub struct FacilitatorClient {
    http: Client,
    base_url: String,
}

impl FacilitatorClient {
    /// Create a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Ask the facilitator whether a signed payment is acceptable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on transport failure and
    /// [`Error::PaymentRejected`] on a non-success status.
    pub async fn verify(&self, payment: &PaymentPayload) -> Result<VerifyOutcome, Error> {
        let url = format!("{}/verify", self.base_url);
        debug!(url = %url, nonce = payment.nonce, "verifying payment");

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "payment": payment }))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::PaymentRejected(format!(
                "facilitator verify returned HTTP {}",
                response.status().as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Http(format!("unparseable verify response: {e}")))
    }

    /// Submit a verified payment for settlement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on transport failure and
    /// [`Error::PaymentRejected`] on a non-success status.
    pub async fn settle(&self, payment: &PaymentPayload) -> Result<SettlementResult, Error> {
        let url = format!("{}/settle", self.base_url);
        debug!(url = %url, nonce = payment.nonce, "settling payment");

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "payment": payment }))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::PaymentRejected(format!(
                "facilitator settle returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let settle: SettleResponse = response
            .json()
            .await
            .map_err(|e| Error::Http(format!("unparseable settle response: {e}")))?;

        Ok(SettlementResult {
            success: settle.error.is_none() && settle.transaction_hash.is_some(),
            transaction_hash: settle.transaction_hash,
            block_number: settle.block_number,
            error: settle.error,
        })
    }

    /// Facilitator base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client =
            FacilitatorClient::new("https://pay.example.dev/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://pay.example.dev");
    }

    #[test]
    fn test_settlement_success_requires_transaction() {
        let with_tx: SettleResponse =
            serde_json::from_str(r#"{"transactionHash": "0xabc", "blockNumber": 7}"#).unwrap();
        assert!(with_tx.error.is_none() && with_tx.transaction_hash.is_some());

        let with_error: SettleResponse =
            serde_json::from_str(r#"{"error": "nonce already used"}"#).unwrap();
        assert!(with_error.error.is_some());

        let empty: SettleResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.transaction_hash.is_none());
    }
}
