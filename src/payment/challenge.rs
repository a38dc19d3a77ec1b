//! Payment challenge parsing.
//!
//! A 402 response carries its [`PaymentRequirement`] as base64-encoded JSON
//! in the `X-Payment-Required` header; servers that cannot set headers may
//! put the bare JSON object in the response body instead. The requirement is
//! ephemeral: it exists for one challenge/response exchange and is never
//! persisted.

use alloy::primitives::Address;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::money::Money;

/// Header a 402 response carries its payment requirement in.
pub const PAYMENT_REQUIRED_HEADER: &str = "x-payment-required";

/// What a resource server demands before serving a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    /// The route being paid for.
    pub route: String,
    /// Price as a decimal currency string, e.g. `"$0.25"`.
    pub amount: Money,
    /// Address the payment must go to.
    pub receiver: Address,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

impl PaymentRequirement {
    /// Parse a requirement from the challenge header value.
    ///
    /// Base64-encoded JSON is the canonical form; a bare JSON value is
    /// tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedChallenge`] when neither form parses.
    pub fn from_header_value(raw: &str) -> Result<Self, Error> {
        if let Ok(decoded) = BASE64.decode(raw.trim()) {
            if let Ok(requirement) = serde_json::from_slice::<Self>(&decoded) {
                return Ok(requirement);
            }
        }

        serde_json::from_str(raw).map_err(|e| {
            Error::MalformedChallenge(format!(
                "challenge header is neither base64 JSON nor JSON: {e}"
            ))
        })
    }

    /// Parse a requirement from a 402 response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedChallenge`] when the body is not a
    /// requirement object.
    pub fn from_body(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::MalformedChallenge(format!("challenge body did not parse: {e}")))
    }

    /// Encode as a challenge header value (base64 JSON).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_header_value(&self) -> Result<String, Error> {
        let json = serde_json::to_string(self)?;
        Ok(BASE64.encode(json))
    }
}
