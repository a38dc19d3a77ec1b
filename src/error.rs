//! Error types for the `AgentPass` SDK.

use thiserror::Error;

use crate::money::Money;

/// Main error type for the `AgentPass` SDK.
///
/// Verification predicates (`verify_passport`, `verify_standing_intent`,
/// `verify_delegation_token`) never produce this type; invalid input yields
/// `false` so callers can branch without error handling. Everything else
/// (signing, settlement, registry, network) surfaces a typed variant here.
#[derive(Error, Debug)]
pub enum Error {
    /// No principal authentication material is available to derive keys from.
    #[error("No signer available: principal authentication material is missing")]
    NoSignerAvailable,

    /// A 402 response carried no usable payment requirement.
    #[error("Malformed payment challenge: {0}")]
    MalformedChallenge(String),

    /// The requested amount exceeds the configured auto-approve ceiling.
    ///
    /// Carries both sides so a human-facing layer can prompt for an explicit
    /// override.
    #[error("Payment of {amount} exceeds the auto-approve ceiling of {ceiling}")]
    ApprovalRequired { amount: Money, ceiling: Money },

    /// The facilitator declined to verify or settle the payment.
    #[error("Payment rejected: {0}")]
    PaymentRejected(String),

    /// The resource server demanded payment again after a successful settlement.
    #[error("Received a second payment challenge after settlement")]
    UnexpectedSecondChallenge,

    /// A standing intent past its expiration was used to mint a token.
    #[error("Standing intent is expired")]
    ExpiredIntent,

    /// A delegation token past its expiration was presented for use.
    #[error("Delegation token is expired")]
    ExpiredToken,

    /// A DID string did not match `did:<method>:<namespace>/<name>-<version>`.
    #[error("Invalid DID: {0}")]
    InvalidDid(String),

    /// Agent name violates the naming rules (1-128 chars, leading
    /// alphanumeric, then alphanumeric/hyphen/underscore).
    #[error("Invalid agent name: {0}")]
    InvalidAgentName(String),

    /// A currency string could not be parsed or overflows the representable range.
    #[error("Invalid amount: {0}")]
    Currency(String),

    /// Registration attempted for a DID that already has a record.
    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    /// No registry record exists for the DID.
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// A passport presented for registration does not verify.
    #[error("Invalid passport: {0}")]
    InvalidPassport(String),

    /// Key material could not be loaded or derived.
    #[error("Key error: {0}")]
    Key(String),

    /// Cryptographic signing error.
    #[error("Signing error: {0}")]
    Signing(String),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid value for canonicalization.
    #[error("Canonicalization error: {0}")]
    Canonicalization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}
