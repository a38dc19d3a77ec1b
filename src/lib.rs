//! `AgentPass` SDK for Rust
//!
//! Identity, delegation, and pay-per-request tooling for autonomous agents
//! acting on behalf of a human principal.
//!
//! Three pieces fit together:
//!
//! - **Identity**: per-agent wallets derived deterministically from one
//!   principal secret ([`keys`]), bound into signed passports keyed by DID
//!   ([`passport`], [`did`]) and stored durably in a registry ([`registry`]).
//! - **Delegation**: principal-signed standing intents narrowed into
//!   short-lived, single-operation delegation tokens ([`delegation`]), with
//!   SLA and reputation bookkeeping per agent ([`sla`], [`reputation`]).
//! - **Payments**: an HTTP client that answers 402 challenges by signing a
//!   typed payment, settling it through a facilitator, and replaying the
//!   request with proof attached ([`payment`]).
//!
//! # Quick Start
//!
//! ```rust
//! use agentpass::{KeyDeriver, PathRegistry, SeedSource};
//!
//! // One secret reproduces every agent wallet, on any machine.
//! let source = SeedSource::MasterSecret("correct horse battery staple".into());
//! let keys = KeyDeriver::new(&source, PathRegistry::new()).unwrap();
//!
//! let (signer, path) = keys.signer_for("genome-analyst").unwrap();
//! println!("agent wallet: {} (path {path})", signer.address());
//! ```

pub mod canonicalize;
pub mod clock;
pub mod delegation;
pub mod did;
pub mod error;
pub mod keys;
pub mod money;
pub mod passport;
pub mod payment;
pub mod registry;
pub mod reputation;
pub mod signing;
pub mod sla;

// Re-exports
pub use canonicalize::canonicalize;
pub use clock::{Clock, ManualClock, SystemClock};
pub use delegation::{
    create_delegation_token, create_standing_intent, intent_hash, verify_delegation_token,
    verify_standing_intent, DelegationToken, SessionGrant, StandingIntent,
    DEFAULT_TOKEN_TTL_SECS,
};
pub use did::{Did, DEFAULT_DID_METHOD};
pub use error::Error;
pub use keys::{KeyDeriver, PathRegistry, SeedSource, DEFAULT_DERIVATION_PATH};
pub use money::Money;
pub use passport::{verify_passport, Passport, PassportIssuer, PassportRequest, SpendingCaps};
pub use payment::{
    FacilitatorClient, PaidResponse, PaymentClient, PaymentClientConfig, PaymentPayload,
    PaymentRequirement, PaymentSigner, SettlementResult, PAYMENT_PROOF_HEADER,
    PAYMENT_REQUIRED_HEADER,
};
pub use registry::{AgentRecord, AgentRegistry};
pub use reputation::{AgentReputation, INITIAL_SCORE, MAX_SCORE};
pub use sla::{check_sla_compliance, AgentSla, SlaComplianceReport, SlaPenalty, SlaViolation};
