//! Machine-native pay-per-request protocol.
//!
//! A resource server signals that payment is required with HTTP 402 and a
//! [`challenge::PaymentRequirement`]. The [`client::PaymentClient`] signs a
//! typed payment message, drives a two-phase verify/settle exchange with a
//! facilitator, and replays the original request once with settlement proof
//! attached. One state machine per outbound call:
//!
//! ```text
//! Idle -> Requesting -> [2xx: Done]
//!                    -> [402]  -> Signing -> Settling -> Retrying -> Done
//!                                       \-> Failed (approval, rejection, ...)
//! ```

pub mod challenge;
pub mod client;
pub mod facilitator;
pub mod payload;

pub use challenge::{PaymentRequirement, PAYMENT_REQUIRED_HEADER};
pub use client::{PaidResponse, PaymentClient, PaymentClientConfig, PAYMENT_PROOF_HEADER};
pub use facilitator::{FacilitatorClient, SettlementResult, VerifyOutcome};
pub use payload::{PaymentPayload, PaymentSigner};
