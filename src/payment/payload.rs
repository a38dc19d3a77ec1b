//! Typed-data payment signing.
//!
//! A payment is authorized by signing an EIP-712 message binding the token,
//! amount, receiver, sender, nonce, and deadline under a domain of
//! `{name, version, chainId, verifyingContract}`. Nonces are strictly
//! increasing within one signer session so a settled payload can never be
//! replayed; callers must not share a [`PaymentSigner`] across concurrent
//! signing without serializing; the counter is atomic, but interleaved
//! settlement ordering is their problem.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::{address, Address, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::Error;
use crate::payment::challenge::PaymentRequirement;

/// USDC contract on Base mainnet, the default settlement asset.
pub const USDC_ADDRESS: Address = address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// Base mainnet chain id.
pub const BASE_CHAIN_ID: u64 = 8453;

/// Network identifier carried in payment payloads.
pub const BASE_NETWORK: &str = "base";

/// How long a signed payment stays valid.
pub const PAYMENT_DEADLINE_SECS: u64 = 3_600;

/// Default EIP-712 domain name.
pub const DEFAULT_DOMAIN_NAME: &str = "AgentPass";

/// Default EIP-712 domain version.
pub const DEFAULT_DOMAIN_VERSION: &str = "1";

sol! {
    /// The typed message a payment signature covers.
    struct PaymentAuthorization {
        address token;
        uint256 amount;
        address receiver;
        address sender;
        uint256 nonce;
        uint256 deadline;
    }
}

/// A signed payment, one per attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub network: String,
    pub token: Address,
    /// Amount in minor units, as a decimal string.
    pub amount: String,
    pub receiver: Address,
    pub sender: Address,
    /// Hex-encoded EIP-712 signature.
    pub signature: String,
    pub nonce: u64,
    /// Unix seconds after which the authorization is dead.
    pub deadline: u64,
    pub chain_id: u64,
}

/// Signs payment authorizations with a monotonic session nonce.
pub struct PaymentSigner {
    signer: PrivateKeySigner,
    domain: Eip712Domain,
    network: String,
    token: Address,
    chain_id: u64,
    nonce: AtomicU64,
}

impl PaymentSigner {
    /// Create a signer bound to a settlement domain.
    #[must_use]
    pub fn new(
        signer: PrivateKeySigner,
        network: &str,
        token: Address,
        chain_id: u64,
        domain_name: &str,
        domain_version: &str,
    ) -> Self {
        let domain = Eip712Domain::new(
            Some(domain_name.to_string().into()),
            Some(domain_version.to_string().into()),
            Some(U256::from(chain_id)),
            Some(token),
            None,
        );

        Self {
            signer,
            domain,
            network: network.to_string(),
            token,
            chain_id,
            nonce: AtomicU64::new(0),
        }
    }

    /// The paying wallet address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Allocate the next session nonce. Strictly increasing.
    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Sign a payment satisfying `requirement`.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign_payment(
        &self,
        requirement: &PaymentRequirement,
        clock: &dyn Clock,
    ) -> Result<PaymentPayload, Error> {
        let nonce = self.next_nonce();
        let deadline = clock.unix() + PAYMENT_DEADLINE_SECS;
        let amount_units = requirement.amount.minor_units();
        let sender = self.signer.address();

        let message = PaymentAuthorization {
            token: self.token,
            amount: U256::from(amount_units),
            receiver: requirement.receiver,
            sender,
            nonce: U256::from(nonce),
            deadline: U256::from(deadline),
        };

        let digest = message.eip712_signing_hash(&self.domain);
        let signature = self
            .signer
            .sign_hash_sync(&digest)
            .map_err(|e| Error::Signing(e.to_string()))?;

        Ok(PaymentPayload {
            network: self.network.clone(),
            token: self.token,
            amount: amount_units.to_string(),
            receiver: requirement.receiver,
            sender,
            signature: format!("0x{}", hex::encode(signature.as_bytes())),
            nonce,
            deadline,
            chain_id: self.chain_id,
        })
    }
}
