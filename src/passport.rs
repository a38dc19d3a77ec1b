//! Agent passports: signed identity cards.
//!
//! A passport binds an agent DID to a deterministically derived wallet
//! address together with its capability set and spending envelope. The owner
//! signature covers `{did, walletAddress, capabilities, createdAt}`, so none
//! of those can change after issuance; descriptive fields travel alongside
//! but are not load-bearing. Revocation is registry deletion, not an
//! in-object flag.

use std::collections::BTreeSet;
use std::sync::Arc;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::clock::Clock;
use crate::did::Did;
use crate::error::Error;
use crate::keys::KeyDeriver;
use crate::money::Money;
use crate::signing::{address_hex, canonical_hash, recover_signer, sign_digest};

/// Monetary ceilings an agent may spend within.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpendingCaps {
    /// Ceiling for a single payment.
    pub max_per_transaction: Money,
    /// Ceiling for one calendar day.
    pub max_daily: Money,
    /// Optional monthly ceiling.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_monthly: Option<Money>,
    /// When present, payments may only go to these recipients.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub whitelisted_recipients: Option<Vec<Address>>,
}

impl SpendingCaps {
    /// Whether a single payment of `amount` to `recipient` fits these caps.
    ///
    /// Checks the per-transaction ceiling and the recipient whitelist; daily
    /// and monthly accounting is the caller's bookkeeping across payments.
    #[must_use]
    pub fn allows(&self, amount: Money, recipient: &Address) -> bool {
        if amount > self.max_per_transaction {
            return false;
        }
        match &self.whitelisted_recipients {
            Some(list) => list.contains(recipient),
            None => true,
        }
    }
}

/// Request to mint a new passport.
#[derive(Debug, Clone)]
pub struct PassportRequest {
    /// Namespace the agent lives under (e.g. an organization slug).
    pub namespace: String,
    /// Agent name; also the key derivation registry lookup.
    pub agent_name: String,
    /// Agent version; a changed agent gets a new version and a new DID.
    pub version: String,
    /// Capability strings, e.g. `"genome.annotate"`.
    pub capabilities: BTreeSet<String>,
    /// Spending envelope.
    pub spending_caps: SpendingCaps,
    /// Human-readable display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Optional hard expiry for the passport itself.
    pub expires_at: Option<DateTime<Utc>>,
}

/// A signed agent identity card.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passport {
    pub did: Did,
    pub wallet_address: Address,
    pub derivation_path: String,
    pub capabilities: BTreeSet<String>,
    pub spending_caps: SpendingCaps,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Hex signature over the canonical binding hash, made with the derived
    /// agent key.
    pub owner_signature: String,
    /// Compressed SEC1 public key of the derived agent key, hex encoded.
    pub public_key: String,
}

/// Mints passports from a principal's key deriver.
pub struct PassportIssuer {
    keys: KeyDeriver,
    clock: Arc<dyn Clock>,
}

impl PassportIssuer {
    /// Create an issuer.
    #[must_use]
    pub fn new(keys: KeyDeriver, clock: Arc<dyn Clock>) -> Self {
        Self { keys, clock }
    }

    /// Mint and sign a passport.
    ///
    /// The result is returned, not persisted; storing it is a registry
    /// concern.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names/DIDs or if signing fails.
    pub fn issue(&self, request: PassportRequest) -> Result<Passport, Error> {
        validate_agent_name(&request.agent_name)?;
        let did = Did::new(&request.namespace, &request.agent_name, &request.version)?;

        let (signer, derivation_path) = self.keys.signer_for(&request.agent_name)?;
        let wallet_address = signer.address();
        let created_at = self.clock.now();

        let digest = binding_hash(&did, &wallet_address, &request.capabilities, &created_at)?;
        let owner_signature = sign_digest(&signer, &digest)?;
        let public_key = format!(
            "0x{}",
            hex::encode(signer.credential().verifying_key().to_sec1_bytes())
        );

        Ok(Passport {
            did,
            wallet_address,
            derivation_path,
            capabilities: request.capabilities,
            spending_caps: request.spending_caps,
            name: request.name,
            description: request.description,
            created_at,
            expires_at: request.expires_at,
            owner_signature,
            public_key,
        })
    }

    /// The underlying key deriver.
    #[must_use]
    pub fn keys(&self) -> &KeyDeriver {
        &self.keys
    }
}

/// Verify a passport's owner signature.
///
/// Recomputes the canonical binding hash, recovers the signer, and compares
/// it to the passport's wallet address. Never errors: malformed or tampered
/// input yields `false`.
#[must_use]
pub fn verify_passport(passport: &Passport) -> bool {
    let Ok(digest) = binding_hash(
        &passport.did,
        &passport.wallet_address,
        &passport.capabilities,
        &passport.created_at,
    ) else {
        return false;
    };

    match recover_signer(&passport.owner_signature, &digest) {
        Some(recovered) => recovered == passport.wallet_address,
        None => false,
    }
}

/// Canonical hash over the signature-bound passport fields.
///
/// `createdAt` is bound as unix seconds so the hash never depends on a
/// timestamp rendering.
fn binding_hash(
    did: &Did,
    wallet_address: &Address,
    capabilities: &BTreeSet<String>,
    created_at: &DateTime<Utc>,
) -> Result<[u8; 32], Error> {
    canonical_hash(&json!({
        "did": did.to_string(),
        "walletAddress": address_hex(wallet_address),
        "capabilities": capabilities.iter().collect::<Vec<_>>(),
        "createdAt": created_at.timestamp(),
    }))
}

/// Agent names are 1-128 characters, start with an alphanumeric, and contain
/// only alphanumerics, hyphens, and underscores.
pub fn validate_agent_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.len() > 128 {
        return Err(Error::InvalidAgentName(
            "agent name must be 1-128 characters".to_string(),
        ));
    }

    if !name.chars().next().is_some_and(char::is_alphanumeric) {
        return Err(Error::InvalidAgentName(
            "agent name must start with an alphanumeric character".to_string(),
        ));
    }

    if !name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(Error::InvalidAgentName(
            "agent name may only contain alphanumerics, hyphens, and underscores".to_string(),
        ));
    }

    Ok(())
}
