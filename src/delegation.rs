//! Layered delegation: standing intents and delegation tokens.
//!
//! Authority flows down two tiers. The principal signs a *standing intent*:
//! a coarse, long-lived grant scoping what an agent may ever spend. Per use
//! session, the agent narrows that into a *delegation token*: a short-lived
//! credential bound to one operation and one freshly generated session key,
//! signed by the agent's derived key so the agent vouches for the session.
//!
//! The tiering bounds blast radius. A leaked session key dies with its TTL
//! and is scoped to a single operation; widening authority requires the
//! principal's long-term key, which signs rarely. A token carries the hash of
//! the exact intent snapshot it was minted from, so reissuing the intent
//! invalidates every outstanding token derived from it.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::clock::Clock;
use crate::did::Did;
use crate::error::Error;
use crate::passport::SpendingCaps;
use crate::signing::{address_hex, canonical_hash, recover_signer, sign_digest};

/// Default delegation token lifetime. Tokens are meant to be minted per
/// session and discarded; anything much longer defeats the point.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 60;

/// A principal-signed, long-lived authorization for one agent.
///
/// Immutable once signed; changing limits means issuing a fresh intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingIntent {
    /// Principal wallet address that signed the grant.
    pub issuer: Address,
    /// The agent the grant applies to.
    pub subject: Did,
    /// Spending envelope delegated to the agent.
    pub capabilities: SpendingCaps,
    /// Expiry as unix seconds. Expired the instant `now` reaches it.
    pub expiration: u64,
    /// Hex signature by the principal over the canonical binding hash.
    pub signature: String,
}

/// An agent-signed, short-lived authorization for one operation.
///
/// Never persisted beyond its session; the session key lives only in process
/// memory and is dropped when the grant is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationToken {
    /// DID of the agent that minted the token.
    pub issuer: Did,
    /// Address of the ephemeral session key the token empowers.
    pub subject: Address,
    /// Hash of the exact standing intent snapshot this token derives from.
    pub intent_hash: String,
    /// The single operation the session may perform.
    pub operation: String,
    /// Expiry as unix seconds.
    pub expiration: u64,
    /// Hex signature by the agent's derived key (not the session key).
    pub signature: String,
}

impl DelegationToken {
    /// Typed guard for the session holder before performing its operation.
    ///
    /// Verifiers use [`verify_delegation_token`] and branch on a boolean;
    /// the session itself wants a typed error when its credential has aged
    /// out mid-flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExpiredToken`] once the TTL has elapsed.
    pub fn require_active(&self, clock: &dyn Clock) -> Result<(), Error> {
        if clock.unix() >= self.expiration {
            return Err(Error::ExpiredToken);
        }
        Ok(())
    }
}

/// A freshly minted token together with its session key.
pub struct SessionGrant {
    pub token: DelegationToken,
    /// Ephemeral signer the token vouches for. Keep it in process memory and
    /// drop it with the session.
    pub session_key: PrivateKeySigner,
}

/// Sign a standing intent as the principal.
///
/// # Errors
///
/// Returns an error if hashing or signing fails.
pub fn create_standing_intent(
    agent_did: &Did,
    capabilities: SpendingCaps,
    expiration_days: u64,
    principal: &PrivateKeySigner,
    clock: &dyn Clock,
) -> Result<StandingIntent, Error> {
    let issuer = principal.address();
    let expiration = clock.unix() + expiration_days * 86_400;

    let digest = intent_binding_hash(&issuer, agent_did, &capabilities, expiration)?;
    let signature = sign_digest(principal, &digest)?;

    Ok(StandingIntent {
        issuer,
        subject: agent_did.clone(),
        capabilities,
        expiration,
        signature,
    })
}

/// Verify a standing intent.
///
/// `false` once `now` reaches the expiration, and `false` unless the
/// signature recovers to the intent's issuer. Never errors.
#[must_use]
pub fn verify_standing_intent(intent: &StandingIntent, clock: &dyn Clock) -> bool {
    if clock.unix() >= intent.expiration {
        return false;
    }

    let Ok(digest) = intent_binding_hash(
        &intent.issuer,
        &intent.subject,
        &intent.capabilities,
        intent.expiration,
    ) else {
        return false;
    };

    recover_signer(&intent.signature, &digest) == Some(intent.issuer)
}

/// Hash of a complete standing intent, signature included.
///
/// Binding tokens to this hash gives the tightest invalidation: any change to
/// the intent, even a re-signature over identical limits, orphans every
/// token minted from the old snapshot.
///
/// # Errors
///
/// Returns an error if the intent cannot be serialized.
pub fn intent_hash(intent: &StandingIntent) -> Result<String, Error> {
    let value = serde_json::to_value(intent)?;
    let digest = canonical_hash(&value)?;
    Ok(format!("0x{}", hex::encode(digest)))
}

/// Mint a delegation token for one operation under a standing intent.
///
/// Generates a fresh session key pair; the token's subject is the session
/// address, and the signature is made with the agent's derived key.
///
/// # Errors
///
/// Returns [`Error::ExpiredIntent`] when the intent is already expired, or a
/// signing error.
pub fn create_delegation_token(
    agent_signer: &PrivateKeySigner,
    agent_did: &Did,
    intent: &StandingIntent,
    operation: &str,
    ttl_secs: Option<u64>,
    clock: &dyn Clock,
) -> Result<SessionGrant, Error> {
    if clock.unix() >= intent.expiration {
        return Err(Error::ExpiredIntent);
    }

    let session_key = PrivateKeySigner::random();
    let subject = session_key.address();
    let intent_hash = intent_hash(intent)?;
    let expiration = clock.unix() + ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS);

    let digest = token_binding_hash(agent_did, &subject, &intent_hash, operation, expiration)?;
    let signature = sign_digest(agent_signer, &digest)?;

    Ok(SessionGrant {
        token: DelegationToken {
            issuer: agent_did.clone(),
            subject,
            intent_hash,
            operation: operation.to_string(),
            expiration,
            signature,
        },
        session_key,
    })
}

/// Verify a delegation token against the intent it claims to derive from.
///
/// `true` only when the token is unexpired, its `intent_hash` matches this
/// exact intent snapshot, the intent itself still verifies, and the token
/// signature recovers to the agent's wallet address. Never errors.
#[must_use]
pub fn verify_delegation_token(
    token: &DelegationToken,
    intent: &StandingIntent,
    agent_wallet: &Address,
    clock: &dyn Clock,
) -> bool {
    if clock.unix() >= token.expiration {
        return false;
    }

    let Ok(expected_hash) = intent_hash(intent) else {
        return false;
    };
    if token.intent_hash != expected_hash {
        return false;
    }

    if !verify_standing_intent(intent, clock) {
        return false;
    }

    let Ok(digest) = token_binding_hash(
        &token.issuer,
        &token.subject,
        &token.intent_hash,
        &token.operation,
        token.expiration,
    ) else {
        return false;
    };

    recover_signer(&token.signature, &digest) == Some(*agent_wallet)
}

fn intent_binding_hash(
    issuer: &Address,
    subject: &Did,
    capabilities: &SpendingCaps,
    expiration: u64,
) -> Result<[u8; 32], Error> {
    canonical_hash(&json!({
        "issuer": address_hex(issuer),
        "subject": subject.to_string(),
        "capabilities": serde_json::to_value(capabilities)?,
        "expiration": expiration,
    }))
}

fn token_binding_hash(
    issuer: &Did,
    subject: &Address,
    intent_hash: &str,
    operation: &str,
    expiration: u64,
) -> Result<[u8; 32], Error> {
    canonical_hash(&json!({
        "issuer": issuer.to_string(),
        "subject": address_hex(subject),
        "intentHash": intent_hash,
        "operation": operation,
        "expiration": expiration,
    }))
}
