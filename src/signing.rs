//! Envelope hashing, signing, and signer recovery.
//!
//! Every identity-layer credential (passport, standing intent, delegation
//! token) follows the same flow: render the bound fields to canonical JSON,
//! hash with SHA-256, sign the digest with a secp256k1 key, encode the
//! 65-byte signature as `0x`-prefixed hex. Verification recovers the signer
//! address from the digest and compares it to the expected wallet.

use alloy::primitives::{Address, Signature};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonicalize::canonicalize;
use crate::error::Error;

/// Hash a JSON envelope: canonicalize, then SHA-256.
///
/// # Errors
///
/// Returns an error if the value cannot be canonicalized.
pub fn canonical_hash(value: &Value) -> Result<[u8; 32], Error> {
    let canonical = canonicalize(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hasher.finalize().into())
}

/// Sign a 32-byte digest and return the `0x`-prefixed hex signature.
///
/// # Errors
///
/// Returns an error if the signer fails.
pub fn sign_digest(signer: &PrivateKeySigner, digest: &[u8; 32]) -> Result<String, Error> {
    let signature = signer
        .sign_hash_sync(&(*digest).into())
        .map_err(|e| Error::Signing(e.to_string()))?;
    Ok(format!("0x{}", hex::encode(signature.as_bytes())))
}

/// Recover the address that produced `signature_hex` over `digest`.
///
/// Returns `None` for malformed hex, wrong-length signatures, or
/// unrecoverable points; verification predicates turn that into `false`
/// rather than an error.
#[must_use]
pub fn recover_signer(signature_hex: &str, digest: &[u8; 32]) -> Option<Address> {
    let stripped = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let bytes = hex::decode(stripped).ok()?;
    let signature = Signature::try_from(bytes.as_slice()).ok()?;
    signature.recover_address_from_prehash(&(*digest).into()).ok()
}

/// Lowercase `0x` hex rendering of an address, as bound into signed envelopes.
///
/// Checksummed and lowercase renderings of the same address must hash
/// identically, so envelopes always carry the lowercase form.
#[must_use]
pub fn address_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}
