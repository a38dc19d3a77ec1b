//! Deterministic hierarchical key derivation for agents.
//!
//! Every agent key is derived from one principal secret and a per-agent
//! derivation path, so the same principal reproduces the same agent wallet on
//! every machine and every invocation with no key material stored anywhere.
//!
//! The secret is either an explicit master secret or the principal's
//! proof-of-control signature. Reusing a signature as a seed is a deliberate,
//! load-bearing property: the same signature always yields the same agent
//! keys, which also means agent-key secrecy is exactly as strong as the
//! entropy of that signature. Treat proof signatures like key material.
//!
//! # Example
//!
//! ```rust
//! use agentpass::{KeyDeriver, PathRegistry, SeedSource};
//!
//! let source = SeedSource::MasterSecret("correct horse battery staple".into());
//! let keys = KeyDeriver::new(&source, PathRegistry::new()).unwrap();
//!
//! let (a, _path) = keys.signer_for("genome-analyst").unwrap();
//! let (b, _path) = keys.signer_for("genome-analyst").unwrap();
//! assert_eq!(a.address(), b.address());
//! ```

use std::collections::BTreeMap;
use std::env;

use alloy::primitives::{keccak256, B256};
use alloy::signers::local::PrivateKeySigner;

use crate::error::Error;

/// Derivation path used for agent names with no registry entry.
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Environment variable holding an explicit master secret.
pub const MASTER_SECRET_ENV: &str = "AGENTPASS_MASTER_SECRET";

/// Environment variable holding a principal proof-of-control signature.
pub const PROOF_SIGNATURE_ENV: &str = "AGENTPASS_PROOF_SIGNATURE";

/// Fixed mapping from agent name to derivation path.
///
/// Unknown names fall back to [`DEFAULT_DERIVATION_PATH`], so a passport can
/// always be minted for a new agent without editing the registry first.
#[derive(Debug, Clone, Default)]
pub struct PathRegistry {
    paths: BTreeMap<String, String>,
}

impl PathRegistry {
    /// Empty registry; everything resolves to the default path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style path assignment.
    #[must_use]
    pub fn with_path(mut self, agent_name: &str, path: &str) -> Self {
        self.assign(agent_name, path);
        self
    }

    /// Assign a derivation path to an agent name.
    pub fn assign(&mut self, agent_name: &str, path: &str) {
        self.paths.insert(agent_name.to_string(), path.to_string());
    }

    /// Resolve the derivation path for an agent name.
    #[must_use]
    pub fn path_for(&self, agent_name: &str) -> &str {
        self.paths
            .get(agent_name)
            .map_or(DEFAULT_DERIVATION_PATH, String::as_str)
    }
}

/// Where the principal secret comes from.
#[derive(Debug, Clone)]
pub enum SeedSource {
    /// An explicit master secret: `0x`-prefixed hex, or arbitrary UTF-8.
    MasterSecret(String),
    /// A proof-of-control signature previously produced by the principal's
    /// wallet, hex encoded.
    ProofSignature(String),
}

impl SeedSource {
    /// Reduce the source material to a 32-byte seed.
    fn seed(&self) -> Result<B256, Error> {
        match self {
            SeedSource::MasterSecret(secret) => {
                if secret.is_empty() {
                    return Err(Error::Key("master secret is empty".to_string()));
                }
                let bytes = match secret.strip_prefix("0x") {
                    Some(hex_part) => hex::decode(hex_part)
                        .map_err(|e| Error::Key(format!("invalid hex master secret: {e}")))?,
                    None => secret.as_bytes().to_vec(),
                };
                Ok(keccak256(&bytes))
            }
            SeedSource::ProofSignature(signature) => {
                let stripped = signature.strip_prefix("0x").unwrap_or(signature);
                let bytes = hex::decode(stripped)
                    .map_err(|e| Error::Key(format!("invalid hex proof signature: {e}")))?;
                if bytes.is_empty() {
                    return Err(Error::Key("proof signature is empty".to_string()));
                }
                Ok(keccak256(&bytes))
            }
        }
    }
}

/// Derives per-agent signing keys from one principal seed.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    seed: B256,
    registry: PathRegistry,
}

impl KeyDeriver {
    /// Create a deriver from explicit authentication material.
    ///
    /// # Errors
    ///
    /// Returns an error if the source material is empty or not decodable.
    pub fn new(source: &SeedSource, registry: PathRegistry) -> Result<Self, Error> {
        Ok(Self {
            seed: source.seed()?,
            registry,
        })
    }

    /// Create a deriver from the environment.
    ///
    /// Reads [`MASTER_SECRET_ENV`] first, then [`PROOF_SIGNATURE_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSignerAvailable`] when neither variable is set.
    pub fn from_env(registry: PathRegistry) -> Result<Self, Error> {
        let source = if let Ok(secret) = env::var(MASTER_SECRET_ENV) {
            SeedSource::MasterSecret(secret)
        } else if let Ok(signature) = env::var(PROOF_SIGNATURE_ENV) {
            SeedSource::ProofSignature(signature)
        } else {
            return Err(Error::NoSignerAvailable);
        };
        Self::new(&source, registry)
    }

    /// Derive the signer for a derivation path.
    ///
    /// Pure and deterministic: identical `(secret, path)` always yields the
    /// identical key pair and address.
    ///
    /// # Errors
    ///
    /// Returns an error if no valid key can be produced for the path.
    pub fn derive(&self, path: &str) -> Result<PrivateKeySigner, Error> {
        let mut material = keccak256([self.seed.as_slice(), path.as_bytes()].concat());

        // A keccak output lands outside the secp256k1 scalar range with
        // probability ~2^-128; re-hash with a counter until it does not.
        for counter in 0u8..=255 {
            match PrivateKeySigner::from_bytes(&material) {
                Ok(signer) => return Ok(signer),
                Err(_) => {
                    let mut rehash = material.to_vec();
                    rehash.push(counter);
                    material = keccak256(&rehash);
                }
            }
        }

        Err(Error::Key(format!("could not derive a valid key for path {path:?}")))
    }

    /// Derive the signer for an agent name via the path registry.
    ///
    /// Returns the signer together with the resolved path, which is recorded
    /// in the agent's passport.
    ///
    /// # Errors
    ///
    /// Returns an error if derivation fails.
    pub fn signer_for(&self, agent_name: &str) -> Result<(PrivateKeySigner, String), Error> {
        let path = self.registry.path_for(agent_name).to_string();
        let signer = self.derive(&path)?;
        Ok((signer, path))
    }

    /// The path registry in use.
    #[must_use]
    pub fn registry(&self) -> &PathRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deriver(secret: &str) -> KeyDeriver {
        KeyDeriver::new(&SeedSource::MasterSecret(secret.into()), PathRegistry::new()).unwrap()
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = deriver("test-secret").derive("m/44'/60'/0'/0/7").unwrap();
        let b = deriver("test-secret").derive("m/44'/60'/0'/0/7").unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn test_different_paths_differ() {
        let keys = deriver("test-secret");
        let a = keys.derive("m/44'/60'/0'/0/0").unwrap();
        let b = keys.derive("m/44'/60'/0'/0/1").unwrap();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn test_different_secrets_differ() {
        let a = deriver("secret-one").derive(DEFAULT_DERIVATION_PATH).unwrap();
        let b = deriver("secret-two").derive(DEFAULT_DERIVATION_PATH).unwrap();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn test_proof_signature_seed_is_reusable() {
        let signature = format!("0x{}", hex::encode([0x5a; 65]));
        let source = SeedSource::ProofSignature(signature);

        let a = KeyDeriver::new(&source, PathRegistry::new()).unwrap();
        let b = KeyDeriver::new(&source, PathRegistry::new()).unwrap();
        assert_eq!(
            a.derive(DEFAULT_DERIVATION_PATH).unwrap().address(),
            b.derive(DEFAULT_DERIVATION_PATH).unwrap().address()
        );
    }

    #[test]
    fn test_hex_and_utf8_master_secrets_are_distinct_namespaces() {
        let hex_seed = deriver("0xdeadbeef").derive(DEFAULT_DERIVATION_PATH).unwrap();
        let utf8_seed = deriver("deadbeef").derive(DEFAULT_DERIVATION_PATH).unwrap();
        assert_ne!(hex_seed.address(), utf8_seed.address());
    }

    #[test]
    fn test_registry_fallback() {
        let registry = PathRegistry::new().with_path("genome-analyst", "m/44'/60'/1'/0/0");
        assert_eq!(registry.path_for("genome-analyst"), "m/44'/60'/1'/0/0");
        assert_eq!(registry.path_for("unknown-agent"), DEFAULT_DERIVATION_PATH);
    }

    #[test]
    fn test_empty_secret_rejected() {
        let result = KeyDeriver::new(&SeedSource::MasterSecret(String::new()), PathRegistry::new());
        assert!(matches!(result, Err(Error::Key(_))));
    }

    #[test]
    fn test_bad_proof_signature_rejected() {
        let result = KeyDeriver::new(
            &SeedSource::ProofSignature("not hex".into()),
            PathRegistry::new(),
        );
        assert!(matches!(result, Err(Error::Key(_))));
    }
}
