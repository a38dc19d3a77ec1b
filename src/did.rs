//! Decentralized identifiers for agents.
//!
//! Canonical form: `did:<method>:<namespace>/<agentName>-<version>`, e.g.
//! `did:agentpass:helix-lab/genome-analyst-1`. A DID is globally unique per
//! `(namespace, agentName, version)` and immutable once issued; publishing a
//! changed agent means minting a new version, never mutating the old one.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Default DID method for identities minted by this crate.
pub const DEFAULT_DID_METHOD: &str = "agentpass";

/// A parsed agent DID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Did {
    method: String,
    namespace: String,
    agent_name: String,
    version: String,
}

impl Did {
    /// Build a DID under the default method.
    ///
    /// # Errors
    ///
    /// Returns an error if any component is empty or contains a separator
    /// character that would make the canonical string ambiguous.
    pub fn new(namespace: &str, agent_name: &str, version: &str) -> Result<Self, Error> {
        Self::with_method(DEFAULT_DID_METHOD, namespace, agent_name, version)
    }

    /// Build a DID under an explicit method.
    ///
    /// # Errors
    ///
    /// Returns an error for empty or ambiguous components.
    pub fn with_method(
        method: &str,
        namespace: &str,
        agent_name: &str,
        version: &str,
    ) -> Result<Self, Error> {
        validate_component(method, "method", &[':', '/'])?;
        validate_component(namespace, "namespace", &[':', '/'])?;
        validate_component(agent_name, "agent name", &[':', '/'])?;
        validate_component(version, "version", &[':', '/', '-'])?;

        Ok(Self {
            method: method.to_string(),
            namespace: namespace.to_string(),
            agent_name: agent_name.to_string(),
            version: version.to_string(),
        })
    }

    /// DID method (e.g. `agentpass`).
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Namespace the agent lives under.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Agent name within the namespace.
    #[must_use]
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Agent version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

fn validate_component(value: &str, what: &str, forbidden: &[char]) -> Result<(), Error> {
    if value.is_empty() {
        return Err(Error::InvalidDid(format!("{what} must not be empty")));
    }
    if value.chars().any(|c| forbidden.contains(&c)) {
        return Err(Error::InvalidDid(format!(
            "{what} {value:?} contains a reserved separator"
        )));
    }
    Ok(())
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "did:{}:{}/{}-{}",
            self.method, self.namespace, self.agent_name, self.version
        )
    }
}

impl FromStr for Did {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let rest = s
            .strip_prefix("did:")
            .ok_or_else(|| Error::InvalidDid(format!("{s:?} does not start with \"did:\"")))?;

        let (method, rest) = rest
            .split_once(':')
            .ok_or_else(|| Error::InvalidDid(format!("{s:?} is missing a method")))?;

        let (namespace, name_version) = rest
            .split_once('/')
            .ok_or_else(|| Error::InvalidDid(format!("{s:?} is missing a namespace")))?;

        // Agent names may contain hyphens; the version is everything after
        // the last one.
        let (agent_name, version) = name_version
            .rsplit_once('-')
            .ok_or_else(|| Error::InvalidDid(format!("{s:?} is missing a version")))?;

        Self::with_method(method, namespace, agent_name, version)
    }
}

impl Serialize for Did {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|e: Error| D::Error::custom(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_string() {
        let did = Did::new("helix-lab", "genome-analyst", "1").unwrap();
        assert_eq!(did.to_string(), "did:agentpass:helix-lab/genome-analyst-1");
    }

    #[test]
    fn test_parse_round_trip() {
        let raw = "did:agentpass:helix-lab/genome-analyst-2";
        let did: Did = raw.parse().unwrap();

        assert_eq!(did.method(), "agentpass");
        assert_eq!(did.namespace(), "helix-lab");
        assert_eq!(did.agent_name(), "genome-analyst");
        assert_eq!(did.version(), "2");
        assert_eq!(did.to_string(), raw);
    }

    #[test]
    fn test_hyphenated_name_keeps_version_split() {
        let did: Did = "did:agentpass:lab/multi-part-name-3".parse().unwrap();
        assert_eq!(did.agent_name(), "multi-part-name");
        assert_eq!(did.version(), "3");
    }

    #[test]
    fn test_rejects_malformed() {
        for raw in [
            "",
            "did:",
            "did:agentpass",
            "did:agentpass:lab",
            "did:agentpass:lab/noversion",
            "urn:agentpass:lab/agent-1",
        ] {
            assert!(raw.parse::<Did>().is_err(), "{raw:?} should not parse");
        }
    }

    #[test]
    fn test_rejects_reserved_separators() {
        assert!(Did::new("name/space", "agent", "1").is_err());
        assert!(Did::new("ns", "agent:x", "1").is_err());
        assert!(Did::new("ns", "agent", "1-0").is_err());
    }

    #[test]
    fn test_serde_as_canonical_string() {
        let did = Did::new("lab", "scout", "1").unwrap();
        let json = serde_json::to_string(&did).unwrap();
        assert_eq!(json, "\"did:agentpass:lab/scout-1\"");

        let back: Did = serde_json::from_str(&json).unwrap();
        assert_eq!(back, did);
    }
}
