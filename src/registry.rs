//! Durable agent registry.
//!
//! A keyed map from DID to the agent's full record (passport, SLA, pricing,
//! reputation), one JSON document per DID under a root directory. Writers
//! serialize to a temp file in the same directory, fsync, and rename over the
//! target, so readers always see a complete document and a crash mid-write
//! leaves the previous record intact. Read-modify-write operations take a
//! per-DID lock; the expected usage is a single writer per DID.
//!
//! No global registry exists; callers construct one and pass it where it is
//! needed.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::did::Did;
use crate::error::Error;
use crate::money::Money;
use crate::passport::{verify_passport, Passport};
use crate::reputation::AgentReputation;
use crate::sla::{check_sla_compliance, AgentSla, SlaComplianceReport};

/// Everything the registry stores for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub passport: Passport,
    pub sla: AgentSla,
    /// Price per operation name.
    #[serde(default)]
    pub pricing: BTreeMap<String, Money>,
    pub reputation: AgentReputation,
}

impl AgentRecord {
    /// Assemble a record for a newly registered agent with fresh reputation.
    #[must_use]
    pub fn new(
        passport: Passport,
        sla: AgentSla,
        pricing: BTreeMap<String, Money>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            passport,
            sla,
            pricing,
            reputation: AgentReputation::new(now),
        }
    }
}

/// File-backed agent registry keyed by DID.
pub struct AgentRegistry {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    clock: Arc<dyn Clock>,
}

impl AgentRegistry {
    /// Open (creating if needed) a registry rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
            clock,
        })
    }

    /// Register a new agent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPassport`] if the passport does not verify and
    /// [`Error::DuplicateAgent`] if the DID already has a record.
    pub fn register(&self, record: AgentRecord) -> Result<(), Error> {
        if !verify_passport(&record.passport) {
            return Err(Error::InvalidPassport(
                "owner signature does not recover to the wallet address".to_string(),
            ));
        }

        let did = record.passport.did.clone();
        let lock = self.key_lock(&did);
        let _guard = lock.lock();

        let path = self.record_path(&did);
        if path.exists() {
            return Err(Error::DuplicateAgent(did.to_string()));
        }

        self.write_atomic(&path, &record)?;
        info!(did = %did, wallet = %record.passport.wallet_address, "registered agent");
        Ok(())
    }

    /// Fetch a record by DID.
    ///
    /// # Errors
    ///
    /// Returns an error on IO or deserialization failure.
    pub fn get(&self, did: &Did) -> Result<Option<AgentRecord>, Error> {
        self.read_record(&self.record_path(did))
    }

    /// All records whose agent name matches, across namespaces and versions.
    ///
    /// # Errors
    ///
    /// Returns an error on IO or deserialization failure.
    pub fn find_by_name(&self, agent_name: &str) -> Result<Vec<AgentRecord>, Error> {
        let mut matches = Vec::new();
        for did in self.list()? {
            if did.agent_name() == agent_name {
                if let Some(record) = self.get(&did)? {
                    matches.push(record);
                }
            }
        }
        Ok(matches)
    }

    /// All registered DIDs.
    ///
    /// # Errors
    ///
    /// Returns an error on IO or deserialization failure.
    pub fn list(&self) -> Result<Vec<Did>, Error> {
        let mut dids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(record) = self.read_record(&path)? {
                    dids.push(record.passport.did);
                }
            }
        }
        dids.sort();
        Ok(dids)
    }

    /// Delete an agent's record. This is how revocation works: a passport is
    /// immutable, so revoking one means removing it from the registry.
    ///
    /// Returns whether a record existed.
    ///
    /// # Errors
    ///
    /// Returns an error on IO failure.
    pub fn remove(&self, did: &Did) -> Result<bool, Error> {
        let lock = self.key_lock(did);
        let _guard = lock.lock();

        let path = self.record_path(did);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        info!(did = %did, "removed agent record");
        Ok(true)
    }

    /// Fold a completed job into the agent's reputation and persist.
    ///
    /// Read-modify-write under the per-DID lock, so concurrent outcome
    /// reports for one agent serialize instead of losing updates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotFound`] if no record exists for the DID.
    pub fn record_job_outcome(
        &self,
        did: &Did,
        success: bool,
        response_time_ms: u64,
    ) -> Result<AgentReputation, Error> {
        let lock = self.key_lock(did);
        let _guard = lock.lock();

        let path = self.record_path(did);
        let mut record = self
            .read_record(&path)?
            .ok_or_else(|| Error::AgentNotFound(did.to_string()))?;

        record
            .reputation
            .record_outcome(success, response_time_ms, &record.sla, self.clock.now());
        self.write_atomic(&path, &record)?;

        debug!(
            did = %did,
            success,
            response_time_ms,
            score = record.reputation.score,
            "recorded job outcome"
        );
        Ok(record.reputation)
    }

    /// Check an observed response time against the agent's guarantees.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotFound`] if no record exists for the DID.
    pub fn check_sla(
        &self,
        did: &Did,
        observed_response_time_ms: u64,
    ) -> Result<SlaComplianceReport, Error> {
        let record = self
            .get(did)?
            .ok_or_else(|| Error::AgentNotFound(did.to_string()))?;
        Ok(check_sla_compliance(
            &record.sla,
            &record.reputation,
            observed_response_time_ms,
        ))
    }

    fn record_path(&self, did: &Did) -> PathBuf {
        let file_name: String = did
            .to_string()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file_name}.json"))
    }

    fn key_lock(&self, did: &Did) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(did.to_string()).or_default())
    }

    fn read_record(&self, path: &Path) -> Result<Option<AgentRecord>, Error> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Temp file in the registry directory, fsync, rename over the target.
    fn write_atomic(&self, path: &Path, record: &AgentRecord) -> Result<(), Error> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&mut tmp, record)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}
