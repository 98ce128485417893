//! # HushDB — Persistent Session Storage
//!
//! The on-disk store for the command-line client, built on sled's embedded
//! key-value store. It plays the role of origin-scoped browser storage:
//! nothing in here is authoritative, it only survives restarts.
//!
//! ## Tree Layout
//!
//! | Tree              | Key                                   | Value                   |
//! |-------------------|---------------------------------------|-------------------------|
//! | `fallback_offers` | `demo_offer_<account>_<id>` (UTF-8)   | `json(FallbackRecord)`  |
//! | `preferences`     | preference name (UTF-8)               | value (UTF-8)           |
//!
//! Records are JSON rather than bincode so a stored negotiation can be
//! inspected with any sled dump tool during a demo.

use sled::{Db, Tree};
use std::path::Path;
use tracing::debug;

use super::{fallback_key, FallbackRecord, FallbackStore, StorageError, StorageResult};
use crate::config::DEMO_MODE_PREFERENCE_KEY;
use crate::types::{Address, CandidateId};

/// sled-backed fallback records and session preferences.
///
/// Cheap to clone; every clone shares the same database handle.
#[derive(Debug, Clone)]
pub struct HushDB {
    db: Db,
    fallback_offers: Tree,
    preferences: Tree,
}

impl HushDB {
    /// Open or create a database at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A throwaway database removed on drop. For tests.
    pub fn open_temporary() -> StorageResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StorageResult<Self> {
        let fallback_offers = db.open_tree("fallback_offers")?;
        let preferences = db.open_tree("preferences")?;
        Ok(Self {
            db,
            fallback_offers,
            preferences,
        })
    }

    // -- Preferences --------------------------------------------------------

    pub fn preference(&self, key: &str) -> StorageResult<Option<String>> {
        match self.preferences.get(key.as_bytes())? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    pub fn set_preference(&self, key: &str, value: &str) -> StorageResult<()> {
        self.preferences.insert(key.as_bytes(), value.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    pub fn clear_preference(&self, key: &str) -> StorageResult<()> {
        self.preferences.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    /// The persisted demonstration-mode flag, raw. Feed it to
    /// [`crate::mode::ModeSelector::persisted_preference`].
    pub fn demo_mode_preference(&self) -> StorageResult<Option<String>> {
        self.preference(DEMO_MODE_PREFERENCE_KEY)
    }

    // -- Fallback records ---------------------------------------------------

    /// Number of pending fallback records.
    pub fn fallback_count(&self) -> usize {
        self.fallback_offers.len()
    }

    /// All pending records, in key order.
    pub fn fallback_records(&self) -> StorageResult<Vec<FallbackRecord>> {
        self.fallback_offers
            .iter()
            .values()
            .map(|value| -> StorageResult<FallbackRecord> {
                let bytes = value?;
                Ok(serde_json::from_slice(&bytes)?)
            })
            .collect()
    }
}

impl FallbackStore for HushDB {
    fn get(
        &self,
        account: &Address,
        candidate_id: CandidateId,
    ) -> StorageResult<Option<FallbackRecord>> {
        let key = fallback_key(account, candidate_id);
        match self.fallback_offers.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, record: FallbackRecord) -> StorageResult<()> {
        let key = record.key();
        let value = serde_json::to_vec(&record)?;
        self.fallback_offers.insert(key.as_bytes(), value)?;
        self.db.flush()?;
        debug!(%key, "fallback record stored");
        Ok(())
    }

    fn delete(&self, account: &Address, candidate_id: CandidateId) -> StorageResult<()> {
        let key = fallback_key(account, candidate_id);
        if self.fallback_offers.remove(key.as_bytes())?.is_some() {
            self.db.flush()?;
            debug!(%key, "fallback record deleted");
        }
        Ok(())
    }
}
