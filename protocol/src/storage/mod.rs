//! # Fallback Storage
//!
//! Demonstration sessions keep the plaintext offer and the candidate's
//! disclosed expectation next to each pending negotiation, so a result can
//! still be shown when the decryption service is slow or down.
//!
//! ```text
//! mod.rs     — FallbackRecord, the FallbackStore trait, StorageError
//! memory.rs  — in-memory store (tests, ephemeral sessions)
//! db.rs      — sled-backed store, also holding session preferences
//! ```
//!
//! None of this is a source of truth. Production sessions never touch it,
//! and a missing record only means the fallback cannot help.

pub mod db;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::FALLBACK_KEY_PREFIX;
use crate::types::{Address, CandidateId, MatchResult};

pub use db::HushDB;
pub use memory::MemoryFallbackStore;

/// Errors from a fallback or preference backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sled::Error> for StorageError {
    fn from(e: sled::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Key a record is stored under: `demo_offer_<account>_<candidate>`.
pub fn fallback_key(account: &Address, candidate_id: CandidateId) -> String {
    format!("{}_{}_{}", FALLBACK_KEY_PREFIX, account, candidate_id)
}

/// Plaintext pair for one pending demonstration negotiation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackRecord {
    pub account: Address,
    pub candidate_id: CandidateId,
    pub offer_amount: u32,
    pub candidate_expectation: u32,
    pub timestamp: DateTime<Utc>,
}

impl FallbackRecord {
    pub fn new(
        account: Address,
        candidate_id: CandidateId,
        offer_amount: u32,
        candidate_expectation: u32,
    ) -> Self {
        Self {
            account,
            candidate_id,
            offer_amount,
            candidate_expectation,
            timestamp: Utc::now(),
        }
    }

    pub fn key(&self) -> String {
        fallback_key(&self.account, self.candidate_id)
    }

    /// The comparison the contract would have produced.
    pub fn simulated_result(&self) -> MatchResult {
        MatchResult::compare(self.offer_amount, self.candidate_expectation)
    }
}

/// Get/put/delete over fallback records.
///
/// Synchronous on purpose: backends are local key-value stores, and the
/// workflow never holds its own lock while calling in.
pub trait FallbackStore: Send + Sync {
    fn get(&self, account: &Address, candidate_id: CandidateId)
        -> StorageResult<Option<FallbackRecord>>;

    /// Insert, replacing any record under the same key.
    fn put(&self, record: FallbackRecord) -> StorageResult<()>;

    /// Remove a record. Deleting a missing record is not an error.
    fn delete(&self, account: &Address, candidate_id: CandidateId) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let account = Address::from_bytes([0x11; 20]);
        assert_eq!(
            fallback_key(&account, 3),
            format!("demo_offer_0x{}_3", "11".repeat(20))
        );
    }

    #[test]
    fn test_simulated_result_matches_comparison() {
        let account = Address::from_bytes([0x22; 20]);
        assert_eq!(
            FallbackRecord::new(account.clone(), 0, 8500, 8000).simulated_result(),
            MatchResult::Meets
        );
        assert_eq!(
            FallbackRecord::new(account.clone(), 0, 8000, 8000).simulated_result(),
            MatchResult::Meets
        );
        assert_eq!(
            FallbackRecord::new(account, 0, 7000, 8000).simulated_result(),
            MatchResult::Below
        );
    }

    #[test]
    fn test_record_json_shape() {
        let record = FallbackRecord::new(Address::from_bytes([0x33; 20]), 4, 7000, 7000);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["offerAmount"], 7000);
        assert_eq!(json["candidateExpectation"], 7000);
        assert_eq!(json["candidateId"], 4);
        assert!(json["timestamp"].is_string());
    }
}
