//! In-memory [`FallbackStore`].

use parking_lot::RwLock;
use std::collections::HashMap;

use super::{fallback_key, FallbackRecord, FallbackStore, StorageResult};
use crate::types::{Address, CandidateId};

/// Records held in a map for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryFallbackStore {
    records: RwLock<HashMap<String, FallbackRecord>>,
}

impl MemoryFallbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl FallbackStore for MemoryFallbackStore {
    fn get(
        &self,
        account: &Address,
        candidate_id: CandidateId,
    ) -> StorageResult<Option<FallbackRecord>> {
        Ok(self
            .records
            .read()
            .get(&fallback_key(account, candidate_id))
            .cloned())
    }

    fn put(&self, record: FallbackRecord) -> StorageResult<()> {
        self.records.write().insert(record.key(), record);
        Ok(())
    }

    fn delete(&self, account: &Address, candidate_id: CandidateId) -> StorageResult<()> {
        self.records.write().remove(&fallback_key(account, candidate_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    #[test]
    fn test_put_get_delete() {
        let store = MemoryFallbackStore::new();
        assert!(store.get(&account(1), 0).unwrap().is_none());

        store.put(FallbackRecord::new(account(1), 0, 8500, 8000)).unwrap();
        let record = store.get(&account(1), 0).unwrap().expect("record stored");
        assert_eq!(record.offer_amount, 8500);

        store.delete(&account(1), 0).unwrap();
        assert!(store.get(&account(1), 0).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_overwrites_same_key() {
        let store = MemoryFallbackStore::new();
        store.put(FallbackRecord::new(account(1), 2, 100, 50)).unwrap();
        store.put(FallbackRecord::new(account(1), 2, 40, 50)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&account(1), 2).unwrap().unwrap().offer_amount, 40);
    }

    #[test]
    fn test_keys_are_scoped_by_account_and_candidate() {
        let store = MemoryFallbackStore::new();
        store.put(FallbackRecord::new(account(1), 0, 1, 1)).unwrap();
        store.put(FallbackRecord::new(account(2), 0, 2, 2)).unwrap();
        store.put(FallbackRecord::new(account(1), 1, 3, 3)).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(&account(2), 0).unwrap().unwrap().offer_amount, 2);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = MemoryFallbackStore::new();
        store.delete(&account(9), 9).unwrap();
        store.put(FallbackRecord::new(account(9), 9, 1, 1)).unwrap();
        store.delete(&account(9), 9).unwrap();
        store.delete(&account(9), 9).unwrap();
        assert!(store.is_empty());
    }
}
