//! Shared chain state of the local devnet.
//!
//! Ciphertexts are AES-256-GCM sealed `u64` plaintexts under a key only the
//! ledger holds. A handle is the BLAKE3 hash of the sealed bytes, so it
//! reveals nothing about the value. Decryption rights are tracked per
//! handle, the way the on-chain access-control list does it.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use dashmap::DashMap;
use ed25519_dalek::VerifyingKey;
use parking_lot::RwLock;
use rand::RngCore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::types::{Address, Candidate, CandidateId, CiphertextHandle, MatchResult};

const AES_KEY_LENGTH: usize = 32;
const AES_NONCE_LENGTH: usize = 12;

/// Failures inside the devnet ledger.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("sealing failed")]
    SealFailed,

    #[error("unknown ciphertext handle {0}")]
    UnknownHandle(CiphertextHandle),

    #[error("candidate {0} does not exist")]
    UnknownCandidate(CandidateId),
}

#[derive(Clone, Debug)]
struct CandidateEntry {
    name: String,
    position: String,
    skills: String,
    expected_salary: CiphertextHandle,
    expectation: u32,
    disclosed: bool,
    is_active: bool,
}

/// In-process stand-in for the chain, the ACL and the KMS key.
pub struct DevnetLedger {
    contract: Address,
    seal_key: [u8; AES_KEY_LENGTH],
    proof_key: [u8; 32],
    ciphertexts: DashMap<CiphertextHandle, Vec<u8>>,
    acl: DashMap<CiphertextHandle, HashSet<Address>>,
    candidates: RwLock<Vec<CandidateEntry>>,
    results: DashMap<(Address, CandidateId), CiphertextHandle>,
    verifying_keys: DashMap<Address, VerifyingKey>,
    block: AtomicU64,
}

impl DevnetLedger {
    /// An empty ledger with fresh random keys.
    pub fn new() -> Arc<Self> {
        let mut seal_key = [0u8; AES_KEY_LENGTH];
        let mut proof_key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seal_key);
        rand::rngs::OsRng.fill_bytes(&mut proof_key);

        let digest = blake3::hash(b"hushhire.devnet.contract");
        let mut contract = [0u8; 20];
        contract.copy_from_slice(&digest.as_bytes()[..20]);

        Arc::new(Self {
            contract: Address::from_bytes(contract),
            seal_key,
            proof_key,
            ciphertexts: DashMap::new(),
            acl: DashMap::new(),
            candidates: RwLock::new(Vec::new()),
            results: DashMap::new(),
            verifying_keys: DashMap::new(),
            block: AtomicU64::new(1),
        })
    }

    /// A ledger with the five demo candidates registered, every
    /// expectation disclosed.
    pub fn seeded() -> Arc<Self> {
        let ledger = Self::new();
        let seed = [
            ("Alice Chen", "Senior Rust Engineer", "Rust, Solidity, FHE", 8_000),
            ("Bob Martinez", "Backend Developer", "Go, PostgreSQL, Kubernetes", 7_500),
            ("Carol Wang", "Frontend Engineer", "TypeScript, React, Web3", 6_500),
            ("David Kim", "Security Researcher", "Cryptography, Auditing, ZK", 9_500),
            ("Emma Johnson", "Product Designer", "Figma, UX Research, Design Systems", 7_000),
        ];
        for (name, position, skills, expectation) in seed {
            // Sealing a fresh u64 under a valid key does not fail.
            let _ = ledger.register_candidate(name, position, skills, expectation, true);
        }
        ledger
    }

    /// Address the devnet contract is deployed at.
    pub fn contract_address(&self) -> &Address {
        &self.contract
    }

    // -- Ciphertexts --------------------------------------------------------

    pub fn seal(&self, value: u64) -> Result<CiphertextHandle, LedgerError> {
        let cipher =
            Aes256Gcm::new_from_slice(&self.seal_key).map_err(|_| LedgerError::SealFailed)?;
        let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), value.to_be_bytes().as_slice())
            .map_err(|_| LedgerError::SealFailed)?;

        let mut blob = Vec::with_capacity(AES_NONCE_LENGTH + sealed.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&sealed);

        let handle = CiphertextHandle::from_bytes(*blake3::hash(&blob).as_bytes());
        self.ciphertexts.insert(handle, blob);
        Ok(handle)
    }

    pub(crate) fn unseal(&self, handle: &CiphertextHandle) -> Result<u64, LedgerError> {
        let blob = self
            .ciphertexts
            .get(handle)
            .ok_or(LedgerError::UnknownHandle(*handle))?;
        if blob.len() < AES_NONCE_LENGTH {
            return Err(LedgerError::UnknownHandle(*handle));
        }
        let (nonce, sealed) = blob.split_at(AES_NONCE_LENGTH);
        let cipher =
            Aes256Gcm::new_from_slice(&self.seal_key).map_err(|_| LedgerError::SealFailed)?;
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| LedgerError::UnknownHandle(*handle))?;
        let bytes: [u8; 8] = plain
            .try_into()
            .map_err(|_| LedgerError::UnknownHandle(*handle))?;
        Ok(u64::from_be_bytes(bytes))
    }

    pub fn contains(&self, handle: &CiphertextHandle) -> bool {
        self.ciphertexts.contains_key(handle)
    }

    /// Grant `account` the right to user-decrypt `handle`.
    pub fn allow(&self, handle: CiphertextHandle, account: Address) {
        self.acl.entry(handle).or_default().insert(account);
    }

    pub fn is_allowed(&self, handle: &CiphertextHandle, account: &Address) -> bool {
        self.acl
            .get(handle)
            .is_some_and(|allowed| allowed.contains(account))
    }

    // -- Input proofs -------------------------------------------------------

    /// Proof that `handle` was encrypted for `contract` by `account`.
    pub fn input_proof(
        &self,
        handle: &CiphertextHandle,
        contract: &Address,
        account: &Address,
    ) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new_keyed(&self.proof_key);
        hasher.update(handle.as_bytes());
        hasher.update(contract.as_str().as_bytes());
        hasher.update(account.as_str().as_bytes());
        hasher.finalize().as_bytes().to_vec()
    }

    pub fn verify_input_proof(
        &self,
        handle: &CiphertextHandle,
        contract: &Address,
        account: &Address,
        proof: &[u8],
    ) -> bool {
        self.contains(handle) && self.input_proof(handle, contract, account) == proof
    }

    // -- Candidates ---------------------------------------------------------

    pub fn register_candidate(
        &self,
        name: &str,
        position: &str,
        skills: &str,
        expectation: u32,
        disclosed: bool,
    ) -> Result<CandidateId, LedgerError> {
        let expected_salary = self.seal(u64::from(expectation))?;
        let mut candidates = self.candidates.write();
        candidates.push(CandidateEntry {
            name: name.to_string(),
            position: position.to_string(),
            skills: skills.to_string(),
            expected_salary,
            expectation,
            disclosed,
            is_active: true,
        });
        let id = (candidates.len() - 1) as CandidateId;
        debug!(id, name, "devnet candidate registered");
        Ok(id)
    }

    pub fn set_candidate_active(&self, id: CandidateId, active: bool) -> Result<(), LedgerError> {
        let mut candidates = self.candidates.write();
        let entry = candidates
            .get_mut(id as usize)
            .ok_or(LedgerError::UnknownCandidate(id))?;
        entry.is_active = active;
        Ok(())
    }

    pub fn candidate_count(&self) -> u64 {
        self.candidates.read().len() as u64
    }

    pub fn candidate(&self, id: CandidateId) -> Option<Candidate> {
        self.candidates.read().get(id as usize).map(|c| Candidate {
            id,
            name: c.name.clone(),
            position: c.position.clone(),
            expected_salary_handle: c.expected_salary,
            skills: c.skills.clone(),
            is_active: c.is_active,
            disclosed_expectation: c.disclosed.then_some(c.expectation),
        })
    }

    // -- Offers -------------------------------------------------------------

    /// Run the comparison for an accepted offer and grant `account` access
    /// to its result. A later offer replaces the earlier result.
    pub fn record_offer(
        &self,
        account: &Address,
        candidate_id: CandidateId,
        offer: &CiphertextHandle,
    ) -> Result<CiphertextHandle, LedgerError> {
        let expected = self
            .candidates
            .read()
            .get(candidate_id as usize)
            .map(|c| c.expected_salary)
            .ok_or(LedgerError::UnknownCandidate(candidate_id))?;

        let offer_value = self.unseal(offer)?;
        let expectation = self.unseal(&expected)?;
        let result = if offer_value >= expectation {
            MatchResult::Meets
        } else {
            MatchResult::Below
        };

        let handle = self.seal(u64::from(result.as_u8()))?;
        self.allow(handle, account.clone());
        self.results.insert((account.clone(), candidate_id), handle);
        Ok(handle)
    }

    pub fn offer_result(
        &self,
        account: &Address,
        candidate_id: CandidateId,
    ) -> Option<CiphertextHandle> {
        self.results
            .get(&(account.clone(), candidate_id))
            .map(|h| *h)
    }

    // -- Accounts -----------------------------------------------------------

    pub fn register_account(&self, address: Address, key: VerifyingKey) {
        self.verifying_keys.insert(address, key);
    }

    pub fn verifying_key(&self, address: &Address) -> Option<VerifyingKey> {
        self.verifying_keys.get(address).map(|k| *k)
    }

    /// Mine a block and return its number.
    pub fn next_block(&self) -> u64 {
        self.block.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_unseal() {
        let ledger = DevnetLedger::new();
        let a = ledger.seal(8_500).unwrap();
        let b = ledger.seal(8_500).unwrap();
        assert_ne!(a, b, "fresh nonce per seal");
        assert_eq!(ledger.unseal(&a).unwrap(), 8_500);
        assert_eq!(ledger.unseal(&b).unwrap(), 8_500);

        let unknown = CiphertextHandle::from_bytes([7; 32]);
        assert_eq!(ledger.unseal(&unknown), Err(LedgerError::UnknownHandle(unknown)));
    }

    #[test]
    fn seeded_catalog() {
        let ledger = DevnetLedger::seeded();
        assert_eq!(ledger.candidate_count(), 5);

        let alice = ledger.candidate(0).unwrap();
        assert_eq!(alice.name, "Alice Chen");
        assert_eq!(alice.disclosed_expectation, Some(8_000));
        assert!(alice.is_active);

        let david = ledger.candidate(3).unwrap();
        assert_eq!(david.disclosed_expectation, Some(9_500));
        assert!(ledger.candidate(5).is_none());
    }

    #[test]
    fn offer_comparison_and_acl() {
        let ledger = DevnetLedger::seeded();
        let account = Address::from_bytes([9; 20]);
        let stranger = Address::from_bytes([8; 20]);

        let high = ledger.seal(8_500).unwrap();
        let result = ledger.record_offer(&account, 0, &high).unwrap();
        assert_eq!(ledger.unseal(&result).unwrap(), 1);
        assert!(ledger.is_allowed(&result, &account));
        assert!(!ledger.is_allowed(&result, &stranger));
        assert_eq!(ledger.offer_result(&account, 0), Some(result));

        let low = ledger.seal(7_000).unwrap();
        let result = ledger.record_offer(&account, 0, &low).unwrap();
        assert_eq!(ledger.unseal(&result).unwrap(), 0);
        assert_eq!(ledger.offer_result(&account, 0), Some(result));
    }

    #[test]
    fn input_proof_is_bound() {
        let ledger = DevnetLedger::new();
        let account = Address::from_bytes([1; 20]);
        let other = Address::from_bytes([2; 20]);
        let handle = ledger.seal(1).unwrap();
        let contract = ledger.contract_address().clone();

        let proof = ledger.input_proof(&handle, &contract, &account);
        assert!(ledger.verify_input_proof(&handle, &contract, &account, &proof));
        assert!(!ledger.verify_input_proof(&handle, &contract, &other, &proof));
        assert!(!ledger.verify_input_proof(&handle, &other, &account, &proof));
    }
}
