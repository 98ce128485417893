//! Devnet [`ContractClient`], bound to one account.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::ledger::DevnetLedger;
use crate::client::contract::{ContractClient, ContractError};
use crate::types::{Address, Candidate, CandidateId, CiphertextHandle, TxReceipt};

/// Time a devnet transaction takes to be mined.
pub const DEVNET_BLOCK_TIME: Duration = Duration::from_millis(200);

pub struct DevnetContract {
    ledger: Arc<DevnetLedger>,
    address: Address,
    account: Address,
    block_time: Duration,
    submit_failure: Mutex<Option<ContractError>>,
    result_failure: Mutex<Option<ContractError>>,
}

impl DevnetContract {
    /// Connect `account` to the ledger's contract.
    pub fn connect(ledger: Arc<DevnetLedger>, account: Address) -> Self {
        let address = ledger.contract_address().clone();
        Self {
            ledger,
            address,
            account,
            block_time: DEVNET_BLOCK_TIME,
            submit_failure: Mutex::new(None),
            result_failure: Mutex::new(None),
        }
    }

    pub fn with_block_time(mut self, block_time: Duration) -> Self {
        self.block_time = block_time;
        self
    }

    /// Make the next `submit_offer` fail with `error`.
    pub fn fail_next_submit(&self, error: ContractError) {
        *self.submit_failure.lock() = Some(error);
    }

    /// Make the next `offer_result` read fail with `error`.
    pub fn fail_next_result_read(&self, error: ContractError) {
        *self.result_failure.lock() = Some(error);
    }

    fn tx_hash(&self, candidate_id: CandidateId, ciphertext: &CiphertextHandle, block: u64) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.account.as_str().as_bytes());
        hasher.update(&candidate_id.to_be_bytes());
        hasher.update(ciphertext.as_bytes());
        hasher.update(&block.to_be_bytes());
        format!("0x{}", hasher.finalize().to_hex())
    }
}

#[async_trait]
impl ContractClient for DevnetContract {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn candidate_count(&self) -> Result<u64, ContractError> {
        Ok(self.ledger.candidate_count())
    }

    async fn candidate(&self, id: CandidateId) -> Result<Candidate, ContractError> {
        self.ledger
            .candidate(id)
            .ok_or_else(|| ContractError::Reverted(format!("candidate {} does not exist", id)))
    }

    async fn submit_offer(
        &self,
        candidate_id: CandidateId,
        ciphertext: CiphertextHandle,
        proof: &[u8],
    ) -> Result<TxReceipt, ContractError> {
        if let Some(error) = self.submit_failure.lock().take() {
            return Err(error);
        }

        let candidate = self.candidate(candidate_id).await?;
        if !candidate.is_active {
            return Err(ContractError::Reverted("candidate is not active".into()));
        }
        if !self
            .ledger
            .verify_input_proof(&ciphertext, &self.address, &self.account, proof)
        {
            return Err(ContractError::Reverted("invalid input proof".into()));
        }

        tokio::time::sleep(self.block_time).await;

        let result = self
            .ledger
            .record_offer(&self.account, candidate_id, &ciphertext)
            .map_err(|e| ContractError::Reverted(e.to_string()))?;
        let block_number = self.ledger.next_block();
        debug!(candidate_id, block_number, result = ?result, "devnet offer mined");

        Ok(TxReceipt {
            tx_hash: self.tx_hash(candidate_id, &ciphertext, block_number),
            block_number,
        })
    }

    async fn offer_result(
        &self,
        candidate_id: CandidateId,
    ) -> Result<CiphertextHandle, ContractError> {
        if let Some(error) = self.result_failure.lock().take() {
            return Err(error);
        }
        self.ledger
            .offer_result(&self.account, candidate_id)
            .ok_or_else(|| ContractError::Reverted("no offer submitted for candidate".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::contract::load_candidates;

    #[tokio::test(start_paused = true)]
    async fn catalog_loads_in_order() {
        let ledger = DevnetLedger::seeded();
        let contract = DevnetContract::connect(ledger, Address::from_bytes([1; 20]));
        let candidates = load_candidates(&contract).await.unwrap();
        let names: Vec<_> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            ["Alice Chen", "Bob Martinez", "Carol Wang", "David Kim", "Emma Johnson"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_forged_proof_and_inactive_candidate() {
        let ledger = DevnetLedger::seeded();
        let account = Address::from_bytes([1; 20]);
        let contract = DevnetContract::connect(Arc::clone(&ledger), account.clone());
        let handle = ledger.seal(8_000).unwrap();

        let err = contract.submit_offer(0, handle, &[0; 32]).await.unwrap_err();
        assert_eq!(err, ContractError::Reverted("invalid input proof".into()));

        ledger.set_candidate_active(1, false).unwrap();
        let proof = ledger.input_proof(&handle, contract.address(), &account);
        let err = contract.submit_offer(1, handle, &proof).await.unwrap_err();
        assert_eq!(err, ContractError::Reverted("candidate is not active".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn submit_records_result_for_account() {
        let ledger = DevnetLedger::seeded();
        let account = Address::from_bytes([1; 20]);
        let contract = DevnetContract::connect(Arc::clone(&ledger), account.clone());
        let handle = ledger.seal(9_000).unwrap();
        let proof = ledger.input_proof(&handle, contract.address(), &account);

        assert!(contract.offer_result(3).await.is_err());
        let receipt = contract.submit_offer(3, handle, &proof).await.unwrap();
        assert!(receipt.tx_hash.starts_with("0x"));

        let result = contract.offer_result(3).await.unwrap();
        assert_eq!(ledger.unseal(&result).unwrap(), 0, "9000 is below David's 9500");
    }

    #[tokio::test(start_paused = true)]
    async fn submission_waits_for_the_block_time() {
        let ledger = DevnetLedger::seeded();
        let account = Address::from_bytes([1; 20]);
        let contract = DevnetContract::connect(Arc::clone(&ledger), account.clone())
            .with_block_time(Duration::from_secs(12));
        let handle = ledger.seal(7_000).unwrap();
        let proof = ledger.input_proof(&handle, contract.address(), &account);

        let started = tokio::time::Instant::now();
        contract.submit_offer(4, handle, &proof).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn injected_failures_fire_once() {
        let ledger = DevnetLedger::seeded();
        let contract = DevnetContract::connect(ledger, Address::from_bytes([1; 20]));
        contract.fail_next_submit(ContractError::UserRejected);

        let handle = CiphertextHandle::from_bytes([0; 32]);
        assert_eq!(
            contract.submit_offer(0, handle, &[]).await.unwrap_err(),
            ContractError::UserRejected
        );
        assert_eq!(
            contract.submit_offer(0, handle, &[]).await.unwrap_err(),
            ContractError::Reverted("invalid input proof".into())
        );
    }
}
