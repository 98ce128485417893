//! # HushHire Contract Client
//!
//! The four contract operations the workflow depends on, plus the
//! catalog loader built on top of them. The contract's internal logic (the
//! encrypted `offer >= expectation` comparison and its access-control
//! grants) lives on-chain and is not modeled here.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::types::{Address, Candidate, CandidateId, CiphertextHandle, TxReceipt};

/// Failures of contract reads and writes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractError {
    /// The wallet owner declined to sign the transaction.
    #[error("transaction rejected by user")]
    UserRejected,

    /// The contract reverted the call.
    #[error("execution reverted: {0}")]
    Reverted(String),

    /// The RPC endpoint could not be reached or timed out.
    #[error("network error: {0}")]
    Network(String),
}

impl ContractError {
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, ContractError::Network(_))
    }
}

/// Read/write access to the deployed contract on behalf of one account.
#[async_trait]
pub trait ContractClient: Send + Sync {
    /// Address of the contract, used for encryption and authorization.
    fn address(&self) -> &Address;

    async fn candidate_count(&self) -> Result<u64, ContractError>;

    async fn candidate(&self, id: CandidateId) -> Result<Candidate, ContractError>;

    /// Submit an encrypted offer and wait for the transaction to be mined.
    async fn submit_offer(
        &self,
        candidate_id: CandidateId,
        ciphertext: CiphertextHandle,
        proof: &[u8],
    ) -> Result<TxReceipt, ContractError>;

    /// Handle of the encrypted comparison result for this account's offer.
    async fn offer_result(&self, candidate_id: CandidateId)
        -> Result<CiphertextHandle, ContractError>;
}

/// Load every candidate, in registry order.
pub async fn load_candidates(contract: &dyn ContractClient) -> Result<Vec<Candidate>, ContractError> {
    let count = contract.candidate_count().await?;
    let mut candidates = Vec::new();
    for id in 0..count {
        candidates.push(contract.candidate(id).await?);
    }
    debug!(count, contract = %contract.address(), "candidate catalog loaded");
    Ok(candidates)
}
