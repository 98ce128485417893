//! Error types for the negotiation workflow.
//!
//! Every workflow operation that can fail returns a [`NegotiationError`].
//! Collaborator failures (contract, encryption SDK, wallet, storage) keep
//! their own enums and are wrapped here, so callers can still match on the
//! precise cause.

use thiserror::Error;

use crate::client::contract::ContractError;
use crate::client::encryption::FheError;
use crate::client::signer::SignerError;
use crate::storage::StorageError;
use crate::types::{Address, CandidateId};

/// Input or call-order problems. Never change workflow state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no candidate selected")]
    NoCandidateSelected,

    #[error("candidate {0} is not accepting offers")]
    CandidateInactive(CandidateId),

    #[error("offer must be a positive integer")]
    AmountNotPositive,

    #[error("offer {amount} does not fit in 32 bits (max {max})")]
    AmountTooLarge {
        /// The rejected amount.
        amount: u64,
        /// Largest representable amount.
        max: u64,
    },

    #[error("offer is not an integer: {0:?}")]
    AmountNotInteger(String),

    #[error("cannot {operation} while {state}")]
    WrongState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the workflow was in.
        state: &'static str,
    },
}

/// Errors surfaced by the negotiation workflow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("encryption client not initialized: {0}")]
    Initialization(String),

    #[error("offer encryption failed: {0}")]
    Encryption(FheError),

    #[error("transaction failed: {0}")]
    Transaction(#[from] ContractError),

    #[error("signature failed: {0}")]
    Signature(#[from] SignerError),

    #[error("decryption failed: {0}")]
    Decryption(FheError),

    #[error("no fallback data for account {account}, candidate {candidate_id}")]
    NoFallbackData {
        /// Account the lookup ran for.
        account: Address,
        /// Candidate the lookup ran for.
        candidate_id: CandidateId,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The operation finished after the workflow moved on (reset or a new
    /// selection). Its result was discarded.
    #[error("result for candidate {candidate_id} discarded: selection changed")]
    Superseded {
        /// Candidate the discarded result belonged to.
        candidate_id: CandidateId,
    },
}

/// Coarse classification, used for logging and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Initialization,
    Encryption,
    Transaction,
    Signature,
    Decryption,
    NoFallbackData,
    Storage,
    Superseded,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Initialization => "initialization",
            ErrorKind::Encryption => "encryption",
            ErrorKind::Transaction => "transaction",
            ErrorKind::Signature => "signature",
            ErrorKind::Decryption => "decryption",
            ErrorKind::NoFallbackData => "no_fallback_data",
            ErrorKind::Storage => "storage",
            ErrorKind::Superseded => "superseded",
        }
    }
}

impl NegotiationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Initialization(_) => ErrorKind::Initialization,
            Self::Encryption(_) => ErrorKind::Encryption,
            Self::Transaction(_) => ErrorKind::Transaction,
            Self::Signature(_) => ErrorKind::Signature,
            Self::Decryption(_) => ErrorKind::Decryption,
            Self::NoFallbackData { .. } => ErrorKind::NoFallbackData,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Superseded { .. } => ErrorKind::Superseded,
        }
    }

    /// Network, server or relayer failures. In demonstration mode these are
    /// absorbed by the fallback path instead of being surfaced.
    pub fn is_infrastructure(&self) -> bool {
        match self {
            Self::Decryption(e) => e.is_infrastructure(),
            Self::Transaction(e) => e.is_infrastructure(),
            _ => false,
        }
    }
}

pub type NegotiationResult<T> = Result<T, NegotiationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_classification() {
        assert!(NegotiationError::Decryption(FheError::Network("reset".into())).is_infrastructure());
        assert!(NegotiationError::Decryption(FheError::Server {
            status: 502,
            message: "bad gateway".into()
        })
        .is_infrastructure());
        assert!(!NegotiationError::Decryption(FheError::Server {
            status: 400,
            message: "bad request".into()
        })
        .is_infrastructure());
        assert!(!NegotiationError::Decryption(FheError::Unauthorized("expired".into()))
            .is_infrastructure());
        assert!(NegotiationError::Transaction(ContractError::Network("timeout".into()))
            .is_infrastructure());
        assert!(!NegotiationError::Signature(SignerError::UserRejected).is_infrastructure());
    }

    #[test]
    fn test_kind_labels_are_distinct() {
        let kinds = [
            ErrorKind::Validation,
            ErrorKind::Initialization,
            ErrorKind::Encryption,
            ErrorKind::Transaction,
            ErrorKind::Signature,
            ErrorKind::Decryption,
            ErrorKind::NoFallbackData,
            ErrorKind::Storage,
            ErrorKind::Superseded,
        ];
        let labels: std::collections::HashSet<_> = kinds.iter().map(|k| k.as_str()).collect();
        assert_eq!(labels.len(), kinds.len());
    }

    #[test]
    fn test_validation_converts() {
        let err: NegotiationError = ValidationError::NoCandidateSelected.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "validation failed: no candidate selected");
    }
}
