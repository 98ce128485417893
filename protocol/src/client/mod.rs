//! # External Collaborators
//!
//! Traits for everything the workflow talks to but does not own:
//!
//! ```text
//! encryption.rs  — FHE SDK: encrypt, ephemeral keys, authorization, user decryption
//! contract.rs    — HushHire contract: candidates, submitOffer, getOfferResult
//! signer.rs      — the connected wallet
//! ```
//!
//! All I/O-bound methods are async (`async-trait`) and the traits are
//! object safe, so the workflow holds them as `Arc<dyn Trait>`. The
//! [`crate::devnet`] module provides in-process implementations.

pub mod contract;
pub mod encryption;
pub mod signer;

pub use contract::{load_candidates, ContractClient, ContractError};
pub use encryption::{
    AuthorizationArtifact, AuthorizationDomain, DecryptedValues, DecryptionKeypair,
    EncryptedInput, EncryptionClient, FheError, HandleContractPair, UserDecryptAuthorization,
    UserDecryptRequest,
};
pub use signer::{AccountSigner, Signature, SignerError};
