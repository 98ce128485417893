//! # Local Devnet
//!
//! In-process implementations of the three collaborator interfaces, all
//! sharing one [`DevnetLedger`]. They stand in for the FHE SDK, the
//! deployed contract and the wallet when running the CLI offline and in
//! tests.
//!
//! The ledger does real cryptography: values are sealed with AES-256-GCM,
//! input proofs are keyed BLAKE3 MACs, and decryption requests carry an
//! Ed25519 signature the service verifies. It does not do homomorphic
//! arithmetic; the comparison is computed on the unsealed values inside
//! the ledger, which nothing outside it can reach.

pub mod contract;
pub mod fhe;
pub mod ledger;
pub mod signer;

pub use contract::DevnetContract;
pub use fhe::{DecryptBehavior, DevnetFhe};
pub use ledger::{DevnetLedger, LedgerError};
pub use signer::DevnetSigner;
