//! # FHE Encryption Client
//!
//! The seam between the workflow and an FHE-capable SDK. The SDK encrypts
//! offers into ciphertext handles the contract can compute on, and performs
//! *user decryption*: re-encryption of a result under an ephemeral keypair,
//! authorized by a signed, time-boxed statement from the account.
//!
//! ## User decryption, step by step
//!
//! ```text
//! generate_keypair()            ephemeral (public, private)
//! build_authorization(pk, ..)   artifact binding pk + contracts + window
//! AccountSigner::sign(..)       wallet signs the artifact digest
//! decrypt(request)              relayer/KMS returns handle -> plaintext
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::client::signer::Signature;
use crate::types::{Address, CiphertextHandle};

/// Seconds in one day of authorization validity.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Failures reported by the FHE SDK or the decryption service behind it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FheError {
    #[error("SDK not initialized")]
    NotInitialized,

    #[error("SDK initialization failed: {0}")]
    Initialization(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("keypair generation failed: {0}")]
    Keypair(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status returned by the service.
        status: u16,
        /// Body or reason phrase.
        message: String,
    },

    #[error("relayer error: {0}")]
    Relayer(String),

    #[error("not authorized to decrypt: {0}")]
    Unauthorized(String),

    #[error("no plaintext returned for handle {0}")]
    MissingHandle(CiphertextHandle),

    #[error("plaintext {value} for handle {handle} is not a comparison result")]
    InvalidPlaintext {
        /// Handle that decrypted to an unexpected value.
        handle: CiphertextHandle,
        /// The value itself.
        value: u64,
    },
}

impl FheError {
    /// Network, 5xx and relayer failures: the service, not the request, is at fault.
    pub fn is_infrastructure(&self) -> bool {
        match self {
            FheError::Network(_) | FheError::Relayer(_) => true,
            FheError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Encryption
// ---------------------------------------------------------------------------

/// Result of encrypting one value for a contract call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedInput {
    pub handle: CiphertextHandle,
    /// Input proof the contract verifies before accepting the handle.
    pub proof: Vec<u8>,
}

/// Ephemeral keypair for one user decryption. Hex encoded.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptionKeypair {
    pub public_key: String,
    pub private_key: String,
}

impl fmt::Debug for DecryptionKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionKeypair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

/// Signing domain of the decryption authorization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: String,
}

/// The statement the account signs to grant decryption rights.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDecryptAuthorization {
    pub public_key: String,
    pub contract_addresses: Vec<Address>,
    pub start_timestamp: u64,
    pub duration_days: u32,
}

/// A domain-bound authorization awaiting the account's signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationArtifact {
    pub domain: AuthorizationDomain,
    pub message: UserDecryptAuthorization,
}

impl AuthorizationArtifact {
    pub fn new(domain: AuthorizationDomain, message: UserDecryptAuthorization) -> Self {
        Self { domain, message }
    }

    /// SHA-256 over the canonical JSON of domain and message. This is what
    /// the wallet signs and what the decryption service verifies.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"hushhire.user-decrypt.v1");
        // Serializing plain structs of strings and integers cannot fail.
        hasher.update(serde_json::to_vec(&self.domain).unwrap_or_default());
        hasher.update(serde_json::to_vec(&self.message).unwrap_or_default());
        hasher.finalize().into()
    }

    /// First second after the validity window.
    pub fn expires_at(&self) -> u64 {
        self.message.start_timestamp
            + u64::from(self.message.duration_days) * SECONDS_PER_DAY
    }

    /// Whether `now` (Unix seconds) falls inside the validity window.
    pub fn is_valid_at(&self, now: u64) -> bool {
        now >= self.message.start_timestamp && now < self.expires_at()
    }
}

// ---------------------------------------------------------------------------
// Decryption Request
// ---------------------------------------------------------------------------

/// A handle together with the contract allowed to use it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleContractPair {
    pub handle: CiphertextHandle,
    pub contract: Address,
}

/// Everything the service needs for one user decryption.
#[derive(Clone, Debug)]
pub struct UserDecryptRequest {
    pub handles: Vec<HandleContractPair>,
    pub keypair: DecryptionKeypair,
    pub signature: Signature,
    pub contract_addresses: Vec<Address>,
    pub account: Address,
    pub start_timestamp: u64,
    pub duration_days: u32,
}

impl UserDecryptRequest {
    /// The message the signature is expected to cover.
    pub fn authorization_message(&self) -> UserDecryptAuthorization {
        UserDecryptAuthorization {
            public_key: self.keypair.public_key.clone(),
            contract_addresses: self.contract_addresses.clone(),
            start_timestamp: self.start_timestamp,
            duration_days: self.duration_days,
        }
    }
}

/// Plaintexts keyed by the handle they came from.
pub type DecryptedValues = HashMap<CiphertextHandle, u64>;

// ---------------------------------------------------------------------------
// EncryptionClient
// ---------------------------------------------------------------------------

/// An FHE SDK instance bound to one network.
///
/// `initialize` must complete once before anything else; [`crate::Session`]
/// enforces that and deduplicates concurrent calls.
#[async_trait]
pub trait EncryptionClient: Send + Sync {
    /// Load SDK assets and connect to the network.
    async fn initialize(&self) -> Result<(), FheError>;

    /// Encrypt a 32-bit plaintext for `contract`, on behalf of `account`.
    async fn encrypt_u32(
        &self,
        value: u32,
        contract: &Address,
        account: &Address,
    ) -> Result<EncryptedInput, FheError>;

    /// Fresh ephemeral keypair for one decryption.
    fn generate_keypair(&self) -> Result<DecryptionKeypair, FheError>;

    /// Build the artifact the account must sign before decrypting.
    fn build_authorization(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u32,
    ) -> Result<AuthorizationArtifact, FheError>;

    /// Perform the user decryption. May take tens of seconds in production.
    async fn decrypt(&self, request: UserDecryptRequest) -> Result<DecryptedValues, FheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(start: u64, days: u32) -> AuthorizationArtifact {
        AuthorizationArtifact::new(
            AuthorizationDomain {
                name: "Decryption".into(),
                version: "1".into(),
                chain_id: 11_155_111,
                verifying_contract: "0x5d8bd78e2ea6bbe41f26dfe9fdaeaa349e077478".into(),
            },
            UserDecryptAuthorization {
                public_key: "ab".repeat(32),
                contract_addresses: vec![Address::from_bytes([1; 20])],
                start_timestamp: start,
                duration_days: days,
            },
        )
    }

    #[test]
    fn test_digest_binds_every_field() {
        let base = artifact(1_700_000_000, 10);
        assert_eq!(base.digest(), artifact(1_700_000_000, 10).digest());
        assert_ne!(base.digest(), artifact(1_700_000_001, 10).digest());
        assert_ne!(base.digest(), artifact(1_700_000_000, 11).digest());

        let mut other_key = base.clone();
        other_key.message.public_key = "cd".repeat(32);
        assert_ne!(base.digest(), other_key.digest());

        let mut other_chain = base.clone();
        other_chain.domain.chain_id = 1;
        assert_ne!(base.digest(), other_chain.digest());
    }

    #[test]
    fn test_validity_window() {
        let a = artifact(1_000, 10);
        assert!(!a.is_valid_at(999));
        assert!(a.is_valid_at(1_000));
        assert!(a.is_valid_at(1_000 + 10 * SECONDS_PER_DAY - 1));
        assert!(!a.is_valid_at(1_000 + 10 * SECONDS_PER_DAY));
    }

    #[test]
    fn test_keypair_debug_redacts_private_key() {
        let kp = DecryptionKeypair {
            public_key: "pub".into(),
            private_key: "super-secret".into(),
        };
        let rendered = format!("{:?}", kp);
        assert!(rendered.contains("pub"));
        assert!(!rendered.contains("super-secret"));
    }
}
