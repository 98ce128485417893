//! Devnet [`AccountSigner`] backed by an Ed25519 key.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::ledger::DevnetLedger;
use crate::client::encryption::AuthorizationArtifact;
use crate::client::signer::{AccountSigner, Signature, SignerError};
use crate::types::Address;

pub struct DevnetSigner {
    address: Address,
    signing_key: SigningKey,
    reject: AtomicBool,
}

impl DevnetSigner {
    /// A fresh random account, registered with `ledger`.
    pub fn generate(ledger: &Arc<DevnetLedger>) -> Self {
        Self::from_signing_key(ledger, SigningKey::generate(&mut OsRng))
    }

    /// A deterministic account from a 32-byte secret.
    pub fn from_secret(ledger: &Arc<DevnetLedger>, secret: &[u8; 32]) -> Self {
        Self::from_signing_key(ledger, SigningKey::from_bytes(secret))
    }

    fn from_signing_key(ledger: &Arc<DevnetLedger>, signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        let address = address_of(&verifying_key.to_bytes());
        ledger.register_account(address.clone(), verifying_key);
        Self {
            address,
            signing_key,
            reject: AtomicBool::new(false),
        }
    }

    /// Make every subsequent signature request fail as if the user declined.
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }
}

/// Last 20 bytes of the BLAKE3 hash of the verifying key.
fn address_of(verifying_key: &[u8; 32]) -> Address {
    let digest = blake3::hash(verifying_key);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest.as_bytes()[12..]);
    Address::from_bytes(bytes)
}

#[async_trait]
impl AccountSigner for DevnetSigner {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn sign_authorization(
        &self,
        artifact: &AuthorizationArtifact,
    ) -> Result<Signature, SignerError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(SignerError::UserRejected);
        }
        let signature = self.signing_key.sign(&artifact.digest());
        Ok(Signature(signature.to_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_gives_stable_registered_address() {
        let ledger = DevnetLedger::new();
        let a = DevnetSigner::from_secret(&ledger, &[7; 32]);
        let b = DevnetSigner::from_secret(&ledger, &[7; 32]);
        assert_eq!(a.address(), b.address());
        assert!(ledger.verifying_key(a.address()).is_some());

        let c = DevnetSigner::from_secret(&ledger, &[8; 32]);
        assert_ne!(a.address(), c.address());
    }
}
