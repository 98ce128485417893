//! Wallet signing.
//!
//! Signing is an opaque asynchronous step: a browser wallet, a hardware
//! device or an in-process key. The user may refuse, which is reported as
//! [`SignerError::UserRejected`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::client::encryption::AuthorizationArtifact;
use crate::types::Address;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("signature request rejected by user")]
    UserRejected,

    #[error("signing failed: {0}")]
    Failed(String),
}

/// Raw signature bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    /// Hex without the `0x` prefix, the form decryption services expect.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

/// The connected account.
#[async_trait]
pub trait AccountSigner: Send + Sync {
    fn address(&self) -> &Address;

    /// Sign the digest of a decryption authorization.
    async fn sign_authorization(
        &self,
        artifact: &AuthorizationArtifact,
    ) -> Result<Signature, SignerError>;
}
