//! # Negotiation Session
//!
//! One session per connected account. It fixes the [`Mode`] for its whole
//! lifetime and owns the once-only initialization of the FHE SDK.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::client::encryption::{EncryptionClient, FheError};
use crate::error::{NegotiationError, NegotiationResult};
use crate::mode::Mode;
use crate::types::Address;

/// Account, mode, and the SDK instance shared by every workflow of the session.
pub struct Session {
    account: Address,
    mode: Mode,
    encryption: Arc<dyn EncryptionClient>,
    ready: OnceCell<()>,
}

impl Session {
    pub fn new(account: Address, mode: Mode, encryption: Arc<dyn EncryptionClient>) -> Self {
        info!(%account, %mode, "session started");
        Self {
            account,
            mode,
            encryption,
            ready: OnceCell::new(),
        }
    }

    pub fn account(&self) -> &Address {
        &self.account
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn encryption(&self) -> &Arc<dyn EncryptionClient> {
        &self.encryption
    }

    pub fn is_initialized(&self) -> bool {
        self.ready.initialized()
    }

    /// Initialize the SDK. Concurrent callers wait on the call already in
    /// flight instead of starting another; once it succeeded this is a no-op.
    /// A failed initialization can be retried.
    pub async fn initialize(&self) -> NegotiationResult<()> {
        self.ready
            .get_or_try_init(|| async {
                self.encryption.initialize().await.map_err(|e| {
                    warn!(error = %e, "FHE SDK initialization failed");
                    init_error(e)
                })?;
                info!(account = %self.account, "FHE SDK initialized");
                Ok::<(), NegotiationError>(())
            })
            .await
            .map(|_| ())
    }
}

fn init_error(e: FheError) -> NegotiationError {
    NegotiationError::Initialization(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devnet::{DevnetFhe, DevnetLedger};

    #[tokio::test(start_paused = true)]
    async fn concurrent_initialize_runs_once() {
        let ledger = DevnetLedger::seeded();
        let fhe = Arc::new(DevnetFhe::new(ledger));
        let session = Session::new(
            Address::from_bytes([1; 20]),
            Mode::Production,
            fhe.clone() as Arc<dyn EncryptionClient>,
        );

        let (a, b) = tokio::join!(session.initialize(), session.initialize());
        a.unwrap();
        b.unwrap();
        session.initialize().await.unwrap();

        assert!(session.is_initialized());
        assert_eq!(fhe.initialize_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_initialize_can_be_retried() {
        let ledger = DevnetLedger::seeded();
        let fhe = Arc::new(DevnetFhe::new(ledger));
        fhe.fail_next_initialize(FheError::Network("assets unreachable".into()));
        let session = Session::new(
            Address::from_bytes([1; 20]),
            Mode::Demonstration,
            fhe.clone() as Arc<dyn EncryptionClient>,
        );

        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, NegotiationError::Initialization(_)));
        assert!(!session.is_initialized());

        session.initialize().await.unwrap();
        assert!(session.is_initialized());
        assert_eq!(fhe.initialize_calls(), 2);
    }
}
