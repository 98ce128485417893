//! Devnet [`EncryptionClient`].
//!
//! Encrypts into the shared [`DevnetLedger`] and serves user decryption
//! from it after checking what the real relayer checks: the account's
//! signature over the authorization, its validity window, the contract
//! list, and the ACL. How the service behaves (answers, hangs, fails) is
//! switchable at runtime so slow or broken relayers can be reproduced.

use async_trait::async_trait;
use chrono::Utc;
use ed25519_dalek::{Signature as DalekSignature, SigningKey, Verifier};
use parking_lot::{Mutex, RwLock};
use rand::rngs::OsRng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::ledger::DevnetLedger;
use crate::client::encryption::{
    AuthorizationArtifact, AuthorizationDomain, DecryptedValues, DecryptionKeypair,
    EncryptedInput, EncryptionClient, FheError, UserDecryptAuthorization, UserDecryptRequest,
};
use crate::config::FhevmNetworkConfig;
use crate::types::Address;

/// How the devnet decryption service answers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecryptBehavior {
    /// Answer after `latency`.
    Respond { latency: Duration },
    /// Never answer.
    Hang,
    /// Fail with `error` after `latency`.
    Fail { latency: Duration, error: FheError },
}

impl Default for DecryptBehavior {
    fn default() -> Self {
        DecryptBehavior::Respond {
            latency: Duration::from_millis(500),
        }
    }
}

pub struct DevnetFhe {
    ledger: Arc<DevnetLedger>,
    network: FhevmNetworkConfig,
    initialized: AtomicBool,
    initialize_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
    init_failure: Mutex<Option<FheError>>,
    behavior: RwLock<DecryptBehavior>,
}

impl DevnetFhe {
    pub fn new(ledger: Arc<DevnetLedger>) -> Self {
        Self {
            ledger,
            network: FhevmNetworkConfig::default(),
            initialized: AtomicBool::new(false),
            initialize_calls: AtomicUsize::new(0),
            decrypt_calls: AtomicUsize::new(0),
            init_failure: Mutex::new(None),
            behavior: RwLock::new(DecryptBehavior::default()),
        }
    }

    pub fn with_network(mut self, network: FhevmNetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn with_behavior(self, behavior: DecryptBehavior) -> Self {
        *self.behavior.write() = behavior;
        self
    }

    pub fn set_behavior(&self, behavior: DecryptBehavior) {
        *self.behavior.write() = behavior;
    }

    /// Make the next `initialize` call fail with `error`.
    pub fn fail_next_initialize(&self, error: FheError) {
        *self.init_failure.lock() = Some(error);
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    fn ensure_initialized(&self) -> Result<(), FheError> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(FheError::NotInitialized)
        }
    }

    fn domain(&self) -> AuthorizationDomain {
        AuthorizationDomain {
            name: "Decryption".to_string(),
            version: "1".to_string(),
            chain_id: self.network.chain_id,
            verifying_contract: self.network.decryption_verifying_contract.clone(),
        }
    }

    /// The checks a relayer runs before it answers.
    fn authorize(&self, request: &UserDecryptRequest) -> Result<(), FheError> {
        let key = self
            .ledger
            .verifying_key(&request.account)
            .ok_or_else(|| FheError::Unauthorized(format!("unknown account {}", request.account)))?;

        let artifact = AuthorizationArtifact::new(self.domain(), request.authorization_message());
        let now = Utc::now().timestamp().max(0) as u64;
        if !artifact.is_valid_at(now) {
            return Err(FheError::Unauthorized("authorization outside its validity window".into()));
        }

        let signature = DalekSignature::from_slice(request.signature.as_bytes())
            .map_err(|_| FheError::Unauthorized("malformed signature".into()))?;
        key.verify(&artifact.digest(), &signature)
            .map_err(|_| FheError::Unauthorized("signature does not match account".into()))?;

        for pair in &request.handles {
            if !request.contract_addresses.contains(&pair.contract) {
                return Err(FheError::Unauthorized(format!(
                    "contract {} not covered by the authorization",
                    pair.contract
                )));
            }
            if !self.ledger.is_allowed(&pair.handle, &request.account) {
                return Err(FheError::Unauthorized(format!(
                    "account not allowed to decrypt {}",
                    pair.handle
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EncryptionClient for DevnetFhe {
    async fn initialize(&self) -> Result<(), FheError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.init_failure.lock().take() {
            return Err(error);
        }
        self.initialized.store(true, Ordering::SeqCst);
        debug!(chain_id = self.network.chain_id, "devnet FHE ready");
        Ok(())
    }

    async fn encrypt_u32(
        &self,
        value: u32,
        contract: &Address,
        account: &Address,
    ) -> Result<EncryptedInput, FheError> {
        self.ensure_initialized()?;
        let handle = self
            .ledger
            .seal(u64::from(value))
            .map_err(|e| FheError::Encryption(e.to_string()))?;
        let proof = self.ledger.input_proof(&handle, contract, account);
        Ok(EncryptedInput { handle, proof })
    }

    fn generate_keypair(&self) -> Result<DecryptionKeypair, FheError> {
        self.ensure_initialized()?;
        let key = SigningKey::generate(&mut OsRng);
        Ok(DecryptionKeypair {
            public_key: hex::encode(key.verifying_key().to_bytes()),
            private_key: hex::encode(key.to_bytes()),
        })
    }

    fn build_authorization(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u32,
    ) -> Result<AuthorizationArtifact, FheError> {
        self.ensure_initialized()?;
        if public_key.is_empty() {
            return Err(FheError::Keypair("empty public key".into()));
        }
        Ok(AuthorizationArtifact::new(
            self.domain(),
            UserDecryptAuthorization {
                public_key: public_key.to_string(),
                contract_addresses: contract_addresses.to_vec(),
                start_timestamp,
                duration_days,
            },
        ))
    }

    async fn decrypt(&self, request: UserDecryptRequest) -> Result<DecryptedValues, FheError> {
        self.ensure_initialized()?;
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);

        let behavior = self.behavior.read().clone();
        match behavior {
            DecryptBehavior::Hang => {
                debug!("devnet relayer hanging");
                std::future::pending().await
            }
            DecryptBehavior::Fail { latency, error } => {
                tokio::time::sleep(latency).await;
                warn!(error = %error, "devnet relayer failing");
                Err(error)
            }
            DecryptBehavior::Respond { latency } => {
                tokio::time::sleep(latency).await;
                self.authorize(&request)?;

                let mut values = DecryptedValues::with_capacity(request.handles.len());
                for pair in &request.handles {
                    let value = self
                        .ledger
                        .unseal(&pair.handle)
                        .map_err(|_| FheError::MissingHandle(pair.handle))?;
                    values.insert(pair.handle, value);
                }
                Ok(values)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::encryption::HandleContractPair;
    use crate::client::signer::AccountSigner;
    use crate::devnet::DevnetSigner;

    async fn ready(ledger: &Arc<DevnetLedger>) -> DevnetFhe {
        let fhe = DevnetFhe::new(Arc::clone(ledger));
        fhe.initialize().await.unwrap();
        fhe
    }

    async fn request_for(
        fhe: &DevnetFhe,
        ledger: &Arc<DevnetLedger>,
        signer: &DevnetSigner,
        value: u32,
    ) -> (crate::types::CiphertextHandle, UserDecryptRequest) {
        let contract = ledger.contract_address().clone();
        let input = fhe.encrypt_u32(value, &contract, signer.address()).await.unwrap();
        let result = ledger.record_offer(signer.address(), 0, &input.handle).unwrap();

        let keypair = fhe.generate_keypair().unwrap();
        let start = Utc::now().timestamp() as u64;
        let artifact = fhe
            .build_authorization(&keypair.public_key, &[contract.clone()], start, 10)
            .unwrap();
        let signature = signer.sign_authorization(&artifact).await.unwrap();
        let request = UserDecryptRequest {
            handles: vec![HandleContractPair {
                handle: result,
                contract: contract.clone(),
            }],
            keypair,
            signature,
            contract_addresses: vec![contract],
            account: signer.address().clone(),
            start_timestamp: start,
            duration_days: 10,
        };
        (result, request)
    }

    #[tokio::test]
    async fn encrypt_requires_initialize() {
        let ledger = DevnetLedger::seeded();
        let fhe = DevnetFhe::new(Arc::clone(&ledger));
        let contract = ledger.contract_address().clone();
        let err = fhe.encrypt_u32(1, &contract, &contract).await.unwrap_err();
        assert_eq!(err, FheError::NotInitialized);
    }

    #[tokio::test(start_paused = true)]
    async fn signed_request_decrypts() {
        let ledger = DevnetLedger::seeded();
        let fhe = ready(&ledger).await;
        let signer = DevnetSigner::generate(&ledger);

        let (handle, request) = request_for(&fhe, &ledger, &signer, 8_500).await;
        let values = fhe.decrypt(request).await.unwrap();
        assert_eq!(values.get(&handle), Some(&1));
        assert_eq!(fhe.decrypt_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_signature_is_refused() {
        let ledger = DevnetLedger::seeded();
        let fhe = ready(&ledger).await;
        let signer = DevnetSigner::generate(&ledger);
        let impostor = DevnetSigner::generate(&ledger);

        let (_, mut request) = request_for(&fhe, &ledger, &signer, 8_500).await;
        let artifact = fhe
            .build_authorization(
                &request.keypair.public_key,
                &request.contract_addresses,
                request.start_timestamp,
                request.duration_days,
            )
            .unwrap();
        request.signature = impostor.sign_authorization(&artifact).await.unwrap();

        let err = fhe.decrypt(request).await.unwrap_err();
        assert!(matches!(err, FheError::Unauthorized(_)));
        assert!(!err.is_infrastructure());
    }

    #[tokio::test(start_paused = true)]
    async fn authorization_is_bound_to_the_chain() {
        let ledger = DevnetLedger::seeded();
        let sepolia = ready(&ledger).await;
        let signer = DevnetSigner::generate(&ledger);
        let (_, request) = request_for(&sepolia, &ledger, &signer, 8_500).await;

        let local = DevnetFhe::new(Arc::clone(&ledger)).with_network(FhevmNetworkConfig {
            chain_id: 31_337,
            ..FhevmNetworkConfig::sepolia()
        });
        local.initialize().await.unwrap();

        let err = local.decrypt(request).await.unwrap_err();
        assert_eq!(
            err,
            FheError::Unauthorized("signature does not match account".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn expired_authorization_is_refused() {
        let ledger = DevnetLedger::seeded();
        let fhe = ready(&ledger).await;
        let signer = DevnetSigner::generate(&ledger);

        let (_, mut request) = request_for(&fhe, &ledger, &signer, 8_500).await;
        request.start_timestamp = 1_000;
        let artifact = fhe
            .build_authorization(&request.keypair.public_key, &request.contract_addresses, 1_000, 10)
            .unwrap();
        request.signature = signer.sign_authorization(&artifact).await.unwrap();

        let err = fhe.decrypt(request).await.unwrap_err();
        assert!(matches!(err, FheError::Unauthorized(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn configured_failure_is_returned() {
        let ledger = DevnetLedger::seeded();
        let fhe = ready(&ledger).await.with_behavior(DecryptBehavior::Fail {
            latency: Duration::from_secs(1),
            error: FheError::Server {
                status: 503,
                message: "unavailable".into(),
            },
        });
        let signer = DevnetSigner::generate(&ledger);

        let (_, request) = request_for(&fhe, &ledger, &signer, 8_500).await;
        let err = fhe.decrypt(request).await.unwrap_err();
        assert!(err.is_infrastructure());
    }
}
