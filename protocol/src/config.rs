//! # Negotiation Configuration & Constants
//!
//! Every timing constant and network parameter the negotiation client relies
//! on lives here. The workflow never hardcodes a duration; it reads a
//! [`NegotiationConfig`], which defaults to the constants below.
//!
//! The two propagation waits differ on purpose: in production the
//! access-control grant takes noticeably longer to reach the off-chain
//! decryption service than on a demonstration deployment.

use std::time::Duration;

use crate::mode::Mode;

// ---------------------------------------------------------------------------
// Workflow Timing
// ---------------------------------------------------------------------------

/// Seconds to wait for permission propagation after a demonstration submit.
pub const DEMO_PROPAGATION_WAIT_SECS: u32 = 3;

/// Seconds to wait for permission propagation after a production submit.
pub const PRODUCTION_PROPAGATION_WAIT_SECS: u32 = 10;

/// One countdown step.
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// How long a demonstration decryption may run before the fallback kicks in.
/// Advisory only: the real request keeps running, its late result is dropped.
pub const DEMO_DECRYPT_DEADLINE: Duration = Duration::from_secs(5);

/// Extra delay applied before a simulated result is revealed, so the
/// fallback path takes about as long as a slow real decryption.
pub const SIMULATED_LATENCY: Duration = Duration::from_secs(2);

/// Validity window of a user-decryption authorization, in days.
pub const AUTHORIZATION_VALIDITY_DAYS: u32 = 10;

// ---------------------------------------------------------------------------
// Encryption Parameters
// ---------------------------------------------------------------------------

/// Bit width of the encrypted offer. Offers are `euint32` on-chain.
pub const CIPHERTEXT_BIT_WIDTH: u32 = 32;

/// Largest offer that fits in [`CIPHERTEXT_BIT_WIDTH`] bits.
pub const MAX_OFFER_AMOUNT: u64 = u32::MAX as u64;

// ---------------------------------------------------------------------------
// Persistence Keys
// ---------------------------------------------------------------------------

/// Prefix of every fallback record key: `demo_offer_<account>_<candidate>`.
pub const FALLBACK_KEY_PREFIX: &str = "demo_offer";

/// Preference key holding the persisted demonstration-mode flag.
pub const DEMO_MODE_PREFERENCE_KEY: &str = "DEMO_MODE";

// ---------------------------------------------------------------------------
// Network Parameters (Sepolia FHEVM)
// ---------------------------------------------------------------------------

/// Deployed HushHire contract.
pub const HUSHHIRE_CONTRACT_ADDRESS: &str = "0xaD289c8a3D87fdA8663FC2302622634Bfab23Fc3";

/// Sepolia chain id.
pub const CHAIN_ID: u64 = 11_155_111;

/// Chain id of the decryption gateway.
pub const GATEWAY_CHAIN_ID: u64 = 10_901;

pub const ACL_CONTRACT_ADDRESS: &str = "0xf0Ffdc93b7E186bC2f8CB3dAA75D86d1930A433D";
pub const KMS_CONTRACT_ADDRESS: &str = "0xbE0E383937d564D7FF0BC3b46c51f0bF8d5C311A";
pub const INPUT_VERIFIER_CONTRACT_ADDRESS: &str = "0xBBC1fFCdc7C316aAAd72E807D9b0272BE8F84DA0";
pub const DECRYPTION_VERIFYING_CONTRACT_ADDRESS: &str =
    "0x5D8BD78e2ea6bbE41f26dFe9fdaEAa349e077478";
pub const INPUT_VERIFICATION_VERIFYING_CONTRACT_ADDRESS: &str =
    "0x483b9dE06E4E4C7D35CCf5837A1668487406D955";

/// Relayer that fronts the key management service.
pub const RELAYER_URL: &str = "https://relayer.testnet.zama.org";

/// Everything an FHE SDK needs to talk to one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FhevmNetworkConfig {
    pub chain_id: u64,
    pub gateway_chain_id: u64,
    pub acl_contract: String,
    pub kms_contract: String,
    pub input_verifier_contract: String,
    pub decryption_verifying_contract: String,
    pub input_verification_verifying_contract: String,
    pub relayer_url: String,
}

impl FhevmNetworkConfig {
    /// Parameters of the public Sepolia deployment.
    pub fn sepolia() -> Self {
        Self {
            chain_id: CHAIN_ID,
            gateway_chain_id: GATEWAY_CHAIN_ID,
            acl_contract: ACL_CONTRACT_ADDRESS.to_string(),
            kms_contract: KMS_CONTRACT_ADDRESS.to_string(),
            input_verifier_contract: INPUT_VERIFIER_CONTRACT_ADDRESS.to_string(),
            decryption_verifying_contract: DECRYPTION_VERIFYING_CONTRACT_ADDRESS.to_string(),
            input_verification_verifying_contract: INPUT_VERIFICATION_VERIFYING_CONTRACT_ADDRESS
                .to_string(),
            relayer_url: RELAYER_URL.to_string(),
        }
    }
}

impl Default for FhevmNetworkConfig {
    fn default() -> Self {
        Self::sepolia()
    }
}

// ---------------------------------------------------------------------------
// NegotiationConfig
// ---------------------------------------------------------------------------

/// Tunable timing for one negotiation workflow.
///
/// Defaults match the constants above. Tests shrink nothing: they run on a
/// paused tokio clock instead, so the real values are exercised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationConfig {
    /// Countdown length, in ticks, after a demonstration submit.
    pub demo_propagation_ticks: u32,

    /// Countdown length, in ticks, after a production submit.
    pub production_propagation_ticks: u32,

    /// Duration of one countdown tick.
    pub countdown_tick: Duration,

    /// Deadline raced against the real decryption in demonstration mode.
    pub demo_decrypt_deadline: Duration,

    /// Delay before a simulated result is revealed.
    pub simulated_latency: Duration,

    /// Validity of the decryption authorization, in days.
    pub authorization_validity_days: u32,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            demo_propagation_ticks: DEMO_PROPAGATION_WAIT_SECS,
            production_propagation_ticks: PRODUCTION_PROPAGATION_WAIT_SECS,
            countdown_tick: COUNTDOWN_TICK,
            demo_decrypt_deadline: DEMO_DECRYPT_DEADLINE,
            simulated_latency: SIMULATED_LATENCY,
            authorization_validity_days: AUTHORIZATION_VALIDITY_DAYS,
        }
    }
}

impl NegotiationConfig {
    /// Countdown length for the given mode.
    pub fn propagation_ticks(&self, mode: Mode) -> u32 {
        match mode {
            Mode::Demonstration => self.demo_propagation_ticks,
            Mode::Production => self.production_propagation_ticks,
        }
    }

    /// Wall-clock length of the propagation wait for the given mode.
    pub fn propagation_wait(&self, mode: Mode) -> Duration {
        self.countdown_tick * self.propagation_ticks(mode)
    }
}
