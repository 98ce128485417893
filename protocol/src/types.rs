//! # Core Negotiation Types
//!
//! Addresses, ciphertext handles, candidates, offers and the comparison
//! result. Everything here is plain data: serializable, cheap to clone, and
//! free of any I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::MAX_OFFER_AMOUNT;
use crate::error::ValidationError;

/// Index of a candidate in the on-chain registry.
pub type CandidateId = u64;

/// Length of an account or contract address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Length of a ciphertext handle in bytes (`bytes32` on-chain).
pub const HANDLE_LENGTH: usize = 32;

/// Errors from parsing hex-encoded identifiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid ciphertext handle: {0}")]
    InvalidHandle(String),
}

fn strip_hex_prefix(raw: &str) -> &str {
    raw.strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw)
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account or contract address, stored lower-case with `0x`.
///
/// Checksummed input is accepted; comparison is case-insensitive because the
/// canonical form is lower-case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse a `0x`-prefixed (or bare) 40-character hex address.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let body = strip_hex_prefix(raw.trim());
        if body.len() != ADDRESS_LENGTH * 2 {
            return Err(ParseError::InvalidAddress(raw.to_string()));
        }
        hex::decode(body).map_err(|_| ParseError::InvalidAddress(raw.to_string()))?;
        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    /// Build an address from raw bytes.
    pub fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Ciphertext Handle
// ---------------------------------------------------------------------------

/// Opaque reference to an encrypted value. Never the value itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CiphertextHandle([u8; HANDLE_LENGTH]);

impl CiphertextHandle {
    pub fn from_bytes(bytes: [u8; HANDLE_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HANDLE_LENGTH] {
        &self.0
    }

    pub fn from_hex(raw: &str) -> Result<Self, ParseError> {
        let bytes = hex::decode(strip_hex_prefix(raw.trim()))
            .map_err(|_| ParseError::InvalidHandle(raw.to_string()))?;
        let array: [u8; HANDLE_LENGTH] = bytes
            .try_into()
            .map_err(|_| ParseError::InvalidHandle(raw.to_string()))?;
        Ok(Self(array))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps logs readable; handles are not secret.
        write!(f, "CiphertextHandle({}…)", &self.to_hex()[..10])
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// A candidate as listed by the contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub position: String,
    /// Encrypted salary expectation. Never decrypted by this client.
    pub expected_salary_handle: CiphertextHandle,
    pub skills: String,
    pub is_active: bool,
    /// Plaintext expectation published by demonstration deployments only.
    /// The sole input for a simulated result; ignored in production.
    pub disclosed_expectation: Option<u32>,
}

// ---------------------------------------------------------------------------
// Offer
// ---------------------------------------------------------------------------

/// An offer between submission and resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Offer {
    pub candidate_id: CandidateId,
    pub amount: u32,
    pub ciphertext: CiphertextHandle,
    pub proof: Vec<u8>,
}

/// Check that an offer is a positive integer that fits an `euint32`.
pub fn validate_offer_amount(amount: u64) -> Result<u32, ValidationError> {
    if amount == 0 {
        return Err(ValidationError::AmountNotPositive);
    }
    if amount > MAX_OFFER_AMOUNT {
        return Err(ValidationError::AmountTooLarge {
            amount,
            max: MAX_OFFER_AMOUNT,
        });
    }
    Ok(amount as u32)
}

/// Parse a user-typed offer such as `"8500"`.
pub fn parse_offer_amount(raw: &str) -> Result<u32, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        return Err(ValidationError::AmountNotPositive);
    }
    let amount: u64 = trimmed
        .parse()
        .map_err(|_| ValidationError::AmountNotInteger(raw.to_string()))?;
    validate_offer_amount(amount)
}

/// Confirmation of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
}

// ---------------------------------------------------------------------------
// Match Result
// ---------------------------------------------------------------------------

/// Outcome of the encrypted comparison `offer >= expectation`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MatchResult {
    /// The offer is below the expectation (plaintext 0).
    Below = 0,
    /// The offer meets or exceeds the expectation (plaintext 1).
    Meets = 1,
}

impl MatchResult {
    /// The comparison the contract performs, in the clear.
    pub fn compare(offer: u32, expectation: u32) -> Self {
        if offer >= expectation {
            MatchResult::Meets
        } else {
            MatchResult::Below
        }
    }

    /// Interpret a decrypted plaintext. Only 0 and 1 are valid.
    pub fn from_plaintext(value: u64) -> Option<Self> {
        match value {
            0 => Some(MatchResult::Below),
            1 => Some(MatchResult::Meets),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchResult::Meets => write!(f, "offer meets the expectation"),
            MatchResult::Below => write!(f, "offer is below the expectation"),
        }
    }
}
