// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # HushHire — Encrypted Offer Negotiation
//!
//! A hiring manager submits a salary offer that is encrypted before it ever
//! leaves the client. A contract compares it homomorphically against the
//! candidate's encrypted expectation and the manager learns only one bit:
//! does the offer meet the expectation or not.
//!
//! ## Architecture
//!
//! - **mode** — demonstration vs. production, resolved once per session.
//! - **session** — account, mode, and once-only FHE SDK initialization.
//! - **workflow** — the negotiation state machine, its countdown and its
//!   deadline race.
//! - **client** — traits for the FHE SDK, the contract and the wallet.
//! - **storage** — fallback records and preferences (in-memory or sled).
//! - **devnet** — in-process implementations of every client trait.
//! - **types** / **error** / **config** — shared data, errors, constants.
//!
//! ## Modes
//!
//! Production always waits for the real decryption and surfaces its errors.
//! Demonstration races it against a short deadline and, when the service is
//! slow or down, reveals a result computed from the plaintext pair stored at
//! submit time. The caller sees the same `Resolved` state either way.

pub mod client;
pub mod config;
pub mod devnet;
pub mod error;
pub mod mode;
pub mod session;
pub mod storage;
pub mod types;
pub mod workflow;

pub use error::{ErrorKind, NegotiationError, NegotiationResult, ValidationError};
pub use mode::{Mode, ModeSelector};
pub use session::Session;
pub use types::{Address, Candidate, CandidateId, CiphertextHandle, MatchResult, Offer, TxReceipt};
pub use workflow::{NegotiationWorkflow, WorkflowState};
