//! Workflow states and decryption attempt bookkeeping.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::NegotiationError;
use crate::types::{CandidateId, CiphertextHandle, MatchResult};

/// Where a negotiation stands.
///
/// ```text
/// Idle ─submit─► Submitting ─mined─► AwaitingPropagation(n) ─n=0─► ReadyToDecrypt
///                    │                                                  │
///                    ▼                                               decrypt
///                 Failed ◄──────────────── Decrypting ◄─────────────────┘
///                                              │
///                                              ▼
///                                          Resolved(r)
/// ```
///
/// `reset()` and a new selection return to `Idle` from anywhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Submitting,
    /// Waiting for the access-control grant to reach the decryption
    /// service. `remaining` counts down once per tick.
    AwaitingPropagation {
        remaining: u32,
    },
    ReadyToDecrypt,
    Decrypting,
    Resolved(MatchResult),
    Failed(NegotiationError),
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Submitting => "submitting",
            WorkflowState::AwaitingPropagation { .. } => "awaiting propagation",
            WorkflowState::ReadyToDecrypt => "ready to decrypt",
            WorkflowState::Decrypting => "decrypting",
            WorkflowState::Resolved(_) => "resolved",
            WorkflowState::Failed(_) => "failed",
        }
    }

    /// `Resolved` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Resolved(_) | WorkflowState::Failed(_))
    }
}

/// How a decryption attempt ended.
///
/// Kept for diagnostics only: callers see the same `Resolved` state
/// whichever path produced the value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Pending,
    RealSuccess(MatchResult),
    MockSuccess(MatchResult),
    Failed(NegotiationError),
}

/// One pass through `Decrypting`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptionAttempt {
    pub candidate_id: CandidateId,
    /// Result handle, once fetched from the contract.
    pub handle: Option<CiphertextHandle>,
    /// Deadline raced against the real call. `None` in production.
    pub deadline: Option<Duration>,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

impl DecryptionAttempt {
    pub fn pending(candidate_id: CandidateId, deadline: Option<Duration>) -> Self {
        Self {
            candidate_id,
            handle: None,
            deadline,
            started_at: Utc::now(),
            outcome: AttemptOutcome::Pending,
        }
    }

    pub fn was_simulated(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::MockSuccess(_))
    }
}
