//! # Offer Workflow
//!
//! The negotiation state machine and the two timing primitives it is built
//! from:
//!
//! - **countdown** — a cancellable repeating timer for permission propagation.
//! - **race** — a spawned task raced against an advisory deadline.
//! - **state** — workflow states and per-attempt bookkeeping.
//! - **negotiation** — [`NegotiationWorkflow`] itself.

pub mod countdown;
pub mod negotiation;
pub mod race;
pub mod state;

pub use countdown::Countdown;
pub use negotiation::NegotiationWorkflow;
pub use race::{race_deadline, RaceOutcome};
pub use state::{AttemptOutcome, DecryptionAttempt, WorkflowState};
