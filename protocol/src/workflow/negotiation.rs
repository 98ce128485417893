//! # Negotiation Workflow
//!
//! Drives one encrypted offer from submission to a revealed match result.
//!
//! ## Flow
//!
//! 1. `select_candidate` picks who the offer is for.
//! 2. `submit` encrypts the amount, sends it to the contract and waits for
//!    the transaction. Demonstration sessions also write a
//!    [`FallbackRecord`] before the countdown starts.
//! 3. A countdown gives the access-control grant time to propagate.
//! 4. `decrypt` fetches the result handle, signs a decryption
//!    authorization and asks the service for the plaintext. Production
//!    awaits it. Demonstration races it against a deadline and falls back
//!    to the stored plaintext pair when the service is slow or failing.
//!
//! ## Stale results
//!
//! Every in-flight operation carries a [`Ticket`]: the candidate it was
//! started for and the workflow epoch at that time. `reset` and
//! `select_candidate` bump the epoch. A result whose ticket no longer
//! matches is discarded and the caller gets [`NegotiationError::Superseded`].
//! The same check is what keeps a late settlement from causing a second
//! transition.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::countdown::Countdown;
use super::race::{race_deadline, RaceOutcome};
use super::state::{AttemptOutcome, DecryptionAttempt, WorkflowState};
use crate::client::contract::ContractClient;
use crate::client::encryption::{
    EncryptionClient, FheError, HandleContractPair, UserDecryptRequest,
};
use crate::client::signer::AccountSigner;
use crate::config::NegotiationConfig;
use crate::error::{NegotiationError, NegotiationResult, ValidationError};
use crate::mode::Mode;
use crate::session::Session;
use crate::storage::{FallbackRecord, FallbackStore};
use crate::types::{
    validate_offer_amount, Address, Candidate, CandidateId, CiphertextHandle, MatchResult, Offer,
    TxReceipt,
};

// ---------------------------------------------------------------------------
// Internal State
// ---------------------------------------------------------------------------

/// Identity of an in-flight operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Ticket {
    epoch: u64,
    candidate_id: CandidateId,
}

/// Which path produced a value.
enum Resolution {
    Decrypted(MatchResult),
    Simulated(MatchResult),
}

struct Inner {
    state: WorkflowState,
    selection: Option<Candidate>,
    offer: Option<Offer>,
    attempt: Option<DecryptionAttempt>,
    epoch: u64,
    countdown: Option<Countdown>,
}

impl Inner {
    fn is_current(&self, ticket: Ticket) -> bool {
        self.epoch == ticket.epoch
            && self.selection.as_ref().map(|c| c.id) == Some(ticket.candidate_id)
    }

    /// Drop everything tied to the current negotiation. Fallback records are
    /// left alone.
    fn abandon(&mut self) {
        self.countdown = None;
        self.epoch += 1;
        self.offer = None;
        self.attempt = None;
    }
}

struct Shared {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<WorkflowState>,
}

impl Shared {
    fn transition(&self, inner: &mut Inner, next: WorkflowState) {
        debug!(from = inner.state.name(), to = next.name(), "workflow transition");
        inner.state = next.clone();
        self.state_tx.send_replace(next);
    }

    fn on_countdown_tick(&self, ticket: Ticket, remaining: u32) -> bool {
        let mut inner = self.inner.lock();
        if !inner.is_current(ticket)
            || !matches!(inner.state, WorkflowState::AwaitingPropagation { .. })
        {
            return false;
        }
        if remaining == 0 {
            self.transition(&mut inner, WorkflowState::ReadyToDecrypt);
            info!(candidate_id = ticket.candidate_id, "permissions propagated");
            false
        } else {
            self.transition(&mut inner, WorkflowState::AwaitingPropagation { remaining });
            true
        }
    }
}

// ---------------------------------------------------------------------------
// NegotiationWorkflow
// ---------------------------------------------------------------------------

/// State machine for one account negotiating with one selected candidate.
///
/// All methods take `&self`; share the workflow behind an `Arc` to call
/// `reset` or `select_candidate` while a `decrypt` is pending.
pub struct NegotiationWorkflow {
    session: Arc<Session>,
    contract: Arc<dyn ContractClient>,
    signer: Arc<dyn AccountSigner>,
    fallback: Arc<dyn FallbackStore>,
    config: NegotiationConfig,
    shared: Arc<Shared>,
}

impl NegotiationWorkflow {
    pub fn new(
        session: Arc<Session>,
        contract: Arc<dyn ContractClient>,
        signer: Arc<dyn AccountSigner>,
        fallback: Arc<dyn FallbackStore>,
        config: NegotiationConfig,
    ) -> Self {
        if signer.address() != session.account() {
            warn!(
                session = %session.account(),
                signer = %signer.address(),
                "signer does not match the session account; decryption will be refused"
            );
        }
        let (state_tx, _) = watch::channel(WorkflowState::Idle);
        Self {
            session,
            contract,
            signer,
            fallback,
            config,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: WorkflowState::Idle,
                    selection: None,
                    offer: None,
                    attempt: None,
                    epoch: 0,
                    countdown: None,
                }),
                state_tx,
            }),
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn mode(&self) -> Mode {
        self.session.mode()
    }

    pub fn account(&self) -> &Address {
        self.session.account()
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    pub fn state(&self) -> WorkflowState {
        self.shared.inner.lock().state.clone()
    }

    pub fn selection(&self) -> Option<Candidate> {
        self.shared.inner.lock().selection.clone()
    }

    /// The offer awaiting a result, if any.
    pub fn offer(&self) -> Option<Offer> {
        self.shared.inner.lock().offer.clone()
    }

    /// The most recent decryption attempt of the current negotiation.
    pub fn last_attempt(&self) -> Option<DecryptionAttempt> {
        self.shared.inner.lock().attempt.clone()
    }

    /// Whether the propagation timer is still scheduled.
    pub fn has_active_countdown(&self) -> bool {
        self.shared
            .inner
            .lock()
            .countdown
            .as_ref()
            .is_some_and(|c| !c.is_finished())
    }

    /// Receive every state change, starting from the current state.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.shared.state_tx.subscribe()
    }

    // -- Selection ----------------------------------------------------------

    /// Select a candidate, abandoning whatever the previous one was doing.
    pub fn select_candidate(&self, candidate: Candidate) {
        let mut inner = self.shared.inner.lock();
        inner.abandon();
        info!(candidate_id = candidate.id, name = %candidate.name, "candidate selected");
        inner.selection = Some(candidate);
        self.shared.transition(&mut inner, WorkflowState::Idle);
    }

    /// Back to `Idle` with nothing selected. The countdown is cancelled; an
    /// unresolved fallback record stays where it is.
    pub fn reset(&self) {
        let mut inner = self.shared.inner.lock();
        inner.abandon();
        inner.selection = None;
        self.shared.transition(&mut inner, WorkflowState::Idle);
        debug!("workflow reset");
    }

    /// Wait for the countdown to finish.
    ///
    /// Returns the submit error if the workflow failed, or a `WrongState`
    /// validation error if it is not heading for `ReadyToDecrypt`.
    pub async fn wait_until_ready(&self) -> NegotiationResult<()> {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|s| {
                !matches!(
                    s,
                    WorkflowState::Submitting | WorkflowState::AwaitingPropagation { .. }
                )
            })
            .await
            .map(|s| s.clone());

        match settled {
            Ok(WorkflowState::ReadyToDecrypt) => Ok(()),
            Ok(WorkflowState::Failed(err)) => Err(err),
            Ok(other) => Err(ValidationError::WrongState {
                operation: "wait for propagation",
                state: other.name(),
            }
            .into()),
            // The sender lives as long as `self`.
            Err(_) => Err(ValidationError::WrongState {
                operation: "wait for propagation",
                state: "torn down",
            }
            .into()),
        }
    }

    // -- Submit -------------------------------------------------------------

    /// Encrypt `amount` and submit it as an offer to the selected candidate.
    ///
    /// Only accepted from `Idle`. Validation and initialization problems
    /// leave the state untouched; transaction failures end in `Failed`.
    pub async fn submit(&self, amount: u64) -> NegotiationResult<TxReceipt> {
        let mode = self.session.mode();

        let (ticket, candidate, amount) = {
            let mut inner = self.shared.inner.lock();
            if inner.state != WorkflowState::Idle {
                return Err(ValidationError::WrongState {
                    operation: "submit",
                    state: inner.state.name(),
                }
                .into());
            }
            let candidate = inner
                .selection
                .clone()
                .ok_or(ValidationError::NoCandidateSelected)?;
            if !candidate.is_active {
                return Err(ValidationError::CandidateInactive(candidate.id).into());
            }
            let amount = validate_offer_amount(amount)?;
            if !self.session.is_initialized() {
                return Err(NegotiationError::Initialization(
                    "encryption client has not been initialized".to_string(),
                ));
            }

            let ticket = Ticket {
                epoch: inner.epoch,
                candidate_id: candidate.id,
            };
            self.shared.transition(&mut inner, WorkflowState::Submitting);
            (ticket, candidate, amount)
        };

        if mode.is_demonstration() {
            info!(candidate_id = candidate.id, amount, "submitting encrypted offer");
        } else {
            info!(candidate_id = candidate.id, "submitting encrypted offer");
        }

        let (offer, receipt) = match self.send_offer(candidate.id, amount).await {
            Ok(sent) => sent,
            Err(err) => {
                warn!(candidate_id = candidate.id, error = %err, "offer submission failed");
                return Err(self.fail_submission(ticket, err));
            }
        };

        if !self.shared.inner.lock().is_current(ticket) {
            warn!(candidate_id = candidate.id, "offer mined after the selection changed");
            return Err(NegotiationError::Superseded {
                candidate_id: candidate.id,
            });
        }

        // Before the countdown starts, so a fast decrypt always finds it.
        self.record_fallback(mode, &candidate, amount);

        let ticks = self.config.propagation_ticks(mode);
        {
            let mut inner = self.shared.inner.lock();
            if !inner.is_current(ticket) {
                return Err(NegotiationError::Superseded {
                    candidate_id: candidate.id,
                });
            }
            inner.offer = Some(offer);

            if ticks == 0 {
                self.shared.transition(&mut inner, WorkflowState::ReadyToDecrypt);
            } else {
                let weak: Weak<Shared> = Arc::downgrade(&self.shared);
                inner.countdown = Some(Countdown::start(
                    ticks,
                    self.config.countdown_tick,
                    move |remaining| match weak.upgrade() {
                        Some(shared) => shared.on_countdown_tick(ticket, remaining),
                        None => false,
                    },
                ));
                self.shared
                    .transition(&mut inner, WorkflowState::AwaitingPropagation { remaining: ticks });
            }
        }

        info!(
            candidate_id = candidate.id,
            tx_hash = %receipt.tx_hash,
            block = receipt.block_number,
            wait_ticks = ticks,
            "offer mined, waiting for permission propagation"
        );
        Ok(receipt)
    }

    async fn send_offer(
        &self,
        candidate_id: CandidateId,
        amount: u32,
    ) -> NegotiationResult<(Offer, TxReceipt)> {
        let encrypted = self
            .session
            .encryption()
            .encrypt_u32(amount, self.contract.address(), self.session.account())
            .await
            .map_err(|e| match e {
                FheError::NotInitialized => NegotiationError::Initialization(e.to_string()),
                other => NegotiationError::Encryption(other),
            })?;

        let receipt = self
            .contract
            .submit_offer(candidate_id, encrypted.handle, &encrypted.proof)
            .await?;

        let offer = Offer {
            candidate_id,
            amount,
            ciphertext: encrypted.handle,
            proof: encrypted.proof,
        };
        Ok((offer, receipt))
    }

    fn fail_submission(&self, ticket: Ticket, err: NegotiationError) -> NegotiationError {
        let mut inner = self.shared.inner.lock();
        if inner.is_current(ticket) && inner.state == WorkflowState::Submitting {
            self.shared
                .transition(&mut inner, WorkflowState::Failed(err.clone()));
            err
        } else {
            NegotiationError::Superseded {
                candidate_id: ticket.candidate_id,
            }
        }
    }

    fn record_fallback(&self, mode: Mode, candidate: &Candidate, amount: u32) {
        if !mode.is_demonstration() {
            return;
        }
        let Some(expectation) = candidate.disclosed_expectation else {
            warn!(
                candidate_id = candidate.id,
                "candidate has no disclosed expectation, no fallback record written"
            );
            return;
        };

        let record = FallbackRecord::new(self.account().clone(), candidate.id, amount, expectation);
        match self.fallback.put(record) {
            Ok(()) => debug!(candidate_id = candidate.id, "fallback record written"),
            Err(e) => warn!(candidate_id = candidate.id, error = %e, "could not write fallback record"),
        }
    }

    // -- Decrypt ------------------------------------------------------------

    /// Reveal the comparison result. Only accepted from `ReadyToDecrypt`.
    ///
    /// Ends in `Resolved` or `Failed`. If the workflow moved on while this
    /// was running, the outcome is discarded and `Superseded` is returned.
    pub async fn decrypt(&self) -> NegotiationResult<MatchResult> {
        let mode = self.session.mode();
        let deadline = mode
            .is_demonstration()
            .then_some(self.config.demo_decrypt_deadline);

        let ticket = {
            let mut inner = self.shared.inner.lock();
            if inner.state != WorkflowState::ReadyToDecrypt {
                return Err(ValidationError::WrongState {
                    operation: "decrypt",
                    state: inner.state.name(),
                }
                .into());
            }
            let candidate_id = inner
                .selection
                .as_ref()
                .map(|c| c.id)
                .ok_or(ValidationError::NoCandidateSelected)?;
            inner.attempt = Some(DecryptionAttempt::pending(candidate_id, deadline));
            self.shared.transition(&mut inner, WorkflowState::Decrypting);
            Ticket {
                epoch: inner.epoch,
                candidate_id,
            }
        };

        let outcome = match mode {
            Mode::Production => self.resolve_direct(ticket).await,
            Mode::Demonstration => self.resolve_with_fallback(ticket).await,
        };
        self.settle(mode, ticket, outcome)
    }

    /// Fetch the handle, generate keys, and get the authorization signed.
    async fn prepare_decryption(
        &self,
        ticket: Ticket,
    ) -> NegotiationResult<(CiphertextHandle, UserDecryptRequest)> {
        let handle = self.contract.offer_result(ticket.candidate_id).await?;
        {
            let mut inner = self.shared.inner.lock();
            if inner.is_current(ticket) {
                if let Some(attempt) = inner.attempt.as_mut() {
                    attempt.handle = Some(handle);
                }
            }
        }

        let encryption = self.session.encryption();
        let keypair = encryption
            .generate_keypair()
            .map_err(NegotiationError::Decryption)?;

        let contract_addresses = vec![self.contract.address().clone()];
        let start_timestamp = Utc::now().timestamp().max(0) as u64;
        let duration_days = self.config.authorization_validity_days;
        let artifact = encryption
            .build_authorization(
                &keypair.public_key,
                &contract_addresses,
                start_timestamp,
                duration_days,
            )
            .map_err(NegotiationError::Decryption)?;

        let signature = self.signer.sign_authorization(&artifact).await?;

        let request = UserDecryptRequest {
            handles: vec![HandleContractPair {
                handle,
                contract: self.contract.address().clone(),
            }],
            keypair,
            signature,
            contract_addresses,
            account: self.account().clone(),
            start_timestamp,
            duration_days,
        };
        Ok((handle, request))
    }

    async fn resolve_direct(&self, ticket: Ticket) -> NegotiationResult<Resolution> {
        let (handle, request) = self.prepare_decryption(ticket).await?;
        debug!(candidate_id = ticket.candidate_id, "awaiting user decryption");
        decrypt_comparison(Arc::clone(self.session.encryption()), handle, request)
            .await
            .map(Resolution::Decrypted)
    }

    async fn resolve_with_fallback(&self, ticket: Ticket) -> NegotiationResult<Resolution> {
        let (handle, request) = match self.prepare_decryption(ticket).await {
            Ok(prepared) => prepared,
            Err(err) if err.is_infrastructure() => {
                warn!(error = %err, "decryption setup failed, using fallback");
                return self.simulate(ticket).await;
            }
            Err(err) => return Err(err),
        };

        let deadline = self.config.demo_decrypt_deadline;
        let task = decrypt_comparison(Arc::clone(self.session.encryption()), handle, request);

        match race_deadline(task, deadline).await {
            RaceOutcome::Settled(Ok(result)) => {
                debug!(candidate_id = ticket.candidate_id, "real decryption won the race");
                Ok(Resolution::Decrypted(result))
            }
            RaceOutcome::Settled(Err(err)) if err.is_infrastructure() => {
                warn!(error = %err, "decryption service failed, using fallback");
                self.simulate(ticket).await
            }
            RaceOutcome::Settled(Err(err)) => Err(err),
            RaceOutcome::Aborted(e) => {
                warn!(error = %e, "decryption task aborted, using fallback");
                self.simulate(ticket).await
            }
            RaceOutcome::DeadlineElapsed => {
                info!(
                    deadline_ms = deadline.as_millis() as u64,
                    "decryption deadline elapsed, using fallback"
                );
                self.simulate(ticket).await
            }
        }
    }

    /// Compute the result from the stored plaintext pair, after the same
    /// kind of delay a slow service would have shown.
    async fn simulate(&self, ticket: Ticket) -> NegotiationResult<Resolution> {
        tokio::time::sleep(self.config.simulated_latency).await;

        match self.fallback.get(self.account(), ticket.candidate_id)? {
            Some(record) => Ok(Resolution::Simulated(record.simulated_result())),
            None => Err(NegotiationError::NoFallbackData {
                account: self.account().clone(),
                candidate_id: ticket.candidate_id,
            }),
        }
    }

    /// Apply an outcome exactly once, if its ticket is still current.
    fn settle(
        &self,
        mode: Mode,
        ticket: Ticket,
        outcome: NegotiationResult<Resolution>,
    ) -> NegotiationResult<MatchResult> {
        let result = {
            let mut inner = self.shared.inner.lock();
            if !inner.is_current(ticket) || inner.state != WorkflowState::Decrypting {
                debug!(candidate_id = ticket.candidate_id, "discarding stale decryption outcome");
                return Err(NegotiationError::Superseded {
                    candidate_id: ticket.candidate_id,
                });
            }

            let (next, recorded, result) = match outcome {
                Ok(Resolution::Decrypted(r)) => {
                    (WorkflowState::Resolved(r), AttemptOutcome::RealSuccess(r), Ok(r))
                }
                Ok(Resolution::Simulated(r)) => {
                    (WorkflowState::Resolved(r), AttemptOutcome::MockSuccess(r), Ok(r))
                }
                Err(e) => (
                    WorkflowState::Failed(e.clone()),
                    AttemptOutcome::Failed(e.clone()),
                    Err(e),
                ),
            };

            inner.offer = None;
            if let Some(attempt) = inner.attempt.as_mut() {
                attempt.outcome = recorded;
            }
            self.shared.transition(&mut inner, next);
            result
        };

        if mode.is_demonstration() {
            if let Err(e) = self.fallback.delete(self.account(), ticket.candidate_id) {
                warn!(candidate_id = ticket.candidate_id, error = %e, "could not delete fallback record");
            }
        }

        match &result {
            Ok(r) => info!(candidate_id = ticket.candidate_id, result = r.as_u8(), "negotiation resolved"),
            Err(e) => warn!(candidate_id = ticket.candidate_id, error = %e, "negotiation failed"),
        }
        result
    }
}

impl Drop for NegotiationWorkflow {
    fn drop(&mut self) {
        self.shared.inner.lock().countdown = None;
    }
}

/// The real decryption, as a standalone `'static` future so it can be
/// spawned and outlive a lost race.
async fn decrypt_comparison(
    encryption: Arc<dyn EncryptionClient>,
    handle: CiphertextHandle,
    request: UserDecryptRequest,
) -> NegotiationResult<MatchResult> {
    let values = encryption
        .decrypt(request)
        .await
        .map_err(NegotiationError::Decryption)?;
    let value = *values
        .get(&handle)
        .ok_or(NegotiationError::Decryption(FheError::MissingHandle(handle)))?;
    MatchResult::from_plaintext(value)
        .ok_or(NegotiationError::Decryption(FheError::InvalidPlaintext { handle, value }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devnet::{DevnetContract, DevnetFhe, DevnetLedger, DevnetSigner};
    use crate::storage::MemoryFallbackStore;
    use std::time::Duration;

    async fn workflow(
        mode: Mode,
        config: NegotiationConfig,
    ) -> (NegotiationWorkflow, Arc<DevnetLedger>) {
        let ledger = DevnetLedger::seeded();
        let signer = Arc::new(DevnetSigner::generate(&ledger));
        let fhe = Arc::new(DevnetFhe::new(Arc::clone(&ledger)));
        let contract = Arc::new(DevnetContract::connect(
            Arc::clone(&ledger),
            signer.address().clone(),
        ));
        let session = Arc::new(Session::new(signer.address().clone(), mode, fhe));
        session.initialize().await.unwrap();
        let wf = NegotiationWorkflow::new(
            session,
            contract,
            signer,
            Arc::new(MemoryFallbackStore::new()),
            config,
        );
        (wf, ledger)
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ticks_is_ready_immediately() {
        let config = NegotiationConfig {
            demo_propagation_ticks: 0,
            ..NegotiationConfig::default()
        };
        let (wf, ledger) = workflow(Mode::Demonstration, config).await;
        wf.select_candidate(ledger.candidate(0).unwrap());
        wf.submit(8_000).await.unwrap();
        assert_eq!(wf.state(), WorkflowState::ReadyToDecrypt);
        assert!(!wf.has_active_countdown());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_workflow_stops_the_countdown() {
        let (wf, ledger) = workflow(Mode::Production, NegotiationConfig::default()).await;
        let mut rx = wf.subscribe();
        wf.select_candidate(ledger.candidate(0).unwrap());
        wf.submit(8_000).await.unwrap();
        assert!(wf.has_active_countdown());

        drop(wf);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            *rx.borrow_and_update(),
            WorkflowState::AwaitingPropagation { remaining: 10 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn select_candidate_bumps_epoch() {
        let (wf, ledger) = workflow(Mode::Demonstration, NegotiationConfig::default()).await;
        wf.select_candidate(ledger.candidate(0).unwrap());
        let before = Ticket {
            epoch: wf.shared.inner.lock().epoch,
            candidate_id: 0,
        };
        assert!(wf.shared.inner.lock().is_current(before));

        wf.select_candidate(ledger.candidate(0).unwrap());
        assert!(!wf.shared.inner.lock().is_current(before), "same candidate, new epoch");
    }
}
