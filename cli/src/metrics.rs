//! # Prometheus Metrics
//!
//! Counters and a latency histogram for negotiation runs, registered in a
//! dedicated [`prometheus::Registry`] under the `hushhire` namespace and
//! dumped in the text exposition format with `negotiate --metrics`.

use anyhow::{Context, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use std::time::Duration;

use hushhire_protocol::workflow::{AttemptOutcome, DecryptionAttempt};
use hushhire_protocol::{
    ErrorKind, MatchResult, NegotiationError, NegotiationResult, WorkflowState,
};

/// Holds all Prometheus metric handles for one CLI run.
#[derive(Clone)]
pub struct WorkflowMetrics {
    registry: Registry,
    /// Offers whose transaction was mined.
    pub offers_submitted_total: IntCounter,
    /// Resolved negotiations, labelled by `source` (`decrypted` or `simulated`).
    pub resolutions_total: IntCounterVec,
    /// Failed operations, labelled by error `kind`.
    pub failures_total: IntCounterVec,
    /// Wall time from `decrypt()` to a terminal state.
    pub decryption_latency_seconds: Histogram,
}

impl WorkflowMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("hushhire".into()), None)?;

        let offers_submitted_total =
            IntCounter::new("offers_submitted_total", "Encrypted offers mined on-chain")?;
        registry.register(Box::new(offers_submitted_total.clone()))?;

        let resolutions_total = IntCounterVec::new(
            Opts::new("resolutions_total", "Negotiations resolved, by result source"),
            &["source"],
        )?;
        registry.register(Box::new(resolutions_total.clone()))?;

        let failures_total = IntCounterVec::new(
            Opts::new("failures_total", "Failed negotiation operations, by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(failures_total.clone()))?;

        let decryption_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "decryption_latency_seconds",
                "Time from decrypt request to resolution in seconds",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 7.5, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(decryption_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            offers_submitted_total,
            resolutions_total,
            failures_total,
            decryption_latency_seconds,
        })
    }

    pub fn record_failure(&self, error: &NegotiationError) {
        self.failures_total
            .with_label_values(&[error.kind().as_str()])
            .inc();
    }

    /// Time a `decrypt()` call. Calls rejected before any decryption started
    /// (wrong state, superseded) leave the histogram alone.
    pub fn observe_decryption(
        &self,
        outcome: &NegotiationResult<MatchResult>,
        state: &WorkflowState,
        elapsed: Duration,
    ) {
        if let Err(e) = outcome {
            if matches!(e.kind(), ErrorKind::Validation | ErrorKind::Superseded) {
                return;
            }
        }
        if matches!(state, WorkflowState::Resolved(_) | WorkflowState::Failed(_)) {
            self.decryption_latency_seconds
                .observe(elapsed.as_secs_f64());
        }
    }

    /// Count a finished attempt by where its value came from.
    pub fn record_attempt(&self, attempt: &DecryptionAttempt) {
        let source = match attempt.outcome {
            AttemptOutcome::RealSuccess(_) => "decrypted",
            AttemptOutcome::MockSuccess(_) => "simulated",
            AttemptOutcome::Pending | AttemptOutcome::Failed(_) => return,
        };
        self.resolutions_total.with_label_values(&[source]).inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("encoding metrics")?;
        String::from_utf8(buffer).context("prometheus output is not utf-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hushhire_protocol::ValidationError;

    #[test]
    fn counts_by_source_and_kind() {
        let metrics = WorkflowMetrics::new().unwrap();

        let mut attempt = DecryptionAttempt::pending(0, Some(Duration::from_secs(5)));
        attempt.outcome = AttemptOutcome::MockSuccess(MatchResult::Meets);
        metrics.record_attempt(&attempt);
        attempt.outcome = AttemptOutcome::RealSuccess(MatchResult::Below);
        metrics.record_attempt(&attempt);
        metrics.record_attempt(&attempt);
        metrics.record_failure(&ValidationError::NoCandidateSelected.into());
        metrics.offers_submitted_total.inc();

        let text = metrics.encode().unwrap();
        assert!(text.contains("hushhire_offers_submitted_total 1"));
        assert!(text.contains("hushhire_resolutions_total{source=\"simulated\"} 1"));
        assert!(text.contains("hushhire_resolutions_total{source=\"decrypted\"} 2"));
        assert!(text.contains("hushhire_failures_total{kind=\"validation\"} 1"));
    }

    #[test]
    fn latency_only_for_finished_decryptions() {
        let metrics = WorkflowMetrics::new().unwrap();
        let elapsed = Duration::from_millis(1_500);
        let meets: NegotiationResult<MatchResult> = Ok(MatchResult::Meets);
        let resolved = WorkflowState::Resolved(MatchResult::Meets);

        metrics.observe_decryption(&meets, &WorkflowState::Idle, elapsed);
        let rejected: NegotiationResult<MatchResult> =
            Err(NegotiationError::from(ValidationError::WrongState {
                operation: "decrypt",
                state: "resolved",
            }));
        metrics.observe_decryption(&rejected, &resolved, elapsed);
        assert_eq!(metrics.decryption_latency_seconds.get_sample_count(), 0);

        metrics.observe_decryption(&meets, &resolved, elapsed);
        let failure = NegotiationError::NoFallbackData {
            account: hushhire_protocol::Address::from_bytes([1; 20]),
            candidate_id: 0,
        };
        metrics.observe_decryption(
            &Err(failure.clone()),
            &WorkflowState::Failed(failure),
            elapsed,
        );
        assert_eq!(metrics.decryption_latency_seconds.get_sample_count(), 2);
    }
}
