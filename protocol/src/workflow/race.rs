//! # First-Settle-Wins Race
//!
//! Races a spawned task against a timer. Whichever settles first decides
//! the outcome. The deadline is advisory: when it wins, the task is *not*
//! aborted. It keeps running detached and whatever it eventually produces
//! is dropped with its join handle, so it can never reach the caller.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinError;

/// Which side of the race settled first.
#[derive(Debug)]
pub enum RaceOutcome<T> {
    /// The task finished before the deadline.
    Settled(T),
    /// The task panicked or was cancelled before the deadline.
    Aborted(JoinError),
    /// The deadline elapsed first.
    DeadlineElapsed,
}

/// Spawn `task` and wait for it or for `deadline`, whichever comes first.
///
/// Ties go to the task: if both are ready on the same poll, the real value
/// wins.
pub async fn race_deadline<F, T>(task: F, deadline: Duration) -> RaceOutcome<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut handle = tokio::spawn(task);

    tokio::select! {
        biased;
        joined = &mut handle => match joined {
            Ok(value) => RaceOutcome::Settled(value),
            Err(e) => RaceOutcome::Aborted(e),
        },
        _ = tokio::time::sleep(deadline) => {
            // Dropping the handle detaches the task; its output is discarded.
            drop(handle);
            RaceOutcome::DeadlineElapsed
        }
    }
}
