//! Permission-propagation countdown.
//!
//! A repeating timer that reports the remaining tick count after every
//! tick. The timer task is aborted when its [`Countdown`] is dropped, so a
//! reset can never be followed by a stale fire.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Handle to a running countdown. Dropping it cancels the timer.
#[derive(Debug)]
pub struct Countdown {
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Start a countdown of `ticks` steps of `tick` each.
    ///
    /// `on_tick` receives the remaining count (reaching 0 on the last tick)
    /// and returns `false` to stop early.
    pub fn start<F>(ticks: u32, tick: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(u32) -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + tick, tick);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut remaining = ticks;
            while remaining > 0 {
                timer.tick().await;
                remaining -= 1;
                if !on_tick(remaining) {
                    return;
                }
            }
        });
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticks_down_to_zero() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let countdown = Countdown::start(3, Duration::from_secs(1), move |remaining| {
            sink.lock().push(remaining);
            true
        });

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(*seen.lock(), vec![2, 1]);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*seen.lock(), vec![2, 1, 0]);
        assert!(countdown.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_pending_ticks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let countdown = Countdown::start(10, Duration::from_secs(1), move |remaining| {
            sink.lock().push(remaining);
            true
        });

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        drop(countdown);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(*seen.lock(), vec![9]);
    }

    #[tokio::test(start_paused = true)]
    async fn callback_can_stop_early() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _countdown = Countdown::start(5, Duration::from_secs(1), move |remaining| {
            sink.lock().push(remaining);
            remaining > 3
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(*seen.lock(), vec![4, 3]);
    }
}
