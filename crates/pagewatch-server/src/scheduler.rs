//! Fixed-period repeating task.
//!
//! The job runs once immediately and then every `period`, forever. Each run
//! is awaited before the timer is polled again, so two runs never overlap.
//! A run that takes longer than the period pushes the next one back to when
//! it finishes; missed ticks are dropped rather than replayed in a burst.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A named job on a fixed period.
#[derive(Debug, Clone)]
pub struct RepeatingTask {
    name: &'static str,
    period: Duration,
}

impl RepeatingTask {
    /// `period` must be non-zero.
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self { name, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawn the loop on the current runtime.
    ///
    /// The job's own failures are its business; the loop only ends when the
    /// returned handle is aborted or the runtime shuts down.
    pub fn spawn<F, Fut>(self, mut job: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            tracing::info!(
                "{} loop started: period={}s",
                self.name,
                self.period.as_secs_f64()
            );
            let mut ticker = tokio::time::interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut runs: u64 = 0;

            loop {
                ticker.tick().await;
                runs = runs.saturating_add(1);
                tracing::debug!("{} run #{runs} starting", self.name);
                job().await;
            }
        })
    }
}
