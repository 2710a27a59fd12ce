//! Periodic resync scheduling for the background loops
//!
//! A [`ResyncScheduler`] runs a resync function whenever the first of these
//! fires: its fixed-period tick, a wake-up sent through its [`ResyncHandle`],
//! or (after a failure) its backoff timer. Cancellation stops it.
//!
//! Each background loop owns its own scheduler and wake-up queue. The queue
//! is bounded; when it is full the newest wake-up is dropped instead of
//! blocking the sender, so a wake-up is a hint, not a guarantee.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use swarm_common::retry::RetryConfig;
use swarm_common::Error;

/// Capacity of each scheduler's wake-up queue
pub const WAKE_QUEUE_DEPTH: usize = 10;

/// Shortest period a scheduler ticks at
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// What caused a resync
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Trigger {
    Tick,
    Wake,
    Retry,
}

/// Sender half of a scheduler's wake-up queue
#[derive(Clone, Debug)]
pub struct ResyncHandle {
    name: String,
    tx: mpsc::Sender<()>,
}

impl ResyncHandle {
    /// Request an immediate resync.
    ///
    /// Never blocks. Returns `false` if the wake-up was dropped because the
    /// queue is full or the scheduler has stopped.
    pub fn wake(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!(resync_loop = %self.name, "wake-up queue full, dropping signal");
                false
            }
            Err(TrySendError::Closed(())) => {
                debug!(resync_loop = %self.name, "scheduler stopped, dropping signal");
                false
            }
        }
    }
}

/// Drives one background loop
pub struct ResyncScheduler {
    name: String,
    period: Duration,
    backoff: RetryConfig,
    wake_rx: mpsc::Receiver<()>,
}

impl ResyncScheduler {
    /// Create a scheduler ticking every `period` and the handle that wakes it.
    ///
    /// Periods shorter than [`MIN_PERIOD`] are raised to it.
    pub fn new(name: impl Into<String>, period: Duration) -> (Self, ResyncHandle) {
        let name = name.into();
        let (tx, wake_rx) = mpsc::channel(WAKE_QUEUE_DEPTH);
        let scheduler = Self {
            name: name.clone(),
            period: period.max(MIN_PERIOD),
            backoff: RetryConfig::infinite(),
            wake_rx,
        };
        (scheduler, ResyncHandle { name, tx })
    }

    /// Override the backoff applied after a failed resync
    pub fn with_backoff(mut self, backoff: RetryConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Name used in log lines
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wake-ups queued but not yet consumed
    #[cfg(test)]
    pub(crate) fn pending_wakeups(&self) -> usize {
        self.wake_rx.len()
    }

    /// Run `resync` until `cancel` fires.
    ///
    /// Wake-ups queued while a resync is running are coalesced into a single
    /// follow-up run. A failed resync is retried after a jittered exponential
    /// backoff (ticks and wake-ups still trigger earlier runs). A
    /// [`Error::Fatal`] stops the loop and is returned; [`Error::Cancelled`]
    /// stops it cleanly.
    pub async fn run<F, Fut>(mut self, cancel: CancellationToken, mut resync: F) -> Result<(), Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), Error>>,
    {
        let start = Instant::now()
            .checked_add(self.period)
            .unwrap_or_else(Instant::now);
        let mut ticker = interval_at(start, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = 0u32;
        let mut retry_at: Option<Instant> = None;

        info!(
            resync_loop = %self.name,
            period_secs = self.period.as_secs(),
            "resync loop started"
        );

        loop {
            let trigger = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(resync_loop = %self.name, "resync loop stopped");
                    return Ok(());
                }
                Some(()) = self.wake_rx.recv() => Trigger::Wake,
                _ = ticker.tick() => Trigger::Tick,
                _ = wait_until(retry_at) => Trigger::Retry,
            };

            // one run covers every wake-up queued so far
            while self.wake_rx.try_recv().is_ok() {}
            retry_at = None;

            debug!(resync_loop = %self.name, ?trigger, "resync");
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(resync_loop = %self.name, "resync interrupted by shutdown");
                    return Ok(());
                }
                result = resync() => result,
            };

            match result {
                Ok(()) => failures = 0,
                Err(Error::Cancelled { .. }) => {
                    info!(resync_loop = %self.name, "resync cancelled, stopping");
                    return Ok(());
                }
                Err(e) if e.is_fatal() => {
                    error!(resync_loop = %self.name, error = %e, "resync failed fatally");
                    return Err(e);
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = self.backoff.jittered_delay_for(failures);
                    warn!(
                        resync_loop = %self.name,
                        error = %e,
                        failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "resync failed, backing off"
                    );
                    retry_at = Some(Instant::now() + delay);
                }
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
