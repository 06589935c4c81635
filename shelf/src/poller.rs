//! Clipboard change detection.
//!
//! macOS offers no pasteboard change notification, so the poller compares
//! the pasteboard's change counter on a fixed interval. The counter is
//! sampled at construction so whatever is already on the pasteboard at
//! launch is not imported.
//!
//! Sleep/wake: while paused every tick is a no-op. On wake the counter is
//! resynchronised instead of compared, so writes made while asleep (or a
//! counter reset across sleep) never produce a spurious capture.

use crate::clip_store::{ClipStore, CreateOutcome};
use crate::environment::EnvironmentStack;
use crate::exclusion::ExcludeAppFilter;
use crate::normalizer;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a single `tick` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Disabled,
    Paused,
    Unchanged,
    Excluded,
    /// Counter moved but no enabled type was present
    Empty,
    Captured(CreateOutcome),
    /// Storage failed; logged and swallowed
    Failed,
}

#[derive(Debug)]
struct PollerState {
    last_change_count: i64,
    enabled: bool,
    paused: bool,
}

pub struct ClipboardPoller {
    stack: Arc<EnvironmentStack>,
    filter: ExcludeAppFilter,
    state: Mutex<PollerState>,
}

impl ClipboardPoller {
    pub fn new(stack: Arc<EnvironmentStack>) -> Self {
        let last_change_count = stack.current().pasteboard.change_count();
        Self {
            filter: ExcludeAppFilter::new(Arc::clone(&stack)),
            stack,
            state: Mutex::new(PollerState {
                last_change_count,
                enabled: true,
                paused: false,
            }),
        }
    }

    pub fn last_change_count(&self) -> i64 {
        self.state.lock().last_change_count
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.lock().enabled = enabled;
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// System is about to sleep
    pub fn pause(&self) {
        self.state.lock().paused = true;
        debug!("clipboard poller paused");
    }

    /// System woke up; adopt the current counter without capturing
    pub fn resume(&self) {
        let count = self.stack.current().pasteboard.change_count();
        let mut state = self.state.lock();
        state.paused = false;
        state.last_change_count = count;
        debug!(change_count = count, "clipboard poller resumed");
    }

    /// Compare the change counter and capture a new clip if it moved
    pub fn tick(&self) -> TickOutcome {
        let env = self.stack.current();
        {
            let mut state = self.state.lock();
            if !state.enabled {
                return TickOutcome::Disabled;
            }
            if state.paused {
                return TickOutcome::Paused;
            }
            let count = env.pasteboard.change_count();
            if count == state.last_change_count {
                return TickOutcome::Unchanged;
            }
            state.last_change_count = count;
        }

        let declared = env.pasteboard.types();
        if self.filter.is_excluded(&declared) {
            return TickOutcome::Excluded;
        }

        let prefs = env.preferences.get();
        let data = normalizer::normalize(env.pasteboard.as_ref(), &declared, &prefs.store_types);
        if data.is_empty() {
            debug!(types = ?declared, "no capturable types on pasteboard");
            return TickOutcome::Empty;
        }

        match ClipStore::new(&env).create(&data) {
            Ok(outcome) => TickOutcome::Captured(outcome),
            Err(e) => {
                warn!(error = %e, "failed to store clip");
                TickOutcome::Failed
            }
        }
    }
}

/// Drives `ClipboardPoller::tick` on a tokio interval until stopped.
pub struct PollingTimer {
    token: CancellationToken,
}

impl PollingTimer {
    pub fn start(poller: Arc<ClipboardPoller>, period: Duration, runtime: &tokio::runtime::Handle) -> Self {
        let token = CancellationToken::new();
        let child = token.clone();
        let period = period.max(Duration::from_millis(10));

        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let poller = Arc::clone(&poller);
                        // SQLite and file I/O stay off the async workers
                        if let Err(e) = tokio::task::spawn_blocking(move || poller.tick()).await {
                            warn!(error = %e, "poll tick panicked");
                        }
                    }
                }
            }
            debug!("polling timer stopped");
        });

        info!(interval_ms = period.as_millis() as u64, "polling timer started");
        Self { token }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl Drop for PollingTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
