//! Background task supervision.
//!
//! Each plugin with [`Capabilities::BACKGROUND`](crate::plugin::Capabilities)
//! gets one named OS thread running [`Plugin::run_background`]. Tasks stop
//! cooperatively: the host raises a [`StopSignal`], which wakes any task
//! blocked in [`BackgroundContext::sleep`] at once, then waits up to a grace
//! period for each thread to return.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::host::panic_message;
use crate::logger::PluginLogger;
use crate::plugin::{Plugin, PluginId};

// =============================================================================
// Stop Signal
// =============================================================================

/// A one-shot flag that sleepers can wait on.
///
/// Once raised it stays raised.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use sparkline_core::supervisor::StopSignal;
///
/// let stop = StopSignal::new();
/// assert!(!stop.wait_timeout(Duration::from_millis(1)));
/// stop.raise();
/// assert!(stop.is_raised());
/// assert!(stop.wait_timeout(Duration::from_secs(60)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    /// Creates a lowered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal and wakes every waiter.
    pub fn raise(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// True once [`raise`](Self::raise) has been called.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the signal is raised or `timeout` elapses.
    ///
    /// Returns whether the signal is raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

// =============================================================================
// Background Context
// =============================================================================

/// Handle passed to [`Plugin::run_background`].
#[derive(Debug, Clone)]
pub struct BackgroundContext {
    id: PluginId,
    stop: StopSignal,
    enabled: Arc<AtomicBool>,
    logger: PluginLogger,
}

impl BackgroundContext {
    /// Creates a context. The host builds these; tests may too.
    #[must_use]
    pub fn new(id: PluginId, stop: StopSignal, enabled: Arc<AtomicBool>, logger: PluginLogger) -> Self {
        Self {
            id,
            stop,
            enabled,
            logger,
        }
    }

    /// The plugin this task belongs to.
    #[must_use]
    pub fn id(&self) -> &PluginId {
        &self.id
    }

    /// True once the host has asked the task to finish.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_raised()
    }

    /// Sleeps for `duration`, waking early if the task is stopped.
    ///
    /// Returns `true` when the task has been stopped and should return.
    pub fn sleep(&self, duration: Duration) -> bool {
        self.stop.wait_timeout(duration)
    }

    /// Current value of the plugin's enabled flag.
    ///
    /// Disabling a plugin does not stop its background task; tasks that
    /// should pause while disabled check this.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// The plugin's logger.
    #[must_use]
    pub fn logger(&self) -> &PluginLogger {
        &self.logger
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// A running background thread.
#[derive(Debug)]
struct BackgroundTask {
    id: PluginId,
    stop: StopSignal,
    finished: StopSignal,
    handle: JoinHandle<()>,
}

/// Outcome of [`Supervisor::stop_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Tasks that returned within the grace period
    pub joined: Vec<PluginId>,
    /// Tasks still running when the grace period ran out
    pub detached: Vec<PluginId>,
}

/// Owns the background threads of one load generation.
#[derive(Debug, Default)]
pub struct Supervisor {
    tasks: Vec<BackgroundTask>,
}

impl Supervisor {
    /// Creates an empty supervisor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks started and not yet stopped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when no tasks are running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Starts `plugin`'s background task on a thread named `plugin-<id>`.
    ///
    /// Panics inside the task are caught and logged.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread could not be spawned.
    pub fn start(&mut self, plugin: Arc<dyn Plugin>, ctx: BackgroundContext) -> std::io::Result<()> {
        let id = ctx.id().clone();
        let stop = ctx.stop.clone();
        let finished = StopSignal::new();
        let done = finished.clone();

        let handle = thread::Builder::new()
            .name(format!("plugin-{id}"))
            .spawn(move || {
                debug!(plugin = %ctx.id(), "background task started");
                match panic::catch_unwind(AssertUnwindSafe(|| plugin.run_background(&ctx))) {
                    Ok(Ok(())) => debug!(plugin = %ctx.id(), "background task finished"),
                    Ok(Err(e)) => warn!(plugin = %ctx.id(), error = %e, "background task failed"),
                    Err(payload) => warn!(
                        plugin = %ctx.id(),
                        panic = %panic_message(payload.as_ref()),
                        "background task panicked"
                    ),
                }
                done.raise();
            })?;

        self.tasks.push(BackgroundTask {
            id,
            stop,
            finished,
            handle,
        });
        Ok(())
    }

    /// Raises every stop signal without waiting.
    pub fn raise_all(&self) {
        for task in &self.tasks {
            task.stop.raise();
        }
    }

    /// Raises every stop signal, then waits up to `grace` in total for the
    /// threads to return.
    ///
    /// Threads still running afterwards are detached and reported.
    pub fn stop_all(&mut self, grace: Duration) -> StopReport {
        self.raise_all();

        let deadline = Instant::now() + grace;
        let mut report = StopReport::default();
        for task in self.tasks.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if task.finished.wait_timeout(remaining) {
                if task.handle.join().is_err() {
                    warn!(plugin = %task.id, "background thread ended abnormally");
                }
                report.joined.push(task.id);
            } else {
                warn!(
                    plugin = %task.id,
                    grace_ms = grace.as_millis(),
                    "background task ignored stop signal, detaching"
                );
                report.detached.push(task.id);
            }
        }
        if !report.joined.is_empty() || !report.detached.is_empty() {
            info!(
                joined = report.joined.len(),
                detached = report.detached.len(),
                "background tasks stopped"
            );
        }
        report
    }
}
