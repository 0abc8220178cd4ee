//! Background executors owned by a database for shutdown.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{CatalogError, Result};

/// A worker the database must stop when it closes.
pub trait BackgroundExecutor: Send + Sync {
    fn name(&self) -> &str;

    /// Asks the executor to stop; must not block.
    fn shutdown(&self) -> Result<()>;

    /// Waits up to `timeout` for termination. Returns `true` once terminated.
    fn await_termination(&self, timeout: Duration) -> Result<bool>;

    fn is_terminated(&self) -> bool;
}

#[derive(Debug, Default)]
struct WorkerState {
    stop: bool,
    terminated: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<WorkerState>,
    cond: Condvar,
    runs: AtomicU64,
}

/// Runs a task on a dedicated thread at a fixed period until shut down.
pub struct PeriodicExecutor {
    name: String,
    period: Duration,
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicExecutor {
    pub fn start<F>(name: impl Into<String>, period: Duration, task: F) -> Result<Arc<Self>>
    where
        F: Fn() + Send + 'static,
    {
        let name = name.into();
        let shared = Arc::new(Shared::default());
        let worker = Arc::clone(&shared);
        let thread_name = name.clone();

        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(&thread_name, &worker, period, task))
            .map_err(|e| {
                CatalogError::IllegalState(format!("failed to spawn executor '{}': {}", name, e))
            })?;

        log::debug!("Started executor '{}' with period {:?}", name, period);
        Ok(Arc::new(Self {
            name,
            period,
            shared,
            handle: Mutex::new(Some(handle)),
        }))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of completed task runs.
    pub fn run_count(&self) -> u64 {
        self.shared.runs.load(Ordering::Relaxed)
    }
}

fn run_worker<F: Fn()>(name: &str, shared: &Shared, period: Duration, task: F) {
    let mut state = shared.state.lock();
    while !state.stop {
        let timed_out = shared.cond.wait_for(&mut state, period).timed_out();
        if state.stop {
            break;
        }
        if timed_out {
            parking_lot::MutexGuard::unlocked(&mut state, || {
                if catch_unwind(AssertUnwindSafe(&task)).is_err() {
                    log::warn!("Executor '{}' task panicked", name);
                }
                shared.runs.fetch_add(1, Ordering::Relaxed);
            });
        }
    }
    state.terminated = true;
    shared.cond.notify_all();
}

impl BackgroundExecutor for PeriodicExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.stop = true;
        self.shared.cond.notify_all();
        Ok(())
    }

    fn await_termination(&self, timeout: Duration) -> Result<bool> {
        // A timeout past the clock's range waits without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        {
            let mut state = self.shared.state.lock();
            while !state.terminated {
                match deadline {
                    Some(deadline) => {
                        if self.shared.cond.wait_until(&mut state, deadline).timed_out() {
                            return Ok(state.terminated);
                        }
                    }
                    None => self.shared.cond.wait(&mut state),
                }
            }
        }

        if let Some(handle) = self.handle.lock().take() {
            handle.join().map_err(|_| {
                CatalogError::IllegalState(format!("executor '{}' thread panicked", self.name))
            })?;
        }
        Ok(true)
    }

    fn is_terminated(&self) -> bool {
        self.shared.state.lock().terminated
    }
}
