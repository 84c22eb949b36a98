//! Periodic timer state machine and run loop
//!
//! A started timer owns exactly one loop task. The loop waits on a
//! [`PeriodicWait`], invokes the tick handler on its own task (so a panic is
//! contained), then applies the returned [`TickResult`]. The loop body is
//! itself a child task: if it panics the timer ends up `Faulted` rather than
//! stuck in `Running`.
//!
//! Resuming rebuilds the wait, so the first tick after a resume is one full
//! interval out.
//!
//! Two cancellation scopes are in play:
//! - **run**: linked to the caller's token at `start`. Cancelling it ends
//!   the loop.
//! - **wait**: interrupts only the wait in progress. `pause` and
//!   `update_interval` fire it so the loop re-evaluates immediately, then a
//!   fresh token replaces it for the next wait.
//!
//! State lives behind one mutex. Waiting and handler calls happen with the
//! lock released.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use pollkeeper_types::{TimerSnapshot, TimerState};
use tokio_util::sync::CancellationToken;

use super::error::{TimerError, TimerFault, panic_message};
use super::handler::TickHandler;
use super::managed::ManagedTimer;
use super::result::{TickAction, TickResult};
use super::wait::{BoxFuture, MAX_PERIOD, PeriodicWait, TokioWaitSource, WaitSource};

tokio::task_local! {
    /// Id of the timer whose loop (or tick handler) is executing on this task
    static CURRENT_TIMER: u64;
}

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

/// The standard [`ManagedTimer`] implementation.
///
/// Created through [`TimerFactory`](super::TimerFactory), which also makes
/// it discoverable in the registry. Dropping the last handle stops the loop.
pub struct PeriodicTimer {
    shared: Arc<Shared>,
}

struct Shared {
    id: u64,
    name: String,
    wait_source: Arc<dyn WaitSource>,
    disposed: AtomicBool,
    inner: Mutex<Inner>,
}

struct Inner {
    state: TimerState,
    interval: Duration,
    /// Set when the current wait no longer matches the schedule: the
    /// interval changed, or the timer was resumed after its deadline passed
    rearm: bool,
    last_tick: Option<DateTime<Utc>>,
    next_tick: Option<DateTime<Utc>>,
    last_fault: Option<TimerFault>,
    handler: Option<Arc<dyn TickHandler>>,
    run: Option<RunScope>,
    wait_cancel: CancellationToken,
    /// Single-use; replaced on every pause
    resume_gate: Option<CancellationToken>,
}

/// Handles for the loop currently owning this timer
struct RunScope {
    token: CancellationToken,
    /// Cancelled by the loop as it exits
    finished: CancellationToken,
}

/// What the loop does next, decided under the lock
enum Step {
    Park(CancellationToken),
    Wait {
        wait_cancel: CancellationToken,
        rebuild: Option<Duration>,
    },
    Exit,
    Fault(TimerFault),
}

impl Inner {
    fn interrupt_wait(&mut self) {
        let fired = std::mem::replace(&mut self.wait_cancel, CancellationToken::new());
        fired.cancel();
    }

    fn enter_pause(&mut self) {
        self.state = TimerState::Paused;
        self.next_tick = None;
        self.resume_gate = Some(CancellationToken::new());
        self.interrupt_wait();
    }
}

fn after(now: DateTime<Utc>, interval: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(interval.min(MAX_PERIOD))
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
}

fn check_cancel(cancel: &CancellationToken) -> Result<(), TimerError> {
    if cancel.is_cancelled() {
        return Err(TimerError::Cancelled);
    }
    Ok(())
}

impl PeriodicTimer {
    /// A standalone timer. Use [`TimerFactory`](super::TimerFactory) for a registered one.
    pub fn new(name: impl Into<String>, interval: Duration) -> Result<Self, TimerError> {
        Self::with_wait_source(name, interval, Arc::new(TokioWaitSource))
    }

    pub(crate) fn with_wait_source(
        name: impl Into<String>,
        interval: Duration,
        wait_source: Arc<dyn WaitSource>,
    ) -> Result<Self, TimerError> {
        if interval.is_zero() {
            return Err(TimerError::InvalidInterval);
        }

        let shared = Shared {
            id: NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            wait_source,
            disposed: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                state: TimerState::Stopped,
                interval,
                rearm: false,
                last_tick: None,
                next_tick: None,
                last_fault: None,
                handler: None,
                run: None,
                wait_cancel: CancellationToken::new(),
                resume_gate: None,
            }),
        };

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// True when called from this timer's loop or tick handler
    fn in_own_loop(&self) -> bool {
        CURRENT_TIMER
            .try_with(|id| *id == self.shared.id)
            .unwrap_or(false)
    }

    async fn stop_loop(&self, cancel: Option<&CancellationToken>) -> Result<bool, TimerError> {
        let finished = {
            let mut inner = self.shared.inner.lock();
            if !inner.state.is_active() {
                return Ok(false);
            }
            let Some(run) = inner.run.as_ref() else {
                return Ok(false);
            };
            run.token.cancel();
            let finished = run.finished.clone();
            if let Some(gate) = inner.resume_gate.take() {
                gate.cancel();
            }
            inner.interrupt_wait();
            finished
        };

        if self.in_own_loop() {
            tracing::debug!(timer = %self.shared.name, "stop requested from inside the loop");
            return Ok(true);
        }

        match cancel {
            Some(cancel) => {
                tokio::select! {
                    _ = finished.cancelled() => {}
                    _ = cancel.cancelled() => return Err(TimerError::Cancelled),
                }
            }
            None => finished.cancelled().await,
        }

        tracing::info!(timer = %self.shared.name, "timer stopped");
        Ok(true)
    }
}

impl ManagedTimer for PeriodicTimer {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn state(&self) -> TimerState {
        self.shared.inner.lock().state
    }

    fn interval(&self) -> Duration {
        self.shared.inner.lock().interval
    }

    fn last_tick_utc(&self) -> Option<DateTime<Utc>> {
        self.shared.inner.lock().last_tick
    }

    fn next_tick_utc(&self) -> Option<DateTime<Utc>> {
        self.shared.inner.lock().next_tick
    }

    fn last_fault(&self) -> Option<TimerFault> {
        self.shared.inner.lock().last_fault.clone()
    }

    fn start(
        &self,
        handler: Arc<dyn TickHandler>,
        cancel: CancellationToken,
    ) -> Result<bool, TimerError> {
        check_cancel(&cancel)?;

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!(timer = %self.shared.name, "start called outside a Tokio runtime");
            return Ok(false);
        };

        let (run, finished) = {
            let mut inner = self.shared.inner.lock();
            if self.is_disposed() || !inner.state.can_start() || inner.run.is_some() {
                tracing::debug!(timer = %self.shared.name, state = %inner.state, "start rejected");
                return Ok(false);
            }

            let run = cancel.child_token();
            let finished = CancellationToken::new();

            inner.state = TimerState::Running;
            inner.last_fault = None;
            inner.last_tick = None;
            inner.next_tick = None;
            inner.rearm = false;
            inner.resume_gate = None;
            inner.wait_cancel = CancellationToken::new();
            inner.handler = Some(handler);
            inner.run = Some(RunScope {
                token: run.clone(),
                finished: finished.clone(),
            });
            tracing::info!(
                timer = %self.shared.name,
                interval_ms = inner.interval.as_millis() as u64,
                "timer started"
            );
            (run, finished)
        };

        let shared = Arc::clone(&self.shared);
        runtime.spawn(CURRENT_TIMER.scope(shared.id, run_loop(shared, run, finished)));
        Ok(true)
    }

    fn pause(&self, cancel: &CancellationToken) -> Result<bool, TimerError> {
        check_cancel(cancel)?;
        let mut inner = self.shared.inner.lock();
        if inner.state != TimerState::Running {
            return Ok(false);
        }
        inner.enter_pause();
        tracing::debug!(timer = %self.shared.name, "timer paused");
        Ok(true)
    }

    fn resume(&self, cancel: &CancellationToken) -> Result<bool, TimerError> {
        check_cancel(cancel)?;
        let mut inner = self.shared.inner.lock();
        if inner.state != TimerState::Paused {
            return Ok(false);
        }
        if let Some(gate) = inner.resume_gate.take() {
            gate.cancel();
        }
        inner.state = TimerState::Running;
        inner.rearm = true;
        tracing::debug!(timer = %self.shared.name, "timer resumed");
        Ok(true)
    }

    fn update_interval(
        &self,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool, TimerError> {
        if interval.is_zero() {
            return Err(TimerError::InvalidInterval);
        }
        check_cancel(cancel)?;

        let mut inner = self.shared.inner.lock();
        if inner.interval == interval {
            return Ok(false);
        }
        tracing::debug!(
            timer = %self.shared.name,
            from_ms = inner.interval.as_millis() as u64,
            to_ms = interval.as_millis() as u64,
            "interval updated"
        );
        inner.interval = interval;
        inner.rearm = true;
        inner.interrupt_wait();
        Ok(true)
    }

    fn stop<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<bool, TimerError>> {
        Box::pin(async move {
            check_cancel(cancel)?;
            self.stop_loop(Some(cancel)).await
        })
    }

    fn dispose(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.shared.disposed.swap(true, Ordering::SeqCst) {
                return;
            }
            // Nothing can cancel this stop, so it always returns Ok
            let _ = self.stop_loop(None).await;

            let mut inner = self.shared.inner.lock();
            inner.wait_cancel.cancel();
            inner.handler = None;
            tracing::debug!(timer = %self.shared.name, "timer disposed");
        })
    }

    fn snapshot(&self) -> TimerSnapshot {
        let inner = self.shared.inner.lock();
        TimerSnapshot {
            name: self.shared.name.clone(),
            state: inner.state,
            interval_ms: inner.interval.as_millis() as u64,
            last_tick_utc: inner.last_tick,
            next_tick_utc: inner.next_tick,
            last_fault: inner.last_fault.as_ref().map(|f| f.to_string()),
        }
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        // The loop holds its own Arc<Shared>; end it with the last handle
        if let Some(run) = self.shared.inner.lock().run.as_ref() {
            run.token.cancel();
        }
    }
}

impl std::fmt::Debug for PeriodicTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("PeriodicTimer")
            .field("name", &self.shared.name)
            .field("state", &inner.state)
            .field("interval", &inner.interval)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run Loop
// ─────────────────────────────────────────────────────────────────────────────

impl Shared {
    fn prepare(&self, run: &CancellationToken, has_wait: bool) -> Step {
        let mut inner = self.inner.lock();
        if run.is_cancelled() {
            return Step::Exit;
        }

        match inner.state {
            TimerState::Paused => match inner.resume_gate.clone() {
                Some(gate) => Step::Park(gate),
                None => Step::Fault(TimerFault::Invariant {
                    reason: "paused without a resume gate".to_string(),
                }),
            },
            TimerState::Running => {
                let rebuild = (inner.rearm || !has_wait).then_some(inner.interval);
                inner.rearm = false;
                if rebuild.is_some() || inner.next_tick.is_none() {
                    inner.next_tick = after(Utc::now(), inner.interval);
                }
                Step::Wait {
                    wait_cancel: inner.wait_cancel.clone(),
                    rebuild,
                }
            }
            state => Step::Fault(TimerFault::Invariant {
                reason: format!("loop still running while {state}"),
            }),
        }
    }

    /// Stamp the tick and hand back the handler to call.
    /// `Err(None)` means exit quietly, `Ok(None)` means skip this tick.
    fn begin_tick(
        &self,
        run: &CancellationToken,
    ) -> Result<Option<Arc<dyn TickHandler>>, Option<TimerFault>> {
        let mut inner = self.inner.lock();
        if run.is_cancelled() {
            return Err(None);
        }
        // Paused between the tick firing and us taking the lock
        if inner.state != TimerState::Running {
            return Ok(None);
        }
        let Some(handler) = inner.handler.clone() else {
            return Err(Some(TimerFault::Invariant {
                reason: "running without a tick handler".to_string(),
            }));
        };

        let now = Utc::now();
        inner.last_tick = Some(now);
        inner.next_tick = after(now, inner.interval);
        Ok(Some(handler))
    }

    /// Apply a handler's decision. Returns false when the loop should exit.
    fn apply(&self, run: &CancellationToken, result: TickResult) -> bool {
        let mut inner = self.inner.lock();
        if run.is_cancelled() {
            return false;
        }

        if let Some(interval) = result.updated_interval()
            && interval != inner.interval
        {
            tracing::debug!(
                timer = %self.name,
                to_ms = interval.as_millis() as u64,
                "handler changed interval"
            );
            inner.interval = interval;
            inner.rearm = true;
            inner.interrupt_wait();
        }

        match result.action() {
            TickAction::Continue => true,
            TickAction::Pause => {
                if inner.state == TimerState::Running {
                    inner.enter_pause();
                    tracing::debug!(timer = %self.name, "handler paused timer");
                }
                true
            }
            TickAction::Stop => {
                tracing::debug!(timer = %self.name, "handler stopped timer");
                false
            }
        }
    }

    fn finish(&self, run: &CancellationToken, fault: Option<TimerFault>) {
        let mut inner = self.inner.lock();
        match fault {
            Some(fault) => {
                tracing::warn!(timer = %self.name, error = %fault, "timer faulted");
                inner.state = TimerState::Faulted;
                inner.last_fault = Some(fault);
            }
            None => {
                if inner.state != TimerState::Faulted {
                    inner.state = TimerState::Stopped;
                }
                inner.last_tick = None;
            }
        }
        inner.next_tick = None;
        inner.resume_gate = None;
        inner.handler = None;
        inner.run = None;
        // Detach from the caller's token
        run.cancel();
    }
}

async fn run_loop(shared: Arc<Shared>, run: CancellationToken, finished: CancellationToken) {
    // Wakes `stop` callers even if this task is torn down mid-loop
    let _finished = finished.drop_guard();

    // The body runs on its own task so a panic in it still reaches `finish`
    let body = tokio::spawn(CURRENT_TIMER.scope(
        shared.id,
        tick_loop(Arc::clone(&shared), run.clone()),
    ));
    let fault = match body.await {
        Ok(fault) => fault,
        Err(err) if err.is_panic() => Some(TimerFault::Invariant {
            reason: format!(
                "timer loop panicked: {}",
                panic_message(err.into_panic().as_ref())
            ),
        }),
        Err(_) => None,
    };

    shared.finish(&run, fault);
}

async fn tick_loop(shared: Arc<Shared>, run: CancellationToken) -> Option<TimerFault> {
    let mut wait: Option<Box<dyn PeriodicWait>> = None;

    let fault = loop {
        match shared.prepare(&run, wait.is_some()) {
            Step::Exit => break None,
            Step::Fault(fault) => break Some(fault),
            Step::Park(gate) => {
                tokio::select! {
                    _ = run.cancelled() => break None,
                    _ = gate.cancelled() => continue,
                }
            }
            Step::Wait { wait_cancel, rebuild } => {
                if let Some(period) = rebuild {
                    wait = Some(shared.wait_source.periodic(period));
                }
                let Some(ticker) = wait.as_mut() else {
                    break Some(TimerFault::Invariant {
                        reason: "no periodic wait to await".to_string(),
                    });
                };
                tokio::select! {
                    biased;
                    _ = run.cancelled() => break None,
                    _ = wait_cancel.cancelled() => continue,
                    _ = ticker.wait_for_next_tick() => {}
                }
            }
        }

        let handler = match shared.begin_tick(&run) {
            Ok(Some(handler)) => handler,
            Ok(None) => continue,
            Err(fault) => break fault,
        };

        let mut task = tokio::spawn(CURRENT_TIMER.scope(shared.id, handler.on_tick(run.clone())));
        let joined = tokio::select! {
            biased;
            joined = &mut task => joined,
            _ = run.cancelled() => {
                task.abort();
                break None;
            }
        };

        let result = match joined {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => break Some(TimerFault::from_handler(err)),
            Err(err) if err.is_panic() => {
                break Some(TimerFault::Panicked {
                    message: panic_message(err.into_panic().as_ref()),
                });
            }
            Err(_) => break None,
        };

        if !shared.apply(&run, result) {
            break None;
        }
    };

    drop(wait);
    fault
}
