//! Scheduled driver for [`TimerEngine`].
//!
//! `TimerService` owns the engine behind a mutex and runs at most one
//! repeating one-second tick task on the tokio runtime it was created in.
//! Every command takes the lock, mutates the engine, and then reconciles the
//! tick task with the engine's run state before releasing it:
//!
//! - engine running, no task: spawn one
//! - engine stopped, task active: cancel it
//!
//! The tick task re-checks its cancellation token under the same lock, so a
//! tick that was already due when a command cancelled it is never applied.
//! When a countdown finishes without auto-continuing, the task clears itself.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

use super::engine::{TimerEngine, TimerSnapshot};
use super::mode::TimerMode;
use super::settings::{SettingsPatch, TimerSettings};
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::session::SessionLog;

const TICK_PERIOD: Duration = Duration::from_secs(1);
const EVENT_CAPACITY: usize = 256;

struct Inner {
    engine: TimerEngine,
    ticker: Option<Ticker>,
}

struct Ticker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Ticker {
    fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

/// Thread-safe handle that drives a [`TimerEngine`] in real time.
pub struct TimerService {
    shared: Arc<Mutex<Inner>>,
    events: broadcast::Sender<Event>,
    runtime: Handle,
}

impl TimerService {
    /// Wrap `engine`. Must be called from within a tokio runtime.
    pub fn new(engine: TimerEngine) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| CoreError::Runtime(e.to_string()))?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let service = Self {
            shared: Arc::new(Mutex::new(Inner {
                engine,
                ticker: None,
            })),
            events,
            runtime,
        };
        {
            let mut inner = lock(&service.shared);
            service.sync_ticker(&mut inner);
        }
        Ok(service)
    }

    /// Receive every event the engine produces from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&self) -> Option<Event> {
        self.command(|engine| engine.start().into_iter().collect())
            .into_iter()
            .next()
    }

    pub fn pause(&self) -> Option<Event> {
        self.command(|engine| engine.pause().into_iter().collect())
            .into_iter()
            .next()
    }

    pub fn reset(&self) -> Vec<Event> {
        self.command(TimerEngine::reset)
    }

    pub fn change_mode(&self, mode: TimerMode) -> Vec<Event> {
        self.command(|engine| engine.change_mode(mode))
    }

    pub fn update_settings(&self, patch: &SettingsPatch) -> Vec<Event> {
        self.command(|engine| engine.update_settings(patch))
    }

    pub fn delete_session(&self, id: Uuid) -> Option<Event> {
        self.command(|engine| engine.delete_session(id).into_iter().collect())
            .into_iter()
            .next()
    }

    /// Stop ticking. The engine state is left as it is.
    pub fn shutdown(&self) {
        let mut inner = lock(&self.shared);
        if let Some(ticker) = inner.ticker.take() {
            ticker.cancel.cancel();
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> TimerSnapshot {
        lock(&self.shared).engine.snapshot()
    }

    pub fn settings(&self) -> TimerSettings {
        lock(&self.shared).engine.settings().clone()
    }

    pub fn history(&self) -> SessionLog {
        lock(&self.shared).engine.history().clone()
    }

    pub fn display(&self) -> String {
        lock(&self.shared).engine.display()
    }

    /// Whether a tick task is currently scheduled.
    pub fn is_ticking(&self) -> bool {
        lock(&self.shared)
            .ticker
            .as_ref()
            .is_some_and(Ticker::is_active)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn command<F>(&self, f: F) -> Vec<Event>
    where
        F: FnOnce(&mut TimerEngine) -> Vec<Event>,
    {
        let mut inner = lock(&self.shared);
        let events = f(&mut inner.engine);
        self.sync_ticker(&mut inner);
        for event in &events {
            // No subscribers is fine.
            let _ = self.events.send(event.clone());
        }
        events
    }

    fn sync_ticker(&self, inner: &mut Inner) {
        let running = inner.engine.is_running();
        let ticking = inner.ticker.as_ref().is_some_and(Ticker::is_active);
        if running && !ticking {
            inner.ticker = Some(self.spawn_ticker());
        } else if !running {
            if let Some(ticker) = inner.ticker.take() {
                ticker.cancel.cancel();
                debug!("tick schedule cancelled");
            }
        }
    }

    fn spawn_ticker(&self) -> Ticker {
        let cancel = CancellationToken::new();
        let handle = self.runtime.spawn(run_ticker(
            Arc::clone(&self.shared),
            self.events.clone(),
            cancel.clone(),
        ));
        debug!("tick schedule started");
        Ticker { cancel, handle }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_ticker(
    shared: Arc<Mutex<Inner>>,
    events: broadcast::Sender<Event>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if !apply_tick(&shared, &events, &cancel) {
                    break;
                }
            }
        }
    }
    trace!("tick task exited");
}

/// Apply one tick. Returns false once the schedule should stop.
fn apply_tick(
    shared: &Mutex<Inner>,
    events: &broadcast::Sender<Event>,
    cancel: &CancellationToken,
) -> bool {
    let mut inner = lock(shared);
    if cancel.is_cancelled() {
        return false;
    }
    for event in inner.engine.tick() {
        let _ = events.send(event);
    }
    if inner.engine.is_running() {
        return true;
    }
    // Natural completion without auto-continue.
    cancel.cancel();
    inner.ticker = None;
    false
}

fn lock(shared: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
