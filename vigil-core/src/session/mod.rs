//! Session lifecycle: configuration, state, and the owning handle.
//!
//! ## Lifecycle
//!
//! ```text
//! SessionSetup::build()        → controller exists, engine configured, Idle
//!     └─► Session::spawn()     → loop thread running
//!         └─► switch_to(wake)  → Listening(wake)
//!             └─► shutdown()   → loop joined, engine cancel + shutdown, Stopped
//! ```
//!
//! `shutdown()` is idempotent and synchronous; the engine is released
//! exactly once on every exit path, including a controller that was built
//! but never spawned (its `Drop` performs the same teardown).
//!
//! ## Threading
//!
//! All session state lives on one dedicated loop thread; the [`Session`]
//! handle only ever touches channels, atomics and lock-guarded snapshots.

pub mod controller;

pub use controller::SessionController;

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::error::{Result, VigilError};
use crate::events::{SessionStatus, SessionStatusEvent};
use crate::search::SearchName;

/// Broadcast channel capacity: 64 status events buffered for slow consumers.
pub(crate) const STATUS_BROADCAST_CAP: usize = 64;

/// Listen timeout applied to every non-wake search unless overridden.
pub const DEFAULT_LISTEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay before a displayed final result is cleared from the sink.
pub const DEFAULT_RESULT_CLEAR_DELAY: Duration = Duration::from_secs(6);

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The keyword-spot home search. Listening here is open-ended; every
    /// other search times out back to it.
    pub wake_search: SearchName,
    /// Deadline for non-wake searches. Default: 10 s.
    pub listen_timeout: Duration,
    /// How long a final result stays on screen. Default: 6 s.
    pub result_clear_delay: Duration,
}

impl SessionConfig {
    pub fn new(wake_search: impl Into<SearchName>) -> Self {
        Self {
            wake_search: wake_search.into(),
            listen_timeout: DEFAULT_LISTEN_TIMEOUT,
            result_clear_delay: DEFAULT_RESULT_CLEAR_DELAY,
        }
    }
}

/// Where the controller is in its stop/start cycle.
///
/// Exactly one of "no active search" or "active search with optional
/// deadline" holds at any instant; `Stopping` is the transition lock
/// between the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No engine call issued yet (or the last restart failed).
    Idle,
    /// The engine is actively decoding under `search`.
    Listening {
        search: SearchName,
        /// Controller-side timeout; `None` for the wake search.
        deadline: Option<Instant>,
    },
    /// A stop was issued and has not completed. Switch requests arriving
    /// now only replace `pending` — last write wins.
    Stopping {
        from: SearchName,
        pending: Option<SearchName>,
    },
}

impl SessionState {
    /// The search currently decoding, if any.
    pub fn active_search(&self) -> Option<&SearchName> {
        match self {
            SessionState::Listening { search, .. } => Some(search),
            _ => None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Idle => SessionStatus::Idle,
            SessionState::Listening { .. } => SessionStatus::Listening,
            SessionState::Stopping { .. } => SessionStatus::Stopping,
        }
    }
}

/// Host-facing commands consumed by the loop thread.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Start(SearchName),
    Shutdown,
}

/// Shared loop counters for observability.
#[derive(Default)]
pub struct SessionDiagnostics {
    pub engine_events: AtomicUsize,
    pub commands: AtomicUsize,
    pub stops_issued: AtomicUsize,
    pub starts_issued: AtomicUsize,
    pub triggers_matched: AtomicUsize,
    pub timeouts_fired: AtomicUsize,
    pub engine_errors: AtomicUsize,
}

impl SessionDiagnostics {
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            engine_events: self.engine_events.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
            stops_issued: self.stops_issued.load(Ordering::Relaxed),
            starts_issued: self.starts_issued.load(Ordering::Relaxed),
            triggers_matched: self.triggers_matched.load(Ordering::Relaxed),
            timeouts_fired: self.timeouts_fired.load(Ordering::Relaxed),
            engine_errors: self.engine_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub engine_events: usize,
    pub commands: usize,
    pub stops_issued: usize,
    pub starts_issued: usize,
    pub triggers_matched: usize,
    pub timeouts_fired: usize,
    pub engine_errors: usize,
}

/// Owning handle to a running session loop.
///
/// Cheap to query; all methods are safe from any thread. Dropping the
/// handle performs a best-effort shutdown.
pub struct Session {
    cmd_tx: Sender<SessionCommand>,
    running: Arc<AtomicBool>,
    status: Arc<Mutex<SessionStatus>>,
    status_tx: broadcast::Sender<SessionStatusEvent>,
    diagnostics: Arc<SessionDiagnostics>,
    join: Option<JoinHandle<()>>,
}

impl Session {
    /// Start the loop thread and return the owning handle.
    ///
    /// # Errors
    /// `VigilError::Io` if the OS refuses to spawn the thread.
    pub fn spawn(controller: SessionController) -> Result<Self> {
        let cmd_tx = controller.command_sender();
        let running = controller.running_flag();
        let status = controller.status_cell();
        let status_tx = controller.status_sender();
        let diagnostics = controller.diagnostics_handle();

        running.store(true, Ordering::SeqCst);
        let join = std::thread::Builder::new()
            .name("vigil-session".into())
            .spawn(move || controller.run())
            .map_err(VigilError::Io)?;

        info!("session spawned");
        Ok(Self {
            cmd_tx,
            running,
            status,
            status_tx,
            diagnostics,
            join: Some(join),
        })
    }

    /// Whether the loop thread is still accepting commands.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request a switch to the named search.
    ///
    /// Queued to the loop thread; an unknown name is reported through the
    /// presentation sink rather than returned here.
    ///
    /// # Errors
    /// `VigilError::NotRunning` after shutdown.
    pub fn switch_to(&self, name: impl Into<SearchName>) -> Result<()> {
        if !self.is_running() {
            return Err(VigilError::NotRunning);
        }
        self.cmd_tx
            .send(SessionCommand::Start(name.into()))
            .map_err(|_| VigilError::NotRunning)
    }

    /// Current session phase (snapshot).
    pub fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    /// Subscribe to live phase-change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of loop counters for observability.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Stop the loop, join its thread and release the engine.
    ///
    /// Idempotent: the first call tears down, later calls are no-ops.
    /// Safe to call even if the loop already exited on its own.
    pub fn shutdown(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            // The loop may be parked in select; the command wakes it.
            let _ = self.cmd_tx.send(SessionCommand::Shutdown);
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
