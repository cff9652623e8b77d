//! The session controller — the state machine that multiplexes one audio
//! stream across named searches.
//!
//! ## Transitions
//!
//! ```text
//!                 start(b)                 stop() completed
//! Listening(a) ──────────► Stopping(a, b) ─────────────────► Listening(b)
//!     │  ▲                       │
//!     │  └── start(a) is a no-op └── start(c) while stopping only
//!     │                              overwrites pending (last write wins)
//!     └── EndOfSpeech / Timeout in a non-wake search ──► start(wake)
//! ```
//!
//! The `Stopping` state doubles as the transition lock: exactly one
//! stop/start pair is in flight at a time, so the engine never sees two
//! overlapping decode passes. A non-wake search carries a deadline inside
//! `Listening`; since deadlines are re-derived from state on every loop
//! iteration, any transition implicitly cancels the old timer — a stale
//! timeout cannot fire by construction.
//!
//! ## Event loop
//!
//! All state mutation happens on the loop thread inside [`run`]. The loop
//! selects over host commands, engine events, the listen deadline and the
//! result-clear deadline. Engine events flushed synchronously during a
//! `stop()` are drained and handled *before* the next search starts, while
//! the controller is still in `Stopping`.
//!
//! [`run`]: SessionController::run

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;

use crossbeam_channel::{at, never, select, Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::engine::DecodingEngine;
use crate::error::Result;
use crate::events::{EngineEvent, Hypothesis, SessionStatus, SessionStatusEvent};
use crate::search::{SearchName, SearchRegistry};
use crate::session::{
    SessionCommand, SessionConfig, SessionDiagnostics, SessionState, STATUS_BROADCAST_CAP,
};
use crate::sink::PresentationSink;

/// Owns every piece of mutable session state. Constructed by
/// [`SessionSetup::build`](crate::setup::SessionSetup::build), consumed by
/// [`Session::spawn`](crate::session::Session::spawn).
pub struct SessionController {
    registry: SearchRegistry,
    config: SessionConfig,
    captions: HashMap<SearchName, String>,
    triggers: HashMap<String, SearchName>,
    engine: Box<dyn DecodingEngine>,
    sink: Box<dyn PresentationSink>,
    state: SessionState,
    /// Fire-and-forget display-clear deadline; not part of the search
    /// state machine.
    clear_at: Option<Instant>,
    events_rx: Receiver<EngineEvent>,
    cmd_rx: Receiver<SessionCommand>,
    cmd_tx: Sender<SessionCommand>,
    running: Arc<AtomicBool>,
    status: Arc<Mutex<SessionStatus>>,
    status_tx: broadcast::Sender<SessionStatusEvent>,
    diagnostics: Arc<SessionDiagnostics>,
    torn_down: bool,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController").finish_non_exhaustive()
    }
}

enum StartAction {
    Noop,
    Queued,
    FromIdle,
    FromListening(SearchName),
}

impl SessionController {
    pub(crate) fn new(
        registry: SearchRegistry,
        config: SessionConfig,
        captions: HashMap<SearchName, String>,
        triggers: HashMap<String, SearchName>,
        engine: Box<dyn DecodingEngine>,
        sink: Box<dyn PresentationSink>,
        events_rx: Receiver<EngineEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let (status_tx, _) = broadcast::channel(STATUS_BROADCAST_CAP);

        Self {
            registry,
            config,
            captions,
            triggers,
            engine,
            sink,
            state: SessionState::Idle,
            clear_at: None,
            events_rx,
            cmd_rx,
            cmd_tx,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(SessionStatus::Idle)),
            status_tx,
            diagnostics: Arc::new(SessionDiagnostics::default()),
            torn_down: false,
        }
    }

    /// Current controller state (only meaningful before `run` consumes
    /// the controller, or from the loop thread itself).
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    // ── Shared handles for Session::spawn ────────────────────────────────

    pub(crate) fn command_sender(&self) -> Sender<SessionCommand> {
        self.cmd_tx.clone()
    }

    pub(crate) fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub(crate) fn status_cell(&self) -> Arc<Mutex<SessionStatus>> {
        Arc::clone(&self.status)
    }

    pub(crate) fn status_sender(&self) -> broadcast::Sender<SessionStatusEvent> {
        self.status_tx.clone()
    }

    pub(crate) fn diagnostics_handle(&self) -> Arc<SessionDiagnostics> {
        Arc::clone(&self.diagnostics)
    }

    // ── Event loop ───────────────────────────────────────────────────────

    /// Run the session loop until shutdown. Consumes the controller; the
    /// engine is cancelled and shut down exactly once on exit.
    pub fn run(mut self) {
        info!(wake = %self.config.wake_search, "session loop started");
        self.publish_status(None);

        let cmd_rx = self.cmd_rx.clone();
        let events_rx = self.events_rx.clone();

        loop {
            if !self.running.load(Ordering::Relaxed) {
                break;
            }

            // Deadlines are derived from state each iteration, so any
            // transition atomically cancels the previous timer.
            let listen_deadline = match &self.state {
                SessionState::Listening {
                    deadline: Some(d), ..
                } => at(*d),
                _ => never(),
            };
            let clear_deadline = match self.clear_at {
                Some(d) => at(d),
                None => never(),
            };

            select! {
                recv(cmd_rx) -> cmd => match cmd {
                    Ok(SessionCommand::Start(name)) => {
                        self.diagnostics.commands.fetch_add(1, Ordering::Relaxed);
                        self.start_or_report(&name);
                    }
                    Ok(SessionCommand::Shutdown) | Err(_) => break,
                },
                recv(events_rx) -> event => match event {
                    Ok(event) => self.handle_engine_event(event),
                    Err(_) => {
                        warn!("engine event channel closed — stopping session loop");
                        break;
                    }
                },
                recv(listen_deadline) -> _ => self.on_timeout(),
                recv(clear_deadline) -> _ => {
                    self.clear_at = None;
                    self.sink.set_result("");
                }
            }
        }

        self.teardown();
    }

    // ── Engine event handling ────────────────────────────────────────────

    fn handle_engine_event(&mut self, event: EngineEvent) {
        self.diagnostics.engine_events.fetch_add(1, Ordering::Relaxed);
        match event {
            EngineEvent::BeginningOfSpeech => debug!("speech started"),
            EngineEvent::EndOfSpeech => self.on_end_of_speech(),
            EngineEvent::Partial(hypothesis) => self.on_partial(hypothesis),
            EngineEvent::Final(hypothesis) => self.on_final(hypothesis),
            EngineEvent::Timeout => self.on_timeout(),
            EngineEvent::Error(message) => self.on_engine_error(message),
        }
    }

    /// Quick in-flight hypothesis. Trigger phrases switch searches; all
    /// other text is display-only.
    fn on_partial(&mut self, hypothesis: Hypothesis) {
        let trimmed = hypothesis.text.trim();
        if let Some(target) = self.triggers.get(trimmed).cloned() {
            self.diagnostics
                .triggers_matched
                .fetch_add(1, Ordering::Relaxed);
            info!(phrase = trimmed, target = %target, "trigger phrase matched");
            self.start_or_report(&target);
        } else {
            self.sink.set_result(&hypothesis.text);
        }
    }

    /// Committed hypothesis: one-shot notification plus the deferred
    /// display clear.
    fn on_final(&mut self, hypothesis: Hypothesis) {
        info!(text = %hypothesis.text, "final hypothesis");
        self.sink.notify_transient(&hypothesis.text);
        self.clear_at = Some(Instant::now() + self.config.result_clear_delay);
    }

    /// End of utterance in any non-wake search returns control to wake
    /// listening, whether or not a final hypothesis arrived.
    fn on_end_of_speech(&mut self) {
        match &self.state {
            SessionState::Listening { search, .. } if *search != self.config.wake_search => {
                debug!(search = %search, "end of speech — returning to wake search");
                let wake = self.config.wake_search.clone();
                self.start_or_report(&wake);
            }
            SessionState::Stopping { .. } => {
                debug!("end of speech during stop — superseded by in-flight switch");
            }
            _ => debug!("end of speech while idle or wake-listening"),
        }
    }

    fn on_timeout(&mut self) {
        self.diagnostics
            .timeouts_fired
            .fetch_add(1, Ordering::Relaxed);
        match &self.state {
            SessionState::Stopping { .. } => {
                debug!("timeout during stop — stale, dropped");
            }
            _ => {
                debug!("listen timeout — returning to wake search");
                let wake = self.config.wake_search.clone();
                self.start_or_report(&wake);
            }
        }
    }

    /// Runtime decode failure: surfaced, never fatal. The state machine
    /// stays where it was; the next start or timeout resumes normally.
    fn on_engine_error(&mut self, message: String) {
        self.diagnostics
            .engine_errors
            .fetch_add(1, Ordering::Relaxed);
        warn!(error = %message, "engine reported error — state unchanged");
        self.sink.report_error(&message);
        self.publish_status(Some(message));
    }

    // ── Transitions ──────────────────────────────────────────────────────

    /// Switch decoding to `name`.
    ///
    /// Idempotent when already listening on `name`. While a stop is in
    /// flight only the pending target is replaced (last write wins).
    /// Otherwise issues exactly one `stop()` (when something is
    /// listening) and one `start_listening`.
    ///
    /// # Errors
    /// [`UnknownSearch`](crate::error::VigilError::UnknownSearch) for an
    /// unregistered name; engine failures propagate.
    pub(crate) fn start(&mut self, name: &SearchName) -> Result<()> {
        self.registry.lookup(name)?;

        let action = match &mut self.state {
            SessionState::Listening { search, .. } if *search == *name => StartAction::Noop,
            SessionState::Stopping { pending, .. } => {
                *pending = Some(name.clone());
                StartAction::Queued
            }
            SessionState::Idle => StartAction::FromIdle,
            SessionState::Listening { search, .. } => StartAction::FromListening(search.clone()),
        };

        match action {
            StartAction::Noop => {
                debug!(search = %name, "already listening — start is a no-op");
                Ok(())
            }
            StartAction::Queued => {
                debug!(search = %name, "switch requested mid-stop — queued, last write wins");
                Ok(())
            }
            StartAction::FromIdle => self.begin_listening(name.clone()),
            StartAction::FromListening(current) => {
                self.state = SessionState::Stopping {
                    from: current.clone(),
                    pending: Some(name.clone()),
                };
                self.publish_status(None);
                self.diagnostics.stops_issued.fetch_add(1, Ordering::Relaxed);
                debug!(from = %current, to = %name, "stopping active search");
                if let Err(e) = self.engine.stop() {
                    self.state = SessionState::Idle;
                    self.publish_status(Some(e.to_string()));
                    return Err(e);
                }
                self.drain_flushed_events();
                self.finish_stop()
            }
        }
    }

    /// Handle whatever the engine flushed onto the event channel while
    /// `stop()` was blocking. These belong to the search being stopped
    /// and must be observed before the next one starts.
    fn drain_flushed_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_engine_event(event);
        }
    }

    fn finish_stop(&mut self) -> Result<()> {
        let next = match &mut self.state {
            SessionState::Stopping { pending, .. } => pending.take(),
            _ => return Ok(()),
        };
        match next {
            Some(next) => self.begin_listening(next),
            None => {
                self.state = SessionState::Idle;
                self.publish_status(None);
                Ok(())
            }
        }
    }

    fn begin_listening(&mut self, name: SearchName) -> Result<()> {
        let timeout = if name == self.config.wake_search {
            None
        } else {
            Some(self.config.listen_timeout)
        };

        self.diagnostics.starts_issued.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.engine.start_listening(&name, timeout) {
            self.state = SessionState::Idle;
            self.publish_status(Some(e.to_string()));
            return Err(e);
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        self.state = SessionState::Listening {
            search: name.clone(),
            deadline,
        };

        let caption = self
            .captions
            .get(&name)
            .cloned()
            .unwrap_or_else(|| name.to_string());
        self.sink.set_caption(&caption);

        info!(
            search = %name,
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "listening"
        );
        self.publish_status(None);
        Ok(())
    }

    fn start_or_report(&mut self, name: &SearchName) {
        if let Err(e) = self.start(name) {
            self.diagnostics
                .engine_errors
                .fetch_add(1, Ordering::Relaxed);
            warn!(search = %name, error = %e, "search switch failed");
            self.sink.report_error(&e.to_string());
        }
    }

    // ── Status / teardown ────────────────────────────────────────────────

    fn publish_status(&self, detail: Option<String>) {
        let status = self.state.status();
        *self.status.lock() = status;
        let _ = self.status_tx.send(SessionStatusEvent {
            status,
            search: self.state.active_search().map(|s| s.to_string()),
            detail,
        });
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.engine.cancel();
        self.engine.shutdown();
        self.running.store(false, Ordering::SeqCst);
        *self.status.lock() = SessionStatus::Stopped;
        let _ = self.status_tx.send(SessionStatusEvent {
            status: SessionStatus::Stopped,
            search: None,
            detail: None,
        });

        let snap = self.diagnostics.snapshot();
        info!(
            engine_events = snap.engine_events,
            commands = snap.commands,
            stops_issued = snap.stops_issued,
            starts_issued = snap.starts_issued,
            triggers_matched = snap.triggers_matched,
            timeouts_fired = snap.timeouts_fired,
            engine_errors = snap.engine_errors,
            "session stopped — diagnostics"
        );
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}
