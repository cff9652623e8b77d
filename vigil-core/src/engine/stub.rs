//! `StubEngine` — scripted backend with no real decoder behind it.
//!
//! Records every call it receives and lets a paired [`StubHandle`] feed
//! hypotheses into the session, so the full controller/sink path can be
//! exercised end-to-end without audio or models. vigil-app drives its
//! console demo through this backend; the integration tests script it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::engine::DecodingEngine;
use crate::error::{Result, VigilError};
use crate::events::{EngineEvent, Hypothesis};
use crate::search::{SearchConfig, SearchName};

/// One observed engine call, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Configure { search: String },
    Start { search: String, timeout: Option<Duration> },
    Stop,
    Cancel,
    Shutdown,
}

#[derive(Default)]
struct StubShared {
    calls: Mutex<Vec<EngineCall>>,
    active: Mutex<Option<SearchName>>,
    events: Mutex<Option<Sender<EngineEvent>>>,
    /// Events replayed onto the channel during the next `stop()`, before
    /// it returns — models a decoder flushing buffered output.
    flush_on_stop: Mutex<VecDeque<EngineEvent>>,
    /// Error message returned by the next `start_listening` call.
    fail_next_start: Mutex<Option<String>>,
}

impl StubShared {
    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }

    fn send(&self, event: EngineEvent) -> bool {
        match &*self.events.lock() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

/// Scripted engine backend. Create with [`StubEngine::new`], which also
/// returns the [`StubHandle`] used to feed events from outside.
pub struct StubEngine {
    shared: Arc<StubShared>,
}

impl StubEngine {
    pub fn new() -> (Self, StubHandle) {
        let shared = Arc::new(StubShared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            StubHandle { shared },
        )
    }
}

impl DecodingEngine for StubEngine {
    fn attach_listener(&mut self, events: Sender<EngineEvent>) {
        *self.shared.events.lock() = Some(events);
    }

    fn configure(&mut self, name: &SearchName, config: &SearchConfig) -> Result<()> {
        debug!(search = %name, kind = config.kind(), "stub engine configured search");
        self.shared.record(EngineCall::Configure {
            search: name.to_string(),
        });
        Ok(())
    }

    fn start_listening(&mut self, name: &SearchName, timeout: Option<Duration>) -> Result<()> {
        if let Some(message) = self.shared.fail_next_start.lock().take() {
            return Err(VigilError::Engine(message));
        }
        debug!(search = %name, ?timeout, "stub engine listening");
        self.shared.record(EngineCall::Start {
            search: name.to_string(),
            timeout,
        });
        *self.shared.active.lock() = Some(name.clone());
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        // Flush scripted events while the search is still active, exactly
        // like a real decoder delivering its buffered final during stop().
        let flushed: Vec<EngineEvent> = self.shared.flush_on_stop.lock().drain(..).collect();
        for event in flushed {
            self.shared.send(event);
        }
        self.shared.record(EngineCall::Stop);
        *self.shared.active.lock() = None;
        Ok(())
    }

    fn cancel(&mut self) {
        debug!("stub engine cancelled");
        self.shared.record(EngineCall::Cancel);
        *self.shared.active.lock() = None;
    }

    fn shutdown(&mut self) {
        debug!("stub engine shut down");
        self.shared.record(EngineCall::Shutdown);
    }
}

/// External control surface for a [`StubEngine`] that has been handed to
/// a session. Cloneable; all state is shared with the engine half.
#[derive(Clone)]
pub struct StubHandle {
    shared: Arc<StubShared>,
}

impl StubHandle {
    /// Snapshot of every call the engine has received so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.shared.calls.lock().clone()
    }

    /// The search the engine currently considers active, if any.
    pub fn active_search(&self) -> Option<SearchName> {
        self.shared.active.lock().clone()
    }

    /// Deliver an event to the session, but only while a search is
    /// actively listening — a stopped search must stay silent.
    ///
    /// Returns whether the event was delivered.
    pub fn emit(&self, event: EngineEvent) -> bool {
        if self.shared.active.lock().is_none() {
            warn!(?event, "stub engine dropped event — no active search");
            return false;
        }
        self.shared.send(event)
    }

    pub fn hear_partial(&self, text: &str) -> bool {
        self.emit(EngineEvent::Partial(Hypothesis::new(text)))
    }

    pub fn hear_final(&self, text: &str) -> bool {
        self.emit(EngineEvent::Final(Hypothesis::new(text)))
    }

    pub fn end_of_speech(&self) -> bool {
        self.emit(EngineEvent::EndOfSpeech)
    }

    pub fn timeout(&self) -> bool {
        self.emit(EngineEvent::Timeout)
    }

    pub fn fail(&self, message: &str) -> bool {
        self.emit(EngineEvent::Error(message.to_string()))
    }

    /// Script an event to be flushed during the next `stop()` call.
    pub fn flush_on_stop(&self, event: EngineEvent) {
        self.shared.flush_on_stop.lock().push_back(event);
    }

    /// Make the next `start_listening` call fail with `message`.
    pub fn fail_next_start(&self, message: &str) {
        *self.shared.fail_next_start.lock() = Some(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn events_are_gated_on_an_active_search() {
        let (mut engine, handle) = StubEngine::new();
        let (tx, rx) = unbounded();
        engine.attach_listener(tx);

        assert!(!handle.hear_partial("too early"), "no search active yet");

        engine
            .start_listening(&SearchName::new("wakeup"), None)
            .unwrap();
        assert!(handle.hear_partial("oh mighty computer"));

        engine.stop().unwrap();
        assert!(!handle.hear_partial("too late"), "search was stopped");

        let delivered: Vec<EngineEvent> = rx.try_iter().collect();
        assert_eq!(delivered.len(), 1);
        assert!(matches!(
            &delivered[0],
            EngineEvent::Partial(h) if h.text == "oh mighty computer"
        ));
    }

    #[test]
    fn scripted_flush_is_delivered_during_stop() {
        let (mut engine, handle) = StubEngine::new();
        let (tx, rx) = unbounded();
        engine.attach_listener(tx);

        engine
            .start_listening(&SearchName::new("digits"), Some(Duration::from_secs(10)))
            .unwrap();
        handle.flush_on_stop(EngineEvent::Final(Hypothesis::new("one two three")));

        assert!(rx.try_recv().is_err(), "nothing flushed before stop");
        engine.stop().unwrap();

        let delivered: Vec<EngineEvent> = rx.try_iter().collect();
        assert_eq!(delivered.len(), 1);
        assert!(matches!(
            &delivered[0],
            EngineEvent::Final(h) if h.text == "one two three"
        ));
    }

    #[test]
    fn calls_are_recorded_in_order() {
        let (mut engine, handle) = StubEngine::new();
        let name = SearchName::new("menu");

        engine
            .configure(
                &name,
                &SearchConfig::Grammar {
                    path: "menu.gram".into(),
                },
            )
            .unwrap();
        engine
            .start_listening(&name, Some(Duration::from_secs(10)))
            .unwrap();
        engine.stop().unwrap();
        engine.cancel();
        engine.shutdown();

        assert_eq!(
            handle.calls(),
            vec![
                EngineCall::Configure {
                    search: "menu".into()
                },
                EngineCall::Start {
                    search: "menu".into(),
                    timeout: Some(Duration::from_secs(10)),
                },
                EngineCall::Stop,
                EngineCall::Cancel,
                EngineCall::Shutdown,
            ]
        );
    }
}
