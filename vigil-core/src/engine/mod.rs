//! Decoding engine adapter contract.
//!
//! The actual recogniser — acoustic model, dictionary, search-space
//! pruning, endpointing — lives behind this trait as an opaque black box.
//! vigil-core only ever tells it *which named search* to run and listens
//! to the [`EngineEvent`]s it sends back on the attached channel.
//!
//! ## Contract
//!
//! - Events flow one way, engine → session, over the channel installed by
//!   [`DecodingEngine::attach_listener`]. The engine may deliver them from
//!   any thread.
//! - `stop()` is synchronous: it blocks until the current decode pass is
//!   flushed, and any flushed final hypothesis is sent on the event
//!   channel *before* `stop()` returns. After `stop()` has returned, no
//!   further events for the stopped search may be delivered — the session
//!   relies on this to attribute events to the right search across a
//!   switch.
//! - `cancel()` halts without flushing a result; `shutdown()` releases
//!   the underlying resources. Both are called exactly once, in that
//!   order, when the session tears down.

pub mod stub;

pub use stub::{EngineCall, StubEngine, StubHandle};

use std::time::Duration;

use crossbeam_channel::Sender;

use crate::error::Result;
use crate::events::EngineEvent;
use crate::search::{SearchConfig, SearchName};

/// Contract for decoding engine backends.
pub trait DecodingEngine: Send + 'static {
    /// Install the session's event channel. Called once at setup, before
    /// any search is configured.
    fn attach_listener(&mut self, events: Sender<EngineEvent>);

    /// Make a named search available for later `start_listening` calls.
    /// Called once per registered search, at setup time.
    ///
    /// # Errors
    /// Fails if the engine cannot load the search's assets — fatal to
    /// session start.
    fn configure(&mut self, name: &SearchName, config: &SearchConfig) -> Result<()>;

    /// Begin decoding under `name`.
    ///
    /// With `timeout: None` the engine listens continuously (keyword
    /// spotting). With `Some(t)` it emits [`EngineEvent::Timeout`] if no
    /// terminal event occurs within `t`.
    fn start_listening(&mut self, name: &SearchName, timeout: Option<Duration>) -> Result<()>;

    /// Halt the current decode, flushing any buffered final hypothesis
    /// onto the event channel before returning.
    fn stop(&mut self) -> Result<()>;

    /// Halt the current decode without flushing a result.
    fn cancel(&mut self);

    /// Release engine resources. No calls are made after this.
    fn shutdown(&mut self);
}
