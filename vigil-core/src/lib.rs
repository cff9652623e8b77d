//! # vigil-core
//!
//! Multi-search recognition session controller SDK.
//!
//! ## Architecture
//!
//! ```text
//! DecodingEngine ──EngineEvent──► crossbeam channel ──► session loop thread
//!      ▲                                                      │
//!      │ stop() / start_listening(name, timeout)       state transition
//!      └──────────────────────────────────────────────────────┤
//!                                                             ▼
//!                                                    PresentationSink
//! ```
//!
//! The decoder itself is an opaque external engine; vigil only decides
//! *which named search* it should run next. All session state lives on one
//! loop thread, so the engine never observes overlapping decode passes.
//!
//! A session is assembled with [`SessionSetup`], spawned with
//! [`Session::spawn`], and driven entirely by engine events from there —
//! wake phrase in, grammar search out, timeout back to wake.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod events;
pub mod search;
pub mod session;
pub mod setup;
pub mod sink;

// Convenience re-exports for downstream crates
pub use engine::{DecodingEngine, StubEngine, StubHandle};
pub use error::VigilError;
pub use events::{EngineEvent, Hypothesis, SessionStatus, SessionStatusEvent};
pub use search::{SearchConfig, SearchName, SearchRegistry};
pub use session::{
    DiagnosticsSnapshot, Session, SessionConfig, SessionController, SessionState,
    DEFAULT_LISTEN_TIMEOUT, DEFAULT_RESULT_CLEAR_DELAY,
};
pub use setup::SessionSetup;
pub use sink::PresentationSink;
