//! Event types exchanged between the decoding engine, the session
//! controller and status observers.
//!
//! Engine callbacks are a single tagged enum, [`EngineEvent`], consumed
//! by one transition function. Events travel over a plain channel, so the
//! engine thread never touches controller state.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Engine events
// ---------------------------------------------------------------------------

/// A single recognition hypothesis for the current utterance.
///
/// Ephemeral: produced per utterance, displayed, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hypothesis {
    /// Recognised text.
    pub text: String,
    /// Decoder confidence in [0.0, 1.0], if the engine provides one.
    pub confidence: Option<f32>,
}

impl Hypothesis {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }
}

/// Everything a decoding engine can report back to the session.
///
/// An engine with no hypothesis to offer stays silent; there is no
/// empty-payload variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum EngineEvent {
    /// Speech onset detected in the audio stream.
    BeginningOfSpeech,
    /// The current utterance ended (silence boundary).
    EndOfSpeech,
    /// Quick in-flight hypothesis update; text may still change.
    Partial(Hypothesis),
    /// Committed hypothesis, emitted when a decode pass is stopped.
    Final(Hypothesis),
    /// The engine-side listen timeout elapsed with no terminal event.
    Timeout,
    /// Runtime decode failure. The session survives these.
    Error(String),
}

// ---------------------------------------------------------------------------
// Session status events
// ---------------------------------------------------------------------------

/// Coarse phase of the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Controller exists but no search has been started yet.
    Idle,
    /// Engine is actively decoding under one named search.
    Listening,
    /// A stop is in flight; the next search starts when it completes.
    Stopping,
    /// The run loop has exited and the engine was shut down.
    Stopped,
}

/// Emitted on the broadcast status channel when the session changes phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusEvent {
    pub status: SessionStatus,
    /// Active search name, when one is listening.
    pub search: Option<String>,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}
