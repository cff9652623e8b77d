//! Presentation sink abstraction.
//!
//! The `PresentationSink` trait is the display seam: the controller pushes
//! caption/result text and notifications through it and never reads
//! anything back. Hosts implement it for whatever surface they have (the
//! console sink in vigil-app, a recording sink in tests).

/// Receiver for everything the session wants shown to a user.
///
/// Purely observational — implementations must not call back into the
/// session from these methods.
pub trait PresentationSink: Send + 'static {
    /// Replace the caption line describing the active search.
    fn set_caption(&mut self, text: &str);

    /// Replace the live result line (partial hypothesis display).
    ///
    /// Called with `""` when the result-clear delay elapses.
    fn set_result(&mut self, text: &str);

    /// One-shot notification for a committed final hypothesis.
    fn notify_transient(&mut self, text: &str);

    /// Surface a runtime engine error. The session keeps running.
    fn report_error(&mut self, text: &str);
}
