//! Session setup builder.
//!
//! Collects the named searches, the trigger routing table, captions and
//! timeout knobs, then validates the whole configuration in one place —
//! [`SessionSetup::build`] — so a bad deployment fails session start once,
//! before anything touches the engine's audio path.
//!
//! The engine arrives pre-built (acoustic model and dictionary are inputs
//! to its constructor, outside this crate); `build` attaches the event
//! channel and issues one `configure` call per registered search.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::engine::DecodingEngine;
use crate::error::{Result, VigilError};
use crate::search::{SearchConfig, SearchName, SearchRegistry};
use crate::session::{SessionConfig, SessionController};
use crate::sink::PresentationSink;

/// Builder for a [`SessionController`].
///
/// All methods are infallible; every configuration error is reported by
/// [`build`](Self::build).
#[derive(Debug, Default)]
pub struct SessionSetup {
    searches: Vec<(SearchName, SearchConfig)>,
    wake_search: Option<SearchName>,
    triggers: HashMap<String, SearchName>,
    captions: HashMap<SearchName, String>,
    listen_timeout: Option<Duration>,
    result_clear_delay: Option<Duration>,
}

impl SessionSetup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a continuous keyword-spotting search for `keyphrase`.
    pub fn keyword_search(
        mut self,
        name: impl Into<SearchName>,
        keyphrase: impl Into<String>,
    ) -> Self {
        self.searches.push((
            name.into(),
            SearchConfig::KeywordSpot {
                keyphrase: keyphrase.into(),
            },
        ));
        self
    }

    /// Register a grammar-based (JSGF) search backed by `path`.
    pub fn grammar_search(mut self, name: impl Into<SearchName>, path: impl Into<PathBuf>) -> Self {
        self.searches
            .push((name.into(), SearchConfig::Grammar { path: path.into() }));
        self
    }

    /// Register an n-gram language-model search backed by `path`.
    pub fn ngram_search(mut self, name: impl Into<SearchName>, path: impl Into<PathBuf>) -> Self {
        self.searches
            .push((name.into(), SearchConfig::NgramModel { path: path.into() }));
        self
    }

    /// Register a phonetic all-phone search backed by `path`.
    pub fn allphone_search(
        mut self,
        name: impl Into<SearchName>,
        path: impl Into<PathBuf>,
    ) -> Self {
        self.searches
            .push((name.into(), SearchConfig::AllPhone { path: path.into() }));
        self
    }

    /// Designate the keyword-spot home search. Required.
    pub fn wake_search(mut self, name: impl Into<SearchName>) -> Self {
        self.wake_search = Some(name.into());
        self
    }

    /// Route an exactly-matching spoken phrase to a target search.
    pub fn trigger(mut self, phrase: impl Into<String>, target: impl Into<SearchName>) -> Self {
        self.triggers.insert(phrase.into(), target.into());
        self
    }

    /// Display caption shown while `name` is listening. A search without
    /// a caption falls back to its own name.
    pub fn caption(mut self, name: impl Into<SearchName>, text: impl Into<String>) -> Self {
        self.captions.insert(name.into(), text.into());
        self
    }

    /// Deadline for non-wake searches. Default: 10 s.
    pub fn listen_timeout(mut self, timeout: Duration) -> Self {
        self.listen_timeout = Some(timeout);
        self
    }

    /// How long a final result stays on screen. Default: 6 s.
    pub fn result_clear_delay(mut self, delay: Duration) -> Self {
        self.result_clear_delay = Some(delay);
        self
    }

    /// Validate the configuration, configure the engine and return the
    /// un-spawned controller.
    ///
    /// # Errors
    /// - [`VigilError::DuplicateSearch`] for a reused name.
    /// - [`VigilError::AssetMissing`] when a file-backed search points at
    ///   a path that does not exist.
    /// - [`VigilError::Setup`] for a missing or non-keyword wake search,
    ///   or a trigger routed to an unregistered target.
    /// - Engine `configure` failures propagate unchanged.
    pub fn build<E, S>(self, mut engine: E, sink: S) -> Result<SessionController>
    where
        E: DecodingEngine,
        S: PresentationSink,
    {
        let mut registry = SearchRegistry::new();
        for (name, config) in self.searches {
            if let Some(path) = config.asset_path() {
                if !path.exists() {
                    return Err(VigilError::AssetMissing {
                        path: path.to_path_buf(),
                    });
                }
            }
            registry.register(name, config)?;
        }

        let wake_search = self
            .wake_search
            .ok_or_else(|| VigilError::Setup("no wake search designated".into()))?;
        if !registry.lookup(&wake_search)?.is_keyword_spot() {
            return Err(VigilError::Setup(format!(
                "wake search '{wake_search}' is not a keyword-spot search"
            )));
        }

        for (phrase, target) in &self.triggers {
            if !registry.contains(target) {
                return Err(VigilError::Setup(format!(
                    "trigger '{phrase}' routes to unknown search '{target}'"
                )));
            }
        }

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        engine.attach_listener(events_tx);
        for (name, config) in registry.iter() {
            engine.configure(name, config)?;
            info!(search = %name, kind = config.kind(), "search configured");
        }

        let mut config = SessionConfig::new(wake_search);
        if let Some(timeout) = self.listen_timeout {
            config.listen_timeout = timeout;
        }
        if let Some(delay) = self.result_clear_delay {
            config.result_clear_delay = delay;
        }

        info!(
            searches = registry.len(),
            triggers = self.triggers.len(),
            "session setup complete"
        );

        Ok(SessionController::new(
            registry,
            config,
            self.captions,
            self.triggers,
            Box::new(engine),
            Box::new(sink),
            events_rx,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::engine::{EngineCall, StubEngine};
    use crate::session::SessionState;

    struct NullSink;

    impl PresentationSink for NullSink {
        fn set_caption(&mut self, _text: &str) {}
        fn set_result(&mut self, _text: &str) {}
        fn notify_transient(&mut self, _text: &str) {}
        fn report_error(&mut self, _text: &str) {}
    }

    fn temp_asset(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("vigil-setup-{}-{name}", std::process::id()));
        std::fs::write(&path, "#JSGF V1.0;\n").expect("write temp asset");
        path
    }

    #[test]
    fn build_fails_when_a_search_asset_is_missing() {
        let (engine, _handle) = StubEngine::new();
        let err = SessionSetup::new()
            .keyword_search("wakeup", "oh mighty computer")
            .grammar_search("menu", "/definitely/not/here/menu.gram")
            .wake_search("wakeup")
            .build(engine, NullSink)
            .expect_err("missing asset must fail setup");

        assert!(matches!(err, VigilError::AssetMissing { .. }));
    }

    #[test]
    fn build_rejects_duplicate_search_names() {
        let (engine, _handle) = StubEngine::new();
        let err = SessionSetup::new()
            .keyword_search("wakeup", "oh mighty computer")
            .keyword_search("wakeup", "hey vigil")
            .wake_search("wakeup")
            .build(engine, NullSink)
            .expect_err("duplicate names must fail setup");

        assert!(matches!(err, VigilError::DuplicateSearch(name) if name == "wakeup"));
    }

    #[test]
    fn build_requires_a_designated_keyword_wake_search() {
        let (engine, _handle) = StubEngine::new();
        let err = SessionSetup::new()
            .keyword_search("wakeup", "oh mighty computer")
            .build(engine, NullSink)
            .expect_err("undesignated wake search must fail setup");
        assert!(matches!(err, VigilError::Setup(_)));

        let grammar = temp_asset("wakeish.gram");
        let (engine, _handle) = StubEngine::new();
        let err = SessionSetup::new()
            .grammar_search("wakeup", &grammar)
            .wake_search("wakeup")
            .build(engine, NullSink)
            .expect_err("non-keyword wake search must fail setup");
        assert!(matches!(err, VigilError::Setup(_)));
        let _ = std::fs::remove_file(grammar);
    }

    #[test]
    fn build_rejects_triggers_to_unregistered_searches() {
        let (engine, _handle) = StubEngine::new();
        let err = SessionSetup::new()
            .keyword_search("wakeup", "oh mighty computer")
            .wake_search("wakeup")
            .trigger("oh mighty computer", "menu")
            .build(engine, NullSink)
            .expect_err("dangling trigger must fail setup");

        assert!(matches!(err, VigilError::Setup(message) if message.contains("menu")));
    }

    #[test]
    fn build_configures_every_registered_search() {
        let menu = temp_asset("menu.gram");
        let weather = temp_asset("weather.lm");

        let (engine, handle) = StubEngine::new();
        let controller = SessionSetup::new()
            .keyword_search("wakeup", "oh mighty computer")
            .grammar_search("menu", &menu)
            .ngram_search("forecast", &weather)
            .wake_search("wakeup")
            .trigger("oh mighty computer", "menu")
            .caption("wakeup", "say the magic words")
            .build(engine, NullSink)
            .expect("valid setup must build");

        assert_eq!(controller.state(), &SessionState::Idle);

        let mut configured: Vec<String> = handle
            .calls()
            .into_iter()
            .map(|call| match call {
                EngineCall::Configure { search } => search,
                other => panic!("unexpected engine call during setup: {other:?}"),
            })
            .collect();
        configured.sort();
        assert_eq!(configured, vec!["forecast", "menu", "wakeup"]);

        let _ = std::fs::remove_file(menu);
        let _ = std::fs::remove_file(weather);
    }
}
