//! Application settings (JSON file, falls back to the bundled demo set).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::info;

use vigil_core::SessionSetup;

/// Wake phrase used when the settings file does not name one.
pub const DEFAULT_KEYPHRASE: &str = "oh mighty computer";

fn bundled_asset(name: &str) -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/assets")).join(name)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    /// Acoustic model directory handed to the engine constructor, if the
    /// backend needs one. Validated for existence when set.
    pub acoustic_model: Option<PathBuf>,
    /// Pronunciation dictionary handed to the engine constructor.
    pub dictionary: Option<PathBuf>,
    /// Directory for raw audio logging, engine-side. Unset disables it.
    pub raw_log_dir: Option<PathBuf>,
    pub keyphrase: String,
    pub wake_search: String,
    pub searches: Vec<SearchSpec>,
    /// Spoken phrase → target search routing.
    pub triggers: HashMap<String, String>,
    /// Search name → caption shown while it listens.
    pub captions: HashMap<String, String>,
    pub listen_timeout_ms: u64,
    pub result_clear_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSpec {
    pub name: String,
    pub kind: SearchKind,
    /// Grammar / language-model file for file-backed kinds.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Keyword searches only; falls back to the global keyphrase.
    #[serde(default)]
    pub keyphrase: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Keyword,
    Grammar,
    Ngram,
    Allphone,
}

impl Default for AppSettings {
    fn default() -> Self {
        let mut captions = HashMap::new();
        captions.insert(
            "wakeup".into(),
            format!("To start demonstration say \"{DEFAULT_KEYPHRASE}\""),
        );
        captions.insert(
            "menu".into(),
            "Say one of: digits, forecast, phones".into(),
        );
        captions.insert("digits".into(), "Speak digits".into());
        captions.insert("forecast".into(), "Ask about the weather".into());
        captions.insert("phones".into(), "Say any phrase (phonetic decode)".into());

        let mut triggers = HashMap::new();
        triggers.insert(DEFAULT_KEYPHRASE.into(), "menu".into());
        triggers.insert("digits".into(), "digits".into());
        triggers.insert("forecast".into(), "forecast".into());
        triggers.insert("phones".into(), "phones".into());

        Self {
            acoustic_model: None,
            dictionary: None,
            raw_log_dir: None,
            keyphrase: DEFAULT_KEYPHRASE.into(),
            wake_search: "wakeup".into(),
            searches: vec![
                SearchSpec {
                    name: "wakeup".into(),
                    kind: SearchKind::Keyword,
                    path: None,
                    keyphrase: None,
                },
                SearchSpec {
                    name: "menu".into(),
                    kind: SearchKind::Grammar,
                    path: Some(bundled_asset("menu.gram")),
                    keyphrase: None,
                },
                SearchSpec {
                    name: "digits".into(),
                    kind: SearchKind::Grammar,
                    path: Some(bundled_asset("digits.gram")),
                    keyphrase: None,
                },
                SearchSpec {
                    name: "forecast".into(),
                    kind: SearchKind::Ngram,
                    path: Some(bundled_asset("weather.lm")),
                    keyphrase: None,
                },
                SearchSpec {
                    name: "phones".into(),
                    kind: SearchKind::Allphone,
                    path: Some(bundled_asset("en-phone.lm")),
                    keyphrase: None,
                },
            ],
            triggers,
            captions,
            listen_timeout_ms: 10_000,
            result_clear_delay_ms: 6_000,
        }
    }
}

impl AppSettings {
    /// Strictly load settings from an explicit path.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        let settings: AppSettings = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse settings from {}", path.display()))?;
        Ok(settings)
    }

    /// Check the host-side engine inputs before anything is constructed.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (label, path) in [
            ("acoustic model", &self.acoustic_model),
            ("dictionary", &self.dictionary),
        ] {
            if let Some(path) = path {
                if !path.exists() {
                    bail!("{label} not found at {}", path.display());
                }
            }
        }
        if let Some(dir) = &self.raw_log_dir {
            info!(dir = %dir.display(), "raw audio logging enabled");
        }
        Ok(())
    }

    /// Translate the settings into a core session setup.
    pub fn to_setup(&self) -> anyhow::Result<SessionSetup> {
        let mut setup = SessionSetup::new()
            .wake_search(self.wake_search.as_str())
            .listen_timeout(Duration::from_millis(self.listen_timeout_ms))
            .result_clear_delay(Duration::from_millis(self.result_clear_delay_ms));

        for spec in &self.searches {
            setup = match spec.kind {
                SearchKind::Keyword => {
                    let phrase = spec.keyphrase.as_deref().unwrap_or(&self.keyphrase);
                    setup.keyword_search(spec.name.as_str(), phrase)
                }
                SearchKind::Grammar | SearchKind::Ngram | SearchKind::Allphone => {
                    let Some(path) = &spec.path else {
                        bail!("search '{}' ({:?}) needs a path", spec.name, spec.kind);
                    };
                    match spec.kind {
                        SearchKind::Grammar => setup.grammar_search(spec.name.as_str(), path),
                        SearchKind::Ngram => setup.ngram_search(spec.name.as_str(), path),
                        _ => setup.allphone_search(spec.name.as_str(), path),
                    }
                }
            };
        }

        for (phrase, target) in &self.triggers {
            setup = setup.trigger(phrase.as_str(), target.as_str());
        }
        for (name, text) in &self.captions {
            setup = setup.caption(name.as_str(), text.as_str());
        }

        Ok(setup)
    }
}
