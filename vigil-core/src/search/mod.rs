//! Named search configurations and the registry that owns them.
//!
//! A "search" is one way of listening: keyword spotting for the wake
//! phrase, a JSGF grammar, an n-gram language model, or an all-phone
//! decode. Searches are registered once at setup and referenced by name
//! thereafter — name equality is the identity, which is what makes them
//! swappable at runtime.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, VigilError};

/// Opaque interned search name.
///
/// Cheap to clone and compare; keeps raw strings at the API boundary so a
/// typo'd name surfaces as [`VigilError::UnknownSearch`] in exactly one
/// place (registry lookup) instead of silently mismatching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SearchName(Arc<str>);

impl SearchName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SearchName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<&SearchName> for SearchName {
    fn from(name: &SearchName) -> Self {
        name.clone()
    }
}

/// One recognition configuration. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchConfig {
    /// Continuous keyword spotting for a single wake phrase.
    KeywordSpot { keyphrase: String },
    /// Finite grammar (JSGF) search.
    Grammar { path: PathBuf },
    /// Statistical n-gram language model search.
    NgramModel { path: PathBuf },
    /// Phonetic (all-phone) decode against a phoneme LM.
    AllPhone { path: PathBuf },
}

impl SearchConfig {
    /// The external asset file backing this search, if any.
    ///
    /// Keyword spotting is defined entirely by its phrase and has none.
    pub fn asset_path(&self) -> Option<&Path> {
        match self {
            SearchConfig::KeywordSpot { .. } => None,
            SearchConfig::Grammar { path }
            | SearchConfig::NgramModel { path }
            | SearchConfig::AllPhone { path } => Some(path),
        }
    }

    pub fn is_keyword_spot(&self) -> bool {
        matches!(self, SearchConfig::KeywordSpot { .. })
    }

    /// Short kind label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchConfig::KeywordSpot { .. } => "keyword",
            SearchConfig::Grammar { .. } => "grammar",
            SearchConfig::NgramModel { .. } => "ngram",
            SearchConfig::AllPhone { .. } => "allphone",
        }
    }
}

/// Mapping from name to [`SearchConfig`].
///
/// Built once at startup, read-only for the rest of the session. Pure
/// data container — engine configuration happens in the setup builder.
#[derive(Debug, Default)]
pub struct SearchRegistry {
    searches: HashMap<SearchName, SearchConfig>,
}

impl SearchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a search under a unique name.
    ///
    /// # Errors
    /// [`VigilError::DuplicateSearch`] if the name is already taken.
    pub fn register(&mut self, name: SearchName, config: SearchConfig) -> Result<()> {
        if self.searches.contains_key(&name) {
            return Err(VigilError::DuplicateSearch(name.to_string()));
        }
        self.searches.insert(name, config);
        Ok(())
    }

    /// Look up a registered search.
    ///
    /// # Errors
    /// [`VigilError::UnknownSearch`] if the name was never registered.
    pub fn lookup(&self, name: &SearchName) -> Result<&SearchConfig> {
        self.searches
            .get(name)
            .ok_or_else(|| VigilError::UnknownSearch(name.to_string()))
    }

    pub fn contains(&self, name: &SearchName) -> bool {
        self.searches.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.searches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.searches.is_empty()
    }

    /// Iterate over registered (name, config) pairs. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (&SearchName, &SearchConfig)> {
        self.searches.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rejects_duplicate_names() {
        let mut registry = SearchRegistry::new();
        registry
            .register(
                SearchName::new("wakeup"),
                SearchConfig::KeywordSpot {
                    keyphrase: "oh mighty computer".into(),
                },
            )
            .expect("first registration succeeds");

        let err = registry
            .register(
                SearchName::new("wakeup"),
                SearchConfig::Grammar {
                    path: PathBuf::from("menu.gram"),
                },
            )
            .expect_err("duplicate name must fail");
        assert!(matches!(err, VigilError::DuplicateSearch(name) if name == "wakeup"));
    }

    #[test]
    fn lookup_unknown_name_fails() {
        let registry = SearchRegistry::new();
        let err = registry
            .lookup(&SearchName::new("forecast"))
            .expect_err("unknown name must fail");
        assert!(matches!(err, VigilError::UnknownSearch(name) if name == "forecast"));
    }

    #[test]
    fn lookup_returns_registered_config() {
        let mut registry = SearchRegistry::new();
        let config = SearchConfig::NgramModel {
            path: PathBuf::from("weather.lm"),
        };
        registry
            .register(SearchName::new("forecast"), config.clone())
            .unwrap();

        let found = registry.lookup(&SearchName::new("forecast")).unwrap();
        assert_eq!(found, &config);
        assert_eq!(found.asset_path(), Some(Path::new("weather.lm")));
        assert!(!found.is_keyword_spot());
    }

    #[test]
    fn search_names_compare_by_content() {
        let a = SearchName::new("digits");
        let b: SearchName = "digits".into();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "digits");
    }
}
