//! Request classification.

use sw_core::{default_intercept, WorkerConfig};

/// Set of URL substrings whose requests are cached.
///
/// Matching is plain substring containment anywhere in the URL, so
/// `/api/model.json` also matches `/old/api/model.json.bak`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptSet {
    patterns: Vec<String>,
}

impl Default for InterceptSet {
    fn default() -> Self {
        Self::new(default_intercept())
    }
}

impl InterceptSet {
    /// Create a set from substrings. Empty substrings are dropped.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Build the set configured for a deployment.
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.intercept.iter().cloned())
    }

    /// Whether requests to `url` go through the cache.
    pub fn is_cacheable(&self, url: &str) -> bool {
        self.matching(url).is_some()
    }

    /// The first pattern contained in `url`.
    pub fn matching(&self, url: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| url.contains(p.as_str()))
            .map(String::as_str)
    }

    /// Configured patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}
