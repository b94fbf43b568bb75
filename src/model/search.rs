//! Search result types and query keys.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::record::Record;

/// Where a search hit came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SearchSource {
    Local,
    External(String),
}

impl fmt::Display for SearchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchSource::Local => f.write_str("local"),
            SearchSource::External(provider) => write!(f, "external:{provider}"),
        }
    }
}

impl Serialize for SearchSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SearchSource {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.split_once(':') {
            None if raw == "local" => Ok(SearchSource::Local),
            Some(("external", provider)) if !provider.is_empty() => {
                Ok(SearchSource::External(provider.to_string()))
            }
            _ => Err(serde::de::Error::custom(format!(
                "invalid search source '{raw}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub record: Record,
    pub source: SearchSource,
}

impl SearchHit {
    pub fn local(record: Record) -> Self {
        Self {
            record,
            source: SearchSource::Local,
        }
    }

    pub fn external(record: Record, provider: &str) -> Self {
        Self {
            record,
            source: SearchSource::External(provider.to_string()),
        }
    }
}

/// Response of a tiered search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub items: Vec<SearchHit>,
}

/// Externally sourced results as persisted by the search cache tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSearch {
    pub query: String,
    #[serde(default)]
    pub language: Option<String>,
    pub items: Vec<SearchHit>,
    /// Providers had nothing more to give when this entry was recorded.
    #[serde(default)]
    pub exhausted: bool,
    #[serde(default)]
    pub cached_at_ms: u64,
}

impl CachedSearch {
    /// Items whose identity is not in `exclude`.
    pub fn fresh_count(&self, exclude: &HashSet<String>) -> usize {
        self.items
            .iter()
            .filter(|hit| !hit.record.identity_keys().any(|k| exclude.contains(&k)))
            .count()
    }

    /// Whether this entry can answer a request for `want` new items.
    pub fn satisfies(&self, want: usize, exclude: &HashSet<String>) -> bool {
        self.exhausted || self.fresh_count(exclude) >= want
    }
}

/// Key for the external augmentation lookup.
///
/// Only `normalized` and `language` identify the cache entry; `want` and
/// `exclude` describe what this particular request needs from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchKey {
    pub query: String,
    pub normalized: String,
    pub language: Option<String>,
    pub want: usize,
    pub exclude: HashSet<String>,
}

impl SearchKey {
    pub fn new(query: &str, language: Option<&str>, want: usize) -> Self {
        Self {
            query: query.trim().to_string(),
            normalized: normalize_query(query),
            language: language.map(|l| l.trim().to_ascii_lowercase()).filter(|l| !l.is_empty()),
            want,
            exclude: HashSet::new(),
        }
    }

    pub fn excluding(mut self, exclude: HashSet<String>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn language_tag(&self) -> &str {
        self.language.as_deref().unwrap_or("any")
    }

    /// Relative storage path, e.g. `searches/frank_herbert-en.json`.
    pub fn storage_path(&self) -> String {
        format!("searches/{}-{}.json", self.normalized, self.language_tag())
    }
}

/// Lowercase, collapse whitespace, and keep only filename-safe characters.
pub fn normalize_query(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for word in query.split_whitespace() {
        if !out.is_empty() {
            out.push('_');
        }
        for c in word.chars().flat_map(char::to_lowercase) {
            if c.is_alphanumeric() {
                out.push(c);
            } else if !out.ends_with('_') {
                out.push('_');
            }
        }
    }
    let trimmed = out.trim_matches('_');
    trimmed.chars().take(96).collect()
}
