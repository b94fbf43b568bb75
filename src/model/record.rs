//! Book record and provenance types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Source that produced a record, ordered from cheapest to most authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    LocalFile,
    Fixture,
    DurableStore,
    Upstream,
}

impl TierKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TierKind::LocalFile => "local_file",
            TierKind::Fixture => "fixture",
            TierKind::DurableStore => "durable_store",
            TierKind::Upstream => "upstream",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Book metadata as served to callers.
///
/// `raw` keeps the provider payload the record was decoded from so it can be
/// re-serialized (fixture recording) without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn_10: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn_13: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub provenance: TierKind,
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Record {
    /// Minimal record, mostly useful for tests and index seeding.
    pub fn new(id: impl Into<String>, title: impl Into<String>, provenance: TierKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: None,
            authors: Vec::new(),
            publisher: None,
            published_date: None,
            description: None,
            isbn_10: None,
            isbn_13: None,
            page_count: None,
            categories: Vec::new(),
            language: None,
            thumbnail: None,
            provenance,
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Copy of this record attributed to another tier.
    pub fn with_provenance(&self, provenance: TierKind) -> Self {
        let mut copy = self.clone();
        copy.provenance = provenance;
        copy
    }

    /// Keys under which two records are considered the same book.
    pub fn identity_keys(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(format!("id:{}", self.id))
            .chain(self.isbn_13.iter().map(|isbn| format!("isbn13:{isbn}")))
    }
}

/// Reject ids that are empty or cannot be used as a file/blob name.
pub fn is_valid_book_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
