//! In-memory token index.

use std::collections::HashMap;
use std::sync::RwLock;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::{IndexError, IndexHit, LocalIndex, MatchType};
use crate::model::Record;

#[derive(Debug, Clone)]
struct Document {
    title: String,
    title_tokens: Vec<String>,
    author_tokens: Vec<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryIndex {
    documents: RwLock<HashMap<String, Document>>,
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let index = Self::new();
        for record in records {
            index.insert(record);
        }
        index
    }

    pub fn insert(&self, record: &Record) {
        let doc = Document {
            title: tokenize(&record.title).join(" "),
            title_tokens: tokenize(&record.title),
            author_tokens: record.authors.iter().flat_map(|a| tokenize(a)).collect(),
        };
        if let Ok(mut docs) = self.documents.write() {
            docs.insert(record.id.clone(), doc);
        }
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn score(doc: &Document, query: &[String], phrase: &str) -> Option<(f32, MatchType)> {
        if doc.title == phrase {
            return Some((3.0, MatchType::ExactTitle));
        }

        let in_title = query.iter().filter(|t| doc.title_tokens.contains(t)).count();
        let in_author = query.iter().filter(|t| doc.author_tokens.contains(t)).count();
        let total = query.len() as f32;

        if in_title == query.len() {
            // Shorter titles rank higher for the same match.
            let tightness = total / doc.title_tokens.len().max(1) as f32;
            return Some((2.0 + tightness * 0.5, MatchType::Title));
        }
        if in_author == query.len() {
            return Some((2.0, MatchType::Author));
        }

        let matched = query
            .iter()
            .filter(|t| doc.title_tokens.contains(t) || doc.author_tokens.contains(t))
            .count();
        (matched > 0).then(|| (matched as f32 / total, MatchType::Partial))
    }
}

impl LocalIndex for InMemoryIndex {
    fn search<'a>(&'a self, query: &'a str, limit: usize) -> BoxFuture<'a, Result<Vec<IndexHit>, IndexError>> {
        async move {
            let tokens = tokenize(query);
            if tokens.is_empty() || limit == 0 {
                return Ok(Vec::new());
            }
            let phrase = tokens.join(" ");

            let docs = self
                .documents
                .read()
                .map_err(|_| IndexError::Unavailable("index lock poisoned".to_string()))?;

            let mut hits: Vec<IndexHit> = docs
                .iter()
                .filter_map(|(id, doc)| {
                    Self::score(doc, &tokens, &phrase).map(|(score, match_type)| IndexHit {
                        id: id.clone(),
                        score,
                        match_type,
                    })
                })
                .collect();

            hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
            hits.truncate(limit);
            Ok(hits)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TierKind;

    fn index() -> InMemoryIndex {
        let records = [
            Record::new("dune", "Dune", TierKind::LocalFile).with_authors(["Frank Herbert"]),
            Record::new("messiah", "Dune Messiah", TierKind::LocalFile)
                .with_authors(["Frank Herbert"]),
            Record::new("lhod", "The Left Hand of Darkness", TierKind::LocalFile)
                .with_authors(["Ursula K. Le Guin"]),
        ];
        InMemoryIndex::from_records(records.iter())
    }

    #[tokio::test]
    async fn test_exact_title_ranks_first() {
        let hits = index().search("dune", 10).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["dune", "messiah"]);
        assert_eq!(hits[0].match_type, MatchType::ExactTitle);
        assert_eq!(hits[1].match_type, MatchType::Title);
    }

    #[tokio::test]
    async fn test_author_match() {
        let hits = index().search("Le Guin", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "lhod");
        assert_eq!(hits[0].match_type, MatchType::Author);
    }

    #[tokio::test]
    async fn test_limit_and_empty_query() {
        let idx = index();
        assert_eq!(idx.search("frank herbert", 1).await.unwrap().len(), 1);
        assert!(idx.search("   ", 10).await.unwrap().is_empty());
        assert!(idx.search("solaris", 10).await.unwrap().is_empty());
    }
}
