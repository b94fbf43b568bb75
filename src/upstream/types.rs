//! Wire types for the volumes API and the secondary catalog.
//!
//! Both providers are decoded into [`Record`]; the original JSON is kept in
//! `Record::raw` so it can be replayed later as a fixture.

use serde::Deserialize;
use serde_json::Value;

use crate::model::{Record, TierKind};
use crate::upstream::error::UpstreamError;

/// Page of volumes returned by `/volumes?q=`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumesEnvelope {
    #[serde(default)]
    pub total_items: u64,
    /// Absent when the query matched nothing.
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    id: String,
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    publisher: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
    #[serde(default)]
    page_count: Option<u32>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    image_links: Option<ImageLinks>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageLinks {
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    small_thumbnail: Option<String>,
}

/// Decode a single volume payload.
pub fn record_from_volume(raw: Value, provenance: TierKind) -> Result<Record, UpstreamError> {
    let volume: Volume =
        serde_json::from_value(raw.clone()).map_err(|e| UpstreamError::Decode(e.to_string()))?;
    let info = volume.volume_info;

    let mut isbn_10 = None;
    let mut isbn_13 = None;
    for ident in info.industry_identifiers {
        match ident.kind.as_str() {
            "ISBN_10" => isbn_10 = Some(ident.identifier),
            "ISBN_13" => isbn_13 = Some(ident.identifier),
            _ => {}
        }
    }

    Ok(Record {
        id: volume.id,
        title: info.title.unwrap_or_default(),
        subtitle: info.subtitle,
        authors: info.authors,
        publisher: info.publisher,
        published_date: info.published_date,
        description: info.description,
        isbn_10,
        isbn_13,
        page_count: info.page_count,
        categories: info.categories,
        language: info.language,
        thumbnail: info
            .image_links
            .and_then(|links| links.thumbnail.or(links.small_thumbnail)),
        provenance,
        raw,
    })
}

/// Decode a search page, skipping items that do not parse.
pub fn records_from_envelope(envelope: VolumesEnvelope) -> Vec<Record> {
    envelope
        .items
        .into_iter()
        .filter_map(|item| match record_from_volume(item, TierKind::Upstream) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping undecodable volume");
                None
            }
        })
        .collect()
}

/// Open Library `search.json` response.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSearchResponse {
    #[serde(default, rename = "numFound")]
    pub num_found: u64,
    #[serde(default)]
    pub docs: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CatalogDoc {
    key: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    author_name: Vec<String>,
    #[serde(default)]
    publisher: Vec<String>,
    #[serde(default)]
    first_publish_year: Option<i32>,
    #[serde(default)]
    isbn: Vec<String>,
    #[serde(default)]
    number_of_pages_median: Option<u32>,
    #[serde(default)]
    subject: Vec<String>,
    #[serde(default)]
    language: Vec<String>,
    #[serde(default)]
    cover_i: Option<u64>,
}

/// Decode one catalog document. Ids become `ol-<work id>`.
pub fn record_from_catalog_doc(raw: Value) -> Result<Record, UpstreamError> {
    let doc: CatalogDoc =
        serde_json::from_value(raw.clone()).map_err(|e| UpstreamError::Decode(e.to_string()))?;

    let work_id = doc.key.rsplit('/').next().unwrap_or_default();
    if work_id.is_empty() {
        return Err(UpstreamError::Decode(format!("unusable key '{}'", doc.key)));
    }

    let isbn_13 = doc.isbn.iter().find(|i| i.len() == 13).cloned();
    let isbn_10 = doc.isbn.iter().find(|i| i.len() == 10).cloned();

    Ok(Record {
        id: format!("ol-{work_id}"),
        title: doc.title.unwrap_or_default(),
        subtitle: doc.subtitle,
        authors: doc.author_name,
        publisher: doc.publisher.into_iter().next(),
        published_date: doc.first_publish_year.map(|y| y.to_string()),
        description: None,
        isbn_10,
        isbn_13,
        page_count: doc.number_of_pages_median,
        categories: doc.subject.into_iter().take(5).collect(),
        language: doc.language.into_iter().next(),
        thumbnail: doc
            .cover_i
            .map(|id| format!("https://covers.openlibrary.org/b/id/{id}-M.jpg")),
        provenance: TierKind::Upstream,
        raw,
    })
}
