//! Secondary catalog (Open Library) search client.

use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

use crate::model::Record;
use crate::observability::SharedMonitor;
use crate::upstream::error::UpstreamError;
use crate::upstream::types::{record_from_catalog_doc, CatalogSearchResponse};

const ENDPOINT: &str = "catalog.search";

#[derive(Debug)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: Url,
    monitor: SharedMonitor,
}

impl CatalogClient {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        monitor: SharedMonitor,
    ) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| UpstreamError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(UpstreamError::InvalidUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("book-resolver/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(UpstreamError::from_reqwest)?;
        Ok(Self {
            http,
            base_url,
            monitor,
        })
    }

    /// `GET /search.json?q=&limit=&lang=`
    pub async fn search(
        &self,
        q: &str,
        language: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Record>, UpstreamError> {
        let url = self.search_url(q, language, limit)?;
        let result = self.fetch(url).await;
        match &result {
            Ok(_) => self.monitor.record_success(ENDPOINT),
            Err(e) => self.monitor.record_failure(ENDPOINT, e.reason()),
        }
        result
    }

    fn search_url(&self, q: &str, language: Option<&str>, limit: usize) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("search.json");
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", q)
                .append_pair("limit", &limit.max(1).to_string());
            if let Some(lang) = language {
                pairs.append_pair("lang", lang);
            }
        }
        Ok(url)
    }

    async fn fetch(&self, url: Url) -> Result<Vec<Record>, UpstreamError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(UpstreamError::from_status(status));
        }

        let body: CatalogSearchResponse = response
            .json()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        Ok(body
            .docs
            .into_iter()
            .filter_map(|doc| match record_from_catalog_doc(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping undecodable catalog document");
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::default_monitor;

    #[test]
    fn test_search_url() {
        let client = CatalogClient::new(
            "https://openlibrary.org/",
            Duration::from_secs(1),
            default_monitor(),
        )
        .unwrap();
        let url = client.search_url("frank herbert", Some("eng"), 5).unwrap();
        assert_eq!(
            url.as_str(),
            "https://openlibrary.org/search.json?q=frank+herbert&limit=5&lang=eng"
        );
    }
}
