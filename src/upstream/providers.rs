//! External search providers, in the order the coordinator tries them.
//!
//! ```text
//! books_api         keyed volumes search (breaker-gated)
//! books_api_public  anonymous volumes search, only if the keyed one failed
//! open_library      secondary catalog
//! ```

use std::fmt::Debug;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::model::Record;
use crate::upstream::catalog::CatalogClient;
use crate::upstream::client::{Auth, VolumeQuery, VolumesClient};
use crate::upstream::error::UpstreamError;

/// How the query text should be interpreted by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    General,
    /// Restrict matching to author names.
    Author,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderQuery {
    pub text: String,
    pub language: Option<String>,
    pub limit: usize,
    pub scope: QueryScope,
}

pub trait SearchProvider: Send + Sync + Debug {
    /// Name used in result provenance (`external:<name>`).
    fn name(&self) -> &str;

    /// Providers of the same family serve the same data; once one succeeds
    /// the rest of the family is skipped.
    fn family(&self) -> &str {
        self.name()
    }

    fn supports_author_scope(&self) -> bool {
        false
    }

    fn search<'a>(&'a self, query: &'a ProviderQuery) -> BoxFuture<'a, Result<Vec<Record>, UpstreamError>>;
}

/// Volumes API search, keyed or anonymous.
#[derive(Debug)]
pub struct VolumesSearchProvider {
    client: Arc<VolumesClient>,
    auth: Auth,
}

impl VolumesSearchProvider {
    pub fn keyed(client: Arc<VolumesClient>) -> Self {
        Self {
            client,
            auth: Auth::Keyed,
        }
    }

    pub fn anonymous(client: Arc<VolumesClient>) -> Self {
        Self {
            client,
            auth: Auth::Anonymous,
        }
    }
}

impl SearchProvider for VolumesSearchProvider {
    fn name(&self) -> &str {
        match self.auth {
            Auth::Keyed => "books_api",
            Auth::Anonymous => "books_api_public",
        }
    }

    fn family(&self) -> &str {
        "books_api"
    }

    fn supports_author_scope(&self) -> bool {
        true
    }

    fn search<'a>(&'a self, query: &'a ProviderQuery) -> BoxFuture<'a, Result<Vec<Record>, UpstreamError>> {
        async move {
            let q = match query.scope {
                QueryScope::General => query.text.clone(),
                QueryScope::Author => format!("inauthor:\"{}\"", query.text),
            };
            let request = VolumeQuery::new(q, query.limit as u32).language(query.language.as_deref());
            self.client.search_volumes(&request, self.auth).await
        }
        .boxed()
    }
}

/// Open Library catalog search.
#[derive(Debug)]
pub struct CatalogSearchProvider {
    client: Arc<CatalogClient>,
}

impl CatalogSearchProvider {
    pub fn new(client: Arc<CatalogClient>) -> Self {
        Self { client }
    }
}

impl SearchProvider for CatalogSearchProvider {
    fn name(&self) -> &str {
        "open_library"
    }

    fn search<'a>(&'a self, query: &'a ProviderQuery) -> BoxFuture<'a, Result<Vec<Record>, UpstreamError>> {
        self.client
            .search(&query.text, query.language.as_deref(), query.limit)
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;
    use crate::observability::default_monitor;
    use crate::resilience::{BackoffPolicy, BreakerSettings, CircuitBreaker};

    #[test]
    fn test_volumes_providers_share_family() {
        let breaker = Arc::new(CircuitBreaker::new("volumes", BreakerSettings::default()));
        let client = Arc::new(
            VolumesClient::new(
                &UpstreamConfig::default(),
                breaker,
                BackoffPolicy::immediate(1),
                default_monitor(),
            )
            .unwrap(),
        );
        let keyed = VolumesSearchProvider::keyed(client.clone());
        let anonymous = VolumesSearchProvider::anonymous(client);
        assert_eq!(keyed.name(), "books_api");
        assert_eq!(anonymous.name(), "books_api_public");
        assert_eq!(keyed.family(), anonymous.family());
        assert!(keyed.supports_author_scope());
    }
}
