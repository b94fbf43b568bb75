//! Client for the book resolver's public and admin APIs.

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

pub type SdkError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub isbn_13: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Tier that produced the record: `local_file`, `fixture`, `durable_store` or `upstream`.
    pub provenance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub record: Book,
    /// `local` or `external:<provider>`.
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(default)]
    pub language: Option<String>,
    pub items: Vec<SearchHit>,
}

pub struct ResolverClient {
    client: Client,
    base_url: String,
    admin_url: Option<String>,
    admin_key: String,
}

impl ResolverClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_url: None,
            admin_key: String::new(),
        }
    }

    /// Enable the admin calls against `admin_url` with a Bearer key.
    pub fn with_admin(mut self, admin_url: &str, key: &str) -> Self {
        self.admin_url = Some(admin_url.trim_end_matches('/').to_string());
        self.admin_key = key.to_string();
        self
    }

    /// Resolve a book. `Ok(None)` means the resolver answered 404.
    pub async fn get_book(&self, id: &str) -> Result<Option<Book>, SdkError> {
        let resp = self.get(&format!("/books/{id}")).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(decode(resp).await?))
    }

    pub async fn search(
        &self,
        query: &str,
        lang: Option<&str>,
        limit: Option<usize>,
    ) -> Result<SearchResponse, SdkError> {
        let mut params = vec![("q", query.to_string())];
        if let Some(lang) = lang {
            params.push(("lang", lang.to_string()));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        let resp = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&params)
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn health(&self) -> Result<bool, SdkError> {
        Ok(self.get("/health").await?.status().is_success())
    }

    pub async fn breaker(&self) -> Result<serde_json::Value, SdkError> {
        let url = self.admin_endpoint("/admin/breaker")?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.admin_key)
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn reset_breaker(&self) -> Result<serde_json::Value, SdkError> {
        let url = self.admin_endpoint("/admin/breaker/reset")?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.admin_key)
            .send()
            .await?;
        decode(resp).await
    }

    /// Perform a raw GET against the public API.
    pub async fn get(&self, path: &str) -> Result<Response, reqwest::Error> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
    }

    fn admin_endpoint(&self, path: &str) -> Result<String, SdkError> {
        match &self.admin_url {
            Some(base) => Ok(format!("{base}{path}")),
            None => Err("admin API not configured".into()),
        }
    }
}

async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, SdkError> {
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        return Err(format!("resolver returned error status {}: {}", status, text).into());
    }
    Ok(serde_json::from_str(&text)?)
}
