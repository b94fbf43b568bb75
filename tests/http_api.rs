//! Public and admin HTTP API tests, driven through the Rust SDK.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use sdk_rust::ResolverClient;

mod common;

async fn volume_backend(hits: Arc<AtomicU32>) -> std::net::SocketAddr {
    common::start_programmable_backend(move |path| {
        let hits = hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            if path.starts_with("/books/v1/volumes/known1") {
                (200, common::volume_json("known1", "Known Book", "D. Author").to_string())
            } else if path.starts_with("/books/v1/volumes?") {
                let page = common::volumes_page(&[
                    common::volume_json("s1", "Rust in Action", "Tim McNamara"),
                    common::volume_json("s2", "Rust Atomics", "Mara Bos"),
                ]);
                (200, page)
            } else {
                (404, "{}".into())
            }
        }
    })
    .await
}

#[tokio::test]
async fn test_book_lookup_over_http() {
    let hits = Arc::new(AtomicU32::new(0));
    let upstream = volume_backend(hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let app = common::spawn_app(common::test_config(upstream, dir.path())).await;
    let client = ResolverClient::new(&app.url());

    assert!(client.health().await.unwrap());

    let book = client.get_book("known1").await.unwrap().unwrap();
    assert_eq!(book.title, "Known Book");
    assert_eq!(book.provenance, "upstream");

    let cached = client.get_book("known1").await.unwrap().unwrap();
    assert_eq!(cached.provenance, "local_file");

    assert!(client.get_book("nothere").await.unwrap().is_none());
}

#[tokio::test]
async fn test_error_statuses_and_request_id() {
    let hits = Arc::new(AtomicU32::new(0));
    let upstream = volume_backend(hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let app = common::spawn_app(common::test_config(upstream, dir.path())).await;
    let client = ResolverClient::new(&app.url());

    let resp = client.get("/books/bad%20id!").await.unwrap();
    assert_eq!(resp.status(), 400);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = client.get("/search?q=%20%20").await.unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_search_over_http() {
    let hits = Arc::new(AtomicU32::new(0));
    let upstream = volume_backend(hits.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let app = common::spawn_app(common::test_config(upstream, dir.path())).await;
    let client = ResolverClient::new(&app.url());

    let result = client.search("rust", Some("EN"), Some(5)).await.unwrap();
    assert_eq!(result.query, "rust");
    assert_eq!(result.language.as_deref(), Some("en"));
    let ids: Vec<&str> = result.items.iter().map(|h| h.record.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2"]);
    assert!(result.items.iter().all(|h| h.source == "external:books_api"));
}

#[tokio::test]
async fn test_admin_requires_bearer_key() {
    let hits = Arc::new(AtomicU32::new(0));
    let upstream = volume_backend(hits).await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(upstream, dir.path());
    config.admin.enabled = true;
    config.admin.api_key = "secret".to_string();
    let app = common::spawn_app(config).await;

    let wrong = ResolverClient::new(&app.url()).with_admin(&app.admin_url(), "nope");
    assert!(wrong.breaker().await.is_err());

    let admin = ResolverClient::new(&app.url()).with_admin(&app.admin_url(), "secret");
    let breaker = admin.breaker().await.unwrap();
    assert_eq!(breaker["name"], "volumes");
    assert_eq!(breaker["state"], "closed");

    let reset = admin.reset_breaker().await.unwrap();
    assert_eq!(reset["state"], "closed");

    let status: serde_json::Value = reqwest::Client::new()
        .get(format!("{}/admin/status", app.admin_url()))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(status["indexed_books"], 0);
}
