//! End-to-end resolver behavior against a mock volumes API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use book_resolver::model::{Record, SearchSource, TierKind};
use book_resolver::observability::default_monitor;
use book_resolver::pipeline::{FetchError, Resolver};
use book_resolver::resilience::CircuitState;

mod common;

#[tokio::test]
async fn test_retry_on_transient_failure() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let upstream = common::start_programmable_backend(move |_path| {
        let h = h.clone();
        async move {
            let count = h.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                (503, "{}".into())
            } else {
                (200, common::volume_json("retry1", "Persistence", "A. Author").to_string())
            }
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(upstream, dir.path());
    let resolver = Resolver::build(&config, default_monitor()).await.unwrap();

    let record = resolver.get_book("retry1").await.unwrap().expect("resolved after retries");
    assert_eq!(record.title, "Persistence");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(resolver.breaker().state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let upstream = common::start_programmable_backend(move |_path| {
        let h = h.clone();
        async move {
            h.fetch_add(1, Ordering::SeqCst);
            (404, "{}".into())
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(upstream, dir.path());
    let resolver = Resolver::build(&config, default_monitor()).await.unwrap();

    assert!(resolver.get_book("missing1").await.unwrap().is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_breaker_trips_on_rate_limits_and_stops_upstream_traffic() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let upstream = common::start_programmable_backend(move |_path| {
        let h = h.clone();
        async move {
            h.fetch_add(1, Ordering::SeqCst);
            (429, "{}".into())
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(upstream, dir.path());
    let resolver = Resolver::build(&config, default_monitor()).await.unwrap();

    for id in ["rl1", "rl2", "rl3"] {
        assert!(resolver.get_book(id).await.unwrap().is_none());
    }
    assert_eq!(resolver.breaker().state(), CircuitState::Open);

    let before = hits.load(Ordering::SeqCst);
    assert!(resolver.get_book("rl4").await.unwrap().is_none());
    assert_eq!(hits.load(Ordering::SeqCst), before, "open breaker must short-circuit");
}

#[tokio::test]
async fn test_fail_closed_surfaces_upstream_outage() {
    let upstream = common::start_programmable_backend(|_path| async { (503, "{}".into()) }).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(upstream, dir.path());
    config.tiers.fail_closed = true;
    let resolver = Resolver::build(&config, default_monitor()).await.unwrap();

    let err = resolver.get_book("down1").await.unwrap_err();
    assert!(matches!(err, FetchError::UpstreamUnavailable(_)));
}

#[tokio::test]
async fn test_fail_closed_treats_rejected_key_as_absent() {
    let upstream = common::start_programmable_backend(|_path| async { (403, "{}".into()) }).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(upstream, dir.path());
    config.tiers.fail_closed = true;
    let resolver = Resolver::build(&config, default_monitor()).await.unwrap();

    assert!(resolver.get_book("forbidden1").await.unwrap().is_none());
    assert_eq!(resolver.breaker().state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_invalid_id_never_reaches_upstream() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let upstream = common::start_programmable_backend(move |_path| {
        let h = h.clone();
        async move {
            h.fetch_add(1, Ordering::SeqCst);
            (200, "{}".into())
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(upstream, dir.path());
    let resolver = Resolver::build(&config, default_monitor()).await.unwrap();

    let err = resolver.get_book("../etc/passwd").await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidKey(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upstream_hit_backfills_local_file_cache() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let upstream = common::start_programmable_backend(move |_path| {
        let h = h.clone();
        async move {
            h.fetch_add(1, Ordering::SeqCst);
            (200, common::volume_json("fill1", "Backfilled", "B. Writer").to_string())
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(upstream, dir.path());
    let resolver = Resolver::build(&config, default_monitor()).await.unwrap();

    let first = resolver.get_book("fill1").await.unwrap().unwrap();
    assert_eq!(first.provenance, TierKind::Upstream);
    assert!(dir.path().join("cache/books/fill1.json").exists());

    let second = resolver.get_book("fill1").await.unwrap().unwrap();
    assert_eq!(second.provenance, TierKind::LocalFile);
    assert_eq!(second.title, "Backfilled");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_lookups_share_one_upstream_call() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let upstream = common::start_programmable_backend(move |_path| {
        let h = h.clone();
        async move {
            h.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            (200, common::volume_json("shared1", "Shared", "C. Author").to_string())
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(upstream, dir.path());
    let resolver = Arc::new(Resolver::build(&config, default_monitor()).await.unwrap());

    let lookups = (0..12).map(|_| {
        let resolver = resolver.clone();
        async move { resolver.get_book("shared1").await }
    });
    let results = join_all(lookups).await;

    assert!(results
        .iter()
        .all(|r| matches!(r, Ok(Some(record)) if record.id == "shared1")));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_search_keeps_local_baseline_and_fills_shortfall() {
    let search_hits = Arc::new(AtomicU32::new(0));
    let h = search_hits.clone();
    let upstream = common::start_programmable_backend(move |path| {
        let h = h.clone();
        async move {
            if path.starts_with("/books/v1/volumes?") {
                h.fetch_add(1, Ordering::SeqCst);
                let page = common::volumes_page(&[
                    common::volume_json("local1", "Dune", "Frank Herbert"),
                    common::volume_json("ext2", "Dune Messiah", "Frank Herbert"),
                    common::volume_json("ext3", "Children of Dune", "Frank Herbert"),
                    common::volume_json("ext4", "God Emperor of Dune", "Frank Herbert"),
                ]);
                (200, page)
            } else {
                (404, "{}".into())
            }
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let books = dir.path().join("cache/books");
    std::fs::create_dir_all(&books).unwrap();
    let local = Record::new("local1", "Dune", TierKind::LocalFile).with_authors(["Frank Herbert"]);
    std::fs::write(books.join("local1.json"), serde_json::to_vec(&local).unwrap()).unwrap();

    let config = common::test_config(upstream, dir.path());
    let resolver = Resolver::build(&config, default_monitor()).await.unwrap();
    assert_eq!(resolver.indexed_books(), 1);

    let result = resolver.search("dune", None, Some(3)).await.unwrap();
    let ids: Vec<&str> = result.items.iter().map(|hit| hit.record.id.as_str()).collect();
    assert_eq!(ids, vec!["local1", "ext2", "ext3"]);
    assert_eq!(result.items[0].source, SearchSource::Local);
    assert_eq!(
        result.items[1].source,
        SearchSource::External("books_api".to_string())
    );
    assert_eq!(search_hits.load(Ordering::SeqCst), 1);

    // The augmentation is cached, so repeating the query stays local.
    let again = resolver.search("dune", None, Some(3)).await.unwrap();
    assert_eq!(again.items.len(), 3);
    assert_eq!(search_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_search_degrades_to_local_results_when_providers_fail() {
    let upstream = common::start_programmable_backend(|_path| async { (503, "{}".into()) }).await;

    let dir = tempfile::tempdir().unwrap();
    let books = dir.path().join("cache/books");
    std::fs::create_dir_all(&books).unwrap();
    let local = Record::new("only1", "Solaris", TierKind::LocalFile);
    std::fs::write(books.join("only1.json"), serde_json::to_vec(&local).unwrap()).unwrap();

    let config = common::test_config(upstream, dir.path());
    let resolver = Resolver::build(&config, default_monitor()).await.unwrap();

    let result = resolver.search("solaris", None, Some(5)).await.unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].record.id, "only1");
}
