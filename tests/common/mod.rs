//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use book_resolver::config::{DurableBackend, ResolverConfig};
use book_resolver::lifecycle::{Application, Listeners};
use book_resolver::observability::default_monitor;

/// Start a programmable mock upstream on an ephemeral port.
///
/// `f` receives the request target (path and query) and returns the status
/// code and body to send back.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(socket);
                        let mut request_line = String::new();
                        if reader.read_line(&mut request_line).await.is_err() {
                            return;
                        }
                        // Drain headers up to the blank line.
                        loop {
                            let mut line = String::new();
                            match reader.read_line(&mut line).await {
                                Ok(0) => break,
                                Ok(_) if line == "\r\n" || line == "\n" => break,
                                Ok(_) => {}
                                Err(_) => return,
                            }
                        }
                        let target = request_line
                            .split_whitespace()
                            .nth(1)
                            .unwrap_or("/")
                            .to_string();

                        let (status, body) = f(target).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            403 => "403 Forbidden",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let mut socket = reader.into_inner();
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A volumes API payload for one book.
pub fn volume_json(id: &str, title: &str, author: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "volumeInfo": {
            "title": title,
            "authors": [author],
            "language": "en",
        }
    })
}

/// A volumes search page.
pub fn volumes_page(items: &[serde_json::Value]) -> String {
    serde_json::json!({
        "totalItems": items.len(),
        "items": items,
    })
    .to_string()
}

/// A config pointing at `upstream`, with short retry delays and every
/// on-disk tier rooted under `dir`.
pub fn test_config(upstream: SocketAddr, dir: &Path) -> ResolverConfig {
    let mut config = ResolverConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.base_url = format!("http://{upstream}/books/v1");
    config.upstream.api_key = "test-key".to_string();
    config.upstream.request_timeout_ms = 2_000;
    config.retries.max_attempts = 3;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 20;
    config.tiers.cache_dir = dir.join("cache");
    config.tiers.durable_backend = DurableBackend::Memory;
    config.search.secondary_enabled = false;
    config.search.provider_timeout_ms = 2_000;
    config.observability.metrics_enabled = false;
    config.admin.bind_address = "127.0.0.1:0".to_string();
    config
}

/// A running resolver service.
pub struct TestApp {
    pub addr: SocketAddr,
    pub admin_addr: Option<SocketAddr>,
    stop: Option<oneshot::Sender<()>>,
}

impl TestApp {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn admin_url(&self) -> String {
        format!("http://{}", self.admin_addr.unwrap())
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

/// Build and serve the application on ephemeral ports.
pub async fn spawn_app(config: ResolverConfig) -> TestApp {
    let listeners = Listeners::bind(&config).await.unwrap();
    let addr = listeners.public.local_addr().unwrap();
    let admin_addr = listeners.admin.as_ref().map(|l| l.local_addr().unwrap());

    let app = Application::build(config, default_monitor()).await.unwrap();
    let (stop, stopped) = oneshot::channel();
    tokio::spawn(async move {
        let _ = app
            .run_until(listeners, async {
                let _ = stopped.await;
            })
            .await;
    });

    TestApp {
        addr,
        admin_addr,
        stop: Some(stop),
    }
}
