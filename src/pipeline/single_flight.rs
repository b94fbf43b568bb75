//! Single-flight deduplication of concurrent loads.
//!
//! # Responsibilities
//! - At most one in-flight load per key
//! - Late arrivals await the in-flight load instead of starting their own
//! - The entry disappears as soon as the load finishes (success or failure)
//!
//! # Design Decisions
//! - The map holds only a weak handle to the shared future. Callers own it;
//!   when every caller has gone away the load is dropped and cancelled
//! - Each entry carries a generation id so a finishing load never removes a
//!   newer entry for the same key
//! - Nothing is cached here: a request after completion starts a new load

use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, Shared, WeakShared};
use futures_util::FutureExt;

use crate::observability::metrics;

type SharedLoad<V> = Shared<BoxFuture<'static, V>>;

struct InFlight<V> {
    generation: u64,
    load: WeakShared<BoxFuture<'static, V>>,
}

/// Removes the map entry when the load completes or is dropped.
struct Completion<K: Eq + Hash, V> {
    map: Arc<DashMap<K, InFlight<V>>>,
    key: K,
    generation: u64,
}

impl<K: Eq + Hash, V> Drop for Completion<K, V> {
    fn drop(&mut self) {
        self.map
            .remove_if(&self.key, |_, entry| entry.generation == self.generation);
    }
}

pub struct SingleFlight<K, V> {
    name: &'static str,
    in_flight: Arc<DashMap<K, InFlight<V>>>,
    generation: AtomicU64,
}

impl<K: Eq + Hash, V> std::fmt::Debug for SingleFlight<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("name", &self.name)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            in_flight: Arc::new(DashMap::new()),
            generation: AtomicU64::new(1),
        }
    }

    /// Number of loads currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Resolve `key`, joining an in-flight load if one exists.
    ///
    /// `loader` runs only when this call starts a new load.
    pub async fn resolve<F, Fut>(&self, key: K, loader: F) -> V
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        // The entry lock is released before awaiting.
        let load = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(mut occupied) => match occupied.get().load.upgrade() {
                Some(existing) => {
                    metrics::record_singleflight_shared(self.name);
                    existing
                }
                None => {
                    // Every previous waiter left; start over.
                    let (entry, load) = self.start(key, loader);
                    if let Some(entry) = entry {
                        occupied.insert(entry);
                    } else {
                        occupied.remove();
                    }
                    load
                }
            },
            Entry::Vacant(vacant) => {
                let (entry, load) = self.start(key, loader);
                if let Some(entry) = entry {
                    vacant.insert(entry);
                }
                load
            }
        };

        load.await
    }

    fn start<F, Fut>(&self, key: K, loader: F) -> (Option<InFlight<V>>, SharedLoad<V>)
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let completion = Completion {
            map: Arc::clone(&self.in_flight),
            key: key.clone(),
            generation,
        };
        let fut = loader(key);

        let load = async move {
            let value = fut.await;
            drop(completion);
            value
        }
        .boxed()
        .shared();

        // `downgrade` only fails once the future has completed; it has not been polled yet.
        let entry = load.downgrade().map(|weak| InFlight {
            generation,
            load: weak,
        });
        (entry, load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_load() {
        let flights: Arc<SingleFlight<String, u64>> = Arc::new(SingleFlight::new("test"));
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let flights = flights.clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                flights
                    .resolve("dune".to_string(), move |_| async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        42
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_not_cached() {
        let flights: SingleFlight<&'static str, Result<u32, String>> = SingleFlight::new("test");
        let loads = AtomicUsize::new(0);
        let counter = &loads;

        let first = flights
            .resolve("k", |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("boom".to_string()) }
            })
            .await;
        assert_eq!(first, Err("boom".to_string()));
        assert_eq!(flights.in_flight(), 0);

        let second = flights
            .resolve("k", |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            })
            .await;
        assert_eq!(second, Ok(7));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_share() {
        let flights: SingleFlight<u32, u32> = SingleFlight::new("test");
        let (a, b) = tokio::join!(
            flights.resolve(1, |k| async move { k * 10 }),
            flights.resolve(2, |k| async move { k * 10 }),
        );
        assert_eq!((a, b), (10, 20));
    }

    #[tokio::test]
    async fn test_abandoned_load_is_cancelled() {
        let flights: Arc<SingleFlight<u32, u32>> = Arc::new(SingleFlight::new("test"));

        let pending = {
            let flights = flights.clone();
            tokio::spawn(async move {
                flights
                    .resolve(1, |_| async {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        0
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(flights.in_flight(), 1);

        pending.abort();
        let _ = pending.await;
        assert_eq!(flights.in_flight(), 0);

        let fresh = flights.resolve(1, |_| async { 5 }).await;
        assert_eq!(fresh, 5);
    }
}
