//! Book lookups behind single-flight.

use std::sync::Arc;

use crate::model::{is_valid_book_id, Record};
use crate::pipeline::fetch::{FetchError, TieredFetchOrchestrator};
use crate::pipeline::single_flight::SingleFlight;

pub type BookOutcome = Result<Option<Record>, FetchError>;

pub struct BookService {
    orchestrator: Arc<TieredFetchOrchestrator>,
    flights: SingleFlight<String, BookOutcome>,
}

impl BookService {
    pub fn new(orchestrator: Arc<TieredFetchOrchestrator>) -> Self {
        Self {
            orchestrator,
            flights: SingleFlight::new("books"),
        }
    }

    pub fn orchestrator(&self) -> &Arc<TieredFetchOrchestrator> {
        &self.orchestrator
    }

    pub fn in_flight(&self) -> usize {
        self.flights.in_flight()
    }

    /// Fetch one book. Concurrent requests for the same id share one walk.
    pub async fn get(&self, id: &str) -> BookOutcome {
        if !is_valid_book_id(id) {
            return Err(FetchError::InvalidKey(id.to_string()));
        }
        let orchestrator = Arc::clone(&self.orchestrator);
        self.flights
            .resolve(id.to_string(), move |id| async move {
                orchestrator.fetch(&id).await
            })
            .await
    }
}
