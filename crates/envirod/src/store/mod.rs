//! Read access to the partitioned time-series store.
//!
//! The table keys readings by (station_id, timestamp), with the timestamp
//! as a lexicographically ordered string. Every query the daemon answers
//! reduces to the three operations on [`StoreBackend`]; the production
//! backend talks to DynamoDB and the in-memory one serves tests and local
//! runs from the same key shape.

mod dynamo;
mod memory;

pub use dynamo::DynamoBackend;
pub use memory::MemoryBackend;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use enviro_common::Reading;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Continuation token for a station scan: the full key of the last item
/// the previous page evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCursor {
    pub station_id: String,
    pub timestamp: String,
}

/// One page of a station scan. A present `next` means the scan may have
/// more items; the final page can be empty.
#[derive(Debug, Default)]
pub struct StationPage {
    pub station_ids: Vec<String>,
    pub next: Option<ScanCursor>,
}

/// Read operations the query layer needs from the store.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// One page of station ids, resuming from `cursor` when given.
    ///
    /// Ids repeat across (and within) pages, once per stored reading;
    /// callers deduplicate.
    async fn scan_stations_page(
        &self,
        cursor: Option<ScanCursor>,
    ) -> Result<StationPage, StoreError>;

    /// Newest reading for one station, if it has any.
    async fn latest_reading(&self, station_id: &str) -> Result<Option<Reading>, StoreError>;

    /// Readings for one station with timestamps strictly after `cutoff`,
    /// oldest first.
    async fn readings_after(
        &self,
        station_id: &str,
        cutoff: &str,
    ) -> Result<Vec<Reading>, StoreError>;
}

/// Store handle shared by the API handlers.
#[derive(Clone)]
pub struct StoreClient {
    backend: Arc<dyn StoreBackend>,
}

impl StoreClient {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// Every station id in the store, deduplicated and sorted.
    ///
    /// Follows scan continuations until the backend stops handing them out.
    pub async fn station_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut stations = BTreeSet::new();
        let mut cursor = None;
        loop {
            let page = self.backend.scan_stations_page(cursor).await?;
            stations.extend(page.station_ids);
            cursor = page.next;
            if cursor.is_none() {
                break;
            }
        }
        Ok(stations.into_iter().collect())
    }

    pub async fn latest_reading(&self, station_id: &str) -> Result<Option<Reading>, StoreError> {
        self.backend.latest_reading(station_id).await
    }

    pub async fn readings_after(
        &self,
        station_id: &str,
        cutoff: &str,
    ) -> Result<Vec<Reading>, StoreError> {
        self.backend.readings_after(station_id, cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enviro_common::{Decimal, SensorValue};
    use std::collections::BTreeMap;

    fn reading(station_id: &str, timestamp: &str) -> Reading {
        let mut readings = BTreeMap::new();
        readings.insert(
            "temperature".to_string(),
            SensorValue {
                value: Decimal::parse("21.5").unwrap(),
                unit: "Celsius".to_string(),
            },
        );
        Reading {
            station_id: station_id.to_string(),
            timestamp: timestamp.to_string(),
            readings,
        }
    }

    #[tokio::test]
    async fn station_ids_follow_continuations_and_deduplicate() {
        // Two items per page; station-a spans pages, so the scan hands its
        // id out three times before deduplication.
        let backend = MemoryBackend::with_page_size(2);
        backend.insert(reading("station-a", "2024-03-10T10:00:00.000000")).await;
        backend.insert(reading("station-a", "2024-03-10T11:00:00.000000")).await;
        backend.insert(reading("station-a", "2024-03-10T12:00:00.000000")).await;
        backend.insert(reading("station-c", "2024-03-10T10:30:00.000000")).await;
        backend.insert(reading("station-b", "2024-03-10T10:15:00.000000")).await;

        let client = StoreClient::new(Arc::new(backend));
        let stations = client.station_ids().await.unwrap();
        assert_eq!(stations, ["station-a", "station-b", "station-c"]);
    }

    #[tokio::test]
    async fn station_ids_survive_an_empty_trailing_page() {
        // Four items and a page size of two: the second page is full, so a
        // continuation is handed out whose page turns out empty.
        let backend = MemoryBackend::with_page_size(2);
        backend.insert(reading("station-a", "2024-03-10T10:00:00.000000")).await;
        backend.insert(reading("station-a", "2024-03-10T11:00:00.000000")).await;
        backend.insert(reading("station-b", "2024-03-10T10:00:00.000000")).await;
        backend.insert(reading("station-b", "2024-03-10T11:00:00.000000")).await;

        let client = StoreClient::new(Arc::new(backend));
        let stations = client.station_ids().await.unwrap();
        assert_eq!(stations, ["station-a", "station-b"]);
    }

    #[tokio::test]
    async fn station_ids_fit_in_a_single_short_page() {
        let backend = MemoryBackend::with_page_size(100);
        backend.insert(reading("station-a", "2024-03-10T10:00:00.000000")).await;
        backend.insert(reading("station-b", "2024-03-10T10:00:00.000000")).await;

        let client = StoreClient::new(Arc::new(backend));
        let stations = client.station_ids().await.unwrap();
        assert_eq!(stations, ["station-a", "station-b"]);
    }

    #[tokio::test]
    async fn station_ids_of_an_empty_store_is_empty() {
        let client = StoreClient::new(Arc::new(MemoryBackend::new()));
        assert!(client.station_ids().await.unwrap().is_empty());
    }
}
