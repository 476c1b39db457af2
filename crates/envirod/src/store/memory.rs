//! In-memory store backend for tests and local runs.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use enviro_common::Reading;
use tokio::sync::RwLock;

use super::{ScanCursor, StationPage, StoreBackend, StoreError};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Readings held in a map sorted by (station_id, timestamp), the same key
/// shape as the real table. Scans page through items and hand out a
/// continuation after every full page, including the one that drains the
/// map exactly.
pub struct MemoryBackend {
    items: RwLock<BTreeMap<(String, String), Reading>>,
    page_size: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Small pages make continuation handling visible in tests.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    pub async fn insert(&self, reading: Reading) {
        let key = (reading.station_id.clone(), reading.timestamp.clone());
        self.items.write().await.insert(key, reading);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn scan_stations_page(
        &self,
        cursor: Option<ScanCursor>,
    ) -> Result<StationPage, StoreError> {
        let items = self.items.read().await;
        let start = match cursor {
            Some(c) => Bound::Excluded((c.station_id, c.timestamp)),
            None => Bound::Unbounded,
        };

        let mut page = StationPage::default();
        let mut last_key = None;
        for ((station_id, timestamp), _) in items.range((start, Bound::Unbounded)) {
            page.station_ids.push(station_id.clone());
            last_key = Some((station_id.clone(), timestamp.clone()));
            if page.station_ids.len() == self.page_size {
                break;
            }
        }
        if page.station_ids.len() == self.page_size {
            page.next = last_key.map(|(station_id, timestamp)| ScanCursor {
                station_id,
                timestamp,
            });
        }
        Ok(page)
    }

    async fn latest_reading(&self, station_id: &str) -> Result<Option<Reading>, StoreError> {
        let items = self.items.read().await;
        let from = Bound::Included((station_id.to_string(), String::new()));
        let latest = items
            .range((from, Bound::Unbounded))
            .take_while(|((sid, _), _)| sid.as_str() == station_id)
            .last()
            .map(|(_, reading)| reading.clone());
        Ok(latest)
    }

    async fn readings_after(
        &self,
        station_id: &str,
        cutoff: &str,
    ) -> Result<Vec<Reading>, StoreError> {
        let items = self.items.read().await;
        let from = Bound::Excluded((station_id.to_string(), cutoff.to_string()));
        let readings = items
            .range((from, Bound::Unbounded))
            .take_while(|((sid, _), _)| sid.as_str() == station_id)
            .map(|(_, reading)| reading.clone())
            .collect();
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enviro_common::{Decimal, SensorValue};

    fn reading(station_id: &str, timestamp: &str, temperature: &str) -> Reading {
        let mut readings = BTreeMap::new();
        readings.insert(
            "temperature".to_string(),
            SensorValue {
                value: Decimal::parse(temperature).unwrap(),
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
    async fn latest_is_the_newest_timestamp() {
        let backend = MemoryBackend::new();
        backend.insert(reading("station-a", "2024-03-10T10:00:00.000000", "20.0")).await;
        backend.insert(reading("station-a", "2024-03-10T12:00:00.000000", "22.0")).await;
        backend.insert(reading("station-a", "2024-03-10T11:00:00.000000", "21.0")).await;
        backend.insert(reading("station-b", "2024-03-10T13:00:00.000000", "30.0")).await;

        let latest = backend.latest_reading("station-a").await.unwrap().unwrap();
        assert_eq!(latest.timestamp, "2024-03-10T12:00:00.000000");
        assert_eq!(latest.readings["temperature"].value.as_str(), "22.0");
    }

    #[tokio::test]
    async fn latest_of_unknown_station_is_none() {
        let backend = MemoryBackend::new();
        backend.insert(reading("station-a", "2024-03-10T10:00:00.000000", "20.0")).await;
        assert!(backend.latest_reading("station-z").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn readings_after_is_strictly_exclusive_and_per_station() {
        let backend = MemoryBackend::new();
        backend.insert(reading("station-a", "2024-03-10T10:00:00.000000", "20.0")).await;
        backend.insert(reading("station-a", "2024-03-10T11:00:00.000000", "21.0")).await;
        backend.insert(reading("station-a", "2024-03-10T12:00:00.000000", "22.0")).await;
        backend.insert(reading("station-b", "2024-03-10T12:30:00.000000", "30.0")).await;

        let rows = backend
            .readings_after("station-a", "2024-03-10T11:00:00.000000")
            .await
            .unwrap();
        let timestamps: Vec<&str> = rows.iter().map(|r| r.timestamp.as_str()).collect();
        // The cutoff row itself is excluded and station-b never bleeds in.
        assert_eq!(timestamps, ["2024-03-10T12:00:00.000000"]);
    }

    #[tokio::test]
    async fn scan_pages_in_key_order() {
        let backend = MemoryBackend::with_page_size(2);
        backend.insert(reading("station-a", "2024-03-10T10:00:00.000000", "20.0")).await;
        backend.insert(reading("station-b", "2024-03-10T10:00:00.000000", "21.0")).await;
        backend.insert(reading("station-c", "2024-03-10T10:00:00.000000", "22.0")).await;

        let first = backend.scan_stations_page(None).await.unwrap();
        assert_eq!(first.station_ids, ["station-a", "station-b"]);
        let cursor = first.next.expect("full page carries a continuation");

        let second = backend.scan_stations_page(Some(cursor)).await.unwrap();
        assert_eq!(second.station_ids, ["station-c"]);
        assert!(second.next.is_none());
    }
}
