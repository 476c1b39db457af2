//! Query operations over the readings store.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use enviro_common::{format_timestamp, HistoryEntry, Reading};

use crate::store::{StoreClient, StoreError};

/// Answers the three dashboard questions: which stations exist, what each
/// reported last, and how one sensor type moved across all stations.
#[derive(Clone)]
pub struct QueryService {
    store: StoreClient,
    history_window: Duration,
}

impl QueryService {
    pub fn new(store: StoreClient, history_window_hours: u64) -> Self {
        Self {
            store,
            history_window: Duration::hours(history_window_hours as i64),
        }
    }

    /// Every station that has ever reported, sorted.
    pub async fn list_stations(&self) -> Result<Vec<String>, StoreError> {
        self.store.station_ids().await
    }

    /// The newest reading for one station, if it has any.
    pub async fn latest_reading(&self, station_id: &str) -> Result<Option<Reading>, StoreError> {
        self.store.latest_reading(station_id).await
    }

    /// One sensor type across all stations, limited to the history window.
    pub async fn sensor_history(
        &self,
        sensor_type: &str,
    ) -> Result<BTreeMap<String, Vec<HistoryEntry>>, StoreError> {
        let cutoff = format_timestamp(Utc::now() - self.history_window);
        self.sensor_history_after(sensor_type, &cutoff).await
    }

    /// Clock-independent core of [`Self::sensor_history`].
    ///
    /// Walks every station, keeps readings strictly newer than `cutoff`
    /// that carry the requested sensor type, and leaves out stations with
    /// nothing to show.
    pub async fn sensor_history_after(
        &self,
        sensor_type: &str,
        cutoff: &str,
    ) -> Result<BTreeMap<String, Vec<HistoryEntry>>, StoreError> {
        let mut result = BTreeMap::new();
        for station_id in self.store.station_ids().await? {
            let readings = self.store.readings_after(&station_id, cutoff).await?;
            let entries: Vec<HistoryEntry> = readings
                .into_iter()
                .filter_map(|reading| {
                    let sensor = reading.readings.get(sensor_type)?;
                    Some(HistoryEntry {
                        timestamp: reading.timestamp.clone(),
                        value: sensor.value.clone(),
                        unit: sensor.unit.clone(),
                    })
                })
                .collect();
            if !entries.is_empty() {
                result.insert(station_id, entries);
            }
        }
        Ok(result)
    }
}
