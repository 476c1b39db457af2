//! Station run loop: sample, publish, sleep.

use std::future::Future;
use std::time::Duration;

use enviro_common::Station;
use tracing::{info, warn};

use crate::publisher::MqttPublisher;

/// Drives one station: a reading every interval until shutdown.
pub struct StationRunner {
    station: Station,
    publisher: MqttPublisher,
    topic_base: String,
    interval: Duration,
    published: u64,
    failed: u64,
}

impl StationRunner {
    pub fn new(
        station: Station,
        publisher: MqttPublisher,
        topic_base: String,
        interval: Duration,
    ) -> Self {
        Self {
            station,
            publisher,
            topic_base,
            interval,
            published: 0,
            failed: 0,
        }
    }

    /// Sample and publish on a fixed cadence until `shutdown` resolves.
    ///
    /// A failed delivery is logged and counted; the loop keeps its cadence
    /// either way. The broker link is closed before returning.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "station {} publishing every {:?}",
            self.station.station_id(),
            self.interval
        );

        loop {
            let reading = self.station.generate_reading(&mut rand::thread_rng());
            let topic = format!("{}/{}", self.topic_base, reading.station_id);
            if let Ok(payload) = serde_json::to_string(&reading) {
                info!("publishing to {topic}: {payload}");
            }
            if self.publisher.publish(&topic, &reading).await {
                self.published += 1;
                info!("published reading to {topic}");
            } else {
                self.failed += 1;
                warn!("reading for {topic} was not delivered");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => break,
            }
        }

        self.publisher.disconnect().await;
        info!(
            "station {} stopped: {} published, {} failed",
            self.station.station_id(),
            self.published,
            self.failed
        );
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }
}
