//! Simulated environmental station and its sensor suite.

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::model::{format_timestamp, Decimal, Reading, SensorValue};

/// One simulated sensor: what it measures, in which unit, over which range.
#[derive(Debug, Clone, Copy)]
pub struct SensorSpec {
    pub sensor_type: &'static str,
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
}

/// The standard station sensor suite.
pub const DEFAULT_SENSORS: [SensorSpec; 3] = [
    SensorSpec {
        sensor_type: "temperature",
        unit: "Celsius",
        min: -50.0,
        max: 50.0,
    },
    SensorSpec {
        sensor_type: "humidity",
        unit: "%",
        min: 0.0,
        max: 100.0,
    },
    SensorSpec {
        sensor_type: "co2",
        unit: "ppm",
        min: 300.0,
        max: 2000.0,
    },
];

/// A simulated environmental station.
///
/// Each instance gets a fresh random identity of the form
/// `station-<8 hex chars>` and samples every sensor in its suite per cycle.
#[derive(Debug, Clone)]
pub struct Station {
    station_id: String,
    sensors: &'static [SensorSpec],
}

impl Station {
    pub fn new() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self::with_id(format!("station-{}", &hex[..8]))
    }

    /// Build a station with a caller-chosen identity.
    pub fn with_id(station_id: String) -> Self {
        Self {
            station_id,
            sensors: &DEFAULT_SENSORS,
        }
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    /// Sample every sensor once, stamped with the current UTC time.
    pub fn generate_reading<R: Rng>(&self, rng: &mut R) -> Reading {
        self.generate_reading_at(rng, Utc::now())
    }

    /// Sample every sensor once, stamped with the given clock.
    ///
    /// Values are uniform over each sensor's range and rounded to two
    /// fractional digits before they leave the station.
    pub fn generate_reading_at<R: Rng>(&self, rng: &mut R, at: DateTime<Utc>) -> Reading {
        let mut readings = std::collections::BTreeMap::new();
        for spec in self.sensors {
            let value = rng.gen_range(spec.min..=spec.max);
            readings.insert(
                spec.sensor_type.to_string(),
                SensorValue {
                    value: Decimal::from_f64_rounded(value),
                    unit: spec.unit.to_string(),
                },
            );
        }
        Reading {
            station_id: self.station_id.clone(),
            timestamp: format_timestamp(at),
            readings,
        }
    }
}

impl Default for Station {
    fn default() -> Self {
        Self::new()
    }
}
