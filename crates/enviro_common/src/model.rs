//! Wire and storage model for environmental readings.
//!
//! A reading is one measurement cycle from one station: every sensor sampled
//! once, stamped with a single UTC timestamp. The same shape travels over
//! MQTT and comes back out of the store, so it lives here rather than in
//! either binary.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Timestamp layout used everywhere a reading is stamped or compared.
///
/// Fixed width (microseconds always printed) so that lexicographic order on
/// the stored strings is chronological order. Range queries against the
/// store rely on this.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid decimal value: {0}")]
    InvalidDecimal(String),
}

/// Sensor value carried as decimal text.
///
/// The store keeps numbers as decimal strings and we keep that text verbatim
/// end to end; conversion to binary float happens only at the JSON boundary.
/// Values we generate ourselves are rounded to two fractional digits first.
#[derive(Debug, Clone, PartialEq)]
pub struct Decimal(String);

impl Decimal {
    /// Round to two fractional digits and capture the result as text.
    pub fn from_f64_rounded(value: f64) -> Self {
        let rounded = (value * 100.0).round() / 100.0;
        Decimal(rounded.to_string())
    }

    /// Accept decimal text from the store, keeping it verbatim.
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Decimal(text.to_string())),
            _ => Err(ModelError::InvalidDecimal(text.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_f64(&self) -> f64 {
        // Construction guarantees the text parses as a finite f64.
        self.0.parse().unwrap_or_default()
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(serde::de::Error::custom("non-finite sensor value"));
        }
        Ok(Decimal(value.to_string()))
    }
}

/// One sampled sensor: the measured value plus its unit label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorValue {
    pub value: Decimal,
    pub unit: String,
}

/// One measurement cycle from one station.
///
/// `readings` maps sensor type (e.g. "temperature") to its sampled value.
/// Serialized as-is onto the MQTT payload and decoded as-is out of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub station_id: String,
    pub timestamp: String,
    pub readings: BTreeMap<String, SensorValue>,
}

/// One point in a sensor history response: when, what, and in which unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub value: Decimal,
    pub unit: String,
}

/// Render a UTC instant in the canonical fixed-width layout.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current UTC time in the canonical layout.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}
