//! DynamoDB-backed store access.
//!
//! Table layout: partition key `station_id` (S), sort key `timestamp` (S),
//! and a `readings` map attribute of `{value: N, unit: S}` per sensor type.
//! Numbers come back as decimal text and stay that way; see
//! [`enviro_common::Decimal`].

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use enviro_common::{Decimal, Reading, SensorValue};
use tracing::info;

use super::{ScanCursor, StationPage, StoreBackend, StoreError};

pub struct DynamoBackend {
    client: Client,
    table: String,
}

impl DynamoBackend {
    /// Connect using the ambient AWS credential chain.
    pub async fn connect(region: &str, table: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        info!("store client ready for table {table}");
        Self {
            client: Client::new(&config),
            table: table.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackend for DynamoBackend {
    async fn scan_stations_page(
        &self,
        cursor: Option<ScanCursor>,
    ) -> Result<StationPage, StoreError> {
        let mut request = self
            .client
            .scan()
            .table_name(&self.table)
            .projection_expression("station_id");
        if let Some(cursor) = cursor {
            request = request
                .exclusive_start_key("station_id", AttributeValue::S(cursor.station_id))
                .exclusive_start_key("timestamp", AttributeValue::S(cursor.timestamp));
        }
        let output = request
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let mut page = StationPage::default();
        for item in output.items() {
            if let Some(id) = string_attr(item, "station_id") {
                page.station_ids.push(id);
            }
        }
        page.next = output.last_evaluated_key().and_then(decode_cursor);
        Ok(page)
    }

    async fn latest_reading(&self, station_id: &str) -> Result<Option<Reading>, StoreError> {
        let output = self
            .client
            .query()
            .table_name(&self.table)
            .key_condition_expression("station_id = :station")
            .expression_attribute_values(":station", AttributeValue::S(station_id.to_string()))
            .scan_index_forward(false)
            .limit(1)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        output.items().first().map(decode_reading).transpose()
    }

    async fn readings_after(
        &self,
        station_id: &str,
        cutoff: &str,
    ) -> Result<Vec<Reading>, StoreError> {
        // "timestamp" is a reserved word in the expression language, hence
        // the #ts alias.
        let output = self
            .client
            .query()
            .table_name(&self.table)
            .key_condition_expression("station_id = :station AND #ts > :cutoff")
            .expression_attribute_names("#ts", "timestamp")
            .expression_attribute_values(":station", AttributeValue::S(station_id.to_string()))
            .expression_attribute_values(":cutoff", AttributeValue::S(cutoff.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        output.items().iter().map(decode_reading).collect()
    }
}

fn string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Option<String> {
    match item.get(name) {
        Some(AttributeValue::S(value)) => Some(value.clone()),
        _ => None,
    }
}

fn decode_cursor(key: &HashMap<String, AttributeValue>) -> Option<ScanCursor> {
    let station_id = string_attr(key, "station_id")?;
    let timestamp = string_attr(key, "timestamp")?;
    Some(ScanCursor {
        station_id,
        timestamp,
    })
}

fn decode_reading(item: &HashMap<String, AttributeValue>) -> Result<Reading, StoreError> {
    let station_id = string_attr(item, "station_id")
        .ok_or_else(|| StoreError::Malformed("item without station_id".to_string()))?;
    let timestamp = string_attr(item, "timestamp")
        .ok_or_else(|| StoreError::Malformed(format!("{station_id}: item without timestamp")))?;

    // An item can lack the readings map entirely; it decodes to an empty
    // map and drops out of any sensor filter downstream.
    let mut readings = BTreeMap::new();
    if let Some(AttributeValue::M(sensors)) = item.get("readings") {
        for (sensor_type, attr) in sensors {
            let AttributeValue::M(fields) = attr else {
                return Err(StoreError::Malformed(format!(
                    "{station_id}/{sensor_type}: reading is not a map"
                )));
            };
            let value = match fields.get("value") {
                Some(AttributeValue::N(text)) => Decimal::parse(text).map_err(|e| {
                    StoreError::Malformed(format!("{station_id}/{sensor_type}: {e}"))
                })?,
                _ => {
                    return Err(StoreError::Malformed(format!(
                        "{station_id}/{sensor_type}: missing numeric value"
                    )))
                }
            };
            let unit = string_attr(fields, "unit").ok_or_else(|| {
                StoreError::Malformed(format!("{station_id}/{sensor_type}: missing unit"))
            })?;
            readings.insert(sensor_type.clone(), SensorValue { value, unit });
        }
    }

    Ok(Reading {
        station_id,
        timestamp,
        readings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor_attr(value: &str, unit: &str) -> AttributeValue {
        let mut fields = HashMap::new();
        fields.insert("value".to_string(), AttributeValue::N(value.to_string()));
        fields.insert("unit".to_string(), AttributeValue::S(unit.to_string()));
        AttributeValue::M(fields)
    }

    fn item(station_id: &str, timestamp: &str) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert(
            "station_id".to_string(),
            AttributeValue::S(station_id.to_string()),
        );
        item.insert(
            "timestamp".to_string(),
            AttributeValue::S(timestamp.to_string()),
        );
        item
    }

    #[test]
    fn decodes_a_full_item() {
        let mut sensors = HashMap::new();
        sensors.insert("temperature".to_string(), sensor_attr("23.47", "Celsius"));
        sensors.insert("co2".to_string(), sensor_attr("682", "ppm"));
        let mut raw = item("station-ab12cd34", "2024-03-10T12:00:00.000000");
        raw.insert("readings".to_string(), AttributeValue::M(sensors));

        let reading = decode_reading(&raw).unwrap();
        assert_eq!(reading.station_id, "station-ab12cd34");
        assert_eq!(reading.timestamp, "2024-03-10T12:00:00.000000");
        assert_eq!(reading.readings["temperature"].value.as_str(), "23.47");
        assert_eq!(reading.readings["co2"].unit, "ppm");
    }

    #[test]
    fn item_without_readings_map_decodes_empty() {
        let raw = item("station-ab12cd34", "2024-03-10T12:00:00.000000");
        let reading = decode_reading(&raw).unwrap();
        assert!(reading.readings.is_empty());
    }

    #[test]
    fn item_without_key_attributes_is_malformed() {
        let mut raw = item("station-ab12cd34", "2024-03-10T12:00:00.000000");
        raw.remove("timestamp");
        assert!(matches!(
            decode_reading(&raw),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn garbage_sensor_value_is_malformed() {
        let mut sensors = HashMap::new();
        sensors.insert(
            "temperature".to_string(),
            sensor_attr("not-a-number", "Celsius"),
        );
        let mut raw = item("station-ab12cd34", "2024-03-10T12:00:00.000000");
        raw.insert("readings".to_string(), AttributeValue::M(sensors));
        assert!(matches!(
            decode_reading(&raw),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn cursor_needs_both_key_parts() {
        let full = item("station-ab12cd34", "2024-03-10T12:00:00.000000");
        assert!(decode_cursor(&full).is_some());

        let mut partial = full.clone();
        partial.remove("timestamp");
        assert!(decode_cursor(&partial).is_none());
    }
}
