//! Enviro configuration.
//!
//! One TOML file shared by the station binary (envirostation) and the query
//! daemon (envirod). Every key has a default, so a missing file or a partial
//! file both work; a file that fails to parse is an error.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// MQTT broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    /// Broker hostname (the account's ATS endpoint when pointed at AWS IoT).
    #[serde(default = "default_broker_endpoint")]
    pub endpoint: String,

    /// TLS listener port.
    #[serde(default = "default_broker_port")]
    pub port: u16,

    /// Topic prefix; a station publishes to `<topic_base>/<station_id>`.
    #[serde(default = "default_topic_base")]
    pub topic_base: String,

    /// How long to wait for the broker handshake before giving up.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_broker_endpoint() -> String {
    "your-iot-endpoint.iot.region.amazonaws.com".to_string()
}

fn default_broker_port() -> u16 {
    8883
}

fn default_topic_base() -> String {
    "sensors".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            endpoint: default_broker_endpoint(),
            port: default_broker_port(),
            topic_base: default_topic_base(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Paths to the mutual-TLS credentials presented to the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsSettings {
    #[serde(default = "default_root_ca")]
    pub root_ca: PathBuf,

    #[serde(default = "default_client_cert")]
    pub client_cert: PathBuf,

    #[serde(default = "default_private_key")]
    pub private_key: PathBuf,
}

fn default_root_ca() -> PathBuf {
    PathBuf::from("certificates/AmazonRootCA1.pem")
}

fn default_client_cert() -> PathBuf {
    PathBuf::from("certificates/certificate.pem.crt")
}

fn default_private_key() -> PathBuf {
    PathBuf::from("certificates/private.pem.key")
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            root_ca: default_root_ca(),
            client_cert: default_client_cert(),
            private_key: default_private_key(),
        }
    }
}

/// Station behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationSettings {
    /// Seconds between measurement cycles.
    #[serde(default = "default_publish_interval")]
    pub publish_interval_secs: u64,
}

fn default_publish_interval() -> u64 {
    30
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            publish_interval_secs: default_publish_interval(),
        }
    }
}

/// Time-series store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Table holding readings, keyed by (station_id, timestamp).
    #[serde(default = "default_store_table")]
    pub table: String,

    #[serde(default = "default_store_region")]
    pub region: String,
}

fn default_store_table() -> String {
    "EnvironmentalData".to_string()
}

fn default_store_region() -> String {
    "us-east-1".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            table: default_store_table(),
            region: default_store_region(),
        }
    }
}

/// Query API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Address the HTTP server binds.
    #[serde(default = "default_api_listen")]
    pub listen: String,

    /// How far back the sensor history endpoint looks.
    #[serde(default = "default_history_window_hours")]
    pub history_window_hours: u64,
}

fn default_api_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_history_window_hours() -> u64 {
    5
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            listen: default_api_listen(),
            history_window_hours: default_history_window_hours(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Complete Enviro configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnviroConfig {
    #[serde(default)]
    pub broker: BrokerSettings,

    #[serde(default)]
    pub tls: TlsSettings,

    #[serde(default)]
    pub station: StationSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub log: LogSettings,
}

impl EnviroConfig {
    /// Load configuration from `path`.
    ///
    /// A missing file yields the defaults; an unreadable or unparsable file
    /// is an error, so a typo'd config never silently falls back.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployment_template() {
        let config = EnviroConfig::default();
        assert_eq!(config.broker.port, 8883);
        assert_eq!(config.broker.topic_base, "sensors");
        assert_eq!(config.broker.connect_timeout_secs, 5);
        assert_eq!(config.station.publish_interval_secs, 30);
        assert_eq!(config.store.table, "EnvironmentalData");
        assert_eq!(config.api.history_window_hours, 5);
        assert_eq!(
            config.tls.root_ca,
            PathBuf::from("certificates/AmazonRootCA1.pem")
        );
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let config: EnviroConfig = toml::from_str(
            r#"
            [broker]
            endpoint = "abc123-ats.iot.eu-west-1.amazonaws.com"

            [station]
            publish_interval_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.broker.endpoint, "abc123-ats.iot.eu-west-1.amazonaws.com");
        assert_eq!(config.broker.port, 8883);
        assert_eq!(config.station.publish_interval_secs, 5);
        assert_eq!(config.store.table, "EnvironmentalData");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EnviroConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.broker.port, 8883);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[broker\nport = oops").unwrap();
        let err = EnviroConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn config_serializes_with_all_sections() {
        let toml_str = toml::to_string_pretty(&EnviroConfig::default()).unwrap();
        assert!(toml_str.contains("[broker]"));
        assert!(toml_str.contains("[tls]"));
        assert!(toml_str.contains("[station]"));
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[log]"));
    }
}
