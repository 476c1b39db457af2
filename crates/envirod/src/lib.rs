//! Enviro Daemon - query service over the readings store.
//!
//! Serves the dashboard API: station inventory, latest reading per station,
//! and windowed sensor history across all stations.

pub mod query;
pub mod routes;
pub mod server;
pub mod store;
