//! Enviro Common - Shared types for the environmental monitoring pipeline
//!
//! Readings, sensor generation, and configuration used by both the station
//! binary (envirostation) and the query daemon (envirod).

pub mod config;
pub mod model;
pub mod sensors;

pub use config::*;
pub use model::*;
pub use sensors::*;
