//! Enviro Station - simulated environmental sensor station.
//!
//! Samples the standard sensor suite on a fixed cadence and publishes every
//! reading to the MQTT broker over mutual TLS with at-least-once delivery.

pub mod publisher;
pub mod runner;
