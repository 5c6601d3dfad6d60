//! espdash firmware library.
//!
//! Telemetry dashboard core: ECU frame decoding, warning evaluation, the
//! shift light, SD logging and Normal/Portal mode arbitration.  Everything
//! ESP-IDF-specific is confined to `adapters` behind
//! `#[cfg(target_os = "espidf")]`, so the library builds and tests on the
//! host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod datalog;
pub mod ecu;
pub mod error;
pub mod fsm;
pub mod metrics;
pub mod portal;
pub mod scheduler;
pub mod settings;
pub mod shift;
