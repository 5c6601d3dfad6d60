//! Application core: pure domain logic, zero I/O.
//!
//! The [`service::DashboardController`] aggregate owns all engine state and
//! runs the cooperative tick loop.  All interaction with hardware happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
