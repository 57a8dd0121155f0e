//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules for the battmon node: command
//! parsing and interpretation, the messaging request protocol, telemetry
//! conversion, bounded retries and the lifecycle controller.  All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod interpreter;
pub mod lifecycle;
pub mod messaging;
pub mod ports;
pub mod retry;
pub mod telemetry;
