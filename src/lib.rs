//! Battmon firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod settings;

// The ESP-IDF adapters compile on the host too; their real implementations
// are guarded by cfg attributes inside.
pub mod adapters;
