//! Unified error types for the battmon firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! lifecycle controller's error handling uniform.  All variants are `Copy`
//! so they can be carried inside [`AppEvent`](crate::app::events::AppEvent)s
//! without allocation.

use core::fmt;

pub use crate::app::ports::StorageError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The persisted settings record could not be read or committed.
    Storage(StorageError),
    /// Network join, broker connection or publish failed.
    Comms(CommsError),
    /// The battery sample could not be taken.
    Sensor(SensorError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

/// Transient link failures.  None of these are fatal: the current cycle is
/// abandoned and the next wake tries again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// The station could not be started or configured.
    JoinFailed,
    /// Still waiting for the access point to accept us.
    NotJoined,
    /// The broker client could not be created.
    BrokerUnavailable,
    /// The broker client exists but has not reported a connection yet.
    NotConnected,
    PublishFailed,
    SubscribeFailed,
    /// SSID or password does not fit the radio driver's limits.
    InvalidCredentials,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JoinFailed => write!(f, "network join failed"),
            Self::NotJoined => write!(f, "network not joined"),
            Self::BrokerUnavailable => write!(f, "broker unavailable"),
            Self::NotConnected => write!(f, "broker not connected"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::InvalidCredentials => write!(f, "invalid network credentials"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error or timed out.
    AdcReadFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

impl std::error::Error for Error {}
impl std::error::Error for CommsError {}
impl std::error::Error for SensorError {}
impl std::error::Error for StorageError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
