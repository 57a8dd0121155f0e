//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ LifecycleController (domain)
//! ```
//!
//! Driven adapters (record storage, radio, broker client, ADC, platform,
//! console, event sinks) implement these traits.  The
//! [`LifecycleController`](super::lifecycle::LifecycleController) consumes
//! them via generics, so the domain core never touches hardware directly.

use core::net::Ipv4Addr;

use crate::error::{CommsError, SensorError};
use crate::settings::{Address, ClientId, Password, Ssid, Username};

/// Longest console line or messaging payload the node accepts.
pub const MAX_LINE: usize = 200;

/// One assembled console line, terminator included.
pub type ConsoleLine = heapless::String<MAX_LINE>;

// ───────────────────────────────────────────────────────────────
// Record storage port (driven adapter: domain ↔ EEPROM-like flash)
// ───────────────────────────────────────────────────────────────

/// Byte-addressed persisted storage with an explicit commit step.
///
/// Writes land in a RAM image; nothing is durable until [`commit`]
/// succeeds.  Erased storage reads as `0xFF`.
///
/// [`commit`]: RecordStoragePort::commit
pub trait RecordStoragePort {
    /// Fill `buf` from `offset`.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Copy `data` into the image at `offset`.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError>;

    /// Flush the image to physical storage.
    fn commit(&mut self) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Entropy port
// ───────────────────────────────────────────────────────────────

/// Source of random values for client-id generation.
pub trait EntropyPort {
    fn random_u16(&mut self) -> u16;
}

// ───────────────────────────────────────────────────────────────
// Network port (driven adapter: domain → Wi-Fi station)
// ───────────────────────────────────────────────────────────────

/// Everything the station needs to join a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinParams {
    pub ssid: Ssid,
    pub password: Password,
    /// `(address, netmask)`; the address doubles as gateway.
    pub static_ip: Option<(Ipv4Addr, Ipv4Addr)>,
}

/// Wi-Fi station.  Joining is split into a non-blocking start and a status
/// poll so the controller can own the retry budget.
pub trait NetworkPort {
    /// Configure the station and start associating.
    fn begin_join(&mut self, params: &JoinParams) -> Result<(), CommsError>;

    /// `true` once associated with an address assigned.
    fn is_joined(&self) -> bool;

    /// The live station address, if any.
    fn local_ip(&self) -> Option<Ipv4Addr>;

    /// Drop the association (before deep sleep).
    fn leave(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Messaging port (driven adapter: domain ↔ MQTT broker)
// ───────────────────────────────────────────────────────────────

/// Broker endpoint and credentials.  Empty username means anonymous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerParams {
    pub host: Address,
    pub port: u16,
    pub client_id: ClientId,
    pub username: Username,
    pub password: Password,
}

/// One message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub payload: heapless::Vec<u8, MAX_LINE>,
}

/// Publish/subscribe client.  Inbound messages are queued by the adapter
/// and drained synchronously by the controller.
pub trait MessagingPort {
    /// Start one connection attempt.
    fn connect(&mut self, params: &BrokerParams) -> Result<(), CommsError>;

    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError>;

    /// Publish at-most-once.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError>;

    /// Next queued inbound message, if any.
    fn poll_message(&mut self) -> Option<InboundMessage>;
}

// ───────────────────────────────────────────────────────────────
// Battery port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw battery-voltage sampling.
pub trait BatteryPort {
    /// One raw ADC count.
    fn sample(&mut self) -> Result<u16, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Platform port
// ───────────────────────────────────────────────────────────────

/// Clock and power control.
pub trait PlatformPort {
    /// Monotonic milliseconds since boot.
    fn uptime_ms(&self) -> u64;

    /// Full platform restart.  Does not return on target.
    fn restart(&mut self);

    /// Enter deep sleep for `seconds`; waking re-enters boot.  Does not
    /// return on target.
    fn deep_sleep(&mut self, seconds: u32);
}

// ───────────────────────────────────────────────────────────────
// Console port (driven adapter: serial line input)
// ───────────────────────────────────────────────────────────────

/// Line-oriented local serial console.
pub trait ConsolePort {
    /// Next complete line (terminator included), if one is ready.
    fn read_line(&mut self) -> Option<ConsoleLine>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Composite
// ───────────────────────────────────────────────────────────────

/// Every outward-facing port the lifecycle needs, on one value.
///
/// Taking `hw: &mut impl NodePorts` avoids juggling several mutable
/// borrows while keeping each port boundary explicit.
pub trait NodePorts:
    NetworkPort
    + MessagingPort
    + BatteryPort
    + PlatformPort
    + ConsolePort
    + EntropyPort
    + embedded_hal::delay::DelayNs
{
}

impl<T> NodePorts for T where
    T: NetworkPort
        + MessagingPort
        + BatteryPort
        + PlatformPort
        + ConsolePort
        + EntropyPort
        + embedded_hal::delay::DelayNs
{
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`RecordStoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Access beyond the end of the storage region.
    OutOfBounds,
    /// Generic I/O error from the backend.
    Io,
    /// The image could not be flushed; the durable copy may be stale.
    CommitFailed,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "out of bounds"),
            Self::Io => write!(f, "I/O error"),
            Self::CommitFailed => write!(f, "commit failed"),
        }
    }
}
