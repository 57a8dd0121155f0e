//! Outbound application events.
//!
//! The [`LifecycleController`](super::lifecycle::LifecycleController) emits
//! these through the [`EventSink`](super::ports::EventSink) port.  Adapters
//! on the other side decide what to do with them (serial log, test
//! recorder).

use core::net::Ipv4Addr;

use crate::error::{CommsError, SensorError};
use crate::fsm::StateId;
use crate::settings::layout::RecordStatus;
use crate::settings::{Rejection, SettingsRecord};

use super::ports::StorageError;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Settings were loaded at boot.
    Booted(RecordStatus),

    /// The lifecycle FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// Operator diagnostic: the full current settings.
    SettingsReport(Box<SettingsReport>),

    /// A command persisted the record.
    SettingsSaved { complete: bool, restart: bool },

    /// A save did not reach durable storage.
    StorageFault(StorageError),

    /// A command value was refused.
    CommandRejected(Rejection),

    /// The stay-awake override was set.
    StayingAwake,

    /// A battery measurement was taken.
    Reading { raw: u16, volts: f32 },

    SensorFault(SensorError),

    /// A reading or reply could not be published.
    PublishFailed(CommsError),

    NetworkJoined(Option<Ipv4Addr>),
    NetworkJoinFailed,
    BrokerConnected,
    BrokerConnectFailed,

    /// The static address fields are set but unusable.
    StaticAddressIgnored,

    /// An update window opened or closed.
    UpdateWindow { open: bool },

    /// About to enter deep sleep.
    Sleeping { seconds: u32 },

    /// About to restart the platform.
    Restarting,
}

/// Snapshot rendered by the settings dump.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsReport {
    pub record: SettingsRecord,
    pub complete: bool,
    pub local_ip: Option<Ipv4Addr>,
}
