//! The persisted operator settings record.
//!
//! [`SettingsRecord`] is the single entity the node keeps across deep sleep
//! and restarts.  Every text field is a bounded [`heapless::String`] whose
//! capacity is one byte less than its slot in the persisted
//! [`layout`], the remaining byte holding the terminator.
//!
//! The completeness predicate ([`SettingsRecord::is_complete`]) decides
//! whether the node may run autonomously; [`store::SettingsStore`] re-derives
//! the `valid` flag from it on every save.

pub mod layout;
pub mod store;

use core::fmt::{self, Write};
use core::net::Ipv4Addr;

use crate::app::ports::EntropyPort;

// ---------------------------------------------------------------------------
// Slot sizes (bytes in the persisted layout, terminator included)
// ---------------------------------------------------------------------------

pub const SSID_SLOT: usize = 100;
pub const PASSWORD_SLOT: usize = 50;
pub const ADDRESS_SLOT: usize = 30;
pub const USERNAME_SLOT: usize = 50;
pub const TOPIC_SLOT: usize = 150;
pub const CLIENT_ID_SLOT: usize = 25;

/// Longest SSID an operator may enter.
pub const SSID_MAX: usize = SSID_SLOT - 1;
pub const PASSWORD_MAX: usize = PASSWORD_SLOT - 1;
pub const ADDRESS_MAX: usize = ADDRESS_SLOT - 1;
pub const USERNAME_MAX: usize = USERNAME_SLOT - 1;
pub const TOPIC_MAX: usize = TOPIC_SLOT - 1;
pub const CLIENT_ID_MAX: usize = CLIENT_ID_SLOT - 1;

pub type Ssid = heapless::String<SSID_MAX>;
pub type Password = heapless::String<PASSWORD_MAX>;
pub type Address = heapless::String<ADDRESS_MAX>;
pub type Username = heapless::String<USERNAME_MAX>;
pub type Topic = heapless::String<TOPIC_MAX>;
pub type ClientId = heapless::String<CLIENT_ID_MAX>;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_BROKER_PORT: u16 = 1883;
pub const DEFAULT_SLEEP_SECONDS: u32 = 10;
pub const DEFAULT_NETMASK: &str = "255.255.255.0";

/// Prefix of every generated broker client id.
pub const CLIENT_ID_ROOT: &str = "BatteryTest";

/// Separator every topic root must end with.
pub const TOPIC_SEPARATOR: char = '/';

// ---------------------------------------------------------------------------
// Text fields
// ---------------------------------------------------------------------------

/// The operator-editable text fields of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    BrokerAddress,
    TopicRoot,
    BrokerUsername,
    BrokerPassword,
    Ssid,
    WifiPassword,
    StaticAddress,
    StaticNetmask,
}

impl TextField {
    /// Maximum accepted length in bytes.
    pub const fn max_len(self) -> usize {
        match self {
            Self::BrokerAddress | Self::StaticAddress | Self::StaticNetmask => ADDRESS_MAX,
            Self::TopicRoot => TOPIC_MAX,
            Self::BrokerUsername => USERNAME_MAX,
            Self::BrokerPassword | Self::WifiPassword => PASSWORD_MAX,
            Self::Ssid => SSID_MAX,
        }
    }

    /// Command name that edits this field.
    pub const fn command_name(self) -> &'static str {
        match self {
            Self::BrokerAddress => "broker",
            Self::TopicRoot => "mqttTopic",
            Self::BrokerUsername => "user",
            Self::BrokerPassword => "pass",
            Self::Ssid => "ssid",
            Self::WifiPassword => "wifipass",
            Self::StaticAddress => "address",
            Self::StaticNetmask => "netmask",
        }
    }
}

/// Why a value was refused at the parse boundary.  The record is left
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The value does not fit the field's persisted slot.
    FieldTooLong { field: TextField, max: usize },
    /// A non-empty topic root that does not end with [`TOPIC_SEPARATOR`].
    TopicMissingSeparator,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldTooLong { field, max } => {
                write!(f, "{} longer than {} bytes", field.command_name(), max)
            }
            Self::TopicMissingSeparator => {
                write!(f, "mqttTopic must end with \"{}\"", TOPIC_SEPARATOR)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SettingsRecord
// ---------------------------------------------------------------------------

/// Operator settings, exactly the fields of the persisted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsRecord {
    /// Mirrors the persisted sentinel: `true` iff the record was written
    /// while complete.
    pub valid: bool,
    pub ssid: Ssid,
    pub wifi_password: Password,
    pub broker_address: Address,
    pub broker_port: u16,
    pub broker_username: Username,
    pub broker_password: Password,
    /// Prefix of every published and subscribed topic.
    pub topic_root: Topic,
    /// Deep-sleep length between reports; 0 means never sleep.
    pub sleep_seconds: u32,
    /// Broker client id, generated once and stable across reboots.
    pub client_id: ClientId,
    pub debug: bool,
    pub static_address: Address,
    pub static_netmask: Address,
}

impl Default for SettingsRecord {
    /// In-memory initial value before anything was loaded.
    fn default() -> Self {
        Self {
            valid: false,
            ssid: Ssid::new(),
            wifi_password: Password::new(),
            broker_address: Address::new(),
            broker_port: DEFAULT_BROKER_PORT,
            broker_username: Username::new(),
            broker_password: Password::new(),
            topic_root: Topic::new(),
            sleep_seconds: DEFAULT_SLEEP_SECONDS,
            client_id: ClientId::new(),
            debug: false,
            static_address: Address::new(),
            static_netmask: Address::new(),
        }
    }
}

impl SettingsRecord {
    /// Factory state: everything cleared except the broker port, sleep
    /// interval, netmask and the freshly generated `client_id`.
    pub fn factory_defaults(client_id: ClientId) -> Self {
        let mut netmask = Address::new();
        let _ = netmask.push_str(DEFAULT_NETMASK);
        Self {
            client_id,
            static_netmask: netmask,
            ..Self::default()
        }
    }

    /// Completeness predicate: every field needed to join the network and
    /// reach the broker is populated.
    pub fn is_complete(&self) -> bool {
        !self.ssid.is_empty()
            && !self.wifi_password.is_empty()
            && !self.broker_address.is_empty()
            && self.broker_port != 0
            && !self.topic_root.is_empty()
            && !self.client_id.is_empty()
    }

    /// Read a text field.
    pub fn text(&self, field: TextField) -> &str {
        match field {
            TextField::BrokerAddress => &self.broker_address,
            TextField::TopicRoot => &self.topic_root,
            TextField::BrokerUsername => &self.broker_username,
            TextField::BrokerPassword => &self.broker_password,
            TextField::Ssid => &self.ssid,
            TextField::WifiPassword => &self.wifi_password,
            TextField::StaticAddress => &self.static_address,
            TextField::StaticNetmask => &self.static_netmask,
        }
    }

    /// Replace a text field.  Over-length values are rejected, never
    /// truncated; on rejection the field keeps its previous value.
    pub fn set_text(&mut self, field: TextField, value: &str) -> Result<(), Rejection> {
        let too_long = Rejection::FieldTooLong {
            field,
            max: field.max_len(),
        };
        match field {
            TextField::BrokerAddress => replace(&mut self.broker_address, value),
            TextField::TopicRoot => replace(&mut self.topic_root, value),
            TextField::BrokerUsername => replace(&mut self.broker_username, value),
            TextField::BrokerPassword => replace(&mut self.broker_password, value),
            TextField::Ssid => replace(&mut self.ssid, value),
            TextField::WifiPassword => replace(&mut self.wifi_password, value),
            TextField::StaticAddress => replace(&mut self.static_address, value),
            TextField::StaticNetmask => replace(&mut self.static_netmask, value),
        }
        .map_err(|()| too_long)
    }

    /// Static IPv4 configuration, if both address and netmask parse.
    pub fn static_ipv4(&self) -> StaticAddressing {
        let Ok(address) = self.static_address.parse::<Ipv4Addr>() else {
            return StaticAddressing::Dynamic;
        };
        match self.static_netmask.parse::<Ipv4Addr>() {
            Ok(netmask) => StaticAddressing::Fixed { address, netmask },
            Err(_) => StaticAddressing::BadNetmask { address },
        }
    }
}

/// Outcome of interpreting the static address fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticAddressing {
    /// No usable static address: obtain one from the network.
    Dynamic,
    Fixed { address: Ipv4Addr, netmask: Ipv4Addr },
    /// The address parsed but the netmask did not; dynamic addressing is
    /// used instead.
    BadNetmask { address: Ipv4Addr },
}

fn replace<const N: usize>(slot: &mut heapless::String<N>, value: &str) -> Result<(), ()> {
    if value.len() > N {
        return Err(());
    }
    slot.clear();
    slot.push_str(value)
}

/// Generate a fresh broker client id: [`CLIENT_ID_ROOT`] followed by a
/// random 16-bit value in lowercase hex.
pub fn generate_client_id(entropy: &mut impl EntropyPort) -> ClientId {
    let mut id = ClientId::new();
    let suffix = entropy.random_u16() % 0xFFFF;
    let _ = write!(id, "{}{:x}", CLIENT_ID_ROOT, suffix);
    log::debug!("New broker client id is {}", id);
    id
}
