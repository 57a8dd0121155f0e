//! Mock node hardware for integration tests.
//!
//! A virtual clock that only moves when the controller delays or a test
//! calls [`MockNode::advance`], a scriptable access point and broker, and
//! a record of every publish, sleep and restart.

use std::cell::Cell;
use std::collections::VecDeque;
use std::net::Ipv4Addr;

use battmon::adapters::nvs::NvsRecordStorage;
use battmon::app::events::AppEvent;
use battmon::app::lifecycle::LifecycleController;
use battmon::app::ports::{
    BatteryPort, BrokerParams, ConsoleLine, ConsolePort, EntropyPort, EventSink, InboundMessage,
    JoinParams, MessagingPort, NetworkPort, PlatformPort,
};
use battmon::config::FirmwareConfig;
use battmon::error::{CommsError, SensorError};
use battmon::settings::store::SettingsStore;
use battmon::settings::{SettingsRecord, TextField};
use embedded_hal::delay::DelayNs;

// ── Publish record ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

// ── MockNode ──────────────────────────────────────────────────

pub struct MockNode {
    pub now_ms: u64,
    pub slept_ms: u64,

    /// The access point accepts us after this many `is_joined` polls.
    pub join_after_polls: Option<u32>,
    join_polls: Cell<u32>,
    join_pending: bool,
    associated: Cell<bool>,
    pub join_requests: Vec<JoinParams>,
    pub address: Ipv4Addr,

    pub broker_up: bool,
    pub connected: bool,
    pub connect_attempts: u32,
    pub last_broker: Option<BrokerParams>,
    pub subscriptions: Vec<String>,
    pub published: Vec<Publish>,
    pub inbox: VecDeque<InboundMessage>,

    pub battery: Option<u16>,
    pub console: VecDeque<ConsoleLine>,
    pub entropy: u16,

    pub sleeps: Vec<u32>,
    pub restarts: u32,
    pub left_network: u32,
}

#[allow(dead_code)]
impl MockNode {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            slept_ms: 0,
            join_after_polls: Some(0),
            join_polls: Cell::new(0),
            join_pending: false,
            associated: Cell::new(false),
            join_requests: Vec::new(),
            address: Ipv4Addr::new(192, 168, 1, 77),
            broker_up: true,
            connected: false,
            connect_attempts: 0,
            last_broker: None,
            subscriptions: Vec::new(),
            published: Vec::new(),
            inbox: VecDeque::new(),
            battery: Some(1589),
            console: VecDeque::new(),
            entropy: 0xBEEF,
            sleeps: Vec::new(),
            restarts: 0,
            left_network: 0,
        }
    }

    /// A node whose access point never answers.
    pub fn offline() -> Self {
        Self {
            join_after_polls: None,
            ..Self::new()
        }
    }

    /// Start already associated, as after an earlier join this wake.
    pub fn pre_join(&mut self) {
        self.associated.set(true);
    }

    pub fn is_associated(&self) -> bool {
        self.associated.get()
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }

    pub fn type_line(&mut self, line: &str) {
        self.console.push_back(ConsoleLine::try_from(line).unwrap());
    }

    pub fn deliver(&mut self, payload: &str) {
        self.inbox.push_back(InboundMessage {
            payload: heapless::Vec::from_slice(payload.as_bytes()).unwrap(),
        });
    }

    pub fn published_to(&self, suffix: &str) -> Vec<&Publish> {
        self.published
            .iter()
            .filter(|p| p.topic.ends_with(suffix))
            .collect()
    }

    pub fn last_publish(&self) -> Option<&Publish> {
        self.published.last()
    }
}

impl Default for MockNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkPort for MockNode {
    fn begin_join(&mut self, params: &JoinParams) -> Result<(), CommsError> {
        self.join_requests.push(params.clone());
        self.join_polls.set(0);
        self.join_pending = true;
        Ok(())
    }

    fn is_joined(&self) -> bool {
        if self.associated.get() {
            return true;
        }
        if !self.join_pending {
            return false;
        }
        let polls = self.join_polls.get();
        self.join_polls.set(polls + 1);
        let joined = self.join_after_polls.is_some_and(|n| polls >= n);
        self.associated.set(joined);
        joined
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.associated.get().then(|| {
            self.join_requests
                .last()
                .and_then(|p| p.static_ip)
                .map_or(self.address, |(a, _)| a)
        })
    }

    fn leave(&mut self) {
        self.associated.set(false);
        self.join_pending = false;
        self.left_network += 1;
    }
}

impl MessagingPort for MockNode {
    fn connect(&mut self, params: &BrokerParams) -> Result<(), CommsError> {
        self.connect_attempts += 1;
        self.last_broker = Some(params.clone());
        if !self.broker_up {
            return Err(CommsError::BrokerUnavailable);
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        self.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError> {
        if !self.connected {
            return Err(CommsError::NotConnected);
        }
        self.published.push(Publish {
            topic: topic.to_owned(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            retain,
        });
        Ok(())
    }

    fn poll_message(&mut self) -> Option<InboundMessage> {
        self.inbox.pop_front()
    }
}

impl BatteryPort for MockNode {
    fn sample(&mut self) -> Result<u16, SensorError> {
        self.battery.ok_or(SensorError::AdcReadFailed)
    }
}

impl PlatformPort for MockNode {
    fn uptime_ms(&self) -> u64 {
        self.now_ms
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }

    fn deep_sleep(&mut self, seconds: u32) {
        self.sleeps.push(seconds);
    }
}

impl ConsolePort for MockNode {
    fn read_line(&mut self) -> Option<ConsoleLine> {
        self.console.pop_front()
    }
}

impl EntropyPort for MockNode {
    fn random_u16(&mut self) -> u16 {
        self.entropy
    }
}

impl DelayNs for MockNode {
    fn delay_ns(&mut self, ns: u32) {
        let ms = u64::from(ns / 1_000_000);
        self.now_ms += ms;
        self.slept_ms += ms;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now_ms += u64::from(ms);
        self.slept_ms += u64::from(ms);
    }
}

// ── RecordingSink ─────────────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn any(&self, pred: impl Fn(&AppEvent) -> bool) -> bool {
        self.events.iter().any(pred)
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Storage fixtures ──────────────────────────────────────────

/// Storage holding a complete record reporting under `sensor/`.
#[allow(dead_code)]
pub fn provisioned_storage(sleep_seconds: u32) -> NvsRecordStorage {
    provisioned_with(sleep_seconds, |_| {})
}

/// Like [`provisioned_storage`], with a final edit before saving.
#[allow(dead_code)]
pub fn provisioned_with(
    sleep_seconds: u32,
    edit: impl FnOnce(&mut SettingsRecord),
) -> NvsRecordStorage {
    let mut entropy = MockNode::new();
    let mut store = SettingsStore::new(NvsRecordStorage::erased());
    let mut r = store.reset_to_defaults(&mut entropy);
    r.set_text(TextField::Ssid, "HomeNet").unwrap();
    r.set_text(TextField::WifiPassword, "hunter22").unwrap();
    r.set_text(TextField::BrokerAddress, "10.0.0.2").unwrap();
    r.set_text(TextField::TopicRoot, "sensor/").unwrap();
    r.sleep_seconds = sleep_seconds;
    edit(&mut r);
    store.save(r, &mut entropy).unwrap();
    let mut storage = store.into_storage();
    storage.power_cycle();
    storage
}

/// Boot a controller over `storage` with default tunables.
#[allow(dead_code)]
pub fn boot(
    storage: NvsRecordStorage,
    node: &mut MockNode,
    sink: &mut RecordingSink,
) -> LifecycleController<NvsRecordStorage> {
    let mut ctl = LifecycleController::new(storage, FirmwareConfig::default());
    ctl.boot(node, sink);
    ctl
}

/// Tick every `step_ms` until `until_ms` of virtual time has passed.
#[allow(dead_code)]
pub fn run_for(
    ctl: &mut LifecycleController<NvsRecordStorage>,
    node: &mut MockNode,
    sink: &mut RecordingSink,
    until_ms: u64,
    step_ms: u64,
) {
    let end = node.now_ms + until_ms;
    while node.now_ms < end {
        ctl.tick(node, sink);
        node.advance(step_ms);
    }
}
