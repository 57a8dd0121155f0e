//! MQTT client adapter.
//!
//! Implements [`MessagingPort`] over the ESP-IDF MQTT client.  The client
//! runs its own task; its event callback pushes inbound payloads onto a
//! bounded inbox that the controller drains synchronously via
//! [`poll_message`](MessagingPort::poll_message).
//!
//! - Payloads longer than [`MAX_LINE`] are dropped with a warning.
//! - All publishes are QoS 0 (at-most-once).
//! - A panic while the inbox is locked does not stop delivery; the queue
//!   is recovered and used as is.
//! - **`not(target_os = "espidf")`**: an in-memory broker that records
//!   publishes and lets tests inject inbound messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use heapless::Deque;
use log::{debug, info, warn};

use crate::app::ports::{BrokerParams, InboundMessage, MAX_LINE, MessagingPort};
use crate::error::CommsError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttEvent, EventPayload, MqttClientConfiguration, QoS,
};

/// Inbound messages buffered between two controller ticks.
pub const INBOX_DEPTH: usize = 8;

/// Client RX/TX buffer size, large enough for the settings JSON reply.
#[cfg(target_os = "espidf")]
const CLIENT_BUFFER: usize = 1024;

/// How long `connect` waits for the broker's CONNACK before returning.
#[cfg(target_os = "espidf")]
const CONNACK_WAIT_MS: u32 = 1000;

type Inbox = Arc<Mutex<Deque<InboundMessage, INBOX_DEPTH>>>;

/// State shared with the client's event task.
#[derive(Clone, Default)]
struct Shared {
    inbox: Inbox,
    connected: Arc<AtomicBool>,
}

impl Shared {
    fn enqueue(&self, data: &[u8]) {
        let Ok(payload) = heapless::Vec::<u8, MAX_LINE>::from_slice(data) else {
            warn!("MQTT: {}-byte payload dropped (limit {})", data.len(), MAX_LINE);
            return;
        };
        if self.lock_inbox().push_back(InboundMessage { payload }).is_err() {
            warn!("MQTT: inbox full, message dropped");
        }
    }

    fn lock_inbox(&self) -> MutexGuard<'_, Deque<InboundMessage, INBOX_DEPTH>> {
        self.inbox.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("MQTT: inbox lock poisoned, recovering queued messages");
            poisoned.into_inner()
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Client
// ───────────────────────────────────────────────────────────────

pub struct MqttClient {
    shared: Shared,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

impl Default for MqttClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttClient {
    pub fn new() -> Self {
        Self {
            shared: Shared::default(),
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker::default(),
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, params: &BrokerParams) -> Result<(), CommsError> {
        // A fresh client per attempt; the old one is torn down first.
        self.client = None;
        self.shared.connected.store(false, Ordering::SeqCst);

        let url = format!("mqtt://{}:{}", params.host, params.port);
        let conf = MqttClientConfiguration {
            client_id: Some(params.client_id.as_str()),
            username: (!params.username.is_empty()).then_some(params.username.as_str()),
            password: (!params.username.is_empty()).then_some(params.password.as_str()),
            buffer_size: CLIENT_BUFFER,
            out_buffer_size: CLIENT_BUFFER,
            ..Default::default()
        };

        let shared = self.shared.clone();
        let client = EspMqttClient::new_cb(&url, &conf, move |event: EspMqttEvent<'_>| {
            match event.payload() {
                EventPayload::Connected(_) => shared.connected.store(true, Ordering::SeqCst),
                EventPayload::Disconnected => shared.connected.store(false, Ordering::SeqCst),
                EventPayload::Received { data, .. } => shared.enqueue(data),
                EventPayload::Error(e) => log::warn!("MQTT: client error {:?}", e),
                _ => {}
            }
        })
        .map_err(|e| {
            warn!("MQTT: client creation failed: {}", e);
            CommsError::BrokerUnavailable
        })?;
        self.client = Some(client);

        // Give the CONNACK a moment to arrive.
        let mut waited = 0;
        while !self.shared.connected.load(Ordering::SeqCst) && waited < CONNACK_WAIT_MS {
            esp_idf_svc::hal::delay::FreeRtos::delay_ms(50);
            waited += 50;
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, params: &BrokerParams) -> Result<(), CommsError> {
        self.sim.connect_attempts += 1;
        self.sim.last_client_id = Some(params.client_id.as_str().to_owned());
        if !self.sim.available {
            return Err(CommsError::BrokerUnavailable);
        }
        self.shared.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| CommsError::SubscribeFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        self.sim.subscriptions.push(topic.to_owned());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, retain, payload)
            .map(|_| ())
            .map_err(|_| CommsError::PublishFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError> {
        if self.sim.fail_publish {
            return Err(CommsError::PublishFailed);
        }
        self.sim.published.push(Published {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// One recorded publish.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Debug)]
struct SimBroker {
    available: bool,
    fail_publish: bool,
    connect_attempts: u32,
    last_client_id: Option<String>,
    subscriptions: Vec<String>,
    published: Vec<Published>,
}

#[cfg(not(target_os = "espidf"))]
impl Default for SimBroker {
    fn default() -> Self {
        Self {
            available: true,
            fail_publish: false,
            connect_attempts: 0,
            last_client_id: None,
            subscriptions: Vec::new(),
            published: Vec::new(),
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl MqttClient {
    pub fn set_available(&mut self, available: bool) {
        self.sim.available = available;
        if !available {
            self.shared.connected.store(false, Ordering::SeqCst);
        }
    }

    pub fn set_publish_failure(&mut self, fail: bool) {
        self.sim.fail_publish = fail;
    }

    /// Deliver a message as the broker's callback would.
    pub fn inject(&self, payload: &[u8]) {
        self.shared.enqueue(payload);
    }

    pub fn published(&self) -> &[Published] {
        &self.sim.published
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.sim.subscriptions
    }

    pub fn connect_attempts(&self) -> u32 {
        self.sim.connect_attempts
    }

    pub fn last_client_id(&self) -> Option<&str> {
        self.sim.last_client_id.as_deref()
    }
}

// ───────────────────────────────────────────────────────────────
// MessagingPort
// ───────────────────────────────────────────────────────────────

impl MessagingPort for MqttClient {
    fn connect(&mut self, params: &BrokerParams) -> Result<(), CommsError> {
        info!("MQTT: connecting as {}", params.client_id);
        self.platform_connect(params)
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        if !self.is_connected() {
            return Err(CommsError::NotConnected);
        }
        self.platform_subscribe(topic)?;
        info!("MQTT: subscribed to {}", topic);
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError> {
        if !self.is_connected() {
            return Err(CommsError::NotConnected);
        }
        debug!("MQTT: publish {} ({} bytes, retain={})", topic, payload.len(), retain);
        self.platform_publish(topic, payload, retain)
    }

    fn poll_message(&mut self) -> Option<InboundMessage> {
        self.shared.lock_inbox().pop_front()
    }
}
