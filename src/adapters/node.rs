//! Composite hardware handle.
//!
//! [`NodeHardware`] bundles one adapter per port so the controller can take
//! a single `&mut impl NodePorts`.  Every trait method forwards to the
//! owning adapter.

use core::net::Ipv4Addr;

use embedded_hal::delay::DelayNs;

use super::battery_adc::BatteryAdc;
use super::mqtt::MqttClient;
use super::platform::Esp32Platform;
use super::serial_console::SerialConsole;
use super::wifi::WifiStation;
use crate::app::ports::{
    BatteryPort, BrokerParams, ConsoleLine, ConsolePort, EntropyPort, InboundMessage, JoinParams,
    MessagingPort, NetworkPort, PlatformPort,
};
use crate::error::{CommsError, SensorError};

pub struct NodeHardware {
    pub wifi: WifiStation,
    pub mqtt: MqttClient,
    pub battery: BatteryAdc,
    pub platform: Esp32Platform,
    pub console: SerialConsole,
}

impl NodeHardware {
    pub fn new(
        wifi: WifiStation,
        mqtt: MqttClient,
        battery: BatteryAdc,
        platform: Esp32Platform,
        console: SerialConsole,
    ) -> Self {
        Self {
            wifi,
            mqtt,
            battery,
            platform,
            console,
        }
    }
}

/// All-simulated hardware for host runs.
#[cfg(not(target_os = "espidf"))]
impl NodeHardware {
    pub fn simulated() -> Result<Self, SensorError> {
        Ok(Self::new(
            WifiStation::new(),
            MqttClient::new(),
            BatteryAdc::new()?,
            Esp32Platform::new(),
            SerialConsole::new(),
        ))
    }
}

impl NetworkPort for NodeHardware {
    fn begin_join(&mut self, params: &JoinParams) -> Result<(), CommsError> {
        self.wifi.begin_join(params)
    }

    fn is_joined(&self) -> bool {
        self.wifi.is_joined()
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.wifi.local_ip()
    }

    fn leave(&mut self) {
        self.wifi.leave();
    }
}

impl MessagingPort for NodeHardware {
    fn connect(&mut self, params: &BrokerParams) -> Result<(), CommsError> {
        self.mqtt.connect(params)
    }

    fn is_connected(&self) -> bool {
        self.mqtt.is_connected()
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        self.mqtt.subscribe(topic)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), CommsError> {
        self.mqtt.publish(topic, payload, retain)
    }

    fn poll_message(&mut self) -> Option<InboundMessage> {
        self.mqtt.poll_message()
    }
}

impl BatteryPort for NodeHardware {
    fn sample(&mut self) -> Result<u16, SensorError> {
        self.battery.sample()
    }
}

impl PlatformPort for NodeHardware {
    fn uptime_ms(&self) -> u64 {
        self.platform.uptime_ms()
    }

    fn restart(&mut self) {
        self.platform.restart();
    }

    fn deep_sleep(&mut self, seconds: u32) {
        self.platform.deep_sleep(seconds);
    }
}

impl ConsolePort for NodeHardware {
    fn read_line(&mut self) -> Option<ConsoleLine> {
        self.console.read_line()
    }
}

impl EntropyPort for NodeHardware {
    fn random_u16(&mut self) -> u16 {
        self.platform.random_u16()
    }
}

impl DelayNs for NodeHardware {
    fn delay_ns(&mut self, ns: u32) {
        self.platform.delay_ns(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.platform.delay_ms(ms);
    }
}
