//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to the
//! logger, which on target shares the UART with the serial command console.

use log::{error, info, warn};

use crate::app::events::{AppEvent, SettingsReport};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Booted(status) => info!("BOOT | settings {:?}", status),
            AppEvent::StateChanged { from, to } => info!("STATE | {:?} -> {:?}", from, to),
            AppEvent::SettingsReport(report) => log_settings(report),
            AppEvent::SettingsSaved { complete, restart } => info!(
                "SAVE | settings {}{}",
                if *complete { "complete" } else { "incomplete" },
                if *restart { ", restart pending" } else { "" }
            ),
            AppEvent::StorageFault(e) => {
                error!("SAVE | {}; settings may revert on next boot", e);
            }
            AppEvent::CommandRejected(r) => warn!("CMD | rejected: {}", r),
            AppEvent::StayingAwake => info!("CMD | staying awake until next reset"),
            AppEvent::Reading { raw, volts } => {
                info!("READ | raw={} battery={:.2}V", raw, volts);
            }
            AppEvent::SensorFault(e) => warn!("READ | {}", e),
            AppEvent::PublishFailed(e) => warn!("MQTT | {}", e),
            AppEvent::NetworkJoined(Some(ip)) => info!("WIFI | joined, address {}", ip),
            AppEvent::NetworkJoined(None) => info!("WIFI | joined"),
            AppEvent::NetworkJoinFailed => warn!("WIFI | join failed"),
            AppEvent::BrokerConnected => info!("MQTT | connected"),
            AppEvent::BrokerConnectFailed => warn!("MQTT | connection failed"),
            AppEvent::StaticAddressIgnored => {
                warn!("WIFI | static address or netmask invalid, using DHCP");
            }
            AppEvent::UpdateWindow { open } => {
                info!("OTA | update window {}", if *open { "open" } else { "closed" });
            }
            AppEvent::Sleeping { seconds } => info!("SLEEP | {} s", seconds),
            AppEvent::Restarting => info!("RESTART | restarting processor"),
        }
    }
}

/// Operator help listing with the current values.
fn log_settings(report: &SettingsReport) {
    let r = &report.record;
    info!("ssid=<wifi ssid> ({})", r.ssid);
    info!("wifipass=<wifi password> ({})", r.wifi_password);
    info!("broker=<MQTT broker host name or address> ({})", r.broker_address);
    info!("port=<port number>   ({})", r.broker_port);
    info!("user=<mqtt user> ({})", r.broker_username);
    info!("pass=<mqtt password> ({})", r.broker_password);
    info!("mqttTopic=<topic root> ({})  Note: must end with \"/\"", r.topic_root);
    info!(
        "sleepTime=<seconds to sleep between measurements> ({})",
        r.sleep_seconds
    );
    info!("address=<Static IP address if so desired> ({})", r.static_address);
    info!(
        "netmask=<Network mask to be used with static IP> ({})",
        r.static_netmask
    );
    info!("debug=1|0 ({})", u8::from(r.debug));
    info!("MQTT Client ID is {}", r.client_id);
    match report.local_ip {
        Some(ip) => info!("Device actual address is {}", ip),
        None => info!("Device actual address is (none)"),
    }
    info!("*** Use NULL to reset a setting to its default value ***");
    info!("*** Use \"factorydefaults=yes\" to reset all settings  ***");
    info!("*** Use \"reset=yes\" to restart the processor  ***");
    info!("*** Use a simple \"w\" to prevent sleep until restart  ***");
    info!(
        "Settings are {}",
        if report.complete { "complete." } else { "incomplete." }
    );
}
