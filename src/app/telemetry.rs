//! Telemetry reporter: one battery sample, two retained readings.

use core::fmt::Write;

use super::events::AppEvent;
use super::messaging::topic_for;
use super::ports::{BatteryPort, EventSink, MessagingPort};
use crate::config::FirmwareConfig;
use crate::error::SensorError;

/// Topic suffix of the raw ADC count.
pub const ANALOG_SUFFIX: &str = "analog";
/// Topic suffix of the voltage.
pub const BATTERY_SUFFIX: &str = "battery";

/// One measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub raw: u16,
    pub volts: f32,
}

/// Converts and publishes battery samples.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryReporter {
    full_battery_raw: f32,
    full_voltage_centivolts: f32,
}

impl TelemetryReporter {
    pub fn new(config: &FirmwareConfig) -> Self {
        Self {
            full_battery_raw: f32::from(config.full_battery_raw),
            full_voltage_centivolts: f32::from(config.full_voltage_centivolts),
        }
    }

    /// Two-point linear scale from raw counts to volts.
    pub fn to_voltage(&self, raw: u16) -> f32 {
        f32::from(raw) * self.full_voltage_centivolts / self.full_battery_raw / 100.0
    }

    /// One raw sample from the hardware.
    pub fn sample(&self, hw: &mut impl BatteryPort) -> Result<u16, SensorError> {
        let raw = hw.sample()?;
        log::debug!("Raw voltage count: {}", raw);
        Ok(raw)
    }

    /// Sample once and publish `<root>analog` and `<root>battery`, both
    /// retained.  Publish failures are reported to `sink` and not retried.
    pub fn report(
        &self,
        hw: &mut (impl BatteryPort + MessagingPort),
        topic_root: &str,
        sink: &mut impl EventSink,
    ) -> Result<Reading, SensorError> {
        let raw = self.sample(hw)?;
        let reading = Reading {
            raw,
            volts: self.to_voltage(raw),
        };
        sink.emit(&AppEvent::Reading {
            raw: reading.raw,
            volts: reading.volts,
        });

        let mut text = heapless::String::<16>::new();
        let _ = write!(text, "{}", reading.raw);
        publish_retained(hw, topic_root, ANALOG_SUFFIX, &text, sink);

        text.clear();
        let _ = write!(text, "{:.2}", reading.volts);
        publish_retained(hw, topic_root, BATTERY_SUFFIX, &text, sink);

        Ok(reading)
    }
}

fn publish_retained(
    hw: &mut impl MessagingPort,
    root: &str,
    suffix: &str,
    payload: &str,
    sink: &mut impl EventSink,
) {
    let result = topic_for(root, suffix).and_then(|topic| {
        log::debug!("Publishing {} to {}", payload, topic);
        hw.publish(&topic, payload.as_bytes(), true)
    });
    if let Err(e) = result {
        sink.emit(&AppEvent::PublishFailed(e));
    }
}
