//! Battmon firmware main entry point.
//!
//! Hexagonal architecture: one wake cycle per boot, deep sleep in between.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiStation   MqttClient   BatteryAdc   Esp32Platform         │
//! │  (Network)     (Messaging)  (Battery)    (Clock/Power/RNG)     │
//! │  SerialConsole NvsRecordStorage          LogEventSink          │
//! │  (Console)     (RecordStorage)           (EventSink)           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          LifecycleController (pure logic)              │    │
//! │  │  FSM · SettingsStore · Command interpreter             │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use embedded_hal::delay::DelayNs;
use log::info;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use battmon::adapters::battery_adc::BatteryAdc;
use battmon::adapters::log_sink::LogEventSink;
use battmon::adapters::mqtt::MqttClient;
use battmon::adapters::node::NodeHardware;
use battmon::adapters::nvs::NvsRecordStorage;
use battmon::adapters::platform::Esp32Platform;
use battmon::adapters::serial_console::SerialConsole;
use battmon::adapters::wifi::WifiStation;
use battmon::app::lifecycle::LifecycleController;
use battmon::config::FirmwareConfig;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Battmon v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // SAFETY: reading the wakeup cause has no preconditions.
    let cause = unsafe { esp_idf_svc::sys::esp_sleep_get_wakeup_cause() };
    if cause == esp_idf_svc::sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER {
        info!("Boot: deep-sleep timer wake");
    } else {
        info!("Boot: power-on or reset (cause {})", cause);
    }

    // ── 2. Persisted settings region ──────────────────────────
    // Initialised before the WiFi driver claims the default partition.
    let storage = NvsRecordStorage::new()?;

    // ── 3. Construct adapters ─────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let mut hw = NodeHardware::new(
        WifiStation::new(peripherals.modem, sysloop, nvs)?,
        MqttClient::new(),
        BatteryAdc::new()?,
        Esp32Platform::new(),
        SerialConsole::new()?,
    );
    let mut log_sink = LogEventSink::new();

    // ── 4. Boot the lifecycle ─────────────────────────────────
    let mut node = LifecycleController::new(storage, FirmwareConfig::default());
    let status = node.boot(&mut hw, &mut log_sink);
    let loop_interval_ms = node.config().loop_interval_ms;
    info!("System ready ({:?}). Entering main loop.", status);

    // ── 5. Main loop ──────────────────────────────────────────
    // Deep sleep and restart never return, so this only spins while the
    // node is awake.
    loop {
        node.tick(&mut hw, &mut log_sink);
        hw.delay_ms(loop_interval_ms);
    }
}
