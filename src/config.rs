//! Firmware tuning parameters
//!
//! Compile-time tunables for the battmon node.  These are *not* operator
//! settings; those live in the persisted
//! [`SettingsRecord`](crate::settings::SettingsRecord) and are edited through
//! the command transports.

use serde::{Deserialize, Serialize};

/// Fixed attempt count with a fixed inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryBudget {
    /// Maximum number of attempts before the operation is abandoned.
    pub max_attempts: u8,
    /// Delay between two attempts (milliseconds).
    pub delay_ms: u32,
}

/// Core firmware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareConfig {
    // --- Links ---
    /// Polls of the station status while joining the network.
    pub network_retry: RetryBudget,
    /// Connection attempts against the messaging broker.
    pub broker_retry: RetryBudget,

    // --- Timing ---
    /// Time allowed for retained publishes to drain before deep sleep (ms).
    pub publish_settle_ms: u32,
    /// Grace period between a restart request and the actual restart (ms).
    pub restart_grace_ms: u32,
    /// Minimum wall-clock spacing between two reports while awake (ms).
    pub min_report_spacing_ms: u32,
    /// Main loop pacing (ms).
    pub loop_interval_ms: u32,

    // --- Battery calibration ---
    /// Raw ADC count measured with a fresh battery pack.
    pub full_battery_raw: u16,
    /// Voltage of the same fresh pack, in hundredths of a volt.
    pub full_voltage_centivolts: u16,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            // Links
            network_retry: RetryBudget {
                max_attempts: 25,
                delay_ms: 500,
            },
            broker_retry: RetryBudget {
                max_attempts: 3,
                delay_ms: 1000,
            },

            // Timing
            publish_settle_ms: 400,
            restart_grace_ms: 2000,
            min_report_spacing_ms: 1000,
            loop_interval_ms: 50,

            // Two fresh alkaline cells
            full_battery_raw: 3178,
            full_voltage_centivolts: 318,
        }
    }
}
