//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements         | Connects to                 |
//! |------------------|--------------------|-----------------------------|
//! | `battery_adc`    | BatteryPort        | ESP32 ADC1 oneshot          |
//! | `log_sink`       | EventSink          | Serial log output           |
//! | `mqtt`           | MessagingPort      | ESP-IDF MQTT client         |
//! | `nvs`            | RecordStoragePort  | NVS blob / in-memory image  |
//! | `platform`       | PlatformPort       | ESP32 timer, sleep, restart |
//! |                  | EntropyPort        | Hardware RNG                |
//! |                  | DelayNs            | FreeRTOS / ROM delay        |
//! | `serial_console` | ConsolePort        | UART0 line input            |
//! | `wifi`           | NetworkPort        | ESP-IDF WiFi STA            |
//! | `node`           | all of the above   | Composite `NodeHardware`    |

pub mod battery_adc;
pub mod log_sink;
pub mod mqtt;
pub mod node;
pub mod nvs;
pub mod platform;
pub mod serial_console;
pub mod wifi;
