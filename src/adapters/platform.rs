//! ESP32 platform adapter: clock, restart, deep sleep, entropy, delay.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()`, `esp_restart()`,
//!   `esp_deep_sleep()`, `esp_random()` and the ROM busy-wait delay.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` plus a
//!   seeded xorshift generator.  Restart and deep sleep are recorded rather
//!   than executed so host tests can observe them.

use embedded_hal::delay::DelayNs;
use log::info;

use crate::app::ports::{EntropyPort, PlatformPort};

pub struct Esp32Platform {
    #[cfg(target_os = "espidf")]
    delay: esp_idf_hal::delay::Delay,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    rng_state: u32,
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
    #[cfg(not(target_os = "espidf"))]
    last_sleep: Option<u32>,
}

impl Default for Esp32Platform {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32Platform {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            delay: esp_idf_hal::delay::Delay::new_default(),
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            rng_state: 0x2545_F491,
            #[cfg(not(target_os = "espidf"))]
            restarts: 0,
            #[cfg(not(target_os = "espidf"))]
            last_sleep: None,
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Esp32Platform {
    /// Simulation with a fixed entropy seed.
    pub fn with_seed(seed: u32) -> Self {
        Self {
            rng_state: seed.max(1),
            ..Self::new()
        }
    }

    /// Number of restarts requested so far.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Duration of the last requested deep sleep.
    pub fn last_sleep(&self) -> Option<u32> {
        self.last_sleep
    }
}

impl PlatformPort for Esp32Platform {
    #[cfg(target_os = "espidf")]
    fn uptime_ms(&self) -> u64 {
        // SAFETY: esp_timer_get_time() is thread-safe and has no preconditions.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    #[cfg(target_os = "espidf")]
    fn restart(&mut self) {
        info!("Platform: restarting");
        // SAFETY: esp_restart() never returns.
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) {
        self.restarts += 1;
        info!("Platform(sim): restart #{}", self.restarts);
    }

    #[cfg(target_os = "espidf")]
    fn deep_sleep(&mut self, seconds: u32) {
        info!("Platform: deep sleep for {}s", seconds);
        // SAFETY: esp_deep_sleep() never returns; waking is a cold boot.
        unsafe { esp_idf_svc::sys::esp_deep_sleep(u64::from(seconds) * 1_000_000) };
    }

    #[cfg(not(target_os = "espidf"))]
    fn deep_sleep(&mut self, seconds: u32) {
        self.last_sleep = Some(seconds);
        info!("Platform(sim): deep sleep for {}s", seconds);
    }
}

impl EntropyPort for Esp32Platform {
    #[cfg(target_os = "espidf")]
    fn random_u16(&mut self) -> u16 {
        // SAFETY: esp_random() has no preconditions.  It is only truly
        // random with the radio on, which is good enough for a client id.
        (unsafe { esp_idf_svc::sys::esp_random() }) as u16
    }

    #[cfg(not(target_os = "espidf"))]
    fn random_u16(&mut self) -> u16 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng_state = x;
        (x >> 8) as u16
    }
}

impl DelayNs for Esp32Platform {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        self.delay.delay_ns(ns);
    }

    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        // Yields to FreeRTOS for anything over a tick.
        self.delay.delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}
