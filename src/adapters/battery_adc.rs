//! Battery ADC adapter.
//!
//! Samples the battery divider on one ADC1 oneshot channel and implements
//! [`BatteryPort`].  The raw count is returned unscaled; conversion to volts
//! lives in the telemetry reporter.
//!
//! - **`target_os = "espidf"`**: raw `adc_oneshot_*` calls from `esp-idf-sys`,
//!   12-bit width, 12 dB attenuation.
//! - **`not(target_os = "espidf")`**: an injectable simulated count.

use crate::app::ports::BatteryPort;
use crate::error::SensorError;
use log::info;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// ADC1 channel wired to the battery divider (GPIO36 on the ESP32).
pub const BATTERY_CHANNEL: u32 = 0;

pub struct BatteryAdc {
    #[cfg(target_os = "espidf")]
    handle: adc_oneshot_unit_handle_t,
    #[cfg(not(target_os = "espidf"))]
    simulated: Option<u16>,
}

impl BatteryAdc {
    /// Bring up ADC1 and configure the battery channel.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, SensorError> {
        let init_cfg = adc_oneshot_unit_init_cfg_t {
            unit_id: adc_unit_t_ADC_UNIT_1,
            ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
            ..Default::default()
        };
        let mut handle: adc_oneshot_unit_handle_t = core::ptr::null_mut();
        // SAFETY: called once from main before the event loop; the handle
        // is owned by this adapter from here on.
        let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &mut handle) };
        if ret != ESP_OK {
            log::error!("BatteryAdc: ADC1 init failed (rc={})", ret);
            return Err(SensorError::AdcReadFailed);
        }

        let chan_cfg = adc_oneshot_chan_cfg_t {
            atten: adc_atten_t_ADC_ATTEN_DB_12,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
        };
        let ret = unsafe { adc_oneshot_config_channel(handle, BATTERY_CHANNEL, &chan_cfg) };
        if ret != ESP_OK {
            log::error!("BatteryAdc: channel config failed (rc={})", ret);
            return Err(SensorError::AdcReadFailed);
        }

        info!("BatteryAdc: ADC1 CH{} configured", BATTERY_CHANNEL);
        Ok(Self { handle })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, SensorError> {
        info!("BatteryAdc(sim): full-scale battery");
        Ok(Self {
            simulated: Some(crate::config::FirmwareConfig::default().full_battery_raw),
        })
    }

    /// Set the next simulated count; `None` makes sampling fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_simulated(&mut self, raw: Option<u16>) {
        self.simulated = raw;
    }
}

impl BatteryPort for BatteryAdc {
    #[cfg(target_os = "espidf")]
    fn sample(&mut self) -> Result<u16, SensorError> {
        let mut raw: i32 = 0;
        // SAFETY: handle was created in new() and is only used from the
        // main task.
        let ret = unsafe { adc_oneshot_read(self.handle, BATTERY_CHANNEL, &mut raw) };
        if ret != ESP_OK {
            return Err(SensorError::AdcReadFailed);
        }
        u16::try_from(raw).map_err(|_| SensorError::AdcReadFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn sample(&mut self) -> Result<u16, SensorError> {
        self.simulated.ok_or(SensorError::AdcReadFailed)
    }
}

#[cfg(target_os = "espidf")]
impl Drop for BatteryAdc {
    fn drop(&mut self) {
        // SAFETY: handle is valid and not used after this point.
        unsafe {
            adc_oneshot_del_unit(self.handle);
        }
    }
}
