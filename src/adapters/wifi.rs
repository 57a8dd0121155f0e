//! WiFi station-mode adapter.
//!
//! Implements [`NetworkPort`], the hexagonal boundary for network
//! connectivity.  Joining is non-blocking: [`begin_join`] configures the
//! station and kicks off association; the controller polls
//! [`is_joined`] under its own retry budget.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Static addressing
//!
//! A fixed configuration is applied by swapping in a station netif with a
//! `Fixed` IPv4 client setting.  The address doubles as gateway.
//!
//! [`begin_join`]: NetworkPort::begin_join
//! [`is_joined`]: NetworkPort::is_joined

use core::net::Ipv4Addr;
use log::{info, warn};

use crate::app::ports::{JoinParams, NetworkPort};
use crate::error::CommsError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    ipv4::{
        ClientConfiguration as IpClientConfiguration, ClientSettings as IpClientSettings,
        Configuration as IpConfiguration, Mask, Subnet,
    },
    netif::{EspNetif, NetifConfiguration},
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};

/// Driver-imposed limits.
pub const SSID_LIMIT: usize = 32;
pub const PASSPHRASE_LIMIT: usize = 64;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

/// The persisted fields are wider than the radio accepts.
fn validate(params: &JoinParams) -> Result<(), CommsError> {
    if params.ssid.is_empty() || params.ssid.len() > SSID_LIMIT {
        return Err(CommsError::InvalidCredentials);
    }
    if params.password.len() > PASSPHRASE_LIMIT {
        return Err(CommsError::InvalidCredentials);
    }
    Ok(())
}

/// Prefix length of a contiguous netmask.
pub fn prefix_len(netmask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(netmask);
    let ones = bits.leading_ones();
    (bits.checked_shl(ones).unwrap_or(0) == 0).then_some(ones as u8)
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiStation {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimNetwork,
    /// Whether the currently installed station netif is a fixed one.
    static_netif: bool,
}

impl WifiStation {
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self, esp_idf_svc::sys::EspError> {
        let wifi = EspWifi::new(modem, sysloop, Some(nvs))?;
        Ok(Self {
            wifi,
            static_netif: false,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            sim: SimNetwork::default(),
            static_netif: false,
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn apply_addressing(&mut self, static_ip: Option<(Ipv4Addr, Ipv4Addr)>) -> Result<(), CommsError> {
        let conf = match static_ip {
            Some((address, netmask)) => {
                let Some(bits) = prefix_len(netmask) else {
                    warn!("WiFi: netmask {} is not contiguous, using DHCP", netmask);
                    return self.apply_addressing(None);
                };
                let mut conf = NetifConfiguration::wifi_default_client();
                conf.ip_configuration = Some(IpConfiguration::Client(IpClientConfiguration::Fixed(
                    IpClientSettings {
                        ip: address,
                        subnet: Subnet {
                            gateway: address,
                            mask: Mask(bits),
                        },
                        dns: None,
                        secondary_dns: None,
                    },
                )));
                info!("WiFi: static address {}/{}", address, bits);
                conf
            }
            None if self.static_netif => NetifConfiguration::wifi_default_client(),
            None => return Ok(()),
        };

        let netif = EspNetif::new_with_conf(&conf).map_err(|e| {
            warn!("WiFi: netif creation failed: {}", e);
            CommsError::JoinFailed
        })?;
        self.wifi.swap_netif_sta(netif).map_err(|e| {
            warn!("WiFi: netif swap failed: {}", e);
            CommsError::JoinFailed
        })?;
        self.static_netif = static_ip.is_some();
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_join(&mut self, params: &JoinParams) -> Result<(), CommsError> {
        let auth_method = if params.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };

        if self.wifi.is_started().unwrap_or(false) {
            let _ = self.wifi.disconnect();
            let _ = self.wifi.stop();
        }
        self.apply_addressing(params.static_ip)?;

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: params
                    .ssid
                    .as_str()
                    .try_into()
                    .map_err(|_| CommsError::InvalidCredentials)?,
                password: params
                    .password
                    .as_str()
                    .try_into()
                    .map_err(|_| CommsError::InvalidCredentials)?,
                auth_method,
                ..Default::default()
            }))
            .map_err(|e| {
                warn!("WiFi: configuration rejected: {}", e);
                CommsError::JoinFailed
            })?;

        self.wifi.start().map_err(|_| CommsError::JoinFailed)?;
        self.wifi.connect().map_err(|e| {
            warn!("WiFi: connect request failed: {}", e);
            CommsError::JoinFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_join(&mut self, params: &JoinParams) -> Result<(), CommsError> {
        self.sim.join_requests += 1;
        self.static_netif = params.static_ip.is_some();
        self.sim.joined = self.sim.reachable;
        self.sim.address = self.sim.joined.then(|| {
            params
                .static_ip
                .map_or(SimNetwork::DHCP_ADDRESS, |(address, _)| address)
        });
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_joined(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.sta_netif().is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_joined(&self) -> bool {
        self.sim.joined
    }

    #[cfg(target_os = "espidf")]
    fn platform_local_ip(&self) -> Option<Ipv4Addr> {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
            .filter(|ip| !ip.is_unspecified())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_local_ip(&self) -> Option<Ipv4Addr> {
        self.sim.address
    }

    #[cfg(target_os = "espidf")]
    fn platform_leave(&mut self) {
        let _ = self.wifi.disconnect();
        let _ = self.wifi.stop();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_leave(&mut self) {
        self.sim.joined = false;
        self.sim.address = None;
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Debug)]
struct SimNetwork {
    reachable: bool,
    joined: bool,
    address: Option<Ipv4Addr>,
    join_requests: u32,
}

#[cfg(not(target_os = "espidf"))]
impl SimNetwork {
    const DHCP_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);
}

#[cfg(not(target_os = "espidf"))]
impl Default for SimNetwork {
    fn default() -> Self {
        Self {
            reachable: true,
            joined: false,
            address: None,
            join_requests: 0,
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiStation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiStation {
    /// Whether a simulated access point answers.
    pub fn set_reachable(&mut self, reachable: bool) {
        self.sim.reachable = reachable;
    }

    pub fn join_requests(&self) -> u32 {
        self.sim.join_requests
    }

    pub fn uses_static_address(&self) -> bool {
        self.static_netif
    }
}

// ───────────────────────────────────────────────────────────────
// NetworkPort
// ───────────────────────────────────────────────────────────────

impl NetworkPort for WifiStation {
    fn begin_join(&mut self, params: &JoinParams) -> Result<(), CommsError> {
        validate(params)?;
        info!("WiFi: joining '{}'", params.ssid);
        self.platform_join(params).inspect_err(|e| warn!("WiFi: join failed: {}", e))
    }

    fn is_joined(&self) -> bool {
        self.platform_is_joined()
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.platform_local_ip()
    }

    fn leave(&mut self) {
        self.platform_leave();
        info!("WiFi: disconnected");
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
