//! Configuration soft-AP adapter.
//!
//! Brings up the `ESP_DASH` access point and implements [`ClientMonitor`]
//! by reading the AP station table.  The count is a cheap query against
//! the driver's own table, so sampling never blocks the tick loop.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi` in access-point mode.
//! - **all other targets**: a settable station count for host tests.

use log::info;

use crate::app::ports::ClientMonitor;
use crate::portal::PortalInfo;

#[cfg(target_os = "espidf")]
use crate::error::{Error, Result};
#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    nvs::EspDefaultNvsPartition,
    wifi::{AccessPointConfiguration, AuthMethod, BlockingWifi, Configuration, EspWifi},
};

pub struct SoftAp {
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    #[cfg(not(target_os = "espidf"))]
    stations: u8,
    last_count: u8,
}

#[cfg(target_os = "espidf")]
impl SoftAp {
    /// Configure and start the access point described by `info`.
    pub fn start(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        info: &PortalInfo,
    ) -> Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs)).map_err(|_| Error::Init("wifi driver"))?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop).map_err(|_| Error::Init("wifi event loop"))?;

        let ap = AccessPointConfiguration {
            ssid: info.ssid.try_into().map_err(|()| Error::Init("ap ssid"))?,
            password: info.password.try_into().map_err(|()| Error::Init("ap password"))?,
            channel: info.channel,
            auth_method: AuthMethod::WPA2Personal,
            max_connections: u16::from(info.max_clients),
            ..Default::default()
        };
        wifi.set_configuration(&Configuration::AccessPoint(ap))
            .map_err(|_| Error::Init("ap config"))?;
        wifi.start().map_err(|_| Error::Init("ap start"))?;
        wifi.wait_netif_up().map_err(|_| Error::Init("ap netif"))?;

        info!(
            "SoftAp: '{}' up on channel {} (max {} clients)",
            info.ssid, info.channel, info.max_clients
        );
        Ok(Self { wifi, last_count: 0 })
    }

    /// Address of the AP interface, e.g. `192.168.4.1`.
    pub fn address(&self) -> Option<heapless::String<16>> {
        use core::fmt::Write as _;
        let ip = self.wifi.wifi().ap_netif().get_ip_info().ok()?.ip;
        let mut s = heapless::String::new();
        write!(s, "{}", ip).ok()?;
        Some(s)
    }

    fn platform_station_count(&mut self) -> u8 {
        let mut list: esp_idf_svc::sys::wifi_sta_list_t = Default::default();
        // SAFETY: `list` is a live, correctly sized out-parameter.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_ap_get_sta_list(&mut list) };
        if ret == esp_idf_svc::sys::ESP_OK {
            list.num.clamp(0, i32::from(u8::MAX)) as u8
        } else {
            self.last_count
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl SoftAp {
    pub fn start(info: &PortalInfo) -> Self {
        info!("SoftAp(sim): '{}' on channel {}", info.ssid, info.channel);
        Self {
            stations: 0,
            last_count: 0,
        }
    }

    pub fn address(&self) -> Option<heapless::String<16>> {
        None
    }

    /// Simulate stations joining or leaving.
    pub fn set_stations(&mut self, n: u8) {
        self.stations = n;
    }

    fn platform_station_count(&mut self) -> u8 {
        self.stations
    }
}

impl ClientMonitor for SoftAp {
    fn connected_clients(&mut self) -> u8 {
        let n = self.platform_station_count();
        if n != self.last_count {
            info!("SoftAp: {} -> {} station(s)", self.last_count, n);
            self.last_count = n;
        }
        n
    }
}
