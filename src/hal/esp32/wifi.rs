//! Station-mode WiFi pinned to one access point.
//!
//! Every association attempt scans, logs what it sees, picks the radio whose
//! BSSID matches the configuration and associates with that channel and
//! BSSID fixed.
//!
//! # Example
//!
//! ```ignore
//! use catbox::hal::esp32::Esp32Wifi;
//! use catbox::config::WifiConfig;
//! use catbox::traits::Connectivity;
//!
//! let config = WifiConfig::default()
//!     .with_ssid("MyNetwork")
//!     .with_password("secret123")
//!     .with_bssid("aa:bb:cc:dd:ee:ff");
//!
//! let mut wifi = Esp32Wifi::new(modem, sysloop, nvs, &config)?;
//! if let Err(e) = wifi.connect() {
//!     log::warn!("wifi: {e}");
//! }
//! ```

use core::time::Duration;
use std::net::Ipv4Addr;

use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use esp_idf_sys::{esp_err_t, EspError, ESP_ERR_TIMEOUT};
use log::info;

use crate::config::WifiConfig;
use crate::connectivity::{select_access_point, station_ssid, AccessPoint, Bssid, ConnectError};
use crate::traits::Connectivity;

fn driver_error(e: EspError) -> ConnectError {
    if e.code() == ESP_ERR_TIMEOUT as esp_err_t {
        ConnectError::Timeout
    } else {
        ConnectError::Driver(e.code())
    }
}

/// WiFi connection manager for ESP32.
pub struct Esp32Wifi<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
    config: WifiConfig,
}

impl<'a> Esp32Wifi<'a> {
    /// Initializes and starts the WiFi driver in station mode.
    ///
    /// Does not associate; call [`Connectivity::connect`].
    ///
    /// # Errors
    ///
    /// Returns an error if the WiFi driver cannot be initialized or started.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        config: &WifiConfig,
    ) -> Result<Self, EspError> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

        wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        info!("wifi: starting");
        wifi.start()?;

        Ok(Self {
            wifi,
            config: config.clone(),
        })
    }

    /// Get the current IP address, if connected.
    pub fn ip_addr(&self) -> Option<Ipv4Addr> {
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
    }

    fn scan(&mut self) -> Result<Vec<AccessPoint>, ConnectError> {
        info!("wifi: scanning");
        let found = self.wifi.scan().map_err(driver_error)?;
        info!("wifi: {} networks found", found.len());

        let aps: Vec<AccessPoint> = found
            .iter()
            .map(|ap| {
                AccessPoint::new(
                    ap.ssid.as_str(),
                    Bssid(ap.bssid),
                    ap.channel,
                    ap.signal_strength,
                )
            })
            .collect();
        for (i, ap) in aps.iter().enumerate() {
            info!("wifi: {}: {ap}", i + 1);
        }
        Ok(aps)
    }
}

impl Connectivity for Esp32Wifi<'_> {
    type Error = ConnectError;

    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn connect(&mut self) -> Result<(), ConnectError> {
        if !self.config.is_configured() {
            return Err(ConnectError::NotConfigured);
        }
        let target: Bssid = self.config.bssid.parse()?;
        let ssid = station_ssid(self.config.ssid.as_str())?;

        let aps = self.scan()?;
        let ap = select_access_point(&aps, target)
            .cloned()
            .ok_or(ConnectError::NoMatchingAccessPoint)?;
        info!("wifi: selected {ap}");

        // ShortString has the driver's 64-byte passphrase capacity
        let password = self.config.password.clone();
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid,
                password,
                auth_method,
                bssid: Some(ap.bssid.0),
                channel: Some(ap.channel),
                ..Default::default()
            }))
            .map_err(driver_error)?;

        info!("wifi: connecting to {} on channel {}", ap.bssid, ap.channel);
        self.wifi.connect().map_err(driver_error)?;

        let timeout = Duration::from_millis(u64::from(self.config.connect_timeout_ms));
        self.wifi
            .ip_wait_while(|| self.wifi.is_up().map(|up| !up), Some(timeout))
            .map_err(driver_error)?;

        match self.ip_addr() {
            Some(ip) => info!("wifi: connected, ip {ip}"),
            None => info!("wifi: connected"),
        }
        Ok(())
    }

    fn mac_address(&self) -> Option<[u8; 6]> {
        self.wifi.wifi().sta_netif().get_mac().ok()
    }
}
