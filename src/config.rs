//! Shared configuration for the firmware and the desktop simulator.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`.
//!
//! # Example
//!
//! ```rust
//! use catbox::config::{Config, SupervisorConfig, WebConfig, WifiConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.device.hostname.as_str(), "catbox");
//!
//! // Or customize
//! let config = Config::default()
//!     .with_wifi(WifiConfig::default().with_ssid("HomeWifi"))
//!     .with_web(WebConfig::default().with_port(8080))
//!     .with_supervisor(SupervisorConfig::default().with_dwell_threshold_ms(15_000));
//! ```

use heapless::String as HString;

use crate::sensors::LinePins;

/// Maximum length for short config strings (hostnames, SSIDs, passphrases)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let take = s.len().min(MAX_SHORT_STRING);
    // Find valid UTF-8 boundary
    let valid_end = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= take)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// WiFi connection configuration
    pub wifi: WifiConfig,
    /// HTTP control surface configuration
    pub web: WebConfig,
    /// Device identity and discovery
    pub device: DeviceConfig,
    /// Cleaning cycle timing
    pub cycle: CycleConfig,
    /// Main loop timing and dwell threshold
    pub supervisor: SupervisorConfig,
}

impl Config {
    /// Set WiFi configuration
    pub fn with_wifi(mut self, wifi: WifiConfig) -> Self {
        self.wifi = wifi;
        self
    }

    /// Set web configuration
    pub fn with_web(mut self, web: WebConfig) -> Self {
        self.web = web;
        self
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Set cycle configuration
    pub fn with_cycle(mut self, cycle: CycleConfig) -> Self {
        self.cycle = cycle;
        self
    }

    /// Set supervisor configuration
    pub fn with_supervisor(mut self, supervisor: SupervisorConfig) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// Configuration baked in at build time.
    ///
    /// Reads `CATBOX_WIFI_SSID`, `CATBOX_WIFI_PASSWORD` and
    /// `CATBOX_WIFI_BSSID` from the compile environment. Missing variables
    /// leave the corresponding field empty.
    pub fn from_build_env() -> Self {
        let mut wifi = WifiConfig::default();
        if let Some(ssid) = option_env!("CATBOX_WIFI_SSID") {
            wifi = wifi.with_ssid(ssid);
        }
        if let Some(password) = option_env!("CATBOX_WIFI_PASSWORD") {
            wifi = wifi.with_password(password);
        }
        if let Some(bssid) = option_env!("CATBOX_WIFI_BSSID") {
            wifi = wifi.with_bssid(bssid);
        }
        Self::default().with_wifi(wifi)
    }
}

// ============================================================================
// WiFi Config
// ============================================================================

/// WiFi connection configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WifiConfig {
    /// WiFi network SSID
    pub ssid: ShortString,
    /// WiFi password
    pub password: ShortString,
    /// BSSID of the access point to pin to, as `aa:bb:cc:dd:ee:ff`
    pub bssid: ShortString,
    /// How long to wait for link-up after associating, in milliseconds
    pub connect_timeout_ms: u32,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: ShortString::new(),
            password: ShortString::new(),
            bssid: ShortString::new(),
            connect_timeout_ms: 30_000,
        }
    }
}

impl WifiConfig {
    /// Set the SSID
    pub fn with_ssid(mut self, ssid: &str) -> Self {
        self.ssid = short_string(ssid);
        self
    }

    /// Set the password
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = short_string(password);
        self
    }

    /// Set the BSSID to pin to
    pub fn with_bssid(mut self, bssid: &str) -> Self {
        self.bssid = short_string(bssid);
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout_ms(mut self, ms: u32) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Check if WiFi credentials are configured
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty() && !self.bssid.is_empty()
    }
}

// ============================================================================
// Web Config
// ============================================================================

/// HTTP control surface configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WebConfig {
    /// Port to listen on
    pub port: u16,
    /// Whether to enable CORS for all origins (desktop server only)
    pub cors_permissive: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: 80,
            cors_permissive: false,
        }
    }
}

impl WebConfig {
    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set CORS mode
    pub fn with_cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Device identity and discovery configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// mDNS hostname (reachable as `<hostname>.local`)
    pub hostname: ShortString,
    /// Halt forever if the mDNS responder cannot start
    pub halt_on_mdns_failure: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            hostname: short_string("catbox"),
            halt_on_mdns_failure: false,
        }
    }
}

impl DeviceConfig {
    /// Set the mDNS hostname
    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = short_string(hostname);
        self
    }

    /// Halt at boot when mDNS fails instead of continuing
    pub fn with_halt_on_mdns_failure(mut self, halt: bool) -> Self {
        self.halt_on_mdns_failure = halt;
        self
    }
}

// ============================================================================
// Cycle Config
// ============================================================================

/// Cleaning cycle timing.
///
/// The defaults are the empirically tuned values for the reference drum;
/// the jiggle count and overshoot in particular are mechanical constants.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CycleConfig {
    /// Sensor poll cadence while waiting for a position
    pub poll_interval_ms: u32,
    /// Pause after stopping, before reversing direction
    pub settle_ms: u32,
    /// Number of alternating jiggle impulses (starting in reverse)
    pub jiggle_impulses: u8,
    /// Duration of each jiggle impulse
    pub jiggle_impulse_ms: u32,
    /// Extra reverse travel after the home sensor first asserts
    pub home_overshoot_ms: u32,
    /// Give up on a position wait after this long (`None` waits forever)
    pub sensor_timeout_ms: Option<u32>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            settle_ms: 1_000,
            jiggle_impulses: 4,
            jiggle_impulse_ms: 500,
            home_overshoot_ms: 6_500,
            sensor_timeout_ms: None,
        }
    }
}

impl CycleConfig {
    /// Set the sensor poll interval
    pub fn with_poll_interval_ms(mut self, ms: u32) -> Self {
        self.poll_interval_ms = ms.max(1);
        self
    }

    /// Set the settle pause
    pub fn with_settle_ms(mut self, ms: u32) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Set the jiggle pattern
    pub fn with_jiggle(mut self, impulses: u8, impulse_ms: u32) -> Self {
        self.jiggle_impulses = impulses;
        self.jiggle_impulse_ms = impulse_ms;
        self
    }

    /// Set the home overshoot
    pub fn with_home_overshoot_ms(mut self, ms: u32) -> Self {
        self.home_overshoot_ms = ms;
        self
    }

    /// Bound every position wait
    pub fn with_sensor_timeout_ms(mut self, ms: Option<u32>) -> Self {
        self.sensor_timeout_ms = ms;
        self
    }
}

// ============================================================================
// Supervisor Config
// ============================================================================

/// Main loop configuration
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SupervisorConfig {
    /// Minimum continuous cat presence that triggers a cycle
    pub dwell_threshold_ms: u32,
    /// Poll cadence while a cat is in the box
    pub poll_interval_ms: u32,
    /// Pause between loop iterations
    pub loop_interval_ms: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            dwell_threshold_ms: 10_000,
            poll_interval_ms: 100,
            loop_interval_ms: 10,
        }
    }
}

impl SupervisorConfig {
    /// Set the dwell threshold
    pub fn with_dwell_threshold_ms(mut self, ms: u32) -> Self {
        self.dwell_threshold_ms = ms;
        self
    }

    /// Set the dwell poll interval
    pub fn with_poll_interval_ms(mut self, ms: u32) -> Self {
        self.poll_interval_ms = ms.max(1);
        self
    }

    /// Set the pause between loop iterations
    pub fn with_loop_interval_ms(mut self, ms: u32) -> Self {
        self.loop_interval_ms = ms;
        self
    }
}

// ============================================================================
// Pin Config
// ============================================================================

/// GPIO assignment.
///
/// The default is the reference board: hall sensors on 5 (home) and 4
/// (dump), cat switch on 13, H-bridge on 14 (forward) and 12 (reverse),
/// request LED on 2 (active-low).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PinConfig {
    /// Sensor input lines
    pub sensors: LinePins,
    /// H-bridge forward line
    pub motor_forward: i32,
    /// H-bridge reverse line
    pub motor_reverse: i32,
    /// Request LED
    pub led: i32,
    /// LED lights when the line is driven low
    pub led_active_low: bool,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            sensors: LinePins {
                home: 5,
                dump: 4,
                cat: 13,
            },
            motor_forward: 14,
            motor_reverse: 12,
            led: 2,
            led_active_low: true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
