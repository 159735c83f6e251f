//! Access point selection and service discovery helpers.
//!
//! The station pins itself to one access point by BSSID so that multi-AP
//! deployments always associate with the same radio. The platform layer
//! scans, hands the results to [`select_access_point`], and associates with
//! the returned channel and BSSID.
//!
//! # Example
//!
//! ```rust
//! use catbox::connectivity::{select_access_point, AccessPoint, Bssid};
//!
//! let target: Bssid = "AA:bb:cc:00:11:22".parse().unwrap();
//! let scan = [
//!     AccessPoint::new("home", "aa:bb:cc:00:11:21".parse().unwrap(), 1, -70),
//!     AccessPoint::new("home", target, 11, -48),
//! ];
//!
//! let ap = select_access_point(&scan, target).unwrap();
//! assert_eq!(ap.channel, 11);
//! assert_eq!(target.to_string(), "AA:BB:CC:00:11:22");
//! ```

use alloc::string::String;
use core::fmt;
use core::str::FromStr;

use embedded_hal::delay::DelayNs;
use log::{error, info};

use crate::config::{short_string, DeviceConfig, ShortString};
use crate::traits::ServiceAdvertiser;

// ============================================================================
// BSSID
// ============================================================================

/// Hardware address of an access point radio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bssid(pub [u8; 6]);

/// Error parsing a [`Bssid`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BssidParseError {
    /// Not exactly six colon-separated octets.
    Length(usize),
    /// An octet is not two hexadecimal digits.
    Octet(usize),
}

impl fmt::Display for BssidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length(n) => write!(f, "expected 6 octets, found {n}"),
            Self::Octet(i) => write!(f, "octet {i} is not two hex digits"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BssidParseError {}

impl FromStr for Bssid {
    type Err = BssidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut count = 0;
        for (i, part) in s.trim().split(':').enumerate() {
            if i >= octets.len() {
                count = i + 1;
                continue;
            }
            if part.len() != 2 {
                return Err(BssidParseError::Octet(i));
            }
            octets[i] = u8::from_str_radix(part, 16).map_err(|_| BssidParseError::Octet(i))?;
            count = i + 1;
        }
        if count != octets.len() {
            return Err(BssidParseError::Length(count));
        }
        Ok(Bssid(octets))
    }
}

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl From<[u8; 6]> for Bssid {
    fn from(octets: [u8; 6]) -> Self {
        Bssid(octets)
    }
}

// ============================================================================
// Scan results
// ============================================================================

/// One network seen during a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessPoint {
    /// Network name.
    pub ssid: ShortString,
    /// Radio address.
    pub bssid: Bssid,
    /// Primary channel.
    pub channel: u8,
    /// Signal strength in dBm.
    pub rssi: i8,
}

impl AccessPoint {
    /// Builds a scan entry.
    pub fn new(ssid: &str, bssid: Bssid, channel: u8, rssi: i8) -> Self {
        Self {
            ssid: short_string(ssid),
            bssid,
            channel,
            rssi,
        }
    }
}

impl fmt::Display for AccessPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} dBm) ch {} {}",
            self.ssid, self.rssi, self.channel, self.bssid
        )
    }
}

/// Picks the scan entry whose BSSID equals `target`.
///
/// SSID and signal strength play no part: the station associates with that
/// exact radio or not at all.
pub fn select_access_point(scan: &[AccessPoint], target: Bssid) -> Option<&AccessPoint> {
    scan.iter().find(|ap| ap.bssid == target)
}

/// Longest SSID an 802.11 network can have, in bytes.
pub const MAX_SSID_LEN: usize = 32;

/// Copies `ssid` into the buffer the station driver takes.
///
/// # Errors
///
/// [`ConnectError::SsidTooLong`] when `ssid` exceeds [`MAX_SSID_LEN`] bytes.
pub fn station_ssid(ssid: &str) -> Result<heapless::String<MAX_SSID_LEN>, ConnectError> {
    let mut out = heapless::String::new();
    out.push_str(ssid)
        .map_err(|()| ConnectError::SsidTooLong(ssid.len()))?;
    Ok(out)
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of one association attempt.
///
/// Every variant is recoverable: the supervisor retries on its next
/// iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectError {
    /// SSID or BSSID missing from the configuration.
    NotConfigured,
    /// Configured BSSID does not parse.
    InvalidBssid(BssidParseError),
    /// Configured SSID is longer than [`MAX_SSID_LEN`] bytes.
    SsidTooLong(usize),
    /// Scan finished without seeing the configured BSSID.
    NoMatchingAccessPoint,
    /// Associated but the link did not come up in time.
    Timeout,
    /// Error code from the Wi-Fi driver.
    Driver(i32),
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "wifi credentials not configured"),
            Self::InvalidBssid(e) => write!(f, "configured bssid is invalid: {e}"),
            Self::SsidTooLong(len) => {
                write!(f, "configured ssid is {len} bytes, at most {MAX_SSID_LEN} allowed")
            }
            Self::NoMatchingAccessPoint => write!(f, "configured bssid not found in scan"),
            Self::Timeout => write!(f, "timed out waiting for link-up"),
            Self::Driver(code) => write!(f, "wifi driver error {code}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConnectError {}

impl From<BssidParseError> for ConnectError {
    fn from(e: BssidParseError) -> Self {
        Self::InvalidBssid(e)
    }
}

/// The mDNS responder could not be started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvertiseError {
    /// Hostname that was being registered.
    pub hostname: ShortString,
    /// Responder error, formatted.
    pub detail: String,
}

impl fmt::Display for AdvertiseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mdns responder for {}.local failed: {}", self.hostname, self.detail)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AdvertiseError {}

// ============================================================================
// Discovery
// ============================================================================

/// Registers `<hostname>.local` and the HTTP service.
///
/// On failure the error is logged and returned so boot can carry on without
/// discovery. If [`DeviceConfig::halt_on_mdns_failure`] is set the device
/// instead parks here forever, sleeping on `delay`.
pub fn advertise<A, D>(
    advertiser: &mut A,
    device: &DeviceConfig,
    http_port: u16,
    delay: &mut D,
) -> Result<(), AdvertiseError>
where
    A: ServiceAdvertiser,
    D: DelayNs,
{
    match advertiser.advertise(device.hostname.as_str(), http_port) {
        Ok(()) => {
            info!("mDNS responder started: {}.local", device.hostname);
            Ok(())
        }
        Err(e) => {
            let err = AdvertiseError {
                hostname: device.hostname.clone(),
                detail: alloc::format!("{e:?}"),
            };
            error!("{err}");
            if device.halt_on_mdns_failure {
                error!("halting: mDNS is required by configuration");
                loop {
                    delay.delay_ms(1_000);
                }
            }
            Err(err)
        }
    }
}
