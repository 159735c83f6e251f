//! CatBox firmware entry point.
//!
//! Boot order:
//! - sensor inputs and their edge interrupts
//! - motor bridge (stopped) and request LED (off)
//! - Wi-Fi, pinned to the configured BSSID
//! - mDNS `catbox.local`
//! - HTTP control surface on its own task
//!
//! then hands the main task to the supervisor loop.
//!
//! # Build
//!
//! ```bash
//! CATBOX_WIFI_SSID=MyNetwork \
//! CATBOX_WIFI_PASSWORD=secret \
//! CATBOX_WIFI_BSSID=AA:BB:CC:DD:EE:FF \
//!     cargo build --release --bin esp32_main --features esp32-http
//! ```

use std::sync::{Arc, Mutex};

use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use catbox::connectivity::advertise;
use catbox::control::{ControlState, ControlSurface};
use catbox::hal::esp32::{
    esp32_motor, Esp32Clock, Esp32HttpServer, Esp32Mdns, Esp32Wifi, SensorLines, StatusLed,
};
use catbox::traits::Connectivity;
use catbox::{Config, CycleEngine, PinConfig, Supervisor, SENSORS};

fn main() -> anyhow::Result<()> {
    esp_idf_sys::link_patches();
    EspLogger::initialize_default();

    info!("CatBox {} booting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_build_env();
    let pins = PinConfig::default();
    let peripherals = Peripherals::take()?;

    // =========================================================================
    // Sensors (GPIO 5 home, 4 dump, 13 cat)
    // =========================================================================
    let _sensors = SensorLines::new(
        peripherals.pins.gpio5.into(),
        peripherals.pins.gpio4.into(),
        peripherals.pins.gpio13.into(),
    )?;

    // =========================================================================
    // Motor (L298N IN1 = GPIO14, IN2 = GPIO12)
    // =========================================================================
    let motor = esp32_motor(peripherals.pins.gpio14.into(), peripherals.pins.gpio12.into())
        .map_err(|e| anyhow::anyhow!("motor init failed: {e:?}"))?;
    info!("motor: stopped");

    // =========================================================================
    // Request LED (GPIO2)
    // =========================================================================
    let led = StatusLed::new(peripherals.pins.gpio2.into(), pins.led_active_low)?;

    // =========================================================================
    // Wi-Fi
    // =========================================================================
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let mut wifi = Esp32Wifi::new(peripherals.modem, sysloop, Some(nvs), &config.wifi)?;
    if !config.wifi.is_configured() {
        warn!("wifi: no SSID/BSSID compiled in (set CATBOX_WIFI_SSID and CATBOX_WIFI_BSSID)");
    }
    if let Err(e) = wifi.connect() {
        warn!("wifi: initial association failed: {e}");
    }
    if let Some(mac) = wifi.mac_address() {
        info!("wifi: station MAC {}", catbox::connectivity::Bssid(mac));
    }

    // =========================================================================
    // mDNS
    // =========================================================================
    let mut mdns = Esp32Mdns::new();
    let mut clock = Esp32Clock::new();
    if advertise(&mut mdns, &config.device, config.web.port, &mut clock).is_err() {
        warn!("mdns: continuing without discovery");
    }

    // =========================================================================
    // HTTP control surface
    // =========================================================================
    let control = Arc::new(ControlState::new());
    let surface = ControlSurface::new(Arc::clone(&control), led, &SENSORS);
    let _server = Esp32HttpServer::new(&config.web, Arc::new(Mutex::new(surface)))?;

    // =========================================================================
    // Supervisor
    // =========================================================================
    let engine = CycleEngine::new(motor, &SENSORS, clock, config.cycle.clone());
    let mut supervisor = Supervisor::new(engine, wifi, control, config.supervisor.clone());
    supervisor.run()
}
