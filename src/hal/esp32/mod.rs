//! ESP32 hardware abstraction layer for the litter box.
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32 (Xtensa, 4MB Flash)
//! - **Motor Driver**: L298N H-bridge, one input per direction, enable jumpered high
//! - **Position Sensors**: two open-drain hall switches (home, dump)
//! - **Cat Sensor**: switch, drives the line high when a cat is present
//! - **Indicator**: onboard LED, active-low
//!
//! # Pin Assignments
//!
//! See the [`pins`] module for GPIO assignments on the reference board.

mod clock;
mod led;
mod motor;
mod sensors;

pub use clock::Esp32Clock;
pub use led::StatusLed;
pub use motor::{esp32_motor, Esp32Motor};
pub use sensors::SensorLines;

#[cfg(feature = "wifi")]
mod mdns;
#[cfg(feature = "wifi")]
mod wifi;
#[cfg(feature = "wifi")]
pub use mdns::Esp32Mdns;
#[cfg(feature = "wifi")]
pub use wifi::Esp32Wifi;

#[cfg(feature = "esp32-http")]
mod http;
#[cfg(feature = "esp32-http")]
pub use http::{Esp32ControlSurface, Esp32HttpServer};

/// Pin assignments for the reference board.
///
/// These mirror [`PinConfig::default`](crate::config::PinConfig).
pub mod pins {
    // =========================================================================
    // Sensors
    // =========================================================================

    /// Home hall sensor (pull-up, active low)
    pub const HOME: i32 = 5;

    /// Dump hall sensor (pull-up, active low)
    pub const DUMP: i32 = 4;

    /// Cat presence switch (no pull, active high)
    pub const CAT: i32 = 13;

    // =========================================================================
    // Motor Control (L298N)
    // =========================================================================

    /// Forward input (IN1)
    pub const MOTOR_FORWARD: i32 = 14;

    /// Reverse input (IN2)
    pub const MOTOR_REVERSE: i32 = 12;

    // =========================================================================
    // Indicator
    // =========================================================================

    /// Onboard LED (active low)
    pub const LED: i32 = 2;
}
