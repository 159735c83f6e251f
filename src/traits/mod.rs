//! Trait definitions for hardware and network abstraction.
//!
//! This module defines the core abstractions that allow catbox to:
//! - Run on different hardware (ESP32, desktop simulator, test mocks)
//! - Use different network stacks (esp-idf-svc, axum)
//!
//! # Submodules
//!
//! - `hardware`: Motor drive, sensor flags, indicator LED, clock
//! - `network`: Wi-Fi link, mDNS advertisement, HTTP request/response types
//!
//! # Hardware Abstraction
//!
//! The key hardware traits are:
//!
//! - [`MotorDriver`]: Binary H-bridge control with shoot-through prevention
//! - [`SensorInputs`]: Interrupt-maintained position and presence flags
//! - [`Indicator`]: The request LED
//! - [`Clock`]: Time source for `no_std` environments

pub mod hardware;
pub mod network;

pub use hardware::*;
pub use network::*;
