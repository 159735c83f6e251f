//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`] for various platforms.
//!
//! # Available Implementations
//!
//! - `mock`: Pin-level and network test doubles for desktop development
//! - `sim`: Simulated time, motor and drum for end-to-end runs without hardware
//! - `esp32`: ESP32 with an L298N H-bridge and hall sensors (requires `esp32` feature)

#[cfg(feature = "std")]
pub mod mock;
#[cfg(feature = "std")]
pub mod sim;

#[cfg(feature = "esp32")]
pub mod esp32;

#[cfg(feature = "std")]
pub use mock::*;
#[cfg(feature = "std")]
pub use sim::*;
