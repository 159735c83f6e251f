//! # catbox
//!
//! Firmware for a Wi-Fi controlled, self-cleaning rotating-drum litter box.
//!
//! ## Features
//!
//! - **Hardware abstraction**: Traits for the H-bridge motor, hall/cat sensors and LED
//! - **Cleaning cycle**: Dump, jiggle, overshoot past home, forward approach onto home
//! - **Cat detection**: Runs a cycle once the cat has stayed long enough and left
//! - **HTTP control**: `GET /empty` and `GET /status`, plain text
//! - **Discovery**: mDNS hostname `catbox.local`, Wi-Fi pinned to one BSSID
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware and network abstractions
//! - `sensors` - Interrupt-maintained sensor flags
//! - `motor` - Shoot-through-safe H-bridge driver
//! - `cycle` - The cleaning cycle state machine
//! - `supervisor` - Main loop (std)
//! - `control` - Shared control state and HTTP routing (std)
//! - `connectivity` - BSSID pinning and mDNS advertisement
//! - `config` - Builder-style configuration
//! - `services` - axum server for the desktop simulator (web)
//! - `hal` - Concrete implementations (mock and simulation for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use catbox::{
//!     control::ControlState,
//!     config::{CycleConfig, SupervisorConfig},
//!     cycle::CycleEngine,
//!     hal::{DrumModel, MockWifi, SimBox},
//!     supervisor::Supervisor,
//! };
//!
//! // Simulated drum resting at home
//! let sim = SimBox::with_drum(DrumModel::default());
//! let engine = CycleEngine::new(sim.motor(), sim.flags(), sim.time(), CycleConfig::default());
//!
//! let control = Arc::new(ControlState::new());
//! let mut supervisor = Supervisor::new(
//!     engine,
//!     MockWifi::connected(),
//!     Arc::clone(&control),
//!     SupervisorConfig::default(),
//! );
//!
//! // An HTTP request reserved and committed a cycle
//! let ticket = control.try_reserve().unwrap();
//! control.commit(ticket);
//!
//! // The next loop iteration runs it
//! assert!(supervisor.tick().ran_cycle());
//! assert_eq!(control.snapshot().cycles_completed, 1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Shared configuration for the firmware and the desktop simulator.
pub mod config;
/// Access point selection and mDNS helpers.
pub mod connectivity;
/// The cleaning cycle state machine.
pub mod cycle;
/// Hardware abstraction layer with mock and simulated implementations.
pub mod hal;
/// H-bridge motor driver.
pub mod motor;
/// Interrupt-maintained sensor flags.
pub mod sensors;
/// Core traits for hardware and network abstraction.
pub mod traits;

/// Shared control state and HTTP routing.
#[cfg(feature = "std")]
pub mod control;
/// The main loop.
#[cfg(feature = "std")]
pub mod supervisor;

/// Desktop HTTP server (feature-gated).
#[cfg(feature = "web")]
pub mod services;

// Re-exports for convenience
pub use cycle::{CycleEngine, CycleError, CyclePhase, CycleReport};
pub use motor::{HBridgeMotor, MotorError};
pub use sensors::{Line, SensorFlags, SensorSnapshot, SENSORS};
pub use traits::{
    // Hardware
    Clock,
    // Network
    Connectivity,
    Direction,
    HttpMethod,
    HttpRequest,
    HttpResponse,
    Indicator,
    Level,
    MotorDriver,
    SensorInputs,
    ServiceAdvertiser,
};

// Config re-exports
pub use config::{
    Config, CycleConfig, DeviceConfig, PinConfig, SupervisorConfig, WebConfig, WifiConfig,
};

#[cfg(feature = "std")]
pub use control::{ControlState, ControlSurface, Trigger};
#[cfg(feature = "std")]
pub use supervisor::{Supervisor, TickReport};
