//! Hardware abstraction traits for the drum motor, position sensors and LED.
//!
//! This module defines the core hardware interfaces that allow catbox to
//! run on the ESP32 board, on the desktop simulator and inside tests.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`MotorDriver`] | Binary H-bridge drive (forward / reverse / stop) |
//! | [`SensorInputs`] | Home, dump and cat-presence flags |
//! | [`Indicator`] | Request indicator LED |
//! | [`Clock`] | Monotonic millisecond time source |
//!
//! Blocking waits use [`embedded_hal::delay::DelayNs`] directly.
//!
//! # Example
//!
//! ```rust
//! use catbox::traits::{Direction, MotorDriver};
//! use catbox::hal::LineProbe;
//! use catbox::HBridgeMotor;
//!
//! let probe = LineProbe::new();
//! let mut motor = HBridgeMotor::new(probe.pin("fwd"), probe.pin("rev")).unwrap();
//! motor.forward().unwrap();
//! assert_eq!(motor.direction(), Direction::Forward);
//! motor.stop().unwrap();
//! assert!(!probe.ever_both_asserted());
//! ```

/// Raw electrical level of a digital line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Level {
    /// Line reads logical low.
    Low,
    /// Line reads logical high.
    High,
}

impl Level {
    /// Converts a raw register value (`0` = low) to a level.
    #[inline(always)]
    pub const fn from_raw(raw: i32) -> Self {
        if raw == 0 {
            Level::Low
        } else {
            Level::High
        }
    }

    /// Returns true for [`Level::High`].
    #[inline]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Direction the drum motor is being driven.
///
/// # Default
///
/// Defaults to [`Stopped`](Self::Stopped); the driver must assume the worst
/// at startup and explicitly stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Forward line asserted (drum rotates toward the dump position).
    Forward,
    /// Reverse line asserted (drum rotates back toward home).
    Reverse,
    /// Both lines deasserted.
    #[default]
    Stopped,
}

impl Direction {
    /// Returns the direction as a lowercase string.
    ///
    /// ```
    /// use catbox::Direction;
    ///
    /// assert_eq!(Direction::Forward.as_str(), "forward");
    /// assert_eq!(Direction::Reverse.as_str(), "reverse");
    /// assert_eq!(Direction::Stopped.as_str(), "stopped");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
            Direction::Stopped => "stopped",
        }
    }

    /// Returns the opposite running direction. `Stopped` stays `Stopped`.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
            Direction::Stopped => Direction::Stopped,
        }
    }
}

/// Motor driver trait - abstracts a binary (full on / off) H-bridge.
///
/// Implementations must guarantee that both bridge lines are never asserted
/// at the same time: a direction change deasserts the opposing line before
/// asserting the requested one.
///
/// Duration control is the caller's job; the driver runs no timers.
pub trait MotorDriver {
    /// Error type for motor operations.
    type Error;

    /// Drive the bridge in the given direction.
    fn drive(&mut self, dir: Direction) -> Result<(), Self::Error>;

    /// Direction most recently commanded.
    fn direction(&self) -> Direction;

    /// Drive forward (toward the dump position).
    fn forward(&mut self) -> Result<(), Self::Error> {
        self.drive(Direction::Forward)
    }

    /// Drive in reverse (toward the home position).
    fn reverse(&mut self) -> Result<(), Self::Error> {
        self.drive(Direction::Reverse)
    }

    /// Deassert both bridge lines.
    fn stop(&mut self) -> Result<(), Self::Error> {
        self.drive(Direction::Stopped)
    }
}

/// Read access to the three sensor flags.
///
/// Each call is a fresh sample of a flag written from interrupt context;
/// callers must not cache values across polls.
pub trait SensorInputs {
    /// Drum is at the home (resting) position.
    fn home_triggered(&self) -> bool;

    /// Drum is at the dump (inverted) position.
    fn dump_triggered(&self) -> bool;

    /// Cat-presence sensor currently asserts presence.
    fn cat_present(&self) -> bool;
}

impl<T: SensorInputs + ?Sized> SensorInputs for &T {
    fn home_triggered(&self) -> bool {
        (**self).home_triggered()
    }

    fn dump_triggered(&self) -> bool {
        (**self).dump_triggered()
    }

    fn cat_present(&self) -> bool {
        (**self).cat_present()
    }
}

#[cfg(feature = "std")]
impl<T: SensorInputs + ?Sized> SensorInputs for alloc::sync::Arc<T> {
    fn home_triggered(&self) -> bool {
        (**self).home_triggered()
    }

    fn dump_triggered(&self) -> bool {
        (**self).dump_triggered()
    }

    fn cat_present(&self) -> bool {
        (**self).cat_present()
    }
}

/// On/off indicator, e.g. the onboard request LED.
pub trait Indicator {
    /// Turn the indicator on.
    fn on(&mut self);

    /// Turn the indicator off.
    fn off(&mut self);

    /// Whether the indicator is currently on.
    fn is_on(&self) -> bool;
}

/// Time source trait for `no_std` compatibility.
///
/// Provides monotonic time in milliseconds for dwell and cycle timing.
///
/// # Example
///
/// ```rust
/// use catbox::traits::Clock;
/// use catbox::hal::SimBox;
///
/// let sim = SimBox::new();
/// let mut time = sim.time();
/// assert_eq!(time.now_ms(), 0);
///
/// embedded_hal::delay::DelayNs::delay_ms(&mut time, 100);
/// assert_eq!(time.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}
