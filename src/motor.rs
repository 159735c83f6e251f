//! Two-line H-bridge driver for the drum's DC gear motor.
//!
//! The bridge (an L298N on the reference board) is controlled by two digital
//! lines, one per direction:
//!
//! - Forward: fwd = high, rev = low
//! - Reverse: fwd = low, rev = high
//! - Stopped: both low
//!
//! Both lines high is a shoot-through short. Every transition deasserts the
//! opposing line *before* asserting the requested one, so that state is never
//! externally observable. Speed is binary; PWM is not used.

use core::fmt;

use embedded_hal::digital::OutputPin;
use log::debug;

use crate::traits::{Direction, MotorDriver};

/// Error from one of the two bridge lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotorError<EF, ER> {
    /// Writing the forward line failed.
    Forward(EF),
    /// Writing the reverse line failed.
    Reverse(ER),
}

impl<EF: fmt::Debug, ER: fmt::Debug> fmt::Display for MotorError<EF, ER> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward(e) => write!(f, "forward line write failed: {e:?}"),
            Self::Reverse(e) => write!(f, "reverse line write failed: {e:?}"),
        }
    }
}

#[cfg(feature = "std")]
impl<EF: fmt::Debug, ER: fmt::Debug> std::error::Error for MotorError<EF, ER> {}

/// H-bridge motor driver over two output pins.
///
/// # Example
///
/// ```rust
/// use catbox::HBridgeMotor;
/// use catbox::hal::LineProbe;
/// use catbox::traits::MotorDriver;
///
/// let probe = LineProbe::new();
/// let mut motor = HBridgeMotor::new(probe.pin("fwd"), probe.pin("rev")).unwrap();
///
/// motor.forward().unwrap();
/// motor.reverse().unwrap(); // no stop in between
/// assert!(!probe.ever_both_asserted());
/// ```
#[derive(Debug)]
pub struct HBridgeMotor<F, R> {
    fwd: F,
    rev: R,
    direction: Direction,
}

impl<F, R> HBridgeMotor<F, R>
where
    F: OutputPin,
    R: OutputPin,
{
    /// Takes ownership of the two lines and deasserts both.
    ///
    /// The output latches may hold anything at boot, so the driver never
    /// trusts them and stops explicitly.
    ///
    /// # Errors
    ///
    /// Returns an error if either line cannot be driven low.
    pub fn new(fwd: F, rev: R) -> Result<Self, MotorError<F::Error, R::Error>> {
        let mut motor = Self {
            fwd,
            rev,
            direction: Direction::Stopped,
        };
        motor.release_both()?;
        Ok(motor)
    }

    /// Drives both lines low even if the first write fails, then reports the
    /// first failure.
    fn release_both(&mut self) -> Result<(), MotorError<F::Error, R::Error>> {
        let fwd = self.fwd.set_low();
        let rev = self.rev.set_low();
        if fwd.is_ok() {
            self.released(Direction::Forward);
        }
        if rev.is_ok() {
            self.released(Direction::Reverse);
        }
        fwd.map_err(MotorError::Forward)?;
        rev.map_err(MotorError::Reverse)
    }

    // A line that went low no longer drives the drum in its direction.
    fn released(&mut self, line: Direction) {
        if self.direction == line {
            self.direction = Direction::Stopped;
        }
    }

    /// Releases the pins.
    pub fn into_pins(self) -> (F, R) {
        (self.fwd, self.rev)
    }
}

impl<F, R> MotorDriver for HBridgeMotor<F, R>
where
    F: OutputPin,
    R: OutputPin,
{
    type Error = MotorError<F::Error, R::Error>;

    fn drive(&mut self, dir: Direction) -> Result<(), Self::Error> {
        let previous = self.direction;
        match dir {
            Direction::Forward => {
                self.rev.set_low().map_err(MotorError::Reverse)?;
                self.released(Direction::Reverse);
                self.fwd.set_high().map_err(MotorError::Forward)?;
            }
            Direction::Reverse => {
                self.fwd.set_low().map_err(MotorError::Forward)?;
                self.released(Direction::Forward);
                self.rev.set_high().map_err(MotorError::Reverse)?;
            }
            Direction::Stopped => self.release_both()?,
        }

        if previous != dir {
            debug!("motor: {} -> {}", previous.as_str(), dir.as_str());
        }
        self.direction = dir;
        Ok(())
    }

    fn direction(&self) -> Direction {
        self.direction
    }
}
