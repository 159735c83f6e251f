//! L298N H-bridge on two ESP32 GPIO outputs.
//!
//! The enable input is jumpered high, so direction and on/off are fully
//! controlled by IN1 (forward) and IN2 (reverse). No PWM.

use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};

use crate::motor::{HBridgeMotor, MotorError};
use esp_idf_sys::EspError;

/// H-bridge motor driver on ESP32 GPIOs.
pub type Esp32Motor<'d> =
    HBridgeMotor<PinDriver<'d, AnyOutputPin, Output>, PinDriver<'d, AnyOutputPin, Output>>;

/// Configures both bridge lines as outputs and stops the motor.
///
/// # Example
///
/// ```ignore
/// use catbox::hal::esp32::esp32_motor;
///
/// let peripherals = Peripherals::take()?;
/// let motor = esp32_motor(peripherals.pins.gpio14.into(), peripherals.pins.gpio12.into())?;
/// ```
///
/// # Errors
///
/// Returns an error if either GPIO cannot be configured or driven low.
pub fn esp32_motor<'d>(
    forward: AnyOutputPin,
    reverse: AnyOutputPin,
) -> Result<Esp32Motor<'d>, MotorError<EspError, EspError>> {
    let fwd = PinDriver::output(forward).map_err(MotorError::Forward)?;
    let rev = PinDriver::output(reverse).map_err(MotorError::Reverse)?;
    HBridgeMotor::new(fwd, rev)
}
