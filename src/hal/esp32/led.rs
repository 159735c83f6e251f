//! Onboard request LED.

use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_sys::EspError;
use log::warn;

use crate::traits::Indicator;

/// Request indicator LED on a GPIO output.
///
/// The reference board's LED lights when the line is driven low.
pub struct StatusLed<'d> {
    pin: PinDriver<'d, AnyOutputPin, Output>,
    active_low: bool,
    lit: bool,
}

impl<'d> StatusLed<'d> {
    /// Configures the pin as an output and switches the LED off.
    ///
    /// # Errors
    ///
    /// Returns an error if the GPIO cannot be configured or driven.
    pub fn new(pin: AnyOutputPin, active_low: bool) -> Result<Self, EspError> {
        let mut led = Self {
            pin: PinDriver::output(pin)?,
            active_low,
            lit: true,
        };
        led.write(false)?;
        Ok(led)
    }

    fn write(&mut self, lit: bool) -> Result<(), EspError> {
        if lit != self.active_low {
            self.pin.set_high()?;
        } else {
            self.pin.set_low()?;
        }
        self.lit = lit;
        Ok(())
    }
}

impl Indicator for StatusLed<'_> {
    fn on(&mut self) {
        if let Err(e) = self.write(true) {
            warn!("led: {e}");
        }
    }

    fn off(&mut self) {
        if let Err(e) = self.write(false) {
            warn!("led: {e}");
        }
    }

    fn is_on(&self) -> bool {
        self.lit
    }
}
