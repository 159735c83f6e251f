//! GPIO interrupt wiring for the three sensor lines.
//!
//! Each line gets an any-edge interrupt whose handler re-reads the level and
//! hands it to [`SENSORS`]. The handlers and everything they inline sit in
//! IRAM, but the ISR service is installed without `ESP_INTR_FLAG_IRAM`:
//! `gpio_get_level` is a flash function in the default IDF configuration, so
//! edges that arrive while the flash cache is off are serviced once it is
//! back on.

use core::ffi::c_void;

use esp_idf_hal::gpio::{AnyIOPin, Input, Pin, PinDriver, Pull};
use esp_idf_sys::{
    esp, gpio_get_level, gpio_install_isr_service, gpio_int_type_t_GPIO_INTR_ANYEDGE,
    gpio_intr_enable, gpio_isr_handler_add, gpio_isr_handler_remove, gpio_set_intr_type,
    EspError, ESP_ERR_INVALID_STATE, ESP_OK,
};
use log::info;

use crate::sensors::{Line, LinePins, SENSORS};
use crate::traits::Level;

#[link_section = ".iram1.catbox_home_isr"]
unsafe extern "C" fn home_isr(_arg: *mut c_void) {
    edge(Line::Home);
}

#[link_section = ".iram1.catbox_dump_isr"]
unsafe extern "C" fn dump_isr(_arg: *mut c_void) {
    edge(Line::Dump);
}

#[link_section = ".iram1.catbox_cat_isr"]
unsafe extern "C" fn cat_isr(_arg: *mut c_void) {
    edge(Line::Cat);
}

#[inline(always)]
fn edge(line: Line) {
    // SAFETY: register read of a configured input; safe in ISR context
    let raw = unsafe { gpio_get_level(SENSORS.pin(line)) };
    SENSORS.record_edge(line, Level::from_raw(raw));
}

fn handler(line: Line) -> unsafe extern "C" fn(*mut c_void) {
    match line {
        Line::Home => home_isr,
        Line::Dump => dump_isr,
        Line::Cat => cat_isr,
    }
}

/// The three sensor inputs, configured and interrupt-driven.
///
/// Dropping this removes the handlers; the flags in [`SENSORS`] then stop
/// updating.
pub struct SensorLines<'d> {
    _home: PinDriver<'d, AnyIOPin, Input>,
    _dump: PinDriver<'d, AnyIOPin, Input>,
    _cat: PinDriver<'d, AnyIOPin, Input>,
    pins: LinePins,
}

impl<'d> SensorLines<'d> {
    /// Configures the inputs, seeds [`SENSORS`] from the current levels and
    /// enables any-edge interrupts.
    ///
    /// # Errors
    ///
    /// Returns an error if a GPIO cannot be configured or the ISR service
    /// cannot be installed.
    pub fn new(home: AnyIOPin, dump: AnyIOPin, cat: AnyIOPin) -> Result<Self, EspError> {
        let pins = LinePins {
            home: home.pin(),
            dump: dump.pin(),
            cat: cat.pin(),
        };

        let lines = Self {
            _home: input(home, Line::Home)?,
            _dump: input(dump, Line::Dump)?,
            _cat: input(cat, Line::Cat)?,
            pins,
        };

        SENSORS.bind_pins(pins);
        // SAFETY: register reads of configured inputs
        SENSORS.seed(|line| Level::from_raw(unsafe { gpio_get_level(pins.for_line(line)) }));

        // SAFETY: the handlers are static functions that only touch atomics.
        // ESP_ERR_INVALID_STATE means the service is already installed.
        // No ESP_INTR_FLAG_IRAM: see the module docs.
        unsafe {
            let ret = gpio_install_isr_service(0);
            if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
                esp!(ret)?;
            }
            for line in Line::ALL {
                let gpio = pins.for_line(line);
                esp!(gpio_set_intr_type(gpio, gpio_int_type_t_GPIO_INTR_ANYEDGE))?;
                esp!(gpio_isr_handler_add(gpio, Some(handler(line)), core::ptr::null_mut()))?;
                esp!(gpio_intr_enable(gpio))?;
            }
        }

        let snap = SENSORS.snapshot();
        info!(
            "sensors: home={} dump={} cat={} (gpio {}/{}/{})",
            snap.home, snap.dump, snap.cat, pins.home, pins.dump, pins.cat
        );
        Ok(lines)
    }
}

fn input<'d>(pin: AnyIOPin, line: Line) -> Result<PinDriver<'d, AnyIOPin, Input>, EspError> {
    let mut driver = PinDriver::input(pin)?;
    driver.set_pull(if line.pull_up() { Pull::Up } else { Pull::Floating })?;
    Ok(driver)
}

impl Drop for SensorLines<'_> {
    fn drop(&mut self) {
        for line in Line::ALL {
            // SAFETY: removing a handler this struct registered
            unsafe {
                gpio_isr_handler_remove(self.pins.for_line(line));
            }
        }
    }
}
