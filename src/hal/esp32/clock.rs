//! ESP32 clock and blocking delay.

use embedded_hal::delay::DelayNs;
use esp_idf_hal::delay::{Ets, FreeRtos};

use crate::traits::Clock;

/// ESP32 clock using the hardware timer.
///
/// Provides millisecond-resolution timing using the ESP-IDF `esp_timer_get_time()`
/// function, which returns microseconds since boot. Millisecond delays yield
/// to FreeRTOS so the HTTP server task keeps running during a cycle;
/// sub-millisecond delays busy-wait.
///
/// # Example
///
/// ```ignore
/// use catbox::hal::esp32::Esp32Clock;
/// use catbox::traits::Clock;
/// use embedded_hal::delay::DelayNs;
///
/// let mut clock = Esp32Clock::new();
/// let start = clock.now_ms();
/// clock.delay_ms(100);
/// assert!(clock.now_ms() - start >= 100);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Esp32Clock;

impl Esp32Clock {
    /// Creates a new ESP32 clock instance.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for Esp32Clock {
    #[inline]
    fn now_ms(&self) -> u64 {
        // SAFETY: read of the monotonic high-resolution timer, no side effects
        let micros = unsafe { esp_idf_sys::esp_timer_get_time() };
        (micros / 1000) as u64
    }
}

impl DelayNs for Esp32Clock {
    fn delay_ns(&mut self, ns: u32) {
        Ets::delay_us(ns.div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        Ets::delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        FreeRtos::delay_ms(ms);
    }
}
