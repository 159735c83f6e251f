//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the pin-level and network traits,
//! enabling development and testing on desktop without the litter box.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockPin`] | [`OutputPin`] | Output line that reports into a shared [`LineProbe`] |
//! | [`MockLed`] | [`Indicator`] | Counts on/off transitions |
//! | [`MockWifi`] | [`Connectivity`] | Link state that tests can drop and restore |
//! | [`MockAdvertiser`] | [`ServiceAdvertiser`] | Records mDNS registrations |
//!
//! Time, motor and sensor simulation live in [`crate::hal::sim`].
//!
//! [`OutputPin`]: embedded_hal::digital::OutputPin
//! [`Indicator`]: crate::traits::Indicator
//! [`Connectivity`]: crate::traits::Connectivity
//! [`ServiceAdvertiser`]: crate::traits::ServiceAdvertiser

use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

use crate::connectivity::ConnectError;
use crate::traits::{Connectivity, Indicator, ServiceAdvertiser};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Output lines
// ============================================================================

/// Error returned by a [`MockPin`] set to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockPinError;

impl embedded_hal::digital::Error for MockPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// One recorded write to a probed line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineTransition {
    /// Name the line was registered under.
    pub line: &'static str,
    /// Level written.
    pub high: bool,
}

#[derive(Debug, Default)]
struct ProbeState {
    lines: Vec<(&'static str, bool, bool)>,
    history: Vec<LineTransition>,
    both_asserted: bool,
}

impl ProbeState {
    fn slot(&mut self, name: &'static str) -> &mut (&'static str, bool, bool) {
        if let Some(idx) = self.lines.iter().position(|(n, _, _)| *n == name) {
            &mut self.lines[idx]
        } else {
            self.lines.push((name, false, false));
            let last = self.lines.len() - 1;
            &mut self.lines[last]
        }
    }

    fn asserted_count(&self) -> usize {
        self.lines.iter().filter(|(_, high, _)| *high).count()
    }
}

/// Observes every write to a group of [`MockPin`]s.
///
/// Use one probe per H-bridge: [`ever_both_asserted`](Self::ever_both_asserted)
/// reports whether more than one of its lines was ever high at the same
/// instant, which is the shoot-through condition.
///
/// # Example
///
/// ```rust
/// use catbox::hal::LineProbe;
/// use embedded_hal::digital::OutputPin;
///
/// let probe = LineProbe::new();
/// let mut a = probe.pin("a");
/// let mut b = probe.pin("b");
///
/// a.set_high().unwrap();
/// b.set_high().unwrap();
/// assert!(probe.ever_both_asserted());
/// ```
#[derive(Clone, Debug, Default)]
pub struct LineProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl LineProbe {
    /// Creates an empty probe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new output line observed by this probe (initially low).
    pub fn pin(&self, name: &'static str) -> MockPin {
        lock(&self.state).slot(name);
        MockPin {
            name,
            probe: self.clone(),
        }
    }

    /// Sets a line's level without recording it, e.g. to model boot latches.
    pub fn force(&self, name: &'static str, high: bool) {
        lock(&self.state).slot(name).1 = high;
    }

    /// Makes every subsequent write to `name` fail (or succeed again).
    pub fn fail_writes(&self, name: &'static str, fail: bool) {
        lock(&self.state).slot(name).2 = fail;
    }

    /// Current level of a line.
    pub fn is_high(&self, name: &'static str) -> bool {
        lock(&self.state).slot(name).1
    }

    /// Whether two lines were ever high at the same instant.
    pub fn ever_both_asserted(&self) -> bool {
        lock(&self.state).both_asserted
    }

    /// All recorded writes, oldest first.
    pub fn history(&self) -> Vec<LineTransition> {
        lock(&self.state).history.clone()
    }

    /// Forgets recorded writes (levels are kept).
    pub fn clear_history(&self) {
        lock(&self.state).history.clear();
    }

    fn write(&self, name: &'static str, high: bool) -> Result<(), MockPinError> {
        let mut state = lock(&self.state);
        let slot = state.slot(name);
        if slot.2 {
            return Err(MockPinError);
        }
        slot.1 = high;
        state.history.push(LineTransition { line: name, high });
        if state.asserted_count() > 1 {
            state.both_asserted = true;
        }
        Ok(())
    }
}

/// Mock GPIO output line.
#[derive(Debug)]
pub struct MockPin {
    name: &'static str,
    probe: LineProbe,
}

impl ErrorType for MockPin {
    type Error = MockPinError;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.probe.write(self.name, false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.probe.write(self.name, true)
    }
}

// ============================================================================
// Indicator
// ============================================================================

/// Mock request LED.
#[derive(Clone, Debug, Default)]
pub struct MockLed {
    lit: bool,
    /// Number of times the LED was switched on.
    pub on_count: usize,
}

impl MockLed {
    /// Creates a LED that is off.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indicator for MockLed {
    fn on(&mut self) {
        self.lit = true;
        self.on_count += 1;
    }

    fn off(&mut self) {
        self.lit = false;
    }

    fn is_on(&self) -> bool {
        self.lit
    }
}

// ============================================================================
// Network Mocks
// ============================================================================

#[derive(Debug, Default)]
struct WifiState {
    connected: bool,
    connect_calls: usize,
    failures_left: usize,
}

/// Mock station link.
///
/// Clones share state, so a test can keep a handle after moving the mock
/// into the supervisor.
///
/// # Example
///
/// ```rust
/// use catbox::hal::MockWifi;
/// use catbox::traits::Connectivity;
///
/// let mut wifi = MockWifi::connected();
/// let handle = wifi.clone();
///
/// handle.drop_link();
/// assert!(!wifi.is_connected());
///
/// wifi.connect().unwrap();
/// assert!(handle.is_connected());
/// assert_eq!(handle.connect_calls(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockWifi {
    state: Arc<Mutex<WifiState>>,
}

impl MockWifi {
    /// Creates a link that starts disconnected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a link that starts associated.
    pub fn connected() -> Self {
        let wifi = Self::new();
        lock(&wifi.state).connected = true;
        wifi
    }

    /// Simulates the access point going away.
    pub fn drop_link(&self) {
        lock(&self.state).connected = false;
    }

    /// Makes the next `n` association attempts fail.
    pub fn fail_next(&self, n: usize) {
        lock(&self.state).failures_left = n;
    }

    /// Number of association attempts so far.
    pub fn connect_calls(&self) -> usize {
        lock(&self.state).connect_calls
    }
}

impl Connectivity for MockWifi {
    type Error = ConnectError;

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    fn connect(&mut self) -> Result<(), ConnectError> {
        let mut state = lock(&self.state);
        state.connect_calls += 1;
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(ConnectError::NoMatchingAccessPoint);
        }
        state.connected = true;
        Ok(())
    }
}

/// Mock mDNS responder.
#[derive(Debug, Default)]
pub struct MockAdvertiser {
    /// Registered `(hostname, port)` pairs.
    pub registrations: Vec<(String, u16)>,
    /// When true, `advertise` fails.
    pub fail: bool,
}

impl MockAdvertiser {
    /// Creates a responder that succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a responder that always fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl ServiceAdvertiser for MockAdvertiser {
    type Error = &'static str;

    fn advertise(&mut self, hostname: &str, http_port: u16) -> Result<(), Self::Error> {
        if self.fail {
            return Err("responder init failed");
        }
        self.registrations.push((hostname.into(), http_port));
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
