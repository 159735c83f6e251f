//! Digital input layer: interrupt-maintained sensor flags.
//!
//! Three lines are observed:
//!
//! | Line | Pull | Asserted when |
//! |------|------|---------------|
//! | Home hall sensor | pull-up | line reads low |
//! | Dump hall sensor | pull-up | line reads low |
//! | Cat presence switch | none | line reads high |
//!
//! Each flag is a single [`AtomicBool`] written only from the edge handler
//! ([`SensorFlags::record_edge`]) and read by the main loop. No locks are
//! involved, so the handler is safe to run in interrupt context.
//!
//! The process-wide [`SENSORS`] instance is what the ESP32 interrupt
//! handlers write to. Tests and the simulator create their own
//! [`SensorFlags`] so they stay independent of each other.
//!
//! # Example
//!
//! ```rust
//! use catbox::sensors::{Line, SensorFlags};
//! use catbox::traits::{Level, SensorInputs};
//!
//! let flags = SensorFlags::new();
//! flags.record_edge(Line::Home, Level::Low); // magnet over the home sensor
//! assert!(flags.home_triggered());
//!
//! flags.record_edge(Line::Cat, Level::High);
//! assert!(flags.cat_present());
//! ```

use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::traits::{Level, SensorInputs};

/// Flags written by the board's GPIO interrupt handlers.
pub static SENSORS: SensorFlags = SensorFlags::new();

/// Pin number used before [`SensorFlags::bind_pins`] is called.
pub const UNBOUND_PIN: i32 = -1;

/// One of the three observed input lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Line {
    /// Hall sensor at the home (resting) drum position.
    Home,
    /// Hall sensor at the dump (inverted) drum position.
    Dump,
    /// Cat presence switch.
    Cat,
}

impl Line {
    /// All lines, in pin-table order.
    pub const ALL: [Line; 3] = [Line::Home, Line::Dump, Line::Cat];

    /// Hall sensors are open-drain and need the internal pull-up.
    #[inline]
    pub const fn pull_up(self) -> bool {
        matches!(self, Line::Home | Line::Dump)
    }

    /// Logical value of the flag for a raw line level.
    #[inline(always)]
    pub const fn asserted_at(self, level: Level) -> bool {
        match self {
            Line::Home | Line::Dump => !level.is_high(),
            Line::Cat => level.is_high(),
        }
    }

    /// Short lowercase name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Line::Home => "home",
            Line::Dump => "dump",
            Line::Cat => "cat",
        }
    }

    #[inline(always)]
    const fn index(self) -> usize {
        match self {
            Line::Home => 0,
            Line::Dump => 1,
            Line::Cat => 2,
        }
    }
}

/// GPIO numbers of the three input lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinePins {
    /// Home hall sensor GPIO.
    pub home: i32,
    /// Dump hall sensor GPIO.
    pub dump: i32,
    /// Cat switch GPIO.
    pub cat: i32,
}

impl LinePins {
    /// GPIO number for the given line.
    pub const fn for_line(&self, line: Line) -> i32 {
        match line {
            Line::Home => self.home,
            Line::Dump => self.dump,
            Line::Cat => self.cat,
        }
    }
}

/// Current logical state of the three sensor lines.
#[derive(Debug)]
pub struct SensorFlags {
    flags: [AtomicBool; 3],
    pins: [AtomicI32; 3],
}

impl SensorFlags {
    /// Creates flags with every line deasserted and no pins bound.
    pub const fn new() -> Self {
        Self {
            flags: [
                AtomicBool::new(false),
                AtomicBool::new(false),
                AtomicBool::new(false),
            ],
            pins: [
                AtomicI32::new(UNBOUND_PIN),
                AtomicI32::new(UNBOUND_PIN),
                AtomicI32::new(UNBOUND_PIN),
            ],
        }
    }

    /// Records which GPIO feeds each flag.
    pub fn bind_pins(&self, pins: LinePins) {
        for line in Line::ALL {
            self.pins[line.index()].store(pins.for_line(line), Ordering::Relaxed);
        }
    }

    /// GPIO number feeding `line`, or [`UNBOUND_PIN`].
    #[inline(always)]
    pub fn pin(&self, line: Line) -> i32 {
        self.pins[line.index()].load(Ordering::Relaxed)
    }

    /// Edge handler body: store the logical value derived from `level`.
    ///
    /// Safe in interrupt context: no blocking, no allocation, no logging.
    /// Recording the same level repeatedly leaves the flag unchanged.
    #[inline(always)]
    pub fn record_edge(&self, line: Line, level: Level) {
        self.flags[line.index()].store(line.asserted_at(level), Ordering::Release);
    }

    /// Fresh sample of the flag for `line`.
    #[inline]
    pub fn is_asserted(&self, line: Line) -> bool {
        self.flags[line.index()].load(Ordering::Acquire)
    }

    /// Copies all three flags.
    pub fn snapshot(&self) -> SensorSnapshot {
        SensorSnapshot::sample(self)
    }

    /// Captures the boot-time level of every line before interrupts are
    /// enabled, so flags are correct without waiting for a first edge.
    pub fn seed<F>(&self, mut read_level: F)
    where
        F: FnMut(Line) -> Level,
    {
        for line in Line::ALL {
            self.record_edge(line, read_level(line));
        }
    }
}

impl Default for SensorFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorInputs for SensorFlags {
    fn home_triggered(&self) -> bool {
        self.is_asserted(Line::Home)
    }

    fn dump_triggered(&self) -> bool {
        self.is_asserted(Line::Dump)
    }

    fn cat_present(&self) -> bool {
        self.is_asserted(Line::Cat)
    }
}

/// Mechanical drum position implied by the two hall flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DrumPosition {
    /// Home sensor asserted.
    Home,
    /// Dump sensor asserted.
    Dump,
    /// Neither sensor asserted.
    Between,
    /// Both asserted at once; physically impossible, indicates a wiring fault.
    Conflict,
}

/// Point-in-time copy of the sensor flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorSnapshot {
    /// Home flag.
    pub home: bool,
    /// Dump flag.
    pub dump: bool,
    /// Cat presence flag.
    pub cat: bool,
}

impl SensorSnapshot {
    /// Samples any set of sensor inputs.
    pub fn sample<S: SensorInputs + ?Sized>(sensors: &S) -> Self {
        Self {
            home: sensors.home_triggered(),
            dump: sensors.dump_triggered(),
            cat: sensors.cat_present(),
        }
    }

    /// Drum position derived from the hall flags.
    pub const fn position(&self) -> DrumPosition {
        match (self.home, self.dump) {
            (true, false) => DrumPosition::Home,
            (false, true) => DrumPosition::Dump,
            (false, false) => DrumPosition::Between,
            (true, true) => DrumPosition::Conflict,
        }
    }
}
