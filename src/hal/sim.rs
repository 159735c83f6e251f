//! Simulated litter box: shared time, motor and sensor lines.
//!
//! [`SimBox`] owns a simulated millisecond clock. Every delay taken through
//! [`SimTime`] advances that clock and, step by step:
//!
//! 1. moves the optional [`DrumModel`] according to the direction last
//!    commanded through [`SimMotor`],
//! 2. applies any scripted edges that have come due,
//!
//! and feeds resulting line-level changes into a [`SensorFlags`] exactly as
//! the GPIO interrupt handlers would on hardware.
//!
//! # Example
//!
//! ```rust
//! use catbox::hal::SimBox;
//! use catbox::sensors::Line;
//! use catbox::traits::{Level, SensorInputs};
//! use embedded_hal::delay::DelayNs;
//!
//! let sim = SimBox::new();
//! sim.schedule(500, Line::Cat, Level::High);
//!
//! let flags = sim.flags();
//! let mut time = sim.time();
//! time.delay_ms(400);
//! assert!(!flags.cat_present());
//! time.delay_ms(100);
//! assert!(flags.cat_present());
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::delay::DelayNs;

use crate::sensors::{Line, SensorFlags};
use crate::traits::{Clock, Direction, Level, MotorDriver};

/// Simulation resolution.
const STEP_MS: u64 = 10;

/// A line-level change scheduled at an absolute simulated time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScriptedEdge {
    /// Simulated time at which the level changes.
    pub at_ms: u64,
    /// Affected line.
    pub line: Line,
    /// New raw level.
    pub level: Level,
}

/// A motor command observed by the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotorEvent {
    /// Simulated time of the command.
    pub at_ms: u64,
    /// Commanded direction.
    pub direction: Direction,
}

/// Linear drum model measured in milliseconds of motor travel.
///
/// Position 0 is the centre of the home magnet; forward travel increases the
/// position. Each hall sensor reads low while the position is within
/// `half_width_ms` of its magnet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrumModel {
    /// Current position.
    pub position_ms: i64,
    /// Position of the dump magnet.
    pub dump_at_ms: i64,
    /// Half width of each magnet's detection zone.
    pub half_width_ms: i64,
}

impl Default for DrumModel {
    fn default() -> Self {
        Self {
            position_ms: 0,
            dump_at_ms: 6_000,
            half_width_ms: 250,
        }
    }
}

impl DrumModel {
    fn home_level(&self) -> Level {
        Level::from(self.position_ms.abs() > self.half_width_ms)
    }

    fn dump_level(&self) -> Level {
        Level::from((self.position_ms - self.dump_at_ms).abs() > self.half_width_ms)
    }
}

#[derive(Debug)]
struct World {
    now_ms: u64,
    direction: Direction,
    motor_log: Vec<MotorEvent>,
    script: Vec<ScriptedEdge>,
    drum: Option<DrumModel>,
    levels: [Level; 3],
}

impl World {
    fn level_mut(&mut self, line: Line) -> &mut Level {
        match line {
            Line::Home => &mut self.levels[0],
            Line::Dump => &mut self.levels[1],
            Line::Cat => &mut self.levels[2],
        }
    }

    fn set_line(&mut self, flags: &SensorFlags, line: Line, level: Level) {
        let current = self.level_mut(line);
        if *current != level {
            *current = level;
            flags.record_edge(line, level);
        }
    }

    fn step(&mut self, flags: &SensorFlags, ms: u64) {
        self.now_ms += ms;

        if let Some(mut drum) = self.drum {
            let delta = ms as i64;
            match self.direction {
                Direction::Forward => drum.position_ms += delta,
                Direction::Reverse => drum.position_ms -= delta,
                Direction::Stopped => {}
            }
            self.drum = Some(drum);
            self.set_line(flags, Line::Home, drum.home_level());
            self.set_line(flags, Line::Dump, drum.dump_level());
        }

        let now = self.now_ms;
        let due: Vec<ScriptedEdge> = self.script.iter().copied().filter(|e| e.at_ms <= now).collect();
        self.script.retain(|e| e.at_ms > now);
        for edge in due {
            self.set_line(flags, edge.line, edge.level);
        }
    }
}

/// Shared handle to a simulated litter box.
///
/// Clones refer to the same simulation.
#[derive(Clone, Debug)]
pub struct SimBox {
    world: Arc<Mutex<World>>,
    flags: Arc<SensorFlags>,
}

impl SimBox {
    /// Creates a simulation with every line idle: drum away from both
    /// sensors, no cat, motor stopped, time zero.
    pub fn new() -> Self {
        let world = World {
            now_ms: 0,
            direction: Direction::Stopped,
            motor_log: Vec::new(),
            script: Vec::new(),
            drum: None,
            levels: [Level::High, Level::High, Level::Low],
        };
        Self {
            world: Arc::new(Mutex::new(world)),
            flags: Arc::new(SensorFlags::new()),
        }
    }

    /// Creates a simulation with the drum resting on the home sensor and
    /// the hall lines driven only by the script.
    pub fn at_home() -> Self {
        let sim = Self::new();
        sim.set_line(Line::Home, Level::Low);
        sim
    }

    /// Creates a simulation whose hall lines follow `drum` as the motor runs.
    pub fn with_drum(drum: DrumModel) -> Self {
        let sim = Self::new();
        {
            let mut world = sim.lock();
            world.drum = Some(drum);
            world.set_line(&sim.flags, Line::Home, drum.home_level());
            world.set_line(&sim.flags, Line::Dump, drum.dump_level());
        }
        sim
    }

    fn lock(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sensor flags maintained by the simulation.
    pub fn flags(&self) -> Arc<SensorFlags> {
        Arc::clone(&self.flags)
    }

    /// Clock and delay source bound to this simulation.
    pub fn time(&self) -> SimTime {
        SimTime {
            sim: self.clone(),
            pending_ns: 0,
        }
    }

    /// Motor whose commands drive the drum model and are logged.
    pub fn motor(&self) -> SimMotor {
        SimMotor { sim: self.clone() }
    }

    /// Current simulated time.
    pub fn now_ms(&self) -> u64 {
        self.lock().now_ms
    }

    /// Changes a line level immediately, firing the edge handler on change.
    pub fn set_line(&self, line: Line, level: Level) {
        let mut world = self.lock();
        world.set_line(&self.flags, line, level);
    }

    /// Schedules a line-level change at an absolute time.
    pub fn schedule(&self, at_ms: u64, line: Line, level: Level) {
        self.lock().script.push(ScriptedEdge { at_ms, line, level });
    }

    /// Schedules a cat sitting in the box from `from_ms` for `duration_ms`.
    pub fn cat_visit(&self, from_ms: u64, duration_ms: u64) {
        self.schedule(from_ms, Line::Cat, Level::High);
        self.schedule(from_ms + duration_ms, Line::Cat, Level::Low);
    }

    /// Advances simulated time.
    pub fn advance(&self, ms: u64) {
        let mut world = self.lock();
        let mut remaining = ms;
        while remaining > 0 {
            let step = remaining.min(STEP_MS);
            world.step(&self.flags, step);
            remaining -= step;
        }
    }

    /// Every motor command so far.
    pub fn motor_log(&self) -> Vec<MotorEvent> {
        self.lock().motor_log.clone()
    }

    /// Direction last commanded.
    pub fn direction(&self) -> Direction {
        self.lock().direction
    }

    /// Current drum model state, if one is attached.
    pub fn drum(&self) -> Option<DrumModel> {
        self.lock().drum
    }
}

impl Default for SimBox {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulated clock and blocking delay.
#[derive(Debug)]
pub struct SimTime {
    sim: SimBox,
    pending_ns: u64,
}

impl Clock for SimTime {
    fn now_ms(&self) -> u64 {
        self.sim.now_ms()
    }
}

impl DelayNs for SimTime {
    fn delay_ns(&mut self, ns: u32) {
        self.pending_ns += u64::from(ns);
        let whole_ms = self.pending_ns / 1_000_000;
        self.pending_ns %= 1_000_000;
        if whole_ms > 0 {
            self.sim.advance(whole_ms);
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        self.sim.advance(u64::from(ms));
    }
}

/// Simulated motor driver.
#[derive(Debug)]
pub struct SimMotor {
    sim: SimBox,
}

impl MotorDriver for SimMotor {
    type Error = core::convert::Infallible;

    fn drive(&mut self, dir: Direction) -> Result<(), Self::Error> {
        let mut world = self.sim.lock();
        world.direction = dir;
        let at_ms = world.now_ms;
        world.motor_log.push(MotorEvent {
            at_ms,
            direction: dir,
        });
        Ok(())
    }

    fn direction(&self) -> Direction {
        self.sim.direction()
    }
}
