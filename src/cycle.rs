//! The cleaning cycle: dump, jiggle, return past home, approach home.
//!
//! [`CycleEngine::empty`] runs one complete cycle and blocks until the drum
//! is back at rest:
//!
//! ```text
//!  Dumping    forward until the dump sensor asserts
//!  Settling   stop, wait settle_ms
//!  Jiggling   reverse / forward / reverse / forward, jiggle_impulse_ms each, stop
//!  Returning  reverse until the home sensor asserts, keep going home_overshoot_ms, stop
//!  Settling   wait settle_ms
//!  Homing     forward until the home sensor asserts, stop
//! ```
//!
//! Position waits poll the sensor flags every `poll_interval_ms` and look at
//! the level, not at edges, so contact bounce does no harm. The final
//! forward approach gives a repeatable rest position regardless of the
//! drum's inertia.
//!
//! The engine owns the motor for the whole cycle; it is never shared with
//! another caller, so two cycles cannot overlap.

use core::fmt;

use embedded_hal::delay::DelayNs;
use log::{error, info};

pub use crate::config::CycleConfig;
use crate::traits::{Clock, Direction, MotorDriver, SensorInputs};

/// Stage of a running cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CyclePhase {
    /// No cycle running.
    #[default]
    Idle,
    /// Driving forward toward the dump position.
    Dumping,
    /// Motor stopped, waiting for the drum to come to rest.
    Settling,
    /// Alternating short impulses to shake loose clumps.
    Jiggling,
    /// Reversing back past the home sensor.
    Returning,
    /// Final forward approach onto the home sensor.
    Homing,
}

impl CyclePhase {
    /// Lowercase name for logs and status output.
    pub const fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Dumping => "dumping",
            CyclePhase::Settling => "settling",
            CyclePhase::Jiggling => "jiggling",
            CyclePhase::Returning => "returning",
            CyclePhase::Homing => "homing",
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing of a completed cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CycleReport {
    /// Clock reading when the cycle began.
    pub started_ms: u64,
    /// Clock reading when the drum came to rest at home.
    pub finished_ms: u64,
}

impl CycleReport {
    /// Total cycle time.
    pub fn duration_ms(&self) -> u64 {
        self.finished_ms.saturating_sub(self.started_ms)
    }
}

/// Why a cycle was abandoned. The motor has been stopped in either case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleError<E> {
    /// A position sensor did not assert within `sensor_timeout_ms`.
    SensorTimeout {
        /// Phase that was waiting.
        phase: CyclePhase,
        /// How long it waited.
        waited_ms: u64,
    },
    /// The motor driver reported a line failure.
    Motor(E),
}

impl<E: fmt::Debug> fmt::Display for CycleError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorTimeout { phase, waited_ms } => {
                write!(f, "sensor wait timed out while {phase} after {waited_ms} ms")
            }
            Self::Motor(e) => write!(f, "motor error: {e:?}"),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for CycleError<E> {}

/// Runs cleaning cycles.
///
/// # Type Parameters
///
/// - `M`: motor driver
/// - `S`: sensor flags
/// - `T`: clock and blocking delay
///
/// # Example
///
/// ```rust
/// use catbox::cycle::{CycleConfig, CycleEngine};
/// use catbox::hal::{DrumModel, SimBox};
///
/// let sim = SimBox::with_drum(DrumModel::default());
/// let mut engine = CycleEngine::new(sim.motor(), sim.flags(), sim.time(), CycleConfig::default());
///
/// let report = engine.empty().unwrap();
/// assert!(report.duration_ms() > 0);
/// ```
pub struct CycleEngine<M, S, T> {
    motor: M,
    sensors: S,
    time: T,
    config: CycleConfig,
}

impl<M, S, T> CycleEngine<M, S, T>
where
    M: MotorDriver,
    M::Error: fmt::Debug,
    S: SensorInputs,
    T: Clock + DelayNs,
{
    /// Creates an engine. The motor is not touched until a cycle starts.
    pub fn new(motor: M, sensors: S, time: T, config: CycleConfig) -> Self {
        Self {
            motor,
            sensors,
            time,
            config,
        }
    }

    /// Cycle timing in use.
    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// The motor driver.
    pub fn motor(&self) -> &M {
        &self.motor
    }

    /// The sensor flags.
    pub fn sensors(&self) -> &S {
        &self.sensors
    }

    /// The clock.
    pub fn time(&self) -> &T {
        &self.time
    }

    /// The clock, for blocking delays between cycles.
    pub fn time_mut(&mut self) -> &mut T {
        &mut self.time
    }

    /// Releases the parts.
    pub fn into_parts(self) -> (M, S, T) {
        (self.motor, self.sensors, self.time)
    }

    /// Runs one cleaning cycle to completion.
    pub fn empty(&mut self) -> Result<CycleReport, CycleError<M::Error>> {
        self.empty_observed(|_| {})
    }

    /// Runs one cleaning cycle, reporting each phase as it is entered.
    ///
    /// `observe` sees [`CyclePhase::Idle`] last, whether the cycle finished
    /// or failed.
    pub fn empty_observed<F>(&mut self, mut observe: F) -> Result<CycleReport, CycleError<M::Error>>
    where
        F: FnMut(CyclePhase),
    {
        let started_ms = self.time.now_ms();
        info!("cycle: starting at {started_ms} ms");

        let result = self.run_sequence(&mut observe);
        if let Err(e) = &result {
            error!("cycle: aborted: {e}");
            if let Err(stop_err) = self.motor.stop() {
                error!("cycle: motor stop failed: {stop_err:?}");
            }
        }
        observe(CyclePhase::Idle);

        result.map(|()| {
            let report = CycleReport {
                started_ms,
                finished_ms: self.time.now_ms(),
            };
            info!("cycle: finished in {} ms", report.duration_ms());
            report
        })
    }

    fn run_sequence<F>(&mut self, observe: &mut F) -> Result<(), CycleError<M::Error>>
    where
        F: FnMut(CyclePhase),
    {
        let settle_ms = self.config.settle_ms;

        self.enter(CyclePhase::Dumping, observe);
        self.drive(Direction::Forward)?;
        self.wait_for(CyclePhase::Dumping, |s| s.dump_triggered())?;

        self.enter(CyclePhase::Settling, observe);
        self.drive(Direction::Stopped)?;
        self.time.delay_ms(settle_ms);

        self.enter(CyclePhase::Jiggling, observe);
        let mut dir = Direction::Reverse;
        for _ in 0..self.config.jiggle_impulses {
            self.drive(dir)?;
            self.time.delay_ms(self.config.jiggle_impulse_ms);
            dir = dir.opposite();
        }
        self.drive(Direction::Stopped)?;

        self.enter(CyclePhase::Returning, observe);
        self.drive(Direction::Reverse)?;
        self.wait_for(CyclePhase::Returning, |s| s.home_triggered())?;
        // Past the magnet, not onto it.
        self.time.delay_ms(self.config.home_overshoot_ms);
        self.drive(Direction::Stopped)?;

        self.enter(CyclePhase::Settling, observe);
        self.time.delay_ms(settle_ms);

        self.enter(CyclePhase::Homing, observe);
        self.drive(Direction::Forward)?;
        self.wait_for(CyclePhase::Homing, |s| s.home_triggered())?;
        self.drive(Direction::Stopped)
    }

    fn enter<F>(&self, phase: CyclePhase, observe: &mut F)
    where
        F: FnMut(CyclePhase),
    {
        info!("cycle: {phase} at {} ms", self.time.now_ms());
        observe(phase);
    }

    fn drive(&mut self, dir: Direction) -> Result<(), CycleError<M::Error>> {
        self.motor.drive(dir).map_err(CycleError::Motor)
    }

    fn wait_for(
        &mut self,
        phase: CyclePhase,
        asserted: impl Fn(&S) -> bool,
    ) -> Result<(), CycleError<M::Error>> {
        let start = self.time.now_ms();
        while !asserted(&self.sensors) {
            if let Some(limit) = self.config.sensor_timeout_ms {
                let waited_ms = self.time.now_ms().saturating_sub(start);
                if waited_ms >= u64::from(limit) {
                    return Err(CycleError::SensorTimeout { phase, waited_ms });
                }
            }
            self.time.delay_ms(self.config.poll_interval_ms);
        }
        Ok(())
    }
}

impl<M, S, T> fmt::Debug for CycleEngine<M, S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CycleEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::hal::{DrumModel, LineProbe, SimBox, SimMotor, SimTime};
    use crate::motor::{HBridgeMotor, MotorError};
    use crate::sensors::{Line, SensorFlags};
    use crate::traits::Level;

    type SimEngine = CycleEngine<SimMotor, Arc<SensorFlags>, SimTime>;

    fn engine_for(sim: &SimBox, config: CycleConfig) -> SimEngine {
        CycleEngine::new(sim.motor(), sim.flags(), sim.time(), config)
    }

    #[test]
    fn drum_model_cycle_ends_at_home() {
        let sim = SimBox::with_drum(DrumModel::default());
        let mut engine = engine_for(&sim, CycleConfig::default());

        engine.empty().unwrap();

        assert_eq!(sim.direction(), Direction::Stopped);
        assert!(engine.sensors().home_triggered());
        let log = sim.motor_log();
        assert_eq!(log.last().unwrap().direction, Direction::Stopped);
        assert_eq!(log[log.len() - 2].direction, Direction::Forward);
    }

    #[test]
    fn phases_are_reported_in_order() {
        let sim = SimBox::with_drum(DrumModel::default());
        let mut engine = engine_for(&sim, CycleConfig::default());
        let mut phases = Vec::new();

        engine.empty_observed(|p| phases.push(p)).unwrap();

        assert_eq!(
            phases,
            vec![
                CyclePhase::Dumping,
                CyclePhase::Settling,
                CyclePhase::Jiggling,
                CyclePhase::Returning,
                CyclePhase::Settling,
                CyclePhase::Homing,
                CyclePhase::Idle,
            ]
        );
    }

    #[test]
    fn jiggle_is_four_alternating_impulses() {
        let sim = SimBox::with_drum(DrumModel::default());
        let mut engine = engine_for(&sim, CycleConfig::default());
        engine.empty().unwrap();

        let log = sim.motor_log();
        let dirs: Vec<Direction> = log.iter().map(|e| e.direction).collect();
        assert_eq!(
            &dirs[..8],
            &[
                Direction::Forward,
                Direction::Stopped,
                Direction::Reverse,
                Direction::Forward,
                Direction::Reverse,
                Direction::Forward,
                Direction::Stopped,
                Direction::Reverse,
            ]
        );
        for pair in log[2..7].windows(2) {
            assert_eq!(pair[1].at_ms - pair[0].at_ms, 500);
        }
        // settle between the stop at dump and the first impulse
        assert_eq!(log[2].at_ms - log[1].at_ms, 1_000);
    }

    #[test]
    fn overshoot_runs_past_first_home_assertion() {
        let sim = SimBox::new();
        sim.schedule(300, Line::Dump, Level::Low);
        sim.schedule(1_500, Line::Dump, Level::High);
        sim.schedule(5_000, Line::Home, Level::Low);
        sim.schedule(5_400, Line::Home, Level::High);
        sim.schedule(14_000, Line::Home, Level::Low);
        let mut engine = engine_for(&sim, CycleConfig::default());

        engine.empty().unwrap();

        let log = sim.motor_log();
        let return_stop = log
            .iter()
            .rev()
            .find(|e| e.direction == Direction::Stopped && e.at_ms > 5_000 && e.at_ms < 14_000)
            .unwrap();
        assert_eq!(return_stop.at_ms, 5_000 + 6_500);
        let final_stop = log.last().unwrap();
        assert_eq!(final_stop.at_ms, 14_000);
    }

    #[test]
    fn stuck_sensor_times_out_and_stops() {
        let sim = SimBox::new();
        let config = CycleConfig::default().with_sensor_timeout_ms(Some(3_000));
        let mut engine = engine_for(&sim, config);
        let mut last_phase = None;

        let err = engine.empty_observed(|p| last_phase = Some(p)).unwrap_err();

        match err {
            CycleError::SensorTimeout { phase, waited_ms } => {
                assert_eq!(phase, CyclePhase::Dumping);
                assert!(waited_ms >= 3_000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(sim.direction(), Direction::Stopped);
        assert_eq!(last_phase, Some(CyclePhase::Idle));
    }

    #[test]
    fn motor_failure_is_reported() {
        let sim = SimBox::at_home();
        let probe = LineProbe::new();
        let motor = HBridgeMotor::new(probe.pin("fwd"), probe.pin("rev")).unwrap();
        probe.fail_writes("fwd", true);
        let mut engine = CycleEngine::new(motor, sim.flags(), sim.time(), CycleConfig::default());

        let err = engine.empty().unwrap_err();
        assert!(matches!(err, CycleError::Motor(MotorError::Forward(_))));
        assert!(!probe.is_high("fwd"));
        assert!(!probe.is_high("rev"));
    }

    /// Sim time that breaks the forward line once `at_ms` is reached.
    struct Tripwire {
        time: SimTime,
        probe: LineProbe,
        at_ms: u64,
    }

    impl Clock for Tripwire {
        fn now_ms(&self) -> u64 {
            self.time.now_ms()
        }
    }

    impl DelayNs for Tripwire {
        fn delay_ns(&mut self, ns: u32) {
            self.time.delay_ns(ns);
            if self.time.now_ms() >= self.at_ms {
                self.probe.fail_writes("fwd", true);
            }
        }
    }

    #[test]
    fn abort_while_reversing_releases_reverse_line() {
        let sim = SimBox::new();
        sim.schedule(300, Line::Dump, Level::Low);
        sim.schedule(1_500, Line::Dump, Level::High);
        sim.schedule(5_000, Line::Home, Level::Low);
        let probe = LineProbe::new();
        let motor = HBridgeMotor::new(probe.pin("fwd"), probe.pin("rev")).unwrap();
        let time = Tripwire {
            time: sim.time(),
            probe: probe.clone(),
            at_ms: 8_000,
        };
        let mut engine = CycleEngine::new(motor, sim.flags(), time, CycleConfig::default());

        // the overshoot ends in reverse and its stop cannot write the forward line
        let err = engine.empty().unwrap_err();

        assert!(matches!(err, CycleError::Motor(MotorError::Forward(_))));
        assert!(!probe.is_high("rev"));
        assert_eq!(engine.motor().direction(), Direction::Stopped);
    }

    #[test]
    fn report_duration() {
        let report = CycleReport {
            started_ms: 1_000,
            finished_ms: 31_000,
        };
        assert_eq!(report.duration_ms(), 30_000);
    }
}
