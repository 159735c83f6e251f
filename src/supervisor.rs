//! Main loop: keeps the link up, runs requested cycles, watches for the cat.
//!
//! Each [`Supervisor::tick`] does, in order:
//!
//! 1. reassociate if the Wi-Fi link is down (best effort, no backoff),
//! 2. run a cycle queued by `GET /empty`,
//! 3. if the cat is in the box, wait for it to leave and run a cycle if it
//!    stayed at least `dwell_threshold_ms`.
//!
//! Cycles run synchronously on the supervisor's thread, which is the only
//! owner of the motor.

use std::fmt;
use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use crate::config::SupervisorConfig;
use crate::control::{ControlState, CycleOutcome, Trigger};
use crate::cycle::CycleEngine;
use crate::traits::{Clock, Connectivity, MotorDriver, SensorInputs};

/// Result of watching one cat visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatVisit {
    /// Left before the dwell threshold; no cycle.
    LeftTooSoon {
        /// Continuous presence observed.
        dwell_ms: u64,
    },
    /// Stayed long enough; a cycle was run.
    Stayed {
        /// Continuous presence observed.
        dwell_ms: u64,
    },
}

/// What one loop iteration did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The link was down and reassociation was attempted.
    pub reconnect_attempted: bool,
    /// Triggers of the cycles run during this iteration, in order.
    pub cycles: Vec<Trigger>,
    /// The cat visit observed during this iteration.
    pub cat_visit: Option<CatVisit>,
}

impl TickReport {
    /// Whether any cycle ran.
    pub fn ran_cycle(&self) -> bool {
        !self.cycles.is_empty()
    }
}

/// The top-level loop.
pub struct Supervisor<M, S, T, W> {
    engine: CycleEngine<M, S, T>,
    wifi: W,
    control: Arc<ControlState>,
    config: SupervisorConfig,
}

impl<M, S, T, W> Supervisor<M, S, T, W>
where
    M: MotorDriver,
    M::Error: fmt::Debug,
    S: SensorInputs,
    T: Clock + DelayNs,
    W: Connectivity,
{
    /// Creates a supervisor around a cycle engine and a link.
    pub fn new(
        engine: CycleEngine<M, S, T>,
        wifi: W,
        control: Arc<ControlState>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            engine,
            wifi,
            control,
            config,
        }
    }

    /// The cycle engine.
    pub fn engine(&self) -> &CycleEngine<M, S, T> {
        &self.engine
    }

    /// The network link.
    pub fn wifi(&self) -> &W {
        &self.wifi
    }

    /// Shared control state.
    pub fn control(&self) -> &Arc<ControlState> {
        &self.control
    }

    /// Runs forever.
    pub fn run(&mut self) -> ! {
        info!(
            "supervisor: running (dwell threshold {} ms)",
            self.config.dwell_threshold_ms
        );
        loop {
            self.tick();
            self.engine.time_mut().delay_ms(self.config.loop_interval_ms);
        }
    }

    /// One loop iteration.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        if !self.wifi.is_connected() {
            report.reconnect_attempted = true;
            warn!("wifi: link down, reassociating");
            match self.wifi.connect() {
                Ok(()) => info!("wifi: reassociated"),
                Err(e) => warn!("wifi: reassociation failed: {e:?}"),
            }
        }

        if self.control.take_request() {
            self.run_cycle(Trigger::Operator);
            report.cycles.push(Trigger::Operator);
        }

        if self.engine.sensors().cat_present() {
            let visit = self.watch_cat();
            if let CatVisit::Stayed { .. } = visit {
                if self.control.begin(Trigger::Cat) {
                    self.run_cycle(Trigger::Cat);
                    report.cycles.push(Trigger::Cat);
                }
            }
            report.cat_visit = Some(visit);
        }

        report
    }

    fn watch_cat(&mut self) -> CatVisit {
        let t0 = self.engine.time().now_ms();
        info!("cat: detected");
        while self.engine.sensors().cat_present() {
            self.engine
                .time_mut()
                .delay_ms(self.config.poll_interval_ms);
        }
        let dwell_ms = self.engine.time().now_ms().saturating_sub(t0);

        if dwell_ms >= u64::from(self.config.dwell_threshold_ms) {
            info!("cat: left after {dwell_ms} ms, cleaning");
            CatVisit::Stayed { dwell_ms }
        } else {
            info!("cat: left too soon ({dwell_ms} ms)");
            CatVisit::LeftTooSoon { dwell_ms }
        }
    }

    /// Runs one cycle. The caller has already marked it running.
    fn run_cycle(&mut self, trigger: Trigger) {
        info!("supervisor: {} cycle", trigger.as_str());
        let control = Arc::clone(&self.control);
        let outcome = match self.engine.empty_observed(|phase| control.set_phase(phase)) {
            Ok(report) => CycleOutcome::Completed {
                trigger,
                duration_ms: report.duration_ms(),
            },
            Err(e) => {
                error!("supervisor: {} cycle failed: {e}", trigger.as_str());
                CycleOutcome::Failed {
                    trigger,
                    reason: e.to_string(),
                }
            }
        };
        self.control.finish(outcome);
    }
}

impl<M, S, T, W> fmt::Debug for Supervisor<M, S, T, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("engine", &self.engine)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CycleConfig;
    use crate::hal::{DrumModel, MockWifi, SimBox, SimMotor, SimTime};
    use crate::sensors::SensorFlags;

    type SimSupervisor = Supervisor<SimMotor, Arc<SensorFlags>, SimTime, MockWifi>;

    fn supervisor(sim: &SimBox, wifi: MockWifi) -> SimSupervisor {
        let engine = CycleEngine::new(sim.motor(), sim.flags(), sim.time(), CycleConfig::default());
        Supervisor::new(
            engine,
            wifi,
            Arc::new(ControlState::new()),
            SupervisorConfig::default(),
        )
    }

    #[test]
    fn idle_tick_does_nothing() {
        let sim = SimBox::with_drum(DrumModel::default());
        let mut sup = supervisor(&sim, MockWifi::connected());

        let report = sup.tick();
        assert_eq!(report, TickReport::default());
        assert!(sim.motor_log().is_empty());
    }

    #[test]
    fn dwell_exactly_at_threshold_runs_cycle() {
        let sim = SimBox::with_drum(DrumModel::default());
        sim.cat_visit(100, 10_000);
        sim.advance(100);
        let mut sup = supervisor(&sim, MockWifi::connected());

        let report = sup.tick();
        assert_eq!(report.cat_visit, Some(CatVisit::Stayed { dwell_ms: 10_000 }));
        assert_eq!(report.cycles, vec![Trigger::Cat]);
    }

    #[test]
    fn dwell_just_short_does_not() {
        let sim = SimBox::with_drum(DrumModel::default());
        sim.cat_visit(100, 9_900);
        sim.advance(100);
        let mut sup = supervisor(&sim, MockWifi::connected());

        let report = sup.tick();
        assert_eq!(report.cat_visit, Some(CatVisit::LeftTooSoon { dwell_ms: 9_900 }));
        assert!(!report.ran_cycle());
    }

    #[test]
    fn queued_request_runs_operator_cycle() {
        let sim = SimBox::with_drum(DrumModel::default());
        let mut sup = supervisor(&sim, MockWifi::connected());
        let ticket = sup.control().try_reserve().unwrap();

        // reserved but not committed: nothing runs yet
        assert!(!sup.tick().ran_cycle());

        sup.control().commit(ticket);
        let report = sup.tick();
        assert_eq!(report.cycles, vec![Trigger::Operator]);

        let status = sup.control().snapshot();
        assert_eq!(status.cycles_completed, 1);
        assert!(!status.is_busy());
        assert!(matches!(
            status.last,
            Some(CycleOutcome::Completed {
                trigger: Trigger::Operator,
                ..
            })
        ));
    }

    #[test]
    fn failed_cycle_is_recorded_and_loop_continues() {
        let sim = SimBox::new();
        let engine = CycleEngine::new(
            sim.motor(),
            sim.flags(),
            sim.time(),
            CycleConfig::default().with_sensor_timeout_ms(Some(2_000)),
        );
        let control = Arc::new(ControlState::new());
        let mut sup = Supervisor::new(
            engine,
            MockWifi::connected(),
            Arc::clone(&control),
            SupervisorConfig::default(),
        );
        let ticket = control.try_reserve().unwrap();
        control.commit(ticket);

        let report = sup.tick();
        assert!(report.ran_cycle());
        let status = control.snapshot();
        assert_eq!(status.cycles_failed, 1);
        assert!(!status.is_busy());
        assert!(control.try_reserve().is_some());
    }

    #[test]
    fn reconnect_only_when_link_down() {
        let sim = SimBox::new();
        let wifi = MockWifi::connected();
        let handle = wifi.clone();
        let mut sup = supervisor(&sim, wifi);

        assert!(!sup.tick().reconnect_attempted);
        handle.drop_link();
        assert!(sup.tick().reconnect_attempted);
        assert_eq!(handle.connect_calls(), 1);
        assert!(sup.wifi().is_connected());
    }
}
