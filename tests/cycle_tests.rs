//! End-to-end cleaning cycle tests against the simulated box.
//!
//! Timing assertions assume the default cycle configuration: 100 ms sensor
//! polls, 1 s settles, four 500 ms jiggle impulses and a 6.5 s overshoot.

use std::sync::{Arc, Mutex};

use catbox::control::{ControlState, ControlSurface, BUSY_BODY, EMPTY_ACK};
use catbox::hal::{DrumModel, MockLed, MockWifi, MotorEvent, SimBox, SimMotor, SimTime};
use catbox::sensors::Line;
use catbox::traits::{Clock, Direction, HttpMethod, HttpRequest, Indicator, Level, SensorInputs};
use catbox::{CycleConfig, CycleEngine, CyclePhase, SensorFlags, Supervisor, SupervisorConfig, Trigger};
use embedded_hal::delay::DelayNs;

type Surface = ControlSurface<MockLed, Arc<SensorFlags>>;

fn get(path: &str) -> HttpRequest {
    HttpRequest::new(HttpMethod::Get, path)
}

fn event(at_ms: u64, direction: Direction) -> MotorEvent {
    MotorEvent { at_ms, direction }
}

// ============================================================================
// Operator trigger, scripted sensors
// ============================================================================

#[test]
fn operator_request_runs_nominal_cycle() {
    let sim = SimBox::at_home();
    // drum leaves home, reaches dump, leaves dump
    sim.schedule(500, Line::Home, Level::High);
    sim.schedule(5_000, Line::Dump, Level::Low);
    sim.schedule(7_000, Line::Dump, Level::High);
    // passes home while reversing, then lands on it going forward
    sim.schedule(20_000, Line::Home, Level::Low);
    sim.schedule(21_000, Line::Home, Level::High);
    sim.schedule(30_000, Line::Home, Level::Low);

    let control = Arc::new(ControlState::new());
    let mut surface = ControlSurface::new(Arc::clone(&control), MockLed::new(), sim.flags());
    let engine = CycleEngine::new(sim.motor(), sim.flags(), sim.time(), CycleConfig::default());
    let mut supervisor = Supervisor::new(
        engine,
        MockWifi::connected(),
        Arc::clone(&control),
        SupervisorConfig::default(),
    );

    let routed = surface.handle(&get("/empty"));
    assert_eq!(routed.response.status, 200);
    assert_eq!(routed.response.body_str(), Some(EMPTY_ACK));
    assert!(routed.ticket.is_some(), "ticket for accepted request");
    surface.finish(routed.ticket, true);

    let report = supervisor.tick();
    assert_eq!(report.cycles, vec![Trigger::Operator]);

    assert_eq!(
        sim.motor_log(),
        vec![
            event(0, Direction::Forward),
            event(5_000, Direction::Stopped),
            event(6_000, Direction::Reverse),
            event(6_500, Direction::Forward),
            event(7_000, Direction::Reverse),
            event(7_500, Direction::Forward),
            event(8_000, Direction::Stopped),
            event(8_000, Direction::Reverse),
            event(26_500, Direction::Stopped),
            event(27_500, Direction::Forward),
            event(30_000, Direction::Stopped),
        ]
    );
    assert_eq!(sim.direction(), Direction::Stopped);
    assert!(sim.flags().home_triggered());

    let status = control.snapshot();
    assert_eq!(status.cycles_completed, 1);
    assert_eq!(status.phase, CyclePhase::Idle);
    assert!(!status.is_busy());
}

// ============================================================================
// Termination and phase order
// ============================================================================

#[test]
fn cycle_ends_with_forward_approach_then_stop() {
    let sim = SimBox::with_drum(DrumModel::default());
    let mut engine = CycleEngine::new(sim.motor(), sim.flags(), sim.time(), CycleConfig::default());

    engine.empty().unwrap();

    let log = sim.motor_log();
    let [.., approach, last] = log.as_slice() else {
        panic!("cycle issued fewer than two motor commands");
    };
    assert_eq!(approach.direction, Direction::Forward);
    assert_eq!(last.direction, Direction::Stopped);
    assert!(engine.sensors().home_triggered());
    assert!(!engine.sensors().dump_triggered());
}

#[test]
fn phases_run_in_order() {
    let sim = SimBox::with_drum(DrumModel::default());
    let mut engine = CycleEngine::new(sim.motor(), sim.flags(), sim.time(), CycleConfig::default());
    let mut seen = Vec::new();

    engine.empty_observed(|phase| seen.push(phase)).unwrap();

    assert_eq!(
        seen,
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
    let mut engine = CycleEngine::new(sim.motor(), sim.flags(), sim.time(), CycleConfig::default());

    engine.empty().unwrap();

    let log = sim.motor_log();
    // forward, stop at dump, then the jiggle
    let jiggle: Vec<Direction> = log[2..7].iter().map(|e| e.direction).collect();
    assert_eq!(
        jiggle,
        vec![
            Direction::Reverse,
            Direction::Forward,
            Direction::Reverse,
            Direction::Forward,
            Direction::Stopped,
        ]
    );
    for pair in log[2..7].windows(2) {
        assert_eq!(pair[1].at_ms - pair[0].at_ms, 500);
    }
}

#[test]
fn return_overshoots_home() {
    let sim = SimBox::at_home();
    sim.schedule(500, Line::Home, Level::High);
    sim.schedule(2_000, Line::Dump, Level::Low);
    sim.schedule(3_000, Line::Dump, Level::High);
    sim.schedule(9_000, Line::Home, Level::Low);
    sim.schedule(9_500, Line::Home, Level::High);
    sim.schedule(18_000, Line::Home, Level::Low);
    let mut engine = CycleEngine::new(sim.motor(), sim.flags(), sim.time(), CycleConfig::default());

    engine.empty().unwrap();

    let log = sim.motor_log();
    let reverse = log
        .iter()
        .rposition(|e| e.direction == Direction::Reverse)
        .unwrap();
    assert_eq!(log[reverse + 1], event(9_000 + 6_500, Direction::Stopped));
    assert_eq!(log[reverse + 2], event(9_000 + 6_500 + 1_000, Direction::Forward));
    assert_eq!(log.last(), Some(&event(18_000, Direction::Stopped)));
}

// ============================================================================
// Mutual exclusion
// ============================================================================

/// Simulated time that fires HTTP requests at the surface once the clock
/// passes `at_ms`, as the server task would mid-cycle.
struct Knocking {
    time: SimTime,
    surface: Arc<Mutex<Surface>>,
    at_ms: u64,
    empty: Option<(u16, String)>,
    status: Option<String>,
}

impl Knocking {
    fn knock(&mut self) {
        if self.empty.is_some() || self.time.now_ms() < self.at_ms {
            return;
        }
        let mut surface = self.surface.lock().unwrap();
        let routed = surface.handle(&get("/empty"));
        let body = routed.response.body_str().unwrap().to_string();
        self.empty = Some((routed.response.status, body));
        surface.finish(routed.ticket, true);

        let status = surface.handle(&get("/status"));
        assert_eq!(status.response.status, 200);
        self.status = Some(status.response.body_str().unwrap().to_string());
        surface.finish(status.ticket, true);
    }
}

impl Clock for Knocking {
    fn now_ms(&self) -> u64 {
        self.time.now_ms()
    }
}

impl DelayNs for Knocking {
    fn delay_ns(&mut self, ns: u32) {
        self.time.delay_ns(ns);
        self.knock();
    }

    fn delay_ms(&mut self, ms: u32) {
        self.time.delay_ms(ms);
        self.knock();
    }
}

#[test]
fn request_during_cycle_is_refused() {
    let sim = SimBox::with_drum(DrumModel::default());
    let control = Arc::new(ControlState::new());
    let surface = Arc::new(Mutex::new(ControlSurface::new(
        Arc::clone(&control),
        MockLed::new(),
        sim.flags(),
    )));
    let time = Knocking {
        time: sim.time(),
        surface: Arc::clone(&surface),
        at_ms: 3_000,
        empty: None,
        status: None,
    };
    let engine: CycleEngine<SimMotor, Arc<SensorFlags>, Knocking> =
        CycleEngine::new(sim.motor(), sim.flags(), time, CycleConfig::default());
    let mut supervisor = Supervisor::new(
        engine,
        MockWifi::connected(),
        Arc::clone(&control),
        SupervisorConfig::default(),
    );

    let ticket = control.try_reserve().unwrap();
    control.commit(ticket);
    let report = supervisor.tick();
    assert_eq!(report.cycles, vec![Trigger::Operator]);

    let knocked = supervisor.engine().time();
    assert_eq!(knocked.empty, Some((409, BUSY_BODY.to_string())));
    let status = knocked.status.as_deref().unwrap();
    assert!(status.contains("phase: dumping"), "{status}");
    assert!(status.contains("trigger: operator"), "{status}");

    // the refused request left nothing behind
    assert!(!control.has_queued_request());
    assert!(!supervisor.tick().ran_cycle());
    assert_eq!(control.snapshot().cycles_completed, 1);
    assert!(!surface.lock().unwrap().led().is_on());
}
