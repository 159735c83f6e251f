//! Property tests for the motor bridge, the sensor flags and request routing.
//!
//! Host only; proptest does not build for the ESP32 target.

#![cfg(not(target_os = "espidf"))]

use std::sync::Arc;

use catbox::control::{ControlState, ControlSurface};
use catbox::hal::{LineProbe, LineTransition, MockLed, SimBox};
use catbox::sensors::{Line, SensorFlags};
use catbox::traits::{Direction, HttpMethod, HttpRequest, Level, MotorDriver, SensorInputs};
use catbox::HBridgeMotor;
use proptest::prelude::*;

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::Forward),
        Just(Direction::Reverse),
        Just(Direction::Stopped),
    ]
}

fn arb_line() -> impl Strategy<Value = Line> {
    prop_oneof![Just(Line::Home), Just(Line::Dump), Just(Line::Cat)]
}

fn arb_level() -> impl Strategy<Value = Level> {
    prop_oneof![Just(Level::High), Just(Level::Low)]
}

// ── H-bridge shoot-through ───────────────────────────────────

#[test]
fn forward_then_reverse_releases_forward_first() {
    let probe = LineProbe::new();
    let mut motor = HBridgeMotor::new(probe.pin("fwd"), probe.pin("rev")).unwrap();
    motor.forward().unwrap();
    probe.clear_history();

    motor.reverse().unwrap();

    let history = probe.history();
    let released = history
        .iter()
        .position(|t| *t == LineTransition { line: "fwd", high: false })
        .expect("forward line released");
    let asserted = history
        .iter()
        .position(|t| *t == LineTransition { line: "rev", high: true })
        .expect("reverse line asserted");
    assert!(released < asserted, "{history:?}");
    assert!(!probe.ever_both_asserted());
}

proptest! {
    /// No sequence of commands ever has both bridge lines high.
    #[test]
    fn bridge_lines_never_both_high(
        commands in proptest::collection::vec(arb_direction(), 1..64),
    ) {
        let probe = LineProbe::new();
        let mut motor = HBridgeMotor::new(probe.pin("fwd"), probe.pin("rev")).unwrap();

        for dir in commands {
            motor.drive(dir).unwrap();
            prop_assert_eq!(motor.direction(), dir);
            prop_assert_eq!(probe.is_high("fwd"), dir == Direction::Forward);
            prop_assert_eq!(probe.is_high("rev"), dir == Direction::Reverse);
        }
        prop_assert!(!probe.ever_both_asserted());
    }

    /// Even with both latches high at boot, construction clears them.
    #[test]
    fn construction_clears_boot_latches(
        commands in proptest::collection::vec(arb_direction(), 0..16),
    ) {
        let probe = LineProbe::new();
        let fwd = probe.pin("fwd");
        let rev = probe.pin("rev");
        probe.force("fwd", true);
        probe.force("rev", true);

        let mut motor = HBridgeMotor::new(fwd, rev).unwrap();
        prop_assert!(!probe.is_high("fwd"));
        prop_assert!(!probe.is_high("rev"));

        for dir in commands {
            motor.drive(dir).unwrap();
        }
        prop_assert!(!(probe.is_high("fwd") && probe.is_high("rev")));
    }
}

// ── Sensor flags ─────────────────────────────────────────────

proptest! {
    /// Repeating an edge with the same level leaves the flag unchanged.
    #[test]
    fn repeated_edges_are_idempotent(
        line in arb_line(),
        level in arb_level(),
        repeats in 1usize..16,
    ) {
        let flags = SensorFlags::new();
        flags.record_edge(line, level);
        let once = flags.snapshot();

        for _ in 0..repeats {
            flags.record_edge(line, level);
        }
        prop_assert_eq!(flags.snapshot(), once);
        prop_assert_eq!(flags.is_asserted(line), line.asserted_at(level));
    }

    /// The flags always reflect the last level seen on each line.
    #[test]
    fn flags_follow_last_edge(
        edges in proptest::collection::vec((arb_line(), arb_level()), 1..64),
    ) {
        let flags = SensorFlags::new();
        let mut last = [None; 3];

        for (line, level) in &edges {
            flags.record_edge(*line, *level);
            let idx = Line::ALL.iter().position(|l| l == line).unwrap();
            last[idx] = Some(*level);
        }

        for (idx, line) in Line::ALL.into_iter().enumerate() {
            if let Some(level) = last[idx] {
                prop_assert_eq!(flags.is_asserted(line), line.asserted_at(level));
            }
        }
    }
}

// ── Routing ──────────────────────────────────────────────────

proptest! {
    /// Only `GET /empty` and `GET /status` are routed; everything else is 404
    /// and never reserves a cycle.
    #[test]
    fn only_two_routes_exist(
        method in prop_oneof![
            Just(HttpMethod::Get),
            Just(HttpMethod::Post),
            Just(HttpMethod::Put),
            Just(HttpMethod::Delete),
            Just(HttpMethod::Other),
        ],
        path in "/[a-z]{0,8}",
    ) {
        let sim = SimBox::at_home();
        let state = Arc::new(ControlState::new());
        let mut surface = ControlSurface::new(Arc::clone(&state), MockLed::new(), sim.flags());

        let routed = surface.handle(&HttpRequest::new(method, &path));

        let expected = match (method, path.as_str()) {
            (HttpMethod::Get, "/empty") | (HttpMethod::Get, "/status") => 200,
            _ => 404,
        };
        prop_assert_eq!(routed.response.status, expected);
        prop_assert_eq!(routed.ticket.is_some(), method == HttpMethod::Get && path == "/empty");
        if expected == 404 {
            prop_assert_eq!(routed.response.body_str(), Some("Not found"));
            prop_assert!(!state.is_busy());
        }
        if let Some(ticket) = routed.ticket {
            state.release(ticket);
        }
        prop_assert!(sim.flags().home_triggered());
    }
}
