//! Shared control state and the platform-agnostic HTTP control surface.
//!
//! Both HTTP servers (esp-idf-svc on the board, axum on the desktop) route
//! every request through [`ControlSurface::handle`] and translate the
//! returned [`HttpResponse`] into their native type.
//!
//! # Triggering a cycle
//!
//! The server runs on its own task while the supervisor owns the motor, so
//! `/empty` never starts the motor itself. It works in two steps:
//!
//! 1. [`ControlSurface::handle`] reserves the single request slot and returns
//!    a [`CycleTicket`] alongside the 200 response.
//! 2. Once the response has been written and flushed, the adapter passes the
//!    ticket to [`ControlSurface::finish`], which queues the cycle and
//!    switches the request LED off.
//!
//! The supervisor picks queued requests up on its next iteration. While a
//! cycle is reserved, queued or running, further `/empty` requests get a
//! 409 and `/status` keeps answering.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use catbox::control::{ControlState, ControlSurface};
//! use catbox::hal::{MockLed, SimBox};
//! use catbox::{HttpMethod, HttpRequest, Indicator};
//!
//! let sim = SimBox::at_home();
//! let state = Arc::new(ControlState::new());
//! let mut surface = ControlSurface::new(Arc::clone(&state), MockLed::new(), sim.flags());
//!
//! let routed = surface.handle(&HttpRequest::new(HttpMethod::Get, "/empty"));
//! assert_eq!(routed.response.status, 200);
//! assert!(surface.led().is_on());
//! // ... write the response, then:
//! surface.finish(routed.ticket, true);
//! assert!(state.has_queued_request());
//! assert!(!surface.led().is_on());
//! ```

use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::cycle::CyclePhase;
use crate::sensors::SensorSnapshot;
use crate::traits::{HttpMethod, HttpRequest, HttpResponse, Indicator, SensorInputs};

/// Body of the `/empty` acknowledgement.
pub const EMPTY_ACK: &str = "Running the empty procedure";

/// Body returned when a cycle is already reserved, queued or running.
pub const BUSY_BODY: &str = "Busy: a cleaning cycle is already in progress";

/// First line of every `/status` body.
pub const STATUS_HEADER: &str = "CatBox is alive";

// ============================================================================
// Cycle bookkeeping
// ============================================================================

/// What started a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Trigger {
    /// `GET /empty`.
    Operator,
    /// The cat stayed past the dwell threshold.
    Cat,
}

impl Trigger {
    /// Lowercase name for logs and status output.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Trigger::Operator => "operator",
            Trigger::Cat => "cat",
        }
    }
}

/// How the most recent cycle ended.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CycleOutcome {
    /// The drum returned home.
    Completed {
        /// What started the cycle.
        trigger: Trigger,
        /// Total cycle time.
        duration_ms: u64,
    },
    /// The cycle was abandoned with the motor stopped.
    Failed {
        /// What started the cycle.
        trigger: Trigger,
        /// Formatted error.
        reason: String,
    },
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed {
                trigger,
                duration_ms,
            } => write!(f, "completed ({}, {duration_ms} ms)", trigger.as_str()),
            Self::Failed { trigger, reason } => {
                write!(f, "failed ({}): {reason}", trigger.as_str())
            }
        }
    }
}

/// Proof that the operator request slot was reserved.
///
/// Hand it back through [`ControlSurface::finish`] once the response has been
/// written, or to [`ControlState::release`] if it never will be.
#[must_use = "a reserved request blocks further /empty calls until committed or released"]
#[derive(Debug, PartialEq, Eq)]
pub struct CycleTicket {
    _reserved: (),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RequestSlot {
    Free,
    Reserved,
    Queued,
}

#[derive(Debug)]
struct Inner {
    request: RequestSlot,
    running: Option<Trigger>,
    phase: CyclePhase,
    cycles_completed: u32,
    cycles_failed: u32,
    last: Option<CycleOutcome>,
}

/// Point-in-time copy of the control state.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusSnapshot {
    /// Phase of the running cycle, or idle.
    pub phase: CyclePhase,
    /// What started the running cycle.
    pub running: Option<Trigger>,
    /// An operator request is reserved or queued.
    pub request_pending: bool,
    /// Cycles that returned home.
    pub cycles_completed: u32,
    /// Cycles that were abandoned.
    pub cycles_failed: u32,
    /// Outcome of the most recent cycle.
    pub last: Option<CycleOutcome>,
}

impl StatusSnapshot {
    /// A cycle is running or an operator request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.running.is_some() || self.request_pending
    }
}

/// State shared between the HTTP server and the supervisor.
///
/// Wrap it in an [`Arc`]; every method takes `&self`.
#[derive(Debug)]
pub struct ControlState {
    inner: Mutex<Inner>,
}

impl ControlState {
    /// Idle state, no cycles run yet.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                request: RequestSlot::Free,
                running: None,
                phase: CyclePhase::Idle,
                cycles_completed: 0,
                cycles_failed: 0,
                last: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserves the operator request slot.
    ///
    /// Returns `None` when a cycle is running or a request is already
    /// reserved or queued.
    pub fn try_reserve(&self) -> Option<CycleTicket> {
        let mut inner = self.lock();
        if inner.running.is_some() || inner.request != RequestSlot::Free {
            return None;
        }
        inner.request = RequestSlot::Reserved;
        Some(CycleTicket { _reserved: () })
    }

    /// Queues the reserved request for the supervisor.
    ///
    /// If a cycle started in the meantime (the cat got there first) the
    /// request is folded into it.
    pub fn commit(&self, ticket: CycleTicket) {
        let CycleTicket { .. } = ticket;
        let mut inner = self.lock();
        if inner.request != RequestSlot::Reserved {
            return;
        }
        if let Some(trigger) = inner.running {
            debug!("control: request folded into running {} cycle", trigger.as_str());
            inner.request = RequestSlot::Free;
        } else {
            inner.request = RequestSlot::Queued;
        }
    }

    /// Gives a reservation back without queueing anything.
    pub fn release(&self, ticket: CycleTicket) {
        let CycleTicket { .. } = ticket;
        let mut inner = self.lock();
        if inner.request == RequestSlot::Reserved {
            inner.request = RequestSlot::Free;
        }
    }

    /// An operator request is waiting for the supervisor.
    pub fn has_queued_request(&self) -> bool {
        self.lock().request == RequestSlot::Queued
    }

    /// Takes a queued operator request and marks its cycle as running.
    pub fn take_request(&self) -> bool {
        let mut inner = self.lock();
        if inner.request != RequestSlot::Queued || inner.running.is_some() {
            return false;
        }
        inner.request = RequestSlot::Free;
        inner.running = Some(Trigger::Operator);
        true
    }

    /// Marks a cycle as running. A queued operator request is satisfied by
    /// the same cycle.
    ///
    /// Returns `false` if a cycle is already running.
    pub fn begin(&self, trigger: Trigger) -> bool {
        let mut inner = self.lock();
        if inner.running.is_some() {
            return false;
        }
        if inner.request == RequestSlot::Queued {
            debug!("control: queued request folded into {} cycle", trigger.as_str());
            inner.request = RequestSlot::Free;
        }
        inner.running = Some(trigger);
        true
    }

    /// Records the phase of the running cycle.
    pub fn set_phase(&self, phase: CyclePhase) {
        self.lock().phase = phase;
    }

    /// Records the end of the running cycle.
    pub fn finish(&self, outcome: CycleOutcome) {
        let mut inner = self.lock();
        match outcome {
            CycleOutcome::Completed { .. } => inner.cycles_completed += 1,
            CycleOutcome::Failed { .. } => inner.cycles_failed += 1,
        }
        inner.running = None;
        inner.phase = CyclePhase::Idle;
        inner.last = Some(outcome);
    }

    /// A cycle is running or an operator request is outstanding.
    pub fn is_busy(&self) -> bool {
        let inner = self.lock();
        inner.running.is_some() || inner.request != RequestSlot::Free
    }

    /// Copies the current state.
    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.lock();
        StatusSnapshot {
            phase: inner.phase,
            running: inner.running,
            request_pending: inner.request != RequestSlot::Free,
            cycles_completed: inner.cycles_completed,
            cycles_failed: inner.cycles_failed,
            last: inner.last.clone(),
        }
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Control Surface
// ============================================================================

/// Result of routing one request.
#[derive(Debug)]
pub struct Routed {
    /// Response to send.
    pub response: HttpResponse,
    /// Present when the request reserved a cycle.
    pub ticket: Option<CycleTicket>,
}

/// Routes HTTP requests onto the shared control state.
///
/// Owns the request LED, which is on for the duration of every
/// [`handle`](Self::handle) call.
#[derive(Debug)]
pub struct ControlSurface<L, S> {
    state: Arc<ControlState>,
    led: L,
    sensors: S,
}

impl<L: Indicator, S: SensorInputs> ControlSurface<L, S> {
    /// Creates a surface. The LED is switched off.
    pub fn new(state: Arc<ControlState>, mut led: L, sensors: S) -> Self {
        led.off();
        Self { state, led, sensors }
    }

    /// Shared state handle.
    pub fn state(&self) -> &Arc<ControlState> {
        &self.state
    }

    /// The request LED.
    pub fn led(&self) -> &L {
        &self.led
    }

    /// Routes one request and lights the LED.
    ///
    /// The LED stays on until [`finish`](Self::finish) is called once the
    /// response has been written.
    pub fn handle(&mut self, req: &HttpRequest) -> Routed {
        self.led.on();
        info!(
            "http: method={} path={} args={}",
            req.method.as_str(),
            req.path,
            req.arg_count()
        );

        let routed = match (req.method, req.path.as_str()) {
            (HttpMethod::Get, "/empty") => self.handle_empty(),
            (HttpMethod::Get, "/status") => Routed {
                response: HttpResponse::ok_text(&self.status_body()),
                ticket: None,
            },
            _ => Routed {
                response: HttpResponse::not_found(),
                ticket: None,
            },
        };

        debug!("http: {} {} -> {}", req.method.as_str(), req.path, routed.response.status);
        routed
    }

    /// Ends a request once the adapter is done writing its response.
    ///
    /// A ticket is committed when the response reached the client and
    /// released otherwise. The LED goes off either way.
    pub fn finish(&mut self, ticket: Option<CycleTicket>, delivered: bool) {
        if let Some(ticket) = ticket {
            if delivered {
                self.state.commit(ticket);
            } else {
                warn!("http: response not delivered, cycle request dropped");
                self.state.release(ticket);
            }
        }
        self.led.off();
    }

    fn handle_empty(&self) -> Routed {
        match self.state.try_reserve() {
            Some(ticket) => {
                info!("http: cleaning cycle requested");
                Routed {
                    response: HttpResponse::ok_text(EMPTY_ACK),
                    ticket: Some(ticket),
                }
            }
            None => {
                info!("http: cleaning cycle refused, busy");
                Routed {
                    response: HttpResponse::text(409, BUSY_BODY),
                    ticket: None,
                }
            }
        }
    }

    /// Plain-text `/status` body.
    pub fn status_body(&self) -> String {
        let status = self.state.snapshot();
        let sensors = SensorSnapshot::sample(&self.sensors);

        let mut body = String::from(STATUS_HEADER);
        body.push('\n');
        let _ = writeln!(body, "phase: {}", status.phase);
        if let Some(trigger) = status.running {
            let _ = writeln!(body, "trigger: {}", trigger.as_str());
        }
        let _ = writeln!(
            body,
            "sensors: home={} dump={} cat={}",
            sensors.home, sensors.dump, sensors.cat
        );
        let _ = writeln!(
            body,
            "cycles: {} completed, {} failed",
            status.cycles_completed, status.cycles_failed
        );
        match &status.last {
            Some(outcome) => {
                let _ = writeln!(body, "last: {outcome}");
            }
            None => body.push_str("last: none\n"),
        }
        body
    }
}

// ============================================================================
// Tests
// ============================================================================
