//! Desktop simulator.
//!
//! Runs the real supervisor against a simulated drum paced to wall-clock
//! time, and serves the control surface over HTTP.
//!
//! ```bash
//! RUST_LOG=info cargo run --bin catbox_sim --features web -- 8080
//! curl http://localhost:8080/status
//! curl http://localhost:8080/empty
//! ```
//!
//! Type `cat <seconds>` on stdin to simulate a visit.

use std::io::BufRead;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use catbox::config::WebConfig;
use catbox::control::{ControlState, ControlSurface};
use catbox::hal::{DrumModel, MockLed, MockWifi, SimBox, SimTime};
use catbox::services::run_server;
use catbox::traits::Clock;
use catbox::{Config, CycleEngine, Supervisor};

/// Simulated time that also sleeps for real.
struct Paced(SimTime);

impl Clock for Paced {
    fn now_ms(&self) -> u64 {
        self.0.now_ms()
    }
}

impl DelayNs for Paced {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
        self.0.delay_ns(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
        self.0.delay_ms(ms);
    }
}

fn read_commands(sim: SimBox) {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        let mut words = line.split_whitespace();
        match (words.next(), words.next().map(str::parse::<u64>)) {
            (Some("cat"), Some(Ok(secs))) => {
                let now = sim.now_ms();
                sim.cat_visit(now + 1, secs * 1_000);
                info!("sim: cat visit of {secs} s scheduled");
            }
            (None, _) => {}
            _ => warn!("sim: unknown command {line:?} (try `cat 12`)"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let port = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 8080,
    };
    let config = Config::default().with_web(WebConfig::default().with_port(port).with_cors(true));

    let sim = SimBox::with_drum(DrumModel::default());
    let control = Arc::new(ControlState::new());
    let surface = Arc::new(Mutex::new(ControlSurface::new(
        Arc::clone(&control),
        MockLed::new(),
        sim.flags(),
    )));

    let engine = CycleEngine::new(
        sim.motor(),
        sim.flags(),
        Paced(sim.time()),
        config.cycle.clone(),
    );
    let mut supervisor = Supervisor::new(
        engine,
        MockWifi::connected(),
        control,
        config.supervisor.clone(),
    );
    thread::spawn(move || {
        supervisor.run();
    });

    let stdin_sim = sim.clone();
    thread::spawn(move || read_commands(stdin_sim));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_server(surface, config.web))?;
    Ok(())
}
