//! HTTP control surface on the ESP-IDF web server.
//!
//! Every request, whatever its path or method, goes through
//! [`ControlSurface::handle`]; this module only translates to and from the
//! esp-idf-svc request type.
//!
//! # Example
//!
//! ```ignore
//! use catbox::hal::esp32::{Esp32HttpServer, StatusLed};
//! use catbox::control::{ControlState, ControlSurface};
//! use catbox::config::WebConfig;
//! use catbox::SENSORS;
//! use std::sync::{Arc, Mutex};
//!
//! let state = Arc::new(ControlState::new());
//! let surface = ControlSurface::new(Arc::clone(&state), led, &SENSORS);
//! let server = Esp32HttpServer::new(&WebConfig::default(), Arc::new(Mutex::new(surface)))?;
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use esp_idf_hal::io::Write;
use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::http::Method;
use esp_idf_svc::io::EspIOError;
use esp_idf_sys::EspError;
use log::{info, warn};

use crate::config::WebConfig;
use crate::control::ControlSurface;
use crate::sensors::SensorFlags;
use crate::traits::{HttpMethod, HttpRequest, HttpResponse};

use super::StatusLed;

/// The control surface as wired on the board.
pub type Esp32ControlSurface = ControlSurface<StatusLed<'static>, &'static SensorFlags>;

type SharedSurface = Arc<Mutex<Esp32ControlSurface>>;

/// Methods the server registers; anything else is rejected by httpd itself.
const METHODS: [Method; 5] = [
    Method::Get,
    Method::Post,
    Method::Put,
    Method::Delete,
    Method::Head,
];

fn lock(surface: &SharedSurface) -> MutexGuard<'_, Esp32ControlSurface> {
    surface.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn to_method(method: Method) -> HttpMethod {
    match method {
        Method::Get => HttpMethod::Get,
        Method::Post => HttpMethod::Post,
        Method::Put => HttpMethod::Put,
        Method::Delete => HttpMethod::Delete,
        _ => HttpMethod::Other,
    }
}

fn write_response(
    req: Request<&mut EspHttpConnection<'_>>,
    response: &HttpResponse,
) -> Result<(), EspIOError> {
    let mut resp = req.into_response(
        response.status,
        None,
        &[("Content-Type", response.content_type)],
    )?;
    resp.write_all(&response.body)?;
    resp.flush()?;
    Ok(())
}

/// HTTP server for the control surface.
pub struct Esp32HttpServer {
    _server: EspHttpServer<'static>,
}

impl Esp32HttpServer {
    /// Starts the server and routes every path through `surface`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails to start.
    pub fn new(config: &WebConfig, surface: SharedSurface) -> Result<Self, EspError> {
        let server_config = Configuration {
            http_port: config.port,
            uri_match_wildcard: true,
            ..Default::default()
        };

        let mut server = EspHttpServer::new(&server_config)?;

        for method in METHODS {
            let surface = Arc::clone(&surface);
            server.fn_handler("/*", method, move |req| {
                let request = HttpRequest::new(to_method(req.method()), req.uri());
                let routed = lock(&surface).handle(&request);

                let written = write_response(req, &routed.response);
                if let Err(e) = &written {
                    warn!("http: write failed: {e:?}");
                }
                lock(&surface).finish(routed.ticket, written.is_ok());
                written
            })?;
        }

        info!("http: server started on port {}", config.port);

        Ok(Self { _server: server })
    }
}
