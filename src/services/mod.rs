//! Host-side network services.
//!
//! The `web` feature serves the same control surface the board exposes over
//! axum, for the simulator and for integration tests.
//!
//! ```ignore
//! use std::sync::{Arc, Mutex};
//! use catbox::services::{build_router, SharedSurface};
//!
//! let surface: SharedSurface<_, _> = Arc::new(Mutex::new(control_surface));
//! let router = build_router(Arc::clone(&surface), &web_config);
//! ```

pub mod web;

pub use web::*;
