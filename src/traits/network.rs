//! Network abstraction traits for Wi-Fi, mDNS and the HTTP control surface.
//!
//! # Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Connectivity`] | Station-mode link supervision and reassociation |
//! | [`ServiceAdvertiser`] | Multicast DNS hostname advertisement |
//!
//! # HTTP API
//!
//! The control surface is deliberately tiny and plain-text:
//!
//! ```text
//! GET /empty   - Start a cleaning cycle
//! GET /status  - Liveness and status line
//! *            - 404 "Not found"
//! ```

use alloc::string::String;
use alloc::vec::Vec;

// ============================================================================
// Connectivity
// ============================================================================

/// Station-mode network link.
///
/// The supervisor checks [`is_connected`](Self::is_connected) once per loop
/// iteration and calls [`connect`](Self::connect) when the link is down.
/// `connect` is best-effort: an error just means the next iteration retries.
pub trait Connectivity {
    /// Error type for association attempts.
    type Error: core::fmt::Debug;

    /// Whether the station is currently associated.
    fn is_connected(&self) -> bool;

    /// Scan, select the configured access point and associate.
    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Station MAC address, when the driver exposes it.
    fn mac_address(&self) -> Option<[u8; 6]> {
        None
    }
}

/// Multicast DNS responder.
pub trait ServiceAdvertiser {
    /// Error type for responder setup.
    type Error: core::fmt::Debug;

    /// Start answering for `<hostname>.local` and advertise the HTTP service.
    fn advertise(&mut self, hostname: &str, http_port: u16) -> Result<(), Self::Error>;
}

// ============================================================================
// HTTP types
// ============================================================================

/// HTTP request methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    /// HTTP GET request.
    Get,
    /// HTTP POST request.
    Post,
    /// HTTP PUT request.
    Put,
    /// HTTP DELETE request.
    Delete,
    /// Any other method (HEAD, PATCH, OPTIONS, ...).
    Other,
}

impl HttpMethod {
    /// Parses a method token, case-insensitive.
    ///
    /// ```
    /// use catbox::HttpMethod;
    ///
    /// assert_eq!(HttpMethod::from_token("GET"), HttpMethod::Get);
    /// assert_eq!(HttpMethod::from_token("delete"), HttpMethod::Delete);
    /// assert_eq!(HttpMethod::from_token("PATCH"), HttpMethod::Other);
    /// ```
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "DELETE" => HttpMethod::Delete,
            _ => HttpMethod::Other,
        }
    }

    /// Upper-case method name for logging.
    pub const fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Other => "OTHER",
        }
    }
}

/// An HTTP request received by the server.
///
/// Request bodies are never consumed by the control surface, so only the
/// method, path and raw query string are kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request path without the query string (e.g. "/status").
    pub path: String,
    /// Raw query string, if present.
    pub query: Option<String>,
}

impl HttpRequest {
    /// Builds a request from a method and a full URI (`/path?query`).
    ///
    /// ```
    /// use catbox::{HttpMethod, HttpRequest};
    ///
    /// let req = HttpRequest::new(HttpMethod::Get, "/status?verbose=1&x=2");
    /// assert_eq!(req.path, "/status");
    /// assert_eq!(req.arg_count(), 2);
    /// ```
    pub fn new(method: HttpMethod, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(String::from(query))),
            None => (uri, None),
        };
        Self {
            method,
            path: String::from(path),
            query,
        }
    }

    /// Number of `&`-separated query arguments.
    pub fn arg_count(&self) -> usize {
        self.query
            .as_deref()
            .map(|q| q.split('&').filter(|part| !part.is_empty()).count())
            .unwrap_or(0)
    }
}

/// An HTTP response to send to the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code (e.g., 200, 404).
    pub status: u16,
    /// Content-Type header value.
    pub content_type: &'static str,
    /// Response body as bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a `text/plain` response.
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.as_bytes().to_vec(),
        }
    }

    /// Creates a 200 OK `text/plain` response.
    pub fn ok_text(body: &str) -> Self {
        Self::text(200, body)
    }

    /// Creates the 404 Not Found response.
    pub fn not_found() -> Self {
        Self::text(404, "Not found")
    }

    /// Returns the body as a UTF-8 string, if valid.
    pub fn body_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.body).ok()
    }
}
