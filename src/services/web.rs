//! Axum front end for the control surface.
//!
//! There are no axum routes: a single fallback handler converts every
//! request into an [`HttpRequest`] and lets [`ControlSurface::handle`] do the
//! routing, so the simulator answers exactly what the board answers.
//!
//! The response body is wrapped so the request only ends when hyper is done
//! with it: a `/empty` cycle is queued and the LED switched off once the
//! last byte has been taken for the socket. A body dropped before that (the
//! client went away) releases the reservation instead.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use http_body::{Body as _, Frame, SizeHint};
use log::info;
use tower_http::cors::CorsLayer;

use crate::config::WebConfig;
use crate::control::{ControlSurface, CycleTicket, Routed};
use crate::traits::{HttpMethod, HttpRequest, HttpResponse, Indicator, SensorInputs};

/// Control surface shared between the server and whoever built it.
pub type SharedSurface<L, S> = Arc<Mutex<ControlSurface<L, S>>>;

// ============================================================================
// Conversions
// ============================================================================

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

fn to_method(method: &Method) -> HttpMethod {
    HttpMethod::from_token(method.as_str())
}

fn to_request(method: &Method, uri: &Uri) -> HttpRequest {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    HttpRequest::new(to_method(method), target)
}

fn lock<L, S>(surface: &SharedSurface<L, S>) -> MutexGuard<'_, ControlSurface<L, S>> {
    surface.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Handler
// ============================================================================

/// Response body that finishes its request when dropped.
struct Delivery<L: Indicator, S: SensorInputs> {
    inner: Body,
    surface: SharedSurface<L, S>,
    ticket: Option<CycleTicket>,
}

impl<L: Indicator, S: SensorInputs> http_body::Body for Delivery<L, S> {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        Pin::new(&mut self.get_mut().inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<L: Indicator, S: SensorInputs> Drop for Delivery<L, S> {
    fn drop(&mut self) {
        let delivered = self.inner.is_end_stream();
        lock(&self.surface).finish(self.ticket.take(), delivered);
    }
}

fn route<L: Indicator, S: SensorInputs>(
    surface: &SharedSurface<L, S>,
    request: &HttpRequest,
) -> Routed {
    lock(surface).handle(request)
}

async fn dispatch<L, S>(
    State(surface): State<SharedSurface<L, S>>,
    method: Method,
    uri: Uri,
) -> Response
where
    L: Indicator + Send + 'static,
    S: SensorInputs + Send + 'static,
{
    let Routed { response, ticket } = route(&surface, &to_request(&method, &uri));
    let (parts, body) = response.into_response().into_parts();
    let body = Body::new(Delivery {
        inner: body,
        surface,
        ticket,
    });
    Response::from_parts(parts, body)
}

// ============================================================================
// Server Builder
// ============================================================================

/// Builds the router. Every method and path reaches the control surface.
pub fn build_router<L, S>(surface: SharedSurface<L, S>, config: &WebConfig) -> Router
where
    L: Indicator + Send + 'static,
    S: SensorInputs + Send + 'static,
{
    let mut router = Router::new()
        .fallback(dispatch::<L, S>)
        .with_state(surface);

    if config.cors_permissive {
        router = router.layer(CorsLayer::permissive());
    }

    router
}

/// Binds `0.0.0.0:<port>` and serves until the task is cancelled.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn run_server<L, S>(
    surface: SharedSurface<L, S>,
    config: WebConfig,
) -> Result<(), std::io::Error>
where
    L: Indicator + Send + 'static,
    S: SensorInputs + Send + 'static,
{
    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    let router = build_router(surface, &config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("web: listening on http://{addr}");

    axum::serve(listener, router).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_keeps_query() {
        let uri: Uri = "/status?a=1&b=2".parse().unwrap();
        let req = to_request(&Method::GET, &uri);
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "/status");
        assert_eq!(req.arg_count(), 2);
    }

    #[test]
    fn unknown_methods_map_to_other() {
        assert_eq!(to_method(&Method::PATCH), HttpMethod::Other);
        assert_eq!(to_method(&Method::DELETE), HttpMethod::Delete);
    }

    #[tokio::test]
    async fn request_ends_when_body_is_taken() {
        let sim = crate::hal::SimBox::at_home();
        let state = Arc::new(crate::control::ControlState::new());
        let surface = Arc::new(Mutex::new(ControlSurface::new(
            Arc::clone(&state),
            crate::hal::MockLed::new(),
            sim.flags(),
        )));
        let uri: Uri = "/empty".parse().unwrap();

        let response = dispatch(State(Arc::clone(&surface)), Method::GET, uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        // handed to the server but not yet written
        assert!(!state.has_queued_request());
        assert!(lock(&surface).led().is_on());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], crate::control::EMPTY_ACK.as_bytes());
        assert!(state.has_queued_request());
        assert!(!lock(&surface).led().is_on());
    }

    #[tokio::test]
    async fn abandoned_body_releases_the_reservation() {
        let sim = crate::hal::SimBox::at_home();
        let state = Arc::new(crate::control::ControlState::new());
        let surface = Arc::new(Mutex::new(ControlSurface::new(
            Arc::clone(&state),
            crate::hal::MockLed::new(),
            sim.flags(),
        )));
        let uri: Uri = "/empty".parse().unwrap();

        let response = dispatch(State(Arc::clone(&surface)), Method::GET, uri).await;
        assert!(state.is_busy());
        drop(response);

        assert!(!state.is_busy());
        assert!(!state.has_queued_request());
        assert!(!lock(&surface).led().is_on());
    }

    #[test]
    fn response_carries_content_type() {
        let resp = HttpResponse::not_found().into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain");
    }
}
