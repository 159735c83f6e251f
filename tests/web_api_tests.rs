//! Integration tests for the HTTP control surface served over axum.

#![cfg(feature = "web")]

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use catbox::config::WebConfig;
use catbox::control::{ControlState, ControlSurface, BUSY_BODY, EMPTY_ACK, STATUS_HEADER};
use catbox::hal::{MockLed, SimBox};
use catbox::services::{build_router, SharedSurface};
use catbox::traits::Indicator;
use catbox::{CyclePhase, SensorFlags, Trigger};

struct TestApp {
    router: axum::Router,
    surface: SharedSurface<MockLed, Arc<SensorFlags>>,
    control: Arc<ControlState>,
}

fn create_test_app() -> TestApp {
    let sim = SimBox::at_home();
    let control = Arc::new(ControlState::new());
    let surface = Arc::new(Mutex::new(ControlSurface::new(
        Arc::clone(&control),
        MockLed::new(),
        sim.flags(),
    )));
    let router = build_router(Arc::clone(&surface), &WebConfig::default());
    TestApp {
        router,
        surface,
        control,
    }
}

async fn send(app: &TestApp, method: &str, uri: &str) -> (StatusCode, String, String) {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let content_type = response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .to_string();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_empty_acknowledges_and_queues() {
    let app = create_test_app();

    let (status, content_type, body) = send(&app, "GET", "/empty").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "text/plain");
    assert_eq!(body, EMPTY_ACK);
    assert!(app.control.has_queued_request());
}

#[tokio::test]
async fn test_second_empty_is_busy() {
    let app = create_test_app();

    let (first, _, _) = send(&app, "GET", "/empty").await;
    let (second, _, body) = send(&app, "GET", "/empty").await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body, BUSY_BODY);
}

#[tokio::test]
async fn test_empty_while_cycle_runs_is_busy() {
    let app = create_test_app();
    assert!(app.control.begin(Trigger::Cat));
    app.control.set_phase(CyclePhase::Jiggling);

    let (status, _, _) = send(&app, "GET", "/empty").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(!app.control.has_queued_request());

    let (status, _, body) = send(&app, "GET", "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("phase: jiggling"), "{body}");
    assert!(body.contains("trigger: cat"), "{body}");
}

#[tokio::test]
async fn test_status() {
    let app = create_test_app();

    let (status, content_type, body) = send(&app, "GET", "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "text/plain");
    assert!(body.starts_with(STATUS_HEADER));
    assert!(body.contains("phase: idle"));
    assert!(body.contains("sensors: home=true dump=false cat=false"), "{body}");
    assert!(body.contains("last: none"));
}

#[tokio::test]
async fn test_status_ignores_query() {
    let app = create_test_app();

    let (status, _, body) = send(&app, "GET", "/status?verbose=1").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(STATUS_HEADER));
}

#[tokio::test]
async fn test_delete_status_not_found() {
    let app = create_test_app();

    let (status, content_type, body) = send(&app, "DELETE", "/status").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(content_type, "text/plain");
    assert_eq!(body, "Not found");
}

#[tokio::test]
async fn test_post_empty_not_found() {
    let app = create_test_app();

    let (status, _, body) = send(&app, "POST", "/empty").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Not found");
    assert!(!app.control.is_busy());
}

#[tokio::test]
async fn test_not_found() {
    let app = create_test_app();

    for uri in ["/", "/unknown", "/empty/now", "/STATUS"] {
        let (status, _, body) = send(&app, "GET", uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body, "Not found");
    }
}

#[tokio::test]
async fn test_led_lit_once_per_request() {
    let app = create_test_app();

    send(&app, "GET", "/status").await;
    send(&app, "GET", "/nope").await;
    send(&app, "GET", "/empty").await;

    let surface = app.surface.lock().unwrap();
    assert_eq!(surface.led().on_count, 3);
    assert!(!surface.led().is_on());
}
