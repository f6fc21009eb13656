use std::sync::Arc;

use brrtdispatch::app::AppBuilder;
use brrtdispatch::config::AppConfig;
use brrtdispatch::dispatcher::{Request, Response};
use brrtdispatch::plugins::{Plugin, PluginDecl, ROUTING};
use brrtdispatch::status::{finish_with, StageResult, StatusInfo};
use brrtdispatch::transport::TransportEvent;
use http::{Method, StatusCode};
use tracing::Level;

mod common;
use common::fixtures::{CountingPlugin, StageCounter};
use common::tracing_util::TestTracing;

/// Aborts during pre-request fixup.
struct Gate;

impl Plugin for Gate {
    fn fixup_request(&self, req: Request) -> StageResult<Request> {
        if req.get_header("x-let-me-in").is_none() {
            return finish_with(StatusInfo::forbidden("Closed."));
        }
        Ok(req)
    }
}

/// Stamps every response it sees in post-response fixup.
struct Stamp;

impl Plugin for Stamp {
    fn fixup_response(&self, _req: &Request, res: &mut Response) -> StageResult<()> {
        res.set_header("x-stamped", "yes".to_string());
        Ok(())
    }
}

/// Fails during post-response fixup.
struct Broken;

impl Plugin for Broken {
    fn fixup_response(&self, _req: &Request, _res: &mut Response) -> StageResult<()> {
        Err(anyhow::anyhow!("template store unavailable").into())
    }
}

/// Fails during pre-request fixup with a wrapped I/O error.
struct Unreadable;

impl Plugin for Unreadable {
    fn fixup_request(&self, _req: Request) -> StageResult<Request> {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "session store missing");
        Err(anyhow::Error::from(missing)
            .context("loading session")
            .into())
    }
}

/// Ends the dispatch from post-response fixup.
struct Veto;

impl Plugin for Veto {
    fn fixup_response(&self, _req: &Request, _res: &mut Response) -> StageResult<()> {
        finish_with(StatusInfo::forbidden("Vetoed."))
    }
}

fn hello(req: &mut Request) -> StageResult<Response> {
    Ok(Response::text(req, StatusCode::OK, "hello"))
}

#[test]
fn test_abort_in_pre_fixup_skips_handle_and_post_fixup() {
    let counter = Arc::new(StageCounter::default());
    let mut builder = AppBuilder::new("gate");
    builder
        .plugin(PluginDecl::new("gate", Gate))
        .plugin(PluginDecl::new("counter", CountingPlugin(Arc::clone(&counter))).after("gate"))
        .route(Method::GET, "/", hello)
        .unwrap();
    let app = builder.build().unwrap();
    assert_eq!(app.chain_names(), vec!["gate", "counter", ROUTING]);

    let res = app.dispatch(Request::new(Method::GET, "/"));
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body_str(), Some("Closed."));
    assert_eq!(counter.counts(), (0, 0, 0));

    let res = app.dispatch(Request::new(Method::GET, "/").with_header("X-Let-Me-In", "1"));
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(counter.counts(), (1, 1, 1));
}

#[test]
fn test_status_response_skips_post_fixup() {
    let mut builder = AppBuilder::new("stamp");
    builder.plugin(PluginDecl::new("stamp", Stamp));
    builder.route(Method::GET, "/", hello).unwrap();
    let app = builder.build().unwrap();

    let ok = app.dispatch(Request::new(Method::GET, "/"));
    assert_eq!(ok.get_header("x-stamped"), Some("yes"));

    let missing = app.dispatch(Request::new(Method::GET, "/nowhere"));
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.get_header("x-stamped"), None);
}

#[test]
fn test_fault_is_logged_and_hidden() {
    let tracing = TestTracing::init();
    let mut builder = AppBuilder::new("broken");
    builder.plugin(PluginDecl::new("broken", Broken));
    builder.route(Method::GET, "/", hello).unwrap();
    let app = builder.build().unwrap();

    let res = app.dispatch(Request::new(Method::GET, "/"));
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!res.body_str().unwrap_or_default().contains("template store"));

    let event = tracing
        .find(Level::ERROR, "Unhandled failure")
        .expect("fault should be logged");
    assert_eq!(event.field("error"), Some("template store unavailable"));
}

#[test]
fn test_handler_panic_is_logged_as_500() {
    let tracing = TestTracing::init();
    let mut builder = AppBuilder::new("panicky");
    builder
        .route(Method::GET, "/explode", |_req| -> StageResult<Response> {
            panic!("handler exploded")
        })
        .unwrap();
    let app = builder.build().unwrap();

    let res = app.dispatch(Request::new(Method::GET, "/explode"));
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    let event = tracing
        .find(Level::ERROR, "panicked")
        .expect("panic should be logged");
    assert_eq!(event.field("panic_message"), Some("handler exploded"));
    let location = event.field("location").expect("panic location should be logged");
    assert!(location.contains("dispatcher_tests.rs"), "{location}");
    assert!(event.field("backtrace").is_some());

    // the application keeps serving
    let res = app.dispatch(Request::new(Method::GET, "/nope"));
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[test]
fn test_custom_error_message() {
    let mut builder = AppBuilder::new("custom");
    builder.config(AppConfig {
        error_message: "Try again later.".to_string(),
        ..AppConfig::default()
    });
    builder.plugin(PluginDecl::new("broken", Broken));
    builder.route(Method::GET, "/", hello).unwrap();
    let app = builder.build().unwrap();
    let res = app.dispatch(Request::new(Method::GET, "/"));
    assert_eq!(res.body_str(), Some("Try again later."));
}

#[test]
fn test_head_clears_body_but_keeps_length() {
    let mut builder = AppBuilder::new("head");
    builder.route(Method::HEAD, "/doc", hello).unwrap();
    let app = builder.build().unwrap();

    let res = app.dispatch(Request::new(Method::HEAD, "/doc"));
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.is_empty());
    assert_eq!(res.get_header("content-length"), Some("5"));
    assert_eq!(res.content_type(), Some("text/plain"));
}

#[test]
fn test_default_content_type_applied_when_missing() {
    let mut builder = AppBuilder::new("ctype");
    builder.config(AppConfig {
        default_content_type: "text/html".to_string(),
        ..AppConfig::default()
    });
    builder
        .route(Method::GET, "/raw", |req| {
            let mut res = Response::new(req);
            res.body = b"<p>hi</p>".to_vec();
            Ok(res)
        })
        .unwrap();
    builder.route(Method::GET, "/typed", hello).unwrap();
    let app = builder.build().unwrap();

    let raw = app.dispatch(Request::new(Method::GET, "/raw"));
    assert_eq!(raw.content_type(), Some("text/html"));
    let typed = app.dispatch(Request::new(Method::GET, "/typed"));
    assert_eq!(typed.content_type(), Some("text/plain"));
}

#[test]
fn test_transport_oversized_event_closes_connection() {
    let counter = Arc::new(StageCounter::default());
    let mut builder = AppBuilder::new("upload");
    builder.plugin(PluginDecl::new("counter", CountingPlugin(Arc::clone(&counter))));
    builder.route(Method::POST, "/upload", hello).unwrap();
    let app = builder.build().unwrap();

    let res = app.handle_event(TransportEvent::BodyTooLarge {
        request: Request::new(Method::POST, "/upload"),
        limit: 1024,
    });
    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(res.close_connection);
    assert!(res.body_str().unwrap_or_default().contains("1024"));
    assert_eq!(counter.counts(), (0, 0, 0));
}

#[test]
fn test_dispatch_logs_completion_in_span() {
    let tracing = TestTracing::init();
    let mut builder = AppBuilder::new("log");
    builder.route(Method::GET, "/", hello).unwrap();
    let app = builder.build().unwrap();
    let _res = app.dispatch(Request::new(Method::GET, "/"));
    let done = tracing
        .find(Level::INFO, "Dispatch complete")
        .expect("completion should be logged");
    assert_eq!(done.field("status"), Some("200"));
}

#[test]
fn test_fault_in_pre_fixup_skips_remaining_stages() {
    let tracing = TestTracing::init();
    let counter = Arc::new(StageCounter::default());
    let mut builder = AppBuilder::new("sessions");
    builder
        .plugin(PluginDecl::new("session", Unreadable))
        .plugin(PluginDecl::new("counter", CountingPlugin(Arc::clone(&counter))).after("session"))
        .route(Method::GET, "/", hello)
        .unwrap();
    let app = builder.build().unwrap();

    let res = app.dispatch(Request::new(Method::GET, "/"));
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body_str(), Some("Internal Server Error"));
    assert_eq!(counter.counts(), (0, 0, 0));

    let event = tracing
        .find(Level::ERROR, "Unhandled failure")
        .expect("fault should be logged");
    assert_eq!(event.field("error"), Some("loading session"));
    assert_eq!(event.field("root_cause"), Some("session store missing"));
    assert_eq!(event.field("chain_len"), Some("2"));
    assert!(event
        .field("error_class")
        .is_some_and(|class| class.contains("io")));
}

#[test]
fn test_abort_in_post_fixup_skips_later_post_fixups() {
    let counter = Arc::new(StageCounter::default());
    let mut builder = AppBuilder::new("veto");
    builder
        .plugin(PluginDecl::new("veto", Veto))
        .plugin(PluginDecl::new("counter", CountingPlugin(Arc::clone(&counter))).after("veto"))
        .route(Method::GET, "/", hello)
        .unwrap();
    let app = builder.build().unwrap();
    assert_eq!(app.chain_names(), vec!["veto", "counter", ROUTING]);

    let res = app.dispatch(Request::new(Method::GET, "/"));
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body_str(), Some("Vetoed."));
    assert_eq!(counter.counts(), (1, 1, 0));
}
