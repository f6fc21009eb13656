use std::sync::Arc;

use brrtdispatch::app::{AppBuilder, Application, Definition, DefinitionError};
use brrtdispatch::config::AppConfig;
use brrtdispatch::dispatcher::{Request, Response};
use brrtdispatch::plugins::{AuthPlugin, BasicAuthProvider, MetricsPlugin, AUTH};
use brrtdispatch::router::RouteMetadata;
use brrtdispatch::status::StageResult;
use brrtdispatch::transport::{QueueTransport, TransportEvent};
use http::{Method, StatusCode};
use serde_json::json;

mod common;
use common::fixtures::basic_auth;

fn pong(req: &mut Request) -> StageResult<Response> {
    Ok(Response::text(req, StatusCode::OK, "pong"))
}

fn show_user(req: &mut Request) -> StageResult<Response> {
    let id = req.require_param("id")?.to_string();
    let body = json!({ "id": id, "viewer": req.identity });
    Ok(Response::json(req, StatusCode::OK, &body).map_err(anyhow::Error::from)?)
}

/// Small admin application used by several scenarios.
struct AdminSite;

impl Definition for AdminSite {
    fn name(&self) -> &str {
        "admin"
    }

    fn define(&self, app: &mut AppBuilder) -> Result<(), DefinitionError> {
        app.plugin(
            AuthPlugin::new(BasicAuthProvider::new("admin").user("alice", "wonderland")).declare(),
        );
        app.route(Method::GET, "/users/:id", show_user)?;
        Ok(())
    }
}

#[test]
fn test_ping_pong_and_not_found() {
    let mut builder = AppBuilder::new("ping");
    builder.route(Method::GET, "/ping", pong).unwrap();
    let app = builder.build().unwrap();

    let res = app.dispatch(Request::new(Method::GET, "/ping"));
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body_str(), Some("pong"));

    let res = app.dispatch(Request::new(Method::GET, "/nope"));
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[test]
fn test_auth_required_challenge() {
    let app = Application::from_definition(&AdminSite, AppConfig::default()).unwrap();
    assert_eq!(app.name(), "admin");
    assert_eq!(app.chain_names(), vec![AUTH, "routing"]);

    let res = app.dispatch(Request::new(Method::GET, "/users/42"));
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res
        .get_header("www-authenticate")
        .unwrap_or_default()
        .starts_with("Basic"));
    assert_eq!(res.body_str(), Some("Authorization required."));
}

#[test]
fn test_authenticated_user_lookup() {
    let app = Application::from_definition(&AdminSite, AppConfig::default()).unwrap();
    let res = app.dispatch(
        Request::new(Method::GET, "/users/42")
            .with_header("Authorization", basic_auth("alice", "wonderland")),
    );
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.content_type(), Some("application/json"));
    let body: serde_json::Value = serde_json::from_slice(&res.body).unwrap();
    assert_eq!(body, json!({ "id": "42", "viewer": "alice" }));
}

#[test]
fn test_verb_isolation_through_application() {
    let mut builder = AppBuilder::new("users");
    builder
        .route(Method::GET, "/users", |req| {
            Ok(Response::text(req, StatusCode::OK, "list"))
        })
        .unwrap()
        .route(Method::POST, "/users", |req| {
            Ok(Response::text(req, StatusCode::CREATED, "created"))
        })
        .unwrap();
    let app = builder.build().unwrap();

    assert_eq!(app.dispatch(Request::new(Method::GET, "/users")).body_str(), Some("list"));
    let created = app.dispatch(Request::new(Method::POST, "/users"));
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(
        app.dispatch(Request::new(Method::DELETE, "/users")).status,
        StatusCode::NOT_FOUND
    );
}

#[test]
fn test_method_not_allowed_opt_in() {
    let mut builder = AppBuilder::new("strict");
    builder.config(AppConfig {
        method_not_allowed: true,
        ..AppConfig::default()
    });
    builder.route(Method::GET, "/items", pong).unwrap();
    builder.route(Method::PUT, "/items", pong).unwrap();
    let app = builder.build().unwrap();

    let res = app.dispatch(Request::new(Method::DELETE, "/items"));
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.get_header("allow"), Some("GET, PUT"));
}

#[test]
fn test_missing_query_parameter_is_bad_request() {
    let mut builder = AppBuilder::new("search");
    builder
        .route(Method::GET, "/search", |req| {
            let term = req.require_param("q")?.to_string();
            Ok(Response::text(req, StatusCode::OK, term))
        })
        .unwrap();
    let app = builder.build().unwrap();

    let res = app.dispatch(Request::new(Method::GET, "/search?q=rust%20lang"));
    assert_eq!(res.body_str(), Some("rust lang"));

    let res = app.dispatch(Request::new(Method::GET, "/search"));
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body_str().unwrap_or_default().contains("'q'"));
}

#[test]
fn test_route_metadata_and_remainder_visible_to_handler() {
    let mut metadata = RouteMetadata::new();
    metadata.insert("template".into(), json!("files.html"));
    let mut builder = AppBuilder::new("files");
    builder
        .route_with_metadata(
            Method::GET,
            "/files",
            |req| {
                let route = req.route.as_ref().map(|r| {
                    let template = r.metadata.get("template").and_then(|v| v.as_str());
                    format!("{}|{}", template.unwrap_or("-"), r.remainder)
                });
                Ok(Response::text(req, StatusCode::OK, route.unwrap_or_default()))
            },
            metadata,
        )
        .unwrap();
    let app = builder.build().unwrap();
    let res = app.dispatch(Request::new(Method::GET, "/files/a/b.txt"));
    assert_eq!(res.body_str(), Some("files.html|/a/b.txt"));
}

#[test]
fn test_metrics_plugin_counts_through_application() {
    let metrics = Arc::new(MetricsPlugin::new());
    let mut builder = AppBuilder::new("metered");
    builder.plugin(Arc::clone(&metrics).declare());
    builder.route(Method::GET, "/ping", pong).unwrap();
    let app = builder.build().unwrap();

    let _ok = app.dispatch(Request::new(Method::GET, "/ping"));
    let _missing = app.dispatch(Request::new(Method::GET, "/nope"));

    assert_eq!(metrics.request_count(), 2);
    // the 404 aborts before post-response fixup
    assert_eq!(metrics.completed_count(), 1);
    assert_eq!(metrics.status_class_count(2), 1);
}

#[test]
fn test_serve_drains_transport() {
    let mut builder = AppBuilder::new("served");
    builder.route(Method::GET, "/ping", pong).unwrap();
    let app = builder.build().unwrap();

    let mut transport = QueueTransport::new();
    transport.push_request(Request::new(Method::GET, "/ping"));
    transport.push(TransportEvent::BodyTooLarge {
        request: Request::new(Method::POST, "/ping"),
        limit: 16,
    });
    transport.push_request(Request::new(Method::GET, "/missing"));

    let served = app.serve(&mut transport).unwrap();
    assert_eq!(served, 3);
    let statuses: Vec<StatusCode> = transport.sent().iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            StatusCode::OK,
            StatusCode::PAYLOAD_TOO_LARGE,
            StatusCode::NOT_FOUND
        ]
    );
    assert!(transport.sent()[1].close_connection);
    assert_eq!(transport.pending(), 0);
}

#[test]
fn test_application_shared_across_threads() {
    let mut builder = AppBuilder::new("shared");
    builder.route(Method::GET, "/ping", pong).unwrap();
    let app = builder.build().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let app = app.clone();
            std::thread::spawn(move || app.dispatch(Request::new(Method::GET, "/ping")).status)
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), StatusCode::OK);
    }
}

#[test]
fn test_duplicate_plugin_name_fails_build() {
    let mut builder = AppBuilder::new("dup");
    builder
        .plugin(Arc::new(MetricsPlugin::new()).declare())
        .plugin(Arc::new(MetricsPlugin::new()).declare());
    assert!(matches!(builder.build(), Err(DefinitionError::Ordering(_))));
}

/// Rejects everything with a bare Basic challenge.
struct AlwaysChallenge;

impl brrtdispatch::plugins::Plugin for AlwaysChallenge {
    fn fixup_request(&self, _req: Request) -> StageResult<Request> {
        brrtdispatch::status::finish_with(brrtdispatch::status::StatusInfo::unauthorized("Basic"))
    }
}

#[test]
fn test_secret_route_never_runs_when_auth_aborts() {
    use brrtdispatch::plugins::{PluginDecl, ROUTING};
    use std::sync::atomic::{AtomicUsize, Ordering};

    let handler_runs = Arc::new(AtomicUsize::new(0));
    let runs = Arc::clone(&handler_runs);
    let mut builder = AppBuilder::new("secret");
    builder
        .plugin(PluginDecl::new(AUTH, AlwaysChallenge).before(ROUTING))
        .plugin(PluginDecl::routing())
        .route(Method::GET, "/secret", move |req| {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(Response::text(req, StatusCode::OK, "classified"))
        })
        .unwrap();
    let app = builder.build().unwrap();
    assert_eq!(app.chain_names(), vec![AUTH, ROUTING]);

    let res = app.dispatch(Request::new(Method::GET, "/secret"));
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.get_header("WWW-Authenticate"), Some("Basic"));
    assert_eq!(handler_runs.load(Ordering::SeqCst), 0);
}
