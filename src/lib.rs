//! # brrtdispatch
//!
//! Request-dispatch core for a handler process sitting behind a message-queue front end.
//! It receives one request at a time, carries it through an ordered chain of plugins,
//! and produces a response.
//!
//! ## Architecture
//!
//! - **[`order`]** - Resolves plugin `before`/`after` constraints into one total order
//! - **[`router`]** - Verb-scoped longest-prefix route matching with named captures
//! - **[`dispatcher`]** - Request/response types and the three-stage dispatch engine
//! - **[`status`]** - Early exit: [`status::finish_with`] and the [`status::StatusInfo`] payload
//! - **[`plugins`]** - The [`plugins::Plugin`] trait and the built-in routing, auth and
//!   metrics plugins
//! - **[`app`]** - [`app::AppBuilder`] declarations frozen into an [`app::Application`]
//! - **[`transport`]** - The boundary to whatever delivers requests
//! - **[`config`]** - YAML application settings
//! - **[`logging`]** - `tracing` subscriber setup
//!
//! ## Request Lifecycle
//!
//! ```mermaid
//! sequenceDiagram
//!     participant T as Transport
//!     participant A as Application
//!     participant D as Dispatcher
//!     participant P as Plugin chain
//!     participant R as routing plugin
//!     participant H as Route handler
//!
//!     T->>A: TransportEvent::Request
//!     A->>D: dispatch(req)
//!     D->>P: fixup_request (each plugin, in order)
//!     D->>P: handle_request (until one answers)
//!     P->>R: handle_request
//!     R->>R: Router::route(verb, path)
//!     R->>H: handler(&mut req)
//!     H-->>D: Response
//!     D->>P: fixup_response (each plugin, in order)
//!     D-->>A: Response
//!     A-->>T: send(response)
//! ```
//!
//! Any stage may return `finish_with(StatusInfo)` to stop the pipeline with a status
//! response (404, 401, 400, ...). Errors and panics are caught by the dispatcher and
//! answered with a generic 500.
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtdispatch::app::AppBuilder;
//! use brrtdispatch::dispatcher::{Request, Response};
//! use brrtdispatch::plugins::{AuthPlugin, BasicAuthProvider};
//! use http::{Method, StatusCode};
//!
//! let mut builder = AppBuilder::new("admin");
//! builder.plugin(AuthPlugin::new(BasicAuthProvider::new("admin").user("ops", "pw")).declare());
//! builder
//!     .route(Method::GET, "/users/:id", |req| {
//!         let id = req.require_param("id")?.to_string();
//!         Ok(Response::json(req, StatusCode::OK, &serde_json::json!({ "id": id }))
//!             .map_err(anyhow::Error::from)?)
//!     })
//!     .unwrap();
//! let app = builder.build().unwrap();
//!
//! let res = app.dispatch(Request::new(Method::GET, "/users/42"));
//! assert_eq!(res.status, StatusCode::UNAUTHORIZED);
//! ```

pub mod app;
pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod order;
pub mod plugins;
pub mod router;
pub mod status;
pub mod transport;

pub use app::{AppBuilder, Application, Definition, DefinitionError};
pub use dispatcher::{Dispatcher, Request, Response};
pub use plugins::{Plugin, PluginDecl};
pub use status::{finish_with, StageResult, StatusInfo};
