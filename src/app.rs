//! # Application Module
//!
//! Definition-time assembly of an application: plugins and routes are declared on an
//! [`AppBuilder`], which resolves the plugin chain, builds the router and freezes both
//! into an [`Application`].
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::app::AppBuilder;
//! use brrtdispatch::dispatcher::{Request, Response};
//! use http::{Method, StatusCode};
//!
//! let mut builder = AppBuilder::new("hello");
//! builder
//!     .route(Method::GET, "/ping", |req| Ok(Response::text(req, StatusCode::OK, "pong")))
//!     .unwrap();
//! let app = builder.build().unwrap();
//!
//! let res = app.dispatch(Request::new(Method::GET, "/ping"));
//! assert_eq!(res.body_str(), Some("pong"));
//! assert_eq!(app.dispatch(Request::new(Method::GET, "/nope")).status, StatusCode::NOT_FOUND);
//! ```
//!
//! ## Plugin Order
//!
//! The built-in `routing` unit is appended after every declared plugin unless it is
//! declared explicitly with [`PluginDecl::routing`], which lets it carry its own
//! constraints. Everything else follows the declared `before`/`after` constraints and,
//! where those leave freedom, declaration order.

use std::sync::Arc;

use anyhow::Context;
use http::Method;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::dispatcher::{Dispatcher, Request, Response};
use crate::order::OrderingError;
use crate::plugins::{Plugin, PluginChain, PluginDecl, RoutingPlugin, ROUTING};
use crate::router::{PathPattern, RouteError, RouteMetadata, Router};
use crate::status::StageResult;
use crate::transport::{Transport, TransportEvent};

/// Definition-time failures. Fatal: the application is not built.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error(transparent)]
    Ordering(#[from] OrderingError),
    #[error(transparent)]
    Route(#[from] RouteError),
}

/// A discoverable application definition.
///
/// Implementors declare their plugins and routes on the builder they are given.
pub trait Definition {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Propagates declaration failures.
    fn define(&self, app: &mut AppBuilder) -> Result<(), DefinitionError>;
}

/// Collects plugin and route declarations.
pub struct AppBuilder {
    name: String,
    config: AppConfig,
    plugins: Vec<PluginDecl>,
    router: Router,
}

impl AppBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: AppConfig::default(),
            plugins: Vec::new(),
            router: Router::new(),
        }
    }

    pub fn config(&mut self, config: AppConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn plugin(&mut self, decl: PluginDecl) -> &mut Self {
        self.plugins.push(decl);
        self
    }

    /// Constrain a placeholder for every route declared after this call.
    ///
    /// # Errors
    ///
    /// Fails if `pattern` is not a valid regex.
    pub fn param_constraint(
        &mut self,
        name: &str,
        pattern: &str,
    ) -> Result<&mut Self, DefinitionError> {
        self.router.param_constraint(name, pattern)?;
        Ok(self)
    }

    /// Declare a route without metadata.
    ///
    /// # Errors
    ///
    /// Fails on an invalid pattern or an unsupported verb.
    pub fn route<P, F>(
        &mut self,
        method: Method,
        pattern: P,
        handler: F,
    ) -> Result<&mut Self, DefinitionError>
    where
        P: TryInto<PathPattern, Error = RouteError>,
        F: Fn(&mut Request) -> StageResult<Response> + Send + Sync + 'static,
    {
        self.route_with_metadata(method, pattern, handler, RouteMetadata::new())
    }

    /// Declare a route carrying an opaque metadata map, visible to plugins through
    /// [`Request::route`].
    ///
    /// # Errors
    ///
    /// Fails on an invalid pattern or an unsupported verb.
    pub fn route_with_metadata<P, F>(
        &mut self,
        method: Method,
        pattern: P,
        handler: F,
        metadata: RouteMetadata,
    ) -> Result<&mut Self, DefinitionError>
    where
        P: TryInto<PathPattern, Error = RouteError>,
        F: Fn(&mut Request) -> StageResult<Response> + Send + Sync + 'static,
    {
        self.router
            .add_route(method, pattern.try_into()?, handler, metadata)?;
        Ok(self)
    }

    /// Resolve the plugin chain and freeze the application.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::Ordering`] for cyclic constraints or duplicate names.
    pub fn build(self) -> Result<Application, DefinitionError> {
        let AppBuilder {
            name,
            config,
            mut plugins,
            mut router,
        } = self;

        router.set_mode(config.match_mode);
        let router = Arc::new(router);
        let routing: Arc<dyn Plugin> = Arc::new(
            RoutingPlugin::new(Arc::clone(&router))
                .with_method_not_allowed(config.method_not_allowed),
        );
        match plugins.iter_mut().find(|decl| decl.name() == ROUTING) {
            Some(decl) if decl.is_placeholder() => decl.fill(routing),
            Some(_) => warn!(app = %name, "Custom plugin registered under the routing name"),
            None => plugins.push(PluginDecl::from_arc(ROUTING, routing)),
        }

        let chain = Arc::new(PluginChain::resolve(plugins)?);
        info!(
            app = %name,
            chain = ?chain.names(),
            routes = router.len(),
            match_mode = ?config.match_mode,
            "Application built"
        );

        let config = Arc::new(config);
        Ok(Application {
            name,
            dispatcher: Dispatcher::new(chain, Arc::clone(&config)),
            router,
            config,
        })
    }
}

/// An immutable, ready-to-serve application. Cheap to clone and safe to share across
/// threads.
#[derive(Clone, Debug)]
pub struct Application {
    name: String,
    router: Arc<Router>,
    dispatcher: Dispatcher,
    config: Arc<AppConfig>,
}

impl Application {
    /// Build an application from a [`Definition`].
    ///
    /// # Errors
    ///
    /// Propagates declaration and resolution failures.
    pub fn from_definition<D: Definition + ?Sized>(
        definition: &D,
        config: AppConfig,
    ) -> Result<Self, DefinitionError> {
        let mut builder = AppBuilder::new(definition.name());
        builder.config(config);
        definition.define(&mut builder)?;
        builder.build()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Plugin names in resolved order.
    #[must_use]
    pub fn chain_names(&self) -> Vec<&str> {
        self.dispatcher.chain().names()
    }

    /// Process one request.
    pub fn dispatch(&self, req: Request) -> Response {
        self.dispatcher.dispatch(req)
    }

    /// Process one transport event.
    pub fn handle_event(&self, event: TransportEvent) -> Response {
        match event {
            TransportEvent::Request(req) => self.dispatch(req),
            TransportEvent::BodyTooLarge { request, limit } => {
                warn!(
                    request_id = %request.id,
                    path = %request.path,
                    limit,
                    "Transport reported oversized body"
                );
                self.dispatcher.reject_oversized(&request, limit)
            }
        }
    }

    /// Pull events from `transport` until it is drained, answering each in turn.
    ///
    /// Returns the number of responses sent.
    ///
    /// # Errors
    ///
    /// Stops at the first transport failure.
    pub fn serve<T: Transport + ?Sized>(&self, transport: &mut T) -> anyhow::Result<usize> {
        info!(app = %self.name, "Serving");
        let mut served = 0;
        while let Some(event) = transport.recv().context("failed to receive request")? {
            let response = self.handle_event(event);
            transport
                .send(response)
                .context("failed to send response")?;
            served += 1;
        }
        info!(app = %self.name, served, "Transport drained");
        Ok(served)
    }
}
