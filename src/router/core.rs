//! Router core module - route table and longest-prefix matching.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use regex::Regex;
use serde::Deserialize;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use super::pattern::{Matcher, PathPattern};
use crate::dispatcher::{Request, Response};
use crate::status::StageResult;

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage.
///
/// Param names are `Arc<str>` because they come from the route table built at startup;
/// values are per-request data.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Opaque metadata declared alongside a route.
pub type RouteMetadata = serde_json::Map<String, serde_json::Value>;

/// Application action bound to a route.
pub type Handler = Arc<dyn Fn(&mut Request) -> StageResult<Response> + Send + Sync>;

/// Verbs the route table accepts.
pub const SUPPORTED_METHODS: [Method; 8] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
    Method::TRACE,
];

/// Errors raised while declaring routes.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("unsupported verb '{0}'")]
    UnsupportedMethod(Method),
    #[error("placeholder ':{name}' appears more than once in '{pattern}'")]
    DuplicateParam { pattern: String, name: String },
    #[error("invalid constraint for placeholder ':{name}': {source}")]
    InvalidConstraint {
        name: String,
        #[source]
        source: regex::Error,
    },
    #[error("route pattern '{pattern}' does not compile: {source}")]
    Compile {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// How much of the request path a route pattern has to consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The pattern only needs to match a leading portion of the path
    #[default]
    Prefix,
    /// The pattern has to match the whole path (a trailing `/` is tolerated)
    Exclusive,
}

/// A registered (verb, pattern, handler, metadata) entry.
pub struct Route {
    pub method: Method,
    pub pattern: PathPattern,
    pub handler: Handler,
    pub metadata: Arc<RouteMetadata>,
    matcher: Matcher,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.to_string())
            .field("matcher", &self.matcher.prefix.as_str())
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl Route {
    /// Try the route against a path with its leading `/` already removed.
    ///
    /// Returns the length of the consumed prefix and the captures. A match has to end on a
    /// segment boundary, so `users` never matches `usersx`.
    fn match_prefix<'p>(&self, path: &'p str, mode: MatchMode) -> Option<(usize, regex::Captures<'p>)> {
        self.matcher.captures(path, mode)
    }
}

/// Result of successfully matching a request path to a route.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The winning route
    pub route: Arc<Route>,
    /// Named placeholder captures (`:id` → `{"id": "123"}`), percent-decoded
    pub path_params: ParamVec,
    /// Length of the consumed prefix, without the leading `/`
    pub matched_len: usize,
    /// Path material beyond the matched prefix. Empty, or starting with `/`
    pub remainder: String,
}

impl RouteMatch {
    /// Get a path parameter by name
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Route table partitioned by verb.
///
/// Routes keep their registration order inside each verb. Matching tries every candidate
/// for the verb and keeps the one that consumed the longest prefix of the path; on equal
/// length the route registered first wins.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Arc<Route>>>,
    constraints: HashMap<String, String>,
    mode: MatchMode,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mode(mode: MatchMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: MatchMode) {
        self.mode = mode;
    }

    /// Restrict what a placeholder accepts, e.g. `param_constraint("id", r"\d+")`.
    ///
    /// Applies to routes added after the call.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidConstraint`] if `pattern` is not a valid regex.
    pub fn param_constraint(&mut self, name: &str, pattern: &str) -> Result<(), RouteError> {
        Regex::new(pattern).map_err(|source| RouteError::InvalidConstraint {
            name: name.to_string(),
            source,
        })?;
        self.constraints.insert(name.to_string(), pattern.to_string());
        Ok(())
    }

    /// Register a route. Identical verb+pattern pairs are kept side by side; the first one
    /// registered wins every tie.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] for unsupported verbs or patterns that do not compile.
    pub fn add_route<F>(
        &mut self,
        method: Method,
        pattern: PathPattern,
        handler: F,
        metadata: RouteMetadata,
    ) -> Result<Arc<Route>, RouteError>
    where
        F: Fn(&mut Request) -> StageResult<Response> + Send + Sync + 'static,
    {
        if !SUPPORTED_METHODS.contains(&method) {
            return Err(RouteError::UnsupportedMethod(method));
        }
        let matcher = pattern.compile(&self.constraints)?;
        debug!(
            method = %method,
            pattern = %pattern,
            matcher = matcher.prefix.as_str(),
            "Route registered"
        );
        let route = Arc::new(Route {
            method: method.clone(),
            pattern,
            handler: Arc::new(handler),
            metadata: Arc::new(metadata),
            matcher,
        });
        self.routes
            .entry(method)
            .or_default()
            .push(Arc::clone(&route));
        Ok(route)
    }

    /// Match a verb and path to the most specific route.
    ///
    /// # Returns
    ///
    /// * `Some(RouteMatch)` - the longest matching route for this verb
    /// * `None` - no route for this verb matches (results in 404)
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        debug!(method = %method, path = %path, "Route match attempt");

        if path.is_empty() {
            warn!(method = %method, "Empty path never matches");
            return None;
        }
        let Some(candidates) = self.routes.get(method) else {
            warn!(method = %method, path = %path, "No routes registered for verb");
            return None;
        };

        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let mut best: Option<(&Arc<Route>, usize, regex::Captures<'_>)> = None;
        for route in candidates {
            let Some((len, captures)) = route.match_prefix(trimmed, self.mode) else {
                continue;
            };
            let longer = best.as_ref().map_or(true, |(_, best_len, _)| len > *best_len);
            if longer {
                best = Some((route, len, captures));
            }
        }

        let Some((route, matched_len, captures)) = best else {
            warn!(method = %method, path = %path, "No route matched");
            return None;
        };

        let path_params: ParamVec = route
            .pattern
            .param_names()
            .filter_map(|name| {
                let raw = captures.name(name)?.as_str();
                let value = urlencoding::decode(raw).map_or_else(|_| raw.to_string(), Cow::into_owned);
                Some((Arc::clone(name), value))
            })
            .collect();
        let rest = &trimmed[matched_len..];
        let remainder = if rest.is_empty() || rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{rest}")
        };

        info!(
            method = %method,
            path = %path,
            route_pattern = %route.pattern,
            path_params = ?path_params,
            remainder = %remainder,
            "Route matched"
        );

        Some(RouteMatch {
            route: Arc::clone(route),
            path_params,
            matched_len,
            remainder,
        })
    }

    /// Verbs (in [`SUPPORTED_METHODS`] order) with at least one route matching `path`.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        if path.is_empty() {
            return Vec::new();
        }
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        SUPPORTED_METHODS
            .iter()
            .filter(|method| {
                self.routes.get(*method).is_some_and(|routes| {
                    routes
                        .iter()
                        .any(|route| route.match_prefix(trimmed, self.mode).is_some())
                })
            })
            .cloned()
            .collect()
    }

    /// Total number of registered routes across all verbs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `"GET /users/:id"` style summary of every route, verbs in [`SUPPORTED_METHODS`] order.
    #[must_use]
    pub fn routes_summary(&self) -> Vec<String> {
        SUPPORTED_METHODS
            .iter()
            .filter_map(|method| self.routes.get(method))
            .flatten()
            .map(|route| format!("{} {}", route.method, route.pattern))
            .collect()
    }
}
