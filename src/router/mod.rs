//! # Router Module
//!
//! Path matching and route resolution for the dispatch core.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Holding the route table, partitioned by verb
//! - Compiling each path pattern into a start-anchored (prefix) regex
//! - Picking the most specific route for an incoming verb and path
//! - Extracting named path parameters from the winning match
//!
//! ## Patterns
//!
//! A pattern is an ordered list of segments: literals, named placeholders (`:id`) and
//! anonymous placeholders (`*`). `/users/:id` compiles to `^users/(?P<id>(?:[^/]+))`.
//! Placeholders accept a single segment unless a constraint is registered with
//! [`Router::param_constraint`].
//!
//! ## Matching
//!
//! 1. Only routes declared for the request's verb are candidates.
//! 2. Each candidate is matched against the path (leading `/` removed). The match need
//!    not reach the end of the path, but it has to stop at a segment boundary.
//! 3. The match that consumed the most text wins. An equal-length match never displaces
//!    the current best, so the route registered first wins ties.
//! 4. Whatever follows the matched prefix is reported as the remainder.
//!
//! [`MatchMode::Exclusive`] switches to whole-path matching.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::router::{PathPattern, RouteMetadata, Router};
//! use brrtdispatch::dispatcher::Response;
//! use http::{Method, StatusCode};
//!
//! let mut router = Router::new();
//! router
//!     .add_route(
//!         Method::GET,
//!         PathPattern::parse("/users/:id").unwrap(),
//!         |req| Ok(Response::text(req, StatusCode::OK, "user")),
//!         RouteMetadata::new(),
//!     )
//!     .unwrap();
//!
//! let m = router.route(&Method::GET, "/users/42/avatar").unwrap();
//! assert_eq!(m.get_path_param("id"), Some("42"));
//! assert_eq!(m.remainder, "/avatar");
//! ```

mod core;
mod pattern;

pub use core::{
    Handler, MatchMode, ParamVec, Route, RouteError, RouteMatch, RouteMetadata, Router,
    MAX_INLINE_PARAMS, SUPPORTED_METHODS,
};
pub use pattern::{PathPattern, Segment, DEFAULT_PARAM_PATTERN};
