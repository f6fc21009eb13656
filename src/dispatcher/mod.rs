//! # Dispatcher Module
//!
//! Request and response types plus the engine that carries one request through the
//! plugin chain.
//!
//! ## Request Flow
//!
//! ```text
//! START -> PRE_FIXUP -> HANDLE -> POST_FIXUP -> DONE
//!              |           |            |
//!              +-----------+------------+--> ABORT (status response)
//! ```
//!
//! 1. The transport hands over a [`Request`]
//! 2. Every plugin gets to rewrite it (pre-request fixup)
//! 3. Plugins are offered the request until one answers; the `routing` plugin does this
//!    by running the matched route's handler
//! 4. Every plugin may adjust the [`Response`] (post-response fixup)
//! 5. The engine applies the default content type, HEAD and bodiless-status rules, and
//!    echoes the request id
//!
//! ## Error Handling
//!
//! - [`crate::status::finish_with`] ends the dispatch with a status response
//! - Errors from a stage and panics are caught once, logged, and answered with a 500
//!   whose body never includes the original error
//! - Bodies over the configured limit get 413 and close the connection

mod core;
mod fault;
mod request;
mod response;

pub use core::{Dispatcher, REQUEST_ID_HEADER};
pub use request::{HeaderVec, MatchedRoute, Params, Request, RequestId, MAX_INLINE_HEADERS};
pub use response::Response;
