//! # Plugins Module
//!
//! Units of the request pipeline and the built-in plugins.
//!
//! A [`Plugin`] contributes up to three hooks: pre-request fixup, handling and
//! post-response fixup. Plugins are declared with a name and `before`/`after`
//! constraints ([`PluginDecl`]) and resolved once, at application build time, into an
//! immutable [`PluginChain`]. The dispatcher walks the chain in that order for every
//! stage.
//!
//! ## Built-ins
//!
//! - [`RoutingPlugin`] (`routing`): consults the router and runs the route handler
//! - [`AuthPlugin`] (`auth`): authenticates through an [`AuthProvider`], 401 on failure
//! - [`MetricsPlugin`] (`metrics`): request counters and latency

mod auth;
mod core;
mod metrics;
mod routing;

pub use auth::{AuthPlugin, AuthProvider, BasicAuthProvider, AUTH};
pub use core::{ChainUnit, Plugin, PluginChain, PluginDecl};
pub use metrics::{MetricsPlugin, METRICS};
pub use routing::{RoutingPlugin, ROUTING};
