use std::sync::Arc;

use tracing::debug;

use super::Plugin;
use crate::dispatcher::{MatchedRoute, Request, Response};
use crate::router::Router;
use crate::status::{finish_with, StageResult, StatusInfo};

/// Chain name of the built-in routing unit.
pub const ROUTING: &str = "routing";

/// Handling-stage plugin that looks the request up in the [`Router`] and runs the
/// winning route's handler.
///
/// On a match the path captures are merged into the request's parameter bag and the
/// route is recorded in [`Request::route`]. Without a match the dispatch finishes with
/// 404, or with 405 and an `Allow` header when that is enabled and another verb would
/// have matched.
pub struct RoutingPlugin {
    router: Arc<Router>,
    method_not_allowed: bool,
}

impl RoutingPlugin {
    #[must_use]
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            method_not_allowed: false,
        }
    }

    #[must_use]
    pub fn with_method_not_allowed(mut self, enabled: bool) -> Self {
        self.method_not_allowed = enabled;
        self
    }
}

impl Plugin for RoutingPlugin {
    fn handle_request(&self, req: &mut Request) -> StageResult<Option<Response>> {
        let Some(found) = self.router.route(&req.method, &req.path) else {
            if self.method_not_allowed {
                let allowed = self.router.allowed_methods(&req.path);
                if !allowed.is_empty() {
                    return finish_with(StatusInfo::method_not_allowed(&allowed));
                }
            }
            return finish_with(StatusInfo::not_found());
        };

        req.params.merge(found.path_params);
        req.route = Some(MatchedRoute {
            pattern: found.route.pattern.to_string(),
            metadata: Arc::clone(&found.route.metadata),
            remainder: found.remainder,
        });
        debug!(
            request_id = %req.id,
            route_pattern = %found.route.pattern,
            "Invoking route handler"
        );
        (found.route.handler)(req).map(Some)
    }
}
