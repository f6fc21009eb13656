use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine as _;
use tracing::{debug, warn};

use super::{Plugin, PluginDecl, ROUTING};
use crate::dispatcher::Request;
use crate::status::{finish_with, StageResult, StatusInfo};

/// Chain name of the authentication unit.
pub const AUTH: &str = "auth";

/// Pluggable credential check.
///
/// The crypto behind a strategy lives in the provider; the plugin only turns its verdict
/// into either an identity on the request or a 401 challenge.
pub trait AuthProvider: Send + Sync {
    /// `Ok(Some(identity))` accepts the request, `Ok(None)` rejects it. An `Err` is an
    /// infrastructure fault and becomes a 500.
    fn authenticate(&self, req: &Request) -> anyhow::Result<Option<String>>;

    /// Value of the `WWW-Authenticate` header sent with a rejection.
    fn challenge(&self) -> String;
}

/// HTTP Basic credentials checked against a static user table.
#[derive(Debug, Clone)]
pub struct BasicAuthProvider {
    realm: String,
    users: HashMap<String, String>,
}

impl BasicAuthProvider {
    #[must_use]
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            users: HashMap::new(),
        }
    }

    #[must_use]
    pub fn user(mut self, name: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(name.into(), password.into());
        self
    }

    /// Split an `Authorization: Basic ...` header into user and password.
    fn credentials(header: &str) -> Option<(String, String)> {
        let (scheme, encoded) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;
        Some((user.to_string(), password.to_string()))
    }
}

impl AuthProvider for BasicAuthProvider {
    fn authenticate(&self, req: &Request) -> anyhow::Result<Option<String>> {
        let Some((user, password)) = req.get_header("authorization").and_then(Self::credentials)
        else {
            return Ok(None);
        };
        match self.users.get(&user) {
            Some(expected) if *expected == password => Ok(Some(user)),
            _ => Ok(None),
        }
    }

    fn challenge(&self) -> String {
        format!("Basic realm=\"{}\"", self.realm)
    }
}

/// Pre-request plugin that authenticates every request before handling starts.
pub struct AuthPlugin {
    provider: Arc<dyn AuthProvider>,
}

impl AuthPlugin {
    pub fn new(provider: impl AuthProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Declare as the `auth` unit, ordered before routing.
    #[must_use]
    pub fn declare(self) -> PluginDecl {
        PluginDecl::new(AUTH, self).before(ROUTING)
    }
}

impl Plugin for AuthPlugin {
    fn fixup_request(&self, mut req: Request) -> StageResult<Request> {
        match self.provider.authenticate(&req)? {
            Some(identity) => {
                debug!(request_id = %req.id, identity = %identity, "Request authenticated");
                req.identity = Some(identity);
                Ok(req)
            }
            None => {
                warn!(request_id = %req.id, path = %req.path, "Authentication failed");
                finish_with(StatusInfo::unauthorized(self.provider.challenge()))
            }
        }
    }
}
