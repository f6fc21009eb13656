use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use http::Method;
use smallvec::SmallVec;

use crate::router::{ParamVec, RouteMetadata};
use crate::status::{finish_with, StageResult, StatusInfo};

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage shared by requests, responses and status payloads.
///
/// Header names use `Arc<str>` so repeated names clone in O(1). Lookups are
/// case-insensitive.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Strongly typed request identifier backed by ULID.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(pub ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Parse a correlation id supplied by the front end; generate one if absent or invalid.
    #[must_use]
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| s.parse::<RequestId>().ok())
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(RequestId)
    }
}

/// Mutable parameter bag accumulated while a request moves through the pipeline.
///
/// Inserting an existing key replaces its value, so a later merge always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(ParamVec);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, name: impl Into<Arc<str>>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Merge captured values into the bag. An empty set leaves the bag untouched.
    pub fn merge(&mut self, captured: ParamVec) {
        for (name, value) in captured {
            self.insert(name, value);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }
}

/// What the router recorded about the route that matched this request.
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    /// Pattern of the winning route, e.g. `/users/:id`
    pub pattern: String,
    /// Metadata declared with the route
    pub metadata: Arc<RouteMetadata>,
    /// Path material beyond the matched prefix, starting with `/` (empty for an exact match)
    pub remainder: String,
}

/// One incoming call, as handed over by the transport.
///
/// Plugins receive the request by value during pre-request fixup and must hand it back;
/// the route handler and the post-response fixup see it by reference.
#[derive(Debug, Clone)]
pub struct Request {
    /// Correlation id (ULID)
    pub id: RequestId,
    /// Verb
    pub method: Method,
    /// Path without the query string
    pub path: String,
    /// Decoded query string parameters, in order of appearance
    pub query: ParamVec,
    /// Headers as received
    pub headers: HeaderVec,
    /// Raw body
    pub body: Vec<u8>,
    /// Parameters accumulated by plugins and the router
    pub params: Params,
    /// Route selected during handling, if any
    pub route: Option<MatchedRoute>,
    /// Identity attached by an authentication plugin
    pub identity: Option<String>,
    /// When the transport handed the request over
    pub received_at: Instant,
}

impl Request {
    /// Build a request from a verb and a target such as `/users/42?expand=true`.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, ParamVec::new()),
        };
        Self {
            id: RequestId::new(),
            method,
            path: path.to_string(),
            query,
            headers: HeaderVec::new(),
            body: Vec::new(),
            params: Params::new(),
            route: None,
            identity: None,
            received_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Get a header by name (case-insensitive per RFC 9110)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Get a query parameter by name
    ///
    /// Uses "last write wins" semantics for repeated names (`?limit=10&limit=20`).
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Look a parameter up in the bag first, then in the query string.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).or_else(|| self.get_query_param(name))
    }

    /// Like [`Request::param`], but aborts with 400 when the parameter is missing.
    pub fn require_param(&self, name: &str) -> StageResult<&str> {
        match self.param(name) {
            Some(value) => Ok(value),
            None => finish_with(StatusInfo::bad_request(format!(
                "Missing required parameter '{name}'."
            ))),
        }
    }

    #[must_use]
    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }
}

fn parse_query(query: &str) -> ParamVec {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect()
}
