//! Path patterns and their compiled prefix matchers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use super::{MatchMode, RouteError};

/// Default constraint for a placeholder: one non-empty path segment.
pub const DEFAULT_PARAM_PATTERN: &str = "[^/]+";

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matches the text exactly
    Literal(String),
    /// `:name` - captured into the parameter bag under `name`
    Param(Arc<str>),
    /// `*` or a bare `:` - matches one segment without capturing it
    Anonymous,
}

/// Ordered list of segments, e.g. `/users/:id` → `[Literal("users"), Param("id")]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse `/users/:id/posts/*`. Empty segments (doubled or trailing slashes) are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::DuplicateParam`] when a placeholder name repeats.
    pub fn parse(path: &str) -> Result<Self, RouteError> {
        Self::from_segments(path.split('/').filter(|s| !s.is_empty()))
    }

    /// Build from individual segments such as `["users", ":id"]`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::DuplicateParam`] when a placeholder name repeats.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for raw in segments {
            let raw = raw.as_ref().trim_matches('/');
            if raw.is_empty() {
                continue;
            }
            let segment = match raw.strip_prefix(':') {
                Some("") => Segment::Anonymous,
                Some(name) => Segment::Param(Arc::from(name)),
                None if raw == "*" => Segment::Anonymous,
                None => Segment::Literal(raw.to_string()),
            };
            parsed.push(segment);
        }
        let pattern = Self { segments: parsed };
        if let Some(name) = pattern.duplicate_param() {
            return Err(RouteError::DuplicateParam {
                pattern: pattern.to_string(),
                name: name.to_string(),
            });
        }
        Ok(pattern)
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The root pattern `/` has no segments.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Names of the placeholders in declaration order.
    pub fn param_names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name),
            _ => None,
        })
    }

    fn duplicate_param(&self) -> Option<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for name in self.param_names() {
            if seen.contains(&name.as_ref()) {
                return Some(name.as_ref());
            }
            seen.push(name);
        }
        None
    }

    /// Compile to the matchers used by [`MatchMode::Prefix`] and [`MatchMode::Exclusive`].
    ///
    /// Placeholders use the constraint registered for their name, or
    /// [`DEFAULT_PARAM_PATTERN`]. The input is matched without its leading `/`. Group 1
    /// spans the consumed prefix. The segment boundary is part of the expression, so an
    /// alternation inside a constraint can still settle on a branch that ends cleanly.
    pub(crate) fn compile(&self, constraints: &HashMap<String, String>) -> Result<Matcher, RouteError> {
        let mut body = String::with_capacity(self.segments.len() * 12);
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                body.push('/');
            }
            match segment {
                Segment::Literal(text) => body.push_str(&regex::escape(text)),
                Segment::Param(name) => {
                    let constraint = constraints
                        .get(name.as_ref())
                        .map_or(DEFAULT_PARAM_PATTERN, String::as_str);
                    body.push_str("(?P<");
                    body.push_str(name);
                    body.push_str(">(?:");
                    body.push_str(constraint);
                    body.push_str("))");
                }
                Segment::Anonymous => body.push_str(DEFAULT_PARAM_PATTERN),
            }
        }
        let prefix = if self.is_root() {
            "^()".to_string()
        } else {
            format!("^({body})(?:/|$)")
        };
        let exclusive = format!("^({body})/?$");
        let build = |expr: &str| {
            Regex::new(expr).map_err(|source| RouteError::Compile {
                pattern: self.to_string(),
                source,
            })
        };
        Ok(Matcher {
            prefix: build(&prefix)?,
            exclusive: build(&exclusive)?,
        })
    }
}

/// Compiled form of a [`PathPattern`].
#[derive(Debug, Clone)]
pub(crate) struct Matcher {
    /// Consumes a leading run of whole segments
    pub(crate) prefix: Regex,
    /// Consumes the whole path, tolerating one trailing `/`
    pub(crate) exclusive: Regex,
}

impl Matcher {
    /// Length of the consumed prefix and the captures, if the path matches.
    pub(crate) fn captures<'p>(
        &self,
        path: &'p str,
        mode: MatchMode,
    ) -> Option<(usize, regex::Captures<'p>)> {
        let re = match mode {
            MatchMode::Prefix => &self.prefix,
            MatchMode::Exclusive => &self.exclusive,
        };
        let captures = re.captures(path)?;
        let end = captures.get(1).map_or(0, |m| m.end());
        Some((end, captures))
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => write!(f, "/{text}")?,
                Segment::Param(name) => write!(f, "/:{name}")?,
                Segment::Anonymous => f.write_str("/*")?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for PathPattern {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for PathPattern {
    type Error = RouteError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&[&str]> for PathPattern {
    type Error = RouteError;

    fn try_from(value: &[&str]) -> Result<Self, Self::Error> {
        Self::from_segments(value)
    }
}

impl<const N: usize> TryFrom<[&str; N]> for PathPattern {
    type Error = RouteError;

    fn try_from(value: [&str; N]) -> Result<Self, Self::Error> {
        Self::from_segments(value)
    }
}
