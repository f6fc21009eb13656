use std::fmt;
use std::sync::Arc;

use crate::dispatcher::{Request, Response};
use crate::order::{self, Orderable, OrderingError};
use crate::status::StageResult;

/// A participant in the request pipeline.
///
/// Every hook has a pass-through default, so a plugin only overrides the stages it cares
/// about. The dispatcher calls each hook for every plugin in chain order.
pub trait Plugin: Send + Sync {
    /// Pre-request fixup. The request is handed over by value and has to be returned,
    /// possibly rewritten, for the next plugin.
    fn fixup_request(&self, req: Request) -> StageResult<Request> {
        Ok(req)
    }

    /// Handling. Return `Some` to produce the response; the first plugin that does ends
    /// the stage.
    fn handle_request(&self, _req: &mut Request) -> StageResult<Option<Response>> {
        Ok(None)
    }

    /// Post-response fixup.
    fn fixup_response(&self, _req: &Request, _res: &mut Response) -> StageResult<()> {
        Ok(())
    }
}

/// A named plugin plus its ordering constraints.
#[derive(Clone)]
pub struct PluginDecl {
    name: Arc<str>,
    before: Vec<String>,
    after: Vec<String>,
    // None only for the routing placeholder, filled in when the application is built
    plugin: Option<Arc<dyn Plugin>>,
}

impl PluginDecl {
    pub fn new(name: &str, plugin: impl Plugin + 'static) -> Self {
        Self::from_arc(name, Arc::new(plugin))
    }

    #[must_use]
    pub fn from_arc(name: &str, plugin: Arc<dyn Plugin>) -> Self {
        Self {
            name: Arc::from(name),
            before: Vec::new(),
            after: Vec::new(),
            plugin: Some(plugin),
        }
    }

    /// Declares the built-in routing unit, so it can carry its own constraints.
    #[must_use]
    pub fn routing() -> Self {
        Self {
            name: Arc::from(super::ROUTING),
            before: Vec::new(),
            after: Vec::new(),
            plugin: None,
        }
    }

    /// This unit must run before `other`.
    #[must_use]
    pub fn before(mut self, other: &str) -> Self {
        self.before.push(other.to_string());
        self
    }

    /// This unit must run after `other`.
    #[must_use]
    pub fn after(mut self, other: &str) -> Self {
        self.after.push(other.to_string());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_placeholder(&self) -> bool {
        self.plugin.is_none()
    }

    pub(crate) fn fill(&mut self, plugin: Arc<dyn Plugin>) {
        if self.plugin.is_none() {
            self.plugin = Some(plugin);
        }
    }
}

impl fmt::Debug for PluginDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDecl")
            .field("name", &self.name)
            .field("before", &self.before)
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}

impl Orderable for PluginDecl {
    fn name(&self) -> &str {
        &self.name
    }

    fn runs_before(&self) -> &[String] {
        &self.before
    }

    fn runs_after(&self) -> &[String] {
        &self.after
    }
}

/// One resolved chain entry.
#[derive(Clone)]
pub struct ChainUnit {
    pub name: Arc<str>,
    pub plugin: Arc<dyn Plugin>,
}

/// Plugins in resolved order. Immutable once built.
#[derive(Clone, Default)]
pub struct PluginChain {
    units: Vec<ChainUnit>,
}

impl PluginChain {
    /// Order the declarations and freeze them into a chain.
    ///
    /// Unfilled placeholders are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`OrderingError`] for duplicate names or cyclic constraints.
    pub fn resolve(decls: Vec<PluginDecl>) -> Result<Self, OrderingError> {
        let units = order::resolve(decls)?
            .into_iter()
            .filter_map(|decl| {
                decl.plugin.map(|plugin| ChainUnit {
                    name: decl.name,
                    plugin,
                })
            })
            .collect();
        Ok(Self { units })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainUnit> {
        self.units.iter()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name.as_ref()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl fmt::Debug for PluginChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
