//! The script evaluation seam.
//!
//! This is the only place in the runtime where program text becomes behaviour.
//! Embedders plug in an interpreter (or a table of precompiled behaviours, as
//! the test engine does); the runtime never evaluates anything itself.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::ScriptError;
use crate::value::{HostValue, ScopeRef};

/// Exports of an imported module.
pub type ModuleNamespace = BTreeMap<String, HostValue>;

/// Evaluates program text against a [`Scope`](crate::Scope).
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    /// Run `source` with `scope` as the global object: unqualified reads,
    /// writes and existence checks go through the scope.
    ///
    /// # Errors
    ///
    /// Returns whatever the program throws.
    fn evaluate(&self, source: &str, scope: ScopeRef) -> Result<(), ScriptError>;

    /// Whether [`import_module`](ScriptEngine::import_module) is available.
    fn supports_dynamic_import(&self) -> bool {
        false
    }

    /// Dynamically import the module at `url`.
    ///
    /// # Errors
    ///
    /// [`ScriptError::UnsupportedImport`] unless the engine overrides this.
    async fn import_module(&self, url: &str) -> Result<ModuleNamespace, ScriptError> {
        let _ = url;
        Err(ScriptError::UnsupportedImport)
    }
}
