//! The global-scope capability.

use crate::value::HostValue;

/// Read/write access to a global execution context.
///
/// Program text is always evaluated against a `Scope`: unqualified identifier
/// lookups become [`get`](Scope::get), assignments become
/// [`set`](Scope::set) and `in`-checks become [`has`](Scope::has). The host
/// global object implements it directly; a sandbox implements it with
/// interception and bookkeeping.
pub trait Scope: Send + Sync {
    /// Read a property. Absent properties read as `Undefined`.
    fn get(&self, key: &str) -> HostValue;

    /// Write a property.
    fn set(&self, key: &str, value: HostValue);

    /// Whether a property exists, including inherited and builtin ones.
    fn has(&self, key: &str) -> bool;

    /// Whether `key` is an own (enumerable, deletable) property.
    fn has_own(&self, key: &str) -> bool {
        self.keys().iter().any(|k| k == key)
    }

    /// Delete a property, returning whether it existed.
    fn delete(&self, key: &str) -> bool;

    /// Own property names, sorted.
    fn keys(&self) -> Vec<String>;
}
