//! Lifecycle hooks and where they come from.

use mosaic_host::{HostFunction, HostValue, ModuleNamespace, Scope};

/// Global holding the name of the global an application exported its
/// lifecycle object under.
pub const LIBRARY_NAME_KEY: &str = "__MOSAIC_LIBRARY__";

/// Global an application assigns its lifecycle object to when it registers
/// itself.
pub const SELF_REGISTRATION_KEY: &str = "__MOSAIC_LIFECYCLE__";

/// The lifecycle functions an application exports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecycleHooks {
    /// Render into the mount target.
    pub mount: Option<HostFunction>,
    /// Tear down.
    pub unmount: Option<HostFunction>,
    /// Receive new props while mounted.
    pub update: Option<HostFunction>,
    /// One-time initialisation.
    pub bootstrap: Option<HostFunction>,
}

fn function(value: HostValue) -> Option<HostFunction> {
    match value {
        HostValue::Function(f) => Some(f),
        _ => None,
    }
}

impl LifecycleHooks {
    /// Read hooks from an object (or function) value.
    #[must_use]
    pub fn from_value(value: &HostValue) -> Self {
        Self {
            mount: function(value.property("mount")),
            unmount: function(value.property("unmount")),
            update: function(value.property("update")),
            bootstrap: function(value.property("bootstrap")),
        }
    }

    /// Read hooks from a module's exports.
    #[must_use]
    pub fn from_namespace(namespace: &ModuleNamespace) -> Self {
        let export = |key: &str| namespace.get(key).cloned().and_then(function);
        Self {
            mount: export("mount"),
            unmount: export("unmount"),
            update: export("update"),
            bootstrap: export("bootstrap"),
        }
    }

    /// Whether no hook was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mount.is_none()
            && self.unmount.is_none()
            && self.update.is_none()
            && self.bootstrap.is_none()
    }

    /// Whether both `mount` and `unmount` exist.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.mount.is_some() && self.unmount.is_some()
    }
}

/// How an application's hooks were handed over.
#[derive(Debug, Clone, PartialEq)]
pub enum HookSource {
    /// A lifecycle object stored under a global name.
    ByNamedExport(String),
    /// A lifecycle object passed to the self-registration global.
    BySelfRegistration(HostValue),
    /// The exports of an imported module.
    ByModuleNamespace(ModuleNamespace),
}

impl HookSource {
    /// Look for a library export or a self-registration in `scope`.
    ///
    /// Either one only counts when it provides both `mount` and `unmount`.
    #[must_use]
    pub fn discover(scope: &dyn Scope) -> Option<Self> {
        let library = scope
            .get(LIBRARY_NAME_KEY)
            .as_str()
            .filter(|name| !name.is_empty())
            .map(|name| Self::ByNamedExport(name.to_string()));
        if let Some(source) = library
            && source.resolve(scope).is_complete()
        {
            return Some(source);
        }

        let registered = Self::BySelfRegistration(scope.get(SELF_REGISTRATION_KEY));
        registered.resolve(scope).is_complete().then_some(registered)
    }

    /// The canonical hooks this source provides.
    #[must_use]
    pub fn resolve(&self, scope: &dyn Scope) -> LifecycleHooks {
        match self {
            Self::ByNamedExport(name) => LifecycleHooks::from_value(&scope.get(name)),
            Self::BySelfRegistration(value) => LifecycleHooks::from_value(value),
            Self::ByModuleNamespace(namespace) => LifecycleHooks::from_namespace(namespace),
        }
    }

    /// Remove the globals this source was read from, so the next application
    /// cannot pick them up.
    pub fn release(&self, scope: &dyn Scope) {
        match self {
            Self::ByNamedExport(name) => {
                scope.delete(name);
                scope.delete(LIBRARY_NAME_KEY);
            },
            Self::BySelfRegistration(_) => {
                scope.delete(SELF_REGISTRATION_KEY);
            },
            Self::ByModuleNamespace(_) => {},
        }
    }

    /// Resolve then release.
    #[must_use]
    pub fn take(&self, scope: &dyn Scope) -> LifecycleHooks {
        let hooks = self.resolve(scope);
        self.release(scope);
        hooks
    }
}

#[cfg(test)]
mod tests {
    use mosaic_host::MemoryGlobal;
    use mosaic_test::{EventLog, lifecycle_object, recording_fn};

    use super::*;

    #[test]
    fn library_export_wins_over_registration() {
        let log = EventLog::new();
        let global = MemoryGlobal::new();
        global.set("shopLib", lifecycle_object(&log, "lib"));
        global.set(LIBRARY_NAME_KEY, HostValue::from("shopLib"));
        global.set(SELF_REGISTRATION_KEY, lifecycle_object(&log, "registered"));

        let source = HookSource::discover(&*global).unwrap();
        assert_eq!(source, HookSource::ByNamedExport("shopLib".into()));

        let hooks = source.take(&*global);
        assert!(hooks.is_complete());
        assert!(global.get("shopLib").is_undefined());
        assert!(global.get(LIBRARY_NAME_KEY).is_undefined());
    }

    #[test]
    fn incomplete_exports_are_ignored() {
        let log = EventLog::new();
        let global = MemoryGlobal::new();
        global.set(
            SELF_REGISTRATION_KEY,
            HostValue::object([("mount", HostValue::Function(recording_fn(&log, "mount")))]),
        );
        assert!(HookSource::discover(&*global).is_none());
    }

    #[test]
    fn namespace_hooks() {
        let log = EventLog::new();
        let mut namespace = ModuleNamespace::new();
        namespace.insert("mount".into(), HostValue::Function(recording_fn(&log, "m")));
        namespace.insert("update".into(), HostValue::Function(recording_fn(&log, "u")));
        let hooks = HookSource::ByModuleNamespace(namespace).resolve(&*MemoryGlobal::new());
        assert!(hooks.mount.is_some());
        assert!(hooks.update.is_some());
        assert!(!hooks.is_complete());
        assert!(!hooks.is_empty());
        assert!(LifecycleHooks::default().is_empty());
    }
}
