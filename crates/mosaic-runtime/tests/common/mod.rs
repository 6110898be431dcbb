//! Shared harness for runtime integration tests.

use std::sync::Arc;

use mosaic_assets::SourceLocator;
use mosaic_host::{Host, HostFunction, HostValue, MemoryHost, ScriptError};
use mosaic_loader::SELF_REGISTRATION_KEY;
use mosaic_runtime::{AppConfig, Mosaic};
use mosaic_test::{
    EventLog, MockEngine, MockFetcher, init_test_logging, lifecycle_object, memory_host,
    recording_fn,
};

/// How a test application hands over its lifecycle.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Export {
    /// Script-mode self registration with `mount`/`unmount`.
    SelfRegistered,
    /// Self registration that also provides `update`.
    Updatable,
    /// Self registration that also provides `bootstrap`.
    Bootstrapped,
    /// Self registration whose `mount` throws.
    FailingMount,
    /// A `{name}App` global (found by global diff), plus a `lastLoaded`
    /// string global naming the application.
    Global,
    /// Like [`Export::SelfRegistered`], but the bundle is not served yet.
    Unserved,
}

/// A runtime over an in-memory host with mock network and engine.
#[allow(dead_code)]
pub struct Harness {
    /// The runtime under test.
    pub mosaic: Mosaic,
    /// The host the runtime drives.
    pub host: Arc<MemoryHost>,
    /// The network behind both the host and the runtime.
    pub fetcher: MockFetcher,
    /// Ordered record of lifecycle calls.
    pub log: EventLog,
}

#[allow(dead_code)]
impl Harness {
    /// Serve a bundle and a stylesheet for every `(name, export)` pair.
    pub fn new(apps: &[(&str, Export)]) -> Self {
        Self::with_fetcher(apps, MockFetcher::new())
    }

    /// Like [`Harness::new`], over a preconfigured fetcher.
    pub fn with_fetcher(apps: &[(&str, Export)], fetcher: MockFetcher) -> Self {
        init_test_logging();
        let log = EventLog::new();
        let mut engine = MockEngine::new();
        for &(name, export) in apps {
            let marker = bundle_marker(name);
            engine = match export {
                Export::SelfRegistered | Export::Unserved => {
                    engine.assigning(marker, SELF_REGISTRATION_KEY, lifecycle_object(&log, name))
                },
                Export::Updatable => engine.assigning(
                    marker,
                    SELF_REGISTRATION_KEY,
                    updatable_lifecycle(&log, name),
                ),
                Export::Bootstrapped => engine.assigning(
                    marker,
                    SELF_REGISTRATION_KEY,
                    bootstrapped_lifecycle(&log, name),
                ),
                Export::FailingMount => engine.assigning(
                    marker,
                    SELF_REGISTRATION_KEY,
                    failing_lifecycle(&log, name),
                ),
                Export::Global => {
                    let lifecycle = lifecycle_object(&log, name);
                    let export_key = format!("{name}App");
                    let name = name.to_string();
                    engine.on_script(marker, move |scope| {
                        scope.set(&export_key, lifecycle.clone());
                        scope.set("lastLoaded", HostValue::from(name.as_str()));
                        Ok(())
                    })
                },
            };
            if export != Export::Unserved {
                fetcher.respond(js_url(name), bundle_body(name));
            }
            fetcher.respond(css_url(name), "body{}");
        }

        let host = memory_host(engine, fetcher.clone());
        let mosaic = Mosaic::new(host.clone());
        Self {
            mosaic,
            host,
            fetcher,
            log,
        }
    }

    /// A config loading `name`'s bundle and stylesheet.
    pub fn config(name: &str) -> AppConfig {
        AppConfig::new(name, SourceLocator::urls([js_url(name), css_url(name)]))
    }

    /// Push `path` onto the history and wait for the reconciliation.
    pub async fn navigate(&self, path: &str) {
        self.host
            .history()
            .push_state(HostValue::Null, path)
            .expect("navigation target resolves");
        self.mosaic.settled().await;
    }

    /// Number of dynamic elements with `tag` in the document.
    pub fn dynamic_count(&self, tag: &str) -> usize {
        self.host
            .document()
            .elements(tag)
            .iter()
            .filter(|(_, el)| el.is_dynamic())
            .count()
    }
}

/// URL of `name`'s bundle.
pub fn js_url(name: &str) -> String {
    format!("https://x/{name}.js")
}

/// URL of `name`'s stylesheet.
pub fn css_url(name: &str) -> String {
    format!("https://x/{name}.css")
}

/// Body served for `name`'s bundle.
pub fn bundle_body(name: &str) -> String {
    format!("/* {} */", bundle_marker(name))
}

fn bundle_marker(name: &str) -> String {
    format!("<{name}-bundle>")
}

fn updatable_lifecycle(log: &EventLog, app: &str) -> HostValue {
    HostValue::object([
        ("mount", HostValue::Function(recording_fn(log, format!("mount:{app}")))),
        ("unmount", HostValue::Function(recording_fn(log, format!("unmount:{app}")))),
        ("update", HostValue::Function(recording_fn(log, format!("update:{app}")))),
    ])
}

fn bootstrapped_lifecycle(log: &EventLog, app: &str) -> HostValue {
    HostValue::object([
        ("bootstrap", HostValue::Function(recording_fn(log, format!("bootstrap:{app}")))),
        ("mount", HostValue::Function(recording_fn(log, format!("mount:{app}")))),
        ("unmount", HostValue::Function(recording_fn(log, format!("unmount:{app}")))),
    ])
}

fn failing_lifecycle(log: &EventLog, app: &str) -> HostValue {
    let mount = HostFunction::sync("mount", |_| {
        Err(ScriptError::Evaluation("mount exploded".to_string()))
    });
    HostValue::object([
        ("mount", HostValue::Function(mount)),
        ("unmount", HostValue::Function(recording_fn(log, format!("unmount:{app}")))),
    ])
}
