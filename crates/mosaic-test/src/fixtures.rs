//! Test fixtures.

use std::sync::{Arc, Mutex};

use mosaic_host::{HostFunction, HostValue, MemoryHost};

use crate::mocks::{MockEngine, MockFetcher};

/// Location used by [`memory_host`].
pub const TEST_LOCATION: &str = "https://host.test/";

/// Shared, ordered record of things that happened during a test.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&self, entry: impl Into<String>) {
        if let Ok(mut guard) = self.0.lock() {
            guard.push(entry.into());
        }
    }

    /// All entries so far.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    /// Position of the first entry equal to `entry`.
    #[must_use]
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    /// Number of entries equal to `entry`.
    #[must_use]
    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }
}

/// A function that appends `label` to `log` when called.
#[must_use]
pub fn recording_fn(log: &EventLog, label: impl Into<String>) -> HostFunction {
    let log = log.clone();
    let label = label.into();
    HostFunction::sync(label.clone(), move |_| {
        log.push(label.clone());
        Ok(HostValue::Undefined)
    })
}

/// A lifecycle object whose `mount`/`unmount` record `mount:{app}` and
/// `unmount:{app}`.
#[must_use]
pub fn lifecycle_object(log: &EventLog, app: &str) -> HostValue {
    HostValue::object([
        ("mount", HostValue::Function(recording_fn(log, format!("mount:{app}")))),
        ("unmount", HostValue::Function(recording_fn(log, format!("unmount:{app}")))),
    ])
}

/// An in-memory host at [`TEST_LOCATION`] wired to the given mocks.
///
/// # Panics
///
/// Never; [`TEST_LOCATION`] is a valid absolute URL.
#[must_use]
#[allow(clippy::expect_used)]
pub fn memory_host(engine: MockEngine, fetcher: MockFetcher) -> Arc<MemoryHost> {
    let host = MemoryHost::new(TEST_LOCATION, Arc::new(engine))
        .expect("test location is absolute")
        .with_network(Arc::new(fetcher));
    Arc::new(host)
}

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
