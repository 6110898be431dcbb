//! Navigation tracking and reconciliation.
//!
//! While started, the router owns three hooks into the host:
//! - the history navigation hook, so programmatic `push_state` and
//!   `replace_state` produce a navigation signal;
//! - a real `popstate`/`hashchange` listener on the global object;
//! - a listener interceptor that captures `popstate`/`hashchange`
//!   registrations made by applications, to be replayed once a
//!   reconciliation settles.
//!
//! Signals go through a channel to a single driver task, so
//! reconciliations run one at a time and in arrival order.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use mosaic_host::{
    Host, HostEvent, HostFunction, HostValue, ListenerInterceptor, NavigationEvent, NavigationKind,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::AppRef;
use crate::options::RouteChange;
use crate::orchestrator::LifecycleOrchestrator;
use crate::registry::AppRegistry;
use crate::status::AppStatus;

/// Global events that signal a navigation.
pub const ROUTING_EVENTS: [&str; 2] = ["popstate", "hashchange"];

enum Signal {
    Navigate {
        url: String,
        kind: NavigationKind,
        event: HostValue,
    },
    Flush(oneshot::Sender<()>),
}

impl Signal {
    fn from_history(event: &NavigationEvent) -> Self {
        Self::Navigate {
            url: event.url.clone(),
            kind: event.kind,
            event: HostEvent::new("popstate", event.url.as_str())
                .with_state(event.state.clone())
                .to_value(),
        }
    }
}

/// Routing listeners registered by applications while the router runs.
#[derive(Debug, Default)]
pub struct CapturedListeners {
    listeners: Mutex<Vec<(String, HostFunction)>>,
}

impl CapturedListeners {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, HostFunction)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of captured listeners for `event`.
    #[must_use]
    pub fn len(&self, event: &str) -> usize {
        self.lock().iter().filter(|(name, _)| name == event).count()
    }

    /// Whether nothing is captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn clear(&self) {
        self.lock().clear();
    }

    /// Call the listeners interested in a navigation of `kind`. History
    /// mutations and traversals reach `popstate` listeners; fragment changes
    /// reach `hashchange` listeners; the initial reconciliation reaches none.
    async fn call(&self, kind: NavigationKind, event: HostValue) {
        let target = match kind {
            NavigationKind::PushState | NavigationKind::ReplaceState | NavigationKind::PopState => {
                "popstate"
            },
            NavigationKind::HashChange => "hashchange",
            NavigationKind::Init => return,
        };
        let listeners: Vec<HostFunction> = self
            .lock()
            .iter()
            .filter(|(name, _)| name == target)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            if let Err(e) = listener.call(vec![event.clone()]).await {
                warn!(event = %target, error = %e, "Captured routing listener failed");
            }
        }
    }
}

impl ListenerInterceptor for CapturedListeners {
    fn intercept_add(&self, event: &str, listener: &HostFunction) -> bool {
        if !ROUTING_EVENTS.contains(&event) {
            return false;
        }
        let mut listeners = self.lock();
        if !listeners
            .iter()
            .any(|(name, registered)| name == event && registered == listener)
        {
            listeners.push((event.to_string(), listener.clone()));
        }
        true
    }

    fn intercept_remove(&self, event: &str, listener: &HostFunction) -> bool {
        if !ROUTING_EVENTS.contains(&event) {
            return false;
        }
        self.lock()
            .retain(|(name, registered)| !(name == event && registered == listener));
        true
    }
}

struct RouterCore {
    host: Arc<dyn Host>,
    registry: Arc<AppRegistry>,
    orchestrator: Arc<LifecycleOrchestrator>,
    captured: Arc<CapturedListeners>,
    last_url: Mutex<Option<String>>,
}

impl RouterCore {
    async fn drive(&self, mut rx: mpsc::UnboundedReceiver<Signal>) {
        while let Some(signal) = rx.recv().await {
            match signal {
                Signal::Navigate { url, kind, event } => self.reroute(&url, kind, event).await,
                Signal::Flush(done) => {
                    let _ = done.send(());
                },
            }
        }
        debug!("Router driver stopped");
    }

    async fn reroute(&self, url: &str, kind: NavigationKind, event: HostValue) {
        {
            let mut last = self.last_url.lock().unwrap_or_else(PoisonError::into_inner);
            if last.as_deref() == Some(url) {
                return;
            }
            *last = Some(url.to_string());
        }
        debug!(url = %url, kind = %kind, "Reconciling applications");

        let options = self.orchestrator.options();
        if let Some(on_route_change) = &options.on_route_change {
            on_route_change(&RouteChange::parse(url, kind));
        }

        let (active, inactive): (Vec<_>, Vec<_>) = self
            .registry
            .list_all()
            .into_iter()
            .partition(|app| app.is_active(url));
        if let Some(on_active_apps) = &options.on_active_apps {
            on_active_apps(&active);
        }

        let options = &*options;
        let orchestrator = &*self.orchestrator;
        let leaving = join_all(inactive.iter().map(|app| async move {
            if matches!(app.status, AppStatus::Mounted | AppStatus::LoadingAssets) {
                options.notify(|o| o.on_app_leave.as_ref(), app);
            }
            if let Err(e) = orchestrator.unmount(app.name()).await {
                warn!(app = %app.name(), error = %e, "Unmount during navigation failed");
            }
        }));
        let entering = join_all(active.iter().map(|app| async move {
            if app.status != AppStatus::Mounted {
                options.notify(|o| o.on_app_enter.as_ref(), app);
            }
            if let Err(e) = orchestrator.activate(AppRef::from(app.name()), None).await {
                error!(app = %app.name(), error = %e, "Activation during navigation failed");
            }
        }));
        futures::join!(leaving, entering);

        self.captured.call(kind, event).await;
    }
}

struct Driver {
    tx: mpsc::UnboundedSender<Signal>,
    task: JoinHandle<()>,
    listener: HostFunction,
}

/// Watches navigation and keeps the mounted set in line with the location.
pub struct Router {
    core: Arc<RouterCore>,
    driver: Mutex<Option<Driver>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("running", &self.is_running())
            .field("captured", &self.core.captured)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Create a stopped router.
    #[must_use]
    pub fn new(
        host: Arc<dyn Host>,
        registry: Arc<AppRegistry>,
        orchestrator: Arc<LifecycleOrchestrator>,
    ) -> Self {
        Self {
            core: Arc::new(RouterCore {
                host,
                registry,
                orchestrator,
                captured: Arc::new(CapturedListeners::default()),
                last_url: Mutex::new(None),
            }),
            driver: Mutex::new(None),
        }
    }

    fn driver(&self) -> std::sync::MutexGuard<'_, Option<Driver>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the router is started.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.driver().is_some()
    }

    /// Routing listeners captured from applications.
    #[must_use]
    pub fn captured(&self) -> &CapturedListeners {
        &self.core.captured
    }

    /// Hook into the host and queue the initial reconciliation for the
    /// current location. Returns `false` if already started.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut driver = self.driver();
        if driver.is_some() {
            return false;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let host = &self.core.host;
        let global = host.global();

        let listener_tx = tx.clone();
        let listener = HostFunction::sync("mosaic:urlChange", move |args| {
            let event = args.arg(0);
            let kind = event
                .property("type")
                .as_str()
                .and_then(NavigationKind::from_event_name)
                .unwrap_or(NavigationKind::PopState);
            if let Some(url) = event.property("url").as_str() {
                let _ = listener_tx.send(Signal::Navigate {
                    url: url.to_string(),
                    kind,
                    event: event.clone(),
                });
            }
            Ok(HostValue::Undefined)
        });
        for event in ROUTING_EVENTS {
            global.add_event_listener(event, listener.clone());
        }
        let captured: Arc<dyn ListenerInterceptor> = self.core.captured.clone();
        global.set_listener_interceptor(Some(captured));

        let hook_tx = tx.clone();
        host.history()
            .set_navigation_hook(Some(Arc::new(move |event: &NavigationEvent| {
                let _ = hook_tx.send(Signal::from_history(event));
            })));

        let core = Arc::clone(&self.core);
        let task = tokio::spawn(async move { core.drive(rx).await });

        let _ = tx.send(Signal::Navigate {
            url: host.history().href(),
            kind: NavigationKind::Init,
            event: HostValue::Undefined,
        });
        info!("Router started");
        *driver = Some(Driver { tx, task, listener });
        true
    }

    /// Unhook from the host and stop the driver. Captured listeners are
    /// dropped and the last seen location is forgotten.
    pub fn stop(&self) {
        let Some(driver) = self.driver().take() else {
            return;
        };
        let host = &self.core.host;
        let global = host.global();
        host.history().set_navigation_hook(None);
        global.set_listener_interceptor(None);
        for event in ROUTING_EVENTS {
            global.remove_event_listener(event, &driver.listener);
        }
        self.core.captured.clear();
        drop(driver.tx);
        driver.task.abort();
        *self
            .core
            .last_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        info!("Router stopped");
    }

    /// Wait until every navigation queued so far has been reconciled.
    pub async fn settled(&self) {
        let Some(tx) = self.driver().as_ref().map(|driver| driver.tx.clone()) else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if tx.send(Signal::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}
