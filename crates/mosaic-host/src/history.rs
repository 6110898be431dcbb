//! Navigable location and session history.
//!
//! Programmatic mutations (`push_state` / `replace_state`) produce no native
//! event; they notify the installed [`NavigationHook`] instead. Traversal
//! (`back` / `forward` / `go`) and fragment changes dispatch `popstate` and
//! `hashchange` on the global object, the way a browser does.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HostError, HostResult};
use crate::global::{HostEvent, HostGlobal};
use crate::value::HostValue;

/// What caused a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationKind {
    /// Initial reconciliation when the runtime starts.
    Init,
    /// `history.pushState`.
    PushState,
    /// `history.replaceState`.
    ReplaceState,
    /// Back/forward traversal.
    PopState,
    /// Fragment change.
    HashChange,
}

impl NavigationKind {
    /// DOM event name for native navigation kinds.
    #[must_use]
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::PushState => "pushState",
            Self::ReplaceState => "replaceState",
            Self::PopState => "popstate",
            Self::HashChange => "hashchange",
        }
    }

    /// Parse a DOM event name.
    #[must_use]
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "init" => Some(Self::Init),
            "pushState" => Some(Self::PushState),
            "replaceState" => Some(Self::ReplaceState),
            "popstate" => Some(Self::PopState),
            "hashchange" => Some(Self::HashChange),
            _ => None,
        }
    }
}

impl fmt::Display for NavigationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// A navigation signal.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationEvent {
    /// Absolute location after the navigation.
    pub url: String,
    /// Cause.
    pub kind: NavigationKind,
    /// History state.
    pub state: HostValue,
}

/// Callback notified of programmatic history mutations.
pub type NavigationHook = Arc<dyn Fn(&NavigationEvent) + Send + Sync>;

struct Entries {
    stack: Vec<(Url, HostValue)>,
    index: usize,
}

impl Entries {
    fn current(&self) -> Option<&(Url, HostValue)> {
        self.stack.get(self.index)
    }

    fn push(&mut self, url: Url, state: HostValue) {
        let keep = self.index.saturating_add(1).min(self.stack.len());
        self.stack.truncate(keep);
        self.stack.push((url, state));
        self.index = self.stack.len().saturating_sub(1);
    }
}

/// Session history of the host page.
pub struct History {
    global: Arc<dyn HostGlobal>,
    entries: Mutex<Entries>,
    hook: RwLock<Option<NavigationHook>>,
}

impl History {
    /// Create a history whose single entry is `initial`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidUrl`] if `initial` is not an absolute URL.
    pub fn new(global: Arc<dyn HostGlobal>, initial: &str) -> HostResult<Self> {
        let url = parse_absolute(initial)?;
        Ok(Self {
            global,
            entries: Mutex::new(Entries {
                stack: vec![(url, HostValue::Null)],
                index: 0,
            }),
            hook: RwLock::new(None),
        })
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_url(&self) -> Option<Url> {
        self.entries().current().map(|(url, _)| url.clone())
    }

    /// Current absolute location.
    #[must_use]
    pub fn href(&self) -> String {
        self.current_url().map(String::from).unwrap_or_default()
    }

    /// Current history state.
    #[must_use]
    pub fn state(&self) -> HostValue {
        self.entries()
            .current()
            .map(|(_, state)| state.clone())
            .unwrap_or_default()
    }

    /// Number of entries in the session history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().stack.len()
    }

    /// Whether the session history is empty. It never is once constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().stack.is_empty()
    }

    /// Install (or clear) the programmatic-navigation hook.
    pub fn set_navigation_hook(&self, hook: Option<NavigationHook>) {
        *self.hook.write().unwrap_or_else(PoisonError::into_inner) = hook;
    }

    fn resolve(&self, target: &str) -> HostResult<Url> {
        let base = self.current_url();
        let joined = match base {
            Some(base) => base.join(target),
            None => Url::parse(target),
        };
        joined.map_err(|e| HostError::InvalidUrl {
            url: target.to_string(),
            message: e.to_string(),
        })
    }

    fn notify(&self, event: &NavigationEvent) {
        let hook = self
            .hook
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook(event);
        }
    }

    /// Push a new entry. `url` may be relative to the current location.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidUrl`] if `url` cannot be resolved.
    pub fn push_state(&self, state: HostValue, url: &str) -> HostResult<()> {
        let url = self.resolve(url)?;
        let href = String::from(url.clone());
        self.entries().push(url, state.clone());
        self.notify(&NavigationEvent {
            url: href,
            kind: NavigationKind::PushState,
            state,
        });
        Ok(())
    }

    /// Replace the current entry.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidUrl`] if `url` cannot be resolved.
    pub fn replace_state(&self, state: HostValue, url: &str) -> HostResult<()> {
        let url = self.resolve(url)?;
        let href = String::from(url.clone());
        {
            let mut entries = self.entries();
            let index = entries.index;
            if let Some(slot) = entries.stack.get_mut(index) {
                *slot = (url, state.clone());
            }
        }
        self.notify(&NavigationEvent {
            url: href,
            kind: NavigationKind::ReplaceState,
            state,
        });
        Ok(())
    }

    /// Move `delta` entries through the session history and dispatch
    /// `popstate`. Out-of-range moves do nothing and return `false`.
    pub async fn go(&self, delta: isize) -> bool {
        let moved = {
            let mut entries = self.entries();
            match entries.index.checked_add_signed(delta) {
                Some(target) if target < entries.stack.len() && delta != 0 => {
                    entries.index = target;
                    entries.current().cloned()
                },
                _ => None,
            }
        };
        let Some((url, state)) = moved else {
            return false;
        };
        self.global
            .dispatch_event(&HostEvent::new("popstate", url.as_str()).with_state(state))
            .await;
        true
    }

    /// Traverse one entry back.
    pub async fn back(&self) -> bool {
        self.go(-1).await
    }

    /// Traverse one entry forward.
    pub async fn forward(&self) -> bool {
        self.go(1).await
    }

    /// Change the fragment, pushing an entry and dispatching `hashchange`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidUrl`] if there is no current location.
    pub async fn set_hash(&self, hash: &str) -> HostResult<()> {
        let mut url = self.current_url().ok_or_else(|| HostError::InvalidUrl {
            url: hash.to_string(),
            message: "no current location".to_string(),
        })?;
        let fragment = hash.trim_start_matches('#');
        url.set_fragment(Some(fragment));
        let href = String::from(url.clone());
        self.entries().push(url, HostValue::Null);
        self.global
            .dispatch_event(&HostEvent::new("hashchange", href))
            .await;
        Ok(())
    }
}

fn parse_absolute(url: &str) -> HostResult<Url> {
    Url::parse(url).map_err(|e| HostError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })
}
