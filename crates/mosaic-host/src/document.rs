//! The host document: head elements and named mount containers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{HostError, HostResult};

/// Attribute used to tag runtime-managed elements.
pub const ASSET_MARKER_ATTR: &str = "mosaic";
/// Marker value for elements inserted on behalf of an application.
pub const DYNAMIC_MARKER: &str = "dynamic";
/// Marker value for elements owned by the host page.
pub const STATIC_MARKER: &str = "static";
/// Attribute naming the application that owns a dynamic element.
pub const OWNER_ATTR: &str = "cache";

/// Identifier of an element inserted into the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

/// A head element (`script`, `style`, `link`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Lower-case tag name.
    pub tag: String,
    /// Attributes.
    pub attributes: BTreeMap<String, String>,
    /// Text content (inline script or style body).
    pub text: String,
}

impl Element {
    /// Create an element with no attributes.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Set an attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Read an attribute.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// `src` of a script.
    #[must_use]
    pub fn src(&self) -> Option<&str> {
        self.attr("src").filter(|s| !s.is_empty())
    }

    /// `href` of a link.
    #[must_use]
    pub fn href(&self) -> Option<&str> {
        self.attr("href").filter(|s| !s.is_empty())
    }

    /// The URL the element loads, if external.
    #[must_use]
    pub fn resource_url(&self) -> Option<&str> {
        match self.tag.as_str() {
            "script" => self.src(),
            "link" => self.href(),
            _ => None,
        }
    }

    /// Whether this is a stylesheet `<link>`.
    #[must_use]
    pub fn is_stylesheet_link(&self) -> bool {
        self.tag == "link"
            && self
                .attr("rel")
                .is_none_or(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")))
    }

    /// Whether this is a module script.
    #[must_use]
    pub fn is_module(&self) -> bool {
        self.tag == "script" && self.attr("type") == Some("module")
    }

    /// Whether the element is tagged as host-owned.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.attr(ASSET_MARKER_ATTR) == Some(STATIC_MARKER)
    }

    /// Whether the element is tagged as inserted by the runtime.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.attr(ASSET_MARKER_ATTR) == Some(DYNAMIC_MARKER)
    }

    /// Application that owns the element, if recorded.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.attr(OWNER_ATTR).filter(|s| !s.is_empty())
    }
}

#[derive(Default)]
struct DocumentState {
    head: Vec<(ElementId, Element)>,
    containers: BTreeMap<String, String>,
    title: String,
}

/// The host document.
#[derive(Default)]
pub struct Document {
    next_id: AtomicU64,
    state: Mutex<DocumentState>,
}

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an element to `<head>`. Elements never fail to attach; load
    /// events are the host's concern.
    pub fn insert_head(&self, element: Element) -> ElementId {
        let id = ElementId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.state().head.push((id, element));
        id
    }

    /// Remove an element, returning it if it was present.
    pub fn remove(&self, id: ElementId) -> Option<Element> {
        let mut state = self.state();
        let pos = state.head.iter().position(|(eid, _)| *eid == id)?;
        Some(state.head.remove(pos).1)
    }

    /// Every head element in document order.
    #[must_use]
    pub fn head_elements(&self) -> Vec<(ElementId, Element)> {
        self.state().head.clone()
    }

    /// Head elements with the given tag, in document order.
    #[must_use]
    pub fn elements(&self, tag: &str) -> Vec<(ElementId, Element)> {
        self.state()
            .head
            .iter()
            .filter(|(_, el)| el.tag == tag)
            .cloned()
            .collect()
    }

    /// Look up one element.
    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<Element> {
        self.state()
            .head
            .iter()
            .find(|(eid, _)| *eid == id)
            .map(|(_, el)| el.clone())
    }

    /// Whether an element of `tag` already references `url`.
    #[must_use]
    pub fn references(&self, tag: &str, url: &str) -> bool {
        self.state()
            .head
            .iter()
            .any(|(_, el)| el.tag == tag && el.resource_url() == Some(url))
    }

    /// Set an attribute on an inserted element. Returns `false` if it is gone.
    pub fn set_attribute(&self, id: ElementId, key: &str, value: &str) -> bool {
        let mut state = self.state();
        match state.head.iter_mut().find(|(eid, _)| *eid == id) {
            Some((_, el)) => {
                el.attributes.insert(key.to_string(), value.to_string());
                true
            },
            None => false,
        }
    }

    /// Declare a mount container.
    pub fn add_container(&self, name: impl Into<String>) {
        self.state().containers.entry(name.into()).or_default();
    }

    /// Whether a container exists.
    #[must_use]
    pub fn has_container(&self, name: &str) -> bool {
        self.state().containers.contains_key(name)
    }

    /// Append markup to a container.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ContainerNotFound`] if the container was never declared.
    pub fn append_to_container(&self, name: &str, html: &str) -> HostResult<()> {
        let mut state = self.state();
        let content = state
            .containers
            .get_mut(name)
            .ok_or_else(|| HostError::ContainerNotFound(name.to_string()))?;
        content.push_str(html);
        Ok(())
    }

    /// Replace a container's markup.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ContainerNotFound`] if the container was never declared.
    pub fn set_container_html(&self, name: &str, html: &str) -> HostResult<()> {
        let mut state = self.state();
        let content = state
            .containers
            .get_mut(name)
            .ok_or_else(|| HostError::ContainerNotFound(name.to_string()))?;
        html.clone_into(content);
        Ok(())
    }

    /// Current markup of a container.
    #[must_use]
    pub fn container_html(&self, name: &str) -> Option<String> {
        self.state().containers.get(name).cloned()
    }

    /// Document title.
    #[must_use]
    pub fn title(&self) -> String {
        self.state().title.clone()
    }

    /// Set the document title.
    pub fn set_title(&self, title: impl Into<String>) {
        self.state().title = title.into();
    }
}
