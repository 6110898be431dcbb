//! Dynamic values stored on the host global object.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::error::ScriptError;
use crate::scope::Scope;

/// A shared handle to a [`Scope`], compared by identity.
#[derive(Clone)]
pub struct ScopeRef(Arc<dyn Scope>);

impl ScopeRef {
    /// Wrap a scope.
    #[must_use]
    pub fn new(scope: Arc<dyn Scope>) -> Self {
        Self(scope)
    }

    /// Whether both handles point at the same scope object.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl std::ops::Deref for ScopeRef {
    type Target = dyn Scope;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for ScopeRef {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeRef({:p})", Arc::as_ptr(&self.0).cast::<()>())
    }
}

/// Arguments passed to a [`HostFunction`].
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    /// The implicit receiver (`this`), if the function is bound.
    pub this: Option<ScopeRef>,
    /// Positional arguments.
    pub args: Vec<HostValue>,
}

impl CallArgs {
    /// Positional argument `index`, or `Undefined`.
    #[must_use]
    pub fn arg(&self, index: usize) -> HostValue {
        self.args.get(index).cloned().unwrap_or_default()
    }
}

type NativeBody =
    dyn Fn(CallArgs) -> BoxFuture<'static, Result<HostValue, ScriptError>> + Send + Sync;

/// A callable value.
///
/// Functions may suspend, so calls are asynchronous. A function can be rebound
/// to a receiver with [`HostFunction::bind_to`]; the enumerable properties
/// attached to it travel with the rebound copy.
#[derive(Clone)]
pub struct HostFunction {
    name: Arc<str>,
    body: Arc<NativeBody>,
    receiver: Option<ScopeRef>,
    is_constructor: bool,
    properties: BTreeMap<String, HostValue>,
}

impl HostFunction {
    /// Create an asynchronous function.
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HostValue, ScriptError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(move |args| body(args).boxed()),
            receiver: None,
            is_constructor: false,
            properties: BTreeMap::new(),
        }
    }

    /// Create a function whose body never suspends.
    pub fn sync<F>(name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(CallArgs) -> Result<HostValue, ScriptError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(move |args| futures::future::ready(body(args)).boxed()),
            receiver: None,
            is_constructor: false,
            properties: BTreeMap::new(),
        }
    }

    /// Mark this function as a constructor (`Object`, `Array`, classes).
    #[must_use]
    pub fn constructor(mut self) -> Self {
        self.is_constructor = true;
        self
    }

    /// Attach an enumerable property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: HostValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this function is a constructor.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.is_constructor
    }

    /// The bound receiver, if any.
    #[must_use]
    pub fn receiver(&self) -> Option<&ScopeRef> {
        self.receiver.as_ref()
    }

    /// Enumerable properties attached to the function value.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, HostValue> {
        &self.properties
    }

    /// Return a copy whose implicit receiver is `receiver`.
    #[must_use]
    pub fn bind_to(&self, receiver: ScopeRef) -> Self {
        Self {
            receiver: Some(receiver),
            ..self.clone()
        }
    }

    /// Whether both values share the same underlying body.
    #[must_use]
    pub fn same_body(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.body), Arc::as_ptr(&other.body))
    }

    /// Invoke the function.
    ///
    /// # Errors
    ///
    /// Returns whatever the function body throws.
    pub async fn call(&self, args: Vec<HostValue>) -> Result<HostValue, ScriptError> {
        (self.body)(CallArgs {
            this: self.receiver.clone(),
            args,
        })
        .await
    }
}

impl PartialEq for HostFunction {
    fn eq(&self, other: &Self) -> bool {
        self.same_body(other)
            && self.is_constructor == other.is_constructor
            && self.receiver == other.receiver
            && self.properties == other.properties
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("bound", &self.receiver.is_some())
            .field("is_constructor", &self.is_constructor)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A dynamic value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum HostValue {
    /// Absent.
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(f64),
    /// String.
    String(String),
    /// Plain object.
    Object(BTreeMap<String, HostValue>),
    /// Callable.
    Function(HostFunction),
    /// A global scope (the host global or a sandbox).
    Scope(ScopeRef),
}

impl HostValue {
    /// Build an object value from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, HostValue)>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Whether the value is `undefined`.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Borrow as a function.
    #[must_use]
    pub fn as_function(&self) -> Option<&HostFunction> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Borrow as a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read a property of an object or function value.
    #[must_use]
    pub fn property(&self, key: &str) -> HostValue {
        match self {
            Self::Object(map) => map.get(key).cloned().unwrap_or_default(),
            Self::Function(f) => f.properties().get(key).cloned().unwrap_or_default(),
            Self::Scope(scope) => scope.get(key),
            _ => Self::Undefined,
        }
    }

    /// Whether the value is an object with no own properties.
    #[must_use]
    pub fn is_empty_object(&self) -> bool {
        matches!(self, Self::Object(map) if map.is_empty())
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<HostFunction> for HostValue {
    fn from(value: HostFunction) -> Self {
        Self::Function(value)
    }
}

impl From<serde_json::Value> for HostValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::Object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), Self::from(v)))
                    .collect(),
            ),
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            },
        }
    }
}
