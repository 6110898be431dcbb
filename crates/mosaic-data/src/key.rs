use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A store or event key: a plain name, or a unique symbol that cannot clash
/// with any name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKey {
    /// A string key.
    Name(String),
    /// A unique key.
    Symbol(Uuid),
}

impl EventKey {
    /// A fresh unique key.
    #[must_use]
    pub fn symbol() -> Self {
        Self::Symbol(Uuid::new_v4())
    }
}

impl From<&str> for EventKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for EventKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Symbol(id) => write!(f, "Symbol({id})"),
        }
    }
}
