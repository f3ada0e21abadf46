//! Qualified definition names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fully-qualified definition name: a namespace plus a local name.
///
/// Written as `namespace:Local` (for example `mx.core:UIComponent`); a name
/// in the unnamed namespace is written as just `Local`. Qualified names are the
/// identity of everything a translation unit defines or references.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QName {
    namespace: String,
    local: String,
}

/// Error returned when a string is not a valid qualified name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseQNameError {
    /// The local part after the last `:` is empty.
    #[error("qualified name '{0}' has an empty local name")]
    EmptyLocal(String),
    /// The namespace part contains a dangling separator.
    #[error("qualified name '{0}' has a malformed namespace")]
    MalformedNamespace(String),
}

impl QName {
    /// Creates a qualified name from its parts.
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// Creates a name in the unnamed namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new("", local)
    }

    /// Returns the namespace part (empty for the unnamed namespace).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the local part.
    pub fn local_name(&self) -> &str {
        &self.local
    }
}

impl FromStr for QName {
    type Err = ParseQNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, local) = s.rsplit_once(':').unwrap_or(("", s));
        if local.is_empty() {
            return Err(ParseQNameError::EmptyLocal(s.to_string()));
        }
        if namespace.ends_with(':') || (s.contains(':') && namespace.is_empty()) {
            return Err(ParseQNameError::MalformedNamespace(s.to_string()));
        }
        Ok(Self::new(namespace, local))
    }
}

impl TryFrom<String> for QName {
    type Error = ParseQNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QName> for String {
    fn from(name: QName) -> Self {
        name.to_string()
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{}:{}", self.namespace, self.local)
        }
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QName({self})")
    }
}
