//! Object identifiers derived from IRI-style names.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque, immutable, totally-ordered key naming a logical object.
///
/// Cloning is cheap; the underlying string is shared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(Arc<str>);

impl Identifier {
    /// Create an identifier from any string-like name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Create an identifier from a full IRI, e.g.
    /// `http://example.org/trestle.owl#county_42`.
    pub fn from_iri(iri: &str) -> Self {
        Self::new(iri.trim())
    }

    /// The full identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The local part of an IRI: everything after the last `#` or `/`.
    pub fn local_name(&self) -> &str {
        match self.0.rfind(['#', '/']) {
            Some(pos) if pos + 1 < self.0.len() => &self.0[pos + 1..],
            _ => &self.0,
        }
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        let id = Identifier::from_iri("http://nickrobison.com/dissertation/trestle.owl#county_42");
        assert_eq!(id.local_name(), "county_42");

        let id = Identifier::from_iri("http://example.org/objects/obj-7");
        assert_eq!(id.local_name(), "obj-7");

        let id = Identifier::new("plain");
        assert_eq!(id.local_name(), "plain");
    }

    #[test]
    fn test_ordering() {
        let a = Identifier::new("a");
        let b = Identifier::new("b");
        assert!(a < b);
        assert_eq!(a.clone(), Identifier::from("a"));
    }
}
