//! Resource descriptors and search criteria.
//!
//! Compute nodes advertise what they can run as `"Name-Version"` strings.
//! A `ResourceDescriptor` is the parsed form; a `SearchCriteria` has the same
//! shape but is used as a query key, so two identical searches hash and
//! compare equal and collapse onto one search cache entry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A class of compute resource offered by a remote node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub version: String,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse an advertised identifier.
    ///
    /// Splits on the first `-`: `"solver-2.1-beta"` is name `solver`,
    /// version `2.1-beta`. Missing parts become empty strings and blank
    /// input yields an empty descriptor, so this never fails.
    pub fn parse_lossy(identifier: &str) -> Self {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Self::new("", "");
        }
        match identifier.split_once('-') {
            Some((name, version)) => Self::new(name, version),
            None => Self::new(identifier, ""),
        }
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// Key of a search: which resource class the client is looking for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub name: String,
    pub version: String,
}

impl SearchCriteria {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Does the descriptor satisfy this search? Exact name and version match.
    pub fn matches(&self, resource: &ResourceDescriptor) -> bool {
        self.name == resource.name && self.version == resource.version
    }

    /// True if any of the given resources satisfies this search.
    pub fn matches_any<'a, I>(&self, resources: I) -> bool
    where
        I: IntoIterator<Item = &'a ResourceDescriptor>,
    {
        resources.into_iter().any(|r| self.matches(r))
    }
}

impl fmt::Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

impl From<ResourceDescriptor> for SearchCriteria {
    fn from(d: ResourceDescriptor) -> Self {
        Self {
            name: d.name,
            version: d.version,
        }
    }
}
