//! Object identifiers for the management tree

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OidParseError {
    #[error("empty object identifier")]
    Empty,
    #[error("invalid component '{0}' in object identifier")]
    InvalidComponent(String),
}

/// Dotted object identifier, e.g. `1.3.6.1.2.1.1.5.0`
///
/// Ordering is lexicographic over the numeric components, which is the
/// order agents return rows in during a walk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(Vec<u32>);

impl ObjectId {
    pub fn new(components: Vec<u32>) -> Self {
        Self(components)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `prefix` is a (non-strict) prefix of this identifier
    pub fn starts_with(&self, prefix: &ObjectId) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Components following `prefix`, or `None` if `prefix` does not match
    pub fn suffix(&self, prefix: &ObjectId) -> Option<&[u32]> {
        self.0.strip_prefix(prefix.0.as_slice())
    }

    /// A new identifier with `component` appended
    pub fn child(&self, component: u32) -> Self {
        let mut components = self.0.clone();
        components.push(component);
        Self(components)
    }

    /// A new identifier with all of `components` appended
    pub fn join(&self, components: &[u32]) -> Self {
        let mut joined = self.0.clone();
        joined.extend_from_slice(components);
        Self(joined)
    }
}

impl From<&[u32]> for ObjectId {
    fn from(components: &[u32]) -> Self {
        Self(components.to_vec())
    }
}

impl FromStr for ObjectId {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(OidParseError::Empty);
        }
        trimmed
            .split('.')
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| OidParseError::InvalidComponent(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", component)?;
            first = false;
        }
        Ok(())
    }
}
