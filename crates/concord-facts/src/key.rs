//! Composite fact keys

use concord_core::FieldValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered tuple of typed key fields
///
/// Keys order lexicographically, so every key sharing a prefix sorts
/// contiguously right after the prefix itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactKey(Vec<FieldValue>);

impl FactKey {
    /// Key from any sequence of values
    pub fn new<I, V>(parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Zero-arity key for singleton facts
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Number of key fields
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Key fields in order
    pub fn parts(&self) -> &[FieldValue] {
        &self.0
    }

    /// Whether `prefix` is a leading sub-tuple of this key
    pub fn starts_with(&self, prefix: &FactKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl From<&str> for FactKey {
    fn from(part: &str) -> Self {
        Self(vec![part.into()])
    }
}

impl From<String> for FactKey {
    fn from(part: String) -> Self {
        Self(vec![part.into()])
    }
}

impl FromIterator<FieldValue> for FactKey {
    fn from_iter<T: IntoIterator<Item = FieldValue>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{part}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_keys_sort_first() {
        let team = FactKey::new(["t1"]);
        let member = FactKey::new(["t1", "u1"]);
        let other = FactKey::new(["t2"]);
        assert!(team < member);
        assert!(member < other);
        assert!(member.starts_with(&team));
        assert!(!other.starts_with(&team));
        assert!(member.starts_with(&FactKey::empty()));
    }

    #[test]
    fn display_lists_parts() {
        assert_eq!(FactKey::new(["t1", "u1"]).to_string(), r#"["t1", "u1"]"#);
        assert_eq!(FactKey::empty().to_string(), "[]");
    }
}
