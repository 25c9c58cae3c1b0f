//! Typed field values shared by command payloads, facts and effects
//!
//! The value set is closed and every variant is serializable, which is what
//! lets effects cross the application boundary and lets fact state be hashed
//! byte for byte.

use crate::errors::ConcordError;
use crate::identifiers::Hash32;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single typed value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldValue {
    /// Signed integer
    Int(i64),
    /// Boolean flag
    Bool(bool),
    /// UTF-8 string
    Str(String),
    /// Opaque bytes
    Bytes(Vec<u8>),
    /// Content-derived identifier
    Id(Hash32),
}

impl FieldValue {
    /// Name of the variant, used in type-mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Int(_) => "int",
            FieldValue::Bool(_) => "bool",
            FieldValue::Str(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Id(_) => "id",
        }
    }

    /// Borrow as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Read as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Read as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Read as an identifier
    pub fn as_id(&self) -> Option<Hash32> {
        match self {
            FieldValue::Id(h) => Some(*h),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Str(s) => write!(f, "{s:?}"),
            FieldValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            FieldValue::Id(h) => write!(f, "{h}"),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<Hash32> for FieldValue {
    fn from(value: Hash32) -> Self {
        FieldValue::Id(value)
    }
}

/// Ordered record of named values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    /// Empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Insert or replace a field, returning the previous value
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.0.insert(name.into(), value.into())
    }

    /// Look up a field
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    /// Whether a field is present
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate over `(name, value)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Required string field
    pub fn str(&self, name: &str) -> Result<&str, ConcordError> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| self.mismatch(name, "string"))
    }

    /// Required integer field
    pub fn int(&self, name: &str) -> Result<i64, ConcordError> {
        self.require(name)?
            .as_int()
            .ok_or_else(|| self.mismatch(name, "int"))
    }

    /// Required boolean field
    pub fn bool(&self, name: &str) -> Result<bool, ConcordError> {
        self.require(name)?
            .as_bool()
            .ok_or_else(|| self.mismatch(name, "bool"))
    }

    fn require(&self, name: &str) -> Result<&FieldValue, ConcordError> {
        self.0
            .get(name)
            .ok_or_else(|| ConcordError::invalid(format!("missing field `{name}`")))
    }

    fn mismatch(&self, name: &str, expected: &str) -> ConcordError {
        let found = self.0.get(name).map(FieldValue::kind).unwrap_or("nothing");
        ConcordError::invalid(format!(
            "field `{name}` expected {expected}, found {found}"
        ))
    }
}

impl FromIterator<(String, FieldValue)> for Fields {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors_report_mismatches() {
        let fields = Fields::new().with("role", "admin").with("count", 3);
        assert_eq!(fields.str("role").unwrap(), "admin");
        assert_eq!(fields.int("count").unwrap(), 3);

        let err = fields.int("role").unwrap_err();
        assert!(err.to_string().contains("expected int, found string"));
        assert!(fields.str("absent").is_err());
    }

    #[test]
    fn display_is_ordered() {
        let fields = Fields::new().with("b", true).with("a", 1);
        assert_eq!(fields.to_string(), "{a: 1, b: true}");
    }
}
