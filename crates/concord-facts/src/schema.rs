//! Fact type declarations
//!
//! A policy declares every fact type it writes: its mutability, the names of
//! its key fields (fixing the arity) and the names of its value fields.

use crate::error::{FactError, Result};
use crate::key::FactKey;
use concord_core::Fields;
use std::collections::BTreeMap;

/// Whether facts of a type may change after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutability {
    /// Created, updated and deleted freely
    Mutable,
    /// Write-once
    Immutable,
}

/// Declaration of a single fact type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactDef {
    name: String,
    mutability: Mutability,
    key_fields: Vec<String>,
    value_fields: Vec<String>,
}

impl FactDef {
    /// Declare a fact type
    pub fn new<K, V>(name: impl Into<String>, mutability: Mutability, keys: K, values: V) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self {
            name: name.into(),
            mutability,
            key_fields: keys.into_iter().map(Into::into).collect(),
            value_fields: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Declare a mutable fact type
    pub fn mutable<K, V>(name: impl Into<String>, keys: K, values: V) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self::new(name, Mutability::Mutable, keys, values)
    }

    /// Declare an immutable fact type
    pub fn immutable<K, V>(name: impl Into<String>, keys: K, values: V) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self::new(name, Mutability::Immutable, keys, values)
    }

    /// Fact type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether facts of this type may change
    pub fn mutability(&self) -> Mutability {
        self.mutability
    }

    /// True when facts of this type can never change
    pub fn is_immutable(&self) -> bool {
        self.mutability == Mutability::Immutable
    }

    /// Key field names, in key order
    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    /// Value field names
    pub fn value_fields(&self) -> &[String] {
        &self.value_fields
    }

    /// Key arity must match the declared key fields
    pub fn check_key(&self, key: &FactKey) -> Result<()> {
        if key.arity() == self.key_fields.len() {
            Ok(())
        } else {
            Err(FactError::schema(
                &self.name,
                format!(
                    "key {key} has {} field(s), expected {}",
                    key.arity(),
                    self.key_fields.len()
                ),
            ))
        }
    }

    /// Prefix must not be longer than the key
    pub fn check_prefix(&self, prefix: &FactKey) -> Result<()> {
        if prefix.arity() <= self.key_fields.len() {
            Ok(())
        } else {
            Err(FactError::schema(
                &self.name,
                format!("prefix {prefix} is longer than the key"),
            ))
        }
    }

    /// Value must carry exactly the declared fields
    pub fn check_value(&self, value: &Fields) -> Result<()> {
        let declared = self.value_fields.iter().map(String::as_str);
        if value.names().eq(sorted(declared)) {
            Ok(())
        } else {
            Err(FactError::schema(
                &self.name,
                format!(
                    "value {value} does not match declared fields [{}]",
                    self.value_fields.join(", ")
                ),
            ))
        }
    }
}

fn sorted<'a>(names: impl Iterator<Item = &'a str>) -> impl Iterator<Item = &'a str> {
    let mut names: Vec<&str> = names.collect();
    names.sort_unstable();
    names.dedup();
    names.into_iter()
}

/// All fact types a policy may touch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactSchema {
    defs: BTreeMap<String, FactDef>,
}

impl FactSchema {
    /// Empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration, replacing any previous one with the same name
    pub fn with(mut self, def: FactDef) -> Self {
        self.defs.insert(def.name.clone(), def);
        self
    }

    /// Look up a declaration
    pub fn get(&self, fact_type: &str) -> Result<&FactDef> {
        self.defs
            .get(fact_type)
            .ok_or_else(|| FactError::UnknownFactType(fact_type.to_string()))
    }

    /// Whether the name is declared
    pub fn contains(&self, fact_type: &str) -> bool {
        self.defs.contains_key(fact_type)
    }

    /// Definitions in name order
    pub fn iter(&self) -> impl Iterator<Item = &FactDef> {
        self.defs.values()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// True when there are none
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl FromIterator<FactDef> for FactSchema {
    fn from_iter<T: IntoIterator<Item = FactDef>>(iter: T) -> Self {
        iter.into_iter().fold(Self::new(), Self::with)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn team_member() -> FactDef {
        FactDef::mutable("TeamMember", ["team", "user"], ["role"])
    }

    #[test]
    fn key_arity_is_enforced() {
        let def = team_member();
        assert!(def.check_key(&FactKey::new(["t1", "u1"])).is_ok());
        assert_matches!(
            def.check_key(&FactKey::new(["t1"])),
            Err(FactError::SchemaViolation { .. })
        );
        assert!(def.check_prefix(&FactKey::new(["t1"])).is_ok());
        assert!(def.check_prefix(&FactKey::new(["t1", "u1", "x"])).is_err());
    }

    #[test]
    fn value_fields_are_enforced() {
        let def = FactDef::mutable("Resource", ["resource"], ["writer", "value"]);
        assert!(def
            .check_value(&Fields::new().with("value", "v1").with("writer", "a"))
            .is_ok());
        assert!(def.check_value(&Fields::new().with("value", "v1")).is_err());
        assert!(def
            .check_value(
                &Fields::new()
                    .with("value", "v1")
                    .with("writer", "a")
                    .with("extra", 1)
            )
            .is_err());
    }

    #[test]
    fn unknown_types_are_reported() {
        let schema: FactSchema = [team_member()].into_iter().collect();
        assert!(schema.contains("TeamMember"));
        assert_matches!(schema.get("Nope"), Err(FactError::UnknownFactType(t)) if t == "Nope");
    }
}
