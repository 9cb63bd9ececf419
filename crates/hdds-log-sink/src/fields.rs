// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Custom fields and column renaming.

use crate::value::FieldValue;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Application-supplied fields merged into every outgoing row.
///
/// The set can be changed from any thread while records are being built;
/// each build works on a snapshot taken at its start.
#[derive(Debug, Default)]
pub struct CustomFields {
    fields: RwLock<BTreeMap<String, FieldValue>>,
}

impl CustomFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, overwriting an existing one with the same name.
    pub fn add(&self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.write().insert(name.into(), value.into());
    }

    /// Merge several fields at once.
    pub fn add_many<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut fields = self.fields.write();
        for (name, value) in entries {
            fields.insert(name.into(), value.into());
        }
    }

    /// Remove a field. Unknown names are ignored.
    pub fn remove(&self, name: &str) {
        self.fields.write().remove(name);
    }

    /// Remove several fields. Unknown names are ignored.
    pub fn remove_many<'a, I>(&self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut fields = self.fields.write();
        for name in names {
            fields.remove(name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }

    /// Names of all registered fields, sorted.
    pub fn names(&self) -> Vec<String> {
        self.fields.read().keys().cloned().collect()
    }

    /// Copy of the current field set.
    ///
    /// Producers are shared, not invoked.
    pub fn snapshot(&self) -> BTreeMap<String, FieldValue> {
        self.fields.read().clone()
    }
}

/// Source field name to destination column name.
///
/// Unmapped names are used verbatim. A mapping only renames: every source
/// field lands in exactly one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    renames: HashMap<String, String>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `source` to the column `destination`.
    pub fn rename(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.insert(source, destination);
        self
    }

    pub fn insert(&mut self, source: impl Into<String>, destination: impl Into<String>) {
        self.renames.insert(source.into(), destination.into());
    }

    /// Destination column for `source`.
    pub fn resolve<'a>(&'a self, source: &'a str) -> &'a str {
        self.renames.get(source).map(String::as_str).unwrap_or(source)
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FieldMapping
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            renames: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
