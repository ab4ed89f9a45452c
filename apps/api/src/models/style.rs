#![allow(dead_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Selector → (property → value) style rules supplied alongside the content.
///
/// Both levels are ordered maps so that rendering them is byte-deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleRules(pub BTreeMap<String, BTreeMap<String, String>>);

impl StyleRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a single declaration.
    pub fn declare(
        mut self,
        selector: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.0
            .entry(selector.into())
            .or_default()
            .insert(property.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, String>)> {
        self.0.iter()
    }
}
