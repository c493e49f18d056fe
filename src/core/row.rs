// src/core/row.rs

//! The value handed back to callers: an ordered mapping of attribute name to value.

use indexmap::IndexMap;

/// Attribute names mapped to their string values, in the order they arrived on the wire.
pub type Attributes = IndexMap<String, String>;

/// One `!re` reply of a command. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    attributes: Attributes,
}

impl Row {
    pub fn new(attributes: Attributes) -> Self {
        Self { attributes }
    }

    /// Looks up a single attribute, e.g. `row.get(".id")`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<Attributes> for Row {
    fn from(attributes: Attributes) -> Self {
        Self::new(attributes)
    }
}

/// Renders attributes as space-joined `key=value` pairs, the format used for trap messages.
pub fn render_attributes(attributes: &Attributes) -> String {
    attributes
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}
