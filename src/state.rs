//! Saved-state tree
//!
//! An XML-like element: a tag, string attributes and ordered children. Every
//! save/load operation in the crate reads or writes one of these. Numbers are
//! stored as their decimal text, booleans as `"1"` / `"0"`. The tree is
//! encoded as JSON for persistence by callers.

use crate::error::{FxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node of a saved-state tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateElement {
    /// Element tag, e.g. `EffectChain`, `Effect`, `MidiMapping`
    pub tag: String,
    /// Attribute map
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// Child elements in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StateElement>,
}

impl StateElement {
    /// Create an empty element
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Whether the element carries an attribute
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Raw attribute text
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Set a string attribute
    pub fn set_str(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    /// Set a numeric attribute
    pub fn set_f64(&mut self, name: &str, value: f64) {
        self.set_str(name, value.to_string());
    }

    /// Numeric attribute; `None` when missing or not a number
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get_str(name)?.trim().parse().ok()
    }

    /// Numeric attribute with a fallback
    pub fn get_f64_or(&self, name: &str, default: f64) -> f64 {
        self.get_f64(name).unwrap_or(default)
    }

    /// Integer attribute; `None` when missing, negative or not a number
    pub fn get_usize(&self, name: &str) -> Option<usize> {
        let text = self.get_str(name)?.trim();
        text.parse::<usize>()
            .ok()
            .or_else(|| text.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as usize))
    }

    /// Set a boolean attribute
    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.set_str(name, if value { "1" } else { "0" });
    }

    /// Boolean attribute; accepts `1/0` and `true/false`
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get_str(name)?.trim() {
            "1" | "true" | "True" => Some(true),
            "0" | "false" | "False" => Some(false),
            _ => None,
        }
    }

    /// Append a child element and return a handle to it
    pub fn add_child(&mut self, child: StateElement) -> &mut StateElement {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Children with the given tag, in order
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a StateElement> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// First child with the given tag
    pub fn child(&self, tag: &str) -> Option<&StateElement> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Encode as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let element: StateElement = serde_json::from_str(json)?;
        if element.tag.is_empty() {
            return Err(FxError::MalformedState {
                reason: "root element has an empty tag".to_string(),
            });
        }
        Ok(element)
    }
}
