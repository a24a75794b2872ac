//! Flat key/value print configuration
//!
//! The codec never interprets configuration values; it only shuttles
//! them between the archive parts and the caller as strings. Keys are
//! kept in a sorted map so serialization order is deterministic.

use std::collections::BTreeMap;

/// An ordered set of `key = value` configuration options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintConfig {
    options: BTreeMap<String, String>,
}

impl PrintConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }

    /// Get an option value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Iterate over `(key, value)` pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }

    /// True if no options are set
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Number of options
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Load options from gcode-style comment lines
    ///
    /// The print-config part stores one option per line in the form
    /// `; key = value`. Lines without that shape (including the
    /// generator header comment) are ignored.
    pub fn load_from_comments(&mut self, text: &str) {
        for line in text.lines() {
            let Some(rest) = line.strip_prefix("; ") else {
                continue;
            };
            if let Some((key, value)) = rest.split_once(" = ") {
                let key = key.trim();
                if !key.is_empty() {
                    self.set(key, value);
                }
            }
        }
    }
}
