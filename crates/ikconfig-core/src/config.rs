//! Parsed kernel configuration.
//!
//! The embedded `.config` is plain `KEY=VALUE` text. Anything else (blank
//! lines, `# CONFIG_FOO is not set` comments, stray garbage) is skipped.

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// State of a tristate config option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tristate {
    /// Compiled into the kernel (`=y`)
    BuiltIn,
    /// Built as a loadable module (`=m`)
    Module,
    /// Explicitly disabled (`=n`)
    Disabled,
}

impl Tristate {
    /// Interpret a raw config value, if it is a tristate
    pub fn from_value(value: &str) -> Option<Self> {
        match value {
            "y" => Some(Self::BuiltIn),
            "m" => Some(Self::Module),
            "n" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// Mapping from config key to its raw value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelConfigMap {
    entries: BTreeMap<String, String>,
}

impl KernelConfigMap {
    /// Parse `.config` text. Later duplicates overwrite earlier ones.
    pub fn parse(text: &str) -> Self {
        let entries = text.lines().filter_map(parse_line).fold(
            BTreeMap::new(),
            |mut entries, (key, value)| {
                entries.insert(key.to_string(), value.to_string());
                entries
            },
        );
        Self { entries }
    }

    /// Look up the raw value of `key`
    pub fn get(&self, key: &str) -> Result<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::key_not_found(key))
    }

    /// Whether `key` is present
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Tristate state of `key`, if present and tristate-valued
    pub fn tristate(&self, key: &str) -> Option<Tristate> {
        self.entries
            .get(key)
            .and_then(|value| Tristate::from_value(value))
    }

    /// Whether `key` is built in or built as a module
    pub fn is_enabled(&self, key: &str) -> bool {
        matches!(
            self.tristate(key),
            Some(Tristate::BuiltIn | Tristate::Module)
        )
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries sorted by key
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> IntoIterator for &'a KernelConfigMap {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Split a `KEY=VALUE` line, rejecting comments and malformed keys
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches('\r');
    let (key, value) = line.split_once('=')?;
    if key.is_empty() || key.starts_with('#') || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, value))
}
