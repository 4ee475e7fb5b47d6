//! Configuration sources.
//!
//! The resolver never reads process state directly. It asks a
//! [`ConfigSource`] for named values; production code chains command-line
//! flags, the environment and terminal prompts, tests use a [`MapSource`].

use std::collections::HashMap;

use crate::ConfigurationResult;

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;

/// A named configuration value and how to ask for it interactively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigKey {
    /// Environment variable name
    pub name: &'static str,

    /// Question shown when the value is requested from a terminal.
    /// `None` means the value is never prompted for.
    pub prompt: Option<&'static str>,

    /// Whether the value must not be echoed or logged
    pub secret: bool,
}

impl ConfigKey {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            prompt: None,
            secret: false,
        }
    }

    pub const fn with_prompt(self, prompt: &'static str) -> Self {
        Self {
            prompt: Some(prompt),
            ..self
        }
    }

    pub const fn secret(self) -> Self {
        Self {
            secret: true,
            ..self
        }
    }

    /// Returns the same key with prompting disabled.
    pub const fn without_prompt(self) -> Self {
        Self {
            prompt: None,
            ..self
        }
    }
}

/// A provider of raw configuration values.
///
/// Implementations return `Ok(None)` when they have no value for the key.
/// Empty or whitespace-only values are treated as absent by the resolver.
pub trait ConfigSource {
    fn get(&self, key: &ConfigKey) -> ConfigurationResult<Option<String>>;
}

/// Reads values from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &ConfigKey) -> ConfigurationResult<Option<String>> {
        Ok(std::env::var(key.name).ok())
    }
}

/// Fixed set of values, keyed by variable name.
#[derive(Debug, Default, Clone)]
pub struct MapSource {
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a source from `(name, value)` pairs.
    ///
    /// ```rust
    /// use config_manager::{keys, ConfigSource, MapSource};
    ///
    /// let source = MapSource::from_pairs(&[("WORKSPACE", "acme")]);
    /// assert_eq!(source.get(&keys::WORKSPACE).unwrap().as_deref(), Some("acme"));
    /// ```
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        pairs.iter().copied().collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &ConfigKey) -> ConfigurationResult<Option<String>> {
        Ok(self.values.get(key.name).cloned())
    }
}

/// Queries sources in order and returns the first non-blank value.
///
/// Later sources are only consulted when every earlier one came up empty,
/// so an interactive source placed last prompts only for missing values.
#[derive(Default)]
pub struct SourceChain {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl SourceChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl ConfigSource for SourceChain {
    fn get(&self, key: &ConfigKey) -> ConfigurationResult<Option<String>> {
        for source in &self.sources {
            if let Some(value) = source.get(key)? {
                if !value.trim().is_empty() {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }
}
