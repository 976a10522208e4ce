//! Free-form workload properties.
//!
//! Every generator and loader receives its own copy of the run properties at
//! `init()`, with index metadata injected by the engine under the keys below.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Total number of generators in the run.
pub const GENERATORS: &str = "generators";
/// Total number of loaders in the run.
pub const LOADERS: &str = "loaders";
/// Number of producer threads the generators were partitioned across.
pub const GENERATOR_THREADS: &str = "generatorThreads";
/// Position of a generator in the list passed to `start()`.
pub const GENERATOR_INDEX: &str = "generatorIndex";
/// Index of the producer thread that owns a generator.
pub const GENERATOR_THREAD_INDEX: &str = "generatorThreadIndex";
/// Position of a loader in the list passed to `start()`.
pub const LOADER_INDEX: &str = "loaderIndex";

/// Ordered string key/value map passed through to workloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parse a property into `T`, returning `None` when it is missing or malformed.
    pub fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// Parse a property into `T`, falling back to `default`.
    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.parse(key).unwrap_or(default)
    }

    /// Copy every entry of `other` over this map.
    pub fn extend(&mut self, other: &Properties) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse a `key=value` pair, as accepted on command lines.
    pub fn parse_pair(pair: &str) -> Option<(String, String)> {
        let (key, value) = pair.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some((key.to_string(), value.to_string()))
    }
}

impl FromIterator<(String, String)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, String>> for Properties {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}
