//! Env - Process environment access that can be swapped out in tests
//!
//! Every environment read made while configuring the provider goes through
//! [`Env`], so tests can run against a fixed set of variables without
//! touching the real process environment.

use std::collections::HashMap;
use std::env::VarError;
use std::sync::Arc;

/// Source of environment variables
#[derive(Debug, Clone, Default)]
pub struct Env(Inner);

#[derive(Debug, Clone, Default)]
enum Inner {
    #[default]
    Real,
    Fake(Arc<HashMap<String, String>>),
}

impl Env {
    /// Environment backed by `std::env`
    pub fn real() -> Self {
        Self(Inner::Real)
    }

    /// Environment backed by a fixed list of variables
    pub fn from_slice(vars: &[(&str, &str)]) -> Self {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self(Inner::Fake(Arc::new(map)))
    }

    pub fn get(&self, key: &str) -> Result<String, VarError> {
        match &self.0 {
            Inner::Real => std::env::var(key),
            Inner::Fake(map) => map.get(key).cloned().ok_or(VarError::NotPresent),
        }
    }

    /// Returns the value of `key` if it is set and not empty
    pub fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key).ok().filter(|v| !v.is_empty())
    }
}
