//! Keyed script storage plus the distinguished selector script.
//!
//! Bodies are opaque text. Nothing is parsed at registration; a broken body
//! fails when it runs.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ScriptRegistry {
    scripts: HashMap<String, String>,
    selector: String,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `body` under `key`, replacing any previous body.
    pub fn register(&mut self, key: impl Into<String>, body: impl Into<String>) {
        let key = key.into();
        let body = body.into();
        tracing::debug!(script = %key, bytes = body.len(), "registered script");
        if self.scripts.insert(key, body).is_some() {
            tracing::trace!("replaced existing script body");
        }
    }

    /// Replace the selector script. An empty selector never sets a key.
    pub fn set_selector_script(&mut self, body: impl Into<String>) {
        self.selector = body.into();
        tracing::debug!(bytes = self.selector.len(), "selector script set");
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.scripts.get(key).map(String::as_str)
    }

    pub fn selector_script(&self) -> &str {
        &self.selector
    }

    pub fn contains(&self, key: &str) -> bool {
        self.scripts.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.scripts.remove(key)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.scripts.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
