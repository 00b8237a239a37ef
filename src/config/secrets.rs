//! Read-only sources for client credentials.

use std::collections::HashMap;

/// Supplies client registration values at startup.
pub trait SecretSource: Send + Sync {
    /// Returns the trimmed, non-empty value for `key`.
    fn secret(&self, key: &str) -> Option<String>;
}

/// Process environment, after loading `.env` if one is present.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretSource;

impl EnvSecretSource {
    pub fn new() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self
    }
}

impl SecretSource for EnvSecretSource {
    fn secret(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().and_then(non_empty)
    }
}

/// In-memory source, handy for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapSecretSource {
    values: HashMap<String, String>,
}

impl MapSecretSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl SecretSource for MapSecretSource {
    fn secret(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned().and_then(non_empty)
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
