//! Runtime settings, optionally read from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::pending::DEFAULT_PENDING_TTL_SECS;
use crate::auth::store::{default_desk_dir, TokenStoreConfig};
use crate::error::{DeskError, Result};
use crate::util::retry::RetryPolicy;

/// Upper bound for `pending_ttl_secs`: one day.
pub const MAX_PENDING_TTL_SECS: i64 = 86_400;
/// Upper bound for `http_timeout_secs`: one hour.
pub const MAX_HTTP_TIMEOUT_SECS: u64 = 3_600;

/// How the access token appears on the status page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenDisplay {
    #[default]
    Masked,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub bind: String,
    pub token_dir: Option<PathBuf>,
    pub default_session: String,
    pub pending_ttl_secs: i64,
    pub http_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub carry_over_refresh_token: bool,
    pub auto_refresh: bool,
    pub token_display: TokenDisplay,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            token_dir: None,
            default_session: "default".to_string(),
            pending_ttl_secs: DEFAULT_PENDING_TTL_SECS,
            http_timeout_secs: 10,
            retry_attempts: 2,
            retry_backoff_ms: 250,
            carry_over_refresh_token: true,
            auto_refresh: true,
            token_display: TokenDisplay::Masked,
        }
    }
}

impl Settings {
    pub fn default_path() -> PathBuf {
        default_desk_dir().join("config.toml")
    }

    /// Loads `path`, or the default path when it exists, or built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            DeskError::config(format!("cannot read settings {}: {e}", path.display()))
        })?;
        Self::from_toml(&raw)
            .map_err(|e| DeskError::config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(raw).map_err(|e| DeskError::config(format!("invalid settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_PENDING_TTL_SECS).contains(&self.pending_ttl_secs) {
            return Err(DeskError::config(format!(
                "pending_ttl_secs must be between 1 and {MAX_PENDING_TTL_SECS}"
            )));
        }
        if !(1..=MAX_HTTP_TIMEOUT_SECS).contains(&self.http_timeout_secs) {
            return Err(DeskError::config(format!(
                "http_timeout_secs must be between 1 and {MAX_HTTP_TIMEOUT_SECS}"
            )));
        }
        if self.retry_attempts == 0 {
            return Err(DeskError::config("retry_attempts must be at least 1"));
        }
        if self.default_session.trim().is_empty() {
            return Err(DeskError::config("default_session must not be empty"));
        }
        Ok(())
    }

    pub fn token_store_config(&self) -> TokenStoreConfig {
        TokenStoreConfig::new(
            self.token_dir
                .clone()
                .unwrap_or_else(TokenStoreConfig::default_dir),
        )
    }

    /// Out-of-range values (only reachable without [`validate`](Self::validate))
    /// fall back to the default TTL.
    pub fn pending_ttl(&self) -> chrono::Duration {
        Some(self.pending_ttl_secs)
            .filter(|secs| (1..=MAX_PENDING_TTL_SECS).contains(secs))
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_PENDING_TTL_SECS))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn partial_file_overrides_selected_fields() {
        let settings = Settings::from_toml(
            r#"
            bind = "0.0.0.0:8080"
            token_display = "full"
            carry_over_refresh_token = false
            "#,
        )
        .unwrap();
        assert_eq!(settings.bind, "0.0.0.0:8080");
        assert_eq!(settings.token_display, TokenDisplay::Full);
        assert!(!settings.carry_over_refresh_token);
        assert_eq!(settings.pending_ttl_secs, 600);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let err = Settings::from_toml("pending_ttl_secs = 0").unwrap_err();
        assert!(matches!(err, DeskError::Configuration(_)));
    }

    #[test]
    fn oversized_durations_are_rejected() {
        for raw in [
            "pending_ttl_secs = 9223372036854775807",
            "pending_ttl_secs = 86401",
            "http_timeout_secs = 3601",
        ] {
            let err = Settings::from_toml(raw).unwrap_err();
            assert!(matches!(err, DeskError::Configuration(_)), "{raw}");
        }
        let day = Settings::from_toml("pending_ttl_secs = 86400").unwrap();
        assert_eq!(day.pending_ttl(), chrono::Duration::days(1));
    }

    #[test]
    fn unvalidated_huge_ttl_falls_back_to_default() {
        let settings = Settings {
            pending_ttl_secs: i64::MAX,
            ..Settings::default()
        };
        assert_eq!(
            settings.pending_ttl(),
            chrono::Duration::seconds(DEFAULT_PENDING_TTL_SECS)
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Settings::from_toml("colour = \"blue\"").is_err());
    }

    #[test]
    fn retry_policy_reflects_settings() {
        let settings = Settings::from_toml("retry_attempts = 1\nretry_backoff_ms = 5").unwrap();
        let policy = settings.retry_policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff, Duration::from_millis(5));
    }
}
