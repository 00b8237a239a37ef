//! Configuration: client credentials from a secret source, settings from TOML.

pub mod secrets;
pub mod settings;

pub use secrets::{EnvSecretSource, MapSecretSource, SecretSource};
pub use settings::{Settings, TokenDisplay};

use std::fmt;

use reqwest::Url;

use crate::error::{DeskError, Result};

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:5000/callback";
pub const DEFAULT_SCOPE: &str = "openid profile email offline_access";

/// Identity provider client registration, loaded once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
    pub scope: String,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("authorization_endpoint", &self.authorization_endpoint.as_str())
            .field("token_endpoint", &self.token_endpoint.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("scope", &self.scope)
            .finish()
    }
}

impl ClientConfig {
    /// Endpoints of an Okta-style authorization server on `domain`.
    pub fn okta(
        domain: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let base = okta_base(domain);
        Ok(Self {
            authorization_endpoint: parse_url("authorization endpoint", &format!("{base}/authorize"))?,
            token_endpoint: parse_url("token endpoint", &format!("{base}/token"))?,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: parse_url("redirect uri", DEFAULT_REDIRECT_URI)?,
            scope: DEFAULT_SCOPE.to_string(),
        })
    }

    /// Reads `OAUTH_*` keys from `source`.
    ///
    /// Either `OAUTH_DOMAIN` or both explicit endpoints must be present.
    pub fn from_secrets(source: &dyn SecretSource) -> Result<Self> {
        let client_id = required(source, "OAUTH_CLIENT_ID")?;
        let client_secret = required(source, "OAUTH_CLIENT_SECRET")?;

        let (authorization_endpoint, token_endpoint) = match (
            source.secret("OAUTH_AUTHORIZATION_ENDPOINT"),
            source.secret("OAUTH_TOKEN_ENDPOINT"),
        ) {
            (Some(authorize), Some(token)) => (
                parse_url("OAUTH_AUTHORIZATION_ENDPOINT", &authorize)?,
                parse_url("OAUTH_TOKEN_ENDPOINT", &token)?,
            ),
            (None, None) => {
                let domain = required(source, "OAUTH_DOMAIN")?;
                let base = okta_base(&domain);
                (
                    parse_url("OAUTH_DOMAIN", &format!("{base}/authorize"))?,
                    parse_url("OAUTH_DOMAIN", &format!("{base}/token"))?,
                )
            }
            _ => {
                return Err(DeskError::config(
                    "OAUTH_AUTHORIZATION_ENDPOINT and OAUTH_TOKEN_ENDPOINT must be set together",
                ))
            }
        };

        let redirect_uri = source
            .secret("OAUTH_REDIRECT_URI")
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());
        let scope = source
            .secret("OAUTH_SCOPE")
            .unwrap_or_else(|| DEFAULT_SCOPE.to_string());

        Ok(Self {
            authorization_endpoint,
            token_endpoint,
            client_id,
            client_secret,
            redirect_uri: parse_url("OAUTH_REDIRECT_URI", &redirect_uri)?,
            scope,
        })
    }

    /// Path component the identity provider redirects back to.
    pub fn callback_path(&self) -> &str {
        match self.redirect_uri.path() {
            "" => "/",
            path => path,
        }
    }
}

fn okta_base(domain: &str) -> String {
    let domain = domain
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!("https://{domain}/oauth2/default/v1")
}

fn required(source: &dyn SecretSource, key: &str) -> Result<String> {
    source
        .secret(key)
        .ok_or_else(|| DeskError::config(format!("{key} is not set")))
}

fn parse_url(label: &str, raw: &str) -> Result<Url> {
    Url::parse(raw.trim()).map_err(|e| DeskError::config(format!("invalid {label} '{raw}': {e}")))
}
