use std::time::Duration;

use chrono::Utc;
use reqwest::Url;

use super::error::AuthError;
use super::pending::PendingAuthorization;
use super::token::{TokenRecord, TokenResponse};
use crate::config::ClientConfig;
use crate::util::retry::RetryPolicy;
use crate::util::security::constant_time_eq;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY_LEN: usize = 2048;

/// Builds the browser redirect to the authorization endpoint.
///
/// Appends exactly `response_type`, `client_id`, `redirect_uri`, `scope` and
/// `state` to whatever query the configured endpoint already carries.
pub fn build_authorization_url(config: &ClientConfig, state: &str) -> Url {
    let mut url = config.authorization_endpoint.clone();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", config.redirect_uri.as_str())
        .append_pair("scope", &config.scope)
        .append_pair("state", state);
    url
}

/// Authorization-code grant client for a single identity provider.
///
/// # Example
/// ```no_run
/// use oauth_desk::auth::OAuthClient;
/// use oauth_desk::config::ClientConfig;
///
/// let config = ClientConfig::okta("dev-123.okta.com", "client-id", "client-secret")?;
/// let client = OAuthClient::new(config)?;
/// let url = client.authorization_url("state-nonce");
/// assert!(url.as_str().contains("response_type=code"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    config: ClientConfig,
    retry: RetryPolicy,
    carry_over_refresh_token: bool,
}

impl OAuthClient {
    pub fn new(config: ClientConfig) -> Result<Self, AuthError> {
        Self::with_timeout(config, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(config: ClientConfig, timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            retry: RetryPolicy::default(),
            carry_over_refresh_token: true,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Keep the previous refresh token when a refresh response omits one.
    pub fn with_refresh_carry_over(mut self, enabled: bool) -> Self {
        self.carry_over_refresh_token = enabled;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn authorization_url(&self, state: &str) -> Url {
        build_authorization_url(&self.config, state)
    }

    /// Exchange an authorization code for tokens.
    ///
    /// `state` must match the pending authorization, which must not have
    /// expired. Nothing is persisted here.
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        pending: &PendingAuthorization,
    ) -> Result<TokenRecord, AuthError> {
        if pending.is_expired_at(Utc::now()) {
            return Err(AuthError::AuthorizationExpired);
        }
        if !constant_time_eq(state.as_bytes(), pending.state.as_bytes()) {
            return Err(AuthError::StateMismatch);
        }

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        let record = self.request_token(&form).await?;
        tracing::info!(
            token_type = %record.token_type,
            has_refresh_token = record.refresh_token.is_some(),
            expires_at = ?record.expires_at,
            "authorization code exchanged"
        );
        Ok(record)
    }

    /// Obtain a new access token using the record's refresh token.
    pub async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord, AuthError> {
        let refresh_token = record
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NoRefreshToken)?;

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        let mut refreshed = self.request_token(&form).await?;
        if self.carry_over_refresh_token && refreshed.refresh_token.is_none() {
            refreshed.refresh_token = Some(refresh_token.to_string());
        }
        if refreshed.id_token.is_none() {
            refreshed.id_token = record.id_token.clone();
        }
        tracing::info!(expires_at = ?refreshed.expires_at, "access token refreshed");
        Ok(refreshed)
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenRecord, AuthError> {
        let http = &self.http;
        let endpoint = &self.config.token_endpoint;
        let (status, body) = self
            .retry
            .execute(move || async move {
                tracing::debug!(endpoint = %endpoint, "token endpoint request");
                let resp = http
                    .post(endpoint.clone())
                    .header("Accept", "application/json")
                    .form(form)
                    .send()
                    .await?;
                let status = resp.status();
                let body = resp.text().await?;
                Ok::<_, AuthError>((status, body))
            })
            .await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "token endpoint rejected request");
            return Err(AuthError::TokenEndpointError {
                status: status.as_u16(),
                body: truncate(body, MAX_ERROR_BODY_LEN),
            });
        }

        let payload: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            AuthError::InvalidResponse(format!("token endpoint returned invalid JSON: {e}"))
        })?;
        if payload.access_token.is_empty() {
            return Err(AuthError::InvalidResponse(
                "token endpoint response has no access_token".to_string(),
            ));
        }
        Ok(payload.into_record(Utc::now(), &self.config.scope))
    }
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut end = max;
        while end > 0 && !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> ClientConfig {
        ClientConfig {
            authorization_endpoint: Url::parse("https://idp.example.com/authorize").unwrap(),
            token_endpoint: Url::parse("https://idp.example.com/token").unwrap(),
            client_id: "client-abc".to_string(),
            client_secret: "s3cret".to_string(),
            redirect_uri: Url::parse("http://127.0.0.1:5000/callback").unwrap(),
            scope: "openid profile offline_access".to_string(),
        }
    }

    #[test]
    fn authorization_url_carries_exactly_the_grant_parameters() {
        let url = build_authorization_url(&config(), "state-123");
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let expected: HashMap<String, String> = [
            ("response_type", "code"),
            ("client_id", "client-abc"),
            ("redirect_uri", "http://127.0.0.1:5000/callback"),
            ("scope", "openid profile offline_access"),
            ("state", "state-123"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(params, expected);
        assert!(!url.as_str().contains("s3cret"));
    }

    #[test]
    fn authorization_url_is_deterministic() {
        assert_eq!(
            build_authorization_url(&config(), "s"),
            build_authorization_url(&config(), "s")
        );
    }

    #[test]
    fn authorization_url_keeps_existing_endpoint_query() {
        let mut cfg = config();
        cfg.authorization_endpoint =
            Url::parse("https://idp.example.com/authorize?prompt=login").unwrap();
        let url = build_authorization_url(&cfg, "s");
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params.get("prompt").map(String::as_str), Some("login"));
        assert_eq!(params.get("state").map(String::as_str), Some("s"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo".to_string(), 2), "h");
        assert_eq!(truncate("short".to_string(), 10), "short");
    }
}
