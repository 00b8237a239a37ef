#![allow(dead_code)]

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use oauth_desk::auth::{OAuthClient, PendingAuthorization, TokenRecord};
use oauth_desk::config::ClientConfig;
use oauth_desk::util::retry::RetryPolicy;
use reqwest::Url;
use wiremock::MockServer;

pub const CLIENT_ID: &str = "client-abc";
pub const CLIENT_SECRET: &str = "s3cret";
pub const SCOPE: &str = "openid profile offline_access";

pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig {
        authorization_endpoint: Url::parse(&format!("{}/authorize", server.uri()))
            .expect("authorize url"),
        token_endpoint: Url::parse(&format!("{}/token", server.uri())).expect("token url"),
        client_id: CLIENT_ID.to_string(),
        client_secret: CLIENT_SECRET.to_string(),
        redirect_uri: Url::parse("http://127.0.0.1:5000/callback").expect("redirect uri"),
        scope: SCOPE.to_string(),
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        backoff: Duration::from_millis(10),
    }
}

pub fn client_for(server: &MockServer) -> OAuthClient {
    OAuthClient::with_timeout(config_for(server), Duration::from_secs(2))
        .expect("build client")
        .with_retry_policy(fast_retry())
}

pub fn pending(state: &str) -> PendingAuthorization {
    PendingAuthorization::with_state(state, chrono::Duration::minutes(10))
}

pub fn record(access_token: &str, refresh_token: Option<&str>) -> TokenRecord {
    TokenRecord {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        id_token: None,
        expires_at: None,
        scope: SCOPE.to_string(),
        token_type: "Bearer".to_string(),
        obtained_at: Utc::now(),
    }
}

/// Unsigned JWT carrying `payload`.
pub fn jwt(payload: &serde_json::Value) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).expect("encode payload"))
    )
}
