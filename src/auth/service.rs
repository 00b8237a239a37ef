use std::sync::Arc;

use chrono::Utc;
use reqwest::Url;

use super::callback::{CallbackHandler, CallbackParams};
use super::client::OAuthClient;
use super::error::AuthError;
use super::pending::{
    MemoryPendingStore, PendingAuthorization, PendingStore, DEFAULT_PENDING_TTL_SECS,
};
use super::store::{FileTokenStore, TokenStore};
use super::token::{has_valid_access, TokenRecord};
use crate::config::{ClientConfig, Settings};
use crate::inspect::{self, DecodedJwt};
use crate::status::{StatusPresenter, Summary};

/// Facade over the OAuth client and the session stores.
///
/// Front ends (HTTP routes, CLI commands) hold one `AuthService` and go
/// through it for every flow step. It never prints or renders HTML.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use oauth_desk::auth::{AuthService, MemoryPendingStore, MemoryTokenStore, OAuthClient};
/// use oauth_desk::config::ClientConfig;
///
/// let config = ClientConfig::okta("dev-123.okta.com", "client-id", "client-secret")?;
/// let service = AuthService::new(
///     Arc::new(OAuthClient::new(config)?),
///     Arc::new(MemoryTokenStore::new()),
///     Arc::new(MemoryPendingStore::new()),
/// );
/// let url = service.begin_authorization("default");
/// println!("visit {url}");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct AuthService {
    client: Arc<OAuthClient>,
    tokens: Arc<dyn TokenStore>,
    pending: Arc<dyn PendingStore>,
    callback: CallbackHandler,
    pending_ttl: chrono::Duration,
    auto_refresh: bool,
}

impl AuthService {
    pub fn new(
        client: Arc<OAuthClient>,
        tokens: Arc<dyn TokenStore>,
        pending: Arc<dyn PendingStore>,
    ) -> Self {
        let callback = CallbackHandler::new(client.clone(), tokens.clone(), pending.clone());
        Self {
            client,
            tokens,
            pending,
            callback,
            pending_ttl: chrono::Duration::seconds(DEFAULT_PENDING_TTL_SECS),
            auto_refresh: true,
        }
    }

    /// Wires a file-backed service from runtime settings.
    pub fn from_settings(settings: &Settings, config: ClientConfig) -> Result<Self, AuthError> {
        let client = OAuthClient::with_timeout(config, settings.http_timeout())?
            .with_retry_policy(settings.retry_policy())
            .with_refresh_carry_over(settings.carry_over_refresh_token);
        let tokens = FileTokenStore::new(settings.token_store_config());
        tracing::debug!(dir = %tokens.base_dir().display(), "using file token store");
        Ok(Self::new(
            Arc::new(client),
            Arc::new(tokens),
            Arc::new(MemoryPendingStore::new()),
        )
        .with_pending_ttl(settings.pending_ttl())
        .with_auto_refresh(settings.auto_refresh))
    }

    pub fn with_pending_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    /// Refresh an expired record on read when it carries a refresh token.
    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    pub fn client(&self) -> &OAuthClient {
        &self.client
    }

    /// Starts a new authorization for `session` and returns the URL to visit.
    ///
    /// Any earlier pending authorization for the session is replaced.
    pub fn begin_authorization(&self, session: &str) -> Url {
        let pending = PendingAuthorization::new(self.pending_ttl);
        let url = self.client.authorization_url(&pending.state);
        tracing::debug!(session, expires_at = %pending.expires_at, "authorization started");
        self.pending.put(session, pending);
        url
    }

    pub async fn handle_callback(
        &self,
        session: &str,
        params: &CallbackParams,
    ) -> Result<TokenRecord, AuthError> {
        self.callback.handle(session, params).await
    }

    /// Reads the session's record, refreshing it first when it has expired.
    ///
    /// A failed refresh is logged and the stale record returned as is.
    pub async fn current_record(&self, session: &str) -> Result<Option<TokenRecord>, AuthError> {
        let Some(record) = self.tokens.get(session)? else {
            return Ok(None);
        };
        if !self.auto_refresh || !record.is_expired_at(Utc::now()) || !record.has_refresh_token()
        {
            return Ok(Some(record));
        }
        match self.refresh_record(session, &record).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(err) => {
                tracing::warn!(session, error = %err, "automatic refresh failed");
                Ok(Some(record))
            }
        }
    }

    pub async fn status(
        &self,
        session: &str,
        presenter: &StatusPresenter,
    ) -> Result<Summary, AuthError> {
        let record = self.current_record(session).await?;
        Ok(presenter.render(record.as_ref(), || self.begin_authorization(session)))
    }

    /// Summary for callers that cannot receive the callback themselves; no
    /// pending authorization is issued.
    pub async fn status_without_link(
        &self,
        session: &str,
        presenter: &StatusPresenter,
    ) -> Result<Summary, AuthError> {
        let record = self.current_record(session).await?;
        Ok(presenter.render_without_link(record.as_ref()))
    }

    /// Refreshes the stored record unconditionally.
    pub async fn refresh(&self, session: &str) -> Result<TokenRecord, AuthError> {
        let record = self.tokens.get(session)?.ok_or(AuthError::NotAuthorized)?;
        self.refresh_record(session, &record).await
    }

    async fn refresh_record(
        &self,
        session: &str,
        record: &TokenRecord,
    ) -> Result<TokenRecord, AuthError> {
        let refreshed = self.client.refresh(record).await?;
        self.tokens.set(session, &refreshed)?;
        Ok(refreshed)
    }

    pub fn clear(&self, session: &str) -> Result<(), AuthError> {
        self.tokens.clear(session)?;
        tracing::info!(session, "OAuth tokens have been cleared");
        Ok(())
    }

    /// Decodes the session's access token without verifying it.
    pub async fn inspect(&self, session: &str) -> Result<DecodedJwt, AuthError> {
        let record = self.current_record(session).await?;
        if !has_valid_access(record.as_ref()) {
            return Err(AuthError::NotAuthorized);
        }
        let token = record.map(|r| r.access_token).unwrap_or_default();
        inspect::decode_jwt(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;

    fn service() -> (AuthService, Arc<MemoryTokenStore>) {
        let config = ClientConfig::okta("dev-123.okta.com", "client-abc", "s3cret").unwrap();
        let tokens = Arc::new(MemoryTokenStore::new());
        let service = AuthService::new(
            Arc::new(OAuthClient::new(config).unwrap()),
            tokens.clone(),
            Arc::new(MemoryPendingStore::new()),
        );
        (service, tokens)
    }

    fn record(access_token: &str) -> TokenRecord {
        TokenRecord {
            access_token: access_token.to_string(),
            refresh_token: None,
            id_token: None,
            expires_at: None,
            scope: "openid".to_string(),
            token_type: "Bearer".to_string(),
            obtained_at: Utc::now(),
        }
    }

    #[test]
    fn begin_authorization_embeds_fresh_state() {
        let (service, _) = service();
        let first = service.begin_authorization("default");
        let second = service.begin_authorization("default");
        let state = |url: &Url| {
            url.query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned())
        };
        assert_eq!(state(&first).map(|s| s.len()), Some(64));
        assert_ne!(state(&first), state(&second));
    }

    #[tokio::test]
    async fn refresh_without_record_is_not_authorized() {
        let (service, _) = service();
        assert!(matches!(
            service.refresh("default").await,
            Err(AuthError::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn inspect_without_record_is_not_authorized() {
        let (service, _) = service();
        assert!(matches!(
            service.inspect("default").await,
            Err(AuthError::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn inspect_decodes_stored_token() {
        let (service, tokens) = service();
        tokens
            .set(
                "default",
                &record("eyJhbGciOiJIUzI1NiJ9.eyJpc3MiOiJva3RhIn0.sig"),
            )
            .unwrap();
        let decoded = service.inspect("default").await.unwrap();
        assert_eq!(decoded.claims().iss.as_deref(), Some("okta"));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let (service, tokens) = service();
        tokens.set("default", &record("tok")).unwrap();
        service.clear("default").unwrap();
        service.clear("default").unwrap();
        assert!(tokens.get("default").unwrap().is_none());
    }

    #[tokio::test]
    async fn status_of_authorized_session_leaves_pending_untouched() {
        let (service, tokens) = service();
        tokens.set("default", &record("abcdefghijklmnop")).unwrap();
        let summary = service
            .status("default", &StatusPresenter::default())
            .await
            .unwrap();
        assert!(matches!(summary, Summary::Authorized { .. }));
        assert!(service.pending.take("default").is_none());
    }

    #[tokio::test]
    async fn status_without_link_issues_no_pending_authorization() {
        let (service, _tokens) = service();
        let summary = service
            .status_without_link("default", &StatusPresenter::default())
            .await
            .unwrap();
        assert_eq!(
            summary,
            Summary::NeedsAuthorization {
                authorization_url: None
            }
        );
        assert!(service.pending.take("default").is_none());
    }
}
