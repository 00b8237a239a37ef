use std::sync::Arc;

use serde::Deserialize;

use super::client::OAuthClient;
use super::error::AuthError;
use super::pending::{PendingAuthorization, PendingStore};
use super::store::TokenStore;
use super::token::TokenRecord;

/// Query parameters of the identity provider redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parses the query of a pasted redirect URL, or treats `input` as a bare code.
    pub fn from_redirect(input: &str) -> Self {
        let input = input.trim();
        match reqwest::Url::parse(input) {
            Ok(url) => {
                let mut params = Self::default();
                for (key, value) in url.query_pairs() {
                    let value = Some(value.into_owned());
                    match key.as_ref() {
                        "code" => params.code = value,
                        "state" => params.state = value,
                        "error" => params.error = value,
                        "error_description" => params.error_description = value,
                        _ => {}
                    }
                }
                params
            }
            Err(_) => Self {
                code: Some(input.to_string()),
                ..Self::default()
            },
        }
    }
}

/// Completes the authorization-code grant when the provider redirects back.
pub struct CallbackHandler {
    client: Arc<OAuthClient>,
    tokens: Arc<dyn TokenStore>,
    pending: Arc<dyn PendingStore>,
}

impl CallbackHandler {
    pub fn new(
        client: Arc<OAuthClient>,
        tokens: Arc<dyn TokenStore>,
        pending: Arc<dyn PendingStore>,
    ) -> Self {
        Self {
            client,
            tokens,
            pending,
        }
    }

    /// Exchanges the callback's code and stores the resulting record.
    ///
    /// The session's pending authorization is consumed whatever the outcome;
    /// a failed callback cannot be replayed with the same state.
    pub async fn handle(
        &self,
        session: &str,
        params: &CallbackParams,
    ) -> Result<TokenRecord, AuthError> {
        let pending = self.pending.take(session);
        let result = self.complete(session, params, pending).await;
        if let Err(err) = &result {
            tracing::warn!(session, error = %err, "authorization callback rejected");
        }
        result
    }

    async fn complete(
        &self,
        session: &str,
        params: &CallbackParams,
        pending: Option<PendingAuthorization>,
    ) -> Result<TokenRecord, AuthError> {
        if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
            return Err(AuthError::AuthorizationDenied {
                error: error.to_string(),
                description: params.error_description.clone(),
            });
        }
        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCode)?;
        let pending = pending.ok_or(AuthError::StateMismatch)?;
        let state = params.state.as_deref().ok_or(AuthError::StateMismatch)?;

        let record = self.client.exchange_code(code, state, &pending).await?;
        self.tokens.set(session, &record)?;
        tracing::info!(session, "token record stored");
        Ok(record)
    }
}
