use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The latest token set obtained from the identity provider.
///
/// # Example
/// ```
/// use oauth_desk::auth::TokenRecord;
/// use chrono::Utc;
///
/// let record = TokenRecord {
///     access_token: "access".to_string(),
///     refresh_token: Some("refresh".to_string()),
///     id_token: None,
///     expires_at: None,
///     scope: "openid offline_access".to_string(),
///     token_type: "Bearer".to_string(),
///     obtained_at: Utc::now(),
/// };
/// assert!(record.is_valid_at(Utc::now()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    /// `obtained_at + expires_in`; `None` when the provider did not say.
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: String,
    pub token_type: String,
    pub obtained_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && self.expires_at.map_or(true, |exp| exp > now)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// JSON body returned by the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Builds a record, computing `expires_at` once from `now`.
    ///
    /// A lifetime that is not positive or does not fit a timestamp is
    /// recorded as unknown.
    pub(crate) fn into_record(self, now: DateTime<Utc>, fallback_scope: &str) -> TokenRecord {
        let expires_at = self
            .expires_in
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime));
        TokenRecord {
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            id_token: self.id_token.filter(|t| !t.is_empty()),
            expires_at,
            scope: self
                .scope
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| fallback_scope.to_string()),
            token_type: self
                .token_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Bearer".to_string()),
            obtained_at: now,
        }
    }
}

/// True iff a record is present, carries an access token, and has not expired.
pub fn has_valid_access(record: Option<&TokenRecord>) -> bool {
    record.is_some_and(|r| r.is_valid_at(Utc::now()))
}
