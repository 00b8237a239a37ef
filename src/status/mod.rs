//! Human-readable summary of the stored token record.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use reqwest::Url;
use serde::Serialize;

use crate::auth::TokenRecord;
use crate::config::TokenDisplay;
use crate::util::security::mask_token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum Expiry {
    At(DateTime<Utc>),
    Unknown,
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(at) => write!(
                f,
                "{}",
                at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z")
            ),
            Self::Unknown => f.write_str("unknown (provider sent no expires_in)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Summary {
    /// `authorization_url` is `None` when no sign-in was started for this
    /// summary, as on the terminal where `login` runs the flow.
    NeedsAuthorization {
        authorization_url: Option<String>,
    },
    Authorized {
        access_token: String,
        refresh_token_present: bool,
        expires_at: Expiry,
        token_type: String,
        scope: String,
    },
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeedsAuthorization {
                authorization_url: Some(url),
            } => {
                writeln!(f, "Not authorized.")?;
                write!(f, "Visit: {url}")
            }
            Self::NeedsAuthorization {
                authorization_url: None,
            } => {
                writeln!(f, "Not authorized.")?;
                write!(f, "Run `oauth-desk login` to authorize.")
            }
            Self::Authorized {
                access_token,
                refresh_token_present,
                expires_at,
                token_type,
                scope,
            } => {
                writeln!(f, "Authorized ({token_type})")?;
                writeln!(f, "  Access token:  {access_token}")?;
                writeln!(
                    f,
                    "  Refresh token: {}",
                    if *refresh_token_present { "present" } else { "not issued" }
                )?;
                writeln!(f, "  Scope:         {scope}")?;
                write!(f, "  Expires at:    {expires_at}")
            }
        }
    }
}

/// Turns a token record, or its absence, into a [`Summary`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusPresenter {
    display: TokenDisplay,
}

impl StatusPresenter {
    pub fn new(display: TokenDisplay) -> Self {
        Self { display }
    }

    /// `authorization_url` is called only when the record grants no access.
    pub fn render(
        &self,
        record: Option<&TokenRecord>,
        authorization_url: impl FnOnce() -> Url,
    ) -> Summary {
        self.render_at(record, Utc::now(), authorization_url)
    }

    pub fn render_at(
        &self,
        record: Option<&TokenRecord>,
        now: DateTime<Utc>,
        authorization_url: impl FnOnce() -> Url,
    ) -> Summary {
        self.summarize(record, now, || Some(authorization_url()))
    }

    /// Like [`render`](Self::render) but never starts an authorization.
    pub fn render_without_link(&self, record: Option<&TokenRecord>) -> Summary {
        self.summarize(record, Utc::now(), || None)
    }

    fn summarize(
        &self,
        record: Option<&TokenRecord>,
        now: DateTime<Utc>,
        authorization_url: impl FnOnce() -> Option<Url>,
    ) -> Summary {
        match record.filter(|r| r.is_valid_at(now)) {
            None => Summary::NeedsAuthorization {
                authorization_url: authorization_url().map(|url| url.to_string()),
            },
            Some(record) => Summary::Authorized {
                access_token: match self.display {
                    TokenDisplay::Full => record.access_token.clone(),
                    TokenDisplay::Masked => mask_token(&record.access_token),
                },
                refresh_token_present: record.has_refresh_token(),
                expires_at: record.expires_at.map_or(Expiry::Unknown, Expiry::At),
                token_type: record.token_type.clone(),
                scope: record.scope.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(expires_at: Option<DateTime<Utc>>, refresh: Option<&str>) -> TokenRecord {
        TokenRecord {
            access_token: "eyJhbGciOiJIUzI1NiJ9.payload.signature".to_string(),
            refresh_token: refresh.map(str::to_string),
            id_token: None,
            expires_at,
            scope: "openid offline_access".to_string(),
            token_type: "Bearer".to_string(),
            obtained_at: Utc::now(),
        }
    }

    fn authorize_url() -> Url {
        Url::parse("https://idp.example.com/authorize?state=abc").unwrap()
    }

    #[test]
    fn absent_record_needs_authorization() {
        let summary = StatusPresenter::default().render(None, authorize_url);
        assert_eq!(
            summary,
            Summary::NeedsAuthorization {
                authorization_url: Some("https://idp.example.com/authorize?state=abc".to_string())
            }
        );
    }

    #[test]
    fn summary_without_link_points_at_login() {
        let summary = StatusPresenter::default().render_without_link(None);
        assert_eq!(
            summary,
            Summary::NeedsAuthorization {
                authorization_url: None
            }
        );
        let text = summary.to_string();
        assert!(text.contains("oauth-desk login"));
        assert!(!text.contains("Visit:"));
    }

    #[test]
    fn valid_record_without_link_is_authorized() {
        let summary = StatusPresenter::default().render_without_link(Some(&record(None, None)));
        assert!(matches!(summary, Summary::Authorized { .. }));
    }

    #[test]
    fn expired_record_needs_authorization() {
        let expired = record(Some(Utc::now() - Duration::minutes(1)), Some("r"));
        let summary = StatusPresenter::default().render(Some(&expired), authorize_url);
        assert!(matches!(summary, Summary::NeedsAuthorization { .. }));
    }

    #[test]
    fn valid_record_does_not_build_authorization_url() {
        let valid = record(None, None);
        let summary = StatusPresenter::default()
            .render(Some(&valid), || panic!("authorization url must not be built"));
        match summary {
            Summary::Authorized {
                refresh_token_present,
                expires_at,
                ..
            } => {
                assert!(!refresh_token_present);
                assert_eq!(expires_at, Expiry::Unknown);
            }
            other => panic!("expected Authorized, got {other:?}"),
        }
    }

    #[test]
    fn masked_policy_hides_token_body() {
        let expires = Utc::now() + Duration::hours(1);
        let valid = record(Some(expires), Some("r"));
        let summary = StatusPresenter::new(TokenDisplay::Masked).render(Some(&valid), authorize_url);
        match summary {
            Summary::Authorized {
                access_token,
                refresh_token_present,
                expires_at,
                ..
            } => {
                assert_eq!(access_token, "eyJhbG...ture");
                assert!(refresh_token_present);
                assert_eq!(expires_at, Expiry::At(expires));
            }
            other => panic!("expected Authorized, got {other:?}"),
        }
    }

    #[test]
    fn full_policy_shows_token() {
        let valid = record(None, None);
        let summary = StatusPresenter::new(TokenDisplay::Full).render(Some(&valid), authorize_url);
        assert!(summary
            .to_string()
            .contains("eyJhbGciOiJIUzI1NiJ9.payload.signature"));
    }
}
