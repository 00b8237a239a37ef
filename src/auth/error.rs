use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// Errors produced by the authorization-code flow and token inspection.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("OAuth state mismatch")]
    StateMismatch,
    #[error("Authorization request expired")]
    AuthorizationExpired,
    #[error("Callback did not include an authorization code")]
    MissingCode,
    #[error("Authorization denied by provider: {error}")]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },
    #[error("Token endpoint returned status {status}: {body}")]
    TokenEndpointError { status: u16, body: String },
    #[error("No refresh token available")]
    NoRefreshToken,
    #[error("No valid access token stored")]
    NotAuthorized,
    #[error("Malformed token ({segment_count} segments){}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    MalformedToken {
        segment_count: usize,
        reason: Option<String>,
    },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// Connection failures (refused, reset or dropped mid-exchange) and
    /// timeouts; the only errors worth a retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }

    /// Text shown on the page or terminal when a flow step fails.
    pub fn user_message(&self) -> String {
        match self {
            Self::StateMismatch => {
                "The authorization link is stale or was tampered with. Start the sign-in again."
                    .to_string()
            }
            Self::AuthorizationExpired => {
                "The authorization request timed out. Start the sign-in again.".to_string()
            }
            Self::MissingCode => {
                "Authorization failed: the provider did not return a code.".to_string()
            }
            Self::AuthorizationDenied { error, description } => match description {
                Some(description) => format!("Authorization denied ({error}): {description}"),
                None => format!("Authorization denied ({error})."),
            },
            Self::TokenEndpointError { status, .. } => format!(
                "The identity provider rejected the token request (HTTP {status}). Check the client settings."
            ),
            Self::NoRefreshToken => {
                "No refresh token is stored. Authorize again to obtain new tokens.".to_string()
            }
            Self::NotAuthorized => "No access token has been obtained yet.".to_string(),
            Self::MalformedToken { segment_count, .. } => {
                format!("The access token is not a JWT ({segment_count} segments).")
            }
            Self::Connection(_) | Self::Timeout(_) | Self::Network(_) => {
                "Could not reach the identity provider. Try again later.".to_string()
            }
            other => format!("Unexpected error: {other}"),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() || source_chain_has_dropped_connection(&error) {
            Self::Connection(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// hyper's text for a peer that closed before sending a full response.
const INCOMPLETE_MESSAGE: &str = "connection closed before message completed";

fn source_chain_has_dropped_connection(error: &(dyn StdError + 'static)) -> bool {
    let mut source = error.source();
    while let Some(cause) = source {
        if is_dropped_connection(cause) {
            return true;
        }
        source = cause.source();
    }
    false
}

fn is_dropped_connection(cause: &(dyn StdError + 'static)) -> bool {
    let dropped_io = cause.downcast_ref::<io::Error>().is_some_and(|io_error| {
        matches!(
            io_error.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
        )
    });
    dropped_io || cause.to_string().contains(INCOMPLETE_MESSAGE)
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
