//! oauth-desk: a small OAuth2 authorization-code client.
//!
//! Obtains an access token from a single identity provider, keeps it (with its
//! refresh token) in a [`TokenStore`](auth::TokenStore), refreshes it on
//! demand and decodes it for diagnostics. The HTTP front end and the CLI are
//! thin adapters over [`AuthService`](auth::AuthService).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use oauth_desk::auth::{AuthService, FileTokenStore, MemoryPendingStore, OAuthClient};
//! use oauth_desk::config::{ClientConfig, EnvSecretSource};
//! use oauth_desk::status::StatusPresenter;
//!
//! # async fn example() -> oauth_desk::error::Result<()> {
//! let config = ClientConfig::from_secrets(&EnvSecretSource::new())?;
//! let service = AuthService::new(
//!     Arc::new(OAuthClient::new(config)?),
//!     Arc::new(FileTokenStore::new_default()),
//!     Arc::new(MemoryPendingStore::new()),
//! );
//! println!("{}", service.status("default", &StatusPresenter::default()).await?);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod inspect;
pub mod status;
pub mod util;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;
