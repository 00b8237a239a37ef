//! Authorization-code grant, callback handling and token storage.

pub mod callback;
pub mod client;
pub mod error;
pub mod pending;
pub mod service;
pub mod store;
pub mod token;

pub use callback::{CallbackHandler, CallbackParams};
pub use client::{build_authorization_url, OAuthClient};
pub use error::AuthError;
pub use pending::{MemoryPendingStore, PendingAuthorization, PendingStore};
pub use service::AuthService;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreConfig};
pub use token::{has_valid_access, TokenRecord};
