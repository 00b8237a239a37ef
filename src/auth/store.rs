use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::TokenRecord;

const TOKEN_FILE_VERSION: u32 = 1;

/// Storage abstraction holding the latest token record per session.
pub trait TokenStore: Send + Sync {
    fn get(&self, session: &str) -> Result<Option<TokenRecord>, AuthError>;
    fn set(&self, session: &str, record: &TokenRecord) -> Result<(), AuthError>;
    /// Removes the record. Clearing an empty session is not an error.
    fn clear(&self, session: &str) -> Result<(), AuthError>;
}

/// Configuration for file-backed token storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_desk_dir().join("tokens")
    }
}

/// File-backed token store writing one TOML file per session.
///
/// # Example
/// ```no_run
/// use oauth_desk::auth::{FileTokenStore, TokenRecord, TokenStore};
/// use chrono::Utc;
///
/// let store = FileTokenStore::new_default();
/// let record = TokenRecord {
///     access_token: "access".to_string(),
///     refresh_token: Some("refresh".to_string()),
///     id_token: None,
///     expires_at: None,
///     scope: "openid".to_string(),
///     token_type: "Bearer".to_string(),
///     obtained_at: Utc::now(),
/// };
/// store.set("default", &record)?;
/// # Ok::<(), oauth_desk::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn new_default() -> Self {
        Self {
            base_dir: TokenStoreConfig::default_dir(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn token_path(&self, session: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.toml", session_file_stem(session)))
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, session: &str) -> Result<Option<TokenRecord>, AuthError> {
        let path = self.token_path(session);
        let Some(raw) = read_if_present(&path)? else {
            return Ok(None);
        };
        let file: TokenFile = toml::from_str(&raw)?;
        if file.version != TOKEN_FILE_VERSION {
            return Err(AuthError::Serialization(format!(
                "{}: token file version {} is not supported",
                path.display(),
                file.version
            )));
        }
        Ok(Some(file.token))
    }

    fn set(&self, session: &str, record: &TokenRecord) -> Result<(), AuthError> {
        let path = self.token_path(session);
        let contents = toml::to_string(&TokenFile {
            version: TOKEN_FILE_VERSION,
            session: session.to_string(),
            saved_at: Utc::now(),
            token: record.clone(),
        })?;
        replace_private_file(&path, contents.as_bytes())?;
        tracing::debug!(path = %path.display(), "token record written");
        Ok(())
    }

    fn clear(&self, session: &str) -> Result<(), AuthError> {
        let path = self.token_path(session);
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != io::ErrorKind::NotFound {
                return Err(err.into());
            }
        }
        Ok(())
    }
}

/// Process-local token store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: Mutex<HashMap<String, TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, TokenRecord>>, AuthError> {
        self.records
            .lock()
            .map_err(|_| AuthError::Io("token store lock poisoned".to_string()))
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, session: &str) -> Result<Option<TokenRecord>, AuthError> {
        Ok(self.lock()?.get(session).cloned())
    }

    fn set(&self, session: &str, record: &TokenRecord) -> Result<(), AuthError> {
        self.lock()?.insert(session.to_string(), record.clone());
        Ok(())
    }

    fn clear(&self, session: &str) -> Result<(), AuthError> {
        self.lock()?.remove(session);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    version: u32,
    session: String,
    saved_at: DateTime<Utc>,
    token: TokenRecord,
}

pub(crate) fn default_desk_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".oauth-desk"))
        .unwrap_or_else(|| PathBuf::from(".oauth-desk"))
}

fn read_if_present(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Writes `data` to a sibling temp file (mode 0600 on unix) and renames it
/// over `path`, so readers see either the old record or the new one.
fn replace_private_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let temp_path = dir.join(format!(".tmp-{}", uuid::Uuid::new_v4().simple()));

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let written = options.open(&temp_path).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    let renamed = written.and_then(|()| fs::rename(&temp_path, path));
    if renamed.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    renamed?;

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

/// Maps a session key onto a distinct file stem.
///
/// `[a-z0-9-]` bytes are kept and every other byte becomes `_xx` (lowercase
/// hex), so two keys share a file only if they are equal. The empty key is
/// `_`, which no escape produces.
fn session_file_stem(session: &str) -> String {
    if session.is_empty() {
        return "_".to_string();
    }
    let mut stem = String::with_capacity(session.len());
    for byte in session.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'-' => stem.push(char::from(byte)),
            other => stem.push_str(&format!("_{other:02x}")),
        }
    }
    stem
}
