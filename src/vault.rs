use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use tracing::{debug, warn};

use crate::error::{ConsoleError, Result};

const SERVICE: &str = "chatter-console";
/// Name the single auth token is kept under, in the keyring and on disk.
pub const TOKEN_NAME: &str = "api_key";
pub const TOKEN_ENV: &str = "CHATTER_CONSOLE_API_KEY";
pub const DISABLE_KEYRING_ENV: &str = "CHATTER_CONSOLE_DISABLE_KEYRING";

/// Client-local persistent storage for the auth token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn store(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(non_empty(token)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        let guard = self
            .token
            .lock()
            .map_err(|e| ConsoleError::Storage(e.to_string()))?;
        Ok(guard.clone())
    }

    fn store(&self, token: &str) -> Result<()> {
        let mut guard = self
            .token
            .lock()
            .map_err(|e| ConsoleError::Storage(e.to_string()))?;
        *guard = non_empty(token);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .token
            .lock()
            .map_err(|e| ConsoleError::Storage(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// Token kept in a single owner-only file.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File location used when the keyring is not available.
    pub fn in_dir(dir: &Path, name: &str) -> Self {
        let encoded = URL_SAFE_NO_PAD.encode(name.as_bytes());
        Self::new(dir.join("fallback").join(encoded))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(non_empty(&raw)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ConsoleError::Storage(err.to_string())),
        }
    }

    fn store(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConsoleError::Storage(e.to_string()))?;
        }
        std::fs::write(&self.path, token.trim())
            .map_err(|e| ConsoleError::Storage(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| ConsoleError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ConsoleError::Storage(err.to_string())),
        }
    }
}

fn keyring_backend_unavailable(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("dbus")
        || message.contains("secret service")
        || message.contains("keyring")
        || message.contains("no such interface")
        || message.contains("service unknown")
        || message.contains("backend not available")
        || message.contains("platform secure storage failure")
        || message.contains("keychain")
        || message.contains("user interaction is not allowed")
}

fn keyring_disabled() -> bool {
    std::env::var(DISABLE_KEYRING_ENV)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}

fn env_token() -> Option<String> {
    std::env::var(TOKEN_ENV).ok().and_then(|token| non_empty(&token))
}

/// OS keyring entry with a file fallback for headless sessions.
pub struct KeyringTokenStore {
    name: String,
    fallback: FileTokenStore,
    use_keyring: bool,
}

impl KeyringTokenStore {
    pub fn new(secrets_dir: &Path) -> Self {
        Self {
            name: TOKEN_NAME.to_string(),
            fallback: FileTokenStore::in_dir(secrets_dir, TOKEN_NAME),
            use_keyring: !keyring_disabled(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(SERVICE, &self.name).map_err(|e| ConsoleError::Storage(e.to_string()))
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<String>> {
        if let Some(token) = env_token() {
            return Ok(Some(token));
        }
        if !self.use_keyring {
            return self.fallback.load();
        }
        match self.entry()?.get_password() {
            Ok(value) => match non_empty(&value) {
                Some(token) => Ok(Some(token)),
                None => self.fallback.load(),
            },
            Err(keyring::Error::NoEntry) => self.fallback.load(),
            Err(err) if keyring_backend_unavailable(&err.to_string()) => {
                debug!(error = %err, "keyring unavailable, reading token fallback file");
                self.fallback.load()
            }
            Err(err) => Err(ConsoleError::Storage(err.to_string())),
        }
    }

    fn store(&self, token: &str) -> Result<()> {
        if !self.use_keyring {
            return self.fallback.store(token);
        }
        match self.entry()?.set_password(token.trim()) {
            Ok(()) => Ok(()),
            Err(err) if keyring_backend_unavailable(&err.to_string()) => {
                debug!(error = %err, "keyring unavailable, writing token fallback file");
                self.fallback.store(token)
            }
            Err(err) => Err(ConsoleError::Storage(err.to_string())),
        }
    }

    fn clear(&self) -> Result<()> {
        if self.use_keyring {
            match self.entry()?.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(err) if keyring_backend_unavailable(&err.to_string()) => {}
                Err(err) => warn!(error = %err, "failed to delete keyring token"),
            }
        }
        self.fallback.clear()
    }
}

/// The store the binaries use: keyring under the app's secrets directory.
pub fn default_token_store() -> Arc<dyn TokenStore> {
    Arc::new(KeyringTokenStore::new(&crate::runtime_paths::secrets_dir()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_trims_and_clears() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.store("  secret-key \n").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("secret-key"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn blank_token_counts_as_absent() {
        let store = MemoryTokenStore::with_token("   ");
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn file_store_round_trip_and_idempotent_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::in_dir(dir.path(), TOKEN_NAME);
        assert_eq!(store.load().unwrap(), None);

        store.store("abc123").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc123"));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
