//! Credential persistence.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::Credential;
use crate::prelude::*;

/// Where the cached credential lives.
pub trait CredentialStore: Debug + Send + Sync {
    fn load(&self) -> Result<Option<Credential>>;
    fn save(&self, credential: &Credential) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Stores the credential as JSON at a fixed path, normally
/// `~/.eda/token.json`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let credential = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), "Loaded cached credential");
        Ok(Some(credential))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(credential)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %self.path.display(), "Saved credential");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Keeps the credential in memory. Used in tests and for one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credential>> {
        let guard = self
            .credential
            .lock()
            .map_err(|_| EdaError::Internal("credential store lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        let mut guard = self
            .credential
            .lock()
            .map_err(|_| EdaError::Internal("credential store lock poisoned".to_string()))?;
        *guard = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .credential
            .lock()
            .map_err(|_| EdaError::Internal("credential store lock poisoned".to_string()))?;
        *guard = None;
        Ok(())
    }
}
