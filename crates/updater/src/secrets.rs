//! Secret storage behind the OS keyring, with an in-memory double for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, UpdaterError};

/// Keyring service name used for all secrets.
pub const SERVICE: &str = "itrust-updater";
/// Legacy keyring service for signing seeds (`<service>/<repoId>`).
pub const LEGACY_SIGNING_SERVICE: &str = "itrust-updater-sign";

/// Keyring key for the Nexus username of a repository.
pub fn username_key(repo_id: &str) -> String {
    format!("nexus:{repo_id}:username")
}

/// Keyring key for the Nexus password of a repository.
pub fn password_key(repo_id: &str) -> String {
    format!("nexus:{repo_id}:password")
}

/// Keyring key for the base64 Ed25519 signing seed of a repository.
pub fn seed_key(repo_id: &str) -> String {
    format!("signing:{repo_id}:ed25519-seed-b64")
}

/// Opaque secret storage.
pub trait SecretStore: Send + Sync {
    fn get(&self, service: &str, key: &str) -> Result<String>;
    fn set(&self, service: &str, key: &str, value: &str) -> Result<()>;
    fn delete(&self, service: &str, key: &str) -> Result<()>;
}

/// Secrets held by the operating system keyring.
pub struct KeyringSecretStore;

impl SecretStore for KeyringSecretStore {
    fn get(&self, service: &str, key: &str) -> Result<String> {
        Ok(keyring::Entry::new(service, key)?.get_password()?)
    }

    fn set(&self, service: &str, key: &str, value: &str) -> Result<()> {
        Ok(keyring::Entry::new(service, key)?.set_password(value)?)
    }

    fn delete(&self, service: &str, key: &str) -> Result<()> {
        Ok(keyring::Entry::new(service, key)?.delete_password()?)
    }
}

/// Process-local secret storage for tests.
#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for InMemorySecretStore {
    fn get(&self, service: &str, key: &str) -> Result<String> {
        self.secrets
            .lock()
            .unwrap()
            .get(&format!("{service}:{key}"))
            .cloned()
            .ok_or_else(|| UpdaterError::Secret("secret not found".into()))
    }

    fn set(&self, service: &str, key: &str, value: &str) -> Result<()> {
        self.secrets
            .lock()
            .unwrap()
            .insert(format!("{service}:{key}"), value.to_string());
        Ok(())
    }

    fn delete(&self, service: &str, key: &str) -> Result<()> {
        self.secrets.lock().unwrap().remove(&format!("{service}:{key}"));
        Ok(())
    }
}
