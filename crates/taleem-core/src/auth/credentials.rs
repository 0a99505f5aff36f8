use keyring::Entry;
use tracing::debug;

use super::store::{SessionStore, StoreError, StoreKey};

const SERVICE_NAME: &str = "taleem-edge";

/// Session store backed by the OS keychain.
///
/// Each key of the session layout is a separate keychain entry under the
/// `taleem-edge` service. The keychain serializes access itself.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a custom service name, e.g. one per backend environment
    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: StoreKey) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, key.as_str())?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for KeyringStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                debug!(key = key.as_str(), error = %e, "Failed to delete keychain entry");
                Err(e.into())
            }
        }
    }
}
