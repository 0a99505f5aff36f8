use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::{TokenPair, User};

use super::store::{SessionStore, StoreError, StoreKey};

/// Typed view over the persisted session keys.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Persist a fresh login: both tokens and the profile snapshot.
    pub fn save(&self, tokens: &TokenPair, user: &User) -> Result<(), StoreError> {
        let user_data = serde_json::to_string(user)?;
        self.store.set(StoreKey::AccessToken, &tokens.access)?;
        self.store.set(StoreKey::RefreshToken, &tokens.refresh)?;
        self.store.set(StoreKey::UserData, &user_data)?;
        debug!(user_id = %user.id, "Session saved");
        Ok(())
    }

    /// Cached profile, only when an access token is stored alongside it.
    ///
    /// A profile that no longer parses is treated as absent.
    pub fn user(&self) -> Result<Option<User>, StoreError> {
        if self.store.get(StoreKey::AccessToken)?.is_none() {
            return Ok(None);
        }
        let Some(raw) = self.store.get(StoreKey::UserData)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, "Cached user_data is malformed, ignoring");
                Ok(None)
            }
        }
    }

    pub fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(StoreKey::AccessToken)
    }

    pub fn is_authenticated(&self) -> Result<bool, StoreError> {
        Ok(self.access_token()?.is_some())
    }

    /// Remove tokens and the cached profile
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.clear()
    }
}
