//! The local identity, loaded once per session and injected where needed.
//!
//! The user id is generated on first start and never rewritten. The display
//! name can be edited; edits are trimmed, content-filtered and bounded
//! before they are persisted.

use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use haven_shared::constants::{MAX_USERNAME_CHARS, STORAGE_KEY_USERNAME, STORAGE_KEY_USER_ID};
use haven_shared::filter::ContentFilter;
use haven_shared::types::default_username;
use haven_shared::{validate, ChatError, LocalIdentity, UserId};

use crate::storage::KeyValueStore;

pub struct IdentityContext {
    current: RwLock<LocalIdentity>,
    storage: Arc<dyn KeyValueStore>,
}

impl IdentityContext {
    /// Read `chatUserId` / `chatUsername`, generating and persisting any
    /// value that is missing.
    pub fn load_or_create(storage: Arc<dyn KeyValueStore>) -> Result<Self, ChatError> {
        let user_id = match storage.get(STORAGE_KEY_USER_ID)? {
            Some(id) if !id.trim().is_empty() => UserId::new(id),
            _ => {
                let id = UserId::generate();
                storage.set(STORAGE_KEY_USER_ID, id.as_str())?;
                info!(user = %id, "Generated new chat identity");
                id
            }
        };

        let username = match storage.get(STORAGE_KEY_USERNAME)? {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                let name = default_username();
                storage.set(STORAGE_KEY_USERNAME, &name)?;
                name
            }
        };

        debug!(user = %user_id, username = %username, "Chat identity loaded");

        Ok(Self {
            current: RwLock::new(LocalIdentity { user_id, username }),
            storage,
        })
    }

    /// A copy of the current identity.
    pub fn current(&self) -> LocalIdentity {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn user_id(&self) -> UserId {
        self.current().user_id
    }

    /// Change the display name. Returns the name actually stored.
    pub fn set_username(&self, requested: &str, filter: &ContentFilter) -> Result<String, ChatError> {
        let name = validate::username(requested, MAX_USERNAME_CHARS)?;
        let name = filter.apply(&name);

        self.storage.set(STORAGE_KEY_USERNAME, &name)?;
        self.current
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .username = name.clone();

        info!(username = %name, "Display name updated");
        Ok(name)
    }
}
