use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{USERNAME_PREFIX, USER_ID_PREFIX};

// Opaque identity of one client installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id of the form `user_<32 hex chars>`.
    pub fn generate() -> Self {
        Self(format!("{USER_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sum of the id's character codes, used for avatar selection.
    pub fn char_code_sum(&self) -> u64 {
        self.0.chars().map(|c| c as u64).sum()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Store-assigned message key. UUIDv7, so ids sort in insertion order.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The durable identity of the local installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalIdentity {
    pub user_id: UserId,
    pub username: String,
}

impl LocalIdentity {
    /// A brand-new identity with a random id and a `User<NNNN>` name.
    pub fn generate() -> Self {
        Self {
            user_id: UserId::generate(),
            username: default_username(),
        }
    }

    pub fn owns(&self, owner: &UserId) -> bool {
        &self.user_id == owner
    }
}

/// `User` followed by a random four-digit number.
pub fn default_username() -> String {
    let n: u16 = rand::thread_rng().gen_range(1000..10000);
    format!("{USERNAME_PREFIX}{n}")
}
