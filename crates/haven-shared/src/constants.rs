/// Application name
pub const APP_NAME: &str = "Haven";

/// Name of the realtime collection holding chat records
pub const CHAT_NAMESPACE: &str = "community-chat";

/// Minimum time one identity must wait between accepted sends (30 s)
pub const SEND_COOLDOWN_MS: u64 = 30_000;

/// Interval of the cooldown display tick
pub const COOLDOWN_TICK_MS: u64 = 1_000;

/// Maximum message body length, in characters
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Maximum display name length, in characters
pub const MAX_USERNAME_CHARS: usize = 20;

/// Ceiling of the visible-message badge
pub const UNREAD_BADGE_CEILING: usize = 9;

/// Replacement character for redacted words
pub const MASK_CHAR: char = '*';

/// Persistent client storage keys
pub const STORAGE_KEY_USER_ID: &str = "chatUserId";
pub const STORAGE_KEY_USERNAME: &str = "chatUsername";
pub const STORAGE_KEY_USER_TOKEN: &str = "user_token";

/// Prefix of generated user ids
pub const USER_ID_PREFIX: &str = "user_";

/// Prefix of generated display names
pub const USERNAME_PREFIX: &str = "User";

/// SSE event name carrying a full message snapshot
pub const SNAPSHOT_EVENT: &str = "snapshot";

/// Path prefix for dashboard images served from storage
pub const STORAGE_PATH_PREFIX: &str = "/storage/";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Avatar background colours, indexed by a hash of the user id
pub const AVATAR_PALETTE: [&str; 8] = [
    "#6C8EBF", "#82B366", "#D6B656", "#B85450", "#9673A6", "#4FA3A5", "#E07B39", "#7A8B99",
];
