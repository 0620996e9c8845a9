//! The per-identity send cooldown rule.
//!
//! Used verbatim by the client (to reject sends locally and drive the
//! countdown display) and by the store (to enforce the window for callers
//! that bypass the client).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::SEND_COOLDOWN_MS;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CooldownStatus {
    pub allowed: bool,
    pub remaining_ms: u64,
}

impl CooldownStatus {
    pub const READY: CooldownStatus = CooldownStatus {
        allowed: true,
        remaining_ms: 0,
    };

    /// Whole seconds left, rounded up, for countdown display.
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_ms.div_ceil(1000)
    }
}

/// Fixed-length cooldown window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownWindow {
    window_ms: u64,
}

impl CooldownWindow {
    pub fn from_millis(window_ms: u64) -> Self {
        Self { window_ms }
    }

    pub fn as_millis(&self) -> u64 {
        self.window_ms
    }

    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.window_ms as i64)
    }

    /// `remaining = max(0, window - (now - last))`; allowed once it hits 0.
    ///
    /// A `now` earlier than `last_send_at` (clock skew) counts as zero
    /// elapsed time, so the full window remains.
    pub fn check(&self, last_send_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CooldownStatus {
        let Some(last) = last_send_at else {
            return CooldownStatus::READY;
        };

        let elapsed_ms = (now - last).num_milliseconds().max(0) as u64;
        let remaining_ms = self.window_ms.saturating_sub(elapsed_ms);

        CooldownStatus {
            allowed: remaining_ms == 0,
            remaining_ms,
        }
    }
}

impl Default for CooldownWindow {
    fn default() -> Self {
        Self::from_millis(SEND_COOLDOWN_MS)
    }
}

/// Evaluate the default 30 s window.
pub fn can_send(last_send_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CooldownStatus {
    CooldownWindow::default().check(last_send_at, now)
}
