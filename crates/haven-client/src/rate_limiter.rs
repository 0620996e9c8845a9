//! Client-side send cooldown.
//!
//! [`SendCooldown`] remembers the last accepted send in memory and answers
//! whether another one is allowed. [`CooldownTicker`] republishes that answer
//! once per second so a countdown can be displayed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use haven_shared::clock::Clock;
use haven_shared::constants::COOLDOWN_TICK_MS;
use haven_shared::cooldown::{CooldownStatus, CooldownWindow};

#[derive(Debug, Clone, Copy, Default)]
pub struct SendCooldown {
    window: CooldownWindow,
    last_send_at: Option<DateTime<Utc>>,
}

impl SendCooldown {
    pub fn new(window: CooldownWindow) -> Self {
        Self {
            window,
            last_send_at: None,
        }
    }

    pub fn window(&self) -> CooldownWindow {
        self.window
    }

    pub fn last_send_at(&self) -> Option<DateTime<Utc>> {
        self.last_send_at
    }

    pub fn status(&self, now: DateTime<Utc>) -> CooldownStatus {
        self.window.check(self.last_send_at, now)
    }

    /// Start a new window at `at`.
    pub fn record(&mut self, at: DateTime<Utc>) {
        self.last_send_at = Some(at);
    }
}

pub(crate) fn read_status(cooldown: &Mutex<SendCooldown>, clock: &dyn Clock) -> CooldownStatus {
    let now = clock.now();
    cooldown.lock().unwrap_or_else(|e| e.into_inner()).status(now)
}

/// Publishes the cooldown status every tick. Dropping it stops the task.
pub struct CooldownTicker {
    rx: watch::Receiver<CooldownStatus>,
    task: JoinHandle<()>,
}

impl CooldownTicker {
    pub fn spawn(cooldown: Arc<Mutex<SendCooldown>>, clock: Arc<dyn Clock>) -> Self {
        let (tx, rx) = watch::channel(read_status(&cooldown, clock.as_ref()));

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(COOLDOWN_TICK_MS));
            loop {
                interval.tick().await;
                if tx.is_closed() {
                    break;
                }

                let status = read_status(&cooldown, clock.as_ref());
                tx.send_if_modified(|current| {
                    if *current == status {
                        return false;
                    }
                    *current = status;
                    true
                });
            }
            debug!("Cooldown ticker stopped");
        });

        Self { rx, task }
    }

    pub fn current(&self) -> CooldownStatus {
        *self.rx.borrow()
    }

    /// Wait for the next change in status.
    pub async fn changed(&mut self) -> Option<CooldownStatus> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

impl Drop for CooldownTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use haven_shared::clock::ManualClock;

    fn start() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_760_000_000_000).unwrap()
    }

    #[test]
    fn test_fresh_cooldown_allows_send() {
        let cooldown = SendCooldown::default();
        assert_eq!(cooldown.status(start()), CooldownStatus::READY);
        assert!(cooldown.last_send_at().is_none());
    }

    #[test]
    fn test_record_starts_window() {
        let mut cooldown = SendCooldown::default();
        cooldown.record(start());

        let status = cooldown.status(start() + chrono::Duration::seconds(12));
        assert!(!status.allowed);
        assert_eq!(status.remaining_ms, 18_000);
        assert_eq!(status.remaining_secs(), 18);

        assert!(cooldown.status(start() + chrono::Duration::seconds(30)).allowed);
    }

    #[tokio::test]
    async fn test_ticker_reports_window_end() {
        let clock = ManualClock::new(start());
        let cooldown = Arc::new(Mutex::new(SendCooldown::default()));
        cooldown.lock().unwrap().record(start());

        let mut ticker = CooldownTicker::spawn(cooldown, Arc::new(clock.clone()));
        assert_eq!(ticker.current().remaining_ms, 30_000);

        clock.advance(chrono::Duration::seconds(30));
        let status = tokio::time::timeout(Duration::from_secs(3), ticker.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status, CooldownStatus::READY);
    }
}
