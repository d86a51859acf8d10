use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_millis(2800);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

/// Single-slot, auto-expiring status message.
///
/// The hide timer is the `hide_at` deadline: `show` overwrites it, which is
/// what cancels a previous message's pending hide. Whoever owns the channel
/// waits on `deadline()` and calls `expire`.
#[derive(Debug, Default)]
pub struct NotificationChannel {
    live: Option<Notification>,
    hide_at: Option<Instant>,
}

impl NotificationChannel {
    pub fn show(&mut self, kind: NotificationKind, message: impl Into<String>, duration: Duration) {
        let message = message.into();
        tracing::debug!(?kind, %message, "notification");
        self.hide_at = Some(Instant::now() + duration);
        self.live = Some(Notification {
            kind,
            message,
            duration,
        });
    }

    pub fn current(&self) -> Option<&Notification> {
        self.live.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.hide_at
    }

    /// Clear the live message if its deadline has passed at `now`.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.hide_at {
            Some(at) if now >= at => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.live = None;
        self.hide_at = None;
    }
}
