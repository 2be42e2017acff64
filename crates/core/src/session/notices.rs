use std::time::{Duration, Instant};

use crate::shared::constants::NOTICE_TTL_MS;

/// A transient user-visible banner.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub message: String,
    pub raised_at: Instant,
    pub expires_at: Instant,
}

impl Notice {
    pub fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Banners raised during a session, each dismissed after a fixed lifetime.
pub struct NoticeBoard {
    ttl: Duration,
    notices: Vec<Notice>,
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            notices: Vec::new(),
        }
    }

    /// Adds a banner, dropping any that have already expired.
    pub fn raise(&mut self, message: impl Into<String>, now: Instant) -> &Notice {
        self.notices.retain(|n| n.is_live(now));
        self.notices.push(Notice {
            message: message.into(),
            raised_at: now,
            expires_at: now + self.ttl,
        });
        &self.notices[self.notices.len() - 1]
    }

    /// Drops expired banners and returns the ones still showing, oldest
    /// first.
    pub fn active(&mut self, now: Instant) -> &[Notice] {
        self.notices.retain(|n| n.is_live(now));
        &self.notices
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(Duration::from_millis(NOTICE_TTL_MS))
    }
}
