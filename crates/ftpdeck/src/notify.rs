//! Transient notifications shown over the current view

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::style::Color;

pub const NOTIFICATION_TTL: Duration = Duration::from_secs(5);
const MAX_VISIBLE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn title(&self) -> &'static str {
        match self {
            Level::Success => "Done",
            Level::Info => "Info",
            Level::Warning => "Warning",
            Level::Error => "Error",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Level::Success => Color::Green,
            Level::Info => Color::Cyan,
            Level::Warning => Color::Yellow,
            Level::Error => Color::Red,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    pub created: Instant,
}

/// Queue of notifications, oldest first
#[derive(Debug)]
pub struct Notifications {
    items: VecDeque<Notification>,
    ttl: Duration,
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(NOTIFICATION_TTL)
    }
}

impl Notifications {
    pub fn new(ttl: Duration) -> Self {
        Self {
            items: VecDeque::new(),
            ttl,
        }
    }

    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        self.push_at(level, message, Instant::now());
    }

    pub fn push_at(&mut self, level: Level, message: impl Into<String>, now: Instant) {
        let message = message.into();
        match level {
            Level::Error => tracing::error!(%message, "notification"),
            Level::Warning => tracing::warn!(%message, "notification"),
            _ => tracing::info!(%message, "notification"),
        }
        self.items.push_back(Notification {
            level,
            message,
            created: now,
        });
        while self.items.len() > MAX_VISIBLE {
            self.items.pop_front();
        }
    }

    /// Drop expired notifications
    pub fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.items
            .retain(|n| now.saturating_duration_since(n.created) < ttl);
    }

    pub fn dismiss_all(&mut self) {
        self.items.clear();
    }

    pub fn visible(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry() {
        let mut notes = Notifications::new(Duration::from_secs(5));
        let t0 = Instant::now();
        notes.push_at(Level::Info, "one", t0);
        notes.push_at(Level::Error, "two", t0 + Duration::from_secs(3));

        notes.prune(t0 + Duration::from_secs(6));
        let left: Vec<&str> = notes.visible().map(|n| n.message.as_str()).collect();
        assert_eq!(left, vec!["two"]);

        notes.prune(t0 + Duration::from_secs(9));
        assert!(notes.is_empty());
    }

    #[test]
    fn test_oldest_dropped_when_full() {
        let mut notes = Notifications::default();
        for i in 0..6 {
            notes.push(Level::Success, format!("n{}", i));
        }
        assert_eq!(notes.len(), MAX_VISIBLE);
        assert_eq!(notes.visible().next().unwrap().message, "n2");
    }
}
