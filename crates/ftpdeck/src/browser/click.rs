//! Single/double click disambiguation
//!
//! Terminals report raw button presses only. A press arms a pending single
//! click; a second press on the same row inside the window turns into a
//! double click and the pending single is dropped.

use std::time::{Duration, Instant};

use super::selection::Modifiers;

pub const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    Single { index: usize, modifiers: Modifiers },
    Double { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ClickState {
    #[default]
    Idle,
    PendingSingle {
        index: usize,
        modifiers: Modifiers,
        fires_at: Instant,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ClickTracker {
    state: ClickState,
}

impl ClickTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ClickState::PendingSingle { .. })
    }

    /// Register a button press.
    ///
    /// Returns an action that must run now: a double click, or a pending
    /// single click on another row that the new press flushes out.
    pub fn press(&mut self, index: usize, modifiers: Modifiers, now: Instant) -> Option<ClickAction> {
        let fires_at = now + DOUBLE_CLICK_WINDOW;

        match self.state {
            ClickState::PendingSingle {
                index: pending,
                fires_at: deadline,
                ..
            } if pending == index && now < deadline => {
                self.state = ClickState::Idle;
                Some(ClickAction::Double { index })
            }
            ClickState::PendingSingle {
                index: pending,
                modifiers: pending_modifiers,
                ..
            } => {
                self.state = ClickState::PendingSingle {
                    index,
                    modifiers,
                    fires_at,
                };
                Some(ClickAction::Single {
                    index: pending,
                    modifiers: pending_modifiers,
                })
            }
            ClickState::Idle => {
                self.state = ClickState::PendingSingle {
                    index,
                    modifiers,
                    fires_at,
                };
                None
            }
        }
    }

    /// Fire the pending single click once its window has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<ClickAction> {
        match self.state {
            ClickState::PendingSingle {
                index,
                modifiers,
                fires_at,
            } if now >= fires_at => {
                self.state = ClickState::Idle;
                Some(ClickAction::Single { index, modifiers })
            }
            _ => None,
        }
    }

    /// Drop any pending click, e.g. when the listing is replaced
    pub fn reset(&mut self) {
        self.state = ClickState::Idle;
    }
}
