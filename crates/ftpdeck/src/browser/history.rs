//! Back/forward history for the remote browser

use super::path::{self, ROOT};

/// Visited paths plus a cursor, with browser-style back/forward semantics.
///
/// The cursor is `None` until the first navigation. Once set it always
/// points inside `entries`.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
    index: Option<usize>,
}

/// Enablement state for the navigation controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavButtons {
    pub back: bool,
    pub forward: bool,
    pub up: bool,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = None;
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn current(&self) -> Option<&str> {
        self.index.map(|i| self.entries[i].as_str())
    }

    /// Record a visit. Forward entries are dropped when visiting from a
    /// non-tip position; revisiting the current entry is not recorded again.
    pub fn visit(&mut self, path: &str) {
        if self.current() == Some(path) {
            return;
        }

        if let Some(idx) = self.index {
            self.entries.truncate(idx + 1);
        }
        self.entries.push(path.to_string());
        self.index = Some(self.entries.len() - 1);
    }

    /// Step back one entry, returning the path to load
    pub fn back(&mut self) -> Option<String> {
        match self.index {
            Some(idx) if idx > 0 => {
                self.index = Some(idx - 1);
                Some(self.entries[idx - 1].clone())
            }
            _ => None,
        }
    }

    /// Step forward one entry, returning the path to load
    pub fn forward(&mut self) -> Option<String> {
        match self.index {
            Some(idx) if idx + 1 < self.entries.len() => {
                self.index = Some(idx + 1);
                Some(self.entries[idx + 1].clone())
            }
            _ => None,
        }
    }

    pub fn can_go_back(&self) -> bool {
        matches!(self.index, Some(idx) if idx > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        matches!(self.index, Some(idx) if idx + 1 < self.entries.len())
    }

    pub fn buttons(&self, current_path: &str) -> NavButtons {
        NavButtons {
            back: self.can_go_back(),
            forward: self.can_go_forward(),
            up: current_path != ROOT,
        }
    }
}

/// Parent directory target for the "up" control, if any
pub fn up_target(current_path: &str) -> Option<String> {
    if current_path == ROOT {
        None
    } else {
        Some(path::parent(current_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_truncates_forward_entries() {
        let mut history = History::new();
        history.visit("/");
        history.visit("/a");
        history.visit("/a/b");

        assert_eq!(history.back().as_deref(), Some("/a"));
        assert_eq!(history.back().as_deref(), Some("/"));

        history.visit("/c");
        assert_eq!(history.entries(), &["/", "/c"]);
        assert_eq!(history.index(), Some(1));
        assert!(!history.can_go_forward());
    }

    #[test]
    fn test_revisit_current_is_not_recorded() {
        let mut history = History::new();
        history.visit("/a");
        history.visit("/a");
        assert_eq!(history.entries().len(), 1);
    }

    #[test]
    fn test_back_forward_stay_in_bounds() {
        let mut history = History::new();
        assert_eq!(history.back(), None);
        assert_eq!(history.forward(), None);

        let paths = ["/", "/x", "/x/y", "/z"];
        for p in paths {
            history.visit(p);
        }

        for _ in 0..10 {
            history.back();
            let idx = history.index().unwrap();
            assert!(idx < history.entries().len());
        }
        assert_eq!(history.index(), Some(0));
        assert!(!history.can_go_back());

        for _ in 0..10 {
            history.forward();
            let idx = history.index().unwrap();
            assert!(idx < history.entries().len());
        }
        assert_eq!(history.index(), Some(3));
        assert!(!history.can_go_forward());
    }

    #[test]
    fn test_buttons_match_boundaries() {
        let mut history = History::new();
        history.visit("/");
        assert_eq!(
            history.buttons("/"),
            NavButtons {
                back: false,
                forward: false,
                up: false
            }
        );

        history.visit("/pub");
        let buttons = history.buttons("/pub");
        assert!(buttons.back);
        assert!(!buttons.forward);
        assert!(buttons.up);

        history.back();
        let buttons = history.buttons("/");
        assert!(!buttons.back);
        assert!(buttons.forward);
        assert!(!buttons.up);
    }

    #[test]
    fn test_up_target() {
        assert_eq!(up_target("/"), None);
        assert_eq!(up_target("/pub").as_deref(), Some("/"));
        assert_eq!(up_target("/pub/data").as_deref(), Some("/pub"));
    }
}
