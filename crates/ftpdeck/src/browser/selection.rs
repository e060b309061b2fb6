//! Selection set for the remote browser
//!
//! Entries are keyed by name, never by row position, so re-sorting or
//! switching view mode leaves the selection untouched.

use serde::Serialize;

use super::listing::DirEntry;
use super::path;

/// A selected listing entry, with its full remote path resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedItem {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
}

impl SelectedItem {
    pub fn from_entry(entry: &DirEntry, dir: &str) -> Self {
        Self {
            name: entry.name.clone(),
            path: path::join(dir, &entry.name),
            is_directory: entry.is_directory,
            size: entry.size,
        }
    }
}

/// Modifier keys held during a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Ctrl on most platforms, Cmd on macOS
    pub toggle: bool,
    pub range: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        toggle: false,
        range: false,
    };
    pub const TOGGLE: Modifiers = Modifiers {
        toggle: true,
        range: false,
    };
    pub const RANGE: Modifiers = Modifiers {
        toggle: false,
        range: true,
    };
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    items: Vec<SelectedItem>,
    /// Name of the entry that anchors shift-click ranges
    anchor: Option<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[SelectedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|item| item.name == name)
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn toggle(&mut self, entry: &DirEntry, dir: &str) {
        if let Some(pos) = self.items.iter().position(|item| item.name == entry.name) {
            self.items.remove(pos);
        } else {
            self.items.push(SelectedItem::from_entry(entry, dir));
        }
    }

    pub fn select_all<'a, I>(&mut self, entries: I, dir: &str)
    where
        I: IntoIterator<Item = &'a DirEntry>,
    {
        self.items = entries
            .into_iter()
            .map(|entry| SelectedItem::from_entry(entry, dir))
            .collect();
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.anchor = None;
    }

    /// Apply a single click on `display[index]`.
    ///
    /// `display` is the listing in its current on-screen order; ranges are
    /// contiguous in that order.
    pub fn click(&mut self, display: &[&DirEntry], index: usize, modifiers: Modifiers, dir: &str) {
        let Some(entry) = display.get(index) else {
            return;
        };

        if modifiers.range {
            let anchor_index = self
                .anchor
                .as_deref()
                .and_then(|name| display.iter().position(|e| e.name == name));

            if let Some(anchor_index) = anchor_index {
                let (start, end) = if anchor_index <= index {
                    (anchor_index, index)
                } else {
                    (index, anchor_index)
                };
                self.items = display[start..=end]
                    .iter()
                    .map(|e| SelectedItem::from_entry(e, dir))
                    .collect();
                // The anchor stays put so the range can be adjusted
                return;
            }
        }

        if !modifiers.toggle {
            self.items.clear();
        }
        self.toggle(entry, dir);
        self.anchor = Some(entry.name.clone());
    }

    /// Right click keeps an existing selection that already covers the entry
    pub fn context_click(&mut self, entry: &DirEntry, dir: &str) {
        if !self.contains(&entry.name) {
            self.items.clear();
            self.toggle(entry, dir);
            self.anchor = Some(entry.name.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Vec<DirEntry> {
        vec![
            DirEntry::directory("docs"),
            DirEntry::file("a.txt", 10),
            DirEntry::file("b.txt", 20),
            DirEntry::file("c.txt", 30),
        ]
    }

    fn names(selection: &Selection) -> Vec<&str> {
        selection.items().iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn test_toggle_keyed_by_name() {
        let entries = listing();
        let mut selection = Selection::new();
        selection.toggle(&entries[1], "/pub");
        assert_eq!(selection.items()[0].path, "/pub/a.txt");

        selection.toggle(&entries[1], "/pub");
        assert!(selection.is_empty());
    }

    #[test]
    fn test_plain_click_is_exclusive() {
        let entries = listing();
        let display: Vec<&DirEntry> = entries.iter().collect();
        let mut selection = Selection::new();

        selection.click(&display, 1, Modifiers::NONE, "/");
        selection.click(&display, 2, Modifiers::NONE, "/");
        assert_eq!(names(&selection), vec!["b.txt"]);
    }

    #[test]
    fn test_toggle_click_is_additive() {
        let entries = listing();
        let display: Vec<&DirEntry> = entries.iter().collect();
        let mut selection = Selection::new();

        selection.click(&display, 1, Modifiers::NONE, "/");
        selection.click(&display, 3, Modifiers::TOGGLE, "/");
        assert_eq!(names(&selection), vec!["a.txt", "c.txt"]);

        selection.click(&display, 1, Modifiers::TOGGLE, "/");
        assert_eq!(names(&selection), vec!["c.txt"]);
    }

    #[test]
    fn test_range_click_selects_contiguous_span() {
        let entries = listing();
        let display: Vec<&DirEntry> = entries.iter().collect();
        let mut selection = Selection::new();

        selection.click(&display, 3, Modifiers::NONE, "/");
        selection.click(&display, 1, Modifiers::RANGE, "/");
        assert_eq!(names(&selection), vec!["a.txt", "b.txt", "c.txt"]);

        // Anchor is kept, so a second shift-click re-spans from it
        selection.click(&display, 2, Modifiers::RANGE, "/");
        assert_eq!(names(&selection), vec!["b.txt", "c.txt"]);
    }

    #[test]
    fn test_range_click_without_anchor_acts_as_plain_click() {
        let entries = listing();
        let display: Vec<&DirEntry> = entries.iter().collect();
        let mut selection = Selection::new();

        selection.click(&display, 2, Modifiers::RANGE, "/");
        assert_eq!(names(&selection), vec!["b.txt"]);
        assert_eq!(selection.anchor(), Some("b.txt"));
    }

    #[test]
    fn test_context_click() {
        let entries = listing();
        let mut selection = Selection::new();
        selection.select_all(&entries, "/");

        selection.context_click(&entries[2], "/");
        assert_eq!(selection.len(), 4);

        selection.toggle(&entries[2], "/");
        selection.context_click(&entries[2], "/");
        assert_eq!(names(&selection), vec!["b.txt"]);
    }

    #[test]
    fn test_selection_survives_reordering() {
        let entries = listing();
        let mut selection = Selection::new();
        selection.toggle(&entries[2], "/");

        let reversed: Vec<&DirEntry> = entries.iter().rev().collect();
        assert!(reversed
            .iter()
            .filter(|e| selection.contains(&e.name))
            .all(|e| e.name == "b.txt"));
        assert_eq!(selection.len(), 1);
    }
}
