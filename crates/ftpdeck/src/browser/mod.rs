//! Remote file browser state
//!
//! `Browser` owns everything the browser view needs for one session: chosen
//! site, current path, history, the last listing, selection, sort and view
//! mode. Network calls happen outside; the browser hands out a `LoadTicket`
//! for every listing it wants and accepts results back through
//! [`Browser::finish_load`], which drops results that no longer match what
//! is on screen.

pub mod click;
pub mod history;
pub mod listing;
pub mod path;
pub mod selection;

use std::time::Instant;

use tracing::debug;

use crate::api::{ApiError, ErrorKind};
use click::{ClickAction, ClickTracker};
use history::{History, NavButtons};
pub use listing::{DirEntry, SortDirection, SortField, SortState, ViewMode};
use path::{Crumb, ROOT};
pub use selection::{Modifiers, SelectedItem, Selection};

/// Identifies one directory load request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub seq: u64,
    pub site_id: String,
    pub path: String,
}

/// Why a directory load failed, in user-facing form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl LoadFailure {
    pub fn new(kind: ErrorKind, detail: &str) -> Self {
        let message = match kind {
            ErrorKind::Connection => {
                "FTP connection failed, check the site configuration".to_string()
            }
            ErrorKind::Authentication => {
                "FTP authentication failed, check the username and password".to_string()
            }
            ErrorKind::Permission => "Permission denied for this directory".to_string(),
            ErrorKind::NotFound => format!("Directory not found: {}", detail),
            ErrorKind::Validation | ErrorKind::Other => {
                format!("Failed to load directory: {}", detail)
            }
        };
        Self { kind, message }
    }
}

impl From<&ApiError> for LoadFailure {
    fn from(err: &ApiError) -> Self {
        LoadFailure::new(err.kind(), &err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    /// No site chosen yet
    #[default]
    Idle,
    Loading(LoadTicket),
    Ready,
    Failed(LoadFailure),
}

/// Outcome of handing a load result back to the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadApplied {
    Applied,
    Stale,
}

#[derive(Debug, Clone, Default)]
pub struct Browser {
    site_id: Option<String>,
    current_path: String,
    history: History,
    listing: Vec<DirEntry>,
    /// Display order as indices into `listing`
    order: Vec<usize>,
    selection: Selection,
    sort: SortState,
    view_mode: ViewMode,
    load: LoadState,
    next_seq: u64,
    clicks: ClickTracker,
    /// Highlighted display row for keyboard navigation
    cursor: usize,
}

impl Browser {
    pub fn new(sort_field: SortField, view_mode: ViewMode) -> Self {
        Self {
            current_path: ROOT.to_string(),
            sort: SortState::new(sort_field),
            view_mode,
            ..Default::default()
        }
    }

    pub fn site_id(&self) -> Option<&str> {
        self.site_id.as_deref()
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn listing(&self) -> &[DirEntry] {
        &self.listing
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.load, LoadState::Loading(_))
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn buttons(&self) -> NavButtons {
        self.history.buttons(&self.current_path)
    }

    pub fn breadcrumbs(&self) -> Vec<Crumb> {
        path::breadcrumbs(&self.current_path)
    }

    pub fn status_summary(&self) -> String {
        listing::status_summary(&self.listing, self.selection.len())
    }

    /// The listing in on-screen order
    pub fn display(&self) -> Vec<&DirEntry> {
        self.order.iter().map(|&i| &self.listing[i]).collect()
    }

    pub fn entry_at(&self, display_index: usize) -> Option<&DirEntry> {
        self.order.get(display_index).map(|&i| &self.listing[i])
    }

    pub fn is_selected(&self, entry: &DirEntry) -> bool {
        self.selection.contains(&entry.name)
    }

    /// Switch to another site and start browsing it at root
    pub fn choose_site(&mut self, site_id: &str) -> LoadTicket {
        self.site_id = Some(site_id.to_string());
        self.history.clear();
        self.current_path = ROOT.to_string();
        self.set_listing(Vec::new());
        self.selection.clear();
        self.navigate_inner(ROOT)
    }

    /// Visit `target`, recording it in history.
    ///
    /// Returns `None` when no site has been chosen yet.
    pub fn navigate_to(&mut self, target: &str) -> Option<LoadTicket> {
        self.site_id.as_ref()?;
        Some(self.navigate_inner(target))
    }

    fn navigate_inner(&mut self, target: &str) -> LoadTicket {
        let target = path::normalize(target);
        self.history.visit(&target);
        self.enter(target)
    }

    /// Address bar submission; blank input is ignored
    pub fn submit_address(&mut self, input: &str) -> Option<LoadTicket> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        self.navigate_to(input)
    }

    pub fn back(&mut self) -> Option<LoadTicket> {
        self.site_id.as_ref()?;
        let target = self.history.back()?;
        Some(self.enter(target))
    }

    pub fn forward(&mut self) -> Option<LoadTicket> {
        self.site_id.as_ref()?;
        let target = self.history.forward()?;
        Some(self.enter(target))
    }

    pub fn up(&mut self) -> Option<LoadTicket> {
        let target = history::up_target(&self.current_path)?;
        self.navigate_to(&target)
    }

    /// Reload the current directory without touching history
    pub fn refresh(&mut self) -> Option<LoadTicket> {
        let site_id = self.site_id.clone()?;
        Some(self.issue(site_id, self.current_path.clone()))
    }

    pub fn retry(&mut self) -> Option<LoadTicket> {
        self.refresh()
    }

    /// Move to a new directory: the old listing and selection go away
    /// immediately so nothing is ever joined against the wrong path.
    fn enter(&mut self, target: String) -> LoadTicket {
        let site_id = self.site_id.clone().unwrap_or_default();
        if target != self.current_path || !matches!(self.load, LoadState::Ready) {
            self.set_listing(Vec::new());
            self.selection.clear();
        }
        self.current_path = target.clone();
        self.issue(site_id, target)
    }

    fn issue(&mut self, site_id: String, path: String) -> LoadTicket {
        self.next_seq += 1;
        let ticket = LoadTicket {
            seq: self.next_seq,
            site_id,
            path,
        };
        debug!(seq = ticket.seq, path = %ticket.path, "issuing directory load");
        self.load = LoadState::Loading(ticket.clone());
        ticket
    }

    /// Hand a finished load back.
    ///
    /// Only the result for the ticket the browser is waiting on is applied;
    /// anything else, even an older load of the same path, is discarded.
    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<Vec<DirEntry>, LoadFailure>,
    ) -> LoadApplied {
        let awaited = matches!(&self.load, LoadState::Loading(pending) if pending == ticket);
        if !awaited {
            debug!(seq = ticket.seq, path = %ticket.path, "discarding stale directory load");
            return LoadApplied::Stale;
        }

        match result {
            Ok(entries) => {
                // Refresh of the same directory keeps whatever is still present
                let previous = std::mem::take(&mut self.selection);
                self.set_listing(entries);
                for item in previous.items() {
                    if let Some(entry) = self.listing.iter().find(|e| e.name == item.name) {
                        self.selection.toggle(entry, &self.current_path);
                    }
                }
                self.load = LoadState::Ready;
            }
            Err(failure) => {
                self.load = LoadState::Failed(failure);
            }
        }
        LoadApplied::Applied
    }

    fn set_listing(&mut self, entries: Vec<DirEntry>) {
        self.listing = entries;
        self.resort();
        self.cursor = 0;
    }

    /// Rebuild the display order. A pending single click refers to a display
    /// row, so it is dropped along with the old order.
    fn resort(&mut self) {
        self.order = listing::sorted_order(&self.listing, self.sort);
        self.clicks.reset();
    }

    pub fn choose_sort(&mut self, field: SortField) {
        self.sort.choose(field);
        self.resort();
    }

    pub fn toggle_sort_direction(&mut self) {
        self.sort.toggle_direction();
        self.resort();
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn toggle_view_mode(&mut self) {
        self.view_mode = self.view_mode.toggle();
    }

    pub fn select_all(&mut self) {
        let entries: Vec<&DirEntry> = self.order.iter().map(|&i| &self.listing[i]).collect();
        self.selection.select_all(entries, &self.current_path);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Toggle the entry at a display row without clearing others
    pub fn toggle_at(&mut self, display_index: usize) {
        self.click(display_index, Modifiers::TOGGLE);
    }

    pub fn click(&mut self, display_index: usize, modifiers: Modifiers) {
        let display: Vec<&DirEntry> = self.order.iter().map(|&i| &self.listing[i]).collect();
        self.selection
            .click(&display, display_index, modifiers, &self.current_path);
        if display_index < self.order.len() {
            self.cursor = display_index;
        }
    }

    pub fn context_click(&mut self, display_index: usize) {
        if let Some(&i) = self.order.get(display_index) {
            let entry = self.listing[i].clone();
            self.selection.context_click(&entry, &self.current_path);
            self.cursor = display_index;
        }
    }

    /// Open the entry at a display row; only directories navigate
    pub fn activate(&mut self, display_index: usize) -> Option<LoadTicket> {
        let entry = self.entry_at(display_index)?;
        if !entry.is_directory {
            return None;
        }
        let target = path::join(&self.current_path, &entry.name);
        self.navigate_to(&target)
    }

    /// Raw mouse press on a display row
    pub fn press(
        &mut self,
        display_index: usize,
        modifiers: Modifiers,
        now: Instant,
    ) -> Option<LoadTicket> {
        let action = self.clicks.press(display_index, modifiers, now)?;
        self.run_click(action)
    }

    /// Fire a pending single click whose double-click window has passed
    pub fn poll_clicks(&mut self, now: Instant) -> Option<LoadTicket> {
        let action = self.clicks.poll(now)?;
        self.run_click(action)
    }

    fn run_click(&mut self, action: ClickAction) -> Option<LoadTicket> {
        match action {
            ClickAction::Single { index, modifiers } => {
                self.click(index, modifiers);
                None
            }
            ClickAction::Double { index } => {
                self.cursor = index;
                self.activate(index)
            }
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        if self.order.is_empty() {
            self.cursor = 0;
            return;
        }
        let max = self.order.len() as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, max) as usize;
    }

    pub fn cursor_top(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_bottom(&mut self) {
        self.cursor = self.order.len().saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loaded(browser: &mut Browser, ticket: &LoadTicket, entries: Vec<DirEntry>) {
        assert_eq!(browser.finish_load(ticket, Ok(entries)), LoadApplied::Applied);
    }

    fn sample() -> Vec<DirEntry> {
        vec![
            DirEntry::file("readme.txt", 12),
            DirEntry::directory("pub"),
            DirEntry::file("file10.bin", 100),
            DirEntry::file("file2.bin", 200),
        ]
    }

    fn display_names(browser: &Browser) -> Vec<String> {
        browser.display().iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn test_navigation_requires_site() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        assert!(browser.navigate_to("/pub").is_none());
        assert!(browser.refresh().is_none());
        assert_eq!(browser.load_state(), &LoadState::Idle);
    }

    #[test]
    fn test_choose_site_loads_root() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        let ticket = browser.choose_site("site-1");
        assert_eq!(ticket.path, "/");
        assert_eq!(ticket.site_id, "site-1");
        assert!(browser.is_loading());

        loaded(&mut browser, &ticket, sample());
        assert_eq!(
            display_names(&browser),
            vec!["pub", "file2.bin", "file10.bin", "readme.txt"]
        );
        assert_eq!(browser.status_summary(), "1 folders, 3 files");
    }

    #[test]
    fn test_double_click_directory_navigates() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        let ticket = browser.choose_site("s");
        loaded(&mut browser, &ticket, sample());

        // "pub" is at display row 0
        let ticket = browser.activate(0).unwrap();
        assert_eq!(ticket.path, "/pub");
        assert_eq!(browser.current_path(), "/pub");
        assert!(browser.buttons().back);
        assert!(browser.buttons().up);

        // Files do not navigate
        loaded(&mut browser, &ticket, vec![DirEntry::file("x.txt", 1)]);
        assert!(browser.activate(0).is_none());
    }

    #[test]
    fn test_back_forward_up() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        browser.choose_site("s");
        browser.navigate_to("/a").unwrap();
        browser.navigate_to("/a/b").unwrap();

        assert_eq!(browser.back().unwrap().path, "/a");
        assert_eq!(browser.history().entries().len(), 3);
        assert_eq!(browser.forward().unwrap().path, "/a/b");
        assert!(browser.forward().is_none());

        assert_eq!(browser.up().unwrap().path, "/a");
        // Up is a regular visit and lands in history
        assert_eq!(browser.history().entries(), &["/", "/a", "/a/b", "/a"]);

        browser.navigate_to("/").unwrap();
        assert!(browser.up().is_none());
        assert!(!browser.buttons().up);
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        browser.choose_site("s");

        let to_a = browser.navigate_to("/a").unwrap();
        let to_b = browser.navigate_to("/b").unwrap();

        loaded(&mut browser, &to_b, vec![DirEntry::file("in-b.txt", 1)]);
        let outcome = browser.finish_load(&to_a, Ok(vec![DirEntry::file("in-a.txt", 1)]));

        assert_eq!(outcome, LoadApplied::Stale);
        assert_eq!(browser.current_path(), "/b");
        assert_eq!(display_names(&browser), vec!["in-b.txt"]);
    }

    #[test]
    fn test_older_refresh_of_same_path_is_discarded() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        let first = browser.choose_site("s");
        let second = browser.refresh().unwrap();

        loaded(&mut browser, &second, vec![DirEntry::file("new.txt", 1)]);
        assert_eq!(
            browser.finish_load(&first, Ok(vec![DirEntry::file("old.txt", 1)])),
            LoadApplied::Stale
        );
        assert_eq!(display_names(&browser), vec!["new.txt"]);
    }

    #[test]
    fn test_older_load_of_revisited_path_is_discarded() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        browser.choose_site("s");
        let first_a = browser.navigate_to("/a").unwrap();
        browser.navigate_to("/b").unwrap();
        let second_a = browser.back().unwrap();
        assert_eq!(second_a.path, "/a");

        let early = browser.finish_load(
            &first_a,
            Err(LoadFailure::new(ErrorKind::Connection, "timed out")),
        );
        assert_eq!(early, LoadApplied::Stale);
        assert_eq!(browser.load_state(), &LoadState::Loading(second_a.clone()));

        loaded(&mut browser, &second_a, vec![DirEntry::file("in-a.txt", 1)]);
        assert_eq!(display_names(&browser), vec!["in-a.txt"]);
    }

    #[test]
    fn test_response_for_previous_site_is_discarded() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        let old = browser.choose_site("one");
        browser.choose_site("two");
        assert_eq!(browser.finish_load(&old, Ok(sample())), LoadApplied::Stale);
        assert!(browser.listing().is_empty());
    }

    #[test]
    fn test_failure_then_retry() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        let ticket = browser.choose_site("s");
        let failure = LoadFailure::new(ErrorKind::Permission, "550");
        assert_eq!(
            browser.finish_load(&ticket, Err(failure.clone())),
            LoadApplied::Applied
        );
        assert_eq!(browser.load_state(), &LoadState::Failed(failure));

        let retry = browser.retry().unwrap();
        assert_eq!(retry.path, "/");
        assert!(browser.is_loading());
    }

    #[test]
    fn test_failure_messages_are_distinct() {
        let kinds = [
            ErrorKind::Connection,
            ErrorKind::Authentication,
            ErrorKind::Permission,
            ErrorKind::Other,
        ];
        let messages: std::collections::HashSet<String> = kinds
            .iter()
            .map(|k| LoadFailure::new(*k, "boom").message)
            .collect();
        assert_eq!(messages.len(), kinds.len());
        assert!(LoadFailure::new(ErrorKind::Other, "boom")
            .message
            .ends_with("boom"));
    }

    #[test]
    fn test_backend_failures_get_their_own_message() {
        let connection =
            ApiError::from_response(500, "{\"error\": \"连接失败: timed out\"}".as_bytes());
        assert_eq!(
            LoadFailure::from(&connection).message,
            "FTP connection failed, check the site configuration"
        );

        let auth = ApiError::from_response(500, br#"{"error": "Authentication failed"}"#);
        assert_eq!(LoadFailure::from(&auth).kind, ErrorKind::Authentication);

        let denied = ApiError::from_response(500, br#"{"error": "Permission denied"}"#);
        assert_eq!(
            LoadFailure::from(&denied).message,
            "Permission denied for this directory"
        );
    }

    #[test]
    fn test_selection_cleared_on_directory_change() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        let ticket = browser.choose_site("s");
        loaded(&mut browser, &ticket, sample());
        browser.select_all();
        assert_eq!(browser.selection().len(), 4);

        browser.navigate_to("/pub").unwrap();
        assert!(browser.selection().is_empty());
        assert!(browser.listing().is_empty());
    }

    #[test]
    fn test_selection_survives_resort_and_view_change() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        let ticket = browser.choose_site("s");
        loaded(&mut browser, &ticket, sample());

        browser.click(1, Modifiers::NONE);
        browser.click(3, Modifiers::TOGGLE);
        let before: Vec<String> = browser
            .selection()
            .items()
            .iter()
            .map(|i| i.name.clone())
            .collect();

        browser.choose_sort(SortField::Size);
        browser.toggle_sort_direction();
        browser.toggle_view_mode();

        let after: Vec<String> = browser
            .selection()
            .items()
            .iter()
            .map(|i| i.name.clone())
            .collect();
        assert_eq!(before, after);
        assert_eq!(browser.view_mode(), ViewMode::Grid);
    }

    #[test]
    fn test_refresh_keeps_surviving_selection() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        let ticket = browser.choose_site("s");
        loaded(&mut browser, &ticket, sample());
        browser.select_all();

        let ticket = browser.refresh().unwrap();
        loaded(
            &mut browser,
            &ticket,
            vec![DirEntry::file("readme.txt", 12), DirEntry::file("new.txt", 1)],
        );
        let names: Vec<&str> = browser
            .selection()
            .items()
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, vec!["readme.txt"]);
    }

    #[test]
    fn test_mouse_double_click_wins_over_single() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        let ticket = browser.choose_site("s");
        loaded(&mut browser, &ticket, sample());

        let t0 = Instant::now();
        assert!(browser.press(0, Modifiers::NONE, t0).is_none());
        let ticket = browser
            .press(0, Modifiers::NONE, t0 + Duration::from_millis(80))
            .unwrap();
        assert_eq!(ticket.path, "/pub");

        // The single click never lands on the new directory
        assert!(browser.poll_clicks(t0 + Duration::from_secs(1)).is_none());
        assert!(browser.selection().is_empty());
    }

    #[test]
    fn test_mouse_single_click_selects_after_window() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        let ticket = browser.choose_site("s");
        loaded(&mut browser, &ticket, sample());

        let t0 = Instant::now();
        browser.press(2, Modifiers::NONE, t0);
        assert!(browser.selection().is_empty());
        browser.poll_clicks(t0 + Duration::from_millis(250));
        assert_eq!(browser.selection().items()[0].name, "file10.bin");
        assert_eq!(browser.selection().items()[0].path, "/file10.bin");
    }

    #[test]
    fn test_resort_drops_pending_single_click() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        let ticket = browser.choose_site("s");
        loaded(&mut browser, &ticket, sample());

        let t0 = Instant::now();
        // Row 1 holds "file2.bin" by name and "readme.txt" by size
        browser.press(1, Modifiers::NONE, t0);
        browser.choose_sort(SortField::Size);
        assert_eq!(browser.entry_at(1).unwrap().name, "readme.txt");

        assert!(browser
            .poll_clicks(t0 + Duration::from_millis(250))
            .is_none());
        assert!(browser.selection().is_empty());
    }

    #[test]
    fn test_address_bar() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        browser.choose_site("s");
        assert!(browser.submit_address("   ").is_none());
        let ticket = browser.submit_address(" //pub/../incoming/ ").unwrap();
        assert_eq!(ticket.path, "/incoming");
        let crumbs: Vec<String> = browser.breadcrumbs().into_iter().map(|c| c.path).collect();
        assert_eq!(crumbs, vec!["/", "/incoming"]);
    }

    #[test]
    fn test_cursor_clamps() {
        let mut browser = Browser::new(SortField::Name, ViewMode::List);
        let ticket = browser.choose_site("s");
        loaded(&mut browser, &ticket, sample());

        browser.move_cursor(-5);
        assert_eq!(browser.cursor(), 0);
        browser.move_cursor(10);
        assert_eq!(browser.cursor(), 3);
        browser.cursor_top();
        assert_eq!(browser.cursor(), 0);
    }
}
