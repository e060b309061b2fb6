//! Site list state and connection testing

use std::collections::HashSet;

use crate::api::models::{ActiveTests, Site};
use crate::validation::ValidationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteStats {
    pub total: usize,
    pub connected: usize,
    pub disconnected: usize,
    pub groups: usize,
}

impl SiteStats {
    pub fn tally(sites: &[Site]) -> Self {
        let status = |wanted: &str| {
            sites
                .iter()
                .filter(|s| s.status.as_deref() == Some(wanted))
                .count()
        };
        let groups: HashSet<&str> = sites.iter().map(Site::group_name).collect();

        Self {
            total: sites.len(),
            connected: status("connected"),
            disconnected: status("disconnected"),
            groups: groups.len(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SiteList {
    sites: Vec<Site>,
    status_filter: Option<String>,
    active: ActiveTests,
    cursor: usize,
}

impl SiteList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, sites: Vec<Site>) {
        self.sites = sites;
        self.clamp_cursor();
    }

    pub fn all(&self) -> &[Site] {
        &self.sites
    }

    pub fn stats(&self) -> SiteStats {
        SiteStats::tally(&self.sites)
    }

    pub fn set_status_filter(&mut self, status: Option<&str>) {
        self.status_filter = status.map(str::to_string);
        self.cursor = 0;
    }

    /// Cycle the status filter between all, connected and disconnected
    pub fn cycle_status_filter(&mut self) {
        let next = match self.status_filter.as_deref() {
            None => Some("connected"),
            Some("connected") => Some("disconnected"),
            _ => None,
        };
        self.set_status_filter(next);
    }

    pub fn status_filter(&self) -> Option<&str> {
        self.status_filter.as_deref()
    }

    pub fn visible(&self) -> Vec<&Site> {
        self.sites
            .iter()
            .filter(|s| match &self.status_filter {
                Some(wanted) => s.status.as_deref() == Some(wanted.as_str()),
                None => true,
            })
            .collect()
    }

    pub fn set_active_tests(&mut self, active: ActiveTests) {
        self.active = active;
    }

    pub fn active_test_count(&self) -> usize {
        self.active.count
    }

    /// Status shown for a site, accounting for a running connection test
    pub fn display_status<'a>(&self, site: &'a Site) -> &'a str {
        if self.active.is_testing(&site.id) {
            "testing"
        } else {
            site.status_label()
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let rows = self.visible().len();
        if rows == 0 {
            self.cursor = 0;
            return;
        }
        self.cursor = (self.cursor as isize + delta).clamp(0, rows as isize - 1) as usize;
    }

    fn clamp_cursor(&mut self) {
        let rows = self.visible().len();
        self.cursor = self.cursor.min(rows.saturating_sub(1));
    }

    pub fn selected(&self) -> Option<&Site> {
        self.visible().get(self.cursor).copied()
    }

    /// Testing every site needs at least one site
    pub fn check_test_all(&self) -> Result<usize, ValidationError> {
        if self.sites.is_empty() {
            Err(ValidationError::Required("at least one site"))
        } else {
            Ok(self.sites.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn site(id: &str, status: &str, group: Option<&str>) -> Site {
        Site {
            id: id.to_string(),
            name: format!("site {}", id),
            host: "ftp.example.org".to_string(),
            port: 21,
            protocol: "ftp".to_string(),
            username: "anonymous".to_string(),
            group: group.map(str::to_string),
            status: Some(status.to_string()),
            last_check: None,
            connection_time: None,
        }
    }

    #[test]
    fn test_stats() {
        let sites = vec![
            site("1", "connected", Some("mirrors")),
            site("2", "disconnected", None),
            site("3", "connected", Some("")),
            site("4", "error", Some("mirrors")),
        ];
        let stats = SiteStats::tally(&sites);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.connected, 2);
        assert_eq!(stats.disconnected, 1);
        // "mirrors" plus the default group
        assert_eq!(stats.groups, 2);
    }

    #[test]
    fn test_filter_and_cursor() {
        let mut list = SiteList::new();
        list.replace(vec![
            site("1", "connected", None),
            site("2", "disconnected", None),
            site("3", "connected", None),
        ]);

        list.cycle_status_filter();
        assert_eq!(list.visible().len(), 2);
        list.move_cursor(5);
        assert_eq!(list.selected().unwrap().id, "3");

        list.cycle_status_filter();
        assert_eq!(list.visible().len(), 1);
        assert_eq!(list.cursor(), 0);

        list.cycle_status_filter();
        assert_eq!(list.status_filter(), None);
        assert_eq!(list.visible().len(), 3);
    }

    #[test]
    fn test_active_test_overrides_status() {
        let mut list = SiteList::new();
        let s = site("7", "connected", None);
        list.replace(vec![s.clone()]);
        assert_eq!(list.display_status(&s), "connected");

        list.set_active_tests(ActiveTests {
            active_tests: HashMap::from([("7".to_string(), true)]),
            count: 1,
        });
        assert_eq!(list.display_status(&s), "testing");
        assert_eq!(list.active_test_count(), 1);
    }

    #[test]
    fn test_test_all_needs_sites() {
        let mut list = SiteList::new();
        assert!(list.check_test_all().is_err());
        list.replace(vec![site("1", "connected", None)]);
        assert_eq!(list.check_test_all(), Ok(1));
    }
}
