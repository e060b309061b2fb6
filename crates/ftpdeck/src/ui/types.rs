//! Types and enums used across the UI

use crate::api::models::{Site, Task, TaskAction, User, UserStats};
use crate::browser::{DirEntry, LoadFailure, LoadTicket};
use crate::tasks::BatchReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Sites,
    Tasks,
    Browser,
    Users,
    Help,
    TaskForm,
    TaskDetail,
    SiteDetail,
    UserForm,
    UserDetail,
    Confirm,
}

/// Top-level views reachable with the number keys
pub const TABS: [(View, &str); 5] = [
    (View::Dashboard, "1 Dashboard"),
    (View::Sites, "2 Sites"),
    (View::Tasks, "3 Tasks"),
    (View::Browser, "4 Browser"),
    (View::Users, "5 Users"),
];

impl View {
    pub fn tab_index(&self) -> Option<usize> {
        TABS.iter().position(|(view, _)| view == self)
    }

    /// Dialogs draw over the view that opened them
    pub fn is_overlay(&self) -> bool {
        matches!(
            self,
            View::TaskForm
                | View::TaskDetail
                | View::SiteDetail
                | View::UserForm
                | View::UserDetail
                | View::Confirm
        )
    }
}

/// An action waiting for y/n
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirm {
    TaskAction { id: String, action: TaskAction },
    DeleteUser { id: String, username: String },
    DeleteSite { id: String, name: String },
}

impl Confirm {
    pub fn title(&self) -> String {
        match self {
            Confirm::TaskAction { action, .. } => format!("{} Task?", action.label()),
            Confirm::DeleteUser { .. } => "Delete User?".to_string(),
            Confirm::DeleteSite { .. } => "Delete Site?".to_string(),
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            Confirm::TaskAction { id, action } => format!(
                "{} task {}? This cannot be undone.",
                action.label(),
                id
            ),
            Confirm::DeleteUser { username, .. } => {
                format!("Delete user '{}'? This cannot be undone.", username)
            }
            Confirm::DeleteSite { name, .. } => {
                format!("Delete site '{}' and its stored credentials?", name)
            }
        }
    }
}

/// Results of spawned requests, drained by the event loop
#[derive(Debug)]
pub enum AppMessage {
    Directory {
        ticket: LoadTicket,
        result: Result<Vec<DirEntry>, LoadFailure>,
    },
    Batch(BatchReport),
    TaskAction {
        id: String,
        action: TaskAction,
        result: Result<String, String>,
    },
    TaskDetail(Result<Task, String>),
    SiteTest {
        name: String,
        result: Result<String, String>,
    },
    SiteDetail(Result<Site, String>),
    SiteDeleted(Result<String, String>),
    Users(Result<Vec<User>, String>),
    UserStats(UserStats),
    UserSaved(Result<String, String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_indices() {
        assert_eq!(View::Dashboard.tab_index(), Some(0));
        assert_eq!(View::Users.tab_index(), Some(4));
        assert_eq!(View::Help.tab_index(), None);
        assert!(View::Confirm.is_overlay());
        assert!(!View::Browser.is_overlay());
    }

    #[test]
    fn test_confirm_prompts() {
        let confirm = Confirm::TaskAction {
            id: "t1".to_string(),
            action: TaskAction::Cancel,
        };
        assert_eq!(confirm.title(), "Cancel Task?");
        assert!(confirm.prompt().contains("t1"));
    }
}
