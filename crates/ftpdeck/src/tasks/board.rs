//! Task list state: filters, paging, per-row actions

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;

use crate::api::models::{Priority, Site, Task, TaskAction, TaskFilter, TaskStatus};

pub const PAGE_SIZE: usize = 20;
pub const FETCH_LIMIT: usize = 100;
pub const UNKNOWN_SITE: &str = "Unknown site";

/// Counters over the loaded task list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub total: usize,
    pub running: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub paused: usize,
}

impl TaskCounts {
    pub fn tally(tasks: &[Task]) -> Self {
        let count = |status| tasks.iter().filter(|t| t.status == status).count();
        Self {
            total: tasks.len(),
            running: count(TaskStatus::Running),
            pending: count(TaskStatus::Pending),
            completed: count(TaskStatus::Completed),
            failed: count(TaskStatus::Failed),
            paused: count(TaskStatus::Paused),
        }
    }
}

/// Actions offered for a task row, in display order
pub fn actions_for(task: &Task) -> Vec<TaskAction> {
    if !task.has_id {
        return Vec::new();
    }

    let mut actions = Vec::new();
    match task.status {
        TaskStatus::Running => actions.push(TaskAction::Pause),
        TaskStatus::Paused => actions.push(TaskAction::Resume),
        _ => {}
    }
    if matches!(
        task.status,
        TaskStatus::Pending | TaskStatus::Running | TaskStatus::Paused
    ) {
        actions.push(TaskAction::Cancel);
    }
    if matches!(
        task.status,
        TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
    ) {
        actions.push(TaskAction::Delete);
    }
    actions
}

fn site_from_object(value: &Value) -> Option<String> {
    let name = value.get("name").and_then(Value::as_str)?;
    let host = value.get("host").and_then(Value::as_str)?;
    if name.is_empty() || host.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// Depth-first search for the first object carrying both `name` and `host`
fn find_site(value: &Value) -> Option<String> {
    if let Some(found) = site_from_object(value) {
        return Some(found);
    }
    match value {
        Value::Object(map) => map.values().find_map(find_site),
        Value::Array(items) => items.iter().find_map(find_site),
        _ => None,
    }
}

/// Human name of the site a task runs against
pub fn site_name(task: &Task, sites: &[Site]) -> String {
    if let Some(name) = &task.site_name {
        return name.clone();
    }

    if let Some(first) = task.args.first() {
        if let Some(name) = site_from_object(first) {
            return name;
        }
        if let Some(config) = first.get("site_config") {
            let name = config.get("name").and_then(Value::as_str);
            let host = config.get("host").and_then(Value::as_str);
            if let Some(found) = name.filter(|n| !n.is_empty()).or(host) {
                return found.to_string();
            }
        }
        if let Some(name) = find_site(first) {
            return name;
        }
    }

    if let Some(site_id) = &task.site_id {
        if let Some(site) = sites.iter().find(|s| &s.id == site_id) {
            return site.name.clone();
        }
    }

    UNKNOWN_SITE.to_string()
}

/// Remote path a task works on, following the argument layout of each task type
pub fn remote_path(task: &Task) -> String {
    if let Some(path) = &task.remote_path {
        return path.clone();
    }

    match task.task_type.as_str() {
        "folder_monitor" => task
            .args
            .first()
            .and_then(|config| config.get("remote_path"))
            .and_then(Value::as_str)
            .unwrap_or("/")
            .to_string(),
        "connection_test" => "connection test".to_string(),
        _ => match task.args.get(1) {
            Some(Value::String(path)) => path.clone(),
            Some(Value::Null) | None => "/".to_string(),
            Some(other) => other.to_string(),
        },
    }
}

pub fn task_type_label(task_type: &str) -> String {
    match task_type {
        "file_download" => "File download".to_string(),
        "file_upload" => "File upload".to_string(),
        "folder_download" => "Folder download".to_string(),
        "folder_upload" => "Folder upload".to_string(),
        "folder_monitor" => "Folder monitor".to_string(),
        "connection_test" => "Connection test".to_string(),
        other => other.to_string(),
    }
}

/// Keep the first task for each dedupe key
pub fn dedupe(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|task| {
            let key = task.dedupe_key();
            if seen.insert(key.clone()) {
                true
            } else {
                warn!(task = %key, "dropping duplicate task row");
                false
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    tasks: Vec<Task>,
    status: Option<TaskStatus>,
    priority: Option<Priority>,
    task_type: Option<String>,
    page: usize,
    cursor: usize,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self {
            page: 1,
            ..Default::default()
        }
    }

    pub fn filter(&self) -> TaskFilter {
        TaskFilter {
            status: self.status,
            priority: self.priority,
            task_type: self.task_type.clone(),
            limit: Some(FETCH_LIMIT),
        }
    }

    pub fn status_filter(&self) -> Option<TaskStatus> {
        self.status
    }

    pub fn priority_filter(&self) -> Option<Priority> {
        self.priority
    }

    pub fn type_filter(&self) -> Option<&str> {
        self.task_type.as_deref()
    }

    /// Filter changes go back to the first page; the caller reloads
    pub fn set_status_filter(&mut self, status: Option<TaskStatus>) {
        self.status = status;
        self.reset_paging();
    }

    pub fn set_priority_filter(&mut self, priority: Option<Priority>) {
        self.priority = priority;
        self.reset_paging();
    }

    pub fn set_type_filter(&mut self, task_type: Option<String>) {
        self.task_type = task_type;
        self.reset_paging();
    }

    /// Step the status filter through all, then each status in turn
    pub fn cycle_status_filter(&mut self) {
        let next = match self.status {
            None => Some(TaskStatus::FILTERABLE[0]),
            Some(current) => TaskStatus::FILTERABLE
                .iter()
                .position(|s| *s == current)
                .and_then(|i| TaskStatus::FILTERABLE.get(i + 1).copied()),
        };
        self.set_status_filter(next);
    }

    pub fn cycle_priority_filter(&mut self) {
        let next = match self.priority {
            None => Some(Priority::High),
            Some(Priority::High) => Some(Priority::Medium),
            Some(Priority::Medium) => Some(Priority::Low),
            Some(Priority::Low) => None,
        };
        self.set_priority_filter(next);
    }

    fn reset_paging(&mut self) {
        self.page = 1;
        self.cursor = 0;
    }

    pub fn replace(&mut self, tasks: Vec<Task>) {
        self.tasks = dedupe(tasks);
        if self.page > self.total_pages().max(1) {
            self.page = self.total_pages().max(1);
        }
        let rows = self.page_rows().len();
        self.cursor = self.cursor.min(rows.saturating_sub(1));
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn counts(&self) -> TaskCounts {
        TaskCounts::tally(&self.tasks)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        self.tasks.len().div_ceil(PAGE_SIZE)
    }

    /// Out-of-range pages are ignored
    pub fn change_page(&mut self, page: usize) -> bool {
        if page < 1 || page > self.total_pages() {
            return false;
        }
        self.page = page;
        self.cursor = 0;
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.change_page(self.page + 1)
    }

    pub fn prev_page(&mut self) -> bool {
        self.page > 1 && self.change_page(self.page - 1)
    }

    pub fn page_rows(&self) -> &[Task] {
        let start = (self.page.saturating_sub(1) * PAGE_SIZE).min(self.tasks.len());
        let end = (start + PAGE_SIZE).min(self.tasks.len());
        &self.tasks[start..end]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let rows = self.page_rows().len();
        if rows == 0 {
            self.cursor = 0;
            return;
        }
        self.cursor = (self.cursor as isize + delta).clamp(0, rows as isize - 1) as usize;
    }

    pub fn selected(&self) -> Option<&Task> {
        self.page_rows().get(self.cursor)
    }
}
