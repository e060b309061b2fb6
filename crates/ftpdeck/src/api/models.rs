//! Wire types for the management backend
//!
//! Most responses are wrapped in a single-key envelope (`{"sites": [...]}`,
//! `{"user": {...}}`); the envelopes live here next to the payloads they
//! carry. Task records are the exception: the backend emits several shapes
//! for them, so they are parsed by hand from `serde_json::Value`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::browser::DirEntry;

pub const DEFAULT_GROUP: &str = "Default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_check: Option<String>,
    #[serde(default)]
    pub connection_time: Option<f64>,
}

fn default_port() -> u16 {
    21
}

fn default_protocol() -> String {
    "ftp".to_string()
}

impl Site {
    pub fn group_name(&self) -> &str {
        match self.group.as_deref() {
            Some(group) if !group.is_empty() => group,
            _ => DEFAULT_GROUP,
        }
    }

    pub fn status_label(&self) -> &str {
        self.status.as_deref().unwrap_or("unknown")
    }
}

/// Fields sent when creating or updating a site
#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteForm {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub group: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SitesEnvelope {
    #[serde(default)]
    pub sites: Vec<Site>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SiteEnvelope {
    pub site: Site,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupsEnvelope {
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActiveTests {
    #[serde(default)]
    pub active_tests: HashMap<String, bool>,
    #[serde(default)]
    pub count: usize,
}

impl ActiveTests {
    pub fn is_testing(&self, site_id: &str) -> bool {
        self.active_tests.get(site_id).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BrowseRequest<'a> {
    pub path: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowseResponse {
    #[serde(default)]
    pub current_path: Option<String>,
    #[serde(default)]
    pub files: Vec<DirEntry>,
}

/// Plain `{message}` acknowledgement, with any id the backend adds
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }

    /// The scheduler orders numerically, 1 being the most urgent
    fn from_rank(rank: i64) -> Option<Self> {
        match rank {
            1 => Some(Priority::High),
            2 => Some(Priority::Medium),
            3 => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Paused,
    Cancelled,
    Unknown,
}

impl TaskStatus {
    pub const FILTERABLE: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Paused,
        TaskStatus::Cancelled,
    ];

    pub fn parse(raw: &str) -> Self {
        match raw {
            "pending" => TaskStatus::Pending,
            "running" => TaskStatus::Running,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            "paused" => TaskStatus::Paused,
            "cancelled" => TaskStatus::Cancelled,
            _ => TaskStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Paused => "paused",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle operations on an existing task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskAction {
    Pause,
    Resume,
    Cancel,
    Delete,
}

impl TaskAction {
    pub fn label(&self) -> &'static str {
        match self {
            TaskAction::Pause => "Pause",
            TaskAction::Resume => "Resume",
            TaskAction::Cancel => "Cancel",
            TaskAction::Delete => "Delete",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            TaskAction::Pause => "paused",
            TaskAction::Resume => "resumed",
            TaskAction::Cancel => "cancelled",
            TaskAction::Delete => "deleted",
        }
    }

    /// Cancel and delete cannot be undone
    pub fn needs_confirmation(&self) -> bool {
        matches!(self, TaskAction::Cancel | TaskAction::Delete)
    }
}

/// A task record as shown in task tables.
///
/// Built with [`Task::from_value`]; never fails, a record that cannot be
/// read at all becomes a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    /// False when the backend gave no id and one was made up
    pub has_id: bool,
    pub task_type: String,
    pub func_name: Option<String>,
    pub status: TaskStatus,
    pub priority: Option<Priority>,
    pub progress: f64,
    pub created_at: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_by: Option<String>,
    pub error: Option<String>,
    pub site_id: Option<String>,
    pub site_name: Option<String>,
    pub remote_path: Option<String>,
    pub local_path: Option<String>,
    pub args: Vec<Value>,
    pub placeholder: bool,
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    match value.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

impl Task {
    pub fn from_value(value: &Value, row: usize) -> Self {
        if !value.is_object() {
            return Task::placeholder(row);
        }

        let id = non_empty_str(value, "id");
        let func_name = non_empty_str(value, "func_name");
        let task_type = non_empty_str(value, "task_type")
            .or_else(|| func_name.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let priority = match value.get("priority") {
            Some(Value::String(s)) => Priority::parse(s),
            Some(Value::Number(n)) => n.as_i64().and_then(Priority::from_rank),
            _ => None,
        };

        let progress = value
            .get("progress")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 100.0);

        Task {
            has_id: id.is_some(),
            id: id.unwrap_or_else(|| format!("unknown_{}", row)),
            task_type,
            func_name,
            status: value
                .get("status")
                .and_then(Value::as_str)
                .map(TaskStatus::parse)
                .unwrap_or(TaskStatus::Unknown),
            priority,
            progress,
            created_at: non_empty_str(value, "created_at"),
            started_at: non_empty_str(value, "started_at"),
            completed_at: non_empty_str(value, "completed_at"),
            created_by: non_empty_str(value, "created_by"),
            error: non_empty_str(value, "error"),
            site_id: non_empty_str(value, "site_id"),
            site_name: non_empty_str(value, "site_name"),
            remote_path: non_empty_str(value, "remote_path"),
            local_path: non_empty_str(value, "local_path"),
            args: value
                .get("args")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            placeholder: false,
        }
    }

    pub fn placeholder(row: usize) -> Self {
        Task {
            id: format!("error_{}", row),
            has_id: false,
            task_type: "error".to_string(),
            func_name: None,
            status: TaskStatus::Failed,
            priority: Some(Priority::Low),
            progress: 0.0,
            created_at: None,
            started_at: None,
            completed_at: None,
            created_by: None,
            error: Some("unreadable task record".to_string()),
            site_id: None,
            site_name: None,
            remote_path: None,
            local_path: None,
            args: Vec::new(),
            placeholder: true,
        }
    }

    /// Key used to drop duplicate rows
    pub fn dedupe_key(&self) -> String {
        if self.has_id || self.placeholder {
            self.id.clone()
        } else {
            format!(
                "{}_{}",
                self.func_name.as_deref().unwrap_or(&self.task_type),
                self.created_at.as_deref().unwrap_or_default()
            )
        }
    }
}

pub fn parse_tasks(values: &[Value]) -> Vec<Task> {
    values
        .iter()
        .enumerate()
        .map(|(row, value)| Task::from_value(value, row))
        .collect()
}

#[derive(Debug, Deserialize)]
pub(crate) struct TasksEnvelope {
    #[serde(default)]
    pub tasks: Vec<Value>,
}

/// Query for the task list endpoint; `None` means "all"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub task_type: Option<String>,
    pub limit: Option<usize>,
}

impl TaskFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.as_str().to_string()));
        }
        if let Some(task_type) = &self.task_type {
            pairs.push(("type", task_type.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

/// Body of a task creation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateTaskRequest {
    pub site_id: String,
    pub task_type: String,
    pub remote_path: String,
    pub local_path: String,
    pub priority: Priority,
    pub auto_start: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_filter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchedulerStats {
    #[serde(default)]
    pub efficiency: f64,
    #[serde(default)]
    pub active_workers: u64,
    #[serde(default)]
    pub queue_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SiteStatsBlock {
    #[serde(default)]
    pub total_sites: u64,
    #[serde(default)]
    pub connected_sites: u64,
    #[serde(default)]
    pub disconnected_sites: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskStatsBlock {
    #[serde(default)]
    pub total_tasks: u64,
    #[serde(default)]
    pub running_tasks: u64,
    #[serde(default)]
    pub pending_tasks: u64,
    #[serde(default)]
    pub completed_tasks: u64,
    #[serde(default)]
    pub failed_tasks: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MonitorStatsBlock {
    #[serde(default)]
    pub total_monitors: u64,
    #[serde(default)]
    pub active_monitors: u64,
    #[serde(default)]
    pub inactive_monitors: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DashboardStats {
    #[serde(default)]
    pub scheduler: SchedulerStats,
    #[serde(default)]
    pub sites: SiteStatsBlock,
    #[serde(default)]
    pub tasks: TaskStatsBlock,
    #[serde(default)]
    pub monitors: MonitorStatsBlock,
}

/// Flat counters carried by `task_stats_update` events
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskStatsUpdate {
    #[serde(default)]
    pub total_tasks: u64,
    #[serde(default)]
    pub running_tasks: u64,
    #[serde(default)]
    pub efficiency: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub cpu_percent: f64,
    #[serde(default)]
    pub memory_percent: f64,
    #[serde(default)]
    pub disk_percent: f64,
    #[serde(default)]
    pub process_memory_mb: f64,
    #[serde(default)]
    pub scheduler_running: bool,
    #[serde(default)]
    pub worker_count: u64,
    #[serde(default)]
    pub uptime: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Admin, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Admin => "Admin",
            Role::SuperAdmin => "Super admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Disabled,
    Locked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Disabled => "disabled",
            UserStatus::Locked => "locked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskScope {
    All,
    #[default]
    Own,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub user_management: bool,
    #[serde(default)]
    pub site_management: bool,
    #[serde(default)]
    pub system_config: bool,
    #[serde(default)]
    pub role_management: bool,
    #[serde(default)]
    pub task_management: TaskScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default = "default_download_path")]
    pub default_download_path: String,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: u32,
}

fn default_download_path() -> String {
    "/downloads".to_string()
}

fn default_max_concurrent() -> u32 {
    3
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            default_download_path: default_download_path(),
            max_concurrent_tasks: default_max_concurrent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
    #[serde(default)]
    pub settings: Option<UserSettings>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UsersEnvelope {
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RoleCounts {
    #[serde(default)]
    pub user: u64,
    #[serde(default)]
    pub admin: u64,
    #[serde(default)]
    pub super_admin: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub active: u64,
    #[serde(default)]
    pub disabled: u64,
    #[serde(default)]
    pub locked: u64,
    #[serde(default)]
    pub by_role: RoleCounts,
}

impl UserStats {
    pub fn admins(&self) -> u64 {
        self.by_role.admin + self.by_role.super_admin
    }

    pub fn inactive(&self) -> u64 {
        self.disabled + self.locked
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserStatsEnvelope {
    pub stats: UserStats,
}

/// Payload for `POST /register` and `PUT /users/{id}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPayload {
    pub username: String,
    pub role: Role,
    pub status: UserStatus,
    pub settings: UserSettings,
    pub permissions: Permissions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusChange {
    pub status: UserStatus,
}

#[derive(Debug, Serialize)]
pub(crate) struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_missing_fields() {
        let task = Task::from_value(&json!({"func_name": "folder_download"}), 3);
        assert_eq!(task.id, "unknown_3");
        assert!(!task.has_id);
        assert_eq!(task.task_type, "folder_download");
        assert_eq!(task.status, TaskStatus::Unknown);
        assert!(task.args.is_empty());

        let task = Task::from_value(&json!({"id": "t1"}), 0);
        assert_eq!(task.task_type, "unknown");
    }

    #[test]
    fn test_task_non_object_is_placeholder() {
        let task = Task::from_value(&json!("garbage"), 7);
        assert!(task.placeholder);
        assert_eq!(task.id, "error_7");
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.priority, Some(Priority::Low));
    }

    #[test]
    fn test_task_priority_forms() {
        let task = Task::from_value(&json!({"id": "a", "priority": "HIGH"}), 0);
        assert_eq!(task.priority, Some(Priority::High));
        let task = Task::from_value(&json!({"id": "a", "priority": 3}), 0);
        assert_eq!(task.priority, Some(Priority::Low));
        let task = Task::from_value(&json!({"id": "a", "priority": "urgent"}), 0);
        assert_eq!(task.priority, None);
    }

    #[test]
    fn test_numeric_id_and_progress_clamp() {
        let task = Task::from_value(&json!({"id": 42, "progress": 140.0}), 0);
        assert_eq!(task.id, "42");
        assert_eq!(task.progress, 100.0);
    }

    #[test]
    fn test_filter_query_pairs() {
        let filter = TaskFilter {
            status: Some(TaskStatus::Paused),
            priority: None,
            task_type: Some("folder_monitor".to_string()),
            limit: Some(100),
        };
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("status", "paused".to_string()),
                ("type", "folder_monitor".to_string()),
                ("limit", "100".to_string()),
            ]
        );
    }

    #[test]
    fn test_create_task_request_skips_monitor_fields() {
        let request = CreateTaskRequest {
            site_id: "s1".to_string(),
            task_type: "file_download".to_string(),
            remote_path: "/pub/a.txt".to_string(),
            local_path: "/downloads".to_string(),
            priority: Priority::Medium,
            auto_start: true,
            monitor_interval: None,
            file_filter: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["priority"], "medium");
        assert!(value.get("monitor_interval").is_none());
    }

    #[test]
    fn test_site_defaults() {
        let site: Site =
            serde_json::from_value(json!({"id": "1", "name": "mirror", "host": "ftp.example.org"}))
                .unwrap();
        assert_eq!(site.port, 21);
        assert_eq!(site.protocol, "ftp");
        assert_eq!(site.group_name(), DEFAULT_GROUP);
    }

    #[test]
    fn test_user_role_parsing() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "username": "root",
            "role": "super_admin",
            "status": "locked"
        }))
        .unwrap();
        assert_eq!(user.role, Role::SuperAdmin);
        assert_eq!(user.status, UserStatus::Locked);
    }
}
