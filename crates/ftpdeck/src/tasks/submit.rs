//! Turning a browser selection into download or monitor tasks

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::models::{CreateTaskRequest, MessageResponse, Priority};
use crate::api::{ApiClient, ApiError};
use crate::browser::SelectedItem;
use crate::notify::Level;
use crate::validation::ValidationError;

pub const DEFAULT_LOCAL_PATH: &str = "/downloads";
pub const DEFAULT_MONITOR_INTERVAL: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    FileDownload,
    FolderDownload,
    FolderMonitor,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [
        TaskType::FileDownload,
        TaskType::FolderDownload,
        TaskType::FolderMonitor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::FileDownload => "file_download",
            TaskType::FolderDownload => "folder_download",
            TaskType::FolderMonitor => "folder_monitor",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskType::FileDownload => "File download",
            TaskType::FolderDownload => "Folder download",
            TaskType::FolderMonitor => "Folder monitor",
        }
    }

    pub fn wants_directory(&self) -> bool {
        !matches!(self, TaskType::FileDownload)
    }

    pub fn next(&self) -> Self {
        match self {
            TaskType::FileDownload => TaskType::FolderDownload,
            TaskType::FolderDownload => TaskType::FolderMonitor,
            TaskType::FolderMonitor => TaskType::FileDownload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOptions {
    pub interval_secs: u64,
    pub file_filter: String,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_MONITOR_INTERVAL,
            file_filter: String::new(),
        }
    }
}

/// Options filled in the task creation form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub task_type: Option<TaskType>,
    pub local_path: String,
    pub priority: Priority,
    pub auto_start: bool,
    pub monitor: MonitorOptions,
}

impl Default for TaskDraft {
    fn default() -> Self {
        Self {
            task_type: None,
            local_path: DEFAULT_LOCAL_PATH.to_string(),
            priority: Priority::Medium,
            auto_start: true,
            monitor: MonitorOptions::default(),
        }
    }
}

impl TaskDraft {
    /// Form preconditions; nothing may be sent until this passes
    pub fn check(&self, site_id: Option<&str>, selected: &[SelectedItem]) -> Result<TaskType, ValidationError> {
        if site_id.map_or(true, str::is_empty) {
            return Err(ValidationError::NoSite);
        }
        let task_type = self.task_type.ok_or(ValidationError::NoTaskType)?;
        if selected.is_empty() {
            return Err(ValidationError::EmptySelection);
        }
        Ok(task_type)
    }

    pub fn request_for(
        &self,
        site_id: &str,
        task_type: TaskType,
        item: &SelectedItem,
    ) -> Result<CreateTaskRequest, ValidationError> {
        if task_type.wants_directory() != item.is_directory {
            return Err(ValidationError::Incompatible {
                name: item.name.clone(),
                task_type: task_type.as_str(),
                kind: if item.is_directory { "folder" } else { "file" },
            });
        }

        let local_path = match self.local_path.trim() {
            "" => DEFAULT_LOCAL_PATH.to_string(),
            path => path.to_string(),
        };
        let monitor = task_type == TaskType::FolderMonitor;

        Ok(CreateTaskRequest {
            site_id: site_id.to_string(),
            task_type: task_type.as_str().to_string(),
            remote_path: item.path.clone(),
            local_path,
            priority: self.priority,
            auto_start: self.auto_start,
            monitor_interval: monitor.then_some(self.monitor.interval_secs),
            file_filter: monitor.then(|| self.monitor.file_filter.clone()),
        })
    }
}

/// Something tasks can be created on
pub trait TaskSink {
    fn create_task(
        &self,
        request: &CreateTaskRequest,
    ) -> impl Future<Output = Result<MessageResponse, ApiError>> + Send;
}

impl TaskSink for ApiClient {
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<MessageResponse, ApiError> {
        ApiClient::create_task(self, request).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub name: String,
    pub reason: String,
}

/// Outcome of one batch of task creations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub created: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.created.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn any_succeeded(&self) -> bool {
        !self.created.is_empty()
    }

    pub fn level(&self) -> Level {
        match (self.succeeded(), self.failed()) {
            (_, 0) => Level::Success,
            (0, _) => Level::Error,
            _ => Level::Warning,
        }
    }

    pub fn message(&self) -> String {
        match (self.succeeded(), self.failed()) {
            (ok, 0) => format!("Created {} tasks", ok),
            (0, failed) => format!("All {} task creations failed", failed),
            (ok, failed) => format!("{} succeeded, {} failed", ok, failed),
        }
    }
}

/// Create one task per selected item, one request at a time.
///
/// Items that do not fit the task type are recorded as failures without a
/// request. Nothing is rolled back when some creations fail.
pub async fn submit_selection<S: TaskSink>(
    sink: &S,
    site_id: &str,
    draft: &TaskDraft,
    task_type: TaskType,
    items: &[SelectedItem],
) -> BatchReport {
    let mut report = BatchReport::default();

    for item in items {
        let request = match draft.request_for(site_id, task_type, item) {
            Ok(request) => request,
            Err(e) => {
                warn!(item = %item.path, error = %e, "skipping incompatible item");
                report.failures.push(ItemFailure {
                    name: item.name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        match sink.create_task(&request).await {
            Ok(response) => {
                let id = response.task_id.unwrap_or_else(|| item.path.clone());
                report.created.push(id);
            }
            Err(e) => {
                warn!(item = %item.path, error = %e, "task creation failed");
                report.failures.push(ItemFailure {
                    name: item.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        task_type = task_type.as_str(),
        "task batch finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        requests: Mutex<Vec<CreateTaskRequest>>,
        reject: Option<&'static str>,
    }

    impl TaskSink for RecordingSink {
        async fn create_task(
            &self,
            request: &CreateTaskRequest,
        ) -> Result<MessageResponse, ApiError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.reject == Some(request.remote_path.as_str()) {
                return Err(ApiError::from_response(
                    500,
                    br#"{"error": "scheduler unavailable"}"#,
                ));
            }
            Ok(MessageResponse {
                message: "ok".to_string(),
                task_id: Some(format!("task-{}", request.remote_path)),
                ..Default::default()
            })
        }
    }

    fn item(name: &str, is_directory: bool) -> SelectedItem {
        SelectedItem {
            name: name.to_string(),
            path: format!("/pub/{}", name),
            is_directory,
            size: 0,
        }
    }

    #[test]
    fn test_check_preconditions() {
        let mut draft = TaskDraft::default();
        let items = vec![item("a.txt", false)];

        assert_eq!(draft.check(None, &items), Err(ValidationError::NoSite));
        assert_eq!(draft.check(Some("s"), &items), Err(ValidationError::NoTaskType));

        draft.task_type = Some(TaskType::FileDownload);
        assert_eq!(draft.check(Some("s"), &[]), Err(ValidationError::EmptySelection));
        assert_eq!(draft.check(Some("s"), &items), Ok(TaskType::FileDownload));
    }

    #[test]
    fn test_request_defaults() {
        let draft = TaskDraft::default();
        let request = draft
            .request_for("s1", TaskType::FileDownload, &item("a.txt", false))
            .unwrap();
        assert_eq!(request.local_path, "/downloads");
        assert_eq!(request.priority, Priority::Medium);
        assert!(request.auto_start);
        assert_eq!(request.remote_path, "/pub/a.txt");
        assert_eq!(request.monitor_interval, None);
    }

    #[test]
    fn test_monitor_request_carries_options() {
        let mut draft = TaskDraft::default();
        draft.monitor.file_filter = "*.csv".to_string();
        let request = draft
            .request_for("s1", TaskType::FolderMonitor, &item("incoming", true))
            .unwrap();
        assert_eq!(request.monitor_interval, Some(300));
        assert_eq!(request.file_filter.as_deref(), Some("*.csv"));
    }

    #[tokio::test]
    async fn test_folder_download_skips_files() {
        let sink = RecordingSink::default();
        let draft = TaskDraft::default();
        let items = vec![item("notes.txt", false), item("photos", true)];

        let report =
            submit_selection(&sink, "s1", &draft, TaskType::FolderDownload, &items).await;

        assert_eq!(sink.requests.lock().unwrap().len(), 1);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].name, "notes.txt");
        assert_eq!(report.message(), "1 succeeded, 1 failed");
        assert_eq!(report.level(), Level::Warning);
    }

    #[tokio::test]
    async fn test_server_failure_does_not_stop_batch() {
        let sink = RecordingSink {
            reject: Some("/pub/a.bin"),
            ..Default::default()
        };
        let items = vec![item("a.bin", false), item("b.bin", false)];

        let report = submit_selection(
            &sink,
            "s1",
            &TaskDraft::default(),
            TaskType::FileDownload,
            &items,
        )
        .await;

        assert_eq!(sink.requests.lock().unwrap().len(), 2);
        assert_eq!(report.created, vec!["task-/pub/b.bin"]);
        assert_eq!(report.failures[0].reason, "scheduler unavailable");
    }

    #[test]
    fn test_report_messages() {
        let all_ok = BatchReport {
            created: vec!["1".into(), "2".into()],
            failures: vec![],
        };
        assert_eq!(all_ok.message(), "Created 2 tasks");
        assert_eq!(all_ok.level(), Level::Success);

        let none = BatchReport {
            created: vec![],
            failures: vec![ItemFailure {
                name: "x".into(),
                reason: "y".into(),
            }],
        };
        assert_eq!(none.message(), "All 1 task creations failed");
        assert_eq!(none.level(), Level::Error);
        assert!(!none.any_succeeded());
    }
}
