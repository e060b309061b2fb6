use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use ftpdeck::api::models::{TaskAction, TaskFilter, TaskStatus};
use ftpdeck::api::{ApiClient, ErrorKind};
use ftpdeck::browser::{Browser, DirEntry, LoadApplied, LoadFailure, SortField, ViewMode};
use ftpdeck::tasks::{submit_selection, TaskDraft, TaskType};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// One request as the stub server saw it
#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    target: String,
    cookie: Option<String>,
    body: String,
}

impl Recorded {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

struct Reply {
    status: u16,
    body: Value,
    set_cookie: Option<&'static str>,
}

fn ok(body: Value) -> Reply {
    Reply {
        status: 200,
        body,
        set_cookie: None,
    }
}

fn fail(status: u16, body: Value) -> Reply {
    Reply {
        status,
        body,
        set_cookie: None,
    }
}

type Route = dyn Fn(&str, &str, &str) -> Reply + Send + Sync;

#[derive(Clone)]
struct Stub {
    route: Arc<Route>,
    seen: Arc<Mutex<Vec<Recorded>>>,
}

async fn record(
    State(stub): State<Stub>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
    let reply = (stub.route)(method.as_str(), &target, &body);

    stub.seen.lock().unwrap().push(Recorded {
        method: method.to_string(),
        target,
        cookie: headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    let status = StatusCode::from_u16(reply.status).unwrap();
    let mut response = (status, Json(reply.body)).into_response();
    if let Some(cookie) = reply.set_cookie {
        response
            .headers_mut()
            .insert(header::SET_COOKIE, HeaderValue::from_static(cookie));
    }
    response
}

/// Serve every request through `route` on a free local port
async fn serve<F>(route: F) -> (String, Arc<Mutex<Vec<Recorded>>>)
where
    F: Fn(&str, &str, &str) -> Reply + Send + Sync + 'static,
{
    let stub = Stub {
        route: Arc::new(route),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let seen = stub.seen.clone();
    let app = Router::new().fallback(record).with_state(stub);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base, seen)
}

fn client(base: &str) -> ApiClient {
    ApiClient::new(base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_browse_posts_path_and_reads_files() {
    let (base, seen) = serve(|_, _, _| {
        ok(json!({
            "current_path": "/pub",
            "files": [
                {"name": "b.iso", "is_directory": false, "size": 700, "modified_time": "2024-01-02 03:04:05"},
                {"name": "a", "is_directory": true}
            ]
        }))
    })
    .await;

    let response = client(&base).browse("site-1", "/pub").await.unwrap();
    assert_eq!(response.current_path.as_deref(), Some("/pub"));
    assert_eq!(response.files.len(), 2);
    assert_eq!(response.files[0].size, 700);
    assert!(response.files[1].is_directory);

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].target, "/sites/api/sites/site-1/browse");
    assert_eq!(seen[0].json(), json!({"path": "/pub"}));
}

#[tokio::test]
async fn test_error_kind_comes_from_body_then_status() {
    let (base, _) = serve(|_, target, _| {
        if target.contains("denied") {
            fail(500, json!({"error": "550 Permission denied", "kind": "permission"}))
        } else if target.contains("missing") {
            fail(404, json!({"error": "No such directory"}))
        } else {
            fail(502, Value::Null)
        }
    })
    .await;
    let api = client(&base);

    let err = api.browse("denied", "/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Permission);
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "550 Permission denied");

    let err = api.browse("missing", "/x").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = api.browse("gateway", "/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(err.to_string(), "HTTP 502");
}

#[tokio::test]
async fn test_backend_failure_wording_is_classified() {
    let (base, _) = serve(|_, target, _| {
        if target.contains("offline") {
            fail(500, json!({"error": "连接失败: [Errno 111] Connection refused"}))
        } else if target.contains("badpass") {
            fail(500, json!({"error": "浏览目录失败: 530 Authentication failed"}))
        } else {
            fail(500, json!({"error": "浏览目录失败: 550 Permission denied"}))
        }
    })
    .await;
    let api = client(&base);

    let err = api.browse("offline", "/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(
        LoadFailure::from(&err).message,
        "FTP connection failed, check the site configuration"
    );

    let err = api.browse("badpass", "/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);

    let err = api.browse("locked", "/secret").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Permission);
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_unreachable_server_is_a_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client(&base).sites().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    let failure = LoadFailure::from(&err);
    assert_eq!(
        failure.message,
        "FTP connection failed, check the site configuration"
    );
}

#[tokio::test]
async fn test_task_list_sends_filter_and_tolerates_bad_rows() {
    let (base, seen) = serve(|_, _, _| {
        ok(json!({
            "tasks": [
                {"id": "t1", "task_type": "file_download", "status": "running", "progress": 40},
                "garbage",
                {"status": "completed", "task_type": "folder_monitor"}
            ]
        }))
    })
    .await;

    let filter = TaskFilter {
        status: Some(TaskStatus::Running),
        task_type: Some("file_download".to_string()),
        limit: Some(100),
        ..Default::default()
    };
    let tasks = client(&base).tasks(&filter).await.unwrap();

    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0].id, "t1");
    assert_eq!(tasks[0].status, TaskStatus::Running);
    assert!(tasks[1].placeholder);
    assert!(!tasks[2].has_id);

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen[0].target,
        "/tasks/api/tasks?status=running&type=file_download&limit=100"
    );
}

#[tokio::test]
async fn test_task_actions_hit_their_endpoints() {
    let (base, seen) = serve(|_, _, _| ok(json!({"message": "ok"}))).await;
    let api = client(&base);

    api.task_action("t1", TaskAction::Pause).await.unwrap();
    api.task_action("t1", TaskAction::Cancel).await.unwrap();
    let response = api.task_action("t1", TaskAction::Delete).await.unwrap();
    assert_eq!(response.message, "ok");

    let seen = seen.lock().unwrap();
    let calls: Vec<(&str, &str)> = seen
        .iter()
        .map(|r| (r.method.as_str(), r.target.as_str()))
        .collect();
    assert_eq!(
        calls,
        [
            ("POST", "/tasks/api/tasks/t1/pause"),
            ("POST", "/tasks/api/tasks/t1/cancel"),
            ("DELETE", "/tasks/api/tasks/t1"),
        ]
    );
}

#[tokio::test]
async fn test_login_cookie_is_sent_on_later_requests() {
    let (base, seen) = serve(|_, target, _| {
        if target == "/login" {
            Reply {
                status: 200,
                body: json!({"message": "Login successful"}),
                set_cookie: Some("session=abc123; Path=/"),
            }
        } else {
            ok(json!({"sites": []}))
        }
    })
    .await;
    let api = client(&base);

    api.login("admin", "secret").await.unwrap();
    assert_eq!(api.session_cookie().as_deref(), Some("session=abc123"));
    assert!(api.sites().await.unwrap().is_empty());

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].json(), json!({"username": "admin", "password": "secret"}));
    assert_eq!(seen[1].cookie.as_deref(), Some("session=abc123"));
}

/// Browse a directory, select everything and create download tasks from it
#[tokio::test]
async fn test_selection_to_tasks_flow() {
    let (base, seen) = serve(|_, target, body| {
        if target.ends_with("/browse") {
            return ok(json!({
                "files": [
                    {"name": "disk10.img", "is_directory": false, "size": 10},
                    {"name": "disk2.img", "is_directory": false, "size": 2},
                    {"name": "extras", "is_directory": true}
                ]
            }));
        }
        let request: Value = serde_json::from_str(body).unwrap();
        if request["remote_path"] == "/iso/disk10.img" {
            fail(400, json!({"error": "quota exceeded", "kind": "validation"}))
        } else {
            ok(json!({"message": "Task created", "task_id": "new-1"}))
        }
    })
    .await;
    let api = client(&base);

    let mut browser = Browser::new(SortField::Name, ViewMode::List);
    browser.choose_site("s1");
    let ticket = browser.navigate_to("/iso").unwrap();
    let files: Vec<DirEntry> = api.browse("s1", "/iso").await.unwrap().files;
    assert_eq!(browser.finish_load(&ticket, Ok(files)), LoadApplied::Applied);

    let names: Vec<&str> = browser.display().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["extras", "disk2.img", "disk10.img"]);

    browser.select_all();
    let draft = TaskDraft {
        task_type: Some(TaskType::FileDownload),
        ..Default::default()
    };
    let task_type = draft
        .check(browser.site_id(), browser.selection().items())
        .unwrap();
    let report = submit_selection(&api, "s1", &draft, task_type, browser.selection().items()).await;

    assert_eq!(report.created, ["new-1"]);
    assert_eq!(report.failed(), 2);
    let reasons: Vec<&str> = report.failures.iter().map(|f| f.reason.as_str()).collect();
    assert!(reasons.contains(&"quota exceeded"));
    assert!(reasons
        .iter()
        .any(|r| r.contains("file_download cannot be used on a folder")));

    // The folder never reached the server
    let seen = seen.lock().unwrap();
    let creates: Vec<Value> = seen
        .iter()
        .filter(|r| r.target == "/tasks/api/tasks")
        .map(Recorded::json)
        .collect();
    assert_eq!(creates.len(), 2);
    assert_eq!(creates[0]["site_id"], "s1");
    assert_eq!(creates[0]["task_type"], "file_download");
    assert!(creates[0].get("monitor_interval").is_none());
}
