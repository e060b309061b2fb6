//! JSON HTTP client for the management backend

mod error;
pub mod models;

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

pub use error::{ApiError, ErrorKind};
use models::*;

pub type ApiResult<T> = Result<T, ApiError>;

/// Async client holding the session cookie for one backend.
///
/// Cheap to clone; clones share the connection pool and cookie jar, so a
/// clone can be moved into a spawned task.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    cookies: Arc<Jar>,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let mut base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase.into());
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let cookies = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(cookies.clone())
            .timeout(timeout)
            .user_agent(concat!("ftpdeck/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            cookies,
            base,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `Cookie` header value for the backend, once logged in
    pub fn session_cookie(&self) -> Option<String> {
        let value = self.cookies.cookies(&self.base)?;
        value.to_str().ok().map(str::to_string)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.http.request(method, self.endpoint(segments))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending request");

        let response = self.http.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let err = ApiError::from_response(status.as_u16(), &body);
            warn!(%method, %url, status = status.as_u16(), error = %err, "request failed");
            return Err(err);
        }

        let body: &[u8] = if body.is_empty() { b"{}" } else { &body };
        Ok(serde_json::from_slice(body)?)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        self.send(self.request(Method::GET, segments)).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> ApiResult<T> {
        self.send(self.request(Method::POST, segments).json(body)).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        self.send(self.request(Method::POST, segments)).await
    }

    async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> ApiResult<T> {
        self.send(self.request(Method::PUT, segments).json(body)).await
    }

    async fn delete<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        self.send(self.request(Method::DELETE, segments)).await
    }

    // auth

    pub async fn login(&self, username: &str, password: &str) -> ApiResult<MessageResponse> {
        self.post(&["login"], &Credentials { username, password })
            .await
    }

    pub async fn logout(&self) -> ApiResult<MessageResponse> {
        self.post_empty(&["logout"]).await
    }

    pub async fn profile(&self) -> ApiResult<User> {
        let envelope: UserEnvelope = self.get(&["profile"]).await?;
        Ok(envelope.user)
    }

    // sites

    pub async fn sites(&self) -> ApiResult<Vec<Site>> {
        let envelope: SitesEnvelope = self.get(&["sites", "api", "sites"]).await?;
        Ok(envelope.sites)
    }

    pub async fn site(&self, id: &str) -> ApiResult<Site> {
        let envelope: SiteEnvelope = self.get(&["sites", "api", "sites", id]).await?;
        Ok(envelope.site)
    }

    pub async fn create_site(&self, form: &SiteForm) -> ApiResult<MessageResponse> {
        self.post(&["sites", "api", "sites"], form).await
    }

    pub async fn update_site(&self, id: &str, form: &SiteForm) -> ApiResult<MessageResponse> {
        self.put(&["sites", "api", "sites", id], form).await
    }

    pub async fn delete_site(&self, id: &str) -> ApiResult<MessageResponse> {
        self.delete(&["sites", "api", "sites", id]).await
    }

    pub async fn test_site(&self, id: &str) -> ApiResult<MessageResponse> {
        self.post_empty(&["sites", "api", "sites", id, "test"])
            .await
    }

    pub async fn test_all_sites(&self) -> ApiResult<MessageResponse> {
        self.post_empty(&["sites", "api", "sites", "test-all"])
            .await
    }

    pub async fn active_tests(&self) -> ApiResult<ActiveTests> {
        self.get(&["sites", "api", "sites", "active-tests"]).await
    }

    pub async fn site_groups(&self) -> ApiResult<Vec<String>> {
        let envelope: GroupsEnvelope = self.get(&["sites", "api", "sites", "groups"]).await?;
        Ok(envelope.groups)
    }

    pub async fn browse(&self, site_id: &str, path: &str) -> ApiResult<BrowseResponse> {
        self.post(
            &["sites", "api", "sites", site_id, "browse"],
            &BrowseRequest { path },
        )
        .await
    }

    // tasks

    pub async fn create_task(&self, request: &CreateTaskRequest) -> ApiResult<MessageResponse> {
        self.post(&["tasks", "api", "tasks"], request).await
    }

    pub async fn tasks(&self, filter: &TaskFilter) -> ApiResult<Vec<Task>> {
        let builder = self
            .request(Method::GET, &["tasks", "api", "tasks"])
            .query(&filter.query_pairs());
        let envelope: TasksEnvelope = self.send(builder).await?;
        Ok(parse_tasks(&envelope.tasks))
    }

    pub async fn task(&self, id: &str) -> ApiResult<Task> {
        let value: serde_json::Value = self.get(&["tasks", "api", "tasks", id]).await?;
        Ok(Task::from_value(&value, 0))
    }

    pub async fn task_action(&self, id: &str, action: TaskAction) -> ApiResult<MessageResponse> {
        match action {
            TaskAction::Pause => self.post_empty(&["tasks", "api", "tasks", id, "pause"]).await,
            TaskAction::Resume => self.post_empty(&["tasks", "api", "tasks", id, "resume"]).await,
            TaskAction::Cancel => self.post_empty(&["tasks", "api", "tasks", id, "cancel"]).await,
            TaskAction::Delete => self.delete(&["tasks", "api", "tasks", id]).await,
        }
    }

    // dashboard

    pub async fn dashboard_stats(&self) -> ApiResult<DashboardStats> {
        self.get(&["api", "dashboard", "stats"]).await
    }

    pub async fn recent_tasks(&self) -> ApiResult<Vec<Task>> {
        let envelope: TasksEnvelope = self.get(&["api", "dashboard", "recent-tasks"]).await?;
        Ok(parse_tasks(&envelope.tasks))
    }

    pub async fn system_status(&self) -> ApiResult<SystemStatus> {
        self.get(&["api", "dashboard", "system-status"]).await
    }

    // users

    pub async fn users(&self) -> ApiResult<Vec<User>> {
        let envelope: UsersEnvelope = self.get(&["users"]).await?;
        Ok(envelope.users)
    }

    pub async fn user_stats(&self) -> ApiResult<UserStats> {
        let envelope: UserStatsEnvelope = self.get(&["users", "stats"]).await?;
        Ok(envelope.stats)
    }

    pub async fn user(&self, id: &str) -> ApiResult<User> {
        let envelope: UserEnvelope = self.get(&["users", id]).await?;
        Ok(envelope.user)
    }

    pub async fn register_user(&self, payload: &UserPayload) -> ApiResult<MessageResponse> {
        self.post(&["register"], payload).await
    }

    pub async fn update_user(&self, id: &str, payload: &UserPayload) -> ApiResult<MessageResponse> {
        self.put(&["users", id], payload).await
    }

    pub async fn set_user_status(&self, id: &str, status: UserStatus) -> ApiResult<MessageResponse> {
        self.put(&["users", id, "status"], &StatusChange { status })
            .await
    }

    pub async fn delete_user(&self, id: &str) -> ApiResult<MessageResponse> {
        self.delete(&["users", id]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let api = client("http://localhost:5000");
        assert_eq!(
            api.endpoint(&["sites", "api", "sites", "abc", "browse"]).as_str(),
            "http://localhost:5000/sites/api/sites/abc/browse"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_prefix() {
        let api = client("http://example.org/ftp");
        assert_eq!(
            api.endpoint(&["users", "stats"]).as_str(),
            "http://example.org/ftp/users/stats"
        );
    }

    #[test]
    fn test_endpoint_escapes_ids() {
        let api = client("http://localhost:5000/");
        assert_eq!(
            api.endpoint(&["tasks", "api", "tasks", "a b/c"]).as_str(),
            "http://localhost:5000/tasks/api/tasks/a%20b%2Fc"
        );
    }

    #[test]
    fn test_no_session_cookie_before_login() {
        assert!(client("http://localhost:5000").session_cookie().is_none());
    }

    #[test]
    fn test_rejects_non_base_url() {
        assert!(matches!(
            ApiClient::new("mailto:ops@example.org", Duration::from_secs(1)),
            Err(ApiError::Url(_))
        ));
        assert!(ApiClient::new("not a url", Duration::from_secs(1)).is_err());
    }
}
