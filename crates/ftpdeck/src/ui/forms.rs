//! Text inputs and the two dialog forms (task creation, user edit)

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::api::models::{Priority, Role, User, UserStatus};
use crate::settings::BrowserSettings;
use crate::tasks::submit::{MonitorOptions, TaskDraft, TaskType, DEFAULT_MONITOR_INTERVAL};
use crate::users::UserForm;

/// Single-line input; the cursor counts characters, not bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    value: String,
    cursor: usize,
    digits_only: bool,
}

impl TextInput {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            cursor: value.chars().count(),
            digits_only: false,
        }
    }

    pub fn numeric(value: &str) -> Self {
        Self {
            digits_only: true,
            ..Self::new(value)
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set(&mut self, value: &str) {
        *self = Self {
            digits_only: self.digits_only,
            ..Self::new(value)
        };
    }

    fn byte_index(&self) -> usize {
        self.value
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    pub fn insert(&mut self, c: char) {
        if self.digits_only && !c.is_ascii_digit() {
            return;
        }
        let at = self.byte_index();
        self.value.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index();
        self.value.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let at = self.byte_index();
            self.value.remove(at);
        }
    }

    /// Apply an editing key; returns false for keys it does not handle
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => self.insert(c),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.value.chars().count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.chars().count(),
            _ => return false,
        }
        true
    }

    pub fn with_cursor(&self) -> String {
        let mut display = self.value.clone();
        display.insert(self.byte_index(), '█');
        display
    }

    pub fn masked(&self, editing: bool) -> String {
        let stars = "*".repeat(self.value.chars().count());
        if editing {
            let mut display = stars;
            display.insert(self.cursor, '█');
            display
        } else {
            stars
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormOutcome {
    Continue,
    Submit,
    Cancel,
}

/// Shared navigation keys; `None` means the focused field gets the key
fn navigation(key: &KeyEvent) -> Option<NavKey> {
    match key.code {
        KeyCode::Esc => Some(NavKey::Cancel),
        KeyCode::Enter => Some(NavKey::Submit),
        KeyCode::Tab | KeyCode::Down => Some(NavKey::Next),
        KeyCode::BackTab | KeyCode::Up => Some(NavKey::Prev),
        _ => None,
    }
}

enum NavKey {
    Cancel,
    Submit,
    Next,
    Prev,
}

fn step<T: Copy + PartialEq>(fields: &[T], current: T, forward: bool) -> T {
    let pos = fields.iter().position(|f| *f == current).unwrap_or(0);
    let len = fields.len();
    if forward {
        fields[(pos + 1) % len]
    } else {
        fields[(pos + len - 1) % len]
    }
}

fn is_cycle_key(key: &KeyEvent) -> Option<bool> {
    match key.code {
        KeyCode::Right | KeyCode::Char(' ') => Some(true),
        KeyCode::Left => Some(false),
        _ => None,
    }
}

fn cycle<T: Copy + PartialEq>(options: &[T], current: T, forward: bool) -> T {
    step(options, current, forward)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    TaskType,
    LocalPath,
    Priority,
    AutoStart,
    MonitorInterval,
    FileFilter,
}

impl TaskField {
    pub fn label(&self) -> &'static str {
        match self {
            TaskField::TaskType => "Task type",
            TaskField::LocalPath => "Local path",
            TaskField::Priority => "Priority",
            TaskField::AutoStart => "Auto start",
            TaskField::MonitorInterval => "Check interval (s)",
            TaskField::FileFilter => "File filter",
        }
    }
}

/// The "create tasks from selection" dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFormState {
    pub draft: TaskDraft,
    pub field: TaskField,
    pub local_path: TextInput,
    pub interval: TextInput,
    pub file_filter: TextInput,
    /// Requests are in flight; further submits are ignored
    pub submitting: bool,
}

impl TaskFormState {
    pub fn new(defaults: &BrowserSettings) -> Self {
        let draft = TaskDraft {
            task_type: None,
            local_path: defaults.local_path.clone(),
            priority: defaults.priority,
            auto_start: defaults.auto_start,
            monitor: MonitorOptions {
                interval_secs: defaults.monitor_interval_secs,
                file_filter: String::new(),
            },
        };
        Self {
            field: TaskField::TaskType,
            local_path: TextInput::new(&draft.local_path),
            interval: TextInput::numeric(&draft.monitor.interval_secs.to_string()),
            file_filter: TextInput::default(),
            submitting: false,
            draft,
        }
    }

    /// Monitor options only apply to folder monitors
    pub fn fields(&self) -> Vec<TaskField> {
        let mut fields = vec![
            TaskField::TaskType,
            TaskField::LocalPath,
            TaskField::Priority,
            TaskField::AutoStart,
        ];
        if self.draft.task_type == Some(TaskType::FolderMonitor) {
            fields.push(TaskField::MonitorInterval);
            fields.push(TaskField::FileFilter);
        }
        fields
    }

    pub fn value_of(&self, field: TaskField) -> String {
        let editing = self.field == field;
        let text = |input: &TextInput| {
            if editing {
                input.with_cursor()
            } else {
                input.value().to_string()
            }
        };
        match field {
            TaskField::TaskType => self
                .draft
                .task_type
                .map(|t| t.label().to_string())
                .unwrap_or_else(|| "(choose with ←/→)".to_string()),
            TaskField::LocalPath => text(&self.local_path),
            TaskField::Priority => self.draft.priority.as_str().to_string(),
            TaskField::AutoStart => if self.draft.auto_start { "yes" } else { "no" }.to_string(),
            TaskField::MonitorInterval => text(&self.interval),
            TaskField::FileFilter => text(&self.file_filter),
        }
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> FormOutcome {
        if let Some(nav) = navigation(key) {
            match nav {
                NavKey::Cancel => return FormOutcome::Cancel,
                NavKey::Submit => {
                    self.sync();
                    return FormOutcome::Submit;
                }
                NavKey::Next => self.field = step(&self.fields(), self.field, true),
                NavKey::Prev => self.field = step(&self.fields(), self.field, false),
            }
            return FormOutcome::Continue;
        }

        match self.field {
            TaskField::TaskType => {
                if let Some(forward) = is_cycle_key(key) {
                    self.draft.task_type = Some(match self.draft.task_type {
                        None if forward => TaskType::FileDownload,
                        None => TaskType::FolderMonitor,
                        Some(current) => cycle(&TaskType::ALL, current, forward),
                    });
                }
            }
            TaskField::Priority => {
                if let Some(forward) = is_cycle_key(key) {
                    self.draft.priority = cycle(&Priority::ALL, self.draft.priority, forward);
                }
            }
            TaskField::AutoStart => {
                if is_cycle_key(key).is_some() {
                    self.draft.auto_start = !self.draft.auto_start;
                }
            }
            TaskField::LocalPath => {
                self.local_path.handle_key(key);
            }
            TaskField::MonitorInterval => {
                self.interval.handle_key(key);
            }
            TaskField::FileFilter => {
                self.file_filter.handle_key(key);
            }
        }
        FormOutcome::Continue
    }

    /// Copy the text inputs into the draft
    pub fn sync(&mut self) {
        self.draft.local_path = self.local_path.value().to_string();
        self.draft.monitor.interval_secs = self
            .interval
            .value()
            .parse()
            .unwrap_or(DEFAULT_MONITOR_INTERVAL);
        self.draft.monitor.file_filter = self.file_filter.value().trim().to_string();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Username,
    Password,
    ConfirmPassword,
    Role,
    Status,
    DownloadPath,
    MaxConcurrent,
}

impl UserField {
    pub const ALL: [UserField; 7] = [
        UserField::Username,
        UserField::Password,
        UserField::ConfirmPassword,
        UserField::Role,
        UserField::Status,
        UserField::DownloadPath,
        UserField::MaxConcurrent,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            UserField::Username => "Username",
            UserField::Password => "Password",
            UserField::ConfirmPassword => "Confirm password",
            UserField::Role => "Role",
            UserField::Status => "Status",
            UserField::DownloadPath => "Download path",
            UserField::MaxConcurrent => "Max concurrent tasks",
        }
    }
}

const STATUSES: [UserStatus; 3] = [UserStatus::Active, UserStatus::Disabled, UserStatus::Locked];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFormState {
    pub form: UserForm,
    pub field: UserField,
    /// Roles the current user may hand out
    pub roles: &'static [Role],
    pub username: TextInput,
    pub password: TextInput,
    pub confirm: TextInput,
    pub download_path: TextInput,
    pub max_concurrent: TextInput,
}

impl UserFormState {
    pub fn create(roles: &'static [Role]) -> Self {
        Self::from_form(UserForm::create(), roles)
    }

    pub fn edit(user: &User, roles: &'static [Role]) -> Self {
        Self::from_form(UserForm::edit(user), roles)
    }

    fn from_form(form: UserForm, roles: &'static [Role]) -> Self {
        Self {
            field: UserField::Username,
            roles,
            username: TextInput::new(&form.username),
            password: TextInput::default(),
            confirm: TextInput::default(),
            download_path: TextInput::new(&form.settings.default_download_path),
            max_concurrent: TextInput::numeric(&form.settings.max_concurrent_tasks.to_string()),
            form,
        }
    }

    pub fn value_of(&self, field: UserField) -> String {
        let editing = self.field == field;
        let text = |input: &TextInput| {
            if editing {
                input.with_cursor()
            } else {
                input.value().to_string()
            }
        };
        match field {
            UserField::Username => text(&self.username),
            UserField::Password => self.password.masked(editing),
            UserField::ConfirmPassword => self.confirm.masked(editing),
            UserField::Role => self.form.role.label().to_string(),
            UserField::Status => self.form.status.as_str().to_string(),
            UserField::DownloadPath => text(&self.download_path),
            UserField::MaxConcurrent => text(&self.max_concurrent),
        }
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> FormOutcome {
        if let Some(nav) = navigation(key) {
            match nav {
                NavKey::Cancel => return FormOutcome::Cancel,
                NavKey::Submit => {
                    self.sync();
                    return FormOutcome::Submit;
                }
                NavKey::Next => self.field = step(&UserField::ALL, self.field, true),
                NavKey::Prev => self.field = step(&UserField::ALL, self.field, false),
            }
            return FormOutcome::Continue;
        }

        match self.field {
            UserField::Role => {
                if let Some(forward) = is_cycle_key(key) {
                    if self.roles.contains(&self.form.role) {
                        self.form.set_role(cycle(self.roles, self.form.role, forward));
                    }
                }
            }
            UserField::Status => {
                if let Some(forward) = is_cycle_key(key) {
                    self.form.status = cycle(&STATUSES, self.form.status, forward);
                }
            }
            UserField::Username => {
                self.username.handle_key(key);
            }
            UserField::Password => {
                self.password.handle_key(key);
            }
            UserField::ConfirmPassword => {
                self.confirm.handle_key(key);
            }
            UserField::DownloadPath => {
                self.download_path.handle_key(key);
            }
            UserField::MaxConcurrent => {
                self.max_concurrent.handle_key(key);
            }
        }
        FormOutcome::Continue
    }

    pub fn sync(&mut self) {
        self.form.username = self.username.value().to_string();
        self.form.password = self.password.value().to_string();
        self.form.confirm_password = self.confirm.value().to_string();
        self.form.settings.default_download_path = self.download_path.value().trim().to_string();
        self.form.settings.max_concurrent_tasks = self.max_concurrent.value().parse().unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(input: &mut TextInput, text: &str) {
        for c in text.chars() {
            input.handle_key(&key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_text_input_editing() {
        let mut input = TextInput::new("/pub");
        type_text(&mut input, "/é");
        assert_eq!(input.value(), "/pub/é");

        input.handle_key(&key(KeyCode::Left));
        input.handle_key(&key(KeyCode::Backspace));
        assert_eq!(input.value(), "/pubé");
        assert_eq!(input.with_cursor(), "/pub█é");

        input.handle_key(&key(KeyCode::Home));
        input.handle_key(&key(KeyCode::Delete));
        assert_eq!(input.value(), "pubé");
    }

    #[test]
    fn test_numeric_input_rejects_letters() {
        let mut input = TextInput::numeric("");
        type_text(&mut input, "6x0");
        assert_eq!(input.value(), "60");
    }

    #[test]
    fn test_task_form_starts_without_type() {
        let mut form = TaskFormState::new(&BrowserSettings::default());
        assert_eq!(form.draft.task_type, None);
        assert_eq!(form.fields().len(), 4);

        form.handle_key(&key(KeyCode::Right));
        assert_eq!(form.draft.task_type, Some(TaskType::FileDownload));
        form.handle_key(&key(KeyCode::Right));
        form.handle_key(&key(KeyCode::Right));
        assert_eq!(form.draft.task_type, Some(TaskType::FolderMonitor));
        assert_eq!(form.fields().len(), 6);
    }

    #[test]
    fn test_task_form_syncs_inputs_on_submit() {
        let mut form = TaskFormState::new(&BrowserSettings::default());
        form.handle_key(&key(KeyCode::Left));
        assert_eq!(form.draft.task_type, Some(TaskType::FolderMonitor));

        form.handle_key(&key(KeyCode::Tab));
        assert_eq!(form.field, TaskField::LocalPath);
        form.local_path.set("");
        type_text(&mut form.local_path, "/srv/mirror");

        form.field = TaskField::MonitorInterval;
        form.interval.set("");
        type_text(&mut form.interval, "60");

        form.handle_key(&key(KeyCode::Tab));
        assert_eq!(form.field, TaskField::FileFilter);
        form.handle_key(&key(KeyCode::Char('*')));

        assert_eq!(form.handle_key(&key(KeyCode::Enter)), FormOutcome::Submit);
        assert_eq!(form.draft.local_path, "/srv/mirror");
        assert_eq!(form.draft.monitor.interval_secs, 60);
        assert_eq!(form.draft.monitor.file_filter, "*");
    }

    #[test]
    fn test_task_form_field_navigation_wraps() {
        let mut form = TaskFormState::new(&BrowserSettings::default());
        form.handle_key(&key(KeyCode::Up));
        assert_eq!(form.field, TaskField::AutoStart);
        form.handle_key(&key(KeyCode::Char(' ')));
        assert!(!form.draft.auto_start);
        assert_eq!(form.handle_key(&key(KeyCode::Esc)), FormOutcome::Cancel);
    }

    #[test]
    fn test_user_form_role_limited_to_assignable() {
        let mut state = UserFormState::create(&[Role::User]);
        state.field = UserField::Role;
        state.handle_key(&key(KeyCode::Right));
        assert_eq!(state.form.role, Role::User);

        let mut state = UserFormState::create(&Role::ALL);
        state.field = UserField::Role;
        state.handle_key(&key(KeyCode::Right));
        assert_eq!(state.form.role, Role::Admin);
        assert!(state.form.permissions.user_management);
    }

    #[test]
    fn test_user_form_submit_validates() {
        let mut state = UserFormState::create(&[Role::User]);
        type_text(&mut state.username, "operator");
        type_text(&mut state.password, "secret1");
        type_text(&mut state.confirm, "secret2");
        assert_eq!(state.handle_key(&key(KeyCode::Enter)), FormOutcome::Submit);
        assert_eq!(state.form.validate(), Err(ValidationError::PasswordMismatch));
        assert_eq!(state.value_of(UserField::Password), "*******");
    }

    #[test]
    fn test_user_form_bad_concurrency() {
        let mut state = UserFormState::create(&[Role::User]);
        type_text(&mut state.username, "operator");
        type_text(&mut state.password, "secret1");
        type_text(&mut state.confirm, "secret1");
        state.max_concurrent.set("");
        type_text(&mut state.max_concurrent, "12");
        state.sync();
        assert!(matches!(
            state.form.validate(),
            Err(ValidationError::OutOfRange { .. })
        ));
    }
}
