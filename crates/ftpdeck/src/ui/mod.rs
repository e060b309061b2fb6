mod forms;
mod grid;
mod render;
mod types;

pub use types::{AppMessage, Confirm, View};

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, widgets::ListState, Terminal};
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::api::models::{Role, Site, Task, TaskAction, TaskFilter, User, UserStats, UserStatus};
use crate::api::ApiClient;
use crate::browser::{Browser, LoadApplied, LoadFailure, LoadTicket, Modifiers, ViewMode};
use crate::dashboard::Dashboard;
use crate::events::{spawn_pollers, PollSource, Polled, Pollers, UpdateBus, UpdateEvent};
use crate::notify::{Level, Notifications};
use crate::settings::Settings;
use crate::sites::SiteList;
use crate::tasks::board::actions_for as task_actions;
use crate::tasks::submit::TaskType;
use crate::tasks::{submit_selection, TaskBoard};
use crate::users::{actions_for as user_actions, assignable_roles, UserAction, UserFilter};

use forms::{FormOutcome, TaskFormState, TextInput, UserFormState};
use grid::HitArea;

pub struct App {
    api: ApiClient,
    settings: Settings,
    /// Path to settings file for saving
    settings_path: PathBuf,
    /// Logged-in account, when the server told us
    profile: Option<User>,
    view: View,
    previous_view: View,
    status_message: String,
    notifications: Notifications,
    dashboard: Dashboard,
    sites: SiteList,
    tasks: TaskBoard,
    task_detail: Option<Task>,
    site_detail: Option<Site>,
    browser: Browser,
    browser_site_name: String,
    browser_list_state: ListState,
    /// Where browser entries were drawn last frame
    browser_hit: Option<HitArea>,
    grid_first_row: usize,
    grid_columns: usize,
    /// Address bar contents while it is being edited
    address_input: Option<TextInput>,
    task_form: Option<TaskFormState>,
    users: Vec<User>,
    user_stats: Option<UserStats>,
    user_filter: UserFilter,
    user_cursor: usize,
    user_search_mode: bool,
    user_form: Option<UserFormState>,
    user_detail: Option<User>,
    confirm: Option<Confirm>,
    /// Track if 'g' was pressed for 'gg' sequence
    g_pressed: bool,
    throbber_frame: usize,
    tx: mpsc::UnboundedSender<AppMessage>,
    rx: mpsc::UnboundedReceiver<AppMessage>,
    polled_tx: mpsc::UnboundedSender<Polled>,
    polled_rx: mpsc::UnboundedReceiver<Polled>,
    bus: UpdateBus,
    updates: broadcast::Receiver<UpdateEvent>,
    /// Current task list query; pollers refetch whenever it is replaced
    filter_tx: watch::Sender<TaskFilter>,
    pollers: Option<Pollers>,
}

impl App {
    pub fn new(
        api: ApiClient,
        settings: Settings,
        settings_path: PathBuf,
        profile: Option<User>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (polled_tx, polled_rx) = mpsc::unbounded_channel();
        let bus = UpdateBus::new();
        let updates = bus.subscribe();
        let tasks = TaskBoard::new();
        let (filter_tx, _) = watch::channel(tasks.filter());

        Self {
            api,
            browser: Browser::new(settings.browser.sort_field, settings.browser.view_mode),
            settings,
            settings_path,
            profile,
            view: View::Dashboard,
            previous_view: View::Dashboard,
            status_message: String::from("Press '?' for help | 1-5: switch view"),
            notifications: Notifications::default(),
            dashboard: Dashboard::new(),
            sites: SiteList::new(),
            tasks,
            task_detail: None,
            site_detail: None,
            browser_site_name: String::new(),
            browser_list_state: ListState::default(),
            browser_hit: None,
            grid_first_row: 0,
            grid_columns: 1,
            address_input: None,
            task_form: None,
            users: Vec::new(),
            user_stats: None,
            user_filter: UserFilter::default(),
            user_cursor: 0,
            user_search_mode: false,
            user_form: None,
            user_detail: None,
            confirm: None,
            g_pressed: false,
            throbber_frame: 0,
            tx,
            rx,
            polled_tx,
            polled_rx,
            bus,
            updates,
            filter_tx,
            pollers: None,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        self.pollers = Some(spawn_pollers(
            self.api.clone(),
            &self.settings.polling,
            self.filter_tx.subscribe(),
            self.bus.clone(),
            self.polled_tx.clone(),
        ));
        info!(server = %self.api.base_url(), "tui started");

        let result = self.run_event_loop(&mut terminal);

        self.pollers = None;
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    fn run_event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    ) -> Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(100))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key) {
                            info!("quit requested");
                            return Ok(());
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }

            self.tick(Instant::now());
        }
    }

    /// Drain everything background work produced since the last frame
    fn tick(&mut self, now: Instant) {
        if let Some(ticket) = self.browser.poll_clicks(now) {
            self.spawn_load(ticket);
        }
        self.sync_browser_cursor();

        while let Ok(message) = self.rx.try_recv() {
            self.handle_message(message);
        }
        while let Ok(polled) = self.polled_rx.try_recv() {
            self.handle_polled(polled);
        }
        loop {
            match self.updates.try_recv() {
                Ok(event) => self.handle_update(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "update subscriber lagged");
                }
                Err(_) => break,
            }
        }

        self.notifications.prune(now);
        self.throbber_frame = self.throbber_frame.wrapping_add(1);
    }

    fn open_overlay(&mut self, view: View) {
        if !self.view.is_overlay() && self.view != View::Help {
            self.previous_view = self.view;
        }
        self.view = view;
    }

    fn close_overlay(&mut self) {
        self.view = self.previous_view;
    }

    /// Returns true when the app should quit
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        match self.view {
            View::Help => self.close_overlay(),
            View::Confirm => self.handle_confirm_key(key),
            View::TaskForm => self.handle_task_form_key(key),
            View::UserForm => self.handle_user_form_key(key),
            View::TaskDetail | View::SiteDetail | View::UserDetail => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                    self.close_overlay();
                }
            }
            View::Browser if self.address_input.is_some() => self.handle_address_key(key),
            View::Users if self.user_search_mode => self.handle_user_search_key(key),
            _ => return self.handle_view_key(key),
        }
        false
    }

    fn handle_view_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('?') => {
                self.open_overlay(View::Help);
                return false;
            }
            KeyCode::Char(c @ '1'..='5') => {
                let index = c as usize - '1' as usize;
                self.switch_to(types::TABS[index].0);
                return false;
            }
            _ => {}
        }

        let g_sequence = key.code == KeyCode::Char('g');
        match self.view {
            View::Dashboard => self.handle_dashboard_key(key),
            View::Sites => self.handle_sites_key(key),
            View::Tasks => self.handle_tasks_key(key),
            View::Browser => self.handle_browser_key(key),
            View::Users => self.handle_users_key(key),
            _ => {}
        }
        if !g_sequence {
            self.g_pressed = false;
        }
        false
    }

    /// Returns true on the second 'g' of a 'gg'
    fn take_gg(&mut self) -> bool {
        if self.g_pressed {
            self.g_pressed = false;
            true
        } else {
            self.g_pressed = true;
            false
        }
    }

    fn switch_to(&mut self, view: View) {
        if view == View::Users && self.view != View::Users {
            self.load_users();
        }
        self.view = view;
    }

    fn handle_dashboard_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('r') {
            self.refresh_dashboard();
        }
    }

    fn handle_sites_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => self.sites.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.sites.move_cursor(-1),
            KeyCode::Char('g') => {
                if self.take_gg() {
                    self.sites.move_cursor(isize::MIN / 2);
                }
            }
            KeyCode::Char('G') => self.sites.move_cursor(isize::MAX / 2),
            KeyCode::Enter | KeyCode::Char('b') => {
                if let Some(site) = self.sites.selected().cloned() {
                    self.open_browser(&site);
                }
            }
            KeyCode::Char('t') => {
                if let Some(site) = self.sites.selected().cloned() {
                    self.spawn_site_test(site);
                }
            }
            KeyCode::Char('i') => {
                if let Some(site) = self.sites.selected() {
                    self.spawn_site_detail(site.id.clone());
                }
            }
            KeyCode::Char('T') => self.test_all_sites(),
            KeyCode::Char('f') => {
                self.sites.cycle_status_filter();
                self.status_message = format!(
                    "Site filter: {}",
                    self.sites.status_filter().unwrap_or("all")
                );
            }
            KeyCode::Char('r') => self.refresh_sites(),
            KeyCode::Char('x') => {
                if let Some(site) = self.sites.selected() {
                    self.confirm = Some(Confirm::DeleteSite {
                        id: site.id.clone(),
                        name: site.name.clone(),
                    });
                    self.open_overlay(View::Confirm);
                }
            }
            _ => {}
        }
    }

    fn handle_tasks_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => self.tasks.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.tasks.move_cursor(-1),
            KeyCode::Char('g') => {
                if self.take_gg() {
                    self.tasks.move_cursor(isize::MIN / 2);
                }
            }
            KeyCode::Char('G') => self.tasks.move_cursor(isize::MAX / 2),
            KeyCode::Right | KeyCode::Char('l') => {
                self.tasks.next_page();
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.tasks.prev_page();
            }
            KeyCode::Char('f') => {
                self.tasks.cycle_status_filter();
                self.refresh_tasks();
            }
            KeyCode::Char('p') => {
                self.tasks.cycle_priority_filter();
                self.refresh_tasks();
            }
            KeyCode::Char('y') => {
                self.cycle_type_filter();
                self.refresh_tasks();
            }
            KeyCode::Char('r') => self.refresh_tasks(),
            KeyCode::Enter => self.open_task_detail(),
            KeyCode::Char('P') => self.request_task_action(TaskAction::Pause),
            KeyCode::Char('R') => self.request_task_action(TaskAction::Resume),
            KeyCode::Char('c') => self.request_task_action(TaskAction::Cancel),
            KeyCode::Char('x') => self.request_task_action(TaskAction::Delete),
            _ => {}
        }
    }

    fn handle_browser_key(&mut self, key: KeyEvent) {
        let grid = self.browser.view_mode() == ViewMode::Grid;
        let columns = self.grid_columns.max(1) as isize;

        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                self.browser.move_cursor(if grid { columns } else { 1 })
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.browser.move_cursor(if grid { -columns } else { -1 })
            }
            KeyCode::Right | KeyCode::Char('l') if grid => self.browser.move_cursor(1),
            KeyCode::Left | KeyCode::Char('h') if grid => self.browser.move_cursor(-1),
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Enter => {
                let ticket = self.browser.activate(self.browser.cursor());
                self.follow(ticket);
            }
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Backspace | KeyCode::Char('u') => {
                let ticket = self.browser.up();
                self.follow(ticket);
            }
            KeyCode::Char('g') => {
                if self.take_gg() {
                    self.browser.cursor_top();
                }
            }
            KeyCode::Char('G') => self.browser.cursor_bottom(),
            KeyCode::Char(' ') => self.browser.toggle_at(self.browser.cursor()),
            KeyCode::Char('a') => self.browser.select_all(),
            KeyCode::Char('c') => self.browser.clear_selection(),
            KeyCode::Char('[') => {
                let ticket = self.browser.back();
                self.follow(ticket);
            }
            KeyCode::Char(']') => {
                let ticket = self.browser.forward();
                self.follow(ticket);
            }
            KeyCode::Char('r') => {
                let ticket = self.browser.retry();
                self.follow(ticket);
            }
            KeyCode::Char('e') => {
                if self.browser.site_id().is_some() {
                    self.address_input = Some(TextInput::new(self.browser.current_path()));
                } else {
                    self.status_message = "Choose a site in the Sites view first".to_string();
                }
            }
            KeyCode::Char('s') => {
                let next = self.browser.sort().field.next();
                self.browser.choose_sort(next);
                self.save_browser_prefs();
            }
            KeyCode::Char('d') => self.browser.toggle_sort_direction(),
            KeyCode::Char('v') => {
                self.browser.toggle_view_mode();
                self.grid_first_row = 0;
                self.save_browser_prefs();
            }
            KeyCode::Char('n') => {
                self.task_form = Some(TaskFormState::new(&self.settings.browser));
                self.open_overlay(View::TaskForm);
            }
            KeyCode::Esc => {
                if self.browser.selection().is_empty() {
                    self.view = View::Sites;
                } else {
                    self.browser.clear_selection();
                }
            }
            _ => {}
        }
        self.sync_browser_cursor();
    }

    fn handle_address_key(&mut self, key: KeyEvent) {
        let Some(input) = self.address_input.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.address_input = None,
            KeyCode::Enter => {
                let typed = input.value().to_string();
                self.address_input = None;
                let ticket = self.browser.submit_address(&typed);
                self.follow(ticket);
            }
            _ => {
                input.handle_key(&key);
            }
        }
    }

    fn handle_users_key(&mut self, key: KeyEvent) {
        let visible = self.user_filter.apply(&self.users).len();
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                self.user_cursor = (self.user_cursor + 1).min(visible.saturating_sub(1));
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.user_cursor = self.user_cursor.saturating_sub(1);
            }
            KeyCode::Char('/') => self.user_search_mode = true,
            KeyCode::Char('o') => {
                self.user_filter.cycle_role();
                self.user_cursor = 0;
            }
            KeyCode::Char('f') => {
                self.user_filter.cycle_status();
                self.user_cursor = 0;
            }
            KeyCode::Char('r') => self.load_users(),
            KeyCode::Char('n') => {
                let actor_role = self.profile.as_ref().map_or(Role::User, |p| p.role);
                self.user_form = Some(UserFormState::create(assignable_roles(actor_role)));
                self.open_overlay(View::UserForm);
            }
            KeyCode::Enter => {
                if let Some(user) = self.selected_user().cloned() {
                    self.user_detail = Some(user);
                    self.open_overlay(View::UserDetail);
                }
            }
            KeyCode::Char('e') => self.user_action(UserAction::Edit),
            KeyCode::Char('t') => {
                let toggle = match self.selected_user().map(|u| u.status) {
                    Some(UserStatus::Active) => UserAction::Disable,
                    _ => UserAction::Enable,
                };
                self.user_action(toggle);
            }
            KeyCode::Char('x') => self.user_action(UserAction::Delete),
            _ => {}
        }
    }

    fn handle_user_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.user_filter.search.clear();
                self.user_search_mode = false;
            }
            KeyCode::Enter => self.user_search_mode = false,
            KeyCode::Backspace => {
                self.user_filter.search.pop();
            }
            KeyCode::Char(c) => self.user_filter.search.push(c),
            _ => {}
        }
        self.user_cursor = 0;
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                self.close_overlay();
                if let Some(confirm) = self.confirm.take() {
                    self.execute_confirmed(confirm);
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.confirm = None;
                self.close_overlay();
            }
            _ => {}
        }
    }

    fn handle_task_form_key(&mut self, key: KeyEvent) {
        let Some(form) = self.task_form.as_mut() else {
            self.close_overlay();
            return;
        };
        match form.handle_key(&key) {
            FormOutcome::Continue => {}
            FormOutcome::Cancel => {
                self.task_form = None;
                self.close_overlay();
            }
            FormOutcome::Submit => self.submit_task_form(),
        }
    }

    fn handle_user_form_key(&mut self, key: KeyEvent) {
        let Some(state) = self.user_form.as_mut() else {
            self.close_overlay();
            return;
        };
        match state.handle_key(&key) {
            FormOutcome::Continue => {}
            FormOutcome::Cancel => {
                self.user_form = None;
                self.close_overlay();
            }
            FormOutcome::Submit => self.submit_user_form(),
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.view != View::Browser || self.address_input.is_some() {
            return;
        }
        let Some(hit) = self.browser_hit else {
            return;
        };
        let len = self.browser.listing().len();

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(index) = hit.index_at(mouse.column, mouse.row, len) {
                    let modifiers = Modifiers {
                        toggle: mouse
                            .modifiers
                            .intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER),
                        range: mouse.modifiers.contains(KeyModifiers::SHIFT),
                    };
                    let ticket = self.browser.press(index, modifiers, Instant::now());
                    self.follow(ticket);
                }
            }
            MouseEventKind::Down(MouseButton::Right) => {
                if let Some(index) = hit.index_at(mouse.column, mouse.row, len) {
                    self.browser.context_click(index);
                }
            }
            MouseEventKind::ScrollDown => self.browser.move_cursor(1),
            MouseEventKind::ScrollUp => self.browser.move_cursor(-1),
            _ => {}
        }
        self.sync_browser_cursor();
    }

    fn sync_browser_cursor(&mut self) {
        if self.browser.listing().is_empty() {
            self.browser_list_state.select(None);
        } else {
            self.browser_list_state.select(Some(self.browser.cursor()));
        }
    }

    fn handle_message(&mut self, message: AppMessage) {
        match message {
            AppMessage::Directory { ticket, result } => {
                let failure = result.as_ref().err().cloned();
                if self.browser.finish_load(&ticket, result) == LoadApplied::Applied {
                    self.grid_first_row = 0;
                    *self.browser_list_state.offset_mut() = 0;
                    self.sync_browser_cursor();
                    if let Some(failure) = failure {
                        self.notifications.push(Level::Error, failure.message);
                    }
                }
            }
            AppMessage::Batch(report) => {
                self.notifications.push(report.level(), report.message());
                if let Some(failure) = report.failures.first() {
                    self.status_message = format!("{}: {}", failure.name, failure.reason);
                }
                if report.any_succeeded() {
                    self.task_form = None;
                    self.browser.clear_selection();
                    self.view = View::Tasks;
                    self.refresh_tasks();
                } else if let Some(form) = self.task_form.as_mut() {
                    form.submitting = false;
                }
            }
            AppMessage::TaskAction { id, action, result } => match result {
                Ok(_) => {
                    self.notifications
                        .push(Level::Success, format!("Task {} {}", id, action.past_tense()));
                    self.refresh_tasks();
                }
                Err(e) => self.notifications.push(
                    Level::Error,
                    format!("Failed to {} task: {}", action.label().to_lowercase(), e),
                ),
            },
            AppMessage::TaskDetail(result) => match result {
                Ok(task) => {
                    self.task_detail = Some(task);
                    self.open_overlay(View::TaskDetail);
                }
                Err(e) => self
                    .notifications
                    .push(Level::Error, format!("Failed to load task: {}", e)),
            },
            AppMessage::SiteTest { name, result } => match result {
                Ok(message) => self
                    .notifications
                    .push(Level::Info, format!("{}: {}", name, message)),
                Err(e) => self
                    .notifications
                    .push(Level::Error, format!("{}: connection test failed: {}", name, e)),
            },
            AppMessage::SiteDetail(result) => match result {
                Ok(site) => {
                    self.site_detail = Some(site);
                    self.open_overlay(View::SiteDetail);
                }
                Err(e) => self
                    .notifications
                    .push(Level::Error, format!("Failed to load site: {}", e)),
            },
            AppMessage::SiteDeleted(result) => match result {
                Ok(message) => {
                    self.notifications.push(Level::Success, message);
                    self.refresh_sites();
                }
                Err(e) => self
                    .notifications
                    .push(Level::Error, format!("Failed to delete site: {}", e)),
            },
            AppMessage::Users(result) => match result {
                Ok(users) => {
                    self.users = users;
                    let visible = self.user_filter.apply(&self.users).len();
                    self.user_cursor = self.user_cursor.min(visible.saturating_sub(1));
                }
                Err(e) => self
                    .notifications
                    .push(Level::Error, format!("Failed to load users: {}", e)),
            },
            AppMessage::UserStats(stats) => self.user_stats = Some(stats),
            AppMessage::UserSaved(result) => match result {
                Ok(message) => {
                    self.notifications.push(Level::Success, message);
                    if self.view == View::UserForm {
                        self.user_form = None;
                        self.close_overlay();
                    }
                    self.load_users();
                }
                Err(e) => self.notifications.push(Level::Error, e),
            },
        }
    }

    fn handle_polled(&mut self, polled: Polled) {
        match polled {
            Polled::Stats(stats) => self.dashboard.apply_stats(stats),
            Polled::Tasks(tasks) => self.tasks.replace(tasks),
            Polled::RecentTasks(tasks) => self.dashboard.apply_recent(tasks),
            Polled::Sites(sites) => self.sites.replace(sites),
            Polled::ActiveTests(active) => self.sites.set_active_tests(active),
            Polled::Failed { source, message } => {
                self.status_message = format!("{} unavailable: {}", source.label(), message);
            }
        }
    }

    fn handle_update(&mut self, event: UpdateEvent) {
        match event {
            UpdateEvent::TaskStats(update) => self.dashboard.apply_task_update(&update),
            UpdateEvent::SystemStatus(status) => self.dashboard.apply_system_status(status),
        }
    }

    fn open_browser(&mut self, site: &Site) {
        let ticket = self.browser.choose_site(&site.id);
        self.browser_site_name = site.name.clone();
        self.browser_list_state = ListState::default();
        self.grid_first_row = 0;
        self.address_input = None;
        self.view = View::Browser;
        self.spawn_load(ticket);
    }

    /// Start the load a navigation asked for. `None` means nothing to do,
    /// or no site has been chosen yet.
    fn follow(&mut self, ticket: Option<LoadTicket>) {
        match ticket {
            Some(ticket) => self.spawn_load(ticket),
            None if self.browser.site_id().is_none() => {
                self.status_message = "Choose a site in the Sites view first".to_string();
            }
            None => {}
        }
    }

    fn spawn_load(&self, ticket: LoadTicket) {
        debug!(seq = ticket.seq, site = %ticket.site_id, path = %ticket.path, "loading directory");
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api
                .browse(&ticket.site_id, &ticket.path)
                .await
                .map(|response| response.files)
                .map_err(|e| LoadFailure::from(&e));
            let _ = tx.send(AppMessage::Directory { ticket, result });
        });
    }

    fn submit_task_form(&mut self) {
        let Some(form) = self.task_form.as_mut() else {
            return;
        };
        if form.submitting {
            return;
        }
        let items = self.browser.selection().items().to_vec();
        let site_id = self.browser.site_id().map(str::to_string);

        match form.draft.check(site_id.as_deref(), &items) {
            Err(e) => self.notifications.push(Level::Warning, e.to_string()),
            Ok(task_type) => {
                form.submitting = true;
                let draft = form.draft.clone();
                let site_id = site_id.unwrap_or_default();
                let api = self.api.clone();
                let tx = self.tx.clone();
                info!(
                    count = items.len(),
                    task_type = task_type.as_str(),
                    "creating tasks from selection"
                );
                tokio::spawn(async move {
                    let report = submit_selection(&api, &site_id, &draft, task_type, &items).await;
                    let _ = tx.send(AppMessage::Batch(report));
                });
            }
        }
    }

    fn refresh_tasks(&mut self) {
        self.filter_tx.send_replace(self.tasks.filter());
    }

    fn cycle_type_filter(&mut self) {
        let next = match self.tasks.type_filter() {
            None => Some(TaskType::ALL[0]),
            Some(current) => TaskType::ALL
                .iter()
                .position(|t| t.as_str() == current)
                .and_then(|i| TaskType::ALL.get(i + 1).copied()),
        };
        self.tasks
            .set_type_filter(next.map(|t| t.as_str().to_string()));
    }

    fn request_task_action(&mut self, action: TaskAction) {
        let Some(task) = self.tasks.selected() else {
            return;
        };
        if !task_actions(task).contains(&action) {
            self.status_message = format!(
                "{} is not available for a {} task",
                action.label(),
                task.status.as_str()
            );
            return;
        }

        let id = task.id.clone();
        if action.needs_confirmation() {
            self.confirm = Some(Confirm::TaskAction { id, action });
            self.open_overlay(View::Confirm);
        } else {
            self.spawn_task_action(id, action);
        }
    }

    fn spawn_task_action(&self, id: String, action: TaskAction) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api
                .task_action(&id, action)
                .await
                .map(|response| response.message)
                .map_err(|e| e.to_string());
            let _ = tx.send(AppMessage::TaskAction { id, action, result });
        });
    }

    fn open_task_detail(&mut self) {
        let Some(task) = self.tasks.selected() else {
            return;
        };
        if !task.has_id {
            // Nothing to fetch; show what we have
            self.task_detail = Some(task.clone());
            self.open_overlay(View::TaskDetail);
            return;
        }
        let id = task.id.clone();
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api.task(&id).await.map_err(|e| e.to_string());
            let _ = tx.send(AppMessage::TaskDetail(result));
        });
    }

    fn execute_confirmed(&mut self, confirm: Confirm) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        match confirm {
            Confirm::TaskAction { id, action } => self.spawn_task_action(id, action),
            Confirm::DeleteUser { id, .. } => {
                tokio::spawn(async move {
                    let result = api
                        .delete_user(&id)
                        .await
                        .map(|response| response.message)
                        .map_err(|e| format!("Failed to delete user: {}", e));
                    let _ = tx.send(AppMessage::UserSaved(result));
                });
            }
            Confirm::DeleteSite { id, .. } => {
                tokio::spawn(async move {
                    let result = api
                        .delete_site(&id)
                        .await
                        .map(|response| response.message)
                        .map_err(|e| e.to_string());
                    let _ = tx.send(AppMessage::SiteDeleted(result));
                });
            }
        }
    }

    fn spawn_site_test(&self, site: Site) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api
                .test_site(&site.id)
                .await
                .map(|response| response.message)
                .map_err(|e| e.to_string());
            let _ = tx.send(AppMessage::SiteTest {
                name: site.name,
                result,
            });
        });
    }

    fn spawn_site_detail(&self, id: String) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api.site(&id).await.map_err(|e| e.to_string());
            let _ = tx.send(AppMessage::SiteDetail(result));
        });
    }

    fn test_all_sites(&mut self) {
        let count = match self.sites.check_test_all() {
            Ok(count) => count,
            Err(e) => {
                self.notifications.push(Level::Warning, e.to_string());
                return;
            }
        };
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api
                .test_all_sites()
                .await
                .map(|response| response.message)
                .map_err(|e| e.to_string());
            let _ = tx.send(AppMessage::SiteTest {
                name: format!("{} sites", count),
                result,
            });
        });
    }

    fn refresh_sites(&self) {
        let api = self.api.clone();
        let tx = self.polled_tx.clone();
        tokio::spawn(async move {
            let polled = match api.sites().await {
                Ok(sites) => Polled::Sites(sites),
                Err(e) => Polled::Failed {
                    source: PollSource::Sites,
                    message: e.to_string(),
                },
            };
            let _ = tx.send(polled);
        });
    }

    fn refresh_dashboard(&self) {
        let api = self.api.clone();
        let tx = self.polled_tx.clone();
        let bus = self.bus.clone();
        tokio::spawn(async move {
            let polled = match api.dashboard_stats().await {
                Ok(stats) => Polled::Stats(stats),
                Err(e) => Polled::Failed {
                    source: PollSource::Stats,
                    message: e.to_string(),
                },
            };
            let _ = tx.send(polled);
            if let Ok(tasks) = api.recent_tasks().await {
                let _ = tx.send(Polled::RecentTasks(tasks));
            }
            if let Ok(status) = api.system_status().await {
                bus.publish(UpdateEvent::SystemStatus(status));
            }
        });
    }

    fn load_users(&self) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api.users().await.map_err(|e| e.to_string());
            let _ = tx.send(AppMessage::Users(result));
            match api.user_stats().await {
                Ok(stats) => {
                    let _ = tx.send(AppMessage::UserStats(stats));
                }
                Err(e) => debug!(error = %e, "user stats unavailable"),
            }
        });
    }

    fn selected_user(&self) -> Option<&User> {
        self.user_filter
            .apply(&self.users)
            .get(self.user_cursor)
            .copied()
    }

    /// Row actions the logged-in account may take on `target`
    fn allowed_user_actions(&self, target: &User) -> Vec<UserAction> {
        match &self.profile {
            Some(actor) => user_actions(actor, target),
            None => vec![UserAction::Details],
        }
    }

    fn user_action(&mut self, action: UserAction) {
        let Some(target) = self.selected_user().cloned() else {
            return;
        };
        if !self.allowed_user_actions(&target).contains(&action) {
            self.status_message = format!("{} is not allowed for {}", action.label(), target.username);
            return;
        }

        match action {
            UserAction::Details => {
                self.user_detail = Some(target);
                self.open_overlay(View::UserDetail);
            }
            UserAction::Edit => {
                let actor_role = self.profile.as_ref().map_or(Role::User, |p| p.role);
                self.user_form = Some(UserFormState::edit(&target, assignable_roles(actor_role)));
                self.open_overlay(View::UserForm);
            }
            UserAction::Enable | UserAction::Disable => {
                let status = if action == UserAction::Enable {
                    UserStatus::Active
                } else {
                    UserStatus::Disabled
                };
                let api = self.api.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = api
                        .set_user_status(&target.id, status)
                        .await
                        .map(|response| response.message)
                        .map_err(|e| format!("Failed to update {}: {}", target.username, e));
                    let _ = tx.send(AppMessage::UserSaved(result));
                });
            }
            UserAction::Delete => {
                self.confirm = Some(Confirm::DeleteUser {
                    id: target.id,
                    username: target.username,
                });
                self.open_overlay(View::Confirm);
            }
        }
    }

    fn submit_user_form(&mut self) {
        let Some(state) = self.user_form.as_ref() else {
            return;
        };
        let payload = match state.form.payload() {
            Ok(payload) => payload,
            Err(e) => {
                self.notifications.push(Level::Warning, e.to_string());
                return;
            }
        };
        let user_id = state.form.user_id.clone();
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = match &user_id {
                Some(id) => api.update_user(id, &payload).await,
                None => api.register_user(&payload).await,
            };
            let result = result
                .map(|response| response.message)
                .map_err(|e| format!("Failed to save user: {}", e));
            let _ = tx.send(AppMessage::UserSaved(result));
        });
    }

    fn save_browser_prefs(&mut self) {
        self.settings.browser.sort_field = self.browser.sort().field;
        self.settings.browser.view_mode = self.browser.view_mode();
        if let Err(e) = self.settings.save(&self.settings_path) {
            self.status_message = format!("Failed to save settings: {}", e);
        }
    }
}
