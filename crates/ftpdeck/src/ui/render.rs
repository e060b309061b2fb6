//! Drawing for every view. Only reads `App` state, except for recording
//! where browser entries landed so mouse clicks can be mapped back.

use chrono::Utc;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::forms::{TaskFormState, UserField, UserFormState};
use super::grid::{GridLayout, HitArea, CELL_WIDTH};
use super::types::TABS;
use super::{App, View};
use crate::api::models::{Task, TaskStatus, User, UserStatus};
use crate::browser::{DirEntry, LoadState, ViewMode};
use crate::format::{
    format_datetime, format_relative, format_size, progress_bar, smart_truncate_path,
};
use crate::tasks::board::{actions_for, remote_path, site_name, task_type_label};

const THROBBER: [char; 8] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧'];
const TOAST_WIDTH: u16 = 44;

fn highlight() -> Style {
    Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD)
}

fn header(text: &str) -> Line<'static> {
    Line::from(vec![Span::styled(
        text.to_string(),
        Style::default().fg(Color::Yellow),
    )])
}

fn field(label: &str, value: impl Into<String>) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<14}", label), Style::default().fg(Color::Gray)),
        Span::styled(value.into(), Style::default().fg(Color::White)),
    ])
}

fn hint(text: &str) -> Line<'static> {
    Line::from(vec![Span::styled(
        text.to_string(),
        Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::ITALIC),
    )])
}

fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Running => Color::Blue,
        TaskStatus::Completed => Color::Green,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Paused | TaskStatus::Pending => Color::Yellow,
        TaskStatus::Cancelled | TaskStatus::Unknown => Color::Gray,
    }
}

fn site_status_color(status: &str) -> Color {
    match status {
        "connected" => Color::Green,
        "disconnected" | "error" => Color::Red,
        "testing" => Color::Yellow,
        _ => Color::Gray,
    }
}

/// Pad or cut `text` to exactly `width` characters
fn fit(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len > width {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    } else {
        format!("{}{}", text, " ".repeat(width - len))
    }
}

/// A `percent_x` by `height` box in the middle of `area`
fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height.min(area.height)),
            Constraint::Fill(1),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

impl App {
    pub(super) fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Tabs
                Constraint::Min(0),    // Main content
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_tabs(f, chunks[0]);

        let base = if self.view.is_overlay() || self.view == View::Help {
            self.previous_view
        } else {
            self.view
        };
        if self.view == View::Help {
            self.render_help(f, chunks[1]);
        } else {
            self.render_view(base, f, chunks[1]);
        }

        match self.view {
            View::TaskForm => self.render_task_form(f, chunks[1]),
            View::TaskDetail => self.render_task_detail(f, chunks[1]),
            View::SiteDetail => self.render_site_detail(f, chunks[1]),
            View::UserForm => self.render_user_form(f, chunks[1]),
            View::UserDetail => self.render_user_detail(f, chunks[1]),
            View::Confirm => self.render_confirm(f, chunks[1]),
            _ => {}
        }

        if self.view == View::Users && self.user_search_mode {
            self.render_search_bar(f, chunks[2]);
        } else {
            self.render_status_bar(f, chunks[2]);
        }
        self.render_notifications(f, chunks[1]);
    }

    fn render_view(&mut self, view: View, f: &mut Frame, area: Rect) {
        match view {
            View::Dashboard => self.render_dashboard(f, area),
            View::Sites => self.render_sites(f, area),
            View::Tasks => self.render_tasks(f, area),
            View::Browser => self.render_browser(f, area),
            View::Users => self.render_users(f, area),
            _ => {}
        }
    }

    fn render_tabs(&self, f: &mut Frame, area: Rect) {
        let active = self.view.tab_index().or(self.previous_view.tab_index());
        let mut spans = vec![Span::styled(
            " ftpdeck ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )];
        for (i, (_, label)) in TABS.iter().enumerate() {
            let style = if Some(i) == active {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            spans.push(Span::raw(" "));
            spans.push(Span::styled(format!(" {} ", label), style));
        }
        if let Some(profile) = &self.profile {
            spans.push(Span::styled(
                format!("  {} ({})", profile.username, profile.role.label()),
                Style::default().fg(Color::DarkGray),
            ));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_dashboard(&self, f: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Length(9),
                Constraint::Min(0),
            ])
            .split(area);

        let cards = self.dashboard.cards();
        let card_areas = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 4); 4])
            .split(rows[0]);
        let values = [
            ("Total tasks", cards.total_tasks.to_string(), Color::Cyan),
            ("Running", cards.running_tasks.to_string(), Color::Blue),
            ("FTP sites", cards.total_sites.to_string(), Color::Magenta),
            ("Efficiency", cards.efficiency_label(), Color::Green),
        ];
        for ((title, value, color), card) in values.into_iter().zip(card_areas.iter()) {
            let paragraph = Paragraph::new(Line::from(Span::styled(
                value,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(title));
            f.render_widget(paragraph, *card);
        }

        let middle = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]);

        let mut system = Vec::new();
        match self.dashboard.system() {
            Some(status) => {
                system.push(field("CPU", format!("{} {:.1}%", progress_bar(status.cpu_percent, 20), status.cpu_percent)));
                system.push(field("Memory", format!("{} {:.1}%", progress_bar(status.memory_percent, 20), status.memory_percent)));
                system.push(field("Disk", format!("{} {:.1}%", progress_bar(status.disk_percent, 20), status.disk_percent)));
                system.push(field("Process", format!("{:.1} MB", status.process_memory_mb)));
                system.push(field(
                    "Scheduler",
                    if status.scheduler_running { "running" } else { "stopped" },
                ));
                system.push(field("Workers", status.worker_count.to_string()));
                if let Some(uptime) = &status.uptime {
                    system.push(field("Uptime", uptime.clone()));
                }
            }
            None => system.push(hint("Waiting for system status...")),
        }
        f.render_widget(
            Paragraph::new(system).block(Block::default().borders(Borders::ALL).title("System")),
            middle[0],
        );

        let mut details = Vec::new();
        match self.dashboard.stats() {
            Some(stats) => {
                details.push(field("Pending", stats.tasks.pending_tasks.to_string()));
                details.push(field("Completed", stats.tasks.completed_tasks.to_string()));
                details.push(field("Failed", stats.tasks.failed_tasks.to_string()));
                details.push(field(
                    "Sites",
                    format!(
                        "{} connected, {} disconnected",
                        stats.sites.connected_sites, stats.sites.disconnected_sites
                    ),
                ));
                details.push(field(
                    "Monitors",
                    format!(
                        "{} active of {}",
                        stats.monitors.active_monitors, stats.monitors.total_monitors
                    ),
                ));
                details.push(field(
                    "Queue",
                    format!(
                        "{} queued, {} workers",
                        stats.scheduler.queue_size, stats.scheduler.active_workers
                    ),
                ));
            }
            None => details.push(hint("Waiting for statistics...")),
        }
        f.render_widget(
            Paragraph::new(details).block(Block::default().borders(Borders::ALL).title("Details")),
            middle[1],
        );

        let now = Utc::now();
        let items: Vec<ListItem> = self
            .dashboard
            .recent()
            .iter()
            .map(|task| {
                ListItem::new(Line::from(vec![
                    Span::raw(fit(&task_type_label(&task.task_type), 18)),
                    Span::styled(
                        fit(task.status.as_str(), 11),
                        Style::default().fg(status_color(task.status)),
                    ),
                    Span::raw(fit(&remote_path(task), 40)),
                    Span::styled(
                        format_relative(task.created_at.as_deref(), now),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();
        let recent = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Recent tasks | r: refresh"),
        );
        f.render_widget(recent, rows[2]);
    }

    fn render_sites(&self, f: &mut Frame, area: Rect) {
        let visible = self.sites.visible();
        let items: Vec<ListItem> = visible
            .iter()
            .map(|site| {
                let status = self.sites.display_status(site);
                let checked = site
                    .connection_time
                    .map(|t| format!("{:.2}s", t))
                    .unwrap_or_default();
                ListItem::new(Line::from(vec![
                    Span::raw(fit(&site.name, 22)),
                    Span::raw(fit(&format!("{}://{}:{}", site.protocol, site.host, site.port), 36)),
                    Span::styled(fit(site.group_name(), 14), Style::default().fg(Color::Cyan)),
                    Span::styled(
                        fit(status, 14),
                        Style::default().fg(site_status_color(status)),
                    ),
                    Span::styled(checked, Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect();

        let stats = self.sites.stats();
        let title = format!(
            "Sites ({}) | {} connected | {} disconnected | {} groups | filter: {}",
            stats.total,
            stats.connected,
            stats.disconnected,
            stats.groups,
            self.sites.status_filter().unwrap_or("all")
        );
        let testing = self.sites.active_test_count();
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .title_top(
                        Line::from(if testing > 0 {
                            format!(" {} testing {} ", self.throbber(), testing)
                        } else {
                            String::new()
                        })
                        .right_aligned(),
                    ),
            )
            .highlight_style(highlight())
            .highlight_symbol(">> ");

        let mut state = ListState::default();
        if !visible.is_empty() {
            state.select(Some(self.sites.cursor()));
        }
        f.render_stateful_widget(list, area, &mut state);
    }

    fn render_tasks(&self, f: &mut Frame, area: Rect) {
        let sites = self.sites.all();
        let items: Vec<ListItem> = self
            .tasks
            .page_rows()
            .iter()
            .map(|task| {
                let style = if task.placeholder {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(vec![
                    Span::styled(fit(&task.id, 10), style),
                    Span::raw(fit(&task_type_label(&task.task_type), 17)),
                    Span::raw(fit(&site_name(task, sites), 16)),
                    Span::styled(
                        fit(task.status.as_str(), 10),
                        Style::default().fg(status_color(task.status)),
                    ),
                    Span::raw(format!("{} {:>3.0}% ", progress_bar(task.progress, 10), task.progress)),
                    Span::raw(smart_truncate_path(&remote_path(task), 40)),
                ]))
            })
            .collect();

        let counts = self.tasks.counts();
        let title = format!(
            "Tasks ({}) | {} running | {} pending | {} failed | status: {} | priority: {} | type: {}",
            counts.total,
            counts.running,
            counts.pending,
            counts.failed,
            self.tasks.status_filter().map_or("all", |s| s.as_str()),
            self.tasks.priority_filter().map_or("all", |p| p.as_str()),
            self.tasks.type_filter().unwrap_or("all"),
        );
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .title_bottom(
                        Line::from(format!(
                            " page {}/{} ",
                            self.tasks.page(),
                            self.tasks.total_pages().max(1)
                        ))
                        .right_aligned(),
                    ),
            )
            .highlight_style(highlight())
            .highlight_symbol(">> ");

        let mut state = ListState::default();
        if !self.tasks.page_rows().is_empty() {
            state.select(Some(self.tasks.cursor()));
        }
        f.render_stateful_widget(list, area, &mut state);
    }

    fn render_browser(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Navigation and address
                Constraint::Length(1), // Breadcrumbs
                Constraint::Min(0),    // Entries
                Constraint::Length(1), // Summary
            ])
            .split(area);

        if self.browser.site_id().is_none() {
            self.browser_hit = None;
            let paragraph = Paragraph::new(vec![
                Line::from(""),
                hint("No site chosen. Pick one in the Sites view (2) and press Enter."),
            ])
            .block(Block::default().borders(Borders::ALL).title("Browser"));
            f.render_widget(paragraph, chunks[2]);
            return;
        }

        let buttons = self.browser.buttons();
        let button = |label: &'static str, enabled: bool| {
            Span::styled(
                label,
                if enabled {
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::DarkGray)
                },
            )
        };
        let address = match &self.address_input {
            Some(input) => Span::styled(input.with_cursor(), Style::default().fg(Color::Yellow)),
            None => Span::styled(
                self.browser.current_path().to_string(),
                Style::default().fg(Color::Cyan),
            ),
        };
        let nav = Line::from(vec![
            button("◀ ", buttons.back),
            button("▶ ", buttons.forward),
            button("▲ ", buttons.up),
            Span::styled(
                format!(" {} ", self.browser_site_name),
                Style::default().fg(Color::Magenta),
            ),
            address,
        ]);
        f.render_widget(Paragraph::new(nav), chunks[0]);

        let mut crumbs = Vec::new();
        for (i, crumb) in self.browser.breadcrumbs().into_iter().enumerate() {
            if i > 0 {
                crumbs.push(Span::styled(" › ", Style::default().fg(Color::DarkGray)));
            }
            crumbs.push(Span::styled(crumb.label, Style::default().fg(Color::Gray)));
        }
        f.render_widget(Paragraph::new(Line::from(crumbs)), chunks[1]);

        let block = Block::default().borders(Borders::ALL).title(format!(
            "{} | Enter: open | Space: select | n: create tasks",
            self.browser_site_name
        ));

        match self.browser.load_state().clone() {
            LoadState::Failed(failure) => {
                self.browser_hit = None;
                let paragraph = Paragraph::new(vec![
                    Line::from(""),
                    Line::from(Span::styled(failure.message, Style::default().fg(Color::Red))),
                    Line::from(""),
                    hint("Press r to retry"),
                ])
                .block(block)
                .wrap(Wrap { trim: true });
                f.render_widget(paragraph, chunks[2]);
            }
            LoadState::Loading(_) if self.browser.listing().is_empty() => {
                self.browser_hit = None;
                let paragraph = Paragraph::new(vec![
                    Line::from(""),
                    Line::from(Span::styled(
                        format!("{} Loading {}", self.throbber(), self.browser.current_path()),
                        Style::default().fg(Color::Yellow),
                    )),
                ])
                .block(block);
                f.render_widget(paragraph, chunks[2]);
            }
            _ if self.browser.listing().is_empty() => {
                self.browser_hit = None;
                let paragraph =
                    Paragraph::new(vec![Line::from(""), hint("This directory is empty")]).block(block);
                f.render_widget(paragraph, chunks[2]);
            }
            _ => match self.browser.view_mode() {
                ViewMode::List => self.render_browser_list(f, chunks[2], block),
                ViewMode::Grid => self.render_browser_grid(f, chunks[2], block),
            },
        }

        let sort = self.browser.sort();
        let mut footer = vec![
            Span::styled(self.browser.status_summary(), Style::default().fg(Color::White)),
            Span::styled(
                format!(
                    " | sort: {} {} | view: {}",
                    sort.field.display_name(),
                    sort.direction.display_name(),
                    match self.browser.view_mode() {
                        ViewMode::List => "list",
                        ViewMode::Grid => "grid",
                    }
                ),
                Style::default().fg(Color::Gray),
            ),
        ];
        if self.browser.is_loading() {
            footer.push(Span::styled(
                format!(" {}", self.throbber()),
                Style::default().fg(Color::Yellow),
            ));
        }
        f.render_widget(Paragraph::new(Line::from(footer)), chunks[3]);
    }

    fn entry_style(&self, entry: &DirEntry) -> Style {
        if self.browser.is_selected(entry) {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else if entry.is_directory {
            Style::default().fg(Color::Blue)
        } else {
            Style::default()
        }
    }

    fn render_browser_list(&mut self, f: &mut Frame, area: Rect, block: Block) {
        let inner = block.inner(area);
        let name_width = (inner.width as usize).saturating_sub(3 + 4 + 2 + 12 + 20 + 12).max(12);

        let items: Vec<ListItem> = self
            .browser
            .display()
            .into_iter()
            .map(|entry| {
                let mark = if self.browser.is_selected(entry) { "[x]" } else { "[ ]" };
                let size = if entry.is_directory {
                    String::new()
                } else {
                    format_size(entry.size)
                };
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{} {} ", mark, entry.icon())),
                    Span::styled(fit(&entry.name, name_width), self.entry_style(entry)),
                    Span::raw(format!("{:>10}  ", size)),
                    Span::styled(
                        fit(&format_datetime(entry.modified_time.as_deref()), 20),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(fit(&entry.type_label(), 12), Style::default().fg(Color::Gray)),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(highlight())
            .highlight_symbol(">> ");

        f.render_stateful_widget(list, area, &mut self.browser_list_state);
        self.grid_columns = 1;
        self.browser_hit = Some(HitArea::List {
            inner,
            offset: self.browser_list_state.offset(),
        });
    }

    fn render_browser_grid(&mut self, f: &mut Frame, area: Rect, block: Block) {
        let inner = block.inner(area);
        let cursor = self.browser.cursor();
        let layout = GridLayout::new(inner, cursor, self.grid_first_row);
        self.grid_first_row = layout.first_row;
        self.grid_columns = layout.columns;

        let display = self.browser.display();
        let cell = CELL_WIDTH as usize - 1;
        let lines: Vec<Line> = layout
            .rows(display.len())
            .into_iter()
            .map(|row| {
                let mut spans = Vec::new();
                for index in row {
                    let entry = display[index];
                    let mut style = self.entry_style(entry);
                    if index == cursor {
                        style = style.patch(highlight());
                    }
                    spans.push(Span::styled(
                        fit(&format!("{} {}", entry.icon(), entry.name), cell),
                        style,
                    ));
                    spans.push(Span::raw(" "));
                }
                Line::from(spans)
            })
            .collect();

        f.render_widget(Paragraph::new(lines).block(block), area);
        self.browser_hit = Some(HitArea::Grid(layout));
    }

    fn render_users(&self, f: &mut Frame, area: Rect) {
        let visible = self.user_filter.apply(&self.users);
        let now = Utc::now();
        let items: Vec<ListItem> = visible
            .iter()
            .map(|user| {
                let status_color = match user.status {
                    UserStatus::Active => Color::Green,
                    UserStatus::Disabled => Color::Gray,
                    UserStatus::Locked => Color::Red,
                };
                ListItem::new(Line::from(vec![
                    Span::raw(fit(&user.username, 24)),
                    Span::styled(fit(user.role.label(), 14), Style::default().fg(Color::Cyan)),
                    Span::styled(fit(user.status.as_str(), 10), Style::default().fg(status_color)),
                    Span::styled(
                        format!("last login {}", format_relative(user.last_login.as_deref(), now)),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();

        let title = match &self.user_stats {
            Some(stats) => format!(
                "Users ({}) | {} active | {} admins | {} inactive",
                stats.total,
                stats.active,
                stats.admins(),
                stats.inactive()
            ),
            None => format!("Users ({})", self.users.len()),
        };
        let filters = format!(
            " search: {} | role: {} | status: {} ",
            if self.user_filter.search.is_empty() { "-" } else { self.user_filter.search.as_str() },
            self.user_filter.role.map_or("all", |r| r.label()),
            self.user_filter.status.map_or("all", |s| s.as_str()),
        );
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .title_bottom(Line::from(filters).right_aligned()),
            )
            .highlight_style(highlight())
            .highlight_symbol(">> ");

        let mut state = ListState::default();
        if !visible.is_empty() {
            state.select(Some(self.user_cursor));
        }
        f.render_stateful_widget(list, area, &mut state);
    }

    fn render_help(&self, f: &mut Frame, area: Rect) {
        let help_text = vec![
            Line::from(vec![Span::styled(
                "ftpdeck - Keyboard Shortcuts",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            header("Views:"),
            Line::from("  1-5         Dashboard, Sites, Tasks, Browser, Users"),
            Line::from("  j/k ↓/↑     Move down/up"),
            Line::from("  gg / G      Jump to top / bottom"),
            Line::from("  r           Refresh"),
            Line::from(""),
            header("Sites:"),
            Line::from("  Enter/b     Browse site"),
            Line::from("  i           Site details"),
            Line::from("  t / T       Test connection / test all"),
            Line::from("  f           Cycle status filter"),
            Line::from("  x           Delete site"),
            Line::from(""),
            header("Browser:"),
            Line::from("  Enter/l     Open folder"),
            Line::from("  u/Backspace Parent folder"),
            Line::from("  [ / ]       Back / forward"),
            Line::from("  e           Edit address"),
            Line::from("  Space       Select entry (mouse: click, Ctrl toggle, Shift range)"),
            Line::from("  a / c       Select all / clear selection"),
            Line::from("  s / d       Next sort field / flip direction"),
            Line::from("  v           Toggle list / grid"),
            Line::from("  n           Create tasks from selection"),
            Line::from(""),
            header("Tasks:"),
            Line::from("  h/l ←/→     Previous / next page"),
            Line::from("  f / p / y   Cycle status / priority / type filter"),
            Line::from("  Enter       Task details"),
            Line::from("  P / R       Pause / resume"),
            Line::from("  c / x       Cancel / delete"),
            Line::from(""),
            header("Users:"),
            Line::from("  /           Search"),
            Line::from("  o / f       Cycle role / status filter"),
            Line::from("  n / e       New user / edit"),
            Line::from("  t / x       Enable or disable / delete"),
            Line::from(""),
            header("General:"),
            Line::from("  ?           Show this help"),
            Line::from("  q / Ctrl+C  Quit"),
            Line::from(""),
            hint("Press any key to close"),
        ];

        let paragraph = Paragraph::new(help_text)
            .block(Block::default().borders(Borders::ALL).title("Help (?)"))
            .wrap(Wrap { trim: true });

        f.render_widget(paragraph, area);
    }

    fn render_task_form(&self, f: &mut Frame, area: Rect) {
        let Some(form) = &self.task_form else {
            return;
        };
        let popup = centered_rect(60, 16, area);
        f.render_widget(Clear, popup);

        let mut lines = vec![
            Line::from(Span::styled(
                format!(
                    "{} item(s) selected in {}",
                    self.browser.selection().len(),
                    self.browser.current_path()
                ),
                Style::default().fg(Color::Cyan),
            )),
            Line::from(""),
        ];
        lines.extend(task_form_lines(form));
        lines.push(Line::from(""));
        if form.submitting {
            lines.push(Line::from(Span::styled(
                format!("{} Creating tasks...", self.throbber()),
                Style::default().fg(Color::Yellow),
            )));
        } else {
            lines.push(hint("Tab/↑↓: field | ←/→: change | Enter: create | Esc: cancel"));
        }

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Create Tasks"));
        f.render_widget(paragraph, popup);
    }

    fn render_user_form(&self, f: &mut Frame, area: Rect) {
        let Some(state) = &self.user_form else {
            return;
        };
        let popup = centered_rect(60, 13, area);
        f.render_widget(Clear, popup);

        let mut lines = user_form_lines(state);
        lines.push(Line::from(""));
        lines.push(hint("Tab/↑↓: field | ←/→: change | Enter: save | Esc: cancel"));

        let title = if state.form.is_new() { "New User" } else { "Edit User" };
        let paragraph =
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(paragraph, popup);
    }

    fn render_task_detail(&self, f: &mut Frame, area: Rect) {
        let Some(task) = &self.task_detail else {
            return;
        };
        let popup = centered_rect(70, 20, area);
        f.render_widget(Clear, popup);

        let lines = task_detail_lines(task, &site_name(task, self.sites.all()));
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Task Details"))
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, popup);
    }

    fn render_site_detail(&self, f: &mut Frame, area: Rect) {
        let Some(site) = &self.site_detail else {
            return;
        };
        let popup = centered_rect(60, 13, area);
        f.render_widget(Clear, popup);

        let status = self.sites.display_status(site);
        let lines = vec![
            field("Name", site.name.clone()),
            field("Address", format!("{}://{}:{}", site.protocol, site.host, site.port)),
            field("Username", site.username.clone()),
            field("Group", site.group_name().to_string()),
            Line::from(vec![
                Span::styled(format!("  {:<14}", "Status"), Style::default().fg(Color::Gray)),
                Span::styled(status.to_string(), Style::default().fg(site_status_color(status))),
            ]),
            field("Last check", format_datetime(site.last_check.as_deref())),
            field(
                "Connect time",
                site.connection_time
                    .map_or_else(|| "-".to_string(), |t| format!("{:.2}s", t)),
            ),
            Line::from(""),
            hint("t: test connection from the list | Esc: close"),
        ];
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Site Details"));
        f.render_widget(paragraph, popup);
    }

    fn render_user_detail(&self, f: &mut Frame, area: Rect) {
        let Some(user) = &self.user_detail else {
            return;
        };
        let popup = centered_rect(60, 16, area);
        f.render_widget(Clear, popup);

        let paragraph = Paragraph::new(user_detail_lines(user))
            .block(Block::default().borders(Borders::ALL).title("User Details"));
        f.render_widget(paragraph, popup);
    }

    fn render_confirm(&self, f: &mut Frame, area: Rect) {
        let Some(confirm) = &self.confirm else {
            return;
        };
        let popup = centered_rect(50, 7, area);
        f.render_widget(Clear, popup);

        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(confirm.prompt(), Style::default().fg(Color::White))),
            Line::from(""),
            hint("Press Y to confirm, N/Esc to cancel"),
        ];
        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red))
                    .title(confirm.title()),
            )
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, popup);
    }

    /// Stack live notifications in the top right corner, newest at the bottom
    fn render_notifications(&self, f: &mut Frame, area: Rect) {
        let width = TOAST_WIDTH.min(area.width);
        let mut y = area.y;
        for notification in self.notifications.visible() {
            if y + 3 > area.y + area.height {
                break;
            }
            let rect = Rect::new(area.x + area.width - width, y, width, 3);
            let color = notification.level.color();
            let paragraph = Paragraph::new(notification.message.as_str())
                .style(Style::default().fg(Color::White))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(color))
                        .title(Span::styled(
                            notification.level.title(),
                            Style::default().fg(color).add_modifier(Modifier::BOLD),
                        )),
                );
            f.render_widget(Clear, rect);
            f.render_widget(paragraph, rect);
            y += 3;
        }
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let help_text = match self.view {
            View::Dashboard => "r: refresh | 1-5: views | ?: help | q: quit",
            View::Sites => "Enter: browse | i: details | t: test | T: test all | f: filter | x: delete",
            View::Tasks => "Enter: details | P/R: pause/resume | c: cancel | x: delete | f/p/y: filters",
            View::Browser => {
                if self.address_input.is_some() {
                    "Enter: go | Esc: cancel | Type a path"
                } else {
                    "Enter: open | u: up | [/]: back/forward | e: address | n: create tasks"
                }
            }
            View::Users => "/: search | o/f: filters | n: new | e: edit | t: enable/disable | x: delete",
            View::Help => "Press any key to close help",
            View::TaskForm | View::UserForm => "Enter: submit | Esc: cancel",
            View::TaskDetail | View::SiteDetail | View::UserDetail => "Esc: close",
            View::Confirm => "y: confirm | n/Esc: cancel",
        };

        let status_line = if self.status_message.is_empty() {
            Line::from(vec![Span::styled(help_text, Style::default().fg(Color::Gray))])
        } else {
            Line::from(vec![
                Span::styled(&self.status_message, Style::default().fg(Color::Yellow)),
                Span::raw(" | "),
                Span::styled(help_text, Style::default().fg(Color::Gray)),
            ])
        };

        f.render_widget(Paragraph::new(vec![status_line]), area);
    }

    fn render_search_bar(&self, f: &mut Frame, area: Rect) {
        let search_line = Line::from(vec![
            Span::styled("Search: ", Style::default().fg(Color::Cyan)),
            Span::styled(&self.user_filter.search, Style::default().fg(Color::Yellow)),
            Span::raw("█"),
            Span::styled(
                "  (Enter to keep, Esc to clear)",
                Style::default().fg(Color::Gray),
            ),
        ]);
        f.render_widget(Paragraph::new(vec![search_line]), area);
    }

    fn throbber(&self) -> char {
        THROBBER[self.throbber_frame % THROBBER.len()]
    }
}

fn form_line(label: &str, value: String, active: bool) -> Line<'static> {
    let style = if active {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    Line::from(vec![
        Span::raw(if active { "> " } else { "  " }),
        Span::styled(format!("{:<22}", label), Style::default().fg(Color::Gray)),
        Span::styled(value, style),
    ])
}

fn task_form_lines(form: &TaskFormState) -> Vec<Line<'static>> {
    form.fields()
        .into_iter()
        .map(|f| form_line(f.label(), form.value_of(f), f == form.field))
        .collect()
}

fn user_form_lines(state: &UserFormState) -> Vec<Line<'static>> {
    UserField::ALL
        .iter()
        .map(|&f| form_line(f.label(), state.value_of(f), f == state.field))
        .collect()
}

fn task_detail_lines(task: &Task, site: &str) -> Vec<Line<'static>> {
    let mut lines = vec![
        field("ID", task.id.clone()),
        field("Type", task_type_label(&task.task_type)),
        Line::from(vec![
            Span::styled(format!("  {:<14}", "Status"), Style::default().fg(Color::Gray)),
            Span::styled(
                task.status.as_str().to_string(),
                Style::default().fg(status_color(task.status)),
            ),
        ]),
        field(
            "Priority",
            task.priority.map_or("-", |p| p.as_str()).to_string(),
        ),
        field(
            "Progress",
            format!("{} {:.0}%", progress_bar(task.progress, 20), task.progress),
        ),
        field("Site", site.to_string()),
        field("Remote path", remote_path(task)),
        field(
            "Local path",
            task.local_path.clone().unwrap_or_else(|| "-".to_string()),
        ),
        field("Created", format_datetime(task.created_at.as_deref())),
        field("Started", format_datetime(task.started_at.as_deref())),
        field("Completed", format_datetime(task.completed_at.as_deref())),
        field(
            "Created by",
            task.created_by.clone().unwrap_or_else(|| "-".to_string()),
        ),
    ];
    if let Some(func) = &task.func_name {
        lines.push(field("Function", func.clone()));
    }
    if let Some(error) = &task.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  Error: {}", error),
            Style::default().fg(Color::Red),
        )));
    }

    let actions: Vec<&str> = actions_for(task).iter().map(|a| a.label()).collect();
    lines.push(Line::from(""));
    lines.push(hint(&if actions.is_empty() {
        "No actions available | Esc: close".to_string()
    } else {
        format!("Available: {} | Esc: close", actions.join(", "))
    }));
    lines
}

fn user_detail_lines(user: &User) -> Vec<Line<'static>> {
    let mut lines = vec![
        field("Username", user.username.clone()),
        field("Role", user.role.label()),
        field("Status", user.status.as_str()),
        field("Created", format_datetime(user.created_at.as_deref())),
        field("Last login", format_datetime(user.last_login.as_deref())),
    ];
    if let Some(settings) = &user.settings {
        lines.push(field("Download path", settings.default_download_path.clone()));
        lines.push(field("Max tasks", settings.max_concurrent_tasks.to_string()));
    }
    if let Some(permissions) = &user.permissions {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        lines.push(Line::from(""));
        lines.push(header("  Permissions"));
        lines.push(field("Users", yes_no(permissions.user_management)));
        lines.push(field("Sites", yes_no(permissions.site_management)));
        lines.push(field("System", yes_no(permissions.system_config)));
        lines.push(field("Roles", yes_no(permissions.role_management)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fit_pads_and_cuts() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("abcdef", 4), "abc…");
        assert_eq!(fit("日本語", 3), "日本語");
    }

    #[test]
    fn test_centered_rect_stays_inside() {
        let area = Rect::new(0, 0, 100, 10);
        let popup = centered_rect(50, 20, area);
        assert_eq!(popup.height, 10);
        assert_eq!(popup.width, 50);
        assert_eq!(popup.x, 25);
    }

    #[test]
    fn test_task_detail_shows_error_and_actions() {
        let task = Task::from_value(
            &json!({
                "id": "t9",
                "status": "failed",
                "task_type": "file_download",
                "error": "550 No such file"
            }),
            0,
        );
        let text: Vec<String> = task_detail_lines(&task, "Mirror")
            .iter()
            .map(|line| line.to_string())
            .collect();
        assert!(text.iter().any(|l| l.contains("550 No such file")));
        assert!(text.iter().any(|l| l.contains("Available: Delete")));
        assert!(text.iter().any(|l| l.contains("Mirror")));
    }
}
