use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ftpdeck::api::models::{Priority, TaskAction, TaskFilter, TaskStatus};
use ftpdeck::api::ApiClient;
use ftpdeck::browser::{Browser, LoadFailure, SortField};
use ftpdeck::format::{format_datetime, format_size, smart_truncate_path};
use ftpdeck::settings::{expand_path, Settings};
use ftpdeck::sites::SiteList;
use ftpdeck::tasks::board::{remote_path, site_name, task_type_label, FETCH_LIMIT};
use ftpdeck::ui::App;

const PASSWORD_ENV: &str = "FTPDECK_PASSWORD";

#[derive(Parser)]
#[command(name = "ftpdeck")]
#[command(about = "Terminal client for an FTP transfer management server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to settings file
    #[arg(short = 'c', long)]
    config: Option<String>,

    /// Server base URL, overrides the settings file
    #[arg(short, long)]
    server: Option<String>,

    /// Log in as this user; the password is read from FTPDECK_PASSWORD
    #[arg(short, long)]
    user: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured FTP sites
    Sites,
    /// Test the connection to one site
    TestSite {
        /// Site ID
        id: String,
    },
    /// Test the connection to every site
    TestAll,
    /// List a remote directory
    Browse {
        /// Site ID
        site: String,
        /// Remote path
        #[arg(default_value = "/")]
        path: String,
        /// Sort field: name, size, date or type
        #[arg(long, value_parser = parse_sort_field)]
        sort: Option<SortField>,
        /// Sort descending
        #[arg(long)]
        desc: bool,
    },
    /// List tasks
    Tasks {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long = "type")]
        task_type: Option<String>,
        #[arg(long, default_value_t = FETCH_LIMIT)]
        limit: usize,
    },
    /// Pause, resume, cancel or delete a task
    Task {
        /// pause, resume, cancel or delete
        #[arg(value_parser = parse_task_action)]
        action: TaskAction,
        /// Task ID
        id: String,
    },
    /// Show dashboard statistics and system status
    Stats,
    /// List user accounts
    Users,
}

fn parse_sort_field(raw: &str) -> Result<SortField, String> {
    match raw.to_lowercase().as_str() {
        "name" => Ok(SortField::Name),
        "size" => Ok(SortField::Size),
        "date" => Ok(SortField::Date),
        "type" => Ok(SortField::Type),
        other => Err(format!("unknown sort field '{}'", other)),
    }
}

fn parse_task_action(raw: &str) -> Result<TaskAction, String> {
    match raw.to_lowercase().as_str() {
        "pause" => Ok(TaskAction::Pause),
        "resume" => Ok(TaskAction::Resume),
        "cancel" => Ok(TaskAction::Cancel),
        "delete" => Ok(TaskAction::Delete),
        other => Err(format!("unknown task action '{}'", other)),
    }
}

/// Install the global subscriber. With `log_file` set everything goes there
/// instead of stderr, which the TUI owns.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default = if verbose { "ftpdeck=debug" } else { "ftpdeck=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_writer(Mutex::new(file)).with_ansi(false).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = match &cli.config {
        Some(config) => expand_path(config),
        None => Settings::default_path(),
    };
    let mut settings = Settings::load(&settings_path).context("Failed to load settings")?;
    if let Some(server) = &cli.server {
        settings.server.base_url = server.clone();
    }

    let log_file = cli.command.is_none().then(Settings::log_path);
    init_logging(cli.verbose, log_file.as_deref())?;

    let api = ApiClient::new(&settings.server.base_url, settings.server.timeout())
        .with_context(|| format!("Invalid server URL {}", settings.server.base_url))?;
    info!(server = %api.base_url(), "starting");

    let username = cli.user.clone().or_else(|| settings.server.username.clone());
    if let Some(username) = &username {
        let password = std::env::var(PASSWORD_ENV)
            .with_context(|| format!("{} must be set to log in as {}", PASSWORD_ENV, username))?;
        api.login(username, &password)
            .await
            .context("Login failed")?;
        info!(user = %username, "logged in");
    }

    match cli.command {
        None => {
            // Default to TUI if no command provided
            let profile = match username {
                Some(_) => api.profile().await.ok(),
                None => None,
            };
            let mut app = App::new(api, settings, settings_path, profile);
            app.run().await?;
        }
        Some(Commands::Sites) => {
            let mut list = SiteList::new();
            list.replace(api.sites().await.context("Failed to fetch sites")?);
            if list.all().is_empty() {
                println!("No sites configured.");
            } else {
                println!(
                    "{:<10} {:<24} {:<30} {:<8} {:<14} {:<16}",
                    "ID", "Name", "Host", "Proto", "Status", "Group"
                );
                println!("{}", "-".repeat(106));
                for site in list.all() {
                    println!(
                        "{:<10} {:<24} {:<30} {:<8} {:<14} {:<16}",
                        site.id,
                        site.name,
                        format!("{}:{}", site.host, site.port),
                        site.protocol,
                        site.status_label(),
                        site.group_name()
                    );
                }
                let stats = list.stats();
                println!(
                    "\n{} sites, {} connected, {} disconnected, {} groups",
                    stats.total, stats.connected, stats.disconnected, stats.groups
                );
            }
        }
        Some(Commands::TestSite { id }) => {
            let response = api
                .test_site(&id)
                .await
                .with_context(|| format!("Connection test for site {} failed", id))?;
            println!("{}", response.message);
        }
        Some(Commands::TestAll) => {
            let mut list = SiteList::new();
            list.replace(api.sites().await.context("Failed to fetch sites")?);
            let count = list.check_test_all()?;
            let response = api
                .test_all_sites()
                .await
                .context("Failed to start connection tests")?;
            println!("Testing {} sites: {}", count, response.message);
        }
        Some(Commands::Browse {
            site,
            path,
            sort,
            desc,
        }) => {
            let mut browser = Browser::new(
                sort.unwrap_or(settings.browser.sort_field),
                settings.browser.view_mode,
            );
            browser.choose_site(&site);
            let Some(ticket) = browser.navigate_to(&path) else {
                bail!("No site chosen");
            };
            if desc {
                browser.toggle_sort_direction();
            }

            let result = api
                .browse(&ticket.site_id, &ticket.path)
                .await
                .map(|response| response.files)
                .map_err(|e| LoadFailure::from(&e));
            browser.finish_load(&ticket, result);

            if let ftpdeck::browser::LoadState::Failed(failure) = browser.load_state() {
                bail!("{}", failure.message);
            }

            println!("{}", browser.current_path());
            println!("{:<4} {:<40} {:>12} {:<16} {:<16}", "", "Name", "Size", "Type", "Modified");
            println!("{}", "-".repeat(92));
            for entry in browser.display() {
                let size = if entry.is_directory {
                    String::new()
                } else {
                    format_size(entry.size)
                };
                println!(
                    "{:<4} {:<40} {:>12} {:<16} {:<16}",
                    entry.icon(),
                    entry.name,
                    size,
                    entry.type_label(),
                    format_datetime(entry.modified_time.as_deref())
                );
            }
            println!("\n{}", browser.status_summary());
        }
        Some(Commands::Tasks {
            status,
            priority,
            task_type,
            limit,
        }) => {
            let priority = match priority {
                Some(raw) => Some(
                    Priority::parse(&raw).with_context(|| format!("Unknown priority '{}'", raw))?,
                ),
                None => None,
            };
            let filter = TaskFilter {
                status: status.as_deref().map(TaskStatus::parse),
                priority,
                task_type,
                limit: Some(limit),
            };
            let tasks = api.tasks(&filter).await.context("Failed to fetch tasks")?;
            let sites = api.sites().await.unwrap_or_default();

            if tasks.is_empty() {
                println!("No tasks found.");
            } else {
                println!(
                    "{:<14} {:<18} {:<10} {:<8} {:>6} {:<18} {:<36} {:<16}",
                    "ID", "Type", "Status", "Priority", "Prog", "Site", "Remote path", "Created"
                );
                println!("{}", "-".repeat(132));
                for task in &tasks {
                    println!(
                        "{:<14} {:<18} {:<10} {:<8} {:>5}% {:<18} {:<36} {:<16}",
                        smart_truncate_path(&task.id, 14),
                        task_type_label(&task.task_type),
                        task.status.as_str(),
                        task.priority.map(|p| p.as_str()).unwrap_or("-"),
                        task.progress.round() as i64,
                        site_name(task, &sites),
                        smart_truncate_path(&remote_path(task), 36),
                        format_datetime(task.created_at.as_deref())
                    );
                }
            }
        }
        Some(Commands::Task { action, id }) => {
            let response = api
                .task_action(&id, action)
                .await
                .with_context(|| format!("Failed to {} task {}", action.label().to_lowercase(), id))?;
            if response.message.is_empty() {
                println!("Task {} {}", id, action.past_tense());
            } else {
                println!("{}", response.message);
            }
        }
        Some(Commands::Stats) => {
            let stats = api
                .dashboard_stats()
                .await
                .context("Failed to fetch dashboard stats")?;
            println!("Tasks");
            println!("  Total: {}", stats.tasks.total_tasks);
            println!("  Running: {}", stats.tasks.running_tasks);
            println!("Sites");
            println!("  Total: {}", stats.sites.total_sites);
            println!("  Connected: {}", stats.sites.connected_sites);
            println!("Scheduler");
            println!("  Efficiency: {}%", stats.scheduler.efficiency.round() as i64);
            println!("  Workers: {}", stats.scheduler.active_workers);
            println!("  Queue: {}", stats.scheduler.queue_size);

            match api.system_status().await {
                Ok(status) => {
                    println!("System");
                    println!("  CPU: {:.1}%", status.cpu_percent);
                    println!("  Memory: {:.1}%", status.memory_percent);
                    println!("  Disk: {:.1}%", status.disk_percent);
                    println!(
                        "  Scheduler: {}",
                        if status.scheduler_running { "running" } else { "stopped" }
                    );
                    if let Some(uptime) = &status.uptime {
                        println!("  Uptime: {}", uptime);
                    }
                }
                Err(e) => println!("System status unavailable: {}", e),
            }
        }
        Some(Commands::Users) => {
            let users = api.users().await.context("Failed to fetch users")?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!(
                    "{:<10} {:<24} {:<14} {:<10} {:<18}",
                    "ID", "Username", "Role", "Status", "Last login"
                );
                println!("{}", "-".repeat(80));
                for user in &users {
                    println!(
                        "{:<10} {:<24} {:<14} {:<10} {:<18}",
                        user.id,
                        user.username,
                        user.role.label(),
                        user.status.as_str(),
                        format_datetime(user.last_login.as_deref())
                    );
                }
            }
            if let Ok(stats) = api.user_stats().await {
                println!(
                    "\n{} users, {} active, {} admins, {} inactive",
                    stats.total,
                    stats.active,
                    stats.admins(),
                    stats.inactive()
                );
            }
        }
    }

    Ok(())
}
