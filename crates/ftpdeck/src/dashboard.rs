//! Dashboard counters and system gauges

use crate::api::models::{DashboardStats, SystemStatus, Task, TaskStatsUpdate};

pub const RECENT_TASKS: usize = 10;

/// The four headline cards
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatCards {
    pub total_tasks: u64,
    pub running_tasks: u64,
    pub total_sites: u64,
    pub efficiency: f64,
}

impl StatCards {
    pub fn efficiency_label(&self) -> String {
        format!("{}%", self.efficiency.round() as i64)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    cards: StatCards,
    stats: Option<DashboardStats>,
    system: Option<SystemStatus>,
    recent: Vec<Task>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> StatCards {
        self.cards
    }

    pub fn stats(&self) -> Option<&DashboardStats> {
        self.stats.as_ref()
    }

    pub fn system(&self) -> Option<&SystemStatus> {
        self.system.as_ref()
    }

    pub fn recent(&self) -> &[Task] {
        &self.recent
    }

    /// Full stats from the periodic poll
    pub fn apply_stats(&mut self, stats: DashboardStats) {
        self.cards = StatCards {
            total_tasks: stats.tasks.total_tasks,
            running_tasks: stats.tasks.running_tasks,
            total_sites: stats.sites.total_sites,
            efficiency: stats.scheduler.efficiency,
        };
        self.stats = Some(stats);
    }

    /// Pushed task counters; the site count stays as last polled
    pub fn apply_task_update(&mut self, update: &TaskStatsUpdate) {
        self.cards.total_tasks = update.total_tasks;
        self.cards.running_tasks = update.running_tasks;
        self.cards.efficiency = update.efficiency;
    }

    pub fn apply_system_status(&mut self, status: SystemStatus) {
        self.system = Some(status);
    }

    pub fn apply_recent(&mut self, mut tasks: Vec<Task>) {
        tasks.truncate(RECENT_TASKS);
        self.recent = tasks;
    }
}

impl From<&DashboardStats> for TaskStatsUpdate {
    fn from(stats: &DashboardStats) -> Self {
        TaskStatsUpdate {
            total_tasks: stats.tasks.total_tasks,
            running_tasks: stats.tasks.running_tasks,
            efficiency: stats.scheduler.efficiency,
        }
    }
}
