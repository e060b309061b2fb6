//! Update events and the background pollers that produce them
//!
//! Views never talk to each other directly. Dashboard-level counters travel
//! as named [`UpdateEvent`]s over an [`UpdateBus`] that any number of views
//! can subscribe to, fed both by the pollers and by the server's push
//! channel ([`crate::push`]); everything else (full stats, tasks, sites, test status)
//! comes back to the UI loop as [`Polled`] messages on an mpsc channel.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::api::models::{
    ActiveTests, DashboardStats, Site, SystemStatus, Task, TaskFilter, TaskStatsUpdate,
};
use crate::api::ApiClient;
use crate::push;
use crate::settings::PollingSettings;

pub const TASK_STATS_UPDATE: &str = "task_stats_update";
pub const SYSTEM_STATUS_UPDATE: &str = "system_status_update";

const BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEvent {
    TaskStats(TaskStatsUpdate),
    SystemStatus(SystemStatus),
}

impl UpdateEvent {
    pub fn name(&self) -> &'static str {
        match self {
            UpdateEvent::TaskStats(_) => TASK_STATS_UPDATE,
            UpdateEvent::SystemStatus(_) => SYSTEM_STATUS_UPDATE,
        }
    }

    /// Decode a named event; unknown names yield `None`
    pub fn from_named(name: &str, payload: Value) -> Result<Option<Self>, serde_json::Error> {
        match name {
            TASK_STATS_UPDATE => Ok(Some(UpdateEvent::TaskStats(serde_json::from_value(
                payload,
            )?))),
            SYSTEM_STATUS_UPDATE => Ok(Some(UpdateEvent::SystemStatus(
                serde_json::from_value(payload)?,
            ))),
            _ => Ok(None),
        }
    }
}

/// Fan-out channel delivering every event to every subscriber
#[derive(Debug, Clone)]
pub struct UpdateBus {
    tx: broadcast::Sender<UpdateEvent>,
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Returns how many subscribers received the event
    pub fn publish(&self, event: UpdateEvent) -> usize {
        debug!(event = event.name(), "publishing update");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.tx.subscribe()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollSource {
    Stats,
    SystemStatus,
    Tasks,
    ActiveTests,
    Sites,
}

impl PollSource {
    pub fn label(&self) -> &'static str {
        match self {
            PollSource::Stats => "dashboard stats",
            PollSource::SystemStatus => "system status",
            PollSource::Tasks => "task list",
            PollSource::ActiveTests => "active tests",
            PollSource::Sites => "site list",
        }
    }
}

/// Data fetched in the background for the UI loop
#[derive(Debug)]
pub enum Polled {
    Stats(DashboardStats),
    Tasks(Vec<Task>),
    RecentTasks(Vec<Task>),
    Sites(Vec<Site>),
    ActiveTests(ActiveTests),
    Failed { source: PollSource, message: String },
}

/// Handles of running pollers; dropping it stops them
#[derive(Debug, Default)]
pub struct Pollers {
    handles: Vec<JoinHandle<()>>,
}

impl Pollers {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for Pollers {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Run `tick` on a fixed period, first run immediately, until it returns false
fn every<F, Fut>(period: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send,
{
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !tick().await {
                break;
            }
        }
    })
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}

fn report_failure(
    tx: &mpsc::UnboundedSender<Polled>,
    source: PollSource,
    err: impl std::fmt::Display,
) -> bool {
    warn!(source = source.label(), error = %err, "poll failed");
    tx.send(Polled::Failed {
        source,
        message: err.to_string(),
    })
    .is_ok()
}

/// Start every poller, plus the push listener when enabled. Task list polls
/// follow `filter` and refetch as soon as it changes.
pub fn spawn_pollers(
    api: ApiClient,
    polling: &PollingSettings,
    filter: watch::Receiver<TaskFilter>,
    bus: UpdateBus,
    tx: mpsc::UnboundedSender<Polled>,
) -> Pollers {
    let mut handles = Vec::new();

    {
        let (api, bus, tx) = (api.clone(), bus.clone(), tx.clone());
        handles.push(every(secs(polling.stats_secs), move || {
            let (api, bus, tx) = (api.clone(), bus.clone(), tx.clone());
            async move {
                match api.dashboard_stats().await {
                    Ok(stats) => {
                        bus.publish(UpdateEvent::TaskStats(TaskStatsUpdate::from(&stats)));
                        if tx.send(Polled::Stats(stats)).is_err() {
                            return false;
                        }
                    }
                    Err(e) => return report_failure(&tx, PollSource::Stats, e),
                }
                match api.recent_tasks().await {
                    Ok(tasks) => tx.send(Polled::RecentTasks(tasks)).is_ok(),
                    Err(e) => report_failure(&tx, PollSource::Stats, e),
                }
            }
        }));
    }

    {
        let (api, bus, tx) = (api.clone(), bus.clone(), tx.clone());
        handles.push(every(secs(polling.system_status_secs), move || {
            let (api, bus, tx) = (api.clone(), bus.clone(), tx.clone());
            async move {
                match api.system_status().await {
                    Ok(status) => {
                        bus.publish(UpdateEvent::SystemStatus(status));
                        !tx.is_closed()
                    }
                    Err(e) => report_failure(&tx, PollSource::SystemStatus, e),
                }
            }
        }));
    }

    {
        let (api, tx) = (api.clone(), tx.clone());
        handles.push(every(secs(polling.sites_secs), move || {
            let (api, tx) = (api.clone(), tx.clone());
            async move {
                match api.sites().await {
                    Ok(sites) => tx.send(Polled::Sites(sites)).is_ok(),
                    Err(e) => report_failure(&tx, PollSource::Sites, e),
                }
            }
        }));
    }

    {
        let (api, tx) = (api.clone(), tx.clone());
        handles.push(every(secs(polling.active_tests_secs), move || {
            let (api, tx) = (api.clone(), tx.clone());
            async move {
                match api.active_tests().await {
                    Ok(active) => tx.send(Polled::ActiveTests(active)).is_ok(),
                    Err(e) => report_failure(&tx, PollSource::ActiveTests, e),
                }
            }
        }));
    }

    if polling.push {
        handles.push(push::spawn_listener(api.clone(), bus));
    }
    handles.push(spawn_task_poller(api, secs(polling.tasks_secs), filter, tx));

    Pollers { handles }
}

fn spawn_task_poller(
    api: ApiClient,
    period: Duration,
    mut filter: watch::Receiver<TaskFilter>,
    tx: mpsc::UnboundedSender<Polled>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = filter.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    interval.reset();
                }
            }

            let current = filter.borrow_and_update().clone();
            let sent = match api.tasks(&current).await {
                Ok(tasks) => tx.send(Polled::Tasks(tasks)).is_ok(),
                Err(e) => report_failure(&tx, PollSource::Tasks, e),
            };
            if !sent {
                break;
            }
        }
    })
}
