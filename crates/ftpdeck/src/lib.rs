//! Terminal client for an FTP transfer management server.
//!
//! The server owns sites, the task scheduler and user accounts; this crate
//! browses remote directories through it, turns selections into download and
//! monitor tasks, and shows task, site, user and system state.

pub mod api;
pub mod browser;
pub mod dashboard;
pub mod events;
pub mod format;
pub mod notify;
pub mod push;
pub mod settings;
pub mod sites;
pub mod tasks;
pub mod ui;
pub mod users;
pub mod validation;
