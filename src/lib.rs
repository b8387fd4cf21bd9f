//! Website protection orchestrator: uptime monitoring, content backup, and
//! security scanning for registered websites, driven by periodic sweeps
//! through an in-process job queue.

pub mod backups;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod monitoring;
pub mod notifications;
pub mod scheduler;
pub mod security;
