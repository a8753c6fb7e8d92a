//! # Tally Core Library
//!
//! Scheduling and bookkeeping for a personal habit tracker: routines that
//! repeat on weekdays, a day of the month or a fixed interval, counters that
//! roll over every day, week or month, and reminders planned ahead of tasks.
//!
//! ## Core Modules
//!
//! - [`calendar`]: Date arithmetic shared by the evaluators
//! - [`recurrence`]: Which tasks happen on which day, and completion state
//! - [`activity`]: Which counters show up on which day
//! - [`reset`]: Period rollover with archival of the finished period
//! - [`notify`]: Reminder policy, timers and delivery transports
//! - [`worker`]: Background reset job driven by change events and midnight
//! - [`service`]: The [`service::Tracker`] application service
//! - [`db`] / [`repository`]: SQLite storage behind async repository traits
//! - [`timezone`]: Local "today" and midnight in the configured zone
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tally_core::{db, error::CoreError, repository::SqliteRepository, service::Tracker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CoreError> {
//!     let pool = db::establish_connection("tally.db").await?;
//!     let repository = Arc::new(SqliteRepository::new(pool));
//!     let tracker = Tracker::new(repository, "local-user", chrono_tz::UTC);
//!
//!     let view = tracker.day_view(tracker.today()).await?;
//!     for (task, done) in &view.tasks {
//!         println!("[{}] {}", if *done { "x" } else { " " }, task.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod calendar;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod recurrence;
pub mod repository;
pub mod reset;
pub mod service;
pub mod timezone;
pub mod worker;
