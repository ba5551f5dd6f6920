//! Remote job store access -- wire model, errors, and the client trait.
//!
//! All durable job state lives in the remote store; this module only moves
//! it over the wire. The trait seam keeps the registry and log reader
//! testable against in-memory backends.

pub mod http;

pub use self::http::HttpJobStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Remote-authoritative record describing a script's schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub job_id: String,
    pub script_id: i64,
    pub cron_expression: String,
    pub enabled: bool,
    pub created_at: String,
}

/// One line of a script's execution log, as ordered by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub message: String,
}

/// Filters for a log fetch.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub hours: Option<u32>,
    pub level: Option<String>,
}

/// Failure talking to the job store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job store returned {status}")]
    Status { status: reqwest::StatusCode },

    #[error("job store unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Trait for job store backends.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch all job records, wholesale.
    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError>;

    /// Flip a job's enabled flag.
    async fn toggle_job(&self, job_id: i64) -> Result<(), StoreError>;

    /// Ask the execution engine to run a script immediately.
    async fn run_now(&self, script_id: &str) -> Result<(), StoreError>;

    /// Replace a job's cron expression.
    async fn update_schedule(&self, job_id: i64, cron_expression: &str) -> Result<(), StoreError>;

    /// Fetch a script's recent log entries.
    async fn fetch_logs(&self, script_id: &str, query: &LogQuery)
        -> Result<Vec<LogEntry>, StoreError>;
}
