//! Warehouse catalog -- static warehouse/script dataset and lookup.
//!
//! The catalog is embedded, loaded once at process start and never mutated.
//! Scripts pick up schedule state only through reconciliation against the
//! remote job store.

mod data;

pub use self::data::warehouses;

use serde::{Deserialize, Serialize};

/// Execution status of a script as shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptStatus {
    Active,
    Paused,
}

impl std::fmt::Display for ScriptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptStatus::Active => write!(f, "active"),
            ScriptStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Link from a script to the remote job record that controls it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLink {
    /// Numeric id of the job record, used in mutation endpoints.
    pub id: i64,
    /// External job identifier string.
    pub job_id: String,
}

/// An automated data-processing script belonging to a warehouse.
///
/// This is the local projection of a remote job merged onto catalog data.
/// It is recreated by reconciliation whenever job data changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub id: String,
    pub name: String,
    pub status: ScriptStatus,
    pub cron_expression: Option<String>,
    pub job: Option<JobLink>,
}

impl Script {
    /// A catalog entry with defaults: active, no schedule, no linkage.
    pub fn catalog(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            status: ScriptStatus::Active,
            cron_expression: None,
            job: None,
        }
    }
}

/// A warehouse and the ordered scripts it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: String,
    pub name: String,
    pub scripts: Vec<Script>,
}

/// Look up a warehouse by id in the embedded catalog.
pub fn find(id: &str) -> Option<Warehouse> {
    warehouses().into_iter().find(|w| w.id == id)
}
