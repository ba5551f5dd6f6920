//! Job registry -- the sync engine between catalog scripts and the remote
//! job store.
//!
//! The registry owns the last-known wholesale job snapshot and the three
//! mutating operations (run-now, toggle, reschedule). Mutations never guess:
//! after a successful write the snapshot is reloaded so the view reflects
//! server-confirmed state. Operation outcomes reach the operator through the
//! notification center; the only errors left for the caller to display are
//! cron validation failures, which are shown inline instead.

mod reconcile;

pub use self::reconcile::reconcile;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::catalog::{Script, Warehouse};
use crate::cron::{self, InvalidCron};
use crate::notify::{NotificationCenter, Severity};
use crate::store::{Job, JobStore, StoreError};

/// Why a registry operation failed.
///
/// Store and linkage failures have already been reported through the
/// notification center by the time the caller sees them; validation
/// failures have not, and are the caller's to surface inline.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    InvalidCron(#[from] InvalidCron),

    #[error("script '{script_id}' has no linked job")]
    MissingLink { script_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Default)]
struct Snapshot {
    jobs: Vec<Job>,
    /// Generation of the load that produced `jobs`. Monotonic; a completed
    /// fetch with a lower generation than the applied one is stale and gets
    /// discarded instead of overwriting newer data.
    generation: u64,
}

/// Sync engine over one remote job store.
pub struct JobRegistry<S: JobStore> {
    store: Arc<S>,
    notices: NotificationCenter,
    snapshot: Mutex<Snapshot>,
    load_seq: AtomicU64,
}

impl<S: JobStore> JobRegistry<S> {
    pub fn new(store: Arc<S>, notices: NotificationCenter) -> Self {
        Self {
            store,
            notices,
            snapshot: Mutex::new(Snapshot::default()),
            load_seq: AtomicU64::new(0),
        }
    }

    /// Fetch all job records wholesale and replace the snapshot.
    ///
    /// On failure the prior snapshot is left untouched and one error
    /// notification is emitted. A response superseded by a newer completed
    /// load is discarded.
    pub async fn load_jobs(&self) -> Result<(), RegistryError> {
        match self.fetch_and_apply().await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(%err, "job list fetch failed");
                self.notices
                    .add("Failed to load jobs. Please try again.", Severity::Error);
                Err(err.into())
            }
        }
    }

    /// Reconciled view of a warehouse's scripts against the current snapshot.
    pub fn view(&self, warehouse: &Warehouse) -> Vec<Script> {
        let snapshot = self.snapshot.lock().unwrap();
        reconcile(&warehouse.scripts, &snapshot.jobs)
    }

    /// Ask the execution engine to run a script immediately.
    ///
    /// Needs no job linkage and does not touch the stored schedule or
    /// enabled flag. Emits an info notification before dispatch and exactly
    /// one terminal notification after resolution.
    pub async fn run_now(
        &self,
        warehouse: &Warehouse,
        script_id: &str,
    ) -> Result<(), RegistryError> {
        let name = warehouse
            .scripts
            .iter()
            .find(|s| s.id == script_id)
            .map(|s| s.name.as_str())
            .unwrap_or("Unknown script");
        self.notices
            .add(format!("Starting script: {name}"), Severity::Info);

        match self.store.run_now(script_id).await {
            Ok(()) => {
                self.notices
                    .add("Script execution started successfully", Severity::Success);
                Ok(())
            }
            Err(err) => {
                warn!(%err, script_id, "run-now failed");
                self.notices
                    .add("Failed to run script. Please try again.", Severity::Error);
                Err(err.into())
            }
        }
    }

    /// Pause or resume a script's recurring schedule.
    ///
    /// Requires a resolved job linkage; without one the operation fails
    /// before any network call. On success the snapshot is reloaded so the
    /// confirmation reflects what the server actually applied.
    pub async fn toggle(&self, script_id: &str) -> Result<(), RegistryError> {
        let Some((job_id, was_enabled)) = self.linked_job(script_id) else {
            return Err(self.missing_link(script_id));
        };

        if let Err(err) = self.store.toggle_job(job_id).await {
            warn!(%err, script_id, job_id, "toggle failed");
            self.notices.add(
                "Failed to toggle script status. Please try again.",
                Severity::Error,
            );
            return Err(err.into());
        }

        self.refresh().await;
        let enabled_now = self
            .linked_job(script_id)
            .map(|(_, enabled)| enabled)
            .unwrap_or(!was_enabled);
        let message = if enabled_now {
            "Script resumed successfully"
        } else {
            "Script paused successfully"
        };
        self.notices.add(message, Severity::Success);
        Ok(())
    }

    /// Replace a script's cron schedule.
    ///
    /// The expression must pass validation before anything is dispatched; an
    /// invalid one is returned to the caller for inline display and never
    /// enters the notification queue. The linkage precondition matches
    /// [`JobRegistry::toggle`].
    pub async fn reschedule(
        &self,
        script_id: &str,
        cron_expression: &str,
    ) -> Result<(), RegistryError> {
        cron::validate(cron_expression)?;

        let Some((job_id, _)) = self.linked_job(script_id) else {
            return Err(self.missing_link(script_id));
        };

        if let Err(err) = self.store.update_schedule(job_id, cron_expression).await {
            warn!(%err, script_id, job_id, "schedule update failed");
            self.notices.add(
                "Failed to update schedule. Please try again.",
                Severity::Error,
            );
            return Err(err.into());
        }

        self.refresh().await;
        self.notices
            .add("Schedule updated successfully", Severity::Success);
        Ok(())
    }

    /// Resolve a script's job linkage from the current snapshot, using the
    /// same first-match policy as [`reconcile`].
    fn linked_job(&self, script_id: &str) -> Option<(i64, bool)> {
        let snapshot = self.snapshot.lock().unwrap();
        snapshot
            .jobs
            .iter()
            .find(|job| job.script_id.to_string() == script_id)
            .map(|job| (job.id, job.enabled))
    }

    fn missing_link(&self, script_id: &str) -> RegistryError {
        self.notices
            .add("No job is linked to this script yet.", Severity::Error);
        RegistryError::MissingLink {
            script_id: script_id.to_string(),
        }
    }

    /// Quiet reload used inside mutations: a failure here keeps the prior
    /// snapshot and is only logged, so each user action still ends in
    /// exactly one terminal notification.
    async fn refresh(&self) {
        if let Err(err) = self.fetch_and_apply().await {
            warn!(%err, "post-mutation refresh failed, keeping prior snapshot");
        }
    }

    async fn fetch_and_apply(&self) -> Result<(), StoreError> {
        let seq = self.load_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let jobs = self.store.list_jobs().await?;

        let mut snapshot = self.snapshot.lock().unwrap();
        if seq > snapshot.generation {
            snapshot.jobs = jobs;
            snapshot.generation = seq;
        } else {
            debug!(
                seq,
                applied = snapshot.generation,
                "discarding stale job list response"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn job(id: i64, script_id: i64, enabled: bool, cron: &str) -> Job {
        Job {
            id,
            job_id: format!("j{id}"),
            script_id,
            cron_expression: cron.to_string(),
            enabled,
            created_at: "2024-03-10T10:00:00Z".to_string(),
        }
    }

    fn server_error() -> StoreError {
        StoreError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// In-memory store that records every call it receives.
    #[derive(Default)]
    struct FakeStore {
        jobs: Mutex<Vec<Job>>,
        fail_list: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn with_jobs(jobs: Vec<Job>) -> Arc<Self> {
            Arc::new(Self {
                jobs: Mutex::new(jobs),
                ..Self::default()
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl JobStore for FakeStore {
        async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
            self.calls.lock().unwrap().push("list".to_string());
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(server_error());
            }
            Ok(self.jobs.lock().unwrap().clone())
        }

        async fn toggle_job(&self, job_id: i64) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push(format!("toggle:{job_id}"));
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.iter_mut().find(|j| j.id == job_id) {
                Some(j) => {
                    j.enabled = !j.enabled;
                    Ok(())
                }
                None => Err(server_error()),
            }
        }

        async fn run_now(&self, script_id: &str) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push(format!("run:{script_id}"));
            Ok(())
        }

        async fn update_schedule(
            &self,
            job_id: i64,
            cron_expression: &str,
        ) -> Result<(), StoreError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update:{job_id}:{cron_expression}"));
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.iter_mut().find(|j| j.id == job_id) {
                Some(j) => {
                    j.cron_expression = cron_expression.to_string();
                    Ok(())
                }
                None => Err(server_error()),
            }
        }

        async fn fetch_logs(
            &self,
            script_id: &str,
            _query: &crate::store::LogQuery,
        ) -> Result<Vec<crate::store::LogEntry>, StoreError> {
            self.calls.lock().unwrap().push(format!("logs:{script_id}"));
            Ok(Vec::new())
        }
    }

    fn byggmakker() -> Warehouse {
        crate::catalog::find("1").unwrap()
    }

    #[tokio::test]
    async fn test_toggle_without_linkage_issues_no_request() {
        let store = FakeStore::with_jobs(vec![]);
        let notices = NotificationCenter::new();
        let registry = JobRegistry::new(store.clone(), notices.clone());

        let err = registry.toggle("1").await.unwrap_err();
        assert!(matches!(err, RegistryError::MissingLink { .. }));
        assert!(store.calls().is_empty());

        let notes = notices.snapshot();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_snapshot() {
        let store = FakeStore::with_jobs(vec![job(7, 3, true, "0 * * * *")]);
        let notices = NotificationCenter::new();
        let registry = JobRegistry::new(store.clone(), notices.clone());

        registry.load_jobs().await.unwrap();
        let before = registry.view(&byggmakker());

        store.fail_list.store(true, Ordering::SeqCst);
        assert!(registry.load_jobs().await.is_err());

        assert_eq!(registry.view(&byggmakker()), before);
        assert_eq!(notices.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_confirms_from_reloaded_state() {
        let store = FakeStore::with_jobs(vec![job(7, 3, true, "0 * * * *")]);
        let notices = NotificationCenter::new();
        let registry = JobRegistry::new(store.clone(), notices.clone());

        tokio_test::assert_ok!(registry.load_jobs().await);
        tokio_test::assert_ok!(registry.toggle("3").await);

        // toggled on the server, then reloaded rather than flipped locally
        assert_eq!(
            store.calls(),
            vec!["list", "toggle:7", "list"],
        );
        let view = registry.view(&byggmakker());
        let script = view.iter().find(|s| s.id == "3").unwrap();
        assert_eq!(script.status, crate::catalog::ScriptStatus::Paused);

        let last = notices.snapshot().pop().unwrap();
        assert_eq!(last.message, "Script paused successfully");
        assert_eq!(last.severity, Severity::Success);
    }

    #[tokio::test]
    async fn test_run_now_needs_no_linkage() {
        let store = FakeStore::with_jobs(vec![]);
        let notices = NotificationCenter::new();
        let registry = JobRegistry::new(store.clone(), notices.clone());

        registry.run_now(&byggmakker(), "1").await.unwrap();
        assert_eq!(store.calls(), vec!["run:1"]);

        let notes = notices.snapshot();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].severity, Severity::Info);
        assert_eq!(notes[0].message, "Starting script: Base Byggmakker Processor");
        assert_eq!(notes[1].severity, Severity::Success);
    }

    #[tokio::test]
    async fn test_reschedule_validates_before_dispatch() {
        let store = FakeStore::with_jobs(vec![job(7, 3, true, "0 * * * *")]);
        let notices = NotificationCenter::new();
        let registry = JobRegistry::new(store.clone(), notices.clone());
        registry.load_jobs().await.unwrap();

        let err = registry.reschedule("3", "60 0 * * *").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCron(_)));
        // the initial load is the only traffic, and nothing was notified
        assert_eq!(store.calls(), vec!["list"]);
        assert!(notices.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_reschedule_round_trip() {
        let store = FakeStore::with_jobs(vec![job(7, 3, true, "0 * * * *")]);
        let notices = NotificationCenter::new();
        let registry = JobRegistry::new(store.clone(), notices.clone());
        registry.load_jobs().await.unwrap();

        registry.reschedule("3", "0 2 * * 0").await.unwrap();
        assert_eq!(
            store.calls(),
            vec!["list", "update:7:0 2 * * 0", "list"],
        );

        let view = registry.view(&byggmakker());
        let script = view.iter().find(|s| s.id == "3").unwrap();
        assert_eq!(script.cron_expression.as_deref(), Some("0 2 * * 0"));

        let last = notices.snapshot().pop().unwrap();
        assert_eq!(last.message, "Schedule updated successfully");
    }

    /// Store whose successive `list_jobs` calls take scripted delays, for
    /// exercising out-of-order completion.
    struct SlowStore {
        responses: Mutex<VecDeque<(Duration, Vec<Job>)>>,
    }

    #[async_trait::async_trait]
    impl JobStore for SlowStore {
        async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
            let (delay, jobs) = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unscripted list_jobs call");
            tokio::time::sleep(delay).await;
            Ok(jobs)
        }

        async fn toggle_job(&self, _job_id: i64) -> Result<(), StoreError> {
            unimplemented!("not used")
        }

        async fn run_now(&self, _script_id: &str) -> Result<(), StoreError> {
            unimplemented!("not used")
        }

        async fn update_schedule(
            &self,
            _job_id: i64,
            _cron_expression: &str,
        ) -> Result<(), StoreError> {
            unimplemented!("not used")
        }

        async fn fetch_logs(
            &self,
            _script_id: &str,
            _query: &crate::store::LogQuery,
        ) -> Result<Vec<crate::store::LogEntry>, StoreError> {
            unimplemented!("not used")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_load_response_is_discarded() {
        let old = vec![job(7, 3, false, "0 0 * * *")];
        let new = vec![job(7, 3, true, "0 * * * *")];
        let store = Arc::new(SlowStore {
            responses: Mutex::new(VecDeque::from([
                (Duration::from_secs(5), old),
                (Duration::ZERO, new),
            ])),
        });
        let registry = Arc::new(JobRegistry::new(store, NotificationCenter::new()));

        // First load is in flight and slow; the second one overtakes it.
        let slow = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.load_jobs().await })
        };
        tokio::task::yield_now().await;
        registry.load_jobs().await.unwrap();
        slow.await.unwrap().unwrap();

        // The late response from the superseded load must not win.
        let view = registry.view(&byggmakker());
        let script = view.iter().find(|s| s.id == "3").unwrap();
        assert_eq!(script.status, crate::catalog::ScriptStatus::Active);
        assert_eq!(script.cron_expression.as_deref(), Some("0 * * * *"));
    }
}
