//! Execution log retrieval with optional auto-refresh polling.
//!
//! Entries arrive already ordered by the remote store and are never
//! reordered locally. The poller is a cancellable task owned by the reader
//! that created it: disabling auto-refresh or dropping the reader aborts
//! it, so a closed view can never keep fetching.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::store::{JobStore, LogEntry, LogQuery, StoreError};

/// How often the auto-refresh poller re-fetches.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Reads one script's execution logs from the remote store.
pub struct LogReader<S: JobStore> {
    store: Arc<S>,
    script_id: String,
    query: LogQuery,
    poller: Option<JoinHandle<()>>,
}

impl<S: JobStore> LogReader<S> {
    pub fn new(store: Arc<S>, script_id: impl Into<String>, query: LogQuery) -> Self {
        Self {
            store,
            script_id: script_id.into(),
            query,
            poller: None,
        }
    }

    /// One-shot fetch. Independent of the poller and safe to call while
    /// auto-refresh is active; it never creates a second timer.
    pub async fn fetch(&self) -> Result<Vec<LogEntry>, StoreError> {
        self.store.fetch_logs(&self.script_id, &self.query).await
    }

    /// Start auto-refresh, delivering each fetched batch to `tx`.
    ///
    /// At most one poller exists per reader; enabling while already enabled
    /// is a no-op. The poller stops on its own when the receiver is gone.
    pub fn start_auto_refresh(&mut self, tx: mpsc::UnboundedSender<Vec<LogEntry>>)
    where
        S: 'static,
    {
        if self.auto_refresh_active() {
            return;
        }

        let store = self.store.clone();
        let script_id = self.script_id.clone();
        let query = self.query.clone();
        self.poller = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                match store.fetch_logs(&script_id, &query).await {
                    Ok(entries) => {
                        if tx.send(entries).is_err() {
                            break;
                        }
                    }
                    // Reported once per tick; the next tick retries anyway.
                    Err(err) => warn!(%err, script_id, "log poll failed"),
                }
            }
        }));
    }

    /// Cancel the poller, if any. No further fetches happen afterwards.
    pub fn stop_auto_refresh(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }

    pub fn auto_refresh_active(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_finished())
    }
}

impl<S: JobStore> Drop for LogReader<S> {
    fn drop(&mut self) {
        self.stop_auto_refresh();
    }
}
