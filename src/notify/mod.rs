//! Transient operator notifications with automatic expiry.
//!
//! The center is an explicitly scoped object: create it where the console
//! session starts, call [`NotificationCenter::shutdown`] (or drop it) when
//! the session ends. Every notification owns its own expiry timer, and
//! teardown aborts every pending timer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// How long a notification stays visible before it expires on its own.
pub const DISPLAY_WINDOW: Duration = Duration::from_millis(3000);

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Success => write!(f, "success"),
            Severity::Error => write!(f, "error"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A single transient message shown to the operator.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    notifications: Vec<Notification>,
    timers: HashMap<Uuid, JoinHandle<()>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for timer in self.timers.values() {
            timer.abort();
        }
    }
}

/// Shared handle to the notification queue.
///
/// Clones share the same queue.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Mutex<Inner>>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Add a notification and schedule its automatic removal.
    ///
    /// Returns the id so callers can dismiss early.
    pub fn add(&self, message: impl Into<String>, severity: Severity) -> Uuid {
        let id = Uuid::new_v4();
        let notification = Notification {
            id,
            message: message.into(),
            severity,
            created_at: Utc::now(),
        };

        let mut inner = self.inner.lock().unwrap();
        inner.notifications.push(notification);

        // The timer holds a weak reference so a dropped center does not
        // linger until its last expiry fires.
        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(DISPLAY_WINDOW).await;
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap();
                inner.notifications.retain(|n| n.id != id);
                inner.timers.remove(&id);
            }
        });
        inner.timers.insert(id, handle);

        id
    }

    /// Remove a notification before its window elapses. No-op for unknown ids.
    pub fn dismiss(&self, id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner.notifications.retain(|n| n.id != id);
        if let Some(timer) = inner.timers.remove(&id) {
            timer.abort();
        }
    }

    /// Current notifications in insertion order.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.inner.lock().unwrap().notifications.clone()
    }

    /// Tear the queue down, aborting every pending expiry timer.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.notifications.clear();
        for (_, timer) in inner.timers.drain() {
            timer.abort();
        }
    }
}
