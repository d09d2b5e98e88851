//! Fire-and-forget side effects: activity log appends and notifications.
//!
//! RULE: nothing here returns an error to the caller. A failed effect is
//! logged and handed to the `FailureSink`; the primary operation has already
//! been committed by then and stands.

use crate::{activity::ActivityLogEntry, store::CoreStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Template keys understood by the messaging layer.
pub const TEMPLATE_COMPLAINT_RESOLVED: &str = "complaint_resolved";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub phone: String,
    pub template_key: String,
    pub locale: String,
    pub params: serde_json::Value,
}

/// Outbound messaging, keyed by phone number, template and locale.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, n: &Notification) -> anyhow::Result<()> {
        log::info!("notify {} template={} locale={}", n.phone, n.template_key, n.locale);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn send(&self, _notification: &Notification) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Operator-facing channel for swallowed effect failures.
pub trait FailureSink: Send + Sync {
    fn report(&self, effect: &str, complaint_id: &str, error: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogFailureSink;

impl FailureSink for LogFailureSink {
    fn report(&self, effect: &str, complaint_id: &str, error: &str) {
        log::error!("side effect '{effect}' failed for complaint {complaint_id}: {error}");
    }
}

#[derive(Clone)]
pub struct Effects {
    notifier: Arc<dyn Notifier>,
    failures: Arc<dyn FailureSink>,
}

impl Default for Effects {
    fn default() -> Self {
        Self::new(Arc::new(LogNotifier), Arc::new(LogFailureSink))
    }
}

impl Effects {
    pub fn new(notifier: Arc<dyn Notifier>, failures: Arc<dyn FailureSink>) -> Self {
        Self { notifier, failures }
    }

    /// Append an activity entry. Returns whether it landed.
    pub fn record_activity(&self, store: &CoreStore, entry: &ActivityLogEntry) -> bool {
        match store.append_activity(entry) {
            Ok(seq) => {
                log::debug!(
                    "activity #{seq} {} on {} by {}",
                    entry.kind.as_str(),
                    entry.complaint_id,
                    entry.actor_id
                );
                true
            }
            Err(e) => {
                self.report_failure("activity_log", &entry.complaint_id, &e.to_string());
                false
            }
        }
    }

    /// Hand a swallowed failure to the operator channel.
    pub fn report_failure(&self, effect: &str, complaint_id: &str, error: &str) {
        self.failures.report(effect, complaint_id, error);
    }

    /// Best-effort send. Returns whether the notifier accepted it.
    pub fn notify(&self, complaint_id: &str, notification: &Notification) -> bool {
        match self.notifier.send(notification) {
            Ok(()) => true,
            Err(e) => {
                self.report_failure("notification", complaint_id, &format!("{e:#}"));
                false
            }
        }
    }
}
