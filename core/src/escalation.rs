//! Escalation sweep: flags complaints that breached the response SLA.
//!
//! Triggered from outside (cron, the runner). One sweep:
//!   1. select open complaints created at or before now − SLA with
//!      escalation_triggered = 0
//!   2. in ONE transaction: is_overdue, is_escalated, escalation_triggered,
//!      escalated_at = now, priority = high
//!   3. afterwards, one `escalated` activity entry per complaint, written
//!      sequentially and outside that transaction
//!
//! A crash between 2 and 3 leaves escalations without audit entries; the log
//! is audit-only so that is tolerated. The escalation_triggered gate makes
//! repeated sweeps no-ops for already escalated complaints.

use crate::{
    activity::{ActivityKind, ActivityLogEntry},
    clock::Clock,
    complaint::Priority,
    config::CoreConfig,
    effects::Effects,
    error::CoreResult,
    store::CoreStore,
    types::{ComplaintId, Timestamp},
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub swept_at: Timestamp,
    pub escalated: Vec<ComplaintId>,
    /// Escalations whose activity entry could not be written.
    pub log_failures: usize,
}

pub struct EscalationSweeper {
    sla_hours: i64,
    clock: Arc<dyn Clock>,
    effects: Effects,
}

impl EscalationSweeper {
    pub fn new(config: &CoreConfig, clock: Arc<dyn Clock>, effects: Effects) -> Self {
        Self {
            sla_hours: config.sla_hours,
            clock,
            effects,
        }
    }

    pub fn sweep(&self, store: &CoreStore) -> CoreResult<SweepReport> {
        let now = self.clock.now();
        let cutoff = now - chrono::Duration::hours(self.sla_hours);

        let candidates = store.escalation_candidates(cutoff)?;
        if candidates.is_empty() {
            log::debug!("sweep at {now}: nothing past the {}h SLA", self.sla_hours);
            return Ok(SweepReport {
                swept_at: now,
                escalated: Vec::new(),
                log_failures: 0,
            });
        }

        let escalated = store.escalate_complaints(&candidates, now)?;

        let mut log_failures = 0;
        for complaint_id in &escalated {
            let entry = ActivityLogEntry::by_system(
                complaint_id,
                ActivityKind::Escalated,
                serde_json::json!({
                    "reason": "sla_breach",
                    "sla_hours": self.sla_hours,
                    "priority": Priority::HIGHEST.as_str(),
                }),
                now,
            );
            if !self.effects.record_activity(store, &entry) {
                log_failures += 1;
            }
        }

        log::info!(
            "sweep at {now}: escalated {} of {} candidates ({} audit failures)",
            escalated.len(),
            candidates.len(),
            log_failures
        );
        Ok(SweepReport {
            swept_at: now,
            escalated,
            log_failures,
        })
    }
}
