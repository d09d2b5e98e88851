//! Per-complaint audit trail.
//!
//! RULE: entries are append-only. The store exposes no update or delete, and
//! the schema aborts any attempt to do either.

use crate::{
    complaint::ComplaintStatus,
    role::RoleProfile,
    types::{ComplaintId, Timestamp, UserId},
};
use serde::{Deserialize, Serialize};

/// Actor id used for entries written by the sweeper.
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Created,
    Updated,
    StatusChanged,
    Resolved,
    Rejected,
    Reopened,
    Escalated,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::StatusChanged => "status_changed",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
            Self::Reopened => "reopened",
            Self::Escalated => "escalated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "created" => Self::Created,
            "updated" => Self::Updated,
            "status_changed" => Self::StatusChanged,
            "resolved" => Self::Resolved,
            "rejected" => Self::Rejected,
            "reopened" => Self::Reopened,
            "escalated" => Self::Escalated,
            _ => return None,
        })
    }

    /// Entry kind for a status move.
    pub fn for_status(to: ComplaintStatus) -> Self {
        match to {
            ComplaintStatus::Resolved => Self::Resolved,
            ComplaintStatus::Rejected => Self::Rejected,
            ComplaintStatus::Reopened => Self::Reopened,
            ComplaintStatus::Submitted | ComplaintStatus::InProgress => Self::StatusChanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    /// Assigned by the store; `None` before the append lands.
    pub seq: Option<i64>,
    pub complaint_id: ComplaintId,
    pub kind: ActivityKind,
    pub actor_id: UserId,
    pub actor_role: String,
    pub meta: serde_json::Value,
    pub note: Option<String>,
    pub timestamp: Timestamp,
}

impl ActivityLogEntry {
    pub fn by(
        actor: &RoleProfile,
        complaint_id: &str,
        kind: ActivityKind,
        meta: serde_json::Value,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            seq: None,
            complaint_id: complaint_id.to_string(),
            kind,
            actor_id: actor.user_id.clone(),
            actor_role: actor.role_label().to_string(),
            meta,
            note: None,
            timestamp,
        }
    }

    pub fn by_system(
        complaint_id: &str,
        kind: ActivityKind,
        meta: serde_json::Value,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            seq: None,
            complaint_id: complaint_id.to_string(),
            kind,
            actor_id: SYSTEM_ACTOR.to_string(),
            actor_role: SYSTEM_ACTOR.to_string(),
            meta,
            note: None,
            timestamp,
        }
    }

    pub fn with_note(mut self, note: Option<&str>) -> Self {
        self.note = note.map(str::trim).filter(|n| !n.is_empty()).map(String::from);
        self
    }
}
