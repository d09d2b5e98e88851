//! Complaint records and request payloads.
//!
//! Values here are built once per request and never patched in place;
//! the service derives a new record for every accepted transition.

use crate::{
    admin_area::AdminArea,
    error::{CoreError, CoreResult},
    types::{ComplaintId, Timestamp, UserId},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Submitted,
    InProgress,
    Resolved,
    Rejected,
    Reopened,
}

impl ComplaintStatus {
    /// Statuses that still count against the SLA.
    pub const OPEN: [ComplaintStatus; 3] = [Self::Submitted, Self::InProgress, Self::Reopened];

    /// Statuses a new report can be linked to as a duplicate.
    pub const DUPLICATE_POOL: [ComplaintStatus; 4] =
        [Self::Submitted, Self::InProgress, Self::Resolved, Self::Reopened];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
            Self::Reopened => "reopened",
        }
    }

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "rejected" => Ok(Self::Rejected),
            "reopened" => Ok(Self::Reopened),
            other => Err(CoreError::validation(format!("unknown status '{other}'"))),
        }
    }
}

/// `High` is the top tier; escalation bumps to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const HIGHEST: Priority = Priority::High;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(CoreError::validation(format!("unknown priority '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
    pub state_name: Option<String>,
    pub state_code: Option<String>,
    pub district_name: Option<String>,
    pub district_code: Option<String>,
    pub ward_code: String,
}

impl Location {
    pub fn new(lat: f64, lng: f64, address: Option<String>, area: AdminArea, ward_code: String) -> Self {
        Self {
            lat,
            lng,
            address,
            state_name: area.state_name,
            state_code: area.state_code,
            district_name: area.district_name,
            district_code: area.district_code,
            ward_code,
        }
    }
}

/// A bare coordinate, e.g. where the resolving admin is standing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionProof {
    pub image_url: Option<String>,
    pub web_view_link: Option<String>,
    pub note: Option<String>,
}

impl ResolutionProof {
    pub fn with_image(url: &str) -> Self {
        Self {
            image_url: Some(url.to_string()),
            ..Self::default()
        }
    }

    /// The first non-blank image reference.
    pub fn image_ref(&self) -> Option<&str> {
        [self.image_url.as_deref(), self.web_view_link.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    pub complaint_id: ComplaintId,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub summary: Option<String>,
    pub status: ComplaintStatus,
    pub location: Location,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub times_reopened: u32,
    pub is_escalated: bool,
    pub escalation_triggered: bool,
    pub escalated_at: Option<Timestamp>,
    pub attachments: Vec<String>,
    pub duplicate_of: Option<ComplaintId>,
    pub support_count: u32,
    pub is_overdue: bool,
    pub resolution_proof: Option<ResolutionProof>,
    pub rejection_reason: Option<String>,
    pub resolver_id: Option<UserId>,
    pub reporter_phone: Option<String>,
    pub locale: String,
}

/// Creation payload from the transport layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateComplaint {
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    /// Classified from title/description when absent.
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
    pub ward_code: Option<String>,
    pub attachments: Vec<String>,
    pub reporter_phone: Option<String>,
    pub locale: Option<String>,
}

impl CreateComplaint {
    pub fn validate(&self) -> CoreResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(CoreError::validation("user_id is required"));
        }
        if self.title.trim().is_empty() {
            return Err(CoreError::validation("title is required"));
        }
        if self.description.trim().is_empty() {
            return Err(CoreError::validation("description is required"));
        }
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(CoreError::validation(format!("latitude out of range: {}", self.lat)));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(CoreError::validation(format!("longitude out of range: {}", self.lng)));
        }
        Ok(())
    }
}

/// Generic update payload. Resolution is never reachable through here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateComplaint {
    pub status: Option<ComplaintStatus>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub rejection_reason: Option<String>,
    pub note: Option<String>,
}

impl UpdateComplaint {
    pub fn status(status: ComplaintStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.priority.is_none() && self.category.is_none()
    }
}
