//! Complaint service: the operations exposed to the transport layer.
//!
//! CREATE FLOW (fixed order):
//!   1. validate payload
//!   2. classify when no category was given (provider chain, never fails)
//!   3. admin-area lookup
//!   4. ward assignment
//!   5. duplicate scan, insert, then bump the canonical support counter
//!      (a failed bump goes to the FailureSink; the insert stands)
//!   6. activity entry (fire-and-forget)
//!
//! Every status move goes through `lifecycle::check_transition`. A refused
//! request writes nothing. Activity and notification failures never reach
//! the caller.

use crate::{
    activity::{ActivityKind, ActivityLogEntry},
    admin_area::AdminAreaResolver,
    classify::ProviderChain,
    clock::{Clock, SystemClock},
    complaint::{
        Complaint, ComplaintStatus, CreateComplaint, GeoPoint, Location, Priority,
        ResolutionProof, UpdateComplaint,
    },
    config::CoreConfig,
    duplicate::DuplicateDetector,
    effects::{Effects, Notification, TEMPLATE_COMPLAINT_RESOLVED},
    error::{CoreError, CoreResult},
    escalation::EscalationSweeper,
    geo::great_circle_distance,
    lifecycle::{check_transition, Channel},
    query_planner::{ComplaintFilters, QueryPlanner},
    role::RoleProfile,
    store::CoreStore,
    ward::assign_ward,
};
use serde_json::json;
use std::sync::Arc;

pub const DEFAULT_LOCALE: &str = "en";

fn required_text(value: &str, field: &str) -> CoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

pub struct ComplaintService {
    store: CoreStore,
    config: CoreConfig,
    areas: Arc<AdminAreaResolver>,
    classifier: ProviderChain,
    effects: Effects,
    clock: Arc<dyn Clock>,
}

impl ComplaintService {
    pub fn new(store: CoreStore, config: CoreConfig, areas: Arc<AdminAreaResolver>) -> Self {
        Self {
            store,
            config,
            areas,
            classifier: ProviderChain::new(),
            effects: Effects::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_effects(mut self, effects: Effects) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_classifier(mut self, classifier: ProviderChain) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn store(&self) -> &CoreStore {
        &self.store
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// A sweeper sharing this service's clock, effects and SLA.
    pub fn sweeper(&self) -> EscalationSweeper {
        EscalationSweeper::new(&self.config, Arc::clone(&self.clock), self.effects.clone())
    }

    // ── Create ─────────────────────────────────────────────────────

    pub fn create(&self, payload: CreateComplaint) -> CoreResult<Complaint> {
        payload.validate()?;

        let (category, priority, summary) = match payload.category.as_deref().map(str::trim) {
            Some(cat) if !cat.is_empty() => (
                cat.to_string(),
                payload.priority.unwrap_or(Priority::Medium),
                None,
            ),
            _ => {
                let c = self.classifier.classify(&payload.title, &payload.description);
                (c.category, payload.priority.unwrap_or(c.priority), Some(c.summary))
            }
        };

        let area = self.areas.lookup(payload.lat, payload.lng)?;
        let ward_code = assign_ward(payload.ward_code.as_deref(), payload.lat, payload.lng);
        let location = Location::new(payload.lat, payload.lng, payload.address, area, ward_code);

        let detector = DuplicateDetector::from_config(&self.config);
        let duplicate = detector.find_canonical(&self.store, payload.lat, payload.lng, &category)?;

        let now = self.clock.now();
        let complaint = Complaint {
            complaint_id: uuid::Uuid::new_v4().to_string(),
            user_id: payload.user_id.trim().to_string(),
            title: payload.title.trim().to_string(),
            description: payload.description.trim().to_string(),
            category,
            priority,
            summary,
            status: ComplaintStatus::Submitted,
            location,
            created_at: now,
            updated_at: now,
            times_reopened: 0,
            is_escalated: false,
            escalation_triggered: false,
            escalated_at: None,
            attachments: payload.attachments,
            duplicate_of: duplicate.as_ref().map(|d| d.canonical_id.clone()),
            support_count: 1,
            is_overdue: false,
            resolution_proof: None,
            rejection_reason: None,
            resolver_id: None,
            reporter_phone: payload.reporter_phone.filter(|p| !p.trim().is_empty()),
            locale: payload
                .locale
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
        };

        self.store.insert_complaint(&complaint)?;
        if let Some(dup) = &duplicate {
            // The row is already stored; a missed bump is reported, not returned.
            match detector.record_support(&self.store, &dup.canonical_id) {
                Ok(()) => log::debug!(
                    "complaint {} linked to {} ({:.1} m)",
                    complaint.complaint_id,
                    dup.canonical_id,
                    dup.distance_m
                ),
                Err(e) => {
                    log::error!(
                        "support bump on {} for duplicate {} failed: {e}",
                        dup.canonical_id,
                        complaint.complaint_id
                    );
                    self.effects
                        .report_failure("support_count", &dup.canonical_id, &e.to_string());
                }
            }
        }

        let creator = RoleProfile::citizen(complaint.user_id.clone());
        let entry = ActivityLogEntry::by(
            &creator,
            &complaint.complaint_id,
            ActivityKind::Created,
            json!({
                "category": complaint.category,
                "priority": complaint.priority.as_str(),
                "ward_code": complaint.location.ward_code,
                "district_name": complaint.location.district_name,
                "duplicate_of": complaint.duplicate_of,
            }),
            now,
        );
        self.effects.record_activity(&self.store, &entry);

        log::debug!(
            "created complaint {} [{}] in {}",
            complaint.complaint_id,
            complaint.category,
            complaint.location.ward_code
        );
        Ok(complaint)
    }

    // ── Read ───────────────────────────────────────────────────────

    pub fn get(&self, complaint_id: &str) -> CoreResult<Complaint> {
        self.store
            .get_complaint(complaint_id)?
            .ok_or_else(|| CoreError::not_found(complaint_id))
    }

    pub fn list(&self, filters: &ComplaintFilters, caller: &RoleProfile) -> CoreResult<Vec<Complaint>> {
        let planner = QueryPlanner::new(&self.config);
        let plan = planner.plan(filters, caller);
        let rows = self.store.query_complaints(&plan)?;
        Ok(planner.finalize(rows, plan.limit, self.clock.now()))
    }

    pub fn get_timeline(&self, complaint_id: &str) -> CoreResult<Vec<ActivityLogEntry>> {
        self.get(complaint_id)?;
        self.store.activity_for_complaint(complaint_id)
    }

    // ── Transitions ────────────────────────────────────────────────

    /// Generic update. Never resolves; see `resolve`.
    pub fn update(
        &self,
        complaint_id: &str,
        payload: UpdateComplaint,
        caller: &RoleProfile,
    ) -> CoreResult<Complaint> {
        if payload.is_empty() {
            return Err(CoreError::validation("update carries no changes"));
        }
        let current = self.get(complaint_id)?;
        let mut next = current.clone();
        let mut kind = ActivityKind::Updated;

        if let Some(to) = payload.status {
            check_transition(current.status, to, caller, &current.user_id, Channel::Update)?;
            match to {
                ComplaintStatus::Rejected => {
                    let reason = required_text(
                        payload.rejection_reason.as_deref().unwrap_or_default(),
                        "rejection reason",
                    )?;
                    next.rejection_reason = Some(reason);
                }
                ComplaintStatus::Reopened => {
                    required_text(payload.note.as_deref().unwrap_or_default(), "reopen reason")?;
                    next.times_reopened += 1;
                }
                _ => {}
            }
            next.status = to;
            kind = ActivityKind::for_status(to);
        }

        if payload.priority.is_some() || payload.category.is_some() {
            if !caller.is_admin() {
                return Err(CoreError::unauthorized("only admins may change priority or category"));
            }
            if let Some(priority) = payload.priority {
                next.priority = priority;
            }
            if let Some(category) = payload.category.as_deref() {
                next.category = required_text(category, "category")?;
            }
        }

        let meta = json!({
            "from": current.status.as_str(),
            "to": next.status.as_str(),
            "priority": next.priority.as_str(),
            "category": next.category,
        });
        let profile_changed = payload.priority.is_some() || payload.category.is_some();
        self.commit(
            current.status,
            next,
            profile_changed,
            caller,
            kind,
            meta,
            payload.note.as_deref(),
        )
    }

    pub fn resolve(
        &self,
        complaint_id: &str,
        proof: ResolutionProof,
        admin_location: Option<GeoPoint>,
        caller: &RoleProfile,
    ) -> CoreResult<Complaint> {
        let current = self.get(complaint_id)?;
        if !caller.is_admin() {
            return Err(CoreError::unauthorized("only admins may resolve complaints"));
        }
        let image_ref = proof
            .image_ref()
            .ok_or_else(|| CoreError::validation("resolution proof must include an image"))?
            .to_string();
        check_transition(
            current.status,
            ComplaintStatus::Resolved,
            caller,
            &current.user_id,
            Channel::Resolve,
        )?;

        let distance_m = match admin_location {
            Some(at) => {
                if !at.lat.is_finite() || !at.lng.is_finite() {
                    return Err(CoreError::validation("admin location is not a valid coordinate"));
                }
                let d = great_circle_distance(
                    at.lat,
                    at.lng,
                    current.location.lat,
                    current.location.lng,
                );
                let limit = self.config.resolve_distance_limit_m();
                if d > limit {
                    log::warn!(
                        "resolve of {complaint_id} by {} refused: {d:.0} m away (max {limit:.0} m)",
                        caller.user_id
                    );
                    return Err(CoreError::StateConflict {
                        reason: format!(
                            "GPS mismatch: you are {d:.0} m from the complaint location \
                             (max {limit:.0} m); resolve again from the site"
                        ),
                        distance_m: Some(d),
                    });
                }
                Some(d)
            }
            None => None,
        };

        let note = proof.note.clone();
        let mut next = current.clone();
        next.status = ComplaintStatus::Resolved;
        next.resolution_proof = Some(proof);
        next.resolver_id = Some(caller.user_id.clone());

        let meta = json!({
            "from": current.status.as_str(),
            "to": ComplaintStatus::Resolved.as_str(),
            "image": image_ref,
            "distance_m": distance_m,
            "demo_mode": self.config.demo_mode,
        });
        let resolved = self.commit(
            current.status,
            next,
            false,
            caller,
            ActivityKind::Resolved,
            meta,
            note.as_deref(),
        )?;

        if let Some(phone) = &resolved.reporter_phone {
            let notification = Notification {
                phone: phone.clone(),
                template_key: TEMPLATE_COMPLAINT_RESOLVED.to_string(),
                locale: resolved.locale.clone(),
                params: json!({
                    "complaint_id": resolved.complaint_id,
                    "title": resolved.title,
                }),
            };
            self.effects.notify(&resolved.complaint_id, &notification);
        }
        Ok(resolved)
    }

    pub fn reject(&self, complaint_id: &str, reason: &str, caller: &RoleProfile) -> CoreResult<Complaint> {
        let current = self.get(complaint_id)?;
        check_transition(
            current.status,
            ComplaintStatus::Rejected,
            caller,
            &current.user_id,
            Channel::Reject,
        )?;
        let reason = required_text(reason, "rejection reason")?;

        let mut next = current.clone();
        next.status = ComplaintStatus::Rejected;
        next.rejection_reason = Some(reason.clone());

        let meta = json!({
            "from": current.status.as_str(),
            "to": ComplaintStatus::Rejected.as_str(),
        });
        self.commit(current.status, next, false, caller, ActivityKind::Rejected, meta, Some(&reason))
    }

    pub fn reopen(&self, complaint_id: &str, reason: &str, caller: &RoleProfile) -> CoreResult<Complaint> {
        let current = self.get(complaint_id)?;
        check_transition(
            current.status,
            ComplaintStatus::Reopened,
            caller,
            &current.user_id,
            Channel::Reopen,
        )?;
        let reason = required_text(reason, "reopen reason")?;

        let mut next = current.clone();
        next.status = ComplaintStatus::Reopened;
        next.times_reopened += 1;

        let meta = json!({
            "from": current.status.as_str(),
            "to": ComplaintStatus::Reopened.as_str(),
            "times_reopened": next.times_reopened,
        });
        self.commit(current.status, next, false, caller, ActivityKind::Reopened, meta, Some(&reason))
    }

    /// Persist an accepted change, then append its activity entry.
    ///
    /// The write only lands if the stored status is still `read_status`;
    /// a concurrent move turns into `StateConflict` with nothing written.
    /// The returned record is re-read so columns owned by others (support
    /// count, escalation) are current.
    #[allow(clippy::too_many_arguments)]
    fn commit(
        &self,
        read_status: ComplaintStatus,
        mut next: Complaint,
        profile_changed: bool,
        caller: &RoleProfile,
        kind: ActivityKind,
        meta: serde_json::Value,
        note: Option<&str>,
    ) -> CoreResult<Complaint> {
        let now = self.clock.now();
        next.updated_at = now;
        if let Err(e) = self.store.save_lifecycle_fields(&next, read_status, profile_changed) {
            if matches!(e, CoreError::StateConflict { .. }) {
                log::warn!("{} by {} refused: {e}", kind.as_str(), caller.user_id);
            }
            return Err(e);
        }
        let next = self.get(&next.complaint_id)?;

        let entry = ActivityLogEntry::by(caller, &next.complaint_id, kind, meta, now).with_note(note);
        self.effects.record_activity(&self.store, &entry);

        log::debug!(
            "complaint {} -> {} ({}) by {}",
            next.complaint_id,
            next.status,
            kind.as_str(),
            caller.user_id
        );
        Ok(next)
    }
}
