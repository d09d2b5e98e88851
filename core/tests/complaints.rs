//! Complaint creation and lifecycle tests.
//!
//! Tests cover:
//!   1. creation: admin area, ward, classification fallback, validation
//!   2. update: admin-only moves, resolved never reachable, reasons required
//!   3. resolve: proof image, GPS distance check, demo radius, notification
//!   4. reopen: owner only, resolved only, reopen counter
//!   5. timeline order and not-found handling

mod common;

use civicdesk_core::{
    activity::{ActivityKind, SYSTEM_ACTOR},
    classify::{Classification, ClassificationProvider, ProviderChain, FALLBACK_CATEGORY},
    complaint::{ComplaintStatus, GeoPoint, Priority, ResolutionProof, UpdateComplaint},
    config::CoreConfig,
    effects::TEMPLATE_COMPLAINT_RESOLVED,
    error::CoreError,
    role::RoleProfile,
};
use common::{admin, harness, harness_with, report, Harness};
use std::sync::atomic::Ordering;

const DELHI: (f64, f64) = (28.6139, 77.2090);

fn proof() -> ResolutionProof {
    ResolutionProof::with_image("https://img.example/fixed.jpg")
}

fn filed_in_delhi(h: &Harness) -> String {
    h.service
        .create(report("citizen-1", DELHI.0, DELHI.1, "Roads"))
        .unwrap()
        .complaint_id
}

// ── Creation ───────────────────────────────────────────────────────

#[test]
fn create_fills_admin_area_ward_and_defaults() {
    let h = harness();
    let c = h.service.create(report("citizen-1", DELHI.0, DELHI.1, "Roads")).unwrap();

    assert_eq!(c.status, ComplaintStatus::Submitted);
    assert_eq!(c.priority, Priority::Medium);
    assert_eq!(c.support_count, 1);
    assert_eq!(c.times_reopened, 0);
    assert!(!c.is_escalated && !c.escalation_triggered && !c.is_overdue);
    assert!(c.duplicate_of.is_none());
    assert_eq!(c.locale, "en");
    assert_eq!(c.location.state_name.as_deref(), Some("Delhi"));
    assert_eq!(c.location.district_name.as_deref(), Some("New Delhi"));
    assert_eq!(c.location.ward_code, "WARD_3");
    assert_eq!(c.created_at, common::t0());

    assert_eq!(h.reload(&c), c);
}

#[test]
fn create_outside_dataset_keeps_null_area() {
    let h = harness();
    let c = h.service.create(report("citizen-1", -33.8688, 151.2093, "Roads")).unwrap();
    assert!(c.location.state_name.is_none());
    assert!(c.location.district_name.is_none());
    assert_eq!(c.location.ward_code, "WARD_1");
}

#[test]
fn explicit_ward_code_wins_over_fallback() {
    let h = harness();
    let mut payload = report("citizen-1", DELHI.0, DELHI.1, "Roads");
    payload.ward_code = Some("WARD_42".into());
    assert_eq!(h.service.create(payload).unwrap().location.ward_code, "WARD_42");

    let mut blank = report("citizen-1", DELHI.0, DELHI.1, "Lighting");
    blank.ward_code = Some("   ".into());
    assert_eq!(h.service.create(blank).unwrap().location.ward_code, "WARD_3");
}

#[test]
fn missing_category_falls_back_when_no_provider_answers() {
    let h = harness();
    let mut payload = report("citizen-1", DELHI.0, DELHI.1, "Roads");
    payload.category = None;
    let c = h.service.create(payload).unwrap();

    assert_eq!(c.category, FALLBACK_CATEGORY);
    assert_eq!(c.priority, Priority::Medium);
    assert_eq!(c.summary.as_deref(), Some("Roads issue"));
}

struct Keyword;

impl ClassificationProvider for Keyword {
    fn name(&self) -> &str {
        "keyword"
    }

    fn classify(&self, title: &str, _description: &str) -> anyhow::Result<Classification> {
        anyhow::ensure!(title.contains("leak"), "no keyword matched");
        Ok(Classification {
            category: "Water".into(),
            priority: Priority::High,
            summary: "Water leak".into(),
        })
    }
}

#[test]
fn provider_classification_is_used_when_it_answers() {
    let Harness { service, .. } = harness();
    let service = service.with_classifier(ProviderChain::new().with_provider(Box::new(Keyword)));

    let mut payload = report("citizen-1", DELHI.0, DELHI.1, "ignored");
    payload.category = None;
    payload.title = "Pipe leak near school".into();
    let c = service.create(payload).unwrap();
    assert_eq!(c.category, "Water");
    assert_eq!(c.priority, Priority::High);

    let mut other = report("citizen-1", DELHI.0, DELHI.1, "ignored");
    other.category = None;
    assert_eq!(service.create(other).unwrap().category, FALLBACK_CATEGORY);
}

#[test]
fn invalid_payloads_are_rejected_before_any_write() {
    let h = harness();

    let mut no_title = report("citizen-1", DELHI.0, DELHI.1, "Roads");
    no_title.title = "  ".into();
    let bad_lat = report("citizen-1", 91.0, DELHI.1, "Roads");
    let nan_lng = report("citizen-1", DELHI.0, f64::NAN, "Roads");
    let no_user = report("", DELHI.0, DELHI.1, "Roads");

    for payload in [no_title, bad_lat, nan_lng, no_user] {
        let err = h.service.create(payload).unwrap_err();
        assert_eq!(err.kind(), "validation", "{err}");
    }
    assert_eq!(h.store().complaint_count().unwrap(), 0);
}

#[test]
fn create_fails_when_the_dataset_cannot_load() {
    use civicdesk_core::{
        admin_area::AdminAreaResolver, complaint_service::ComplaintService, store::CoreStore,
    };
    use std::sync::Arc;

    let store = CoreStore::in_memory_migrated().unwrap();
    let areas = Arc::new(AdminAreaResolver::from_file("/missing/districts.geojson"));
    let service = ComplaintService::new(store, CoreConfig::default_test(), areas);

    let err = service
        .create(report("citizen-1", DELHI.0, DELHI.1, "Roads"))
        .unwrap_err();
    assert!(matches!(err, CoreError::Dataset(_)));
    assert_eq!(err.kind(), "internal");
    assert_eq!(service.store().complaint_count().unwrap(), 0);
}

// ── Update ─────────────────────────────────────────────────────────

#[test]
fn admin_moves_complaint_to_in_progress() {
    let h = harness();
    let id = filed_in_delhi(&h);

    h.clock.advance(chrono::Duration::minutes(5));
    let c = h
        .service
        .update(&id, UpdateComplaint::status(ComplaintStatus::InProgress), &admin())
        .unwrap();
    assert_eq!(c.status, ComplaintStatus::InProgress);
    assert_eq!(c.updated_at, common::t0() + chrono::Duration::minutes(5));
    assert_eq!(c.created_at, common::t0());
}

#[test]
fn citizen_cannot_start_work() {
    let h = harness();
    let id = filed_in_delhi(&h);
    let err = h
        .service
        .update(
            &id,
            UpdateComplaint::status(ComplaintStatus::InProgress),
            &RoleProfile::citizen("citizen-1"),
        )
        .unwrap_err();
    assert_eq!(err.kind(), "authorization");
    assert_eq!(h.service.get(&id).unwrap().status, ComplaintStatus::Submitted);
}

#[test]
fn update_can_never_resolve() {
    let h = harness();
    let id = filed_in_delhi(&h);

    for setup in [None, Some(ComplaintStatus::InProgress)] {
        if let Some(status) = setup {
            h.service.update(&id, UpdateComplaint::status(status), &admin()).unwrap();
        }
        let err = h
            .service
            .update(&id, UpdateComplaint::status(ComplaintStatus::Resolved), &admin())
            .unwrap_err();
        assert_eq!(err.kind(), "state_conflict");
    }
    assert_ne!(h.service.get(&id).unwrap().status, ComplaintStatus::Resolved);
}

#[test]
fn empty_update_is_a_validation_error() {
    let h = harness();
    let id = filed_in_delhi(&h);
    let err = h
        .service
        .update(&id, UpdateComplaint::default(), &admin())
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn priority_and_category_changes_are_admin_only() {
    let h = harness();
    let id = filed_in_delhi(&h);
    let change = UpdateComplaint {
        priority: Some(Priority::High),
        category: Some("Drainage".into()),
        ..UpdateComplaint::default()
    };

    let err = h
        .service
        .update(&id, change.clone(), &RoleProfile::citizen("citizen-1"))
        .unwrap_err();
    assert_eq!(err.kind(), "authorization");

    let c = h.service.update(&id, change, &admin()).unwrap();
    assert_eq!(c.priority, Priority::High);
    assert_eq!(c.category, "Drainage");
    assert_eq!(c.status, ComplaintStatus::Submitted);
}

#[test]
fn reject_requires_a_reason_and_is_terminal() {
    let h = harness();
    let id = filed_in_delhi(&h);

    assert_eq!(h.service.reject(&id, " ", &admin()).unwrap_err().kind(), "validation");
    let via_update = UpdateComplaint::status(ComplaintStatus::Rejected);
    assert_eq!(
        h.service.update(&id, via_update, &admin()).unwrap_err().kind(),
        "validation"
    );

    let c = h.service.reject(&id, "private property", &admin()).unwrap();
    assert_eq!(c.status, ComplaintStatus::Rejected);
    assert_eq!(c.rejection_reason.as_deref(), Some("private property"));

    let again = UpdateComplaint::status(ComplaintStatus::InProgress);
    assert_eq!(
        h.service.update(&id, again, &admin()).unwrap_err().kind(),
        "state_conflict"
    );
    let err = h.service.resolve(&id, proof(), None, &admin()).unwrap_err();
    assert_eq!(err.kind(), "state_conflict");
}

#[test]
fn citizen_cannot_reject() {
    let h = harness();
    let id = filed_in_delhi(&h);
    let err = h
        .service
        .reject(&id, "spam", &RoleProfile::citizen("citizen-1"))
        .unwrap_err();
    assert_eq!(err.kind(), "authorization");
}

// ── Resolve ────────────────────────────────────────────────────────

#[test]
fn resolve_requires_an_image() {
    let h = harness();
    let id = filed_in_delhi(&h);
    let no_image = ResolutionProof {
        note: Some("done".into()),
        ..ResolutionProof::default()
    };
    let err = h.service.resolve(&id, no_image, None, &admin()).unwrap_err();
    assert_eq!(err.kind(), "validation");

    let blank = ResolutionProof::with_image("   ");
    assert!(h.service.resolve(&id, blank, None, &admin()).is_err());

    let link_only = ResolutionProof {
        web_view_link: Some("https://drive.example/view/1".into()),
        ..ResolutionProof::default()
    };
    let c = h.service.resolve(&id, link_only, None, &admin()).unwrap();
    assert_eq!(c.status, ComplaintStatus::Resolved);
}

#[test]
fn citizen_cannot_resolve() {
    let h = harness();
    let id = filed_in_delhi(&h);
    let err = h
        .service
        .resolve(&id, proof(), None, &RoleProfile::citizen("citizen-1"))
        .unwrap_err();
    assert_eq!(err.kind(), "authorization");
}

#[test]
fn resolve_far_from_site_is_refused_with_distance() {
    let h = harness();
    let id = filed_in_delhi(&h);
    let far = GeoPoint { lat: 28.7000, lng: 77.2000 };

    let err = h.service.resolve(&id, proof(), Some(far), &admin()).unwrap_err();
    assert_eq!(err.kind(), "state_conflict");
    match err {
        CoreError::StateConflict { distance_m, .. } => {
            let d = distance_m.expect("distance reported");
            assert!((d - 9614.0).abs() < 50.0, "{d}");
        }
        other => panic!("unexpected error {other:?}"),
    }

    let c = h.service.get(&id).unwrap();
    assert_eq!(c.status, ComplaintStatus::Submitted);
    assert!(c.resolution_proof.is_none());
    let timeline = h.service.get_timeline(&id).unwrap();
    assert!(timeline.iter().all(|e| e.kind != ActivityKind::Resolved));
}

#[test]
fn resolve_on_site_records_proof_and_resolver() {
    let h = harness();
    let id = filed_in_delhi(&h);
    let near = GeoPoint { lat: 28.6140, lng: 77.2091 };

    let c = h.service.resolve(&id, proof(), Some(near), &admin()).unwrap();
    assert_eq!(c.status, ComplaintStatus::Resolved);
    assert_eq!(c.resolver_id.as_deref(), Some("admin-1"));
    assert_eq!(
        c.resolution_proof.as_ref().and_then(|p| p.image_url.as_deref()),
        Some("https://img.example/fixed.jpg")
    );
    assert_eq!(h.reload(&c), c);
}

#[test]
fn demo_mode_widens_the_resolve_radius() {
    let one_km = GeoPoint { lat: 28.6229, lng: 77.2090 };

    let strict = harness();
    let id = filed_in_delhi(&strict);
    let err = strict.service.resolve(&id, proof(), Some(one_km), &admin()).unwrap_err();
    assert_eq!(err.kind(), "state_conflict");

    let demo = harness_with(CoreConfig::default_test().with_demo_mode(true));
    let id = filed_in_delhi(&demo);
    let c = demo.service.resolve(&id, proof(), Some(one_km), &admin()).unwrap();
    assert_eq!(c.status, ComplaintStatus::Resolved);
}

#[test]
fn resolve_notifies_the_reporter() {
    let h = harness();
    let mut payload = report("citizen-1", DELHI.0, DELHI.1, "Roads");
    payload.reporter_phone = Some("+911234567890".into());
    payload.locale = Some("hi".into());
    let id = h.service.create(payload).unwrap().complaint_id;

    h.service.resolve(&id, proof(), None, &admin()).unwrap();

    let sent = h.notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].phone, "+911234567890");
    assert_eq!(sent[0].template_key, TEMPLATE_COMPLAINT_RESOLVED);
    assert_eq!(sent[0].locale, "hi");
    assert_eq!(sent[0].params["complaint_id"], id.as_str());
}

#[test]
fn notification_failure_does_not_undo_resolve() {
    let h = harness();
    let mut payload = report("citizen-1", DELHI.0, DELHI.1, "Roads");
    payload.reporter_phone = Some("+911234567890".into());
    let id = h.service.create(payload).unwrap().complaint_id;
    h.notifier.fail.store(true, Ordering::SeqCst);

    let c = h.service.resolve(&id, proof(), None, &admin()).unwrap();
    assert_eq!(c.status, ComplaintStatus::Resolved);
    assert_eq!(h.service.get(&id).unwrap().status, ComplaintStatus::Resolved);

    let reports = h.failures.reports.lock().unwrap();
    assert_eq!(reports.as_slice(), &[("notification".to_string(), id)]);
}

#[test]
fn no_phone_means_no_notification() {
    let h = harness();
    let id = filed_in_delhi(&h);
    h.service.resolve(&id, proof(), None, &admin()).unwrap();
    assert!(h.notifier.sent.lock().unwrap().is_empty());
}

// ── Reopen ─────────────────────────────────────────────────────────

#[test]
fn owner_reopens_a_resolved_complaint() {
    let h = harness();
    let id = filed_in_delhi(&h);
    let owner = RoleProfile::citizen("citizen-1");

    let err = h.service.reopen(&id, "still broken", &owner).unwrap_err();
    assert_eq!(err.kind(), "state_conflict");

    h.service.resolve(&id, proof(), None, &admin()).unwrap();

    let stranger = RoleProfile::citizen("citizen-2");
    let err = h.service.reopen(&id, "still broken", &stranger).unwrap_err();
    assert_eq!(err.kind(), "authorization");
    assert_eq!(h.service.reopen(&id, "", &owner).unwrap_err().kind(), "validation");

    let c = h.service.reopen(&id, "still broken", &owner).unwrap();
    assert_eq!(c.status, ComplaintStatus::Reopened);
    assert_eq!(c.times_reopened, 1);

    // Second round trip through update.
    h.service.resolve(&id, proof(), None, &admin()).unwrap();
    let via_update = UpdateComplaint {
        status: Some(ComplaintStatus::Reopened),
        note: Some("broke again".into()),
        ..UpdateComplaint::default()
    };
    let c = h.service.update(&id, via_update, &owner).unwrap();
    assert_eq!(c.times_reopened, 2);

    let back_to_work = UpdateComplaint::status(ComplaintStatus::InProgress);
    let c = h.service.update(&id, back_to_work, &admin()).unwrap();
    assert_eq!(c.status, ComplaintStatus::InProgress);
}

// ── Timeline ───────────────────────────────────────────────────────

#[test]
fn timeline_lists_entries_in_append_order() {
    let h = harness();
    let id = filed_in_delhi(&h);
    let owner = RoleProfile::citizen("citizen-1");

    h.service
        .update(&id, UpdateComplaint::status(ComplaintStatus::InProgress), &admin())
        .unwrap();
    h.service.resolve(&id, proof(), None, &admin()).unwrap();
    h.service.reopen(&id, "still broken", &owner).unwrap();

    let timeline = h.service.get_timeline(&id).unwrap();
    let kinds: Vec<_> = timeline.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ActivityKind::Created,
            ActivityKind::StatusChanged,
            ActivityKind::Resolved,
            ActivityKind::Reopened,
        ]
    );
    assert!(timeline.windows(2).all(|w| w[0].seq < w[1].seq));
    assert_eq!(timeline[0].actor_id, "citizen-1");
    assert_eq!(timeline[1].actor_role, "superadmin");
    assert_eq!(timeline[3].note.as_deref(), Some("still broken"));
    assert!(timeline.iter().all(|e| e.actor_id != SYSTEM_ACTOR));
}

#[test]
fn unknown_complaint_is_not_found() {
    let h = harness();
    for err in [
        h.service.get("nope").unwrap_err(),
        h.service.get_timeline("nope").unwrap_err(),
        h.service.reject("nope", "x", &admin()).unwrap_err(),
        h.service.resolve("nope", proof(), None, &admin()).unwrap_err(),
    ] {
        assert_eq!(err.kind(), "not_found");
    }
}
