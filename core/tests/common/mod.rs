//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use civicdesk_core::{
    admin_area::AdminAreaResolver,
    clock::{Clock, ManualClock},
    complaint::{Complaint, CreateComplaint},
    complaint_service::ComplaintService,
    config::CoreConfig,
    effects::{Effects, FailureSink, Notification, Notifier},
    role::{AdminLevel, RoleProfile},
    store::CoreStore,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Seven features: six polygons (one MultiPolygon, one with a hole, one
/// overlapping an earlier one) and a Point that the loader must skip.
pub const AREAS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    { "type": "Feature",
      "properties": { "st_nm": "Maharashtra", "st_code": 27, "district": "Mumbai City", "dt_code": "519" },
      "geometry": { "type": "Polygon", "coordinates": [[[72.77,18.88],[72.90,18.88],[72.90,19.05],[72.77,19.05],[72.77,18.88]]] } },
    { "type": "Feature",
      "properties": { "st_nm": "Maharashtra", "st_code": 27, "district": "Mumbai Suburban", "dt_code": "518" },
      "geometry": { "type": "Polygon", "coordinates": [[[72.80,19.05],[72.98,19.05],[72.98,19.30],[72.80,19.30],[72.80,19.05]]] } },
    { "type": "Feature",
      "properties": { "st_nm": "Delhi", "st_code": "07", "district": "New Delhi", "dt_code": 77 },
      "geometry": { "type": "Polygon", "coordinates": [[[77.10,28.50],[77.30,28.50],[77.30,28.75],[77.10,28.75],[77.10,28.50]]] } },
    { "type": "Feature",
      "properties": { "state_name": "Maharashtra", "state_code": "27", "district_name": "Pune", "district_code": "521" },
      "geometry": { "type": "MultiPolygon", "coordinates": [
        [[[73.80,18.45],[73.95,18.45],[73.95,18.60],[73.80,18.60],[73.80,18.45]]],
        [[[74.10,18.45],[74.20,18.45],[74.20,18.55],[74.10,18.55],[74.10,18.45]]]
      ] } },
    { "type": "Feature",
      "properties": { "st_nm": "Maharashtra", "st_code": 27, "district": "Nagpur", "dt_code": "505" },
      "geometry": { "type": "Polygon", "coordinates": [
        [[79.00,21.05],[79.20,21.05],[79.20,21.25],[79.00,21.25],[79.00,21.05]],
        [[79.08,21.13],[79.12,21.13],[79.12,21.17],[79.08,21.17],[79.08,21.13]]
      ] } },
    { "type": "Feature",
      "properties": { "st_nm": "Maharashtra", "st_code": 27, "district": "Nagpur Rural", "dt_code": "506" },
      "geometry": { "type": "Polygon", "coordinates": [[[78.90,21.00],[79.30,21.00],[79.30,21.30],[78.90,21.30],[78.90,21.00]]] } },
    { "type": "Feature",
      "properties": { "st_nm": "Nowhere", "district": "Pin" },
      "geometry": { "type": "Point", "coordinates": [10.0, 10.0] } }
  ]
}"#;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: AtomicBool,
}

impl Notifier for RecordingNotifier {
    fn send(&self, n: &Notification) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("gateway unavailable");
        }
        self.sent.lock().unwrap().push(n.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub reports: Mutex<Vec<(String, String)>>,
}

impl FailureSink for RecordingSink {
    fn report(&self, effect: &str, complaint_id: &str, _error: &str) {
        self.reports
            .lock()
            .unwrap()
            .push((effect.to_string(), complaint_id.to_string()));
    }
}

pub struct Harness {
    pub service: ComplaintService,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub failures: Arc<RecordingSink>,
}

impl Harness {
    pub fn store(&self) -> &CoreStore {
        self.service.store()
    }

    pub fn reload(&self, complaint: &Complaint) -> Complaint {
        self.service.get(&complaint.complaint_id).expect("reload complaint")
    }
}

pub fn harness() -> Harness {
    harness_with(CoreConfig::default_test())
}

pub fn harness_with(config: CoreConfig) -> Harness {
    let store = CoreStore::in_memory_migrated().expect("in-memory store");
    build_harness(store, config)
}

/// Harness over a file database, so a second connection can share it.
pub fn harness_on(db: &FileDb) -> Harness {
    build_harness(db.open_store(), CoreConfig::default_test())
}

/// Service over a file database with a caller-supplied clock.
pub fn service_on(db: &FileDb, clock: Arc<dyn Clock>) -> ComplaintService {
    let areas = Arc::new(AdminAreaResolver::from_geojson(AREAS));
    ComplaintService::new(db.open_store(), CoreConfig::default_test(), areas).with_clock(clock)
}

fn build_harness(store: CoreStore, config: CoreConfig) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();

    let areas = Arc::new(AdminAreaResolver::from_geojson(AREAS));
    let clock = Arc::new(ManualClock::new(t0()));
    let notifier = Arc::new(RecordingNotifier::default());
    let failures = Arc::new(RecordingSink::default());

    let service = ComplaintService::new(store, config, areas)
        .with_clock(clock.clone())
        .with_effects(Effects::new(notifier.clone(), failures.clone()));

    Harness {
        service,
        clock,
        notifier,
        failures,
    }
}

/// Temporary SQLite file, removed with its WAL files on drop.
pub struct FileDb {
    pub path: String,
}

impl FileDb {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("civicdesk-{}.db", uuid::Uuid::new_v4()));
        Self {
            path: path.to_string_lossy().into_owned(),
        }
    }

    pub fn open_store(&self) -> CoreStore {
        let store = CoreStore::open(&self.path).expect("file store");
        store.migrate().expect("migrate file store");
        store
    }

    /// Raw connection for installing test-only triggers.
    pub fn raw(&self) -> rusqlite::Connection {
        rusqlite::Connection::open(&self.path).expect("raw connection")
    }
}

impl Drop for FileDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", self.path));
        }
    }
}

/// Manual clock that runs a queued action on its next read, letting a
/// test slip a competing write between an operation's read and its write.
pub struct InterleavingClock {
    inner: ManualClock,
    pending: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl InterleavingClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: ManualClock::new(start),
            pending: Mutex::new(None),
        }
    }

    pub fn before_next_read(&self, action: impl FnOnce() + Send + 'static) {
        *self.pending.lock().unwrap() = Some(Box::new(action));
    }
}

impl Clock for InterleavingClock {
    fn now(&self) -> DateTime<Utc> {
        let action = self.pending.lock().unwrap().take();
        if let Some(action) = action {
            action();
        }
        self.inner.now()
    }
}

pub fn report(user_id: &str, lat: f64, lng: f64, category: &str) -> CreateComplaint {
    CreateComplaint {
        user_id: user_id.into(),
        title: format!("{category} issue"),
        description: format!("{category} problem reported by {user_id}"),
        category: Some(category.into()),
        lat,
        lng,
        ..CreateComplaint::default()
    }
}

pub fn report_in_ward(user_id: &str, ward: &str) -> CreateComplaint {
    CreateComplaint {
        ward_code: Some(ward.into()),
        ..report(user_id, 19.2, 72.9, "Water")
    }
}

pub fn admin() -> RoleProfile {
    RoleProfile::admin("admin-1", AdminLevel::Super)
}
