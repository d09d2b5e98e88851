//! Admin-area resolver: point → state/district lookup over a GeoJSON dataset.
//!
//! The dataset is loaded once into an immutable `AdminAreaIndex` and shared
//! behind an `Arc`; any number of requests may read it concurrently.
//!
//! LOOKUP ORDER:
//!   1. bbox prefilter per feature
//!   2. ray casting against exterior rings only (holes are not subtracted)
//!   3. first match in dataset order wins; overlaps have no other tie-break
//!
//! A failed load sticks until `reset()`. There is no automatic retry.

use crate::{
    error::{CoreError, CoreResult},
    geo::{self, BoundingBox, Position},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

const STATE_NAME_KEYS: &[&str] = &["st_nm", "state_name", "STATE"];
const STATE_CODE_KEYS: &[&str] = &["st_code", "state_code"];
const DISTRICT_NAME_KEYS: &[&str] = &["district", "district_name", "DISTRICT"];
const DISTRICT_CODE_KEYS: &[&str] = &["dt_code", "district_code"];

/// Result of a lookup. All fields are `None` when no polygon matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminArea {
    pub state_name: Option<String>,
    pub state_code: Option<String>,
    pub district_name: Option<String>,
    pub district_code: Option<String>,
}

impl AdminArea {
    pub fn is_resolved(&self) -> bool {
        self.state_name.is_some() || self.district_name.is_some()
    }
}

/// One feature of the dataset, with its exterior rings and bbox.
#[derive(Debug, Clone)]
pub struct AdministrativeArea {
    pub area: AdminArea,
    pub exterior_rings: Vec<Vec<Position>>,
    pub bbox: BoundingBox,
}

impl AdministrativeArea {
    fn contains(&self, lat: f64, lng: f64) -> bool {
        self.bbox.contains(lat, lng)
            && self
                .exterior_rings
                .iter()
                .any(|ring| geo::point_in_ring(lat, lng, ring))
    }
}

// ── GeoJSON wire shapes ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FeatureCollectionFile {
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawGeometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

fn to_ring(raw: &[Vec<f64>]) -> Vec<Position> {
    raw.iter()
        .filter(|p| p.len() >= 2)
        .map(|p| [p[0], p[1]])
        .collect()
}

/// Codes show up as strings in some datasets and numbers in others.
fn prop_text(props: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match props.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// ── Index ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct AdminAreaIndex {
    features: Vec<AdministrativeArea>,
}

impl AdminAreaIndex {
    pub fn from_geojson_str(raw: &str) -> CoreResult<Self> {
        let file: FeatureCollectionFile = serde_json::from_str(raw)
            .map_err(|e| CoreError::Dataset(format!("invalid feature collection: {e}")))?;

        let mut features = Vec::with_capacity(file.features.len());
        for (idx, feature) in file.features.into_iter().enumerate() {
            let props = feature.properties.unwrap_or_default();
            let exterior_rings: Vec<Vec<Position>> = match feature.geometry {
                Some(RawGeometry::Polygon { coordinates }) => {
                    coordinates.first().map(|r| to_ring(r)).into_iter().collect()
                }
                Some(RawGeometry::MultiPolygon { coordinates }) => coordinates
                    .iter()
                    .filter_map(|poly| poly.first().map(|r| to_ring(r)))
                    .collect(),
                Some(RawGeometry::Unsupported) | None => {
                    log::warn!("admin area feature {idx} has no polygon geometry, skipped");
                    continue;
                }
            };
            if exterior_rings.iter().all(|r| r.len() < 3) {
                log::warn!("admin area feature {idx} has no usable ring, skipped");
                continue;
            }

            let bbox = BoundingBox::of_rings(&exterior_rings);
            features.push(AdministrativeArea {
                area: AdminArea {
                    state_name: prop_text(&props, STATE_NAME_KEYS),
                    state_code: prop_text(&props, STATE_CODE_KEYS),
                    district_name: prop_text(&props, DISTRICT_NAME_KEYS),
                    district_code: prop_text(&props, DISTRICT_CODE_KEYS),
                },
                exterior_rings,
                bbox,
            });
        }
        Ok(Self { features })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn lookup(&self, lat: f64, lng: f64) -> AdminArea {
        self.features
            .iter()
            .find(|f| f.contains(lat, lng))
            .map(|f| f.area.clone())
            .unwrap_or_default()
    }
}

// ── Resolver (lifecycle owner) ──────────────────────────────────

#[derive(Debug, Clone)]
pub enum DatasetSource {
    File(PathBuf),
    Inline(String),
}

#[derive(Debug)]
enum LoadState {
    Unloaded,
    Ready(Arc<AdminAreaIndex>),
    Failed(String),
}

/// Injectable, lazily initialised holder of the admin-area index.
#[derive(Debug)]
pub struct AdminAreaResolver {
    source: DatasetSource,
    state: RwLock<LoadState>,
}

impl AdminAreaResolver {
    pub fn new(source: DatasetSource) -> Self {
        Self {
            source,
            state: RwLock::new(LoadState::Unloaded),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(DatasetSource::File(path.into()))
    }

    pub fn from_geojson(raw: impl Into<String>) -> Self {
        Self::new(DatasetSource::Inline(raw.into()))
    }

    /// Load the dataset if nothing has been attempted yet.
    /// Later calls return the cached index (or the cached failure).
    pub fn init(&self) -> CoreResult<Arc<AdminAreaIndex>> {
        {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            match &*state {
                LoadState::Ready(index) => return Ok(Arc::clone(index)),
                LoadState::Failed(msg) => return Err(CoreError::Dataset(msg.clone())),
                LoadState::Unloaded => {}
            }
        }

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        // Another caller may have finished loading while we waited.
        match &*state {
            LoadState::Ready(index) => return Ok(Arc::clone(index)),
            LoadState::Failed(msg) => return Err(CoreError::Dataset(msg.clone())),
            LoadState::Unloaded => {}
        }

        match self.load() {
            Ok(index) => {
                log::info!("admin area dataset loaded: {} features", index.len());
                let index = Arc::new(index);
                *state = LoadState::Ready(Arc::clone(&index));
                Ok(index)
            }
            Err(e) => {
                let msg = e.to_string();
                log::error!("admin area dataset load failed: {msg}");
                *state = LoadState::Failed(msg.clone());
                Err(CoreError::Dataset(msg))
            }
        }
    }

    /// Drop the loaded (or failed) state. The next `init` reloads.
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = LoadState::Unloaded;
    }

    pub fn is_loaded(&self) -> bool {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        matches!(&*state, LoadState::Ready(_))
    }

    pub fn lookup(&self, lat: f64, lng: f64) -> CoreResult<AdminArea> {
        Ok(self.init()?.lookup(lat, lng))
    }

    fn load(&self) -> CoreResult<AdminAreaIndex> {
        match &self.source {
            DatasetSource::Inline(raw) => AdminAreaIndex::from_geojson_str(raw),
            DatasetSource::File(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    CoreError::Dataset(format!("cannot read {}: {e}", path.display()))
                })?;
                AdminAreaIndex::from_geojson_str(&raw)
            }
        }
    }
}
