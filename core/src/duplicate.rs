//! Duplicate detection for new reports.
//!
//! Pool: complaints in submitted | in_progress | resolved | reopened.
//! The store narrows the pool to a latitude band; longitude band, distance
//! and category are checked here. The FIRST candidate in insertion order that
//! passes wins, not the nearest one.
//!
//! Two creations racing at the same spot can both miss each other and start
//! two canonical chains. That is accepted; only the counter bump is atomic.

use crate::{
    complaint::Complaint,
    config::CoreConfig,
    error::CoreResult,
    geo::great_circle_distance,
    store::CoreStore,
    types::ComplaintId,
};

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch {
    pub canonical_id: ComplaintId,
    pub distance_m: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct DuplicateDetector {
    radius_m: f64,
    band_deg: f64,
}

impl DuplicateDetector {
    pub fn new(radius_m: f64, band_deg: f64) -> Self {
        Self { radius_m, band_deg }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.duplicate_radius_m, config.duplicate_band_deg)
    }

    pub fn find_canonical(
        &self,
        store: &CoreStore,
        lat: f64,
        lng: f64,
        category: &str,
    ) -> CoreResult<Option<DuplicateMatch>> {
        let candidates = store.duplicate_candidates(lat - self.band_deg, lat + self.band_deg)?;
        Ok(self.first_match(&candidates, lat, lng, category))
    }

    /// Scan an already lat-filtered pool in order.
    pub fn first_match(
        &self,
        candidates: &[Complaint],
        lat: f64,
        lng: f64,
        category: &str,
    ) -> Option<DuplicateMatch> {
        candidates
            .iter()
            .filter(|c| (c.location.lng - lng).abs() <= self.band_deg)
            .find_map(|c| {
                let distance_m = great_circle_distance(lat, lng, c.location.lat, c.location.lng);
                (distance_m < self.radius_m && c.category == category).then(|| DuplicateMatch {
                    canonical_id: c.complaint_id.clone(),
                    distance_m,
                })
            })
    }

    /// Bump the canonical complaint's support counter.
    pub fn record_support(&self, store: &CoreStore, canonical_id: &str) -> CoreResult<()> {
        store.increment_support_count(canonical_id)
    }
}
