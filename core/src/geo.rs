//! Geometry primitives: great-circle distance, bounding boxes, ray casting.
//!
//! Coordinates in rings follow GeoJSON order: `[lng, lat]`.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A GeoJSON position, `[lng, lat]`.
pub type Position = [f64; 2];

/// Haversine distance in metres.
pub fn great_circle_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Box that contains nothing; extending it with any position fixes that.
    pub fn empty() -> Self {
        Self {
            min_lng: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lng: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
        }
    }

    pub fn extend(&mut self, p: Position) {
        self.min_lng = self.min_lng.min(p[0]);
        self.min_lat = self.min_lat.min(p[1]);
        self.max_lng = self.max_lng.max(p[0]);
        self.max_lat = self.max_lat.max(p[1]);
    }

    pub fn of_rings<'a>(rings: impl IntoIterator<Item = &'a Vec<Position>>) -> Self {
        let mut bbox = Self::empty();
        for ring in rings {
            for p in ring {
                bbox.extend(*p);
            }
        }
        bbox
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lng >= self.min_lng && lng <= self.max_lng && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// Even-odd ray casting against one ring. Holes are the caller's concern.
/// Points exactly on an edge may land either side.
pub fn point_in_ring(lat: f64, lng: f64, ring: &[Position]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > lat) != (yj > lat) && lng < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
