//! Ward assignment.
//!
//! An explicit ward code always wins. Without one, the ward is bucketed from
//! the rounded coordinates:
//!
//!   h    = |floor(lat*1000) + floor(lng*1000)|
//!   ward = (h mod 10) + 1   ->  "WARD_<ward>"
//!
//! KNOWN LIMITATION: this is a coarse heuristic, not a geographic ward. Very
//! different places share a bucket. Admin scoping by ward inherits that.

pub const WARD_PREFIX: &str = "WARD_";

pub fn assign_ward(explicit: Option<&str>, lat: f64, lng: f64) -> String {
    match explicit.map(str::trim) {
        Some(code) if !code.is_empty() => code.to_string(),
        _ => fallback_ward(lat, lng),
    }
}

pub fn fallback_ward(lat: f64, lng: f64) -> String {
    let h = ((lat * 1000.0).floor() as i64 + (lng * 1000.0).floor() as i64).unsigned_abs();
    format!("{WARD_PREFIX}{}", h % 10 + 1)
}
