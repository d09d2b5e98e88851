//! Core configuration: SLA window, duplicate radius, resolve distance limit and city jurisdictions.

use serde::{Deserialize, Serialize};

/// How a city-level admin's assigned city maps onto admin-area fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum CityJurisdiction {
    /// The whole city is one state (capital territory).
    State { state_name: String },
    /// The city spans a fixed set of districts.
    Districts { district_names: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityJurisdictionRule {
    pub city: String,
    #[serde(flatten)]
    pub jurisdiction: CityJurisdiction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Open complaints older than this are SLA breaches.
    pub sla_hours: i64,
    pub duplicate_radius_m: f64,
    /// Half-width of the lat/lng prefilter band, in degrees.
    pub duplicate_band_deg: f64,
    pub max_resolve_distance_m: f64,
    pub demo_max_resolve_distance_m: f64,
    pub demo_mode: bool,
    /// GeoJSON feature collection, relative to the data dir.
    pub admin_areas_path: String,
    pub city_jurisdictions: Vec<CityJurisdictionRule>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            sla_hours: 48,
            duplicate_radius_m: 100.0,
            duplicate_band_deg: 0.001,
            max_resolve_distance_m: 200.0,
            demo_max_resolve_distance_m: 5_000.0,
            demo_mode: false,
            admin_areas_path: "admin_areas/districts.geojson".into(),
            city_jurisdictions: vec![
                CityJurisdictionRule {
                    city: "Delhi".into(),
                    jurisdiction: CityJurisdiction::State {
                        state_name: "Delhi".into(),
                    },
                },
                CityJurisdictionRule {
                    city: "Mumbai".into(),
                    jurisdiction: CityJurisdiction::Districts {
                        district_names: vec![
                            "Mumbai".into(),
                            "Mumbai City".into(),
                            "Mumbai Suburban".into(),
                        ],
                    },
                },
            ],
        }
    }
}

impl CoreConfig {
    /// Load from the data/ directory. Missing keys fall back to defaults.
    /// In tests, use CoreConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/config/core.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: CoreConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {path}: {e}"))?;
        config.validate()?;
        log::debug!(
            "loaded config from {path}: sla={}h demo_mode={}",
            config.sla_hours,
            config.demo_mode
        );
        Ok(config)
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self::default()
    }

    pub fn with_demo_mode(mut self, on: bool) -> Self {
        self.demo_mode = on;
        self
    }

    /// The GPS limit that applies to resolve right now.
    pub fn resolve_distance_limit_m(&self) -> f64 {
        if self.demo_mode {
            self.demo_max_resolve_distance_m
        } else {
            self.max_resolve_distance_m
        }
    }

    pub fn sla_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.sla_hours)
    }

    /// Special-case mapping for an assigned city, if one exists.
    /// City keys compare case-insensitively after trimming.
    pub fn city_jurisdiction(&self, city: &str) -> Option<&CityJurisdiction> {
        let wanted = city.trim();
        self.city_jurisdictions
            .iter()
            .find(|rule| rule.city.trim().eq_ignore_ascii_case(wanted))
            .map(|rule| &rule.jurisdiction)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.sla_hours <= 0 {
            anyhow::bail!("sla_hours must be positive, got {}", self.sla_hours);
        }
        if self.duplicate_radius_m <= 0.0 || self.duplicate_band_deg <= 0.0 {
            anyhow::bail!("duplicate radius and band must be positive");
        }
        if self.max_resolve_distance_m <= 0.0 || self.demo_max_resolve_distance_m <= 0.0 {
            anyhow::bail!("resolve distance limits must be positive");
        }
        Ok(())
    }
}
