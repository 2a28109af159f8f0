// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Great-circle distance and data-driven zone lookup.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two coordinates, in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lon.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lon.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// A named rectangular zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Zone {
    fn contains(&self, p: GeoPoint) -> bool {
        p.lat >= self.min_lat && p.lat <= self.max_lat && p.lon >= self.min_lon && p.lon <= self.max_lon
    }
}

/// Zone membership table loaded from deployment data. An empty table
/// disables zone filtering entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneTable {
    #[serde(default)]
    pub zones: Vec<Zone>,
}

impl ZoneTable {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let table: Self = serde_json::from_str(&contents)?;
        tracing::info!(zones = table.zones.len(), path = %path.display(), "loaded zone table");
        Ok(table)
    }

    /// Name of the first zone containing the point. Later entries never
    /// shadow earlier ones; deployments order tables accordingly.
    pub fn zone_for(&self, p: GeoPoint) -> Option<&str> {
        self.zones.iter().find(|z| z.contains(p)).map(|z| z.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

#[cfg(test)]
#[path = "geo_tests.rs"]
mod tests;
