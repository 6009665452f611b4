//! Geographic primitives.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// WGS84 coordinate.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Deserialize)]
struct RawGeoPoint {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = EngineError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.lat, raw.lng)
    }
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Result<Self, EngineError> {
        if !(lat.is_finite() && (-90.0..=90.0).contains(&lat)) {
            return Err(EngineError::validation(format!("latitude {lat} out of range")));
        }
        if !(lng.is_finite() && (-180.0..=180.0).contains(&lng)) {
            return Err(EngineError::validation(format!("longitude {lng} out of range")));
        }
        Ok(Self { lat, lng })
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = (other.lat - self.lat).to_radians();
        let dlng = (other.lng - self.lng).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}
