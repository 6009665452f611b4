use core::cmp::Ordering;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use wgrid_core::{EngineError, GeoPoint, RouteId, Sku, StoreId};

use crate::fleet::VehicleType;

/// Ranking goal for candidate routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    Eco,
    Time,
    Cost,
}

impl Objective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Objective::Eco => "eco",
            Objective::Time => "time",
            Objective::Cost => "cost",
        }
    }
}

impl FromStr for Objective {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eco" => Ok(Objective::Eco),
            "time" => Ok(Objective::Time),
            "cost" => Ok(Objective::Cost),
            other => Err(EngineError::validation(format!(
                "unknown objective '{other}' (expected eco, time or cost)"
            ))),
        }
    }
}

impl core::fmt::Display for Objective {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Direct,
    Pooled,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKind::Direct => "direct",
            RouteKind::Pooled => "pooled",
        }
    }
}

/// A drop-off the store has to make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    /// Caller-chosen stable id (a negotiation id for transfers).
    pub id: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub sku: Option<Sku>,
    #[serde(default)]
    pub units: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub store_id: StoreId,
    pub origin: GeoPoint,
    pub deliveries: Vec<DeliveryRequest>,
    pub fleet: crate::fleet::Fleet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub location: GeoPoint,
    pub delivery_id: String,
    /// Minutes after departure.
    pub eta_min: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: RouteId,
    pub store_id: StoreId,
    pub vehicle_id: String,
    pub vehicle_type: VehicleType,
    pub kind: RouteKind,
    pub objective: Objective,
    pub distance_km: f64,
    pub estimated_duration_min: f64,
    pub carbon_footprint_kg: f64,
    pub cost: f64,
    pub stops: Vec<Stop>,
}

impl Route {
    pub fn serves(&self, delivery_id: &str) -> bool {
        self.stops.iter().any(|s| s.delivery_id == delivery_id)
    }

    /// Metrics in tie-break order for `objective`.
    fn ranking_key(&self, objective: Objective) -> [f64; 3] {
        match objective {
            Objective::Eco => [self.carbon_footprint_kg, self.estimated_duration_min, self.cost],
            Objective::Time => [self.estimated_duration_min, self.cost, self.carbon_footprint_kg],
            Objective::Cost => [self.cost, self.estimated_duration_min, self.carbon_footprint_kg],
        }
    }
}

/// Total order for ranking: objective metric, the other two, then id.
pub fn compare_routes(a: &Route, b: &Route, objective: Objective) -> Ordering {
    let (ka, kb) = (a.ranking_key(objective), b.ranking_key(objective));
    ka.iter()
        .zip(kb.iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id.cmp(&b.id))
}
