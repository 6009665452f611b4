use serde::{Deserialize, Serialize};

use wgrid_core::{EngineError, EngineResult};
use wgrid_inventory::InventoryItem;

/// Default transport rate in currency units per km.
pub const DEFAULT_BASE_RATE_PER_KM: f64 = 5.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Routine,
    Urgent,
    Emergency,
}

/// `round(distance × rate × max(1, floor(qty / 10)))`, half away from zero.
pub fn calculate_transfer_cost(distance_km: f64, quantity: u64, base_rate_per_km: f64) -> EngineResult<u64> {
    if !(distance_km.is_finite() && distance_km >= 0.0) {
        return Err(EngineError::validation("distance must be a non-negative number of km"));
    }
    if !(base_rate_per_km.is_finite() && base_rate_per_km >= 0.0) {
        return Err(EngineError::validation("base rate must be non-negative"));
    }
    let quantity_factor = (quantity / 10).max(1) as f64;
    Ok((distance_km * base_rate_per_km * quantity_factor).round() as u64)
}

/// Emergency requests are critical; otherwise driven by how depleted the
/// destination is relative to its reorder level.
pub fn calculate_priority(urgency: Urgency, destination: &InventoryItem) -> Priority {
    if urgency == Urgency::Emergency {
        return Priority::Critical;
    }
    match destination.stock_ratio() {
        Some(r) if r < 0.1 => Priority::High,
        Some(r) if r < 0.3 => Priority::Medium,
        _ => Priority::Low,
    }
}
