use serde::Deserialize;
use serde_json::{json, Value};

use wgrid_coordination::DemandEstimate;
use wgrid_inventory::InventoryItem;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub route_id: String,
    #[serde(default)]
    pub objective: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub projected_duration_min: f64,
}

#[derive(Debug, Deserialize)]
pub struct ResolveAnomalyRequest {
    pub resolution: String,
}

#[derive(Debug, Deserialize)]
pub struct SaleRequest {
    pub sku: String,
    pub units: u64,
    pub value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpoilageRequest {
    pub sku: String,
    pub units_spoiled: u64,
    pub units_handled: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionsRequest {
    #[serde(default)]
    pub estimates: Vec<DemandEstimate>,
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct RoutesQuery {
    #[serde(default)]
    pub objective: Option<String>,
}

// -------------------------
// Response helpers
// -------------------------

/// Inventory row with the derived flags dashboards filter on.
pub fn inventory_to_json(item: &InventoryItem) -> Value {
    json!({
        "store_id": item.store_id.to_string(),
        "sku": item.sku.to_string(),
        "category": item.category,
        "quantity": item.quantity,
        "status": item.status(),
        "reorder_level": item.reorder_level,
        "expiry_horizon_days": item.expiry_horizon_days,
        "low_stock": item.is_low_stock(),
        "expiring_soon": item.is_expiring_soon(),
        "perishable": item.is_perishable(),
    })
}
