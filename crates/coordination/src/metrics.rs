//! Dashboard rollups computed from snapshots. Nothing here is stored.

use serde::{Deserialize, Serialize};

use wgrid_ai::{Anomaly, Severity};
use wgrid_core::{Sku, StoreId};
use wgrid_inventory::InventoryItem;
use wgrid_negotiation::{Transfer, TransferRequest, TransferStatus};
use wgrid_routing::{carbon_footprint_kg, VehicleType};

/// Demand estimates below this confidence are ignored.
pub const MIN_DEMAND_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMetrics {
    pub store_id: StoreId,
    pub total_units: u64,
    pub sku_count: usize,
    pub low_stock: usize,
    pub expiring_soon: usize,
    pub pending_transfers: usize,
    pub approved_transfers: usize,
    pub in_transit_transfers: usize,
    pub open_anomalies: usize,
    pub critical_anomalies: usize,
}

impl StoreMetrics {
    pub fn compute(
        store_id: &StoreId,
        items: &[InventoryItem],
        transfers: &[Transfer],
        open_anomalies: &[Anomaly],
    ) -> Self {
        let with_status = |s: TransferStatus| transfers.iter().filter(|t| t.status() == s).count();
        Self {
            store_id: store_id.clone(),
            total_units: items.iter().map(|i| i.quantity).sum(),
            sku_count: items.len(),
            low_stock: items.iter().filter(|i| i.is_low_stock()).count(),
            expiring_soon: items.iter().filter(|i| i.is_expiring_soon()).count(),
            pending_transfers: with_status(TransferStatus::Pending),
            approved_transfers: with_status(TransferStatus::Approved),
            in_transit_transfers: with_status(TransferStatus::InTransit),
            open_anomalies: open_anomalies.len(),
            critical_anomalies: open_anomalies
                .iter()
                .filter(|a| a.severity == Severity::Critical)
                .count(),
        }
    }
}

/// Carbon accounting over the routes a store has dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EcoSummary {
    pub store_id: StoreId,
    pub dispatched_routes: usize,
    pub electric_routes: usize,
    pub total_distance_km: f64,
    pub carbon_footprint_kg: f64,
    /// What the same kilometres would have emitted on diesel.
    pub diesel_baseline_kg: f64,
    pub carbon_avoided_kg: f64,
    /// `electric_routes / dispatched_routes`, 0 when nothing was dispatched.
    pub electric_share: f64,
}

impl EcoSummary {
    /// Counts routes pinned to transfers leaving `store_id`.
    pub fn compute(store_id: &StoreId, transfers: &[Transfer]) -> Self {
        let routes: Vec<_> = transfers
            .iter()
            .filter(|t| t.source_store() == Some(store_id))
            .filter_map(|t| t.route())
            .collect();

        let total_distance_km: f64 = routes.iter().map(|r| r.distance_km).sum();
        let carbon_footprint_kg: f64 = routes.iter().map(|r| r.carbon_footprint_kg).sum();
        let diesel_baseline_kg = diesel_baseline(&routes);
        let electric_routes = routes
            .iter()
            .filter(|r| r.vehicle_type == VehicleType::Electric)
            .count();

        Self {
            store_id: store_id.clone(),
            dispatched_routes: routes.len(),
            electric_routes,
            total_distance_km,
            carbon_footprint_kg,
            diesel_baseline_kg,
            carbon_avoided_kg: (diesel_baseline_kg - carbon_footprint_kg).max(0.0),
            electric_share: if routes.is_empty() {
                0.0
            } else {
                electric_routes as f64 / routes.len() as f64
            },
        }
    }
}

fn diesel_baseline(routes: &[&wgrid_routing::Route]) -> f64 {
    routes
        .iter()
        .map(|r| carbon_footprint_kg(r.distance_km, VehicleType::Diesel))
        .sum()
}

/// Forecast hint supplied by an external predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandEstimate {
    pub sku: Sku,
    /// Units expected to be needed over the planning horizon.
    pub demand: u64,
    pub confidence: f64,
}

impl DemandEstimate {
    pub fn is_trusted(&self) -> bool {
        self.confidence.is_finite() && self.confidence >= MIN_DEMAND_CONFIDENCE
    }
}

/// Draft proposal; not recorded anywhere until someone proposes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSuggestion {
    #[serde(flatten)]
    pub request: TransferRequest,
    pub distance_km: f64,
    pub estimated_cost: u64,
}

/// Units `item` needs to get back to its reorder level, raised to a trusted
/// demand estimate when one exceeds it.
pub fn units_needed(item: &InventoryItem, estimate: Option<&DemandEstimate>) -> u64 {
    let forecast_gap = estimate
        .filter(|e| e.is_trusted())
        .map(|e| e.demand.saturating_sub(item.quantity))
        .unwrap_or(0);
    item.shortfall().max(forecast_gap)
}
