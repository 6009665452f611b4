use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wgrid_core::{GeoPoint, Sku, StoreId};

/// Items expiring in fewer days than this are reported as expiring soon.
pub const EXPIRING_SOON_DAYS: u32 = 7;

/// Items with an expiry horizon at or below this are treated as perishable.
pub const PERISHABLE_HORIZON_DAYS: u32 = 30;

/// A retail location. Stores are never deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub location: GeoPoint,
    pub region: String,
    #[serde(default = "active_default")]
    pub active: bool,
}

fn active_default() -> bool {
    true
}

impl Store {
    pub fn new(id: StoreId, name: impl Into<String>, location: GeoPoint, region: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            location,
            region: region.into(),
            active: true,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Groceries,
    Electronics,
    Clothing,
    Pharmacy,
    Other,
}

/// Computed stock status; `Low` wins over `Expiring` when both apply.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    Ok,
    Low,
    Expiring,
}

/// One SKU line in a store's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub store_id: StoreId,
    pub sku: Sku,
    pub category: Category,
    pub quantity: u64,
    pub reorder_level: u64,
    pub expiry_horizon_days: u32,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.quantity < self.reorder_level
    }

    pub fn is_expiring_soon(&self) -> bool {
        self.expiry_horizon_days < EXPIRING_SOON_DAYS
    }

    pub fn is_perishable(&self) -> bool {
        self.expiry_horizon_days <= PERISHABLE_HORIZON_DAYS
    }

    pub fn status(&self) -> StockStatus {
        if self.is_low_stock() {
            StockStatus::Low
        } else if self.is_expiring_soon() {
            StockStatus::Expiring
        } else {
            StockStatus::Ok
        }
    }

    /// `quantity / reorder_level`; `None` when no reorder level is set.
    pub fn stock_ratio(&self) -> Option<f64> {
        if self.reorder_level == 0 {
            None
        } else {
            Some(self.quantity as f64 / self.reorder_level as f64)
        }
    }

    /// Units above the reorder level that could be given away.
    pub fn surplus(&self) -> u64 {
        self.quantity.saturating_sub(self.reorder_level)
    }

    /// Units needed to get back to the reorder level.
    pub fn shortfall(&self) -> u64 {
        self.reorder_level.saturating_sub(self.quantity)
    }
}

/// Parameters for first stocking of a SKU at a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub sku: Sku,
    pub category: Category,
    pub quantity: u64,
    pub reorder_level: u64,
    pub expiry_horizon_days: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    Stocked,
    Restock,
    Adjustment,
    TransferIn,
    TransferOut,
}

/// A recorded change of quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub delta: i64,
    pub quantity_after: u64,
    pub reason: MovementReason,
    pub at: DateTime<Utc>,
}

impl StockMovement {
    /// Units that left the shelf (0 for inflows).
    pub fn outflow(&self) -> u64 {
        if self.delta < 0 { self.delta.unsigned_abs() } else { 0 }
    }
}

/// Consistent read of one store taken under a single lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub store: Store,
    pub items: Vec<InventoryItem>,
    pub movements: Vec<(Sku, Vec<StockMovement>)>,
    pub taken_at: DateTime<Utc>,
}

impl StoreSnapshot {
    pub fn item(&self, sku: &Sku) -> Option<&InventoryItem> {
        self.items.iter().find(|i| &i.sku == sku)
    }

    pub fn movements_for(&self, sku: &Sku) -> &[StockMovement] {
        self.movements
            .iter()
            .find(|(s, _)| s == sku)
            .map(|(_, m)| m.as_slice())
            .unwrap_or(&[])
    }

    pub fn total_units(&self) -> u64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}
