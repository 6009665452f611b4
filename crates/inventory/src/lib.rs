//! Inventory store: the system of record for per-store stock.
//!
//! Quantity only changes through explicit adjust/restock or a transfer's
//! fulfilment, and never goes negative.

pub mod ledger;
pub mod model;

pub use ledger::{InventoryLedger, TransferReceipt, DEFAULT_HISTORY_LIMIT, MAX_QUANTITY};
pub use model::{
    Category, InventoryItem, MovementReason, NewItem, StockMovement, StockStatus, Store,
    StoreSnapshot, EXPIRING_SOON_DAYS, PERISHABLE_HORIZON_DAYS,
};
