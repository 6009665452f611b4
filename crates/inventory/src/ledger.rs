//! Per-store inventory ledger (system of record).
//!
//! Each store's items live behind their own `RwLock`. Writes that touch two
//! stores take both locks in lexicographic store-id order, so concurrent
//! transfers can never deadlock, and readers never observe a transfer with
//! only one leg applied.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use wgrid_core::retry::try_write;
use wgrid_core::{Clock, EngineError, EngineResult, RetryPolicy, Sku, StoreId};

use crate::model::{InventoryItem, MovementReason, NewItem, StockMovement, Store, StoreSnapshot};

pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// Largest quantity a single item can hold, so every movement fits an `i64`.
pub const MAX_QUANTITY: u64 = i64::MAX as u64;

#[derive(Debug)]
struct ItemRecord {
    item: InventoryItem,
    history: VecDeque<StockMovement>,
}

impl ItemRecord {
    /// Record a movement whose resulting quantity was computed by [`next_quantity`].
    fn apply(&mut self, delta: i64, next: u64, reason: MovementReason, at: DateTime<Utc>, limit: usize) {
        self.item.quantity = next;
        if self.history.len() >= limit {
            self.history.pop_front();
        }
        self.history.push_back(StockMovement {
            delta,
            quantity_after: self.item.quantity,
            reason,
            at,
        });
    }
}

#[derive(Debug)]
struct StoreState {
    store: Store,
    items: BTreeMap<Sku, ItemRecord>,
}

impl StoreState {
    fn record(&self, sku: &Sku) -> EngineResult<&ItemRecord> {
        self.items
            .get(sku)
            .ok_or_else(|| EngineError::unknown_sku(&self.store.id, sku))
    }

    fn record_mut(&mut self, sku: &Sku) -> EngineResult<&mut ItemRecord> {
        let store_id = &self.store.id;
        self.items
            .get_mut(sku)
            .ok_or_else(|| EngineError::unknown_sku(store_id, sku))
    }

    fn ensure_active(&self) -> EngineResult<()> {
        if self.store.active {
            Ok(())
        } else {
            Err(EngineError::validation(format!(
                "store '{}' is deactivated",
                self.store.id
            )))
        }
    }
}

type StoreSlot = Arc<RwLock<StoreState>>;

/// Both legs of a completed transfer, as they stand afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub source: InventoryItem,
    pub destination: InventoryItem,
}

/// The inventory store: registry of stores and their item ledgers.
pub struct InventoryLedger {
    stores: RwLock<BTreeMap<StoreId, StoreSlot>>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    history_limit: usize,
}

impl InventoryLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            stores: RwLock::new(BTreeMap::new()),
            clock,
            retry: RetryPolicy::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    // ── Store registry ──────────────────────────────────────────────────────

    pub fn register_store(&self, store: Store) -> EngineResult<()> {
        let mut stores = self.retry.write(&self.stores, "store registry")?;
        if stores.contains_key(&store.id) {
            return Err(EngineError::validation(format!(
                "store '{}' is already registered",
                store.id
            )));
        }
        info!(store = %store.id, region = %store.region, "store registered");
        let id = store.id.clone();
        stores.insert(
            id,
            Arc::new(RwLock::new(StoreState {
                store,
                items: BTreeMap::new(),
            })),
        );
        Ok(())
    }

    /// Deactivate a store. Its stock stays readable; new writes are refused.
    pub fn deactivate_store(&self, store_id: &StoreId) -> EngineResult<Store> {
        let slot = self.slot(store_id)?;
        let mut state = self.write_slot(&slot, store_id)?;
        state.store.active = false;
        info!(store = %store_id, "store deactivated");
        Ok(state.store.clone())
    }

    pub fn store(&self, store_id: &StoreId) -> EngineResult<Store> {
        let slot = self.slot(store_id)?;
        let state = self.retry.read(&*slot, &lock_name(store_id))?;
        Ok(state.store.clone())
    }

    /// All stores, ordered by id.
    pub fn stores(&self) -> EngineResult<Vec<Store>> {
        let slots: Vec<(StoreId, StoreSlot)> = {
            let stores = self.retry.read(&self.stores, "store registry")?;
            stores.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        slots
            .iter()
            .map(|(id, slot)| -> EngineResult<Store> {
                Ok(self.retry.read(&**slot, &lock_name(id))?.store.clone())
            })
            .collect()
    }

    pub fn store_ids(&self) -> EngineResult<Vec<StoreId>> {
        let stores = self.retry.read(&self.stores, "store registry")?;
        Ok(stores.keys().cloned().collect())
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    /// Inventory of a store, ordered by SKU.
    pub fn get_inventory(&self, store_id: &StoreId) -> EngineResult<Vec<InventoryItem>> {
        let slot = self.slot(store_id)?;
        let state = self.retry.read(&*slot, &lock_name(store_id))?;
        Ok(state.items.values().map(|r| r.item.clone()).collect())
    }

    pub fn item(&self, store_id: &StoreId, sku: &Sku) -> EngineResult<InventoryItem> {
        let slot = self.slot(store_id)?;
        let state = self.retry.read(&*slot, &lock_name(store_id))?;
        Ok(state.record(sku)?.item.clone())
    }

    /// Recorded movements for one SKU, oldest first.
    pub fn movements(&self, store_id: &StoreId, sku: &Sku) -> EngineResult<Vec<StockMovement>> {
        let slot = self.slot(store_id)?;
        let state = self.retry.read(&*slot, &lock_name(store_id))?;
        Ok(state.record(sku)?.history.iter().cloned().collect())
    }

    /// Store metadata, items and movement history under one read lock.
    pub fn snapshot(&self, store_id: &StoreId) -> EngineResult<StoreSnapshot> {
        let slot = self.slot(store_id)?;
        let state = self.retry.read(&*slot, &lock_name(store_id))?;
        Ok(StoreSnapshot {
            store: state.store.clone(),
            items: state.items.values().map(|r| r.item.clone()).collect(),
            movements: state
                .items
                .iter()
                .map(|(sku, r)| (sku.clone(), r.history.iter().cloned().collect()))
                .collect(),
            taken_at: self.clock.now(),
        })
    }

    pub fn total_units(&self, store_id: &StoreId) -> EngineResult<u64> {
        Ok(self
            .get_inventory(store_id)?
            .iter()
            .fold(0u64, |total, i| total.saturating_add(i.quantity)))
    }

    // ── Writes ──────────────────────────────────────────────────────────────

    /// First stocking of a SKU at a store.
    pub fn stock_item(&self, store_id: &StoreId, new: NewItem) -> EngineResult<InventoryItem> {
        let stocked = i64::try_from(new.quantity)
            .map_err(|_| EngineError::validation(format!("quantity may not exceed {MAX_QUANTITY}")))?;
        let slot = self.slot(store_id)?;
        let mut state = self.write_slot(&slot, store_id)?;
        state.ensure_active()?;
        if state.items.contains_key(&new.sku) {
            return Err(EngineError::validation(format!(
                "sku '{}' is already stocked at '{store_id}'",
                new.sku
            )));
        }

        let now = self.clock.now();
        let item = InventoryItem {
            store_id: store_id.clone(),
            sku: new.sku.clone(),
            category: new.category,
            quantity: new.quantity,
            reorder_level: new.reorder_level,
            expiry_horizon_days: new.expiry_horizon_days,
        };
        let mut history = VecDeque::new();
        history.push_back(StockMovement {
            delta: stocked,
            quantity_after: new.quantity,
            reason: MovementReason::Stocked,
            at: now,
        });
        state.items.insert(
            new.sku.clone(),
            ItemRecord {
                item: item.clone(),
                history,
            },
        );
        info!(store = %store_id, sku = %new.sku, quantity = new.quantity, "sku stocked");
        Ok(item)
    }

    /// Change a SKU's quantity by `delta`. Never drives the quantity below zero.
    pub fn adjust(&self, store_id: &StoreId, sku: &Sku, delta: i64) -> EngineResult<InventoryItem> {
        self.adjust_with_reason(store_id, sku, delta, MovementReason::Adjustment)
    }

    pub fn restock(&self, store_id: &StoreId, sku: &Sku, quantity: u64) -> EngineResult<InventoryItem> {
        if quantity == 0 {
            return Err(EngineError::validation("restock quantity must be positive"));
        }
        let delta = i64::try_from(quantity)
            .map_err(|_| EngineError::validation("restock quantity is too large"))?;
        self.adjust_with_reason(store_id, sku, delta, MovementReason::Restock)
    }

    fn adjust_with_reason(
        &self,
        store_id: &StoreId,
        sku: &Sku,
        delta: i64,
        reason: MovementReason,
    ) -> EngineResult<InventoryItem> {
        if delta == 0 {
            return Err(EngineError::validation("delta cannot be zero"));
        }
        let slot = self.slot(store_id)?;
        let mut state = self.write_slot(&slot, store_id)?;
        state.ensure_active()?;

        let limit = self.history_limit;
        let now = self.clock.now();
        let record = state.record_mut(sku)?;
        let next = next_quantity(store_id, sku, record.item.quantity, delta)?;
        record.apply(delta, next, reason, now, limit);
        debug!(store = %store_id, sku = %sku, delta, quantity = record.item.quantity, "stock adjusted");
        Ok(record.item.clone())
    }

    /// Move `quantity` units of `sku` from `source` to `destination`.
    ///
    /// Both adjustments are applied under both store locks, or neither is.
    pub fn transfer(
        &self,
        source: &StoreId,
        destination: &StoreId,
        sku: &Sku,
        quantity: u64,
    ) -> EngineResult<TransferReceipt> {
        if source == destination {
            return Err(EngineError::validation(
                "transfer source and destination must differ",
            ));
        }
        if quantity == 0 {
            return Err(EngineError::validation("transfer quantity must be positive"));
        }
        let delta = i64::try_from(quantity)
            .map_err(|_| EngineError::validation("transfer quantity is too large"))?;

        let src_slot = self.slot(source)?;
        let dst_slot = self.slot(destination)?;
        let (mut src, mut dst) = self.lock_pair(source, &src_slot, destination, &dst_slot)?;

        // Validate every precondition before touching either side.
        let src_next = next_quantity(source, sku, src.record(sku)?.item.quantity, -delta)?;
        let dst_next = next_quantity(destination, sku, dst.record(sku)?.item.quantity, delta)?;

        let now = self.clock.now();
        let limit = self.history_limit;
        let src_record = src.record_mut(sku)?;
        src_record.apply(-delta, src_next, MovementReason::TransferOut, now, limit);
        let source_item = src_record.item.clone();
        let dst_record = dst.record_mut(sku)?;
        dst_record.apply(delta, dst_next, MovementReason::TransferIn, now, limit);
        let destination_item = dst_record.item.clone();

        info!(
            source = %source,
            destination = %destination,
            sku = %sku,
            quantity,
            "stock transferred"
        );
        Ok(TransferReceipt {
            source: source_item,
            destination: destination_item,
        })
    }

    // ── Locking ─────────────────────────────────────────────────────────────

    fn slot(&self, store_id: &StoreId) -> EngineResult<StoreSlot> {
        let stores = self.retry.read(&self.stores, "store registry")?;
        stores
            .get(store_id)
            .cloned()
            .ok_or_else(|| EngineError::unknown_store(store_id))
    }

    fn write_slot<'a>(
        &self,
        slot: &'a StoreSlot,
        store_id: &StoreId,
    ) -> EngineResult<RwLockWriteGuard<'a, StoreState>> {
        self.retry.write(&**slot, &lock_name(store_id))
    }

    /// Lock two stores in global (lexicographic) order; returns (source, destination).
    fn lock_pair<'a>(
        &self,
        source: &StoreId,
        src_slot: &'a StoreSlot,
        destination: &StoreId,
        dst_slot: &'a StoreSlot,
    ) -> EngineResult<(
        RwLockWriteGuard<'a, StoreState>,
        RwLockWriteGuard<'a, StoreState>,
    )> {
        let source_first = source < destination;
        let (first, second): (&'a RwLock<StoreState>, &'a RwLock<StoreState>) = if source_first {
            (&**src_slot, &**dst_slot)
        } else {
            (&**dst_slot, &**src_slot)
        };
        let what = format!("stores {source}/{destination}");
        let (a, b) = self.retry.run(&what, || {
            let Some(a) = try_write(first, &what)? else {
                return Ok(None);
            };
            // Release the first lock if the second is busy so the other
            // party can make progress.
            let Some(b) = try_write(second, &what)? else {
                return Ok(None);
            };
            Ok(Some((a, b)))
        })?;
        Ok(if source_first { (a, b) } else { (b, a) })
    }
}

/// Quantity after applying `delta`, or why it cannot be applied.
fn next_quantity(store_id: &StoreId, sku: &Sku, available: u64, delta: i64) -> EngineResult<u64> {
    match available.checked_add_signed(delta) {
        Some(next) if next <= MAX_QUANTITY => Ok(next),
        None if delta < 0 => Err(EngineError::insufficient_stock(
            store_id,
            sku,
            delta.unsigned_abs(),
            available,
        )),
        _ => Err(EngineError::validation(format!(
            "'{sku}' at '{store_id}' would exceed {MAX_QUANTITY} units"
        ))),
    }
}

fn lock_name(store_id: &StoreId) -> String {
    format!("store {store_id}")
}
