//! Negotiation engine: owns the transfer book and drives the aggregate.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use wgrid_core::{
    Aggregate, Clock, EngineError, EngineResult, ErrorKind, NegotiationId, RetryPolicy, RouteId, Sku,
    StoreId,
};
use wgrid_inventory::{InventoryLedger, TransferReceipt};
use wgrid_routing::Route;

use crate::pricing::{calculate_priority, calculate_transfer_cost, Urgency, DEFAULT_BASE_RATE_PER_KM};
use crate::transfer::{
    Approve, Cancel, Complete, Dispatch, FailFulfilment, Propose, Reject, Transfer, TransferCommand,
    TransferEvent, TransferStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationConfig {
    pub base_rate_per_km: f64,
    /// Road distance / great-circle distance between stores.
    pub circuity_factor: f64,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            base_rate_per_km: DEFAULT_BASE_RATE_PER_KM,
            circuity_factor: 1.3,
        }
    }
}

/// Operator request to move stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_store: StoreId,
    pub dest_store: StoreId,
    pub sku: Sku,
    pub quantity: u64,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug)]
struct Entry {
    transfer: Transfer,
    history: Vec<TransferEvent>,
}

pub struct NegotiationEngine {
    book: RwLock<BTreeMap<NegotiationId, Entry>>,
    inventory: Arc<InventoryLedger>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    config: NegotiationConfig,
}

impl NegotiationEngine {
    pub fn new(inventory: Arc<InventoryLedger>, clock: Arc<dyn Clock>, config: NegotiationConfig) -> Self {
        Self {
            book: RwLock::new(BTreeMap::new()),
            inventory,
            clock,
            retry: RetryPolicy::default(),
            config,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    /// Road distance in km between two registered stores.
    pub fn distance_km(&self, a: &StoreId, b: &StoreId) -> EngineResult<f64> {
        let (a, b) = (self.inventory.store(a)?, self.inventory.store(b)?);
        Ok(a.location.distance_km(&b.location) * self.config.circuity_factor)
    }

    /// `-> pending`. Validates stores, SKU and source stock; computes
    /// distance, cost and priority.
    pub fn propose(&self, request: TransferRequest, proposed_by: &str) -> EngineResult<Transfer> {
        if request.source_store == request.dest_store {
            return Err(EngineError::validation(
                "source and destination store must differ",
            ));
        }
        let source = self.inventory.store(&request.source_store)?;
        let dest = self.inventory.store(&request.dest_store)?;
        for s in [&source, &dest] {
            if !s.active {
                return Err(EngineError::validation(format!("store {} is deactivated", s.id)));
            }
        }
        let source_item = self.inventory.item(&source.id, &request.sku)?;
        let dest_item = self.inventory.item(&dest.id, &request.sku)?;

        let distance_km = source.location.distance_km(&dest.location) * self.config.circuity_factor;
        let estimated_cost =
            calculate_transfer_cost(distance_km, request.quantity, self.config.base_rate_per_km)?;
        let priority = calculate_priority(request.urgency, &dest_item);

        let id = NegotiationId::new();
        let command = TransferCommand::Propose(Propose {
            negotiation_id: id,
            sku: request.sku,
            source_store: request.source_store,
            dest_store: request.dest_store,
            quantity: request.quantity,
            source_available: source_item.quantity,
            priority,
            urgency: request.urgency,
            distance_km,
            estimated_cost,
            notes: request.notes,
            proposed_by: proposed_by.to_string(),
            occurred_at: self.clock.now(),
        });

        let mut transfer = Transfer::empty(id);
        let events = transfer.handle(&command)?;
        for e in &events {
            transfer.apply(e);
        }

        let mut book = self.retry.write(&self.book, "negotiation book")?;
        book.insert(
            id,
            Entry {
                transfer: transfer.clone(),
                history: events,
            },
        );
        info!(
            negotiation_id = %id,
            source = ?transfer.source_store(),
            destination = ?transfer.dest_store(),
            quantity = transfer.quantity(),
            priority = ?transfer.priority(),
            "negotiation proposed"
        );
        Ok(transfer)
    }

    /// `pending -> approved`, reserving the quantity at the source.
    pub fn approve(&self, id: NegotiationId, actor: &str) -> EngineResult<Transfer> {
        let mut book = self.retry.write(&self.book, "negotiation book")?;
        let entry = book
            .get(&id)
            .ok_or_else(|| EngineError::not_found(format!("negotiation {id}")))?;
        let (source, sku) = Self::route_key(&entry.transfer)?;

        let on_hand = self.inventory.item(&source, &sku)?.quantity;
        let reserved = Self::reserved_in(&book, &source, &sku);
        let command = TransferCommand::Approve(Approve {
            negotiation_id: id,
            available: on_hand.saturating_sub(reserved),
            actor: actor.to_string(),
            occurred_at: self.clock.now(),
        });
        Self::execute(&mut book, id, &command, "approved")
    }

    /// `pending -> rejected`.
    pub fn reject(&self, id: NegotiationId, actor: &str, reason: Option<String>) -> EngineResult<Transfer> {
        let mut book = self.retry.write(&self.book, "negotiation book")?;
        let command = TransferCommand::Reject(Reject {
            negotiation_id: id,
            reason,
            actor: actor.to_string(),
            occurred_at: self.clock.now(),
        });
        Self::execute(&mut book, id, &command, "rejected")
    }

    /// `approved -> in_transit`, pinning a copy of `route`.
    pub fn dispatch(&self, id: NegotiationId, route: Route, actor: &str) -> EngineResult<Transfer> {
        let mut book = self.retry.write(&self.book, "negotiation book")?;
        if let Some((other, _)) = book.iter().find(|(other, e)| {
            **other != id
                && !e.transfer.status().is_terminal()
                && e.transfer.route().map(|r| r.id) == Some(route.id)
        }) {
            return Err(EngineError::invalid_transition(format!(
                "route {} is already pinned to negotiation {other}",
                route.id
            )));
        }
        let command = TransferCommand::Dispatch(Dispatch {
            negotiation_id: id,
            route,
            actor: actor.to_string(),
            occurred_at: self.clock.now(),
        });
        Self::execute(&mut book, id, &command, "dispatched")
    }

    /// `in_transit -> completed` after moving the stock; `in_transit ->
    /// rejected` when the source no longer has it.
    ///
    /// The book stays write-locked for the inventory call so no reader sees
    /// a completed transfer without moved stock.
    pub fn fulfill(&self, id: NegotiationId, actor: &str) -> EngineResult<Transfer> {
        let mut book = self.retry.write(&self.book, "negotiation book")?;
        let entry = book
            .get(&id)
            .ok_or_else(|| EngineError::not_found(format!("negotiation {id}")))?;

        let now = self.clock.now();
        let complete = TransferCommand::Complete(Complete {
            negotiation_id: id,
            actor: actor.to_string(),
            occurred_at: now,
        });
        // Decide before touching stock.
        entry.transfer.handle(&complete)?;

        let (source, sku) = Self::route_key(&entry.transfer)?;
        let dest = entry
            .transfer
            .dest_store()
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("negotiation {id}")))?;
        let quantity = entry.transfer.quantity();

        match self.inventory.transfer(&source, &dest, &sku, quantity) {
            Ok(TransferReceipt { .. }) => Self::execute(&mut book, id, &complete, "fulfilled"),
            Err(err) if err.kind() == ErrorKind::InsufficientStock => {
                warn!(negotiation_id = %id, error = %err, "fulfilment failed");
                let fail = TransferCommand::FailFulfilment(FailFulfilment {
                    negotiation_id: id,
                    reason: format!("fulfilment failed: {err}"),
                    occurred_at: now,
                });
                Self::execute(&mut book, id, &fail, "rejected on fulfilment")?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// `pending | approved -> rejected`, proposer only.
    pub fn cancel(&self, id: NegotiationId, actor: &str) -> EngineResult<Transfer> {
        let mut book = self.retry.write(&self.book, "negotiation book")?;
        let command = TransferCommand::Cancel(Cancel {
            negotiation_id: id,
            actor: actor.to_string(),
            occurred_at: self.clock.now(),
        });
        Self::execute(&mut book, id, &command, "cancelled")
    }

    pub fn get(&self, id: NegotiationId) -> EngineResult<Transfer> {
        let book = self.retry.read(&self.book, "negotiation book")?;
        book.get(&id)
            .map(|e| e.transfer.clone())
            .ok_or_else(|| EngineError::not_found(format!("negotiation {id}")))
    }

    /// Transfers where the store is source or destination, newest first.
    pub fn for_store(&self, store_id: &StoreId) -> EngineResult<Vec<Transfer>> {
        let book = self.retry.read(&self.book, "negotiation book")?;
        let mut out: Vec<Transfer> = book
            .values()
            .filter(|e| e.transfer.involves(store_id))
            .map(|e| e.transfer.clone())
            .collect();
        out.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id_typed().cmp(&a.id_typed()))
        });
        Ok(out)
    }

    /// Every transfer in the book, oldest id first.
    pub fn all(&self) -> EngineResult<Vec<Transfer>> {
        let book = self.retry.read(&self.book, "negotiation book")?;
        Ok(book.values().map(|e| e.transfer.clone()).collect())
    }

    /// Audit events in the order they were applied.
    pub fn history(&self, id: NegotiationId) -> EngineResult<Vec<TransferEvent>> {
        let book = self.retry.read(&self.book, "negotiation book")?;
        book.get(&id)
            .map(|e| e.history.clone())
            .ok_or_else(|| EngineError::not_found(format!("negotiation {id}")))
    }

    /// Units of `sku` at `store_id` committed to approved or in-transit transfers.
    pub fn reserved(&self, store_id: &StoreId, sku: &Sku) -> EngineResult<u64> {
        let book = self.retry.read(&self.book, "negotiation book")?;
        Ok(Self::reserved_in(&book, store_id, sku))
    }

    /// The non-terminal transfer a route is pinned to, if any.
    pub fn pinned_to(&self, route_id: RouteId) -> EngineResult<Option<Transfer>> {
        let book = self.retry.read(&self.book, "negotiation book")?;
        Ok(book
            .values()
            .find(|e| !e.transfer.status().is_terminal() && e.transfer.route().map(|r| r.id) == Some(route_id))
            .map(|e| e.transfer.clone()))
    }

    fn reserved_in(book: &BTreeMap<NegotiationId, Entry>, store_id: &StoreId, sku: &Sku) -> u64 {
        book.values()
            .map(|e| &e.transfer)
            .filter(|t| {
                t.status().reserves_stock() && t.source_store() == Some(store_id) && t.sku() == Some(sku)
            })
            .map(|t| t.quantity())
            .sum()
    }

    fn route_key(transfer: &Transfer) -> EngineResult<(StoreId, Sku)> {
        match (transfer.source_store(), transfer.sku()) {
            (Some(store), Some(sku)) => Ok((store.clone(), sku.clone())),
            _ => Err(EngineError::not_found(format!("negotiation {}", transfer.id_typed()))),
        }
    }

    fn execute(
        book: &mut BTreeMap<NegotiationId, Entry>,
        id: NegotiationId,
        command: &TransferCommand,
        outcome: &'static str,
    ) -> EngineResult<Transfer> {
        let entry = book
            .get_mut(&id)
            .ok_or_else(|| EngineError::not_found(format!("negotiation {id}")))?;
        let events = entry.transfer.handle(command)?;
        for e in &events {
            entry.transfer.apply(e);
        }
        entry.history.extend(events);
        info!(
            negotiation_id = %id,
            status = ?entry.transfer.status(),
            version = wgrid_core::AggregateRoot::version(&entry.transfer),
            "negotiation {outcome}"
        );
        Ok(entry.transfer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use wgrid_core::{GeoPoint, ManualClock};
    use wgrid_inventory::{Category, NewItem, Store};
    use wgrid_routing::{optimize, DeliveryRequest, Fleet, Objective, RouteRequest, Vehicle, VehicleType};

    struct Fixture {
        engine: NegotiationEngine,
        inventory: Arc<InventoryLedger>,
        clock: Arc<ManualClock>,
    }

    fn sid(s: &str) -> StoreId {
        StoreId::new(s).unwrap()
    }

    fn biscuits() -> Sku {
        Sku::new("Biscuits").unwrap()
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()));
        let inventory = Arc::new(InventoryLedger::new(clock.clone()));
        for (id, lat, lng) in [("andheri", 19.1136, 72.8697), ("bandra", 19.0596, 72.8295)] {
            inventory
                .register_store(Store::new(sid(id), id, GeoPoint::new(lat, lng).unwrap(), "mumbai-west"))
                .unwrap();
        }
        inventory
            .stock_item(
                &sid("andheri"),
                NewItem {
                    sku: biscuits(),
                    category: Category::Groceries,
                    quantity: 200,
                    reorder_level: 50,
                    expiry_horizon_days: 180,
                },
            )
            .unwrap();
        inventory
            .stock_item(
                &sid("bandra"),
                NewItem {
                    sku: biscuits(),
                    category: Category::Groceries,
                    quantity: 4,
                    reorder_level: 50,
                    expiry_horizon_days: 180,
                },
            )
            .unwrap();
        let engine = NegotiationEngine::new(inventory.clone(), clock.clone(), NegotiationConfig::default());
        Fixture { engine, inventory, clock }
    }

    fn request(quantity: u64) -> TransferRequest {
        TransferRequest {
            source_store: sid("andheri"),
            dest_store: sid("bandra"),
            sku: biscuits(),
            quantity,
            urgency: Urgency::Routine,
            notes: None,
        }
    }

    fn route_for(fx: &Fixture, id: NegotiationId) -> Route {
        let req = RouteRequest {
            store_id: sid("andheri"),
            origin: fx.inventory.store(&sid("andheri")).unwrap().location,
            deliveries: vec![DeliveryRequest {
                id: id.to_string(),
                location: fx.inventory.store(&sid("bandra")).unwrap().location,
                sku: Some(biscuits()),
                units: 50,
            }],
            fleet: Fleet::new(vec![Vehicle::new("ev-1", VehicleType::Electric)]).unwrap(),
        };
        optimize(&req, Objective::Eco).unwrap().remove(0)
    }

    fn in_transit(fx: &Fixture, quantity: u64) -> NegotiationId {
        let t = fx.engine.propose(request(quantity), "manager-andheri").unwrap();
        let id = t.id_typed();
        fx.engine.approve(id, "regional-head").unwrap();
        fx.engine.dispatch(id, route_for(fx, id), "regional-head").unwrap();
        id
    }

    #[test]
    fn propose_computes_priority_and_cost() {
        let fx = fixture();
        let t = fx.engine.propose(request(50), "manager-andheri").unwrap();
        assert_eq!(t.status(), TransferStatus::Pending);
        // Bandra is at 4/50 = 0.08 of its reorder level.
        assert_eq!(t.priority(), crate::pricing::Priority::High);
        let expected = calculate_transfer_cost(t.distance_km(), 50, 5.0).unwrap();
        assert_eq!(t.estimated_cost(), expected);
        assert!(t.distance_km() > 7.0);
    }

    #[test]
    fn over_quantity_proposal_fails_without_change() {
        let fx = fixture();
        let err = fx.engine.propose(request(250), "manager-andheri").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert!(fx.engine.for_store(&sid("andheri")).unwrap().is_empty());
        assert_eq!(fx.inventory.item(&sid("andheri"), &biscuits()).unwrap().quantity, 200);
    }

    #[test]
    fn unknown_stores_and_skus_are_reported() {
        let fx = fixture();
        let mut req = request(10);
        req.dest_store = sid("malad");
        assert_eq!(fx.engine.propose(req, "x").unwrap_err().kind(), ErrorKind::UnknownStore);

        let mut req = request(10);
        req.sku = Sku::new("Milk").unwrap();
        assert_eq!(fx.engine.propose(req, "x").unwrap_err().kind(), ErrorKind::UnknownSku);
    }

    #[test]
    fn approvals_respect_reservations() {
        let fx = fixture();
        let a = fx.engine.propose(request(150), "m").unwrap().id_typed();
        let b = fx.engine.propose(request(100), "m").unwrap().id_typed();
        fx.engine.approve(a, "r").unwrap();
        assert_eq!(fx.engine.reserved(&sid("andheri"), &biscuits()).unwrap(), 150);

        let err = fx.engine.approve(b, "r").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(fx.engine.get(b).unwrap().status(), TransferStatus::Pending);
    }

    #[test]
    fn fulfil_moves_stock_and_completes() {
        let fx = fixture();
        let id = in_transit(&fx, 50);
        let t = fx.engine.fulfill(id, "manager-bandra").unwrap();
        assert_eq!(t.status(), TransferStatus::Completed);
        assert_eq!(fx.inventory.item(&sid("andheri"), &biscuits()).unwrap().quantity, 150);
        assert_eq!(fx.inventory.item(&sid("bandra"), &biscuits()).unwrap().quantity, 54);
        assert_eq!(fx.engine.reserved(&sid("andheri"), &biscuits()).unwrap(), 0);

        let kinds: Vec<&str> = fx
            .engine
            .history(id)
            .unwrap()
            .iter()
            .map(wgrid_core::DomainEvent::event_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                "negotiation.proposed",
                "negotiation.approved",
                "negotiation.dispatched",
                "negotiation.completed"
            ]
        );
    }

    #[test]
    fn fulfil_failure_rejects_and_leaves_stock() {
        let fx = fixture();
        let id = in_transit(&fx, 50);
        // Stock disappears while the truck is on the road.
        fx.inventory.adjust(&sid("andheri"), &biscuits(), -180).unwrap();

        let err = fx.engine.fulfill(id, "manager-bandra").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        let t = fx.engine.get(id).unwrap();
        assert_eq!(t.status(), TransferStatus::Rejected);
        assert!(t.notes().iter().any(|n| n.starts_with("fulfilment failed")));
        assert_eq!(fx.inventory.item(&sid("bandra"), &biscuits()).unwrap().quantity, 4);
    }

    #[test]
    fn approved_transfer_cannot_be_fulfilled() {
        let fx = fixture();
        let id = fx.engine.propose(request(50), "m").unwrap().id_typed();
        fx.engine.approve(id, "r").unwrap();
        let err = fx.engine.fulfill(id, "r").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(fx.inventory.item(&sid("andheri"), &biscuits()).unwrap().quantity, 200);
    }

    #[test]
    fn a_route_is_pinned_to_one_live_transfer() {
        let fx = fixture();
        let id = in_transit(&fx, 20);
        let route = fx.engine.get(id).unwrap().route().cloned().unwrap();
        assert_eq!(fx.engine.pinned_to(route.id).unwrap().map(|t| t.id_typed()), Some(id));

        let other = fx.engine.propose(request(20), "m").unwrap().id_typed();
        fx.engine.approve(other, "r").unwrap();
        let err = fx.engine.dispatch(other, route, "r").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn listing_is_newest_first_and_store_scoped() {
        let fx = fixture();
        let first = fx.engine.propose(request(10), "m").unwrap().id_typed();
        fx.clock.advance(Duration::minutes(5));
        let second = fx.engine.propose(request(10), "m").unwrap().id_typed();

        let ids: Vec<NegotiationId> = fx
            .engine
            .for_store(&sid("bandra"))
            .unwrap()
            .iter()
            .map(|t| t.id_typed())
            .collect();
        assert_eq!(ids, vec![second, first]);
        assert!(fx.engine.for_store(&sid("malad")).unwrap().is_empty());
    }

    #[test]
    fn unknown_negotiation_is_not_found() {
        let fx = fixture();
        let err = fx.engine.approve(NegotiationId::new(), "r").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Propose(u64),
        Approve(usize),
        Dispatch(usize),
        Fulfill(usize),
        Cancel(usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (1u64..120).prop_map(Step::Propose),
            any::<usize>().prop_map(Step::Approve),
            any::<usize>().prop_map(Step::Dispatch),
            any::<usize>().prop_map(Step::Fulfill),
            any::<usize>().prop_map(Step::Cancel),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Whatever the order of intents, reservations never exceed what the
        /// source holds and no units appear or vanish.
        #[test]
        fn reservations_never_exceed_stock(steps in prop::collection::vec(step(), 1..30)) {
            let fx = fixture();
            let mut ids: Vec<NegotiationId> = Vec::new();
            let pick = |ids: &[NegotiationId], i: usize| ids.get(i % ids.len().max(1)).copied();

            for s in steps {
                match s {
                    Step::Propose(qty) => {
                        if let Ok(t) = fx.engine.propose(request(qty), "manager-andheri") {
                            ids.push(t.id_typed());
                        }
                    }
                    Step::Approve(i) => {
                        if let Some(id) = pick(&ids, i) {
                            let _ = fx.engine.approve(id, "regional-head");
                        }
                    }
                    Step::Dispatch(i) => {
                        if let Some(id) = pick(&ids, i) {
                            let _ = fx.engine.dispatch(id, route_for(&fx, id), "regional-head");
                        }
                    }
                    Step::Fulfill(i) => {
                        if let Some(id) = pick(&ids, i) {
                            let _ = fx.engine.fulfill(id, "manager-bandra");
                        }
                    }
                    Step::Cancel(i) => {
                        if let Some(id) = pick(&ids, i) {
                            let _ = fx.engine.cancel(id, "manager-andheri");
                        }
                    }
                }

                let on_hand = fx.inventory.item(&sid("andheri"), &biscuits()).unwrap().quantity;
                let reserved = fx.engine.reserved(&sid("andheri"), &biscuits()).unwrap();
                prop_assert!(reserved <= on_hand, "reserved {} > on hand {}", reserved, on_hand);
                let bandra = fx.inventory.item(&sid("bandra"), &biscuits()).unwrap().quantity;
                prop_assert_eq!(on_hand + bandra, 204);
            }
        }
    }
}
