//! The coordination facade.
//!
//! Owns the anomaly book, the signal log and the per-store fleets; every
//! other piece of state lives in the inventory ledger or the negotiation
//! engine. Each public operation takes the caller's [`Principal`] and performs
//! exactly one capability + store-scope check before doing anything else.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use wgrid_ai::{
    AiScheduler, Anomaly, AnomalyBook, AnomalyScanJob, AnomalyTrends, DeliveryReport, DetectorConfig,
    LocalAiScheduler, SignalLog, SpoilageObservation, Transaction,
};
use wgrid_auth::{authorize, authorize_any, Permission, Principal};
use wgrid_core::{
    AnomalyId, Clock, EngineError, EngineResult, ErrorKind, NegotiationId, RetryPolicy, RouteId, Sku,
    StoreId,
};
use wgrid_inventory::{InventoryItem, InventoryLedger, NewItem, Store};
use wgrid_negotiation::{
    calculate_transfer_cost, NegotiationEngine, Transfer, TransferEvent, TransferRequest, TransferStatus,
    Urgency,
};
use wgrid_routing::{
    DeliveryRequest, Fleet, Objective, Route, RouteOptimizer, RouteRequest, Vehicle, VehicleType,
};

use crate::config::EngineConfig;
use crate::metrics::{units_needed, DemandEstimate, EcoSummary, StoreMetrics, TransferSuggestion};
use crate::scanner::ScanTarget;
use crate::seed::SeedFile;

/// Fleet used by stores that were provisioned without one.
pub fn standard_fleet() -> EngineResult<Fleet> {
    Fleet::new(vec![
        Vehicle::new("EV-001", VehicleType::Electric),
        Vehicle::new("HY-001", VehicleType::Hybrid),
        Vehicle::new("DZ-001", VehicleType::Diesel),
    ])
}

pub struct CoordinationFacade {
    inventory: Arc<InventoryLedger>,
    negotiations: NegotiationEngine,
    anomalies: AnomalyBook,
    signals: SignalLog,
    optimizer: RouteOptimizer,
    fleets: RwLock<BTreeMap<StoreId, Fleet>>,
    detector: DetectorConfig,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl CoordinationFacade {
    pub fn new(config: &EngineConfig, clock: Arc<dyn Clock>) -> EngineResult<Self> {
        config.detector.validate().map_err(EngineError::validation)?;
        let inventory = Arc::new(InventoryLedger::new(clock.clone()));
        let negotiations =
            NegotiationEngine::new(inventory.clone(), clock.clone(), config.negotiation.clone());
        Ok(Self {
            inventory,
            negotiations,
            anomalies: AnomalyBook::new(config.anomaly_cooldown).with_retention(config.anomaly_retention),
            signals: SignalLog::default(),
            optimizer: RouteOptimizer::new(config.optimizer.clone())?,
            fleets: RwLock::new(BTreeMap::new()),
            detector: config.detector.clone(),
            clock,
            retry: RetryPolicy::default(),
        })
    }

    // ── Provisioning (trusted, startup only) ────────────────────────────────

    pub fn register_store(&self, store: Store, fleet: Option<Fleet>) -> EngineResult<()> {
        let fleet = match fleet {
            Some(f) if !f.is_empty() => {
                f.validate()?;
                f
            }
            _ => standard_fleet()?,
        };
        let id = store.id.clone();
        self.inventory.register_store(store)?;
        self.retry.write(&self.fleets, "fleet registry")?.insert(id, fleet);
        Ok(())
    }

    pub fn stock_item(&self, store_id: &StoreId, item: NewItem) -> EngineResult<InventoryItem> {
        self.inventory.stock_item(store_id, item)
    }

    pub fn deactivate_store(&self, store_id: &StoreId) -> EngineResult<Store> {
        self.inventory.deactivate_store(store_id)
    }

    pub fn provision(&self, seed: &SeedFile) -> EngineResult<()> {
        for entry in &seed.stores {
            self.register_store(entry.store.clone(), entry.fleet.clone())?;
            for item in &entry.items {
                self.inventory.stock_item(&entry.store.id, item.clone())?;
            }
        }
        info!(stores = seed.stores.len(), "seed provisioned");
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    /// Stores visible to the principal.
    pub fn stores(&self, principal: &Principal) -> EngineResult<Vec<Store>> {
        authorize(principal, &Permission::INVENTORY_READ, &[])?;
        Ok(self
            .inventory
            .stores()?
            .into_iter()
            .filter(|s| principal.store_scope.allows(&s.id))
            .collect())
    }

    pub fn inventory(&self, principal: &Principal, store_id: &StoreId) -> EngineResult<Vec<InventoryItem>> {
        authorize(principal, &Permission::INVENTORY_READ, &[store_id])?;
        self.inventory.get_inventory(store_id)
    }

    /// Runs detection, records new findings, and returns every open anomaly.
    pub fn anomalies(&self, principal: &Principal, store_id: &StoreId) -> EngineResult<Vec<Anomaly>> {
        authorize(principal, &Permission::REPORTS_READ, &[store_id])?;
        self.scan_store(store_id)?;
        self.anomalies.open(store_id)
    }

    pub fn anomaly_trends(&self, principal: &Principal, store_id: &StoreId) -> EngineResult<AnomalyTrends> {
        authorize(principal, &Permission::ANALYTICS_READ, &[store_id])?;
        self.inventory.store(store_id)?;
        self.anomalies.trends(store_id)
    }

    /// Candidate routes for the store's approved outgoing transfers.
    pub fn routes(&self, principal: &Principal, store_id: &StoreId, objective: Objective) -> EngineResult<Vec<Route>> {
        authorize(principal, &Permission::REPORTS_READ, &[store_id])?;
        self.candidate_routes(store_id, objective)
    }

    /// Transfers touching the store, newest first.
    pub fn negotiations(&self, principal: &Principal, store_id: &StoreId) -> EngineResult<Vec<Transfer>> {
        authorize(principal, &Permission::INVENTORY_READ, &[store_id])?;
        self.inventory.store(store_id)?;
        self.negotiations.for_store(store_id)
    }

    pub fn negotiation(&self, principal: &Principal, id: NegotiationId) -> EngineResult<Transfer> {
        self.transfer_for(principal, &Permission::INVENTORY_READ, id)
    }

    pub fn negotiation_history(&self, principal: &Principal, id: NegotiationId) -> EngineResult<Vec<TransferEvent>> {
        self.transfer_for(principal, &Permission::INVENTORY_READ, id)?;
        self.negotiations.history(id)
    }

    pub fn store_metrics(&self, principal: &Principal, store_id: &StoreId) -> EngineResult<StoreMetrics> {
        authorize(principal, &Permission::REPORTS_READ, &[store_id])?;
        let items = self.inventory.get_inventory(store_id)?;
        let transfers = self.negotiations.for_store(store_id)?;
        let open = self.anomalies.open(store_id)?;
        Ok(StoreMetrics::compute(store_id, &items, &transfers, &open))
    }

    pub fn eco_summary(&self, principal: &Principal, store_id: &StoreId) -> EngineResult<EcoSummary> {
        authorize(principal, &Permission::REPORTS_READ, &[store_id])?;
        self.inventory.store(store_id)?;
        let transfers = self.negotiations.for_store(store_id)?;
        Ok(EcoSummary::compute(store_id, &transfers))
    }

    /// Draft transfers that would bring the store's short SKUs back up.
    ///
    /// For each SKU that needs units, the nearest other active store whose
    /// unreserved surplus covers the whole need is chosen. Nothing is
    /// persisted.
    pub fn suggest_transfers(
        &self,
        principal: &Principal,
        store_id: &StoreId,
        estimates: &[DemandEstimate],
    ) -> EngineResult<Vec<TransferSuggestion>> {
        authorize(principal, &Permission::TRANSFERS_CREATE, &[store_id])?;
        self.inventory.store(store_id)?;
        let donors: Vec<Store> = self
            .inventory
            .stores()?
            .into_iter()
            .filter(|s| s.active && &s.id != store_id)
            .collect();
        let base_rate = self.negotiations.config().base_rate_per_km;

        let mut out = Vec::new();
        for item in self.inventory.get_inventory(store_id)? {
            let need = units_needed(&item, estimates.iter().find(|e| e.sku == item.sku));
            if need == 0 {
                continue;
            }

            let mut best: Option<(f64, StoreId)> = None;
            for donor in &donors {
                let stock = match self.inventory.item(&donor.id, &item.sku) {
                    Ok(stock) => stock,
                    Err(e) if e.kind() == ErrorKind::UnknownSku => continue,
                    Err(e) => return Err(e),
                };
                let free = stock
                    .surplus()
                    .saturating_sub(self.negotiations.reserved(&donor.id, &item.sku)?);
                if free < need {
                    continue;
                }
                let km = self.negotiations.distance_km(&donor.id, store_id)?;
                if best.as_ref().is_none_or(|(best_km, _)| km < *best_km) {
                    best = Some((km, donor.id.clone()));
                }
            }

            let Some((distance_km, source)) = best else {
                debug!(store = %store_id, sku = %item.sku, need, "no donor store can cover shortfall");
                continue;
            };
            out.push(TransferSuggestion {
                estimated_cost: calculate_transfer_cost(distance_km, need, base_rate)?,
                distance_km,
                request: TransferRequest {
                    source_store: source,
                    dest_store: store_id.clone(),
                    sku: item.sku.clone(),
                    quantity: need,
                    urgency: if item.quantity == 0 {
                        Urgency::Urgent
                    } else {
                        Urgency::Routine
                    },
                    notes: Some(format!("suggested restock of {need} units")),
                },
            });
        }
        Ok(out)
    }

    // ── Negotiation intents ─────────────────────────────────────────────────

    pub fn propose_negotiation(&self, principal: &Principal, request: TransferRequest) -> EngineResult<Transfer> {
        authorize_any(
            principal,
            &Permission::TRANSFERS_CREATE,
            &[&request.source_store, &request.dest_store],
        )?;
        self.negotiations.propose(request, &principal.actor())
    }

    pub fn approve_negotiation(&self, principal: &Principal, id: NegotiationId) -> EngineResult<Transfer> {
        self.transfer_for(principal, &Permission::TRANSFERS_APPROVE, id)?;
        self.negotiations.approve(id, &principal.actor())
    }

    pub fn reject_negotiation(
        &self,
        principal: &Principal,
        id: NegotiationId,
        reason: Option<String>,
    ) -> EngineResult<Transfer> {
        self.transfer_for(principal, &Permission::TRANSFERS_APPROVE, id)?;
        self.negotiations.reject(id, &principal.actor(), reason)
    }

    /// Pin one of the source store's current candidate routes and set off.
    ///
    /// `route_id` must name a candidate (under `objective`, eco by default)
    /// that stops at this negotiation's destination.
    pub fn dispatch_negotiation(
        &self,
        principal: &Principal,
        id: NegotiationId,
        route_id: RouteId,
        objective: Option<Objective>,
    ) -> EngineResult<Transfer> {
        let transfer = self.transfer_for(principal, &Permission::INVENTORY_WRITE, id)?;
        if transfer.status() != TransferStatus::Approved {
            return Err(EngineError::invalid_transition(format!(
                "negotiation {id} is {}; only approved negotiations can be dispatched",
                transfer.status().as_str()
            )));
        }
        let source = transfer
            .source_store()
            .ok_or_else(|| EngineError::not_found(format!("negotiation {id}")))?;

        let delivery_id = id.to_string();
        let route = self
            .candidate_routes(source, objective.unwrap_or(Objective::Eco))?
            .into_iter()
            .find(|r| r.id == route_id && r.serves(&delivery_id))
            .ok_or_else(|| EngineError::not_found(format!("route {route_id} for negotiation {id}")))?;

        self.negotiations.dispatch(id, route, &principal.actor())
    }

    pub fn fulfill_negotiation(&self, principal: &Principal, id: NegotiationId) -> EngineResult<Transfer> {
        let transfer = self.transfer_for(principal, &Permission::INVENTORY_WRITE, id)?;

        let result = self.negotiations.fulfill(id, &principal.actor());
        let left_transit = match &result {
            Ok(_) => true,
            Err(e) => e.kind() == ErrorKind::InsufficientStock,
        };
        if left_transit {
            if let Some(source) = transfer.source_store() {
                if let Err(e) = self.signals.clear_delivery(source, id) {
                    warn!(negotiation_id = %id, error = %e, "failed to clear delivery progress");
                }
            }
        }
        result
    }

    pub fn cancel_negotiation(&self, principal: &Principal, id: NegotiationId) -> EngineResult<Transfer> {
        self.transfer_for(principal, &Permission::TRANSFERS_CREATE, id)?;
        self.negotiations.cancel(id, &principal.actor())
    }

    // ── Anomaly intents ─────────────────────────────────────────────────────

    pub fn resolve_anomaly(
        &self,
        principal: &Principal,
        id: AnomalyId,
        resolution: impl Into<String>,
    ) -> EngineResult<Anomaly> {
        self.anomaly_for(principal, id)?;
        self.anomalies.resolve(id, resolution, self.clock.now())
    }

    pub fn investigate_anomaly(&self, principal: &Principal, id: AnomalyId) -> EngineResult<Anomaly> {
        self.anomaly_for(principal, id)?;
        self.anomalies.investigate(id, self.clock.now())
    }

    // ── Stock intents and signals ───────────────────────────────────────────

    pub fn adjust_stock(
        &self,
        principal: &Principal,
        store_id: &StoreId,
        sku: &Sku,
        delta: i64,
    ) -> EngineResult<InventoryItem> {
        authorize(principal, &Permission::INVENTORY_WRITE, &[store_id])?;
        self.inventory.adjust(store_id, sku, delta)
    }

    pub fn restock(
        &self,
        principal: &Principal,
        store_id: &StoreId,
        sku: &Sku,
        quantity: u64,
    ) -> EngineResult<InventoryItem> {
        authorize(principal, &Permission::INVENTORY_WRITE, &[store_id])?;
        self.inventory.restock(store_id, sku, quantity)
    }

    /// Take sold units off the shelf and log the sale for fraud detection.
    pub fn record_sale(
        &self,
        principal: &Principal,
        store_id: &StoreId,
        sku: &Sku,
        units: u64,
        value: f64,
    ) -> EngineResult<InventoryItem> {
        authorize(principal, &Permission::INVENTORY_WRITE, &[store_id])?;
        if !(value.is_finite() && value >= 0.0) {
            return Err(EngineError::validation("sale value must be a non-negative number"));
        }
        if units == 0 {
            return Err(EngineError::validation("sale must move at least one unit"));
        }
        let delta = i64::try_from(units)
            .map(|u| -u)
            .map_err(|_| EngineError::validation("sale quantity is too large"))?;

        // The sale signal goes in first so a failed signal write never
        // leaves the shelf decremented; a refused adjustment withdraws it.
        let tx = Transaction {
            sku: sku.clone(),
            units,
            value,
            at: self.clock.now(),
        };
        self.signals.record_transaction(store_id, tx.clone())?;
        match self.inventory.adjust(store_id, sku, delta) {
            Ok(item) => Ok(item),
            Err(e) => {
                if let Err(retract) = self.signals.retract_transaction(store_id, &tx) {
                    warn!(store = %store_id, sku = %sku, error = %retract, "failed to withdraw refused sale");
                }
                Err(e)
            }
        }
    }

    /// Spoilage is an observation; stock is written off separately.
    pub fn record_spoilage(
        &self,
        principal: &Principal,
        store_id: &StoreId,
        sku: &Sku,
        units_spoiled: u64,
        units_handled: u64,
    ) -> EngineResult<()> {
        authorize(principal, &Permission::INVENTORY_WRITE, &[store_id])?;
        self.inventory.item(store_id, sku)?;
        self.signals.record_spoilage(
            store_id,
            SpoilageObservation {
                sku: sku.clone(),
                units_spoiled,
                units_handled,
                at: self.clock.now(),
            },
        )
    }

    /// Latest projected duration for an in-transit delivery.
    pub fn report_delivery_progress(
        &self,
        principal: &Principal,
        id: NegotiationId,
        projected_duration_min: f64,
    ) -> EngineResult<DeliveryReport> {
        let transfer = self.transfer_for(principal, &Permission::INVENTORY_WRITE, id)?;

        let (Some(route), Some(source), Some(sku)) =
            (transfer.route(), transfer.source_store(), transfer.sku())
        else {
            return Err(EngineError::invalid_transition(format!(
                "negotiation {id} has no pinned route"
            )));
        };
        if transfer.status() != TransferStatus::InTransit {
            return Err(EngineError::invalid_transition(format!(
                "negotiation {id} is {}; progress is only tracked in transit",
                transfer.status().as_str()
            )));
        }

        let report = DeliveryReport {
            negotiation_id: id,
            route_id: route.id,
            sku: sku.clone(),
            estimated_duration_min: route.estimated_duration_min,
            projected_duration_min,
            reported_at: self.clock.now(),
        };
        self.signals.report_delivery(source, report.clone())?;
        Ok(report)
    }

    // ── Internals ───────────────────────────────────────────────────────────

    /// Detect over one store and record what survives the cooldown.
    pub fn scan_store(&self, store_id: &StoreId) -> EngineResult<Vec<Anomaly>> {
        let snapshot = self.inventory.snapshot(store_id)?;
        let signals = self.signals.for_store(store_id)?;
        let job = AnomalyScanJob::new(snapshot, signals).with_config(self.detector.clone());
        let report = LocalAiScheduler::for_store(store_id.clone()).run(job)?;
        let found = report.findings.len();
        let recorded = self.anomalies.record(report.findings, self.clock.now())?;
        debug!(store = %store_id, found, recorded = recorded.len(), "store scanned");
        Ok(recorded)
    }

    /// Drop long-resolved anomalies and expired cooldown marks.
    pub fn prune_anomalies(&self) -> EngineResult<usize> {
        self.anomalies.prune(self.clock.now())
    }

    fn candidate_routes(&self, store_id: &StoreId, objective: Objective) -> EngineResult<Vec<Route>> {
        let origin = self.inventory.store(store_id)?;
        let mut deliveries = Vec::new();
        for t in self.negotiations.for_store(store_id)? {
            if t.status() != TransferStatus::Approved || t.source_store() != Some(store_id) {
                continue;
            }
            let Some(dest) = t.dest_store() else { continue };
            deliveries.push(DeliveryRequest {
                id: t.id_typed().to_string(),
                location: self.inventory.store(dest)?.location,
                sku: t.sku().cloned(),
                units: t.quantity(),
            });
        }
        if deliveries.is_empty() {
            return Ok(Vec::new());
        }
        deliveries.sort_by(|a, b| a.id.cmp(&b.id));

        let request = RouteRequest {
            store_id: store_id.clone(),
            origin: origin.location,
            deliveries,
            fleet: self.fleet(store_id)?,
        };
        self.optimizer.optimize(&request, objective)
    }

    fn transfer_for(&self, principal: &Principal, required: &Permission, id: NegotiationId) -> EngineResult<Transfer> {
        scoped_lookup(
            principal,
            required,
            || self.negotiations.get(id),
            |t| authorize_transfer(principal, required, t).is_ok(),
            || format!("negotiation {id}"),
        )
    }

    fn anomaly_for(&self, principal: &Principal, id: AnomalyId) -> EngineResult<Anomaly> {
        scoped_lookup(
            principal,
            &Permission::ANOMALIES_MANAGE,
            || self.anomalies.get(id),
            |a| principal.store_scope.allows(&a.store_id),
            || format!("anomaly {id}"),
        )
    }

    fn fleet(&self, store_id: &StoreId) -> EngineResult<Fleet> {
        let fleets = self.retry.read(&self.fleets, "fleet registry")?;
        match fleets.get(store_id) {
            Some(fleet) => Ok(fleet.clone()),
            None => standard_fleet(),
        }
    }
}

impl ScanTarget for CoordinationFacade {
    fn store_ids(&self) -> EngineResult<Vec<StoreId>> {
        self.inventory.store_ids()
    }

    fn scan(&self, store_id: &StoreId) -> EngineResult<Vec<Anomaly>> {
        self.scan_store(store_id)
    }

    fn maintain(&self) -> EngineResult<()> {
        self.prune_anomalies().map(|_| ())
    }
}

/// Capability first, then the record's stores. A record outside the
/// principal's scope is reported exactly like a missing one.
fn scoped_lookup<T>(
    principal: &Principal,
    required: &Permission,
    lookup: impl FnOnce() -> EngineResult<T>,
    in_scope: impl FnOnce(&T) -> bool,
    what: impl FnOnce() -> String,
) -> EngineResult<T> {
    authorize(principal, required, &[])?;
    let record = lookup()?;
    if in_scope(&record) {
        Ok(record)
    } else {
        Err(EngineError::not_found(what()))
    }
}

/// Either end of the transfer being in scope is enough.
fn authorize_transfer(principal: &Principal, required: &Permission, transfer: &Transfer) -> EngineResult<()> {
    let stores: Vec<&StoreId> = [transfer.source_store(), transfer.dest_store()]
        .into_iter()
        .flatten()
        .collect();
    authorize_any(principal, required, &stores)?;
    Ok(())
}
