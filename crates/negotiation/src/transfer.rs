use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wgrid_core::{Aggregate, AggregateRoot, DomainEvent, EngineError, NegotiationId, Sku, StoreId};
use wgrid_routing::Route;

use crate::pricing::{Priority, Urgency};

pub const CANCELLED_NOTE: &str = "cancelled by proposer";

/// Transfer status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Approved,
    Rejected,
    InTransit,
    Completed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Approved => "approved",
            TransferStatus::Rejected => "rejected",
            TransferStatus::InTransit => "in_transit",
            TransferStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Rejected | TransferStatus::Completed)
    }

    /// Whether stock is committed but not yet moved.
    pub fn reserves_stock(&self) -> bool {
        matches!(self, TransferStatus::Approved | TransferStatus::InTransit)
    }
}

/// Aggregate root: a proposed movement of stock between two stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    id: NegotiationId,
    sku: Option<Sku>,
    source_store: Option<StoreId>,
    dest_store: Option<StoreId>,
    quantity: u64,
    status: TransferStatus,
    priority: Priority,
    urgency: Urgency,
    distance_km: f64,
    estimated_cost: u64,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    notes: Vec<String>,
    proposed_by: String,
    route: Option<Route>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl Transfer {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: NegotiationId) -> Self {
        Self {
            id,
            sku: None,
            source_store: None,
            dest_store: None,
            quantity: 0,
            status: TransferStatus::Pending,
            priority: Priority::Low,
            urgency: Urgency::Routine,
            distance_km: 0.0,
            estimated_cost: 0,
            created_at: None,
            updated_at: None,
            notes: Vec::new(),
            proposed_by: String::new(),
            route: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> NegotiationId {
        self.id
    }

    pub fn sku(&self) -> Option<&Sku> {
        self.sku.as_ref()
    }

    pub fn source_store(&self) -> Option<&StoreId> {
        self.source_store.as_ref()
    }

    pub fn dest_store(&self) -> Option<&StoreId> {
        self.dest_store.as_ref()
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn urgency(&self) -> Urgency {
        self.urgency
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn estimated_cost(&self) -> u64 {
        self.estimated_cost
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn proposed_by(&self) -> &str {
        &self.proposed_by
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn involves(&self, store_id: &StoreId) -> bool {
        self.source_store.as_ref() == Some(store_id) || self.dest_store.as_ref() == Some(store_id)
    }
}

impl AggregateRoot for Transfer {
    type Id = NegotiationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: Propose. Stock figures are read by the engine beforehand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Propose {
    pub negotiation_id: NegotiationId,
    pub sku: Sku,
    pub source_store: StoreId,
    pub dest_store: StoreId,
    pub quantity: u64,
    pub source_available: u64,
    pub priority: Priority,
    pub urgency: Urgency,
    pub distance_km: f64,
    pub estimated_cost: u64,
    pub notes: Option<String>,
    pub proposed_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve. `available` is source stock net of reservations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub negotiation_id: NegotiationId,
    pub available: u64,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub negotiation_id: NegotiationId,
    pub reason: Option<String>,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    pub negotiation_id: NegotiationId,
    pub route: Route,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Complete (stock has been moved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complete {
    pub negotiation_id: NegotiationId,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FailFulfilment (stock could not be moved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailFulfilment {
    pub negotiation_id: NegotiationId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancel {
    pub negotiation_id: NegotiationId,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransferCommand {
    Propose(Propose),
    Approve(Approve),
    Reject(Reject),
    Dispatch(Dispatch),
    Complete(Complete),
    FailFulfilment(FailFulfilment),
    Cancel(Cancel),
}

/// Event: TransferProposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferProposed {
    pub negotiation_id: NegotiationId,
    pub sku: Sku,
    pub source_store: StoreId,
    pub dest_store: StoreId,
    pub quantity: u64,
    pub priority: Priority,
    pub urgency: Urgency,
    pub distance_km: f64,
    pub estimated_cost: u64,
    pub notes: Option<String>,
    pub proposed_by: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferApproved {
    pub negotiation_id: NegotiationId,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRejected {
    pub negotiation_id: NegotiationId,
    pub reason: Option<String>,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferDispatched {
    pub negotiation_id: NegotiationId,
    pub route: Route,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCompleted {
    pub negotiation_id: NegotiationId,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFailed {
    pub negotiation_id: NegotiationId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCancelled {
    pub negotiation_id: NegotiationId,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

/// Audit trail entry for a transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransferEvent {
    Proposed(TransferProposed),
    Approved(TransferApproved),
    Rejected(TransferRejected),
    Dispatched(TransferDispatched),
    Completed(TransferCompleted),
    Failed(TransferFailed),
    Cancelled(TransferCancelled),
}

impl DomainEvent for TransferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransferEvent::Proposed(_) => "negotiation.proposed",
            TransferEvent::Approved(_) => "negotiation.approved",
            TransferEvent::Rejected(_) => "negotiation.rejected",
            TransferEvent::Dispatched(_) => "negotiation.dispatched",
            TransferEvent::Completed(_) => "negotiation.completed",
            TransferEvent::Failed(_) => "negotiation.fulfilment_failed",
            TransferEvent::Cancelled(_) => "negotiation.cancelled",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransferEvent::Proposed(e) => e.occurred_at,
            TransferEvent::Approved(e) => e.occurred_at,
            TransferEvent::Rejected(e) => e.occurred_at,
            TransferEvent::Dispatched(e) => e.occurred_at,
            TransferEvent::Completed(e) => e.occurred_at,
            TransferEvent::Failed(e) => e.occurred_at,
            TransferEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Transfer {
    type Command = TransferCommand;
    type Event = TransferEvent;
    type Error = EngineError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransferEvent::Proposed(e) => {
                self.id = e.negotiation_id;
                self.sku = Some(e.sku.clone());
                self.source_store = Some(e.source_store.clone());
                self.dest_store = Some(e.dest_store.clone());
                self.quantity = e.quantity;
                self.status = TransferStatus::Pending;
                self.priority = e.priority;
                self.urgency = e.urgency;
                self.distance_km = e.distance_km;
                self.estimated_cost = e.estimated_cost;
                self.created_at = Some(e.occurred_at);
                self.notes = e.notes.iter().cloned().collect();
                self.proposed_by = e.proposed_by.clone();
                self.route = None;
                self.created = true;
            }
            TransferEvent::Approved(_) => {
                self.status = TransferStatus::Approved;
            }
            TransferEvent::Rejected(e) => {
                self.status = TransferStatus::Rejected;
                if let Some(reason) = &e.reason {
                    self.notes.push(reason.clone());
                }
            }
            TransferEvent::Dispatched(e) => {
                self.status = TransferStatus::InTransit;
                self.route = Some(e.route.clone());
            }
            TransferEvent::Completed(_) => {
                self.status = TransferStatus::Completed;
            }
            TransferEvent::Failed(e) => {
                self.status = TransferStatus::Rejected;
                self.notes.push(e.reason.clone());
            }
            TransferEvent::Cancelled(_) => {
                self.status = TransferStatus::Rejected;
                self.notes.push(CANCELLED_NOTE.to_string());
            }
        }

        self.updated_at = Some(event.occurred_at());
        // +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransferCommand::Propose(cmd) => self.handle_propose(cmd),
            TransferCommand::Approve(cmd) => self.handle_approve(cmd),
            TransferCommand::Reject(cmd) => self.handle_reject(cmd),
            TransferCommand::Dispatch(cmd) => self.handle_dispatch(cmd),
            TransferCommand::Complete(cmd) => self.handle_complete(cmd),
            TransferCommand::FailFulfilment(cmd) => self.handle_fail(cmd),
            TransferCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Transfer {
    fn ensure_exists(&self, negotiation_id: NegotiationId) -> Result<(), EngineError> {
        if !self.created {
            return Err(EngineError::not_found(format!("negotiation {negotiation_id}")));
        }
        if self.id != negotiation_id {
            return Err(EngineError::validation("negotiation_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: &[TransferStatus], intent: &str) -> Result<(), EngineError> {
        if expected.contains(&self.status) {
            return Ok(());
        }
        Err(EngineError::invalid_transition(format!(
            "cannot {intent} negotiation {} in status {:?}",
            self.id, self.status
        )))
    }

    fn handle_propose(&self, cmd: &Propose) -> Result<Vec<TransferEvent>, EngineError> {
        if self.created {
            return Err(EngineError::conflict("negotiation already exists"));
        }
        if cmd.source_store == cmd.dest_store {
            return Err(EngineError::validation(
                "source and destination store must differ",
            ));
        }
        if cmd.quantity == 0 {
            return Err(EngineError::validation("quantity must be positive"));
        }
        if cmd.quantity > cmd.source_available {
            return Err(EngineError::insufficient_stock(
                &cmd.source_store,
                &cmd.sku,
                cmd.quantity,
                cmd.source_available,
            ));
        }

        Ok(vec![TransferEvent::Proposed(TransferProposed {
            negotiation_id: cmd.negotiation_id,
            sku: cmd.sku.clone(),
            source_store: cmd.source_store.clone(),
            dest_store: cmd.dest_store.clone(),
            quantity: cmd.quantity,
            priority: cmd.priority,
            urgency: cmd.urgency,
            distance_km: cmd.distance_km,
            estimated_cost: cmd.estimated_cost,
            notes: cmd.notes.clone().filter(|n| !n.trim().is_empty()),
            proposed_by: cmd.proposed_by.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<TransferEvent>, EngineError> {
        self.ensure_exists(cmd.negotiation_id)?;
        self.ensure_status(&[TransferStatus::Pending], "approve")?;

        if self.quantity > cmd.available {
            let (store, sku) = self.source_and_sku();
            return Err(EngineError::insufficient_stock(store, sku, self.quantity, cmd.available));
        }

        Ok(vec![TransferEvent::Approved(TransferApproved {
            negotiation_id: cmd.negotiation_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &Reject) -> Result<Vec<TransferEvent>, EngineError> {
        self.ensure_exists(cmd.negotiation_id)?;
        self.ensure_status(&[TransferStatus::Pending], "reject")?;

        Ok(vec![TransferEvent::Rejected(TransferRejected {
            negotiation_id: cmd.negotiation_id,
            reason: cmd.reason.clone().filter(|r| !r.trim().is_empty()),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_dispatch(&self, cmd: &Dispatch) -> Result<Vec<TransferEvent>, EngineError> {
        self.ensure_exists(cmd.negotiation_id)?;
        self.ensure_status(&[TransferStatus::Approved], "dispatch")?;

        if self.source_store.as_ref() != Some(&cmd.route.store_id) {
            return Err(EngineError::validation(
                "route must depart from the source store",
            ));
        }
        if !cmd.route.serves(&cmd.negotiation_id.to_string()) {
            return Err(EngineError::validation(format!(
                "route {} does not serve negotiation {}",
                cmd.route.id, cmd.negotiation_id
            )));
        }

        Ok(vec![TransferEvent::Dispatched(TransferDispatched {
            negotiation_id: cmd.negotiation_id,
            route: cmd.route.clone(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &Complete) -> Result<Vec<TransferEvent>, EngineError> {
        self.ensure_exists(cmd.negotiation_id)?;
        // Invariant: stock only moves for transfers that are on the road.
        self.ensure_status(&[TransferStatus::InTransit], "fulfill")?;

        Ok(vec![TransferEvent::Completed(TransferCompleted {
            negotiation_id: cmd.negotiation_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fail(&self, cmd: &FailFulfilment) -> Result<Vec<TransferEvent>, EngineError> {
        self.ensure_exists(cmd.negotiation_id)?;
        self.ensure_status(&[TransferStatus::InTransit], "fail")?;

        Ok(vec![TransferEvent::Failed(TransferFailed {
            negotiation_id: cmd.negotiation_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &Cancel) -> Result<Vec<TransferEvent>, EngineError> {
        self.ensure_exists(cmd.negotiation_id)?;
        self.ensure_status(&[TransferStatus::Pending, TransferStatus::Approved], "cancel")?;

        if cmd.actor != self.proposed_by {
            return Err(EngineError::forbidden(
                "only the proposer can cancel a negotiation",
            ));
        }

        Ok(vec![TransferEvent::Cancelled(TransferCancelled {
            negotiation_id: cmd.negotiation_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn source_and_sku(&self) -> (String, String) {
        (
            self.source_store.as_ref().map(|s| s.to_string()).unwrap_or_default(),
            self.sku.as_ref().map(|s| s.to_string()).unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use wgrid_core::{ErrorKind, GeoPoint, RouteId};
    use wgrid_routing::{RouteKind, Stop, VehicleType, Objective};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn store(s: &str) -> StoreId {
        StoreId::new(s).unwrap()
    }

    fn propose_cmd(id: NegotiationId, quantity: u64, available: u64) -> Propose {
        Propose {
            negotiation_id: id,
            sku: Sku::new("Biscuits").unwrap(),
            source_store: store("andheri"),
            dest_store: store("bandra"),
            quantity,
            source_available: available,
            priority: Priority::High,
            urgency: Urgency::Routine,
            distance_km: 8.5,
            estimated_cost: 213,
            notes: Some("Urgent request due to unexpected demand spike".to_string()),
            proposed_by: "manager-andheri".to_string(),
            occurred_at: t0(),
        }
    }

    fn exec(t: &mut Transfer, cmd: TransferCommand) -> Result<(), EngineError> {
        let events = t.handle(&cmd)?;
        for e in &events {
            t.apply(e);
        }
        Ok(())
    }

    fn proposed(id: NegotiationId) -> Transfer {
        let mut t = Transfer::empty(id);
        exec(&mut t, TransferCommand::Propose(propose_cmd(id, 50, 200))).unwrap();
        t
    }

    fn route_for(id: NegotiationId, from: &str) -> Route {
        Route {
            id: RouteId::derive(&[from, "ev-1", "direct", &id.to_string()]),
            store_id: store(from),
            vehicle_id: "ev-1".to_string(),
            vehicle_type: VehicleType::Electric,
            kind: RouteKind::Direct,
            objective: Objective::Eco,
            distance_km: 9.5,
            estimated_duration_min: 28.0,
            carbon_footprint_kg: 0.0,
            cost: 226.0,
            stops: vec![Stop {
                location: GeoPoint::new(19.0596, 72.8295).unwrap(),
                delivery_id: id.to_string(),
                eta_min: 23.0,
            }],
        }
    }

    fn approve(id: NegotiationId, available: u64) -> TransferCommand {
        TransferCommand::Approve(Approve {
            negotiation_id: id,
            available,
            actor: "regional-head".to_string(),
            occurred_at: t0(),
        })
    }

    #[test]
    fn propose_creates_pending_transfer() {
        let id = NegotiationId::new();
        let t = proposed(id);
        assert_eq!(t.status(), TransferStatus::Pending);
        assert_eq!(t.version(), 1);
        assert_eq!(t.estimated_cost(), 213);
        assert_eq!(t.notes().len(), 1);
    }

    #[test]
    fn over_quantity_proposal_is_rejected() {
        let id = NegotiationId::new();
        let t = Transfer::empty(id);
        let err = t
            .handle(&TransferCommand::Propose(propose_cmd(id, 250, 200)))
            .unwrap_err();
        match err {
            EngineError::InsufficientStock { requested: 250, available: 200, .. } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cannot_skip_from_approved_to_completed() {
        let id = NegotiationId::new();
        let mut t = proposed(id);
        exec(&mut t, approve(id, 200)).unwrap();

        let err = exec(
            &mut t,
            TransferCommand::Complete(Complete {
                negotiation_id: id,
                actor: "x".to_string(),
                occurred_at: t0(),
            }),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(t.status(), TransferStatus::Approved);
    }

    #[test]
    fn full_lifecycle_pins_route() {
        let id = NegotiationId::new();
        let mut t = proposed(id);
        exec(&mut t, approve(id, 200)).unwrap();
        exec(
            &mut t,
            TransferCommand::Dispatch(Dispatch {
                negotiation_id: id,
                route: route_for(id, "andheri"),
                actor: "regional-head".to_string(),
                occurred_at: t0(),
            }),
        )
        .unwrap();
        assert_eq!(t.status(), TransferStatus::InTransit);
        assert!(t.route().is_some());

        exec(
            &mut t,
            TransferCommand::Complete(Complete {
                negotiation_id: id,
                actor: "regional-head".to_string(),
                occurred_at: t0(),
            }),
        )
        .unwrap();
        assert_eq!(t.status(), TransferStatus::Completed);
        assert_eq!(t.version(), 4);
    }

    #[test]
    fn dispatch_requires_a_route_serving_the_transfer() {
        let id = NegotiationId::new();
        let mut t = proposed(id);
        exec(&mut t, approve(id, 200)).unwrap();

        let wrong_store = TransferCommand::Dispatch(Dispatch {
            negotiation_id: id,
            route: route_for(id, "malad"),
            actor: "x".to_string(),
            occurred_at: t0(),
        });
        assert_eq!(t.handle(&wrong_store).unwrap_err().kind(), ErrorKind::ValidationError);

        let other = TransferCommand::Dispatch(Dispatch {
            negotiation_id: id,
            route: route_for(NegotiationId::new(), "andheri"),
            actor: "x".to_string(),
            occurred_at: t0(),
        });
        assert_eq!(t.handle(&other).unwrap_err().kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn approve_checks_reserved_availability() {
        let id = NegotiationId::new();
        let t = proposed(id);
        let err = t.handle(&approve(id, 49)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }

    #[test]
    fn only_proposer_can_cancel_and_only_before_dispatch() {
        let id = NegotiationId::new();
        let mut t = proposed(id);

        let by = |actor: &str| {
            TransferCommand::Cancel(Cancel {
                negotiation_id: id,
                actor: actor.to_string(),
                occurred_at: t0(),
            })
        };
        match t.handle(&by("someone-else")) {
            Err(EngineError::Forbidden(msg)) if msg.contains("proposer") => {}
            other => panic!("expected forbidden, got {other:?}"),
        }

        exec(&mut t, by("manager-andheri")).unwrap();
        assert_eq!(t.status(), TransferStatus::Rejected);
        assert_eq!(t.notes().last().map(String::as_str), Some(CANCELLED_NOTE));

        let err = t.handle(&by("manager-andheri")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn failed_fulfilment_rejects_with_note() {
        let id = NegotiationId::new();
        let mut t = proposed(id);
        exec(&mut t, approve(id, 200)).unwrap();
        exec(
            &mut t,
            TransferCommand::Dispatch(Dispatch {
                negotiation_id: id,
                route: route_for(id, "andheri"),
                actor: "x".to_string(),
                occurred_at: t0(),
            }),
        )
        .unwrap();
        exec(
            &mut t,
            TransferCommand::FailFulfilment(FailFulfilment {
                negotiation_id: id,
                reason: "fulfilment failed: insufficient stock".to_string(),
                occurred_at: t0(),
            }),
        )
        .unwrap();
        assert_eq!(t.status(), TransferStatus::Rejected);
        assert!(t.notes().iter().any(|n| n.contains("insufficient stock")));
    }

    #[test]
    fn commands_on_missing_transfer_are_not_found() {
        let id = NegotiationId::new();
        let t = Transfer::empty(id);
        assert_eq!(t.handle(&approve(id, 10)).unwrap_err().kind(), ErrorKind::NotFound);
    }
}
