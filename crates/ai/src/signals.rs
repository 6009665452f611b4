//! Operational signals fed to the detectors.
//!
//! Signals are observations reported by collaborators (POS, cold chain,
//! delivery tracking). They never mutate inventory.

use std::collections::{BTreeMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wgrid_core::{EngineError, EngineResult, NegotiationId, RetryPolicy, RouteId, Sku, StoreId};

pub const DEFAULT_SIGNAL_LIMIT: usize = 512;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpoilageObservation {
    pub sku: Sku,
    pub units_spoiled: u64,
    pub units_handled: u64,
    pub at: DateTime<Utc>,
}

impl SpoilageObservation {
    pub fn rate(&self) -> f64 {
        if self.units_handled == 0 {
            0.0
        } else {
            self.units_spoiled as f64 / self.units_handled as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sku: Sku,
    pub units: u64,
    pub value: f64,
    pub at: DateTime<Utc>,
}

/// Latest progress report for an in-transit delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub negotiation_id: NegotiationId,
    pub route_id: RouteId,
    pub sku: Sku,
    pub estimated_duration_min: f64,
    pub projected_duration_min: f64,
    pub reported_at: DateTime<Utc>,
}

/// Signals for a single store, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSignals {
    pub spoilage: Vec<SpoilageObservation>,
    pub transactions: Vec<Transaction>,
    pub deliveries: Vec<DeliveryReport>,
}

#[derive(Debug, Default)]
struct Buffers {
    spoilage: VecDeque<SpoilageObservation>,
    transactions: VecDeque<Transaction>,
    deliveries: BTreeMap<NegotiationId, DeliveryReport>,
}

fn push_bounded<T>(buf: &mut VecDeque<T>, value: T, limit: usize) {
    if buf.len() >= limit {
        buf.pop_front();
    }
    buf.push_back(value);
}

/// Bounded, store-keyed signal buffers.
#[derive(Debug)]
pub struct SignalLog {
    inner: RwLock<BTreeMap<StoreId, Buffers>>,
    limit: usize,
    retry: RetryPolicy,
}

impl Default for SignalLog {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNAL_LIMIT)
    }
}

impl SignalLog {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
            limit: limit.max(1),
            retry: RetryPolicy::default(),
        }
    }

    pub fn record_spoilage(&self, store_id: &StoreId, obs: SpoilageObservation) -> EngineResult<()> {
        if obs.units_spoiled > obs.units_handled {
            return Err(EngineError::validation(
                "units_spoiled cannot exceed units_handled",
            ));
        }
        let mut map = self.retry.write(&self.inner, "signal log")?;
        let buf = map.entry(store_id.clone()).or_default();
        push_bounded(&mut buf.spoilage, obs, self.limit);
        Ok(())
    }

    pub fn record_transaction(&self, store_id: &StoreId, tx: Transaction) -> EngineResult<()> {
        if !(tx.value.is_finite() && tx.value >= 0.0) {
            return Err(EngineError::validation("transaction value must be a non-negative number"));
        }
        let mut map = self.retry.write(&self.inner, "signal log")?;
        let buf = map.entry(store_id.clone()).or_default();
        push_bounded(&mut buf.transactions, tx, self.limit);
        Ok(())
    }

    /// Withdraw a transaction whose sale did not go through. Returns whether
    /// it was still buffered.
    pub fn retract_transaction(&self, store_id: &StoreId, tx: &Transaction) -> EngineResult<bool> {
        let mut map = self.retry.write(&self.inner, "signal log")?;
        let Some(buf) = map.get_mut(store_id) else {
            return Ok(false);
        };
        match buf.transactions.iter().rposition(|t| t == tx) {
            Some(pos) => {
                buf.transactions.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replace the latest report for the delivery's negotiation.
    pub fn report_delivery(&self, store_id: &StoreId, report: DeliveryReport) -> EngineResult<()> {
        if !(report.projected_duration_min.is_finite() && report.projected_duration_min >= 0.0) {
            return Err(EngineError::validation(
                "projected duration must be a non-negative number of minutes",
            ));
        }
        let mut map = self.retry.write(&self.inner, "signal log")?;
        let buf = map.entry(store_id.clone()).or_default();
        buf.deliveries.insert(report.negotiation_id, report);
        Ok(())
    }

    /// Forget a delivery once it is no longer in transit.
    pub fn clear_delivery(&self, store_id: &StoreId, negotiation_id: NegotiationId) -> EngineResult<()> {
        let mut map = self.retry.write(&self.inner, "signal log")?;
        if let Some(buf) = map.get_mut(store_id) {
            buf.deliveries.remove(&negotiation_id);
        }
        Ok(())
    }

    pub fn for_store(&self, store_id: &StoreId) -> EngineResult<StoreSignals> {
        let map = self.retry.read(&self.inner, "signal log")?;
        Ok(map
            .get(store_id)
            .map(|b| StoreSignals {
                spoilage: b.spoilage.iter().cloned().collect(),
                transactions: b.transactions.iter().cloned().collect(),
                deliveries: b.deliveries.values().cloned().collect(),
            })
            .unwrap_or_default())
    }
}
