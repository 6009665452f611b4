//! The anomaly book: recorded anomalies and their dispositions.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use wgrid_core::{AnomalyId, EngineError, EngineResult, NegotiationId, RetryPolicy, Sku, StoreId};

use crate::model::{rank, Anomaly, AnomalyType, Disposition, Finding, Severity};

pub const DEFAULT_COOLDOWN_MINUTES: i64 = 30;
/// How long resolved anomalies stay in the book.
pub const DEFAULT_RETENTION_HOURS: i64 = 24 * 7;

/// Delivery findings are keyed per transfer as well.
type CooldownKey = (StoreId, Option<Sku>, AnomalyType, Option<NegotiationId>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub count: usize,
}

/// Dashboard rollup for one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyTrends {
    pub total: usize,
    pub resolved: usize,
    pub critical: usize,
    pub by_type: Vec<TypeCount>,
}

#[derive(Debug, Default)]
struct BookState {
    anomalies: BTreeMap<AnomalyId, Anomaly>,
    last_emitted: HashMap<CooldownKey, DateTime<Utc>>,
}

#[derive(Debug)]
pub struct AnomalyBook {
    inner: RwLock<BookState>,
    cooldown: Duration,
    retention: Duration,
    retry: RetryPolicy,
}

impl Default for AnomalyBook {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_COOLDOWN_MINUTES))
    }
}

impl AnomalyBook {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: RwLock::new(BookState::default()),
            cooldown,
            retention: Duration::hours(DEFAULT_RETENTION_HOURS),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention.max(Duration::zero());
        self
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Record findings detected at `at`, returning the ones that were not
    /// suppressed by the cooldown.
    pub fn record(&self, findings: Vec<Finding>, at: DateTime<Utc>) -> EngineResult<Vec<Anomaly>> {
        let mut state = self.retry.write(&self.inner, "anomaly book")?;
        let mut recorded = Vec::new();

        for finding in findings {
            let key: CooldownKey = (
                finding.store_id.clone(),
                finding.sku.clone(),
                finding.anomaly_type,
                finding.negotiation_id,
            );
            if let Some(last) = state.last_emitted.get(&key) {
                if at - *last < self.cooldown {
                    debug!(
                        store = %finding.store_id,
                        anomaly_type = ?finding.anomaly_type,
                        "finding suppressed by cooldown"
                    );
                    continue;
                }
            }
            let anomaly = Anomaly::from_finding(finding, at);
            info!(
                anomaly_id = %anomaly.id,
                store = %anomaly.store_id,
                anomaly_type = ?anomaly.anomaly_type,
                severity = ?anomaly.severity,
                "anomaly recorded"
            );
            state.last_emitted.insert(key, at);
            state.anomalies.insert(anomaly.id, anomaly.clone());
            recorded.push(anomaly);
        }

        Ok(recorded)
    }

    /// Drop anomalies resolved more than the retention horizon before `now`,
    /// and cooldown marks that can no longer suppress anything. Open and
    /// investigating anomalies are always kept. Returns the anomalies dropped.
    pub fn prune(&self, now: DateTime<Utc>) -> EngineResult<usize> {
        let mut state = self.retry.write(&self.inner, "anomaly book")?;
        let horizon = now - self.retention;
        let before = state.anomalies.len();
        state.anomalies.retain(|_, a| {
            a.disposition != Disposition::Resolved || a.disposed_at.is_none_or(|at| at > horizon)
        });
        let cooldown = self.cooldown;
        state.last_emitted.retain(|_, at| now - *at < cooldown);

        let dropped = before - state.anomalies.len();
        if dropped > 0 {
            info!(dropped, retained = state.anomalies.len(), "resolved anomalies pruned");
        }
        Ok(dropped)
    }

    pub fn get(&self, id: AnomalyId) -> EngineResult<Anomaly> {
        let state = self.retry.read(&self.inner, "anomaly book")?;
        state
            .anomalies
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("anomaly {id}")))
    }

    /// All anomalies for the store, by severity then confidence.
    pub fn list(&self, store_id: &StoreId) -> EngineResult<Vec<Anomaly>> {
        let state = self.retry.read(&self.inner, "anomaly book")?;
        let mut out: Vec<Anomaly> = state
            .anomalies
            .values()
            .filter(|a| &a.store_id == store_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            rank(a.severity, a.confidence, b.severity, b.confidence)
                .then_with(|| b.detected_at.cmp(&a.detected_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(out)
    }

    /// Open and investigating anomalies for the store.
    pub fn open(&self, store_id: &StoreId) -> EngineResult<Vec<Anomaly>> {
        Ok(self.list(store_id)?.into_iter().filter(Anomaly::is_open).collect())
    }

    /// `open | investigating -> resolved`.
    pub fn resolve(&self, id: AnomalyId, resolution: impl Into<String>, at: DateTime<Utc>) -> EngineResult<Anomaly> {
        let resolution = resolution.into();
        if resolution.trim().is_empty() {
            return Err(EngineError::validation("resolution must not be empty"));
        }
        let mut state = self.retry.write(&self.inner, "anomaly book")?;
        let anomaly = state
            .anomalies
            .get_mut(&id)
            .ok_or_else(|| EngineError::not_found(format!("anomaly {id}")))?;

        if anomaly.disposition == Disposition::Resolved {
            return Err(EngineError::invalid_transition(format!(
                "anomaly {id} is already resolved"
            )));
        }
        anomaly.disposition = Disposition::Resolved;
        anomaly.resolution = Some(resolution);
        anomaly.disposed_at = Some(at);
        info!(anomaly_id = %id, "anomaly resolved");
        Ok(anomaly.clone())
    }

    /// `open -> investigating`.
    pub fn investigate(&self, id: AnomalyId, at: DateTime<Utc>) -> EngineResult<Anomaly> {
        let mut state = self.retry.write(&self.inner, "anomaly book")?;
        let anomaly = state
            .anomalies
            .get_mut(&id)
            .ok_or_else(|| EngineError::not_found(format!("anomaly {id}")))?;

        if anomaly.disposition != Disposition::Open {
            return Err(EngineError::invalid_transition(format!(
                "anomaly {id} is {:?}, only open anomalies can be investigated",
                anomaly.disposition
            )));
        }
        anomaly.disposition = Disposition::Investigating;
        anomaly.disposed_at = Some(at);
        info!(anomaly_id = %id, "anomaly under investigation");
        Ok(anomaly.clone())
    }

    pub fn trends(&self, store_id: &StoreId) -> EngineResult<AnomalyTrends> {
        let all = self.list(store_id)?;
        let by_type = AnomalyType::ALL
            .iter()
            .map(|t| TypeCount {
                anomaly_type: *t,
                count: all.iter().filter(|a| a.anomaly_type == *t).count(),
            })
            .collect();
        Ok(AnomalyTrends {
            total: all.len(),
            resolved: all.iter().filter(|a| a.disposition == Disposition::Resolved).count(),
            critical: all.iter().filter(|a| a.severity == Severity::Critical).count(),
            by_type,
        })
    }
}
