//! Deterministic detectors for the four anomaly types.
//!
//! Every detector is a pure function of a store snapshot, its signals and the
//! config. Each produces at most one finding per (sku, type).

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use wgrid_core::Sku;
use wgrid_inventory::{MovementReason, StoreSnapshot};

use crate::model::{rank, AnomalyType, Finding, Severity};
use crate::signals::{StoreSignals, Transaction};

/// Detection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Length of the "recent" window in minutes.
    pub sampling_window_min: i64,
    /// Recent depletion must exceed this multiple of the trailing average.
    pub depletion_multiple: f64,
    /// Minimum baseline samples before a detector will fire.
    pub min_samples: usize,
    /// Relative excess over historical spoilage that triggers (0.2 = 20%).
    pub spoilage_excess: f64,
    /// Z-score threshold for transaction value and frequency.
    pub fraud_z: f64,
    /// Number of past windows used as the frequency baseline.
    pub frequency_lookback_windows: usize,
    pub business_open_hour: u32,
    pub business_close_hour: u32,
    /// Offset applied to UTC timestamps to get store-local hours.
    pub utc_offset_minutes: i32,
    /// Relative overrun of a delivery estimate that triggers (0.15 = 15%).
    pub delivery_margin: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sampling_window_min: 120,
            depletion_multiple: 2.0,
            min_samples: 4,
            spoilage_excess: 0.20,
            fraud_z: 3.0,
            frequency_lookback_windows: 12,
            business_open_hour: 8,
            business_close_hour: 22,
            utc_offset_minutes: 0,
            delivery_margin: 0.15,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sampling_window_min <= 0 {
            return Err("sampling_window_min must be positive".to_string());
        }
        if !(self.depletion_multiple.is_finite() && self.depletion_multiple >= 2.0) {
            return Err("depletion_multiple must be a finite number >= 2".to_string());
        }
        if self.min_samples < 2 {
            return Err("min_samples must be >= 2 to compute a baseline".to_string());
        }
        for (name, v) in [
            ("spoilage_excess", self.spoilage_excess),
            ("fraud_z", self.fraud_z),
            ("delivery_margin", self.delivery_margin),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(format!("{name} must be a finite positive number"));
            }
        }
        if self.business_open_hour > 23 || self.business_close_hour > 24 {
            return Err("business hours must be within 0..=24".to_string());
        }
        Ok(())
    }

    fn window(&self) -> Duration {
        Duration::minutes(self.sampling_window_min)
    }

    fn is_business_hour(&self, at: DateTime<Utc>) -> bool {
        let local = at + Duration::minutes(self.utc_offset_minutes as i64);
        let h = local.hour();
        let (open, close) = (self.business_open_hour, self.business_close_hour);
        if open <= close {
            (open..close).contains(&h)
        } else {
            // Overnight opening (e.g. 18..6).
            h >= open || h < close
        }
    }
}

/// Run every detector and return findings ordered by severity then confidence.
pub fn detect(snapshot: &StoreSnapshot, signals: &StoreSignals, cfg: &DetectorConfig) -> Vec<Finding> {
    let mut findings = Vec::new();
    findings.extend(detect_depletion(snapshot, cfg));
    findings.extend(detect_spoilage(snapshot, signals, cfg));
    findings.extend(detect_fraud(snapshot, signals, cfg));
    findings.extend(detect_delivery_delays(snapshot, signals, cfg));
    findings.sort_by(|a, b| {
        rank(a.severity, a.confidence, b.severity, b.confidence)
            .then_with(|| a.sku.cmp(&b.sku))
    });
    findings
}

/// Inventory: recent depletion vs. trailing average depletion per window.
pub fn detect_depletion(snapshot: &StoreSnapshot, cfg: &DetectorConfig) -> Vec<Finding> {
    let now = snapshot.taken_at;
    let window = cfg.window();
    let window_start = now - window;
    let mut out = Vec::new();

    for item in &snapshot.items {
        // Sales and shrink only; transfers are planned movements.
        let outflows: Vec<(DateTime<Utc>, u64)> = snapshot
            .movements_for(&item.sku)
            .iter()
            .filter(|m| m.reason == MovementReason::Adjustment && m.delta < 0 && m.at <= now)
            .map(|m| (m.at, m.outflow()))
            .collect();

        let (recent, trailing): (Vec<_>, Vec<_>) =
            outflows.into_iter().partition(|(at, _)| *at > window_start);
        if trailing.len() < cfg.min_samples {
            continue;
        }
        let recent_drop: u64 = recent.iter().map(|(_, u)| u).sum();
        if recent_drop == 0 {
            continue;
        }

        let first = trailing.iter().map(|(at, _)| *at).min().unwrap_or(window_start);
        let span_windows = ((window_start - first).num_seconds() as f64
            / window.num_seconds() as f64)
            .max(1.0);
        let trailing_total: u64 = trailing.iter().map(|(_, u)| u).sum();
        let avg = trailing_total as f64 / span_windows;
        if avg <= f64::EPSILON {
            continue;
        }

        let threshold = avg * cfg.depletion_multiple;
        if (recent_drop as f64) <= threshold {
            continue;
        }
        let ratio = recent_drop as f64 / threshold;
        let on_hand_before = item.quantity + recent_drop;
        let pct = 100.0 * recent_drop as f64 / on_hand_before.max(1) as f64;

        out.push(Finding {
            anomaly_type: AnomalyType::Inventory,
            severity: Severity::from_excess(ratio),
            confidence: confidence(ratio, trailing.len(), cfg.min_samples),
            store_id: snapshot.store.id.clone(),
            sku: Some(item.sku.clone()),
            negotiation_id: None,
            description: format!(
                "{} inventory decreased by {recent_drop} units ({pct:.0}%) in the last {} minutes; trailing average is {avg:.1} units per window",
                item.sku, cfg.sampling_window_min
            ),
        });
    }
    out
}

/// Spoilage: latest observed rate vs. historical average, perishables only.
pub fn detect_spoilage(
    snapshot: &StoreSnapshot,
    signals: &StoreSignals,
    cfg: &DetectorConfig,
) -> Vec<Finding> {
    let mut by_sku: BTreeMap<&Sku, Vec<f64>> = BTreeMap::new();
    for obs in &signals.spoilage {
        by_sku.entry(&obs.sku).or_default().push(obs.rate());
    }

    let mut out = Vec::new();
    for (sku, rates) in by_sku {
        let Some(item) = snapshot.item(sku) else {
            continue;
        };
        if !item.is_perishable() || rates.len() < cfg.min_samples + 1 {
            continue;
        }
        let (latest, history) = match rates.split_last() {
            Some((l, h)) => (*l, h),
            None => continue,
        };
        let hist_avg = mean(history);
        if hist_avg <= f64::EPSILON {
            continue;
        }
        let excess = latest / hist_avg - 1.0;
        if excess < cfg.spoilage_excess {
            continue;
        }
        let ratio = excess / cfg.spoilage_excess;
        out.push(Finding {
            anomaly_type: AnomalyType::Spoilage,
            severity: Severity::from_excess(ratio),
            confidence: confidence(ratio, history.len(), cfg.min_samples),
            store_id: snapshot.store.id.clone(),
            sku: Some(sku.clone()),
            negotiation_id: None,
            description: format!(
                "{sku} showing {:.0}% higher spoilage rate than historical average ({:.1}% vs {:.1}%)",
                excess * 100.0,
                latest * 100.0,
                hist_avg * 100.0
            ),
        });
    }
    out
}

/// Fraud: value outliers, frequency bursts and off-hours activity per SKU.
pub fn detect_fraud(snapshot: &StoreSnapshot, signals: &StoreSignals, cfg: &DetectorConfig) -> Vec<Finding> {
    let now = snapshot.taken_at;
    let window = cfg.window();
    let window_start = now - window;

    let mut by_sku: BTreeMap<&Sku, Vec<&Transaction>> = BTreeMap::new();
    for tx in &signals.transactions {
        if tx.at <= now {
            by_sku.entry(&tx.sku).or_default().push(tx);
        }
    }

    let mut out = Vec::new();
    for (sku, mut txs) in by_sku {
        txs.sort_by_key(|t| t.at);
        let Some(latest) = txs.last().copied() else {
            continue;
        };
        if latest.at <= window_start {
            continue;
        }

        let mut reasons: Vec<String> = Vec::new();
        let mut ratio: f64 = 0.0;
        let mut support = 0usize;

        // Value outlier of the latest transaction against all prior ones.
        let history: Vec<f64> = txs[..txs.len() - 1].iter().map(|t| t.value).collect();
        if history.len() >= cfg.min_samples {
            let m = mean(&history);
            let sd = stddev_sample(&history, m);
            support = support.max(history.len());
            if sd > f64::EPSILON {
                let z = (latest.value - m).abs() / sd;
                if z > cfg.fraud_z {
                    ratio = ratio.max(z / cfg.fraud_z);
                    reasons.push(format!(
                        "transaction value {:.2} is {z:.1} standard deviations from mean {m:.2}",
                        latest.value
                    ));
                }
            } else if m > 0.0 && (latest.value - m).abs() > 0.5 * m {
                ratio = ratio.max(1.0);
                reasons.push(format!(
                    "transaction value {:.2} departs from a constant baseline of {m:.2}",
                    latest.value
                ));
            }
        }

        // Frequency burst: recent window count vs. previous windows.
        let recent_count = txs.iter().filter(|t| t.at > window_start).count();
        let counts = window_counts(&txs, window_start, window, cfg.frequency_lookback_windows);
        if counts.len() >= cfg.min_samples {
            let m = mean(&counts);
            // Count data: floor the spread at one transaction.
            let sd = stddev_sample(&counts, m).max(1.0);
            let z = (recent_count as f64 - m) / sd;
            support = support.max(counts.len());
            if z > cfg.fraud_z {
                ratio = ratio.max(z / cfg.fraud_z);
                reasons.push(format!(
                    "{recent_count} transactions in the last {} minutes vs. a typical {m:.1}",
                    cfg.sampling_window_min
                ));
            }
        }

        // Activity outside business hours inside the recent window.
        let off_hours = txs
            .iter()
            .filter(|t| t.at > window_start && !cfg.is_business_hour(t.at))
            .count();
        if off_hours > 0 {
            ratio = ratio.max(2.0);
            support = support.max(cfg.min_samples);
            reasons.push(format!(
                "{off_hours} transaction(s) outside business hours ({:02}:00-{:02}:00)",
                cfg.business_open_hour, cfg.business_close_hour
            ));
        }

        if reasons.is_empty() {
            continue;
        }
        if off_hours > 0 && reasons.len() > 1 {
            ratio = ratio.max(3.0);
        }

        out.push(Finding {
            anomaly_type: AnomalyType::Fraud,
            severity: Severity::from_excess(ratio),
            confidence: confidence(ratio, support, cfg.min_samples),
            store_id: snapshot.store.id.clone(),
            sku: Some(sku.clone()),
            negotiation_id: None,
            description: format!("{sku}: {}", reasons.join("; ")),
        });
    }
    out
}

/// Delivery: projected duration overrunning the pinned route's estimate.
pub fn detect_delivery_delays(
    snapshot: &StoreSnapshot,
    signals: &StoreSignals,
    cfg: &DetectorConfig,
) -> Vec<Finding> {
    let mut out = Vec::new();
    for report in &signals.deliveries {
        if report.estimated_duration_min <= f64::EPSILON {
            continue;
        }
        let overrun = report.projected_duration_min / report.estimated_duration_min - 1.0;
        if overrun <= cfg.delivery_margin {
            continue;
        }
        let ratio = overrun / cfg.delivery_margin;
        out.push(Finding {
            anomaly_type: AnomalyType::Delivery,
            severity: Severity::from_excess(ratio),
            confidence: confidence(ratio, cfg.min_samples * 2, cfg.min_samples),
            store_id: snapshot.store.id.clone(),
            sku: Some(report.sku.clone()),
            negotiation_id: Some(report.negotiation_id),
            description: format!(
                "route {} for transfer {} is {:.0} minutes behind schedule ({:.0} projected vs {:.0} estimated)",
                report.route_id,
                report.negotiation_id,
                report.projected_duration_min - report.estimated_duration_min,
                report.projected_duration_min,
                report.estimated_duration_min
            ),
        });
    }
    out
}

/// Transaction counts for consecutive windows ending at `window_start`,
/// newest first, from the first observed transaction up to `lookback` windows.
fn window_counts(
    txs: &[&Transaction],
    window_start: DateTime<Utc>,
    window: Duration,
    lookback: usize,
) -> Vec<f64> {
    let Some(first) = txs.iter().map(|t| t.at).filter(|at| *at <= window_start).min() else {
        return Vec::new();
    };
    let spanned = ((window_start - first).num_seconds() / window.num_seconds().max(1)) as usize + 1;
    let n = spanned.min(lookback);
    let mut counts = vec![0.0; n];
    for t in txs.iter().filter(|t| t.at <= window_start) {
        let idx = ((window_start - t.at).num_seconds() / window.num_seconds().max(1)) as usize;
        if idx < n {
            counts[idx] += 1.0;
        }
    }
    counts
}

/// Confidence in [0, 1]: grows with how far past the threshold the signal
/// is (`ratio` >= 1) and with the amount of baseline data.
pub fn confidence(ratio: f64, samples: usize, min_samples: usize) -> f64 {
    let strength = 1.0 - 0.5 / ratio.max(1.0);
    let support = (samples as f64 / (2 * min_samples.max(1)) as f64).min(1.0);
    (strength * (0.75 + 0.25 * support)).clamp(0.0, 1.0)
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / (xs.len() as f64)
}

/// Sample standard deviation (n-1), deterministic.
fn stddev_sample(xs: &[f64], mean: f64) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let var = xs
        .iter()
        .map(|x| {
            let d = x - mean;
            d * d
        })
        .sum::<f64>()
        / ((xs.len() - 1) as f64);
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use proptest::prelude::*;
    use wgrid_core::{GeoPoint, NegotiationId, RouteId, StoreId};
    use wgrid_inventory::{Category, InventoryItem, StockMovement, Store};

    use crate::signals::{DeliveryReport, SpoilageObservation};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap()
    }

    fn sku(s: &str) -> Sku {
        Sku::new(s).unwrap()
    }

    fn snapshot(items: Vec<(&str, u64, u32)>, movements: Vec<(&str, Vec<StockMovement>)>) -> StoreSnapshot {
        let store_id = StoreId::new("andheri").unwrap();
        StoreSnapshot {
            store: Store::new(
                store_id.clone(),
                "Andheri Store",
                GeoPoint::new(19.1136, 72.8697).unwrap(),
                "mumbai-west",
            ),
            items: items
                .into_iter()
                .map(|(s, q, expiry)| InventoryItem {
                    store_id: store_id.clone(),
                    sku: sku(s),
                    category: Category::Groceries,
                    quantity: q,
                    reorder_level: 50,
                    expiry_horizon_days: expiry,
                })
                .collect(),
            movements: movements.into_iter().map(|(s, m)| (sku(s), m)).collect(),
            taken_at: t0(),
        }
    }

    fn sale(minutes_ago: i64, units: i64) -> StockMovement {
        StockMovement {
            delta: -units,
            quantity_after: 0,
            reason: MovementReason::Adjustment,
            at: t0() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn flags_depletion_above_twice_trailing_average() {
        // Trailing: 10 units per 2h window over ~10h; recent: 48 units.
        let mut moves: Vec<StockMovement> = (1..=5).map(|w| sale(120 * w + 30, 10)).collect();
        moves.push(sale(30, 48));
        let snap = snapshot(vec![("Bread", 72, 3)], vec![("Bread", moves)]);

        let findings = detect_depletion(&snap, &DetectorConfig::default());
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.anomaly_type, AnomalyType::Inventory);
        assert_eq!(f.sku, Some(sku("Bread")));
        assert!(f.severity >= Severity::Medium);
        assert!(f.confidence > 0.5 && f.confidence <= 1.0);
    }

    #[test]
    fn normal_depletion_is_quiet() {
        let mut moves: Vec<StockMovement> = (1..=5).map(|w| sale(120 * w + 30, 10)).collect();
        moves.push(sale(30, 12));
        let snap = snapshot(vec![("Bread", 72, 3)], vec![("Bread", moves)]);
        assert!(detect_depletion(&snap, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn transfers_do_not_count_as_depletion() {
        let mut moves: Vec<StockMovement> = (1..=5).map(|w| sale(120 * w + 30, 10)).collect();
        moves.push(StockMovement {
            delta: -80,
            quantity_after: 20,
            reason: MovementReason::TransferOut,
            at: t0() - Duration::minutes(10),
        });
        let snap = snapshot(vec![("Bread", 20, 3)], vec![("Bread", moves)]);
        assert!(detect_depletion(&snap, &DetectorConfig::default()).is_empty());
    }

    fn spoil(minutes_ago: i64, spoiled: u64) -> SpoilageObservation {
        SpoilageObservation {
            sku: sku("Milk"),
            units_spoiled: spoiled,
            units_handled: 100,
            at: t0() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn flags_spoilage_twenty_percent_over_average() {
        let snap = snapshot(vec![("Milk", 80, 2)], vec![]);
        let signals = StoreSignals {
            spoilage: vec![spoil(500, 4), spoil(400, 4), spoil(300, 4), spoil(200, 4), spoil(10, 5)],
            ..Default::default()
        };
        let findings = detect_spoilage(&snap, &signals, &DetectorConfig::default());
        assert_eq!(findings.len(), 1);
        assert!(findings[0].description.contains("25% higher"));

        let calm = StoreSignals {
            spoilage: vec![spoil(500, 4), spoil(400, 4), spoil(300, 4), spoil(200, 4), spoil(10, 4)],
            ..Default::default()
        };
        assert!(detect_spoilage(&snap, &calm, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn non_perishables_are_not_checked_for_spoilage() {
        let snap = snapshot(vec![("Milk", 80, 365)], vec![]);
        let signals = StoreSignals {
            spoilage: vec![spoil(500, 1), spoil(400, 1), spoil(300, 1), spoil(200, 1), spoil(10, 9)],
            ..Default::default()
        };
        assert!(detect_spoilage(&snap, &signals, &DetectorConfig::default()).is_empty());
    }

    fn tx(s: &str, at: DateTime<Utc>, value: f64) -> Transaction {
        Transaction {
            sku: sku(s),
            units: 1,
            value,
            at,
        }
    }

    #[test]
    fn flags_value_outlier() {
        let snap = snapshot(vec![("iPhone", 15, 1095)], vec![]);
        let mut txs: Vec<Transaction> = [990.0, 1010.0, 1000.0, 995.0, 1005.0]
            .iter()
            .enumerate()
            .map(|(i, v)| tx("iPhone", t0() - Duration::hours(30 - i as i64), *v))
            .collect();
        txs.push(tx("iPhone", t0() - Duration::minutes(5), 9_000.0));
        let signals = StoreSignals {
            transactions: txs,
            ..Default::default()
        };
        let findings = detect_fraud(&snap, &signals, &DetectorConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert!(findings[0].description.contains("standard deviations"));
    }

    #[test]
    fn flags_off_hours_activity_and_escalates_with_outlier() {
        let snap = StoreSnapshot {
            taken_at: Utc.with_ymd_and_hms(2026, 3, 1, 3, 0, 0).unwrap(),
            ..snapshot(vec![("iPhone", 15, 1095)], vec![])
        };
        let night = Utc.with_ymd_and_hms(2026, 3, 1, 2, 30, 0).unwrap();
        let signals = StoreSignals {
            transactions: vec![tx("iPhone", night, 1000.0)],
            ..Default::default()
        };
        let findings = detect_fraud(&snap, &signals, &DetectorConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert!(findings[0].description.contains("outside business hours"));
    }

    #[test]
    fn stale_transactions_are_ignored() {
        let snap = snapshot(vec![("iPhone", 15, 1095)], vec![]);
        let night = Utc.with_ymd_and_hms(2026, 2, 27, 2, 0, 0).unwrap();
        let signals = StoreSignals {
            transactions: vec![tx("iPhone", night, 1000.0)],
            ..Default::default()
        };
        assert!(detect_fraud(&snap, &signals, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn flags_delivery_over_margin_only() {
        let snap = snapshot(vec![("Milk", 80, 2)], vec![]);
        let report = |projected: f64| DeliveryReport {
            negotiation_id: NegotiationId::new(),
            route_id: RouteId::derive(&["andheri", "ev-1"]),
            sku: sku("Milk"),
            estimated_duration_min: 60.0,
            projected_duration_min: projected,
            reported_at: t0(),
        };
        let signals = StoreSignals {
            deliveries: vec![report(85.0), report(66.0)],
            ..Default::default()
        };
        let findings = detect_delivery_delays(&snap, &signals, &DetectorConfig::default());
        assert_eq!(findings.len(), 1);
        assert!(findings[0].description.contains("25 minutes behind"));
    }

    #[test]
    fn detect_orders_by_severity_then_confidence() {
        let mut moves: Vec<StockMovement> = (1..=5).map(|w| sale(120 * w + 30, 10)).collect();
        moves.push(sale(30, 45));
        let snap = snapshot(vec![("Bread", 72, 3), ("Milk", 80, 2)], vec![("Bread", moves)]);
        let signals = StoreSignals {
            deliveries: vec![DeliveryReport {
                negotiation_id: NegotiationId::new(),
                route_id: RouteId::derive(&["x"]),
                sku: sku("Milk"),
                estimated_duration_min: 30.0,
                projected_duration_min: 60.0,
                reported_at: t0(),
            }],
            ..Default::default()
        };
        let findings = detect(&snap, &signals, &DetectorConfig::default());
        assert_eq!(findings.len(), 2);
        for pair in findings.windows(2) {
            assert!(
                pair[0].severity > pair[1].severity
                    || (pair[0].severity == pair[1].severity
                        && pair[0].confidence >= pair[1].confidence)
            );
        }
    }

    #[test]
    fn config_rejects_weak_depletion_multiple() {
        let cfg = DetectorConfig {
            depletion_multiple: 1.5,
            ..DetectorConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(DetectorConfig::default().validate().is_ok());
    }

    proptest! {
        #[test]
        fn confidence_stays_in_unit_interval(ratio in 0.0f64..1e6, samples in 0usize..1000, min in 0usize..50) {
            let c = confidence(ratio, samples, min);
            prop_assert!((0.0..=1.0).contains(&c));
        }
    }
}
