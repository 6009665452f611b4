use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wgrid_core::{AnomalyId, NegotiationId, Sku, StoreId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyType {
    Inventory,
    Spoilage,
    Fraud,
    Delivery,
}

impl AnomalyType {
    pub const ALL: [AnomalyType; 4] = [
        AnomalyType::Inventory,
        AnomalyType::Spoilage,
        AnomalyType::Fraud,
        AnomalyType::Delivery,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            AnomalyType::Inventory => "Unusual Stock Depletion",
            AnomalyType::Spoilage => "Perishable Item Spoilage Alert",
            AnomalyType::Fraud => "Suspicious Transaction Pattern",
            AnomalyType::Delivery => "Delivery Route Delay",
        }
    }

    /// Ordered playbook shown to operators.
    pub fn recommended_actions(&self) -> Vec<String> {
        let actions: &[&str] = match self {
            AnomalyType::Inventory => &[
                "Check POS system for bulk purchases",
                "Review inventory tracking logs",
                "Verify supplier delivery schedules",
                "Contact nearby stores for emergency stock",
            ],
            AnomalyType::Spoilage => &[
                "Check refrigeration unit temperature",
                "Review cold chain logistics",
                "Inspect product handling procedures",
                "Adjust inventory turnover strategy",
            ],
            AnomalyType::Fraud => &[
                "Review security camera footage",
                "Audit staff access logs",
                "Check transaction authentication",
                "Contact security personnel",
            ],
            AnomalyType::Delivery => &[
                "Notify customers of delay",
                "Reroute through alternative paths",
                "Update delivery time estimates",
                "Consider emergency backup vehicles",
            ],
        };
        actions.iter().map(|s| s.to_string()).collect()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map "how many times over threshold" (>= 1.0) to a severity band.
    pub fn from_excess(ratio: f64) -> Self {
        if ratio >= 3.0 {
            Severity::Critical
        } else if ratio >= 2.0 {
            Severity::High
        } else if ratio >= 1.5 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Open,
    Investigating,
    Resolved,
}

/// A detection before it is recorded in the anomaly book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub confidence: f64,
    pub store_id: StoreId,
    pub sku: Option<Sku>,
    /// The transfer a delivery finding is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negotiation_id: Option<NegotiationId>,
    pub description: String,
}

/// A recorded anomaly. Only the disposition fields change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: AnomalyId,
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub confidence: f64,
    pub title: String,
    pub description: String,
    pub store_id: StoreId,
    pub sku: Option<Sku>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negotiation_id: Option<NegotiationId>,
    pub recommended_actions: Vec<String>,
    pub detected_at: DateTime<Utc>,
    pub disposition: Disposition,
    pub resolution: Option<String>,
    pub disposed_at: Option<DateTime<Utc>>,
}

impl Anomaly {
    pub fn from_finding(finding: Finding, detected_at: DateTime<Utc>) -> Self {
        Self {
            id: AnomalyId::new(),
            anomaly_type: finding.anomaly_type,
            severity: finding.severity,
            confidence: finding.confidence.clamp(0.0, 1.0),
            title: finding.anomaly_type.title().to_string(),
            description: finding.description,
            store_id: finding.store_id,
            sku: finding.sku,
            negotiation_id: finding.negotiation_id,
            recommended_actions: finding.anomaly_type.recommended_actions(),
            detected_at,
            disposition: Disposition::Open,
            resolution: None,
            disposed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.disposition != Disposition::Resolved
    }
}

/// Severity descending, then confidence descending.
pub fn rank(a_severity: Severity, a_confidence: f64, b_severity: Severity, b_confidence: f64) -> core::cmp::Ordering {
    b_severity
        .cmp(&a_severity)
        .then_with(|| b_confidence.total_cmp(&a_confidence))
}
