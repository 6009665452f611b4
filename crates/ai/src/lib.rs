//! `wgrid-ai`
//!
//! **Responsibility:** anomaly detection over store snapshots and operational
//! signals.
//!
//! - Detectors are pure: they read a [`StoreSnapshot`](wgrid_inventory::StoreSnapshot)
//!   and [`StoreSignals`] and return findings.
//! - Nothing here mutates inventory. Findings become [`Anomaly`] records in the
//!   [`AnomalyBook`], which owns their disposition.

pub mod book;
pub mod detect;
pub mod job;
pub mod model;
pub mod result;
pub mod scheduler;
pub mod signals;

pub use book::{AnomalyBook, AnomalyTrends, TypeCount, DEFAULT_COOLDOWN_MINUTES, DEFAULT_RETENTION_HOURS};
pub use detect::{detect, DetectorConfig};
pub use job::{AiJob, AnomalyScanJob, ScanInput};
pub use model::{rank, Anomaly, AnomalyType, Disposition, Finding, Severity};
pub use result::{AiError, ScanReport};
pub use scheduler::{AiScheduler, LocalAiScheduler, ScanScope};
pub use signals::{
    DeliveryReport, SignalLog, SpoilageObservation, StoreSignals, Transaction, DEFAULT_SIGNAL_LIMIT,
};
