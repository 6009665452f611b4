//! `wgrid-coordination` — the single entry point operators talk to.
//!
//! The facade composes the inventory ledger, anomaly detection, route
//! optimisation and the negotiation engine. Every call is authorized once,
//! up front, against the caller's capabilities and store scope.

pub mod config;
pub mod facade;
pub mod metrics;
pub mod scanner;
pub mod seed;

pub use config::EngineConfig;
pub use facade::CoordinationFacade;
pub use metrics::{
    DemandEstimate, EcoSummary, StoreMetrics, TransferSuggestion, MIN_DEMAND_CONFIDENCE,
};
pub use scanner::{AnomalyScanner, ScanTarget, ScannerHandle};
pub use seed::{SeedFile, SeedStore};
