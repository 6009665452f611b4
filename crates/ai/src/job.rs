use wgrid_core::StoreId;
use wgrid_inventory::StoreSnapshot;

use crate::detect::{detect, DetectorConfig};
use crate::result::{AiError, ScanReport};
use crate::signals::StoreSignals;

/// A store-scoped detection unit.
///
/// Inputs are provided by callers; jobs never read or mutate inventory.
pub trait AiJob: Send + Sync + 'static {
    type Input: Send + Sync + 'static;

    /// The store this job belongs to.
    fn store_id(&self) -> &StoreId;

    fn input(&self) -> &Self::Input;

    /// Execute detection over the input.
    fn run(&self) -> Result<ScanReport, AiError>;
}

/// Point-in-time inputs for one store.
#[derive(Debug, Clone)]
pub struct ScanInput {
    pub snapshot: StoreSnapshot,
    pub signals: StoreSignals,
}

/// Runs all four detectors over one store.
#[derive(Debug, Clone)]
pub struct AnomalyScanJob {
    input: ScanInput,
    config: DetectorConfig,
}

impl AnomalyScanJob {
    pub fn new(snapshot: StoreSnapshot, signals: StoreSignals) -> Self {
        Self {
            input: ScanInput { snapshot, signals },
            config: DetectorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }
}

impl AiJob for AnomalyScanJob {
    type Input = ScanInput;

    fn store_id(&self) -> &StoreId {
        &self.input.snapshot.store.id
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<ScanReport, AiError> {
        self.config.validate().map_err(AiError::InvalidInput)?;

        let findings = detect(&self.input.snapshot, &self.input.signals, &self.config);
        if let Some(foreign) = findings.iter().find(|f| &f.store_id != self.store_id()) {
            return Err(AiError::Internal(format!(
                "detector produced a finding for foreign store {}",
                foreign.store_id
            )));
        }

        Ok(ScanReport {
            store_id: self.store_id().clone(),
            scanned_at: self.input.snapshot.taken_at,
            items_scanned: self.input.snapshot.items.len(),
            findings,
        })
    }
}
