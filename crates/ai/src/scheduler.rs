use std::collections::BTreeSet;

use wgrid_core::StoreId;

use crate::job::AiJob;
use crate::result::{AiError, ScanReport};

/// Store scope for execution.
///
/// - `Any`: run jobs for any store (shared background worker).
/// - `Stores`: only accept jobs for the listed stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanScope {
    Any,
    Stores(BTreeSet<StoreId>),
}

impl ScanScope {
    pub fn single(store_id: StoreId) -> Self {
        ScanScope::Stores(BTreeSet::from([store_id]))
    }

    pub fn allows(&self, store_id: &StoreId) -> bool {
        match self {
            ScanScope::Any => true,
            ScanScope::Stores(set) => set.contains(store_id),
        }
    }
}

/// Scheduler/executor for detection jobs.
pub trait AiScheduler: Send + Sync + 'static {
    fn scope(&self) -> &ScanScope;

    fn run<J: AiJob>(&self, job: J) -> Result<ScanReport, AiError> {
        if !self.scope().allows(job.store_id()) {
            return Err(AiError::ScopeViolation(format!(
                "store {} is not allowed by this scheduler",
                job.store_id()
            )));
        }
        job.run()
    }
}

/// Synchronous scheduler that runs jobs immediately in-process.
#[derive(Debug, Clone)]
pub struct LocalAiScheduler {
    scope: ScanScope,
}

impl LocalAiScheduler {
    pub fn new(scope: ScanScope) -> Self {
        Self { scope }
    }

    pub fn for_store(store_id: StoreId) -> Self {
        Self::new(ScanScope::single(store_id))
    }
}

impl AiScheduler for LocalAiScheduler {
    fn scope(&self) -> &ScanScope {
        &self.scope
    }
}
