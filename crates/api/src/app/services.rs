//! Service wiring: one coordination facade per process.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use wgrid_coordination::{CoordinationFacade, EngineConfig, SeedFile};
use wgrid_core::{Clock, SystemClock};

pub struct AppServices {
    facade: Arc<CoordinationFacade>,
}

impl AppServices {
    pub fn new(facade: Arc<CoordinationFacade>) -> Self {
        Self { facade }
    }

    pub fn facade(&self) -> &CoordinationFacade {
        &self.facade
    }

    pub fn facade_handle(&self) -> Arc<CoordinationFacade> {
        self.facade.clone()
    }
}

/// Build the facade on the wall clock and apply the seed file, if any.
pub fn build_services(config: &EngineConfig) -> anyhow::Result<AppServices> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let facade = CoordinationFacade::new(config, clock).context("invalid engine configuration")?;

    if let Some(path) = &config.seed_file {
        let seed = SeedFile::load(path)?;
        facade
            .provision(&seed)
            .with_context(|| format!("failed to apply seed file {}", path.display()))?;
        info!(path = %path.display(), "seed file applied");
    }

    Ok(AppServices::new(Arc::new(facade)))
}
