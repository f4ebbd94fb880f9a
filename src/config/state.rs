// Application state module
// Shared collaborators handed to every request

use config::ConfigError;
use std::sync::Arc;

use super::types::Config;
use crate::cases::{dates, CaseStore};
use crate::chart::ChartRenderer;
use crate::logger::Logger;

/// Application state
pub struct AppState {
    pub config: Config,
    pub logger: Arc<Logger>,
    pub store: CaseStore,
    pub charts: ChartRenderer,
    /// Dates offered on the search page, canonical `YYYY-MM-DD`
    pub dates: Vec<String>,
}

impl AppState {
    pub fn new(config: Config, logger: Arc<Logger>) -> Result<Self, ConfigError> {
        let (start, end) = config.date_range()?;
        let store = CaseStore::new(&config.data, Arc::clone(&logger));
        let charts = ChartRenderer::new(&config.charts);

        Ok(Self {
            dates: dates::date_range(start, end),
            store,
            charts,
            logger,
            config,
        })
    }
}
