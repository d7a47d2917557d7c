pub mod board;
pub mod portfolio;
pub mod settings;
pub mod setup;
pub mod ui;
pub mod widget;

use crate::core::backup::FileBackupStore;
use crate::core::config::AppConfig;
use crate::core::portfolio::PortfolioRepository;
use crate::core::{QuoteCache, WidgetUpdateOrchestrator};
use crate::providers::YahooFinanceProvider;
use crate::store::{SettingsCollection, SettingsStore};
use anyhow::Result;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Settings collection mirroring the quote cache between runs.
pub const QUOTES_COLLECTION: &str = "quotes";

/// Everything a command needs, built once per process.
pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<SettingsStore>,
    pub app: Arc<dyn SettingsCollection>,
    pub provider: Arc<YahooFinanceProvider>,
    pub portfolio: Arc<RwLock<PortfolioRepository>>,
    pub orchestrator: WidgetUpdateOrchestrator,
    pub backups: FileBackupStore,
}

impl AppContext {
    pub fn open(config: AppConfig) -> Result<Self> {
        let data_path = config.data_path()?;
        debug!("Using data directory {}", data_path.display());
        let store = Arc::new(SettingsStore::open(&data_path)?);
        let backups = FileBackupStore::new(data_path);
        Self::with_store(config, store, backups)
    }

    pub fn with_store(
        config: AppConfig,
        store: Arc<SettingsStore>,
        backups: FileBackupStore,
    ) -> Result<Self> {
        let app = store.app()?;
        let provider = Arc::new(YahooFinanceProvider::new(config.yahoo_base_url())?);
        let cache = QuoteCache::with_persistence(
            provider.clone(),
            store.collection(QUOTES_COLLECTION)?,
            config.cache.staleness(),
            config.cache.fetch_timeout(),
        );
        let portfolio = Arc::new(RwLock::new(PortfolioRepository::load(app.clone())));
        let orchestrator = WidgetUpdateOrchestrator::new(store.clone(), cache, portfolio.clone())?;

        Ok(Self {
            config,
            store,
            app,
            provider,
            portfolio,
            orchestrator,
            backups,
        })
    }

    pub fn portfolio(&self) -> RwLockReadGuard<'_, PortfolioRepository> {
        self.portfolio.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn portfolio_mut(&self) -> RwLockWriteGuard<'_, PortfolioRepository> {
        self.portfolio.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Fails unless `id` is a registered widget.
    pub fn ensure_widget(&self, id: u32) -> Result<()> {
        anyhow::ensure!(
            self.orchestrator.registry().contains(id),
            "No widget with id {id}. Use `stockboard widget list` to see placed widgets."
        );
        Ok(())
    }
}
