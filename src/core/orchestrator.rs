//! Per-widget update cycle: quotes, valuation, view rotation and layout.

use crate::core::cache::{QuoteCache, QuoteSource};
use crate::core::holding::HoldingRecord;
use crate::core::layout::{Footer, WidgetDisplay, footer_timestamp, format_row};
use crate::core::portfolio::{HoldingsSnapshot, PortfolioRepository};
use crate::core::quote::{Quote, Symbol};
use crate::core::schedule::{CycleMode, write_last_update};
use crate::core::valuation::valuate;
use crate::core::views::ViewRotation;
use crate::core::widget::{WidgetRegistry, WidgetSettings};
use crate::store::{SettingsCollection, SettingsStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, instrument, warn};

/// What caused a widget update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTrigger {
    /// Scheduled or manual refresh inside the update window.
    Refresh { force: bool },
    /// Scheduled refresh outside the update window.
    CacheOnly,
    /// User asked for the next view.
    Advance,
}

impl UpdateTrigger {
    pub fn from_mode(mode: CycleMode, force: bool) -> Self {
        match mode {
            CycleMode::FullRefresh => UpdateTrigger::Refresh { force },
            CycleMode::CacheOnly => UpdateTrigger::CacheOnly,
        }
    }

    fn is_cache_backed(self) -> bool {
        matches!(self, UpdateTrigger::CacheOnly | UpdateTrigger::Advance)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetOutcome {
    Displayed(WidgetDisplay),
    /// Nothing to rotate through; the previous display stays as it is.
    Skipped,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub displays: Vec<WidgetDisplay>,
    pub skipped: Vec<u32>,
    pub failures: Vec<(u32, String)>,
}

pub struct WidgetUpdateOrchestrator {
    store: Arc<SettingsStore>,
    app: Arc<dyn SettingsCollection>,
    registry: WidgetRegistry,
    cache: QuoteCache,
    portfolio: Arc<RwLock<PortfolioRepository>>,
}

impl WidgetUpdateOrchestrator {
    pub fn new(
        store: Arc<SettingsStore>,
        cache: QuoteCache,
        portfolio: Arc<RwLock<PortfolioRepository>>,
    ) -> Result<Self> {
        let app = store.app()?;
        Ok(Self {
            registry: WidgetRegistry::new(app.clone()),
            store,
            app,
            cache,
            portfolio,
        })
    }

    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    pub fn widget(&self, id: u32) -> Result<WidgetSettings> {
        let settings = self
            .store
            .widget(id)
            .with_context(|| format!("Failed to open settings for widget {id}"))?;
        Ok(WidgetSettings::new(id, settings))
    }

    fn snapshot(&self) -> HoldingsSnapshot {
        self.portfolio
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }

    /// Symbols shown on any registered widget.
    pub fn widget_symbols(&self) -> Result<BTreeSet<Symbol>> {
        let mut symbols = BTreeSet::new();
        for id in self.registry.ids() {
            symbols.extend(self.widget(id)?.symbols());
        }
        Ok(symbols)
    }

    /// Drops cached quotes whose symbol set no registered widget uses.
    pub async fn prune_cache(&self) -> Result<usize> {
        let mut live = Vec::new();
        for id in self.registry.ids() {
            live.push(self.widget(id)?.symbols().into_iter().collect::<BTreeSet<_>>());
        }
        Ok(self.cache.retain_related(&live).await)
    }

    /// Updates every registered widget concurrently, then records the cycle
    /// time.
    pub async fn run_cycle(&self, mode: CycleMode, force: bool) -> CycleReport {
        let trigger = UpdateTrigger::from_mode(mode, force);
        let holdings = self.snapshot();
        let ids = self.registry.ids();
        info!(widgets = ids.len(), ?trigger, "Starting update cycle");

        let results = join_all(
            ids.iter()
                .map(|id| self.update_widget(*id, trigger, holdings.clone())),
        )
        .await;

        let mut report = CycleReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(WidgetOutcome::Displayed(display)) => report.displays.push(display),
                Ok(WidgetOutcome::Skipped) => report.skipped.push(id),
                Err(e) => {
                    warn!("Widget {id} update failed: {e:#}");
                    report.failures.push((id, format!("{e:#}")));
                }
            }
        }

        write_last_update(self.app.as_ref(), Local::now());
        report
    }

    /// Moves one widget to its next enabled view and redraws it from cache.
    pub async fn advance(&self, id: u32) -> Result<WidgetOutcome> {
        anyhow::ensure!(self.registry.contains(id), "No widget with id {id}");
        self.update_widget(id, UpdateTrigger::Advance, self.snapshot())
            .await
    }

    #[instrument(skip(self, holdings))]
    pub async fn update_widget(
        &self,
        id: u32,
        trigger: UpdateTrigger,
        holdings: HoldingsSnapshot,
    ) -> Result<WidgetOutcome> {
        let widget = self.widget(id)?;
        let size = widget.size();
        let symbols = widget.symbols();

        let widget_holdings: BTreeMap<&Symbol, &HoldingRecord> = symbols
            .iter()
            .filter_map(|symbol| holdings.get_key_value(symbol))
            .collect();
        let has_portfolio = !widget_holdings.is_empty();
        let enabled = widget.enabled_views(has_portfolio);

        if trigger.is_cache_backed() && !has_portfolio && !enabled.has_default_pair() {
            debug!("No views to rotate through, skipping update");
            return Ok(WidgetOutcome::Skipped);
        }

        let mut rotation = ViewRotation::new(widget.view());
        let outcome = match trigger {
            UpdateTrigger::Advance => rotation.advance(&enabled),
            _ => rotation.revalidate(&enabled),
        };
        if outcome.changed {
            widget.set_view(outcome.view);
        }

        let (quotes, fetched_at, source) = self.quotes_for(&symbols, trigger).await?;

        let now = Utc::now();
        let options = widget.row_options();
        let rows = symbols
            .iter()
            .map(|symbol| {
                let quote = quotes.get(symbol);
                let holding = widget_holdings.get(symbol).copied();
                let valuation = quote.map(|q| valuate(q, holding, now));
                format_row(
                    symbol,
                    quote,
                    holding,
                    valuation.as_ref(),
                    outcome.view,
                    size,
                    options,
                )
            })
            .collect();

        let footer = Footer {
            timestamp: footer_timestamp(fetched_at.map(|t| t.with_timezone(&Local)), Local::now()),
            view_label: outcome.view.label(size.is_narrow()).to_string(),
        };
        debug!(view = %outcome.view, ?source, "Widget updated");

        Ok(WidgetOutcome::Displayed(WidgetDisplay {
            widget_id: id,
            size,
            view: outcome.view,
            rows,
            footer,
            source,
        }))
    }

    async fn quotes_for(
        &self,
        symbols: &[Symbol],
        trigger: UpdateTrigger,
    ) -> Result<(HashMap<Symbol, Quote>, Option<DateTime<Utc>>, QuoteSource)> {
        match trigger {
            UpdateTrigger::Refresh { force } => match self.cache.get_quotes(symbols, force).await {
                Ok(cached) => Ok((cached.quotes, Some(cached.fetched_at), cached.source)),
                Err(e) => {
                    warn!("No quotes available, showing no data: {e}");
                    Ok((HashMap::new(), None, QuoteSource::Unavailable))
                }
            },
            UpdateTrigger::CacheOnly | UpdateTrigger::Advance => match self.cache.peek(symbols).await {
                Some(cached) => Ok((cached.quotes, Some(cached.fetched_at), cached.source)),
                None => {
                    debug!("Nothing cached for this widget yet");
                    Ok((HashMap::new(), None, QuoteSource::Cache))
                }
            },
        }
    }
}
