//! Portfolio holdings owned by one repository per process.

use crate::core::holding::{HoldingRecord, holdings_from_json, holdings_to_json};
use crate::core::quote::{Quote, Symbol};
use crate::core::valuation::valuate;
use crate::store::SettingsCollection;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

pub const KEY_PORTFOLIO: &str = "portfolioJson";

const MISSING: &str = "-";

pub type HoldingsSnapshot = Arc<BTreeMap<Symbol, HoldingRecord>>;

/// One line of the portfolio summary listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioLine {
    pub symbol: Symbol,
    pub name: String,
    pub price: String,
    pub buy_price: String,
    pub buy_date: String,
    pub limit_high: String,
    pub limit_low: String,
    pub quantity: String,
    /// `<daily %> / <P/L daily>`
    pub last_change: String,
    /// `<total %> / <P/L total>`
    pub total_change: String,
    pub value: String,
}

pub struct PortfolioRepository {
    settings: Arc<dyn SettingsCollection>,
    holdings: BTreeMap<Symbol, HoldingRecord>,
    dirty: bool,
}

impl PortfolioRepository {
    /// Loads the stored portfolio. A malformed document is logged and treated
    /// as empty.
    pub fn load(settings: Arc<dyn SettingsCollection>) -> Self {
        let holdings = match settings.get_string(KEY_PORTFOLIO) {
            Some(raw) if !raw.trim().is_empty() => holdings_from_json(&raw).unwrap_or_else(|e| {
                warn!("Ignoring malformed stored portfolio: {e}");
                BTreeMap::new()
            }),
            _ => BTreeMap::new(),
        };
        debug!(holdings = holdings.len(), "Loaded portfolio");
        Self {
            settings,
            holdings,
            dirty: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&HoldingRecord> {
        self.holdings.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Immutable copy of the non-empty holdings, taken at the start of a
    /// cycle.
    pub fn snapshot(&self) -> HoldingsSnapshot {
        Arc::new(
            self.holdings
                .iter()
                .filter(|(_, h)| !h.is_empty())
                .map(|(s, h)| (s.clone(), h.clone()))
                .collect(),
        )
    }

    pub fn upsert(&mut self, holding: HoldingRecord) {
        self.holdings.insert(holding.symbol.clone(), holding);
        self.dirty = true;
    }

    pub fn remove(&mut self, symbol: &Symbol) -> bool {
        let removed = self.holdings.remove(symbol).is_some();
        self.dirty |= removed;
        removed
    }

    /// Drops holdings without a buy price that no widget shows any more.
    pub fn remove_unused(&mut self, widget_symbols: &BTreeSet<Symbol>) -> usize {
        let unused: Vec<Symbol> = self
            .holdings
            .values()
            .filter(|h| !h.has_buy_price() && !widget_symbols.contains(&h.symbol))
            .map(|h| h.symbol.clone())
            .collect();
        for symbol in &unused {
            self.holdings.remove(symbol);
        }
        if !unused.is_empty() {
            debug!(removed = unused.len(), "Removed unused holdings");
            self.dirty = true;
        }
        unused.len()
    }

    /// Replaces every holding named in `restored`, leaving others untouched,
    /// and persists the result. The repository is unchanged if the write
    /// fails.
    pub fn restore_matching(&mut self, restored: BTreeMap<Symbol, HoldingRecord>) -> Result<()> {
        let mut merged = self.holdings.clone();
        merged.extend(restored);
        self.write(&merged)?;
        self.holdings = merged;
        self.dirty = false;
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        holdings_to_json(self.holdings.values())
    }

    pub fn persist(&mut self) -> Result<()> {
        self.write(&self.holdings)?;
        self.dirty = false;
        Ok(())
    }

    fn write(&self, holdings: &BTreeMap<Symbol, HoldingRecord>) -> Result<()> {
        let json = holdings_to_json(holdings.values())?;
        self.settings
            .try_put(KEY_PORTFOLIO, Value::String(json))
            .context("Failed to store portfolio")?;
        debug!(holdings = holdings.len(), "Persisted portfolio");
        Ok(())
    }

    pub fn sorted_symbols(&self) -> Vec<Symbol> {
        // BTreeMap keys already follow the index-first ordering.
        self.holdings.keys().cloned().collect()
    }

    pub fn summaries(&self, quotes: &HashMap<Symbol, Quote>, now: DateTime<Utc>) -> Vec<PortfolioLine> {
        self.holdings
            .values()
            .map(|holding| summary_line(holding, quotes.get(&holding.symbol), now))
            .collect()
    }
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| MISSING.to_string())
}

fn number(value: Option<f64>, precision: usize, suffix: &str) -> String {
    match value {
        Some(v) => format!("{v:.precision$}{suffix}"),
        None => MISSING.to_string(),
    }
}

fn summary_line(holding: &HoldingRecord, quote: Option<&Quote>, now: DateTime<Utc>) -> PortfolioLine {
    let name = holding
        .custom_label
        .clone()
        .or_else(|| quote.and_then(|q| q.name.clone()))
        .unwrap_or_else(|| holding.symbol.to_string());

    let valuation = quote.map(|q| valuate(q, Some(holding), now)).unwrap_or_default();

    PortfolioLine {
        symbol: holding.symbol.clone(),
        name,
        price: number(quote.and_then(|q| q.price), 2, ""),
        buy_price: text(&holding.buy_price),
        buy_date: text(&holding.buy_date),
        limit_high: text(&holding.limit_high),
        limit_low: text(&holding.limit_low),
        quantity: text(&holding.quantity),
        last_change: format!(
            "{} / {}",
            number(valuation.daily_percent, 2, "%"),
            number(valuation.pl_daily_change, 0, "")
        ),
        total_change: format!(
            "{} / {}",
            number(valuation.total_percent, 1, "%"),
            number(valuation.pl_total_change, 0, "")
        ),
        value: number(valuation.holding_value, 0, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCollection;
    use chrono::TimeZone;

    fn holding(symbol: &str, price: Option<&str>) -> HoldingRecord {
        HoldingRecord {
            buy_price: price.map(str::to_string),
            quantity: Some("10".to_string()),
            buy_date: Some("2020-01-01".to_string()),
            ..HoldingRecord::new(Symbol::from(symbol))
        }
    }

    fn repository() -> PortfolioRepository {
        PortfolioRepository::load(Arc::new(MemoryCollection::new()))
    }

    #[test]
    fn test_persist_and_reload() {
        let settings: Arc<dyn SettingsCollection> = Arc::new(MemoryCollection::new());
        let mut repo = PortfolioRepository::load(settings.clone());
        repo.upsert(holding("AAPL", Some("100")));
        assert!(repo.is_dirty());

        repo.persist().unwrap();
        assert!(!repo.is_dirty());

        let reloaded = PortfolioRepository::load(settings);
        assert_eq!(reloaded.get(&Symbol::from("AAPL")), Some(&holding("AAPL", Some("100"))));
    }

    #[test]
    fn test_malformed_stored_portfolio_loads_empty() {
        let settings = Arc::new(MemoryCollection::new());
        settings.put_string(KEY_PORTFOLIO, "{broken");
        let repo = PortfolioRepository::load(settings);
        assert!(repo.is_empty());
    }

    #[test]
    fn test_remove_unused_keeps_priced_or_displayed_holdings() {
        let mut repo = repository();
        repo.upsert(holding("AAPL", Some("100")));
        repo.upsert(holding("MSFT", None));
        repo.upsert(holding("GOOG", None));
        repo.persist().unwrap();

        let on_widgets: BTreeSet<Symbol> = [Symbol::from("GOOG")].into_iter().collect();
        assert_eq!(repo.remove_unused(&on_widgets), 1);
        assert!(repo.is_dirty());
        assert_eq!(repo.sorted_symbols(), vec![Symbol::from("AAPL"), Symbol::from("GOOG")]);
    }

    #[test]
    fn test_sorted_symbols_put_indices_first() {
        let mut repo = repository();
        for symbol in ["MSFT", "^FTSE", "AAPL"] {
            repo.upsert(holding(symbol, Some("1")));
        }
        let sorted: Vec<String> = repo.sorted_symbols().iter().map(|s| s.to_string()).collect();
        assert_eq!(sorted, vec!["^FTSE", "AAPL", "MSFT"]);
    }

    #[test]
    fn test_summaries() {
        let mut repo = repository();
        repo.upsert(holding("AAPL", Some("100")));
        repo.upsert(holding("MSFT", Some("200")));

        let now = Utc.with_ymd_and_hms(2021, 12, 31, 0, 0, 0).unwrap();
        let quote = Quote {
            symbol: Symbol::from("AAPL"),
            name: Some("Apple Inc.".to_string()),
            price: Some(110.0),
            change: Some(2.0),
            percent: Some(1.85),
            volume: None,
            timestamp: now,
        };
        let quotes = HashMap::from([(Symbol::from("AAPL"), quote)]);

        let lines = repo.summaries(&quotes, now);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "Apple Inc.");
        assert_eq!(lines[0].price, "110.00");
        assert_eq!(lines[0].last_change, "1.85% / 20");
        assert_eq!(lines[0].total_change, "10.0% / 100");
        assert_eq!(lines[0].value, "1100");

        assert_eq!(lines[1].name, "MSFT");
        assert_eq!(lines[1].price, "-");
        assert_eq!(lines[1].total_change, "- / -");
    }
}
