//! Quote abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// Ticker identifier. Index symbols carry a leading `^`.
///
/// Equality is exact and case-sensitive. Ordering places index symbols before
/// everything else, then falls back to plain lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Symbol(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_index(&self) -> bool {
        self.0.starts_with('^')
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Symbol with any exchange suffix (`.L`, `.DE`, ...) removed.
    pub fn without_suffix(&self) -> &str {
        match self.0.find('.') {
            Some(idx) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .is_index()
            .cmp(&self.is_index())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol(s.to_string())
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol(s)
    }
}

/// A single market snapshot. Missing price or percent means "no data".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub change: Option<f64>,
    pub percent: Option<f64>,
    pub volume: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    pub fn has_data(&self) -> bool {
        self.price.is_some() && self.percent.is_some()
    }
}

/// Result of one provider call.
#[derive(Debug, Clone)]
pub struct QuoteBatch {
    pub quotes: HashMap<Symbol, Quote>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error("quote provider failed: {0}")]
    Provider(String),
    #[error("quote fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("quote fetch was abandoned before completing")]
    Abandoned,
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetches quotes for every symbol in one call. Symbols the source does
    /// not know may be omitted from the batch.
    async fn fetch_quotes(&self, symbols: &[Symbol]) -> Result<QuoteBatch>;
}

#[async_trait]
pub trait DescriptionProvider: Send + Sync {
    async fn describe(&self, symbol: &Symbol) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_symbols_sort_first() {
        let mut symbols: Vec<Symbol> = ["MSFT", "^FTSE", "AAPL", "^DJI", "BP.L"]
            .into_iter()
            .map(Symbol::from)
            .collect();
        symbols.sort();
        let sorted: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
        assert_eq!(sorted, vec!["^DJI", "^FTSE", "AAPL", "BP.L", "MSFT"]);
    }

    #[test]
    fn test_symbol_equality_is_case_sensitive() {
        assert_ne!(Symbol::from("aapl"), Symbol::from("AAPL"));
        assert_eq!(Symbol::from("BP.L").without_suffix(), "BP");
        assert_eq!(Symbol::from("^DJI").without_suffix(), "^DJI");
    }
}
