//! Quote cache keyed by requested symbol set.
//!
//! An entry is served while it is younger than the staleness threshold. Fetches
//! run on their own task. A caller whose request overlaps fetches already in
//! flight joins them and only fetches the symbols none of them cover, so each
//! symbol is requested at most once at a time.

use crate::core::quote::{Quote, QuoteBatch, QuoteError, QuoteProvider, Symbol};
use crate::store::SettingsCollection;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

type SymbolSet = BTreeSet<Symbol>;
type FetchResult = Result<Arc<QuoteBatch>, QuoteError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuoteSource {
    /// Fetched from the provider for this request.
    Fresh,
    /// Served from a cache entry inside the staleness window.
    Cache,
    /// The provider failed and an older entry was served instead.
    StaleFallback,
    /// The provider failed and nothing was cached.
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct CachedQuotes {
    pub quotes: HashMap<Symbol, Quote>,
    pub fetched_at: DateTime<Utc>,
    pub source: QuoteSource,
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    symbols: SymbolSet,
    quotes: HashMap<Symbol, Quote>,
    fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    fn covers(&self, requested: &SymbolSet) -> bool {
        self.symbols.is_superset(requested)
    }

    fn restricted_to(&self, requested: &SymbolSet, source: QuoteSource) -> CachedQuotes {
        CachedQuotes {
            quotes: restrict(&self.quotes, requested),
            fetched_at: self.fetched_at,
            source,
        }
    }
}

fn restrict(quotes: &HashMap<Symbol, Quote>, requested: &SymbolSet) -> HashMap<Symbol, Quote> {
    quotes
        .iter()
        .filter(|(symbol, _)| requested.contains(*symbol))
        .map(|(symbol, quote)| (symbol.clone(), quote.clone()))
        .collect()
}

struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<SymbolSet, CacheEntry>,
    in_flight: HashMap<SymbolSet, InFlight>,
    next_fetch_id: u64,
}

impl CacheState {
    /// Most recent entry covering `requested`, optionally requiring it to be
    /// younger than `max_age`.
    fn best_entry(
        &self,
        requested: &SymbolSet,
        now: DateTime<Utc>,
        max_age: Option<Duration>,
    ) -> Option<&CacheEntry> {
        self.entries
            .values()
            .filter(|entry| entry.covers(requested))
            .filter(|entry| match max_age {
                Some(max_age) => is_younger_than(entry.fetched_at, now, max_age),
                None => true,
            })
            .max_by_key(|entry| entry.fetched_at)
    }
}

fn entry_key(symbols: &SymbolSet) -> String {
    symbols
        .iter()
        .map(Symbol::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn persist_entry(collection: &dyn SettingsCollection, entry: &CacheEntry) {
    let stored = serde_json::to_value(entry)
        .map_err(anyhow::Error::from)
        .and_then(|value| collection.try_put(&entry_key(&entry.symbols), value));
    if let Err(e) = stored {
        warn!("Failed to persist cache entry: {e:#}");
    }
}

fn install_entry(
    state: &mut CacheState,
    persistence: Option<&Arc<dyn SettingsCollection>>,
    entry: CacheEntry,
) {
    if let Some(collection) = persistence {
        persist_entry(collection.as_ref(), &entry);
    }
    state.entries.insert(entry.symbols.clone(), entry);
}

fn load_entries(collection: &dyn SettingsCollection) -> HashMap<SymbolSet, CacheEntry> {
    collection
        .keys()
        .into_iter()
        .filter_map(|key| {
            let value = collection.get(&key)?;
            match serde_json::from_value::<CacheEntry>(value) {
                Ok(entry) => Some((entry.symbols.clone(), entry)),
                Err(e) => {
                    warn!("Dropping unreadable cache entry {key}: {e}");
                    collection.remove(&key);
                    None
                }
            }
        })
        .collect()
}

fn is_younger_than(fetched_at: DateTime<Utc>, now: DateTime<Utc>, max_age: Duration) -> bool {
    match (now - fetched_at).to_std() {
        Ok(age) => age < max_age,
        // Fetched "in the future" (clock adjusted backwards): treat as fresh.
        Err(_) => true,
    }
}

#[derive(Clone)]
pub struct QuoteCache {
    provider: Arc<dyn QuoteProvider>,
    state: Arc<Mutex<CacheState>>,
    persistence: Option<Arc<dyn SettingsCollection>>,
    staleness: Duration,
    fetch_timeout: Duration,
}

impl QuoteCache {
    pub fn new(provider: Arc<dyn QuoteProvider>, staleness: Duration, fetch_timeout: Duration) -> Self {
        Self {
            provider,
            state: Arc::new(Mutex::new(CacheState::default())),
            persistence: None,
            staleness,
            fetch_timeout,
        }
    }

    /// Mirrors entries into `collection` and seeds the cache from it, so
    /// quotes survive across processes.
    pub fn with_persistence(
        provider: Arc<dyn QuoteProvider>,
        collection: Arc<dyn SettingsCollection>,
        staleness: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        let entries = load_entries(collection.as_ref());
        debug!(entries = entries.len(), "Loaded persisted quote cache");
        Self {
            provider,
            state: Arc::new(Mutex::new(CacheState {
                entries,
                ..CacheState::default()
            })),
            persistence: Some(collection),
            staleness,
            fetch_timeout,
        }
    }

    /// Latest entry covering `symbols`, however old, without contacting the
    /// provider.
    pub async fn peek(&self, symbols: &[Symbol]) -> Option<CachedQuotes> {
        let requested: SymbolSet = symbols.iter().cloned().collect();
        let state = self.state.lock().await;
        state
            .best_entry(&requested, Utc::now(), None)
            .map(|entry| entry.restricted_to(&requested, QuoteSource::Cache))
    }

    pub async fn get_quotes(
        &self,
        symbols: &[Symbol],
        force_refresh: bool,
    ) -> Result<CachedQuotes, QuoteError> {
        let requested: SymbolSet = symbols.iter().cloned().collect();

        let fetches = {
            let mut state = self.state.lock().await;
            if !force_refresh {
                if let Some(entry) = state.best_entry(&requested, Utc::now(), Some(self.staleness)) {
                    debug!(symbols = requested.len(), "Cache HIT");
                    return Ok(entry.restricted_to(&requested, QuoteSource::Cache));
                }
                debug!(symbols = requested.len(), "Cache MISS");
            }
            self.plan_fetches(&mut state, &requested)
        };
        let parts = fetches.len();

        let mut quotes = HashMap::new();
        let mut fetched_at: Option<DateTime<Utc>> = None;
        let mut failure = None;
        for result in join_all(fetches).await {
            match result {
                Ok(batch) => {
                    quotes.extend(restrict(&batch.quotes, &requested));
                    fetched_at = Some(fetched_at.map_or(batch.fetched_at, |t| t.min(batch.fetched_at)));
                }
                Err(e) => failure = Some(e),
            }
        }

        let mut state = self.state.lock().await;
        match (failure, fetched_at) {
            (None, fetched_at) => {
                let fetched_at = fetched_at.unwrap_or_else(Utc::now);
                if parts > 1 {
                    // Joined fetches each installed their own set; record the
                    // combined result under the requested set too.
                    let entry = CacheEntry {
                        symbols: requested.clone(),
                        quotes: quotes.clone(),
                        fetched_at,
                    };
                    install_entry(&mut state, self.persistence.as_ref(), entry);
                }
                Ok(CachedQuotes {
                    quotes,
                    fetched_at,
                    source: QuoteSource::Fresh,
                })
            }
            (Some(e), fetched_at) => {
                if let Some(entry) = state.best_entry(&requested, Utc::now(), None) {
                    warn!("Quote fetch failed, serving stale entry from {}: {e}", entry.fetched_at);
                    return Ok(entry.restricted_to(&requested, QuoteSource::StaleFallback));
                }
                match fetched_at {
                    Some(fetched_at) => {
                        warn!(
                            "Quote fetch partly failed, serving {} of {} symbols: {e}",
                            quotes.len(),
                            requested.len()
                        );
                        Ok(CachedQuotes {
                            quotes,
                            fetched_at,
                            source: QuoteSource::Fresh,
                        })
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Drops every cached entry. In-flight fetches still install their result.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        if let Some(collection) = &self.persistence {
            collection.clear();
        }
        debug!("Cache CLEAR");
    }

    /// Drops entries unrelated to every set in `live`. An entry is kept when
    /// its symbol set contains, or is contained in, one of the live sets.
    pub async fn retain_related(&self, live: &[BTreeSet<Symbol>]) -> usize {
        let mut state = self.state.lock().await;
        let stale: Vec<SymbolSet> = state
            .entries
            .keys()
            .filter(|set| !live.iter().any(|l| set.is_superset(l) || set.is_subset(l)))
            .cloned()
            .collect();
        for set in &stale {
            state.entries.remove(set);
            if let Some(collection) = &self.persistence {
                collection.remove(&entry_key(set));
            }
        }
        if !stale.is_empty() {
            debug!(pruned = stale.len(), "Cache PRUNE");
        }
        stale.len()
    }

    /// Fetches to await for `requested`: an in-flight fetch covering all of
    /// it, or every overlapping in-flight fetch plus a new one for the symbols
    /// they leave out.
    fn plan_fetches(&self, state: &mut CacheState, requested: &SymbolSet) -> Vec<SharedFetch> {
        if let Some(in_flight) = state
            .in_flight
            .iter()
            .find(|(set, _)| set.is_superset(requested))
            .map(|(_, in_flight)| in_flight)
        {
            debug!(fetch_id = in_flight.id, "Joining in-flight quote fetch");
            return vec![in_flight.fetch.clone()];
        }

        let mut fetches = Vec::new();
        let mut missing = requested.clone();
        for (set, in_flight) in &state.in_flight {
            if set.iter().any(|symbol| missing.contains(symbol)) {
                debug!(fetch_id = in_flight.id, "Joining overlapping quote fetch");
                missing.retain(|symbol| !set.contains(symbol));
                fetches.push(in_flight.fetch.clone());
            }
        }
        if !missing.is_empty() || fetches.is_empty() {
            fetches.push(self.start_fetch(state, missing));
        }
        fetches
    }

    fn start_fetch(&self, state: &mut CacheState, symbols: SymbolSet) -> SharedFetch {
        state.next_fetch_id += 1;
        let id = state.next_fetch_id;
        debug!(fetch_id = id, symbols = symbols.len(), "Starting quote fetch");

        let provider = self.provider.clone();
        let cache_state = self.state.clone();
        let persistence = self.persistence.clone();
        let fetch_timeout = self.fetch_timeout;
        let key = symbols.clone();

        let handle = tokio::spawn(async move {
            let request: Vec<Symbol> = symbols.iter().cloned().collect();
            let result = match tokio::time::timeout(fetch_timeout, provider.fetch_quotes(&request)).await
            {
                Ok(Ok(batch)) => Ok(batch),
                Ok(Err(e)) => Err(QuoteError::Provider(format!("{e:#}"))),
                Err(_) => Err(QuoteError::Timeout(fetch_timeout)),
            };

            let mut state = cache_state.lock().await;
            if state.in_flight.get(&symbols).is_some_and(|f| f.id == id) {
                state.in_flight.remove(&symbols);
            }
            let batch = match result {
                Ok(batch) => batch,
                Err(e) => return Err(e),
            };
            let entry = CacheEntry {
                quotes: restrict(&batch.quotes, &symbols),
                fetched_at: batch.fetched_at,
                symbols: symbols.clone(),
            };
            debug!(fetch_id = id, quotes = entry.quotes.len(), "Cache PUT");
            install_entry(&mut state, persistence.as_ref(), entry);
            Ok::<_, QuoteError>(Arc::new(batch))
        });

        let fetch = async move {
            match handle.await {
                Ok(result) => result,
                Err(_) => Err(QuoteError::Abandoned),
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key,
            InFlight {
                id,
                fetch: fetch.clone(),
            },
        );
        fetch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCollection;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockProvider {
        call_count: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
        price: f64,
        requested: StdMutex<Vec<Symbol>>,
    }

    impl MockProvider {
        fn new(delay: Duration) -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                delay,
                price: 100.0,
                requested: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Every symbol passed to the provider so far, sorted.
        fn requested(&self) -> Vec<Symbol> {
            let mut requested = self.requested.lock().unwrap().clone();
            requested.sort();
            requested
        }
    }

    #[async_trait]
    impl QuoteProvider for MockProvider {
        async fn fetch_quotes(&self, symbols: &[Symbol]) -> Result<QuoteBatch> {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
            self.requested.lock().unwrap().extend(symbols.iter().cloned());
            tokio::time::sleep(self.delay).await;
            if self.failing.load(Ordering::SeqCst) || symbols.contains(&Symbol::from("NOPE")) {
                return Err(anyhow!("Service unavailable"));
            }
            let quotes = symbols
                .iter()
                .map(|symbol| {
                    let quote = Quote {
                        symbol: symbol.clone(),
                        name: None,
                        price: Some(self.price + call as f64),
                        change: Some(1.0),
                        percent: Some(1.0),
                        volume: None,
                        timestamp: Utc::now(),
                    };
                    (symbol.clone(), quote)
                })
                .collect();
            Ok(QuoteBatch {
                quotes,
                fetched_at: Utc::now(),
            })
        }
    }

    fn symbols(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|s| Symbol::from(*s)).collect()
    }

    fn cache_with(provider: Arc<MockProvider>, staleness: Duration) -> QuoteCache {
        QuoteCache::new(provider, staleness, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_served_from_cache_within_window() {
        let provider = Arc::new(MockProvider::new(Duration::ZERO));
        let cache = cache_with(provider.clone(), Duration::from_secs(900));
        let request = symbols(&["AAPL", "MSFT"]);

        let first = cache.get_quotes(&request, false).await.unwrap();
        assert_eq!(first.source, QuoteSource::Fresh);

        let second = cache.get_quotes(&request, false).await.unwrap();
        assert_eq!(second.source, QuoteSource::Cache);
        assert_eq!(provider.calls(), 1);
        assert_eq!(second.quotes.len(), 2);
    }

    #[tokio::test]
    async fn test_subset_request_is_served_from_superset_entry() {
        let provider = Arc::new(MockProvider::new(Duration::ZERO));
        let cache = cache_with(provider.clone(), Duration::from_secs(900));

        cache.get_quotes(&symbols(&["AAPL", "MSFT", "^DJI"]), false).await.unwrap();
        let subset = cache.get_quotes(&symbols(&["MSFT"]), false).await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(subset.source, QuoteSource::Cache);
        assert_eq!(subset.quotes.len(), 1);
        assert!(subset.quotes.contains_key(&Symbol::from("MSFT")));
    }

    #[tokio::test]
    async fn test_stale_entry_is_refetched() {
        let provider = Arc::new(MockProvider::new(Duration::ZERO));
        let cache = cache_with(provider.clone(), Duration::ZERO);
        let request = symbols(&["AAPL"]);

        cache.get_quotes(&request, false).await.unwrap();
        let again = cache.get_quotes(&request, false).await.unwrap();
        assert_eq!(again.source, QuoteSource::Fresh);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_fresh_entry() {
        let provider = Arc::new(MockProvider::new(Duration::ZERO));
        let cache = cache_with(provider.clone(), Duration::from_secs(900));
        let request = symbols(&["AAPL"]);

        cache.get_quotes(&request, false).await.unwrap();
        let forced = cache.get_quotes(&request, true).await.unwrap();
        assert_eq!(forced.source, QuoteSource::Fresh);
        assert_eq!(provider.calls(), 2);
        assert_eq!(forced.quotes[&Symbol::from("AAPL")].price, Some(102.0));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let provider = Arc::new(MockProvider::new(Duration::from_millis(50)));
        let cache = cache_with(provider.clone(), Duration::from_secs(900));
        let full = symbols(&["AAPL", "MSFT"]);
        let partial = symbols(&["AAPL"]);

        let (a, b, c) = tokio::join!(
            cache.get_quotes(&full, false),
            cache.get_quotes(&full, false),
            cache.get_quotes(&partial, true),
        );

        assert_eq!(provider.calls(), 1);
        assert_eq!(a.unwrap().quotes.len(), 2);
        assert_eq!(b.unwrap().source, QuoteSource::Fresh);
        assert_eq!(c.unwrap().quotes.len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_request_only_fetches_missing_symbols() {
        let provider = Arc::new(MockProvider::new(Duration::from_millis(50)));
        let cache = cache_with(provider.clone(), Duration::from_secs(900));

        let small_syms = symbols(&["AAPL"]);
        let large_syms = symbols(&["AAPL", "MSFT"]);
        let (small, large) = tokio::join!(
            cache.get_quotes(&small_syms, false),
            cache.get_quotes(&large_syms, false),
        );

        assert_eq!(provider.requested(), symbols(&["AAPL", "MSFT"]));
        assert_eq!(small.unwrap().quotes.len(), 1);
        let large = large.unwrap();
        assert_eq!(large.source, QuoteSource::Fresh);
        assert_eq!(large.quotes.len(), 2);

        // The combined result is cached under the requested set.
        let again = cache.get_quotes(&symbols(&["AAPL", "MSFT"]), false).await.unwrap();
        assert_eq!(again.source, QuoteSource::Cache);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_request_keeps_partial_data_when_its_own_fetch_fails() {
        let provider = Arc::new(MockProvider::new(Duration::from_millis(50)));
        let cache = cache_with(provider.clone(), Duration::from_secs(900));

        let first_syms = symbols(&["AAPL"]);
        let second_syms = symbols(&["AAPL", "NOPE"]);
        let (first, second) = tokio::join!(
            cache.get_quotes(&first_syms, false),
            cache.get_quotes(&second_syms, false),
        );

        assert_eq!(first.unwrap().quotes.len(), 1);
        let second = second.unwrap();
        assert_eq!(second.quotes.len(), 1);
        assert!(second.quotes.contains_key(&Symbol::from("AAPL")));
        assert_eq!(provider.requested(), symbols(&["AAPL", "NOPE"]));
    }

    #[tokio::test]
    async fn test_retain_related_prunes_unused_sets() {
        let collection: Arc<dyn SettingsCollection> = Arc::new(MemoryCollection::new());
        let provider = Arc::new(MockProvider::new(Duration::ZERO));
        let cache = QuoteCache::with_persistence(
            provider.clone(),
            collection.clone(),
            Duration::from_secs(900),
            Duration::from_secs(5),
        );
        cache.get_quotes(&symbols(&["AAPL", "MSFT"]), false).await.unwrap();
        cache.get_quotes(&symbols(&["GOOG"]), false).await.unwrap();
        cache.get_quotes(&symbols(&["^DJI"]), false).await.unwrap();

        let live: Vec<SymbolSet> = vec![
            symbols(&["AAPL"]).into_iter().collect(),
            symbols(&["^DJI", "BP.L"]).into_iter().collect(),
        ];
        assert_eq!(cache.retain_related(&live).await, 1);
        assert_eq!(collection.keys(), vec!["AAPL,MSFT", "^DJI"]);
        assert!(cache.peek(&symbols(&["GOOG"])).await.is_none());
        assert!(cache.peek(&symbols(&["AAPL"])).await.is_some());
    }

    #[tokio::test]
    async fn test_provider_failure_serves_stale_entry() {
        let provider = Arc::new(MockProvider::new(Duration::ZERO));
        let cache = cache_with(provider.clone(), Duration::from_secs(900));
        let request = symbols(&["AAPL"]);

        let fresh = cache.get_quotes(&request, false).await.unwrap();
        provider.failing.store(true, Ordering::SeqCst);

        let fallback = cache.get_quotes(&request, true).await.unwrap();
        assert_eq!(fallback.source, QuoteSource::StaleFallback);
        assert_eq!(fallback.fetched_at, fresh.fetched_at);
        assert_eq!(
            fallback.quotes[&Symbol::from("AAPL")].price,
            fresh.quotes[&Symbol::from("AAPL")].price
        );
    }

    #[tokio::test]
    async fn test_failure_without_prior_entry_is_an_error() {
        let provider = Arc::new(MockProvider::new(Duration::ZERO));
        provider.failing.store(true, Ordering::SeqCst);
        let cache = cache_with(provider.clone(), Duration::from_secs(900));

        let result = cache.get_quotes(&symbols(&["AAPL"]), false).await;
        assert!(matches!(result, Err(QuoteError::Provider(_))));
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out_to_fallback() {
        let provider = Arc::new(MockProvider::new(Duration::ZERO));
        let cache = QuoteCache::new(provider.clone(), Duration::ZERO, Duration::from_millis(50));
        let request = symbols(&["AAPL"]);
        cache.get_quotes(&request, false).await.unwrap();

        let slow = Arc::new(MockProvider::new(Duration::from_secs(5)));
        let slow_cache = QuoteCache {
            provider: slow,
            ..cache.clone()
        };
        let fallback = slow_cache.get_quotes(&request, false).await.unwrap();
        assert_eq!(fallback.source, QuoteSource::StaleFallback);

        let empty = QuoteCache::new(
            Arc::new(MockProvider::new(Duration::from_secs(5))),
            Duration::ZERO,
            Duration::from_millis(50),
        );
        let result = empty.get_quotes(&request, false).await;
        assert!(matches!(result, Err(QuoteError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let provider = Arc::new(MockProvider::new(Duration::ZERO));
        let cache = cache_with(provider.clone(), Duration::from_secs(900));
        let request = symbols(&["AAPL"]);

        cache.get_quotes(&request, false).await.unwrap();
        cache.invalidate().await;
        cache.get_quotes(&request, false).await.unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_peek_never_fetches() {
        let provider = Arc::new(MockProvider::new(Duration::ZERO));
        let cache = cache_with(provider.clone(), Duration::ZERO);
        let request = symbols(&["AAPL"]);

        assert!(cache.peek(&request).await.is_none());
        cache.get_quotes(&request, false).await.unwrap();
        let peeked = cache.peek(&request).await.unwrap();
        assert_eq!(peeked.source, QuoteSource::Cache);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_persisted_entries_seed_a_new_cache() {
        let collection: Arc<dyn SettingsCollection> = Arc::new(MemoryCollection::new());
        let provider = Arc::new(MockProvider::new(Duration::ZERO));
        let request = symbols(&["^DJI", "AAPL"]);

        let first = QuoteCache::with_persistence(
            provider.clone(),
            collection.clone(),
            Duration::from_secs(900),
            Duration::from_secs(5),
        );
        first.get_quotes(&request, false).await.unwrap();
        assert_eq!(collection.keys(), vec!["^DJI,AAPL"]);

        let second = QuoteCache::with_persistence(
            provider.clone(),
            collection.clone(),
            Duration::from_secs(900),
            Duration::from_secs(5),
        );
        let served = second.get_quotes(&request, false).await.unwrap();
        assert_eq!(served.source, QuoteSource::Cache);
        assert_eq!(provider.calls(), 1);

        second.invalidate().await;
        assert!(collection.keys().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_caller_does_not_cancel_fetch() {
        let provider = Arc::new(MockProvider::new(Duration::from_millis(50)));
        let cache = cache_with(provider.clone(), Duration::from_secs(900));
        let request = symbols(&["AAPL"]);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(5),
            cache.get_quotes(&request, false),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(150)).await;
        let later = cache.get_quotes(&request, false).await.unwrap();
        assert_eq!(later.source, QuoteSource::Cache);
        assert_eq!(provider.calls(), 1);
    }
}
