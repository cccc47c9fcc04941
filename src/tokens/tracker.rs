/// Token tracker - the mediator between callers, the cache and upstream
///
/// Every read goes through the same policy: serve fresh cache directly;
/// refresh stale (or missing) records when the governor permits a call;
/// degrade to the last cached value on any upstream failure. Freshness is
/// best-effort, availability is guaranteed whenever a prior successful fetch
/// exists.
///
/// Concurrent refreshes are deduplicated per identifier: the first caller
/// leads the upstream call, later callers join the same flight through a
/// watch channel and observe its outcome. The lead-or-join decision and the
/// governor check happen under one lock, so exactly one upstream call is
/// issued per flight.
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::apis::MarketDataSource;
use crate::errors::{FetchError, StoreError, TrackerError};
use crate::governor::RateGovernor;
use crate::logger::{self, LogTag};
use crate::tokens::database::TokenStore;
use crate::tokens::types::{PriceHistory, TokenRecord, TokenStats};

/// Registry key for the full-market sweep; upstream identifiers are
/// lowercase slugs, so this cannot collide with a real token
const MARKET_SWEEP_KEY: &str = "*markets*";

#[derive(Debug, Clone)]
enum FlightResult {
    Token(TokenRecord),
    Market(usize),
    Failed(FlightFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlightFailure {
    RateLimited,
    Unavailable,
    Malformed,
    NotListed,
}

impl From<&FetchError> for FlightFailure {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::RateLimited => FlightFailure::RateLimited,
            FetchError::Unavailable(_) => FlightFailure::Unavailable,
            FetchError::Malformed(_) => FlightFailure::Malformed,
            FetchError::NotListed => FlightFailure::NotListed,
        }
    }
}

enum FlightPlan {
    /// This caller runs the upstream call and publishes the outcome
    Lead(watch::Sender<Option<FlightResult>>),
    /// A flight for this key is already up; await its outcome
    Join(watch::Receiver<Option<FlightResult>>),
    /// No flight is up and the governor forbids starting one
    Throttled,
}

pub struct TokenTracker {
    store: TokenStore,
    source: Arc<dyn MarketDataSource>,
    governor: Arc<RateGovernor>,
    staleness: Duration,
    market_page_size: u32,
    flights: Mutex<HashMap<String, watch::Receiver<Option<FlightResult>>>>,
}

impl TokenTracker {
    pub fn new(
        store: TokenStore,
        source: Arc<dyn MarketDataSource>,
        governor: Arc<RateGovernor>,
        staleness_seconds: u64,
        market_page_size: u32,
    ) -> Self {
        Self {
            store,
            source,
            governor,
            staleness: Duration::seconds(staleness_seconds as i64),
            market_page_size,
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Single-token read following the cache-vs-refresh-vs-fallback policy
    pub async fn get_token(&self, token_id: &str) -> Result<TokenRecord, TrackerError> {
        let cached = self.store.get(token_id)?;

        if let Some(record) = &cached {
            let age = Utc::now() - record.last_updated;
            if age <= self.staleness {
                return Ok(record.clone());
            }
        }

        match self.plan_flight(token_id).await {
            FlightPlan::Throttled => self.cached_or_unavailable(cached),
            FlightPlan::Join(mut rx) => {
                let result = Self::await_flight(&mut rx).await;
                self.settle_token_result(result, cached)
            }
            FlightPlan::Lead(tx) => {
                let result = self.fetch_and_store_token(token_id).await;
                self.finish_flight(token_id, tx, result.clone()).await;
                self.settle_token_result(result, cached)
            }
        }
    }

    /// Bulk read; refreshes the whole market page when the cache is stale
    pub async fn get_all_tokens(&self) -> Result<Vec<TokenRecord>, TrackerError> {
        let cached = self.store.get_all()?;

        let newest = cached.iter().map(|r| r.last_updated).max();
        let stale = newest.map_or(true, |t| Utc::now() - t > self.staleness);
        if !stale {
            return Ok(cached);
        }

        match self.plan_flight(MARKET_SWEEP_KEY).await {
            FlightPlan::Throttled => {
                if cached.is_empty() {
                    Err(self.unavailable())
                } else {
                    Ok(cached)
                }
            }
            FlightPlan::Join(mut rx) => {
                let result = Self::await_flight(&mut rx).await;
                self.settle_market_result(result, cached)
            }
            FlightPlan::Lead(tx) => {
                let result = self.fetch_and_store_markets().await;
                self.finish_flight(MARKET_SWEEP_KEY, tx, result.clone()).await;
                self.settle_market_result(result, cached)
            }
        }
    }

    /// Background sweep entry point. Refreshes the market page when stale and
    /// permissible; never waits on an already-running flight.
    /// Returns the number of stored records, or None when nothing was done.
    pub async fn refresh_if_stale(&self) -> Result<Option<usize>, TrackerError> {
        let newest = self.store.newest_update()?;
        let stale = newest.map_or(true, |t| Utc::now() - t > self.staleness);
        if !stale {
            return Ok(None);
        }

        match self.plan_flight(MARKET_SWEEP_KEY).await {
            FlightPlan::Throttled => {
                logger::debug(LogTag::Tracker, "Sweep skipped: governor not callable");
                Ok(None)
            }
            FlightPlan::Join(_) => {
                logger::debug(LogTag::Tracker, "Sweep skipped: refresh already in flight");
                Ok(None)
            }
            FlightPlan::Lead(tx) => {
                let result = self.fetch_and_store_markets().await;
                self.finish_flight(MARKET_SWEEP_KEY, tx, result.clone()).await;
                match result {
                    FlightResult::Market(written) => Ok(Some(written)),
                    _ => Ok(None),
                }
            }
        }
    }

    /// Historical chart series; fetched fresh when the governor permits,
    /// otherwise served from the last cached series
    pub async fn get_history(
        &self,
        token_id: &str,
        days: u32,
    ) -> Result<PriceHistory, TrackerError> {
        if !self.governor.can_call_now() {
            return match self.store.get_history(token_id)? {
                Some(history) => Ok(history),
                None => Err(self.unavailable()),
            };
        }

        match self.source.fetch_market_chart(token_id, days).await {
            Ok(history) => {
                if let Err(e) = self.store.upsert_history(&history) {
                    logger::error(
                        LogTag::Tracker,
                        &format!("Failed to store history for {}: {}", token_id, e),
                    );
                }
                Ok(history)
            }
            Err(err) => {
                logger::warning(
                    LogTag::Tracker,
                    &format!("History fetch for {} failed: {}", token_id, err),
                );
                match self.store.get_history(token_id)? {
                    Some(history) => Ok(history),
                    None => match err {
                        FetchError::NotListed => Err(TrackerError::NotFound),
                        _ => Err(self.unavailable()),
                    },
                }
            }
        }
    }

    // =========================================================================
    // DERIVED VIEWS (cache projections, never trigger upstream calls)
    // =========================================================================

    pub fn search_tokens(&self, query: &str) -> Result<Vec<TokenRecord>, TrackerError> {
        Ok(self.store.search(query)?)
    }

    pub fn get_favorites(&self) -> Result<Vec<TokenRecord>, TrackerError> {
        Ok(self.store.get_favorites()?)
    }

    pub fn set_favorite(
        &self,
        token_id: &str,
        is_favorite: bool,
    ) -> Result<TokenRecord, TrackerError> {
        match self.store.set_favorite(token_id, is_favorite)? {
            Some(record) => Ok(record),
            None => Err(TrackerError::NotFound),
        }
    }

    pub fn get_stats(&self) -> Result<TokenStats, TrackerError> {
        Ok(TokenStats::from_records(&self.store.get_all()?))
    }

    // =========================================================================
    // FLIGHT PLUMBING
    // =========================================================================

    /// Decide, under one lock, whether this caller joins an existing flight,
    /// leads a new one, or is throttled by the governor
    async fn plan_flight(&self, key: &str) -> FlightPlan {
        let mut flights = self.flights.lock().await;
        if let Some(rx) = flights.get(key) {
            return FlightPlan::Join(rx.clone());
        }
        if !self.governor.can_call_now() {
            return FlightPlan::Throttled;
        }
        let (tx, rx) = watch::channel(None);
        flights.insert(key.to_string(), rx);
        FlightPlan::Lead(tx)
    }

    async fn finish_flight(
        &self,
        key: &str,
        tx: watch::Sender<Option<FlightResult>>,
        result: FlightResult,
    ) {
        let mut flights = self.flights.lock().await;
        flights.remove(key);
        drop(flights);
        let _ = tx.send(Some(result));
    }

    async fn await_flight(rx: &mut watch::Receiver<Option<FlightResult>>) -> FlightResult {
        if rx.changed().await.is_ok() {
            if let Some(result) = rx.borrow().clone() {
                return result;
            }
        }
        FlightResult::Failed(FlightFailure::Unavailable)
    }

    async fn fetch_and_store_token(&self, token_id: &str) -> FlightResult {
        match self.source.fetch_market(token_id).await {
            Ok(record) => {
                match self.store.upsert(&record) {
                    Ok(()) => {}
                    Err(StoreError::RejectedWrite { reason, .. }) => {
                        logger::debug(
                            LogTag::Tracker,
                            &format!("Refresh for {} rejected by store: {}", token_id, reason),
                        );
                    }
                    Err(e) => {
                        logger::error(
                            LogTag::Tracker,
                            &format!("Failed to store refreshed {}: {}", token_id, e),
                        );
                    }
                }
                // Re-read so the published record carries the preserved
                // favorite flag (and the stored row if the write was rejected)
                match self.store.get(token_id) {
                    Ok(Some(stored)) => FlightResult::Token(stored),
                    _ => FlightResult::Token(record),
                }
            }
            Err(err) => {
                logger::warning(
                    LogTag::Tracker,
                    &format!("Refresh for {} failed: {}", token_id, err),
                );
                FlightResult::Failed(FlightFailure::from(&err))
            }
        }
    }

    async fn fetch_and_store_markets(&self) -> FlightResult {
        match self.source.fetch_markets(self.market_page_size).await {
            Ok(records) => {
                if records.is_empty() {
                    logger::warning(LogTag::Tracker, "Market refresh returned no rows");
                    return FlightResult::Failed(FlightFailure::Unavailable);
                }
                match self.store.upsert_many(&records) {
                    Ok(written) => {
                        logger::info(
                            LogTag::Tracker,
                            &format!(
                                "Market refresh stored {} of {} tokens",
                                written,
                                records.len()
                            ),
                        );
                        FlightResult::Market(written)
                    }
                    Err(e) => {
                        logger::error(
                            LogTag::Tracker,
                            &format!("Failed to store market refresh: {}", e),
                        );
                        FlightResult::Failed(FlightFailure::Unavailable)
                    }
                }
            }
            Err(err) => {
                logger::warning(LogTag::Tracker, &format!("Market refresh failed: {}", err));
                FlightResult::Failed(FlightFailure::from(&err))
            }
        }
    }

    fn settle_token_result(
        &self,
        result: FlightResult,
        cached: Option<TokenRecord>,
    ) -> Result<TokenRecord, TrackerError> {
        match result {
            FlightResult::Token(record) => Ok(record),
            FlightResult::Failed(FlightFailure::NotListed) => match cached {
                Some(record) => Ok(record),
                None => Err(TrackerError::NotFound),
            },
            FlightResult::Failed(_) | FlightResult::Market(_) => self.cached_or_unavailable(cached),
        }
    }

    fn settle_market_result(
        &self,
        result: FlightResult,
        cached: Vec<TokenRecord>,
    ) -> Result<Vec<TokenRecord>, TrackerError> {
        match result {
            FlightResult::Market(_) => Ok(self.store.get_all()?),
            _ => {
                if cached.is_empty() {
                    Err(self.unavailable())
                } else {
                    Ok(cached)
                }
            }
        }
    }

    fn cached_or_unavailable(
        &self,
        cached: Option<TokenRecord>,
    ) -> Result<TokenRecord, TrackerError> {
        match cached {
            Some(record) => Ok(record),
            None => Err(self.unavailable()),
        }
    }

    fn unavailable(&self) -> TrackerError {
        TrackerError::Unavailable {
            retry_after_secs: self.governor.retry_after_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GovernorConfig;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    use async_trait::async_trait;

    /// Scripted upstream standing in for the CoinGecko client. Mirrors the
    /// real client's governor reporting so pacing behaves identically.
    struct FakeSource {
        governor: Arc<RateGovernor>,
        token_script: StdMutex<VecDeque<Result<TokenRecord, FetchError>>>,
        market_script: StdMutex<VecDeque<Result<Vec<TokenRecord>, FetchError>>>,
        calls: AtomicUsize,
        delay: StdDuration,
    }

    impl FakeSource {
        fn new(governor: Arc<RateGovernor>) -> Self {
            Self {
                governor,
                token_script: StdMutex::new(VecDeque::new()),
                market_script: StdMutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
                delay: StdDuration::ZERO,
            }
        }

        fn with_delay(governor: Arc<RateGovernor>, delay: StdDuration) -> Self {
            Self {
                delay,
                ..Self::new(governor)
            }
        }

        fn script_token(&self, response: Result<TokenRecord, FetchError>) {
            self.token_script.lock().unwrap().push_back(response);
        }

        fn script_market(&self, response: Result<Vec<TokenRecord>, FetchError>) {
            self.market_script.lock().unwrap().push_back(response);
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn classify(&self, response: &Result<TokenRecord, FetchError>) {
            if matches!(response, Err(FetchError::RateLimited)) {
                self.governor.record_rate_limited();
            }
        }
    }

    #[async_trait]
    impl MarketDataSource for FakeSource {
        async fn fetch_market(&self, _id: &str) -> Result<TokenRecord, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.governor.record_call_issued();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let response = self
                .token_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FetchError::Unavailable("script exhausted".to_string())));
            self.classify(&response);
            response
        }

        async fn fetch_markets(&self, _limit: u32) -> Result<Vec<TokenRecord>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.governor.record_call_issued();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let response = self
                .market_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FetchError::Unavailable("script exhausted".to_string())));
            if matches!(response, Err(FetchError::RateLimited)) {
                self.governor.record_rate_limited();
            }
            response
        }

        async fn fetch_market_chart(
            &self,
            _id: &str,
            _days: u32,
        ) -> Result<PriceHistory, FetchError> {
            Err(FetchError::Unavailable("not scripted".to_string()))
        }
    }

    fn record(id: &str, price: f64, updated: DateTime<Utc>) -> TokenRecord {
        TokenRecord {
            token_id: id.to_string(),
            symbol: id[..id.len().min(3)].to_string(),
            name: format!("{} token", id),
            current_price: price,
            market_cap: price * 1000.0,
            volume_24h: 500.0,
            price_change_24h: 1.0,
            price_change_percentage_24h: 0.5,
            high_24h: None,
            low_24h: None,
            circulating_supply: None,
            total_supply: None,
            ath: None,
            ath_change_percentage: None,
            atl: None,
            atl_change_percentage: None,
            image: None,
            last_updated: updated,
            is_favorite: false,
        }
    }

    struct Fixture {
        _dir: TempDir,
        tracker: TokenTracker,
        source: Arc<FakeSource>,
        governor: Arc<RateGovernor>,
    }

    fn fixture() -> Fixture {
        fixture_with_delay(StdDuration::ZERO)
    }

    fn fixture_with_delay(delay: StdDuration) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(&dir.path().join("tokens.db")).expect("store");
        let governor = Arc::new(RateGovernor::new(&GovernorConfig::default()));
        let source = Arc::new(FakeSource::with_delay(governor.clone(), delay));
        let source_handle: Arc<dyn MarketDataSource> = source.clone();
        let tracker = TokenTracker::new(store, source_handle, governor.clone(), 60, 100);
        Fixture {
            _dir: dir,
            tracker,
            source,
            governor,
        }
    }

    fn seed(fx: &Fixture, rec: &TokenRecord) {
        // Seed through a store handle cloned off the tracker's own
        let store = fx.tracker.store.clone();
        store.upsert(rec).expect("seed");
    }

    #[tokio::test]
    async fn fresh_cache_is_served_without_an_upstream_call() {
        let fx = fixture();
        seed(&fx, &record("bitcoin", 60000.0, Utc::now()));

        let result = fx.tracker.get_token("bitcoin").await.expect("cached");
        assert_eq!(result.current_price, 60000.0);
        assert_eq!(fx.source.call_count(), 0);
    }

    #[tokio::test]
    async fn stale_record_refreshes_when_the_governor_permits() {
        let fx = fixture();
        seed(
            &fx,
            &record("bitcoin", 60000.0, Utc::now() - ChronoDuration::seconds(120)),
        );
        fx.source
            .script_token(Ok(record("bitcoin", 61000.0, Utc::now())));

        let result = fx.tracker.get_token("bitcoin").await.expect("refreshed");
        assert_eq!(result.current_price, 61000.0);
        assert_eq!(fx.source.call_count(), 1);
    }

    #[tokio::test]
    async fn rate_limited_refresh_degrades_to_the_cached_record() {
        // Token cached at T0, stale by T0+70s; the refresh hits a 429. The
        // caller still gets the cached price and the governor stays blocked
        // for the full backoff window from the rate-limit event.
        let fx = fixture();
        let t0 = Utc::now() - ChronoDuration::seconds(70);
        seed(&fx, &record("bitcoin", 60000.0, t0));
        fx.source.script_token(Err(FetchError::RateLimited));

        let result = fx.tracker.get_token("bitcoin").await.expect("degraded");
        assert_eq!(result.current_price, 60000.0);
        assert_eq!(fx.source.call_count(), 1);

        let now = Utc::now();
        assert!(!fx.governor.can_call_at(now + ChronoDuration::seconds(20)));
        assert!(!fx.governor.can_call_at(now + ChronoDuration::seconds(59)));
        assert!(fx.governor.can_call_at(now + ChronoDuration::seconds(61)));
    }

    #[tokio::test]
    async fn upstream_failure_with_no_cache_is_unavailable() {
        let fx = fixture();
        fx.source
            .script_token(Err(FetchError::Unavailable("boom".to_string())));

        let err = fx.tracker.get_token("bitcoin").await.expect_err("no data");
        assert!(matches!(err, TrackerError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_found() {
        let fx = fixture();
        fx.source.script_token(Err(FetchError::NotListed));

        let err = fx.tracker.get_token("nonsense").await.expect_err("unknown");
        assert!(matches!(err, TrackerError::NotFound));
    }

    #[tokio::test]
    async fn throttled_miss_is_unavailable_not_not_found() {
        let fx = fixture();
        fx.governor.record_rate_limited();

        let err = fx.tracker.get_token("bitcoin").await.expect_err("blocked");
        assert!(matches!(err, TrackerError::Unavailable { .. }));
        assert_eq!(fx.source.call_count(), 0);
    }

    #[tokio::test]
    async fn once_cached_reads_never_error() {
        let fx = fixture();
        seed(
            &fx,
            &record("bitcoin", 60000.0, Utc::now() - ChronoDuration::seconds(120)),
        );

        // Every refresh attempt fails in a different way; the cached record
        // keeps being served.
        fx.source
            .script_token(Err(FetchError::Unavailable("timeout".to_string())));
        fx.source
            .script_token(Err(FetchError::Malformed("bad row".to_string())));
        fx.source.script_token(Err(FetchError::RateLimited));

        for _ in 0..3 {
            let result = fx.tracker.get_token("bitcoin").await.expect("fallback");
            assert_eq!(result.current_price, 60000.0);
        }
    }

    #[tokio::test]
    async fn repeated_reads_without_upstream_success_are_identical() {
        let fx = fixture();
        seed(
            &fx,
            &record("bitcoin", 60000.0, Utc::now() - ChronoDuration::seconds(120)),
        );
        fx.source
            .script_token(Err(FetchError::Unavailable("down".to_string())));

        let first = fx.tracker.get_token("bitcoin").await.expect("first");
        let second = fx.tracker.get_token("bitcoin").await.expect("second");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn malformed_refresh_never_clobbers_the_cached_record() {
        let fx = fixture();
        seed(
            &fx,
            &record("bitcoin", 60000.0, Utc::now() - ChronoDuration::seconds(120)),
        );
        fx.source
            .script_token(Err(FetchError::Malformed("null price".to_string())));

        let result = fx.tracker.get_token("bitcoin").await.expect("degraded");
        assert_eq!(result.current_price, 60000.0);

        let stored = fx.tracker.store.get("bitcoin").expect("get").expect("row");
        assert_eq!(stored.current_price, 60000.0);
    }

    #[tokio::test]
    async fn concurrent_stale_reads_share_one_upstream_call() {
        let fx = fixture_with_delay(StdDuration::from_millis(30));
        seed(
            &fx,
            &record("ethereum", 3000.0, Utc::now() - ChronoDuration::seconds(120)),
        );
        fx.source
            .script_token(Ok(record("ethereum", 3100.0, Utc::now())));

        let (a, b) = tokio::join!(
            fx.tracker.get_token("ethereum"),
            fx.tracker.get_token("ethereum"),
        );

        let a = a.expect("first caller");
        let b = b.expect("second caller");
        assert_eq!(fx.source.call_count(), 1);
        assert_eq!(a, b);
        assert_eq!(a.current_price, 3100.0);
    }

    #[tokio::test]
    async fn refreshed_record_keeps_the_favorite_flag() {
        let fx = fixture();
        seed(
            &fx,
            &record("bitcoin", 60000.0, Utc::now() - ChronoDuration::seconds(120)),
        );
        fx.tracker.set_favorite("bitcoin", true).expect("favorite");
        fx.source
            .script_token(Ok(record("bitcoin", 61000.0, Utc::now())));

        let result = fx.tracker.get_token("bitcoin").await.expect("refreshed");
        assert_eq!(result.current_price, 61000.0);
        assert!(result.is_favorite);
    }

    #[tokio::test]
    async fn get_all_refreshes_an_empty_cache() {
        let fx = fixture();
        let now = Utc::now();
        fx.source.script_market(Ok(vec![
            record("bitcoin", 60000.0, now),
            record("ethereum", 3000.0, now),
        ]));

        let all = fx.tracker.get_all_tokens().await.expect("refreshed");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].token_id, "bitcoin"); // market cap descending
        assert_eq!(fx.source.call_count(), 1);
    }

    #[tokio::test]
    async fn get_all_serves_stale_cache_when_throttled() {
        let fx = fixture();
        seed(
            &fx,
            &record("bitcoin", 60000.0, Utc::now() - ChronoDuration::seconds(120)),
        );
        fx.governor.record_rate_limited();

        let all = fx.tracker.get_all_tokens().await.expect("stale serve");
        assert_eq!(all.len(), 1);
        assert_eq!(fx.source.call_count(), 0);
    }

    #[tokio::test]
    async fn get_all_with_empty_cache_and_blocked_governor_is_unavailable() {
        let fx = fixture();
        fx.governor.record_rate_limited();

        let err = fx.tracker.get_all_tokens().await.expect_err("no data");
        assert!(matches!(err, TrackerError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn sweep_refreshes_only_when_stale() {
        let fx = fixture();
        let now = Utc::now();
        fx.source
            .script_market(Ok(vec![record("bitcoin", 60000.0, now)]));

        let written = fx.tracker.refresh_if_stale().await.expect("sweep");
        assert_eq!(written, Some(1));

        // Fresh cache now; a second sweep is a no-op without a call
        let written = fx.tracker.refresh_if_stale().await.expect("sweep");
        assert_eq!(written, None);
        assert_eq!(fx.source.call_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_sweeps_do_not_stack() {
        let fx = fixture_with_delay(StdDuration::from_millis(30));
        fx.source
            .script_market(Ok(vec![record("bitcoin", 60000.0, Utc::now())]));

        let (a, b) = tokio::join!(fx.tracker.refresh_if_stale(), fx.tracker.refresh_if_stale());
        assert_eq!(fx.source.call_count(), 1);

        let outcomes = (a.expect("first"), b.expect("second"));
        assert!(matches!(outcomes, (Some(1), None) | (None, Some(1))));
    }

    #[tokio::test]
    async fn stats_reflect_the_cached_records() {
        let fx = fixture();
        let now = Utc::now();
        seed(&fx, &record("bitcoin", 60000.0, now));
        seed(&fx, &record("ethereum", 3000.0, now));

        let stats = fx.tracker.get_stats().expect("stats");
        assert_eq!(stats.total_tokens, 2);
        assert_eq!(stats.total_market_cap, 63_000_000.0);
    }
}
