/// CoinGecko API client
///
/// API Documentation: https://docs.coingecko.com/reference/introduction
///
/// Endpoints implemented:
/// 1. /coins/markets - top tokens by market cap, also used for by-id lookups
/// 2. /coins/{id}/market_chart - historical price/market-cap/volume series
///
/// Every call is reported to the shared governor before the network
/// round-trip, and a 429 is reported back the moment it is seen, so pacing
/// holds even for calls that never complete.
use chrono::Utc;
use std::sync::Arc;

use async_trait::async_trait;

use crate::apis::client::{classify_status, classify_transport_error, HttpClient};
use crate::apis::types::{CoinGeckoMarket, CoinGeckoMarketChart};
use crate::apis::MarketDataSource;
use crate::config::UpstreamConfig;
use crate::errors::FetchError;
use crate::governor::RateGovernor;
use crate::logger::{self, LogTag};
use crate::tokens::types::{PriceHistory, TokenRecord};

pub struct CoinGeckoClient {
    http_client: HttpClient,
    governor: Arc<RateGovernor>,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    pub fn new(config: &UpstreamConfig, governor: Arc<RateGovernor>) -> Result<Self, String> {
        let http_client = HttpClient::new(config.timeout_seconds)?;

        Ok(Self {
            http_client,
            governor,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Issue a GET and return the decoded body, classifying every failure.
    /// Records the call with the governor before sending.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        self.governor.record_call_issued();

        let mut request = self
            .http_client
            .client()
            .get(url)
            .header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            let error = classify_transport_error(&e);
            logger::debug(LogTag::Api, &format!("Transport failure for {}: {}", url, e));
            error
        })?;

        let status = response.status();
        if let Some(error) = classify_status(status) {
            if matches!(error, FetchError::RateLimited) {
                self.governor.record_rate_limited();
                logger::warning(LogTag::Api, "Upstream rate limit hit, backing off");
            } else {
                logger::warning(LogTag::Api, &format!("Upstream error: HTTP {}", status));
            }
            return Err(error);
        }

        self.governor.record_success();

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Unavailable(format!("failed reading body: {}", e)))?;

        serde_json::from_str(&body).map_err(|e| {
            logger::warning(
                LogTag::Api,
                &format!("Failed to parse upstream response: {}", e),
            );
            FetchError::Malformed(e.to_string())
        })
    }

    fn markets_url(&self, limit: u32) -> String {
        format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page=1&sparkline=false&price_change_percentage=24h",
            self.base_url, limit
        )
    }

    fn market_by_id_url(&self, id: &str) -> String {
        format!(
            "{}/coins/markets?vs_currency=usd&ids={}&order=market_cap_desc&sparkline=false&price_change_percentage=24h",
            self.base_url, id
        )
    }

    fn market_chart_url(&self, id: &str, days: u32) -> String {
        format!(
            "{}/coins/{}/market_chart?vs_currency=usd&days={}",
            self.base_url, id, days
        )
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn fetch_market(&self, id: &str) -> Result<TokenRecord, FetchError> {
        let url = self.market_by_id_url(id);
        logger::debug(LogTag::Api, &format!("Fetching token {}", id));

        let mut markets: Vec<CoinGeckoMarket> = self.get_json(&url).await?;

        match markets.pop() {
            Some(market) => market
                .into_record(Utc::now())
                .map_err(FetchError::Malformed),
            None => Err(FetchError::NotListed),
        }
    }

    async fn fetch_markets(&self, limit: u32) -> Result<Vec<TokenRecord>, FetchError> {
        let url = self.markets_url(limit);
        logger::debug(LogTag::Api, &format!("Fetching top {} tokens", limit));

        let markets: Vec<CoinGeckoMarket> = self.get_json(&url).await?;
        let total = markets.len();
        let now = Utc::now();

        let mut records = Vec::with_capacity(total);
        for market in markets {
            let id = market.id.clone();
            match market.into_record(now) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    logger::warning(
                        LogTag::Api,
                        &format!("Skipping malformed market row {}: {}", id, reason),
                    );
                }
            }
        }

        if records.is_empty() && total > 0 {
            return Err(FetchError::Malformed(
                "every market row failed validation".to_string(),
            ));
        }

        logger::debug(
            LogTag::Api,
            &format!("Fetched {} of {} market rows", records.len(), total),
        );
        Ok(records)
    }

    async fn fetch_market_chart(&self, id: &str, days: u32) -> Result<PriceHistory, FetchError> {
        let url = self.market_chart_url(id, days);
        logger::debug(
            LogTag::Api,
            &format!("Fetching {}-day chart for {}", days, id),
        );

        let chart: CoinGeckoMarketChart = self.get_json(&url).await?;
        Ok(chart.into_history(id, days, Utc::now()))
    }
}
