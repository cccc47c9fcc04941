/// Upstream market-data API clients
///
/// The tracker talks to upstream exclusively through [`MarketDataSource`],
/// so tests can script a fake source and the real CoinGecko client stays
/// swappable.
pub mod client;
pub mod coingecko;
pub mod types;

use async_trait::async_trait;

use crate::errors::FetchError;
use crate::tokens::types::{PriceHistory, TokenRecord};

/// Read-only market data source
///
/// Implementations must report every call attempt to the governor before the
/// network round-trip and classify every non-success outcome; see
/// [`coingecko::CoinGeckoClient`].
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch a single token by its upstream identifier
    async fn fetch_market(&self, id: &str) -> Result<TokenRecord, FetchError>;

    /// Fetch the top tokens by market cap
    async fn fetch_markets(&self, limit: u32) -> Result<Vec<TokenRecord>, FetchError>;

    /// Fetch the historical chart series for a token
    async fn fetch_market_chart(&self, id: &str, days: u32) -> Result<PriceHistory, FetchError>;
}
