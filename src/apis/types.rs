/// Wire types for the CoinGecko API
///
/// Upstream JSON decodes into optional-field structs; validation into the
/// internal record types happens here, once, so nothing downstream ever
/// handles malformed data.
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::tokens::types::{PriceHistory, TokenRecord};

/// Raw row from `/coins/markets`
///
/// Every numeric field is optional: the free tier regularly returns nulls
/// for thin markets. [`CoinGeckoMarket::into_record`] decides which gaps are
/// tolerable and which make the row malformed.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinGeckoMarket {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub total_volume: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub ath: Option<f64>,
    pub ath_change_percentage: Option<f64>,
    pub atl: Option<f64>,
    pub atl_change_percentage: Option<f64>,
}

impl CoinGeckoMarket {
    /// Validate a market row into a cacheable record
    ///
    /// Required: non-empty identity fields and finite, non-negative price,
    /// market cap and volume. `high_24h < low_24h` marks the row malformed
    /// rather than silently swapping the pair.
    pub fn into_record(self, now: DateTime<Utc>) -> Result<TokenRecord, String> {
        if self.id.is_empty() || self.symbol.is_empty() || self.name.is_empty() {
            return Err("missing identity fields".to_string());
        }

        let current_price = require_non_negative("current_price", self.current_price)?;
        let market_cap = require_non_negative("market_cap", self.market_cap)?;
        let volume_24h = require_non_negative("total_volume", self.total_volume)?;

        if let (Some(high), Some(low)) = (self.high_24h, self.low_24h) {
            if high < low {
                return Err(format!("high_24h {} below low_24h {}", high, low));
            }
        }

        Ok(TokenRecord {
            token_id: self.id,
            symbol: self.symbol,
            name: self.name,
            current_price,
            market_cap,
            volume_24h,
            price_change_24h: self.price_change_24h.unwrap_or(0.0),
            price_change_percentage_24h: self.price_change_percentage_24h.unwrap_or(0.0),
            high_24h: self.high_24h,
            low_24h: self.low_24h,
            circulating_supply: self.circulating_supply,
            total_supply: self.total_supply,
            ath: self.ath,
            ath_change_percentage: self.ath_change_percentage,
            atl: self.atl,
            atl_change_percentage: self.atl_change_percentage,
            image: self.image,
            last_updated: now,
            is_favorite: false,
        })
    }
}

fn require_non_negative(field: &str, value: Option<f64>) -> Result<f64, String> {
    match value {
        None => Err(format!("missing required field {}", field)),
        Some(v) if !v.is_finite() => Err(format!("non-finite {}", field)),
        Some(v) if v < 0.0 => Err(format!("negative {}", field)),
        Some(v) => Ok(v),
    }
}

/// Raw response from `/coins/{id}/market_chart`
///
/// Series entries arrive as `[unix_millis, value]` pairs.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinGeckoMarketChart {
    pub prices: Vec<(f64, f64)>,
    pub market_caps: Vec<(f64, f64)>,
    pub total_volumes: Vec<(f64, f64)>,
}

impl CoinGeckoMarketChart {
    pub fn into_history(self, token_id: &str, days: u32, now: DateTime<Utc>) -> PriceHistory {
        PriceHistory {
            token_id: token_id.to_string(),
            days,
            prices: convert_series(self.prices),
            market_caps: convert_series(self.market_caps),
            total_volumes: convert_series(self.total_volumes),
            fetched_at: now,
        }
    }
}

fn convert_series(series: Vec<(f64, f64)>) -> Vec<(i64, f64)> {
    series.into_iter().map(|(ts, v)| (ts as i64, v)).collect()
}
