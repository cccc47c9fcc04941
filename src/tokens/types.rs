/// Core types for the token tracking system
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached market snapshot for a single token
///
/// THE primary token type used everywhere in coinwatch. One row per upstream
/// identifier; the store guarantees `last_updated` never moves backwards and
/// `current_price` is never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token_id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub price_change_24h: f64,
    pub price_change_percentage_24h: f64,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub ath: Option<f64>,
    pub ath_change_percentage: Option<f64>,
    pub atl: Option<f64>,
    pub atl_change_percentage: Option<f64>,
    pub image: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub is_favorite: bool,
}

/// Cached historical chart series for a single token
///
/// Series entries are `(unix_millis, value)` pairs as delivered upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub token_id: String,
    pub days: u32,
    pub prices: Vec<(i64, f64)>,
    pub market_caps: Vec<(i64, f64)>,
    pub total_volumes: Vec<(i64, f64)>,
    pub fetched_at: DateTime<Utc>,
}

/// Aggregate view over every cached token
#[derive(Debug, Clone, Serialize)]
pub struct TokenStats {
    pub total_tokens: usize,
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub avg_price_change_24h: f64,
    pub biggest_gainer: Option<TokenRecord>,
    pub biggest_loser: Option<TokenRecord>,
}

impl TokenStats {
    pub fn empty() -> Self {
        Self {
            total_tokens: 0,
            total_market_cap: 0.0,
            total_volume_24h: 0.0,
            avg_price_change_24h: 0.0,
            biggest_gainer: None,
            biggest_loser: None,
        }
    }

    /// Compute aggregates over a set of cached records
    pub fn from_records(records: &[TokenRecord]) -> Self {
        if records.is_empty() {
            return Self::empty();
        }

        let total_market_cap: f64 = records.iter().map(|t| t.market_cap).sum();
        let total_volume_24h: f64 = records.iter().map(|t| t.volume_24h).sum();
        let avg_price_change_24h: f64 = records
            .iter()
            .map(|t| t.price_change_percentage_24h)
            .sum::<f64>()
            / records.len() as f64;

        let biggest_gainer = records
            .iter()
            .max_by(|a, b| {
                a.price_change_percentage_24h
                    .partial_cmp(&b.price_change_percentage_24h)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned();

        let biggest_loser = records
            .iter()
            .min_by(|a, b| {
                a.price_change_percentage_24h
                    .partial_cmp(&b.price_change_percentage_24h)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned();

        Self {
            total_tokens: records.len(),
            total_market_cap,
            total_volume_24h,
            avg_price_change_24h,
            biggest_gainer,
            biggest_loser,
        }
    }
}
