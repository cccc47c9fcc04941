// Durable token cache (SQLite).
//
// The store is the sole owner of token state across process restarts. It
// never expires entries on its own; staleness is the tracker's decision.
// Writes pass the no-clobber guards: a negative or non-finite price and a
// last_updated older than the stored row are rejected, and the favorite
// flag always survives a replacement.
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::errors::StoreError;
use crate::logger::{self, LogTag};
use crate::tokens::types::{PriceHistory, TokenRecord};

/// SQLite-backed store of token records and chart series
#[derive(Clone)]
pub struct TokenStore {
    connection: Arc<Mutex<Connection>>,
}

/// Configure a connection for concurrent readers and a single writer
fn configure_connection(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "synchronous", "NORMAL")?;
    connection.pragma_update(None, "temp_store", "memory")?;
    connection.busy_timeout(std::time::Duration::from_millis(30_000))?;
    Ok(())
}

const TOKEN_COLUMNS: &str = "token_id, symbol, name, current_price, market_cap, volume_24h, \
     price_change_24h, price_change_percentage_24h, high_24h, low_24h, \
     circulating_supply, total_supply, ath, ath_change_percentage, atl, \
     atl_change_percentage, image, last_updated, is_favorite";

impl TokenStore {
    /// Open (or create) the store at the given path
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let connection = Connection::open(path)?;
        configure_connection(&connection)?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS tokens (
                token_id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                name TEXT NOT NULL,
                current_price REAL NOT NULL,
                market_cap REAL NOT NULL,
                volume_24h REAL NOT NULL,
                price_change_24h REAL NOT NULL,
                price_change_percentage_24h REAL NOT NULL,
                high_24h REAL,
                low_24h REAL,
                circulating_supply REAL,
                total_supply REAL,
                ath REAL,
                ath_change_percentage REAL,
                atl REAL,
                atl_change_percentage REAL,
                image TEXT,
                last_updated TEXT NOT NULL,
                is_favorite INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        connection.execute(
            "CREATE INDEX IF NOT EXISTS idx_tokens_market_cap ON tokens(market_cap DESC)",
            [],
        )?;
        connection.execute(
            "CREATE INDEX IF NOT EXISTS idx_tokens_symbol ON tokens(symbol)",
            [],
        )?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS price_history (
                token_id TEXT PRIMARY KEY,
                days INTEGER NOT NULL,
                prices TEXT NOT NULL,
                market_caps TEXT NOT NULL,
                total_volumes TEXT NOT NULL,
                fetched_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Point read by token identifier
    pub fn get(&self, token_id: &str) -> Result<Option<TokenRecord>, StoreError> {
        let conn = self.connection.lock().unwrap();
        get_locked(&conn, token_id)
    }

    /// Every cached record, sorted by market cap descending
    pub fn get_all(&self) -> Result<Vec<TokenRecord>, StoreError> {
        let conn = self.connection.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tokens ORDER BY market_cap DESC",
            TOKEN_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Timestamp of the most recently updated cached record
    pub fn newest_update(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.connection.lock().unwrap();
        let newest: Option<String> =
            conn.query_row("SELECT MAX(last_updated) FROM tokens", [], |row| row.get(0))?;
        Ok(newest.and_then(|s| parse_timestamp(&s).ok()))
    }

    /// Replace the record for an identifier, subject to the no-clobber guards
    pub fn upsert(&self, record: &TokenRecord) -> Result<(), StoreError> {
        let conn = self.connection.lock().unwrap();
        upsert_locked(&conn, record)
    }

    /// Bulk upsert; rejected rows are skipped and the written count returned
    pub fn upsert_many(&self, records: &[TokenRecord]) -> Result<usize, StoreError> {
        let conn = self.connection.lock().unwrap();
        let mut written = 0;

        for record in records {
            match upsert_locked(&conn, record) {
                Ok(()) => written += 1,
                Err(StoreError::RejectedWrite { token_id, reason }) => {
                    logger::debug(
                        LogTag::Store,
                        &format!("Skipping rejected write for {}: {}", token_id, reason),
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(written)
    }

    /// Mutate only the favorite flag, preserving every other field and the
    /// stored last_updated
    pub fn set_favorite(
        &self,
        token_id: &str,
        is_favorite: bool,
    ) -> Result<Option<TokenRecord>, StoreError> {
        let conn = self.connection.lock().unwrap();
        let changed = conn.execute(
            "UPDATE tokens SET is_favorite = ?2 WHERE token_id = ?1",
            params![token_id, is_favorite as i64],
        )?;

        if changed == 0 {
            return Ok(None);
        }
        get_locked(&conn, token_id)
    }

    /// Substring search over identifier, symbol and name
    pub fn search(&self, query: &str) -> Result<Vec<TokenRecord>, StoreError> {
        let conn = self.connection.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tokens
             WHERE token_id LIKE '%' || ?1 || '%'
                OR symbol LIKE '%' || ?1 || '%'
                OR name LIKE '%' || ?1 || '%'
             ORDER BY market_cap DESC",
            TOKEN_COLUMNS
        ))?;
        let rows = stmt.query_map(params![query], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Every record flagged as favorite, sorted by market cap descending
    pub fn get_favorites(&self) -> Result<Vec<TokenRecord>, StoreError> {
        let conn = self.connection.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tokens WHERE is_favorite = 1 ORDER BY market_cap DESC",
            TOKEN_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Replace the cached chart series for a token
    pub fn upsert_history(&self, history: &PriceHistory) -> Result<(), StoreError> {
        let conn = self.connection.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO price_history (
                token_id, days, prices, market_caps, total_volumes, fetched_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                history.token_id,
                history.days,
                serde_json::to_string(&history.prices)?,
                serde_json::to_string(&history.market_caps)?,
                serde_json::to_string(&history.total_volumes)?,
                format_timestamp(history.fetched_at),
            ],
        )?;
        Ok(())
    }

    /// Last cached chart series for a token, regardless of the requested window
    pub fn get_history(&self, token_id: &str) -> Result<Option<PriceHistory>, StoreError> {
        let conn = self.connection.lock().unwrap();
        let row: Option<(u32, String, String, String, String)> = conn
            .query_row(
                "SELECT days, prices, market_caps, total_volumes, fetched_at
                 FROM price_history WHERE token_id = ?1",
                params![token_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((days, prices, market_caps, total_volumes, fetched_at)) = row else {
            return Ok(None);
        };

        Ok(Some(PriceHistory {
            token_id: token_id.to_string(),
            days,
            prices: serde_json::from_str(&prices)?,
            market_caps: serde_json::from_str(&market_caps)?,
            total_volumes: serde_json::from_str(&total_volumes)?,
            fetched_at: parse_timestamp(&fetched_at).unwrap_or_else(|_| Utc::now()),
        }))
    }
}

fn get_locked(conn: &Connection, token_id: &str) -> Result<Option<TokenRecord>, StoreError> {
    let record = conn
        .query_row(
            &format!("SELECT {} FROM tokens WHERE token_id = ?1", TOKEN_COLUMNS),
            params![token_id],
            row_to_record,
        )
        .optional()?;
    Ok(record)
}

fn upsert_locked(conn: &Connection, record: &TokenRecord) -> Result<(), StoreError> {
    if !record.current_price.is_finite() || record.current_price < 0.0 {
        return Err(StoreError::RejectedWrite {
            token_id: record.token_id.clone(),
            reason: "negative or non-finite price".to_string(),
        });
    }

    let existing: Option<(String, i64)> = conn
        .query_row(
            "SELECT last_updated, is_favorite FROM tokens WHERE token_id = ?1",
            params![record.token_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let mut is_favorite = record.is_favorite;
    if let Some((stored_updated, stored_favorite)) = existing {
        if let Ok(stored_ts) = parse_timestamp(&stored_updated) {
            if record.last_updated < stored_ts {
                return Err(StoreError::RejectedWrite {
                    token_id: record.token_id.clone(),
                    reason: format!(
                        "last_updated {} older than stored {}",
                        record.last_updated, stored_ts
                    ),
                });
            }
        }
        is_favorite = stored_favorite != 0;
    }

    conn.execute(
        "INSERT OR REPLACE INTO tokens (
            token_id, symbol, name, current_price, market_cap, volume_24h,
            price_change_24h, price_change_percentage_24h, high_24h, low_24h,
            circulating_supply, total_supply, ath, ath_change_percentage, atl,
            atl_change_percentage, image, last_updated, is_favorite
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            record.token_id,
            record.symbol,
            record.name,
            record.current_price,
            record.market_cap,
            record.volume_24h,
            record.price_change_24h,
            record.price_change_percentage_24h,
            record.high_24h,
            record.low_24h,
            record.circulating_supply,
            record.total_supply,
            record.ath,
            record.ath_change_percentage,
            record.atl,
            record.atl_change_percentage,
            record.image,
            format_timestamp(record.last_updated),
            is_favorite as i64,
        ],
    )?;

    Ok(())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<TokenRecord> {
    let last_updated: String = row.get(17)?;
    let is_favorite: i64 = row.get(18)?;

    Ok(TokenRecord {
        token_id: row.get(0)?,
        symbol: row.get(1)?,
        name: row.get(2)?,
        current_price: row.get(3)?,
        market_cap: row.get(4)?,
        volume_24h: row.get(5)?,
        price_change_24h: row.get(6)?,
        price_change_percentage_24h: row.get(7)?,
        high_24h: row.get(8)?,
        low_24h: row.get(9)?,
        circulating_supply: row.get(10)?,
        total_supply: row.get(11)?,
        ath: row.get(12)?,
        ath_change_percentage: row.get(13)?,
        atl: row.get(14)?,
        atl_change_percentage: row.get(15)?,
        image: row.get(16)?,
        last_updated: parse_timestamp(&last_updated).map_err(|_| rusqlite::Error::InvalidQuery)?,
        is_favorite: is_favorite != 0,
    })
}

/// Fixed-width RFC 3339 so SQL MAX() stays chronological
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}
