//! SQLite persistence for copy configs and copy history.
//!
//! Stores everything needed to resume after restart:
//! - Copy configurations (who we follow and with how much)
//! - Per-config performance rollups
//! - Tracked accounts discovered from the leaderboard
//! - Copied trades and their execution status
//! - Seen fill ids, so a restart does not replay old fills

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

use crate::models::AccountMetrics;
use crate::trading::{AllocationMode, CopyConfig};

/// Database connection pool with full state management.
pub struct Database {
    pool: SqlitePool,
}

/// Copy config row as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredCopyConfig {
    pub id: i64,
    pub trader_address: String,
    pub trader_name: Option<String>,
    pub allocation: f64,
    pub allocation_mode: String,
    pub max_position: f64,
    pub is_active: bool,
    pub is_paused: bool,
    pub started_at: String,
    pub stopped_at: Option<String>,
}

impl StoredCopyConfig {
    pub fn to_config(&self) -> CopyConfig {
        CopyConfig {
            id: self.id,
            trader_address: self.trader_address.clone(),
            trader_name: self.trader_name.clone(),
            allocation: Decimal::try_from(self.allocation).unwrap_or_default(),
            mode: AllocationMode::from_str(&self.allocation_mode),
            max_position: Decimal::try_from(self.max_position).unwrap_or_default(),
            is_active: self.is_active,
            is_paused: self.is_paused,
        }
    }
}

/// Per-config performance rollup.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredPerformance {
    pub config_id: i64,
    pub total_trades: i64,
    pub winning_trades: i64,
    pub total_pnl: f64,
    pub total_volume: f64,
    pub roi: f64,
    pub max_drawdown: f64,
    pub best_trade_pnl: f64,
    pub worst_trade_pnl: f64,
    pub last_updated: String,
}

/// Copied trade record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredCopiedTrade {
    pub id: String,
    pub source_fill_id: i64,
    pub source_trader: String,
    pub coin: String,
    pub side: String,
    pub action: String,
    pub price: f64,
    pub size: f64,
    pub notional: f64,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: String,
}

impl Database {
    /// Create a new database connection.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run all database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS copy_configs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trader_address TEXT NOT NULL,
                trader_name TEXT,
                allocation REAL NOT NULL,
                allocation_mode TEXT NOT NULL DEFAULT 'fixed',
                max_position REAL NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_paused INTEGER NOT NULL DEFAULT 0,
                started_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                stopped_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS copy_performance (
                config_id INTEGER PRIMARY KEY,
                total_trades INTEGER NOT NULL DEFAULT 0,
                winning_trades INTEGER NOT NULL DEFAULT 0,
                total_pnl REAL NOT NULL DEFAULT 0,
                total_volume REAL NOT NULL DEFAULT 0,
                roi REAL NOT NULL DEFAULT 0,
                max_drawdown REAL NOT NULL DEFAULT 0,
                best_trade_pnl REAL NOT NULL DEFAULT 0,
                worst_trade_pnl REAL NOT NULL DEFAULT 0,
                last_updated TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (config_id) REFERENCES copy_configs(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tracked_accounts (
                address TEXT PRIMARY KEY,
                username TEXT,
                account_value REAL NOT NULL DEFAULT 0,
                total_pnl REAL NOT NULL DEFAULT 0,
                win_rate REAL NOT NULL DEFAULT 0,
                sharpe_ratio REAL NOT NULL DEFAULT 0,
                composite_score REAL NOT NULL DEFAULT 0,
                total_trades INTEGER NOT NULL DEFAULT 0,
                is_tracked INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS copied_trades (
                id TEXT PRIMARY KEY,
                source_fill_id INTEGER NOT NULL,
                source_trader TEXT NOT NULL,
                coin TEXT NOT NULL,
                side TEXT NOT NULL,
                action TEXT NOT NULL,
                price REAL NOT NULL,
                size REAL NOT NULL,
                notional REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                error_message TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seen_fills (
                trader_address TEXT NOT NULL,
                fill_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (trader_address, fill_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_copied_trades_trader ON copied_trades(source_trader)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_copy_configs_active ON copy_configs(is_active)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== Copy Configs ====================

    /// Create a copy config for a trader. Returns the new config id.
    pub async fn create_copy_config(
        &self,
        trader_address: &str,
        trader_name: Option<&str>,
        allocation: Decimal,
        mode: AllocationMode,
        max_position: Decimal,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO copy_configs (trader_address, trader_name, allocation, allocation_mode, max_position)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(trader_address)
        .bind(trader_name)
        .bind(allocation.to_f64().unwrap_or(0.0))
        .bind(mode.as_str())
        .bind(max_position.to_f64().unwrap_or(0.0))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// All active configs, paused ones included.
    pub async fn get_active_configs(&self) -> Result<Vec<CopyConfig>> {
        let rows = sqlx::query_as::<_, StoredCopyConfig>(
            "SELECT * FROM copy_configs WHERE is_active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch copy configs")?;

        Ok(rows.iter().map(StoredCopyConfig::to_config).collect())
    }

    pub async fn get_config_by_address(&self, trader_address: &str) -> Result<Option<CopyConfig>> {
        let row = sqlx::query_as::<_, StoredCopyConfig>(
            "SELECT * FROM copy_configs WHERE trader_address = ? AND is_active = 1",
        )
        .bind(trader_address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.to_config()))
    }

    pub async fn set_config_paused(&self, trader_address: &str, paused: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE copy_configs SET is_paused = ? WHERE trader_address = ? AND is_active = 1",
        )
        .bind(paused)
        .bind(trader_address)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deactivate a config. History is kept.
    pub async fn stop_copy_config(&self, trader_address: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE copy_configs SET is_active = 0, stopped_at = datetime('now')
            WHERE trader_address = ? AND is_active = 1
            "#,
        )
        .bind(trader_address)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Performance ====================

    /// Fold one closed trade into a config's performance rollup.
    pub async fn update_copy_performance(
        &self,
        config_id: i64,
        allocation: Decimal,
        trade_pnl: f64,
        trade_volume: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO copy_performance (
                config_id, total_trades, winning_trades, total_pnl, total_volume,
                best_trade_pnl, worst_trade_pnl, last_updated
            ) VALUES (?, 1, ?, ?, ?, ?, ?, datetime('now'))
            ON CONFLICT(config_id) DO UPDATE SET
                total_trades = total_trades + 1,
                winning_trades = winning_trades + excluded.winning_trades,
                total_pnl = total_pnl + excluded.total_pnl,
                total_volume = total_volume + excluded.total_volume,
                best_trade_pnl = MAX(best_trade_pnl, excluded.best_trade_pnl),
                worst_trade_pnl = MIN(worst_trade_pnl, excluded.worst_trade_pnl),
                last_updated = datetime('now')
            "#,
        )
        .bind(config_id)
        .bind(if trade_pnl > 0.0 { 1i64 } else { 0i64 })
        .bind(trade_pnl)
        .bind(trade_volume)
        .bind(trade_pnl)
        .bind(trade_pnl)
        .execute(&self.pool)
        .await?;

        let allocation = allocation.to_f64().unwrap_or(0.0);
        if allocation > 0.0 {
            sqlx::query(
                "UPDATE copy_performance SET roi = total_pnl / ? * 100 WHERE config_id = ?",
            )
            .bind(allocation)
            .bind(config_id)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    pub async fn get_performance(&self, config_id: i64) -> Result<Option<StoredPerformance>> {
        sqlx::query_as::<_, StoredPerformance>(
            "SELECT * FROM copy_performance WHERE config_id = ?",
        )
        .bind(config_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch performance")
    }

    // ==================== Tracked Accounts ====================

    /// Save or refresh a leaderboard account and its computed metrics.
    pub async fn upsert_tracked_account(
        &self,
        address: &str,
        username: Option<&str>,
        account_value: f64,
        metrics: &AccountMetrics,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tracked_accounts (
                address, username, account_value, total_pnl, win_rate,
                sharpe_ratio, composite_score, total_trades
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(address) DO UPDATE SET
                username = COALESCE(excluded.username, tracked_accounts.username),
                account_value = excluded.account_value,
                total_pnl = excluded.total_pnl,
                win_rate = excluded.win_rate,
                sharpe_ratio = excluded.sharpe_ratio,
                composite_score = excluded.composite_score,
                total_trades = excluded.total_trades,
                is_tracked = 1,
                updated_at = datetime('now')
            "#,
        )
        .bind(address)
        .bind(username)
        .bind(account_value)
        .bind(metrics.total_pnl.to_f64().unwrap_or(0.0))
        .bind(metrics.win_rate)
        .bind(metrics.sharpe_ratio)
        .bind(metrics.score())
        .bind(metrics.total_trades as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== Copied Trades ====================

    /// Record a copied trade in 'pending' status. Returns the record id.
    pub async fn record_copied_trade(
        &self,
        source_fill_id: u64,
        source_trader: &str,
        coin: &str,
        side: &str,
        action: &str,
        price: Decimal,
        size: Decimal,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let price_f = price.to_f64().unwrap_or(0.0);
        let size_f = size.to_f64().unwrap_or(0.0);

        sqlx::query(
            r#"
            INSERT INTO copied_trades (
                id, source_fill_id, source_trader, coin, side, action, price, size, notional
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(source_fill_id as i64)
        .bind(source_trader)
        .bind(coin)
        .bind(side)
        .bind(action)
        .bind(price_f)
        .bind(size_f)
        .bind(price_f * size_f)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn update_copied_trade_status(
        &self,
        id: &str,
        status: &str,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE copied_trades SET status = ?, error_message = ? WHERE id = ?")
            .bind(status)
            .bind(error)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_recent_copied_trades(
        &self,
        source_trader: &str,
        limit: i64,
    ) -> Result<Vec<StoredCopiedTrade>> {
        sqlx::query_as::<_, StoredCopiedTrade>(
            r#"
            SELECT * FROM copied_trades
            WHERE source_trader = ?
            ORDER BY created_at DESC LIMIT ?
            "#,
        )
        .bind(source_trader)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch copied trades")
    }

    // ==================== Seen Fills ====================

    /// Replace a trader's persisted seen-fill ids with the given set,
    /// ordered oldest first.
    pub async fn save_seen_fills(&self, trader_address: &str, fill_ids: &[u64]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM seen_fills WHERE trader_address = ?")
            .bind(trader_address)
            .execute(&mut *tx)
            .await?;

        for (pos, id) in fill_ids.iter().enumerate() {
            sqlx::query(
                "INSERT OR IGNORE INTO seen_fills (trader_address, fill_id, position) VALUES (?, ?, ?)",
            )
            .bind(trader_address)
            .bind(*id as i64)
            .bind(pos as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Persisted seen-fill ids for a trader, oldest first.
    pub async fn load_seen_fills(&self, trader_address: &str) -> Result<Vec<u64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT fill_id FROM seen_fills WHERE trader_address = ? ORDER BY position",
        )
        .bind(trader_address)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id as u64).collect())
    }

    /// Get the connection pool (for advanced queries).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // A named shared-cache memory database, so every pool connection sees
    // the same tables.
    async fn test_db() -> Database {
        let url = format!("sqlite:file:{}?mode=memory&cache=shared", Uuid::new_v4());
        Database::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn copy_config_round_trip() {
        let db = test_db().await;
        let id = db
            .create_copy_config("0xabc", Some("whale"), dec!(500), AllocationMode::Fixed, dec!(2000))
            .await
            .unwrap();

        let configs = db.get_active_configs().await.unwrap();
        assert_eq!(configs.len(), 1);
        let cfg = &configs[0];
        assert_eq!(cfg.id, id);
        assert_eq!(cfg.trader_address, "0xabc");
        assert_eq!(cfg.allocation, dec!(500));
        assert_eq!(cfg.mode, AllocationMode::Fixed);
        assert!(!cfg.is_paused);
    }

    #[tokio::test]
    async fn pause_and_stop_lifecycle() {
        let db = test_db().await;
        db.create_copy_config("0xabc", None, dec!(100), AllocationMode::Fixed, dec!(1000))
            .await
            .unwrap();

        assert!(db.set_config_paused("0xabc", true).await.unwrap());
        let cfg = db.get_config_by_address("0xabc").await.unwrap().unwrap();
        assert!(cfg.is_paused);

        assert!(db.stop_copy_config("0xabc").await.unwrap());
        assert!(db.get_config_by_address("0xabc").await.unwrap().is_none());
        // Stopping again affects nothing.
        assert!(!db.stop_copy_config("0xabc").await.unwrap());
    }

    #[tokio::test]
    async fn performance_rollup_accumulates() {
        let db = test_db().await;
        let id = db
            .create_copy_config("0xabc", None, dec!(1000), AllocationMode::Fixed, dec!(5000))
            .await
            .unwrap();

        db.update_copy_performance(id, dec!(1000), 50.0, 500.0).await.unwrap();
        db.update_copy_performance(id, dec!(1000), -20.0, 300.0).await.unwrap();

        let perf = db.get_performance(id).await.unwrap().unwrap();
        assert_eq!(perf.total_trades, 2);
        assert_eq!(perf.winning_trades, 1);
        assert!((perf.total_pnl - 30.0).abs() < 1e-9);
        assert!((perf.best_trade_pnl - 50.0).abs() < 1e-9);
        assert!((perf.worst_trade_pnl + 20.0).abs() < 1e-9);
        assert!((perf.roi - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn seen_fills_round_trip_in_order() {
        let db = test_db().await;
        db.save_seen_fills("0xabc", &[9, 2, 5]).await.unwrap();
        assert_eq!(db.load_seen_fills("0xabc").await.unwrap(), vec![9, 2, 5]);

        // A save replaces the previous set wholesale.
        db.save_seen_fills("0xabc", &[5, 7]).await.unwrap();
        assert_eq!(db.load_seen_fills("0xabc").await.unwrap(), vec![5, 7]);
    }

    #[tokio::test]
    async fn copied_trade_status_updates() {
        let db = test_db().await;
        let id = db
            .record_copied_trade(42, "0xabc", "ETH", "buy", "entry", dec!(100), dec!(1))
            .await
            .unwrap();

        db.update_copied_trade_status(&id, "executed", None).await.unwrap();
        let trades = db.get_recent_copied_trades("0xabc", 10).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].status, "executed");
        assert_eq!(trades[0].source_fill_id, 42);
    }
}
