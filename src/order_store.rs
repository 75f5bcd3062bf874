use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::model::order::{OrderDirection, TradeRecord, TradeStatus};

/// Aggregate outcome of settled trades.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JournalSummary {
    pub trade_count: u32,
    pub win_count: u32,
    pub lose_count: u32,
    pub net_profit: f64,
}

impl JournalSummary {
    pub fn win_rate_percent(&self) -> f64 {
        let decided = self.win_count + self.lose_count;
        if decided == 0 {
            return 0.0;
        }
        self.win_count as f64 / decided as f64 * 100.0
    }
}

/// SQLite record of practice trades, one row per order id.
pub struct TradeJournal {
    conn: Connection,
}

impl TradeJournal {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS trade_journal (
                order_id TEXT PRIMARY KEY,
                instrument TEXT NOT NULL,
                direction TEXT NOT NULL,
                amount REAL NOT NULL,
                entry_price REAL NOT NULL,
                opened_at_ms INTEGER NOT NULL,
                expires_at_ms INTEGER NOT NULL,
                status TEXT NOT NULL,
                payout REAL NOT NULL,
                updated_at_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trade_journal_opened
                ON trade_journal (instrument, opened_at_ms);
            "#,
        )
        .context("failed to create trade_journal schema")?;
        Ok(Self { conn })
    }

    /// Insert a new trade or overwrite its settlement fields.
    pub fn upsert_trade(&self, trade: &TradeRecord) -> Result<()> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            r#"
            INSERT INTO trade_journal (
                order_id, instrument, direction, amount, entry_price,
                opened_at_ms, expires_at_ms, status, payout, updated_at_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(order_id) DO UPDATE SET
                status = excluded.status,
                payout = excluded.payout,
                updated_at_ms = excluded.updated_at_ms
            "#,
            params![
                trade.order_id,
                trade.instrument,
                trade.direction.as_str(),
                trade.amount,
                trade.entry_price,
                trade.opened_at_ms as i64,
                trade.expires_at_ms as i64,
                trade.status.as_str(),
                trade.payout,
                now_ms,
            ],
        )?;
        Ok(())
    }

    /// Newest-first trades, optionally restricted to one instrument.
    pub fn recent_trades(&self, instrument: Option<&str>, limit: usize) -> Result<Vec<TradeRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT order_id, instrument, direction, amount, entry_price,
                   opened_at_ms, expires_at_ms, status, payout
            FROM trade_journal
            WHERE ?1 IS NULL OR instrument = ?1
            ORDER BY opened_at_ms DESC, order_id DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![instrument, limit as i64], |row| {
            let direction: String = row.get(2)?;
            let status: String = row.get(7)?;
            Ok(TradeRecord {
                order_id: row.get(0)?,
                instrument: row.get(1)?,
                direction: OrderDirection::from_str_lossy(&direction)
                    .unwrap_or(OrderDirection::Call),
                amount: row.get(3)?,
                entry_price: row.get(4)?,
                opened_at_ms: row.get::<_, i64>(5)? as u64,
                expires_at_ms: row.get::<_, i64>(6)? as u64,
                status: TradeStatus::from_str_lossy(&status),
                payout: row.get(8)?,
            })
        })?;

        let mut trades = Vec::new();
        for row in rows {
            trades.push(row?);
        }
        Ok(trades)
    }

    pub fn summary(&self, instrument: Option<&str>) -> Result<JournalSummary> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT status, amount, payout
            FROM trade_journal
            WHERE (?1 IS NULL OR instrument = ?1) AND status != 'OPEN'
            "#,
        )?;
        let rows = stmt.query_map(params![instrument], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;

        let mut summary = JournalSummary::default();
        for row in rows {
            let (status, amount, payout) = row?;
            summary.trade_count += 1;
            match TradeStatus::from_str_lossy(&status) {
                TradeStatus::Won => summary.win_count += 1,
                TradeStatus::Lost => summary.lose_count += 1,
                _ => {}
            }
            summary.net_profit += payout - amount;
        }
        Ok(summary)
    }
}
