//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `accounts` - Account records
//! - `transactions` - Transaction records and window queries
//! - `liabilities` - Credit card statement state
//! - `consent` - Opt-in / opt-out records
//! - `profiles` - Append-only profile history and the review queue
//!
//! Computation never talks to SQLite directly: signal extraction and alerting
//! read through the [`FinancialStore`] trait, which both [`Database`] and an
//! in-memory [`UserSnapshot`] implement.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, ErrorCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{Account, Liability, SnapshotFile, Transaction, UserSnapshot};

mod accounts;
mod consent;
mod liabilities;
mod profiles;
mod transactions;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Attempts for operations that hit a busy or locked database
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

/// Read access to one user's raw financial records
pub trait FinancialStore {
    fn accounts(&self, user_id: &str) -> Result<Vec<Account>>;

    /// Transactions with `from <= date <= to`, oldest first
    fn transactions_between(&self, user_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<Transaction>>;

    /// Every transaction for the user, oldest first
    fn all_transactions(&self, user_id: &str) -> Result<Vec<Transaction>>;

    fn liabilities(&self, user_id: &str) -> Result<Vec<Liability>>;
}

impl FinancialStore for UserSnapshot {
    fn accounts(&self, user_id: &str) -> Result<Vec<Account>> {
        if user_id != self.user_id {
            return Ok(Vec::new());
        }
        Ok(self.accounts.clone())
    }

    fn transactions_between(&self, user_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<Transaction>> {
        Ok(self
            .all_transactions(user_id)?
            .into_iter()
            .filter(|t| t.date >= from && t.date <= to)
            .collect())
    }

    fn all_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        if user_id != self.user_id {
            return Ok(Vec::new());
        }
        let mut txs = self.transactions.clone();
        txs.sort_by_key(|t| t.date);
        Ok(txs)
    }

    fn liabilities(&self, user_id: &str) -> Result<Vec<Liability>> {
        if user_id != self.user_id {
            return Ok(Vec::new());
        }
        Ok(self.liabilities.clone())
    }
}

/// Parse a stored timestamp (RFC 3339, or SQLite's `CURRENT_TIMESTAMP` format)
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a stored `YYYY-MM-DD` date column
pub(crate) fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn is_busy(err: &Error) -> bool {
    match err {
        Error::Database(rusqlite::Error::SqliteFailure(e, _)) => {
            matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        }
        _ => false,
    }
}

/// Counts from loading a snapshot file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadSummary {
    pub users: usize,
    pub accounts: usize,
    pub transactions: usize,
    pub liabilities: usize,
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) a database and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 2000;")
        });
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a unique temporary file rather than `:memory:` because every
    /// pooled connection to `:memory:` would see a different database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("tally_test_{}_{}.db", std::process::id(), id));

        // Remove any leftover file from an earlier run
        let _ = std::fs::remove_file(&path);

        Self::new(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run an operation, retrying with exponential backoff while SQLite
    /// reports the database busy or locked
    pub fn with_retry<T>(&self, mut op: impl FnMut(&Connection) -> Result<T>) -> Result<T> {
        let mut attempt = 1;
        loop {
            let conn = self.conn()?;
            match op(&*conn) {
                Err(e) if is_busy(&e) && attempt < RETRY_ATTEMPTS => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "Database busy, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            -- Account and transaction ids come from the snapshot and are only unique per user
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT NOT NULL,
                user_id TEXT NOT NULL REFERENCES users(id),
                account_type TEXT NOT NULL,                 -- checking, savings, money_market, hsa, credit, other
                balance_current REAL NOT NULL DEFAULT 0,
                credit_limit REAL,                          -- credit accounts only
                number_masked TEXT,
                PRIMARY KEY (user_id, id)
            );

            CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts(user_id);

            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER NOT NULL,
                user_id TEXT NOT NULL REFERENCES users(id),
                account_id TEXT NOT NULL,
                date TEXT NOT NULL,                         -- YYYY-MM-DD
                amount REAL NOT NULL,                       -- negative = expense
                merchant TEXT NOT NULL DEFAULT '',
                merchant_entity_id TEXT,
                payment_channel TEXT NOT NULL DEFAULT 'other',
                pfc_primary TEXT NOT NULL DEFAULT 'other',
                pending INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, id)
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);

            CREATE TABLE IF NOT EXISTS liabilities (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                account_id TEXT NOT NULL,
                liability_type TEXT NOT NULL,
                apr_percent REAL NOT NULL DEFAULT 0,
                min_payment REAL NOT NULL DEFAULT 0,
                last_payment REAL NOT NULL DEFAULT 0,
                last_stmt_bal REAL NOT NULL DEFAULT 0,
                is_overdue INTEGER NOT NULL DEFAULT 0,
                UNIQUE(user_id, account_id, liability_type)
            );

            CREATE TABLE IF NOT EXISTS consent (
                user_id TEXT PRIMARY KEY REFERENCES users(id),
                status TEXT NOT NULL,                       -- OPTED_IN, OPTED_OUT
                updated_at TEXT NOT NULL
            );

            -- Profiles are append-only; each row is one (user, window) computation
            CREATE TABLE IF NOT EXISTS profiles (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                window_days INTEGER NOT NULL,
                persona TEXT NOT NULL,
                persona_reason TEXT NOT NULL,
                signals TEXT NOT NULL,                      -- JSON
                decision_trace TEXT NOT NULL,               -- JSON
                trace_digest TEXT NOT NULL,                 -- SHA-256 of decision_trace
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_profiles_user_window ON profiles(user_id, window_days, id);

            CREATE TABLE IF NOT EXISTS review_items (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                profile_id INTEGER REFERENCES profiles(id),
                reason TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',     -- pending, approved, overridden
                notes TEXT,
                created_at TEXT NOT NULL,
                decided_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_review_items_status ON review_items(status);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }

    /// All known user ids, sorted
    pub fn list_users(&self) -> Result<Vec<String>> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM users ORDER BY id")?;
            let users = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(users)
        })
    }

    /// Load a snapshot file
    ///
    /// Each user's accounts, transactions and liabilities are replaced by the
    /// snapshot's, so loading the same file twice leaves the same data.
    pub fn load_snapshot(&self, snapshot: &SnapshotFile) -> Result<LoadSummary> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut summary = LoadSummary::default();

        for user in &snapshot.users {
            if user.user_id.trim().is_empty() {
                return Err(Error::InvalidData("Snapshot user with empty user_id".into()));
            }
            ensure_user(&tx, &user.user_id)?;

            tx.execute("DELETE FROM transactions WHERE user_id = ?", params![user.user_id])?;
            tx.execute("DELETE FROM liabilities WHERE user_id = ?", params![user.user_id])?;
            tx.execute("DELETE FROM accounts WHERE user_id = ?", params![user.user_id])?;

            for account in &user.accounts {
                accounts::insert(&tx, &user.user_id, account)?;
            }
            for transaction in &user.transactions {
                transactions::insert(&tx, &user.user_id, transaction)?;
            }
            for liability in &user.liabilities {
                liabilities::insert(&tx, &user.user_id, liability)?;
            }
            if let Some(status) = user.consent {
                consent::upsert(&tx, &user.user_id, status, Utc::now())?;
            }

            summary.users += 1;
            summary.accounts += user.accounts.len();
            summary.transactions += user.transactions.len();
            summary.liabilities += user.liabilities.len();
        }

        tx.commit()?;
        debug!(?summary, "Loaded snapshot");
        Ok(summary)
    }
}

fn ensure_user(conn: &Connection, user_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO users (id, created_at) VALUES (?, ?)",
        params![user_id, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

impl FinancialStore for Database {
    fn accounts(&self, user_id: &str) -> Result<Vec<Account>> {
        self.with_retry(|conn| accounts::for_user(conn, user_id))
    }

    fn transactions_between(&self, user_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<Transaction>> {
        self.with_retry(|conn| transactions::between(conn, user_id, Some((from, to))))
    }

    fn all_transactions(&self, user_id: &str) -> Result<Vec<Transaction>> {
        self.with_retry(|conn| transactions::between(conn, user_id, None))
    }

    fn liabilities(&self, user_id: &str) -> Result<Vec<Liability>> {
        self.with_retry(|conn| liabilities::for_user(conn, user_id))
    }
}

#[cfg(test)]
mod tests;
