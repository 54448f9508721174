mod accounts;
mod ledger;
mod schedules;

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};

pub use accounts::*;
pub use ledger::*;
pub use schedules::*;

/// SQL migration for accounts and the ledger
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// SQL migration for scheduled transfers
pub const MIGRATION_002_SCHEDULES: &str = include_str!("migrations/002_schedules.sql");

/// One atomic, isolated sequence of store operations. Dropping it without `commit` rolls back.
pub type UnitOfWork<'c> = sqlx::Transaction<'c, Sqlite>;

/// How long a unit of work waits for a competing writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the SQLite database shared by all stores.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `location`, which may be a plain file path or
    /// a `sqlite:` URL.
    pub async fn connect(location: &str) -> Result<Self> {
        let options = if location.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(location)
                .with_context(|| format!("Invalid database URL: {location}"))?
        } else {
            SqliteConnectOptions::new().filename(location)
        };

        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .acquire_timeout(BUSY_TIMEOUT * 2)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Every statement is idempotent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::raw_sql(MIGRATION_002_SCHEDULES)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(location: &str) -> Result<Self> {
        let db = Self::connect(location).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Start a unit of work.
    pub async fn begin(&self) -> Result<UnitOfWork<'static>> {
        self.pool
            .begin()
            .await
            .context("Failed to start unit of work")
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn accounts(&self) -> AccountStore {
        AccountStore::new(self.pool.clone())
    }

    pub fn ledger(&self) -> LedgerWriter {
        LedgerWriter::new(self.pool.clone())
    }

    pub fn schedules(&self) -> ScheduleStore {
        ScheduleStore::new(self.pool.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
