use std::sync::Arc;

use crate::domain::{Account, Clock, IdGenerator, LedgerEntry, Schedule, SystemClock};
use crate::storage::Database;

use super::{
    AppError, IntegrityReport, QueryEngine, ScheduleEngine, ScheduleRequest, ScheduleResult,
    TransferEngine, TransferRequest, TransferResult,
};

/// Rows written by `LedgerService::seed_demo_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoSeed {
    pub accounts: usize,
    pub schedules: usize,
}

/// Application service bundling the engines over one database.
/// This is the primary interface for any client (HTTP, CLI).
#[derive(Clone)]
pub struct LedgerService {
    db: Database,
    transfers: TransferEngine,
    schedules: ScheduleEngine,
    queries: QueryEngine,
}

impl LedgerService {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    /// Build the service around a specific clock, for tests and replays.
    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        let ids = IdGenerator::shared();
        Self {
            transfers: TransferEngine::new(db.clone(), clock.clone(), ids.clone()),
            schedules: ScheduleEngine::new(&db, clock, ids),
            queries: QueryEngine::new(&db),
            db,
        }
    }

    /// Open the database at `location`, creating it and applying migrations as needed.
    pub async fn init(location: &str) -> Result<Self, AppError> {
        Ok(Self::new(Database::init(location).await?))
    }

    /// Connect to an existing database. Migrations are still applied; they are idempotent.
    pub async fn connect(location: &str) -> Result<Self, AppError> {
        Self::init(location).await
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // ========================
    // Accounts
    // ========================

    pub async fn open_account(&self, account: &Account) -> Result<(), AppError> {
        if account.account_number.trim().is_empty() {
            return Err(AppError::validation("account number is required"));
        }
        if account.balance < 0 {
            return Err(AppError::validation("opening balance cannot be negative"));
        }
        if account.available_balance < 0 || account.available_balance > account.balance {
            return Err(AppError::validation(
                "available balance must be between zero and the opening balance",
            ));
        }
        Ok(self.db.accounts().insert_account(account).await?)
    }

    /// Load the demo customers and their pending schedules. Safe to run more than once.
    pub async fn seed_demo_data(&self) -> Result<DemoSeed, AppError> {
        let accounts = self.db.accounts().seed_demo_accounts().await?;
        let schedules = self.schedules.seed_demo_schedules().await?;
        Ok(DemoSeed {
            accounts,
            schedules,
        })
    }

    pub async fn get_balance(&self, account_number: &str) -> Result<Account, AppError> {
        self.queries.get_balance(account_number).await
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        self.queries.list_accounts().await
    }

    // ========================
    // Transfers
    // ========================

    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferResult, AppError> {
        self.transfers.execute(request).await
    }

    pub async fn transfer_with_id(
        &self,
        transaction_id: &str,
        request: &TransferRequest,
    ) -> Result<TransferResult, AppError> {
        self.transfers.execute_with_id(transaction_id, request).await
    }

    pub fn next_transaction_id(&self) -> String {
        self.transfers.next_transaction_id()
    }

    pub async fn list_transactions(&self, account_number: &str) -> Result<Vec<LedgerEntry>, AppError> {
        self.queries.list_transactions(account_number).await
    }

    pub async fn list_all_transactions(&self) -> Result<Vec<LedgerEntry>, AppError> {
        self.queries.list_all_transactions().await
    }

    // ========================
    // Schedules
    // ========================

    pub async fn create_schedule(
        &self,
        request: &ScheduleRequest,
    ) -> Result<ScheduleResult, AppError> {
        self.schedules.create_schedule(request).await
    }

    pub async fn list_schedules(&self, account_number: &str) -> Result<Vec<Schedule>, AppError> {
        self.schedules.list_due(account_number).await
    }

    // ========================
    // Integrity
    // ========================

    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        self.queries.reconcile().await
    }
}
