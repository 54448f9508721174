use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::{Account, LedgerEntry, PairViolation, check_ledger_pairs, net_movements};
use crate::storage::{AccountStore, Database, LedgerWriter};

use super::AppError;

/// Result of reconciling the ledger against itself and the account table.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub account_count: usize,
    pub transaction_count: usize,
    pub entry_count: usize,
    /// Sum of every account balance. Transfers never change it.
    pub total_balance: i128,
    /// Sum of every ledger amount; zero on a consistent ledger.
    pub net_ledger_total: i128,
    pub violations: Vec<PairViolation>,
    /// Ledger rows whose owning account is not in the account table.
    pub unknown_accounts: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.net_ledger_total == 0 && self.violations.is_empty() && self.unknown_accounts.is_empty()
    }
}

/// Read-only views over accounts and the ledger.
#[derive(Clone)]
pub struct QueryEngine {
    accounts: AccountStore,
    ledger: LedgerWriter,
}

impl QueryEngine {
    pub fn new(db: &Database) -> Self {
        Self {
            accounts: db.accounts(),
            ledger: db.ledger(),
        }
    }

    pub async fn get_balance(&self, account_number: &str) -> Result<Account, AppError> {
        self.accounts
            .get_account(account_number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_number.to_string()))
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(self.accounts.list_accounts().await?)
    }

    /// Statement for one account, newest first. An unknown account simply has no entries.
    pub async fn list_transactions(&self, account_number: &str) -> Result<Vec<LedgerEntry>, AppError> {
        Ok(self.ledger.list_by_account(account_number).await?)
    }

    pub async fn list_all_transactions(&self) -> Result<Vec<LedgerEntry>, AppError> {
        Ok(self.ledger.list_all().await?)
    }

    /// Check every transaction for the pairing rules and compare the ledger with the accounts.
    pub async fn reconcile(&self) -> Result<IntegrityReport, AppError> {
        let accounts = self.accounts.list_accounts().await?;
        let entries = self.ledger.list_all().await?;
        Ok(build_report(&accounts, &entries))
    }
}

fn build_report(accounts: &[Account], entries: &[LedgerEntry]) -> IntegrityReport {
    let known: BTreeSet<&str> = accounts.iter().map(|a| a.account_number.as_str()).collect();
    let movements = net_movements(entries);

    let mut unknown_accounts: Vec<String> = movements
        .keys()
        .filter(|n| !known.contains(n.as_str()))
        .cloned()
        .collect();
    unknown_accounts.sort();

    let transaction_count = entries
        .iter()
        .map(|e| e.transaction_id.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    IntegrityReport {
        account_count: accounts.len(),
        transaction_count,
        entry_count: entries.len(),
        total_balance: accounts.iter().map(|a| i128::from(a.balance)).sum(),
        net_ledger_total: movements.values().sum(),
        violations: check_ledger_pairs(entries),
        unknown_accounts,
    }
}
