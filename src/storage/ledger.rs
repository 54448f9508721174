use anyhow::{Context, Result, anyhow};
use sqlx::{Row, SqlitePool};

use crate::domain::{LedgerEntry, LegPair, LegType, format_timestamp, parse_timestamp};

use super::UnitOfWork;

const ENTRY_COLUMNS: &str = "sequence, transaction_id, account_number, from_account, to_account, \
     to_account_name, to_bank, type, amount, currency, note, transferred_at";

/// Outcome of appending a transfer's two legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// Legs for this transaction id already exist; nothing was written.
    DuplicateTransaction,
}

/// Owns the append-only `ledger_entries` table.
#[derive(Clone)]
pub struct LedgerWriter {
    pool: SqlitePool,
}

impl LedgerWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write the debit and credit legs of a transfer inside `uow`, as one statement so either
    /// both rows are written or neither is.
    pub async fn append_pair(
        &self,
        uow: &mut UnitOfWork<'_>,
        pair: &LegPair<'_>,
    ) -> Result<AppendOutcome> {
        let [debit, credit] = pair.entries();
        let transferred_at = format_timestamp(pair.transferred_at);

        let mut query = sqlx::query(
            r#"
            INSERT INTO ledger_entries (transaction_id, account_number, from_account, to_account, to_account_name, to_bank, type, amount, currency, note, transferred_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?),
                   (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        );
        for leg in [&debit, &credit] {
            query = query
                .bind(&leg.transaction_id)
                .bind(&leg.account_number)
                .bind(&leg.from_account)
                .bind(&leg.to_account)
                .bind(&leg.to_account_name)
                .bind(&leg.to_bank)
                .bind(leg.leg_type.as_str())
                .bind(leg.amount)
                .bind(&leg.currency)
                .bind(&leg.note)
                .bind(&transferred_at);
        }

        match query.execute(&mut **uow).await {
            Ok(_) => Ok(AppendOutcome::Appended),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Ok(AppendOutcome::DuplicateTransaction)
            }
            Err(err) => Err(err).context("Failed to append ledger entries"),
        }
    }

    /// Legs already recorded under `transaction_id`.
    pub async fn find_transaction(&self, transaction_id: &str) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE transaction_id = ? ORDER BY sequence"
        ))
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to look up transaction")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Same as `find_transaction`, but read inside `uow`.
    pub async fn find_transaction_in(
        &self,
        uow: &mut UnitOfWork<'_>,
        transaction_id: &str,
    ) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE transaction_id = ? ORDER BY sequence"
        ))
        .bind(transaction_id)
        .fetch_all(&mut **uow)
        .await
        .context("Failed to look up transaction")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Entries on `account_number`'s statement, newest first. Equal timestamps are ordered by
    /// insertion, newest first.
    pub async fn list_by_account(&self, account_number: &str) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM ledger_entries
            WHERE account_number = ?
            ORDER BY transferred_at DESC, sequence DESC
            "#
        ))
        .bind(account_number)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions for account")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Every entry, same ordering as `list_by_account`.
    pub async fn list_all(&self) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM ledger_entries
            ORDER BY transferred_at DESC, sequence DESC
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<LedgerEntry> {
        let leg_type_str: String = row.get("type");
        let transferred_at_str: String = row.get("transferred_at");

        Ok(LedgerEntry {
            sequence: row.get("sequence"),
            transaction_id: row.get("transaction_id"),
            account_number: row.get("account_number"),
            from_account: row.get("from_account"),
            to_account: row.get("to_account"),
            to_account_name: row.get("to_account_name"),
            to_bank: row.get("to_bank"),
            leg_type: LegType::from_str(&leg_type_str)
                .ok_or_else(|| anyhow!("Invalid leg type: {}", leg_type_str))?,
            amount: row.get("amount"),
            currency: row.get("currency"),
            note: row.get("note"),
            transferred_at: parse_timestamp(&transferred_at_str)
                .context("Invalid transferred_at timestamp")?,
        })
    }
}
