use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{Account, LedgerEntry, format_timestamp};

/// Database snapshot for a full JSON export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
    pub transactions: Vec<LedgerEntry>,
}

/// Writes ledger data out as CSV or JSON.
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export ledger entries to CSV, newest first. With `account` set, only that statement.
    pub async fn export_transactions_csv<W: Write>(
        &self,
        writer: W,
        account: Option<&str>,
    ) -> Result<usize> {
        let entries = match account {
            Some(account_number) => self.service.list_transactions(account_number).await?,
            None => self.service.list_all_transactions().await?,
        };
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "transaction_id",
            "account_number",
            "type",
            "from_account",
            "to_account",
            "to_account_name",
            "to_bank",
            "amount",
            "currency",
            "note",
            "transferred_at",
        ])?;

        for entry in &entries {
            csv_writer.write_record([
                entry.transaction_id.as_str(),
                &entry.account_number,
                entry.leg_type.as_str(),
                &entry.from_account,
                &entry.to_account,
                &entry.to_account_name,
                &entry.to_bank,
                &entry.amount.to_string(),
                &entry.currency,
                &entry.note,
                &format_timestamp(entry.transferred_at),
            ])?;
        }

        csv_writer.flush()?;
        Ok(entries.len())
    }

    /// Export account balances to CSV.
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "account_number",
            "name",
            "branch",
            "type",
            "currency",
            "balance",
            "available_balance",
        ])?;

        for account in &accounts {
            csv_writer.write_record([
                account.account_number.as_str(),
                &account.account_name,
                &account.branch,
                &account.account_type,
                &account.currency,
                &account.balance.to_string(),
                &account.available_balance.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(accounts.len())
    }

    /// Export accounts and the whole ledger as one pretty-printed JSON document.
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts: self.service.list_accounts().await?,
            transactions: self.service.list_all_transactions().await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
