// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use ledgerline::application::{LedgerService, ScheduleRequest, TransferRequest};
use ledgerline::domain::{Account, FixedClock, parse_timestamp};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// A second service over the same database whose clock is stuck at `at`.
pub fn service_at(service: &LedgerService, at: &str) -> LedgerService {
    LedgerService::with_clock(service.database().clone(), Arc::new(FixedClock(ts(at))))
}

/// Helper to parse `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` into DateTime<Utc>
pub fn ts(input: &str) -> DateTime<Utc> {
    parse_timestamp(input).unwrap()
}

/// Test fixture: the two accounts used throughout the scenarios
pub struct StandardAccounts;

impl StandardAccounts {
    pub const PAYER: &'static str = "12345";
    pub const PAYEE: &'static str = "54321";

    /// 12345 (John Doe) holds 1000, 54321 (Jane Doe) holds 500, both USD.
    pub async fn open(service: &LedgerService) -> Result<()> {
        service
            .open_account(&Account::new(Self::PAYER, "John Doe", "USD", 1000))
            .await?;
        service
            .open_account(&Account::new(Self::PAYEE, "Jane Doe", "USD", 500))
            .await?;
        Ok(())
    }
}

pub fn transfer(from: &str, to: &str, amount: i64) -> TransferRequest {
    TransferRequest {
        from_account: from.to_string(),
        to_account: to.to_string(),
        to_bank: "KBank".to_string(),
        amount,
        currency: "USD".to_string(),
        note: String::new(),
    }
}

pub fn schedule(from: &str, to: &str, kind: &str, start: &str) -> ScheduleRequest {
    ScheduleRequest {
        from_account: from.to_string(),
        to_account: to.to_string(),
        to_bank: "KBank".to_string(),
        amount: 100,
        currency: "USD".to_string(),
        note: "rent".to_string(),
        schedule: kind.to_string(),
        start_date: start.to_string(),
        end_date: None,
    }
}

pub async fn balance_of(service: &LedgerService, account: &str) -> Result<i64> {
    Ok(service.get_balance(account).await?.balance)
}
