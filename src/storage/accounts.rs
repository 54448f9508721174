use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use crate::domain::{Account, MinorUnits};

use super::UnitOfWork;

/// Owns the `accounts` table.
#[derive(Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

impl AccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a new account.
    pub async fn insert_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (account_number, branch, type, account_name, balance, available_balance, currency)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.account_number)
        .bind(&account.branch)
        .bind(&account.account_type)
        .bind(&account.account_name)
        .bind(account.balance)
        .bind(account.available_balance)
        .bind(&account.currency)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert account {}", account.account_number))?;
        Ok(())
    }

    /// Get an account by number.
    pub async fn get_account(&self, account_number: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT account_number, branch, type, account_name, balance, available_balance, currency
            FROM accounts
            WHERE account_number = ?
            "#,
        )
        .bind(account_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// List all accounts, ordered by account number.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT account_number, branch, type, account_name, balance, available_balance, currency
            FROM accounts
            ORDER BY account_number
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// Move both balance figures by `delta` inside `uow`. No admission check is made here.
    /// Returns false if no account has that number, or if a credit would take either figure
    /// past `MinorUnits::MAX`; nothing is changed in that case.
    pub async fn apply_delta(
        &self,
        uow: &mut UnitOfWork<'_>,
        account_number: &str,
        delta: MinorUnits,
    ) -> Result<bool> {
        // SQLite turns an overflowing integer sum into a REAL, so the headroom is checked first.
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + ?, available_balance = available_balance + ?
            WHERE account_number = ?
              AND (? <= 0 OR (balance <= ? - ? AND available_balance <= ? - ?))
            "#,
        )
        .bind(delta)
        .bind(delta)
        .bind(account_number)
        .bind(delta)
        .bind(MinorUnits::MAX)
        .bind(delta)
        .bind(MinorUnits::MAX)
        .bind(delta)
        .execute(&mut **uow)
        .await
        .context("Failed to update account balance")?;

        Ok(result.rows_affected() == 1)
    }

    /// Debit `amount` from both balance figures iff the available balance covers it, as a
    /// single statement inside `uow`. Returns false when the debit was refused (or the account
    /// does not exist); nothing is changed in that case.
    pub async fn debit_if_sufficient(
        &self,
        uow: &mut UnitOfWork<'_>,
        account_number: &str,
        amount: MinorUnits,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance - ?, available_balance = available_balance - ?
            WHERE account_number = ? AND available_balance >= ?
            "#,
        )
        .bind(amount)
        .bind(amount)
        .bind(account_number)
        .bind(amount)
        .execute(&mut **uow)
        .await
        .context("Failed to debit account")?;

        Ok(result.rows_affected() == 1)
    }

    /// Current available balance as seen from inside `uow`.
    pub async fn available_balance(
        &self,
        uow: &mut UnitOfWork<'_>,
        account_number: &str,
    ) -> Result<Option<MinorUnits>> {
        let row = sqlx::query("SELECT available_balance FROM accounts WHERE account_number = ?")
            .bind(account_number)
            .fetch_optional(&mut **uow)
            .await
            .context("Failed to read available balance")?;
        row.map(|r| r.try_get("available_balance"))
            .transpose()
            .context("Invalid available_balance")
    }

    /// Insert the demo accounts, resetting their balances if they already exist.
    pub async fn seed_demo_accounts(&self) -> Result<usize> {
        let accounts = demo_accounts();
        let mut tx = self.pool.begin().await.context("Failed to start seeding")?;
        for account in &accounts {
            sqlx::query(
                r#"
                INSERT INTO accounts (account_number, branch, type, account_name, balance, available_balance, currency)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (account_number) DO UPDATE
                SET balance = excluded.balance,
                    available_balance = excluded.available_balance
                "#,
            )
            .bind(&account.account_number)
            .bind(&account.branch)
            .bind(&account.account_type)
            .bind(&account.account_name)
            .bind(account.balance)
            .bind(account.available_balance)
            .bind(&account.currency)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to seed account {}", account.account_number))?;
        }
        tx.commit().await.context("Failed to commit seed accounts")?;
        Ok(accounts.len())
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let account_number: String = row.try_get("account_number")?;
        Ok(Account {
            branch: row.try_get("branch")?,
            account_type: row.try_get("type")?,
            account_name: row.try_get("account_name")?,
            balance: row
                .try_get("balance")
                .with_context(|| format!("Invalid balance for account {account_number}"))?,
            available_balance: row.try_get("available_balance").with_context(|| {
                format!("Invalid available balance for account {account_number}")
            })?,
            currency: row.try_get("currency")?,
            account_number,
        })
    }
}

/// Demo customers used by `init --seed` and `serve --seed`.
pub fn demo_accounts() -> Vec<Account> {
    vec![
        Account::new("111-111-111", "AnuchitO", "THB", 101282250).with_branch("Kalasin"),
        Account::new("222-222-222", "MaiThai", "THB", 96588150).with_branch("KhonKean"),
        Account::new("333-333-333", "LaumPlearn", "THB", 105500).with_branch("Bangkok"),
        Account::new("444-444-444", "Laumcing", "THB", 199800).with_branch("Udon"),
    ]
}
