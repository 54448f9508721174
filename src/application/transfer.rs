use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::domain::{
    Account, Clock, IdGenerator, LedgerEntry, LegPair, LegType, MinorUnits, TransactionId,
    serialize_timestamp, truncate_to_seconds,
};
use crate::storage::{AccountStore, AppendOutcome, Database, LedgerWriter};

use super::AppError;

/// An immediate transfer as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_account: String,
    pub to_account: String,
    pub to_bank: String,
    pub amount: MinorUnits,
    pub currency: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferStatus {
    Transferred,
}

/// What a committed transfer reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub transaction_id: TransactionId,
    pub status: TransferStatus,
    #[serde(serialize_with = "serialize_timestamp")]
    pub transferred_at: DateTime<Utc>,
    /// Set when the id had already been committed and nothing new was written.
    #[serde(skip)]
    pub replayed: bool,
}

/// Field checks shared by transfers and schedules.
pub(crate) fn validate_movement(
    from_account: &str,
    to_account: &str,
    to_bank: &str,
    amount: MinorUnits,
    currency: &str,
) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::validation(
            "amount must be a positive integer in minor units",
        ));
    }
    for (field, value) in [
        ("fromAccount", from_account),
        ("toAccount", to_account),
        ("toBank", to_bank),
        ("currency", currency),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::validation(format!("{field} is required")));
        }
    }
    if from_account == to_account {
        return Err(AppError::validation(
            "fromAccount and toAccount must be different accounts",
        ));
    }
    Ok(())
}

pub(crate) fn check_currency(currency: &str, accounts: [&Account; 2]) -> Result<(), AppError> {
    if accounts.iter().any(|a| a.currency != currency) {
        return Err(AppError::validation("currency mismatch"));
    }
    Ok(())
}

/// Validates and applies immediate transfers.
///
/// Admission and mutation happen in one unit of work: the two ledger legs are inserted first,
/// then the source is debited with a conditional update that only succeeds while the available
/// balance still covers the amount, then the destination is credited. Any failure rolls the
/// whole unit back.
#[derive(Clone)]
pub struct TransferEngine {
    db: Database,
    accounts: AccountStore,
    ledger: LedgerWriter,
    clock: Arc<dyn Clock>,
    ids: Arc<IdGenerator>,
}

impl TransferEngine {
    pub fn new(db: Database, clock: Arc<dyn Clock>, ids: Arc<IdGenerator>) -> Self {
        Self {
            accounts: db.accounts(),
            ledger: db.ledger(),
            db,
            clock,
            ids,
        }
    }

    /// Allocate a transaction id without executing anything. Clients that want to retry safely
    /// hold on to it and pass it to `execute_with_id`.
    pub fn next_transaction_id(&self) -> TransactionId {
        self.ids.next_transaction_id()
    }

    /// Execute a transfer under a freshly generated transaction id.
    pub async fn execute(&self, request: &TransferRequest) -> Result<TransferResult, AppError> {
        let transaction_id = self.ids.next_transaction_id();
        self.execute_with_id(&transaction_id, request).await
    }

    /// Execute a transfer under `transaction_id`. If that id was already committed for the same
    /// movement, the earlier result is returned and nothing is applied again.
    #[instrument(
        skip(self, request),
        fields(from = %request.from_account, to = %request.to_account, amount = request.amount)
    )]
    pub async fn execute_with_id(
        &self,
        transaction_id: &str,
        request: &TransferRequest,
    ) -> Result<TransferResult, AppError> {
        if transaction_id.trim().is_empty() {
            return Err(AppError::validation("transactionId is required"));
        }
        validate_movement(
            &request.from_account,
            &request.to_account,
            &request.to_bank,
            request.amount,
            &request.currency,
        )?;

        let existing = self.ledger.find_transaction(transaction_id).await?;
        if !existing.is_empty() {
            return replay(transaction_id, request, &existing);
        }

        let from = self
            .accounts
            .get_account(&request.from_account)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(request.from_account.clone()))?;
        let to = self
            .accounts
            .get_account(&request.to_account)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(request.to_account.clone()))?;
        check_currency(&request.currency, [&from, &to])?;

        if !from.can_debit(request.amount) {
            warn!(
                available = from.available_balance,
                "transfer rejected: insufficient balance"
            );
            return Err(AppError::InsufficientBalance {
                account_number: from.account_number,
                available: from.available_balance,
                required: request.amount,
            });
        }

        let transferred_at = truncate_to_seconds(self.clock.now());
        let pair = LegPair {
            transaction_id,
            from_account: &request.from_account,
            to_account: &request.to_account,
            to_account_name: &to.account_name,
            to_bank: &request.to_bank,
            amount: request.amount,
            currency: &request.currency,
            note: &request.note,
            transferred_at,
        };

        let mut uow = self.db.begin().await?;

        if self.ledger.append_pair(&mut uow, &pair).await? == AppendOutcome::DuplicateTransaction {
            let existing = self.ledger.find_transaction_in(&mut uow, transaction_id).await?;
            uow.rollback()
                .await
                .context("Failed to roll back duplicate transfer")?;
            return replay(transaction_id, request, &existing);
        }

        if !self
            .accounts
            .debit_if_sufficient(&mut uow, &request.from_account, request.amount)
            .await?
        {
            let available = self
                .accounts
                .available_balance(&mut uow, &request.from_account)
                .await?
                .unwrap_or_default();
            warn!(available, "transfer rejected at debit: insufficient balance");
            return Err(AppError::InsufficientBalance {
                account_number: request.from_account.clone(),
                available,
                required: request.amount,
            });
        }

        if !self
            .accounts
            .apply_delta(&mut uow, &request.to_account, request.amount)
            .await?
        {
            let exists = self
                .accounts
                .available_balance(&mut uow, &request.to_account)
                .await?
                .is_some();
            if !exists {
                return Err(AppError::AccountNotFound(request.to_account.clone()));
            }
            warn!("transfer rejected: credit would overflow the destination balance");
            return Err(AppError::validation(format!(
                "amount would overflow the balance of account {}",
                request.to_account
            )));
        }

        if let Err(err) = uow.commit().await {
            error!(transaction_id, error = %err, "commit failed, transfer outcome unknown");
            return Err(anyhow::Error::new(err)
                .context("unable to create transfer")
                .into());
        }

        info!(transaction_id, "transfer committed");
        Ok(TransferResult {
            transaction_id: transaction_id.to_string(),
            status: TransferStatus::Transferred,
            transferred_at,
            replayed: false,
        })
    }
}

/// Answer a retried transaction id from the legs already on the ledger.
fn replay(
    transaction_id: &str,
    request: &TransferRequest,
    existing: &[LedgerEntry],
) -> Result<TransferResult, AppError> {
    let debit = existing
        .iter()
        .find(|e| e.leg_type == LegType::TransferOut)
        .ok_or_else(|| {
            anyhow::anyhow!("transaction {transaction_id} has no debit leg")
                .context("unable to create transfer")
        })?;

    let same_movement = debit.from_account == request.from_account
        && debit.to_account == request.to_account
        && debit.to_bank == request.to_bank
        && debit.amount == -request.amount
        && debit.currency == request.currency
        && debit.note == request.note;
    if !same_movement {
        return Err(AppError::validation(format!(
            "transaction id {transaction_id} was already used for a different transfer"
        )));
    }

    info!(transaction_id, "transfer already committed, replaying result");
    Ok(TransferResult {
        transaction_id: transaction_id.to_string(),
        status: TransferStatus::Transferred,
        transferred_at: debit.transferred_at,
        replayed: true,
    })
}
